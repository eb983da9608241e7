//! @acp:module "Annotation Orchestrator"
//! @acp:summary "Drive tokenizer, parser and builder over every documented function in a file"
//! @acp:domain annotate
//! @acp:layer service
//!
//! One function's failure never stops the others. Every problem becomes a
//! [`Diagnostic`] on the [`FileReport`]; only I/O and source parse failures
//! surface as [`DocsigError`](crate::error::DocsigError).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::builder::{AnnotationBuilder, AnnotationResult, ArgTree, ReturnTree};
use super::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use super::policy::AnnotationPolicy;
use super::writer::{apply_edits, unified_diff, SourceEdit};
use crate::config::{AnnotateConfig, DocstringConfig};
use crate::docstring::{DocstringSections, ReturnsKind, SectionTokenizer, TypeSpan};
use crate::error::Result;
use crate::resolve::ImportPlan;
use crate::source::{FunctionInfo, InsertionAnchor, SourceFile};
use crate::types::{self, TypeExpr, TypeRegistry};

/// What happened to one documented function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FunctionOutcome {
    Annotated { type_comment: String },
    AlreadyAnnotated,
    NoTypes,
    Failed,
}

impl FunctionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FunctionOutcome::Annotated { .. } => "annotated",
            FunctionOutcome::AlreadyAnnotated => "already annotated",
            FunctionOutcome::NoTypes => "no types",
            FunctionOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub line: usize,
    #[serde(flatten)]
    pub outcome: FunctionOutcome,
}

/// @acp:summary "Per-file counters for the summary output"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub documented: usize,
    pub annotated: usize,
    pub already_annotated: usize,
    pub untyped: usize,
    pub failed: usize,
    pub warnings: usize,
}

/// @acp:summary "Everything produced for one file: edits, imports and diagnostics"
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip)]
    pub original: String,
    #[serde(skip)]
    pub edits: Vec<SourceEdit>,
    /// Import lines added to the file, in insertion order.
    pub import_lines: Vec<String>,
    pub functions: Vec<FunctionReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: FileStats,
}

impl FileReport {
    pub fn annotated_source(&self) -> String {
        apply_edits(&self.original, &self.edits)
    }

    pub fn has_changes(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diff(&self) -> String {
        unified_diff(&self.path, &self.original, &self.annotated_source())
    }
}

/// A function that built cleanly, with the edits that apply it.
struct Annotated {
    result: AnnotationResult,
    edits: Vec<SourceEdit>,
}

/// @acp:summary "Annotates files with a fixed policy and docstring style"
pub struct Annotator {
    tokenizer: SectionTokenizer,
    policy: AnnotationPolicy,
    strip_docstring_types: bool,
    registry: &'static TypeRegistry,
}

impl Annotator {
    pub fn new(annotate: &AnnotateConfig, docstring: &DocstringConfig) -> Result<Self> {
        Ok(Self {
            tokenizer: SectionTokenizer::new(docstring)?,
            policy: annotate.policy(),
            strip_docstring_types: annotate.strip_docstring_types,
            registry: TypeRegistry::global(),
        })
    }

    /// @acp:summary "Read, parse and annotate one file"
    pub fn annotate_path(&self, path: &Path) -> Result<FileReport> {
        let source = SourceFile::read(path)?;
        Ok(self.annotate_source(&source))
    }

    /// @acp:summary "Annotate every documented function of a parsed file"
    pub fn annotate_source(&self, source: &SourceFile) -> FileReport {
        let builder = AnnotationBuilder::new(&source.scope, self.registry, self.policy);
        let mut report = FileReport {
            path: source.path.clone(),
            original: source.text.clone(),
            edits: Vec::new(),
            import_lines: Vec::new(),
            functions: Vec::new(),
            diagnostics: Vec::new(),
            stats: FileStats::default(),
        };
        let mut plan = ImportPlan::new();

        for function in &source.functions {
            report.stats.documented += 1;
            let outcome = if function.already_annotated {
                report.stats.already_annotated += 1;
                FunctionOutcome::AlreadyAnnotated
            } else {
                let mut ctx = FunctionContext {
                    source,
                    function,
                    diagnostics: &mut report.diagnostics,
                };
                match self.annotate_function(&builder, &plan, &mut ctx) {
                    Ok(Some(annotated)) => {
                        for warning in &annotated.result.warnings {
                            ctx.report_at_def(Severity::Warning, warning.into(), warning.to_string());
                        }
                        plan.extend(&annotated.result.imports);
                        report.edits.extend(annotated.edits);
                        report.stats.annotated += 1;
                        FunctionOutcome::Annotated {
                            type_comment: annotated.result.type_comment(),
                        }
                    }
                    Ok(None) => {
                        report.stats.untyped += 1;
                        FunctionOutcome::NoTypes
                    }
                    Err(()) => {
                        report.stats.failed += 1;
                        FunctionOutcome::Failed
                    }
                }
            };
            report.functions.push(FunctionReport {
                name: function.name.clone(),
                line: function.line,
                outcome,
            });
        }

        report.import_lines = plan.render(&source.scope, self.registry);
        if let Some(edit) = import_edit(source, &report.import_lines) {
            report.edits.push(edit);
        }
        report.stats.warnings = report
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();

        debug!(
            "{}: {} annotated, {} failed, {} imports",
            source.path.display(),
            report.stats.annotated,
            report.stats.failed,
            report.import_lines.len()
        );
        report
    }

    /// `Ok(None)` when the docstring carries no types; `Err(())` once a
    /// diagnostic has been recorded.
    fn annotate_function(
        &self,
        builder: &AnnotationBuilder<'_>,
        plan: &ImportPlan,
        ctx: &mut FunctionContext<'_>,
    ) -> std::result::Result<Option<Annotated>, ()> {
        let (source, function) = (ctx.source, ctx.function);
        let location = &function.docstring;
        let body = &source.text[location.body.clone()];

        let sections = match self.tokenizer.tokenize(body) {
            Ok(sections) => sections,
            Err(e) => {
                let (first_line, _) = source.position(location.body.start);
                let line = first_line + e.line - 1;
                ctx.report(line, 1, Severity::Error, DiagnosticCode::DocstringSyntax, e.message);
                return Err(());
            }
        };
        if !sections.has_types() {
            return Ok(None);
        }

        check_signature(&sections, ctx)?;

        let mut args = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let bare = param.trim_start_matches('*');
            let span = sections
                .args
                .iter()
                .flatten()
                .find(|entry| entry.bare_name() == bare)
                .and_then(|entry| entry.type_span.as_ref());
            let expr = match span {
                Some(span) => Some(parse_span(span, ctx)?),
                None => None,
            };
            args.push(ArgTree::new(param.clone(), expr));
        }

        let returns = match &sections.returns {
            Some(entry) => match &entry.type_span {
                Some(span) => Some(ReturnTree {
                    expr: parse_span(span, ctx)?,
                    yields: entry.kind == ReturnsKind::Yields,
                }),
                None => None,
            },
            None => None,
        };

        let result = match builder.build_with_plan(&args, returns.as_ref(), plan) {
            Ok(result) => result,
            Err(e) => {
                ctx.report_at_def(Severity::Error, (&e.kind).into(), e.to_string());
                return Err(());
            }
        };

        let mut edits = vec![SourceEdit::insert(
            location.line_start,
            format!("{}{}\n", location.indent, result.type_comment()),
        )];
        if self.strip_docstring_types {
            let stripped = sections.strip_types(body);
            if stripped != body {
                edits.push(SourceEdit::replace(location.body.clone(), stripped));
            }
        }

        Ok(Some(Annotated { result, edits }))
    }
}

struct FunctionContext<'a> {
    source: &'a SourceFile,
    function: &'a FunctionInfo,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl FunctionContext<'_> {
    fn report(&mut self, line: usize, column: usize, severity: Severity, code: DiagnosticCode, message: String) {
        self.diagnostics.push(Diagnostic {
            path: self.source.path.clone(),
            function: self.function.name.clone(),
            line,
            column,
            severity,
            code,
            message,
        });
    }

    fn report_at_def(&mut self, severity: Severity, code: DiagnosticCode, message: String) {
        let (line, column) = (self.function.line, self.function.column);
        self.report(line, column, severity, code, message);
    }
}

/// Documented argument names must match the signature exactly.
fn check_signature(sections: &DocstringSections, ctx: &mut FunctionContext<'_>) -> std::result::Result<(), ()> {
    let Some(entries) = &sections.args else {
        return Ok(());
    };
    let documented: BTreeSet<&str> = entries.iter().map(|e| e.bare_name()).collect();
    let signature: BTreeSet<&str> = ctx
        .function
        .params
        .iter()
        .map(|p| p.trim_start_matches('*'))
        .collect();
    if documented == signature {
        return Ok(());
    }

    let mut problems = Vec::new();
    let missing: Vec<&str> = signature.difference(&documented).copied().collect();
    if !missing.is_empty() {
        problems.push(format!("not documented: {}", missing.join(", ")));
    }
    let unexpected: Vec<&str> = documented.difference(&signature).copied().collect();
    if !unexpected.is_empty() {
        problems.push(format!("not in signature: {}", unexpected.join(", ")));
    }
    ctx.report_at_def(
        Severity::Error,
        DiagnosticCode::SignatureMismatch,
        format!("documented arguments do not match the signature ({})", problems.join("; ")),
    );
    Err(())
}

fn parse_span(span: &TypeSpan, ctx: &mut FunctionContext<'_>) -> std::result::Result<TypeExpr, ()> {
    types::parse(&span.text).map_err(|e| {
        let offset = ctx.function.docstring.body.start + span.range.start + e.position;
        let (line, column) = ctx.source.position(offset);
        ctx.report(
            line,
            column,
            Severity::Error,
            DiagnosticCode::TypeSyntax,
            format!("cannot parse type `{}`: {}", span.text, e),
        );
    })
}

/// Import lines become one insertion at the file's import anchor.
fn import_edit(source: &SourceFile, lines: &[String]) -> Option<SourceEdit> {
    if lines.is_empty() {
        return None;
    }
    let insertion = source.import_insertion;
    let text = &source.text;
    let mut block = String::new();
    if insertion.offset == text.len() && !text.is_empty() && !text.ends_with('\n') {
        block.push('\n');
    }
    if insertion.anchor == InsertionAnchor::AfterModuleDocstring {
        block.push('\n');
    }
    for line in lines {
        block.push_str(line);
        block.push('\n');
    }
    let rest = &text[insertion.offset..];
    if insertion.anchor == InsertionAnchor::TopOfFile && !rest.is_empty() && !rest.starts_with('\n') {
        block.push('\n');
    }
    Some(SourceEdit::insert(insertion.offset, block))
}
