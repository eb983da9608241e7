//! @acp:module "Diagnostics"
//! @acp:summary "Per-function warnings and errors collected over a run"
//! @acp:domain annotate
//! @acp:layer model

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::builder::{BuildErrorKind, BuildWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    DocstringSyntax,
    TypeSyntax,
    SignatureMismatch,
    MissingArgType,
    MissingReturnType,
    ArityMismatch,
    AmbiguousType,
    UnresolvedType,
    UntypedArgs,
    ReturnTypeAssumed,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::DocstringSyntax => "docstring-syntax",
            DiagnosticCode::TypeSyntax => "type-syntax",
            DiagnosticCode::SignatureMismatch => "signature-mismatch",
            DiagnosticCode::MissingArgType => "missing-arg-type",
            DiagnosticCode::MissingReturnType => "missing-return-type",
            DiagnosticCode::ArityMismatch => "arity-mismatch",
            DiagnosticCode::AmbiguousType => "ambiguous-type",
            DiagnosticCode::UnresolvedType => "unresolved-type",
            DiagnosticCode::UntypedArgs => "untyped-args",
            DiagnosticCode::ReturnTypeAssumed => "return-type-assumed",
        }
    }
}

impl From<&BuildErrorKind> for DiagnosticCode {
    fn from(kind: &BuildErrorKind) -> Self {
        match kind {
            BuildErrorKind::MissingArgType { .. } => DiagnosticCode::MissingArgType,
            BuildErrorKind::MissingReturnType => DiagnosticCode::MissingReturnType,
            BuildErrorKind::ArityMismatch { .. } => DiagnosticCode::ArityMismatch,
            BuildErrorKind::AmbiguousType { .. } => DiagnosticCode::AmbiguousType,
            BuildErrorKind::UnresolvedType { .. } => DiagnosticCode::UnresolvedType,
        }
    }
}

impl From<&BuildWarning> for DiagnosticCode {
    fn from(warning: &BuildWarning) -> Self {
        match warning {
            BuildWarning::UntypedArgs { .. } => DiagnosticCode::UntypedArgs,
            BuildWarning::MissingReturnType => DiagnosticCode::ReturnTypeAssumed,
            BuildWarning::AmbiguousType { .. } => DiagnosticCode::AmbiguousType,
            BuildWarning::UnresolvedType { .. } => DiagnosticCode::UnresolvedType,
        }
    }
}

/// @acp:summary "A located problem in one function's docstring"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub function: String,
    /// 1-based
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Orders diagnostics by file, then position.
    pub fn sort_key(&self) -> (&PathBuf, usize, usize) {
        (&self.path, self.line, self.column)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}[{}] in `{}`: {}",
            self.path.display(),
            self.line,
            self.column,
            self.severity,
            self.code.as_str(),
            self.function,
            self.message
        )
    }
}
