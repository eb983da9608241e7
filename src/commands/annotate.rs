//! @acp:module "Annotate Command"
//! @acp:summary "Add type comments derived from docstrings to Python files"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `docsig annotate`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ValueEnum;
use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Confirm};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::annotate::{write_file, Annotator, Diagnostic, FileReport, FileStats};
use crate::config::Config;

const PROGRESS_TEMPLATE: &str = "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}";

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Unified diff of every changed file
    #[default]
    Diff,
    /// Machine-readable report
    Json,
    /// Counts only
    Summary,
}

/// Options for the annotate command
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Files or directories to process
    pub paths: Vec<PathBuf>,
    /// Write changes back to the files
    pub write: bool,
    /// Confirm each file before writing
    pub interactive: bool,
    /// Output format
    pub format: OutputFormat,
    /// Number of parallel workers
    pub workers: Option<usize>,
    /// Verbose output
    pub verbose: bool,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            write: false,
            interactive: false,
            format: OutputFormat::Diff,
            workers: None,
            verbose: false,
        }
    }
}

/// @acp:summary "Collect the Python files under the given paths"
///
/// Explicit file arguments are always taken. Directory contents are matched
/// against the include/exclude globs relative to that directory.
pub fn discover_files(paths: &[PathBuf], config: &Config) -> crate::error::Result<Vec<PathBuf>> {
    let include = compile_patterns(&config.include)?;
    let exclude = compile_patterns(&config.exclude)?;
    let match_opts = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.exists() {
            return Err(crate::error::DocsigError::Other(format!(
                "path does not exist: {}",
                root.display()
            )));
        }
        for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_to(entry.path(), root);
            let included = include.is_empty() || include.iter().any(|p| p.matches_with(&relative, match_opts));
            let excluded = exclude.iter().any(|p| p.matches_with(&relative, match_opts));
            if included && !excluded {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn compile_patterns(patterns: &[String]) -> crate::error::Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(Into::into))
        .collect()
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

/// Execute the annotate command
pub fn execute_annotate(options: AnnotateOptions, config: Config) -> Result<()> {
    // Configure thread pool if workers specified
    if let Some(num_workers) = options.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    eprintln!("{} Analyzing docstrings...", style("→").cyan());

    let annotator = Annotator::new(&config.annotate, &config.docstring)?;
    let files = discover_files(&options.paths, &config)?;
    debug!("Found {} files to analyze", files.len());
    if files.is_empty() {
        eprintln!("{} No Python files found", style("⚠").yellow());
        return Ok(());
    }

    let show_progress = Term::stderr().is_term() && !options.interactive;
    let progress = progress_bar(files.len(), show_progress);

    // Process files in parallel; a file that cannot be read is reported
    // and the rest carry on.
    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            progress.set_message(path.display().to_string());
            let result = annotator.annotate_path(path);
            progress.inc(1);
            (path.clone(), result)
        })
        .collect();
    progress.finish_and_clear();

    let mut reports = Vec::with_capacity(results.len());
    let mut file_errors = Vec::new();
    for (path, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => file_errors.push((path, e.to_string())),
        }
    }

    let totals = reports.iter().fold(FileStats::default(), |mut acc, r| {
        acc.documented += r.stats.documented;
        acc.annotated += r.stats.annotated;
        acc.already_annotated += r.stats.already_annotated;
        acc.untyped += r.stats.untyped;
        acc.failed += r.stats.failed;
        acc.warnings += r.stats.warnings;
        acc
    });
    let files_changed = reports.iter().filter(|r| r.has_changes()).count();
    let mut diagnostics: Vec<&Diagnostic> = reports.iter().flat_map(|r| &r.diagnostics).collect();
    diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    let error_count = diagnostics.iter().filter(|d| d.is_error()).count() + file_errors.len();

    // Output results
    match options.format {
        OutputFormat::Diff => {
            if !options.interactive {
                for report in reports.iter().filter(|r| r.has_changes()) {
                    print!("{}", report.diff());
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "summary": {
                    "files_analyzed": files.len(),
                    "files_changed": files_changed,
                    "functions_documented": totals.documented,
                    "functions_annotated": totals.annotated,
                    "already_annotated": totals.already_annotated,
                    "without_types": totals.untyped,
                    "failed": totals.failed,
                    "warnings": totals.warnings,
                    "errors": error_count,
                },
                "files": reports,
                "file_errors": file_errors.iter().map(|(path, message)| {
                    serde_json::json!({
                        "path": path.display().to_string(),
                        "message": message,
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => {
            println!("\n{}", style("Annotation Summary").bold());
            println!("==================");
            println!("Files analyzed:          {}", files.len());
            println!("Files changed:           {}", files_changed);
            println!("Documented functions:    {}", totals.documented);
            println!("Annotated:               {}", totals.annotated);
            println!("Already annotated:       {}", totals.already_annotated);
            println!("Without types:           {}", totals.untyped);
            println!("Failed:                  {}", totals.failed);
            println!("Warnings:                {}", totals.warnings);

            if options.verbose {
                println!("\n{}", style("File Details").bold());
                println!("------------");
                for report in reports.iter().filter(|r| !r.functions.is_empty()) {
                    println!("\n{}:", report.path.display());
                    for function in &report.functions {
                        println!(
                            "  - {} @ line {}: {}",
                            function.name,
                            function.line,
                            function.outcome.label()
                        );
                    }
                }
            }
        }
    }

    // Diagnostics go to stderr at the end so they are not lost in the diff
    if options.format != OutputFormat::Json {
        if !diagnostics.is_empty() || !file_errors.is_empty() {
            eprintln!();
        }
        for (path, message) in &file_errors {
            eprintln!("{} {}: {}", style("✗").red(), path.display(), message);
        }
        for diagnostic in &diagnostics {
            let marker = if diagnostic.is_error() {
                style("✗").red()
            } else {
                style("⚠").yellow()
            };
            eprintln!("{} {}", marker, diagnostic);
        }
    }

    if options.write || options.interactive {
        let written = write_reports(&reports, options.interactive)?;
        eprintln!(
            "\n{} Annotated {} functions in {} files",
            style("✓").green(),
            written.iter().map(|r| r.stats.annotated).sum::<usize>(),
            written.len()
        );
    } else if files_changed > 0 {
        eprintln!("\nRun with {} to write changes", style("--write").cyan());
    }

    if error_count > 0 {
        eprintln!(
            "\n{} {} error(s) in {} function(s)",
            style("✗").red(),
            error_count,
            totals.failed
        );
        std::process::exit(1);
    }

    Ok(())
}

fn write_reports(reports: &[FileReport], interactive: bool) -> Result<Vec<&FileReport>> {
    let mut written = Vec::new();
    for report in reports.iter().filter(|r| r.has_changes()) {
        if interactive {
            print!("{}", report.diff());
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Write changes to {}?", report.path.display()))
                .default(true)
                .interact()?;
            if !confirmed {
                continue;
            }
        }
        write_file(&report.path, &report.annotated_source())?;
        debug!("Updated: {}", report.path.display());
        written.push(report);
    }
    Ok(written)
}
