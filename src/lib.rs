#![forbid(unsafe_code)]

//! @acp:module "docsig Library"
//! @acp:summary "Derive PEP 484 type comments from typed Google-style docstrings"
//! @acp:domain cli
//! @acp:layer api
//! @acp:stability experimental
//!
//! # docsig
//!
//! Reads Python sources, finds functions whose docstrings document argument
//! and return types, and inserts the matching `# type:` comment together
//! with any imports the types need.
//!
//! ## Pipeline
//!
//! - **Source**: tree-sitter extracts functions, docstrings and the file's imports
//! - **Docstring**: Google-style `Args`/`Returns`/`Yields` sections are tokenized
//! - **Types**: each type string is parsed into a [`TypeExpr`] tree
//! - **Resolve**: leaf names are checked against the file's imports and locals
//! - **Annotate**: policy decides between annotating, warning and failing
//!
//! ## Example
//!
//! ```rust,no_run
//! use docsig::{Annotator, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let annotator = Annotator::new(&config.annotate, &config.docstring)?;
//!
//!     let report = annotator.annotate_path("pkg/models.py".as_ref())?;
//!     print!("{}", report.diff());
//!     for diagnostic in &report.diagnostics {
//!         eprintln!("{}", diagnostic);
//!     }
//!     Ok(())
//! }
//! ```

pub mod annotate;
pub mod commands;
pub mod config;
pub mod docstring;
pub mod error;
pub mod resolve;
pub mod source;
pub mod types;

// Re-exports
pub use annotate::{
    AnnotationBuilder, AnnotationPolicy, AnnotationResult, Annotator, ArgTree, BuildError,
    BuildErrorKind, Diagnostic, DiagnosticCode, FileReport, ImportCollisionPolicy, ReturnTree,
    Severity, SourceEdit, UnpathedTypePolicy,
};
pub use config::{AnnotateConfig, Config, DocstringConfig};
pub use docstring::{DocstringSections, SectionTokenizer};
pub use error::{DocsigError, Result};
pub use resolve::{resolve, FileScope, ImportPlan, ImportRequirement, ImportStatement, ResolutionStatus};
pub use source::SourceFile;
pub use types::{parse, ParseError, ParseErrorKind, TypeExpr, TypeRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
