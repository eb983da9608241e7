//! @acp:module "Annotation"
//! @acp:summary "Build type comments from docstrings and apply them to source files"
//! @acp:domain annotate
//! @acp:layer service

pub mod builder;
pub mod diagnostics;
pub mod orchestrator;
pub mod policy;
pub mod writer;

pub use builder::{
    AnnotationBuilder, AnnotationResult, ArgTree, BuildError, BuildErrorKind, BuildWarning, ReturnTree,
};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use orchestrator::{Annotator, FileReport, FileStats, FunctionOutcome, FunctionReport};
pub use policy::{AnnotationPolicy, ImportCollisionPolicy, UnpathedTypePolicy};
pub use writer::{apply_edits, unified_diff, write_file, SourceEdit};
