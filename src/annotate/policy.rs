//! @acp:module "Annotation Policy"
//! @acp:summary "Policy knobs that decide between warning and failing"
//! @acp:domain annotate
//! @acp:layer model

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What to do with a name that may clash with something already in scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImportCollisionPolicy {
    /// Add the import anyway; it may be redundant but is never wrong.
    #[default]
    Import,
    /// Emit the annotation without an import and warn.
    NoImport,
    /// Refuse to annotate the function.
    Fail,
}

/// What to do with a bare name that is not builtin, `typing`, local or imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UnpathedTypePolicy {
    Ignore,
    Warn,
    #[default]
    Fail,
}

/// @acp:summary "Policy threaded explicitly into every build"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationPolicy {
    pub allow_untyped_args: bool,
    pub require_return_type: bool,
    pub import_collision_policy: ImportCollisionPolicy,
    pub unpathed_type_policy: UnpathedTypePolicy,
}
