//! @acp:module "Errors"
//! @acp:summary "Crate-wide error type and Result alias"
//! @acp:domain cli
//! @acp:layer core
//!
//! Run-level failures only. Per-function problems (type parse errors,
//! build errors, ambiguous imports) are reported as diagnostics and never
//! surface through this type.

use std::path::PathBuf;

use thiserror::Error;

/// @acp:summary "Errors that abort processing of a file or the whole run"
#[derive(Debug, Error)]
pub enum DocsigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Failed to parse {path}: {message}")]
    SourceParse { path: PathBuf, message: String },

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DocsigError>;
