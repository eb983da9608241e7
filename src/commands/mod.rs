//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Each command is in its own submodule.

pub mod annotate;
pub mod init;
pub mod parse;

pub use annotate::{discover_files, execute_annotate, AnnotateOptions, OutputFormat};
pub use init::{execute_init, InitOptions};
pub use parse::{execute_parse, ParseOptions};
