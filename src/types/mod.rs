//! @acp:module "Types"
//! @acp:summary "Docstring type expressions: tree, parser and name registry"
//! @acp:domain types
//! @acp:layer core

pub mod expr;
pub mod parser;
pub mod registry;

pub use expr::{CallableParams, NamePath, TypeExpr};
pub use parser::{parse, ParseError, ParseErrorKind};
pub use registry::{Arity, RegisteredType, TypeRegistry};
