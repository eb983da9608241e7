//! @acp:module "Type Expressions"
//! @acp:summary "Typed tree for docstring type expressions and its canonical rendering"
//! @acp:domain types
//! @acp:layer model

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// A dotted identifier path, e.g. `["engine", "models", "Product"]`.
pub type NamePath = Vec<String>;

/// @acp:summary "Parsed type expression"
///
/// Each node owns its children. `Optional[X]` never appears here: the
/// parser desugars it to `Union[X, None]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeExpr {
    /// A (possibly dotted) type name. The path is never empty.
    Name { path: NamePath },
    /// A generic applied to arguments, e.g. `Dict[str, int]`.
    Subscript {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    /// `Union[A, B]`, `A | B` or a desugared `Optional[A]`.
    Union { members: Vec<TypeExpr> },
    /// `Callable[[A, B], R]` or `Callable[..., R]`.
    Callable {
        params: CallableParams,
        returns: Box<TypeExpr>,
    },
    /// `Tuple[A, B]`; `variadic` marks a trailing `...` as in `Tuple[int, ...]`.
    Tuple {
        elements: Vec<TypeExpr>,
        variadic: bool,
    },
}

/// Parameter list of a `Callable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableParams {
    /// The `...` marker: any parameters.
    Ellipsis,
    List(Vec<TypeExpr>),
}

/// Names of the `typing` special forms the tree renders for its own variants.
pub const UNION_NAME: &str = "Union";
pub const TUPLE_NAME: &str = "Tuple";
pub const CALLABLE_NAME: &str = "Callable";

impl TypeExpr {
    /// Build a `Name` from a dotted string such as `"engine.models.Product"`.
    pub fn name(dotted: &str) -> Self {
        TypeExpr::Name {
            path: dotted.split('.').map(str::to_string).collect(),
        }
    }

    /// The `None` type.
    pub fn none() -> Self {
        TypeExpr::name("None")
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TypeExpr::Name { path } if path.len() == 1 && path[0] == "None")
    }

    /// @acp:summary "Collect every leaf name the rendered annotation refers to"
    ///
    /// Includes the `typing` names implied by the `Union`, `Tuple` and
    /// `Callable` variants, since the canonical rendering spells them out.
    pub fn leaf_names(&self) -> BTreeSet<NamePath> {
        let mut names = BTreeSet::new();
        self.collect_leaf_names(&mut names);
        names
    }

    fn collect_leaf_names(&self, names: &mut BTreeSet<NamePath>) {
        match self {
            TypeExpr::Name { path } => {
                names.insert(path.clone());
            }
            TypeExpr::Subscript { base, args } => {
                base.collect_leaf_names(names);
                for arg in args {
                    arg.collect_leaf_names(names);
                }
            }
            TypeExpr::Union { members } => {
                names.insert(vec![UNION_NAME.to_string()]);
                for member in members {
                    member.collect_leaf_names(names);
                }
            }
            TypeExpr::Callable { params, returns } => {
                names.insert(vec![CALLABLE_NAME.to_string()]);
                if let CallableParams::List(params) = params {
                    for param in params {
                        param.collect_leaf_names(names);
                    }
                }
                returns.collect_leaf_names(names);
            }
            TypeExpr::Tuple { elements, .. } => {
                names.insert(vec![TUPLE_NAME.to_string()]);
                for element in elements {
                    element.collect_leaf_names(names);
                }
            }
        }
    }

    /// @acp:summary "Render with a caller-chosen spelling for each leaf name"
    ///
    /// The annotation builder uses this to strip module prefixes from names
    /// that are imported with `from module import Name`.
    pub fn render_with<F>(&self, name_fn: &F) -> String
    where
        F: Fn(&[String]) -> String,
    {
        let mut out = String::new();
        self.write_with(&mut out, name_fn);
        out
    }

    fn write_with<F>(&self, out: &mut String, name_fn: &F)
    where
        F: Fn(&[String]) -> String,
    {
        match self {
            TypeExpr::Name { path } => out.push_str(&name_fn(path)),
            TypeExpr::Subscript { base, args } => {
                base.write_with(out, name_fn);
                write_list(out, args, name_fn);
            }
            TypeExpr::Union { members } => {
                out.push_str(&name_fn(&[UNION_NAME.to_string()]));
                write_list(out, members, name_fn);
            }
            TypeExpr::Callable { params, returns } => {
                out.push_str(&name_fn(&[CALLABLE_NAME.to_string()]));
                out.push('[');
                match params {
                    CallableParams::Ellipsis => out.push_str("..."),
                    CallableParams::List(params) => write_list(out, params, name_fn),
                }
                out.push_str(", ");
                returns.write_with(out, name_fn);
                out.push(']');
            }
            TypeExpr::Tuple { elements, variadic } => {
                out.push_str(&name_fn(&[TUPLE_NAME.to_string()]));
                out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    element.write_with(out, name_fn);
                }
                if *variadic {
                    out.push_str(", ...");
                }
                out.push(']');
            }
        }
    }
}

fn write_list<F>(out: &mut String, items: &[TypeExpr], name_fn: &F)
where
    F: Fn(&[String]) -> String,
{
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_with(out, name_fn);
    }
    out.push(']');
}

/// Canonical surface form: full dotted paths, `Union[...]` spelling.
impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(&|path: &[String]| path.join(".")))
    }
}
