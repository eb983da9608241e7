//! @acp:module "Annotation Builder"
//! @acp:summary "Combine parsed argument and return types with policy into a type comment"
//! @acp:domain annotate
//! @acp:layer service

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::policy::{AnnotationPolicy, ImportCollisionPolicy, UnpathedTypePolicy};
use crate::resolve::{self, FileScope, ImportPlan, ImportStatement, ResolutionStatus};
use crate::types::{NamePath, TypeExpr, TypeRegistry};

const ANY: &str = "Any";
const GENERATOR: &str = "Generator";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildErrorKind {
    #[error("argument `{arg}` has no type")]
    MissingArgType { arg: String },

    #[error("return type is missing")]
    MissingReturnType,

    #[error("`{name}` takes {expected} type arguments, found {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("ambiguous type `{name}`: {reason}")]
    AmbiguousType { name: String, reason: String },

    #[error("cannot determine an import for `{name}`")]
    UnresolvedType { name: String },
}

/// Failure to annotate one function.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}")]
pub struct BuildError {
    pub kind: BuildErrorKind,
}

impl From<BuildErrorKind> for BuildError {
    fn from(kind: BuildErrorKind) -> Self {
        Self { kind }
    }
}

/// Something worth telling the user that did not stop the annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    UntypedArgs { args: Vec<String> },
    MissingReturnType,
    AmbiguousType { name: String, reason: String },
    UnresolvedType { name: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::UntypedArgs { args } => {
                write!(f, "untyped arguments annotated loosely: {}", args.join(", "))
            }
            BuildWarning::MissingReturnType => write!(f, "no return type documented, assuming None"),
            BuildWarning::AmbiguousType { name, reason } => {
                write!(f, "ambiguous type `{}`: {}", name, reason)
            }
            BuildWarning::UnresolvedType { name } => {
                write!(f, "`{}` has no dotted path and is not imported or defined here", name)
            }
        }
    }
}

/// One argument in signature order. `name` keeps its `*`/`**` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTree {
    pub name: String,
    pub expr: Option<TypeExpr>,
}

impl ArgTree {
    pub fn new(name: impl Into<String>, expr: Option<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// The documented return or yield type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTree {
    pub expr: TypeExpr,
    /// From a Yields section: rendered as `Generator[T, None, None]`.
    pub yields: bool,
}

/// @acp:summary "Successful build for one function"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationResult {
    /// `(args) -> returns`, without the `# type:` prefix.
    pub annotation_text: String,
    pub imports: BTreeSet<ImportStatement>,
    pub warnings: Vec<BuildWarning>,
}

impl AnnotationResult {
    pub fn type_comment(&self) -> String {
        format!("# type: {}", self.annotation_text)
    }
}

/// @acp:summary "Builds annotations for the functions of one file"
pub struct AnnotationBuilder<'a> {
    scope: &'a FileScope,
    registry: &'a TypeRegistry,
    policy: AnnotationPolicy,
}

impl<'a> AnnotationBuilder<'a> {
    pub fn new(scope: &'a FileScope, registry: &'a TypeRegistry, policy: AnnotationPolicy) -> Self {
        Self {
            scope,
            registry,
            policy,
        }
    }

    /// @acp:summary "Build the type comment and required imports for one function"
    pub fn build(&self, args: &[ArgTree], returns: Option<&ReturnTree>) -> Result<AnnotationResult, BuildError> {
        self.build_with_plan(args, returns, &ImportPlan::new())
    }

    /// Like [`build`](Self::build), for a function whose file already plans
    /// the imports in `claimed`. Names bound there keep their module.
    pub fn build_with_plan(
        &self,
        args: &[ArgTree],
        returns: Option<&ReturnTree>,
        claimed: &ImportPlan,
    ) -> Result<AnnotationResult, BuildError> {
        let mut warnings = Vec::new();

        let untyped: Vec<String> = args
            .iter()
            .filter(|a| a.expr.is_none())
            .map(|a| a.name.clone())
            .collect();
        if let Some(first) = untyped.first() {
            if !self.policy.allow_untyped_args {
                return Err(BuildErrorKind::MissingArgType { arg: first.clone() }.into());
            }
            warnings.push(BuildWarning::UntypedArgs { args: untyped.clone() });
        }

        let none = TypeExpr::none();
        let (return_expr, yields) = match returns {
            Some(tree) => (&tree.expr, tree.yields),
            None if self.policy.require_return_type => {
                return Err(BuildErrorKind::MissingReturnType.into());
            }
            None => {
                warnings.push(BuildWarning::MissingReturnType);
                (&none, false)
            }
        };

        let exprs: Vec<&TypeExpr> = args
            .iter()
            .filter_map(|a| a.expr.as_ref())
            .chain(std::iter::once(return_expr))
            .collect();
        for expr in &exprs {
            self.check_arity(expr)?;
        }

        let mut leaves: BTreeSet<NamePath> = exprs.iter().flat_map(|e| e.leaf_names()).collect();
        if yields {
            leaves.insert(vec![GENERATOR.to_string()]);
        }

        let mut imports = BTreeSet::new();
        let mut spellings: HashMap<NamePath, String> = HashMap::new();
        let mut resolved = resolve::resolve(&leaves, self.scope, self.registry);
        resolve::qualify_shared_names(&mut resolved, claimed, self.registry);
        for (path, requirement) in resolved {
            let dotted = requirement.dotted();
            match &requirement.status {
                ResolutionStatus::Satisfied => {}
                ResolutionStatus::NeedsImport => imports.extend(requirement.import.clone()),
                ResolutionStatus::Ambiguous { ambiguity } => match self.policy.import_collision_policy {
                    ImportCollisionPolicy::Import => imports.extend(requirement.import.clone()),
                    ImportCollisionPolicy::NoImport => warnings.push(BuildWarning::AmbiguousType {
                        name: dotted,
                        reason: ambiguity.to_string(),
                    }),
                    ImportCollisionPolicy::Fail => {
                        return Err(BuildErrorKind::AmbiguousType {
                            name: dotted,
                            reason: ambiguity.to_string(),
                        }
                        .into());
                    }
                },
                ResolutionStatus::Unresolved => match self.policy.unpathed_type_policy {
                    UnpathedTypePolicy::Ignore => {}
                    UnpathedTypePolicy::Warn => warnings.push(BuildWarning::UnresolvedType { name: dotted }),
                    UnpathedTypePolicy::Fail => {
                        return Err(BuildErrorKind::UnresolvedType { name: dotted }.into());
                    }
                },
            }
            spellings.insert(path, requirement.spelling());
        }

        let spell = |path: &[String]| spellings.get(path).cloned().unwrap_or_else(|| path.join("."));

        let rendered_args = if !args.is_empty() && untyped.len() == args.len() {
            "...".to_string()
        } else {
            args.iter()
                .map(|arg| {
                    let splat: String = arg.name.chars().take_while(|&c| c == '*').collect();
                    let annotation = match &arg.expr {
                        Some(expr) => expr.render_with(&spell),
                        None => ANY.to_string(),
                    };
                    format!("{}{}", splat, annotation)
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut rendered_return = return_expr.render_with(&spell);
        if yields {
            rendered_return = format!("{}[{}, None, None]", spell(&[GENERATOR.to_string()]), rendered_return);
        }

        Ok(AnnotationResult {
            annotation_text: format!("({}) -> {}", rendered_args, rendered_return),
            imports,
            warnings,
        })
    }

    fn check_arity(&self, expr: &TypeExpr) -> Result<(), BuildError> {
        match expr {
            TypeExpr::Name { .. } => Ok(()),
            TypeExpr::Subscript { base, args } => {
                if let TypeExpr::Name { path } = base.as_ref() {
                    if let Some(entry) = self.registry.lookup_path(path) {
                        if !entry.arity.accepts(args.len()) {
                            return Err(BuildErrorKind::ArityMismatch {
                                name: path.join("."),
                                expected: entry.arity.to_string(),
                                found: args.len(),
                            }
                            .into());
                        }
                    }
                }
                self.check_arity(base)?;
                args.iter().try_for_each(|arg| self.check_arity(arg))
            }
            TypeExpr::Union { members } => members.iter().try_for_each(|m| self.check_arity(m)),
            TypeExpr::Callable { params, returns } => {
                if let crate::types::CallableParams::List(params) = params {
                    params.iter().try_for_each(|p| self.check_arity(p))?;
                }
                self.check_arity(returns)
            }
            TypeExpr::Tuple { elements, .. } => elements.iter().try_for_each(|e| self.check_arity(e)),
        }
    }
}
