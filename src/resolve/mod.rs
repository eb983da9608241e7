//! @acp:module "Import Resolver"
//! @acp:summary "Decide per leaf type name whether an import is needed, satisfied, ambiguous or unresolvable"
//! @acp:domain resolve
//! @acp:layer service
//!
//! Decision table for a leaf name:
//!
//! | leaf                                   | outcome                                  |
//! |----------------------------------------|------------------------------------------|
//! | bare, local class / type alias         | satisfied                                |
//! | bare, bound by one explicit import     | satisfied (ambiguous if star imports)    |
//! | bare, bound from several modules       | ambiguous                                |
//! | bare, builtin                          | satisfied                                |
//! | bare, `typing` name                    | needs `from typing import X`             |
//! | bare, anything else                    | unresolved                               |
//! | dotted, symbol imported from module    | satisfied, rendered bare                 |
//! | dotted, head already bound             | satisfied, rendered dotted               |
//! | dotted, symbol clashes with a binding  | ambiguous, forced `import module`        |
//! | dotted, module star-imported           | ambiguous, forced `from module import X` |
//! | dotted, otherwise                      | needs `from module import X`             |
//!
//! A bare spelling must name one type per file. When a name would be bound
//! from two modules, or would shadow a builtin, [`qualify_shared_names`]
//! turns the later claimant into `import module` with the dotted spelling.

pub mod imports;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::types::{NamePath, TypeRegistry};

pub use imports::{ImportPlan, ImportStatement};

/// `from module import name [as alias]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedName {
    pub module: String,
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// The name this import binds in the file's namespace.
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// `import module [as alias]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleImport {
    pub module: String,
    pub alias: Option<String>,
}

impl ModuleImport {
    /// The dotted prefix this import makes usable in annotations.
    pub fn bound_prefix(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.module)
    }
}

/// @acp:summary "Imports and local type definitions found in one source file"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileScope {
    pub imported_names: Vec<ImportedName>,
    pub module_imports: Vec<ModuleImport>,
    pub star_imports: BTreeSet<String>,
    pub local_definitions: BTreeSet<String>,
}

impl FileScope {
    /// Modules that bind `name`, in source order, without duplicates.
    fn binding_modules(&self, name: &str) -> Vec<&str> {
        let mut modules: Vec<&str> = Vec::new();
        for import in &self.imported_names {
            if import.bound_name() == name && !modules.contains(&import.module.as_str()) {
                modules.push(&import.module);
            }
        }
        modules
    }

    fn imports_symbol_from(&self, module: &str, symbol: &str) -> bool {
        self.imported_names
            .iter()
            .any(|i| i.module == module && i.name == symbol && i.bound_name() == symbol)
    }

    /// Whether the dotted module part of a path is already usable as written.
    fn binds_module_path(&self, module: &str) -> bool {
        self.module_imports.iter().any(|m| m.bound_prefix() == module)
            || self.imported_names.iter().any(|i| i.bound_name() == module)
    }

    pub fn has_module_import(&self, module: &str) -> bool {
        self.module_imports
            .iter()
            .any(|m| m.module == module && m.alias.is_none())
    }

    pub fn has_from_import(&self, module: &str, name: &str) -> bool {
        self.imports_symbol_from(module, name)
    }
}

/// Why a name cannot be resolved without a policy decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ambiguity {
    /// The module is star-imported, so the name may already be in scope.
    StarImport { module: String },
    /// A local class or type alias has the same name.
    LocalDefinition { name: String },
    /// The same name is imported through a relative import.
    RelativeImport { module: String },
    /// The same name is imported from another module.
    ConflictingImport { module: String },
    /// The bare name is bound by imports from several modules.
    MultipleBindings { modules: Vec<String> },
    /// Several leaves would bind the same bare name from different modules.
    SameNameDifferentModules { name: String, modules: Vec<String> },
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ambiguity::StarImport { module } => {
                write!(f, "module `{}` is star-imported", module)
            }
            Ambiguity::LocalDefinition { name } => {
                write!(f, "`{}` matches a local definition", name)
            }
            Ambiguity::RelativeImport { module } => {
                write!(f, "name is already imported from relative module `{}`", module)
            }
            Ambiguity::ConflictingImport { module } => {
                write!(f, "name is already imported from `{}`", module)
            }
            Ambiguity::MultipleBindings { modules } => {
                write!(f, "name is imported from several modules: {}", modules.join(", "))
            }
            Ambiguity::SameNameDifferentModules { name, modules } => {
                write!(f, "`{}` is wanted from several modules: {}", name, modules.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionStatus {
    Satisfied,
    NeedsImport,
    Ambiguous { ambiguity: Ambiguity },
    Unresolved,
}

/// How the leaf is spelled in the emitted annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRender {
    /// Last segment only, e.g. `Product`.
    Bare,
    /// The full dotted path as written.
    Dotted,
}

/// @acp:summary "Resolution of one distinct leaf name"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImportRequirement {
    pub path: NamePath,
    /// Last path segment.
    pub type_name: String,
    pub source_module: Option<String>,
    pub status: ResolutionStatus,
    /// Spelling when no policy intervenes.
    pub render: NameRender,
    /// Import to add when the status is `NeedsImport`, or when an ambiguous
    /// name is imported anyway.
    pub import: Option<ImportStatement>,
}

impl ImportRequirement {
    fn new(path: &[String], status: ResolutionStatus, render: NameRender) -> Self {
        let type_name = path.last().cloned().unwrap_or_default();
        let source_module = (path.len() > 1).then(|| path[..path.len() - 1].join("."));
        Self {
            path: path.to_vec(),
            type_name,
            source_module,
            status,
            render,
            import: None,
        }
    }

    fn with_import(mut self, import: ImportStatement) -> Self {
        self.source_module = Some(import.module().to_string());
        self.import = Some(import);
        self
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }

    pub fn spelling(&self) -> String {
        match (self.render, &self.source_module) {
            (NameRender::Bare, _) => self.type_name.clone(),
            (NameRender::Dotted, Some(module)) => format!("{}.{}", module, self.type_name),
            (NameRender::Dotted, None) => self.dotted(),
        }
    }

    /// Trade a `from module import X` for `import module` and spell the
    /// name through its module.
    fn qualify(&mut self, ambiguity: Ambiguity) {
        if let Some(module) = self.source_module.clone() {
            self.import = Some(ImportStatement::module_import(&module));
            self.render = NameRender::Dotted;
        }
        self.status = ResolutionStatus::Ambiguous { ambiguity };
    }

    /// The module this leaf's bare spelling is bound from, if it is spelled bare.
    fn bare_source(&self, registry: &TypeRegistry) -> Option<String> {
        if self.render != NameRender::Bare {
            return None;
        }
        if let Some(ImportStatement::From { module, .. }) = &self.import {
            return Some(module.clone());
        }
        match (self.path.as_slice(), &self.status) {
            ([_], ResolutionStatus::Unresolved) => None,
            ([name], _) => Some(
                registry
                    .lookup(name)
                    .and_then(|entry| entry.source_module)
                    .unwrap_or(BUILTINS_MODULE)
                    .to_string(),
            ),
            _ => self.source_module.clone(),
        }
    }
}

const BUILTINS_MODULE: &str = "builtins";

/// @acp:summary "Resolve every leaf name against the file's scope"
///
/// Pure function of its inputs; the result is keyed by leaf path so it is
/// ordered deterministically.
pub fn resolve<'a, I>(
    leaf_names: I,
    scope: &FileScope,
    registry: &TypeRegistry,
) -> BTreeMap<NamePath, ImportRequirement>
where
    I: IntoIterator<Item = &'a NamePath>,
{
    leaf_names
        .into_iter()
        .filter(|path| !path.is_empty())
        .map(|path| (path.clone(), resolve_name(path, scope, registry)))
        .collect()
}

/// @acp:summary "Keep each bare name bound to a single module across a file"
///
/// `claimed` holds the imports earlier functions of the same file already
/// committed to. A dotted leaf is qualified when another leaf of this set,
/// an earlier function or a builtin wants its bare name from elsewhere. A
/// leaf written bare keeps its spelling unless an earlier function claimed
/// the name.
pub fn qualify_shared_names(
    resolved: &mut BTreeMap<NamePath, ImportRequirement>,
    claimed: &ImportPlan,
    registry: &TypeRegistry,
) {
    let mut sources: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for requirement in resolved.values() {
        if let Some(source) = requirement.bare_source(registry) {
            sources
                .entry(requirement.type_name.clone())
                .or_default()
                .insert(source);
        }
    }

    for requirement in resolved.values_mut() {
        if requirement.render != NameRender::Bare {
            continue;
        }
        let Some(ImportStatement::From { module, name }) = requirement.import.clone() else {
            continue;
        };

        let mut modules = BTreeSet::from([module]);
        if requirement.path.len() > 1 {
            modules.extend(sources.get(&name).into_iter().flatten().cloned());
            if registry.lookup(&name).is_some_and(|entry| entry.is_builtin()) {
                modules.insert(BUILTINS_MODULE.to_string());
            }
        }
        if let Some(earlier) = claimed.bound_module(&name) {
            modules.insert(earlier.to_string());
        }

        if modules.len() > 1 {
            requirement.qualify(Ambiguity::SameNameDifferentModules {
                name,
                modules: modules.into_iter().collect(),
            });
        }
    }
}

/// Resolve a single leaf path.
pub fn resolve_name(path: &[String], scope: &FileScope, registry: &TypeRegistry) -> ImportRequirement {
    match path {
        [name] => resolve_bare(path, name, scope, registry),
        _ => resolve_dotted(path, scope),
    }
}

fn resolve_bare(path: &[String], name: &str, scope: &FileScope, registry: &TypeRegistry) -> ImportRequirement {
    if scope.local_definitions.contains(name) {
        return ImportRequirement::new(path, ResolutionStatus::Satisfied, NameRender::Bare);
    }

    let modules = scope.binding_modules(name);
    match modules.as_slice() {
        [] => {}
        [module] => {
            let Some(star) = scope.star_imports.iter().next() else {
                return ImportRequirement::new(path, ResolutionStatus::Satisfied, NameRender::Bare);
            };
            // an explicit binding next to a star import could be shadowed either way
            let status = ResolutionStatus::Ambiguous {
                ambiguity: Ambiguity::StarImport {
                    module: star.clone(),
                },
            };
            let mut requirement = ImportRequirement::new(path, status, NameRender::Bare);
            if !module.starts_with('.') {
                requirement = requirement.with_import(ImportStatement::from_import(module, name));
            }
            return requirement;
        }
        _ => {
            let status = ResolutionStatus::Ambiguous {
                ambiguity: Ambiguity::MultipleBindings {
                    modules: modules.iter().map(|m| m.to_string()).collect(),
                },
            };
            return ImportRequirement::new(path, status, NameRender::Bare);
        }
    }

    match registry.lookup(name) {
        Some(entry) => match entry.source_module {
            None => ImportRequirement::new(path, ResolutionStatus::Satisfied, NameRender::Bare),
            Some(module) if scope.star_imports.contains(module) => {
                ImportRequirement::new(path, ResolutionStatus::Satisfied, NameRender::Bare)
            }
            Some(module) => ImportRequirement::new(path, ResolutionStatus::NeedsImport, NameRender::Bare)
                .with_import(ImportStatement::from_import(module, name)),
        },
        None => ImportRequirement::new(path, ResolutionStatus::Unresolved, NameRender::Bare),
    }
}

fn resolve_dotted(path: &[String], scope: &FileScope) -> ImportRequirement {
    let module = path[..path.len() - 1].join(".");
    let symbol = &path[path.len() - 1];

    if scope.imports_symbol_from(&module, symbol) {
        return ImportRequirement::new(path, ResolutionStatus::Satisfied, NameRender::Bare);
    }
    if scope.binds_module_path(&module) {
        return ImportRequirement::new(path, ResolutionStatus::Satisfied, NameRender::Dotted);
    }

    let ambiguous = |ambiguity| ResolutionStatus::Ambiguous { ambiguity };
    let module_import = ImportStatement::module_import(&module);

    if scope.local_definitions.contains(symbol.as_str()) {
        return ImportRequirement::new(
            path,
            ambiguous(Ambiguity::LocalDefinition {
                name: symbol.clone(),
            }),
            NameRender::Dotted,
        )
        .with_import(module_import);
    }

    if let Some(other) = scope.binding_modules(symbol).first() {
        let ambiguity = if other.starts_with('.') {
            Ambiguity::RelativeImport {
                module: other.to_string(),
            }
        } else {
            Ambiguity::ConflictingImport {
                module: other.to_string(),
            }
        };
        return ImportRequirement::new(path, ambiguous(ambiguity), NameRender::Dotted).with_import(module_import);
    }

    if scope.star_imports.contains(&module) {
        return ImportRequirement::new(path, ambiguous(Ambiguity::StarImport { module: module.clone() }), NameRender::Bare)
            .with_import(ImportStatement::from_import(&module, symbol));
    }

    let head = &path[0];
    if scope.local_definitions.contains(head.as_str()) {
        // `Outer.Inner` nested class reference: nothing sensible to import
        return ImportRequirement::new(
            path,
            ambiguous(Ambiguity::LocalDefinition { name: head.clone() }),
            NameRender::Dotted,
        );
    }

    ImportRequirement::new(path, ResolutionStatus::NeedsImport, NameRender::Bare)
        .with_import(ImportStatement::from_import(&module, symbol))
}
