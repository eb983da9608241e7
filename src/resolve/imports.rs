//! @acp:module "Import Plan"
//! @acp:summary "Aggregate required imports for a file into ordered import lines"
//! @acp:domain resolve
//! @acp:layer service

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::FileScope;
use crate::types::TypeRegistry;

/// A single import the annotation needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ImportStatement {
    /// `import module`
    Module { module: String },
    /// `from module import name`
    From { module: String, name: String },
}

impl ImportStatement {
    pub fn module_import(module: &str) -> Self {
        ImportStatement::Module {
            module: module.to_string(),
        }
    }

    pub fn from_import(module: &str, name: &str) -> Self {
        ImportStatement::From {
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    pub fn module(&self) -> &str {
        match self {
            ImportStatement::Module { module } | ImportStatement::From { module, .. } => module,
        }
    }

    fn already_in(&self, scope: &FileScope) -> bool {
        match self {
            ImportStatement::Module { module } => scope.has_module_import(module),
            ImportStatement::From { module, name } => scope.has_from_import(module, name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PlannedModule {
    bare_import: bool,
    names: BTreeSet<String>,
}

/// @acp:summary "Deduplicated set of imports to add to one file"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    modules: BTreeMap<String, PlannedModule>,
}

impl ImportPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, statement: &ImportStatement) {
        let entry = self.modules.entry(statement.module().to_string()).or_default();
        match statement {
            ImportStatement::Module { .. } => entry.bare_import = true,
            ImportStatement::From { name, .. } => {
                entry.names.insert(name.clone());
            }
        }
    }

    /// The module a planned `from module import name` binds `name` from.
    pub fn bound_module(&self, name: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|(_, planned)| planned.names.contains(name))
            .map(|(module, _)| module.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Render import lines, leaving out anything the file already imports.
    ///
    /// Standard typing modules come first, then the rest sorted by module
    /// path. Within a module `import m` precedes `from m import ...`, and
    /// imported names are sorted, so repeated runs produce identical text.
    pub fn render(&self, scope: &FileScope, registry: &TypeRegistry) -> Vec<String> {
        let (standard, other): (Vec<_>, Vec<_>) = self
            .modules
            .iter()
            .partition(|(module, _)| registry.is_standard_module(module));

        let mut lines = Vec::new();
        for (module, planned) in standard.into_iter().chain(other) {
            if planned.bare_import && !ImportStatement::module_import(module).already_in(scope) {
                lines.push(format!("import {}", module));
            }
            let names: Vec<&str> = planned
                .names
                .iter()
                .filter(|name| !ImportStatement::from_import(module, name).already_in(scope))
                .map(String::as_str)
                .collect();
            if !names.is_empty() {
                lines.push(format!("from {} import {}", module, names.join(", ")));
            }
        }
        lines
    }
}

impl<'a> Extend<&'a ImportStatement> for ImportPlan {
    fn extend<T: IntoIterator<Item = &'a ImportStatement>>(&mut self, iter: T) {
        for statement in iter {
            self.add(statement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{ImportedName, ModuleImport};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_orders_typing_first() {
        let mut plan = ImportPlan::new();
        plan.extend(&[
            ImportStatement::from_import("zoo.animals", "Cat"),
            ImportStatement::from_import("typing", "List"),
            ImportStatement::from_import("engine.models", "Product"),
            ImportStatement::from_import("typing", "Dict"),
            ImportStatement::module_import("engine.models"),
            ImportStatement::from_import("typing", "List"),
        ]);

        let lines = plan.render(&FileScope::default(), TypeRegistry::global());
        assert_eq!(
            lines,
            vec![
                "from typing import Dict, List",
                "import engine.models",
                "from engine.models import Product",
                "from zoo.animals import Cat",
            ]
        );
    }

    #[test]
    fn test_render_skips_existing_imports() {
        let scope = FileScope {
            imported_names: vec![ImportedName {
                module: "typing".to_string(),
                name: "List".to_string(),
                alias: None,
            }],
            module_imports: vec![ModuleImport {
                module: "engine.models".to_string(),
                alias: None,
            }],
            ..Default::default()
        };
        let mut plan = ImportPlan::new();
        plan.add(&ImportStatement::from_import("typing", "List"));
        plan.add(&ImportStatement::from_import("typing", "Dict"));
        plan.add(&ImportStatement::module_import("engine.models"));

        assert_eq!(plan.render(&scope, TypeRegistry::global()), vec!["from typing import Dict"]);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ImportPlan::new();
        assert!(plan.is_empty());
        assert!(plan.render(&FileScope::default(), TypeRegistry::global()).is_empty());
    }
}
