//! @acp:module "Source Introspection"
//! @acp:summary "Find documented functions, imports and local type definitions in Python source"
//! @acp:domain source
//! @acp:layer parser
//!
//! Uses tree-sitter-python. Syntax errors are tolerated: the tree is still
//! walked and whatever parsed cleanly is reported.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

use crate::error::{DocsigError, Result};
use crate::resolve::{FileScope, ImportedName, ModuleImport};

/// Callables whose assignment target is a type usable in annotations.
const TYPE_FACTORIES: &[&str] = &["TypeVar", "NamedTuple", "namedtuple", "TypedDict", "NewType", "type"];

const IMPORT_KINDS: &[&str] = &["import_statement", "import_from_statement", "future_import_statement"];

/// Where the docstring sits in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocstringLocation {
    /// Text between the quotes.
    pub body: Range<usize>,
    /// Offset of the start of the line holding the opening quotes.
    pub line_start: usize,
    /// Whitespace before the opening quotes.
    pub indent: String,
}

/// @acp:summary "A function definition that starts with a docstring"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    /// 1-based position of the `def` keyword.
    pub line: usize,
    pub column: usize,
    /// Parameter names in signature order with `*`/`**` prefixes; `self`
    /// and `cls` are left out.
    pub params: Vec<String>,
    pub docstring: DocstringLocation,
    /// Already has a `# type:` comment or signature annotations.
    pub already_annotated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionAnchor {
    AfterImports,
    AfterModuleDocstring,
    TopOfFile,
}

/// Where new import lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportInsertion {
    pub offset: usize,
    pub anchor: InsertionAnchor,
}

/// @acp:summary "Parsed view of one Python file"
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub scope: FileScope,
    pub functions: Vec<FunctionInfo>,
    pub import_insertion: ImportInsertion,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = String::from_utf8(fs::read(path)?)
            .map_err(|_| DocsigError::UnsupportedFile(format!("{} is not UTF-8 text", path.display())))?;
        Self::parse(path, text)
    }

    /// @acp:summary "Parse Python source text and extract everything annotation needs"
    pub fn parse(path: impl Into<PathBuf>, text: String) -> Result<Self> {
        let path = path.into();
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| DocsigError::Other(format!("Failed to load Python grammar: {}", e)))?;
        let tree = parser.parse(&text, None).ok_or_else(|| DocsigError::SourceParse {
            path: path.clone(),
            message: "parser produced no tree".to_string(),
        })?;

        let root = tree.root_node();
        if root.has_error() {
            warn!("{} has syntax errors, results may be incomplete", path.display());
        }

        let mut scope = FileScope::default();
        let mut functions = Vec::new();
        walk(root, |node| match node.kind() {
            "import_statement" => collect_module_imports(node, &text, &mut scope),
            "import_from_statement" => collect_from_import(node, &text, &mut scope),
            "class_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    scope.local_definitions.insert(node_text(name, &text).to_string());
                }
            }
            "assignment" => {
                if let Some(name) = type_factory_target(node, &text) {
                    scope.local_definitions.insert(name.to_string());
                }
            }
            "function_definition" => {
                if let Some(function) = documented_function(node, &text) {
                    functions.push(function);
                }
            }
            _ => {}
        });

        let import_insertion = find_import_insertion(root, &text);
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        debug!(
            "{}: {} documented functions, {} imports, {} local types",
            path.display(),
            functions.len(),
            scope.imported_names.len() + scope.module_imports.len(),
            scope.local_definitions.len()
        );

        Ok(Self {
            path,
            text,
            scope,
            functions,
            import_insertion,
            line_starts,
        })
    }

    /// 1-based line and column of a byte offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset).max(1);
        (line, offset - self.line_starts[line - 1] + 1)
    }
}

/// Pre-order walk in source order.
fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        visit(node);
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Dotted names may legally contain whitespace around the dots.
fn compact_text(node: Node<'_>, source: &str) -> String {
    node_text(node, source).split_whitespace().collect()
}

fn collect_module_imports(node: Node<'_>, source: &str, scope: &mut FileScope) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let import = match name.kind() {
            "aliased_import" => ModuleImport {
                module: name
                    .child_by_field_name("name")
                    .map(|n| compact_text(n, source))
                    .unwrap_or_default(),
                alias: name.child_by_field_name("alias").map(|a| node_text(a, source).to_string()),
            },
            _ => ModuleImport {
                module: compact_text(name, source),
                alias: None,
            },
        };
        scope.module_imports.push(import);
    }
}

fn collect_from_import(node: Node<'_>, source: &str, scope: &mut FileScope) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let module = compact_text(module_node, source);

    let mut cursor = node.walk();
    let is_star = node
        .children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import");
    if is_star {
        scope.star_imports.insert(module);
        return;
    }

    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let (name, alias) = match name.kind() {
            "aliased_import" => (
                name.child_by_field_name("name").map(|n| compact_text(n, source)),
                name.child_by_field_name("alias").map(|a| node_text(a, source).to_string()),
            ),
            _ => (Some(compact_text(name, source)), None),
        };
        if let Some(name) = name {
            scope.imported_names.push(ImportedName {
                module: module.clone(),
                name,
                alias,
            });
        }
    }
}

/// `T = TypeVar("T")`, `Point = namedtuple(...)`, `Alias = typing.NewType(...)`
fn type_factory_target<'a>(node: Node<'_>, source: &'a str) -> Option<&'a str> {
    let left = node.child_by_field_name("left")?;
    let right = node.child_by_field_name("right")?;
    if left.kind() != "identifier" || right.kind() != "call" {
        return None;
    }
    let function = right.child_by_field_name("function")?;
    let callee = match function.kind() {
        "identifier" => function,
        "attribute" => function.child_by_field_name("attribute")?,
        _ => return None,
    };
    TYPE_FACTORIES
        .contains(&node_text(callee, source))
        .then(|| node_text(left, source))
}

fn documented_function(node: Node<'_>, source: &str) -> Option<FunctionInfo> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();
    let parameters = node.child_by_field_name("parameters")?;
    let return_type = node.child_by_field_name("return_type");
    let body = node.child_by_field_name("body")?;

    let mut cursor = body.walk();
    let first_statement = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    if first_statement.kind() != "expression_statement" {
        return None;
    }
    let string = first_statement.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }

    let signature_end = return_type.unwrap_or(parameters);
    if string.start_position().row == signature_end.end_position().row {
        debug!("Skipping {}: docstring shares the line with the signature", name);
        return None;
    }

    let mut cursor = string.walk();
    let mut open = None;
    let mut close = None;
    for child in string.children(&mut cursor) {
        match child.kind() {
            "string_start" => open = Some(child.end_byte()),
            "string_end" => close = Some(child.start_byte()),
            _ => {}
        }
    }
    let body_range = open?..close?;

    let line_start = string.start_byte() - string.start_position().column;
    let indent = source[line_start..string.start_byte()].to_string();

    let (params, typed_params) = signature_params(parameters, source);
    let has_type_comment = source[signature_end.end_byte()..string.start_byte()].contains("# type:");

    Some(FunctionInfo {
        name,
        line: node.start_position().row + 1,
        column: node.start_position().column + 1,
        params,
        docstring: DocstringLocation {
            body: body_range,
            line_start,
            indent,
        },
        already_annotated: has_type_comment || typed_params || return_type.is_some(),
    })
}

/// Parameter names in order, and whether any carries an annotation.
fn signature_params(parameters: Node<'_>, source: &str) -> (Vec<String>, bool) {
    let mut names = Vec::new();
    let mut typed = false;
    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        let name = match param.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => Some(compact_text(param, source)),
            "default_parameter" => param.child_by_field_name("name").map(|n| compact_text(n, source)),
            "typed_parameter" => {
                typed = true;
                param.named_child(0).map(|n| compact_text(n, source))
            }
            "typed_default_parameter" => {
                typed = true;
                param.child_by_field_name("name").map(|n| compact_text(n, source))
            }
            // `*` and `/` separators, comments
            _ => None,
        };
        if let Some(name) = name.filter(|n| n != "self" && n != "cls") {
            names.push(name);
        }
    }
    (names, typed)
}

fn end_of_line(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map(|i| offset + i + 1)
        .unwrap_or(source.len())
}

/// After the first contiguous block of top-level imports, else after the
/// module docstring, else at the top (below any leading comments).
fn find_import_insertion(root: Node<'_>, source: &str) -> ImportInsertion {
    let mut cursor = root.walk();
    let statements: Vec<Node<'_>> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();

    if let Some(first) = statements.iter().position(|n| IMPORT_KINDS.contains(&n.kind())) {
        let last = statements[first..]
            .iter()
            .take_while(|n| IMPORT_KINDS.contains(&n.kind()))
            .last()
            .copied()
            .unwrap_or(statements[first]);
        return ImportInsertion {
            offset: end_of_line(source, last.end_byte()),
            anchor: InsertionAnchor::AfterImports,
        };
    }

    if let Some(first) = statements.first() {
        let is_docstring = first.kind() == "expression_statement"
            && first.named_child(0).is_some_and(|n| n.kind() == "string");
        if is_docstring {
            return ImportInsertion {
                offset: end_of_line(source, first.end_byte()),
                anchor: InsertionAnchor::AfterModuleDocstring,
            };
        }
    }

    let mut cursor = root.walk();
    let first_statement_start = statements.first().map(|n| n.start_byte()).unwrap_or(source.len());
    let offset = root
        .named_children(&mut cursor)
        .take_while(|n| n.kind() == "comment" && n.start_byte() < first_statement_start)
        .last()
        .map(|comment| end_of_line(source, comment.end_byte()))
        .unwrap_or(0);
    ImportInsertion {
        offset,
        anchor: InsertionAnchor::TopOfFile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn parse(text: &str) -> SourceFile {
        SourceFile::parse("test.py", text.to_string()).unwrap()
    }

    #[test]
    fn test_read_rejects_binary_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("blob.py");
        fs::write(&path, [0x64, 0x65, 0x66, 0xff, 0xfe]).unwrap();

        let err = SourceFile::read(&path).unwrap_err();
        assert!(matches!(err, DocsigError::UnsupportedFile(_)));
    }

    #[test]
    fn test_scope_extraction() {
        let file = parse(
            r#"
import os.path
import numpy as np
from typing import List, Dict as D
from .models import Product
from ..shop import *
from engine import models

T = TypeVar("T")
Point = collections.namedtuple("Point", "x y")
count = len([])

class Widget:
    class Inner:
        pass
"#,
        );
        let scope = &file.scope;
        assert_eq!(
            scope.module_imports,
            vec![
                ModuleImport {
                    module: "os.path".to_string(),
                    alias: None
                },
                ModuleImport {
                    module: "numpy".to_string(),
                    alias: Some("np".to_string())
                },
            ]
        );
        let names: Vec<(&str, &str, Option<&str>)> = scope
            .imported_names
            .iter()
            .map(|i| (i.module.as_str(), i.name.as_str(), i.alias.as_deref()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("typing", "List", None),
                ("typing", "Dict", Some("D")),
                (".models", "Product", None),
                ("engine", "models", None),
            ]
        );
        assert_eq!(scope.star_imports.iter().collect::<Vec<_>>(), vec!["..shop"]);
        assert_eq!(
            scope.local_definitions.iter().collect::<Vec<_>>(),
            vec!["Inner", "Point", "T", "Widget"]
        );
    }

    #[test]
    fn test_documented_functions() {
        let text = r#"
def no_doc(a):
    return a

class Shop:
    @staticmethod
    def price(self, item, *args, quantity=1, **kwargs):
        """Price an item."""
        return 0

    def keyword_only(cls, a, /, b, *, c=2):
        """Separators are not parameters."""

async def fetch(url):
    '''Fetch.'''

def one_liner(): """Same line."""
"#;
        let file = parse(text);
        let summary: Vec<(&str, Vec<String>)> = file
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.params.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("price", strings(&["item", "*args", "quantity", "**kwargs"])),
                ("keyword_only", strings(&["a", "b", "c"])),
                ("fetch", strings(&["url"])),
            ]
        );

        let price = &file.functions[0];
        assert_eq!(&file.text[price.docstring.body.clone()], "Price an item.");
        assert_eq!(price.docstring.indent, "        ");
        assert_eq!(price.line, 7);
        assert_eq!(price.column, 5);
        assert!(!price.already_annotated);
    }

    #[test]
    fn test_already_annotated_functions() {
        let text = r#"
def commented(a):
    # type: (int) -> None
    """Doc."""

def typed(a: int):
    """Doc."""

def returns() -> int:
    """Doc."""

def plain(a):
    """Doc."""
"#;
        let flags: Vec<bool> = parse(text).functions.iter().map(|f| f.already_annotated).collect();
        assert_eq!(flags, vec![true, true, true, false]);
    }

    #[test]
    fn test_import_insertion_after_imports() {
        let text = "\"\"\"Module.\"\"\"\nimport os\nfrom typing import List\n\nx = 1\nimport sys\n";
        let file = parse(text);
        assert_eq!(file.import_insertion.anchor, InsertionAnchor::AfterImports);
        assert_eq!(&text[..file.import_insertion.offset], "\"\"\"Module.\"\"\"\nimport os\nfrom typing import List\n");
    }

    #[test]
    fn test_import_insertion_after_docstring_or_top() {
        let text = "\"\"\"Module.\"\"\"\n\ndef f():\n    pass\n";
        let file = parse(text);
        assert_eq!(file.import_insertion.anchor, InsertionAnchor::AfterModuleDocstring);
        assert_eq!(file.import_insertion.offset, 14);

        let text = "#!/usr/bin/env python\n# coding: utf-8\n\ndef f():\n    pass\n";
        let file = parse(text);
        assert_eq!(file.import_insertion.anchor, InsertionAnchor::TopOfFile);
        assert_eq!(&text[file.import_insertion.offset..], "\ndef f():\n    pass\n");

        let file = parse("def f():\n    pass\n");
        assert_eq!(file.import_insertion.offset, 0);
    }

    #[test]
    fn test_position() {
        let file = parse("a = 1\nbb = 2\n");
        assert_eq!(file.position(0), (1, 1));
        assert_eq!(file.position(6), (2, 1));
        assert_eq!(file.position(8), (2, 3));
    }
}
