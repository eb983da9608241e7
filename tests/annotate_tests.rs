//! End-to-end annotation tests
//!
//! Python sources are written to temporary directories, annotated through
//! the public API and read back.

use std::fs;
use std::path::PathBuf;

use docsig::annotate::{write_file, FunctionOutcome};
use docsig::commands::discover_files;
use docsig::{AnnotateConfig, Annotator, Config, DiagnosticCode, DocstringConfig, ImportCollisionPolicy, Severity};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn annotator(config: &AnnotateConfig) -> Annotator {
    Annotator::new(config, &DocstringConfig::default()).unwrap()
}

fn write_module(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

const INVENTORY: &str = r#""""Inventory helpers."""
from typing import List


class Store(object):
    def find(self, name, limit=10):
        """Find products.

        Args:
            name (str): Product name.
            limit (int): Max results.

        Returns:
            List[engine.models.Product]: Matches.
        """
        return []


def names(products):
    """Names.

    Args:
        products (Iterable[engine.models.Product]): Products.

    Yields:
        str: Each name.
    """
    for p in products:
        yield p.name
"#;

const INVENTORY_ANNOTATED: &str = r#""""Inventory helpers."""
from typing import List
from typing import Generator, Iterable
from engine.models import Product


class Store(object):
    def find(self, name, limit=10):
        # type: (str, int) -> List[Product]
        """Find products.

        Args:
            name: Product name.
            limit: Max results.

        Returns:
            Matches.
        """
        return []


def names(products):
    # type: (Iterable[Product]) -> Generator[str, None, None]
    """Names.

    Args:
        products: Products.

    Yields:
        Each name.
    """
    for p in products:
        yield p.name
"#;

// =============================================================================
// Whole-file annotation
// =============================================================================

mod whole_file {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_annotate_write_and_rerun() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "inventory.py", INVENTORY);
        let annotator = annotator(&AnnotateConfig::default());

        let report = annotator.annotate_path(&path).unwrap();
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(report.stats.annotated, 2);
        assert_eq!(
            report.import_lines,
            vec!["from typing import Generator, Iterable", "from engine.models import Product"]
        );
        assert_eq!(report.annotated_source(), INVENTORY_ANNOTATED);

        write_file(&path, &report.annotated_source()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), INVENTORY_ANNOTATED);

        // a second run finds nothing left to do
        let rerun = annotator.annotate_path(&path).unwrap();
        assert!(!rerun.has_changes());
        assert!(rerun
            .functions
            .iter()
            .all(|f| f.outcome == FunctionOutcome::AlreadyAnnotated));
    }

    #[test]
    fn test_diff_preview() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "inventory.py", INVENTORY);
        let report = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();

        let diff = report.diff();
        assert!(diff.contains("+from engine.models import Product\n"));
        assert!(diff.contains("+        # type: (str, int) -> List[Product]\n"));
        assert!(diff.contains("-            name (str): Product name.\n"));
        // nothing is written until asked
        assert_eq!(fs::read_to_string(&path).unwrap(), INVENTORY);
    }

    #[test]
    fn test_imports_follow_module_docstring() {
        let dir = TempDir::new().unwrap();
        let text = "\"\"\"Doc.\"\"\"\n\ndef f(a):\n    \"\"\"F.\n\n    Args:\n        a (Dict[str, int]): A.\n\n    Returns:\n        bool: B.\n    \"\"\"\n";
        let path = write_module(&dir, "m.py", text);
        let report = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();
        assert_eq!(
            report.annotated_source(),
            "\"\"\"Doc.\"\"\"\n\nfrom typing import Dict\n\ndef f(a):\n    # type: (Dict[str, int]) -> bool\n    \"\"\"F.\n\n    Args:\n        a: A.\n\n    Returns:\n        B.\n    \"\"\"\n"
        );
    }

    #[test]
    fn test_star_import_of_typing_needs_no_import() {
        let dir = TempDir::new().unwrap();
        let text = "from typing import *\n\n\ndef f(a):\n    \"\"\"F.\n\n    Args:\n        a (List[int]): A.\n\n    Returns:\n        Optional[str]: S.\n    \"\"\"\n";
        let path = write_module(&dir, "m.py", text);
        let report = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();
        assert!(report.import_lines.is_empty());
        assert_eq!(
            report.functions[0].outcome,
            FunctionOutcome::Annotated {
                type_comment: "# type: (List[int]) -> Union[str, None]".to_string()
            }
        );
    }
}

// =============================================================================
// Policies
// =============================================================================

mod policies {
    use super::*;
    use pretty_assertions::assert_eq;

    const COLLISION: &str = r#"from other import Product


def take(p):
    """Take.

    Args:
        p (zoo.Product): P.

    Returns:
        None: Nothing.
    """


def count(items):
    """Count.

    Args:
        items (List[int]): Items.

    Returns:
        int: How many.
    """
"#;

    #[test]
    fn test_collision_imports_module_by_default() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "m.py", COLLISION);
        let report = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();
        assert!(!report.has_errors());
        assert_eq!(report.import_lines, vec!["from typing import List", "import zoo"]);
        assert!(report
            .annotated_source()
            .contains("    # type: (zoo.Product) -> None\n"));
    }

    #[test]
    fn test_collision_without_import_warns() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "m.py", COLLISION);
        let config = AnnotateConfig {
            import_collision_policy: ImportCollisionPolicy::NoImport,
            ..Default::default()
        };
        let report = annotator(&config).annotate_path(&path).unwrap();
        assert_eq!(report.import_lines, vec!["from typing import List"]);
        assert_eq!(report.stats.annotated, 2);
        let warning = &report.diagnostics[0];
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.code, DiagnosticCode::AmbiguousType);
        assert_eq!(warning.function, "take");
    }

    #[test]
    fn test_collision_failure_is_scoped_to_function() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "m.py", COLLISION);
        let config = AnnotateConfig {
            import_collision_policy: ImportCollisionPolicy::Fail,
            ..Default::default()
        };
        let report = annotator(&config).annotate_path(&path).unwrap();
        assert!(report.has_errors());
        assert_eq!(report.functions[0].outcome, FunctionOutcome::Failed);
        assert_eq!(
            report.functions[1].outcome,
            FunctionOutcome::Annotated {
                type_comment: "# type: (List[int]) -> int".to_string()
            }
        );
        assert_eq!(report.import_lines, vec!["from typing import List"]);
    }

    const SAME_NAME_ONE_FUNCTION: &str = r#"def move(a, b):
    """Move stock between catalogues.

    Args:
        a (shop.Product): Current item.
        b (legacy.Product): Old item.

    Returns:
        None: Nothing.
    """
"#;

    const SAME_NAME_TWO_FUNCTIONS: &str = r#"def f(p):
    """F.

    Args:
        p (shop.Product): Current item.

    Returns:
        None: Nothing.
    """


def g(p):
    """G.

    Args:
        p (legacy.Product): Old item.

    Returns:
        None: Nothing.
    """
"#;

    #[test]
    fn test_same_name_in_one_function_is_qualified() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "m.py", SAME_NAME_ONE_FUNCTION);
        let report = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();

        assert!(!report.has_errors());
        let annotated = report.annotated_source();
        assert!(annotated.contains("    # type: (shop.Product, legacy.Product) -> None\n"));
        assert!(!annotated.contains("(Product, Product)"));
        assert_eq!(report.import_lines, vec!["import legacy", "import shop"]);
    }

    #[test]
    fn test_same_name_across_functions_is_qualified() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "m.py", SAME_NAME_TWO_FUNCTIONS);
        let report = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();

        assert_eq!(report.import_lines, vec!["import legacy", "from shop import Product"]);
        assert_eq!(
            report.functions.iter().map(|f| f.outcome.clone()).collect::<Vec<_>>(),
            vec![
                FunctionOutcome::Annotated {
                    type_comment: "# type: (Product) -> None".to_string()
                },
                FunctionOutcome::Annotated {
                    type_comment: "# type: (legacy.Product) -> None".to_string()
                },
            ]
        );

        let config = AnnotateConfig {
            import_collision_policy: ImportCollisionPolicy::Fail,
            ..Default::default()
        };
        let strict = annotator(&config).annotate_path(&path).unwrap();
        assert_eq!(strict.functions[1].outcome, FunctionOutcome::Failed);
        assert_eq!(strict.diagnostics[0].code, DiagnosticCode::AmbiguousType);
        assert_eq!(strict.import_lines, vec!["from shop import Product"]);
    }

    #[test]
    fn test_untyped_args() {
        let dir = TempDir::new().unwrap();
        let text = "def f(a, b):\n    \"\"\"F.\n\n    Args:\n        a (int): A.\n        b: B.\n\n    Returns:\n        int: N.\n    \"\"\"\n";
        let path = write_module(&dir, "m.py", text);

        let strict = annotator(&AnnotateConfig::default()).annotate_path(&path).unwrap();
        assert_eq!(strict.diagnostics[0].code, DiagnosticCode::MissingArgType);
        assert!(!strict.has_changes());

        let loose = annotator(&AnnotateConfig {
            allow_untyped_args: true,
            ..Default::default()
        })
        .annotate_path(&path)
        .unwrap();
        assert!(loose.annotated_source().contains("    # type: (int, Any) -> int\n"));
        assert!(loose.import_lines.is_empty());
        assert_eq!(loose.diagnostics[0].code, DiagnosticCode::UntypedArgs);
    }

    #[test]
    fn test_required_return_type() {
        let dir = TempDir::new().unwrap();
        let text = "def f(a):\n    \"\"\"F.\n\n    Args:\n        a (int): A.\n    \"\"\"\n";
        let path = write_module(&dir, "m.py", text);
        let config = AnnotateConfig {
            require_return_type: true,
            ..Default::default()
        };
        let report = annotator(&config).annotate_path(&path).unwrap();
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::MissingReturnType);
        assert!(report.has_errors());
    }
}

// =============================================================================
// Configuration and discovery
// =============================================================================

mod discovery {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_yaml_config_excludes_files() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(".docsig.yaml");
        fs::write(
            &config_path,
            "exclude:\n  - \"legacy/**\"\nannotate:\n  unpathedTypePolicy: warn\n",
        )
        .unwrap();
        let config = Config::discover(Some(&config_path)).unwrap();
        assert_eq!(config.annotate.unpathed_type_policy, docsig::UnpathedTypePolicy::Warn);

        write_module(&dir, "app/main.py", "");
        write_module(&dir, "legacy/old.py", "");
        write_module(&dir, "app/notes.txt", "");

        let files = discover_files(&[dir.path().to_path_buf()], &config).unwrap();
        assert_eq!(files, vec![dir.path().join("app/main.py")]);
    }

    #[test]
    fn test_custom_section_names() {
        let dir = TempDir::new().unwrap();
        let text = "def f(a):\n    \"\"\"F.\n\n    Params:\n        a (int): A.\n\n    Gives:\n        str: S.\n    \"\"\"\n";
        let path = write_module(&dir, "m.py", text);
        let docstring = DocstringConfig {
            args_sections: vec!["Params".to_string()],
            returns_sections: vec!["Gives".to_string()],
            ..Default::default()
        };
        let annotator = Annotator::new(&AnnotateConfig::default(), &docstring).unwrap();
        let report = annotator.annotate_path(&path).unwrap();
        assert!(report.annotated_source().contains("    # type: (int) -> str\n"));
    }
}
