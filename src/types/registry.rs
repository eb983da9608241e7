//! @acp:module "Type Registry"
//! @acp:summary "Static table of builtin and typing names with their import source and arity"
//! @acp:domain types
//! @acp:layer data
//!
//! Built once on first use and shared read-only by every worker thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// How many subscript arguments a generic accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    AcceptsAny,
    /// `Exact(0)` marks a name that cannot be subscripted at all.
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::AcceptsAny => true,
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::AcceptsAny => write!(f, "any number of"),
            Arity::Exact(0) => write!(f, "no"),
            Arity::Exact(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// @acp:summary "Registry entry for a recognised type name"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredType {
    /// Module to import the name from; `None` for builtins.
    pub source_module: Option<&'static str>,
    pub arity: Arity,
}

impl RegisteredType {
    pub fn is_builtin(&self) -> bool {
        self.source_module.is_none()
    }
}

pub const TYPING_MODULE: &str = "typing";

/// Modules whose imports are grouped first in generated import blocks.
const STANDARD_TYPE_MODULES: &[&str] = &["typing", "typing_extensions", "collections.abc"];

// Value singletons are valid in annotations even though they are not classes.
const BUILTIN_SCALARS: &[&str] = &[
    "None",
    "NotImplemented",
    "object",
    "int",
    "float",
    "complex",
    "bool",
    "str",
    "bytes",
    "bytearray",
    "memoryview",
    "unicode",
    "long",
    "basestring",
    "range",
    "xrange",
    "slice",
    "property",
    "classmethod",
    "staticmethod",
    "super",
    "enumerate",
    "zip",
    "map",
    "filter",
    "reversed",
    "file",
    "BaseException",
    "Exception",
    "ArithmeticError",
    "AssertionError",
    "AttributeError",
    "EOFError",
    "EnvironmentError",
    "IOError",
    "ImportError",
    "IndexError",
    "KeyError",
    "KeyboardInterrupt",
    "LookupError",
    "MemoryError",
    "NameError",
    "NotImplementedError",
    "OSError",
    "OverflowError",
    "RuntimeError",
    "StopIteration",
    "SyntaxError",
    "SystemExit",
    "TypeError",
    "UnicodeError",
    "ValueError",
    "ZeroDivisionError",
    "Warning",
    "DeprecationWarning",
    "UserWarning",
];

const BUILTIN_GENERICS: &[(&str, Arity)] = &[
    ("list", Arity::Exact(1)),
    ("dict", Arity::Exact(2)),
    ("set", Arity::Exact(1)),
    ("frozenset", Arity::Exact(1)),
    ("type", Arity::Exact(1)),
    ("tuple", Arity::AcceptsAny),
];

const TYPING_NAMES: &[(&str, Arity)] = &[
    ("Any", Arity::Exact(0)),
    ("AnyStr", Arity::Exact(0)),
    ("Text", Arity::Exact(0)),
    ("NoReturn", Arity::Exact(0)),
    ("Hashable", Arity::Exact(0)),
    ("Sized", Arity::Exact(0)),
    ("SupportsInt", Arity::Exact(0)),
    ("SupportsFloat", Arity::Exact(0)),
    ("SupportsBytes", Arity::Exact(0)),
    ("TextIO", Arity::Exact(0)),
    ("BinaryIO", Arity::Exact(0)),
    ("NamedTuple", Arity::Exact(0)),
    ("Optional", Arity::Exact(1)),
    ("Union", Arity::AtLeast(1)),
    ("Tuple", Arity::AcceptsAny),
    ("Callable", Arity::Exact(2)),
    ("Generic", Arity::AtLeast(1)),
    ("Protocol", Arity::AcceptsAny),
    ("ClassVar", Arity::Exact(1)),
    ("Final", Arity::Exact(1)),
    ("Type", Arity::Exact(1)),
    ("List", Arity::Exact(1)),
    ("Set", Arity::Exact(1)),
    ("FrozenSet", Arity::Exact(1)),
    ("AbstractSet", Arity::Exact(1)),
    ("MutableSet", Arity::Exact(1)),
    ("Dict", Arity::Exact(2)),
    ("DefaultDict", Arity::Exact(2)),
    ("OrderedDict", Arity::Exact(2)),
    ("ChainMap", Arity::Exact(2)),
    ("Counter", Arity::Exact(1)),
    ("Deque", Arity::Exact(1)),
    ("Mapping", Arity::Exact(2)),
    ("MutableMapping", Arity::Exact(2)),
    ("Sequence", Arity::Exact(1)),
    ("MutableSequence", Arity::Exact(1)),
    ("Collection", Arity::Exact(1)),
    ("Container", Arity::Exact(1)),
    ("Iterable", Arity::Exact(1)),
    ("Iterator", Arity::Exact(1)),
    ("Reversible", Arity::Exact(1)),
    ("Generator", Arity::Exact(3)),
    ("AsyncGenerator", Arity::Exact(2)),
    ("AsyncIterable", Arity::Exact(1)),
    ("AsyncIterator", Arity::Exact(1)),
    ("Awaitable", Arity::Exact(1)),
    ("Coroutine", Arity::Exact(3)),
    ("ItemsView", Arity::Exact(2)),
    ("KeysView", Arity::Exact(1)),
    ("ValuesView", Arity::Exact(1)),
    ("MappingView", Arity::Exact(1)),
    ("ContextManager", Arity::Exact(1)),
    ("AsyncContextManager", Arity::Exact(1)),
    ("SupportsAbs", Arity::Exact(1)),
    ("SupportsRound", Arity::Exact(1)),
    ("IO", Arity::Exact(1)),
    ("Pattern", Arity::Exact(1)),
    ("Match", Arity::Exact(1)),
];

/// @acp:summary "Lookup table of names that need no import or a fixed one"
#[derive(Debug)]
pub struct TypeRegistry {
    entries: HashMap<&'static str, RegisteredType>,
}

static REGISTRY: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::build);

impl TypeRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        &REGISTRY
    }

    fn build() -> Self {
        let mut entries = HashMap::new();
        for name in BUILTIN_SCALARS {
            entries.insert(
                *name,
                RegisteredType {
                    source_module: None,
                    arity: Arity::Exact(0),
                },
            );
        }
        for (name, arity) in BUILTIN_GENERICS {
            entries.insert(
                *name,
                RegisteredType {
                    source_module: None,
                    arity: *arity,
                },
            );
        }
        for (name, arity) in TYPING_NAMES {
            entries.insert(
                *name,
                RegisteredType {
                    source_module: Some(TYPING_MODULE),
                    arity: *arity,
                },
            );
        }
        Self { entries }
    }

    /// @acp:summary "Look up a bare (single-segment) type name"
    pub fn lookup(&self, bare_name: &str) -> Option<RegisteredType> {
        self.entries.get(bare_name).copied()
    }

    /// Look up a path that names a registry entry: either a bare name or
    /// `typing.<Name>`.
    pub fn lookup_path(&self, path: &[String]) -> Option<RegisteredType> {
        match path {
            [name] => self.lookup(name),
            [module, name] if module == TYPING_MODULE => {
                self.lookup(name).filter(|entry| !entry.is_builtin())
            }
            _ => None,
        }
    }

    pub fn is_standard_module(&self, module: &str) -> bool {
        STANDARD_TYPE_MODULES.contains(&module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_need_no_import() {
        let registry = TypeRegistry::global();
        let int = registry.lookup("int").unwrap();
        assert!(int.is_builtin());
        assert_eq!(int.arity, Arity::Exact(0));
        assert!(registry.lookup("None").unwrap().is_builtin());
    }

    #[test]
    fn test_typing_generics_have_fixed_source() {
        let registry = TypeRegistry::global();
        let dict = registry.lookup("Dict").unwrap();
        assert_eq!(dict.source_module, Some("typing"));
        assert_eq!(dict.arity, Arity::Exact(2));
        assert_eq!(registry.lookup("Union").unwrap().arity, Arity::AtLeast(1));
        assert!(registry.lookup("Product").is_none());
    }

    #[test]
    fn test_lookup_path_accepts_typing_prefix() {
        let registry = TypeRegistry::global();
        let path = vec!["typing".to_string(), "List".to_string()];
        assert_eq!(registry.lookup_path(&path).unwrap().arity, Arity::Exact(1));

        let builtin_under_typing = vec!["typing".to_string(), "int".to_string()];
        assert!(registry.lookup_path(&builtin_under_typing).is_none());

        let other = vec!["pkg".to_string(), "List".to_string()];
        assert!(registry.lookup_path(&other).is_none());
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::AcceptsAny.accepts(0));
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(Arity::AtLeast(1).accepts(3));
        assert!(!Arity::AtLeast(1).accepts(0));
    }
}
