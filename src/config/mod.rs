//! @acp:module "Configuration"
//! @acp:summary "Project configuration loading and defaults"
//! @acp:domain cli
//! @acp:layer config
//!
//! Read from `.docsig.json`, or `.docsig.yaml` / `.docsig.yml`. The format is
//! chosen by file extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotate::{AnnotationPolicy, ImportCollisionPolicy, UnpathedTypePolicy};
use crate::error::{DocsigError, Result};

pub const DEFAULT_CONFIG_FILE: &str = ".docsig.json";

/// Looked up in order when no `--config` is given.
const CONFIG_CANDIDATES: &[&str] = &[".docsig.json", ".docsig.yaml", ".docsig.yml"];

/// @acp:summary "Main docsig configuration structure"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// File patterns to include (glob syntax)
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// File patterns to exclude (glob syntax)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Annotation policies
    #[serde(default)]
    pub annotate: AnnotateConfig,

    /// Recognised docstring section headers
    #[serde(default)]
    pub docstring: DocstringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            annotate: AnnotateConfig::default(),
            docstring: DocstringConfig::default(),
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Config {
    /// @acp:summary "Load config from a JSON or YAML file"
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if is_yaml(path) {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the explicit path when given (it must exist), otherwise the
    /// first config file found in the working directory, otherwise defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(DocsigError::Config(format!("config file not found: {}", path.display())));
            }
            return Self::load(path);
        }
        match CONFIG_CANDIDATES.iter().map(Path::new).find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

fn default_include() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        // Virtual environments
        "**/.venv/**".to_string(),
        "**/venv/**".to_string(),
        "**/.tox/**".to_string(),
        // Build outputs
        "**/build/**".to_string(),
        "**/dist/**".to_string(),
        "**/*.egg-info/**".to_string(),
        // Cache/temp
        "**/__pycache__/**".to_string(),
        "**/.mypy_cache/**".to_string(),
        "**/.pytest_cache/**".to_string(),
        // VCS
        "**/.git/**".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// @acp:summary "Annotation policy configuration"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateConfig {
    /// Annotate functions whose arguments are not all typed
    #[serde(default, rename = "allowUntypedArgs")]
    pub allow_untyped_args: bool,

    /// Refuse to annotate when the return type is missing
    #[serde(default, rename = "requireReturnType")]
    pub require_return_type: bool,

    /// What to do with names that might clash with existing bindings
    #[serde(default, rename = "importCollisionPolicy")]
    pub import_collision_policy: ImportCollisionPolicy,

    /// What to do with bare names that cannot be resolved
    #[serde(default, rename = "unpathedTypePolicy")]
    pub unpathed_type_policy: UnpathedTypePolicy,

    /// Remove the type text from docstrings once annotated
    #[serde(default = "default_true", rename = "stripDocstringTypes")]
    pub strip_docstring_types: bool,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            allow_untyped_args: false,
            require_return_type: false,
            import_collision_policy: ImportCollisionPolicy::default(),
            unpathed_type_policy: UnpathedTypePolicy::default(),
            strip_docstring_types: true,
        }
    }
}

impl AnnotateConfig {
    pub fn policy(&self) -> AnnotationPolicy {
        AnnotationPolicy {
            allow_untyped_args: self.allow_untyped_args,
            require_return_type: self.require_return_type,
            import_collision_policy: self.import_collision_policy,
            unpathed_type_policy: self.unpathed_type_policy,
        }
    }
}

fn default_args_sections() -> Vec<String> {
    ["Args", "Arguments", "Parameters", "Kwargs", "Keyword Args", "Keyword Arguments"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_returns_sections() -> Vec<String> {
    vec!["Returns".to_string(), "Return".to_string()]
}

fn default_yields_sections() -> Vec<String> {
    vec!["Yields".to_string(), "Yield".to_string()]
}

/// @acp:summary "Google-style docstring section names"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocstringConfig {
    #[serde(default = "default_args_sections", rename = "argsSections")]
    pub args_sections: Vec<String>,

    #[serde(default = "default_returns_sections", rename = "returnsSections")]
    pub returns_sections: Vec<String>,

    #[serde(default = "default_yields_sections", rename = "yieldsSections")]
    pub yields_sections: Vec<String>,
}

impl Default for DocstringConfig {
    fn default() -> Self {
        Self {
            args_sections: default_args_sections(),
            returns_sections: default_returns_sections(),
            yields_sections: default_yields_sections(),
        }
    }
}
