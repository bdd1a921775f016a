//! Configuration parsing and validation
//!
//! Configuration is optional. Without a file the built-in `js` and `css`
//! processors are used with the passthrough compiler.
//!
//! # Configuration File
//!
//! ```yaml
//! base_path: "public"
//! inline_token: "@inline"
//! remove_sources: false
//! compiler:
//!   kind: passthrough
//! processors:
//!   js:
//!     compiler:
//!       kind: command
//!       program: terser
//!       args: ["-c", "-m"]
//!   svg:
//!     pattern: '<img[^>]*?src="([^"]+)"'
//!     replacement: '<img src="{{ file }}">'
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::compiler::CompilerConfig;
use crate::error::{Error, Result};
use crate::extractor::DEFAULT_INLINE_TOKEN;
use crate::processor::{
    CSS_INLINE_REPLACEMENT, CSS_PATTERN, CSS_REPLACEMENT, JS_INLINE_REPLACEMENT, JS_PATTERN,
    JS_REPLACEMENT, ProcessorRegistry, RegexBlockProcessor,
};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "minblock.yaml";

const DEFAULT_INLINE_TEMPLATE: &str = "{{ content }}";

/// Root configuration from `minblock.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Directory assets are read from and artifacts written to.
    /// Defaults to the directory of the document.
    #[serde(default)]
    pub base_path: Option<PathBuf>,

    /// Output token that selects inline mode
    #[serde(default = "default_inline_token")]
    pub inline_token: String,

    /// Delete source assets of successfully compiled blocks
    #[serde(default)]
    pub remove_sources: bool,

    /// Compiler used by processors that do not configure their own
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Processor overrides and additions, keyed by block type
    #[serde(default)]
    pub processors: BTreeMap<String, ProcessorConfig>,
}

fn default_inline_token() -> String {
    DEFAULT_INLINE_TOKEN.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: None,
            inline_token: default_inline_token(),
            remove_sources: false,
            compiler: CompilerConfig::default(),
            processors: BTreeMap::new(),
        }
    }
}

/// Processor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProcessorConfig {
    /// Asset reference pattern; the first capture group is the reference
    #[serde(default)]
    pub pattern: Option<String>,

    /// File-reference markup template (`{{ file }}`)
    #[serde(default)]
    pub replacement: Option<String>,

    /// Inline markup template (`{{ content }}`)
    #[serde(default)]
    pub inline_replacement: Option<String>,

    /// Compiler for this block type
    #[serde(default)]
    pub compiler: Option<CompilerConfig>,
}

struct Builtin {
    pattern: &'static str,
    replacement: &'static str,
    inline_replacement: &'static str,
}

fn builtin(block_type: &str) -> Option<Builtin> {
    match block_type {
        "js" => Some(Builtin {
            pattern: JS_PATTERN,
            replacement: JS_REPLACEMENT,
            inline_replacement: JS_INLINE_REPLACEMENT,
        }),
        "css" => Some(Builtin {
            pattern: CSS_PATTERN,
            replacement: CSS_REPLACEMENT,
            inline_replacement: CSS_INLINE_REPLACEMENT,
        }),
        _ => None,
    }
}

const BUILTIN_TYPES: [&str; 2] = ["css", "js"];

impl Config {
    /// Load configuration from a file.
    ///
    /// A relative `base_path` is resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        if let Some(base) = config.base_path.as_mut()
            && base.is_relative()
        {
            let dir = path.parent().unwrap_or(Path::new("."));
            *base = dir.join(&*base);
        }

        Ok(config)
    }

    /// Load an explicitly named file, or the default file if it exists.
    ///
    /// Only a missing default file falls back to built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.inline_token.is_empty() || self.inline_token.chars().any(char::is_whitespace) {
            return Err(Error::ConfigInvalid {
                message: format!(
                    "inline_token '{}' must be a non-empty token without whitespace",
                    self.inline_token
                ),
            });
        }
        if let Some(name) = self.processors.keys().find(|name| {
            name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_')
        }) {
            return Err(Error::ConfigInvalid {
                message: format!("processor type '{}' must be a word (letters, digits, _)", name),
            });
        }
        Ok(())
    }

    /// Base path for a document, falling back to the document's directory
    pub fn base_path_for(&self, document: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) => base.clone(),
            None => document
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf(),
        }
    }

    /// Build the processor registry: built-ins merged with configured entries
    pub fn build_registry(&self) -> Result<ProcessorRegistry> {
        let default_compiler = self.compiler.build();
        let types: BTreeSet<&str> = BUILTIN_TYPES
            .iter()
            .copied()
            .chain(self.processors.keys().map(String::as_str))
            .collect();

        let mut registry = ProcessorRegistry::new();
        let empty = ProcessorConfig::default();

        for block_type in types {
            let configured = self.processors.get(block_type).unwrap_or(&empty);
            let fallback = builtin(block_type);

            let pattern = configured
                .pattern
                .as_deref()
                .or(fallback.as_ref().map(|b| b.pattern))
                .ok_or_else(|| missing(block_type, "pattern"))?;
            let replacement = configured
                .replacement
                .as_deref()
                .or(fallback.as_ref().map(|b| b.replacement))
                .ok_or_else(|| missing(block_type, "replacement"))?;
            let inline_replacement = configured
                .inline_replacement
                .as_deref()
                .or(fallback.as_ref().map(|b| b.inline_replacement))
                .unwrap_or(DEFAULT_INLINE_TEMPLATE);
            let compiler = configured
                .compiler
                .as_ref()
                .map(CompilerConfig::build)
                .unwrap_or_else(|| default_compiler.clone());

            tracing::debug!(
                "Registering {} processor (compiler: {})",
                block_type,
                compiler.name()
            );
            registry.register(RegexBlockProcessor::new(
                block_type,
                pattern,
                replacement,
                inline_replacement,
                compiler,
            )?);
        }

        Ok(registry)
    }
}

fn missing(block_type: &str, field: &str) -> Error {
    Error::ConfigInvalid {
        message: format!("processor '{}' needs a {}", block_type, field),
    }
}

/// Commented starter configuration written by `minblock init`
pub fn starter_config() -> &'static str {
    r#"# minblock configuration

# Directory assets are read from and artifacts written to.
# Defaults to the directory of the HTML document.
# base_path: "public"

# Output token that embeds the compiled result instead of writing a file:
#   <!-- build:css @inline --> ... <!-- endbuild -->
inline_token: "@inline"

# Delete source assets after their block compiled successfully
remove_sources: false

# Default compiler: passthrough bundles without minifying
compiler:
  kind: passthrough

processors:
  js:
    compiler:
      kind: passthrough
      # kind: command
      # program: terser
      # args: ["--compress", "--mangle"]
  css:
    compiler:
      kind: passthrough
      # kind: command
      # program: csso
"#
}
