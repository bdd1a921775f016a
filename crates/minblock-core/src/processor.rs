//! Block processors and the processor registry
//!
//! A processor knows, for one block type, how to find the asset references
//! inside a block, which compiler to hand them to, and what markup replaces
//! the block afterwards.
//!
//! # Built-in Processors
//!
//! - `js` - `<script src="...">` references, replaced by one script tag
//! - `css` - `<link href="...">` references, replaced by one stylesheet link

use async_trait::async_trait;
use minijinja::{AutoEscape, Environment, context};
use regex::bytes::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::assets;
use crate::block::BlockError;
use crate::compiler::Compiler;
use crate::error::{Error, Result};

/// Asset reference pattern for `js` blocks
pub const JS_PATTERN: &str = r#"<script\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#;
/// File-reference markup for `js` blocks
pub const JS_REPLACEMENT: &str = r#"<script src="{{ file }}" type="text/javascript"></script>"#;
/// Inline markup for `js` blocks
pub const JS_INLINE_REPLACEMENT: &str = r#"<script type="text/javascript">{{ content }}</script>"#;

/// Asset reference pattern for `css` blocks
pub const CSS_PATTERN: &str = r#"<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#;
/// File-reference markup for `css` blocks
pub const CSS_REPLACEMENT: &str = r#"<link rel="stylesheet" href="{{ file }}">"#;
/// Inline markup for `css` blocks
pub const CSS_INLINE_REPLACEMENT: &str = "<style>{{ content }}</style>";

const REPLACEMENT_TEMPLATE: &str = "replacement";
const INLINE_TEMPLATE: &str = "inline_replacement";

/// Strategy for one block type
#[async_trait]
pub trait BlockProcessor: Send + Sync {
    /// Type tag this processor handles
    fn block_type(&self) -> &str;

    /// Asset references inside the block content, in document order
    fn extract_asset_references(&self, content: &[u8]) -> Vec<String>;

    /// Concatenate the assets under `base_path` and compile the result
    async fn compile(
        &self,
        assets: &[String],
        base_path: &Path,
    ) -> std::result::Result<Vec<u8>, BlockError>;

    /// Markup that references the artifact `output_filename`
    fn replacement_markup(&self, output_filename: &str) -> Result<String>;

    /// Markup that embeds compiled `content` directly
    fn inline_replacement_markup(&self, content: &str) -> Result<String>;
}

// ============================================================================
// Regex processor
// ============================================================================

/// Processor driven by a capture pattern and two markup templates.
///
/// The pattern's first capture group is the asset reference. Templates are
/// minijinja templates; `{{ file }}` is the artifact name and
/// `{{ content }}` the compiled output. No HTML escaping is applied.
pub struct RegexBlockProcessor {
    block_type: String,
    pattern: Regex,
    templates: Environment<'static>,
    compiler: Arc<dyn Compiler>,
}

impl std::fmt::Debug for RegexBlockProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexBlockProcessor")
            .field("block_type", &self.block_type)
            .field("pattern", &self.pattern.as_str())
            .field("compiler", &self.compiler.name())
            .finish()
    }
}

impl RegexBlockProcessor {
    /// Create a processor; fails on an invalid pattern or template
    pub fn new(
        block_type: impl Into<String>,
        pattern: &str,
        replacement: &str,
        inline_replacement: &str,
        compiler: Arc<dyn Compiler>,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        if pattern.captures_len() < 2 {
            return Err(Error::InvalidPattern {
                pattern: pattern.as_str().to_string(),
                message: "pattern needs a capture group for the asset reference".to_string(),
            });
        }

        let mut templates = Environment::new();
        templates.set_auto_escape_callback(|_| AutoEscape::None);
        templates.set_keep_trailing_newline(true);
        templates.add_template_owned(REPLACEMENT_TEMPLATE, replacement.to_string())?;
        templates.add_template_owned(INLINE_TEMPLATE, inline_replacement.to_string())?;

        Ok(Self {
            block_type: block_type.into(),
            pattern,
            templates,
            compiler,
        })
    }

    /// `js` processor: script `src=` references
    pub fn javascript(compiler: Arc<dyn Compiler>) -> Result<Self> {
        Self::new(
            "js",
            JS_PATTERN,
            JS_REPLACEMENT,
            JS_INLINE_REPLACEMENT,
            compiler,
        )
    }

    /// `css` processor: link `href=` references
    pub fn stylesheet(compiler: Arc<dyn Compiler>) -> Result<Self> {
        Self::new(
            "css",
            CSS_PATTERN,
            CSS_REPLACEMENT,
            CSS_INLINE_REPLACEMENT,
            compiler,
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        Ok(self.templates.get_template(name)?.render(ctx)?)
    }
}

#[async_trait]
impl BlockProcessor for RegexBlockProcessor {
    fn block_type(&self) -> &str {
        &self.block_type
    }

    fn extract_asset_references(&self, content: &[u8]) -> Vec<String> {
        self.pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            .collect()
    }

    async fn compile(
        &self,
        references: &[String],
        base_path: &Path,
    ) -> std::result::Result<Vec<u8>, BlockError> {
        for reference in references {
            tracing::debug!("Processing {} ...", reference);
        }
        let source = assets::concat(base_path, references).await?;

        tracing::debug!(
            "[{}] Compiling {} ({} bytes)",
            self.compiler.name(),
            self.block_type,
            source.len()
        );
        self.compiler
            .compile(source)
            .await
            .map_err(|e| BlockError::Compile {
                message: e.to_string(),
            })
    }

    fn replacement_markup(&self, output_filename: &str) -> Result<String> {
        self.render(REPLACEMENT_TEMPLATE, context! { file => output_filename })
    }

    fn inline_replacement_markup(&self, content: &str) -> Result<String> {
        self.render(INLINE_TEMPLATE, context! { content => content })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Lookup table from block type to processor.
///
/// Filled once before dispatch and shared read-only afterwards.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn BlockProcessor>>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `js` and `css` processors bound to `compiler`
    pub fn builtin(compiler: Arc<dyn Compiler>) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(RegexBlockProcessor::javascript(compiler.clone())?);
        registry.register(RegexBlockProcessor::stylesheet(compiler)?);
        Ok(registry)
    }

    /// Register a processor, replacing any previous one for the same type
    pub fn register(&mut self, processor: impl BlockProcessor + 'static) {
        self.register_arc(Arc::new(processor));
    }

    /// Register a shared processor
    pub fn register_arc(&mut self, processor: Arc<dyn BlockProcessor>) {
        let block_type = processor.block_type().to_string();
        if self.processors.insert(block_type.clone(), processor).is_some() {
            tracing::debug!("Replaced block processor for type {}", block_type);
        }
    }

    /// Processor for a block type
    pub fn lookup(&self, block_type: &str) -> Option<Arc<dyn BlockProcessor>> {
        self.processors.get(block_type).cloned()
    }

    /// Registered types, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
