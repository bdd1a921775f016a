//! Build pipeline
//!
//! read document → extract blocks → dispatch → rewrite → persist

use anyhow::Context;
use minblock_core::assets;
use minblock_core::extractor::{DEFAULT_INLINE_TOKEN, Extractor};
use minblock_core::{Block, BlockError, Config, ProcessorRegistry, rewrite};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::fs::write_atomic;

/// Run settings shared read-only by all block tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory assets are read from and artifacts written to
    pub base_path: PathBuf,

    /// Where the rewritten document goes; `None` rewrites in place
    pub output_path: Option<PathBuf>,

    /// Output token that selects inline mode
    pub inline_token: String,

    /// Delete source assets of compiled blocks after the document is written
    pub remove_sources: bool,
}

impl Settings {
    /// Settings with defaults for everything but the base path
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            output_path: None,
            inline_token: DEFAULT_INLINE_TOKEN.to_string(),
            remove_sources: false,
        }
    }

    /// Settings for `document` taken from a configuration
    pub fn from_config(config: &Config, document: &Path) -> Self {
        Self {
            base_path: config.base_path_for(document),
            output_path: None,
            inline_token: config.inline_token.clone(),
            remove_sources: config.remove_sources,
        }
    }

    /// Write the rewritten document to `path` instead of in place
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Use a different inline token
    pub fn with_inline_token(mut self, token: impl Into<String>) -> Self {
        self.inline_token = token.into();
        self
    }

    /// Delete source assets after a successful build
    pub fn with_remove_sources(mut self, remove: bool) -> Self {
        self.remove_sources = remove;
        self
    }
}

/// Outcome of one run
#[derive(Debug)]
pub struct RunReport {
    /// Document that was read
    pub document: PathBuf,

    /// Where the document was written
    pub output_path: PathBuf,

    /// Whether anything was written
    pub written: bool,

    /// Final state of every block, in document order
    pub blocks: Vec<Block>,
}

impl RunReport {
    /// Number of compiled blocks
    pub fn compiled(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.compiled_output().is_some())
            .count()
    }

    /// Failed blocks with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&Block, &BlockError)> {
        self.blocks.iter().filter_map(|b| b.error().map(|e| (b, e)))
    }

    /// Number of failed blocks
    pub fn failed(&self) -> usize {
        self.failures().count()
    }
}

/// Runs a build over documents
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Arc<Settings>,
    registry: Arc<ProcessorRegistry>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Create a pipeline; the registry is read-only from here on
    pub fn new(settings: Settings, registry: ProcessorRegistry) -> Self {
        let registry = Arc::new(registry);
        let dispatcher = Dispatcher::new(Arc::clone(&registry), settings.base_path.clone());
        Self {
            settings: Arc::new(settings),
            registry,
            dispatcher,
        }
    }

    /// Run settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Extract blocks without processing them.
    ///
    /// Asset references are filled in for blocks with a registered processor.
    pub async fn scan(&self, document_path: impl AsRef<Path>) -> Result<Vec<Block>> {
        let document_path = document_path.as_ref();
        let document = read_document(document_path).await?;
        let mut blocks = self.extract(document_path, &document)?;
        for block in &mut blocks {
            if let Some(processor) = self.registry.lookup(&block.block_type) {
                block.asset_files = processor.extract_asset_references(&block.content);
            }
        }
        Ok(blocks)
    }

    /// Build one document.
    ///
    /// Fails only if the document cannot be read, its markers are
    /// malformed, or the result cannot be written. Block failures are
    /// reported in the returned [`RunReport`].
    pub async fn run(&self, document_path: impl AsRef<Path>) -> Result<RunReport> {
        let document_path = document_path.as_ref();
        let output_path = self
            .settings
            .output_path
            .clone()
            .unwrap_or_else(|| document_path.to_path_buf());

        let document = read_document(document_path).await?;
        let mut blocks = self.extract(document_path, &document)?;

        for block in &blocks {
            tracing::info!(
                "Found {} block[{}:{}] (output: {})",
                block.block_type,
                block.range.start,
                block.range.end,
                block.output.file_name().unwrap_or("inline")
            );
        }
        warn_shared_outputs(&blocks);

        if blocks.is_empty() {
            tracing::info!("No build blocks in {}", document_path.display());
            let written = output_path != document_path;
            if written {
                persist(&output_path, &document).await?;
            }
            return Ok(RunReport {
                document: document_path.to_path_buf(),
                output_path,
                written,
                blocks,
            });
        }

        self.dispatcher.process(&mut blocks).await;

        let rewritten = rewrite(&document, &blocks)
            .with_context(|| format!("Failed to rewrite {}", document_path.display()))?;
        persist(&output_path, &rewritten).await?;
        tracing::info!("Wrote {}", output_path.display());

        if self.settings.remove_sources {
            self.remove_sources(&blocks).await;
        }

        Ok(RunReport {
            document: document_path.to_path_buf(),
            output_path,
            written: true,
            blocks,
        })
    }

    fn extract(&self, document_path: &Path, document: &[u8]) -> Result<Vec<Block>> {
        Extractor::new(self.settings.inline_token.as_str())
            .extract(document)
            .with_context(|| format!("Failed to parse build blocks in {}", document_path.display()))
    }

    /// Delete sources of compiled blocks.
    ///
    /// Written artifacts and assets still referenced by a block that kept
    /// its original markup are never deleted.
    async fn remove_sources(&self, blocks: &[Block]) {
        let base_path = &self.settings.base_path;
        let mut keep: BTreeSet<PathBuf> = blocks
            .iter()
            .filter(|b| b.compiled_output().is_some())
            .filter_map(|b| b.output.file_name())
            .map(|name| assets::resolve(base_path, name))
            .collect();
        keep.extend(
            blocks
                .iter()
                .filter(|b| b.compiled_output().is_none())
                .flat_map(|b| b.asset_files.iter())
                .map(|asset| assets::resolve(base_path, asset)),
        );

        let sources: BTreeSet<&String> = blocks
            .iter()
            .filter(|b| b.compiled_output().is_some())
            .flat_map(|b| b.asset_files.iter())
            .filter(|asset| !keep.contains(&assets::resolve(base_path, asset)))
            .collect();
        let sources: Vec<String> = sources.into_iter().cloned().collect();

        let failed = assets::remove(base_path, &sources).await;
        tracing::info!(
            "Removed {} of {} source assets",
            sources.len() - failed.len(),
            sources.len()
        );
    }
}

async fn read_document(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn persist(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn warn_shared_outputs(blocks: &[Block]) {
    let mut seen = BTreeSet::new();
    for name in blocks.iter().filter_map(|b| b.output.file_name()) {
        if !seen.insert(name) {
            tracing::warn!("Several blocks write {}; the last one to finish wins", name);
        }
    }
}
