//! Concurrent block dispatch
//!
//! Every block gets its own task. All tasks are spawned before any is
//! awaited and the coordinator joins them all before returning, so the
//! rewriter always sees final block states. Tasks work on their own copy of
//! a block and share only read-only state (the registry and base path).

use futures::future::join_all;
use minblock_core::assets;
use minblock_core::{Block, BlockError, BlockOutput, BlockProcessor, BlockState, ProcessorRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fork-join coordinator for block processing
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ProcessorRegistry>,
    base_path: Arc<PathBuf>,
}

impl Dispatcher {
    /// Create a dispatcher reading assets from and writing artifacts to `base_path`
    pub fn new(registry: Arc<ProcessorRegistry>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            base_path: Arc::new(base_path.into()),
        }
    }

    /// Process all blocks concurrently and record each outcome in place.
    ///
    /// Never fails as a whole: per-block errors end up in `Block::state`.
    pub async fn process(&self, blocks: &mut [Block]) {
        let handles: Vec<_> = blocks
            .iter()
            .map(|block| {
                let job = block.clone();
                let registry = Arc::clone(&self.registry);
                let base_path = Arc::clone(&self.base_path);
                tokio::spawn(async move { process_block(job, &registry, &base_path).await })
            })
            .collect();

        let results = join_all(handles).await;

        for (block, result) in blocks.iter_mut().zip(results) {
            match result {
                Ok(done) => *block = done,
                Err(e) => {
                    tracing::error!(
                        "{} block [{}:{}] task failed: {}",
                        block.block_type,
                        block.range.start,
                        block.range.end,
                        e
                    );
                    block.fail(BlockError::TaskPanicked {
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

async fn process_block(mut block: Block, registry: &ProcessorRegistry, base_path: &Path) -> Block {
    let Some(processor) = registry.lookup(&block.block_type) else {
        tracing::warn!(
            "No block processor registered for type {}",
            block.block_type
        );
        block.fail(BlockError::NoProcessor {
            block_type: block.block_type.clone(),
        });
        return block;
    };

    block.asset_files = processor.extract_asset_references(&block.content);

    match compile_block(&block, processor.as_ref(), base_path).await {
        Ok(state) => block.state = state,
        Err(e) => {
            tracing::warn!(
                "Failed to process {} block [{}:{}]: {}",
                block.block_type,
                block.range.start,
                block.range.end,
                e
            );
            block.fail(e);
        }
    }
    block
}

async fn compile_block(
    block: &Block,
    processor: &dyn BlockProcessor,
    base_path: &Path,
) -> Result<BlockState, BlockError> {
    let output = processor.compile(&block.asset_files, base_path).await?;

    let replacement = match &block.output {
        BlockOutput::File(name) => {
            let replacement = processor.replacement_markup(name).map_err(render_error)?;
            let path = assets::resolve(base_path, name);
            crate::fs::write_atomic(&path, &output)
                .await
                .map_err(|e| BlockError::ArtifactWrite {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            tracing::info!(
                "Writing {} ({} assets, {} bytes) to {}",
                block.block_type,
                block.asset_files.len(),
                output.len(),
                path.display()
            );
            replacement
        }
        BlockOutput::Inline => {
            let text = std::str::from_utf8(&output).map_err(|_| BlockError::NonUtf8Inline)?;
            let replacement = processor
                .inline_replacement_markup(text)
                .map_err(render_error)?;
            tracing::info!(
                "Inlining {} ({} assets, {} bytes)",
                block.block_type,
                block.asset_files.len(),
                output.len()
            );
            replacement
        }
    };

    Ok(BlockState::Compiled {
        output,
        replacement,
    })
}

fn render_error(e: minblock_core::Error) -> BlockError {
    BlockError::Render {
        message: e.to_string(),
    }
}
