//! Build the blocks of a document

use anyhow::{Context, Result};
use minblock_core::Config;
use minblock_runtime::{Pipeline, Settings, error::is_structural};
use std::path::{Path, PathBuf};

/// Command line overrides for a build
#[derive(Debug, Default)]
pub struct BuildOptions {
    /// Asset base path
    pub base: Option<PathBuf>,
    /// Output document path
    pub output: Option<PathBuf>,
    /// Inline token
    pub inline_token: Option<String>,
    /// Delete compiled sources
    pub remove_sources: bool,
}

/// Run the build command
pub async fn run(config_path: Option<&Path>, file: &Path, options: BuildOptions) -> Result<()> {
    let mut config = Config::discover(config_path).context("Failed to load configuration")?;
    if let Some(token) = options.inline_token {
        config.inline_token = token;
        config.validate().context("Invalid --inline-token")?;
    }

    let registry = config
        .build_registry()
        .context("Failed to set up block processors")?;

    let mut settings = Settings::from_config(&config, file);
    if let Some(base) = options.base {
        settings.base_path = base;
    }
    if let Some(output) = options.output {
        settings = settings.with_output(output);
    }
    if options.remove_sources {
        settings = settings.with_remove_sources(true);
    }

    tracing::info!(
        "Building {} (base path: {})",
        file.display(),
        settings.base_path.display()
    );

    let report = Pipeline::new(settings, registry)
        .run(file)
        .await
        .inspect_err(|e| {
            if is_structural(e) {
                tracing::error!(
                    "Fix the build markers in {}; nothing was written",
                    file.display()
                );
            }
        })?;

    for (block, err) in report.failures() {
        tracing::warn!(
            "✗ {} block [{}:{}] left unchanged: {}",
            block.block_type,
            block.range.start,
            block.range.end,
            err
        );
    }

    if report.written {
        tracing::info!(
            "✓ {} of {} blocks compiled, {} written",
            report.compiled(),
            report.blocks.len(),
            report.output_path.display()
        );
    } else {
        tracing::info!("✓ Nothing to build in {}", file.display());
    }

    Ok(())
}
