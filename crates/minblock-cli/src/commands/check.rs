//! List the build blocks of a document

use anyhow::{Context, Result};
use minblock_core::{Block, Config};
use minblock_runtime::{Pipeline, Settings};
use std::path::Path;

/// Run the check command
pub async fn run(config_path: Option<&Path>, file: &Path, json: bool) -> Result<()> {
    tracing::info!("Checking {}", file.display());

    let config = Config::discover(config_path).context("Failed to load configuration")?;
    let registry = config
        .build_registry()
        .context("Failed to set up block processors")?;
    let types: Vec<String> = registry.types().into_iter().map(String::from).collect();

    let pipeline = Pipeline::new(Settings::from_config(&config, file), registry);
    let blocks = pipeline.scan(file).await?;

    if json {
        let listing = create_listing(file, &blocks, &types);
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for block in &blocks {
            println!(
                "{} [{}:{}] -> {}",
                block.block_type,
                block.range.start,
                block.range.end,
                block.output.file_name().unwrap_or("(inline)")
            );
            if !types.contains(&block.block_type) {
                println!("  ! no processor registered for '{}'", block.block_type);
            }
            for asset in &block.asset_files {
                println!("  {}", asset);
            }
        }
    }

    tracing::info!("✓ {} build blocks", blocks.len());
    Ok(())
}

fn create_listing(file: &Path, blocks: &[Block], types: &[String]) -> serde_json::Value {
    let blocks: Vec<serde_json::Value> = blocks
        .iter()
        .map(|block| {
            serde_json::json!({
                "type": block.block_type,
                "start": block.range.start,
                "end": block.range.end,
                "output": block.output.file_name(),
                "inline": block.is_inline(),
                "registered": types.contains(&block.block_type),
                "assets": block.asset_files,
            })
        })
        .collect();

    serde_json::json!({
        "document": file.display().to_string(),
        "blocks": blocks,
    })
}
