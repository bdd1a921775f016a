//! Write a starter configuration

use anyhow::{Context, Result};
use minblock_core::config::{DEFAULT_CONFIG_FILE, starter_config};
use std::fs;
use std::path::Path;

/// Run the init command
pub async fn run(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }

    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            path.display(),
            DEFAULT_CONFIG_FILE
        );
    }

    fs::write(&config_path, starter_config())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    tracing::info!("✓ Created {}", config_path.display());
    tracing::info!("");
    tracing::info!("Next steps:");
    tracing::info!("  Mark asset groups in your HTML:");
    tracing::info!("    <!-- build:js js/app.min.js --> ... <!-- endbuild -->");
    tracing::info!("  minblock build index.html");

    Ok(())
}
