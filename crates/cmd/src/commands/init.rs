use std::path::Path;

use anyhow::{Context, Result};

use crate::config::EXAMPLE_CONFIG;

pub fn run(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Configuration file already exists: {}", config_path.display());
        println!("Delete it first if you want to create a new one.");
        return Ok(());
    }

    std::fs::write(config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to create configuration file: {}", config_path.display()))?;

    println!("Created example configuration file: {}", config_path.display());
    println!();
    println!("Edit it to point at your document store:");
    println!("  - url/database: where measurement documents are saved");
    println!("  - username/password: credentials with write access");
    println!("  - recording.filename: base name for recorded segment files");
    println!();
    println!("Then run: firth record --config {}", config_path.display());
    Ok(())
}
