use std::path::Path;

use anyhow::{Context, Result};
use docstore::CouchClient;

use crate::config::load_config;

pub async fn run(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        println!("Configuration file not found: {}", config_path.display());
        println!("Run: firth init --config {} to create one", config_path.display());
        return Ok(());
    }

    println!("Loading configuration from: {}", config_path.display());
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load configuration from: {}", config_path.display()))?;

    println!("Checking store at {} ...", config.store.url);
    let client = CouchClient::new(&config.store)?;
    client
        .ping()
        .await
        .context("Store check failed (connectivity or credentials)")?;

    println!("Store check completed successfully.");
    Ok(())
}
