use std::path::Path;

use anyhow::{Context, Result};
use docstore::StoreConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration: store connection plus recording options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirthConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Base filename for segment files; rotation derives `{stem}-{n}{ext}`
    /// names from it. Omit to save metadata without recording files.
    pub filename: Option<String>,
    /// Rotate after this many payload bytes.
    #[serde(default = "default_segment_bytes")]
    pub segment_bytes: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            filename: None,
            segment_bytes: default_segment_bytes(),
        }
    }
}

fn default_segment_bytes() -> u64 {
    64 * 1024 * 1024
}

pub const EXAMPLE_CONFIG: &str = "\
# firth configuration
store:
  url: http://localhost:5984
  database: measurements
  username: writer
  password: changeme
  # design: measurements_default

recording:
  # Base filename for recorded segments; omit to save metadata only.
  filename: run.dat
  # Rotate after this many payload bytes.
  segment_bytes: 67108864
";

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<FirthConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: FirthConfig =
        serde_yaml_ng::from_str(&content).with_context(|| "Failed to parse YAML configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub(crate) fn validate_config(config: &FirthConfig) -> Result<()> {
    config.store.validate()?;

    if config.recording.segment_bytes == 0 {
        anyhow::bail!("segment_bytes must be greater than 0");
    }
    if let Some(filename) = &config.recording.filename {
        if filename.is_empty() {
            anyhow::bail!("recording filename cannot be empty when set");
        }
    }
    Ok(())
}
