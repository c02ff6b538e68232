use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Connection settings for the remote document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store, e.g. `http://couch.example.org:5984`.
    pub url: String,
    /// Database holding measurement documents.
    pub database: String,
    pub username: String,
    pub password: String,
    /// Design document whose update handler stamps saved measurements.
    #[serde(default = "default_design")]
    pub design: String,
}

fn default_design() -> String {
    "measurements_default".to_string()
}

impl StoreConfig {
    /// Validate the configuration, naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("store url cannot be empty");
        }
        url::Url::parse(&self.url)
            .with_context(|| format!("store url is not a valid URL: {}", self.url))?;

        if self.database.is_empty() {
            anyhow::bail!("store database cannot be empty");
        }
        if self.design.is_empty() {
            anyhow::bail!("store design document cannot be empty");
        }
        Ok(())
    }
}
