use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use diagnostics::*;
use docstore::CouchClient;
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use uplink::{DocumentStore, MeasurementRecord, ProgressSink, UploadCoordinator};

use crate::config::load_config;

/// Renders upload progress into the diagnostic log.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn transferred(&self, bytes: u64, total: u64) {
        debug!("transferred {bytes} of {total} bytes", bytes: bytes, total: total);
    }
}

pub async fn run(config_path: &Path, fields: &[String]) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load configuration from: {}", config_path.display()))?;

    let mut map = Map::new();
    map.insert(
        "started".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| anyhow!("field '{field}' is not KEY=VALUE"))?;
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    if let Some(filename) = &config.recording.filename {
        map.insert("filename".to_string(), Value::String(filename.clone()));
    }
    let record = MeasurementRecord::new(map);

    let store: Arc<dyn DocumentStore> = Arc::new(CouchClient::new(&config.store)?);
    let mut coordinator = UploadCoordinator::new(record, store, Arc::new(LogProgress))
        .context("Failed to start the upload coordinator")?;

    info!("recording payload from stdin");
    let mut stdin = tokio::io::stdin();
    let mut buffer = vec![0u8; 64 * 1024];
    let mut segment_bytes = 0u64;
    let mut total_bytes = 0u64;

    loop {
        let n = stdin.read(&mut buffer).await.context("stdin read failed")?;
        if n == 0 {
            break;
        }
        coordinator.append(&buffer[..n])?;
        segment_bytes += n as u64;
        total_bytes += n as u64;

        if segment_bytes >= config.recording.segment_bytes {
            coordinator.rotate()?;
            segment_bytes = 0;
        }
    }

    let closing = coordinator.close_and_upload().await;
    closing
        .to_result()
        .map_err(|err| anyhow!(err))
        .context("final segment upload failed")?;

    // Wait out the whole pipeline: the document save plus any uploads that
    // were chained before the final one.
    let tail = coordinator.pipeline().await;
    tail.to_result()
        .map_err(|err| anyhow!(err))
        .context("upload pipeline failed")?;

    let segments = coordinator.segments_opened();
    info!("recording complete: {total_bytes} bytes across {segments} segments", total_bytes: total_bytes, segments: segments);
    Ok(())
}
