use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diagnostics::*;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::io::ReaderStream;

use crate::config::StoreConfig;
use uplink::{
    DocumentStore, MeasurementRecord, ProgressSink, SavedDoc, StoreError, UploadedAttachment,
};

/// Timeout for small control requests (save, ping, revision lookup).
/// Attachment uploads stream for as long as they need.
const CONTROL_TIMEOUT_SECONDS: u64 = 60;

/// Update handler that stamps each measurement document on insert.
const INSERT_HANDLER: &str = "insert_with_timestamp";

/// Async client for a CouchDB-style document store.
pub struct CouchClient {
    http: reqwest::Client,
    base: String,
    database: String,
    design: String,
    username: String,
    password: String,
}

impl CouchClient {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            design: config.design.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Check connectivity and credentials by fetching database info.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let url = self.db_url();
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Rejected(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )))
        }
    }

    /// Current revision of a document, from the ETag of a HEAD request.
    async fn current_rev(&self, doc_id: &str) -> Result<String, StoreError> {
        let response = self
            .http
            .head(self.doc_url(doc_id))
            .basic_auth(&self.username, Some(&self.password))
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(StoreError::Rejected(format!(
                "document {doc_id} not found (HTTP {})",
                response.status()
            )));
        }

        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|etag| etag.trim_matches('"').to_string())
            .ok_or_else(|| StoreError::Rejected(format!("document {doc_id} returned no revision")))
    }

    // URL construction helpers

    fn db_url(&self) -> String {
        format!("{}/{}", self.base, self.database)
    }

    fn save_url(&self) -> String {
        format!(
            "{}/_design/{}/_update/{}",
            self.db_url(),
            self.design,
            INSERT_HANDLER
        )
    }

    fn doc_url(&self, doc_id: &str) -> String {
        format!("{}/{}", self.db_url(), doc_id)
    }

    fn attachment_url(&self, doc_id: &str, file_name: &str) -> String {
        format!("{}/{}", self.doc_url(doc_id), file_name)
    }

    /// Store-relative attachment path reported back to callers.
    fn attachment_path(database: &str, doc_id: &str, file_name: &str) -> String {
        format!("/_attachments/{database}/{doc_id}/{file_name}")
    }
}

#[async_trait]
impl DocumentStore for CouchClient {
    async fn save_document(&self, record: &MeasurementRecord) -> Result<SavedDoc, StoreError> {
        let url = self.save_url();
        debug!("saving measurement document via {url}", url: url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .json(record)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body: Value = response.json().await.map_err(transport)?;
        if !status.is_success() || body.get("ok").is_none() {
            return Err(StoreError::Rejected(rejection_message(&body, status)));
        }

        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Rejected("response carried no document id".to_string()))?;
        Ok(SavedDoc { id: id.to_string() })
    }

    async fn upload_attachment(
        &self,
        path: &Path,
        doc_id: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<UploadedAttachment, StoreError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StoreError::Rejected(format!("segment path has no file name: {}", path.display()))
            })?
            .to_string();

        let rev = self.current_rev(doc_id).await?;
        let file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();

        let mut sent = 0u64;
        let body = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress.transferred(sent, total);
            }
            chunk
        });

        let url = format!("{}?rev={}", self.attachment_url(doc_id, &file_name), rev);
        debug!("uploading {file_name} ({total} bytes) to document {doc_id}", file_name: file_name, total: total, doc_id: doc_id);

        let response = self
            .http
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body: Value = response.json().await.map_err(transport)?;
        if !status.is_success() || body.get("ok").is_none() {
            return Err(StoreError::Rejected(rejection_message(&body, status)));
        }

        Ok(UploadedAttachment {
            id: doc_id.to_string(),
            url: Self::attachment_path(&self.database, doc_id, &file_name),
            file_name,
        })
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

/// Prefer the server's own reason over a generic status line.
fn rejection_message(body: &Value, status: reqwest::StatusCode) -> String {
    body.get("reason")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("measurement could not be saved (HTTP {status})"))
}
