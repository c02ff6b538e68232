// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Remote document store contract
//!
//! The pipeline consumes this contract; it never implements the wire
//! protocol itself. Implementations live elsewhere (see the `docstore`
//! crate) and are injected as trait objects, which is also how tests
//! substitute deterministic stubs.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;
use crate::record::MeasurementRecord;

/// A saved metadata document in the remote store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavedDoc {
    /// Identifier assigned by the store.
    pub id: String,
}

/// A segment file attached to its owning document.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAttachment {
    /// Owning document id.
    pub id: String,
    /// Store-relative URL of the attachment.
    pub url: String,
    /// Name the attachment was stored under.
    pub file_name: String,
}

/// Receives transfer progress during an attachment upload.
pub trait ProgressSink: Send + Sync {
    /// Called zero or more times with (bytes transferred so far, total).
    fn transferred(&self, bytes: u64, total: u64);
}

/// Progress sink that discards every report.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn transferred(&self, _bytes: u64, _total: u64) {}
}

/// Remote document store consumed by the upload coordinator.
///
/// Both calls run remotely and may take arbitrarily long; implementations
/// must be safe to drive from spawned background tasks. No retries happen at
/// this layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist the metadata record, returning the assigned document id.
    async fn save_document(&self, record: &MeasurementRecord) -> Result<SavedDoc, StoreError>;

    /// Attach the file at `path` to the saved document.
    ///
    /// On success the caller deletes the local file; on failure the caller
    /// must leave it in place.
    async fn upload_attachment(
        &self,
        path: &Path,
        doc_id: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<UploadedAttachment, StoreError>;
}
