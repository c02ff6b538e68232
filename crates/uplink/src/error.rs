// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the upload pipeline

use thiserror::Error;

/// Local failures: segment files and header encoding.
///
/// These surface synchronously from `new`/`rotate`/`append`, never through
/// the pipeline.
#[derive(Error, Debug)]
pub enum UplinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Remote store failures, as reported by a [`DocumentStore`] implementation.
///
/// [`DocumentStore`]: crate::DocumentStore
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered and said no.
    #[error("store rejected the request: {0}")]
    Rejected(String),

    /// The store could not be reached or the transfer broke.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures carried as data on resolved pipeline futures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    /// The document save failed. Permanent for this record: no attachment
    /// upload will ever be attempted and every dependent future carries this
    /// message.
    #[error("measurement document was not saved: {0}")]
    SaveFailed(String),

    /// One segment's upload failed. The local file is retained; later
    /// segments still attempt their own uploads.
    #[error("attachment upload failed for {file}: {message}")]
    AttachmentFailed { file: String, message: String },
}
