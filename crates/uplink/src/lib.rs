// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Ordered upload pipeline for instrument measurement segments
//!
//! This crate persists instrument-generated measurement metadata and the raw
//! binary files associated with it to a remote document store, while those
//! files are still being written. Local recording never blocks on the
//! network: the metadata save is issued as a background task at construction,
//! and every segment upload is chained strictly behind it.
//!
//! # Architecture
//!
//! - **MeasurementRecord**: field map tagged `type = "measurement"`,
//!   optionally naming a base filename for segment recording
//! - **Segment / SegmentNamer**: the single open segment file and the
//!   `{stem}-{n}{ext}` rotation naming scheme
//! - **frame**: the length-prefixed, space-padded header written at the
//!   start of every segment
//! - **DocumentStore**: contract for the remote store (save + attach),
//!   implemented elsewhere and injected
//! - **UploadCoordinator**: owns the pending-upload pipeline, rotates
//!   segments, and chains each upload onto the current pipeline tail so
//!   results resolve in rotation order
//!
//! # Usage
//!
//! ```no_run
//! # async fn example(store: std::sync::Arc<dyn uplink::DocumentStore>) -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use uplink::{MeasurementRecord, NullProgress, UploadCoordinator};
//!
//! let mut fields = serde_json::Map::new();
//! fields.insert("sensor".into(), "A".into());
//! fields.insert("filename".into(), "run.dat".into());
//!
//! // Issues the document save and opens run-0.dat
//! let mut coordinator = UploadCoordinator::new(
//!     MeasurementRecord::new(fields),
//!     store,
//!     Arc::new(NullProgress),
//! )?;
//!
//! coordinator.append(&[0u8; 100])?;
//! coordinator.rotate()?; // run-0.dat upload chains behind the save
//!
//! let step = coordinator.close_and_upload().await;
//! step.to_result()?;
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod error;
mod frame;
mod record;
mod segment;
mod store;

pub use coordinator::{PipelineStep, UploadCoordinator, UploadTicket};
pub use error::{StoreError, UplinkError, UploadError};
pub use frame::{HEADER_ALIGN, encode_header, read_header};
pub use record::{MeasurementRecord, RECORD_TYPE};
pub use segment::{Segment, SegmentNamer};
pub use store::{DocumentStore, NullProgress, ProgressSink, SavedDoc, UploadedAttachment};

/// Result type for local uplink operations
pub type Result<T> = std::result::Result<T, UplinkError>;
