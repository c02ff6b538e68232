// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Upload coordinator: the ordered save-then-attach pipeline
//!
//! Construction issues the metadata document save as a background task and
//! opens the first segment. Every rotation closes the open segment and
//! chains its upload as a continuation of the *current* pipeline tail, never
//! as an independent task, so uploads resolve strictly in rotation order no
//! matter when the store completes each call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use diagnostics::*;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::Result;
use crate::error::UploadError;
use crate::record::MeasurementRecord;
use crate::segment::{Segment, SegmentNamer};
use crate::store::{DocumentStore, ProgressSink, SavedDoc, UploadedAttachment};

/// Single-resolution handle to one link of the upload pipeline.
///
/// Cloning shares the same resolution; the underlying work runs exactly once
/// regardless of how many holders await it.
pub type UploadTicket = Shared<BoxFuture<'static, PipelineStep>>;

/// Resolved value of one pipeline link.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    /// Head of the chain: the metadata document was saved.
    Saved { doc: SavedDoc },

    /// The document save failed. Terminal: every later link resolves to an
    /// error carrying this message and no upload is ever attempted.
    SaveFailed { message: String },

    /// A segment uploaded and its local file was removed.
    Uploaded {
        doc: SavedDoc,
        attachment: UploadedAttachment,
    },

    /// A segment upload failed; its local file is retained. Later segments
    /// still attempt their own uploads.
    UploadFailed {
        doc: SavedDoc,
        file: String,
        message: String,
    },

    /// Nothing qualified for upload.
    Skipped,
}

impl PipelineStep {
    /// The saved document flowing through this link, if the save succeeded.
    pub fn doc(&self) -> Option<&SavedDoc> {
        match self {
            PipelineStep::Saved { doc }
            | PipelineStep::Uploaded { doc, .. }
            | PipelineStep::UploadFailed { doc, .. } => Some(doc),
            PipelineStep::SaveFailed { .. } | PipelineStep::Skipped => None,
        }
    }

    /// View this step as a result, mapping the failure variants to their
    /// error value.
    pub fn to_result(&self) -> std::result::Result<&PipelineStep, UploadError> {
        match self {
            PipelineStep::SaveFailed { message } => {
                Err(UploadError::SaveFailed(message.clone()))
            }
            PipelineStep::UploadFailed { file, message, .. } => {
                Err(UploadError::AttachmentFailed {
                    file: file.clone(),
                    message: message.clone(),
                })
            }
            step => Ok(step),
        }
    }
}

/// Owns the pending-upload pipeline, decides when to rotate segments, and
/// chains attachment uploads strictly after the document save.
///
/// The coordinator's own state (rotation, chaining, numbering) is
/// single-owner and synchronous; only the remote calls run on background
/// tasks. At most one segment is open at a time, exclusively owned here and
/// replaced on rotation.
pub struct UploadCoordinator {
    store: Arc<dyn DocumentStore>,
    progress: Arc<dyn ProgressSink>,
    record: MeasurementRecord,
    namer: Option<SegmentNamer>,
    open: Option<Segment>,
    pipeline: UploadTicket,
}

impl UploadCoordinator {
    /// Create the coordinator, issue the document save in the background,
    /// and open the first segment if the record names a base filename.
    ///
    /// Must be called inside a tokio runtime: the save is spawned
    /// immediately so local recording never waits on the network. The record
    /// snapshot sent to the store is taken here, before any rotation touches
    /// the filename field.
    pub fn new(
        mut record: MeasurementRecord,
        store: Arc<dyn DocumentStore>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        record.tag_type();
        let snapshot = record.clone();
        let save_store = store.clone();
        let handle = tokio::spawn(async move {
            match save_store.save_document(&snapshot).await {
                Ok(doc) => {
                    let id = doc.id.clone();
                    info!("measurement document saved as {id}", id: id);
                    PipelineStep::Saved { doc }
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!("measurement document save failed: {message}", message: message);
                    PipelineStep::SaveFailed { message }
                }
            }
        });
        let pipeline = share_task(handle);

        let namer = record.filename().map(SegmentNamer::new);
        let mut coordinator = Self {
            store,
            progress,
            record,
            namer,
            open: None,
            pipeline,
        };
        coordinator.rotate()?;
        Ok(coordinator)
    }

    /// True while a segment file is open for writing.
    pub fn is_writing(&self) -> bool {
        self.open.is_some()
    }

    /// True when closing would actually schedule an upload: the record names
    /// a base filename and a segment is currently open. (The third
    /// precondition, an issued save, holds by construction.)
    pub fn should_upload(&self) -> bool {
        self.namer.is_some() && self.open.is_some()
    }

    /// Name of the currently open segment, if any.
    pub fn open_segment(&self) -> Option<&Path> {
        self.open.as_ref().map(Segment::path)
    }

    /// How many segments have been opened so far.
    pub fn segments_opened(&self) -> u64 {
        self.namer.as_ref().map_or(0, SegmentNamer::issued)
    }

    /// Handle to the current tail of the pipeline.
    pub fn pipeline(&self) -> UploadTicket {
        self.pipeline.clone()
    }

    /// Close the current segment, scheduling its upload, and open the next.
    ///
    /// No-op for records without a base filename. The sequence number
    /// advances on every call, so segment names are never reused even when
    /// the previous segment was empty.
    pub fn rotate(&mut self) -> Result<()> {
        let _ = self.close_and_upload();

        let Some(namer) = self.namer.as_mut() else {
            return Ok(());
        };
        let name = namer.next_name();

        self.record.set_filename(&name);
        let segment = Segment::create(&name, &self.record)?;
        debug!("opened segment {name}", name: name);
        self.open = Some(segment);
        Ok(())
    }

    /// Append raw payload bytes to the open segment; no-op when none is
    /// open.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        match self.open.as_mut() {
            Some(segment) => segment.append(bytes),
            None => Ok(()),
        }
    }

    /// Run `appender` against the open segment's file; no-op when none is
    /// open.
    ///
    /// The appender receives the writable file and may perform arbitrary
    /// framed or raw writes at the current offset.
    pub fn write<F>(&mut self, appender: F) -> std::io::Result<()>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
    {
        match self.open.as_mut() {
            Some(segment) => segment.with_file(appender),
            None => Ok(()),
        }
    }

    /// Close the open segment and return the future of its upload, chained
    /// behind everything already in the pipeline. Does not open a
    /// replacement segment; [`rotate`](Self::rotate) does.
    ///
    /// Resolves immediately to [`PipelineStep::Skipped`] when the record
    /// never named a filename or no segment is open.
    pub fn close_and_upload(&mut self) -> UploadTicket {
        if !self.should_upload() {
            return futures::future::ready(PipelineStep::Skipped).boxed().shared();
        }
        match self.chain_open_segment() {
            Some(ticket) => ticket,
            None => futures::future::ready(PipelineStep::Skipped).boxed().shared(),
        }
    }

    /// Close the open segment, if any, and chain its upload as a
    /// continuation of the current pipeline tail. Returns the new tail.
    fn chain_open_segment(&mut self) -> Option<UploadTicket> {
        let segment = self.open.take()?;
        let path = segment.close();

        let prev = self.pipeline.clone();
        let store = self.store.clone();
        let progress = self.progress.clone();
        let handle = tokio::spawn(upload_after(prev, store, progress, path));

        let next = share_task(handle);
        self.pipeline = next.clone();
        Some(next)
    }
}

/// Wrap a spawned task as a shareable pipeline link.
fn share_task(handle: tokio::task::JoinHandle<PipelineStep>) -> UploadTicket {
    handle
        .map(|joined| {
            joined.unwrap_or_else(|err| PipelineStep::SaveFailed {
                message: format!("pipeline task aborted: {err}"),
            })
        })
        .boxed()
        .shared()
}

/// One upload continuation: wait for the pipeline tail, then attach the
/// segment file to the saved document.
///
/// A poisoned chain (failed save) propagates without ever calling the
/// store. A failed upload keeps the file on disk and keeps the document id
/// flowing so later segments still attempt their own uploads. The file is
/// deleted exactly once, here, on confirmed success.
async fn upload_after(
    prev: UploadTicket,
    store: Arc<dyn DocumentStore>,
    progress: Arc<dyn ProgressSink>,
    path: PathBuf,
) -> PipelineStep {
    let step = prev.await;
    let doc = match step.doc() {
        Some(doc) => doc.clone(),
        None => {
            let message = match step {
                PipelineStep::SaveFailed { message } => message,
                _ => "no saved document to attach to".to_string(),
            };
            return PipelineStep::SaveFailed { message };
        }
    };

    let file = path.display().to_string();
    info!("sending file {file}", file: file);
    match store.upload_attachment(&path, &doc.id, progress).await {
        Ok(attachment) => {
            if let Err(err) = tokio::fs::remove_file(&path).await {
                let message = err.to_string();
                warn!("uploaded segment {file} could not be removed: {message}", file: file, message: message);
            }
            let url = attachment.url.clone();
            debug!("uploaded {file} to {url}", file: file, url: url);
            PipelineStep::Uploaded { doc, attachment }
        }
        Err(err) => {
            let message = err.to_string();
            warn!("upload of {file} failed: {message}", file: file, message: message);
            PipelineStep::UploadFailed { doc, file, message }
        }
    }
}
