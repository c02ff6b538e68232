//! Scenario tests for the upload coordinator, driven by a stub store whose
//! completions are gated on channels so each test decides exactly when every
//! remote call resolves.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::oneshot;

use uplink::{
    DocumentStore, MeasurementRecord, NullProgress, PipelineStep, ProgressSink, SavedDoc,
    StoreError, UploadCoordinator, UploadError, UploadedAttachment,
};

/// Stub document store. By default every call succeeds immediately; a test
/// can gate the save or any upload (keyed by file name) on a oneshot channel
/// to control completion order.
#[derive(Default)]
struct GatedStore {
    save_gate: Mutex<Option<oneshot::Receiver<Result<SavedDoc, StoreError>>>>,
    upload_gates: Mutex<HashMap<String, oneshot::Receiver<Result<(), StoreError>>>>,
    saved_record: Mutex<Option<MeasurementRecord>>,
    calls: Mutex<Vec<String>>,
    completions: Mutex<Vec<String>>,
}

impl GatedStore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn gate_save(&self) -> oneshot::Sender<Result<SavedDoc, StoreError>> {
        let (tx, rx) = oneshot::channel();
        *self.save_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn gate_upload(&self, name: &str) -> oneshot::Sender<Result<(), StoreError>> {
        let (tx, rx) = oneshot::channel();
        self.upload_gates.lock().unwrap().insert(name.to_string(), rx);
        tx
    }

    fn upload_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn upload_completions(&self) -> Vec<String> {
        self.completions.lock().unwrap().clone()
    }

    fn saved_record(&self) -> Option<MeasurementRecord> {
        self.saved_record.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn save_document(&self, record: &MeasurementRecord) -> Result<SavedDoc, StoreError> {
        *self.saved_record.lock().unwrap() = Some(record.clone());
        let gate = self.save_gate.lock().unwrap().take();
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(StoreError::Transport("save gate dropped".to_string()))),
            None => Ok(SavedDoc {
                id: "doc-42".to_string(),
            }),
        }
    }

    async fn upload_attachment(
        &self,
        path: &Path,
        doc_id: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<UploadedAttachment, StoreError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .to_string();
        self.calls.lock().unwrap().push(name.clone());
        progress.transferred(50, 100);

        let gate = self.upload_gates.lock().unwrap().remove(&name);
        let outcome = match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(StoreError::Transport("upload gate dropped".to_string()))),
            None => Ok(()),
        };

        progress.transferred(100, 100);
        self.completions.lock().unwrap().push(name.clone());
        outcome?;
        Ok(UploadedAttachment {
            id: doc_id.to_string(),
            url: format!("/_attachments/measurements/{doc_id}/{name}"),
            file_name: name,
        })
    }
}

fn record_with_filename(tmp: &TempDir) -> MeasurementRecord {
    let base = tmp.path().join("run.dat");
    MeasurementRecord::new(
        [
            ("sensor".to_string(), json!("A")),
            ("filename".to_string(), json!(base.to_str().unwrap())),
        ]
        .into_iter()
        .collect(),
    )
}

fn record_without_filename() -> MeasurementRecord {
    MeasurementRecord::new([("sensor".to_string(), json!("A"))].into_iter().collect())
}

fn null_progress() -> Arc<dyn ProgressSink> {
    Arc::new(NullProgress)
}

/// Give spawned pipeline tasks a chance to advance.
async fn yield_many() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_no_filename_record_is_a_no_op() -> Result<()> {
    let store = GatedStore::new();
    let mut coordinator =
        UploadCoordinator::new(record_without_filename(), store.clone(), null_progress())?;

    assert!(!coordinator.is_writing());
    assert!(!coordinator.should_upload());
    assert_eq!(coordinator.segments_opened(), 0);

    coordinator.rotate()?;
    assert!(!coordinator.is_writing());
    assert_eq!(coordinator.segments_opened(), 0);

    let step = coordinator.close_and_upload().await;
    assert_eq!(step, PipelineStep::Skipped);
    assert!(step.to_result().is_ok());

    // The document save still happened
    let head = coordinator.pipeline().await;
    assert!(matches!(head, PipelineStep::Saved { .. }));
    assert!(store.upload_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_segment_names_increase_and_are_never_reused() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();
    // Keep the save pending so no upload (or deletion) runs during the test
    let _save_gate = store.gate_save();

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    assert!(coordinator.is_writing());
    assert!(coordinator.should_upload());

    coordinator.rotate()?;
    coordinator.rotate()?;
    assert_eq!(coordinator.segments_opened(), 3);
    assert_eq!(
        coordinator.open_segment().and_then(|p| p.file_name()),
        Some(std::ffi::OsStr::new("run-2.dat"))
    );

    // Every closed segment is still on disk: uploads are gated on the save
    assert!(tmp.path().join("run-0.dat").exists());
    assert!(tmp.path().join("run-1.dat").exists());
    assert!(tmp.path().join("run-2.dat").exists());
    Ok(())
}

#[tokio::test]
async fn test_uploads_resolve_in_rotation_order() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();
    let gate0 = store.gate_upload("run-0.dat");
    let gate1 = store.gate_upload("run-1.dat");

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    coordinator.append(b"segment zero")?;
    coordinator.rotate()?;
    let ticket0 = coordinator.pipeline();
    coordinator.append(b"segment one")?;
    let ticket1 = coordinator.close_and_upload();

    // Release the SECOND upload first. It must not even be issued until the
    // first one finishes.
    gate1.send(Ok(())).unwrap();
    yield_many().await;
    assert_eq!(store.upload_calls(), vec!["run-0.dat".to_string()]);

    gate0.send(Ok(())).unwrap();
    let step0 = ticket0.await;
    let step1 = ticket1.await;

    match step0 {
        PipelineStep::Uploaded { attachment, .. } => {
            assert_eq!(attachment.file_name, "run-0.dat");
        }
        other => panic!("expected run-0 upload, got {other:?}"),
    }
    match step1 {
        PipelineStep::Uploaded { attachment, .. } => {
            assert_eq!(attachment.file_name, "run-1.dat");
        }
        other => panic!("expected run-1 upload, got {other:?}"),
    }

    assert_eq!(
        store.upload_completions(),
        vec!["run-0.dat".to_string(), "run-1.dat".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_save_blocks_every_upload() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();
    let save_gate = store.gate_save();

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    coordinator.append(b"segment zero")?;
    coordinator.rotate()?;
    let ticket0 = coordinator.pipeline();
    coordinator.append(b"segment one")?;
    let ticket1 = coordinator.close_and_upload();

    save_gate
        .send(Err(StoreError::Rejected("no capacity".to_string())))
        .unwrap();

    let step0 = ticket0.await;
    let step1 = ticket1.await;

    for step in [&step0, &step1] {
        match step.to_result() {
            Err(UploadError::SaveFailed(message)) => assert!(message.contains("no capacity")),
            other => panic!("expected save failure, got {other:?}"),
        }
    }

    // No upload was ever attempted and both files survive
    assert!(store.upload_calls().is_empty());
    assert!(tmp.path().join("run-0.dat").exists());
    assert!(tmp.path().join("run-1.dat").exists());
    Ok(())
}

#[tokio::test]
async fn test_upload_failure_keeps_file_and_later_uploads_continue() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();
    let gate1 = store.gate_upload("run-1.dat");

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    coordinator.append(b"segment zero")?;
    coordinator.rotate()?;
    let ticket0 = coordinator.pipeline();
    coordinator.append(b"segment one")?;
    coordinator.rotate()?;
    let ticket1 = coordinator.pipeline();
    coordinator.append(b"segment two")?;
    let ticket2 = coordinator.close_and_upload();

    gate1
        .send(Err(StoreError::Transport("link down".to_string())))
        .unwrap();

    assert!(matches!(ticket0.await, PipelineStep::Uploaded { .. }));

    let step1 = ticket1.await;
    match &step1 {
        PipelineStep::UploadFailed { file, message, .. } => {
            assert!(file.ends_with("run-1.dat"));
            assert!(message.contains("link down"));
        }
        other => panic!("expected run-1 failure, got {other:?}"),
    }
    assert!(step1.to_result().is_err());

    // The failed segment does not poison the chain
    assert!(matches!(ticket2.await, PipelineStep::Uploaded { .. }));

    assert_eq!(
        store.upload_calls(),
        vec![
            "run-0.dat".to_string(),
            "run-1.dat".to_string(),
            "run-2.dat".to_string()
        ]
    );

    // Deleted on success, retained on failure
    assert!(!tmp.path().join("run-0.dat").exists());
    assert!(tmp.path().join("run-1.dat").exists());
    assert!(!tmp.path().join("run-2.dat").exists());
    Ok(())
}

#[tokio::test]
async fn test_header_on_disk_round_trips() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();
    // Keep the save pending so the segment is not uploaded and deleted
    let _save_gate = store.gate_save();

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    coordinator.append(b"PAYLOAD")?;
    coordinator.write(|f| std::io::Write::write_all(f, b" TAIL"))?;
    drop(coordinator);

    let path = tmp.path().join("run-0.dat");
    let mut file = std::fs::File::open(&path)?;
    let decoded = uplink::read_header(&mut file)?;

    // The header names this segment, not the base filename
    assert!(decoded.filename().unwrap().ends_with("run-0.dat"));
    assert_eq!(decoded.get("sensor"), Some(&json!("A")));
    assert_eq!(decoded.get("type"), Some(&json!("measurement")));

    let mut payload = Vec::new();
    std::io::Read::read_to_end(&mut file, &mut payload)?;
    assert_eq!(payload, b"PAYLOAD TAIL");

    // Length prefix is little-endian and counts a multiple of four
    let bytes = std::fs::read(&path)?;
    let len = u32::from_le_bytes(bytes[..4].try_into()?) as usize;
    assert_eq!(len % uplink::HEADER_ALIGN, 0);
    Ok(())
}

#[tokio::test]
async fn test_saved_document_carries_base_filename() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    coordinator.rotate()?;

    let head = coordinator.pipeline();
    // Drain the pipeline so the save has definitely run
    let _ = head.await;

    let saved = store.saved_record().expect("save was issued");
    let filename = saved.filename().unwrap();
    assert!(filename.ends_with("run.dat"));
    assert!(!filename.ends_with("run-0.dat"));
    Ok(())
}

#[tokio::test]
async fn test_close_without_open_segment_skips() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), null_progress())?;
    coordinator.append(b"bytes")?;

    let first = coordinator.close_and_upload();
    assert!(!coordinator.is_writing());
    assert!(!coordinator.should_upload());

    // Nothing is open anymore, so a second close has nothing to upload
    let second = coordinator.close_and_upload().await;
    assert_eq!(second, PipelineStep::Skipped);

    assert!(matches!(first.await, PipelineStep::Uploaded { .. }));

    // Appends after close are no-ops
    coordinator.append(b"late")?;
    Ok(())
}

#[tokio::test]
async fn test_progress_reports_reach_the_sink() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = GatedStore::new();

    struct RecordingSink(Arc<Mutex<Vec<(u64, u64)>>>);

    impl ProgressSink for RecordingSink {
        fn transferred(&self, bytes: u64, total: u64) {
            self.0.lock().unwrap().push((bytes, total));
        }
    }

    let seen: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink(seen.clone());

    let mut coordinator =
        UploadCoordinator::new(record_with_filename(&tmp), store.clone(), Arc::new(sink))?;
    coordinator.append(b"bytes")?;
    let step = coordinator.close_and_upload().await;
    assert!(matches!(step, PipelineStep::Uploaded { .. }));

    assert_eq!(*seen.lock().unwrap(), vec![(50, 100), (100, 100)]);
    Ok(())
}
