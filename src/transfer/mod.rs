//! Concurrent copy/move/delete batches over filesystem views
//!
//! A batch runs on its own thread; copy jobs fan out onto a bounded worker
//! pool. The caller keeps a [`TransferHandle`] and polls two channels:
//! job-tagged progress records and the single terminal [`BatchReport`].

mod engine;
mod job;
mod progress;

pub use engine::TransferEngine;
pub use job::{BatchReport, JobOutcome, TransferJob, TransferOp};
pub use progress::{BatchProgress, ProgressEvent};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

use crate::errors::{VfsError, VfsResult};
use crate::providers::SharedView;

/// What to run: an operation, its views and the resolved sources
#[derive(Clone)]
pub struct TransferRequest {
    pub op: TransferOp,
    pub source_view: SharedView,
    pub sources: Vec<String>,
    /// Destination view and path; `None` for deletes
    pub destination: Option<(SharedView, String)>,
}

impl TransferRequest {
    pub fn copy(source_view: SharedView, sources: Vec<String>, dest_view: SharedView, dest: String) -> Self {
        Self {
            op: TransferOp::Copy,
            source_view,
            sources,
            destination: Some((dest_view, dest)),
        }
    }

    pub fn moving(source_view: SharedView, sources: Vec<String>, dest_view: SharedView, dest: String) -> Self {
        Self {
            op: TransferOp::Move,
            source_view,
            sources,
            destination: Some((dest_view, dest)),
        }
    }

    pub fn delete(source_view: SharedView, sources: Vec<String>) -> Self {
        Self {
            op: TransferOp::Delete,
            source_view,
            sources,
            destination: None,
        }
    }
}

/// A running batch with its communication channels
pub struct TransferHandle {
    /// Job-tagged progress records
    pub progress_rx: Receiver<ProgressEvent>,
    /// Exactly one report, sent when the batch settles
    pub result_rx: Receiver<BatchReport>,
    cancel: Arc<AtomicBool>,
    /// Thread handle (for cleanup)
    handle: Option<JoinHandle<()>>,
}

impl TransferHandle {
    /// Drain pending progress records (non-blocking)
    pub fn try_progress(&self) -> Vec<ProgressEvent> {
        self.progress_rx.try_iter().collect()
    }

    /// Check if the batch has settled (non-blocking)
    pub fn try_result(&self) -> Option<BatchReport> {
        self.result_rx.try_recv().ok()
    }

    /// Block until the terminal report arrives
    pub fn recv_result(&self) -> VfsResult<BatchReport> {
        self.result_rx
            .recv()
            .map_err(|_| VfsError::Cancelled("transfer thread exited without a report".to_string()))
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the report and join the batch thread
    pub fn wait(mut self) -> VfsResult<BatchReport> {
        let report = self.recv_result();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        report
    }
}
