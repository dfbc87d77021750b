//! Durable submission queue for offline operation.
//!
//! When the backend is unreachable, write operations are captured as
//! [`QueuedSubmission`] entries and persisted to a JSON file, then
//! replayed in order once connectivity returns. Delivery is
//! at-least-once; the server must tolerate a replayed request.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSubmission {
    pub id: Uuid,
    pub queued_at: NaiveDateTime,
    pub method: String,
    pub path: String,
    pub body: serde_json::Value,
}

impl QueuedSubmission {
    pub fn new(method: &str, path: &str, body: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            queued_at: Utc::now().naive_utc(),
            method: method.into(),
            path: path.into(),
            body,
        }
    }
}

/// Why a submission attempt failed. Only [`SubmitError::Network`]
/// means "try again later"; a rejection is final.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitError {
    #[error("Network unreachable: {0}")]
    Network(String),
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

pub trait SubmissionTransport: Send + Sync {
    fn submit(&self, entry: &QueuedSubmission) -> Result<(), SubmitError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Outbox storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Outbox file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("A sync pass is already running")]
    SyncInProgress,
    #[error("No queued submission with id {0}")]
    NotFound(Uuid),
}

/// Result of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub delivered: usize,
    /// Entries the server rejected outright, dropped from the queue.
    pub dropped: Vec<(Uuid, String)>,
    /// Entries still queued after the pass (network gave out).
    pub remaining: usize,
}

/// The persistent queue. Entries live in memory and are mirrored to
/// `path` on every mutation, so a crash never loses accepted work.
pub struct Outbox {
    path: PathBuf,
    entries: Mutex<VecDeque<QueuedSubmission>>,
    syncing: AtomicBool,
}

impl Outbox {
    /// Open the outbox, loading any entries a previous run left behind.
    pub fn open(path: &Path) -> Result<Self, OutboxError> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            if raw.trim().is_empty() {
                VecDeque::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            VecDeque::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
            syncing: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> Vec<QueuedSubmission> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Try to deliver immediately; capture the entry only on a true
    /// network failure. Rejections propagate to the caller unqueued.
    pub fn submit_or_queue(
        &self,
        transport: &dyn SubmissionTransport,
        entry: QueuedSubmission,
    ) -> Result<bool, SubmitError> {
        match transport.submit(&entry) {
            Ok(()) => Ok(true),
            Err(SubmitError::Network(reason)) => {
                tracing::warn!(id = %entry.id, %reason, "Submission queued for later sync");
                self.push(entry);
                Ok(false)
            }
            Err(rejected) => Err(rejected),
        }
    }

    pub fn push(&self, entry: QueuedSubmission) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_back(entry);
        self.persist(&entries);
    }

    /// Replay queued entries in order. Single-flight: a concurrent
    /// call fails with [`OutboxError::SyncInProgress`]. Each delivered
    /// entry is removed individually, so a crash mid-pass never
    /// re-queues delivered work beyond the at-least-once contract.
    pub fn sync(&self, transport: &dyn SubmissionTransport) -> Result<SyncReport, OutboxError> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OutboxError::SyncInProgress);
        }

        let mut report = SyncReport::default();
        loop {
            let Some(entry) = self.entries.lock().unwrap().front().cloned() else {
                break;
            };
            match transport.submit(&entry) {
                Ok(()) => {
                    self.remove(&entry.id);
                    report.delivered += 1;
                }
                Err(SubmitError::Rejected { status, message }) => {
                    // The server saw it and said no; retrying would
                    // say no again. Drop and report.
                    tracing::warn!(id = %entry.id, status, %message, "Queued submission rejected");
                    self.remove(&entry.id);
                    report.dropped.push((entry.id, message));
                }
                Err(SubmitError::Network(reason)) => {
                    tracing::info!(%reason, "Sync pass stopped, network unavailable");
                    break;
                }
            }
        }
        report.remaining = self.len();
        self.syncing.store(false, Ordering::SeqCst);
        Ok(report)
    }

    /// Retry one entry by id, out of band. `Ok(true)` means the entry
    /// left the queue (delivered, or rejected and dropped); `Ok(false)`
    /// means the network was unavailable and it is still queued.
    pub fn retry(
        &self,
        transport: &dyn SubmissionTransport,
        id: &Uuid,
    ) -> Result<bool, OutboxError> {
        let entry = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == *id)
            .cloned()
            .ok_or(OutboxError::NotFound(*id))?;
        match transport.submit(&entry) {
            Ok(()) => {
                self.remove(id);
                Ok(true)
            }
            Err(SubmitError::Rejected { status, message }) => {
                tracing::warn!(%id, status, %message, "Queued submission rejected on retry");
                self.remove(id);
                Ok(true)
            }
            Err(SubmitError::Network(reason)) => {
                tracing::info!(%id, %reason, "Retry failed, entry kept");
                Ok(false)
            }
        }
    }

    fn remove(&self, id: &Uuid) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.id != *id);
        self.persist(&entries);
    }

    fn persist(&self, entries: &VecDeque<QueuedSubmission>) {
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::error!(path = ?self.path, error = %e, "Failed to persist outbox");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize outbox"),
        }
    }
}
