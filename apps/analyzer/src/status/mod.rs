//! Server liveness state shared between the prober (sole writer) and its readers.
//!
//! Every probe is tagged with a sequence number when it is issued. A resolution is
//! applied only while its probe is still the latest one issued, so a slow probe can
//! never overwrite the outcome of a newer one.

pub mod indicator;
pub mod prober;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// The client's belief about whether the remote analysis service is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Checking,
    Live,
    Waking,
    Offline,
}

/// Published status plus the probe it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: ServerStatus,
    /// Sequence number of the probe that produced this value. 0 before any probe.
    pub seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        StatusSnapshot {
            status: ServerStatus::Checking,
            seq: 0,
            updated_at: Utc::now(),
        }
    }
}

pub struct StatusBoard {
    tx: watch::Sender<StatusSnapshot>,
    issued: AtomicU64,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self {
            tx,
            issued: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn current(&self) -> ServerStatus {
        self.tx.borrow().status
    }

    /// Issues a new probe sequence number and publishes `Checking` for it.
    pub fn begin_probe(&self) -> u64 {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_if_modified(|snap| {
            if seq <= snap.seq {
                return false;
            }
            *snap = StatusSnapshot {
                status: ServerStatus::Checking,
                seq,
                updated_at: Utc::now(),
            };
            true
        });
        seq
    }

    /// Applies a probe resolution. Returns false if a newer probe has been issued
    /// since, in which case the resolution is discarded.
    pub fn resolve(&self, seq: u64, status: ServerStatus) -> bool {
        let applied = self.tx.send_if_modified(|snap| {
            if seq != self.issued.load(Ordering::SeqCst) || seq < snap.seq {
                return false;
            }
            *snap = StatusSnapshot {
                status,
                seq,
                updated_at: Utc::now(),
            };
            true
        });
        if !applied {
            debug!(seq, ?status, "Discarding stale probe resolution");
        }
        applied
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
