//! Liveness prober: runs an immediate probe, then one every poll interval, plus
//! manual refreshes and the single retry that follows a non-2xx answer.
//!
//! Everything runs inside one task that owns the in-flight probe tasks, so stopping
//! the prober cancels the schedule, a pending retry and any probe still in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::status::{ServerStatus, StatusBoard};

/// Result of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ServerStatus,
    /// True if exactly one follow-up probe should be scheduled after the retry delay.
    pub retry: bool,
}

/// Transport failure classes the prober distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Connect,
    Other,
}

impl ProbeOutcome {
    /// 2xx → live. Any other answer means the service is up but not ready yet.
    pub fn from_http_status(code: u16) -> Self {
        if (200..300).contains(&code) {
            ProbeOutcome {
                status: ServerStatus::Live,
                retry: false,
            }
        } else {
            ProbeOutcome {
                status: ServerStatus::Waking,
                retry: true,
            }
        }
    }

    /// Timeouts and connection failures usually mean a cold start in progress.
    pub fn from_failure(failure: TransportFailure) -> Self {
        let status = match failure {
            TransportFailure::Timeout | TransportFailure::Connect => ServerStatus::Waking,
            TransportFailure::Other => ServerStatus::Offline,
        };
        ProbeOutcome {
            status,
            retry: false,
        }
    }
}

/// A single liveness check against the remote service.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn check(&self) -> ProbeOutcome;
}

/// Requests an out-of-schedule probe. Cheap to clone and hand to other components.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl RefreshHandle {
    pub fn request(&self) {
        // The prober may already be stopped; nothing to refresh then.
        let _ = self.tx.send(());
    }

    /// A handle connected to nothing, for components used without a running prober.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::UnboundedSender<()>) -> Self {
        Self { tx }
    }
}

/// Owns the prober task. Dropping it stops probing.
pub struct ProberHandle {
    refresh: RefreshHandle,
    task: JoinHandle<()>,
}

impl ProberHandle {
    pub fn refresher(&self) -> RefreshHandle {
        self.refresh.clone()
    }
}

impl Drop for ProberHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Prober {
    probe: Arc<dyn LivenessProbe>,
    board: Arc<StatusBoard>,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl Prober {
    pub fn new(
        probe: Arc<dyn LivenessProbe>,
        board: Arc<StatusBoard>,
        poll_interval: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            probe,
            board,
            poll_interval,
            retry_delay,
        }
    }

    /// Runs one probe outside of any schedule and publishes its result.
    pub async fn check_once(&self) -> ServerStatus {
        let seq = self.board.begin_probe();
        let outcome = self.probe.check().await;
        self.board.resolve(seq, outcome.status);
        self.board.current()
    }

    /// Starts the periodic schedule. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> ProberHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        ProberHandle {
            refresh: RefreshHandle { tx },
            task,
        }
    }

    async fn run(self, mut refresh_rx: mpsc::UnboundedReceiver<()>) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Starting liveness prober"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: JoinSet<(u64, ProbeOutcome)> = JoinSet::new();
        let retry = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(retry);
        let mut retry_pending = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.spawn_probe(&mut in_flight, "scheduled"),
                Some(()) = refresh_rx.recv() => self.spawn_probe(&mut in_flight, "manual"),
                () = &mut retry, if retry_pending => {
                    retry_pending = false;
                    self.spawn_probe(&mut in_flight, "retry");
                }
                Some(joined) = in_flight.join_next() => match joined {
                    Ok((seq, outcome)) => {
                        if self.board.resolve(seq, outcome.status) && outcome.retry {
                            debug!(
                                seq,
                                delay_ms = self.retry_delay.as_millis() as u64,
                                "Scheduling probe retry"
                            );
                            retry.as_mut().reset(Instant::now() + self.retry_delay);
                            retry_pending = true;
                        }
                    }
                    Err(e) => warn!("Probe task failed: {e}"),
                },
            }
        }
    }

    fn spawn_probe(&self, in_flight: &mut JoinSet<(u64, ProbeOutcome)>, reason: &'static str) {
        let seq = self.board.begin_probe();
        debug!(seq, reason, "Issuing liveness probe");
        let probe = Arc::clone(&self.probe);
        in_flight.spawn(async move { (seq, probe.check().await) });
    }
}
