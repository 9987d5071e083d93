use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;

use crate::analyzer_client::AnalyzerClient;
use crate::config::Config;
use crate::form::AnalyzeForm;
use crate::status::prober::{Prober, ProberHandle, RefreshHandle};
use crate::status::{ServerStatus, StatusBoard, StatusSnapshot};

/// Root of a client session: owns the liveness status and its prober, and hands
/// status plus a refresh handle to the form. Everything is dropped with the session.
pub struct Session {
    client: Arc<AnalyzerClient>,
    board: Arc<StatusBoard>,
    prober: ProberHandle,
}

impl Session {
    /// Builds the HTTP client and starts probing immediately.
    pub fn start(config: &Config) -> Result<Self> {
        let client = Arc::new(
            AnalyzerClient::new(config.origin.clone(), config.probe_timeout)
                .context("Failed to build HTTP client")?,
        );
        let board = Arc::new(StatusBoard::new());
        let prober = Prober::new(
            client.clone(),
            Arc::clone(&board),
            config.poll_interval,
            config.retry_delay,
        )
        .spawn();

        Ok(Self {
            client,
            board,
            prober,
        })
    }

    /// Runs a single probe without starting the periodic schedule.
    pub async fn check_once(config: &Config) -> Result<StatusSnapshot> {
        let client = AnalyzerClient::new(config.origin.clone(), config.probe_timeout)
            .context("Failed to build HTTP client")?;
        let board = Arc::new(StatusBoard::new());
        Prober::new(
            Arc::new(client),
            Arc::clone(&board),
            config.poll_interval,
            config.retry_delay,
        )
        .check_once()
        .await;
        Ok(board.snapshot())
    }

    pub fn origin(&self) -> &str {
        self.client.origin()
    }

    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.board.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.board.snapshot()
    }

    pub fn refresher(&self) -> RefreshHandle {
        self.prober.refresher()
    }

    /// Waits for the first probe outcome of the session.
    pub async fn wait_until_resolved(&self) -> ServerStatus {
        let mut rx = self.board.subscribe();
        let status = match rx.wait_for(|snap| snap.status != ServerStatus::Checking).await {
            Ok(snap) => snap.status,
            Err(_) => self.board.current(),
        };
        status
    }

    /// Waits up to `limit` for the service to become live. Returns the last status seen.
    pub async fn wait_until_live(&self, limit: Duration) -> ServerStatus {
        let mut rx = self.board.subscribe();
        let _ = tokio::time::timeout(
            limit,
            rx.wait_for(|snap| snap.status == ServerStatus::Live),
        )
        .await;
        self.board.current()
    }

    /// Waits up to `limit` for a probe issued after `seq` to resolve.
    /// `None` if nothing newer resolved in time.
    pub async fn wait_for_probe_after(
        &self,
        seq: u64,
        limit: Duration,
    ) -> Option<StatusSnapshot> {
        let mut rx = self.board.subscribe();
        let snapshot = match tokio::time::timeout(
            limit,
            rx.wait_for(|snap| snap.seq > seq && snap.status != ServerStatus::Checking),
        )
        .await
        {
            Ok(Ok(snap)) => Some(snap.clone()),
            _ => None,
        };
        snapshot
    }

    pub fn form(&self) -> AnalyzeForm {
        AnalyzeForm::new(self.client.clone(), self.status(), self.refresher())
    }
}
