//! Submission form: holds the selected resume and job description, gates submission
//! on input and server liveness, sends the analyze request, and turns the answer into
//! the text shown in the result area.
//!
//! Single flight is enforced by `SubmissionState`: a submit while another is in flight
//! is rejected at the transition, whatever surface triggered it.

pub mod messages;
pub mod upload;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::errors::{AnalyzeError, FormError};
use crate::form::messages::{ERROR_MARKER, NETWORK_ERROR, RATE_LIMITED, UNEXPECTED_RESPONSE};
use crate::form::upload::ResumeFile;
use crate::status::prober::RefreshHandle;
use crate::status::{ServerStatus, StatusSnapshot};

/// Success payload of the analyze endpoint. Any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalyzeReply {
    #[serde(default)]
    pub result: Option<String>,
    /// Older deployments answer with `analysis` instead of `result`.
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Sends one analyze request. Implemented by the HTTP client; swapped out in tests.
#[async_trait]
pub trait AnalyzeBackend: Send + Sync {
    async fn analyze(
        &self,
        resume: &ResumeFile,
        job_description: &str,
    ) -> Result<AnalyzeReply, AnalyzeError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    InFlight,
    Completed { result: String },
    /// `recheck` is set when the failure asked the prober for a fresh status.
    Failed { result: String, recheck: bool },
}

/// Text for a successful response: result → analysis → error → unexpected.
pub fn describe_reply(reply: &AnalyzeReply) -> String {
    let non_empty = |field: &Option<String>| field.clone().filter(|s| !s.is_empty());

    if let Some(result) = non_empty(&reply.result) {
        result
    } else if let Some(analysis) = non_empty(&reply.analysis) {
        analysis
    } else if let Some(error) = non_empty(&reply.error) {
        format!("{ERROR_MARKER}{error}")
    } else {
        UNEXPECTED_RESPONSE.to_string()
    }
}

/// Text for a failed request, and whether the liveness status should be re-checked.
pub fn describe_failure(err: &AnalyzeError) -> (String, bool) {
    match err {
        AnalyzeError::RateLimited => (RATE_LIMITED.to_string(), false),
        _ => match err.server_message().filter(|m| !m.is_empty()) {
            Some(message) => (format!("{ERROR_MARKER}{message}"), false),
            None => (NETWORK_ERROR.to_string(), true),
        },
    }
}

pub struct AnalyzeForm {
    backend: Arc<dyn AnalyzeBackend>,
    status: watch::Receiver<StatusSnapshot>,
    refresh: RefreshHandle,
    resume: Option<ResumeFile>,
    job_description: String,
    state: Mutex<SubmissionState>,
}

impl AnalyzeForm {
    pub fn new(
        backend: Arc<dyn AnalyzeBackend>,
        status: watch::Receiver<StatusSnapshot>,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            backend,
            status,
            refresh,
            resume: None,
            job_description: String::new(),
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    pub fn select_file(&mut self, resume: ResumeFile) {
        self.resume = Some(resume);
    }

    pub fn set_job_description(&mut self, text: impl Into<String>) {
        self.job_description = text.into();
    }

    pub fn state(&self) -> SubmissionState {
        self.lock_state().clone()
    }

    /// Validates, gates and sends the analyze request. `Err` is a blocking prompt and
    /// means no request was made; `Ok` is the result-area text, which may itself be an
    /// inline error message.
    pub async fn submit(&self) -> Result<String, FormError> {
        let resume = match &self.resume {
            Some(resume) if !self.job_description.trim().is_empty() => resume,
            _ => return Err(FormError::MissingInput),
        };

        let status = self.status.borrow().status;
        match status {
            ServerStatus::Live => {}
            ServerStatus::Waking => return Err(FormError::ServerWaking),
            ServerStatus::Offline => return Err(FormError::ServerOffline),
            ServerStatus::Checking => return Err(FormError::ServerChecking),
        }

        self.begin()?;
        info!(file = %resume.name, size = resume.size(), "Submitting resume for analysis");

        let outcome = self.backend.analyze(resume, &self.job_description).await;

        let (text, next_state) = match outcome {
            Ok(reply) => {
                let text = describe_reply(&reply);
                (text.clone(), SubmissionState::Completed { result: text })
            }
            Err(err) => {
                warn!("Analyze request failed: {err}");
                let (text, recheck) = describe_failure(&err);
                if recheck {
                    self.refresh.request();
                }
                (text.clone(), SubmissionState::Failed { result: text, recheck })
            }
        };

        *self.lock_state() = next_state;
        Ok(text)
    }

    fn begin(&self) -> Result<(), FormError> {
        let mut state = self.lock_state();
        if matches!(*state, SubmissionState::InFlight) {
            return Err(FormError::AlreadyInFlight);
        }
        *state = SubmissionState::InFlight;
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SubmissionState> {
        // A poisoned lock still holds a valid state value.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    use crate::status::StatusBoard;

    enum Answer {
        Reply(AnalyzeReply),
        RateLimited,
        Server(Option<&'static str>),
    }

    struct FakeBackend {
        answer: Answer,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        entered: Notify,
    }

    impl FakeBackend {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
                gate: None,
                entered: Notify::new(),
            })
        }

        fn gated(answer: Answer, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
                gate: Some(gate),
                entered: Notify::new(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalyzeBackend for FakeBackend {
        async fn analyze(
            &self,
            _resume: &ResumeFile,
            _job_description: &str,
        ) -> Result<AnalyzeReply, AnalyzeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.answer {
                Answer::Reply(reply) => Ok(reply.clone()),
                Answer::RateLimited => Err(AnalyzeError::RateLimited),
                Answer::Server(message) => Err(AnalyzeError::Server {
                    status: 500,
                    message: message.map(String::from),
                }),
            }
        }
    }

    fn board_with(status: ServerStatus) -> StatusBoard {
        let board = StatusBoard::new();
        let seq = board.begin_probe();
        if status != ServerStatus::Checking {
            board.resolve(seq, status);
        }
        board
    }

    fn pdf() -> ResumeFile {
        ResumeFile::accept("cv.pdf", upload::PDF_MIME, Bytes::from_static(b"%PDF")).unwrap()
    }

    fn reply(result: Option<&str>, analysis: Option<&str>, error: Option<&str>) -> AnalyzeReply {
        AnalyzeReply {
            result: result.map(String::from),
            analysis: analysis.map(String::from),
            error: error.map(String::from),
        }
    }

    fn filled_form(backend: Arc<FakeBackend>, board: &StatusBoard) -> AnalyzeForm {
        let mut form = AnalyzeForm::new(backend, board.subscribe(), RefreshHandle::detached());
        form.select_file(pdf());
        form.set_job_description("Senior Rust engineer");
        form
    }

    #[test]
    fn test_describe_reply_priority() {
        assert_eq!(describe_reply(&reply(Some("R"), Some("A"), Some("E"))), "R");
        assert_eq!(describe_reply(&reply(None, Some("A"), Some("E"))), "A");
        assert_eq!(describe_reply(&reply(None, None, Some("E"))), "❌ Error: E");
        assert_eq!(describe_reply(&reply(None, None, None)), UNEXPECTED_RESPONSE);
        assert_eq!(describe_reply(&reply(Some(""), Some("A"), None)), "A");
    }

    #[test]
    fn test_reply_deserializes_partial_payloads() {
        let parsed: AnalyzeReply = serde_json::from_str(r#"{"analysis": "ok"}"#).unwrap();
        assert_eq!(parsed, reply(None, Some("ok"), None));
        let empty: AnalyzeReply = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, AnalyzeReply::default());
    }

    #[test]
    fn test_describe_failure_priority() {
        assert_eq!(
            describe_failure(&AnalyzeError::RateLimited),
            (RATE_LIMITED.to_string(), false)
        );
        let with_message = AnalyzeError::Server {
            status: 500,
            message: Some("PDF unreadable".to_string()),
        };
        assert_eq!(
            describe_failure(&with_message),
            ("❌ Error: PDF unreadable".to_string(), false)
        );
        let bare = AnalyzeError::Server {
            status: 502,
            message: None,
        };
        assert_eq!(describe_failure(&bare), (NETWORK_ERROR.to_string(), true));
    }

    #[tokio::test]
    async fn test_submit_without_text_makes_no_request() {
        let backend = FakeBackend::new(Answer::Reply(reply(Some("R"), None, None)));
        let board = board_with(ServerStatus::Live);
        let mut form = filled_form(Arc::clone(&backend), &board);
        form.set_job_description("   ");

        assert_eq!(form.submit().await, Err(FormError::MissingInput));
        assert_eq!(backend.calls(), 0);
        assert_eq!(form.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn test_submit_without_file_makes_no_request() {
        let backend = FakeBackend::new(Answer::Reply(reply(Some("R"), None, None)));
        let board = board_with(ServerStatus::Live);
        let mut form = AnalyzeForm::new(
            backend.clone(),
            board.subscribe(),
            RefreshHandle::detached(),
        );
        form.set_job_description("Rust");

        assert_eq!(form.submit().await, Err(FormError::MissingInput));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_is_gated_on_liveness() {
        for (status, expected) in [
            (ServerStatus::Waking, FormError::ServerWaking),
            (ServerStatus::Offline, FormError::ServerOffline),
            (ServerStatus::Checking, FormError::ServerChecking),
        ] {
            let backend = FakeBackend::new(Answer::Reply(reply(Some("R"), None, None)));
            let board = board_with(status);
            let form = filled_form(Arc::clone(&backend), &board);

            assert_eq!(form.submit().await, Err(expected));
            assert_eq!(backend.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_submit_success_completes() {
        let backend = FakeBackend::new(Answer::Reply(reply(None, Some("Score: 80"), None)));
        let board = board_with(ServerStatus::Live);
        let form = filled_form(Arc::clone(&backend), &board);

        assert_eq!(form.submit().await.unwrap(), "Score: 80");
        assert_eq!(
            form.state(),
            SubmissionState::Completed {
                result: "Score: 80".to_string()
            }
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_shows_message_without_retry_or_recheck() {
        let backend = FakeBackend::new(Answer::RateLimited);
        let board = board_with(ServerStatus::Live);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut form = AnalyzeForm::new(
            backend.clone(),
            board.subscribe(),
            RefreshHandle::from_sender(tx),
        );
        form.select_file(pdf());
        form.set_job_description("Rust");

        assert_eq!(form.submit().await.unwrap(), RATE_LIMITED);
        assert_eq!(backend.calls(), 1);
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            form.state(),
            SubmissionState::Failed { recheck: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_network_failure_requests_status_recheck() {
        let backend = FakeBackend::new(Answer::Server(None));
        let board = board_with(ServerStatus::Live);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut form = AnalyzeForm::new(
            backend.clone(),
            board.subscribe(),
            RefreshHandle::from_sender(tx),
        );
        form.select_file(pdf());
        form.set_job_description("Rust");

        assert_eq!(form.submit().await.unwrap(), NETWORK_ERROR);
        assert!(rx.try_recv().is_ok());
        assert_eq!(
            form.state(),
            SubmissionState::Failed {
                result: NETWORK_ERROR.to_string(),
                recheck: true,
            }
        );
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_rejected() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend::gated(
            Answer::Reply(reply(Some("done"), None, None)),
            Arc::clone(&gate),
        );
        let board = board_with(ServerStatus::Live);
        let form = Arc::new(filled_form(Arc::clone(&backend), &board));

        let first = {
            let form = Arc::clone(&form);
            tokio::spawn(async move { form.submit().await })
        };
        backend.entered.notified().await;
        assert_eq!(form.state(), SubmissionState::InFlight);

        assert_eq!(form.submit().await, Err(FormError::AlreadyInFlight));
        assert_eq!(backend.calls(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "done");
        assert!(matches!(form.state(), SubmissionState::Completed { .. }));

        // Completed forms accept a new submission.
        gate.notify_one();
        assert_eq!(form.submit().await.unwrap(), "done");
        assert_eq!(backend.calls(), 2);
    }
}
