//! Analyzer client. The single point of entry for every call to the remote
//! analysis service: the liveness probe and the analyze upload.
//!
//! The probe carries a hard per-attempt timeout. The analyze request has none and
//! relies on the transport's defaults.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::AnalyzeError;
use crate::form::upload::ResumeFile;
use crate::form::{AnalyzeBackend, AnalyzeReply};
use crate::status::prober::{LivenessProbe, ProbeOutcome, TransportFailure};

const HEALTH_PATH: &str = "/";
const ANALYZE_PATH: &str = "/analyze/";
const RESUME_FIELD: &str = "resume";
const JOB_DESCRIPTION_FIELD: &str = "job_description";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct AnalyzerClient {
    client: Client,
    origin: String,
    probe_timeout: Duration,
}

impl AnalyzerClient {
    /// `origin` must not end with a slash; `Config` normalizes it.
    pub fn new(origin: impl Into<String>, probe_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .user_agent(concat!("analyzer/", env!("CARGO_PKG_VERSION")))
                .build()?,
            origin: origin.into(),
            probe_timeout,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    /// GET the service root. Never fails: transport errors are folded into the outcome.
    pub async fn ping(&self) -> ProbeOutcome {
        let started = Instant::now();
        let response = self
            .client
            .get(self.endpoint(HEALTH_PATH))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.probe_timeout)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let code = response.status().as_u16();
                let outcome = ProbeOutcome::from_http_status(code);
                debug!(code, latency_ms, status = ?outcome.status, "Liveness probe answered");
                outcome
            }
            Err(e) => {
                let failure = classify_error(&e);
                warn!(?failure, latency_ms, "Liveness probe failed: {e}");
                ProbeOutcome::from_failure(failure)
            }
        }
    }

    /// POST the resume and job description as multipart form data.
    pub async fn analyze(
        &self,
        resume: &ResumeFile,
        job_description: &str,
    ) -> Result<AnalyzeReply, AnalyzeError> {
        let part = Part::bytes(resume.bytes.to_vec())
            .file_name(resume.name.clone())
            .mime_str(&resume.mime)?;
        let form = Form::new()
            .part(RESUME_FIELD, part)
            .text(JOB_DESCRIPTION_FIELD, job_description.to_string());

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint(ANALYZE_PATH))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        info!(
            code = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Analyze request answered"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalyzeError::RateLimited);
        }

        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error);
            return Err(AnalyzeError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!("Analyze response is not a JSON object: {e}");
            AnalyzeReply::default()
        }))
    }
}

/// Timeouts and connection-level failures look like a cold start; anything else
/// (invalid URL, redirect loop, body errors) means the service is unusable.
fn classify_error(e: &reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::Timeout
    } else if e.is_connect() || e.is_request() {
        TransportFailure::Connect
    } else {
        TransportFailure::Other
    }
}

#[async_trait]
impl LivenessProbe for AnalyzerClient {
    async fn check(&self) -> ProbeOutcome {
        self.ping().await
    }
}

#[async_trait]
impl AnalyzeBackend for AnalyzerClient {
    async fn analyze(
        &self,
        resume: &ResumeFile,
        job_description: &str,
    ) -> Result<AnalyzeReply, AnalyzeError> {
        AnalyzerClient::analyze(self, resume, job_description).await
    }
}
