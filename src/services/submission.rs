mod http;

pub use http::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

use crate::models::Submission;

pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Receipt for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub form_id: String,
    pub reference: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("registration for this form is closed")]
    RegistrationClosed,
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("unexpected error occurred: {0}")]
    UnexpectedError(String),
}

#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit(&self, form_id: &str, submission: &Submission) -> SubmissionResult<Ack>;
}

/// Accepts everything after a fixed delay. Stands in for a backend that does not exist yet.
pub struct SimulatedSubmissionService {
    delay: Duration,
    sequence: AtomicU64,
}

impl SimulatedSubmissionService {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for SimulatedSubmissionService {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl SubmissionService for SimulatedSubmissionService {
    #[tracing::instrument(skip_all, fields(form_id = %form_id, delay = ?self.delay))]
    async fn submit(&self, form_id: &str, _submission: &Submission) -> SubmissionResult<Ack> {
        tracing::info!("submission received");
        tokio::time::sleep(self.delay).await;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Ack {
            form_id: form_id.to_string(),
            reference: format!("SIM-{:06}", sequence),
            received_at: Utc::now(),
        })
    }
}
