use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde_derive::{Deserialize, Serialize};

use super::{Ack, SubmissionError, SubmissionResult, SubmissionService};
use crate::models::Submission;

pub struct HttpSubmissionService {
    config: HttpSubmissionServiceConfig,
    client: Client,
}

pub struct HttpSubmissionServiceConfig {
    pub baseurl: String,
    pub token: Option<String>,
}

impl HttpSubmissionService {
    pub fn new(config: HttpSubmissionServiceConfig) -> anyhow::Result<Self> {
        let mut header_map = HeaderMap::new();
        if let Some(token) = &config.token {
            header_map.insert("Authorization", format!("Bearer {}", token).parse()?);
        }

        let client = ClientBuilder::new()
            .user_agent("regforms")
            .default_headers(header_map)
            .build()?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, form_id: &str) -> String {
        format!(
            "{}/forms/{}/submissions",
            self.config.baseurl.trim_end_matches('/'),
            form_id
        )
    }
}

#[async_trait]
impl SubmissionService for HttpSubmissionService {
    #[tracing::instrument(skip_all, fields(form_id = %form_id))]
    async fn submit(&self, form_id: &str, submission: &Submission) -> SubmissionResult<Ack> {
        tracing::info!("submit request received");

        let response = self
            .client
            .post(self.endpoint(form_id))
            .json(&HttpSubmitRequest { form_id, submission })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body = response.json::<HttpSubmitResponse>().await?;
                Ok(Ack {
                    form_id: form_id.to_string(),
                    reference: body.reference,
                    received_at: body.received_at.unwrap_or_else(Utc::now),
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(SubmissionError::Rejected(response.text().await?))
            }
            StatusCode::FORBIDDEN | StatusCode::GONE => Err(SubmissionError::RegistrationClosed),
            status => Err(SubmissionError::UnexpectedError(format!(
                "unexpected status code {} returned from upstream server",
                status
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpSubmitRequest<'a> {
    form_id: &'a str,
    submission: &'a Submission,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpSubmitResponse {
    reference: String,
    #[serde(default)]
    received_at: Option<chrono::DateTime<Utc>>,
}
