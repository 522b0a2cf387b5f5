//! HTTP client for the downstream answering service.
//!
//! Every call runs under the configured timeout; a timeout, transport error,
//! or non-success status is surfaced as an error that the handler maps to
//! `503 service_unavailable` without charging the subject's quota.

use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::Instrument;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const FALLBACK_ANSWER: &str = "I couldn't generate a response.";

/// Answering-service connection settings.
#[derive(Debug)]
pub struct AssistConfig {
    url: String,
    api_key: Option<SecretString>,
    timeout_seconds: u64,
}

impl AssistConfig {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            api_key: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }
}

/// A successful downstream answer.
#[derive(Debug, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
    pub tokens_used: i32,
}

/// Extract the answer text and token count from a service response body.
/// Unknown shapes fall back to a canned reply rather than failing the call.
fn parse_answer(body: &Value) -> Answer {
    let answer = body
        .get("answer")
        .and_then(Value::as_str)
        .or_else(|| body.get("response").and_then(Value::as_str))
        .unwrap_or(FALLBACK_ANSWER)
        .to_string();
    let tokens_used = body
        .get("tokens_used")
        .and_then(Value::as_i64)
        .and_then(|value| i32::try_from(value).ok())
        .unwrap_or(0);
    Answer {
        answer,
        tokens_used,
    }
}

/// Client handle shared by the assist handlers.
pub struct AssistClient {
    client: reqwest::Client,
    config: AssistConfig,
}

impl AssistClient {
    /// Build the client with its bounded timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: AssistConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds().max(1)))
            .build()
            .context("Failed to build answering service HTTP client")?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.config.url()
    }

    /// Forward a question to the answering service.
    ///
    /// # Errors
    /// Returns an error on timeout, transport failure, or non-success status.
    pub async fn ask(&self, student_rollno: &str, question: &str) -> Result<Answer> {
        let span = tracing::info_span!(
            "assist.ask",
            http.method = "POST",
            url = %self.config.url()
        );
        async {
            let mut request = self.client.post(self.config.url()).json(&json!({
                "question": question,
                "student_id": student_rollno,
            }));
            if let Some(key) = self.config.api_key() {
                request = request.bearer_auth(key.expose_secret());
            }

            let response = request
                .send()
                .await
                .context("failed to reach answering service")?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("answering service returned {status}"));
            }

            let body: Value = response
                .json()
                .await
                .context("invalid answering service response")?;
            Ok(parse_answer(&body))
        }
        .instrument(span)
        .await
    }
}
