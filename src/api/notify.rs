//! Out-of-band delivery of one-time codes.
//!
//! Issuance handlers enqueue a [`CodeMail`] on a bounded in-process queue and
//! return to the caller immediately; a background worker drains the queue and
//! hands each message to a [`MailSender`]. Delivery is best-effort: outcomes
//! are logged server-side and never surfaced to the requester.
//!
//! The plaintext code exists only in the queued message and the provider
//! request body. It is never written to the database or to the logs.
//!
//! The default sender for local dev is [`LogMailSender`]; configuring an API
//! key switches to [`BrevoMailSender`], which posts to the transactional mail
//! HTTP API (`POST {base}/v3/smtp/email`).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const DEFAULT_QUEUE_DEPTH: usize = 64;

/// What the delivered code is for; selects the subject line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailPurpose {
    PasswordReset,
    EmailVerification,
}

impl MailPurpose {
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::PasswordReset => "Reset your password – OTP",
            Self::EmailVerification => "Verify your email – OTP",
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::EmailVerification => "email_verification",
        }
    }
}

/// A code waiting for out-of-band delivery.
#[derive(Debug)]
pub struct CodeMail {
    pub to: String,
    pub code: SecretString,
    pub purpose: MailPurpose,
}

/// Mail delivery abstraction used by the background worker.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a message or return an error to be logged by the worker.
    async fn send(&self, mail: &CodeMail) -> Result<()>;
}

/// Local dev sender that logs the delivery attempt instead of sending real
/// mail. The code itself is never logged.
#[derive(Clone, Copy, Debug)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: &CodeMail) -> Result<()> {
        info!(
            to = %mail.to,
            purpose = mail.purpose.as_str(),
            "code mail send stub"
        );
        Ok(())
    }
}

/// Sender backed by the Brevo-style transactional mail HTTP API.
pub struct BrevoMailSender {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    from_email: String,
    from_name: String,
}

impl BrevoMailSender {
    /// Build a sender for the configured API base URL and key.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &MailConfig, api_key: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build mail HTTP client")?;
        let endpoint = format!("{}/v3/smtp/email", config.api_url().trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            api_key,
            from_email: config.from_email().to_string(),
            from_name: config.from_name().to_string(),
        })
    }
}

#[async_trait]
impl MailSender for BrevoMailSender {
    async fn send(&self, mail: &CodeMail) -> Result<()> {
        let subject = mail.purpose.subject();
        let html = format!(
            concat!(
                r#"<div style="font-family: Arial, sans-serif">"#,
                "<h2>{subject}</h2>",
                "<p>Your OTP is:</p>",
                r#"<h1 style="letter-spacing: 6px">{code}</h1>"#,
                "<p>This OTP is valid for <b>5 minutes</b>.</p>",
                "<p>If you did not request this, please ignore this email.</p>",
                "</div>"
            ),
            subject = subject,
            code = mail.code.expose_secret(),
        );
        let payload = json!({
            "sender": {
                "email": self.from_email,
                "name": self.from_name,
            },
            "to": [{ "email": mail.to }],
            "subject": subject,
            "htmlContent": html,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .context("failed to reach mail API")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("mail API returned {status}"));
        }
        Ok(())
    }
}

/// Mail delivery configuration.
#[derive(Debug)]
pub struct MailConfig {
    api_url: String,
    api_key: Option<SecretString>,
    from_email: String,
    from_name: String,
    queue_depth: usize,
}

impl MailConfig {
    #[must_use]
    pub fn new(api_url: String, from_email: String, from_name: String) -> Self {
        Self {
            api_url,
            api_key: None,
            from_email,
            from_name,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    #[must_use]
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    #[must_use]
    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    #[must_use]
    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.max(1)
    }

    /// Pick the sender implementation: real API when a key is configured,
    /// log-only otherwise.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn sender(&self) -> Result<Arc<dyn MailSender>> {
        match &self.api_key {
            Some(key) => Ok(Arc::new(BrevoMailSender::new(self, key.clone())?)),
            None => Ok(Arc::new(LogMailSender)),
        }
    }
}

/// Handle used by request handlers to enqueue a delivery.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<CodeMail>,
}

impl Notifier {
    /// Enqueue a code for delivery. The caller's response does not depend on
    /// the outcome; a full queue only loses a best-effort delivery.
    pub fn dispatch(&self, mail: CodeMail) {
        match self.tx.try_send(mail) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(mail)) => {
                warn!(to = %mail.to, "mail queue full, dropping code delivery");
            }
            Err(mpsc::error::TrySendError::Closed(mail)) => {
                error!(to = %mail.to, "mail worker stopped, dropping code delivery");
            }
        }
    }
}

/// Spawn the background delivery worker and return the enqueue handle.
#[must_use]
pub fn spawn_delivery_worker(
    sender: Arc<dyn MailSender>,
    queue_depth: usize,
) -> (Notifier, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(queue_depth.max(1));
    let handle = tokio::spawn(async move {
        while let Some(mail) = rx.recv().await {
            match sender.send(&mail).await {
                Ok(()) => info!(
                    to = %mail.to,
                    purpose = mail.purpose.as_str(),
                    "code mail delivered"
                ),
                Err(err) => error!(
                    to = %mail.to,
                    purpose = mail.purpose.as_str(),
                    "code mail delivery failed: {err}"
                ),
            }
        }
    });
    (Notifier { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSender {
        delivered: Mutex<Vec<(String, MailPurpose)>>,
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send(&self, mail: &CodeMail) -> Result<()> {
            self.delivered
                .lock()
                .expect("poisoned")
                .push((mail.to.clone(), mail.purpose));
            Ok(())
        }
    }

    fn mail(to: &str) -> CodeMail {
        CodeMail {
            to: to.to_string(),
            code: SecretString::from("482913".to_string()),
            purpose: MailPurpose::PasswordReset,
        }
    }

    #[test]
    fn purpose_subjects() {
        assert_eq!(
            MailPurpose::PasswordReset.subject(),
            "Reset your password – OTP"
        );
        assert_eq!(
            MailPurpose::EmailVerification.subject(),
            "Verify your email – OTP"
        );
    }

    #[test]
    fn mail_config_defaults_and_overrides() {
        let config = MailConfig::new(
            "https://api.brevo.com/".to_string(),
            "no-reply@upasthit.com".to_string(),
            "Upasthit".to_string(),
        );
        assert_eq!(config.queue_depth(), DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.from_name(), "Upasthit");

        let config = config.with_queue_depth(0);
        // Zero capacity is not a valid channel size; clamp to 1.
        assert_eq!(config.queue_depth(), 1);
    }

    #[tokio::test]
    async fn worker_delivers_queued_mail() {
        let sender = Arc::new(RecordingSender {
            delivered: Mutex::new(Vec::new()),
        });
        let (notifier, handle) = spawn_delivery_worker(sender.clone(), 4);

        notifier.dispatch(mail("alice@example.com"));
        notifier.dispatch(mail("bob@example.com"));
        drop(notifier);

        handle.await.expect("worker");
        let delivered = sender.delivered.lock().expect("poisoned");
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, "alice@example.com");
        assert_eq!(delivered[0].1, MailPurpose::PasswordReset);
    }

    #[tokio::test]
    async fn dispatch_on_full_queue_drops_quietly() {
        // No worker draining: the second dispatch hits a full queue.
        let (tx, _rx) = mpsc::channel(1);
        let notifier = Notifier { tx };
        notifier.dispatch(mail("alice@example.com"));
        notifier.dispatch(mail("bob@example.com"));
    }

    #[tokio::test]
    async fn log_sender_accepts_mail() {
        let sender = LogMailSender;
        let result = sender.send(&mail("alice@example.com")).await;
        assert!(result.is_ok());
    }
}
