use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

/// A fully rendered message, ready for the transport. The sender address
/// belongs to the transport configuration, not to the message.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rejected: status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// One delivery attempt. Success means the transport accepted the
    /// message (2xx), not that it reached an inbox.
    async fn send(&self, email: &Email) -> Result<(), MailerError>;
}

// ---------------- Resend-backed transport ----------------

pub const DEFAULT_API_BASE: &str = "https://api.resend.com";

pub struct ResendMailer {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("RESEND_API_KEY")
            .map_err(|_| anyhow::anyhow!("RESEND_API_KEY must be set"))?;
        let api_base =
            std::env::var("RESEND_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let from = std::env::var("FROM_EMAIL")
            .unwrap_or_else(|_| "Telloo <notifications@telloo.com>".to_string());
        Ok(Self::new(api_base, api_key, from))
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let resp = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": email.to,
                "subject": email.subject,
                "html": email.html,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MailerError::Rejected { status: status.as_u16(), body })
    }
}

// ---------------- Log-only transport ----------------

/// Dev fallback when no API key is configured: logs instead of delivering,
/// and reports every message as accepted.
#[derive(Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        info!("noop mailer: would send '{}' to {}", email.subject, email.to);
        Ok(())
    }
}

// Factory helper used in main
pub fn build_mailer() -> Arc<dyn Mailer> {
    match ResendMailer::from_env() {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!("{e}; falling back to noop mailer (emails will be logged, not sent)");
            Arc::new(NoopMailer)
        }
    }
}
