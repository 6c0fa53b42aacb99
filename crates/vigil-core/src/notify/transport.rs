//! Email transports.
//!
//! A transport performs exactly one delivery attempt per call. Retry
//! cadence comes from how often the scheduler is invoked.

use reqwest::Client;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

use super::message::EmailMessage;
use crate::error::{ConfigError, CoreError, DispatchError};
use crate::storage::{EmailConfig, EmailProvider};

/// Outbound email capability.
pub trait EmailTransport: Send + Sync {
    fn send(
        &self,
        message: &EmailMessage,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Resend HTTP API (`POST /emails` with a bearer key).
pub struct ResendTransport {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendTransport {
    /// Build a transport whose requests are bounded by `timeout`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        })
    }

    /// Build from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Result<Self, CoreError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv(config.api_key_env.clone()))?;
        Ok(Self::new(&config.api_url, api_key, &config.from, timeout)?)
    }
}

impl EmailTransport for ResendTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        let body = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "text": message.text,
            "html": message.html,
        });

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(DispatchError::Rejected { status, body })
        }
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "dry run: emergency email not sent"
        );
        tracing::debug!(body = %message.text, "dry run body");
        Ok(())
    }
}

/// Transport selected by configuration.
pub enum ConfiguredTransport {
    Resend(ResendTransport),
    Log(LogTransport),
}

impl ConfiguredTransport {
    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Result<Self, CoreError> {
        match config.provider {
            EmailProvider::Resend => Ok(Self::Resend(ResendTransport::from_config(config, timeout)?)),
            EmailProvider::Log => Ok(Self::Log(LogTransport)),
        }
    }
}

impl EmailTransport for ConfiguredTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        match self {
            Self::Resend(t) => t.send(message).await,
            Self::Log(t) => t.send(message).await,
        }
    }
}
