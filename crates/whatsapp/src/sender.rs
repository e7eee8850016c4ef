use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use courtside_core::config::WhatsappConfig;

const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("whatsapp transport is not configured: {0}")]
    NotConfigured(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Accepted { provider_id: Option<String> },
    Rejected { status: u16, detail: String },
    Failed { detail: String },
    /// The no-op sender swallowed the message.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub to: String,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Accepted { .. } | DeliveryOutcome::Skipped)
    }
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> DeliveryReport;
}

/// Used when no Twilio credentials are configured; replies are only logged.
#[derive(Default)]
pub struct NoopSender;

#[async_trait]
impl MessageSender for NoopSender {
    async fn send(&self, to: &str, text: &str) -> DeliveryReport {
        info!(
            event_name = "egress.whatsapp.skipped",
            to,
            chars = text.chars().count(),
            "whatsapp sender not configured; reply not delivered"
        );
        DeliveryReport { to: to.to_string(), outcome: DeliveryOutcome::Skipped }
    }
}

/// Keeps every outbound message in memory. Can be told to fail every send.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    fail_with: Option<String>,
}

impl RecordingSender {
    pub fn failing(detail: impl Into<String>) -> Self {
        Self { sent: Mutex::default(), fail_with: Some(detail.into()) }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, to: &str, text: &str) -> DeliveryReport {
        self.sent.lock().await.push((to.to_string(), text.to_string()));
        let outcome = match &self.fail_with {
            Some(detail) => DeliveryOutcome::Failed { detail: detail.clone() },
            None => DeliveryOutcome::Accepted { provider_id: None },
        };
        DeliveryReport { to: to.to_string(), outcome }
    }
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: Option<String>,
}

/// Sends through Twilio's Messages REST endpoint with basic auth.
pub struct TwilioSender {
    client: reqwest::Client,
    api_base_url: String,
    account_sid: SecretString,
    auth_token: SecretString,
    from_number: String,
}

impl std::fmt::Debug for TwilioSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioSender")
            .field("api_base_url", &self.api_base_url)
            .field("from_number", &self.from_number)
            .finish_non_exhaustive()
    }
}

impl TwilioSender {
    pub fn from_config(config: &WhatsappConfig) -> Result<Self, TransportError> {
        if !config.is_configured() {
            return Err(TransportError::NotConfigured(
                "account_sid, auth_token and from_number are required".to_string(),
            ));
        }
        let (Some(account_sid), Some(auth_token), Some(from_number)) =
            (config.account_sid.clone(), config.auth_token.clone(), config.from_number.clone())
        else {
            return Err(TransportError::NotConfigured("incomplete credentials".to_string()));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| TransportError::Client(error.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number: with_whatsapp_prefix(&from_number),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base_url,
            self.account_sid.expose_secret()
        )
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send(&self, to: &str, text: &str) -> DeliveryReport {
        let to = with_whatsapp_prefix(to);
        let params = [("From", self.from_number.as_str()), ("To", to.as_str()), ("Body", text)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(self.account_sid.expose_secret(), Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await;

        let outcome = match response {
            Ok(response) if response.status().is_success() => {
                let provider_id = response
                    .json::<TwilioMessageResponse>()
                    .await
                    .ok()
                    .and_then(|payload| payload.sid);
                info!(
                    event_name = "egress.whatsapp.sent",
                    to = %to,
                    provider_id = provider_id.as_deref().unwrap_or("unknown"),
                    "whatsapp reply accepted by twilio"
                );
                DeliveryOutcome::Accepted { provider_id }
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let detail = response.text().await.unwrap_or_default();
                warn!(
                    event_name = "egress.whatsapp.rejected",
                    to = %to,
                    status,
                    detail = %detail,
                    "twilio rejected whatsapp reply"
                );
                DeliveryOutcome::Rejected { status, detail }
            }
            Err(error) => {
                warn!(
                    event_name = "egress.whatsapp.failed",
                    to = %to,
                    error = %error,
                    "whatsapp reply could not reach twilio"
                );
                DeliveryOutcome::Failed { detail: error.to_string() }
            }
        };

        DeliveryReport { to, outcome }
    }
}

fn with_whatsapp_prefix(number: &str) -> String {
    let trimmed = number.trim();
    if trimmed.starts_with(WHATSAPP_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{trimmed}")
    }
}
