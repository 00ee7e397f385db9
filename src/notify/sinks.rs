//! Notification sinks
//!
//! Transport implementations for the two channels: the email-delivery API
//! (primary) and the chat webhook (fallback).

use std::time::Duration;

use serde::Serialize;

use crate::config::NotifyConfig;
use crate::error::DeliveryError;

const EMAIL_TIMEOUT: Duration = Duration::from_secs(15);
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Primary sink: Mailjet-compatible send endpoint with basic auth
pub struct EmailSink {
    client: reqwest::Client,
    url: String,
    api_key: String,
    secret_key: String,
    from: Address,
    recipients: Vec<String>,
}

impl EmailSink {
    /// Build the sink from configuration.
    ///
    /// Returns `Ok(None)` when no recipients are configured (delivery is a
    /// documented no-op), and a configuration error when recipients exist
    /// but credentials or the sender are missing.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, DeliveryError> {
        if config.recipients.is_empty() {
            return Ok(None);
        }

        let (api_key, secret_key, sender) = match (
            config.api_key.as_deref(),
            config.secret_key.as_deref(),
            config.sender.as_deref(),
        ) {
            (Some(api_key), Some(secret_key), Some(sender)) => (api_key, secret_key, sender),
            _ => {
                return Err(DeliveryError::Config(
                    "recipients configured but credentials or sender missing".to_string(),
                ));
            }
        };

        let client = reqwest::Client::builder()
            .timeout(EMAIL_TIMEOUT)
            .build()
            .map_err(|err| DeliveryError::Config(format!("cannot build HTTP client: {}", err)))?;

        Ok(Some(Self {
            client,
            url: config.send_url.clone(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            from: Address::parse(sender),
            recipients: config.recipients.clone(),
        }))
    }

    pub async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let payload = SendPayload {
            messages: vec![EmailMessage {
                from: self.from.clone(),
                to: self
                    .recipients
                    .iter()
                    .map(|email| Address {
                        email: email.clone(),
                        name: None,
                    })
                    .collect(),
                subject: subject.to_string(),
                text_part: body.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if matches!(status, 200 | 201 | 202) {
            tracing::info!(status, "email accepted by delivery API");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(DeliveryError::from_status(status, text))
    }
}

/// Fallback sink: single-text-field webhook
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, DeliveryError> {
        let Some(url) = config.webhook_url.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|err| DeliveryError::Config(format!("cannot build HTTP client: {}", err)))?;

        Ok(Some(Self { client, url }))
    }

    pub async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            text: format!("{}\n\n{}", subject, body),
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            tracing::info!(status, "fallback webhook accepted");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(DeliveryError::from_status(status, text))
    }
}

/// Sender or recipient address in the delivery API payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    /// Parse `Display Name <address>` into its parts; a bare address has no
    /// display name.
    pub fn parse(raw: &str) -> Self {
        if let (Some(open), Some(close)) = (raw.find('<'), raw.rfind('>')) {
            if open < close {
                let name = raw[..open].trim();
                return Self {
                    email: raw[open + 1..close].trim().to_string(),
                    name: (!name.is_empty()).then(|| name.to_string()),
                };
            }
        }
        Self {
            email: raw.trim().to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendPayload {
    messages: Vec<EmailMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailMessage {
    from: Address,
    to: Vec<Address>,
    subject: String,
    text_part: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    text: String,
}
