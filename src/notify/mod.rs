//! Notifier
//!
//! Delivers a rendered message through the primary channel with bounded
//! retries and exponential backoff; on exhaustion or a permanent rejection,
//! attempts the fallback channel exactly once. No local state is mutated;
//! side effects are confined to network calls.

mod sinks;

pub use sinks::{Address, EmailSink, WebhookSink};

use crate::config::{NotifyConfig, RetryPolicy};
use crate::contracts::DeliveryChannel;
use crate::error::{DeliveryError, Result};

/// Outcome of one delivery request
#[derive(Debug, Clone, Default)]
pub struct DeliveryReceipt {
    /// Channel that accepted the message; absent when nothing was delivered
    pub delivered_via: Option<DeliveryChannel>,

    /// Final error when the message could not be delivered anywhere
    pub error: Option<String>,
}

impl DeliveryReceipt {
    fn delivered(channel: DeliveryChannel) -> Self {
        Self {
            delivered_via: Some(channel),
            error: None,
        }
    }

    /// No recipients configured: nothing to send is not a failure
    fn skipped() -> Self {
        Self::default()
    }
}

enum PrimaryState {
    /// No recipients configured; delivery is a no-op
    Disabled,
    /// Recipients configured but the sink could not be built; surfaced at
    /// delivery time, never blocks the snapshot update
    Misconfigured(String),
    Ready(EmailSink),
}

/// Delivers messages through a primary channel with a single-shot fallback
pub struct Notifier {
    primary: PrimaryState,
    fallback: Option<WebhookSink>,
    retry: RetryPolicy,
}

impl Notifier {
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let primary = match EmailSink::from_config(config) {
            Ok(Some(sink)) => PrimaryState::Ready(sink),
            Ok(None) => PrimaryState::Disabled,
            Err(err) => PrimaryState::Misconfigured(err.to_string()),
        };

        let fallback = WebhookSink::from_config(config)?;

        Ok(Self {
            primary,
            fallback,
            retry: config.retry,
        })
    }

    /// Deliver subject and body through the configured channels.
    ///
    /// Never returns an error; the receipt carries the final failure so the
    /// caller can log it without coupling delivery to persistence.
    pub async fn deliver(&self, subject: &str, body: &str) -> DeliveryReceipt {
        let primary_error = match &self.primary {
            PrimaryState::Disabled => {
                tracing::info!("no recipients configured, skipping notification");
                return DeliveryReceipt::skipped();
            }
            PrimaryState::Misconfigured(reason) => {
                tracing::error!(%reason, "primary channel misconfigured");
                reason.clone()
            }
            PrimaryState::Ready(sink) => match self.send_primary(sink, subject, body).await {
                Ok(()) => return DeliveryReceipt::delivered(DeliveryChannel::Primary),
                Err(err) => err.to_string(),
            },
        };

        match &self.fallback {
            Some(webhook) => match webhook.send(subject, body).await {
                Ok(()) => DeliveryReceipt::delivered(DeliveryChannel::Fallback),
                Err(err) => {
                    tracing::error!(error = %err, "fallback webhook failed");
                    DeliveryReceipt {
                        delivered_via: None,
                        error: Some(format!("{}; fallback: {}", primary_error, err)),
                    }
                }
            },
            None => DeliveryReceipt {
                delivered_via: None,
                error: Some(primary_error),
            },
        }
    }

    /// Primary channel with bounded retries. Transient failures back off
    /// exponentially; a permanent rejection aborts immediately.
    async fn send_primary(
        &self,
        sink: &EmailSink,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), DeliveryError> {
        let mut delay = self.retry.base_delay;
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            match sink.send(subject, body).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_permanent() => {
                    tracing::error!(attempt, error = %err, "permanent rejection, not retrying");
                    return Err(err);
                }
                Err(err) if attempt == attempts => {
                    tracing::error!(attempt, error = %err, "primary attempts exhausted");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64,
                        "transient delivery failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
        unreachable!("retry loop returns on the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(send_url: String, webhook_url: Option<String>) -> NotifyConfig {
        NotifyConfig {
            recipients: vec!["dev@example.fi".to_string()],
            sender: Some("Monitor <monitor@example.fi>".to_string()),
            api_key: Some("key".to_string()),
            secret_key: Some("secret".to_string()),
            send_url,
            webhook_url,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    #[tokio::test]
    async fn test_primary_success_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.1/send"))
            .and(body_partial_json(serde_json::json!({
                "Messages": [{"From": {"Email": "monitor@example.fi", "Name": "Monitor"}}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(format!("{}/v3.1/send", server.uri()), None);
        let notifier = Notifier::from_config(&config).unwrap();
        let receipt = notifier.deliver("subject", "body").await;

        assert_eq!(receipt.delivered_via, Some(DeliveryChannel::Primary));
        assert!(receipt.error.is_none());
    }

    #[tokio::test]
    async fn test_permanent_error_no_retry_one_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.1/send"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(
            format!("{}/v3.1/send", server.uri()),
            Some(format!("{}/hook", server.uri())),
        );
        let notifier = Notifier::from_config(&config).unwrap();
        let receipt = notifier.deliver("subject", "body").await;

        assert_eq!(receipt.delivered_via, Some(DeliveryChannel::Fallback));
    }

    #[tokio::test]
    async fn test_transient_errors_retry_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.1/send"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "text": "subject\n\nbody"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(
            format!("{}/v3.1/send", server.uri()),
            Some(format!("{}/hook", server.uri())),
        );
        let notifier = Notifier::from_config(&config).unwrap();
        let receipt = notifier.deliver("subject", "body").await;

        assert_eq!(receipt.delivered_via, Some(DeliveryChannel::Fallback));
    }

    #[tokio::test]
    async fn test_both_channels_failing_surfaces_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.1/send"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(
            format!("{}/v3.1/send", server.uri()),
            Some(format!("{}/hook", server.uri())),
        );
        let notifier = Notifier::from_config(&config).unwrap();
        let receipt = notifier.deliver("subject", "body").await;

        assert!(receipt.delivered_via.is_none());
        assert!(receipt.error.as_deref().unwrap().contains("fallback"));
    }

    #[tokio::test]
    async fn test_no_recipients_is_noop_success() {
        let config = NotifyConfig::default();
        let notifier = Notifier::from_config(&config).unwrap();
        let receipt = notifier.deliver("subject", "body").await;

        assert!(receipt.delivered_via.is_none());
        assert!(receipt.error.is_none());
    }

    #[tokio::test]
    async fn test_misconfigured_primary_still_reaches_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = NotifyConfig {
            recipients: vec!["dev@example.fi".to_string()],
            webhook_url: Some(format!("{}/hook", server.uri())),
            ..Default::default()
        };
        let notifier = Notifier::from_config(&config).unwrap();
        let receipt = notifier.deliver("subject", "body").await;

        assert_eq!(receipt.delivered_via, Some(DeliveryChannel::Fallback));
    }
}
