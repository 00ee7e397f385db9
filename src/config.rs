//! Monitor configuration
//!
//! Materialized once at process start and passed by reference into the run
//! controller, notifier and probes. Core logic performs no ambient
//! environment lookups.

use chrono::Duration as ChronoDuration;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one monitor instance
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Label used as the message prefix and run-report monitor id
    pub label: String,

    /// Path of the snapshot JSON document
    pub state_path: PathBuf,

    /// Silence period after which a healthcheck is sent; `None` disables
    /// healthchecks entirely
    pub healthcheck_interval: Option<ChronoDuration>,

    /// Notification channel configuration
    pub notify: NotifyConfig,
}

impl MonitorConfig {
    /// Interpret a day count the way the environment encodes it: 0 disables
    pub fn healthcheck_from_days(days: i64) -> Option<ChronoDuration> {
        (days > 0).then(|| ChronoDuration::days(days))
    }
}

/// Notification channel configuration
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    /// Recipient addresses; empty list means notifications are skipped
    pub recipients: Vec<String>,

    /// Sender, optionally in `Display Name <address>` form
    pub sender: Option<String>,

    /// Primary channel basic-auth credentials
    pub api_key: Option<String>,
    pub secret_key: Option<String>,

    /// Primary channel send endpoint
    pub send_url: String,

    /// Fallback webhook URL, used at most once per delivery
    pub webhook_url: Option<String>,

    /// Retry behavior of the primary channel
    pub retry: RetryPolicy,
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts on the primary channel before giving up
    pub max_attempts: u32,

    /// Delay before the first retry; doubles after each attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Split a comma-separated recipient list, dropping empty entries
pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
