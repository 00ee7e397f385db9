//! Run report
//!
//! Machine-readable summary of one monitor pass, printed at the end of a run
//! and carried in logs for traceability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{DeliveryChannel, EventKind, Observation};

/// Summary of one end-to-end monitor pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Monitor instance label
    pub monitor: String,

    /// Classification outcome
    pub event: EventKind,

    /// Hash of the observed target/fingerprint set, for deduplication
    pub inputs_hash: String,

    /// Targets observed this run
    pub targets_observed: u32,

    /// Targets that failed to resolve this run
    pub warnings: u32,

    /// Channel the notification went through, when one was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_via: Option<DeliveryChannel>,

    /// Final delivery error, when the notification could not be delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_error: Option<String>,

    /// Run start timestamp
    pub started_at: DateTime<Utc>,

    /// Run completion timestamp
    pub completed_at: DateTime<Utc>,

    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "[{}] event={} targets={} warnings={} delivered_via={}",
            self.monitor,
            self.event.as_str(),
            self.targets_observed,
            self.warnings,
            self.delivered_via
                .map(|c| match c {
                    DeliveryChannel::Primary => "primary",
                    DeliveryChannel::Fallback => "fallback",
                })
                .unwrap_or("-"),
        )
    }
}

/// Deterministic hash over the observed target/fingerprint pairs.
///
/// Order-independent: observations are folded in target-id order, so a
/// concurrent probe fan-out always produces the same hash.
pub fn compute_inputs_hash(observations: &[Observation]) -> String {
    let ordered: BTreeMap<&str, Option<&str>> = observations
        .iter()
        .map(|obs| (obs.target_id.as_str(), obs.fingerprint.as_deref()))
        .collect();

    let mut hasher = Sha256::new();
    for (target_id, fingerprint) in ordered {
        hasher.update(target_id.as_bytes());
        hasher.update(b"\x00");
        hasher.update(fingerprint.unwrap_or("").as_bytes());
        hasher.update(b"\x00");
    }
    hex::encode(hasher.finalize())
}
