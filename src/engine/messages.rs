//! Event message templates
//!
//! Renders the subject and plain-text body for each notifying event kind.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{RunOutcome, TargetChange};
use crate::contracts::{EventKind, Observation, Snapshot, TargetDetail};

/// Rendered notification message
#[derive(Debug, Clone)]
pub struct EventMessage {
    pub subject: String,
    pub body: String,
}

/// Render the message for a classified run; `None` for non-notifying events.
pub fn render(
    label: &str,
    outcome: &RunOutcome,
    observations: &[Observation],
    now: DateTime<Utc>,
) -> Option<EventMessage> {
    match outcome.event {
        EventKind::Startup => Some(startup(label, observations, &outcome.warnings, now)),
        EventKind::Change => Some(change(label, &outcome.changes, &outcome.warnings, now)),
        EventKind::Healthcheck => {
            Some(healthcheck(label, &outcome.snapshot, &outcome.warnings, now))
        }
        EventKind::None => None,
    }
}

fn startup(
    label: &str,
    observations: &[Observation],
    warnings: &[String],
    now: DateTime<Utc>,
) -> EventMessage {
    let mut lines = vec![
        format!("[{}][STARTUP] Monitor initialized and fetched initial state.", label),
        String::new(),
        "Targets:".to_string(),
    ];
    for obs in observations {
        lines.push(format!("- {}", obs.target_id));
        lines.push(format!("  fingerprint: {}", fingerprint_or_absent(&obs.fingerprint)));
        push_detail(&mut lines, &obs.detail);
    }
    push_footer(&mut lines, warnings, now);

    EventMessage {
        subject: format!("{}: STARTUP", label),
        body: lines.join("\n"),
    }
}

fn change(
    label: &str,
    changes: &[TargetChange],
    warnings: &[String],
    now: DateTime<Utc>,
) -> EventMessage {
    let mut lines = vec![
        format!("[{}][CHANGE] Monitored state changed.", label),
        String::new(),
        "Changes:".to_string(),
    ];
    for change in changes {
        lines.push(format!("- {}", change.target_id));
        lines.push(format!(
            "  {} -> {}",
            fingerprint_or_absent(&change.previous.fingerprint),
            fingerprint_or_absent(&change.current.fingerprint),
        ));
        push_detail(&mut lines, &change.current.detail);
    }
    push_footer(&mut lines, warnings, now);

    EventMessage {
        subject: format!("{}: CHANGE detected", label),
        body: lines.join("\n"),
    }
}

fn healthcheck(
    label: &str,
    snapshot: &Snapshot,
    warnings: &[String],
    now: DateTime<Utc>,
) -> EventMessage {
    let mut lines = vec![
        format!("[{}][HEALTHCHECK] No changes detected.", label),
        String::new(),
        "Current state:".to_string(),
    ];
    for (target_id, state) in &snapshot.targets {
        lines.push(format!("- {}", target_id));
        lines.push(format!("  fingerprint: {}", fingerprint_or_absent(&state.fingerprint)));
        push_detail(&mut lines, &state.detail);
    }
    push_footer(&mut lines, warnings, now);

    EventMessage {
        subject: format!("{}: HEALTHCHECK — no changes", label),
        body: lines.join("\n"),
    }
}

fn fingerprint_or_absent(fingerprint: &Option<String>) -> &str {
    fingerprint.as_deref().unwrap_or("(absent)")
}

fn push_detail(lines: &mut Vec<String>, detail: &TargetDetail) {
    if let Some(timestamp) = &detail.timestamp {
        lines.push(format!("  timestamp: {}", timestamp));
    }
    if let Some(url) = &detail.url {
        lines.push(format!("  url: {}", url));
    }
}

fn push_footer(lines: &mut Vec<String>, warnings: &[String], now: DateTime<Utc>) {
    if !warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings/errors:".to_string());
        for warning in warnings {
            lines.push(format!("- {}", warning));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "Checked at: {}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
}
