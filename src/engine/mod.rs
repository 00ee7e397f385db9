//! Change engine
//!
//! The core decision logic: compares fresh observations against the stored
//! snapshot, classifies the run into exactly one event, renders and sends
//! the notification, and computes the snapshot update. The snapshot update
//! is independent of delivery outcome; a permanently broken channel must not
//! cause re-notification loops.

mod messages;

pub use messages::{render, EventMessage};

use chrono::{DateTime, Duration, Utc};

use crate::contracts::{EventKind, Observation, Snapshot, TargetState};
use crate::notify::{DeliveryReceipt, Notifier};

/// Classification result plus the snapshot to persist
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The single event this run classified into
    pub event: EventKind,

    /// Targets whose known fingerprint changed (CHANGE only)
    pub changes: Vec<TargetChange>,

    /// Targets that failed to resolve this run
    pub warnings: Vec<String>,

    /// Snapshot to persist, regardless of delivery outcome
    pub snapshot: Snapshot,
}

/// One fingerprint transition within a CHANGE event
#[derive(Debug, Clone)]
pub struct TargetChange {
    pub target_id: String,
    pub previous: TargetState,
    pub current: TargetState,
}

/// Classify one run.
///
/// Evaluated in strict priority order over the whole observation batch:
/// STARTUP, CHANGE, HEALTHCHECK, NONE. Classification is order-independent;
/// observations are folded through the per-target mapping.
pub fn classify(
    prior: &Snapshot,
    observations: &[Observation],
    now: DateTime<Utc>,
    healthcheck_interval: Option<Duration>,
) -> RunOutcome {
    let warnings: Vec<String> = observations
        .iter()
        .filter_map(|obs| {
            obs.fetch_error
                .as_ref()
                .map(|err| format!("{}: {}", obs.target_id, err))
        })
        .collect();

    let mut next = prior.clone();
    next.last_checked_at = Some(now);

    // First run ever: record the baseline, absent fingerprints included.
    if !prior.initialized {
        next.initialized = true;
        next.targets = observations
            .iter()
            .map(|obs| {
                (
                    obs.target_id.clone(),
                    TargetState {
                        fingerprint: obs.fingerprint.clone(),
                        detail: obs.detail.clone(),
                    },
                )
            })
            .collect();
        next.last_healthcheck_sent_at = healthcheck_interval.is_some().then_some(now);

        return RunOutcome {
            event: EventKind::Startup,
            changes: Vec::new(),
            warnings,
            snapshot: next,
        };
    }

    // Refresh stored state from every resolved fingerprint and collect the
    // transitions where a previously-known fingerprint differs. A target
    // whose fingerprint newly becomes absent keeps its stored value.
    let mut changes = Vec::new();
    for obs in observations {
        let Some(fingerprint) = &obs.fingerprint else {
            continue;
        };

        let current = TargetState {
            fingerprint: Some(fingerprint.clone()),
            detail: obs.detail.clone(),
        };

        if let Some(previous) = prior.targets.get(&obs.target_id) {
            if let Some(known) = &previous.fingerprint {
                if known != fingerprint {
                    changes.push(TargetChange {
                        target_id: obs.target_id.clone(),
                        previous: previous.clone(),
                        current: current.clone(),
                    });
                }
            }
        }

        next.targets.insert(obs.target_id.clone(), current);
    }

    if !changes.is_empty() {
        return RunOutcome {
            event: EventKind::Change,
            changes,
            warnings,
            snapshot: next,
        };
    }

    if let Some(interval) = healthcheck_interval {
        let due = match prior.last_healthcheck_sent_at {
            None => true,
            Some(sent_at) => now - sent_at >= interval,
        };
        if due {
            next.last_healthcheck_sent_at = Some(now);
            return RunOutcome {
                event: EventKind::Healthcheck,
                changes: Vec::new(),
                warnings,
                snapshot: next,
            };
        }
    }

    RunOutcome {
        event: EventKind::None,
        changes: Vec::new(),
        warnings,
        snapshot: next,
    }
}

/// Classifies runs and drives the notifier for notifying events
pub struct ChangeEngine {
    label: String,
    healthcheck_interval: Option<Duration>,
}

impl ChangeEngine {
    pub fn new(label: impl Into<String>, healthcheck_interval: Option<Duration>) -> Self {
        Self {
            label: label.into(),
            healthcheck_interval,
        }
    }

    /// Classify the batch and, for notifying events, deliver the rendered
    /// message. Delivery failure is logged and surfaced in the receipt but
    /// never alters the returned snapshot.
    pub async fn run(
        &self,
        prior: &Snapshot,
        observations: &[Observation],
        now: DateTime<Utc>,
        notifier: &Notifier,
    ) -> (RunOutcome, Option<DeliveryReceipt>) {
        let outcome = classify(prior, observations, now, self.healthcheck_interval);
        tracing::info!(
            monitor = %self.label,
            event = outcome.event.as_str(),
            changes = outcome.changes.len(),
            warnings = outcome.warnings.len(),
            "run classified"
        );

        let Some(message) = render(&self.label, &outcome, observations, now) else {
            return (outcome, None);
        };

        let receipt = notifier.deliver(&message.subject, &message.body).await;
        if let Some(error) = &receipt.error {
            tracing::error!(
                monitor = %self.label,
                event = outcome.event.as_str(),
                %error,
                "notification delivery failed, snapshot update proceeds"
            );
        }

        (outcome, Some(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::TargetDetail;
    use proptest::prelude::*;

    fn obs(target_id: &str, fingerprint: Option<&str>) -> Observation {
        match fingerprint {
            Some(fp) => Observation::resolved(target_id, fp, TargetDetail::default()),
            None => Observation::failed(target_id, "fetch failed: timeout"),
        }
    }

    fn initialized_snapshot(targets: &[(&str, Option<&str>)]) -> Snapshot {
        let mut snapshot = Snapshot {
            initialized: true,
            last_checked_at: Some(Utc::now()),
            ..Default::default()
        };
        for (target_id, fingerprint) in targets {
            snapshot.targets.insert(
                target_id.to_string(),
                TargetState {
                    fingerprint: fingerprint.map(str::to_string),
                    detail: TargetDetail::default(),
                },
            );
        }
        snapshot
    }

    #[test]
    fn test_uninitialized_classifies_startup() {
        let observations = vec![obs("A", Some("abc123")), obs("B", None)];
        let outcome = classify(
            &Snapshot::default(),
            &observations,
            Utc::now(),
            Some(Duration::days(7)),
        );

        assert_eq!(outcome.event, EventKind::Startup);
        assert!(outcome.snapshot.initialized);
        // Baseline records absent fingerprints too.
        assert!(outcome.snapshot.targets.contains_key("B"));
        assert_eq!(outcome.snapshot.fingerprint("A"), Some("abc123"));
        assert!(outcome.snapshot.last_healthcheck_sent_at.is_some());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_startup_without_healthcheck_leaves_marker_absent() {
        let outcome = classify(
            &Snapshot::default(),
            &[obs("A", Some("1.0.0"))],
            Utc::now(),
            None,
        );
        assert_eq!(outcome.event, EventKind::Startup);
        assert!(outcome.snapshot.last_healthcheck_sent_at.is_none());
    }

    #[test]
    fn test_differing_fingerprint_classifies_change() {
        let prior = initialized_snapshot(&[("A", Some("abc123"))]);
        let outcome = classify(&prior, &[obs("A", Some("def456"))], Utc::now(), None);

        assert_eq!(outcome.event, EventKind::Change);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(
            outcome.changes[0].previous.fingerprint.as_deref(),
            Some("abc123")
        );
        assert_eq!(outcome.snapshot.fingerprint("A"), Some("def456"));
    }

    #[test]
    fn test_change_wins_over_due_healthcheck() {
        let mut prior = initialized_snapshot(&[("A", Some("abc123"))]);
        prior.last_healthcheck_sent_at = Some(Utc::now() - Duration::days(30));

        let now = Utc::now();
        let outcome = classify(&prior, &[obs("A", Some("def456"))], now, Some(Duration::days(7)));

        assert_eq!(outcome.event, EventKind::Change);
        // CHANGE leaves the healthcheck marker untouched.
        assert_eq!(
            outcome.snapshot.last_healthcheck_sent_at,
            prior.last_healthcheck_sent_at
        );
    }

    #[test]
    fn test_change_regardless_of_other_targets_failing() {
        let prior = initialized_snapshot(&[("A", Some("abc123")), ("B", Some("1.0.0"))]);
        let observations = vec![obs("A", Some("def456")), obs("B", None)];
        let outcome = classify(&prior, &observations, Utc::now(), None);

        assert_eq!(outcome.event, EventKind::Change);
        assert_eq!(outcome.changes.len(), 1);
        // The failed target keeps its stored fingerprint unmodified.
        assert_eq!(outcome.snapshot.fingerprint("B"), Some("1.0.0"));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_fetch_failure_alone_never_changes() {
        let prior = initialized_snapshot(&[("A", Some("abc123"))]);
        let outcome = classify(&prior, &[obs("A", None)], Utc::now(), None);

        assert_eq!(outcome.event, EventKind::None);
        assert_eq!(outcome.snapshot.fingerprint("A"), Some("abc123"));
    }

    #[test]
    fn test_new_target_is_not_a_change() {
        let prior = initialized_snapshot(&[("A", Some("abc123"))]);
        let observations = vec![obs("A", Some("abc123")), obs("C", Some("9.9.9"))];
        let outcome = classify(&prior, &observations, Utc::now(), None);

        assert_eq!(outcome.event, EventKind::None);
        assert_eq!(outcome.snapshot.fingerprint("C"), Some("9.9.9"));
    }

    #[test]
    fn test_healthcheck_boundary() {
        let sent_at = Utc::now() - Duration::days(7);
        let interval = Some(Duration::days(7));

        let mut prior = initialized_snapshot(&[("A", Some("abc123"))]);
        prior.last_healthcheck_sent_at = Some(sent_at);

        // One second before the threshold: silent.
        let just_before = sent_at + Duration::days(7) - Duration::seconds(1);
        let outcome = classify(&prior, &[obs("A", Some("abc123"))], just_before, interval);
        assert_eq!(outcome.event, EventKind::None);
        assert_eq!(outcome.snapshot.last_healthcheck_sent_at, Some(sent_at));

        // Exactly at the threshold: healthcheck.
        let at_threshold = sent_at + Duration::days(7);
        let outcome = classify(&prior, &[obs("A", Some("abc123"))], at_threshold, interval);
        assert_eq!(outcome.event, EventKind::Healthcheck);
        assert_eq!(
            outcome.snapshot.last_healthcheck_sent_at,
            Some(at_threshold)
        );
    }

    #[test]
    fn test_healthcheck_due_when_marker_absent() {
        let prior = initialized_snapshot(&[("A", Some("abc123"))]);
        let outcome = classify(
            &prior,
            &[obs("A", Some("abc123"))],
            Utc::now(),
            Some(Duration::days(7)),
        );
        assert_eq!(outcome.event, EventKind::Healthcheck);
    }

    #[test]
    fn test_healthcheck_disabled_stays_silent() {
        let prior = initialized_snapshot(&[("A", Some("abc123"))]);
        let outcome = classify(&prior, &[obs("A", Some("abc123"))], Utc::now(), None);
        assert_eq!(outcome.event, EventKind::None);
    }

    #[test]
    fn test_idempotence_after_persisting() {
        let now = Utc::now();
        let observations = vec![obs("A", Some("abc123"))];

        let first = classify(
            &Snapshot::default(),
            &observations,
            now,
            Some(Duration::days(7)),
        );
        assert_eq!(first.event, EventKind::Startup);

        // Same observations, no time advance, prior = persisted result.
        let second = classify(&first.snapshot, &observations, now, Some(Duration::days(7)));
        assert_eq!(second.event, EventKind::None);
    }

    #[test]
    fn test_last_checked_always_updated() {
        let now = Utc::now();
        let prior = initialized_snapshot(&[("A", Some("abc123"))]);

        let outcome = classify(&prior, &[obs("A", None)], now, None);
        assert_eq!(outcome.event, EventKind::None);
        assert_eq!(outcome.snapshot.last_checked_at, Some(now));
    }

    proptest! {
        #[test]
        fn prop_uninitialized_always_startup(
            fingerprints in prop::collection::vec(prop::option::of("[a-f0-9]{8}"), 0..4)
        ) {
            let observations: Vec<Observation> = fingerprints
                .iter()
                .enumerate()
                .map(|(i, fp)| obs(&format!("target-{}", i), fp.as_deref()))
                .collect();

            let outcome = classify(&Snapshot::default(), &observations, Utc::now(), None);
            prop_assert_eq!(outcome.event, EventKind::Startup);
            prop_assert!(outcome.snapshot.initialized);
        }

        #[test]
        fn prop_failed_fetches_never_change(
            fingerprints in prop::collection::vec("[a-f0-9]{8}", 1..4)
        ) {
            let mut prior = Snapshot {
                initialized: true,
                ..Default::default()
            };
            for (i, fp) in fingerprints.iter().enumerate() {
                prior.targets.insert(
                    format!("target-{}", i),
                    TargetState {
                        fingerprint: Some(fp.clone()),
                        detail: TargetDetail::default(),
                    },
                );
            }
            let observations: Vec<Observation> = (0..fingerprints.len())
                .map(|i| obs(&format!("target-{}", i), None))
                .collect();

            let outcome = classify(&prior, &observations, Utc::now(), None);
            prop_assert_ne!(outcome.event, EventKind::Change);
            prop_assert_ne!(outcome.event, EventKind::Startup);
            for (i, fp) in fingerprints.iter().enumerate() {
                prop_assert_eq!(
                    outcome.snapshot.fingerprint(&format!("target-{}", i)),
                    Some(fp.as_str())
                );
            }
        }
    }
}
