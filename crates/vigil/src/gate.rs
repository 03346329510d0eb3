//! Alert gating: edge triggered, with a per-target cooldown.

use std::time::Duration;

use tokio::time::Instant;

use crate::settings::{NotificationMode, Settings};
use crate::status::Status;

/// Per-target memory of the last alert that was let through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationRecord {
    pub last_notified_at: Option<Instant>,
    pub last_notified_state: Option<bool>,
}

/// The slice of settings the gate depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    pub mode: NotificationMode,
    pub cooldown: Duration,
}

impl From<&Settings> for GatePolicy {
    fn from(settings: &Settings) -> Self {
        Self { mode: settings.notification_mode, cooldown: settings.notification_cooldown }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fire,
    Suppress(Suppressed),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
    Disabled,
    NoTransition,
    Cooldown { remaining: Duration },
}

impl Decision {
    pub fn fires(&self) -> bool {
        matches!(self, Decision::Fire)
    }
}

/// Decide whether the move from `previous` to `current` should alert.
///
/// An alert fires on an up/down edge, or when the very first result is down.
/// Edges inside the cooldown window are swallowed regardless of direction.
/// On `Fire` the record is updated here, before any delivery is attempted.
pub fn evaluate(
    previous: &Status,
    current: &Status,
    record: &mut NotificationRecord,
    policy: &GatePolicy,
    now: Instant,
) -> Decision {
    if policy.mode == NotificationMode::None {
        return Decision::Suppress(Suppressed::Disabled);
    }

    let edge = if previous.is_unchecked() {
        !current.is_up
    } else {
        current.is_up != previous.is_up
    };
    if !edge {
        return Decision::Suppress(Suppressed::NoTransition);
    }

    if let Some(last) = record.last_notified_at {
        let elapsed = now.saturating_duration_since(last);
        if elapsed < policy.cooldown {
            return Decision::Suppress(Suppressed::Cooldown { remaining: policy.cooldown - elapsed });
        }
    }

    record.last_notified_at = Some(now);
    record.last_notified_state = Some(current.is_up);
    Decision::Fire
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn checked(is_up: bool) -> Status {
        Status {
            is_up,
            last_check: Some(Utc::now()),
            last_error: (!is_up).then(|| "refused".to_string()),
            ..Status::default()
        }
    }

    fn policy(mode: NotificationMode, cooldown_secs: u64) -> GatePolicy {
        GatePolicy { mode, cooldown: Duration::from_secs(cooldown_secs) }
    }

    #[test]
    fn test_mode_none_never_fires() {
        let mut record = NotificationRecord::default();
        let decision = evaluate(
            &checked(true),
            &checked(false),
            &mut record,
            &policy(NotificationMode::None, 0),
            Instant::now(),
        );
        assert_eq!(decision, Decision::Suppress(Suppressed::Disabled));
        assert_eq!(record, NotificationRecord::default());
    }

    #[test]
    fn test_fires_on_both_edges_but_not_steady_state() {
        let policy = policy(NotificationMode::InApp, 0);
        let mut record = NotificationRecord::default();
        let now = Instant::now();

        assert!(evaluate(&checked(true), &checked(false), &mut record, &policy, now).fires());
        assert!(!evaluate(&checked(false), &checked(false), &mut record, &policy, now).fires());
        assert!(evaluate(&checked(false), &checked(true), &mut record, &policy, now).fires());
        assert!(!evaluate(&checked(true), &checked(true), &mut record, &policy, now).fires());
        assert_eq!(record.last_notified_state, Some(true));
    }

    #[test]
    fn test_first_result_alerts_only_when_down() {
        let policy = policy(NotificationMode::Email, 600);
        let now = Instant::now();

        let mut record = NotificationRecord::default();
        assert!(evaluate(&Status::default(), &checked(false), &mut record, &policy, now).fires());

        let mut record = NotificationRecord::default();
        assert!(!evaluate(&Status::default(), &checked(true), &mut record, &policy, now).fires());
    }

    #[test]
    fn test_cooldown_suppresses_any_direction_until_elapsed() {
        let policy = policy(NotificationMode::Email, 600);
        let mut record = NotificationRecord::default();
        let t0 = Instant::now();

        assert!(evaluate(&checked(true), &checked(false), &mut record, &policy, t0).fires());

        let t1 = t0 + Duration::from_secs(60);
        assert_eq!(
            evaluate(&checked(false), &checked(true), &mut record, &policy, t1),
            Decision::Suppress(Suppressed::Cooldown { remaining: Duration::from_secs(540) })
        );
        assert_eq!(record.last_notified_at, Some(t0));

        let t2 = t0 + Duration::from_secs(600);
        assert!(evaluate(&checked(true), &checked(false), &mut record, &policy, t2).fires());
        assert_eq!(record.last_notified_at, Some(t2));
    }
}
