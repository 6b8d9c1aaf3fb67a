// src/scheduling/status.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Appointment lifecycle status, stored as smallint.
/// 0 scheduled, 1 in-progress, 2 completed, 3 cancelled, 4 no-show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled = 0,
    InProgress = 1,
    Completed = 2,
    Cancelled = 3,
    NoShow = 4,
}

impl AppointmentStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Active appointments are the ones that occupy a slot.
    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::InProgress)
    }

    /// Legal next statuses from this one. Completed/cancelled have none;
    /// no-show may still be cancelled or revived back to scheduled.
    pub fn allowed_transitions(self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[InProgress, Completed, Cancelled, NoShow],
            InProgress => &[Completed, Cancelled, NoShow],
            Completed => &[],
            Cancelled => &[],
            NoShow => &[Cancelled, Scheduled],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Formats the legal targets of `from` for error messages, e.g. "cancelled, scheduled".
pub fn legal_targets(from: AppointmentStatus) -> String {
    let targets = from.allowed_transitions();
    if targets.is_empty() {
        "none".to_string()
    } else {
        targets
            .iter()
            .map(|s| s.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Gate for a requested status change.
///
/// Re-requesting the current status is an accepted no-op (the bulk path
/// relies on this: a batch may include records already in the target state).
/// Otherwise the change must appear in the transition table, and terminal
/// records reject everything.
pub fn validate_transition(
    current: AppointmentStatus,
    requested: AppointmentStatus,
) -> Result<(), super::SchedulingError> {
    if requested == current {
        return Ok(());
    }
    if current.is_terminal() {
        return Err(super::SchedulingError::TerminalState { current });
    }
    if !current.allowed_transitions().contains(&requested) {
        return Err(super::SchedulingError::IllegalTransition {
            from: current,
            to: requested,
        });
    }
    Ok(())
}

/// Derived completion/cancellation timestamps for a record entering `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStamps {
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Computes the stamp pair after an accepted transition.
///
/// `completed_at` is non-null iff the record is completed, and keeps its
/// original value if the record was already completed; symmetric for
/// `cancelled_at`. Every other status clears both.
pub fn restamp(
    current: AppointmentStatus,
    current_completed_at: Option<DateTime<Utc>>,
    current_cancelled_at: Option<DateTime<Utc>>,
    next: AppointmentStatus,
    now: DateTime<Utc>,
) -> StatusStamps {
    let completed_at = match next {
        AppointmentStatus::Completed if current == AppointmentStatus::Completed => {
            current_completed_at
        }
        AppointmentStatus::Completed => Some(now),
        _ => None,
    };
    let cancelled_at = match next {
        AppointmentStatus::Cancelled if current == AppointmentStatus::Cancelled => {
            current_cancelled_at
        }
        AppointmentStatus::Cancelled => Some(now),
        _ => None,
    };
    StatusStamps {
        completed_at,
        cancelled_at,
    }
}

/// Uniform stamps for a bulk transition: every record in the batch gets the
/// same pair, derived only from the target status.
pub fn bulk_stamps(target: AppointmentStatus, now: DateTime<Utc>) -> StatusStamps {
    StatusStamps {
        completed_at: (target == AppointmentStatus::Completed).then_some(now),
        cancelled_at: (target == AppointmentStatus::Cancelled).then_some(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::SchedulingError;
    use AppointmentStatus::*;

    const ALL: [AppointmentStatus; 5] = [Scheduled, InProgress, Completed, Cancelled, NoShow];

    fn now() -> DateTime<Utc> {
        "2025-06-10T09:30:00Z".parse().unwrap()
    }

    #[test]
    fn transition_table_is_exact() {
        // (from, legal targets) pairs straight from the workflow rules.
        let expect: [(AppointmentStatus, &[AppointmentStatus]); 5] = [
            (Scheduled, &[InProgress, Completed, Cancelled, NoShow]),
            (InProgress, &[Completed, Cancelled, NoShow]),
            (Completed, &[]),
            (Cancelled, &[]),
            (NoShow, &[Cancelled, Scheduled]),
        ];
        for (from, legal) in expect {
            for to in ALL {
                let ok = validate_transition(from, to).is_ok();
                let expected = to == from || legal.contains(&to);
                assert_eq!(ok, expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_states_reject_with_terminal_reason() {
        for from in [Completed, Cancelled] {
            for to in ALL {
                if to == from {
                    continue;
                }
                match validate_transition(from, to) {
                    Err(SchedulingError::TerminalState { current }) => assert_eq!(current, from),
                    other => panic!("expected terminal rejection for {from} -> {to}, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn illegal_transition_message_lists_legal_targets() {
        let err = validate_transition(NoShow, Completed).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cancelled, scheduled"), "message was: {msg}");

        let err = validate_transition(Completed, Scheduled).unwrap_err();
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn same_status_is_a_no_op() {
        for s in ALL {
            assert!(validate_transition(s, s).is_ok(), "{s} -> {s}");
        }
    }

    #[test]
    fn completing_stamps_completed_at() {
        let stamps = restamp(InProgress, None, None, Completed, now());
        assert_eq!(stamps.completed_at, Some(now()));
        assert_eq!(stamps.cancelled_at, None);
    }

    #[test]
    fn cancelling_stamps_cancelled_at() {
        let stamps = restamp(Scheduled, None, None, Cancelled, now());
        assert_eq!(stamps.completed_at, None);
        assert_eq!(stamps.cancelled_at, Some(now()));
    }

    #[test]
    fn already_completed_keeps_original_stamp() {
        let first: DateTime<Utc> = "2025-06-09T17:00:00Z".parse().unwrap();
        let stamps = restamp(Completed, Some(first), None, Completed, now());
        assert_eq!(stamps.completed_at, Some(first));
    }

    #[test]
    fn leaving_a_stamped_status_clears_the_stamp() {
        // Only reachable through an administrative override, but the stamp
        // rule holds regardless of how the transition was authorised.
        let first: DateTime<Utc> = "2025-06-09T17:00:00Z".parse().unwrap();
        let stamps = restamp(Completed, Some(first), None, Scheduled, now());
        assert_eq!(stamps.completed_at, None);
        assert_eq!(stamps.cancelled_at, None);
    }

    #[test]
    fn non_terminal_statuses_clear_both_stamps() {
        for next in [Scheduled, InProgress, NoShow] {
            let stamps = restamp(Scheduled, None, None, next, now());
            assert_eq!(stamps.completed_at, None);
            assert_eq!(stamps.cancelled_at, None);
        }
    }

    #[test]
    fn bulk_stamps_follow_target_only() {
        assert_eq!(bulk_stamps(Completed, now()).completed_at, Some(now()));
        assert_eq!(bulk_stamps(Completed, now()).cancelled_at, None);
        assert_eq!(bulk_stamps(Cancelled, now()).cancelled_at, Some(now()));
        assert_eq!(bulk_stamps(NoShow, now()).completed_at, None);
        assert_eq!(bulk_stamps(NoShow, now()).cancelled_at, None);
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&InProgress).unwrap(), "\"in-progress\"");
        assert_eq!(serde_json::to_string(&NoShow).unwrap(), "\"no-show\"");
        let parsed: AppointmentStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, Cancelled);
    }
}
