// src/scheduling/bulk.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::status::{self, AppointmentStatus};
use super::store::{Appointment, AppointmentStore};
use super::SchedulingError;

#[derive(Debug, Serialize)]
pub struct BulkUpdate {
    pub updated_count: u64,
    pub appointments: Vec<Appointment>,
}

/// Moves a batch of appointments to `target` in one multi-record write.
///
/// All-or-nothing: the batch is pre-validated and rejected outright, with the
/// offending ids, when any member sits in a terminal state other than the
/// target itself. The bulk path deliberately checks only that terminal guard,
/// not the full per-transition table the single-record path applies.
pub async fn bulk_update_status(
    store: &dyn AppointmentStore,
    ids: &[Uuid],
    target: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<BulkUpdate, SchedulingError> {
    if ids.is_empty() {
        return Err(SchedulingError::Validation(
            "ids must be a non-empty list".into(),
        ));
    }

    let current = store.find_by_ids(ids).await?;

    let invalid_ids: Vec<Uuid> = current
        .iter()
        .filter(|a| a.status.is_terminal() && a.status != target)
        .map(|a| a.appointment_id)
        .collect();

    if !invalid_ids.is_empty() {
        tracing::warn!(
            target = %target,
            invalid = invalid_ids.len(),
            "bulk status update rejected"
        );
        return Err(SchedulingError::BulkRejected { invalid_ids });
    }

    // Same target for every record, so the same stamp pair for every record.
    let stamps = status::bulk_stamps(target, now);
    let updated_count = store.update_status_many(ids, target, stamps).await?;
    let appointments = store.find_by_ids(ids).await?;

    tracing::info!(target = %target, updated = updated_count, "bulk status update applied");

    Ok(BulkUpdate {
        updated_count,
        appointments,
    })
}
