// src/scheduling/conflict.rs

use serde::Serialize;
use uuid::Uuid;

use super::slot::SlotKey;
use super::store::{AppointmentStore, StoreError};

/// What the caller gets back when a slot is taken: enough to report which
/// appointment is in the way. A UX aid, not a security boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictDescriptor {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub time: String,
}

/// Looks for an active appointment holding `slot`, ignoring `exclude` (the
/// record being rescheduled, so it never conflicts with itself). Terminal and
/// no-show appointments never conflict; a freed slot is reusable immediately.
pub async fn find_conflict(
    store: &dyn AppointmentStore,
    slot: &SlotKey,
    exclude: Option<Uuid>,
) -> Result<Option<ConflictDescriptor>, StoreError> {
    let existing = store.find_active_at_slot(slot, exclude).await?;
    Ok(existing.map(|a| {
        tracing::warn!(
            slot = %slot,
            conflicting_id = %a.appointment_id,
            "slot conflict detected"
        );
        ConflictDescriptor {
            appointment_id: a.appointment_id,
            patient_name: a.patient_name,
            time: a.appointment_time,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::memory::InMemoryStore;
    use crate::scheduling::status::AppointmentStatus;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn active_appointment_occupies_its_slot() {
        let store = InMemoryStore::new();
        let a = store
            .seed("Alice", d("2025-06-10"), "10:00 AM", AppointmentStatus::Scheduled)
            .await;

        let hit = find_conflict(&store, &SlotKey::new(d("2025-06-10"), "10:00 AM"), None)
            .await
            .unwrap()
            .expect("conflict");
        assert_eq!(hit.appointment_id, a.appointment_id);
        assert_eq!(hit.patient_name, "Alice");
        assert_eq!(hit.time, "10:00 AM");
    }

    #[tokio::test]
    async fn in_progress_also_occupies_the_slot() {
        let store = InMemoryStore::new();
        store
            .seed("Bob", d("2025-06-10"), "10:00 AM", AppointmentStatus::InProgress)
            .await;

        let hit = find_conflict(&store, &SlotKey::new(d("2025-06-10"), "10:00 AM"), None)
            .await
            .unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn terminal_and_no_show_records_free_the_slot() {
        let store = InMemoryStore::new();
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            store.seed("Carol", d("2025-06-10"), "10:00 AM", status).await;
        }

        let hit = find_conflict(&store, &SlotKey::new(d("2025-06-10"), "10:00 AM"), None)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn different_time_label_is_a_different_slot() {
        let store = InMemoryStore::new();
        store
            .seed("Dave", d("2025-06-10"), "10:00 AM", AppointmentStatus::Scheduled)
            .await;

        let hit = find_conflict(&store, &SlotKey::new(d("2025-06-10"), "10:30 AM"), None)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn excluded_record_does_not_conflict_with_itself() {
        let store = InMemoryStore::new();
        let a = store
            .seed("Erin", d("2025-06-10"), "10:00 AM", AppointmentStatus::Scheduled)
            .await;

        let slot = SlotKey::new(d("2025-06-10"), "10:00 AM");
        let hit = find_conflict(&store, &slot, Some(a.appointment_id))
            .await
            .unwrap();
        assert!(hit.is_none());

        // But a second record at the slot still trips it.
        let b = store
            .seed("Frank", d("2025-06-10"), "10:00 AM", AppointmentStatus::Scheduled)
            .await;
        let hit = find_conflict(&store, &slot, Some(a.appointment_id))
            .await
            .unwrap()
            .expect("conflict with the other record");
        assert_eq!(hit.appointment_id, b.appointment_id);
    }
}
