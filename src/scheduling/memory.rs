// src/scheduling/memory.rs
//
// In-memory AppointmentStore used by the scheduling tests. Mirrors the
// Postgres store's observable semantics, including the active-slot
// uniqueness backstop.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::slot::SlotKey;
use super::status::{AppointmentStatus, StatusStamps};
use super::store::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, Page,
    SortOrder, StoreError,
};

#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<Vec<Appointment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly with the given status, bypassing the create
    /// path so fixtures can start in any lifecycle state.
    pub async fn seed(
        &self,
        patient_name: &str,
        date: NaiveDate,
        time: &str,
        status: AppointmentStatus,
    ) -> Appointment {
        let now = Utc::now();
        let appt = Appointment {
            appointment_id: Uuid::new_v4(),
            patient_name: patient_name.to_string(),
            email: None,
            phone: "0830000000".to_string(),
            health_concern: None,
            service_type: None,
            appointment_date: date,
            appointment_time: time.to_string(),
            status,
            notes: None,
            completed_at: None,
            cancelled_at: None,
            booking_id: None,
            assigned_user_id: None,
            assigned_user_name: None,
            created_at: now,
            updated_at: now,
        };
        self.items.lock().unwrap().push(appt.clone());
        appt
    }

    fn matches(filter: &AppointmentFilter, a: &Appointment) -> bool {
        if let Some(s) = filter.status {
            if a.status != s {
                return false;
            }
        }
        if let Some(s) = filter.exclude_status {
            if a.status == s {
                return false;
            }
        }
        if let Some(from) = filter.date_from {
            if a.appointment_date < from {
                return false;
            }
        }
        if let Some(to) = filter.date_to {
            if a.appointment_date > to {
                return false;
            }
        }
        if let Some(phone) = &filter.phone {
            if !a.phone.contains(phone.as_str()) {
                return false;
            }
        }
        if let Some(q) = &filter.search {
            let q = q.to_lowercase();
            let hay = |s: &Option<String>| {
                s.as_deref()
                    .map(|v| v.to_lowercase().contains(&q))
                    .unwrap_or(false)
            };
            if !(a.patient_name.to_lowercase().contains(&q)
                || a.phone.to_lowercase().contains(&q)
                || hay(&a.service_type)
                || hay(&a.email))
            {
                return false;
            }
        }
        true
    }

    fn sort(items: &mut [Appointment], order: SortOrder) {
        match order {
            SortOrder::DateAsc => items.sort_by(|a, b| {
                (a.appointment_date, &a.appointment_time)
                    .cmp(&(b.appointment_date, &b.appointment_time))
            }),
            SortOrder::DateDesc => items.sort_by(|a, b| {
                (b.appointment_date, &b.appointment_time)
                    .cmp(&(a.appointment_date, &a.appointment_time))
            }),
            SortOrder::CreatedAsc => items.sort_by_key(|a| a.created_at),
            SortOrder::CreatedDesc => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }

    /// True when another active record holds `slot`.
    fn slot_taken(items: &[Appointment], slot: &SlotKey, exclude: Option<Uuid>) -> bool {
        items.iter().any(|a| {
            a.status.is_active() && a.slot() == *slot && Some(a.appointment_id) != exclude
        })
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut items = self.items.lock().unwrap();
        let slot = SlotKey::new(new.appointment_date, new.appointment_time.as_str());
        if Self::slot_taken(&items, &slot, None) {
            return Err(StoreError::DuplicateSlot);
        }
        let now = Utc::now();
        let appt = Appointment {
            appointment_id: Uuid::new_v4(),
            patient_name: new.patient_name,
            email: new.email,
            phone: new.phone,
            health_concern: new.health_concern,
            service_type: new.service_type,
            appointment_date: new.appointment_date,
            appointment_time: new.appointment_time,
            status: AppointmentStatus::Scheduled,
            notes: new.notes,
            completed_at: None,
            cancelled_at: None,
            booking_id: new.booking_id,
            assigned_user_id: new.assigned_user_id,
            assigned_user_name: None,
            created_at: now,
            updated_at: now,
        };
        items.push(appt.clone());
        Ok(appt)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(items.iter().find(|a| a.appointment_id == id).cloned())
    }

    async fn find_many(
        &self,
        filter: &AppointmentFilter,
        sort: SortOrder,
        page: Option<Page>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let items = self.items.lock().unwrap();
        let mut out: Vec<Appointment> = items
            .iter()
            .filter(|a| Self::matches(filter, a))
            .cloned()
            .collect();
        Self::sort(&mut out, sort);
        if let Some(p) = page {
            out = out
                .into_iter()
                .skip(p.offset() as usize)
                .take(p.limit as usize)
                .collect();
        }
        Ok(out)
    }

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(items.iter().filter(|a| Self::matches(filter, a)).count() as u64)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Appointment>, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| items.iter().find(|a| a.appointment_id == *id).cloned())
            .collect())
    }

    async fn find_active_at_slot(
        &self,
        slot: &SlotKey,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .find(|a| {
                a.status.is_active() && a.slot() == *slot && Some(a.appointment_id) != exclude
            })
            .cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut items = self.items.lock().unwrap();

        // Work out the record's post-patch slot and status first so the
        // uniqueness backstop can fire before anything mutates.
        let Some(current) = items.iter().find(|a| a.appointment_id == id).cloned() else {
            return Ok(None);
        };
        let next_status = patch.status.unwrap_or(current.status);
        let next_slot = SlotKey::new(
            patch.appointment_date.unwrap_or(current.appointment_date),
            patch
                .appointment_time
                .clone()
                .unwrap_or_else(|| current.appointment_time.clone()),
        );
        if next_status.is_active() && Self::slot_taken(&items, &next_slot, Some(id)) {
            return Err(StoreError::DuplicateSlot);
        }

        let a = items
            .iter_mut()
            .find(|a| a.appointment_id == id)
            .expect("record existed above");
        if let Some(v) = patch.patient_name {
            a.patient_name = v;
        }
        if let Some(v) = patch.email {
            a.email = v;
        }
        if let Some(v) = patch.phone {
            a.phone = v;
        }
        if let Some(v) = patch.health_concern {
            a.health_concern = v;
        }
        if let Some(v) = patch.service_type {
            a.service_type = v;
        }
        if let Some(v) = patch.appointment_date {
            a.appointment_date = v;
        }
        if let Some(v) = patch.appointment_time {
            a.appointment_time = v;
        }
        if let Some(v) = patch.status {
            a.status = v;
        }
        if let Some(v) = patch.notes {
            a.notes = v;
        }
        if let Some(v) = patch.completed_at {
            a.completed_at = v;
        }
        if let Some(v) = patch.cancelled_at {
            a.cancelled_at = v;
        }
        if let Some(v) = patch.assigned_user_id {
            a.assigned_user_id = v;
        }
        a.updated_at = Utc::now();
        Ok(Some(a.clone()))
    }

    async fn update_status_many(
        &self,
        ids: &[Uuid],
        status: AppointmentStatus,
        stamps: StatusStamps,
    ) -> Result<u64, StoreError> {
        let mut items = self.items.lock().unwrap();
        let mut updated = 0;
        for a in items.iter_mut() {
            if ids.contains(&a.appointment_id) {
                a.status = status;
                a.completed_at = stamps.completed_at;
                a.cancelled_at = stamps.cancelled_at;
                a.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }
}
