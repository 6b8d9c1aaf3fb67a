// src/scheduling/store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::slot::SlotKey;
use super::status::{AppointmentStatus, StatusStamps};

/// The appointment record as the rest of the crate sees it. Weak references
/// (`booking_id`, `assigned_user_id`) are ids only; `assigned_user_name` is
/// the read-time lookup of the latter and is absent when nothing matches.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub health_concern: Option<String>,
    pub service_type: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub booking_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.appointment_date, self.appointment_time.as_str())
    }
}

/// Fields for a fresh record. New appointments always start out scheduled
/// with both lifecycle stamps unset.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub health_concern: Option<String>,
    pub service_type: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub notes: Option<String>,
    pub booking_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
}

/// A partial update. `Option` means "leave unchanged"; the inner `Option`
/// on nullable fields distinguishes "set" from "clear".
#[derive(Debug, Default, Clone)]
pub struct AppointmentPatch {
    pub patient_name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<String>,
    pub health_concern: Option<Option<String>>,
    pub service_type: Option<Option<String>>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub cancelled_at: Option<Option<DateTime<Utc>>>,
    pub assigned_user_id: Option<Option<Uuid>>,
}

/// Equality/range filters for list reads. All fields combine with AND.
#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub exclude_status: Option<AppointmentStatus>,
    /// Case-insensitive substring over patient name, phone, service type and email.
    pub search: Option<String>,
    pub phone: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// appointment_date asc, then the time label asc as a plain string.
    DateAsc,
    DateDesc,
    CreatedAsc,
    #[default]
    CreatedDesc,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1) * self.limit
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The active-slot uniqueness backstop fired: another active appointment
    /// holds the same (date, time) pair.
    #[error("another active appointment already occupies this slot")]
    DuplicateSlot,
    #[error("storage error: {0}")]
    Backend(String),
}

/// The Document Store port for appointments. The conflict detector,
/// calendar aggregator and bulk orchestrator only ever talk to this trait,
/// so they run unchanged against Postgres or the in-memory test store.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn find_many(
        &self,
        filter: &AppointmentFilter,
        sort: SortOrder,
        page: Option<Page>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64, StoreError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Appointment>, StoreError>;

    /// The conflict probe: any appointment in an active status holding
    /// exactly this slot, optionally ignoring one record (self, on reschedule).
    async fn find_active_at_slot(
        &self,
        slot: &SlotKey,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Returns the updated record, or None when the id is unknown.
    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>, StoreError>;

    /// One multi-record write: sets status and both lifecycle stamps on every
    /// matched id, returning how many records were touched.
    async fn update_status_many(
        &self,
        ids: &[Uuid],
        status: AppointmentStatus,
        stamps: StatusStamps,
    ) -> Result<u64, StoreError>;
}
