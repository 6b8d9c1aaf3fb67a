// src/scheduling/mod.rs
//
// The scheduling core: slot conflict detection, the status state machine,
// calendar aggregation and bulk transitions. Everything here talks to
// storage through the AppointmentStore trait and takes its notion of
// "now"/"today" as parameters, so the whole module runs under test against
// the in-memory store with a pinned clock.

pub mod bulk;
pub mod calendar;
pub mod conflict;
pub mod slot;
pub mod status;
pub mod store;
pub mod window;

pub mod pg_store;

#[cfg(test)]
pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use conflict::ConflictDescriptor;
use slot::SlotKey;
use status::AppointmentStatus;
pub use store::Appointment;

use store::{
    AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, Page, SortOrder,
    StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("{0}")]
    Validation(String),

    /// The requested slot is held by another active appointment. The
    /// descriptor is best-effort; it can be absent when the holder was only
    /// observed through the storage uniqueness backstop.
    #[error("the requested time slot is already booked")]
    Conflict {
        existing: Option<ConflictDescriptor>,
    },

    #[error("cannot modify a {current} appointment")]
    TerminalState { current: AppointmentStatus },

    #[error(
        "cannot change status from {from} to {to}; legal next states: {}",
        status::legal_targets(*from)
    )]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("appointment not found")]
    NotFound,

    #[error("booking not found")]
    BookingNotFound,

    #[error("{} appointment(s) are in a terminal state and cannot change status", invalid_ids.len())]
    BulkRejected { invalid_ids: Vec<Uuid> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Books a new appointment. Validates the patient-facing fields, rejects
/// past dates, and refuses the slot if an active appointment already holds
/// it. New records always enter the lifecycle as `scheduled`.
pub async fn create_appointment(
    store: &dyn AppointmentStore,
    mut new: NewAppointment,
    today: NaiveDate,
) -> Result<Appointment, SchedulingError> {
    new.patient_name = required_field(&new.patient_name, "patient name")?;
    new.phone = required_field(&new.phone, "phone")?;
    new.appointment_time = required_field(&new.appointment_time, "appointment time")?;
    new.email = normalized_email(new.email)?;

    if new.appointment_date < today {
        return Err(SchedulingError::Validation(
            "appointment date cannot be in the past".into(),
        ));
    }

    let slot = SlotKey::new(new.appointment_date, new.appointment_time.as_str());
    if let Some(existing) = conflict::find_conflict(store, &slot, None).await? {
        return Err(SchedulingError::Conflict {
            existing: Some(existing),
        });
    }

    match store.create(new).await {
        Ok(appt) => {
            tracing::info!(id = %appt.appointment_id, slot = %appt.slot(), "appointment created");
            Ok(appt)
        }
        // A concurrent create won the slot between our check and the write;
        // the storage backstop turned the race into a rejection. Re-probe so
        // the caller still learns who holds the slot.
        Err(StoreError::DuplicateSlot) => Err(SchedulingError::Conflict {
            existing: conflict::find_conflict(store, &slot, None).await?,
        }),
        Err(e) => Err(e.into()),
    }
}

/// A caller-supplied change set for one appointment. Outer `None` leaves a
/// field alone; the inner `Option` on nullable fields clears it.
#[derive(Debug, Default, Clone)]
pub struct UpdateAppointment {
    pub patient_name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<String>,
    pub health_concern: Option<Option<String>>,
    pub service_type: Option<Option<String>>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<Option<String>>,
    pub assigned_user_id: Option<Option<Uuid>>,
}

/// Applies a partial update. Reschedules re-run the past-date check and the
/// conflict check (excluding the record itself); status changes go through
/// the transition table and re-derive the lifecycle stamps. All checks pass
/// before anything is written.
pub async fn update_appointment(
    store: &dyn AppointmentStore,
    id: Uuid,
    upd: UpdateAppointment,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    let current = store
        .find_by_id(id)
        .await?
        .ok_or(SchedulingError::NotFound)?;

    let patient_name = upd
        .patient_name
        .map(|v| required_field(&v, "patient name"))
        .transpose()?;
    let phone = upd.phone.map(|v| required_field(&v, "phone")).transpose()?;
    let appointment_time = upd
        .appointment_time
        .map(|v| required_field(&v, "appointment time"))
        .transpose()?;
    let email = match upd.email {
        Some(inner) => Some(normalized_email(inner)?),
        None => None,
    };

    if let Some(date) = upd.appointment_date {
        if date < today {
            return Err(SchedulingError::Validation(
                "appointment date cannot be in the past".into(),
            ));
        }
    }

    let next_slot = SlotKey::new(
        upd.appointment_date.unwrap_or(current.appointment_date),
        appointment_time
            .as_deref()
            .unwrap_or(current.appointment_time.as_str()),
    );
    if next_slot != current.slot() {
        if let Some(existing) = conflict::find_conflict(store, &next_slot, Some(id)).await? {
            return Err(SchedulingError::Conflict {
                existing: Some(existing),
            });
        }
    }

    let mut patch = AppointmentPatch {
        patient_name,
        email,
        phone,
        health_concern: upd.health_concern,
        service_type: upd.service_type,
        appointment_date: upd.appointment_date,
        appointment_time,
        notes: upd.notes,
        assigned_user_id: upd.assigned_user_id,
        ..Default::default()
    };

    if let Some(next) = upd.status {
        status::validate_transition(current.status, next)?;
        let stamps = status::restamp(
            current.status,
            current.completed_at,
            current.cancelled_at,
            next,
            now,
        );
        patch.status = Some(next);
        patch.completed_at = Some(stamps.completed_at);
        patch.cancelled_at = Some(stamps.cancelled_at);
    }

    match store.update(id, patch).await {
        Ok(Some(appt)) => Ok(appt),
        Ok(None) => Err(SchedulingError::NotFound),
        Err(StoreError::DuplicateSlot) => Err(SchedulingError::Conflict {
            existing: conflict::find_conflict(store, &next_slot, Some(id)).await?,
        }),
        Err(e) => Err(e.into()),
    }
}

/// "Deletion" of an appointment: a soft transition to cancelled through the
/// same state machine, preserving the record. Already-cancelled records are
/// left untouched; completed ones refuse, like any terminal record.
pub async fn cancel_appointment(
    store: &dyn AppointmentStore,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    let current = store
        .find_by_id(id)
        .await?
        .ok_or(SchedulingError::NotFound)?;

    if current.status == AppointmentStatus::Cancelled {
        return Ok(current);
    }
    status::validate_transition(current.status, AppointmentStatus::Cancelled)?;

    let stamps = status::restamp(
        current.status,
        current.completed_at,
        current.cancelled_at,
        AppointmentStatus::Cancelled,
        now,
    );
    let patch = AppointmentPatch {
        status: Some(AppointmentStatus::Cancelled),
        completed_at: Some(stamps.completed_at),
        cancelled_at: Some(stamps.cancelled_at),
        ..Default::default()
    };

    let appt = store
        .update(id, patch)
        .await?
        .ok_or(SchedulingError::NotFound)?;
    tracing::info!(id = %appt.appointment_id, "appointment cancelled");
    Ok(appt)
}

pub async fn get_appointment(
    store: &dyn AppointmentStore,
    id: Uuid,
) -> Result<Appointment, SchedulingError> {
    store
        .find_by_id(id)
        .await?
        .ok_or(SchedulingError::NotFound)
}

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ListParams {
    pub status: Option<AppointmentStatus>,
    pub search: Option<String>,
    pub phone: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: u32,
    pub limit: u32,
    pub sort: SortOrder,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            phone: None,
            start_date: None,
            end_date: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: SortOrder::default(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AppointmentPage {
    pub appointments: Vec<Appointment>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Filtered, paginated appointment listing. A start/end pair is normalized
/// to day boundaries (and reordered if swapped); one-sided ranges stay open
/// on the other end.
pub async fn list_appointments(
    store: &dyn AppointmentStore,
    params: ListParams,
) -> Result<AppointmentPage, SchedulingError> {
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);

    let (date_from, date_to) = match (params.start_date, params.end_date) {
        (Some(s), Some(e)) => {
            let w = window::DateWindow::span(s, e);
            (Some(w.start), Some(w.end))
        }
        other => other,
    };

    let filter = AppointmentFilter {
        status: params.status,
        exclude_status: None,
        search: params.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        phone: params.phone.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        date_from,
        date_to,
    };

    let total = store.count(&filter).await?;
    let appointments = store
        .find_many(&filter, params.sort, Some(Page { page, limit }))
        .await?;

    Ok(AppointmentPage {
        appointments,
        total,
        page,
        limit,
    })
}

fn required_field(value: &str, name: &str) -> Result<String, SchedulingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(SchedulingError::Validation(format!("{name} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trims an optional email, treating blank as absent; anything left must
/// look like local@domain.tld.
fn normalized_email(email: Option<String>) -> Result<Option<String>, SchedulingError> {
    let Some(email) = email else { return Ok(None) };
    let email = email.trim().to_string();
    if email.is_empty() {
        return Ok(None);
    }
    if !is_valid_email(&email) {
        return Err(SchedulingError::Validation(format!(
            "invalid email address: {email}"
        )));
    }
    Ok(Some(email))
}

pub(crate) fn is_valid_email(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}
