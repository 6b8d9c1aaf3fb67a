// src/routes/booking_routes.rs
//
// Public booking requests and their staff-side workflow. A booking is a
// softer record than an appointment: it carries the patient's preferred
// slot and lives its own pending/confirmed lifecycle until a staff member
// promotes it into a real appointment (or closes it out).

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
    scheduling::{self, pg_store::PgAppointmentStore, store::NewAppointment, Appointment},
};

fn can_manage_bookings(auth: &AuthContext) -> bool {
    // admin, manager, receptionist
    matches!(auth.role, 1 | 2 | 4)
}

fn ensure_manage(auth: &AuthContext) -> Result<(), ApiError> {
    if can_manage_bookings(auth) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admin/manager/receptionist can manage bookings".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{booking_id}", get(get_booking).patch(patch_booking))
        .route("/bookings/{booking_id}/convert", post(convert_booking))
}

/* ============================================================
   Row model and DTOs
   ============================================================ */

/// Booking status, stored as smallint.
/// 0 pending, 1 confirmed, 2 cancelled, 3 converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending = 0,
    Confirmed = 1,
    Cancelled = 2,
    Converted = 3,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookingRow {
    pub booking_id: Uuid,
    pub patient_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub health_concern: Option<String>,
    pub service_type: Option<String>,
    pub request_callback: bool,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

const BOOKING_COLUMNS: &str = "booking_id, patient_name, email, phone, preferred_date, preferred_time, health_concern, service_type, request_callback, status, created_at, updated_at";

async fn fetch_booking(state: &AppState, booking_id: Uuid) -> Result<BookingRow, ApiError> {
    sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM booking WHERE booking_id = $1"
    ))
    .bind(booking_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "booking not found".into()))
}

/* ============================================================
   POST /bookings (public form submission)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub patient_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub health_concern: Option<String>,
    pub service_type: Option<String>,
    pub request_callback: Option<bool>,
}

pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<ApiOk<BookingRow>>, ApiError> {
    let patient_name = req.patient_name.trim();
    let phone = req.phone.trim();
    if patient_name.is_empty() || phone.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "patient_name and phone are required".into(),
        ));
    }
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(email) = email {
        if !scheduling::is_valid_email(email) {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("invalid email address: {email}"),
            ));
        }
    }

    let row: BookingRow = sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        INSERT INTO booking
            (patient_name, email, phone, preferred_date, preferred_time, health_concern, service_type, request_callback)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {BOOKING_COLUMNS}
        "#
    ))
    .bind(patient_name)
    .bind(email)
    .bind(phone)
    .bind(req.preferred_date)
    .bind(req.preferred_time.as_deref().map(str::trim))
    .bind(req.health_concern.as_deref())
    .bind(req.service_type.as_deref())
    .bind(req.request_callback.unwrap_or(false))
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(booking_id = %row.booking_id, "booking request received");
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   GET /bookings
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListBookingsQuery>,
) -> Result<Json<ApiOk<Vec<BookingRow>>>, ApiError> {
    ensure_manage(&auth)?;

    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(20).clamp(1, 100);

    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {BOOKING_COLUMNS} FROM booking WHERE 1 = 1"));
    if let Some(s) = q.status {
        qb.push(" AND status = ").push_bind(s);
    }
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{search}%");
        qb.push(" AND (patient_name ILIKE ")
            .push_bind(like.clone())
            .push(" OR phone ILIKE ")
            .push_bind(like)
            .push(")");
    }
    qb.push(" ORDER BY created_at DESC");
    qb.push(" LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(((page - 1) * limit) as i64);

    let rows = qb
        .build_query_as::<BookingRow>()
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET / PATCH /bookings/{id}
   ============================================================ */

pub async fn get_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiOk<BookingRow>>, ApiError> {
    ensure_manage(&auth)?;
    let row = fetch_booking(&state, booking_id).await?;
    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct PatchBookingRequest {
    pub status: Option<BookingStatus>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub request_callback: Option<bool>,
}

pub async fn patch_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<PatchBookingRequest>,
) -> Result<Json<ApiOk<BookingRow>>, ApiError> {
    ensure_manage(&auth)?;

    if req.status == Some(BookingStatus::Converted) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "bookings become converted through the convert endpoint".into(),
        ));
    }

    let row: Option<BookingRow> = sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        UPDATE booking
        SET
          status = COALESCE($2, status),
          preferred_date = COALESCE($3, preferred_date),
          preferred_time = COALESCE($4, preferred_time),
          request_callback = COALESCE($5, request_callback),
          updated_at = now()
        WHERE booking_id = $1
        RETURNING {BOOKING_COLUMNS}
        "#
    ))
    .bind(booking_id)
    .bind(req.status)
    .bind(req.preferred_date)
    .bind(req.preferred_time.as_deref().map(str::trim))
    .bind(req.request_callback)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let Some(row) = row else {
        return Err(ApiError::NotFound("NOT_FOUND", "booking not found".into()));
    };
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   POST /bookings/{id}/convert
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ConvertBookingRequest {
    // Overrides for the preferred slot; required when the booking left them blank.
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConvertBookingData {
    pub booking: BookingRow,
    pub appointment: Appointment,
}

/// Promotes a booking into a scheduled appointment. The appointment goes
/// through the full scheduling pipeline (validation, past-date check, slot
/// conflict check) and carries the weak booking reference; the booking is
/// then marked converted. The two records stay independently lifecycled
/// afterwards.
pub async fn convert_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ConvertBookingRequest>,
) -> Result<Json<ApiOk<ConvertBookingData>>, ApiError> {
    ensure_manage(&auth)?;

    let booking = fetch_booking(&state, booking_id).await?;
    match booking.status {
        BookingStatus::Converted => {
            return Err(ApiError::Conflict(
                "BOOKING_ALREADY_CONVERTED",
                "this booking already has an appointment".into(),
                None,
            ));
        }
        BookingStatus::Cancelled => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "a cancelled booking cannot be converted".into(),
            ));
        }
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }

    let Some(appointment_date) = req.appointment_date.or(booking.preferred_date) else {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment_date is required (the booking has no preferred date)".into(),
        ));
    };
    let Some(appointment_time) = req
        .appointment_time
        .clone()
        .or_else(|| booking.preferred_time.clone())
    else {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment_time is required (the booking has no preferred time)".into(),
        ));
    };

    let new = NewAppointment {
        patient_name: booking.patient_name.clone(),
        email: booking.email.clone(),
        phone: booking.phone.clone(),
        health_concern: booking.health_concern.clone(),
        service_type: booking.service_type.clone(),
        appointment_date,
        appointment_time,
        notes: req.notes,
        booking_id: Some(booking.booking_id),
        assigned_user_id: req.assigned_user_id,
    };

    let store = PgAppointmentStore::new(state.db.clone());
    let today = Utc::now().date_naive();
    let appointment = scheduling::create_appointment(&store, new, today).await?;

    let booking: BookingRow = sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        UPDATE booking
        SET status = 3, updated_at = now()
        WHERE booking_id = $1
        RETURNING {BOOKING_COLUMNS}
        "#
    ))
    .bind(booking_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(
        booking_id = %booking.booking_id,
        appointment_id = %appointment.appointment_id,
        "booking converted to appointment"
    );

    Ok(Json(ApiOk {
        data: ConvertBookingData {
            booking,
            appointment,
        },
    }))
}
