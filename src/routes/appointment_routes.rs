// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
    scheduling::{
        self,
        bulk,
        calendar::{self, CalendarData, CalendarView},
        pg_store::PgAppointmentStore,
        status::AppointmentStatus,
        store::{NewAppointment, SortOrder},
        Appointment, AppointmentPage, ListParams, UpdateAppointment,
    },
};

/*
Roles (acms_user.roles):
0 patient
1 admin
2 manager
3 doctor
4 receptionist
*/

fn is_admin(auth: &AuthContext) -> bool {
    auth.role == 1
}
fn is_manager(auth: &AuthContext) -> bool {
    auth.role == 2
}
fn is_doctor(auth: &AuthContext) -> bool {
    auth.role == 3
}
fn is_receptionist(auth: &AuthContext) -> bool {
    auth.role == 4
}

fn can_manage_appointments(auth: &AuthContext) -> bool {
    is_admin(auth) || is_manager(auth) || is_receptionist(auth)
}

fn ensure_manage(auth: &AuthContext) -> Result<(), ApiError> {
    if can_manage_appointments(auth) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admin/manager/receptionist can manage appointments".into(),
        ))
    }
}

fn ensure_view(auth: &AuthContext) -> Result<(), ApiError> {
    if can_manage_appointments(auth) || is_doctor(auth) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You do not have permission to view appointments".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route("/appointments/calendar", get(get_calendar))
        .route("/appointments/bulk_status", patch(bulk_update_status))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(patch_appointment)
                .delete(delete_appointment),
        )
}

/* ============================================================
   Response envelope
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   GET /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<AppointmentStatus>,
    pub search: Option<String>,
    pub phone: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
}

fn parse_sort(sort: Option<&str>) -> Result<SortOrder, ApiError> {
    match sort {
        None => Ok(SortOrder::default()),
        Some("date_asc") => Ok(SortOrder::DateAsc),
        Some("date_desc") => Ok(SortOrder::DateDesc),
        Some("created_asc") => Ok(SortOrder::CreatedAsc),
        Some("created_desc") => Ok(SortOrder::CreatedDesc),
        Some(other) => Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown sort: {other} (expected date_asc, date_desc, created_asc or created_desc)"),
        )),
    }
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<AppointmentPage>>, ApiError> {
    ensure_view(&auth)?;

    let defaults = ListParams::default();
    let params = ListParams {
        status: q.status,
        search: q.search,
        phone: q.phone,
        start_date: q.start_date,
        end_date: q.end_date,
        page: q.page.unwrap_or(defaults.page),
        limit: q.limit.unwrap_or(defaults.limit),
        sort: parse_sort(q.sort.as_deref())?,
    };

    let store = PgAppointmentStore::new(state.db.clone());
    let page = scheduling::list_appointments(&store, params).await?;
    Ok(Json(ApiOk { data: page }))
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
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

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_manage(&auth)?;

    let new = NewAppointment {
        patient_name: req.patient_name,
        email: req.email,
        phone: req.phone,
        health_concern: req.health_concern,
        service_type: req.service_type,
        appointment_date: req.appointment_date,
        appointment_time: req.appointment_time,
        notes: req.notes,
        booking_id: req.booking_id,
        assigned_user_id: req.assigned_user_id,
    };

    let store = PgAppointmentStore::new(state.db.clone());
    let today = Utc::now().date_naive();
    let appt = scheduling::create_appointment(&store, new, today).await?;
    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   GET /appointments/calendar
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub view: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub async fn get_calendar(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<ApiOk<CalendarData>>, ApiError> {
    ensure_view(&auth)?;

    let view = match q.view.as_deref() {
        None | Some("daily") => CalendarView::Daily,
        Some("weekly") => CalendarView::Weekly,
        Some(other) => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("unknown view: {other} (expected daily or weekly)"),
            ));
        }
    };

    let store = PgAppointmentStore::new(state.db.clone());
    let today = Utc::now().date_naive();
    let data =
        calendar::calendar_view(&store, view, q.date, q.start_date, q.end_date, today).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   PATCH /appointments/bulk_status
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub ids: Vec<Uuid>,
    pub status: AppointmentStatus,
}

pub async fn bulk_update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<BulkStatusRequest>,
) -> Result<Json<ApiOk<bulk::BulkUpdate>>, ApiError> {
    ensure_manage(&auth)?;

    let store = PgAppointmentStore::new(state.db.clone());
    let result = bulk::bulk_update_status(&store, &req.ids, req.status, Utc::now()).await?;
    Ok(Json(ApiOk { data: result }))
}

/* ============================================================
   GET / PATCH / DELETE /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_view(&auth)?;

    let store = PgAppointmentStore::new(state.db.clone());
    let appt = scheduling::get_appointment(&store, appointment_id).await?;
    Ok(Json(ApiOk { data: appt }))
}

use serde::de::Deserializer;

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Called only when the field is present (even as `null`):
    // null => Some(None), value => Some(Some(value)).
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

#[derive(Debug, Deserialize)]
pub struct PatchAppointmentRequest {
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub health_concern: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub service_type: Option<Option<String>>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub assigned_user_id: Option<Option<Uuid>>,
}

pub async fn patch_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<PatchAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_manage(&auth)?;

    let upd = UpdateAppointment {
        patient_name: req.patient_name,
        email: req.email,
        phone: req.phone,
        health_concern: req.health_concern,
        service_type: req.service_type,
        appointment_date: req.appointment_date,
        appointment_time: req.appointment_time,
        status: req.status,
        notes: req.notes,
        assigned_user_id: req.assigned_user_id,
    };

    let store = PgAppointmentStore::new(state.db.clone());
    let now = Utc::now();
    let appt =
        scheduling::update_appointment(&store, appointment_id, upd, now.date_naive(), now).await?;
    Ok(Json(ApiOk { data: appt }))
}

/// Deletion is a soft cancel: the record survives with status=cancelled and
/// a cancellation stamp. Completed appointments refuse, like any terminal
/// record.
pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_manage(&auth)?;

    let store = PgAppointmentStore::new(state.db.clone());
    let appt = scheduling::cancel_appointment(&store, appointment_id, Utc::now()).await?;
    Ok(Json(ApiOk { data: appt }))
}
