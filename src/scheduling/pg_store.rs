// src/scheduling/pg_store.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::slot::SlotKey;
use super::status::{AppointmentStatus, StatusStamps};
use super::store::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, Page,
    SortOrder, StoreError,
};

/// Postgres-backed appointment store. The assigned staff member is a weak
/// reference, resolved with a LEFT JOIN at read time; a dangling id simply
/// yields no name.
pub struct PgAppointmentStore {
    pool: PgPool,
}

impl PgAppointmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_APPOINTMENT: &str = r#"
SELECT
  a.appointment_id,
  a.patient_name,
  a.email,
  a.phone,
  a.health_concern,
  a.service_type,
  a.appointment_date,
  a.appointment_time,
  a.status,
  a.notes,
  a.completed_at,
  a.cancelled_at,
  a.booking_id,
  a.assigned_user_id,
  u.display_name AS assigned_user_name,
  a.created_at,
  a.updated_at
FROM appointment a
LEFT JOIN acms_user u ON u.user_id = a.assigned_user_id
"#;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("db error: {e}"))
}

/// Write-path error mapping: the partial unique index over active slots
/// turns a lost conflict-check race into a constraint violation.
fn write_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.constraint() == Some("appointment_active_slot_uq") {
            return StoreError::DuplicateSlot;
        }
    }
    backend(e)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AppointmentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(s) = filter.status {
        qb.push(" AND a.status = ").push_bind(s);
    }
    if let Some(s) = filter.exclude_status {
        qb.push(" AND a.status <> ").push_bind(s);
    }
    if let Some(q) = &filter.search {
        let like = format!("%{q}%");
        qb.push(" AND (a.patient_name ILIKE ")
            .push_bind(like.clone())
            .push(" OR a.phone ILIKE ")
            .push_bind(like.clone())
            .push(" OR a.service_type ILIKE ")
            .push_bind(like.clone())
            .push(" OR a.email ILIKE ")
            .push_bind(like)
            .push(")");
    }
    if let Some(p) = &filter.phone {
        qb.push(" AND a.phone LIKE ").push_bind(format!("%{p}%"));
    }
    if let Some(d) = filter.date_from {
        qb.push(" AND a.appointment_date >= ").push_bind(d);
    }
    if let Some(d) = filter.date_to {
        qb.push(" AND a.appointment_date <= ").push_bind(d);
    }
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::DateAsc => " ORDER BY a.appointment_date ASC, a.appointment_time ASC",
        SortOrder::DateDesc => " ORDER BY a.appointment_date DESC, a.appointment_time DESC",
        SortOrder::CreatedAsc => " ORDER BY a.created_at ASC",
        SortOrder::CreatedDesc => " ORDER BY a.created_at DESC",
    }
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO appointment (
              patient_name,
              email,
              phone,
              health_concern,
              service_type,
              appointment_date,
              appointment_time,
              status,
              notes,
              booking_id,
              assigned_user_id
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7, 0, $8, $9, $10)
            RETURNING appointment_id
            "#,
        )
        .bind(&new.patient_name)
        .bind(new.email.as_deref())
        .bind(&new.phone)
        .bind(new.health_concern.as_deref())
        .bind(new.service_type.as_deref())
        .bind(new.appointment_date)
        .bind(&new.appointment_time)
        .bind(new.notes.as_deref())
        .bind(new.booking_id)
        .bind(new.assigned_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(write_err)?;

        let appointment_id: Uuid = row
            .try_get("appointment_id")
            .map_err(|e| StoreError::Backend(format!("row decode error: {e}")))?;

        self.find_by_id(appointment_id)
            .await?
            .ok_or_else(|| StoreError::Backend("created appointment not readable".into()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let mut qb = QueryBuilder::new(SELECT_APPOINTMENT);
        qb.push(" WHERE a.appointment_id = ").push_bind(id);
        qb.build_query_as::<Appointment>()
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn find_many(
        &self,
        filter: &AppointmentFilter,
        sort: SortOrder,
        page: Option<Page>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut qb = QueryBuilder::new(SELECT_APPOINTMENT);
        push_filters(&mut qb, filter);
        qb.push(order_clause(sort));
        if let Some(p) = page {
            qb.push(" LIMIT ")
                .push_bind(p.limit as i64)
                .push(" OFFSET ")
                .push_bind(p.offset() as i64);
        }
        qb.build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM appointment a");
        push_filters(&mut qb, filter);
        let row = qb.build().fetch_one(&self.pool).await.map_err(backend)?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::Backend(format!("row decode error: {e}")))?;
        Ok(n as u64)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Appointment>, StoreError> {
        let mut qb = QueryBuilder::new(SELECT_APPOINTMENT);
        qb.push(" WHERE a.appointment_id = ANY(").push_bind(ids.to_vec()).push(")");
        qb.push(order_clause(SortOrder::DateAsc));
        qb.build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn find_active_at_slot(
        &self,
        slot: &SlotKey,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut qb = QueryBuilder::new(SELECT_APPOINTMENT);
        qb.push(" WHERE a.appointment_date = ").push_bind(slot.date);
        qb.push(" AND a.appointment_time = ").push_bind(slot.time.as_str());
        qb.push(" AND a.status IN (0, 1)");
        if let Some(id) = exclude {
            qb.push(" AND a.appointment_id <> ").push_bind(id);
        }
        qb.push(" LIMIT 1");
        qb.build_query_as::<Appointment>()
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut qb = QueryBuilder::new("UPDATE appointment SET updated_at = now()");
        if let Some(v) = &patch.patient_name {
            qb.push(", patient_name = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.email {
            qb.push(", email = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.phone {
            qb.push(", phone = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.health_concern {
            qb.push(", health_concern = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.service_type {
            qb.push(", service_type = ").push_bind(v.clone());
        }
        if let Some(v) = patch.appointment_date {
            qb.push(", appointment_date = ").push_bind(v);
        }
        if let Some(v) = &patch.appointment_time {
            qb.push(", appointment_time = ").push_bind(v.clone());
        }
        if let Some(v) = patch.status {
            qb.push(", status = ").push_bind(v);
        }
        if let Some(v) = &patch.notes {
            qb.push(", notes = ").push_bind(v.clone());
        }
        if let Some(v) = patch.completed_at {
            qb.push(", completed_at = ").push_bind(v);
        }
        if let Some(v) = patch.cancelled_at {
            qb.push(", cancelled_at = ").push_bind(v);
        }
        if let Some(v) = patch.assigned_user_id {
            qb.push(", assigned_user_id = ").push_bind(v);
        }
        qb.push(" WHERE appointment_id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await.map_err(write_err)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn update_status_many(
        &self,
        ids: &[Uuid],
        status: AppointmentStatus,
        stamps: StatusStamps,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE appointment
            SET status = $2,
                completed_at = $3,
                cancelled_at = $4,
                updated_at = now()
            WHERE appointment_id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .bind(status)
        .bind(stamps.completed_at)
        .bind(stamps.cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(result.rows_affected())
    }
}
