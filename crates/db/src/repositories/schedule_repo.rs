//! Repository for schedules and their slots.

use sqlx::PgPool;

use shiftgrid_core::types::DbId;

use crate::models::schedule::{Schedule, ScheduleFilter, ScheduleSlot, UpdateSlot};

const SCHEDULE_COLUMNS: &str = "\
    id, tenant_id, template_id, run_id, range_start, range_end, created_at";

const SLOT_COLUMNS: &str = "\
    id, tenant_id, schedule_id, position, slot_date, starts_at, ends_at, \
    shift_type, required_tags, employee_id, source, status, conflict_reason, \
    manual_lock, created_at, updated_at";

/// Read access to schedules plus the manual slot-edit path.
pub struct ScheduleRepo;

impl ScheduleRepo {
    /// List a tenant's schedules, optionally filtered by template and range.
    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        filter: &ScheduleFilter,
    ) -> Result<Vec<Schedule>, sqlx::Error> {
        let query = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules \
             WHERE tenant_id = $1 \
               AND ($2::BIGINT IS NULL OR template_id = $2) \
               AND ($3::DATE IS NULL OR range_end >= $3) \
               AND ($4::DATE IS NULL OR range_start <= $4) \
             ORDER BY id DESC"
        );
        sqlx::query_as::<_, Schedule>(&query)
            .bind(tenant_id)
            .bind(filter.template_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(pool)
            .await
    }

    /// Find a schedule by ID within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        let query = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, Schedule>(&query)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All slots of a schedule in stable position order.
    pub async fn slots(
        pool: &PgPool,
        tenant_id: DbId,
        schedule_id: DbId,
    ) -> Result<Vec<ScheduleSlot>, sqlx::Error> {
        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM schedule_slots \
             WHERE tenant_id = $1 AND schedule_id = $2 \
             ORDER BY position"
        );
        sqlx::query_as::<_, ScheduleSlot>(&query)
            .bind(tenant_id)
            .bind(schedule_id)
            .fetch_all(pool)
            .await
    }

    /// Find one slot of a schedule.
    pub async fn find_slot(
        pool: &PgPool,
        tenant_id: DbId,
        schedule_id: DbId,
        slot_id: DbId,
    ) -> Result<Option<ScheduleSlot>, sqlx::Error> {
        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM schedule_slots \
             WHERE tenant_id = $1 AND schedule_id = $2 AND id = $3"
        );
        sqlx::query_as::<_, ScheduleSlot>(&query)
            .bind(tenant_id)
            .bind(schedule_id)
            .bind(slot_id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a manual edit to a slot. Any change to the occupant flips the
    /// source to `manual` and recomputes the status; the lock flag changes
    /// only when the payload sets it.
    pub async fn update_slot(
        pool: &PgPool,
        tenant_id: DbId,
        schedule_id: DbId,
        slot_id: DbId,
        input: &UpdateSlot,
    ) -> Result<Option<ScheduleSlot>, sqlx::Error> {
        let query = format!(
            "UPDATE schedule_slots SET \
               employee_id = CASE \
                 WHEN $4 THEN NULL \
                 WHEN $5::BIGINT IS NOT NULL THEN $5 \
                 ELSE employee_id END, \
               source = CASE WHEN $4 OR $5::BIGINT IS NOT NULL THEN 'manual' ELSE source END, \
               status = CASE \
                 WHEN $4 THEN 'unassigned' \
                 WHEN $5::BIGINT IS NOT NULL THEN 'assigned' \
                 ELSE status END, \
               conflict_reason = CASE WHEN $4 OR $5::BIGINT IS NOT NULL THEN NULL \
                 ELSE conflict_reason END, \
               manual_lock = COALESCE($6, manual_lock), \
               updated_at = now() \
             WHERE tenant_id = $1 AND schedule_id = $2 AND id = $3 \
             RETURNING {SLOT_COLUMNS}"
        );
        sqlx::query_as::<_, ScheduleSlot>(&query)
            .bind(tenant_id)
            .bind(schedule_id)
            .bind(slot_id)
            .bind(input.clear_employee)
            .bind(input.employee_id)
            .bind(input.manual_lock)
            .fetch_optional(pool)
            .await
    }

    /// Slots of a schedule as regeneration input, manual edits first so
    /// locked slots claim their matching drafts before anything else.
    pub async fn prior_slots(
        pool: &PgPool,
        tenant_id: DbId,
        schedule_id: DbId,
    ) -> Result<Vec<shiftgrid_core::engine::PriorSlot>, sqlx::Error> {
        let slots = Self::slots(pool, tenant_id, schedule_id).await?;
        let mut prior: Vec<_> = slots.iter().map(ScheduleSlot::to_prior).collect();
        prior.sort_by_key(|p| !p.manual_lock);
        Ok(prior)
    }
}
