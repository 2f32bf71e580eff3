//! Repository for the `schedule_templates` table.

use sqlx::PgPool;

use shiftgrid_core::types::DbId;

use crate::models::template::{NewScheduleTemplate, ScheduleTemplate};

const COLUMNS: &str = "\
    id, tenant_id, name, timezone, coverage_plan, rest_rules, \
    constraint_rules, preference_rules, created_at, updated_at";

/// CRUD for the `schedule_templates` table.
pub struct TemplateRepo;

impl TemplateRepo {
    /// List a tenant's templates.
    pub async fn list(pool: &PgPool, tenant_id: DbId) -> Result<Vec<ScheduleTemplate>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM schedule_templates WHERE tenant_id = $1 ORDER BY id");
        sqlx::query_as::<_, ScheduleTemplate>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Find a template by ID within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<ScheduleTemplate>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM schedule_templates WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, ScheduleTemplate>(&query)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Create a new template. The caller validates the rule payloads first.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &NewScheduleTemplate,
    ) -> Result<ScheduleTemplate, sqlx::Error> {
        let query = format!(
            "INSERT INTO schedule_templates \
             (tenant_id, name, timezone, coverage_plan, rest_rules, constraint_rules, preference_rules) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScheduleTemplate>(&query)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.timezone)
            .bind(serde_json::to_value(&input.coverage_plan).unwrap_or_default())
            .bind(serde_json::to_value(&input.rest_rules).unwrap_or_default())
            .bind(serde_json::to_value(&input.constraint_rules).unwrap_or_default())
            .bind(serde_json::to_value(&input.preference_rules).unwrap_or_default())
            .fetch_one(pool)
            .await
    }
}
