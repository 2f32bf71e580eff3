//! Repository for the roster read models feeding generation.

use chrono::{Days, NaiveDate};
use sqlx::PgPool;

use shiftgrid_core::roster::RosterSnapshot;
use shiftgrid_core::types::DbId;

use crate::models::roster::{EmployeeRow, HolidayRow, LeaveRow, NewEmployee};

const EMPLOYEE_COLUMNS: &str = "\
    id, tenant_id, name, tags, active_from, active_until, created_at, updated_at";

/// Read access to employees, leave windows, and holidays.
pub struct RosterRepo;

impl RosterRepo {
    /// Fetch everything generation needs for `[start, end]` in one snapshot.
    ///
    /// Leave windows are fetched with a one-day pad on each side: slot
    /// instants resolved through the template timezone can spill past the
    /// naive UTC bounds of the range.
    pub async fn snapshot(
        pool: &PgPool,
        tenant_id: DbId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RosterSnapshot, sqlx::Error> {
        let query = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = $1 ORDER BY id"
        );
        let employees = sqlx::query_as::<_, EmployeeRow>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await?;

        let window_start = start
            .checked_sub_days(Days::new(1))
            .unwrap_or(start)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let window_end = end
            .checked_add_days(Days::new(2))
            .unwrap_or(end)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();

        let leaves = sqlx::query_as::<_, LeaveRow>(
            "SELECT id, tenant_id, employee_id, starts_at, ends_at, created_at \
             FROM employee_leaves \
             WHERE tenant_id = $1 AND ends_at > $2 AND starts_at < $3",
        )
        .bind(tenant_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(pool)
        .await?;

        let holidays = sqlx::query_as::<_, HolidayRow>(
            "SELECT id, tenant_id, day, name FROM holidays \
             WHERE tenant_id = $1 AND day BETWEEN $2 AND $3",
        )
        .bind(tenant_id)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

        Ok(RosterSnapshot {
            employees: employees.into_iter().map(EmployeeRow::into_domain).collect(),
            leaves: leaves.into_iter().map(LeaveRow::into_domain).collect(),
            holidays: holidays.into_iter().map(|h| h.day).collect(),
        })
    }

    /// Find an employee by ID within a tenant.
    pub async fn find_employee(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<EmployeeRow>, sqlx::Error> {
        let query =
            format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, EmployeeRow>(&query)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Create an employee (test fixtures and seeding).
    pub async fn create_employee(
        pool: &PgPool,
        tenant_id: DbId,
        input: &NewEmployee,
    ) -> Result<EmployeeRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO employees (tenant_id, name, tags, active_from, active_until) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {EMPLOYEE_COLUMNS}"
        );
        sqlx::query_as::<_, EmployeeRow>(&query)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.tags)
            .bind(input.active_from)
            .bind(input.active_until)
            .fetch_one(pool)
            .await
    }
}
