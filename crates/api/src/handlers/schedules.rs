//! Handlers for the `/schedules` resource.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use shiftgrid_core::error::CoreError;
use shiftgrid_core::types::DbId;
use shiftgrid_db::models::schedule::{Schedule, ScheduleFilter, ScheduleSlot, UpdateSlot};
use shiftgrid_db::repositories::{RosterRepo, ScheduleRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::tenant::Tenant;
use crate::query::ScheduleListParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// A schedule with its slots in stable position order.
#[derive(Debug, Serialize)]
pub struct ScheduleDetail {
    pub schedule: Schedule,
    pub slots: Vec<ScheduleSlot>,
}

/// GET /api/v1/schedules
///
/// List the tenant's schedules, optionally filtered by template and
/// date range.
pub async fn list_schedules(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Query(params): Query<ScheduleListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = ScheduleFilter {
        template_id: params.template_id,
        from: params.from,
        to: params.to,
    };
    let schedules = ScheduleRepo::list(&state.pool, tenant_id, &filter).await?;

    Ok(Json(DataResponse { data: schedules }))
}

/// GET /api/v1/schedules/{id}
///
/// Get a schedule with its ordered slots.
pub async fn get_schedule(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let schedule = ScheduleRepo::find_by_id(&state.pool, tenant_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Schedule",
            id,
        }))?;
    let slots = ScheduleRepo::slots(&state.pool, tenant_id, id).await?;

    Ok(Json(DataResponse {
        data: ScheduleDetail { schedule, slots },
    }))
}

/// PATCH /api/v1/schedules/{id}/slots/{slot_id}
///
/// Manually edit a slot: set or clear the occupant and toggle the lock.
/// Any occupant change marks the slot `manual`; locked slots survive
/// regeneration until the lock is lifted or explicitly overridden.
pub async fn update_slot(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Path((schedule_id, slot_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateSlot>,
) -> AppResult<impl IntoResponse> {
    if input.employee_id.is_some() && input.clear_employee {
        return Err(AppError::BadRequest(
            "employee_id and clear_employee are mutually exclusive".into(),
        ));
    }

    // The occupant must belong to the same tenant as the slot.
    if let Some(employee_id) = input.employee_id {
        RosterRepo::find_employee(&state.pool, tenant_id, employee_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Employee",
                id: employee_id,
            }))?;
    }

    let slot = ScheduleRepo::update_slot(&state.pool, tenant_id, schedule_id, slot_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Slot",
            id: slot_id,
        }))?;

    tracing::info!(
        tenant_id,
        schedule_id,
        slot_id,
        employee_id = ?slot.employee_id,
        manual_lock = slot.manual_lock,
        "Slot manually edited",
    );

    Ok(Json(DataResponse { data: slot }))
}
