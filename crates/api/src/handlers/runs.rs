//! Handlers for the `/runs` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use shiftgrid_core::error::CoreError;
use shiftgrid_core::types::DbId;
use shiftgrid_db::repositories::RunRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::tenant::Tenant;
use crate::response::DataResponse;
use crate::service::{self, GenerateRunRequest};
use crate::state::AppState;

/// POST /api/v1/runs
///
/// Execute a generation run. Returns 201 with the run, the produced
/// schedule and slots, and the conflict report. Rejects overlapping
/// concurrent generations for the same tenant with 409.
pub async fn generate_run(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Json(input): Json<GenerateRunRequest>,
) -> AppResult<impl IntoResponse> {
    let result = service::generate_run(&state, tenant_id, input).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// GET /api/v1/runs
///
/// List the tenant's runs, newest first.
pub async fn list_runs(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let runs = RunRepo::list(&state.pool, tenant_id).await?;

    Ok(Json(DataResponse { data: runs }))
}

/// GET /api/v1/runs/{id}
///
/// Get one run, including its persisted telemetry.
pub async fn get_run(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = RunRepo::find_by_id(&state.pool, tenant_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Run", id }))?;

    Ok(Json(DataResponse { data: run }))
}
