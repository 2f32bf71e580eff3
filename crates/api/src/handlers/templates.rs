//! Handlers for the `/templates` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use shiftgrid_core::error::CoreError;
use shiftgrid_core::types::DbId;
use shiftgrid_db::models::template::NewScheduleTemplate;
use shiftgrid_db::repositories::TemplateRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::tenant::Tenant;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/templates
///
/// Create a template. The rule payloads are validated as the domain model
/// they become; an invalid plan never reaches storage.
pub async fn create_template(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Json(input): Json<NewScheduleTemplate>,
) -> AppResult<impl IntoResponse> {
    input.validate_domain()?;

    let template = TemplateRepo::create(&state.pool, tenant_id, &input).await?;

    tracing::info!(
        tenant_id,
        template_id = template.id,
        name = %template.name,
        "Template created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// GET /api/v1/templates
///
/// List the tenant's templates.
pub async fn list_templates(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let templates = TemplateRepo::list(&state.pool, tenant_id).await?;

    Ok(Json(DataResponse { data: templates }))
}

/// GET /api/v1/templates/{id}
///
/// Get one template.
pub async fn get_template(
    Tenant(tenant_id): Tenant,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let template = TemplateRepo::find_by_id(&state.pool, tenant_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id,
        }))?;

    Ok(Json(DataResponse { data: template }))
}
