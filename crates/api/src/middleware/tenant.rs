//! Tenant scoping extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shiftgrid_core::types::DbId;

use crate::error::AppError;

/// Tenant extracted from the `x-tenant-id` header.
///
/// Every tenant-scoped handler takes this as its first extractor; the id
/// flows into each repository call so no query can cross tenants.
///
/// ```ignore
/// async fn my_handler(Tenant(tenant_id): Tenant) -> AppResult<Json<()>> {
///     tracing::info!(tenant_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Tenant(pub DbId);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-tenant-id")
            .ok_or_else(|| AppError::BadRequest("Missing x-tenant-id header".into()))?;

        let tenant_id = header
            .to_str()
            .ok()
            .and_then(|v| v.parse::<DbId>().ok())
            .ok_or_else(|| {
                AppError::BadRequest("x-tenant-id header must be a numeric tenant id".into())
            })?;

        Ok(Tenant(tenant_id))
    }
}
