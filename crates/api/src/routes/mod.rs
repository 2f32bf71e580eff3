pub mod health;
pub mod runs;
pub mod schedules;
pub mod templates;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /runs                                   list, generate (GET, POST)
/// /runs/{id}                              get run (GET)
///
/// /schedules                              list (?template_id, from, to)
/// /schedules/{id}                         get with ordered slots (GET)
/// /schedules/{id}/slots/{slot_id}         manual edit (PATCH)
///
/// /templates                              list, create (GET, POST)
/// /templates/{id}                         get template (GET)
/// ```
///
/// Every route is tenant-scoped via the `x-tenant-id` header.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/runs", runs::router())
        .nest("/schedules", schedules::router())
        .nest("/templates", templates::router())
}
