//! Route definitions for the `/schedules` resource.

use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::schedules;
use crate::state::AppState;

/// Routes mounted at `/schedules`.
///
/// ```text
/// GET    /                          -> list_schedules
/// GET    /{id}                      -> get_schedule
/// PATCH  /{id}/slots/{slot_id}      -> update_slot
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(schedules::list_schedules))
        .route("/{id}", get(schedules::get_schedule))
        .route("/{id}/slots/{slot_id}", patch(schedules::update_slot))
}
