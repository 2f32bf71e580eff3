//! Integration tests for generation runs, schedules, and manual slot edits.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, request};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

async fn create_tenant(pool: &PgPool) -> i64 {
    let row: (i64,) = sqlx::query_as("INSERT INTO tenants (name) VALUES ('acme') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

async fn seed_employees(pool: &PgPool, tenant_id: i64, count: usize) {
    for i in 0..count {
        sqlx::query(
            "INSERT INTO employees (tenant_id, name, tags, active_from) \
             VALUES ($1, $2, '{}', '2025-01-01')",
        )
        .bind(tenant_id)
        .bind(format!("employee-{i}"))
        .execute(pool)
        .await
        .unwrap();
    }
}

fn template_payload() -> serde_json::Value {
    json!({
        "name": "ward",
        "timezone": "UTC",
        "coverage_plan": [
            {
                "shift_type": "day",
                "day_pattern": { "kind": "daily" },
                "start_time": "08:00:00",
                "end_time": "16:00:00",
                "crosses_midnight": false,
                "headcount": 1,
                "required_tags": [],
                "skip_on_holiday": false
            }
        ]
    })
}

async fn create_template(app: &axum::Router, tenant_id: i64) -> i64 {
    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/templates",
        tenant_id,
        Some(template_payload()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_i64().unwrap()
}

// ---------------------------------------------------------------------------
// Test: full generation run over HTTP
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn generate_run_end_to_end(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    seed_employees(&pool, tenant_id, 2).await;
    let app = common::build_test_app(pool);
    let template_id = create_template(&app, tenant_id).await;

    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
            "seed": 7,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["run"]["status"], "completed");
    assert_eq!(data["run"]["seed"], 7);
    assert_eq!(data["slots"].as_array().unwrap().len(), 3);
    assert_eq!(data["conflicts"].as_array().unwrap().len(), 0);
    assert_eq!(data["telemetry"]["assigned"], 3);

    // Run and schedule are retrievable afterwards.
    let run_id = data["run"]["id"].as_i64().unwrap();
    let schedule_id = data["schedule"]["id"].as_i64().unwrap();

    let run = request(
        app.clone(),
        Method::GET,
        &format!("/api/v1/runs/{run_id}"),
        tenant_id,
        None,
    )
    .await;
    assert_eq!(run.status(), StatusCode::OK);
    let run = body_json(run).await;
    assert_eq!(run["data"]["status"], "completed");
    assert!(run["data"]["telemetry"].is_object());

    let schedule = request(
        app,
        Method::GET,
        &format!("/api/v1/schedules/{schedule_id}"),
        tenant_id,
        None,
    )
    .await;
    assert_eq!(schedule.status(), StatusCode::OK);
    let schedule = body_json(schedule).await;
    assert_eq!(schedule["data"]["slots"].as_array().unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Test: request validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_request_validation(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    let app = common::build_test_app(pool);
    let template_id = create_template(&app, tenant_id).await;

    // Neither template_id nor schedule_id.
    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({ "start_date": "2025-06-02", "end_date": "2025-06-04" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Both template_id and schedule_id.
    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "schedule_id": 1,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // decay_rate out of range.
    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
            "decay_rate": 1.5,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Inverted range.
    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-04",
            "end_date": "2025-06-02",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Seed too large for the BIGINT run column.
    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
            "seed": 9_223_372_036_854_775_808u64,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown template.
    let response = request(
        app,
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": 999_999,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_template_payload_rejected(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    let app = common::build_test_app(pool);

    // Empty coverage plan never reaches storage.
    let mut payload = template_payload();
    payload["coverage_plan"] = json!([]);
    let response = request(app.clone(), Method::POST, "/api/v1/templates", tenant_id, Some(payload)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    // Unknown timezone.
    let mut payload = template_payload();
    payload["timezone"] = json!("Mars/Olympus_Mons");
    let response = request(app, Method::POST, "/api/v1/templates", tenant_id, Some(payload)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: regeneration preserves manual locks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn regeneration_preserves_locked_slot(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    seed_employees(&pool, tenant_id, 2).await;
    let app = common::build_test_app(pool.clone());
    let template_id = create_template(&app, tenant_id).await;

    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
            "seed": 1,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = body_json(response).await;
    let schedule_id = first["data"]["schedule"]["id"].as_i64().unwrap();
    let slot = &first["data"]["slots"][1];
    let slot_id = slot["id"].as_i64().unwrap();
    let original_employee = slot["employee_id"].as_i64().unwrap();

    // Swap the middle slot to the other employee and lock it.
    let other: (i64,) = sqlx::query_as(
        "SELECT id FROM employees WHERE tenant_id = $1 AND id <> $2 LIMIT 1",
    )
    .bind(tenant_id)
    .bind(original_employee)
    .fetch_one(&pool)
    .await
    .unwrap();

    let response = request(
        app.clone(),
        Method::PATCH,
        &format!("/api/v1/schedules/{schedule_id}/slots/{slot_id}"),
        tenant_id,
        Some(json!({ "employee_id": other.0, "manual_lock": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let patched = body_json(response).await;
    assert_eq!(patched["data"]["source"], "manual");
    assert_eq!(patched["data"]["manual_lock"], true);

    // Regenerate from the edited schedule with a different seed.
    let response = request(
        app,
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "schedule_id": schedule_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
            "seed": 999,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let second = body_json(response).await;
    assert_eq!(second["data"]["run"]["source_schedule_id"].as_i64().unwrap(), schedule_id);

    let locked: Vec<_> = second["data"]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["manual_lock"] == true)
        .collect();
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0]["employee_id"].as_i64().unwrap(), other.0);
    assert_eq!(locked[0]["source"], "manual");
    assert_eq!(second["data"]["telemetry"]["locked_preserved"], 1);
}

// ---------------------------------------------------------------------------
// Test: slot edit validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn slot_edit_rejects_conflicting_payload_and_foreign_employee(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    seed_employees(&pool, tenant_id, 1).await;
    let app = common::build_test_app(pool.clone());
    let template_id = create_template(&app, tenant_id).await;

    let response = request(
        app.clone(),
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-02",
        })),
    )
    .await;
    let created = body_json(response).await;
    let schedule_id = created["data"]["schedule"]["id"].as_i64().unwrap();
    let slot_id = created["data"]["slots"][0]["id"].as_i64().unwrap();

    // Setting and clearing at once is rejected.
    let response = request(
        app.clone(),
        Method::PATCH,
        &format!("/api/v1/schedules/{schedule_id}/slots/{slot_id}"),
        tenant_id,
        Some(json!({ "employee_id": 1, "clear_employee": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // An employee from another tenant does not exist here.
    let other_tenant = create_tenant(&pool).await;
    seed_employees(&pool, other_tenant, 1).await;
    let foreign: (i64,) = sqlx::query_as("SELECT id FROM employees WHERE tenant_id = $1")
        .bind(other_tenant)
        .fetch_one(&pool)
        .await
        .unwrap();

    let response = request(
        app,
        Method::PATCH,
        &format!("/api/v1/schedules/{schedule_id}/slots/{slot_id}"),
        tenant_id,
        Some(json!({ "employee_id": foreign.0 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: shutdown aborts generation and leaves a terminal run
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn shutdown_cancellation_fails_run_cleanly(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    seed_employees(&pool, tenant_id, 2).await;
    let shutdown = tokio_util::sync::CancellationToken::new();
    let app = common::build_test_app_with(pool.clone(), shutdown.clone());
    let template_id = create_template(&app, tenant_id).await;

    // The server is already draining: the engine's child token is born
    // cancelled and the run aborts before assigning anything.
    shutdown.cancel();

    let response = request(
        app,
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-04",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CANCELLED");

    // The audit trail shows a terminal run, never one stuck in `running`.
    let (status, error): (String, Option<String>) =
        sqlx::query_as("SELECT status, error FROM scheduler_runs WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "failed");
    assert!(error.is_some());
}

// ---------------------------------------------------------------------------
// Test: unfilled slots surface as conflicts, not errors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn unfilled_slots_reported_as_conflicts(pool: PgPool) {
    let tenant_id = create_tenant(&pool).await;
    // No employees at all: every slot stays unassigned.
    let app = common::build_test_app(pool);
    let template_id = create_template(&app, tenant_id).await;

    let response = request(
        app,
        Method::POST,
        "/api/v1/runs",
        tenant_id,
        Some(json!({
            "template_id": template_id,
            "start_date": "2025-06-02",
            "end_date": "2025-06-03",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["run"]["status"], "completed");
    assert_eq!(data["telemetry"]["assigned"], 0);
    assert_eq!(data["telemetry"]["unassigned"], 2);
    let conflicts = data["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 2);
    assert_eq!(conflicts[0]["reason"], "no_candidates");
    for slot in data["slots"].as_array().unwrap() {
        assert_eq!(slot["status"], "unassigned");
        assert_eq!(slot["conflict_reason"], "no_candidates");
    }
}
