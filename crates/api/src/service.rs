//! Generation service: orchestrates one scheduler run end to end.
//!
//! The handler validates the request; this module resolves the template and
//! regeneration source, claims the run gate, records the run, executes the
//! engine on a blocking thread under the shutdown token, and persists the
//! outcome atomically. Everything after the run row exists runs as a
//! detached task holding the gate permit: a dropped request future (client
//! disconnect, request timeout) cannot strand the run in `running`, and
//! failures flip it to `failed` so the audit trail never shows a stuck run.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use shiftgrid_core::conflict::SlotConflict;
use shiftgrid_core::engine::{generate_roster, PriorSlot, RunOptions, RunTelemetry};
use shiftgrid_core::error::CoreError;
use shiftgrid_core::roster::RosterSnapshot;
use shiftgrid_core::template::RosterTemplate;
use shiftgrid_core::types::DbId;
use shiftgrid_db::models::run::{NewSchedulerRun, SchedulerRun};
use shiftgrid_db::models::schedule::{Schedule, ScheduleSlot};
use shiftgrid_db::repositories::run_repo::CompletedRun;
use shiftgrid_db::repositories::{RosterRepo, RunRepo, ScheduleRepo, TemplateRepo};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/runs`.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRunRequest {
    /// Fresh generation from a template. Exactly one of `template_id` and
    /// `schedule_id` must be set.
    pub template_id: Option<DbId>,
    /// Regeneration of an existing schedule.
    pub schedule_id: Option<DbId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Omitted seed means a random one; the chosen value is recorded on the
    /// run so any generation can be replayed exactly.
    pub seed: Option<u64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0, message = "decay_rate must be between 0 and 1"))]
    pub decay_rate: f64,
    #[serde(default = "default_true")]
    pub preserve_manual_edits: bool,
    #[serde(default)]
    pub overwrite_locked: bool,
    #[serde(default)]
    pub shift_type_weights: HashMap<String, f64>,
    pub requested_by: Option<String>,
}

fn default_true() -> bool {
    true
}

impl GenerateRunRequest {
    /// Cross-field checks validator's derive cannot express.
    fn check(&self) -> AppResult<()> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match (self.template_id, self.schedule_id) {
            (Some(_), Some(_)) | (None, None) => Err(AppError::BadRequest(
                "Exactly one of template_id and schedule_id must be set".into(),
            )),
            _ => Ok(()),
        }?;
        if self.start_date > self.end_date {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".into(),
            ));
        }
        // The run row stores the seed as BIGINT; the persisted value and
        // the options payload must agree.
        if self.seed.is_some_and(|s| s > i64::MAX as u64) {
            return Err(AppError::BadRequest(format!(
                "seed must not exceed {}",
                i64::MAX
            )));
        }
        Ok(())
    }
}

/// Everything a completed run returns to the caller.
#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub run: SchedulerRun,
    pub schedule: Schedule,
    pub slots: Vec<ScheduleSlot>,
    pub conflicts: Vec<SlotConflict>,
    pub telemetry: RunTelemetry,
}

/// Resolved inputs of a run that has been recorded but not yet executed.
struct PreparedRun {
    tenant_id: DbId,
    run_id: DbId,
    template_id: DbId,
    start: NaiveDate,
    end: NaiveDate,
    template: RosterTemplate,
    snapshot: RosterSnapshot,
    prior: Vec<PriorSlot>,
    options: RunOptions,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Execute one generation run for a tenant.
pub async fn generate_run(
    state: &AppState,
    tenant_id: DbId,
    request: GenerateRunRequest,
) -> AppResult<GenerationResult> {
    request.check()?;

    // Resolve the template and, when regenerating, the prior slots.
    let (template_id, source_schedule_id, prior) = resolve_source(state, tenant_id, &request).await?;

    let template_row = TemplateRepo::find_by_id(&state.pool, tenant_id, template_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        }))?;
    let template = template_row.to_domain()?;

    // Claim the (tenant, range) slot before any writes happen.
    let permit = state
        .run_gate
        .try_acquire(tenant_id, request.start_date, request.end_date)
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "An overlapping generation is already running for this tenant".into(),
            ))
        })?;

    let options = RunOptions {
        // Random seeds stay within BIGINT range; requested ones are
        // validated in `check`.
        seed: request.seed.unwrap_or_else(|| rand::random::<u64>() >> 1),
        decay_rate: request.decay_rate,
        preserve_manual_edits: request.preserve_manual_edits,
        overwrite_locked: request.overwrite_locked,
        shift_type_weights: request.shift_type_weights.clone(),
    };
    let options_json = serde_json::to_value(&options)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize run options: {e}")))?;

    let run = RunRepo::create(
        &state.pool,
        tenant_id,
        &NewSchedulerRun {
            template_id,
            source_schedule_id,
            range_start: request.start_date,
            range_end: request.end_date,
            seed: options.seed as i64,
            options: options_json,
            requested_by: request.requested_by.clone(),
        },
    )
    .await?;

    let snapshot = RosterRepo::snapshot(&state.pool, tenant_id, request.start_date, request.end_date)
        .await?;

    tracing::info!(
        tenant_id,
        run_id = run.id,
        template_id,
        start = %request.start_date,
        end = %request.end_date,
        employees = snapshot.employees.len(),
        prior_slots = prior.len(),
        "Starting generation run",
    );

    let prepared = PreparedRun {
        tenant_id,
        run_id: run.id,
        template_id,
        start: request.start_date,
        end: request.end_date,
        template,
        snapshot,
        prior,
        options,
    };

    // Execution and persistence run as their own task holding the permit.
    // The run row already exists, so once this task starts the row always
    // reaches a terminal state even if nobody awaits the response.
    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let _permit = permit;
        execute_and_persist(&task_state, prepared).await
    });

    task.await
        .map_err(|e| AppError::InternalError(format!("Generation task failed: {e}")))?
}

/// Run the engine and persist the outcome, flipping the run to `failed` on
/// every error path.
async fn execute_and_persist(
    state: &AppState,
    prepared: PreparedRun,
) -> AppResult<GenerationResult> {
    let PreparedRun {
        tenant_id,
        run_id,
        template_id,
        start,
        end,
        template,
        snapshot,
        prior,
        options,
    } = prepared;

    // The engine is pure CPU work; run it off the async worker threads and
    // under the shutdown token so it aborts instead of outliving the server.
    let cancel = state.shutdown.child_token();
    let engine_cancel = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || {
        generate_roster(
            &template,
            start,
            end,
            &snapshot,
            &prior,
            &options,
            &engine_cancel,
        )
    });

    let timeout = Duration::from_secs(state.config.generation_timeout_secs);
    let outcome = match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => {
            joined.map_err(|e| AppError::InternalError(format!("Generation task failed: {e}")))?
        }
        Err(_) => {
            cancel.cancel();
            fail_run(state, tenant_id, run_id, "Generation timed out").await;
            return Err(AppError::Core(CoreError::Cancelled));
        }
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            fail_run(state, tenant_id, run_id, &err.to_string()).await;
            return Err(err.into());
        }
    };

    let telemetry_json = serde_json::to_value(&outcome.telemetry)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize telemetry: {e}")))?;
    let persisted = RunRepo::persist_completed(
        &state.pool,
        &CompletedRun {
            run_id,
            tenant_id,
            template_id,
            range_start: start,
            range_end: end,
            telemetry: &telemetry_json,
            slots: &outcome.slots,
        },
    )
    .await;

    let (schedule, slots) = match persisted {
        Ok(pair) => pair,
        Err(err) => {
            fail_run(state, tenant_id, run_id, &err.to_string()).await;
            return Err(err.into());
        }
    };

    tracing::info!(
        tenant_id,
        run_id,
        schedule_id = schedule.id,
        assigned = outcome.telemetry.assigned,
        unassigned = outcome.telemetry.unassigned,
        conflicts = outcome.telemetry.conflicts.len(),
        "Generation run completed",
    );

    let run = RunRepo::find_by_id(&state.pool, tenant_id, run_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Run",
            id: run_id,
        }))?;

    Ok(GenerationResult {
        run,
        schedule,
        slots,
        conflicts: outcome.telemetry.conflicts.clone(),
        telemetry: outcome.telemetry,
    })
}

/// Resolve the generation source to (template, source schedule, prior slots).
async fn resolve_source(
    state: &AppState,
    tenant_id: DbId,
    request: &GenerateRunRequest,
) -> AppResult<(DbId, Option<DbId>, Vec<PriorSlot>)> {
    match (request.template_id, request.schedule_id) {
        (Some(template_id), None) => Ok((template_id, None, Vec::new())),
        (None, Some(schedule_id)) => {
            let schedule = ScheduleRepo::find_by_id(&state.pool, tenant_id, schedule_id)
                .await?
                .ok_or(AppError::Core(CoreError::NotFound {
                    entity: "Schedule",
                    id: schedule_id,
                }))?;
            let prior = ScheduleRepo::prior_slots(&state.pool, tenant_id, schedule_id).await?;
            Ok((schedule.template_id, Some(schedule_id), prior))
        }
        // Already rejected by `check`.
        _ => Err(AppError::BadRequest(
            "Exactly one of template_id and schedule_id must be set".into(),
        )),
    }
}

/// Best-effort flip to `failed`; persistence of the failure marker must not
/// mask the original error.
async fn fail_run(state: &AppState, tenant_id: DbId, run_id: DbId, error: &str) {
    if let Err(mark_err) = RunRepo::mark_failed(&state.pool, tenant_id, run_id, error).await {
        tracing::error!(
            tenant_id,
            run_id,
            error = %mark_err,
            "Failed to mark run as failed",
        );
    }
}
