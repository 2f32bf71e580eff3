//! Concurrency gate for generation runs.
//!
//! Generating two overlapping date ranges for the same tenant at the same
//! time would let both runs hand out the same employee-hours. The gate is an
//! in-process registry of active (tenant, range) generations; a request that
//! overlaps an active one is rejected with a conflict rather than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use shiftgrid_core::types::DbId;

#[derive(Debug)]
struct ActiveRange {
    id: u64,
    tenant_id: DbId,
    start: NaiveDate,
    end: NaiveDate,
}

/// Registry of in-flight generations. One per process, shared via `AppState`.
#[derive(Debug, Default)]
pub struct RunGate {
    next_id: AtomicU64,
    active: Mutex<Vec<ActiveRange>>,
}

impl RunGate {
    /// Claim `[start, end]` for `tenant_id`. Returns `None` when an active
    /// generation for the same tenant overlaps the range. The claim is
    /// released when the returned permit drops.
    pub fn try_acquire(
        self: &Arc<Self>,
        tenant_id: DbId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<RunPermit> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let overlapping = active
            .iter()
            .any(|r| r.tenant_id == tenant_id && r.start <= end && start <= r.end);
        if overlapping {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        active.push(ActiveRange {
            id,
            tenant_id,
            start,
            end,
        });
        Some(RunPermit {
            gate: Arc::clone(self),
            id,
        })
    }
}

/// RAII claim on a (tenant, range) generation slot.
#[derive(Debug)]
pub struct RunPermit {
    gate: Arc<RunGate>,
    id: u64,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        let mut active = self.gate.active.lock().unwrap_or_else(|e| e.into_inner());
        active.retain(|r| r.id != self.id);
    }
}
