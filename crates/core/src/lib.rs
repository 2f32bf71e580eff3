//! Shiftgrid domain core.
//!
//! Pure roster-generation logic with zero internal dependencies: the rule
//! model, slot expansion, eligibility filtering, fairness scoring, and the
//! assignment engine. Everything here is deterministic given its inputs;
//! all I/O (roster, leave, holiday calendar, persistence) happens in the
//! `db` and `api` crates and is handed in as read models.

pub mod conflict;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod expansion;
pub mod fairness;
pub mod roster;
pub mod template;
pub mod types;
