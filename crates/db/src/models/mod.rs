//! Database entity models.
//!
//! Row structs derive `FromRow` and serialize directly into API responses;
//! DTOs carry validated request payloads into the repositories.

pub mod roster;
pub mod run;
pub mod schedule;
pub mod template;
