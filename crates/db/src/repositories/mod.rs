//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Every query is tenant-scoped.

pub mod roster_repo;
pub mod run_repo;
pub mod schedule_repo;
pub mod template_repo;

pub use roster_repo::RosterRepo;
pub use run_repo::RunRepo;
pub use schedule_repo::ScheduleRepo;
pub use template_repo::TemplateRepo;
