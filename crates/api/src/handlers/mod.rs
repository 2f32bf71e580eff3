pub mod runs;
pub mod schedules;
pub mod templates;
