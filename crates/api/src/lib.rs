//! HTTP layer: configuration, routing, handlers, and the generation service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod routes;
pub mod run_gate;
pub mod service;
pub mod state;
