//! HTTP API
//!
//! Thin adapter mapping requests onto [`Coordinator::run`](crate::coordinator::Coordinator::run).

mod routes;
mod types;

pub use routes::{AppState, router, serve};
pub use types::{ApiError, HealthResponse, MAX_REQUEST_ITERATIONS, RunRequest};
