//! Axum middleware for the HTTP side of a service (health, readiness, metrics).

pub mod metrics;
pub mod tracing;
