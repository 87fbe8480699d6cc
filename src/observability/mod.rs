//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging through `tracing`, initialized once at startup
//! - Metrics are cheap counters behind the `metrics` facade, exposed
//!   by an optional Prometheus endpoint
//! - Every request carries a generated id in its log span

pub mod logging;
pub mod metrics;
