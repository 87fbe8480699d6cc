//! Resilience subsystem.
//!
//! # Design Decisions
//! - Forwarding uses a small fixed retry budget with a constant pause;
//!   retries are taken on transport failures only, never on a status
//!   code the backend actually produced
//! - Every external call has a deadline (connect timeout on the
//!   upstream connector, request timeout at the router layer)

pub mod retry;

pub use retry::attempt;
