//! Network layer.
//!
//! # Design Decisions
//! - Accept-side concurrency is bounded by a semaphore so overload
//!   turns into accept backpressure instead of unbounded tasks

pub mod listener;

pub use listener::{ConnectionPermit, Listener, ListenerError};
