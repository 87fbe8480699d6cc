//! Lifecycle management subsystem.
//!
//! # Design Decisions
//! - Ordered shutdown: stop accepting, stop the balancers, exit
//! - One broadcast channel fans the shutdown signal out to every
//!   long-running task

pub mod shutdown;

pub use shutdown::Shutdown;
