//! Per-service proxy pipeline.
//!
//! # Data Flow
//! ```text
//! routing layer dispatches to a ServiceHandler
//!     → handler.rs (guards, authentication, relay)
//!     → upstream.rs (request building, forwarding attempts)
//! ```

pub mod handler;
pub mod upstream;

pub use handler::{RetryPolicy, ServiceHandler};
pub use upstream::{build_client, UpstreamClient};
