//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Service handler needs a backend
//!     → balancer.rs (channel request to the refresh task)
//!     → router.rs picks one endpoint from the cached pool
//!     → endpoint.rs value returned to the handler
//!
//! Concurrently, on a timer:
//!     → discover (crate::discover) produces a fresh pool
//!     → cache swapped atomically; kept on failure
//! ```
//!
//! # Design Decisions
//! - Routing decisions are computed by the refresh task at service
//!   time, so a pool swap takes effect immediately
//! - A balancer cannot exist with an empty pool

pub mod balancer;
pub mod endpoint;
pub mod router;

pub use balancer::{BalancerError, LoadBalancer};
pub use endpoint::Endpoint;
pub use router::{RandomRouter, RequestRouter};
