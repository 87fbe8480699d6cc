//! Administrative side channel.
//!
//! # Design Decisions
//! - Mounted on the same listener as the proxied services, under a
//!   configurable path prefix (default `admin`)
//! - The credits endpoint talks to the quota broker directly and never
//!   consumes usage (empty metric)

pub mod handlers;

pub use handlers::{credits, status, CreditsState};
