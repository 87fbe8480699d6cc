//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (case-preserving HTTP/1.1 connection, peer address)
//!     → envelope.rs (ingress body cap, buffered rewindable body)
//!     → routing layer dispatches to a service handler
//!     → error.rs serializes any proxy-generated failure
//! ```

pub mod envelope;
pub mod error;
pub mod server;

pub use envelope::{BufferedBody, RequestEnvelope, REQUEST_MAX_SIZE};
pub use error::ResponseError;
pub use server::HttpServer;
