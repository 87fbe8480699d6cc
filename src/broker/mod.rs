//! Quota broker subsystem.
//!
//! # Data Flow
//! ```text
//! Service handler, per request:
//!     → authenticate(): strip credentials, call the authorizer,
//!       build the per-request BrokerMessage
//!     ... upstream round-trip happens ...
//!     → report(): decorate response headers with remaining credits,
//!       post the usage transaction in the background
//! ```
//!
//! # Design Decisions
//! - The BrokerMessage is the only state carried from authentication
//!   into reporting; it is created once and consumed once per request
//! - Reporting never blocks or fails the client reply; its outcome is
//!   observable through a one-shot completion signal (used by tests)

use std::collections::HashMap;

use async_trait::async_trait;
use http::HeaderMap;
use tokio::sync::oneshot;

use crate::http::envelope::RequestEnvelope;
use crate::http::error::ResponseError;

pub mod quota;
pub mod wire;

pub use quota::QuotaBroker;
pub use wire::{StatusDocument, WireError};

/// Canonical spelling of the units header echoed from backends.
pub const CREDITS_HEADER: &str = "X-DL-units";
pub const CREDITS_LEFT_HEADER: &str = "X-DL-units-left";
pub const CREDITS_RESET_HEADER: &str = "X-DL-units-reset";

/// One unit on the response header equals this many reported hits.
pub const HITS_MULTIPLIER: i64 = 1_000_000;

/// Keys of the per-request [`BrokerMessage`].
pub mod keys {
    pub const APP_ID: &str = "appId";
    pub const APP_KEY: &str = "appKey";
    pub const PROVIDER_KEY: &str = "providerKey";
    pub const METHOD: &str = "method";
    pub const CREDITS_LEFT: &str = "creditsLeft";
    pub const CREDITS_RESET: &str = "creditsReset";
}

/// Opaque per-request state carried from `authenticate` to `report`.
pub type BrokerMessage = HashMap<String, String>;

/// Decides whether an incoming request may be proxied, and accounts
/// for its usage afterwards.
#[async_trait]
pub trait AuthBroker: Send + Sync {
    /// Authorize the request, removing client credentials from it.
    ///
    /// `Ok` carries the message for the later `report` call; `Err` is
    /// the ready-to-serialize denial.
    async fn authenticate(
        &self,
        request: &mut RequestEnvelope,
    ) -> Result<BrokerMessage, ResponseError>;

    /// Account for a completed request.
    ///
    /// Mutates the upstream response headers (credit metadata) and
    /// posts the usage transaction in the background. The returned
    /// receiver resolves when the post has finished, whatever its
    /// outcome; the request path does not wait for it.
    fn report(&self, headers: &mut HeaderMap, msg: BrokerMessage) -> oneshot::Receiver<bool>;
}

/// Allows everything and reports nothing. Debug use only.
#[derive(Debug, Default)]
pub struct PermissiveBroker;

#[async_trait]
impl AuthBroker for PermissiveBroker {
    async fn authenticate(
        &self,
        _request: &mut RequestEnvelope,
    ) -> Result<BrokerMessage, ResponseError> {
        Ok(BrokerMessage::new())
    }

    fn report(&self, _headers: &mut HeaderMap, _msg: BrokerMessage) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(true);
        rx
    }
}
