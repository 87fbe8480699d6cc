//! Proxy routing layer.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → /status, /<admin>/credits (side channel)
//!     → /<service>, /<service>/, /<service>/...  → ServiceHandler
//!     → anything else → 404 JSON envelope
//! ```
//!
//! # Design Decisions
//! - Each service is registered with and without the trailing slash,
//!   plus a wildcard for the client-visible subpath
//! - The not-found policy lives here, not in the handlers

use std::sync::Arc;

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};

use crate::admin;
use crate::broker::QuotaBroker;
use crate::http::error::ResponseError;
use crate::proxy::ServiceHandler;

/// Assemble the proxy router from the per-service handlers.
///
/// The credits side channel is only mounted when the quota broker is
/// in use; the permissive broker has no credits to inspect.
pub fn build_router(
    handlers: Vec<Arc<ServiceHandler>>,
    quota_broker: Option<Arc<QuotaBroker>>,
    admin_path: &str,
) -> Router {
    let mut router = Router::new().route("/status", get(admin::status));

    if let Some(broker) = quota_broker {
        let path = format!("/{}/credits", admin_path.trim_matches('/'));
        router = router.route(
            &path,
            get(admin::credits).with_state(admin::CreditsState { broker }),
        );
    }

    for handler in handlers {
        let path = handler.path.trim_end_matches('/').to_string();
        tracing::info!(service = %handler.name, path = %path, "registering service");

        for route_path in [path.clone(), format!("{path}/"), format!("{path}/{{*rest}}")] {
            let handler = handler.clone();
            router = router.route(
                &route_path,
                any(move |req: Request| {
                    let handler = handler.clone();
                    async move { handler.handle(req).await }
                }),
            );
        }
    }

    router.fallback(not_found)
}

async fn not_found() -> Response {
    ResponseError::not_found().into_response()
}
