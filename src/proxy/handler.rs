//! Per-service request pipeline.
//!
//! # Data Flow
//! ```text
//! buffered request (http::envelope middleware already ran)
//!     → query length guard (414)
//!     → path cleared (backend sees only its configured base path)
//!     → broker.authenticate (401/500 on refusal)
//!     → forward with retry (balancer pick per attempt, 502 on failure)
//!     → broker.report (background; response headers decorated first)
//!     → relay status, headers and body to the client
//! ```
//!
//! # Design Decisions
//! - The handler is the only place errors are serialized for clients
//! - The report completion signal is dropped here; only tests await it

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::broker::AuthBroker;
use crate::http::envelope::{BufferedBody, RequestEnvelope, QUERY_MAX_SIZE, REQUEST_MAX_SIZE};
use crate::http::error::ResponseError;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::proxy::upstream::{self, UpstreamClient};
use crate::resilience::retry;

/// Forwarding retry policy, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause: Duration::from_millis(50),
        }
    }
}

/// Serves the request pipeline for one named service.
pub struct ServiceHandler {
    /// Service name, used in logs and metrics.
    pub name: String,
    /// Public path prefix this handler is mounted under.
    pub path: String,
    client: UpstreamClient,
    broker: Arc<dyn AuthBroker>,
    balancer: Arc<LoadBalancer>,
    retry: RetryPolicy,
}

impl ServiceHandler {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        client: UpstreamClient,
        broker: Arc<dyn AuthBroker>,
        balancer: Arc<LoadBalancer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            client,
            broker,
            balancer,
            retry,
        }
    }

    pub async fn handle(self: Arc<Self>, req: Request) -> Response {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", service = %self.name, %request_id);
        self.handle_inner(req).instrument(span).await
    }

    async fn handle_inner(&self, req: Request) -> Response {
        let client_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let buffered = req.extensions().get::<BufferedBody>().cloned();

        let (parts, body) = req.into_parts();
        tracing::debug!(url = %parts.uri, remote = ?client_addr, "request initiated");

        let body = match buffered {
            Some(BufferedBody(bytes)) => bytes,
            // the envelope middleware normally ran already; enforce the
            // cap here too when the handler is driven directly
            None => match axum::body::to_bytes(body, REQUEST_MAX_SIZE).await {
                Ok(bytes) => bytes,
                Err(_) => return ResponseError::request_too_large().into_response(),
            },
        };

        let mut env = RequestEnvelope::new(parts, body, client_addr);

        if env.query().map(str::len).unwrap_or(0) > QUERY_MAX_SIZE {
            return ResponseError::uri_too_long().into_response();
        }

        env.clear_path();

        let msg = match self.broker.authenticate(&mut env).await {
            Ok(msg) => msg,
            Err(err) => {
                metrics::record_auth_denied(&self.name);
                tracing::info!(code = err.code, "authentication refused");
                return err.into_response();
            }
        };

        let attempts = AtomicU32::new(0);
        let result = retry::attempt(self.retry.max_attempts, self.retry.pause, || {
            if attempts.fetch_add(1, Ordering::Relaxed) > 0 {
                metrics::record_retry(&self.name);
            }
            upstream::forward(&self.client, &self.balancer, &env)
        })
        .await;

        let url = env.parts.uri.to_string();
        let short_url: String = url.chars().take(200).collect();

        let (upstream_res, endpoint, duration) = match result {
            Ok(ok) => ok,
            Err(err) => {
                metrics::record_request(&self.name, err.status.as_u16(), Duration::ZERO);
                tracing::error!(
                    url = %short_url,
                    status = err.status.as_u16(),
                    "error proxying request to backend"
                );
                return err.into_response();
            }
        };

        let status = upstream_res.status();
        tracing::info!(
            url = %short_url,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            endpoint = %endpoint,
            "request completed"
        );
        metrics::record_request(&self.name, status.as_u16(), duration);

        let (mut res_parts, res_body) = upstream_res.into_parts();

        // decorates the headers synchronously, posts in the background;
        // the completion signal is only awaited by tests
        let _completion = self.broker.report(&mut res_parts.headers, msg);

        Response::from_parts(res_parts, Body::new(res_body))
    }
}
