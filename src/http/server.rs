//! HTTP server: accept loop and connection driving.
//!
//! # Responsibilities
//! - Wrap the routing layer with the envelope, timeout and trace
//!   middleware
//! - Drive each connection through hyper with header-case
//!   preservation, so backend header spellings reach the client intact
//! - Inject the peer address for X-Forwarded-For maintenance
//!
//! # Design Decisions
//! - Connections are served manually instead of through `axum::serve`
//!   because the case-preservation knob lives on the HTTP/1.1
//!   connection builder

use std::net::SocketAddr;
use std::time::Duration;

use axum::{body::Body, extract::ConnectInfo, middleware, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::envelope;
use crate::net::{ConnectionPermit, Listener, ListenerError};

/// HTTP server for the proxy.
pub struct HttpServer {
    app: Router,
}

impl HttpServer {
    /// Wrap the router with the ingress middleware stack.
    pub fn new(router: Router, config: &ProxyConfig) -> Self {
        let app = router
            .layer(middleware::from_fn(envelope::buffer_request))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http());

        Self { app }
    }

    /// Accept connections until the shutdown signal fires.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => {
                    let (stream, peer, permit) = accepted?;
                    let app = self.app.clone();
                    tokio::spawn(serve_connection(stream, peer, app, permit));
                }
            }
        }

        tracing::info!("http server stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, app: Router, permit: ConnectionPermit) {
    let service = hyper::service::service_fn(move |mut req: hyper::Request<Incoming>| {
        req.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(req.map(Body::new))
    });

    let connection = http1::Builder::new()
        .preserve_header_case(true)
        .serve_connection(TokioIo::new(stream), service);

    if let Err(e) = connection.await {
        tracing::debug!(peer = %peer, error = %e, "connection closed with error");
    }
    drop(permit);
}
