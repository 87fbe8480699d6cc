//! Upstream request construction and forwarding.
//!
//! # Responsibilities
//! - Build the outgoing request from the buffered envelope
//! - Strip hop-by-hop headers, maintain X-Forwarded-For
//! - Perform one forwarding attempt and classify its failure

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Response, Uri, Version};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::http::envelope::RequestEnvelope;
use crate::http::error::ResponseError;
use crate::load_balancer::{Endpoint, LoadBalancer};

pub type UpstreamClient = Client<HttpConnector, Full<Bytes>>;

/// Hop-by-hop headers, removed when forwarding to the backend.
/// https://www.rfc-editor.org/rfc/rfc2616#section-13.5.1
const HOP_HEADERS: [HeaderName; 8] = [
    HeaderName::from_static("connection"),
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-authenticate"),
    HeaderName::from_static("proxy-authorization"),
    HeaderName::from_static("te"),
    HeaderName::from_static("trailers"),
    HeaderName::from_static("transfer-encoding"),
    HeaderName::from_static("upgrade"),
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Build the shared upstream client.
///
/// Header case preservation is enabled so backend header spellings
/// survive the trip through the proxy.
pub fn build_client(connect_timeout: Duration) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));

    Client::builder(TokioExecutor::new())
        .http1_preserve_header_case(true)
        .build(connector)
}

/// Build one forwarding attempt's request.
///
/// The method, headers and buffered body are copied from the envelope;
/// the target is the endpoint's host and configured base path (the
/// client-visible subpath was already stripped). The proxy speaks
/// plain HTTP/1.1 to its backends.
pub fn upstream_request(
    env: &RequestEnvelope,
    endpoint: &Endpoint,
) -> Result<Request<Full<Bytes>>, http::Error> {
    let path_and_query = match env.query() {
        Some(q) if !q.is_empty() => format!("{}?{}", endpoint.upstream_path(), q),
        _ => endpoint.upstream_path().to_string(),
    };

    let uri = Uri::builder()
        .scheme("http")
        .authority(endpoint.authority.as_str())
        .path_and_query(path_and_query)
        .build()?;

    let mut request = Request::builder()
        .method(env.method().clone())
        .uri(uri)
        .version(Version::HTTP_11)
        .body(Full::new(env.body()))?;

    let headers = request.headers_mut();
    for (name, value) in env.headers() {
        if HOP_HEADERS.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    // fold any prior X-Forwarded-For list and append the client address
    if let Some(addr) = env.client_addr {
        let mut chain: Vec<String> = headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        chain.push(addr.ip().to_string());
        if let Ok(value) = HeaderValue::from_str(&chain.join(", ")) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    Ok(request)
}

/// One forwarding attempt: pick a backend, send, time the round-trip.
///
/// Any transport-level failure maps to a 502; a response from the
/// backend, whatever its status, is a success to be relayed.
pub async fn forward(
    client: &UpstreamClient,
    balancer: &LoadBalancer,
    env: &RequestEnvelope,
) -> Result<(Response<Incoming>, Endpoint, Duration), ResponseError> {
    let endpoint = balancer.next().await.map_err(|e| {
        tracing::error!(error = %e, "no endpoint available");
        ResponseError::internal("load balancer unavailable")
    })?;

    let request = upstream_request(env, &endpoint).map_err(|e| {
        tracing::error!(endpoint = %endpoint, error = %e, "cannot build upstream request");
        ResponseError::internal("cannot build upstream request")
    })?;

    let start = Instant::now();
    match client.request(request).await {
        Ok(response) => Ok((response, endpoint, start.elapsed())),
        Err(e) => {
            if e.is_connect() {
                tracing::info!(endpoint = %endpoint, error = %e, "backend connect failed or timed out");
            } else {
                tracing::info!(endpoint = %endpoint, error = %e, "backend transport error");
            }
            Err(ResponseError::bad_gateway("can't connect to the backend server"))
        }
    }
}
