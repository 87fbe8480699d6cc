//! Request envelope: bounded, rewindable request bodies.
//!
//! # Responsibilities
//! - Enforce the ingress body cap before any other component runs
//! - Buffer the body so forwarding retries can re-send identical bytes
//! - Own the query/form surgery used by the quota broker
//!
//! # Design Decisions
//! - The buffered body is `Bytes`; "rewinding" is a cheap clone per
//!   attempt, which guarantees byte-identical retries
//! - Credential parameters are removed from the query for every
//!   method, so they can never travel upstream; the authoritative read
//!   location stays method-dependent (GET: query, otherwise form body)
//! - Non-reserved repeated parameters keep their order and multiplicity

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    request::Parts,
    uri::Uri,
    HeaderMap, HeaderValue, Method,
};

use crate::http::error::ResponseError;

/// Ingress body cap: 1 MiB.
pub const REQUEST_MAX_SIZE: usize = 1 << 20;

/// Query strings longer than this are refused with 414.
pub const QUERY_MAX_SIZE: usize = 7001;

/// Reserved client credential parameters, stripped before forwarding.
pub const APP_ID_PARAM: &str = "$app_id";
pub const APP_KEY_PARAM: &str = "$app_key";
pub const PROVIDER_PARAM: &str = "$provider";

/// The buffered request body, stashed in request extensions by
/// [`buffer_request`] for the service handlers.
#[derive(Debug, Clone)]
pub struct BufferedBody(pub Bytes);

/// Middleware: read at most [`REQUEST_MAX_SIZE`] bytes of body into
/// memory before dispatch. Larger bodies are refused with 400 before
/// any other component sees the request.
pub async fn buffer_request(req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let bytes = match axum::body::to_bytes(body, REQUEST_MAX_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::info!(uri = %parts.uri, error = %e, "request body over ingress cap");
            return ResponseError::request_too_large().into_response();
        }
    };

    parts.extensions.insert(BufferedBody(bytes.clone()));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Credentials extracted from a request by the broker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub app_key: String,
    pub provider: String,
}

/// An inbound request with its body fully buffered.
///
/// Created once per request by the service handler, consumed by the
/// broker (credential stripping) and the upstream builder (retries).
#[derive(Debug)]
pub struct RequestEnvelope {
    pub parts: Parts,
    body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl RequestEnvelope {
    pub fn new(parts: Parts, body: Bytes, client_addr: Option<SocketAddr>) -> Self {
        Self {
            parts,
            body,
            client_addr,
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// The buffered body. Cloning `Bytes` is cheap; every forwarding
    /// attempt re-sends these exact bytes.
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Usage counter label for this request: the path with surrounding
    /// slashes trimmed.
    pub fn metric_name(&self) -> String {
        self.path().trim_matches('/').to_string()
    }

    /// Full-strip path policy: the backend receives only the endpoint's
    /// configured base path, so the client-visible path is cleared
    /// before authentication.
    pub fn clear_path(&mut self) {
        let query = self.query().map(str::to_string);
        self.set_path_and_query("/", query.as_deref());
    }

    /// Remove the reserved credential parameters and return them.
    ///
    /// The query is always scrubbed. For non-GET methods the form body
    /// is scrubbed too and is the authoritative credential source.
    pub fn strip_credentials(&mut self) -> Credentials {
        let query_creds = self.strip_query_credentials();
        if self.parts.method == Method::GET {
            return query_creds;
        }
        self.strip_form_credentials()
    }

    fn strip_query_credentials(&mut self) -> Credentials {
        let query = match self.parts.uri.query() {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => return Credentials::default(),
        };

        let (creds, kept) = split_reserved(query.as_bytes());
        let path = self.parts.uri.path().to_string();
        self.set_path_and_query(&path, encode_pairs(&kept).as_deref());
        creds
    }

    fn strip_form_credentials(&mut self) -> Credentials {
        if !self.is_form_encoded() {
            return Credentials::default();
        }

        let (creds, kept) = split_reserved(&self.body);
        self.body = Bytes::from(encode_pairs(&kept).unwrap_or_default());
        self.parts
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        creds
    }

    fn is_form_encoded(&self) -> bool {
        self.parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false)
    }

    fn set_path_and_query(&mut self, path: &str, query: Option<&str>) {
        let path_and_query = match query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        };

        let mut uri_parts = self.parts.uri.clone().into_parts();
        match path_and_query.parse() {
            Ok(pq) => uri_parts.path_and_query = Some(pq),
            Err(e) => {
                tracing::warn!(error = %e, "rewritten path/query is not a valid uri, keeping original");
                return;
            }
        }
        if let Ok(uri) = Uri::from_parts(uri_parts) {
            self.parts.uri = uri;
        }
    }
}

/// Split `pairs` into reserved credentials (first value wins) and the
/// remaining pairs in their original order.
fn split_reserved(raw: &[u8]) -> (Credentials, Vec<(String, String)>) {
    let mut creds = Credentials::default();
    let mut kept = Vec::new();

    for (k, v) in url::form_urlencoded::parse(raw) {
        let (key, value) = (k.into_owned(), v.into_owned());
        if key == APP_ID_PARAM {
            if creds.app_id.is_empty() {
                creds.app_id = value;
            }
        } else if key == APP_KEY_PARAM {
            if creds.app_key.is_empty() {
                creds.app_key = value;
            }
        } else if key == PROVIDER_PARAM {
            if creds.provider.is_empty() {
                creds.provider = value;
            }
        } else {
            kept.push((key, value));
        }
    }

    (creds, kept)
}

fn encode_pairs(pairs: &[(String, String)]) -> Option<String> {
    if pairs.is_empty() {
        return None;
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k, v);
    }
    Some(serializer.finish())
}
