//! Administrative side-channel endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::broker::{keys, QuotaBroker, HITS_MULTIPLIER};
use crate::http::envelope::{APP_ID_PARAM, APP_KEY_PARAM, PROVIDER_PARAM};

/// Liveness probe.
pub async fn status() -> &'static str {
    "ok"
}

/// Placeholder value for plans without a consumable limit.
const UNLIMITED_PLAN_CREDITS: i64 = -42;

#[derive(Clone)]
pub struct CreditsState {
    pub broker: Arc<QuotaBroker>,
}

#[derive(Serialize)]
struct CreditsData {
    #[serde(rename = "creditsLeft")]
    credits_left: i64,
    #[serde(rename = "nextReset")]
    next_reset: String,
}

#[derive(Serialize)]
struct CreditsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<CreditsData>,
    error: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    status: u16,
}

impl CreditsResponse {
    fn failure(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            data: None,
            error: true,
            message: message.into(),
            code: Some(code),
            status: 400,
        }
    }

    fn success(data: CreditsData) -> Self {
        Self {
            data: Some(data),
            error: false,
            message: String::new(),
            code: None,
            status: 200,
        }
    }
}

/// Inspect the credits left for an application without consuming any.
///
/// Credentials come from the same reserved query parameters clients
/// use on the proxied endpoints.
pub async fn credits(
    State(state): State<CreditsState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let app_id = params.get(APP_ID_PARAM).map(String::as_str).unwrap_or("");
    let app_key = params.get(APP_KEY_PARAM).map(String::as_str).unwrap_or("");
    let provider = params.get(PROVIDER_PARAM).map(String::as_str).unwrap_or("");

    let body = if app_id.is_empty() {
        CreditsResponse::failure("Missing parameter $app_id", "error.missingParameter")
    } else {
        match state.broker.do_authenticate(app_id, app_key, provider, "").await {
            Err(err) => {
                tracing::info!(error = %err, "credits lookup failed against the authorizer");
                CreditsResponse::failure(
                    "Error connecting to the authentication backend",
                    "error.internalServerError",
                )
            }
            Ok((status, msg)) => {
                match msg.get(keys::CREDITS_LEFT).and_then(|v| v.parse::<i64>().ok()) {
                    Some(hits) => CreditsResponse::success(CreditsData {
                        credits_left: hits / HITS_MULTIPLIER,
                        next_reset: msg.get(keys::CREDITS_RESET).cloned().unwrap_or_default(),
                    }),
                    None if status.authorized => CreditsResponse::success(CreditsData {
                        credits_left: UNLIMITED_PLAN_CREDITS,
                        next_reset: String::new(),
                    }),
                    None => CreditsResponse::failure(
                        "Bad response from the authentication backend",
                        "error.authenticationError",
                    ),
                }
            }
        }
    };

    let status = StatusCode::from_u16(body.status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(body)).into_response()
}
