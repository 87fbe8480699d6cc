//! Quota-backed authentication broker.
//!
//! Integrates with the external authorization service: every request
//! is authorized (and metered) with a GET to the authorize endpoint,
//! and accounted for with a background POST to the report endpoint.

use std::collections::HashMap;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::oneshot;

use crate::broker::{
    keys, wire::StatusDocument, wire::WireError, AuthBroker, BrokerMessage, CREDITS_HEADER,
    HITS_MULTIPLIER,
};
use crate::http::envelope::RequestEnvelope;
use crate::http::error::ResponseError;
use crate::observability::metrics;

const CREDITS_HEADER_NAME: HeaderName = HeaderName::from_static("x-dl-units");
const CREDITS_LEFT_HEADER_NAME: HeaderName = HeaderName::from_static("x-dl-units-left");
const CREDITS_RESET_HEADER_NAME: HeaderName = HeaderName::from_static("x-dl-units-reset");

/// Idle connections kept per authorizer host.
const POOL_MAX_IDLE_PER_HOST: usize = 128;

pub struct QuotaBroker {
    provider_key: String,
    /// Alternative provider keys, selected by the `$provider` label.
    provider_keys: HashMap<String, String>,
    authorize_url: String,
    report_url: String,
    client: reqwest::Client,
}

impl QuotaBroker {
    pub fn new(
        provider_key: impl Into<String>,
        provider_keys: HashMap<String, String>,
        authorize_url: impl Into<String>,
        report_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()?;

        Ok(Self {
            provider_key: provider_key.into(),
            provider_keys,
            authorize_url: authorize_url.into(),
            report_url: report_url.into(),
            client,
        })
    }

    /// Resolve the provider key for a `$provider` label.
    fn provider_key_for(&self, label: &str) -> String {
        self.provider_keys
            .get(label)
            .cloned()
            .unwrap_or_else(|| self.provider_key.clone())
    }

    /// Call the authorizer and translate its answer.
    ///
    /// Also used directly by the admin credits endpoint, which is why
    /// the parsed status document is returned alongside the message.
    pub async fn do_authenticate(
        &self,
        app_id: &str,
        app_key: &str,
        provider_label: &str,
        metric: &str,
    ) -> Result<(StatusDocument, BrokerMessage), ResponseError> {
        let provider_key = self.provider_key_for(provider_label);

        let mut query: Vec<(String, String)> = vec![
            ("app_id".into(), app_id.into()),
            ("app_key".into(), app_key.into()),
            ("provider_key".into(), provider_key.clone()),
        ];
        if !metric.is_empty() {
            query.push((format!("usage[{metric}]"), "1".into()));
        }

        let response = self
            .client
            .get(&self.authorize_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "cannot reach the quota authorizer");
                ResponseError::internal("error connecting to the authentication backend")
            })?;

        let body = response.text().await.map_err(|e| {
            tracing::error!(error = %e, "error reading the authorizer response");
            ResponseError::internal("error connecting to the authentication backend")
        })?;

        let status = match StatusDocument::parse(&body) {
            Ok(status) => status,
            Err(WireError::ErrorDocument(text)) => {
                return Err(ResponseError::authentication_error(text));
            }
            Err(e) => {
                tracing::warn!(error = %e, "unparsable authorizer response");
                return Err(ResponseError::internal(
                    "bad response from the authentication backend",
                ));
            }
        };

        let mut msg = BrokerMessage::new();
        msg.insert(keys::APP_ID.into(), app_id.into());
        msg.insert(keys::APP_KEY.into(), app_key.into());
        msg.insert(keys::PROVIDER_KEY.into(), provider_key);
        if !metric.is_empty() {
            msg.insert(keys::METHOD.into(), metric.into());
        }
        if let Some((left, reset)) = status.credits() {
            msg.insert(keys::CREDITS_LEFT.into(), left.to_string());
            msg.insert(keys::CREDITS_RESET.into(), reset.into());
        }

        Ok((status, msg))
    }
}

#[async_trait]
impl AuthBroker for QuotaBroker {
    async fn authenticate(
        &self,
        request: &mut RequestEnvelope,
    ) -> Result<BrokerMessage, ResponseError> {
        let creds = request.strip_credentials();
        if creds.app_id.is_empty() || creds.app_key.is_empty() {
            return Err(ResponseError::missing_parameter(
                "missing parameter $app_id or $app_key",
            ));
        }

        let metric = request.metric_name();
        let (status, msg) = self
            .do_authenticate(&creds.app_id, &creds.app_key, &creds.provider, &metric)
            .await?;

        if !status.authorized {
            return Err(ResponseError::authentication_error(status.reason));
        }
        Ok(msg)
    }

    fn report(&self, headers: &mut HeaderMap, msg: BrokerMessage) -> oneshot::Receiver<bool> {
        let units = headers
            .get(&CREDITS_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());

        let units = match units {
            Some(units) => units,
            None => {
                tracing::info!(
                    header = CREDITS_HEADER,
                    "backend response has no usable units header, assuming 1"
                );
                headers.insert(CREDITS_HEADER_NAME, HeaderValue::from_static("1"));
                1.0
            }
        };
        let hits = (units * HITS_MULTIPLIER as f64).round() as i64;

        if let Some(left) = msg
            .get(keys::CREDITS_LEFT)
            .and_then(|v| v.parse::<i64>().ok())
        {
            let after = (left - hits) as f64 / HITS_MULTIPLIER as f64;
            if let Ok(value) = HeaderValue::from_str(&after.to_string()) {
                headers.insert(CREDITS_LEFT_HEADER_NAME, value);
            }
        }
        if let Some(reset) = msg.get(keys::CREDITS_RESET) {
            if let Ok(value) = HeaderValue::from_str(reset) {
                headers.insert(CREDITS_RESET_HEADER_NAME, value);
            }
        }

        let client = self.client.clone();
        let url = self.report_url.clone();
        let provider_key = msg
            .get(keys::PROVIDER_KEY)
            .cloned()
            .unwrap_or_else(|| self.provider_key.clone());
        let app_id = msg.get(keys::APP_ID).cloned().unwrap_or_default();
        let metric = msg
            .get(keys::METHOD)
            .cloned()
            .unwrap_or_else(|| "hits".to_string());

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let form = [
                ("provider_key".to_string(), provider_key),
                ("transactions[0][app_id]".to_string(), app_id),
                (format!("transactions[0][usage][{metric}]"), hits.to_string()),
            ];

            match client.post(&url).form(&form).send().await {
                Ok(res) if res.status() == reqwest::StatusCode::ACCEPTED => {
                    tracing::debug!("usage report accepted");
                }
                Ok(res) => {
                    metrics::record_report_failure();
                    tracing::warn!(status = %res.status(), "unexpected status reporting usage");
                }
                Err(e) => {
                    metrics::record_report_failure();
                    tracing::warn!(error = %e, "usage report failed");
                }
            }
            let _ = tx.send(true);
        });
        rx
    }
}
