//! Configuration validation logic.

use std::collections::HashMap;

use crate::config::schema::{ProxyConfig, ServiceConf};

/// A semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation error: {}", self.0)
    }
}

/// Validate the proxy settings for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError(
            "retries.max_attempts must be > 0".to_string(),
        ));
    }
    if config.balancer.fetch_interval_secs == 0 {
        errors.push(ValidationError(
            "balancer.fetch_interval_secs must be > 0".to_string(),
        ));
    }

    if !config.broker.permissive {
        if config.broker.provider_key.is_empty() {
            errors.push(ValidationError(
                "broker.provider_key is required unless the broker is permissive".to_string(),
            ));
        }
        if config.broker.authorize_url.is_empty() || config.broker.report_url.is_empty() {
            errors.push(ValidationError(
                "broker.authorize_url and broker.report_url are required unless the broker is permissive"
                    .to_string(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the service/backend maps against each other.
pub fn validate_topology(
    services: &HashMap<String, ServiceConf>,
    backends: &HashMap<String, Vec<String>>,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, conf) in services {
        if !conf.path.starts_with('/') {
            errors.push(ValidationError(format!(
                "service '{name}' path '{}' must start with '/'",
                conf.path
            )));
        }
        match backends.get(name) {
            Some(urls) if !urls.is_empty() => {}
            _ => {
                errors.push(ValidationError(format!(
                    "service '{name}' has no configured backends"
                )));
            }
        }
    }

    for name in backends.keys() {
        if !services.contains_key(name) {
            tracing::warn!(service = %name, "backends configured for an unknown service");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.broker.provider_key = "pk".into();
        config.broker.authorize_url = "http://auth.example.com/authorize.xml".into();
        config.broker.report_url = "http://auth.example.com/transactions.xml".into();
        config
    }

    #[test]
    fn default_config_with_broker_urls_is_valid() {
        assert!(validate_config(&quota_config()).is_ok());
    }

    #[test]
    fn quota_broker_requires_provider_key() {
        let mut config = quota_config();
        config.broker.provider_key.clear();

        let errs = validate_config(&config).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].0.contains("provider_key"));
    }

    #[test]
    fn permissive_broker_needs_no_authorizer() {
        let mut config = ProxyConfig::default();
        config.broker.permissive = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let mut config = quota_config();
        config.retries.max_attempts = 0;

        let errs = validate_config(&config).unwrap_err();
        assert!(errs[0].0.contains("max_attempts"));
    }

    #[test]
    fn service_without_backends_is_rejected() {
        let mut services = HashMap::new();
        services.insert(
            "service1".to_string(),
            ServiceConf {
                path: "/service1".into(),
            },
        );
        let backends = HashMap::new();

        let errs = validate_topology(&services, &backends).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].0.contains("no configured backends"));
    }

    #[test]
    fn service_path_must_be_absolute() {
        let mut services = HashMap::new();
        services.insert(
            "service1".to_string(),
            ServiceConf {
                path: "service1".into(),
            },
        );
        let mut backends = HashMap::new();
        backends.insert(
            "service1".to_string(),
            vec!["http://127.0.0.1:8000".to_string()],
        );

        let errs = validate_topology(&services, &backends).unwrap_err();
        assert!(errs[0].0.contains("must start with '/'"));
    }
}
