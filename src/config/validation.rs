//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Every violation is collected rather than stopping at the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{BanPolicy, ServerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, returning all violations found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.admission.max_requests_per_client == 0 {
        errors.push(ValidationError::new(
            "admission.max_requests_per_client",
            "must be at least 1",
        ));
    }
    if config.admission.ban == (BanPolicy::Expiring { seconds: 0 }) {
        errors.push(ValidationError::new("admission.ban", "expiring ban needs seconds > 0"));
    }

    if config.workers.capacity == 0 {
        errors.push(ValidationError::new("workers.capacity", "must be at least 1"));
    }

    let routing = &config.routing;
    if routing.version_marker.is_empty() || routing.version_marker.contains('/') {
        errors.push(ValidationError::new(
            "routing.version_marker",
            "must be a single non-empty path segment",
        ));
    }
    if routing.sub_route_suffix.is_empty() {
        errors.push(ValidationError::new("routing.sub_route_suffix", "must not be empty"));
    }

    if config.broker.enabled {
        if config.broker.prefetch == 0 {
            errors.push(ValidationError::new("broker.prefetch", "must be at least 1"));
        }
        if config.broker.response_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "broker.response_timeout_secs",
                "must be at least 1",
            ));
        }
        if config.broker.request_subject == config.broker.response_subject {
            errors.push(ValidationError::new(
                "broker.response_subject",
                "must differ from request_subject",
            ));
        }
    }

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{value}' is not a socket address")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nope".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "listener.bind_address");
    }

    #[test]
    fn broker_checks_only_apply_when_enabled() {
        let mut config = ServerConfig::default();
        config.broker.prefetch = 0;
        assert!(validate_config(&config).is_ok());

        config.broker.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
