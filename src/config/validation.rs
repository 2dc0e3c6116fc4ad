//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Check that header names and values in mangling rules are legal
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::config::schema::{ProxyConfig, ReplaceConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be > 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    for (i, rule) in config.misdirect.iter().enumerate() {
        let field = format!("misdirect[{}]", i);
        if !rule.rewrites_anything() {
            errors.push(ValidationError::new(&field, "rule replaces nothing"));
        }
        if let Some(scheme) = &rule.scheme {
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
                errors.push(ValidationError::new(format!("{}.scheme", field), "invalid scheme"));
            }
        }
        if let Some(path) = &rule.path {
            if !path.starts_with('/') {
                errors.push(ValidationError::new(format!("{}.path", field), "must start with `/`"));
            }
        }
    }

    check_headers(
        "request",
        &config.request.remove_headers,
        &config.request.set_headers,
        &mut errors,
    );
    check_replacements("request", &config.request.replace, &mut errors);

    check_headers(
        "response",
        &config.response.remove_headers,
        &config.response.set_headers,
        &mut errors,
    );
    check_replacements("response", &config.response.replace, &mut errors);
    if let Some(status) = config.response.status {
        if StatusCode::from_u16(status).is_err() {
            errors.push(ValidationError::new("response.status", "not a valid status code"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_headers<'a>(
    section: &str,
    remove: &[String],
    set: impl IntoIterator<Item = (&'a String, &'a String)>,
    errors: &mut Vec<ValidationError>,
) {
    for name in remove {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.remove_headers", section),
                format!("`{}` is not a header name", name),
            ));
        }
    }
    for (name, value) in set {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.set_headers", section),
                format!("`{}` is not a header name", name),
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                format!("{}.set_headers.{}", section, name),
                "not a valid header value",
            ));
        }
    }
}

fn check_replacements(section: &str, rules: &[ReplaceConfig], errors: &mut Vec<ValidationError>) {
    for (i, rule) in rules.iter().enumerate() {
        if rule.find.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.replace[{}].find", section, i),
                "must not be empty",
            ));
        }
    }
}
