//! Configuration validation

use crate::schema::RawConfig;
use playcache_api::RecordKind;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("Invalid URL for {field} '{value}': {message}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("Unknown widget kind: {0}")]
    UnknownWidgetKind(String),

    #[error("Profiles are not forwarded to the widget")]
    ProfileWidgetKind,

    #[error("Duplicate widget kind: {0}")]
    DuplicateWidgetKind(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let positives = [
        ("sync.interval_seconds", config.sync.interval_seconds),
        ("remote.timeout_seconds", config.remote.timeout_seconds),
        (
            "connectivity.check_interval_seconds",
            config.connectivity.check_interval_seconds,
        ),
        (
            "connectivity.check_timeout_seconds",
            config.connectivity.check_timeout_seconds,
        ),
    ];
    for (field, value) in positives {
        if value == Some(0) {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    if config.scoring.window == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "scoring.window",
        });
    }

    if let Some(url) = &config.remote.base_url
        && let Err(message) = check_url(url)
    {
        errors.push(ValidationError::InvalidUrl {
            field: "remote.base_url",
            value: url.clone(),
            message,
        });
    }

    if let Some(url) = &config.connectivity.check_url
        && let Err(message) = check_url(url)
    {
        errors.push(ValidationError::InvalidUrl {
            field: "connectivity.check_url",
            value: url.clone(),
            message,
        });
    }

    if let Some(database) = &config.service.database
        && database.trim().is_empty()
    {
        errors.push(ValidationError::GlobalError(
            "service.database must not be empty".into(),
        ));
    }

    if let Some(socket) = &config.service.socket
        && socket.trim().is_empty()
    {
        errors.push(ValidationError::GlobalError(
            "service.socket must not be empty".into(),
        ));
    }

    if let Some(kinds) = &config.widget.kinds {
        let mut seen = HashSet::new();
        for name in kinds {
            match name.parse::<RecordKind>() {
                Ok(RecordKind::Profile) => errors.push(ValidationError::ProfileWidgetKind),
                Ok(_) => {
                    if !seen.insert(name.as_str()) {
                        errors.push(ValidationError::DuplicateWidgetKind(name.clone()));
                    }
                }
                Err(_) => errors.push(ValidationError::UnknownWidgetKind(name.clone())),
            }
        }
    }

    errors
}

fn check_url(url: &str) -> Result<(), String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err("URL is empty".into());
    }

    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| "expected an http:// or https:// URL".to_string())?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err("missing host".into());
    }

    Ok(())
}
