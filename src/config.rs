use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::edit::remote::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

pub const BIND_ENV: &str = "PHOTO_EDITOR_BIND";
pub const ENDPOINT_ENV: &str = "PHOTO_EDITOR_ENDPOINT";
pub const MODEL_ENV: &str = "PHOTO_EDITOR_MODEL";
pub const DEFAULT_BIND: &str = "127.0.0.1:8790";

/// Process-level wiring. The API credential is deliberately absent: callers
/// pass it with every edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub endpoint: Url,
    pub model: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = read(BIND_ENV).unwrap_or_else(|| String::from(DEFAULT_BIND));
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBind {
                value: bind_raw.clone(),
                message: e.to_string(),
            })?;

        let endpoint_raw = read(ENDPOINT_ENV).unwrap_or_else(|| String::from(DEFAULT_ENDPOINT));
        let endpoint = Url::parse(endpoint_raw.as_str()).map_err(|e| ConfigError::InvalidEndpoint {
            value: endpoint_raw.clone(),
            message: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                value: endpoint_raw,
                message: String::from("scheme must be http or https"),
            });
        }

        let model = read(MODEL_ENV).unwrap_or_else(|| String::from(DEFAULT_MODEL));

        Ok(Self {
            bind,
            endpoint,
            model,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid PHOTO_EDITOR_BIND '{value}': {message}")]
    InvalidBind { value: String, message: String },
    #[error("invalid PHOTO_EDITOR_ENDPOINT '{value}': {message}")]
    InvalidEndpoint { value: String, message: String },
}
