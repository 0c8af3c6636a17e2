//! Client configuration.
//!
//! Built once at startup and passed to `ZeroPushClient`. `from_env` reads the
//! process environment; everything else is explicit.

use std::env;

pub const DEFAULT_BASE_URL: &str = "https://api.zeropush.com";

/// Which server token the environment selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// `"production"` selects production; any other value, or none, selects
    /// development.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn token_var(self) -> &'static str {
        match self {
            Environment::Production => "ZEROPUSH_PROD_TOKEN",
            Environment::Development => "ZEROPUSH_DEV_TOKEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Read `BASE_URL`, `ENV` and the matching `ZEROPUSH_*_TOKEN` variable.
    ///
    /// A missing token leaves `auth_token` empty; calls then fail with
    /// `ApiError::MissingAuthToken`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = Environment::parse(lookup("ENV").as_deref());
        let base_url = lookup("BASE_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let auth_token = lookup(environment.token_var()).unwrap_or_default();
        Self {
            base_url,
            auth_token,
        }
    }
}
