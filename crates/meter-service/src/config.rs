//! Service configuration loaded from the process environment.

use std::time::Duration;

/// Configuration for the metering proxy, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on (default 3000).
    pub port: u16,

    /// Shared API key forwarded to the upstream Anthropic Messages API.
    pub anthropic_api_key: String,

    /// Base URL of the upstream Anthropic Messages API. Fixed to the real
    /// API in production; overridable only so integration tests can point
    /// the proxy at a `wiremock` server instead of the public internet.
    pub anthropic_api_base_url: String,

    /// Shared secret used to validate bearer JWTs (HS256).
    pub jwt_secret: String,

    /// Base URL of the billing service.
    pub domestic_api_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds, applied to both inbound handling and the
    /// upstream proxy call.
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Address to bind the HTTP listener to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Load configuration from environment variables.
    ///
    /// `ANTHROPIC_API_KEY`, `JWT_SECRET`, and `DOMESTIC_API_URL` are
    /// required; a missing one is a startup-time configuration error rather
    /// than a request-time failure.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_env_or("PORT", 3000),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_api_base_url: std::env::var("ANTHROPIC_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            jwt_secret: require_env("JWT_SECRET")?,
            domestic_api_url: require_env("DOMESTIC_API_URL")?,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: parse_env_or("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: parse_env_or("REQUEST_TIMEOUT_SECONDS", 60),
        })
    }
}

/// Error returned when a required environment variable is missing.
#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable: {0}")]
pub struct ConfigError(pub String);

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError(key.to_string()))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_or_falls_back_to_default() {
        std::env::remove_var("METER_TEST_UNSET_VALUE");
        let value: u64 = parse_env_or("METER_TEST_UNSET_VALUE", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn listen_addr_formats_configured_port() {
        let config = Config {
            port: 4100,
            anthropic_api_key: "k".into(),
            anthropic_api_base_url: "https://api.anthropic.com".into(),
            jwt_secret: "s".into(),
            domestic_api_url: "http://billing.invalid".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024,
            request_timeout_seconds: 30,
        };
        assert_eq!(config.listen_addr(), "0.0.0.0:4100");
    }
}
