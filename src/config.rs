//! Application configuration loaded from environment variables.
//!
//! The Tuya Cloud connection parameters are operational constants: they are
//! read once at startup, validated, and injected into the components that
//! need them. There is no invalidation path short of a restart.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tuya Cloud project client ID
    pub client_id: String,
    /// Tuya Cloud project client secret
    pub client_secret: String,
    /// Regional API base URL, e.g. `https://openapi.tuyaus.com`
    pub base_url: String,
    /// OAuth redirect URI registered with the Tuya project
    pub callback_url: String,
    /// Optional `Security-AuthKey` header value for restricted projects
    pub auth_key: Option<String>,
    /// Optional Tuya project code
    pub project_code: Option<String>,
    /// Public URL of this backend (used for post-OAuth redirects)
    pub backend_url: Option<String>,
    /// Mobile app deep link to bounce to after a successful OAuth callback
    pub deep_link_url: Option<String>,
    /// Server port
    pub port: u16,
}

/// Read an environment variable, treating whitespace-only values as absent.
fn read_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails fast with the first missing required variable so a
    /// misconfigured deployment dies at boot rather than on first request.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            client_id: read_env("TUYA_CLIENT_ID").ok_or(ConfigError::Missing("TUYA_CLIENT_ID"))?,
            client_secret: read_env("TUYA_CLIENT_SECRET")
                .ok_or(ConfigError::Missing("TUYA_CLIENT_SECRET"))?,
            base_url: read_env("TUYA_REGION_BASE_URL")
                .ok_or(ConfigError::Missing("TUYA_REGION_BASE_URL"))?,
            callback_url: read_env("TUYA_CALLBACK_URL")
                .ok_or(ConfigError::Missing("TUYA_CALLBACK_URL"))?,
            auth_key: read_env("TUYA_AUTH_KEY"),
            project_code: read_env("TUYA_PROJECT_CODE"),
            backend_url: read_env("BACKEND_URL"),
            deep_link_url: read_env("TUYA_APP_DEEP_LINK"),
            port: read_env("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            base_url: "https://openapi.tuyaus.example".to_string(),
            callback_url: "https://backend.example/api/tuya/auth/callback".to_string(),
            auth_key: None,
            project_code: None,
            backend_url: Some("https://backend.example".to_string()),
            deep_link_url: None,
            port: 8080,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
