// KB Smart Gateway - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Process configuration from environment variables. The backend credential
// is required — the gateway refuses to start without it.

use thiserror::Error;

/// Default backend base URL when KB_BACKEND_URL is not set
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8181";

/// Configuration errors — all startup-fatal
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KB_API_KEY is not set — the gateway cannot authenticate to the backend")]
    MissingApiKey,
}

/// Gateway process configuration, read once at startup
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the knowledge-base backend
    pub backend_url: String,
    /// Shared-secret credential attached to every backend request
    pub api_key: String,
    /// Verbose-logging toggle (KB_GATE_VERBOSE=1/true)
    pub verbose: bool,
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    /// Missing or empty KB_API_KEY is a fatal error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup function (environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("KB_BACKEND_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let api_key = match lookup("KB_API_KEY") {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(ConfigError::MissingApiKey),
        };

        let verbose = lookup("KB_GATE_VERBOSE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self { backend_url, api_key, verbose })
    }
}

// ============================================================================
// TESTS
// ============================================================================
