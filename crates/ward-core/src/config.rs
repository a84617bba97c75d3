//! Server connection configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for the remote clinical server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the server API (e.g., `https://server.example.org/api`)
    pub base_url: String,
    /// Basic-auth username
    pub username: String,
    /// Basic-auth password
    pub password: String,
    /// Per-request timeout (default: 30 seconds)
    pub timeout: Duration,
}

impl ServerConfig {
    /// Create a new server configuration with the default timeout.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "server base URL must not be empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "server base URL must include http:// or https://".to_string(),
        ))
    }
}
