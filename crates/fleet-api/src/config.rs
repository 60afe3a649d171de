use std::time::Duration;

use fleet_db::RetryPolicy;
use serde::Deserialize;

/// Deployment environment, read from `ENV`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Service configuration, loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    pub database_url: String,
    #[serde(default)]
    pub env: Environment,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    /// Comma separated list of origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    /// Attempts per read-modify-write transaction, including the first one
    #[serde(default = "default_tx_max_attempts")]
    pub tx_max_attempts: u32,
    /// Base delay between transaction attempts, multiplied by the attempt number
    #[serde(default = "default_tx_backoff_ms")]
    pub tx_backoff_ms: u64,
}

const fn default_port() -> u16 {
    3000
}

const fn default_db_max_connections() -> u32 {
    10
}

fn default_allowed_origins() -> String {
    "http://localhost:8080".to_string()
}

const fn default_tx_max_attempts() -> u32 {
    5
}

const fn default_tx_backoff_ms() -> u64 {
    100
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn parsed_allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.tx_max_attempts,
            Duration::from_millis(self.tx_backoff_ms),
        )
    }
}
