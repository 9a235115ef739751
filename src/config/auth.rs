use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API key lookup configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// How long a resolved API key stays cached.
    /// TOML: `auth.api_key_cache_ttl_secs`. Default: `60`.
    #[serde(default = "default_ttl_secs")]
    pub api_key_cache_ttl_secs: u64,

    /// Maximum cached API keys.
    /// TOML: `auth.api_key_cache_capacity`. Default: `10000`.
    #[serde(default = "default_capacity")]
    pub api_key_cache_capacity: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_cache_ttl_secs: default_ttl_secs(),
            api_key_cache_capacity: default_capacity(),
        }
    }
}

impl AuthConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.api_key_cache_ttl_secs.max(1))
    }
}

fn default_ttl_secs() -> u64 {
    60
}

fn default_capacity() -> u64 {
    10_000
}
