use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// `[basic]` table: where subcast listens, where it stores data and the key
/// guarding the bootstrap routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicConfig {
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    pub listen_addr: IpAddr,

    /// TOML: `basic.listen_port`. Default: `9991`.
    pub listen_port: u16,

    /// SQLite URL of the realm/stream/subscription store.
    /// TOML: `basic.database_url`. Default: `sqlite://subcast.db`.
    pub database_url: String,

    /// Fallback filter when `RUST_LOG` is unset.
    /// TOML: `basic.loglevel`. Default: `info`.
    pub loglevel: String,

    /// Key for `/api/v1/admin/*`. Numbers in TOML are accepted as-is.
    /// TOML: `basic.admin_key`. No default; the binary refuses to start
    /// without one.
    pub admin_key: AdminKey,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 9991,
            database_url: "sqlite://subcast.db".to_string(),
            loglevel: "info".to_string(),
            admin_key: AdminKey::default(),
        }
    }
}

impl BasicConfig {
    pub fn listen_socket(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.listen_port)
    }

    /// Problems that make this section unusable for the server binary.
    pub fn validate(&self) -> Result<(), String> {
        if self.admin_key.as_str().trim().is_empty() {
            return Err("basic.admin_key must be set and non-empty".to_string());
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err(format!(
                "basic.database_url must be a sqlite: URL, got {:?}",
                self.database_url
            ));
        }
        Ok(())
    }
}

/// Admin key as written in TOML: a string, or a bare integer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "RawKey", into = "String")]
pub struct AdminKey(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Number(i64),
}

impl From<RawKey> for AdminKey {
    fn from(raw: RawKey) -> Self {
        match raw {
            RawKey::Text(text) => AdminKey(text),
            RawKey::Number(number) => AdminKey(number.to_string()),
        }
    }
}

impl From<AdminKey> for String {
    fn from(key: AdminKey) -> Self {
        key.0
    }
}

impl AdminKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn shared(&self) -> Arc<str> {
        Arc::from(self.0.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_admin_key_is_rejected() {
        let cfg = BasicConfig::default();
        assert_eq!(
            cfg.validate(),
            Err("basic.admin_key must be set and non-empty".to_string())
        );
    }

    #[test]
    fn non_sqlite_urls_are_rejected() {
        let cfg = BasicConfig {
            admin_key: AdminKey("secret".to_string()),
            database_url: "postgres://localhost/subcast".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn listen_socket_joins_addr_and_port() {
        let cfg = BasicConfig {
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            listen_port: 8080,
            ..Default::default()
        };
        assert_eq!(cfg.listen_socket().to_string(), "127.0.0.1:8080");
    }
}
