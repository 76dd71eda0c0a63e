//! Configuration for the bundled server binary.
//!
//! Loaded from `sqrl-ssp.toml` in the working directory, or the path in the
//! `SQRL_SSP_CONFIG` environment variable. Every field has a default so an
//! empty (or absent) file yields a runnable demo server.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SspError};

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SspConfig {
    /// HTTP and URL settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Nut minting and lifetime settings.
    #[serde(default)]
    pub nut: NutConfig,
}

/// HTTP and URL settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// URL prefix the four endpoints are mounted under.
    #[serde(default)]
    pub root_path: String,
    /// Force the external host name in sqrl:// URLs; empty = derive from
    /// the request (X-Forwarded-Host, X-Forwarded-Server, then Host).
    #[serde(default)]
    pub host_override: String,
    /// Where the default authenticator redirects after login.
    #[serde(default = "default_success_url")]
    pub success_url: String,
    /// Log level when RUST_LOG is unset: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Nut minting and lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutConfig {
    /// Hex-encoded AES key, 16/24/32 bytes. Empty = ephemeral random key
    /// (nuts do not survive a restart).
    #[serde(default)]
    pub aes_key: String,
    /// Initial counter value; seed with the last persisted value to keep
    /// nuts monotonic across restarts. Restarting at zero is only safe with
    /// a fresh key.
    #[serde(default)]
    pub counter_init: u64,
    /// TTL in seconds for cli-nut hoard entries.
    #[serde(default = "default_expiration_secs")]
    pub nut_expiration_secs: u64,
    /// TTL in seconds for the pag entry.
    #[serde(default = "default_expiration_secs")]
    pub pag_expiration_secs: u64,
}

// Default value functions

fn default_listen_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_success_url() -> String {
    "/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_expiration_secs() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            root_path: String::new(),
            host_override: String::new(),
            success_url: default_success_url(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NutConfig {
    fn default() -> Self {
        Self {
            aes_key: String::new(),
            counter_init: 0,
            nut_expiration_secs: default_expiration_secs(),
            pag_expiration_secs: default_expiration_secs(),
        }
    }
}

impl SspConfig {
    /// Load configuration from the default location, falling back to
    /// defaults if no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| SspError::Config(format!("{}: {e}", path.display())))?;
            toml::from_str(&content)
                .map_err(|e| SspError::Config(format!("{}: {e}", path.display())))
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SQRL_SSP_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("sqrl-ssp.toml")
    }

    /// The decoded AES key, if one is configured.
    pub fn aes_key(&self) -> Result<Option<Vec<u8>>> {
        if self.nut.aes_key.is_empty() {
            return Ok(None);
        }
        let key = hex::decode(&self.nut.aes_key)
            .map_err(|e| SspError::Config(format!("aes_key is not valid hex: {e}")))?;
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(SspError::Config(format!(
                "aes_key must be 16, 24, or 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Some(key))
    }

    /// Cli-nut TTL as a duration.
    pub fn nut_expiration(&self) -> Duration {
        Duration::from_secs(self.nut.nut_expiration_secs)
    }

    /// Pag-entry TTL as a duration.
    pub fn pag_expiration(&self) -> Duration {
        Duration::from_secs(self.nut.pag_expiration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SspConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8000");
        assert_eq!(config.server.success_url, "/");
        assert_eq!(config.nut.nut_expiration_secs, 600);
        assert_eq!(config.nut_expiration(), Duration::from_secs(600));
        assert!(config.aes_key().expect("no key configured").is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: SspConfig = toml::from_str(
            r#"
            [server]
            root_path = "/auth"

            [nut]
            aes_key = "0102030405060708090a0b0c0d0e0f10"
            counter_init = 42
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.root_path, "/auth");
        assert_eq!(config.server.listen_addr, "127.0.0.1:8000");
        assert_eq!(config.nut.counter_init, 42);
        let key = config.aes_key().expect("decode").expect("present");
        assert_eq!(key.len(), 16);
        assert_eq!(key[0], 1);
    }

    #[test]
    fn test_bad_aes_key_rejected() {
        let mut config = SspConfig::default();
        config.nut.aes_key = "zznothex".to_string();
        assert!(config.aes_key().is_err());

        config.nut.aes_key = "01020304".to_string();
        assert!(config.aes_key().is_err(), "short key accepted");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = SspConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: SspConfig = toml::from_str(&toml_str).expect("parse");
    }
}
