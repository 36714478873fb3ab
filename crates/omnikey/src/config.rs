//! Deployment configuration.
//!
//! Loaded from JSON. Every field is optional and falls back to its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use omnikey_keystore::KeyStoreConfig;
use omnikey_permitter::PermitterConfig;

use crate::error::Result;

/// Which entropy source backs key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyMode {
    /// Operating system RNG.
    #[default]
    Os,
    /// Deterministic hash chain. Predictable to anyone who can observe the
    /// deployment's clock and address.
    HashChain,
}

/// Where audit events go.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// SQLite file. `None` keeps events in memory.
    pub path: Option<PathBuf>,
}

/// Backoff for the relayer's create-then-fetch flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Wait after submitting a creation before the first fetch.
    pub initial_delay_ms: u64,
    /// One fetch per entry; the delay is slept after a failed fetch, except
    /// the last.
    pub retry_delays_ms: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 10_000,
            retry_delays_ms: vec![5_000, 10_000, 15_000],
        }
    }
}

impl RetryPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn retry_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.retry_delays_ms.iter().map(|ms| Duration::from_millis(*ms))
    }

    pub fn attempts(&self) -> usize {
        self.retry_delays_ms.len()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OmnikeyConfig {
    pub keystore: KeyStoreConfig,
    pub permitter: PermitterConfig,
    pub retry: RetryPolicy,
    pub audit: AuditConfig,
    pub entropy: EntropyMode,
}

impl OmnikeyConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = OmnikeyConfig::from_json_str("{}").unwrap();
        assert_eq!(config, OmnikeyConfig::default());
        assert_eq!(config.keystore.name, "OmniKeyStore");
        assert_eq!(config.permitter.max_upstream_hops, 8);
        assert_eq!(config.retry.attempts(), 3);
        assert_eq!(config.entropy, EntropyMode::Os);
    }

    #[test]
    fn test_partial_override() {
        let config = OmnikeyConfig::from_json_str(
            r#"{
                "keystore": {"version": "2"},
                "retry": {"initial_delay_ms": 1},
                "entropy": "hash_chain",
                "audit": {"path": "/tmp/audit.db"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.keystore.name, "OmniKeyStore");
        assert_eq!(config.keystore.version, "2");
        assert_eq!(config.retry.initial_delay(), Duration::from_millis(1));
        assert_eq!(config.retry.retry_delays_ms, vec![5_000, 10_000, 15_000]);
        assert_eq!(config.entropy, EntropyMode::HashChain);
        assert_eq!(config.audit.path, Some(PathBuf::from("/tmp/audit.db")));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = OmnikeyConfig::from_json_str("{").unwrap_err();
        assert_eq!(err.kind(), omnikey_core::ErrorKind::Input);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omnikey.json");
        std::fs::write(&path, r#"{"permitter": {"max_upstream_hops": 2}}"#).unwrap();
        let config = OmnikeyConfig::load(&path).unwrap();
        assert_eq!(config.permitter.max_upstream_hops, 2);
    }
}
