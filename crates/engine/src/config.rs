//! Ambient configuration (SPEC_FULL.md §D), round-tripped through a single
//! `k9db.toml` the way `spacetimedb-cli`'s `Config::load`/`save` round-trips
//! its own TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The directory holding this database's `rocksdb` instance and
    /// `k9db.toml` (spec.md §6.2).
    pub data_dir: PathBuf,
    /// §5, "Cancellation/timeouts": default 10s.
    #[serde(with = "duration_secs")]
    pub lock_wait_timeout: Duration,
    /// §4.2's "encryption-off mode" toggle.
    pub encryption_enabled: bool,
    pub default_shard_kind: String,
    pub default_shard_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./k9db-data"),
            lock_wait_timeout: Duration::from_secs(10),
            encryption_enabled: true,
            default_shard_kind: k9db_primitives::DEFAULT_SHARD_KIND.to_string(),
            default_shard_id: k9db_primitives::DEFAULT_SHARD_ID.to_string(),
        }
    }
}

impl Config {
    pub fn config_path(data_dir: &Path) -> PathBuf {
        data_dir.join("k9db.toml")
    }

    /// Load `<data_dir>/k9db.toml` if present, else the defaults with
    /// `data_dir` filled in.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, SqlError> {
        let data_dir = data_dir.into();
        let path = Self::config_path(&data_dir);
        if !path.exists() {
            return Ok(Self { data_dir, ..Default::default() });
        }
        let text = std::fs::read_to_string(&path)?;
        let mut cfg: Self = toml::from_str(&text)?;
        cfg.data_dir = data_dir;
        Ok(cfg)
    }

    pub fn save(&self) -> Result<(), SqlError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let text = toml::to_string_pretty(self).map_err(|e| SqlError::Internal(e.to_string()))?;
        std::fs::write(Self::config_path(&self.data_dir), text)?;
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn loading_a_missing_config_falls_back_to_defaults() {
        let dir = TempDir::with_prefix("k9db_config_test").unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.lock_wait_timeout, Duration::from_secs(10));
        assert!(cfg.encryption_enabled);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::with_prefix("k9db_config_test").unwrap();
        let mut cfg = Config::load(dir.path()).unwrap();
        cfg.encryption_enabled = false;
        cfg.lock_wait_timeout = Duration::from_secs(30);
        cfg.save().unwrap();

        let reloaded = Config::load(dir.path()).unwrap();
        assert!(!reloaded.encryption_enabled);
        assert_eq!(reloaded.lock_wait_timeout, Duration::from_secs(30));
    }
}
