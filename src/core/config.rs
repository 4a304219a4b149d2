//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TpdError};
use crate::core::paths::resolve_absolute_path;

/// Full daemon configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    pub paths: PathsConfig,
    pub rate_limit: RateLimitConfig,
    pub spool: SpoolConfig,
    pub http: HttpConfig,
    pub features: FeaturesConfig,
}

/// On-disk locations the daemon touches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory watched for newly staged records.
    pub staging_dir: PathBuf,
    /// Overflow directory drained by a separate retry process.
    pub spool_dir: PathBuf,
    /// Directory holding per-record retention copies.
    pub retention_dir: PathBuf,
    /// Journal file path.
    pub journal_path: PathBuf,
    /// Scratch directory the journal uses while pruning.
    pub journal_tmpdir: PathBuf,
    /// Path this config was loaded from, if any (not user-settable).
    #[serde(skip)]
    pub config_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("/var/lib/tpd/staging"),
            spool_dir: PathBuf::from("/var/lib/tpd/spool"),
            retention_dir: PathBuf::from("/var/lib/tpd/retention"),
            journal_path: PathBuf::from("/var/lib/tpd/journal.jsonl"),
            journal_tmpdir: PathBuf::from("/var/lib/tpd/journal.tmp"),
            config_file: PathBuf::new(),
        }
    }
}

/// Sliding-window rate limit knobs. `-1` disables a given axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub record_burst_limit: i64,
    pub record_window_length: i64,
    pub byte_burst_limit: i64,
    pub byte_window_length: i64,
    /// `"spool"` or `"drop"`.
    pub strategy: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            record_burst_limit: -1,
            record_window_length: 60,
            byte_burst_limit: -1,
            byte_window_length: 60,
            strategy: "spool".to_string(),
        }
    }
}

impl RateLimitConfig {
    /// `true` once the record window length passes basic sanity (`[1,60]` or `-1`
    /// for "not applicable because the axis is disabled").
    #[must_use]
    pub fn record_window_is_sane(&self) -> bool {
        window_is_sane(self.record_window_length)
    }

    #[must_use]
    pub fn byte_window_is_sane(&self) -> bool {
        window_is_sane(self.byte_window_length)
    }

    #[must_use]
    pub fn strategy_is_spool(&self) -> bool {
        self.strategy == "spool"
    }
}

fn window_is_sane(value: i64) -> bool {
    (1..=60).contains(&value)
}

/// Local overflow spool knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpoolConfig {
    /// Maximum spool directory footprint in KB; `-1` disables the cap.
    pub max_size_kb: i64,
    /// Seconds between spool-drain / journal-prune ticks.
    pub process_period_secs: u64,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            max_size_kb: -1,
            process_period_secs: 30,
        }
    }
}

impl SpoolConfig {
    #[must_use]
    pub fn max_size_bytes(&self) -> Option<u64> {
        if self.max_size_kb < 0 {
            None
        } else {
            Some(self.max_size_kb as u64 * 1024)
        }
    }
}

/// HTTP collector knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub server_addr: String,
    /// Optional CA bundle overriding the system trust store.
    pub cainfo: String,
    /// Extra header identifying the telemetry session/transaction.
    pub tid_header: String,
    pub connect_timeout_secs: u64,
    pub total_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            cainfo: String::new(),
            tid_header: "X-Tid: unknown".to_string(),
            connect_timeout_secs: 5,
            total_timeout_secs: 10,
        }
    }
}

/// Feature toggles and identity forwarding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeaturesConfig {
    pub record_retention_enabled: bool,
    pub record_server_delivery_enabled: bool,
    /// Forwarded verbatim as an `X-Machine-Id` header by the HTTP poster; no
    /// identity management beyond this single pass-through value.
    pub machine_id_override: Option<String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            record_retention_enabled: true,
            record_server_delivery_enabled: true,
            machine_id_override: None,
        }
    }
}

impl DaemonConfig {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/tpd/config.toml")
    }

    /// Load config from an explicit path, the `TPD_CONFIG` environment
    /// variable, or the default path. Missing config file is not an error
    /// when loading from the default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_config = if path.is_none() {
            env::var_os("TPD_CONFIG").map(PathBuf::from)
        } else {
            None
        };

        let path_buf = path.map_or_else(
            || env_config.clone().unwrap_or_else(Self::default_path),
            Path::to_path_buf,
        );
        let is_explicit_path = path.is_some() || env_config.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TpdError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit_path {
            return Err(TpdError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    fn normalize_paths(&mut self) {
        self.paths.staging_dir = resolve_absolute_path(&self.paths.staging_dir);
        self.paths.spool_dir = resolve_absolute_path(&self.paths.spool_dir);
        self.paths.retention_dir = resolve_absolute_path(&self.paths.retention_dir);
        self.paths.journal_path = resolve_absolute_path(&self.paths.journal_path);
        self.paths.journal_tmpdir = resolve_absolute_path(&self.paths.journal_tmpdir);
    }

    fn validate(&self) -> Result<()> {
        // Window-length sanity is fatal unconditionally: it does not matter
        // whether rate limiting as a whole, or this axis's burst limit
        // specifically, is enabled.
        if !self.rate_limit.record_window_is_sane() {
            return Err(TpdError::InvalidWindowLength {
                value: self.rate_limit.record_window_length,
            });
        }
        if !self.rate_limit.byte_window_is_sane() {
            return Err(TpdError::InvalidWindowLength {
                value: self.rate_limit.byte_window_length,
            });
        }
        if self.rate_limit.strategy != "spool" && self.rate_limit.strategy != "drop" {
            return Err(TpdError::InvalidConfig {
                details: format!(
                    "rate_limit.strategy must be \"spool\" or \"drop\", got {:?}",
                    self.rate_limit.strategy
                ),
            });
        }
        Ok(())
    }
}
