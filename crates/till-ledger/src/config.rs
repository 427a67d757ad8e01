//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/var/lib/till/till.db                                 │
//! │     TILL_BUSY_TIMEOUT_MS=10000                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger/ledger.toml (Linux)                               │
//! │     ~/Library/Application Support/com.till.ledger/ledger.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/till/till.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 50
//! max_backoff_ms = 2000
//!
//! [integrity]
//! enabled = true
//! sweep_interval_secs = 300
//!
//! [audit]
//! event_log_path = "/var/log/till/events.log"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use till_db::DbConfig;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite waits on a held write lock before reporting busy.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "till", "ledger")
        .map(|dirs| dirs.data_dir().join("till.db"))
        .unwrap_or_else(|| PathBuf::from("till.db"))
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per operation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    50
}
fn default_max_backoff() -> u64 {
    2_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Integrity Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegritySettings {
    /// Run the periodic sweep in long-lived processes.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_sweep_interval() -> u64 {
    300
}

impl Default for IntegritySettings {
    fn default() -> Self {
        IntegritySettings {
            enabled: true,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// =============================================================================
// Audit Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Plain-text event log. Disabled when unset.
    #[serde(default)]
    pub event_log_path: Option<PathBuf>,
}

// =============================================================================
// Ledger Config
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub integrity: IntegritySettings,

    #[serde(default)]
    pub audit: AuditSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (ledger.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if self.integrity.enabled && self.integrity.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "integrity.sweep_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TILL_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(ms) = var("TILL_BUSY_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(v) => self.database.busy_timeout_ms = v,
                Err(_) => warn!(value = %ms, "Ignoring invalid TILL_BUSY_TIMEOUT_MS"),
            }
        }

        if let Some(attempts) = var("TILL_RETRY_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(v) => self.retry.max_attempts = v,
                Err(_) => warn!(value = %attempts, "Ignoring invalid TILL_RETRY_MAX_ATTEMPTS"),
            }
        }

        if let Some(secs) = var("TILL_SWEEP_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(v) => self.integrity.sweep_interval_secs = v,
                Err(_) => warn!(value = %secs, "Ignoring invalid TILL_SWEEP_INTERVAL_SECS"),
            }
        }

        if let Some(path) = var("TILL_EVENT_LOG") {
            self.audit.event_log_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool configuration for [`till_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.integrity.sweep_interval_secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
