// crates/signed-relay-config/src/config.rs
// ============================================================================
// Module: Signed Relay Configuration
// Description: Configuration loading and validation for the relay host.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: signed-relay-core, signed-relay-broker, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to safe defaults; unknown keys are
//! rejected. Invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use signed_relay_broker::DEFAULT_MAX_RESPONSE_BYTES;
use signed_relay_broker::DEFAULT_USER_AGENT;
use signed_relay_broker::MAX_RESPONSE_BYTES_LIMIT;
use signed_relay_core::DEFAULT_MAX_TIMEOUT_SECS;
use signed_relay_store_sqlite::SqliteStoreConfig;
use signed_relay_store_sqlite::SqliteStoreMode;
use signed_relay_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "signed-relay.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SIGNED_RELAY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum `User-Agent` length in bytes.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 256;
/// Largest accepted `max_timeout_secs`.
pub(crate) const MAX_TIMEOUT_CEILING_SECS: u64 = 3_600;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Relay host configuration.
///
/// # Invariants
/// - [`RelayConfig::load`] only returns configurations that passed
///   [`RelayConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Store for destinations and key pairs.
    #[serde(default)]
    pub store: StoreConfig,
    /// Local store for the verification ledger; defaults to `store`.
    #[serde(default)]
    pub verify_store: Option<StoreConfig>,
    /// Outbound dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl RelayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit `path` wins, then [`CONFIG_ENV_VAR`], then
    /// [`DEFAULT_CONFIG_NAME`] in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bytes are oversized, not UTF-8, not
    /// valid TOML, or fail validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate("store")?;
        if let Some(verify_store) = &self.verify_store {
            verify_store.validate("verify_store")?;
        }
        self.dispatch.validate()?;
        self.audit.validate()
    }
}

// ============================================================================
// SECTION: Store Config
// ============================================================================

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Key-value store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration; `section` names the TOML table.
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "memory {section} must not set path"
                    )));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(format!("sqlite {section} requires path"))
                })?;
                validate_store_path(section, path)?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "{section} busy_timeout_ms must be greater than zero"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` settings when this is a sqlite store.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Dispatch Config
// ============================================================================

/// Outbound dispatch configuration.
///
/// # Invariants
/// - `max_response_bytes` is within `1..=MAX_RESPONSE_BYTES_LIMIT`.
/// - `user_agent` is non-empty and at most 256 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Response body cap in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Largest destination timeout accepted at write time.
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
            max_timeout_secs: default_max_timeout_secs(),
        }
    }
}

impl DispatchConfig {
    /// Validates dispatch limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "dispatch.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        let user_agent = self.user_agent.trim();
        if user_agent.is_empty() {
            return Err(ConfigError::Invalid("dispatch.user_agent must be non-empty".to_string()));
        }
        if user_agent.len() > MAX_USER_AGENT_LENGTH || user_agent.chars().any(char::is_control) {
            return Err(ConfigError::Invalid(format!(
                "dispatch.user_agent must be printable and at most {MAX_USER_AGENT_LENGTH} bytes"
            )));
        }
        if self.max_timeout_secs == 0 || self.max_timeout_secs > MAX_TIMEOUT_CEILING_SECS {
            return Err(ConfigError::Invalid(format!(
                "dispatch.max_timeout_secs must be between 1 and {MAX_TIMEOUT_CEILING_SECS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit Config
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// Discard audit events.
    #[default]
    None,
    /// Write JSON lines to stderr.
    Stderr,
    /// Append JSON lines to a file.
    File,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkType::File, Some(path)) => validate_store_path("audit", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured file path against length limits.
fn validate_store_path(section: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{section} path must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{section} path exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{section} path component too long")));
        }
    }
    Ok(())
}

/// Default busy timeout for `SQLite` stores.
pub(crate) const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Default response body cap.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default `User-Agent` header.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Default destination timeout ceiling.
const fn default_max_timeout_secs() -> u64 {
    DEFAULT_MAX_TIMEOUT_SECS
}

// ============================================================================
// SECTION: Tests
// ============================================================================
