// fleetmux-config/src/config.rs
// ============================================================================
// Module: Fleetmux Configuration
// Description: Configuration loading and validation for the gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the gateway refuses to
//! start rather than serve with a partially understood config. Config inputs
//! are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fleetmux.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "FLEETMUX_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of session tokens.
pub(crate) const MAX_SESSION_TOKENS: usize = 64;
/// Maximum length of a session token.
pub(crate) const MAX_SESSION_TOKEN_LENGTH: usize = 256;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Fleetmux gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetmuxConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Fleet storage and administration configuration.
    pub fleet: FleetConfig,
}

impl FleetmuxConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from the argument, then the `FLEETMUX_CONFIG`
    /// environment variable, then `fleetmux.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_config_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
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
        self.server.validate()?;
        self.fleet.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP transport.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Authentication configuration for inbound requests.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        let addr: SocketAddr = self
            .bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))?;
        if !addr.ip().is_loopback() && self.auth.mode == AuthMode::LocalOnly {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed without session_token auth".to_string(),
            ));
        }
        self.auth.validate()
    }
}

/// Inbound auth modes for gateway requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Loopback-only access, every request acts as the local user.
    #[default]
    LocalOnly,
    /// Bearer session tokens mapped to user identities.
    SessionToken,
}

/// Authentication configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Auth mode for inbound requests.
    #[serde(default)]
    pub mode: AuthMode,
    /// Accepted session tokens mapped to user identities
    /// (required for `session_token` mode).
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    /// User identity attributed to local-only requests.
    #[serde(default)]
    pub local_user: Option<String>,
}

impl AuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.len() > MAX_SESSION_TOKENS {
            return Err(ConfigError::Invalid("too many session tokens".to_string()));
        }
        for (token, user) in &self.tokens {
            if token.trim().is_empty() {
                return Err(ConfigError::Invalid("session token must be non-empty".to_string()));
            }
            if token.len() > MAX_SESSION_TOKEN_LENGTH {
                return Err(ConfigError::Invalid("session token too long".to_string()));
            }
            if token.trim() != token {
                return Err(ConfigError::Invalid(
                    "session token must not contain whitespace".to_string(),
                ));
            }
            if user.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "session token user must be non-empty".to_string(),
                ));
            }
        }
        match self.mode {
            AuthMode::SessionToken => {
                if self.tokens.is_empty() {
                    return Err(ConfigError::Invalid(
                        "session_token auth requires at least one token".to_string(),
                    ));
                }
            }
            AuthMode::LocalOnly => {
                let local = self.local_user.as_deref().unwrap_or_default().trim();
                if local.is_empty() {
                    return Err(ConfigError::Invalid(
                        "local_only auth requires auth.local_user".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Fleet storage and administration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Base storage root holding per-instance directories.
    pub base_root: String,
    /// Administrator identity with fleet-wide authority.
    pub admin: String,
}

impl FleetConfig {
    /// Validates fleet configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("fleet.base_root", &self.base_root)?;
        if self.admin.trim().is_empty() {
            return Err(ConfigError::Invalid("fleet.admin must be non-empty".to_string()));
        }
        Ok(())
    }

    /// Returns the base root as a path.
    #[must_use]
    pub fn base_root_path(&self) -> PathBuf {
        PathBuf::from(self.base_root.trim())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8077".to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
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
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
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

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
