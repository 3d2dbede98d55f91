// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for fieldgate.
//!
//! [`FieldgateConfig`] holds the process-wide settings: which authoring
//! style builds the policy tree, the fallback for unlisted paths, cache and
//! deadline knobs, and logging. It is read from a TOML file, adjusted by
//! environment variables, and checked by [`validate_config`], which separates
//! hard errors from advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use fg_error::{ErrorCode, FgError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

impl From<ConfigError> for FgError {
    fn from(err: ConfigError) -> Self {
        let message = err.to_string();
        let base = FgError::new(ErrorCode::ConfigInvalid, message);
        let base = match &err {
            ConfigError::FileNotFound { path } => base.with_context("path", path),
            ConfigError::ParseError { .. } => base,
            ConfigError::ValidationError { reasons } => base.with_context("reasons", reasons),
        };
        base.with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Unlisted paths are allowed instead of denied.
    PermissiveFallback,
    /// Denial reasons are exposed in gate outcomes.
    DebugEnabled,
    /// The per-request deadline is unusually large.
    LargeTimeout {
        /// Deadline in milliseconds.
        ms: u64,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::PermissiveFallback => {
                write!(f, "fallback is 'allow': paths missing from the policy are readable")
            }
            ConfigWarning::DebugEnabled => {
                write!(f, "debug is on: denial reasons are reported to callers")
            }
            ConfigWarning::LargeTimeout { ms } => {
                write!(f, "request_timeout_ms is large ({ms}ms)")
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Which authoring style builds the effective policy tree.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// One rule per path, written out directly.
    #[default]
    Flat,
    /// Per-role grants, gated and merged.
    RoleBased,
}

impl PolicyMode {
    /// Config spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::Flat => "flat",
            PolicyMode::RoleBased => "role_based",
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy mode name other than `flat` or `role_based`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy mode '{0}'")]
pub struct ParsePolicyModeError(pub String);

impl FromStr for PolicyMode {
    type Err = ParsePolicyModeError;

    /// Accepts `flat`, `role_based` and `role-based`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(PolicyMode::Flat),
            "role_based" | "role-based" | "rbac" => Ok(PolicyMode::RoleBased),
            other => Err(ParsePolicyModeError(other.to_string())),
        }
    }
}

/// Decision for paths the policy tree does not list.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Deny anything unlisted.
    #[default]
    Deny,
    /// Allow anything unlisted.
    Allow,
}

/// Top-level runtime configuration for fieldgate.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct FieldgateConfig {
    /// Authoring style for the effective tree.
    #[serde(default)]
    pub policy_mode: PolicyMode,

    /// Rule used for unlisted paths.
    #[serde(default)]
    pub fallback: Fallback,

    /// Share `Strict` predicate results across requests. When off, strict
    /// leaves behave like per-request ones.
    #[serde(default = "default_strict_cache")]
    pub strict_cache: bool,

    /// Per-request evaluation deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Include denial reasons in gate outcomes.
    #[serde(default)]
    pub debug: bool,
}

fn default_strict_cache() -> bool {
    true
}

impl Default for FieldgateConfig {
    fn default() -> Self {
        Self {
            policy_mode: PolicyMode::default(),
            fallback: Fallback::default(),
            strict_cache: default_strict_cache(),
            request_timeout_ms: None,
            log_level: Some("info".into()),
            debug: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed per-request deadline (one minute).
const MAX_TIMEOUT_MS: u64 = 60_000;

/// Threshold above which a deadline generates a warning.
const LARGE_TIMEOUT_THRESHOLD_MS: u64 = 10_000;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`FieldgateConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`FieldgateConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<FieldgateConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => FieldgateConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`FieldgateConfig`].
pub fn parse_toml(content: &str) -> Result<FieldgateConfig, ConfigError> {
    toml::from_str::<FieldgateConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `FIELDGATE_POLICY_MODE` (`flat` | `role_based`)
/// - `FIELDGATE_LOG_LEVEL`
/// - `FIELDGATE_STRICT_CACHE` (`true`/`false`, `1`/`0`)
/// - `RBAC`: any non-empty value selects `role_based`
pub fn apply_env_overrides(config: &mut FieldgateConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// [`apply_env_overrides`] with an explicit variable source.
///
/// `RBAC` is consulted after `FIELDGATE_POLICY_MODE` and wins when set.
/// Unparsable values are logged and ignored.
pub fn apply_overrides_from<F>(config: &mut FieldgateConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = var("FIELDGATE_POLICY_MODE") {
        match val.parse::<PolicyMode>() {
            Ok(mode) => config.policy_mode = mode,
            Err(reason) => warn!(target: "fieldgate.config", %reason, "ignoring FIELDGATE_POLICY_MODE"),
        }
    }
    if let Some(val) = var("RBAC") {
        if !val.is_empty() {
            config.policy_mode = PolicyMode::RoleBased;
        }
    }
    if let Some(val) = var("FIELDGATE_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Some(val) = var("FIELDGATE_STRICT_CACHE") {
        match parse_bool(&val) {
            Some(b) => config.strict_cache = b,
            None => warn!(target: "fieldgate.config", value = %val, "ignoring FIELDGATE_STRICT_CACHE"),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown log level, out-of-range deadline) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &FieldgateConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!("invalid log_level '{level}'"));
        }
    }

    match config.request_timeout_ms {
        Some(ms) if ms == 0 || ms > MAX_TIMEOUT_MS => {
            errors.push(format!(
                "request_timeout_ms {ms} out of range (1..{MAX_TIMEOUT_MS})"
            ));
        }
        Some(ms) if ms > LARGE_TIMEOUT_THRESHOLD_MS => {
            warnings.push(ConfigWarning::LargeTimeout { ms });
        }
        Some(_) => {}
        None => warnings.push(ConfigWarning::MissingOptionalField {
            field: "request_timeout_ms".into(),
            hint: "a stalled record lookup holds the request open".into(),
        }),
    }

    if config.fallback == Fallback::Allow {
        warnings.push(ConfigWarning::PermissiveFallback);
    }
    if config.debug {
        warnings.push(ConfigWarning::DebugEnabled);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations.  Values in `overlay` take precedence over `base`.
///
/// Optional fields fall back to `base` when unset in `overlay`; the others
/// fall back to `base` when `overlay` holds their default value.
pub fn merge_configs(base: FieldgateConfig, overlay: FieldgateConfig) -> FieldgateConfig {
    let defaults = FieldgateConfig::default();
    FieldgateConfig {
        policy_mode: pick(overlay.policy_mode, base.policy_mode, defaults.policy_mode),
        fallback: pick(overlay.fallback, base.fallback, defaults.fallback),
        strict_cache: pick(overlay.strict_cache, base.strict_cache, defaults.strict_cache),
        request_timeout_ms: overlay.request_timeout_ms.or(base.request_timeout_ms),
        log_level: overlay.log_level.or(base.log_level),
        debug: overlay.debug || base.debug,
    }
}

fn pick<T: PartialEq>(overlay: T, base: T, default: T) -> T {
    if overlay == default { base } else { overlay }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
