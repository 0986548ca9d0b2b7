//! TOML configuration loader with validation.
//!
//! Loads the control-loop settings and the initial parameter snapshot.
//! The parameter file is optional: without one the shipped defaults
//! apply, matching a factory-fresh unit before the store has pushed
//! anything.

use std::path::Path;

use serde::{Deserialize, Serialize};
use shade_common::params::Params;

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    /// File I/O error.
    IoError(String),
    /// TOML parse error.
    ParseError(String),
    /// Parameter validation error.
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "config I/O error: {e}"),
            Self::ParseError(e) => write!(f, "config parse error: {e}"),
            Self::ValidationError(e) => write!(f, "config validation: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ─── Control Settings ───────────────────────────────────────────────

/// Control-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Tick interval [ms].
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Path to the initial parameter snapshot TOML; shipped defaults
    /// when absent.
    #[serde(default)]
    pub params_path: Option<String>,

    /// Core to pin the control loop to (`rt` feature).
    #[serde(default)]
    pub rt_cpu_core: Option<usize>,

    /// SCHED_FIFO priority for the control loop (`rt` feature).
    #[serde(default)]
    pub rt_priority: Option<i32>,
}

fn default_tick_interval_ms() -> u64 {
    10
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            params_path: None,
            rt_cpu_core: None,
            rt_priority: None,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be > 0".into());
        }
        if let Some(prio) = self.rt_priority
            && !(1..=99).contains(&prio)
        {
            return Err(format!("rt_priority {prio} out of range [1, 99]"));
        }
        Ok(())
    }
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Complete validated configuration bundle, ready for runtime use.
#[derive(Debug)]
pub struct LoadedConfig {
    pub control: ControlConfig,
    pub params: Params,
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate configuration from a TOML file.
///
/// 1. Parse `config_path` → `ControlConfig`
/// 2. Parse its `params_path` (if set) → `Params`
/// 3. Validate both.
pub fn load_config(config_path: &Path) -> Result<LoadedConfig, ConfigError> {
    let control_toml = std::fs::read_to_string(config_path).map_err(|e| {
        ConfigError::IoError(format!("failed to read {}: {e}", config_path.display()))
    })?;
    let control: ControlConfig = toml::from_str(&control_toml)
        .map_err(|e| ConfigError::ParseError(format!("control config: {e}")))?;
    control.validate().map_err(ConfigError::ValidationError)?;

    let params = match &control.params_path {
        Some(path) => {
            let path = Path::new(path);
            let params_toml = std::fs::read_to_string(path).map_err(|e| {
                ConfigError::IoError(format!("failed to read {}: {e}", path.display()))
            })?;
            toml::from_str(&params_toml)
                .map_err(|e| ConfigError::ParseError(format!("params: {e}")))?
        }
        None => Params::default(),
    };
    params.validate().map_err(ConfigError::ValidationError)?;

    Ok(LoadedConfig { control, params })
}

/// Load config from TOML strings (for testing).
pub fn load_config_from_strings(
    control_toml: &str,
    params_toml: &str,
) -> Result<LoadedConfig, ConfigError> {
    let control: ControlConfig = toml::from_str(control_toml)
        .map_err(|e| ConfigError::ParseError(format!("control config: {e}")))?;
    control.validate().map_err(ConfigError::ValidationError)?;

    let params: Params = toml::from_str(params_toml)
        .map_err(|e| ConfigError::ParseError(format!("params: {e}")))?;
    params.validate().map_err(ConfigError::ValidationError)?;

    Ok(LoadedConfig { control, params })
}
