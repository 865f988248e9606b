//! Configuration for the query layer
//!
//! TOML-backed configuration with environment variable overrides and
//! sensible defaults. Every field has a default so a partial file (or none
//! at all) still yields a working configuration.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Request planner settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Request planner settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Soft cap on points fetched per request batch; when breached the
    /// planner coarsens non-MDP-optimisable requests until it fits
    /// (0 = disabled)
    #[serde(default = "default_max_points_soft")]
    pub max_points_soft: u32,

    /// Hard cap on points fetched per request batch; when breached the
    /// batch is rejected (0 = disabled)
    #[serde(default = "default_max_points_hard")]
    pub max_points_hard: u32,

    /// Max-data-points hint applied when a caller does not send one;
    /// roughly the pixel width of a dashboard panel
    #[serde(default = "default_mdp")]
    pub default_mdp: u32,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_max_points_soft() -> u32 {
    1_000_000
}
fn default_max_points_hard() -> u32 {
    20_000_000
}
fn default_mdp() -> u32 {
    800
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_points_soft: default_max_points_soft(),
            max_points_hard: default_max_points_hard(),
            default_mdp: default_mdp(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("failed to parse {}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file with environment overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, Error> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(soft) = std::env::var("VIREO_MAX_POINTS_SOFT") {
            if let Ok(v) = soft.parse() {
                self.planner.max_points_soft = v;
            }
        }
        if let Ok(hard) = std::env::var("VIREO_MAX_POINTS_HARD") {
            if let Ok(v) = hard.parse() {
                self.planner.max_points_hard = v;
            }
        }
        if let Ok(mdp) = std::env::var("VIREO_DEFAULT_MDP") {
            if let Ok(v) = mdp.parse() {
                self.planner.default_mdp = v;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = level;
        }
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), Error> {
        let planner = &self.planner;
        if planner.max_points_soft > 0
            && planner.max_points_hard > 0
            && planner.max_points_hard < planner.max_points_soft
        {
            return Err(Error::Configuration(format!(
                "max_points_hard ({}) must not be below max_points_soft ({})",
                planner.max_points_hard, planner.max_points_soft
            )));
        }
        if planner.default_mdp == 0 {
            return Err(Error::Configuration(
                "default_mdp must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
