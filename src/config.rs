//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/trafficpulse/trafficpulse.toml`
//! 3. Local config: `<dir>/.trafficpulse.toml`
//! 4. Environment variables: `TRAFFICPULSE_*` prefix, `__` between section and key
//!    (e.g. `TRAFFICPULSE_SUMO__PORT=9000`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::ApplicationError;

pub const APP_NAME: &str = "trafficpulse";
pub const LOCAL_CONFIG_FILE: &str = ".trafficpulse.toml";
const ENV_PREFIX: &str = "TRAFFICPULSE";

/// How to launch and reach the SUMO simulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SumoSettings {
    /// Simulator executable (`sumo` or `sumo-gui`)
    pub binary: String,
    /// Directory holding the SUMO configuration
    pub config_dir: PathBuf,
    /// Configuration file name inside `config_dir`
    pub config_file: String,
    pub host: String,
    /// TraCI port passed as `--remote-port`
    pub port: u16,
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
    /// Use `config_file` verbatim without checking the filesystem
    pub bypass_config_check: bool,
    /// Extra command line arguments for the simulator
    pub extra_args: Vec<String>,
}

impl Default for SumoSettings {
    fn default() -> Self {
        Self {
            binary: "sumo".into(),
            config_dir: PathBuf::from("config/sumo"),
            config_file: "simulation.sumocfg".into(),
            host: "127.0.0.1".into(),
            port: 8813,
            connect_retries: 20,
            retry_delay_ms: 250,
            bypass_config_check: false,
            extra_args: vec![],
        }
    }
}

impl SumoSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Green wave parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlgoSettings {
    /// Signal cycle length in seconds
    pub cycle_length: f64,
    /// Green phase length in seconds, at the start of each cycle
    pub green_duration: f64,
    /// Progression speed along a corridor (13.9 m/s = 50 km/h)
    pub target_speed_m_s: f64,
}

impl Default for AlgoSettings {
    fn default() -> Self {
        Self {
            cycle_length: 90.0,
            green_duration: 45.0,
            target_speed_m_s: 13.9,
        }
    }
}

/// Simulation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SystemSettings {
    /// Simulation steps per wall-clock second
    pub update_frequency: f64,
    /// SUMO network to load into the local model before starting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_file: Option<PathBuf>,
    /// Append-only event log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            update_frequency: 5.0,
            net_file: None,
            log_file: None,
        }
    }
}

/// Unified configuration for trafficpulse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub sumo: SumoSettings,
    pub algo: AlgoSettings,
    pub system: SystemSettings,
}

/// Raw settings for intermediate parsing: `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub sumo: RawSumoSettings,
    pub algo: RawAlgoSettings,
    pub system: RawSystemSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSumoSettings {
    pub binary: Option<String>,
    pub config_dir: Option<PathBuf>,
    pub config_file: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub connect_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub bypass_config_check: Option<bool>,
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawAlgoSettings {
    pub cycle_length: Option<f64>,
    pub green_duration: Option<f64>,
    pub target_speed_m_s: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSystemSettings {
    pub update_frequency: Option<f64>,
    pub net_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl SumoSettings {
    fn merge(&self, overlay: &RawSumoSettings) -> Self {
        Self {
            binary: overlay.binary.clone().unwrap_or_else(|| self.binary.clone()),
            config_dir: overlay
                .config_dir
                .clone()
                .unwrap_or_else(|| self.config_dir.clone()),
            config_file: overlay
                .config_file
                .clone()
                .unwrap_or_else(|| self.config_file.clone()),
            host: overlay.host.clone().unwrap_or_else(|| self.host.clone()),
            port: overlay.port.unwrap_or(self.port),
            connect_retries: overlay.connect_retries.unwrap_or(self.connect_retries),
            retry_delay_ms: overlay.retry_delay_ms.unwrap_or(self.retry_delay_ms),
            bypass_config_check: overlay
                .bypass_config_check
                .unwrap_or(self.bypass_config_check),
            extra_args: overlay
                .extra_args
                .clone()
                .unwrap_or_else(|| self.extra_args.clone()),
        }
    }
}

impl AlgoSettings {
    fn merge(&self, overlay: &RawAlgoSettings) -> Self {
        Self {
            cycle_length: overlay.cycle_length.unwrap_or(self.cycle_length),
            green_duration: overlay.green_duration.unwrap_or(self.green_duration),
            target_speed_m_s: overlay.target_speed_m_s.unwrap_or(self.target_speed_m_s),
        }
    }
}

impl SystemSettings {
    fn merge(&self, overlay: &RawSystemSettings) -> Self {
        Self {
            update_frequency: overlay.update_frequency.unwrap_or(self.update_frequency),
            net_file: overlay.net_file.clone().or_else(|| self.net_file.clone()),
            log_file: overlay.log_file.clone().or_else(|| self.log_file.clone()),
        }
    }
}

/// Get the XDG config directory for trafficpulse.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(format!("{APP_NAME}.toml")))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input unchanged.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(raw.as_ref()) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional project directory holding `.trafficpulse.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), local_dir)
    }

    /// Like [`Settings::load`] with an explicit global config path.
    pub fn load_from(
        global_path: Option<&Path>,
        local_dir: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_path {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                current = current.merge_with(&load_raw_settings(global_path)?);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("loading local config {}", local_path.display());
                current = current.merge_with(&load_raw_settings(&local_path)?);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            sumo: self.sumo.merge(&overlay.sumo),
            algo: self.algo.merge(&overlay.algo),
            system: self.system.merge(&overlay.system),
        }
    }

    /// Apply TRAFFICPULSE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Some(val) = env_value::<String>(&config, "sumo.binary") {
            settings.sumo.binary = val;
        }
        if let Some(val) = env_value::<String>(&config, "sumo.config_dir") {
            settings.sumo.config_dir = PathBuf::from(val);
        }
        if let Some(val) = env_value(&config, "sumo.config_file") {
            settings.sumo.config_file = val;
        }
        if let Some(val) = env_value(&config, "sumo.host") {
            settings.sumo.host = val;
        }
        if let Some(val) = env_value(&config, "sumo.port") {
            settings.sumo.port = val;
        }
        if let Some(val) = env_value(&config, "sumo.connect_retries") {
            settings.sumo.connect_retries = val;
        }
        if let Some(val) = env_value(&config, "sumo.retry_delay_ms") {
            settings.sumo.retry_delay_ms = val;
        }
        if let Some(val) = env_value(&config, "sumo.bypass_config_check") {
            settings.sumo.bypass_config_check = val;
        }
        if let Some(val) = env_value::<String>(&config, "sumo.extra_args") {
            settings.sumo.extra_args = val.split_whitespace().map(String::from).collect();
        }
        if let Some(val) = env_value(&config, "algo.cycle_length") {
            settings.algo.cycle_length = val;
        }
        if let Some(val) = env_value(&config, "algo.green_duration") {
            settings.algo.green_duration = val;
        }
        if let Some(val) = env_value(&config, "algo.target_speed_m_s") {
            settings.algo.target_speed_m_s = val;
        }
        if let Some(val) = env_value(&config, "system.update_frequency") {
            settings.system.update_frequency = val;
        }
        if let Some(val) = env_value::<String>(&config, "system.net_file") {
            settings.system.net_file = Some(PathBuf::from(val));
        }
        if let Some(val) = env_value::<String>(&config, "system.log_file") {
            settings.system.log_file = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    fn expand_paths(&mut self) {
        self.sumo.config_dir = expand_path(&self.sumo.config_dir);
        self.system.net_file = self.system.net_file.as_deref().map(expand_path);
        self.system.log_file = self.system.log_file.as_deref().map(expand_path);
    }

    /// Reject values the simulation loop and green wave cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let algo = &self.algo;
        if !positive_finite(algo.cycle_length) {
            return Err(invalid("algo.cycle_length must be positive and finite"));
        }
        if !(0.0..=algo.cycle_length).contains(&algo.green_duration) {
            return Err(invalid(
                "algo.green_duration must be between 0 and algo.cycle_length",
            ));
        }
        if !positive_finite(algo.target_speed_m_s) {
            return Err(invalid("algo.target_speed_m_s must be positive and finite"));
        }
        let frequency = self.system.update_frequency;
        if !positive_finite(frequency) {
            return Err(invalid("system.update_frequency must be positive and finite"));
        }
        if Duration::try_from_secs_f64(1.0 / frequency).is_err() {
            return Err(invalid(format!(
                "system.update_frequency {frequency} is too small for a step pause"
            )));
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# trafficpulse configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/trafficpulse/trafficpulse.toml
#   Local:  <project>/.trafficpulse.toml
#   Env:    TRAFFICPULSE_<SECTION>__<KEY>, e.g. TRAFFICPULSE_SUMO__PORT=9000

[sumo]
# binary = "sumo"                 # or "sumo-gui"
# config_dir = "config/sumo"
# config_file = "simulation.sumocfg"
# host = "127.0.0.1"
# port = 8813
# connect_retries = 20
# retry_delay_ms = 250
# bypass_config_check = false     # use config_file verbatim
# extra_args = ["--no-step-log"]

[algo]
# cycle_length = 90.0             # seconds
# green_duration = 45.0           # seconds of green at the start of each cycle
# target_speed_m_s = 13.9         # green wave progression speed

[system]
# update_frequency = 5.0          # simulation steps per second
# net_file = "config/sumo/network.net.xml"
# log_file = "trafficpulse.log"
"#
        .to_string()
    }
}

fn invalid(message: impl Into<String>) -> ApplicationError {
    ApplicationError::Config {
        message: message.into(),
    }
}

fn positive_finite(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}

/// Typed value of one override; unparseable values are logged and skipped.
fn env_value<T: DeserializeOwned>(config: &Config, key: &str) -> Option<T> {
    match config.get::<T>(key) {
        Ok(val) => Some(val),
        Err(ConfigError::NotFound(_)) => None,
        Err(e) => {
            warn!(
                "ignoring {}_{}: {}",
                ENV_PREFIX,
                key.to_uppercase().replace('.', "__"),
                e
            );
            None
        }
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
