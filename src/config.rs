//! Configuration management.
//! Handles loading and parsing of config.json: named windows, sampling
//! intervals, chart geometry, and file logging.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// One named retention window: its data file, its chart directory, and how
/// far back it keeps samples.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WindowConfig {
    pub data_path: PathBuf,
    pub plot_dir: PathBuf,
    pub window_seconds: u64,
    /// When the data file is present but unparsable: false (default) aborts
    /// and preserves the file as evidence; true logs the corruption and
    /// restarts from an empty window.
    #[serde(default)]
    pub reset_on_corrupt: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_ms")]
    pub cpu_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub net_interval_ms: u64,
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,
}

fn default_interval_ms() -> u64 { 1000 }
fn default_disk_mount() -> PathBuf { PathBuf::from("/") }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cpu_interval_ms: default_interval_ms(),
            net_interval_ms: default_interval_ms(),
            disk_mount: default_disk_mount(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChartConfig {
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
}

fn default_chart_width() -> u32 { 1000 }
fn default_chart_height() -> u32 { 600 }

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub log_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: PathBuf::from("/tmp/loadchart_logs/"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub windows: BTreeMap<String, WindowConfig>,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub charts: ChartConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        let mut windows = BTreeMap::new();
        windows.insert(
            "hourly".to_string(),
            WindowConfig {
                data_path: data_dir.join("hourly.csv"),
                plot_dir: data_dir.join("img/hourly"),
                window_seconds: 3600,
                reset_on_corrupt: false,
            },
        );
        Self {
            windows,
            sampling: SamplingConfig::default(),
            charts: ChartConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn data_dir() -> PathBuf {
    match env::var("HOME") {
        Ok(home) => Path::new(&home).join(".local/share/loadchart"),
        Err(_) => PathBuf::from("/tmp/loadchart"),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(Path::new(&home).join(".config/loadchart/config.json"))
}

impl Config {
    /// Loads configuration from `path`, or from
    /// `~/.config/loadchart/config.json` when none is given. The default
    /// location is created with defaults on first run; an explicit path must
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, create_if_missing) = match path {
            Some(p) => (p.to_path_buf(), false),
            None => (default_config_path()?, true),
        };

        if !config_path.exists() {
            if !create_if_missing {
                bail!("config file not found: {}", config_path.display());
            }
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            let default_config = Config::default();
            let json = serde_json::to_string_pretty(&default_config)
                .context("Failed to serialize default config")?;
            fs::write(&config_path, json).context("Failed to write default config file")?;
            log::info!("wrote default config to {}", config_path.display());
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            bail!("at least one window must be configured");
        }
        for (name, window) in &self.windows {
            if window.window_seconds == 0 {
                bail!("window '{}': window_seconds must be >= 1", name);
            }
            if window.data_path.as_os_str().is_empty() {
                bail!("window '{}': data_path must not be empty", name);
            }
            if window.plot_dir.as_os_str().is_empty() {
                bail!("window '{}': plot_dir must not be empty", name);
            }
        }
        if self.sampling.cpu_interval_ms < 100 || self.sampling.net_interval_ms < 100 {
            bail!("sampling intervals must be >= 100 ms");
        }
        if self.charts.width < 64 || self.charts.height < 64 {
            bail!("chart dimensions must be >= 64 px");
        }
        Ok(())
    }

    /// Creates every plot directory and data-file parent up front, so a
    /// cycle never fails halfway because of a missing directory.
    pub fn ensure_directories(&self) -> Result<()> {
        for (name, window) in &self.windows {
            fs::create_dir_all(&window.plot_dir).with_context(|| {
                format!("window '{}': failed to create {}", name, window.plot_dir.display())
            })?;
            if let Some(parent) = window.data_path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("window '{}': failed to create {}", name, parent.display())
                })?;
            }
        }
        Ok(())
    }
}
