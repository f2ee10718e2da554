//! Application configuration.
//!
//! Stored as TOML at `~/.config/warptray/config.toml` unless `--config`
//! points elsewhere. A missing file is created with defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};
use warptray_connection::ControllerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The WARP command-line client.
    #[serde(default = "default_cli_program")]
    pub cli_program: String,

    /// systemd unit that must be running before connecting.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Virtual interface present while a tunnel mode is connected.
    #[serde(default = "default_interface_name")]
    pub interface_name: String,

    /// Resolver configuration checked in DNS-only modes.
    #[serde(default = "default_resolv_conf_path")]
    pub resolv_conf_path: PathBuf,

    /// Connect on startup when found disconnected.
    #[serde(default)]
    pub auto_connect: bool,

    /// Open the main window on startup.
    #[serde(default)]
    pub show_on_start: bool,

    #[serde(default = "default_passive_interval")]
    pub passive_interval_secs: u64,

    /// Passive polling interval after an error.
    #[serde(default = "default_degraded_interval")]
    pub degraded_interval_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_cli_program() -> String {
    "warp-cli".into()
}

fn default_service_name() -> String {
    "warp-svc".into()
}

fn default_interface_name() -> String {
    "CloudflareWARP".into()
}

fn default_resolv_conf_path() -> PathBuf {
    PathBuf::from("/etc/resolv.conf")
}

fn default_passive_interval() -> u64 {
    5
}

fn default_degraded_interval() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cli_program: default_cli_program(),
            service_name: default_service_name(),
            interface_name: default_interface_name(),
            resolv_conf_path: default_resolv_conf_path(),
            auto_connect: false,
            show_on_start: false,
            passive_interval_secs: default_passive_interval(),
            degraded_interval_secs: default_degraded_interval(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&config_path()),
        }
    }

    /// Loads configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            config
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.passive_interval_secs > 0, "passive_interval_secs must be positive");
        ensure!(
            self.degraded_interval_secs >= self.passive_interval_secs,
            "degraded_interval_secs must not be shorter than passive_interval_secs"
        );
        ensure!(self.command_timeout_secs > 0, "command_timeout_secs must be positive");
        Ok(())
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            cli_program: self.cli_program.clone(),
            service_name: self.service_name.clone(),
            interface_name: self.interface_name.clone(),
            resolv_conf: self.resolv_conf_path.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            passive_interval: Duration::from_secs(self.passive_interval_secs),
            degraded_interval: Duration::from_secs(self.degraded_interval_secs),
            auto_connect: self.auto_connect,
            ..ControllerConfig::default()
        }
    }

    /// Controller settings for a single command-line action. Startup never
    /// connects on its own, so the requested action owns the single slot.
    pub fn one_shot_controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            auto_connect: false,
            ..self.controller_config()
        }
    }
}

/// `~/.config/warptray/config.toml`, honoring `XDG_CONFIG_HOME`.
fn config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(".config")
        });
    base.join("warptray").join("config.toml")
}
