/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load operator configuration for the upgrade resolver from
    TOML, falling back to documented defaults.

  Security / Safety Notes:
    Reads configuration from operator-owned paths only. No
    secrets are expected or stored.

  Dependencies:
    serde + toml for parsing, dirs for XDG locations.

  Operational Scope:
    Consumed once by the entry point; values are handed to the
    source units as plain parameters.

  Revision History:
    2026-10-18 COD  Authored upgrade resolver configuration.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults for every tunable
    - Missing explicit paths are errors, missing defaults are not
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynsyuError};

const CONFIG_DIR: &str = "syn-syu";
const CONFIG_FILE: &str = "upgrade.toml";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynsyuConfig {
    pub upgrade: UpgradeConfig,
    pub aur: AurConfig,
    pub paths: PathsConfig,
}

/// Behaviour of candidate resolution and the selection prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Maximum number of names per AUR info request.
    pub request_split_n: usize,
    /// Treat a newer AUR modification time as an upgrade.
    pub time_update: bool,
    /// Check tracked development packages.
    pub devel: bool,
    /// Skip the exclusion prompt.
    pub no_confirm: bool,
    /// Additional ignore patterns on top of pacman.conf `IgnorePkg`.
    pub ignore: Vec<String>,
    /// Capacity of the candidate hand-off channel.
    pub channel_capacity: usize,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            request_split_n: 150,
            time_update: false,
            devel: false,
            no_confirm: false,
            ignore: Vec::new(),
            channel_capacity: 64,
        }
    }
}

/// AUR RPC client tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AurConfig {
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub max_retries: usize,
    pub max_parallel_requests: usize,
    /// Bandwidth ceiling; zero disables throttling.
    pub max_kib_per_sec: u64,
}

impl Default for AurConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aur.archlinux.org/rpc".to_string(),
            timeout: 30,
            max_retries: 3,
            max_parallel_requests: 4,
            max_kib_per_sec: 0,
        }
    }
}

/// Filesystem locations used by the resolver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub plan: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub vcs_store: Option<PathBuf>,
    pub pacman_conf: Option<PathBuf>,
}

impl SynsyuConfig {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. Only an explicit path is required to exist.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(default) if default.is_file() => Self::load(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynsyuError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|err| {
            SynsyuError::Config(format!("Failed to parse {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.upgrade.request_split_n == 0 {
            return Err(SynsyuError::Config(
                "upgrade.request_split_n must be at least 1".into(),
            ));
        }
        if self.upgrade.channel_capacity == 0 {
            return Err(SynsyuError::Config(
                "upgrade.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Where the upgrade plan is written.
    pub fn plan_path(&self) -> PathBuf {
        self.paths
            .plan
            .clone()
            .unwrap_or_else(|| state_dir().join("upgrade_plan.json"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.paths
            .log_dir
            .clone()
            .unwrap_or_else(|| state_dir().join("logs"))
    }

    /// Revision-state store for development packages.
    pub fn vcs_store_path(&self) -> PathBuf {
        self.paths
            .vcs_store
            .clone()
            .unwrap_or_else(|| cache_dir().join("vcs.json"))
    }

    pub fn pacman_conf_path(&self) -> PathBuf {
        self.paths
            .pacman_conf
            .clone()
            .unwrap_or_else(|| PathBuf::from("/etc/pacman.conf"))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(CONFIG_DIR)
}

fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CONFIG_DIR)
}
