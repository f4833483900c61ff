//! Engine configuration, resolved file -> env -> CLI (§10.3), mirroring the
//! three-layer resolution used by this codebase's sink configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScaError;

/// Runtime capability flags threaded into rule dispatch (§4.2, §6).
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub skip_nfs: bool,
    pub commands_timeout: Duration,
    pub remote_commands: bool,
}

/// One entry of the `profile[]` configuration list (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub file: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub policy_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Engine-wide configuration (§6 "Configuration (recognized options)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub scan_on_start: bool,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub scan_day: Option<u32>,
    #[serde(default)]
    pub scan_wday: Option<String>,
    #[serde(default)]
    pub scan_time: Option<String>,
    #[serde(default)]
    pub skip_nfs: bool,
    #[serde(default = "default_commands_timeout")]
    pub commands_timeout: u64,
    #[serde(default)]
    pub remote_commands: bool,
    /// Minutes at the config boundary; converted to seconds by
    /// [`EngineConfig::resolve`] immediately on load (§9a).
    #[serde(default = "default_request_db_interval_minutes")]
    pub request_db_interval_minutes: u64,
    #[serde(default = "default_max_eps")]
    pub wm_max_eps: u32,
    #[serde(default)]
    pub profile: Vec<ProfileEntry>,
    #[serde(default)]
    pub sink_endpoint: Option<String>,
}

fn default_interval() -> u64 {
    3600
}
fn default_commands_timeout() -> u64 {
    30
}
fn default_request_db_interval_minutes() -> u64 {
    5
}
fn default_max_eps() -> u32 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_on_start: false,
            interval: default_interval(),
            scan_day: None,
            scan_wday: None,
            scan_time: None,
            skip_nfs: false,
            commands_timeout: default_commands_timeout(),
            remote_commands: false,
            request_db_interval_minutes: default_request_db_interval_minutes(),
            wm_max_eps: default_max_eps(),
            profile: Vec::new(),
            sink_endpoint: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ScaError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScaError::Config(format!("cannot read config file '{}': {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| ScaError::Config(format!("invalid TOML in '{}': {e}", path.display())))
    }

    /// Overlay `SCA_`-prefixed environment variables; only overrides fields
    /// whose env var is set and non-empty/parseable.
    pub fn merge_env(&mut self) {
        if let Ok(v) = std::env::var("SCA_ENABLED") {
            if let Ok(b) = v.parse() {
                self.enabled = b;
            }
        }
        if let Ok(v) = std::env::var("SCA_SCAN_ON_START") {
            if let Ok(b) = v.parse() {
                self.scan_on_start = b;
            }
        }
        if let Ok(v) = std::env::var("SCA_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.interval = n;
            }
        }
        if let Ok(v) = std::env::var("SCA_SKIP_NFS") {
            if let Ok(b) = v.parse() {
                self.skip_nfs = b;
            }
        }
        if let Ok(v) = std::env::var("SCA_COMMANDS_TIMEOUT") {
            if let Ok(n) = v.parse() {
                self.commands_timeout = n;
            }
        }
        if let Ok(v) = std::env::var("SCA_REMOTE_COMMANDS") {
            if let Ok(b) = v.parse() {
                self.remote_commands = b;
            }
        }
        if let Ok(v) = std::env::var("SCA_REQUEST_DB_INTERVAL_MINUTES") {
            if let Ok(n) = v.parse() {
                self.request_db_interval_minutes = n;
            }
        }
        if let Ok(v) = std::env::var("SCA_MAX_EPS") {
            if let Ok(n) = v.parse() {
                self.wm_max_eps = n;
            }
        }
        if let Ok(v) = std::env::var("SCA_SINK_ENDPOINT") {
            if !v.is_empty() {
                self.sink_endpoint = Some(v);
            }
        }
    }

    /// Clamp and convert boundary fields into their internal, always-valid
    /// form. Must run after file+env+CLI layering, before the config is used
    /// (§9a, §10.3): `commands_timeout` clamps to `[1, 300]`;
    /// `request_db_interval_minutes` clamps to `[1, 60]`, converts to
    /// seconds, then clamps again so it never exceeds `interval`.
    pub fn resolve(mut self) -> Capabilities {
        self.commands_timeout = self.commands_timeout.clamp(1, 300);
        let clamped_minutes = self.request_db_interval_minutes.clamp(1, 60);
        self.request_db_interval_minutes = clamped_minutes;
        Capabilities {
            skip_nfs: self.skip_nfs,
            commands_timeout: Duration::from_secs(self.commands_timeout),
            remote_commands: self.remote_commands,
        }
    }

    /// `request_db_interval` in seconds, clamped to never exceed `interval`.
    pub fn request_db_interval_seconds(&self) -> u64 {
        let seconds = self.request_db_interval_minutes.clamp(1, 60) * 60;
        seconds.min(self.interval.max(1))
    }
}
