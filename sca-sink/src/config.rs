//! Sink configuration, resolved file -> env -> CLI, mirroring the
//! three-layer resolution used by `sca-engine`'s own `EngineConfig`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::SinkError;

/// Configuration for an outbound event sink connection (§4.8, C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub endpoint: String,
    pub client_id: String,
    #[serde(default = "default_max_eps")]
    pub max_eps: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub kafka_topic: Option<String>,
    #[serde(default)]
    pub partition: i32,
}

fn default_max_eps() -> u32 {
    100
}
fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9092".to_string(),
            client_id: "sca-engine".to_string(),
            max_eps: default_max_eps(),
            timeout_ms: default_timeout_ms(),
            kafka_topic: None,
            partition: 0,
        }
    }
}

impl SinkConfig {
    pub fn from_file(path: &Path) -> Result<Self, SinkError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SinkError::Protocol(format!("cannot read config file '{}': {e}", path.display())))?;
        toml::from_str(&contents).map_err(|e| SinkError::Protocol(format!("invalid TOML in '{}': {e}", path.display())))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.merge_env();
        config
    }

    /// Overlay `SCA_SINK_`-prefixed environment variables.
    pub fn merge_env(&mut self) {
        if let Ok(v) = std::env::var("SCA_SINK_ENDPOINT") {
            if !v.is_empty() {
                self.endpoint = v;
            }
        }
        if let Ok(v) = std::env::var("SCA_SINK_CLIENT_ID") {
            if !v.is_empty() {
                self.client_id = v;
            }
        }
        if let Ok(v) = std::env::var("SCA_SINK_MAX_EPS") {
            if let Ok(n) = v.parse() {
                self.max_eps = n;
            }
        }
        if let Ok(v) = std::env::var("SCA_SINK_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SCA_SINK_KAFKA_TOPIC") {
            if !v.is_empty() {
                self.kafka_topic = Some(v);
            }
        }
        if let Ok(v) = std::env::var("SCA_SINK_PARTITION") {
            if let Ok(n) = v.parse() {
                self.partition = n;
            }
        }
    }

    /// Minimum spacing between sends implied by `max_eps` (§4.8: "10^6 /
    /// wm_max_eps microseconds" between events; zero means unthrottled).
    pub fn min_send_interval(&self) -> std::time::Duration {
        if self.max_eps == 0 {
            std::time::Duration::ZERO
        } else {
            std::time::Duration::from_micros(1_000_000 / self.max_eps as u64)
        }
    }
}
