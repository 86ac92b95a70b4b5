//! Decoy subsystem configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Loop probability must be within [0, 1], got {0}")]
    InvalidLoopProbability(f64),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which kind of decoy packet each scheduled send produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoyPolicy {
    /// Always a loop packet carrying a SURB back to this node.
    #[default]
    Loop,
    /// Always a discard packet with no reply path.
    Discard,
    /// Loop with probability `loop_probability`, discard otherwise.
    Mixed { loop_probability: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoyConfig {
    /// Master switch. Documents are ignored while this is off.
    pub send_decoy_traffic: bool,
    /// This node is a provider. Provider decoy traffic is not supported.
    pub is_provider: bool,
    /// Grace period past a SURB's expected arrival before it is swept.
    pub decoy_slack_ms: u64,
    pub policy: DecoyPolicy,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            send_decoy_traffic: false,
            is_provider: false,
            decoy_slack_ms: 15_000,
            policy: DecoyPolicy::Loop,
        }
    }
}

impl DecoyConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let DecoyPolicy::Mixed { loop_probability } = self.policy {
            if !(0.0..=1.0).contains(&loop_probability) {
                return Err(ConfigError::InvalidLoopProbability(loop_probability));
            }
        }
        Ok(())
    }

    pub fn decoy_slack(&self) -> Duration {
        Duration::from_millis(self.decoy_slack_ms)
    }
}
