//! DKG run configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DkgError, Result};

/// Largest supported party count.
pub const MAX_PARTIES: u16 = 255;

/// What a party does when a proof or share fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going; the run reports every failure at
    /// the end and returns no key material.
    #[default]
    Record,
    /// Stop the party on the first failure and cancel the run.
    Abort,
}

/// Configuration for a DKG run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgConfig {
    /// Number of parties `N`
    pub num_parties: u16,

    /// Polynomial degree `t`; any `t + 1` shares reconstruct
    pub threshold: u16,

    /// Per-wait barrier timeout (milliseconds)
    #[serde(default = "default_barrier_timeout_ms")]
    pub barrier_timeout_ms: u64,

    /// Behaviour on verification failure
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Hex-encoded 32-byte seed for reproducible runs. OS randomness when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

fn default_barrier_timeout_ms() -> u64 {
    30_000
}

impl Default for DkgConfig {
    fn default() -> Self {
        Self {
            num_parties: 4,
            threshold: 2,
            barrier_timeout_ms: default_barrier_timeout_ms(),
            failure_policy: FailurePolicy::default(),
            seed: None,
        }
    }
}

impl DkgConfig {
    /// Configuration with default timeout and policy
    pub fn new(num_parties: u16, threshold: u16) -> Self {
        Self {
            num_parties,
            threshold,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_parties < 2 || self.num_parties > MAX_PARTIES {
            return Err(DkgError::InvalidParameters(format!(
                "party count must be in 2..={}, got {}",
                MAX_PARTIES, self.num_parties
            )));
        }
        if self.threshold < 1 || self.threshold >= self.num_parties {
            return Err(DkgError::InvalidThreshold {
                threshold: self.threshold as usize,
                participants: self.num_parties as usize,
            });
        }
        if self.barrier_timeout_ms == 0 {
            return Err(DkgError::Config(
                "barrier_timeout_ms must be positive".to_string(),
            ));
        }
        self.seed_bytes()?;
        Ok(())
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    /// Decoded seed, if one is configured
    pub fn seed_bytes(&self) -> Result<Option<[u8; 32]>> {
        let Some(seed) = &self.seed else {
            return Ok(None);
        };
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(seed, &mut bytes)
            .map_err(|e| DkgError::Config(format!("seed must be 64 hex characters: {}", e)))?;
        Ok(Some(bytes))
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
