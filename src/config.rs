use std::{path::Path, time::Duration};

use anyhow::Result;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Deploy-time tunables. The retry budgets and delay are configuration, not
/// constants; the defaults match what the CLI has always shipped with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipperConfig {
    /// Lambda runtime identifier for created functions.
    pub runtime: String,
    /// Lambda architecture for created functions.
    pub architecture: String,
    /// Cargo target triple the handler is built for.
    pub build_target: String,
    /// Total CreateFunction attempts while the role propagates.
    pub create_retry_attempts: u32,
    /// Total PublishVersion attempts in the consistency gate.
    pub consistency_retry_attempts: u32,
    /// Fixed delay between retry attempts, in seconds.
    pub retry_delay_secs: u64,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        ShipperConfig {
            runtime: "provided.al2023".to_string(),
            architecture: "arm64".to_string(),
            build_target: "aarch64-unknown-linux-musl".to_string(),
            create_retry_attempts: 3,
            consistency_retry_attempts: 10,
            retry_delay_secs: 3,
        }
    }
}

impl ShipperConfig {
    pub fn from_path(path: &Path) -> Result<ShipperConfig> {
        let config_str = std::fs::read_to_string(path)?;
        let config: ShipperConfig = Figment::from(figment::providers::Serialized::defaults(
            ShipperConfig::default(),
        ))
        .merge(Yaml::string(&config_str))
        .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.create_retry_attempts == 0 {
            return Err(anyhow::anyhow!("create_retry_attempts must be at least 1"));
        }
        if self.consistency_retry_attempts == 0 {
            return Err(anyhow::anyhow!(
                "consistency_retry_attempts must be at least 1"
            ));
        }
        if self.runtime.is_empty() || self.architecture.is_empty() {
            return Err(anyhow::anyhow!("runtime and architecture must be set"));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn create_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.create_retry_attempts,
            delay: self.retry_delay(),
        }
    }

    pub fn consistency_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.consistency_retry_attempts,
            delay: self.retry_delay(),
        }
    }
}
