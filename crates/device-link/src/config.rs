//! Device configuration loading

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use event_classifier::ClassifierConfig;
use helmet_state::{LedConfig, StateMachineConfig};

/// Environment variable prefix, e.g. `HELMET__LINK__INBOX_CAPACITY=32`
pub const ENV_PREFIX: &str = "HELMET";

/// Link adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Minimum spacing of sensor notifications (ms)
    pub sensor_notify_interval_ms: u32,
    /// Transport attempts per crash alert before giving up
    pub crash_max_attempts: u8,
    /// Spacing between crash alert attempts (ms)
    pub crash_retry_interval_ms: u32,
    /// Queued inbound commands before new ones are dropped
    pub inbox_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            sensor_notify_interval_ms: 100,
            crash_max_attempts: 5,
            crash_retry_interval_ms: 20,
            inbox_capacity: 16,
        }
    }
}

/// Everything the device pipeline can be tuned with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub classifier: ClassifierConfig,
    pub state_machine: StateMachineConfig,
    pub link: LinkConfig,
    pub led: LedConfig,
}

impl DeviceConfig {
    /// Load configuration: defaults, then the optional file, then `HELMET__*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&DeviceConfig::default())?);

        if let Some(path) = path {
            info!("Loading device configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: DeviceConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("classifier.sample_rate_hz must be > 0".into()));
        }
        if self.classifier.sample_rate_hz > 1000 {
            return Err(ConfigError::Invalid(
                "classifier.sample_rate_hz must be <= 1000 (tick period under 1 ms)".into(),
            ));
        }
        if self.classifier.window_size == 0 {
            return Err(ConfigError::Invalid("classifier.window_size must be > 0".into()));
        }
        if self.link.crash_max_attempts == 0 {
            return Err(ConfigError::Invalid("link.crash_max_attempts must be > 0".into()));
        }
        if self.link.inbox_capacity == 0 {
            return Err(ConfigError::Invalid("link.inbox_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Tick period of the device loop (ms)
    pub fn tick_period_ms(&self) -> u32 {
        self.classifier.sample_period_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.classifier.crash_g, 4.0);
        assert_eq!(config.state_machine.crash_confirmation_ms, 30_000);
        assert_eq!(config.link.sensor_notify_interval_ms, 100);
        assert_eq!(config.led.led_count, 12);
        assert_eq!(config.tick_period_ms(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("helmet-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[classifier]\ncrash_g = 6.5\n\n[link]\ncrash_max_attempts = 3\n",
        )
        .unwrap();

        let config = DeviceConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.classifier.crash_g, 6.5);
        assert_eq!(config.link.crash_max_attempts, 3);
        // Untouched sections keep their defaults
        assert_eq!(config.classifier.brake_g, 0.5);
        assert_eq!(config.state_machine.brake_flash_ms, 3_000);
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = std::env::temp_dir().join("helmet-config-does-not-exist.toml");
        assert!(matches!(
            DeviceConfig::load(Some(&path)),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = DeviceConfig::default();
        config.link.crash_max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sub_millisecond_tick_rejected() {
        let mut config = DeviceConfig::default();
        config.classifier.sample_rate_hz = 1000;
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_period_ms(), 1);

        config.classifier.sample_rate_hz = 1001;
        assert_eq!(config.tick_period_ms(), 0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
