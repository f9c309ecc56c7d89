//! Sleep profiles
//!
//! A profile is a sleep request written down as data. Building it replays the
//! fields into a [`SleepConfiguration`] in a fixed order.

use dormant_hal::{InterruptMode, NetworkInterfaceIndex, Pin, SleepConfiguration, SleepFlags, SleepMode};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// GPIO wakeup entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioWakeup {
    pub pin: Pin,
    #[serde(default = "default_trigger")]
    pub trigger: InterruptMode,
}

fn default_trigger() -> InterruptMode {
    InterruptMode::Rising
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepProfile {
    pub mode: SleepMode,

    /// Wait for the cloud session to close before sleeping
    #[serde(default)]
    pub wait_cloud: bool,

    #[serde(default)]
    pub gpio: Vec<GpioWakeup>,

    /// Timer wakeup in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u32>,

    /// Interface names (`cellular`, `wifi`, ...) or raw indices
    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default)]
    pub radio_link: bool,
}

impl SleepProfile {
    /// Resolve network interface names
    pub fn network_interfaces(&self) -> Result<Vec<NetworkInterfaceIndex>, ConfigError> {
        self.networks
            .iter()
            .map(|name| {
                NetworkInterfaceIndex::parse(name)
                    .ok_or_else(|| ConfigError::Invalid(format!("unknown network interface: {}", name)))
            })
            .collect()
    }

    /// Replay this profile into a new configuration.
    ///
    /// The result may still be invalid (no mode, or an allocation failure);
    /// check [`SleepConfiguration::valid`] before use.
    pub fn build(&self) -> Result<SleepConfiguration, ConfigError> {
        let networks = self.network_interfaces()?;

        let mut config = SleepConfiguration::new();
        config.mode(self.mode);
        if self.wait_cloud {
            config.flag(SleepFlags::WAIT_CLOUD);
        }
        for entry in &self.gpio {
            config.gpio(entry.pin, entry.trigger);
        }
        if let Some(ms) = self.duration_ms {
            config.duration_ms(ms);
        }
        for index in networks {
            config.network(index);
        }
        if self.radio_link {
            #[cfg(feature = "ble")]
            config.radio_link();
            #[cfg(not(feature = "ble"))]
            return Err(ConfigError::Invalid(
                "radio link wakeup is not available in this build".to_string(),
            ));
        }

        tracing::debug!(
            "Built {} profile with {} wakeup source(s)",
            self.mode,
            config.descriptor().wakeup_sources().len()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_toml() {
        let profile: SleepProfile = toml::from_str(
            r#"
            mode = "stop"
            wait_cloud = true
            duration_ms = 5000
            networks = ["cellular"]

            [[gpio]]
            pin = 7

            [[gpio]]
            pin = 3
            trigger = "falling"
            "#,
        )
        .unwrap();

        assert_eq!(profile.mode, SleepMode::Stop);
        assert_eq!(profile.gpio[0].trigger, InterruptMode::Rising);
        assert_eq!(profile.gpio[1].trigger, InterruptMode::Falling);

        let config = profile.build().unwrap();
        assert!(config.valid());
        assert_eq!(config.sleep_flags(), SleepFlags::WAIT_CLOUD);
        assert_eq!(config.descriptor().wakeup_sources().len(), 4);
        assert!(config.wakeup_by_network_interface(NetworkInterfaceIndex::CELLULAR));
    }

    #[test]
    fn test_duplicate_pins_merge() {
        let profile = SleepProfile {
            mode: SleepMode::UltraLowPower,
            gpio: vec![
                GpioWakeup { pin: 2, trigger: InterruptMode::Rising },
                GpioWakeup { pin: 2, trigger: InterruptMode::Change },
            ],
            ..SleepProfile::default()
        };
        let config = profile.build().unwrap();
        let pins: Vec<_> = config.descriptor().wakeup_sources().gpio_pins().collect();
        assert_eq!(pins, vec![(2, InterruptMode::Change)]);
    }

    #[test]
    fn test_unknown_network_rejected() {
        let profile = SleepProfile {
            mode: SleepMode::Stop,
            networks: vec!["carrier-pigeon".into()],
            ..SleepProfile::default()
        };
        assert!(matches!(profile.build(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_default_profile_is_invalid() {
        let config = SleepProfile::default().build().unwrap();
        assert!(!config.valid());
    }

    #[cfg(feature = "ble")]
    #[test]
    fn test_radio_link_profile() {
        use dormant_hal::WakeupSourceKind;

        let profile = SleepProfile {
            mode: SleepMode::Stop,
            radio_link: true,
            ..SleepProfile::default()
        };
        let config = profile.build().unwrap();
        assert!(
            config
                .wakeup_source_featured(WakeupSourceKind::RadioLink)
                .is_some()
        );
    }
}
