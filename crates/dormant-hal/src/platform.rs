//! Platform profiles
//!
//! A profile lists which sleep modes a platform implements and which wakeup
//! sources each mode accepts. The builder never consults it; HAL
//! implementations use it to reject configurations the hardware cannot honor.

use crate::config::SleepConfigDescriptor;
use crate::hal::HalError;
use crate::mode::SleepMode;
use crate::wakeup::{WakeupPayload, WakeupSourceKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid platform profile: {0}")]
    InvalidProfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wakeup sources accepted in one sleep mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeSupport {
    pub mode: SleepMode,
    pub wakeup_kinds: Vec<WakeupSourceKind>,
    /// Whether the mode may be entered with no wakeup source at all
    #[serde(default)]
    pub allow_no_wakeup: bool,
}

/// Sleep capabilities of a platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub id: String,
    pub name: String,
    /// GPIO pins `0..pin_count` can be used as wakeup pins
    pub pin_count: u16,
    pub modes: Vec<ModeSupport>,
}

impl PlatformProfile {
    /// Load a profile from a TOML file
    pub fn from_profile_file(path: &Path) -> Result<Self, PlatformError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, PlatformError> {
        let profile: Self =
            toml::from_str(contents).map_err(|e| PlatformError::InvalidProfile(e.to_string()))?;
        if profile.modes.iter().any(|m| m.mode == SleepMode::None) {
            return Err(PlatformError::InvalidProfile(format!(
                "{}: mode 'none' cannot be listed as supported",
                profile.id
            )));
        }
        tracing::debug!("Loaded platform profile {}", profile.id);
        Ok(profile)
    }

    /// Look up a built-in profile by id
    pub fn builtin(id: &str) -> Result<Self, PlatformError> {
        match id.to_lowercase().as_str() {
            "cellular" => Ok(Self::cellular()),
            "wifi" => Ok(Self::wifi()),
            other => Err(PlatformError::UnknownPlatform(other.to_string())),
        }
    }

    /// Ids of the built-in profiles
    pub fn builtin_ids() -> &'static [&'static str] {
        &["cellular", "wifi"]
    }

    /// Cellular board with a BLE radio
    pub fn cellular() -> Self {
        use WakeupSourceKind::*;
        Self {
            id: "cellular".into(),
            name: "Cellular module".into(),
            pin_count: 24,
            modes: vec![
                ModeSupport {
                    mode: SleepMode::Stop,
                    wakeup_kinds: vec![Gpio, Timer, Network, RadioLink],
                    allow_no_wakeup: false,
                },
                ModeSupport {
                    mode: SleepMode::UltraLowPower,
                    wakeup_kinds: vec![Gpio, Timer, Network, RadioLink],
                    allow_no_wakeup: false,
                },
                ModeSupport {
                    mode: SleepMode::Hibernate,
                    wakeup_kinds: vec![Gpio],
                    allow_no_wakeup: true,
                },
            ],
        }
    }

    /// Wi-Fi board without network wakeup in hibernate
    pub fn wifi() -> Self {
        use WakeupSourceKind::*;
        Self {
            id: "wifi".into(),
            name: "Wi-Fi module".into(),
            pin_count: 30,
            modes: vec![
                ModeSupport {
                    mode: SleepMode::Stop,
                    wakeup_kinds: vec![Gpio, Timer, Network, RadioLink],
                    allow_no_wakeup: false,
                },
                ModeSupport {
                    mode: SleepMode::UltraLowPower,
                    wakeup_kinds: vec![Gpio, Timer, RadioLink],
                    allow_no_wakeup: false,
                },
                ModeSupport {
                    mode: SleepMode::Hibernate,
                    wakeup_kinds: vec![Gpio, Timer],
                    allow_no_wakeup: true,
                },
            ],
        }
    }

    pub fn supports_mode(&self, mode: SleepMode) -> Option<&ModeSupport> {
        self.modes.iter().find(|m| m.mode == mode)
    }

    /// Check that this platform can honor `config`
    pub fn check(&self, config: &SleepConfigDescriptor) -> Result<(), HalError> {
        let mode = config.mode();
        if mode == SleepMode::None {
            return Err(HalError::InvalidConfiguration);
        }
        let support = self
            .supports_mode(mode)
            .ok_or(HalError::UnsupportedMode(mode))?;

        let sources = config.wakeup_sources();
        if sources.is_empty() && !support.allow_no_wakeup {
            return Err(HalError::WakeupSourceRequired(mode));
        }

        for node in sources.iter() {
            let kind = node.kind();
            if !support.wakeup_kinds.contains(&kind) {
                return Err(HalError::UnsupportedWakeupSource { mode, kind });
            }
            if let WakeupPayload::Gpio { pin, .. } = *node.payload() {
                if pin >= self.pin_count {
                    return Err(HalError::InvalidPin(pin));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SleepConfiguration;
    use crate::wakeup::{InterruptMode, NetworkInterfaceIndex};

    #[test]
    fn test_builtin_lookup() {
        for id in PlatformProfile::builtin_ids() {
            assert_eq!(PlatformProfile::builtin(id).unwrap().id, *id);
        }
        assert!(matches!(
            PlatformProfile::builtin("toaster"),
            Err(PlatformError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_check_accepts_supported_combination() {
        let mut config = SleepConfiguration::new();
        config.mode(SleepMode::Stop).gpio(7, InterruptMode::Rising).duration_ms(5000);
        assert!(PlatformProfile::cellular().check(config.descriptor()).is_ok());
    }

    #[test]
    fn test_check_rejects_network_in_hibernate() {
        let mut config = SleepConfiguration::new();
        config
            .mode(SleepMode::Hibernate)
            .network(NetworkInterfaceIndex::CELLULAR);
        let err = PlatformProfile::cellular()
            .check(config.descriptor())
            .unwrap_err();
        assert!(matches!(
            err,
            HalError::UnsupportedWakeupSource {
                kind: WakeupSourceKind::Network,
                ..
            }
        ));
    }

    #[test]
    fn test_check_requires_wakeup_source() {
        let mut config = SleepConfiguration::new();
        config.mode(SleepMode::Stop);
        assert!(matches!(
            PlatformProfile::wifi().check(config.descriptor()),
            Err(HalError::WakeupSourceRequired(SleepMode::Stop))
        ));

        config.mode(SleepMode::Hibernate);
        assert!(PlatformProfile::wifi().check(config.descriptor()).is_ok());
    }

    #[test]
    fn test_check_rejects_pin_out_of_range() {
        let mut config = SleepConfiguration::new();
        config.mode(SleepMode::Stop).gpio(40, InterruptMode::Falling);
        assert!(matches!(
            PlatformProfile::cellular().check(config.descriptor()),
            Err(HalError::InvalidPin(40))
        ));
    }

    #[test]
    fn test_profile_from_toml() {
        let profile = PlatformProfile::from_toml(
            r#"
            id = "custom"
            name = "Custom board"
            pin_count = 8

            [[modes]]
            mode = "stop"
            wakeup_kinds = ["gpio", "timer"]

            [[modes]]
            mode = "hibernate"
            wakeup_kinds = ["gpio"]
            allow_no_wakeup = true
            "#,
        )
        .unwrap();

        assert_eq!(profile.pin_count, 8);
        assert!(profile.supports_mode(SleepMode::UltraLowPower).is_none());
        assert!(!profile.supports_mode(SleepMode::Stop).unwrap().allow_no_wakeup);
    }

    #[test]
    fn test_profile_rejects_none_mode() {
        let result = PlatformProfile::from_toml(
            r#"
            id = "broken"
            name = "Broken"
            pin_count = 1

            [[modes]]
            mode = "none"
            wakeup_kinds = []
            "#,
        );
        assert!(matches!(result, Err(PlatformError::InvalidProfile(_))));
    }
}
