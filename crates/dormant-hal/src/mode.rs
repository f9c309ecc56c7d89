//! Sleep modes and sleep flags
//!
//! Values match the numeric encoding the HAL expects in the descriptor image.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target power mode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepMode {
    /// No mode selected yet. A configuration in this mode is never valid.
    #[default]
    None = 0,
    /// CPU halted, RAM and peripherals retained
    Stop = 1,
    /// Like stop, with most clocks and regulators turned off
    UltraLowPower = 2,
    /// Everything off except the wakeup logic; waking resets the device
    Hibernate = 3,
}

impl SleepMode {
    /// Get the short name used in profiles and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepMode::None => "none",
            SleepMode::Stop => "stop",
            SleepMode::UltraLowPower => "ultra_low_power",
            SleepMode::Hibernate => "hibernate",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(SleepMode::None),
            "stop" => Some(SleepMode::Stop),
            "ultra_low_power" | "ulp" => Some(SleepMode::UltraLowPower),
            "hibernate" => Some(SleepMode::Hibernate),
            _ => None,
        }
    }

    /// Decode the raw value stored in a descriptor image
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SleepMode::None),
            1 => Some(SleepMode::Stop),
            2 => Some(SleepMode::UltraLowPower),
            3 => Some(SleepMode::Hibernate),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Behavior flags carried in the descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SleepFlags: u32 {
        /// Wait for the cloud session to close cleanly before sleeping
        const WAIT_CLOUD = 0x01;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_mode_str() {
        assert_eq!(SleepMode::Stop.as_str(), "stop");
        assert_eq!(SleepMode::UltraLowPower.to_string(), "ultra_low_power");
    }

    #[test]
    fn test_sleep_mode_parse() {
        assert_eq!(SleepMode::parse("Hibernate"), Some(SleepMode::Hibernate));
        assert_eq!(SleepMode::parse("ulp"), Some(SleepMode::UltraLowPower));
        assert_eq!(SleepMode::parse("deep"), None);
    }

    #[test]
    fn test_sleep_mode_raw() {
        for mode in [
            SleepMode::None,
            SleepMode::Stop,
            SleepMode::UltraLowPower,
            SleepMode::Hibernate,
        ] {
            assert_eq!(SleepMode::from_raw(mode.as_raw()), Some(mode));
        }
        assert_eq!(SleepMode::from_raw(9), None);
    }

    #[test]
    fn test_sleep_flags_default_empty() {
        assert!(SleepFlags::default().is_empty());
        assert_eq!(SleepFlags::WAIT_CLOUD.bits(), 1);
    }
}
