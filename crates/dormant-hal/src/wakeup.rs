//! Wakeup source records
//!
//! Every record carries a small header (kind, schema version, encoded size) in
//! front of its payload. The header is what a consumer relies on to walk the
//! sources without knowing every kind in advance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version stamped into descriptors and records
pub const SLEEP_CONFIG_VERSION: u16 = 1;

/// Encoded size of a record header (kind, version, size, reserved)
pub const RECORD_HEADER_SIZE: u16 = 8;

/// GPIO pin identifier
pub type Pin = u16;

/// Wakeup source kind, as encoded in record headers
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeupSourceKind {
    Gpio = 1,
    /// RTC timer
    Timer = 4,
    Network = 12,
    /// BLE radio link
    RadioLink = 13,
}

impl WakeupSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeupSourceKind::Gpio => "gpio",
            WakeupSourceKind::Timer => "timer",
            WakeupSourceKind::Network => "network",
            WakeupSourceKind::RadioLink => "radio_link",
        }
    }

    /// Decode a header kind; unknown kinds yield `None`
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(WakeupSourceKind::Gpio),
            4 => Some(WakeupSourceKind::Timer),
            12 => Some(WakeupSourceKind::Network),
            13 => Some(WakeupSourceKind::RadioLink),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u16 {
        self as u16
    }

    /// Encoded payload size for this kind
    pub fn payload_size(self) -> u16 {
        match self {
            WakeupSourceKind::Gpio => 4,
            WakeupSourceKind::Timer => 4,
            WakeupSourceKind::Network => 4,
            WakeupSourceKind::RadioLink => 0,
        }
    }
}

impl fmt::Display for WakeupSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPIO trigger condition
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptMode {
    Change = 0,
    Rising = 1,
    Falling = 2,
}

impl InterruptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterruptMode::Change => "change",
            InterruptMode::Rising => "rising",
            InterruptMode::Falling => "falling",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "change" => Some(InterruptMode::Change),
            "rising" => Some(InterruptMode::Rising),
            "falling" => Some(InterruptMode::Falling),
            _ => None,
        }
    }

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(InterruptMode::Change),
            1 => Some(InterruptMode::Rising),
            2 => Some(InterruptMode::Falling),
            _ => None,
        }
    }
}

/// Network interface index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkInterfaceIndex(pub u8);

impl NetworkInterfaceIndex {
    pub const LOOPBACK: Self = Self(1);
    pub const MESH: Self = Self(2);
    pub const ETHERNET: Self = Self(3);
    pub const CELLULAR: Self = Self(4);
    pub const WIFI_STA: Self = Self(5);
    pub const WIFI_AP: Self = Self(6);

    /// Interfaces compiled into this platform build, in probe order
    pub fn compiled_in() -> &'static [NetworkInterfaceIndex] {
        const COMPILED_IN: &[NetworkInterfaceIndex] = &[
            #[cfg(feature = "cellular")]
            NetworkInterfaceIndex::CELLULAR,
            #[cfg(feature = "wifi")]
            NetworkInterfaceIndex::WIFI_STA,
            #[cfg(feature = "mesh")]
            NetworkInterfaceIndex::MESH,
            #[cfg(feature = "ethernet")]
            NetworkInterfaceIndex::ETHERNET,
        ];
        COMPILED_IN
    }

    pub fn is_compiled_in(self) -> bool {
        Self::compiled_in().contains(&self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LOOPBACK => "loopback",
            Self::MESH => "mesh",
            Self::ETHERNET => "ethernet",
            Self::CELLULAR => "cellular",
            Self::WIFI_STA => "wifi_sta",
            Self::WIFI_AP => "wifi_ap",
            _ => "unknown",
        }
    }

    /// Parse an interface name or a raw index
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "loopback" | "lo" => Some(Self::LOOPBACK),
            "mesh" => Some(Self::MESH),
            "ethernet" | "eth" => Some(Self::ETHERNET),
            "cellular" => Some(Self::CELLULAR),
            "wifi" | "wifi_sta" => Some(Self::WIFI_STA),
            "wifi_ap" => Some(Self::WIFI_AP),
            other => other.parse().ok().map(Self),
        }
    }
}

impl fmt::Display for NetworkInterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Header common to all wakeup source records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WakeupSourceHeader {
    pub kind: WakeupSourceKind,
    pub version: u16,
    /// Encoded size of the whole record, header included
    pub size: u16,
}

impl WakeupSourceHeader {
    fn for_kind(kind: WakeupSourceKind) -> Self {
        Self {
            kind,
            version: SLEEP_CONFIG_VERSION,
            size: RECORD_HEADER_SIZE + kind.payload_size(),
        }
    }
}

/// Kind-specific part of a wakeup source record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WakeupPayload {
    Gpio { pin: Pin, mode: InterruptMode },
    Timer { ms: u32 },
    Network { index: NetworkInterfaceIndex },
    RadioLink,
}

impl WakeupPayload {
    pub fn kind(&self) -> WakeupSourceKind {
        match self {
            WakeupPayload::Gpio { .. } => WakeupSourceKind::Gpio,
            WakeupPayload::Timer { .. } => WakeupSourceKind::Timer,
            WakeupPayload::Network { .. } => WakeupSourceKind::Network,
            WakeupPayload::RadioLink => WakeupSourceKind::RadioLink,
        }
    }
}

/// One wakeup source record
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct WakeupSource {
    header: WakeupSourceHeader,
    payload: WakeupPayload,
}

impl WakeupSource {
    pub(crate) fn new(payload: WakeupPayload) -> Self {
        Self {
            header: WakeupSourceHeader::for_kind(payload.kind()),
            payload,
        }
    }

    pub fn header(&self) -> &WakeupSourceHeader {
        &self.header
    }

    pub fn kind(&self) -> WakeupSourceKind {
        self.header.kind
    }

    pub fn payload(&self) -> &WakeupPayload {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut WakeupPayload {
        &mut self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        let gpio = WakeupSource::new(WakeupPayload::Gpio {
            pin: 7,
            mode: InterruptMode::Rising,
        });
        assert_eq!(gpio.header().size, 12);
        assert_eq!(gpio.header().version, SLEEP_CONFIG_VERSION);

        let radio = WakeupSource::new(WakeupPayload::RadioLink);
        assert_eq!(radio.header().size, RECORD_HEADER_SIZE);
        assert_eq!(radio.kind(), WakeupSourceKind::RadioLink);
    }

    #[test]
    fn test_kind_from_raw() {
        assert_eq!(WakeupSourceKind::from_raw(4), Some(WakeupSourceKind::Timer));
        assert_eq!(WakeupSourceKind::from_raw(2), None);
    }

    #[test]
    fn test_network_interface_parse() {
        assert_eq!(
            NetworkInterfaceIndex::parse("wifi"),
            Some(NetworkInterfaceIndex::WIFI_STA)
        );
        assert_eq!(
            NetworkInterfaceIndex::parse("4"),
            Some(NetworkInterfaceIndex::CELLULAR)
        );
        assert_eq!(NetworkInterfaceIndex::parse("token-ring"), None);
    }

    #[test]
    fn test_compiled_in_matches_features() {
        assert_eq!(
            NetworkInterfaceIndex::WIFI_STA.is_compiled_in(),
            cfg!(feature = "wifi")
        );
        assert_eq!(
            NetworkInterfaceIndex::CELLULAR.is_compiled_in(),
            cfg!(feature = "cellular")
        );
        assert!(!NetworkInterfaceIndex::LOOPBACK.is_compiled_in());
    }

    #[test]
    fn test_interrupt_mode_parse() {
        assert_eq!(InterruptMode::parse("FALLING"), Some(InterruptMode::Falling));
        assert_eq!(InterruptMode::from_raw(0), Some(InterruptMode::Change));
        assert_eq!(InterruptMode::parse("high"), None);
    }
}
