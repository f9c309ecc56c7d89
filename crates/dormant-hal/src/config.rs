//! Sleep configuration
//!
//! [`SleepConfiguration`] is the builder firmware uses to describe a sleep
//! request. It owns one [`SleepConfigDescriptor`], the aggregate that is handed
//! to the HAL, and a validity flag.
//!
//! ```
//! use dormant_hal::{InterruptMode, SleepConfiguration, SleepMode};
//!
//! let mut config = SleepConfiguration::new();
//! config
//!     .mode(SleepMode::Stop)
//!     .gpio(7, InterruptMode::Rising)
//!     .duration_ms(5000);
//! assert!(config.valid());
//! assert_eq!(config.descriptor().wakeup_sources().len(), 2);
//! ```
//!
//! A builder cannot be cloned. To hand it elsewhere, move it, or use
//! [`SleepConfiguration::take`] to move the contents out of a borrowed one.

use crate::mode::{SleepFlags, SleepMode};
use crate::registry::{AllocError, NodeAllocator, SourceId, WakeupSourceRegistry};
use crate::wakeup::{
    InterruptMode, NetworkInterfaceIndex, Pin, SLEEP_CONFIG_VERSION, WakeupPayload, WakeupSource,
    WakeupSourceKind,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Encoded size of the descriptor header
pub const DESCRIPTOR_SIZE: u16 = 16;

/// The aggregate consumed by the HAL
#[derive(Debug, Serialize)]
pub struct SleepConfigDescriptor {
    size: u16,
    version: u16,
    mode: SleepMode,
    flags: SleepFlags,
    wakeup_sources: WakeupSourceRegistry,
}

impl SleepConfigDescriptor {
    fn with_registry(wakeup_sources: WakeupSourceRegistry) -> Self {
        Self {
            size: DESCRIPTOR_SIZE,
            version: SLEEP_CONFIG_VERSION,
            mode: SleepMode::None,
            flags: SleepFlags::empty(),
            wakeup_sources,
        }
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn mode(&self) -> SleepMode {
        self.mode
    }

    pub fn flags(&self) -> SleepFlags {
        self.flags
    }

    pub fn wakeup_sources(&self) -> &WakeupSourceRegistry {
        &self.wakeup_sources
    }
}

/// Read-only view over a descriptor
#[derive(Debug, Clone, Copy)]
pub struct SleepConfigurationHelper<'a> {
    config: &'a SleepConfigDescriptor,
}

impl<'a> SleepConfigurationHelper<'a> {
    pub fn new(config: &'a SleepConfigDescriptor) -> Self {
        Self { config }
    }

    pub fn sleep_mode(&self) -> SleepMode {
        self.config.mode
    }

    pub fn sleep_flags(&self) -> SleepFlags {
        self.config.flags
    }

    /// Newest wakeup source, the start of a traversal
    pub fn wakeup_source(&self) -> Option<(SourceId, &'a WakeupSource)> {
        self.config.wakeup_sources.head()
    }

    pub fn wakeup_sources(&self) -> impl Iterator<Item = &'a WakeupSource> + use<'a> {
        self.config.wakeup_sources.iter()
    }

    /// First wakeup source of `kind`
    pub fn wakeup_source_featured(
        &self,
        kind: WakeupSourceKind,
    ) -> Option<(SourceId, &'a WakeupSource)> {
        self.config.wakeup_sources.find(kind)
    }

    /// Next wakeup source of `kind` after `start`
    pub fn wakeup_source_featured_after(
        &self,
        kind: WakeupSourceKind,
        start: SourceId,
    ) -> Option<(SourceId, &'a WakeupSource)> {
        self.config.wakeup_sources.find_after(kind, start)
    }

    /// Whether `index` is registered as a network wakeup source
    pub fn wakeup_by_network_interface(&self, index: NetworkInterfaceIndex) -> bool {
        let mut cursor = self.wakeup_source_featured(WakeupSourceKind::Network);
        while let Some((id, node)) = cursor {
            if matches!(node.payload(), WakeupPayload::Network { index: i } if *i == index) {
                return true;
            }
            cursor = self.wakeup_source_featured_after(WakeupSourceKind::Network, id);
        }
        false
    }

    /// Returns `true` unless a network interface compiled into this platform
    /// can wake the device. When it returns `true` the caller has to close the
    /// cloud session before sleeping.
    pub fn cloud_connection_must_persist(&self) -> bool {
        !NetworkInterfaceIndex::compiled_in()
            .iter()
            .any(|index| self.wakeup_by_network_interface(*index))
    }
}

/// Builder for a sleep request
#[derive(Debug)]
pub struct SleepConfiguration {
    config: SleepConfigDescriptor,
    valid: bool,
}

impl SleepConfiguration {
    /// Create an empty configuration: mode `None`, no flags, no wakeup sources
    pub fn new() -> Self {
        Self::with_registry(WakeupSourceRegistry::new())
    }

    /// Create an empty configuration whose records go through `allocator`
    pub fn with_allocator(allocator: Arc<dyn NodeAllocator>) -> Self {
        Self::with_registry(WakeupSourceRegistry::with_allocator(allocator))
    }

    fn with_registry(registry: WakeupSourceRegistry) -> Self {
        Self {
            config: SleepConfigDescriptor::with_registry(registry),
            valid: true,
        }
    }

    /// Move the contents out, leaving an empty configuration behind
    pub fn take(&mut self) -> Self {
        let empty = Self::with_allocator(self.config.wakeup_sources.allocator());
        std::mem::replace(self, empty)
    }

    /// The aggregate to hand to the HAL. Available even when the
    /// configuration is invalid, so a failed build can still be inspected.
    pub fn descriptor(&self) -> &SleepConfigDescriptor {
        &self.config
    }

    pub fn helper(&self) -> SleepConfigurationHelper<'_> {
        SleepConfigurationHelper::new(&self.config)
    }

    /// `false` after an allocation failure or while no mode is selected.
    ///
    /// This does not check that the platform supports the chosen mode with
    /// the chosen wakeup sources; the HAL rejects unsupported combinations.
    pub fn valid(&self) -> bool {
        if !self.valid {
            return false;
        }
        // No wakeup source at all is left for the HAL to judge.
        self.config.mode != SleepMode::None
    }

    pub fn sleep_mode(&self) -> SleepMode {
        self.config.mode
    }

    pub fn sleep_flags(&self) -> SleepFlags {
        self.config.flags
    }

    pub fn wakeup_source_featured(
        &self,
        kind: WakeupSourceKind,
    ) -> Option<(SourceId, &WakeupSource)> {
        self.config.wakeup_sources.find(kind)
    }

    pub fn wakeup_by_network_interface(&self, index: NetworkInterfaceIndex) -> bool {
        self.helper().wakeup_by_network_interface(index)
    }

    /// See [`SleepConfigurationHelper::cloud_connection_must_persist`]
    pub fn cloud_connection_must_persist(&self) -> bool {
        self.helper().cloud_connection_must_persist()
    }

    pub fn mode(&mut self, mode: SleepMode) -> &mut Self {
        if self.valid {
            self.config.mode = mode;
        }
        self
    }

    /// Add flags to the ones already set
    pub fn flag(&mut self, flags: SleepFlags) -> &mut Self {
        if self.valid {
            self.config.flags |= flags;
        }
        self
    }

    /// Wake on `pin`. Configuring the same pin again replaces its trigger mode.
    pub fn gpio(&mut self, pin: Pin, mode: InterruptMode) -> &mut Self {
        if self.valid {
            let result = self.config.wakeup_sources.insert_or_update_gpio(pin, mode);
            self.check(result);
        }
        self
    }

    /// Wake after `duration`; durations beyond `u32::MAX` milliseconds saturate
    pub fn duration(&mut self, duration: Duration) -> &mut Self {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        self.duration_ms(ms)
    }

    pub fn duration_ms(&mut self, ms: u32) -> &mut Self {
        if self.valid {
            let result = self.config.wakeup_sources.insert_or_update_timer(ms);
            self.check(result);
        }
        self
    }

    /// Wake on activity on network interface `index`
    pub fn network(&mut self, index: NetworkInterfaceIndex) -> &mut Self {
        if self.valid {
            let result = self.config.wakeup_sources.insert_or_update_network(index);
            self.check(result);
        }
        self
    }

    /// Wake on radio link activity
    #[cfg(feature = "ble")]
    pub fn radio_link(&mut self) -> &mut Self {
        if self.valid {
            let result = self.config.wakeup_sources.insert_radio_link_if_absent();
            self.check(result);
        }
        self
    }

    /// Release every wakeup source. Mode, flags and the validity flag are
    /// left as they are.
    pub fn clear(&mut self) -> &mut Self {
        self.config.wakeup_sources.release_all();
        self
    }

    fn check(&mut self, result: Result<(), AllocError>) {
        if let Err(e) = result {
            tracing::warn!("Sleep configuration invalidated: {}", e);
            self.valid = false;
        }
    }
}

impl Default for SleepConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::CountingAllocator;

    #[test]
    fn test_new_configuration() {
        let config = SleepConfiguration::new();
        let descriptor = config.descriptor();
        assert_eq!(descriptor.size(), DESCRIPTOR_SIZE);
        assert_eq!(descriptor.version(), SLEEP_CONFIG_VERSION);
        assert_eq!(descriptor.mode(), SleepMode::None);
        assert!(descriptor.flags().is_empty());
        assert!(descriptor.wakeup_sources().is_empty());
        assert!(!config.valid());
    }

    #[test]
    fn test_mode_overrides() {
        let mut config = SleepConfiguration::new();
        config.mode(SleepMode::Hibernate).mode(SleepMode::Stop);
        assert!(config.valid());
        assert_eq!(config.sleep_mode(), SleepMode::Stop);

        config.mode(SleepMode::None);
        assert!(!config.valid());
    }

    #[test]
    fn test_flags_accumulate() {
        let mut config = SleepConfiguration::new();
        config.flag(SleepFlags::empty()).flag(SleepFlags::WAIT_CLOUD);
        assert_eq!(config.sleep_flags(), SleepFlags::WAIT_CLOUD);
    }

    #[test]
    fn test_duration_saturates() {
        let mut config = SleepConfiguration::new();
        config.duration(Duration::from_secs(u64::MAX / 2));
        assert_eq!(config.descriptor().wakeup_sources().timer(), Some(u32::MAX));

        config.duration(Duration::from_millis(1500));
        assert_eq!(config.descriptor().wakeup_sources().timer(), Some(1500));
    }

    #[test]
    fn test_network_wakeup_lookup() {
        let mut config = SleepConfiguration::new();
        config
            .network(NetworkInterfaceIndex::CELLULAR)
            .gpio(1, InterruptMode::Rising)
            .network(NetworkInterfaceIndex::ETHERNET);

        assert!(config.wakeup_by_network_interface(NetworkInterfaceIndex::CELLULAR));
        assert!(config.wakeup_by_network_interface(NetworkInterfaceIndex::ETHERNET));
        assert!(!config.wakeup_by_network_interface(NetworkInterfaceIndex::MESH));
    }

    #[test]
    fn test_cloud_connection_without_network_wakeup() {
        let mut config = SleepConfiguration::new();
        config.mode(SleepMode::Stop).duration_ms(100);
        assert!(config.cloud_connection_must_persist());

        // Interfaces not compiled in do not count
        config.network(NetworkInterfaceIndex::LOOPBACK);
        assert!(config.cloud_connection_must_persist());
    }

    #[cfg(feature = "wifi")]
    #[test]
    fn test_cloud_connection_with_wifi_wakeup() {
        let mut config = SleepConfiguration::new();
        config.mode(SleepMode::Stop).network(NetworkInterfaceIndex::WIFI_STA);
        assert!(!config.cloud_connection_must_persist());
        assert!(!config.helper().cloud_connection_must_persist());
    }

    #[test]
    fn test_invalid_builder_ignores_setters() {
        let allocator = CountingAllocator::failing_at(1);
        let mut config = SleepConfiguration::with_allocator(Arc::new(allocator.clone()));
        config.mode(SleepMode::Stop).gpio(2, InterruptMode::Rising);
        assert!(!config.valid());

        config
            .mode(SleepMode::Hibernate)
            .flag(SleepFlags::WAIT_CLOUD)
            .duration_ms(10);
        assert_eq!(config.sleep_mode(), SleepMode::Stop);
        assert!(config.sleep_flags().is_empty());
        assert!(config.descriptor().wakeup_sources().is_empty());
        assert_eq!(allocator.acquired(), 0);
    }

    #[test]
    fn test_take_leaves_empty_source() {
        let mut original = SleepConfiguration::new();
        original.mode(SleepMode::Stop).gpio(5, InterruptMode::Falling);

        let moved = original.take();
        assert!(moved.valid());
        assert_eq!(moved.descriptor().wakeup_sources().len(), 1);
        assert_eq!(original.sleep_mode(), SleepMode::None);
        assert!(original.descriptor().wakeup_sources().is_empty());
    }

    #[test]
    fn test_clear_releases_sources() {
        let allocator = CountingAllocator::new();
        let mut config = SleepConfiguration::with_allocator(Arc::new(allocator.clone()));
        config
            .mode(SleepMode::Stop)
            .gpio(1, InterruptMode::Rising)
            .duration_ms(20);
        assert_eq!(allocator.live(), 2);

        config.clear();
        assert_eq!(allocator.released(), 2);
        assert!(config.descriptor().wakeup_sources().is_empty());
        assert_eq!(config.sleep_mode(), SleepMode::Stop);
        assert!(config.valid());

        config.gpio(1, InterruptMode::Falling);
        drop(config);
        assert_eq!(allocator.acquired(), 3);
        assert_eq!(allocator.live(), 0);
    }

    #[test]
    fn test_clear_keeps_invalid_flag() {
        let allocator = CountingAllocator::failing_at(2);
        let mut config = SleepConfiguration::with_allocator(Arc::new(allocator.clone()));
        config
            .mode(SleepMode::Stop)
            .gpio(1, InterruptMode::Rising)
            .gpio(2, InterruptMode::Rising);
        assert!(!config.valid());

        config.clear();
        assert!(!config.valid());
        assert_eq!(allocator.live(), 0);
    }
}
