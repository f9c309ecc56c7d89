//! Sleep configuration for Dormant firmware
//!
//! Firmware describes a sleep request with a [`SleepConfiguration`]: the power
//! mode to enter and the events allowed to wake the device. The finished
//! [`SleepConfigDescriptor`] is handed to a [`SleepHal`] implementation, which
//! decides whether the platform supports it and performs the transition.
//!
//! # Capabilities
//!
//! Cargo features select what the platform build supports:
//!
//! - `ble` - radio link wakeup ([`SleepConfiguration::radio_link`])
//! - `wifi`, `cellular`, `mesh`, `ethernet` - network interfaces compiled in;
//!   these decide [`SleepConfiguration::cloud_connection_must_persist`]
//!
//! # Example
//!
//! ```
//! use dormant_hal::mock::MockSleepHal;
//! use dormant_hal::{InterruptMode, SleepConfiguration, SleepMode, WakeupReason};
//!
//! fn main() -> Result<(), dormant_hal::HalError> {
//!     let mut config = SleepConfiguration::new();
//!     config
//!         .mode(SleepMode::Stop)
//!         .gpio(7, InterruptMode::Rising)
//!         .duration_ms(5000);
//!
//!     let mut hal = MockSleepHal::cellular();
//!     let reason = dormant_hal::enter_sleep(&mut hal, &config)?;
//!     assert_eq!(reason, WakeupReason::Timer);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod hal;
pub mod image;
pub mod mesh;
pub mod mock;
pub mod mode;
pub mod platform;
pub mod registry;
pub mod wakeup;

pub use config::{SleepConfigDescriptor, SleepConfiguration, SleepConfigurationHelper};
pub use hal::{HalError, SleepHal, WakeupReason, enter_sleep};
pub use image::{ImageError, ImageView, RawWakeupSource, WakeupSourceCursor};
pub use mode::{SleepFlags, SleepMode};
pub use platform::{ModeSupport, PlatformError, PlatformProfile};
pub use registry::{AllocError, NodeAllocator, SourceId, SystemAllocator, WakeupSourceRegistry};
pub use wakeup::{
    InterruptMode, NetworkInterfaceIndex, Pin, SLEEP_CONFIG_VERSION, WakeupPayload, WakeupSource,
    WakeupSourceHeader, WakeupSourceKind,
};
