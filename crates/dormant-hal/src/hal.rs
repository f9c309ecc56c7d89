//! HAL boundary
//!
//! The HAL performs the actual transition. It receives a finished descriptor,
//! decides whether the platform supports it, and never mutates or frees the
//! wakeup sources it is given.

use crate::config::{SleepConfigDescriptor, SleepConfiguration};
use crate::image::ImageError;
use crate::mode::SleepMode;
use crate::wakeup::{NetworkInterfaceIndex, Pin, WakeupSourceKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HalError {
    #[error("Sleep configuration is not valid")]
    InvalidConfiguration,

    #[error("Sleep mode {0} is not supported on this platform")]
    UnsupportedMode(SleepMode),

    #[error("{kind} wakeup source is not supported in {mode} mode")]
    UnsupportedWakeupSource {
        mode: SleepMode,
        kind: WakeupSourceKind,
    },

    #[error("{0} mode requires at least one wakeup source")]
    WakeupSourceRequired(SleepMode),

    #[error("GPIO pin {0} cannot wake the device")]
    InvalidPin(Pin),

    #[error("Malformed descriptor image: {0}")]
    Image(#[from] ImageError),
}

/// What ended the sleep period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum WakeupReason {
    Gpio { pin: Pin },
    Timer,
    Network { index: NetworkInterfaceIndex },
    RadioLink,
    /// Woken by something outside the configuration, e.g. a reset
    Unknown,
}

/// A platform able to enter sleep
pub trait SleepHal {
    /// Enter sleep as described by `config` and return once woken. Modes that
    /// reset the device on wakeup only return on failure.
    fn enter(&mut self, config: &SleepConfigDescriptor) -> Result<WakeupReason, HalError>;
}

/// Hand a finished configuration to the HAL. Invalid configurations never
/// reach it.
pub fn enter_sleep<H: SleepHal + ?Sized>(
    hal: &mut H,
    config: &SleepConfiguration,
) -> Result<WakeupReason, HalError> {
    if !config.valid() {
        tracing::error!("Refusing to sleep with an invalid configuration");
        return Err(HalError::InvalidConfiguration);
    }
    let descriptor = config.descriptor();
    tracing::info!(
        "Entering {} sleep with {} wakeup source(s)",
        descriptor.mode(),
        descriptor.wakeup_sources().len()
    );
    let reason = hal.enter(descriptor)?;
    tracing::info!("Woke up: {:?}", reason);
    Ok(reason)
}
