//! Mock implementations for testing without real hardware
//!
//! [`MockSleepHal`] validates configurations against a [`PlatformProfile`] and
//! records what it was asked to do instead of sleeping. [`CountingAllocator`]
//! keeps count of wakeup source records so tests can check that every record
//! is released exactly once.
//!
//! # Usage
//!
//! ```
//! use dormant_hal::mock::MockSleepHal;
//! use dormant_hal::{InterruptMode, SleepConfiguration, SleepHal, SleepMode};
//!
//! let mut hal = MockSleepHal::cellular();
//! let mut config = SleepConfiguration::new();
//! config.mode(SleepMode::Stop).gpio(3, InterruptMode::Falling);
//!
//! let reason = hal.enter(config.descriptor()).unwrap();
//! assert_eq!(hal.history().len(), 1);
//! # let _ = reason;
//! ```

use crate::config::SleepConfigDescriptor;
use crate::hal::{HalError, SleepHal, WakeupReason};
use crate::image::{self, ImageView};
use crate::mode::{SleepFlags, SleepMode};
use crate::platform::PlatformProfile;
use crate::registry::{AllocError, NodeAllocator};
use crate::wakeup::{WakeupPayload, WakeupSourceKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// One sleep request as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSleep {
    pub mode: SleepMode,
    pub flags: SleepFlags,
    /// Decoded from the image, in traversal order
    pub sources: Vec<WakeupPayload>,
    /// Records of kinds the mock did not recognize
    pub skipped: usize,
    pub image_len: usize,
}

/// Shared mock state
#[derive(Debug, Default)]
pub struct MockSleepState {
    pub history: Vec<RecordedSleep>,
    /// Wakeup reasons to report, consumed in order
    pub scripted: VecDeque<WakeupReason>,
}

/// Mock HAL backed by a platform profile
pub struct MockSleepHal {
    profile: PlatformProfile,
    state: Arc<RwLock<MockSleepState>>,
}

impl MockSleepHal {
    pub fn new(profile: PlatformProfile) -> Self {
        Self {
            profile,
            state: Arc::new(RwLock::new(MockSleepState::default())),
        }
    }

    pub fn cellular() -> Self {
        Self::new(PlatformProfile::cellular())
    }

    pub fn wifi() -> Self {
        Self::new(PlatformProfile::wifi())
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// Shared handle to the mock state
    pub fn state(&self) -> Arc<RwLock<MockSleepState>> {
        Arc::clone(&self.state)
    }

    /// Queue the reason reported by the next successful `enter`
    pub fn script_wakeup(&self, reason: WakeupReason) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .scripted
            .push_back(reason);
    }

    /// Sleep requests accepted so far
    pub fn history(&self) -> Vec<RecordedSleep> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .history
            .clone()
    }

    /// Walk the flat image the way a real HAL would, by record headers
    fn record(config: &SleepConfigDescriptor) -> Result<RecordedSleep, HalError> {
        let bytes = image::encode(config);
        let view = ImageView::parse(&bytes)?;
        let mut sources = Vec::new();
        let mut skipped = 0;
        for raw in view.sources() {
            match raw?.decode()? {
                Some(payload) => sources.push(payload),
                None => skipped += 1,
            }
        }
        Ok(RecordedSleep {
            mode: view.mode,
            flags: view.flags,
            sources,
            skipped,
            image_len: bytes.len(),
        })
    }

    /// Reason reported when nothing is scripted: the timer if configured,
    /// else the newest source
    fn default_reason(sources: &[WakeupPayload]) -> WakeupReason {
        if sources.iter().any(|s| s.kind() == WakeupSourceKind::Timer) {
            return WakeupReason::Timer;
        }
        match sources.first() {
            Some(WakeupPayload::Gpio { pin, .. }) => WakeupReason::Gpio { pin: *pin },
            Some(WakeupPayload::Network { index }) => WakeupReason::Network { index: *index },
            Some(WakeupPayload::RadioLink) => WakeupReason::RadioLink,
            Some(WakeupPayload::Timer { .. }) => WakeupReason::Timer,
            None => WakeupReason::Unknown,
        }
    }
}

impl SleepHal for MockSleepHal {
    fn enter(&mut self, config: &SleepConfigDescriptor) -> Result<WakeupReason, HalError> {
        self.profile.check(config)?;
        let recorded = Self::record(config)?;
        tracing::debug!(
            "Mock {} sleep accepted: {} source(s), {} byte image",
            recorded.mode,
            recorded.sources.len(),
            recorded.image_len
        );

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let reason = state
            .scripted
            .pop_front()
            .unwrap_or_else(|| Self::default_reason(&recorded.sources));
        state.history.push(recorded);
        Ok(reason)
    }
}

#[derive(Debug, Default)]
struct AllocStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
    attempts: AtomicUsize,
    /// 1-based attempt number from which every acquisition fails
    fail_from: Option<usize>,
}

/// Allocator that counts records and can simulate exhaustion
#[derive(Debug, Clone, Default)]
pub struct CountingAllocator {
    stats: Arc<AllocStats>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `attempt`-th acquisition and every one after it
    pub fn failing_at(attempt: usize) -> Self {
        Self {
            stats: Arc::new(AllocStats {
                fail_from: Some(attempt),
                ..AllocStats::default()
            }),
        }
    }

    /// Successful acquisitions
    pub fn acquired(&self) -> usize {
        self.stats.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }

    /// Acquisition attempts, failed ones included
    pub fn attempts(&self) -> usize {
        self.stats.attempts.load(Ordering::SeqCst)
    }

    /// Records currently alive
    pub fn live(&self) -> usize {
        self.acquired() - self.released()
    }
}

impl NodeAllocator for CountingAllocator {
    fn acquire(&self, kind: WakeupSourceKind) -> Result<(), AllocError> {
        let attempt = self.stats.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.stats.fail_from.is_some_and(|n| attempt >= n) {
            return Err(AllocError { kind });
        }
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self, kind: WakeupSourceKind) {
        let released = self.stats.released.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(
            released <= self.acquired(),
            "{} wakeup source released more often than acquired",
            kind
        );
    }
}
