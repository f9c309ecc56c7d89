//! Wakeup source registry
//!
//! Holds at most one record per logical key: one per GPIO pin, one per network
//! interface, one timer, one radio link. Inserting a key that is already
//! present updates the existing record instead of adding a second one.
//!
//! Records are traversed newest first. Storage is a vector with the newest
//! record at the back, so a [`SourceId`] stays stable until the registry is
//! released.

use crate::wakeup::{
    InterruptMode, NetworkInterfaceIndex, Pin, WakeupPayload, WakeupSource, WakeupSourceKind,
};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Allocating a wakeup source record failed
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("failed to allocate {kind} wakeup source")]
pub struct AllocError {
    pub kind: WakeupSourceKind,
}

/// Accounting hook consulted for every record the registry creates or frees
pub trait NodeAllocator: fmt::Debug + Send + Sync {
    /// Called before a new record is stored
    fn acquire(&self, kind: WakeupSourceKind) -> Result<(), AllocError>;

    /// Called exactly once for every record that was acquired
    fn release(&self, kind: WakeupSourceKind);
}

/// Default allocator; storage failures are detected by the registry itself
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl NodeAllocator for SystemAllocator {
    fn acquire(&self, _kind: WakeupSourceKind) -> Result<(), AllocError> {
        Ok(())
    }

    fn release(&self, _kind: WakeupSourceKind) {}
}

/// Position of a record inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

/// Owned collection of wakeup source records
pub struct WakeupSourceRegistry {
    nodes: Vec<WakeupSource>,
    allocator: Arc<dyn NodeAllocator>,
}

impl WakeupSourceRegistry {
    /// Create an empty registry backed by the system allocator
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(SystemAllocator))
    }

    /// Create an empty registry with a custom allocator
    pub fn with_allocator(allocator: Arc<dyn NodeAllocator>) -> Self {
        Self {
            nodes: Vec::new(),
            allocator,
        }
    }

    pub fn allocator(&self) -> Arc<dyn NodeAllocator> {
        Arc::clone(&self.allocator)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate records newest first
    pub fn iter(&self) -> impl Iterator<Item = &WakeupSource> + '_ {
        self.nodes.iter().rev()
    }

    /// Most recently inserted record, if any
    pub fn head(&self) -> Option<(SourceId, &WakeupSource)> {
        self.nodes
            .len()
            .checked_sub(1)
            .map(|index| (SourceId(index), &self.nodes[index]))
    }

    /// First record of `kind` in traversal order
    pub fn find(&self, kind: WakeupSourceKind) -> Option<(SourceId, &WakeupSource)> {
        self.scan(kind, self.nodes.len())
    }

    /// Continue a scan for `kind` with the record after `after`
    pub fn find_after(
        &self,
        kind: WakeupSourceKind,
        after: SourceId,
    ) -> Option<(SourceId, &WakeupSource)> {
        self.scan(kind, after.0.min(self.nodes.len()))
    }

    fn scan(&self, kind: WakeupSourceKind, end: usize) -> Option<(SourceId, &WakeupSource)> {
        self.nodes[..end]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, node)| node.kind() == kind)
            .map(|(index, node)| (SourceId(index), node))
    }

    /// Record at `id`
    pub fn get(&self, id: SourceId) -> Option<&WakeupSource> {
        self.nodes.get(id.0)
    }

    /// Configured GPIO pins with their trigger modes
    pub fn gpio_pins(&self) -> impl Iterator<Item = (Pin, InterruptMode)> + '_ {
        self.iter().filter_map(|node| match *node.payload() {
            WakeupPayload::Gpio { pin, mode } => Some((pin, mode)),
            _ => None,
        })
    }

    /// Network interfaces registered as wakeup sources
    pub fn network_interfaces(&self) -> impl Iterator<Item = NetworkInterfaceIndex> + '_ {
        self.iter().filter_map(|node| match *node.payload() {
            WakeupPayload::Network { index } => Some(index),
            _ => None,
        })
    }

    /// Configured timer duration in milliseconds
    pub fn timer(&self) -> Option<u32> {
        self.iter().find_map(|node| match *node.payload() {
            WakeupPayload::Timer { ms } => Some(ms),
            _ => None,
        })
    }

    /// Add a GPIO wakeup, or change the trigger mode of an existing one
    pub fn insert_or_update_gpio(&mut self, pin: Pin, mode: InterruptMode) -> Result<(), AllocError> {
        for node in self.nodes.iter_mut().rev() {
            if let WakeupPayload::Gpio { pin: existing, mode: current } = node.payload_mut() {
                if *existing == pin {
                    tracing::debug!("Updating GPIO {} wakeup to {}", pin, mode.as_str());
                    *current = mode;
                    return Ok(());
                }
            }
        }
        self.allocate(WakeupPayload::Gpio { pin, mode })
    }

    /// Set the timer wakeup; there is never more than one
    pub fn insert_or_update_timer(&mut self, ms: u32) -> Result<(), AllocError> {
        for node in self.nodes.iter_mut().rev() {
            if let WakeupPayload::Timer { ms: current } = node.payload_mut() {
                tracing::debug!("Updating timer wakeup to {} ms", ms);
                *current = ms;
                return Ok(());
            }
        }
        self.allocate(WakeupPayload::Timer { ms })
    }

    /// Add a network interface wakeup unless that interface is already present
    pub fn insert_or_update_network(
        &mut self,
        index: NetworkInterfaceIndex,
    ) -> Result<(), AllocError> {
        if self.network_interfaces().any(|existing| existing == index) {
            return Ok(());
        }
        self.allocate(WakeupPayload::Network { index })
    }

    /// Add the radio link wakeup unless it is already present
    pub fn insert_radio_link_if_absent(&mut self) -> Result<(), AllocError> {
        if self.find(WakeupSourceKind::RadioLink).is_some() {
            return Ok(());
        }
        self.allocate(WakeupPayload::RadioLink)
    }

    fn allocate(&mut self, payload: WakeupPayload) -> Result<(), AllocError> {
        let kind = payload.kind();
        self.allocator.acquire(kind)?;
        if self.nodes.try_reserve(1).is_err() {
            self.allocator.release(kind);
            return Err(AllocError { kind });
        }
        self.nodes.push(WakeupSource::new(payload));
        tracing::debug!("Added {} wakeup source ({} total)", kind, self.nodes.len());
        Ok(())
    }

    /// Release every record. Calling this on an empty registry does nothing.
    pub fn release_all(&mut self) {
        for node in self.nodes.drain(..) {
            self.allocator.release(node.kind());
        }
    }
}

impl Default for WakeupSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WakeupSourceRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for WakeupSourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Serialize for WakeupSourceRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
