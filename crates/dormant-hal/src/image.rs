//! Flat descriptor image
//!
//! The layout handed across the HAL boundary. All fields are little endian.
//!
//! ```text
//! descriptor: size:u16 version:u16 mode:u8 reserved:[u8; 3] flags:u32 sources_len:u32
//! record:     kind:u16 version:u16 size:u16 reserved:u16 payload...
//! ```
//!
//! Readers walk the record area using each record's `size`, so records of a
//! kind they do not know about are skipped rather than misread.

use crate::config::{DESCRIPTOR_SIZE, SleepConfigDescriptor};
use crate::mode::{SleepFlags, SleepMode};
use crate::wakeup::{
    InterruptMode, NetworkInterfaceIndex, RECORD_HEADER_SIZE, WakeupPayload, WakeupSourceKind,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("descriptor size {0} is smaller than the fixed header")]
    BadDescriptorSize(u16),

    #[error("record size {0} is smaller than the record header")]
    BadRecordSize(u16),

    #[error("unknown sleep mode {0}")]
    UnknownMode(u8),

    #[error("unknown interrupt mode {0}")]
    UnknownInterruptMode(u8),

    #[error("{kind} record payload too short: {len} bytes")]
    ShortPayload { kind: WakeupSourceKind, len: usize },
}

/// Serialize a descriptor into its flat image
pub fn encode(config: &SleepConfigDescriptor) -> Vec<u8> {
    let sources: Vec<u8> = config
        .wakeup_sources()
        .iter()
        .flat_map(|node| {
            let header = node.header();
            let mut record = Vec::with_capacity(header.size as usize);
            record.extend_from_slice(&header.kind.as_raw().to_le_bytes());
            record.extend_from_slice(&header.version.to_le_bytes());
            record.extend_from_slice(&header.size.to_le_bytes());
            record.extend_from_slice(&[0, 0]);
            encode_payload(node.payload(), &mut record);
            record
        })
        .collect();

    let mut image = Vec::with_capacity(DESCRIPTOR_SIZE as usize + sources.len());
    image.extend_from_slice(&config.size().to_le_bytes());
    image.extend_from_slice(&config.version().to_le_bytes());
    image.push(config.mode().as_raw());
    image.extend_from_slice(&[0, 0, 0]);
    image.extend_from_slice(&config.flags().bits().to_le_bytes());
    image.extend_from_slice(&(sources.len() as u32).to_le_bytes());
    image.extend_from_slice(&sources);
    image
}

fn encode_payload(payload: &WakeupPayload, out: &mut Vec<u8>) {
    match *payload {
        WakeupPayload::Gpio { pin, mode } => {
            out.extend_from_slice(&pin.to_le_bytes());
            out.push(mode as u8);
            out.push(0);
        }
        WakeupPayload::Timer { ms } => out.extend_from_slice(&ms.to_le_bytes()),
        WakeupPayload::Network { index } => out.extend_from_slice(&[index.0, 0, 0, 0]),
        WakeupPayload::RadioLink => {}
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn ensure(bytes: &[u8], needed: usize) -> Result<(), ImageError> {
    if bytes.len() < needed {
        return Err(ImageError::Truncated {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

/// Parsed view over an image
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub size: u16,
    pub version: u16,
    pub mode: SleepMode,
    /// Unknown flag bits are preserved
    pub flags: SleepFlags,
    sources: &'a [u8],
}

impl<'a> ImageView<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ImageError> {
        ensure(bytes, DESCRIPTOR_SIZE as usize)?;
        let size = read_u16(bytes, 0);
        if size < DESCRIPTOR_SIZE {
            return Err(ImageError::BadDescriptorSize(size));
        }
        let version = read_u16(bytes, 2);
        let mode = SleepMode::from_raw(bytes[4]).ok_or(ImageError::UnknownMode(bytes[4]))?;
        let flags = SleepFlags::from_bits_retain(read_u32(bytes, 8));
        let sources_len = read_u32(bytes, 12) as usize;

        // A newer writer may have grown the descriptor header
        let start = size as usize;
        ensure(bytes, start + sources_len)?;

        Ok(Self {
            size,
            version,
            mode,
            flags,
            sources: &bytes[start..start + sources_len],
        })
    }

    pub fn sources(&self) -> WakeupSourceCursor<'a> {
        WakeupSourceCursor {
            remaining: self.sources,
        }
    }
}

/// A record as found in the image, before interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWakeupSource<'a> {
    pub kind: u16,
    pub version: u16,
    pub size: u16,
    pub payload: &'a [u8],
}

impl RawWakeupSource<'_> {
    /// Decode the payload; `Ok(None)` for kinds this build does not know
    pub fn decode(&self) -> Result<Option<WakeupPayload>, ImageError> {
        let Some(kind) = WakeupSourceKind::from_raw(self.kind) else {
            return Ok(None);
        };
        let p = self.payload;
        if p.len() < kind.payload_size() as usize {
            return Err(ImageError::ShortPayload { kind, len: p.len() });
        }
        let payload = match kind {
            WakeupSourceKind::Gpio => WakeupPayload::Gpio {
                pin: read_u16(p, 0),
                mode: InterruptMode::from_raw(p[2]).ok_or(ImageError::UnknownInterruptMode(p[2]))?,
            },
            WakeupSourceKind::Timer => WakeupPayload::Timer { ms: read_u32(p, 0) },
            WakeupSourceKind::Network => WakeupPayload::Network {
                index: NetworkInterfaceIndex(p[0]),
            },
            WakeupSourceKind::RadioLink => WakeupPayload::RadioLink,
        };
        Ok(Some(payload))
    }
}

/// Walks the record area record by record. Stops after the first error.
#[derive(Debug, Clone)]
pub struct WakeupSourceCursor<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for WakeupSourceCursor<'a> {
    type Item = Result<RawWakeupSource<'a>, ImageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let bytes = self.remaining;
        let result = ensure(bytes, RECORD_HEADER_SIZE as usize).and_then(|()| {
            let size = read_u16(bytes, 4);
            if size < RECORD_HEADER_SIZE {
                return Err(ImageError::BadRecordSize(size));
            }
            ensure(bytes, size as usize)?;
            Ok(RawWakeupSource {
                kind: read_u16(bytes, 0),
                version: read_u16(bytes, 2),
                size,
                payload: &bytes[RECORD_HEADER_SIZE as usize..size as usize],
            })
        });
        self.remaining = match &result {
            Ok(record) => &bytes[record.size as usize..],
            Err(_) => &[],
        };
        Some(result)
    }
}
