//! Consumer Control HID support - page keys, AC Back and Power.
//!
//! Consumer Control is a separate HID usage page (0x0C). Reading apps
//! map volume keys to page turns, so a page turner only ever needs a
//! handful of usages:
//! - Volume Increment / Decrement (page turns)
//! - AC Back
//! - Power

/// Consumer control report size (2 bytes for usage ID).
pub const CONSUMER_REPORT_SIZE: usize = 2;

/// Consumer control usage codes (Usage Page 0x0C) sent by the turner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ConsumerUsage {
    /// No action (key release).
    None = 0x0000,
    /// Power (HUT 1.21 p.118).
    Power = 0x0030,
    /// Volume increment; forward in Kinoppy.
    VolumeIncrement = 0x00E9,
    /// Volume decrement; forward in Reader and Kindle.
    VolumeDecrement = 0x00EA,
    /// AC Back (HUT 1.21 p.124).
    AcBack = 0x0224,
}

/// Consumer Control HID report.
///
/// Simple 2-byte report containing a single usage code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerReport {
    /// Active consumer control usage (little-endian u16).
    pub usage: u16,
}

impl ConsumerReport {
    /// The all-released report that must follow every press.
    pub const fn release() -> Self {
        Self { usage: 0 }
    }

    /// Create a report with a single usage.
    pub const fn new(usage: ConsumerUsage) -> Self {
        Self {
            usage: usage as u16,
        }
    }

    /// Serialize to HID report bytes.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < CONSUMER_REPORT_SIZE {
            return 0;
        }
        buf[..CONSUMER_REPORT_SIZE].copy_from_slice(&self.usage.to_le_bytes());
        CONSUMER_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; CONSUMER_REPORT_SIZE] {
        self.usage.to_le_bytes()
    }
}
