//! Unified error type for page-turner.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A board peripheral failed in a way that cannot be retried.
    Peripheral(PeripheralFault),

    /// The BLE session reported a failure.
    Ble(BleError),

    /// The tap sensor rejected its configuration or stopped answering.
    Sensor,
}

/// Peripheral failures. All of them end in a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralFault {
    /// I²C transaction failed.
    Bus,
    /// SAADC conversion failed.
    Adc,
    /// A GPIO could not be configured.
    Gpio,
    /// Raw error code from the SoftDevice.
    SoftDevice(u32),
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// No peer is connected; the report had nowhere to go.
    NotConnected,
    /// Advertising could not start.
    AdvertiseFailed,
    /// Characteristic notify failed.
    NotifyFailed,
    /// GAP / GATT raw error code from the SoftDevice.
    Raw(u32),
}

impl Error {
    /// Whether the only safe recovery is a full restart.
    ///
    /// A vanished peer is a state change, not a fault.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Ble(BleError::NotConnected))
    }
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl From<PeripheralFault> for Error {
    fn from(e: PeripheralFault) -> Self {
        Error::Peripheral(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lost_peer_is_recoverable() {
        assert!(!Error::Ble(BleError::NotConnected).is_fatal());
        assert!(Error::Ble(BleError::NotifyFailed).is_fatal());
        assert!(Error::Ble(BleError::Raw(8)).is_fatal());
        assert!(Error::Peripheral(PeripheralFault::Adc).is_fatal());
        assert!(Error::Sensor.is_fatal());
    }

    #[test]
    fn conversions_wrap_the_right_variant() {
        assert_eq!(Error::from(BleError::AdvertiseFailed), Error::Ble(BleError::AdvertiseFailed));
        assert_eq!(
            Error::from(PeripheralFault::Bus),
            Error::Peripheral(PeripheralFault::Bus)
        );
    }
}
