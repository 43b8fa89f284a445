//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and calibration
//! constants live here so they can be tuned in one place.

use crate::battery::BatteryCalibration;
use crate::hid::mouse::CenterTapGesture;

// BLE

/// GAP device name shown on the reader while pairing.
pub const BLE_DEVICE_NAME: &str = "PageTurner";

/// How long to advertise before giving up and sleeping (seconds).
pub const ADVERTISING_TIMEOUT_SECS: u64 = 60;

/// Advertising poll tick (ms). Connection and Back/Power are checked once per tick.
pub const ADVERTISING_TICK_MS: u32 = 100;

/// Length of one advertising blink (ms), out of each tick.
pub const ADVERTISING_BLINK_MS: u32 = 20;

/// Keep-alive timer for the connected low-power wait (seconds).
pub const KEEP_ALIVE_SECS: u64 = 60;

// Input

/// Back/Power must stay asserted this long to become Power Off (ms).
pub const LONG_PRESS_MS: u32 = 500;

// GPIO pin assignments (XIAO nRF52840 Sense)
//
// Each button is wired to two pads: one polled, one used as wake source.
//
//   Forward     → D3 (poll, internal pull-up)  + D4 (wake)
//   Reverse     → D8 (poll, internal pull-up)  + D9 (wake)
//   Back/Power  → D5 (poll, external 100k)     + D6 (wake)
//   Mode swap   → D7 (external 100k; held low = Kinoppy)
//   Tap INT1    → IMU_INT1 (P0.11)
//   Charge stat → P0.17 (low = charging)
//   VBAT enable → P0.14 (must be low on battery)
//   Charge mode → P0.13 (low = 100 mA)
//   VBAT sense  → P0.31 / AIN7
//   LEDs        → red P0.26, green P0.30, blue P0.06, external D0 (anode on D1)

// Indicators

/// Activity LED hold after a dispatched command (ms).
pub const DISPATCH_BLINK_MS: u32 = 200;

/// Per-channel step of the farewell sweep before deep sleep (ms).
pub const SLEEP_SWEEP_STEP_MS: u32 = 100;

// Battery

/// Settling time after pulling the VBAT-sense enable low (ms).
pub const BATTERY_GUARD_SETTLE_MS: u32 = 100;

/// Declared Li-Po capacity; selects the charge current at boot (mAh).
pub const BATTERY_CAPACITY_MAH: u32 = 600;

/// Capacity at or above which the 100 mA charge mode is safe (0.2C).
pub const HIGH_CHARGE_MIN_CAPACITY_MAH: u32 = 500;

/// Raw SAADC count measured at an empty cell (≈2.5 V).
pub const BATTERY_EMPTY_RAW: u16 = 21400;

/// Raw SAADC count measured at a full cell (≈3.7 V).
pub const BATTERY_FULL_RAW: u16 = 23900;

/// Below this percentage the low-battery LED is lit.
pub const LOW_BATTERY_PERCENT: u8 = 20;

/// ADC reference (mV) for a 16-bit full-scale reading.
pub const ADC_REFERENCE_MV: u32 = 3300;

/// VBAT divider: (1M + 510k) / 510k.
pub const VBAT_DIVIDER_NUM: u32 = 1510;
pub const VBAT_DIVIDER_DEN: u32 = 510;

/// Tap sensor register settings (LSM6DS3TR-C) for double-tap on INT1.
///
/// Values are raw register bytes; see the ST datasheet for bit layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapSensorConfig {
    /// CTRL1_XL (0x10): accelerometer ODR and full scale.
    /// 0x58 = 208 Hz, ±4 g. ODR drives both latency and current.
    pub ctrl1_xl: u8,
    /// TAP_CFG (0x58): interrupt enable and tap axes.
    /// 0x8E = interrupts on, X/Y/Z tap enabled, not latched.
    pub tap_cfg: u8,
    /// TAP_THS_6D (0x59): tap threshold in 1/32 of full scale.
    /// 0x0A = 10/32 (≈1.25 g at ±4 g).
    pub tap_ths_6d: u8,
    /// INT_DUR2 (0x5A): double-tap gap, quiet and shock windows.
    pub int_dur2: u8,
    /// WAKE_UP_THS (0x5B): single+double tap enable and wake threshold.
    pub wake_up_ths: u8,
    /// MD1_CFG (0x5E): INT1 routing. 0x08 = double tap only.
    pub md1_cfg: u8,
}

impl Default for TapSensorConfig {
    fn default() -> Self {
        Self {
            ctrl1_xl: 0x58,
            tap_cfg: 0x8E,
            tap_ths_6d: 0x0A,
            int_dur2: 0x3A,
            wake_up_ths: 0x88,
            md1_cfg: 0x08,
        }
    }
}

/// Runtime-tunable settings handed to the power state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnerConfig {
    pub advertising_timeout_secs: u64,
    pub advertising_tick_ms: u32,
    pub advertising_blink_ms: u32,
    pub keep_alive_secs: u64,
    pub long_press_ms: u32,
    pub dispatch_blink_ms: u32,
    pub sleep_sweep_step_ms: u32,
    pub battery_guard_settle_ms: u32,
    pub battery_capacity_mah: u32,
    pub battery: BatteryCalibration,
    pub tap_sensor: TapSensorConfig,
    pub center_tap: CenterTapGesture,
}

impl TurnerConfig {
    /// Number of advertising ticks before the timeout fires.
    pub fn advertising_ticks(&self) -> u32 {
        let tick = self.advertising_tick_ms.max(1) as u64;
        (self.advertising_timeout_secs * 1000 / tick) as u32
    }
}

impl Default for TurnerConfig {
    fn default() -> Self {
        Self {
            advertising_timeout_secs: ADVERTISING_TIMEOUT_SECS,
            advertising_tick_ms: ADVERTISING_TICK_MS,
            advertising_blink_ms: ADVERTISING_BLINK_MS,
            keep_alive_secs: KEEP_ALIVE_SECS,
            long_press_ms: LONG_PRESS_MS,
            dispatch_blink_ms: DISPATCH_BLINK_MS,
            sleep_sweep_step_ms: SLEEP_SWEEP_STEP_MS,
            battery_guard_settle_ms: BATTERY_GUARD_SETTLE_MS,
            battery_capacity_mah: BATTERY_CAPACITY_MAH,
            battery: BatteryCalibration::default(),
            tap_sensor: TapSensorConfig::default(),
            center_tap: CenterTapGesture::default(),
        }
    }
}
