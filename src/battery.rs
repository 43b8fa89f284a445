//! Battery guard - VBAT conversion, charge status and charge-current mode.
//!
//! The charge-status line is shared between polling (here) and the sleep
//! wake-source setup. The guard owns it; the sleep call borrows it
//! mutably for the duration of the wait, so only one role is armed at a
//! time.

use crate::config;

/// Board/battery-specific calibration for the VBAT reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryCalibration {
    /// Raw count at 0 % (≈2.5 V).
    pub empty_raw: u16,
    /// Raw count at 100 % (≈3.7 V).
    pub full_raw: u16,
    /// Percentages strictly below this raise the low-battery flag.
    pub low_percent: u8,
    /// ADC reference for a 16-bit full-scale reading (mV).
    pub reference_mv: u32,
    pub divider_num: u32,
    pub divider_den: u32,
}

impl Default for BatteryCalibration {
    fn default() -> Self {
        Self {
            empty_raw: config::BATTERY_EMPTY_RAW,
            full_raw: config::BATTERY_FULL_RAW,
            low_percent: config::LOW_BATTERY_PERCENT,
            reference_mv: config::ADC_REFERENCE_MV,
            divider_num: config::VBAT_DIVIDER_NUM,
            divider_den: config::VBAT_DIVIDER_DEN,
        }
    }
}

impl BatteryCalibration {
    /// Cell voltage estimate. Linear only while Vdd stays above 3.3 V.
    pub fn millivolts(&self, raw: u16) -> u32 {
        let num = raw as u64 * self.reference_mv as u64 * self.divider_num as u64;
        let den = 65536u64 * self.divider_den.max(1) as u64;
        (num / den) as u32
    }

    /// Linear charge estimate between the calibration points, clamped to 0..=100.
    pub fn percent(&self, raw: u16) -> u8 {
        let span = self.full_raw as i32 - self.empty_raw as i32;
        if span <= 0 {
            return if raw >= self.full_raw { 100 } else { 0 };
        }
        let pc = 100 * (raw as i32 - self.empty_raw as i32) / span;
        pc.clamp(0, 100) as u8
    }
}

/// One VBAT sample, valid for the current cycle only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    pub raw: u16,
    pub millivolts: u32,
    pub percent: u8,
    pub low: bool,
}

/// Charge controller status as seen on the status line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeState {
    NotCharging,
    Charging,
    /// The line could not be read this time.
    #[default]
    Unknown,
}

impl ChargeState {
    pub fn is_charging(self) -> bool {
        self == ChargeState::Charging
    }
}

/// Charge current limit of the on-board charger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeMode {
    /// ≈100 mA.
    High,
    /// ≈50 mA.
    Low,
}

impl ChargeMode {
    pub fn current_ma(self) -> u16 {
        match self {
            ChargeMode::High => 100,
            ChargeMode::Low => 50,
        }
    }
}

/// 0.2C rule: 100 mA only for cells of 500 mAh or more.
///
/// The charger latch resets on deep sleep, so this is reapplied at every boot.
pub fn recommend_charge_mode(capacity_mah: u32) -> ChargeMode {
    if capacity_mah >= config::HIGH_CHARGE_MIN_CAPACITY_MAH {
        ChargeMode::High
    } else {
        ChargeMode::Low
    }
}

/// Raw VBAT conversion, scaled to 16 bits (0..=65535).
#[allow(async_fn_in_trait)]
pub trait BatteryAdc {
    async fn read_raw(&mut self) -> u16;
}

/// The charge-status line in both of its roles.
#[allow(async_fn_in_trait)]
pub trait ChargeLine {
    /// Configure as input, read once, release.
    fn sample(&mut self) -> ChargeState;

    /// Arm as an edge source and wait until the line reports `target`.
    /// The line is released again before this returns.
    async fn wait_for(&mut self, target: ChargeState);
}

/// Owns the VBAT ADC and the charge-status line.
pub struct BatteryGuard<A, C> {
    adc: A,
    charge: C,
    calibration: BatteryCalibration,
}

impl<A: BatteryAdc, C: ChargeLine> BatteryGuard<A, C> {
    pub fn new(adc: A, charge: C, calibration: BatteryCalibration) -> Self {
        Self {
            adc,
            charge,
            calibration,
        }
    }

    /// Convert a raw count. Pure; no hardware access.
    pub fn read(&self, raw: u16) -> BatteryReading {
        let percent = self.calibration.percent(raw);
        BatteryReading {
            raw,
            millivolts: self.calibration.millivolts(raw),
            percent,
            low: percent < self.calibration.low_percent,
        }
    }

    /// Sample the ADC and convert.
    pub async fn measure(&mut self) -> BatteryReading {
        let raw = self.adc.read_raw().await;
        let reading = self.read(raw);
        info!(
            "VBATT: raw={} {}mV {}%",
            reading.raw, reading.millivolts, reading.percent
        );
        reading
    }

    /// One instantaneous read of the charge-status line.
    pub fn charge_state(&mut self) -> ChargeState {
        let state = self.charge.sample();
        info!("Charge state: {}", state);
        state
    }

    pub fn recommend_charge_mode(&self, capacity_mah: u32) -> ChargeMode {
        recommend_charge_mode(capacity_mah)
    }

    /// Lend the charge line to the sleep primitive.
    pub fn charge_line(&mut self) -> &mut C {
        &mut self.charge
    }
}
