//! LSM6DS3TR-C double-tap detection over I2C.
//!
//! Only the registers the tap path needs. INT1 itself is a wake pad owned
//! by [`XiaoBoard`](super::XiaoBoard); this driver reads TAP_SRC to confirm
//! and clear a tap.

use defmt::{info, warn};
use embassy_nrf::gpio::Output;
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::{self, Twim};
use embassy_time::Timer;

use page_turner::config::TapSensorConfig;
use page_turner::error::PeripheralFault;
use page_turner::input::{Level, TapSensor, TAP_POLARITY};
use page_turner::Error;

const ADDRESS: u8 = 0x6A;

const WHO_AM_I: u8 = 0x0F;
const WHO_AM_I_VALUE: u8 = 0x6A;
const CTRL1_XL: u8 = 0x10;
const CTRL3_C: u8 = 0x12;
const CTRL6_C: u8 = 0x15;
const CTRL7_G: u8 = 0x16;
const TAP_SRC: u8 = 0x1C;
const TAP_CFG: u8 = 0x58;
const TAP_THS_6D: u8 = 0x59;
const INT_DUR2: u8 = 0x5A;
const WAKE_UP_THS: u8 = 0x5B;
const MD1_CFG: u8 = 0x5E;

const SW_RESET: u8 = 1 << 0;
/// Accelerometer high-performance mode disable.
const XL_HM_MODE: u8 = 1 << 4;
/// Gyroscope high-performance mode disable.
const G_HM_MODE: u8 = 1 << 7;
const DOUBLE_TAP: u8 = 1 << 4;

const POWER_UP_MS: u64 = 100;

pub struct Lsm6ds3Tap {
    twim: Twim<'static, TWISPI0>,
    power: Output<'static>,
}

fn bus_fault(e: twim::Error) -> Error {
    warn!("IMU bus error: {}", e);
    PeripheralFault::Bus.into()
}

impl Lsm6ds3Tap {
    pub fn new(twim: Twim<'static, TWISPI0>, power: Output<'static>) -> Self {
        Self { twim, power }
    }

    async fn read(&mut self, reg: u8) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.twim
            .write_read(ADDRESS, &[reg], &mut buf)
            .await
            .map_err(bus_fault)?;
        Ok(buf[0])
    }

    async fn write(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.twim
            .write(ADDRESS, &[reg, value])
            .await
            .map_err(bus_fault)
    }

    async fn set_bits(&mut self, reg: u8, bits: u8) -> Result<(), Error> {
        let value = self.read(reg).await?;
        self.write(reg, value | bits).await
    }
}

impl TapSensor for Lsm6ds3Tap {
    async fn configure(&mut self, config: &TapSensorConfig) -> Result<(), Error> {
        self.power.set_high();
        Timer::after_millis(POWER_UP_MS).await;

        let id = self.read(WHO_AM_I).await?;
        if id != WHO_AM_I_VALUE {
            warn!("IMU: unexpected WHO_AM_I {=u8:#x}", id);
            return Err(Error::Sensor);
        }

        self.set_bits(CTRL3_C, SW_RESET).await?;
        Timer::after_millis(1).await;
        self.set_bits(CTRL6_C, XL_HM_MODE).await?;
        self.set_bits(CTRL7_G, G_HM_MODE).await?;

        self.write(CTRL1_XL, config.ctrl1_xl).await?;
        self.write(TAP_CFG, config.tap_cfg).await?;
        self.write(TAP_THS_6D, config.tap_ths_6d).await?;
        self.write(INT_DUR2, config.int_dur2).await?;
        self.write(WAKE_UP_THS, config.wake_up_ths).await?;
        self.write(MD1_CFG, config.md1_cfg).await?;
        info!("IMU: double tap on INT1");
        Ok(())
    }

    async fn tap_level(&mut self) -> Level {
        match self.read(TAP_SRC).await {
            Ok(src) if src & DOUBLE_TAP != 0 => TAP_POLARITY.active(),
            Ok(_) => TAP_POLARITY.idle(),
            // A lost read is a missed tap, not a fault.
            Err(_) => TAP_POLARITY.idle(),
        }
    }

    async fn power_down(&mut self) -> Result<(), Error> {
        self.write(CTRL1_XL, 0).await
    }
}
