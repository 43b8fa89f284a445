//! Seeed XIAO nRF52840 Sense: pin map, peripherals and the sleep primitive.
//!
//! The hardware traits of the lib are implemented here; see
//! `page_turner::config` for the wiring.

pub mod buttons;
pub mod charge;
pub mod imu;
pub mod leds;
pub mod vbat;

use core::future::{pending, Future};

use defmt::debug;
use embassy_futures::select::{select, select4, Either, Either4};
use embassy_nrf::gpio::{Flex, Input, Level, Output, OutputDrive, Pin, Pull};
use embassy_nrf::{bind_interrupts, peripherals, saadc, twim, Peripherals};
use embassy_time::{Delay, Timer};

use page_turner::battery::{ChargeLine, ChargeMode};
use page_turner::{Board, Error, Platform, WakeSet, WakeSource};

use crate::ble::BleSession;

use self::buttons::Buttons;
use self::charge::ChargeStatus;
use self::imu::Lsm6ds3Tap;
use self::leds::Leds;
use self::vbat::VbatAdc;

bind_interrupts!(pub struct Irqs {
    SAADC => saadc::InterruptHandler;
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

/// Type bundle the power state machine runs on.
pub struct Xiao;

impl Platform for Xiao {
    type Session = BleSession;
    type Indicator = Leds;
    type Board = XiaoBoard;
    type Buttons = Buttons;
    type Tap = Lsm6ds3Tap;
    type Adc = VbatAdc;
    type Charge = ChargeStatus;
    type Delay = Delay;
}

/// Dedicated wake pads, each wired in parallel with a polled button pad.
struct WakePads {
    forward: Input<'static>,
    reverse: Input<'static>,
    back_power: Input<'static>,
    tap: Input<'static>,
}

pub struct XiaoBoard {
    vbat_enable: Output<'static>,
    charge_mode: Flex<'static>,
    wake: WakePads,
}

async fn when_armed<F: Future>(armed: bool, wait: F, source: WakeSource) -> WakeSource {
    if armed {
        wait.await;
        source
    } else {
        pending().await
    }
}

impl Board for XiaoBoard {
    async fn protect_battery_sense(&mut self) -> Result<(), Error> {
        self.vbat_enable.set_low();
        Ok(())
    }

    async fn apply_charge_mode(&mut self, mode: ChargeMode) -> Result<(), Error> {
        match mode {
            ChargeMode::High => {
                self.charge_mode.set_low();
                self.charge_mode.set_as_output(OutputDrive::Standard);
            }
            ChargeMode::Low => self.charge_mode.set_as_disconnected(),
        }
        Ok(())
    }

    async fn sleep_until<C: ChargeLine>(
        &mut self,
        wakes: &WakeSet,
        charge_line: &mut C,
    ) -> Result<WakeSource, Error> {
        debug!("Sleep: {} wake sources", wakes.len());
        let pads = &mut self.wake;

        // Edges, not levels: a button still held from the previous
        // dispatch must not wake the device again.
        let inputs = select4(
            when_armed(
                wakes.contains(WakeSource::Forward),
                pads.forward.wait_for_falling_edge(),
                WakeSource::Forward,
            ),
            when_armed(
                wakes.contains(WakeSource::Reverse),
                pads.reverse.wait_for_falling_edge(),
                WakeSource::Reverse,
            ),
            when_armed(
                wakes.contains(WakeSource::BackPower),
                pads.back_power.wait_for_falling_edge(),
                WakeSource::BackPower,
            ),
            when_armed(
                wakes.contains(WakeSource::Tap),
                pads.tap.wait_for_rising_edge(),
                WakeSource::Tap,
            ),
        );

        let keep_alive = async {
            match wakes.keep_alive_secs() {
                Some(secs) => {
                    Timer::after_secs(secs).await;
                    WakeSource::KeepAlive { secs }
                }
                None => pending().await,
            }
        };

        let charge = async {
            match wakes.iter().find(|w| w.charge_target().is_some()) {
                Some(source) => {
                    if let Some(target) = source.charge_target() {
                        charge_line.wait_for(target).await;
                    }
                    source
                }
                None => pending().await,
            }
        };

        let woke = match select(inputs, select(keep_alive, charge)).await {
            Either::First(
                Either4::First(w) | Either4::Second(w) | Either4::Third(w) | Either4::Fourth(w),
            ) => w,
            Either::Second(Either::First(w) | Either::Second(w)) => w,
        };
        Ok(woke)
    }
}

/// Everything the state machine needs, built from the HAL singletons.
pub struct Parts {
    pub board: XiaoBoard,
    pub buttons: Buttons,
    pub tap: Lsm6ds3Tap,
    pub vbat: VbatAdc,
    pub charge: ChargeStatus,
    pub leds: Leds,
}

impl Parts {
    pub async fn new(p: Peripherals) -> Self {
        let board = XiaoBoard {
            vbat_enable: Output::new(p.P0_14, Level::Low, OutputDrive::Standard),
            charge_mode: Flex::new(p.P0_13),
            wake: WakePads {
                forward: Input::new(p.P0_04, Pull::Up),
                reverse: Input::new(p.P1_14, Pull::Up),
                back_power: Input::new(p.P1_11, Pull::None),
                tap: Input::new(p.P0_11, Pull::None),
            },
        };

        let buttons = Buttons::new(
            p.P0_29.degrade(),
            p.P1_13.degrade(),
            p.P0_05.degrade(),
            p.P1_12.degrade(),
        );

        let mut i2c_config = twim::Config::default();
        i2c_config.frequency = twim::Frequency::K400;
        let twim = twim::Twim::new(p.TWISPI0, Irqs, p.P0_07, p.P0_27, i2c_config);
        let imu_power = Output::new(p.P1_08, Level::Low, OutputDrive::HighDrive);
        let tap = Lsm6ds3Tap::new(twim, imu_power);

        let vbat = VbatAdc::new(p.SAADC, p.P0_31).await;
        let charge = ChargeStatus::new(Flex::new(p.P0_17));

        let leds = Leds::new(
            p.P0_26.degrade(),
            p.P0_30.degrade(),
            p.P0_06.degrade(),
            p.P0_02.degrade(),
            p.P0_03.degrade(),
        );

        Self {
            board,
            buttons,
            tap,
            vbat,
            charge,
            leds,
        }
    }
}
