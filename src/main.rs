//! page-turner - BLE HID e-book page turner for the XIAO nRF52840 Sense.
//!
//! Three buttons, a mode switch and an optional double tap become consumer
//! keys (page forward/back, back, power) or a center-screen mouse click on
//! the paired reader. Between presses the device idles with the radio link
//! kept alive; after a timeout or a long Back press it disconnects and
//! sleeps until the power button or the charger wakes it, then resets.
//!
//! Hardware: Seeed XIAO nRF52840 Sense (SoftDevice S140 flashed)

#![no_std]
#![no_main]

mod ble;
mod board;

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_time::{Delay, Timer};
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use page_turner::config::BLE_DEVICE_NAME;
use page_turner::{BatteryGuard, InputSourceAdapter, PowerStateMachine, TurnerConfig};

use crate::ble::server::Server;
use crate::ble::BleSession;
use crate::board::{Parts, Xiao};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("page-turner v{} booting", env!("CARGO_PKG_VERSION"));

    // Priorities 0, 1 and 4 belong to the SoftDevice.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::SAADC.set_priority(Priority::P3);
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);

    let config = TurnerConfig::default();

    let sd = Softdevice::enable(&ble::softdevice_config(BLE_DEVICE_NAME));
    static SERVER: StaticCell<Server> = StaticCell::new();
    let server: &'static Server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(ble::softdevice_task(sd)));
    unwrap!(spawner.spawn(ble::link_task(sd, server)));

    let parts = Parts::new(p).await;
    let guard = BatteryGuard::new(parts.vbat, parts.charge, config.battery);
    let input = InputSourceAdapter::with_tap(parts.buttons, parts.tap);
    let session = BleSession::new(server, config.center_tap);

    let mut machine: PowerStateMachine<Xiao> = PowerStateMachine::new(
        config,
        session,
        parts.leds,
        parts.board,
        input,
        guard,
        Delay,
    );

    let cause = machine.run().await;
    info!("Reset: {}", cause);
    // Let RTT drain.
    Timer::after_millis(10).await;
    cortex_m::peripheral::SCB::sys_reset();
}
