//! Charge-status line (P0.17, low while charging).
//!
//! The pin is left disconnected between uses. `sample` connects it for two
//! back-to-back reads; `wait_for` connects it for the duration of a sleep
//! and disconnects on completion or cancellation.

use core::future::pending;

use embassy_nrf::gpio::{Flex, Pull};

use page_turner::battery::{ChargeLine, ChargeState};

pub struct ChargeStatus {
    pin: Flex<'static>,
}

impl ChargeStatus {
    pub fn new(mut pin: Flex<'static>) -> Self {
        pin.set_as_disconnected();
        Self { pin }
    }
}

fn decode(pin: &Flex<'static>) -> ChargeState {
    if pin.is_low() {
        ChargeState::Charging
    } else {
        ChargeState::NotCharging
    }
}

/// Disconnects the pin when dropped.
struct Connected<'a>(&'a mut Flex<'static>);

impl<'a> Connected<'a> {
    fn new(pin: &'a mut Flex<'static>) -> Self {
        pin.set_as_input(Pull::None);
        Self(pin)
    }
}

impl Drop for Connected<'_> {
    fn drop(&mut self) {
        self.0.set_as_disconnected();
    }
}

impl ChargeLine for ChargeStatus {
    fn sample(&mut self) -> ChargeState {
        let line = Connected::new(&mut self.pin);
        let first = decode(&*line.0);
        let second = decode(&*line.0);
        // Disagreeing reads mean the charger was mid-transition.
        if first == second {
            first
        } else {
            ChargeState::Unknown
        }
    }

    async fn wait_for(&mut self, target: ChargeState) {
        let mut line = Connected::new(&mut self.pin);
        match target {
            ChargeState::Charging => line.0.wait_for_low().await,
            ChargeState::NotCharging => line.0.wait_for_high().await,
            ChargeState::Unknown => pending().await,
        }
    }
}
