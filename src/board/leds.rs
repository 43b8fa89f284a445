//! Indicator LEDs, all active-low.
//!
//! | Channel    | LED                          |
//! |------------|------------------------------|
//! | LowBattery | red (P0.26)                  |
//! | Connecting | blue (P0.06)                 |
//! | Activity   | green (P0.30)                |
//! | Sleep      | external on D0, anode on D1  |

use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive};

use page_turner::{Indicator, IndicatorChannel};

pub struct Leds {
    red: Output<'static>,
    blue: Output<'static>,
    green: Output<'static>,
    external: Output<'static>,
    _external_anode: Output<'static>,
}

impl Leds {
    pub fn new(
        red: AnyPin,
        green: AnyPin,
        blue: AnyPin,
        external: AnyPin,
        external_anode: AnyPin,
    ) -> Self {
        Self {
            red: Output::new(red, Level::High, OutputDrive::Standard),
            blue: Output::new(blue, Level::High, OutputDrive::Standard),
            green: Output::new(green, Level::High, OutputDrive::Standard),
            external: Output::new(external, Level::High, OutputDrive::Standard),
            _external_anode: Output::new(external_anode, Level::High, OutputDrive::HighDrive),
        }
    }
}

impl Indicator for Leds {
    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        let led = match channel {
            IndicatorChannel::LowBattery => &mut self.red,
            IndicatorChannel::Connecting => &mut self.blue,
            IndicatorChannel::Activity => &mut self.green,
            IndicatorChannel::Sleep => &mut self.external,
        };
        led.set_level(if on { Level::Low } else { Level::High });
    }
}
