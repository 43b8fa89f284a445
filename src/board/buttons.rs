//! Polled button pads.
//!
//! D3 and D8 use the internal pull-ups (~13k). D5 and D7 rely on external
//! 100k pull-ups: D5 is paralleled with the D6 wake pad, and the Kinoppy
//! holds D7 low hard enough to defeat the internal one.

use embassy_nrf::gpio::{AnyPin, Input, Pull};

use page_turner::input::{Button, ButtonLines, Level};

pub struct Buttons {
    forward: Input<'static>,
    reverse: Input<'static>,
    back_power: Input<'static>,
    mode_swap: Input<'static>,
}

impl Buttons {
    pub fn new(forward: AnyPin, reverse: AnyPin, back_power: AnyPin, mode_swap: AnyPin) -> Self {
        Self {
            forward: Input::new(forward, Pull::Up),
            reverse: Input::new(reverse, Pull::Up),
            back_power: Input::new(back_power, Pull::None),
            mode_swap: Input::new(mode_swap, Pull::None),
        }
    }
}

impl ButtonLines for Buttons {
    fn level(&mut self, button: Button) -> Level {
        let pin = match button {
            Button::Forward => &self.forward,
            Button::Reverse => &self.reverse,
            Button::BackPower => &self.back_power,
            Button::ModeSwap => &self.mode_swap,
        };
        if pin.is_high() {
            Level::High
        } else {
            Level::Low
        }
    }
}
