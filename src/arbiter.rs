//! Keycode arbiter - turns one input sample into at most one command.
//!
//! Priority is fixed: Forward, Reverse, Back/Power, then tap. Back/Power
//! is tentatively `Back` and becomes `PowerOff` if the line is still held
//! when the long-press window closes. During that window only the
//! Back/Power line is read; the housing makes it exclusive with the
//! page buttons.

use embedded_hal_async::delay::DelayNs;

use crate::hid::consumer::ConsumerUsage;
use crate::input::{ButtonLines, DeviceMode, InputSourceAdapter, RawInputSample, TapSensor};

/// Logical action for one arbitration cycle.
///
/// `PageForward` and `PageReverse` name the Reader/Kindle convention
/// (volume-down / volume-up); Kinoppy mode swaps which button emits which.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    None,
    PageForward,
    PageReverse,
    Back,
    PowerOff,
    CenterTap,
}

impl Command {
    /// Consumer-control usage carried by this command.
    ///
    /// `CenterTap` travels as pointer reports and `None` sends nothing.
    pub fn consumer_usage(self) -> Option<ConsumerUsage> {
        match self {
            Command::PageForward => Some(ConsumerUsage::VolumeDecrement),
            Command::PageReverse => Some(ConsumerUsage::VolumeIncrement),
            Command::Back => Some(ConsumerUsage::AcBack),
            Command::PowerOff => Some(ConsumerUsage::Power),
            Command::CenterTap | Command::None => None,
        }
    }
}

/// Commands bound to the Forward and Reverse buttons in `mode`.
pub const fn page_commands(mode: DeviceMode) -> (Command, Command) {
    match mode {
        DeviceMode::ReaderKindle => (Command::PageForward, Command::PageReverse),
        DeviceMode::Kinoppy => (Command::PageReverse, Command::PageForward),
    }
}

/// First-pass decision for a sample, before any long-press hold.
///
/// Returns `Back` for a Back/Power press; [`KeycodeArbiter::arbitrate`]
/// upgrades it after the hold window.
pub fn prioritize(sample: &RawInputSample, mode: DeviceMode) -> Command {
    let inputs = sample.asserted();
    let (forward, reverse) = page_commands(mode);
    if inputs.forward {
        forward
    } else if inputs.reverse {
        reverse
    } else if inputs.back_power {
        Command::Back
    } else if inputs.tap {
        Command::CenterTap
    } else {
        Command::None
    }
}

/// Stateless arbiter parameterized by the long-press window.
#[derive(Clone, Copy, Debug)]
pub struct KeycodeArbiter {
    long_press_ms: u32,
}

impl KeycodeArbiter {
    pub const fn new(long_press_ms: u32) -> Self {
        Self { long_press_ms }
    }

    /// Resolve `sample` into one command, blocking through the hold window
    /// when Back/Power is the winner.
    pub async fn arbitrate<B, T, D>(
        &self,
        sample: RawInputSample,
        mode: DeviceMode,
        input: &mut InputSourceAdapter<B, T>,
        delay: &mut D,
    ) -> Command
    where
        B: ButtonLines,
        T: TapSensor,
        D: DelayNs,
    {
        let tentative = prioritize(&sample, mode);
        if tentative != Command::Back {
            debug!("Arbiter: {} ({})", tentative, mode);
            return tentative;
        }

        delay.delay_ms(self.long_press_ms).await;
        let command = if input.back_power_asserted() {
            Command::PowerOff
        } else {
            Command::Back
        };
        debug!("Arbiter: {} after {} ms hold", command, self.long_press_ms);
        command
    }
}

impl Default for KeycodeArbiter {
    fn default() -> Self {
        Self::new(crate::config::LONG_PRESS_MS)
    }
}
