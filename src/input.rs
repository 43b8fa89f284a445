//! Input source adapter - four buttons plus an optional double-tap line.
//!
//! Buttons idle high and are pulled low when pressed. The tap line idles
//! low and goes high on a detected double tap. A sample keeps the raw
//! line levels; [`RawInputSample::asserted`] folds in the polarity.

use crate::config::TapSensorConfig;
use crate::Error;

/// Electrical level of an input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

/// Which level means "asserted" on a given line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    pub const fn idle(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::High,
            Polarity::ActiveHigh => Level::Low,
        }
    }

    pub const fn active(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::Low,
            Polarity::ActiveHigh => Level::High,
        }
    }

    pub fn is_asserted(self, level: Level) -> bool {
        level == self.active()
    }
}

/// Buttons are idle-high with pull-ups.
pub const BUTTON_POLARITY: Polarity = Polarity::ActiveLow;

/// INT1 of the tap sensor is idle-low.
pub const TAP_POLARITY: Polarity = Polarity::ActiveHigh;

/// Physical push-buttons and switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Forward,
    Reverse,
    BackPower,
    ModeSwap,
}

/// One atomic read of every input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawInputSample {
    pub forward: Level,
    pub reverse: Level,
    pub back_power: Level,
    pub mode_swap: Level,
    pub tap: Level,
}

impl RawInputSample {
    /// Nothing pressed, no tap, Reader/Kindle mode.
    pub const IDLE: Self = Self {
        forward: BUTTON_POLARITY.idle(),
        reverse: BUTTON_POLARITY.idle(),
        back_power: BUTTON_POLARITY.idle(),
        mode_swap: BUTTON_POLARITY.idle(),
        tap: TAP_POLARITY.idle(),
    };

    /// Copy of `self` with `button` pulled to its active level.
    pub const fn with_pressed(mut self, button: Button) -> Self {
        let active = BUTTON_POLARITY.active();
        match button {
            Button::Forward => self.forward = active,
            Button::Reverse => self.reverse = active,
            Button::BackPower => self.back_power = active,
            Button::ModeSwap => self.mode_swap = active,
        }
        self
    }

    /// Copy of `self` with the tap line asserted.
    pub const fn with_tap(mut self) -> Self {
        self.tap = TAP_POLARITY.active();
        self
    }

    /// Normalize every line to a single "asserted" flag.
    pub fn asserted(&self) -> AssertedInputs {
        AssertedInputs {
            forward: BUTTON_POLARITY.is_asserted(self.forward),
            reverse: BUTTON_POLARITY.is_asserted(self.reverse),
            back_power: BUTTON_POLARITY.is_asserted(self.back_power),
            mode_swap: BUTTON_POLARITY.is_asserted(self.mode_swap),
            tap: TAP_POLARITY.is_asserted(self.tap),
        }
    }

    /// Forward/Reverse mapping selected by the mode switch.
    pub fn mode(&self) -> DeviceMode {
        if BUTTON_POLARITY.is_asserted(self.mode_swap) {
            DeviceMode::Kinoppy
        } else {
            DeviceMode::ReaderKindle
        }
    }
}

impl Default for RawInputSample {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Polarity-free view of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssertedInputs {
    pub forward: bool,
    pub reverse: bool,
    pub back_power: bool,
    pub mode_swap: bool,
    pub tap: bool,
}

/// Forward/Reverse semantics expected by the reading app.
///
/// Reader and Kindle turn forward on volume-down; Kinoppy on volume-up.
/// Read from the mode switch every cycle, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMode {
    ReaderKindle,
    Kinoppy,
}

/// Raw digital reads of the four polled button lines.
pub trait ButtonLines {
    fn level(&mut self, button: Button) -> Level;
}

/// Double-tap detector behind an interrupt line.
#[allow(async_fn_in_trait)]
pub trait TapSensor {
    /// Power up and program the tap engine.
    async fn configure(&mut self, config: &TapSensorConfig) -> Result<(), Error>;

    /// Level of the tap edge since the last read (reading clears it).
    async fn tap_level(&mut self) -> Level;

    /// Stop the accelerometer before a long sleep.
    async fn power_down(&mut self) -> Result<(), Error>;
}

/// Stand-in for boards built without the motion sensor.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTapSensor;

impl TapSensor for NoTapSensor {
    async fn configure(&mut self, _config: &TapSensorConfig) -> Result<(), Error> {
        Ok(())
    }

    async fn tap_level(&mut self) -> Level {
        TAP_POLARITY.idle()
    }

    async fn power_down(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Owns the button lines and, when fitted, the tap sensor.
pub struct InputSourceAdapter<B, T = NoTapSensor> {
    buttons: B,
    tap: Option<T>,
}

impl<B: ButtonLines> InputSourceAdapter<B, NoTapSensor> {
    /// Buttons only.
    pub fn without_tap(buttons: B) -> Self {
        Self { buttons, tap: None }
    }
}

impl<B: ButtonLines, T: TapSensor> InputSourceAdapter<B, T> {
    /// Buttons plus a double-tap sensor.
    pub fn with_tap(buttons: B, tap: T) -> Self {
        Self {
            buttons,
            tap: Some(tap),
        }
    }

    pub fn has_tap(&self) -> bool {
        self.tap.is_some()
    }

    /// Read all lines once. Safe to call right after any wake.
    pub async fn sample(&mut self) -> RawInputSample {
        let tap = match self.tap.as_mut() {
            Some(sensor) => sensor.tap_level().await,
            None => TAP_POLARITY.idle(),
        };
        RawInputSample {
            forward: self.buttons.level(Button::Forward),
            reverse: self.buttons.level(Button::Reverse),
            back_power: self.buttons.level(Button::BackPower),
            mode_swap: self.buttons.level(Button::ModeSwap),
            tap,
        }
    }

    /// Single-line read used by the long-press hold and advertising abort.
    pub fn back_power_asserted(&mut self) -> bool {
        BUTTON_POLARITY.is_asserted(self.buttons.level(Button::BackPower))
    }

    pub async fn configure_tap(&mut self, config: &TapSensorConfig) -> Result<(), Error> {
        match self.tap.as_mut() {
            Some(sensor) => sensor.configure(config).await,
            None => Ok(()),
        }
    }

    pub async fn power_down_tap(&mut self) -> Result<(), Error> {
        match self.tap.as_mut() {
            Some(sensor) => sensor.power_down().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct FixedButtons(RawInputSample);

    impl ButtonLines for FixedButtons {
        fn level(&mut self, button: Button) -> Level {
            match button {
                Button::Forward => self.0.forward,
                Button::Reverse => self.0.reverse,
                Button::BackPower => self.0.back_power,
                Button::ModeSwap => self.0.mode_swap,
            }
        }
    }

    struct AlwaysTapped;

    impl TapSensor for AlwaysTapped {
        async fn configure(&mut self, _config: &TapSensorConfig) -> Result<(), Error> {
            Ok(())
        }
        async fn tap_level(&mut self) -> Level {
            Level::High
        }
        async fn power_down(&mut self) -> Result<(), Error> {
            Err(Error::Sensor)
        }
    }

    #[test]
    fn idle_sample_asserts_nothing() {
        assert_eq!(RawInputSample::IDLE.asserted(), AssertedInputs::default());
        assert_eq!(RawInputSample::IDLE.mode(), DeviceMode::ReaderKindle);
    }

    #[test]
    fn buttons_assert_low_and_tap_asserts_high() {
        let s = RawInputSample::IDLE
            .with_pressed(Button::Reverse)
            .with_tap();
        assert_eq!(s.reverse, Level::Low);
        assert_eq!(s.tap, Level::High);
        let a = s.asserted();
        assert!(a.reverse && a.tap);
        assert!(!a.forward && !a.back_power && !a.mode_swap);
    }

    #[test]
    fn held_mode_switch_selects_kinoppy() {
        let s = RawInputSample::IDLE.with_pressed(Button::ModeSwap);
        assert_eq!(s.mode(), DeviceMode::Kinoppy);
    }

    #[test]
    fn adapter_without_sensor_never_reports_tap() {
        let mut adapter = InputSourceAdapter::without_tap(FixedButtons(
            RawInputSample::IDLE.with_pressed(Button::Forward),
        ));
        assert!(!adapter.has_tap());
        let s = block_on(adapter.sample());
        assert_eq!(s.tap, Level::Low);
        assert!(s.asserted().forward);
        assert!(block_on(adapter.power_down_tap()).is_ok());
    }

    #[test]
    fn adapter_with_sensor_reads_tap_line() {
        let mut adapter =
            InputSourceAdapter::with_tap(FixedButtons(RawInputSample::IDLE), AlwaysTapped);
        assert!(adapter.has_tap());
        assert!(block_on(adapter.sample()).asserted().tap);
        assert_eq!(block_on(adapter.power_down_tap()), Err(Error::Sensor));
    }

    #[test]
    fn back_power_check_reads_one_line() {
        let mut adapter = InputSourceAdapter::without_tap(FixedButtons(
            RawInputSample::IDLE.with_pressed(Button::BackPower),
        ));
        assert!(adapter.back_power_asserted());
    }
}
