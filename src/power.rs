//! Power state machine - the top-level controller.
//!
//! Sequences boot, advertising, the connected wait/dispatch loop and the
//! dormant waits, consulting the battery guard before every dormant wait.
//!
//! nRF52840 power modes as used here:
//! - System ON: advertising, dispatching (~3.5 mA with BLE active)
//! - System ON Idle: every wait, connected or dormant (CPU sleeping)
//! - System OFF is never used: it leaks ~2 mA on this board and would
//!   release the VBAT-sense protection.

use embedded_hal_async::delay::DelayNs;

use crate::arbiter::{Command, KeycodeArbiter};
use crate::battery::{BatteryAdc, BatteryGuard, BatteryReading, ChargeLine};
use crate::config::TurnerConfig;
use crate::input::{ButtonLines, InputSourceAdapter, TapSensor};
use crate::power_logic::{self, AdvertisingOutcome};
use crate::session::{Indicator, IndicatorChannel, Session};
use crate::sleep::Board;
use crate::Error;

/// Power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Guard rails, charge mode, sensor bring-up. Initial state.
    Boot,
    /// Advertising until a peer connects, Back/Power aborts, or timeout.
    Advertising,
    /// A peer just connected.
    Connected,
    /// Arm the connected wait.
    AwaitingInput,
    /// Blocked until a button, tap or the keep-alive timer fires.
    LightSleep,
    /// Sample, arbitrate and send one command.
    Dispatching,
    /// The peer went away.
    DisconnectedDrain,
    /// Sample the charge line and pick a dormant wait.
    DeepSleepEvaluate,
    /// Dormant while charging; wakes on Back/Power or charge end.
    DeepSleepCharging,
    /// Dormant on battery; wakes on Back/Power or charge start.
    DeepSleepIdle,
    /// Terminal. The caller resets the system.
    Reboot(RebootCause),
}

/// Why the machine asked for a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RebootCause {
    PowerButton,
    ChargeStarted,
    ChargeStopped,
    Fault(Error),
}

/// Hardware the machine runs on, bundled so the machine has one type
/// parameter.
pub trait Platform {
    type Session: Session;
    type Indicator: Indicator;
    type Board: Board;
    type Buttons: ButtonLines;
    type Tap: TapSensor;
    type Adc: BatteryAdc;
    type Charge: ChargeLine;
    type Delay: DelayNs;
}

/// Owns every collaborator exclusively for its whole lifetime.
pub struct PowerStateMachine<P: Platform> {
    config: TurnerConfig,
    arbiter: KeycodeArbiter,
    session: P::Session,
    indicator: P::Indicator,
    board: P::Board,
    input: InputSourceAdapter<P::Buttons, P::Tap>,
    guard: BatteryGuard<P::Adc, P::Charge>,
    delay: P::Delay,
    state: PowerState,
}

impl<P: Platform> PowerStateMachine<P> {
    pub fn new(
        config: TurnerConfig,
        session: P::Session,
        indicator: P::Indicator,
        board: P::Board,
        input: InputSourceAdapter<P::Buttons, P::Tap>,
        guard: BatteryGuard<P::Adc, P::Charge>,
        delay: P::Delay,
    ) -> Self {
        Self {
            arbiter: KeycodeArbiter::new(config.long_press_ms),
            config,
            session,
            indicator,
            board,
            input,
            guard,
            delay,
            state: PowerState::Boot,
        }
    }

    /// Get current power state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Step until `Reboot` and report why.
    pub async fn run(&mut self) -> RebootCause {
        loop {
            if let PowerState::Reboot(cause) = self.step().await {
                info!("Power: reboot ({})", cause);
                return cause;
            }
        }
    }

    /// Perform one transition and return the new state.
    ///
    /// A non-fatal error (the peer vanished mid-send) drains the
    /// connection; anything else reboots.
    pub async fn step(&mut self) -> PowerState {
        let next = match self.advance().await {
            Ok(next) => next,
            Err(e) if !e.is_fatal() => {
                warn!("Power: {} in {}", e, self.state);
                PowerState::DisconnectedDrain
            }
            Err(e) => {
                error!("Power: fatal {} in {}", e, self.state);
                PowerState::Reboot(RebootCause::Fault(e))
            }
        };

        if next != self.state {
            info!("Power: {} -> {}", self.state, next);
        }
        self.state = next;
        next
    }

    async fn advance(&mut self) -> Result<PowerState, Error> {
        let state = self.state;
        if power_logic::requires_connection(state) && !self.session.is_connected() {
            return Ok(PowerState::DisconnectedDrain);
        }

        match state {
            PowerState::Boot => self.boot().await,
            PowerState::Advertising => self.advertise().await,
            PowerState::Connected => Ok(PowerState::AwaitingInput),
            PowerState::AwaitingInput => {
                self.indicator.set(IndicatorChannel::Sleep, true);
                Ok(PowerState::LightSleep)
            }
            PowerState::LightSleep => self.light_sleep().await,
            PowerState::Dispatching => self.dispatch().await,
            PowerState::DisconnectedDrain => {
                self.indicator.set(IndicatorChannel::Sleep, false);
                self.indicator.set(IndicatorChannel::Activity, false);
                Ok(PowerState::DeepSleepEvaluate)
            }
            PowerState::DeepSleepEvaluate => self.evaluate_deep_sleep().await,
            PowerState::DeepSleepCharging | PowerState::DeepSleepIdle => {
                self.dormant(state).await
            }
            PowerState::Reboot(_) => Ok(state),
        }
    }

    async fn boot(&mut self) -> Result<PowerState, Error> {
        self.board.protect_battery_sense().await?;
        self.delay
            .delay_ms(self.config.battery_guard_settle_ms)
            .await;

        let mode = self
            .guard
            .recommend_charge_mode(self.config.battery_capacity_mah);
        self.board.apply_charge_mode(mode).await?;
        info!("Charge mode: {} ({} mA)", mode, mode.current_ma());

        for channel in IndicatorChannel::ALL {
            self.indicator.set(channel, false);
        }

        if self.input.has_tap() {
            self.input.configure_tap(&self.config.tap_sensor).await?;
            info!("Tap sensor configured");
        }

        self.refresh_battery().await;
        self.session.disconnect_all().await;
        Ok(PowerState::Advertising)
    }

    async fn advertise(&mut self) -> Result<PowerState, Error> {
        self.session.start_advertising().await?;
        info!(
            "Advertising for {} s",
            self.config.advertising_timeout_secs
        );

        let total = self.config.advertising_ticks();
        let tick_ms = self.config.advertising_tick_ms;
        let blink_ms = self.config.advertising_blink_ms.min(tick_ms);
        let mut tick = 0;
        let outcome = loop {
            let outcome = power_logic::advertising_outcome(
                self.session.is_connected(),
                self.input.back_power_asserted(),
                tick,
                total,
            );
            if outcome != AdvertisingOutcome::Continue {
                break outcome;
            }

            let frame = power_logic::advertising_blink(tick);
            for channel in frame.channels() {
                self.indicator.set(channel, true);
            }
            self.delay.delay_ms(blink_ms).await;
            for channel in frame.channels() {
                self.indicator.set(channel, false);
            }
            self.delay.delay_ms(tick_ms - blink_ms).await;
            tick += 1;
        };

        self.session.stop_advertising().await;
        info!("Advertising: {} after {} ticks", outcome, tick);
        Ok(outcome
            .next_state()
            .unwrap_or(PowerState::DeepSleepEvaluate))
    }

    async fn light_sleep(&mut self) -> Result<PowerState, Error> {
        let wakes =
            power_logic::interactive_wakes(self.config.keep_alive_secs, self.input.has_tap());
        let woke = self
            .board
            .sleep_until(&wakes, self.guard.charge_line())
            .await;
        self.indicator.set(IndicatorChannel::Sleep, false);

        let wake = woke?;
        debug!("Woke by {}", wake);
        Ok(PowerState::Dispatching)
    }

    async fn dispatch(&mut self) -> Result<PowerState, Error> {
        let sample = self.input.sample().await;
        let mode = sample.mode();
        let command = self
            .arbiter
            .arbitrate(sample, mode, &mut self.input, &mut self.delay)
            .await;
        info!("Dispatch: {} ({})", command, mode);

        match command {
            Command::None => {
                self.refresh_battery().await;
            }
            _ => {
                self.indicator.set(IndicatorChannel::Activity, true);
                self.refresh_battery().await;
                let sent = self.session.send_key(command).await;
                if sent.is_ok() {
                    self.delay.delay_ms(self.config.dispatch_blink_ms).await;
                }
                self.indicator.set(IndicatorChannel::Activity, false);
                sent?;
            }
        }

        Ok(power_logic::after_dispatch(command))
    }

    async fn evaluate_deep_sleep(&mut self) -> Result<PowerState, Error> {
        self.session.disconnect_all().await;
        self.farewell_sweep().await;
        self.input.power_down_tap().await?;

        // Sampled here and nowhere else; the cable may have moved since boot.
        let charge = self.guard.charge_state();
        Ok(power_logic::deep_sleep_target(charge))
    }

    async fn dormant(&mut self, state: PowerState) -> Result<PowerState, Error> {
        let Some(wakes) = power_logic::dormant_wakes(state) else {
            return Ok(PowerState::DeepSleepEvaluate);
        };

        let wake = self
            .board
            .sleep_until(&wakes, self.guard.charge_line())
            .await?;
        info!("Woke from {} by {}", state, wake);

        let held = self.input.back_power_asserted();
        match power_logic::dormant_wake_outcome(state, wake, held) {
            Some(cause) => {
                if cause == RebootCause::ChargeStopped {
                    self.farewell_sweep().await;
                }
                Ok(PowerState::Reboot(cause))
            }
            None => Ok(state),
        }
    }

    async fn refresh_battery(&mut self) -> BatteryReading {
        let reading = self.guard.measure().await;
        self.session.set_battery_level(reading.percent).await;
        self.indicator
            .set(IndicatorChannel::LowBattery, reading.low);
        reading
    }

    async fn farewell_sweep(&mut self) {
        let step = self.config.sleep_sweep_step_ms;
        for channel in IndicatorChannel::ALL {
            self.indicator.set(channel, true);
            self.delay.delay_ms(step).await;
            self.indicator.set(channel, false);
            self.delay.delay_ms(step).await;
        }
    }
}
