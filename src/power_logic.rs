//! Pure transition policy for the power state machine.
//!
//! Nothing here touches hardware; `power.rs` feeds in what it sampled and
//! acts on the answer.

use crate::arbiter::Command;
use crate::battery::ChargeState;
use crate::power::{PowerState, RebootCause};
use crate::session::IndicatorChannel;
use crate::sleep::{WakeSet, WakeSource};

/// Where a charge reading sends `DeepSleepEvaluate`.
///
/// `Unknown` is not treated as charging; the idle wait still watches the
/// charge line, so a cable plugged in later wakes the device.
pub fn deep_sleep_target(charge: ChargeState) -> PowerState {
    match charge {
        ChargeState::Charging => PowerState::DeepSleepCharging,
        ChargeState::NotCharging | ChargeState::Unknown => PowerState::DeepSleepIdle,
    }
}

/// Wake set for a dormant state, `None` for every other state.
///
/// Both sets keep the charge line armed, so no dormant wait ever stops
/// sensing the charger.
pub fn dormant_wakes(state: PowerState) -> Option<WakeSet> {
    match state {
        PowerState::DeepSleepCharging => Some(WakeSet::dormant(WakeSource::ChargeStopped)),
        PowerState::DeepSleepIdle => Some(WakeSet::dormant(WakeSource::ChargeStarted)),
        _ => None,
    }
}

/// Wake set for the connected low-power wait.
pub fn interactive_wakes(keep_alive_secs: u64, with_tap: bool) -> WakeSet {
    WakeSet::interactive(keep_alive_secs, with_tap)
}

/// How a dormant wait ended. `None` means the wake was not one the
/// dormant set arms and the wait resumes.
///
/// `back_power_held` is the Back/Power line re-read after the wake. A held
/// button wins over a charge-end wake that raced it.
pub fn dormant_wake_outcome(
    state: PowerState,
    wake: WakeSource,
    back_power_held: bool,
) -> Option<RebootCause> {
    match (state, wake) {
        (_, WakeSource::BackPower) => Some(RebootCause::PowerButton),
        (PowerState::DeepSleepCharging, WakeSource::ChargeStopped) if back_power_held => {
            Some(RebootCause::PowerButton)
        }
        (PowerState::DeepSleepCharging, WakeSource::ChargeStopped) => {
            Some(RebootCause::ChargeStopped)
        }
        (PowerState::DeepSleepIdle, WakeSource::ChargeStarted) => Some(RebootCause::ChargeStarted),
        _ => None,
    }
}

/// Result of one advertising tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingOutcome {
    /// Keep advertising.
    Continue,
    /// A peer connected.
    Connected,
    /// Back/Power pressed while advertising.
    Aborted,
    /// The window elapsed with no peer.
    TimedOut,
}

impl AdvertisingOutcome {
    pub fn next_state(self) -> Option<PowerState> {
        match self {
            AdvertisingOutcome::Continue => None,
            AdvertisingOutcome::Connected => Some(PowerState::Connected),
            AdvertisingOutcome::Aborted | AdvertisingOutcome::TimedOut => {
                Some(PowerState::DeepSleepEvaluate)
            }
        }
    }
}

/// Decide after `tick` completed ticks out of `total`.
///
/// A connection wins over an abort seen on the same tick.
pub fn advertising_outcome(
    connected: bool,
    back_power: bool,
    tick: u32,
    total: u32,
) -> AdvertisingOutcome {
    if connected {
        AdvertisingOutcome::Connected
    } else if back_power {
        AdvertisingOutcome::Aborted
    } else if tick >= total {
        AdvertisingOutcome::TimedOut
    } else {
        AdvertisingOutcome::Continue
    }
}

/// Channels lit during advertising tick `tick`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlinkFrame {
    pub connecting: bool,
    pub activity: bool,
}

impl BlinkFrame {
    pub fn is_dark(&self) -> bool {
        !self.connecting && !self.activity
    }

    pub fn channels(&self) -> impl Iterator<Item = IndicatorChannel> {
        let connecting = self.connecting.then_some(IndicatorChannel::Connecting);
        let activity = self.activity.then_some(IndicatorChannel::Activity);
        connecting.into_iter().chain(activity)
    }
}

/// Connecting blinks every 10th tick, activity every 100th.
pub fn advertising_blink(tick: u32) -> BlinkFrame {
    BlinkFrame {
        connecting: tick % 10 == 0,
        activity: tick % 100 == 0,
    }
}

/// State after a command has been handled.
pub fn after_dispatch(command: Command) -> PowerState {
    match command {
        Command::PowerOff => PowerState::DeepSleepEvaluate,
        _ => PowerState::AwaitingInput,
    }
}

/// States in which the session must still be connected.
pub fn requires_connection(state: PowerState) -> bool {
    matches!(
        state,
        PowerState::Connected
            | PowerState::AwaitingInput
            | PowerState::LightSleep
            | PowerState::Dispatching
    )
}
