//! Wake sources and the single blocking sleep primitive.
//!
//! There is no true System OFF on this board (it leaks ~2 mA and would
//! drop the VBAT-sense protection), so every sleep is the same
//! CPU-idle wait with a different set of wake sources.

use heapless::Vec;

use crate::battery::{ChargeLine, ChargeMode, ChargeState};
use crate::Error;

/// Maximum number of sources armed at once.
pub const MAX_WAKE_SOURCES: usize = 6;

/// A condition that can end a sleep wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSource {
    /// Falling edge on the Forward wake pad.
    Forward,
    /// Falling edge on the Reverse wake pad.
    Reverse,
    /// Falling edge on the Back/Power wake pad.
    BackPower,
    /// Rising edge on the tap sensor interrupt.
    Tap,
    /// Timer expiry keeping the BLE link serviced.
    KeepAlive { secs: u64 },
    /// Charge-status line reports charging.
    ChargeStarted,
    /// Charge-status line reports not charging.
    ChargeStopped,
}

impl WakeSource {
    /// The charge-line level this source waits for, if it is a charge source.
    pub fn charge_target(self) -> Option<ChargeState> {
        match self {
            WakeSource::ChargeStarted => Some(ChargeState::Charging),
            WakeSource::ChargeStopped => Some(ChargeState::NotCharging),
            _ => None,
        }
    }
}

/// Bounded set of armed wake sources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WakeSet {
    sources: Vec<WakeSource, MAX_WAKE_SOURCES>,
}

impl WakeSet {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Connected wait: every button, the tap line if fitted, and keep-alive.
    pub fn interactive(keep_alive_secs: u64, with_tap: bool) -> Self {
        let mut set = Self::new();
        set.arm(WakeSource::Forward);
        set.arm(WakeSource::Reverse);
        set.arm(WakeSource::BackPower);
        if with_tap {
            set.arm(WakeSource::Tap);
        }
        set.arm(WakeSource::KeepAlive {
            secs: keep_alive_secs,
        });
        set
    }

    /// Long idle: Back/Power, or the charge line flipping to `charge`.
    pub fn dormant(charge: WakeSource) -> Self {
        let mut set = Self::new();
        set.arm(WakeSource::BackPower);
        set.arm(charge);
        set
    }

    /// Add a source; duplicates are ignored.
    pub fn arm(&mut self, source: WakeSource) {
        if !self.sources.contains(&source) {
            // Capacity covers every distinct source the firmware arms.
            let _ = self.sources.push(source);
        }
    }

    pub fn contains(&self, source: WakeSource) -> bool {
        self.sources.contains(&source)
    }

    pub fn iter(&self) -> impl Iterator<Item = WakeSource> + '_ {
        self.sources.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The charge level this set waits for, if any.
    pub fn charge_target(&self) -> Option<ChargeState> {
        self.iter().find_map(WakeSource::charge_target)
    }

    /// Whether charge-status sensing stays live during this wait.
    pub fn keeps_charge_sensing(&self) -> bool {
        self.charge_target().is_some()
    }

    pub fn keep_alive_secs(&self) -> Option<u64> {
        self.iter().find_map(|s| match s {
            WakeSource::KeepAlive { secs } => Some(secs),
            _ => None,
        })
    }
}

/// Board-level power services outside the input and battery paths.
#[allow(async_fn_in_trait)]
pub trait Board {
    /// Drive the VBAT-sense enable low; it must be low on battery.
    async fn protect_battery_sense(&mut self) -> Result<(), Error>;

    /// Latch the charger current limit.
    async fn apply_charge_mode(&mut self, mode: ChargeMode) -> Result<(), Error>;

    /// Block until one source in `wakes` fires and report which.
    ///
    /// `charge_line` is borrowed from the battery guard for the whole wait
    /// and must be released before returning.
    async fn sleep_until<C: ChargeLine>(
        &mut self,
        wakes: &WakeSet,
        charge_line: &mut C,
    ) -> Result<WakeSource, Error>;
}
