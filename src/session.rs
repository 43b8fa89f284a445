//! Façades the power state machine drives but does not implement:
//! the BLE HID session and the indicator LEDs.

use crate::arbiter::Command;
use crate::Error;

/// BLE connection lifecycle and HID transport.
#[allow(async_fn_in_trait)]
pub trait Session {
    async fn start_advertising(&mut self) -> Result<(), Error>;

    async fn stop_advertising(&mut self);

    fn is_connected(&self) -> bool;

    async fn disconnect_all(&mut self);

    /// Deliver one command to the peer.
    ///
    /// Page, Back and Power commands become a consumer-control press and
    /// release ([`Command::consumer_usage`]). `CenterTap` becomes the mouse
    /// trajectory from [`crate::hid::CenterTapGesture::reports`].
    async fn send_key(&mut self, command: Command) -> Result<(), Error>;

    async fn set_battery_level(&mut self, percent: u8);
}

/// Indicator channels. The mapping to LEDs is board-specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorChannel {
    LowBattery,
    Connecting,
    Activity,
    Sleep,
}

impl IndicatorChannel {
    /// Order used by the farewell sweep.
    pub const ALL: [IndicatorChannel; 4] = [
        IndicatorChannel::LowBattery,
        IndicatorChannel::Connecting,
        IndicatorChannel::Activity,
        IndicatorChannel::Sleep,
    ];
}

/// Fire-and-forget visual feedback.
pub trait Indicator {
    fn set(&mut self, channel: IndicatorChannel, on: bool);
}
