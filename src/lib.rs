//! Host-testable core of the page-turner firmware.
//!
//! Everything that decides something lives here: input normalization,
//! keycode arbitration, the battery guard, the power state machine and
//! the HID report shapes. Hardware is reached only through the traits in
//! [`input`], [`battery`], [`sleep`] and [`session`].
//!
//! Usage: `cargo test` on the host.
//!
//! Note: The embedded binary (main.rs, `--features embedded`) implements
//! those traits for the XIAO nRF52840 Sense and drives [`PowerStateMachine`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Core modules
// ═══════════════════════════════════════════════════════════════════════════

pub mod arbiter;
pub mod battery;
pub mod config;
pub mod error;
pub mod hid;
pub mod input;
pub mod power;
pub mod power_logic;
pub mod session;
pub mod sleep;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use arbiter::{Command, KeycodeArbiter};
pub use battery::{BatteryGuard, BatteryReading, ChargeMode, ChargeState};
pub use config::TurnerConfig;
pub use error::Error;
pub use input::{DeviceMode, InputSourceAdapter, RawInputSample};
pub use power::{Platform, PowerState, PowerStateMachine, RebootCause};
pub use session::{Indicator, IndicatorChannel, Session};
pub use sleep::{Board, WakeSet, WakeSource};
