//! End-to-end tests of the power state machine against scripted hardware.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;

use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;

use page_turner::battery::{BatteryAdc, BatteryCalibration, ChargeLine};
use page_turner::config::TapSensorConfig;
use page_turner::error::{BleError, PeripheralFault};
use page_turner::hid::ConsumerUsage;
use page_turner::input::{Button, ButtonLines, Level, NoTapSensor, TapSensor};
use page_turner::{
    BatteryGuard, Board, ChargeMode, ChargeState, Command, Error, Indicator, IndicatorChannel,
    InputSourceAdapter, Platform, PowerState, PowerStateMachine, RawInputSample, RebootCause,
    Session, TurnerConfig, WakeSet, WakeSource,
};

// ═══════════════════════════════════════════════════════════════════════════
// Scripted hardware
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct World {
    // Session
    connect_on_advertise: bool,
    connected: bool,
    advertising_starts: u32,
    disconnects: u32,
    keys: Vec<Command>,
    battery_levels: Vec<u8>,
    fail_next_send: Option<Error>,

    // Indicators
    lit: [bool; 4],
    lit_count: [u32; 4],

    // Board
    battery_protected: bool,
    charge_mode: Option<ChargeMode>,
    wakes: VecDeque<(WakeSource, RawInputSample)>,
    sleeps: Vec<WakeSet>,

    // Inputs
    lines: RawInputSample,
    release_back_on_delay: bool,
    tap_configured: bool,
    tap_powered_down: bool,

    // Battery
    raw_battery: u16,
    charge: ChargeState,
    charge_waits: Vec<ChargeState>,

    delay_ms: u64,
}

type Shared = Rc<RefCell<World>>;

fn channel_index(channel: IndicatorChannel) -> usize {
    match channel {
        IndicatorChannel::LowBattery => 0,
        IndicatorChannel::Connecting => 1,
        IndicatorChannel::Activity => 2,
        IndicatorChannel::Sleep => 3,
    }
}

struct MockSession(Shared);

impl Session for MockSession {
    async fn start_advertising(&mut self) -> Result<(), Error> {
        let mut w = self.0.borrow_mut();
        w.advertising_starts += 1;
        if w.connect_on_advertise {
            w.connected = true;
        }
        Ok(())
    }

    async fn stop_advertising(&mut self) {}

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    async fn disconnect_all(&mut self) {
        let mut w = self.0.borrow_mut();
        w.connected = false;
        w.disconnects += 1;
    }

    async fn send_key(&mut self, command: Command) -> Result<(), Error> {
        let mut w = self.0.borrow_mut();
        if let Some(e) = w.fail_next_send.take() {
            return Err(e);
        }
        w.keys.push(command);
        Ok(())
    }

    async fn set_battery_level(&mut self, percent: u8) {
        self.0.borrow_mut().battery_levels.push(percent);
    }
}

struct MockIndicator(Shared);

impl Indicator for MockIndicator {
    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        let mut w = self.0.borrow_mut();
        let i = channel_index(channel);
        if on && !w.lit[i] {
            w.lit_count[i] += 1;
        }
        w.lit[i] = on;
    }
}

struct MockBoard(Shared);

impl Board for MockBoard {
    async fn protect_battery_sense(&mut self) -> Result<(), Error> {
        self.0.borrow_mut().battery_protected = true;
        Ok(())
    }

    async fn apply_charge_mode(&mut self, mode: ChargeMode) -> Result<(), Error> {
        self.0.borrow_mut().charge_mode = Some(mode);
        Ok(())
    }

    /// Pops the next scripted wake. An empty script ends a connected wait
    /// with a dropped link, and a dormant wait with a Back/Power press.
    async fn sleep_until<C: ChargeLine>(
        &mut self,
        wakes: &WakeSet,
        charge_line: &mut C,
    ) -> Result<WakeSource, Error> {
        let next = {
            let mut w = self.0.borrow_mut();
            w.sleeps.push(wakes.clone());
            w.wakes.pop_front()
        };
        let wake = match next {
            Some((wake, lines)) => {
                self.0.borrow_mut().lines = lines;
                wake
            }
            None if wakes.keep_alive_secs().is_some() => {
                self.0.borrow_mut().connected = false;
                return Ok(WakeSource::KeepAlive {
                    secs: wakes.keep_alive_secs().unwrap_or_default(),
                });
            }
            None => WakeSource::BackPower,
        };
        if let Some(target) = wake.charge_target() {
            charge_line.wait_for(target).await;
        }
        Ok(wake)
    }
}

struct MockButtons(Shared);

impl ButtonLines for MockButtons {
    fn level(&mut self, button: Button) -> Level {
        let lines = self.0.borrow().lines;
        match button {
            Button::Forward => lines.forward,
            Button::Reverse => lines.reverse,
            Button::BackPower => lines.back_power,
            Button::ModeSwap => lines.mode_swap,
        }
    }
}

struct MockTap(Shared);

impl TapSensor for MockTap {
    async fn configure(&mut self, _config: &TapSensorConfig) -> Result<(), Error> {
        self.0.borrow_mut().tap_configured = true;
        Ok(())
    }

    async fn tap_level(&mut self) -> Level {
        self.0.borrow().lines.tap
    }

    async fn power_down(&mut self) -> Result<(), Error> {
        self.0.borrow_mut().tap_powered_down = true;
        Ok(())
    }
}

struct MockAdc(Shared);

impl BatteryAdc for MockAdc {
    async fn read_raw(&mut self) -> u16 {
        self.0.borrow().raw_battery
    }
}

struct MockCharge(Shared);

impl ChargeLine for MockCharge {
    fn sample(&mut self) -> ChargeState {
        self.0.borrow().charge
    }

    async fn wait_for(&mut self, target: ChargeState) {
        let mut w = self.0.borrow_mut();
        w.charge = target;
        w.charge_waits.push(target);
    }
}

struct MockDelay(Shared);

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().delay_ms += (ns / 1_000_000) as u64;
    }

    async fn delay_ms(&mut self, ms: u32) {
        let mut w = self.0.borrow_mut();
        w.delay_ms += ms as u64;
        if w.release_back_on_delay {
            w.lines.back_power = Level::High;
        }
    }
}

struct Mock<T>(PhantomData<T>);

impl<T: TapSensor> Platform for Mock<T> {
    type Session = MockSession;
    type Indicator = MockIndicator;
    type Board = MockBoard;
    type Buttons = MockButtons;
    type Tap = T;
    type Adc = MockAdc;
    type Charge = MockCharge;
    type Delay = MockDelay;
}

fn world() -> Shared {
    Rc::new(RefCell::new(World {
        raw_battery: 23900,
        charge: ChargeState::NotCharging,
        ..World::default()
    }))
}

fn build<T: TapSensor>(
    w: &Shared,
    input: InputSourceAdapter<MockButtons, T>,
) -> PowerStateMachine<Mock<T>> {
    PowerStateMachine::new(
        TurnerConfig::default(),
        MockSession(w.clone()),
        MockIndicator(w.clone()),
        MockBoard(w.clone()),
        input,
        BatteryGuard::new(
            MockAdc(w.clone()),
            MockCharge(w.clone()),
            BatteryCalibration::default(),
        ),
        MockDelay(w.clone()),
    )
}

fn with_sensor(w: &Shared) -> PowerStateMachine<Mock<MockTap>> {
    build(
        w,
        InputSourceAdapter::with_tap(MockButtons(w.clone()), MockTap(w.clone())),
    )
}

fn without_sensor(w: &Shared) -> PowerStateMachine<Mock<NoTapSensor>> {
    build(w, InputSourceAdapter::without_tap(MockButtons(w.clone())))
}

/// Step until `until` holds, returning every state visited.
fn step_until<P: Platform>(
    machine: &mut PowerStateMachine<P>,
    until: impl Fn(PowerState) -> bool,
) -> Vec<PowerState> {
    let mut visited = vec![machine.state()];
    for _ in 0..64 {
        let next = block_on(machine.step());
        visited.push(next);
        if until(next) {
            return visited;
        }
    }
    panic!("machine did not settle: {:?}", visited);
}

fn connected_world(wakes: &[(WakeSource, RawInputSample)]) -> Shared {
    let w = world();
    {
        let mut b = w.borrow_mut();
        b.connect_on_advertise = true;
        b.wakes = wakes.iter().copied().collect();
    }
    w
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn no_peer_times_out_into_idle_sleep_until_back_power() {
    let w = world();
    let mut machine = with_sensor(&w);

    let visited = step_until(&mut machine, |s| s == PowerState::DeepSleepIdle);
    assert_eq!(
        visited,
        vec![
            PowerState::Boot,
            PowerState::Advertising,
            PowerState::DeepSleepEvaluate,
            PowerState::DeepSleepIdle,
        ]
    );
    // 600 ticks of 100 ms, plus boot settle and the farewell sweep.
    assert!(w.borrow().delay_ms >= 60_000);
    assert!(w.borrow().keys.is_empty());

    // Nothing scripted: the dormant wait ends on Back/Power.
    assert_eq!(
        block_on(machine.step()),
        PowerState::Reboot(RebootCause::PowerButton)
    );
    let sleeps = &w.borrow().sleeps;
    assert_eq!(sleeps.len(), 1);
    assert_eq!(sleeps[0], WakeSet::dormant(WakeSource::ChargeStarted));
}

#[test]
fn kinoppy_forward_sends_volume_increment() {
    let lines = RawInputSample::IDLE
        .with_pressed(Button::ModeSwap)
        .with_pressed(Button::Forward);
    let w = connected_world(&[(WakeSource::Forward, lines)]);
    let mut machine = with_sensor(&w);

    assert_eq!(block_on(machine.run()), RebootCause::PowerButton);

    let keys = w.borrow().keys.clone();
    assert_eq!(keys, vec![Command::PageReverse]);
    assert_eq!(keys[0].consumer_usage(), Some(ConsumerUsage::VolumeIncrement));
    assert_eq!(ConsumerUsage::VolumeIncrement as u16, 0xE9);
}

#[test]
fn reader_forward_sends_volume_decrement() {
    let lines = RawInputSample::IDLE.with_pressed(Button::Forward);
    let w = connected_world(&[(WakeSource::Forward, lines)]);
    block_on(with_sensor(&w).run());

    let keys = w.borrow().keys.clone();
    assert_eq!(keys, vec![Command::PageForward]);
    assert_eq!(keys[0].consumer_usage(), Some(ConsumerUsage::VolumeDecrement));
}

#[test]
fn tap_without_buttons_takes_the_pointer_path() {
    let w = connected_world(&[(WakeSource::Tap, RawInputSample::IDLE.with_tap())]);
    let mut machine = with_sensor(&w);
    block_on(machine.run());

    let b = w.borrow();
    assert_eq!(b.keys, vec![Command::CenterTap]);
    assert_eq!(b.keys[0].consumer_usage(), None);
    assert!(b.tap_configured);
    assert!(b.tap_powered_down);
    assert!(b.sleeps[0].contains(WakeSource::Tap));
}

#[test]
fn board_without_sensor_ignores_the_tap_line() {
    let w = connected_world(&[(
        WakeSource::KeepAlive { secs: 60 },
        RawInputSample::IDLE.with_tap(),
    )]);
    let mut machine = without_sensor(&w);
    block_on(machine.run());

    let b = w.borrow();
    assert!(b.keys.is_empty());
    assert!(!b.sleeps[0].contains(WakeSource::Tap));
}

#[test]
fn midpoint_battery_reports_fifty_percent_without_low_flag() {
    let w = world();
    w.borrow_mut().raw_battery = 22650;
    let mut machine = with_sensor(&w);

    assert_eq!(block_on(machine.step()), PowerState::Advertising);
    let b = w.borrow();
    assert_eq!(b.battery_levels, vec![50]);
    assert!(!b.lit[channel_index(IndicatorChannel::LowBattery)]);
}

#[test]
fn low_battery_lights_the_low_battery_channel() {
    let w = world();
    w.borrow_mut().raw_battery = 21500;
    let mut machine = with_sensor(&w);

    block_on(machine.step());
    let b = w.borrow();
    assert_eq!(b.battery_levels, vec![4]);
    assert!(b.lit[channel_index(IndicatorChannel::LowBattery)]);
}

#[test]
fn boot_applies_guard_rails_before_advertising() {
    let w = world();
    let mut machine = with_sensor(&w);

    block_on(machine.step());
    let b = w.borrow();
    assert!(b.battery_protected);
    assert_eq!(b.charge_mode, Some(ChargeMode::High));
    assert!(b.tap_configured);
    assert_eq!(b.disconnects, 1);
    assert_eq!(b.advertising_starts, 0);
}

#[test]
fn back_power_during_advertising_aborts_early() {
    let w = world();
    w.borrow_mut().lines = RawInputSample::IDLE.with_pressed(Button::BackPower);
    let mut machine = with_sensor(&w);

    let visited = step_until(&mut machine, |s| s == PowerState::DeepSleepEvaluate);
    assert_eq!(visited.last(), Some(&PowerState::DeepSleepEvaluate));
    assert!(w.borrow().delay_ms < 1_000);
}

#[test]
fn keep_alive_wake_only_refreshes_the_battery() {
    let w = connected_world(&[(WakeSource::KeepAlive { secs: 60 }, RawInputSample::IDLE)]);
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::Dispatching);
    let levels_before = w.borrow().battery_levels.len();
    assert_eq!(block_on(machine.step()), PowerState::AwaitingInput);

    let b = w.borrow();
    assert!(b.keys.is_empty());
    assert_eq!(b.battery_levels.len(), levels_before + 1);
}

#[test]
fn held_back_power_sends_power_and_leaves_the_connection() {
    let held = RawInputSample::IDLE.with_pressed(Button::BackPower);
    let w = connected_world(&[(WakeSource::BackPower, held)]);
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::Dispatching);
    assert_eq!(block_on(machine.step()), PowerState::DeepSleepEvaluate);
    assert_eq!(w.borrow().keys, vec![Command::PowerOff]);
}

#[test]
fn every_sent_command_pushes_the_battery_and_blinks() {
    let activity = channel_index(IndicatorChannel::Activity);
    for (wake, lines) in [
        (WakeSource::Forward, RawInputSample::IDLE.with_pressed(Button::Forward)),
        (WakeSource::BackPower, RawInputSample::IDLE.with_pressed(Button::BackPower)),
    ] {
        let w = connected_world(&[(wake, lines)]);
        let mut machine = with_sensor(&w);

        step_until(&mut machine, |s| s == PowerState::Dispatching);
        let (levels_before, blinks_before) = {
            let b = w.borrow();
            (b.battery_levels.len(), b.lit_count[activity])
        };
        block_on(machine.step());

        let b = w.borrow();
        assert_eq!(b.keys.len(), 1, "{:?}", wake);
        assert_eq!(b.battery_levels.len(), levels_before + 1, "{:?}", wake);
        assert_eq!(b.lit_count[activity], blinks_before + 1, "{:?}", wake);
        assert!(!b.lit[activity], "{:?}", wake);
    }
}

#[test]
fn released_back_power_sends_back_and_keeps_waiting() {
    let held = RawInputSample::IDLE.with_pressed(Button::BackPower);
    let w = connected_world(&[(WakeSource::BackPower, held)]);
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::Dispatching);
    w.borrow_mut().release_back_on_delay = true;
    assert_eq!(block_on(machine.step()), PowerState::AwaitingInput);

    let b = w.borrow();
    assert_eq!(b.keys, vec![Command::Back]);
    assert!(b.lit_count[channel_index(IndicatorChannel::Activity)] > 0);
    assert!(!b.lit[channel_index(IndicatorChannel::Activity)]);
}

#[test]
fn connected_wait_lights_the_sleep_channel_until_wake() {
    let lines = RawInputSample::IDLE.with_pressed(Button::Reverse);
    let w = connected_world(&[(WakeSource::Reverse, lines)]);
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::LightSleep);
    assert!(w.borrow().lit[channel_index(IndicatorChannel::Sleep)]);
    assert_eq!(block_on(machine.step()), PowerState::Dispatching);
    assert!(!w.borrow().lit[channel_index(IndicatorChannel::Sleep)]);
}

#[test]
fn lost_peer_mid_send_drains_instead_of_rebooting() {
    let lines = RawInputSample::IDLE.with_pressed(Button::Forward);
    let w = connected_world(&[(WakeSource::Forward, lines)]);
    w.borrow_mut().fail_next_send = Some(Error::Ble(BleError::NotConnected));
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::Dispatching);
    assert_eq!(block_on(machine.step()), PowerState::DisconnectedDrain);
    assert_eq!(block_on(machine.step()), PowerState::DeepSleepEvaluate);
}

#[test]
fn peripheral_fault_reboots() {
    let lines = RawInputSample::IDLE.with_pressed(Button::Forward);
    let w = connected_world(&[(WakeSource::Forward, lines)]);
    let fault = Error::Peripheral(PeripheralFault::SoftDevice(0x3002));
    w.borrow_mut().fail_next_send = Some(fault);
    let mut machine = with_sensor(&w);

    assert_eq!(block_on(machine.run()), RebootCause::Fault(fault));
    assert_eq!(machine.state(), PowerState::Reboot(RebootCause::Fault(fault)));
}

#[test]
fn charging_sleep_watches_for_charge_end() {
    let w = world();
    {
        let mut b = w.borrow_mut();
        b.charge = ChargeState::Charging;
        b.wakes.push_back((WakeSource::ChargeStopped, RawInputSample::IDLE));
    }
    let mut machine = with_sensor(&w);

    let visited = step_until(&mut machine, |s| matches!(s, PowerState::Reboot(_)));
    assert!(visited.contains(&PowerState::DeepSleepCharging));
    assert!(!visited.contains(&PowerState::DeepSleepIdle));
    assert_eq!(
        machine.state(),
        PowerState::Reboot(RebootCause::ChargeStopped)
    );

    let b = w.borrow();
    assert_eq!(b.sleeps, vec![WakeSet::dormant(WakeSource::ChargeStopped)]);
    assert_eq!(b.charge_waits, vec![ChargeState::NotCharging]);
}

#[test]
fn back_power_held_at_charge_end_reboots_as_power_button() {
    let w = world();
    {
        let mut b = w.borrow_mut();
        b.charge = ChargeState::Charging;
        b.wakes.push_back((
            WakeSource::ChargeStopped,
            RawInputSample::IDLE.with_pressed(Button::BackPower),
        ));
    }
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::DeepSleepCharging);
    let sweeps_before = w.borrow().lit_count;
    assert_eq!(
        block_on(machine.step()),
        PowerState::Reboot(RebootCause::PowerButton)
    );
    assert_eq!(w.borrow().lit_count, sweeps_before);
}

#[test]
fn unknown_charge_state_sleeps_idle_and_wakes_on_cable() {
    let w = world();
    {
        let mut b = w.borrow_mut();
        b.charge = ChargeState::Unknown;
        b.wakes.push_back((WakeSource::ChargeStarted, RawInputSample::IDLE));
    }
    let mut machine = without_sensor(&w);

    assert_eq!(block_on(machine.run()), RebootCause::ChargeStarted);
    assert_eq!(
        w.borrow().sleeps,
        vec![WakeSet::dormant(WakeSource::ChargeStarted)]
    );
}

#[test]
fn charge_state_is_sampled_at_the_decision_not_at_boot() {
    let w = world();
    let mut machine = with_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::DeepSleepEvaluate);
    // Cable plugged in while advertising.
    w.borrow_mut().charge = ChargeState::Charging;
    assert_eq!(block_on(machine.step()), PowerState::DeepSleepCharging);
}

#[test]
fn farewell_sweep_lights_every_channel_once() {
    let w = world();
    let mut machine = without_sensor(&w);

    step_until(&mut machine, |s| s == PowerState::DeepSleepEvaluate);
    let before = w.borrow().lit_count;
    block_on(machine.step());
    let after = w.borrow().lit_count;
    for channel in IndicatorChannel::ALL {
        let i = channel_index(channel);
        assert_eq!(after[i], before[i] + 1, "{:?}", channel);
    }
    assert_eq!(w.borrow().lit, [false; 4]);
}
