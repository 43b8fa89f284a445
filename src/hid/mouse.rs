//! HID mouse report and the center-tap pointer gesture.
//!
//! Layout (4 bytes):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left, Bit 1 = Right, Bit 2 = Middle
//! Byte 1: X displacement (signed, -127..127)
//! Byte 2: Y displacement (signed, -127..127)
//! Byte 3: Scroll wheel  (signed, -127..127)
//! ```
//!
//! The reader has no absolute pointer, so a "tap near the middle of the
//! screen" is a relative trajectory: slam into the top-left corner with
//! repeated moves, step back toward the target, click, release.

/// Mouse report size in bytes.
pub const MOUSE_REPORT_SIZE: usize = 4;

/// Left button bit.
pub const BUTTON_LEFT: u8 = 0x01;

/// Standard HID boot-protocol mouse report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield (bit 0 = left, bit 1 = right, bit 2 = middle).
    pub buttons: u8,
    /// Relative X movement (signed).
    pub x: i8,
    /// Relative Y movement (signed).
    pub y: i8,
    /// Scroll wheel delta (signed).
    pub wheel: i8,
}

impl MouseReport {
    /// Create an idle (no movement, no buttons) report.
    pub const fn empty() -> Self {
        Self {
            buttons: 0,
            x: 0,
            y: 0,
            wheel: 0,
        }
    }

    pub const fn movement(x: i8, y: i8) -> Self {
        Self {
            buttons: 0,
            x,
            y,
            wheel: 0,
        }
    }

    /// Serialise into a byte slice for HID transmission.
    /// Returns the number of bytes written (always 4).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1] = self.x as u8;
        buf[2] = self.y as u8;
        buf[3] = self.wheel as u8;
        MOUSE_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; MOUSE_REPORT_SIZE] {
        let mut buf = [0u8; MOUSE_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }

    /// Returns `true` when no buttons are pressed and there is no movement.
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0 && self.wheel == 0
    }
}

/// Calibration for the double-tap "touch the middle" trajectory.
///
/// Desired screen movement is split into steps because hosts clamp and
/// accelerate large deltas. Tuned on a 1072x1448 e-ink reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CenterTapGesture {
    /// Per-move step toward the home corner.
    /// Stored as i16 and split into i8-sized reports on the wire.
    pub home_step: (i16, i16),
    pub home_moves: u8,
    /// Per-move step from the corner toward the target.
    pub approach_step: (i16, i16),
    pub approach_moves: u8,
    /// Pause between movement reports (ms); roughly the host's poll period.
    pub move_interval_ms: u32,
}

impl Default for CenterTapGesture {
    fn default() -> Self {
        Self {
            home_step: (-108, -145),
            home_moves: 10,
            approach_step: (108, 133),
            approach_moves: 5,
            move_interval_ms: 60,
        }
    }
}

/// Where a gesture report sits in the trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GesturePhase {
    Home,
    Approach,
    Click,
    Release,
}

/// One report of the gesture plus whether the sender should pause after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GestureStep {
    pub phase: GesturePhase,
    pub report: MouseReport,
    /// Last report of one logical move; pause `move_interval_ms` after it.
    pub ends_move: bool,
}

impl CenterTapGesture {
    /// Every report to send, in order.
    pub fn reports(&self) -> CenterTapReports {
        CenterTapReports {
            gesture: *self,
            phase: GesturePhase::Home,
            moves_done: 0,
            remaining: (0, 0),
            started: false,
            done: false,
        }
    }
}

/// Iterator over the gesture's reports.
///
/// A logical step larger than an i8 is emitted as several reports whose
/// deltas add up to the step.
pub struct CenterTapReports {
    gesture: CenterTapGesture,
    phase: GesturePhase,
    moves_done: u8,
    remaining: (i16, i16),
    started: bool,
    done: bool,
}

fn take_chunk(v: &mut i16) -> i8 {
    let chunk = (*v).clamp(-127, 127);
    *v -= chunk;
    chunk as i8
}

impl CenterTapReports {
    fn phase_plan(&self) -> Option<((i16, i16), u8)> {
        match self.phase {
            GesturePhase::Home => Some((self.gesture.home_step, self.gesture.home_moves)),
            GesturePhase::Approach => {
                Some((self.gesture.approach_step, self.gesture.approach_moves))
            }
            GesturePhase::Click | GesturePhase::Release => None,
        }
    }

    fn advance_phase(&mut self) {
        self.phase = match self.phase {
            GesturePhase::Home => GesturePhase::Approach,
            GesturePhase::Approach => GesturePhase::Click,
            GesturePhase::Click => GesturePhase::Release,
            GesturePhase::Release => {
                self.done = true;
                GesturePhase::Release
            }
        };
        self.moves_done = 0;
        self.started = false;
    }
}

impl Iterator for CenterTapReports {
    type Item = GestureStep;

    fn next(&mut self) -> Option<GestureStep> {
        loop {
            if self.done {
                return None;
            }
            match self.phase_plan() {
                Some((step, moves)) => {
                    if !self.started {
                        if self.moves_done >= moves {
                            self.advance_phase();
                            continue;
                        }
                        self.remaining = step;
                        self.started = true;
                    }
                    let x = take_chunk(&mut self.remaining.0);
                    let y = take_chunk(&mut self.remaining.1);
                    let ends_move = self.remaining == (0, 0);
                    if ends_move {
                        self.started = false;
                        self.moves_done += 1;
                    }
                    return Some(GestureStep {
                        phase: self.phase,
                        report: MouseReport::movement(x, y),
                        ends_move,
                    });
                }
                None => {
                    let phase = self.phase;
                    let report = if phase == GesturePhase::Click {
                        MouseReport {
                            buttons: BUTTON_LEFT,
                            ..MouseReport::empty()
                        }
                    } else {
                        MouseReport::empty()
                    };
                    self.advance_phase();
                    return Some(GestureStep {
                        phase,
                        report,
                        ends_move: false,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(steps: &[GestureStep], phase: GesturePhase) -> (i32, i32) {
        steps
            .iter()
            .filter(|s| s.phase == phase)
            .fold((0, 0), |(x, y), s| (x + s.report.x as i32, y + s.report.y as i32))
    }

    fn collect(g: &CenterTapGesture) -> heapless::Vec<GestureStep, 64> {
        g.reports().collect()
    }

    #[test]
    fn default_gesture_moves_home_then_approaches_then_clicks() {
        let steps = collect(&CenterTapGesture::default());
        assert_eq!(net(&steps, GesturePhase::Home), (-1080, -1450));
        assert_eq!(net(&steps, GesturePhase::Approach), (540, 665));

        let moves = |p: GesturePhase| steps.iter().filter(|s| s.phase == p && s.ends_move).count();
        assert_eq!(moves(GesturePhase::Home), 10);
        assert_eq!(moves(GesturePhase::Approach), 5);

        let tail = &steps[steps.len() - 2..];
        assert_eq!(tail[0].phase, GesturePhase::Click);
        assert_eq!(tail[0].report.buttons, BUTTON_LEFT);
        assert!(tail[0].report.x == 0 && tail[0].report.y == 0);
        assert_eq!(tail[1].phase, GesturePhase::Release);
        assert!(tail[1].report.is_idle());
    }

    #[test]
    fn oversized_steps_are_split_into_i8_reports() {
        let steps = collect(&CenterTapGesture::default());
        // -145 does not fit in one report: -127 then -18.
        assert_eq!(steps[0].report, MouseReport::movement(-108, -127));
        assert!(!steps[0].ends_move);
        assert_eq!(steps[1].report, MouseReport::movement(0, -18));
        assert!(steps[1].ends_move);
    }

    #[test]
    fn small_steps_are_one_report_each() {
        let g = CenterTapGesture {
            home_step: (-10, -10),
            home_moves: 2,
            approach_step: (5, 5),
            approach_moves: 1,
            move_interval_ms: 0,
        };
        let steps = collect(&g);
        assert_eq!(steps.len(), 2 + 1 + 2);
        assert!(steps[..3].iter().all(|s| s.ends_move));
    }

    #[test]
    fn zero_moves_still_clicks() {
        let g = CenterTapGesture {
            home_moves: 0,
            approach_moves: 0,
            ..CenterTapGesture::default()
        };
        let steps = collect(&g);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].phase, GesturePhase::Click);
    }

    #[test]
    fn mouse_report_serializes_signed_deltas() {
        let report = MouseReport {
            buttons: 0x01,
            x: -10,
            y: 20,
            wheel: 0,
        };
        assert_eq!(report.to_bytes(), [0x01, 0xF6, 0x14, 0x00]);
        let mut small = [0u8; 2];
        assert_eq!(report.serialize(&mut small), 0);
    }
}
