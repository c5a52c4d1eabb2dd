//! # Gait Controller
//!
//! Motion state machine for the fish. Owned by the control task, ticked once
//! per control period with a monotonic millisecond timestamp.
//!
//! ## Modes
//!
//! ```text
//!            apply_command (no turn running)
//!   Stop <----------------------------------> Forward
//!    ^  \                                     /   ^
//!    |   +--> TurnLeft        TurnRight <----+    |
//!    |          |                  |              |
//!    +----------+ half swing       +--------------+ half swing
//! ```
//!
//! A turn runs `Preparing` (eased move to the lean pose) and then `Swinging`
//! (one half oscillation around the lean pose). A finished left turn drops to
//! Stop, a finished right turn resumes Forward.
//!
//! ## Phase Counter
//!
//! The counter runs over `[0, 628)`; `counter / 100` is the oscillator phase in
//! radians, so one full cycle is 628 steps.

use serde::Serialize;
use tracing::debug;

use crate::config::GaitConfig;
use crate::sbus::mapper::{Action, Command};

/// Steps in one full oscillation (2π × 100)
pub const PHASE_PERIOD: u16 = 628;

/// Steps in a half oscillation; a turn swing ends after this many
pub const HALF_PERIOD: u16 = 314;

/// Counter steps per radian
const PHASE_SCALE: f32 = 100.0;

/// Servo travel limits in degrees
pub const ANGLE_MIN: f32 = 0.0;
pub const ANGLE_MAX: f32 = 180.0;

/// Tail lags the body by a quarter cycle when swimming forward
const TAIL_PHASE_LAG: f32 = 1.57;

/// Oscillation gains relative to the amplitude
const BODY_GAIN: f32 = 0.6;
const TAIL_GAIN: f32 = 0.8;

/// Lean offsets for turns, in degrees
const TURN_BODY_BIAS: f32 = 20.0;
const TURN_TAIL_BIAS: f32 = 15.0;

/// Extra lean at the end of preparation, relative to the amplitude
const PREPARE_BODY_GAIN: f32 = 0.3;
const PREPARE_TAIL_GAIN: f32 = 0.45;

/// Tail blends in slower than the body during the swing
const TAIL_BLEND_RATIO: f32 = 0.6;

/// Counter value at swing start: sin = -1 for left, +1 for right
const LEFT_SWING_ENTRY: u16 = 471;
const RIGHT_SWING_ENTRY: u16 = 157;

/// Motion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GaitMode {
    Stop,
    Forward,
    TurnLeft,
    TurnRight,
}

impl From<Action> for GaitMode {
    fn from(action: Action) -> Self {
        match action {
            Action::Stop => Self::Stop,
            Action::Forward => Self::Forward,
            Action::TurnLeft => Self::TurnLeft,
            Action::TurnRight => Self::TurnRight,
        }
    }
}

impl GaitMode {
    /// Whether this mode is a turn sequence.
    #[must_use]
    pub fn is_turn(self) -> bool {
        matches!(self, Self::TurnLeft | Self::TurnRight)
    }
}

/// Turn sub-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Preparing,
    Swinging,
}

/// Body and tail servo angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServoAngles {
    pub body: f32,
    pub tail: f32,
}

impl ServoAngles {
    #[must_use]
    pub fn new(body: f32, tail: f32) -> Self {
        Self { body, tail }
    }

    /// Both angles limited to the servo travel.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            body: self.body.clamp(ANGLE_MIN, ANGLE_MAX),
            tail: self.tail.clamp(ANGLE_MIN, ANGLE_MAX),
        }
    }
}

/// Point-in-time view of the controller, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaitSnapshot {
    pub mode: GaitMode,
    /// Present only while turning
    pub phase: Option<TurnPhase>,
    pub counter: u16,
    pub angles: ServoAngles,
    pub command: Command,
}

/// Side-specific turn constants.
#[derive(Debug, Clone, Copy)]
struct Turn {
    /// -1 for left, +1 for right
    sign: f32,
    entry: u16,
    exit: GaitMode,
}

impl Turn {
    fn for_mode(mode: GaitMode) -> Option<Self> {
        match mode {
            GaitMode::TurnLeft => Some(Self {
                sign: -1.0,
                entry: LEFT_SWING_ENTRY,
                exit: GaitMode::Stop,
            }),
            GaitMode::TurnRight => Some(Self {
                sign: 1.0,
                entry: RIGHT_SWING_ENTRY,
                exit: GaitMode::Forward,
            }),
            _ => None,
        }
    }
}

/// Quadratic ease-in-out on `[0, 1]`.
#[must_use]
pub fn ease_in_out_quad(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    if p < 0.5 {
        2.0 * p * p
    } else {
        1.0 - 2.0 * (1.0 - p) * (1.0 - p)
    }
}

/// Gait state machine.
///
/// # Examples
///
/// ```
/// use robofish::config::GaitConfig;
/// use robofish::gait::{GaitController, GaitMode};
/// use robofish::sbus::mapper::Command;
///
/// let mut gait = GaitController::new(GaitConfig::default());
/// gait.apply_command(Command::forward(5));
/// assert_eq!(gait.mode(), GaitMode::Forward);
///
/// let angles = gait.tick(0);
/// assert!((angles.body - 97.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct GaitController {
    config: GaitConfig,
    mode: GaitMode,
    phase: TurnPhase,
    counter: u16,
    angles: ServoAngles,
    forward_final: ServoAngles,
    prepare_start: Option<u64>,
    swing_start: u64,
    swing_entry: u16,
    command: Command,
}

impl GaitController {
    /// Creates a stopped controller at the rest pose.
    #[must_use]
    pub fn new(config: GaitConfig) -> Self {
        let rest = ServoAngles::new(config.body_rest, config.tail_rest).clamped();
        Self {
            config,
            mode: GaitMode::Stop,
            phase: TurnPhase::Preparing,
            counter: 0,
            angles: rest,
            forward_final: rest,
            prepare_start: None,
            swing_start: 0,
            swing_entry: 0,
            command: Command::stop(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> GaitMode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    #[must_use]
    pub fn counter(&self) -> u16 {
        self.counter
    }

    #[must_use]
    pub fn angles(&self) -> ServoAngles {
        self.angles
    }

    /// Most recently applied command.
    #[must_use]
    pub fn latched_command(&self) -> Command {
        self.command
    }

    #[must_use]
    pub fn snapshot(&self) -> GaitSnapshot {
        GaitSnapshot {
            mode: self.mode,
            phase: self.mode.is_turn().then_some(self.phase),
            counter: self.counter,
            angles: self.angles,
            command: self.command,
        }
    }

    fn rest(&self) -> ServoAngles {
        ServoAngles::new(self.config.body_rest, self.config.tail_rest).clamped()
    }

    /// Latches `command`; the mode follows it unless a turn is running.
    pub fn apply_command(&mut self, command: Command) {
        self.command = command;
        if self.mode.is_turn() {
            return;
        }

        let mode = GaitMode::from(command.action);
        if mode != self.mode {
            debug!("Gait mode {:?} -> {:?}", self.mode, mode);
            self.enter(mode);
        }
    }

    /// Drops to Stop immediately, abandoning any turn in progress.
    pub fn force_stop(&mut self) {
        self.command = Command::stop();
        if self.mode != GaitMode::Stop {
            debug!("Gait forced to Stop from {:?}", self.mode);
            self.enter(GaitMode::Stop);
        }
    }

    fn enter(&mut self, mode: GaitMode) {
        self.mode = mode;
        if mode.is_turn() {
            self.phase = TurnPhase::Preparing;
            self.prepare_start = None;
        }
    }

    /// Advances one control period and returns the servo targets.
    pub fn tick(&mut self, now_ms: u64) -> ServoAngles {
        match self.mode {
            GaitMode::Stop => self.stop_step(),
            GaitMode::Forward => self.forward_step(),
            GaitMode::TurnLeft | GaitMode::TurnRight => {
                if let Some(turn) = Turn::for_mode(self.mode) {
                    if self.phase == TurnPhase::Preparing {
                        self.prepare_step(turn, now_ms);
                    }
                    if self.phase == TurnPhase::Swinging {
                        self.swing_step(turn, now_ms);
                    }
                }
            }
        }
        self.angles
    }

    fn stop_step(&mut self) {
        let rest = self.rest();
        self.angles = rest;
        self.forward_final = rest;
        self.counter = 0;
        self.phase = TurnPhase::Preparing;
        self.prepare_start = None;
    }

    fn forward_step(&mut self) {
        let a = self.config.amplitude;
        let radian = f32::from(self.counter) / PHASE_SCALE;

        self.angles = ServoAngles::new(
            self.config.body_rest + a * BODY_GAIN * radian.sin(),
            self.config.tail_rest + a * TAIL_GAIN * (radian - TAIL_PHASE_LAG).sin(),
        )
        .clamped();
        self.forward_final = self.angles;

        self.counter = (self.counter + u16::from(self.command.speed)) % PHASE_PERIOD;
    }

    fn prepare_step(&mut self, turn: Turn, now_ms: u64) {
        let start = *self.prepare_start.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(start) as f32;
        let progress = (elapsed / self.config.prepare_ms as f32).min(1.0);
        let eased = ease_in_out_quad(progress);

        let a = self.config.amplitude;
        let target = ServoAngles::new(
            self.config.body_rest + turn.sign * (TURN_BODY_BIAS + a * PREPARE_BODY_GAIN),
            self.config.tail_rest + turn.sign * (TURN_TAIL_BIAS + a * PREPARE_TAIL_GAIN),
        );
        let from = self.forward_final;

        self.angles = ServoAngles::new(
            from.body + (target.body - from.body) * eased,
            from.tail + (target.tail - from.tail) * eased,
        )
        .clamped();

        if progress >= 1.0 {
            debug!("Turn preparation complete, swinging from counter {}", turn.entry);
            self.phase = TurnPhase::Swinging;
            self.counter = turn.entry;
            self.swing_entry = turn.entry;
            self.swing_start = now_ms;
        }
    }

    fn swing_step(&mut self, turn: Turn, now_ms: u64) {
        let a = self.config.amplitude;
        let oscillation = (f32::from(self.counter) / PHASE_SCALE).sin();

        let elapsed = now_ms.saturating_sub(self.swing_start) as f32;
        let body_blend = (elapsed / self.config.swing_blend_ms as f32).min(1.0);
        let tail_blend = (body_blend * TAIL_BLEND_RATIO).min(1.0);

        let target_body =
            self.config.body_rest + turn.sign * TURN_BODY_BIAS + a * BODY_GAIN * oscillation;
        let target_tail =
            self.config.tail_rest + turn.sign * TURN_TAIL_BIAS + a * TAIL_GAIN * oscillation;

        self.angles = ServoAngles::new(
            self.angles.body + (target_body - self.angles.body) * body_blend,
            self.angles.tail + (target_tail - self.angles.tail) * tail_blend,
        )
        .clamped();

        self.counter = (self.counter + self.config.swing_step) % PHASE_PERIOD;

        let travelled = (self.counter + PHASE_PERIOD - self.swing_entry) % PHASE_PERIOD;
        if travelled >= HALF_PERIOD {
            debug!("Turn complete, {:?} -> {:?}", self.mode, turn.exit);
            self.mode = turn.exit;
            self.phase = TurnPhase::Preparing;
            self.prepare_start = None;
            self.forward_final = self.angles;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn controller() -> GaitController {
        GaitController::new(GaitConfig::default())
    }

    fn assert_in_range(angles: ServoAngles) {
        assert!(angles.body.is_finite() && angles.tail.is_finite());
        assert!((ANGLE_MIN..=ANGLE_MAX).contains(&angles.body), "body {}", angles.body);
        assert!((ANGLE_MIN..=ANGLE_MAX).contains(&angles.tail), "tail {}", angles.tail);
    }

    /// Ticks at 1 ms spacing from `start` until the mode leaves `mode`.
    /// Returns the number of ticks and the next timestamp.
    fn run_while(gait: &mut GaitController, mode: GaitMode, start: u64) -> (u32, u64) {
        let mut now = start;
        let mut ticks = 0;
        while gait.mode() == mode {
            assert_in_range(gait.tick(now));
            now += 1;
            ticks += 1;
            assert!(ticks < 10_000, "turn never finished");
        }
        (ticks, now)
    }

    #[test]
    fn test_starts_stopped_at_rest() {
        let gait = controller();
        assert_eq!(gait.mode(), GaitMode::Stop);
        assert_eq!(gait.angles(), ServoAngles::new(97.0, 90.0));
        assert_eq!(gait.latched_command(), Command::stop());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut gait = controller();
        gait.apply_command(Command::stop());
        let first = gait.tick(0);
        for now in 1..50 {
            gait.apply_command(Command::stop());
            assert_eq!(gait.tick(now), first);
            assert_eq!(gait.counter(), 0);
        }
        assert_eq!(first, ServoAngles::new(97.0, 90.0));
    }

    #[test]
    fn test_forward_waveform() {
        let mut gait = controller();
        gait.apply_command(Command::forward(5));

        let angles = gait.tick(0);
        assert!((angles.body - 97.0).abs() < EPS);
        // 90 + 24 sin(-1.57)
        assert!((angles.tail - 66.0).abs() < 0.01);
        assert_eq!(gait.counter(), 5);

        // Counter 157 is a quarter cycle: body at its peak
        let mut gait = controller();
        gait.apply_command(Command::forward(157));
        gait.tick(0);
        let angles = gait.tick(1);
        assert!((angles.body - 115.0).abs() < 0.01);
    }

    #[test]
    fn test_forward_counter_wraps() {
        let mut gait = controller();
        gait.apply_command(Command::forward(10));
        for now in 0..63 {
            gait.tick(now);
        }
        assert_eq!(gait.counter(), 630 % PHASE_PERIOD);
    }

    #[test]
    fn test_forward_then_left_turn_end_to_end() {
        let mut gait = controller();
        gait.apply_command(Command::forward(5));
        for now in 0..200 {
            assert_in_range(gait.tick(now));
        }
        assert_eq!(gait.counter(), (200 * 5) % PHASE_PERIOD);
        let forward_pose = gait.angles();

        gait.apply_command(Command::turn(Action::TurnLeft, 5));
        assert_eq!(gait.mode(), GaitMode::TurnLeft);
        assert_eq!(gait.phase(), TurnPhase::Preparing);

        // First prepare tick starts from the last forward pose
        assert_eq!(gait.tick(200), forward_pose);

        for now in 201..900 {
            gait.tick(now);
            assert_eq!(gait.phase(), TurnPhase::Preparing, "t={}", now);
        }

        // Preparation completes at 700 ms and the first swing step runs at once
        gait.tick(900);
        assert_eq!(gait.phase(), TurnPhase::Swinging);
        assert_eq!(gait.counter(), LEFT_SWING_ENTRY + 4);
        let lean = gait.angles();
        assert!((lean.body - 68.0).abs() < EPS);
        assert!((lean.tail - 61.5).abs() < EPS);

        // Half a cycle at 4 steps per tick: 79 swing ticks in total
        let (ticks, now) = run_while(&mut gait, GaitMode::TurnLeft, 901);
        assert_eq!(ticks, 78);
        assert_eq!(gait.mode(), GaitMode::Stop);

        assert_eq!(gait.tick(now), ServoAngles::new(97.0, 90.0));
    }

    #[test]
    fn test_right_turn_resumes_forward() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnRight, 7));

        let (ticks, _) = run_while(&mut gait, GaitMode::TurnRight, 0);
        assert_eq!(ticks, 700 + 79);
        assert_eq!(gait.mode(), GaitMode::Forward);
        assert_eq!(gait.latched_command().speed, 7);
    }

    #[test]
    fn test_left_turn_ends_stopped() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnLeft, 7));

        let (ticks, _) = run_while(&mut gait, GaitMode::TurnLeft, 0);
        assert_eq!(ticks, 700 + 79);
        assert_eq!(gait.mode(), GaitMode::Stop);
    }

    #[test]
    fn test_right_prepare_target_from_rest() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnRight, 5));
        gait.tick(1000);
        gait.tick(1700);

        // 97 + 20 + 9, 90 + 15 + 13.5
        assert_eq!(gait.phase(), TurnPhase::Swinging);
        assert!((gait.angles().body - 126.0).abs() < EPS);
        assert!((gait.angles().tail - 118.5).abs() < EPS);
    }

    #[test]
    fn test_prepare_is_eased() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnLeft, 5));
        gait.tick(0);

        // Quarter time is an eighth of the way, half time is half way
        gait.tick(175);
        assert!((gait.angles().body - (97.0 - 29.0 * 0.125)).abs() < EPS);
        gait.tick(350);
        assert!((gait.angles().body - (97.0 - 29.0 * 0.5)).abs() < EPS);
    }

    #[test]
    fn test_commands_latched_during_turn() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnLeft, 5));
        gait.tick(0);

        gait.apply_command(Command::forward(9));
        assert_eq!(gait.mode(), GaitMode::TurnLeft);
        assert_eq!(gait.latched_command(), Command::forward(9));

        gait.apply_command(Command::stop());
        assert_eq!(gait.mode(), GaitMode::TurnLeft);

        run_while(&mut gait, GaitMode::TurnLeft, 1);
        assert_eq!(gait.mode(), GaitMode::Stop);

        // Once finished, commands take effect again
        gait.apply_command(Command::forward(9));
        assert_eq!(gait.mode(), GaitMode::Forward);
    }

    #[test]
    fn test_force_stop_overrides_turn() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnRight, 5));
        for now in 0..300 {
            gait.tick(now);
        }

        gait.force_stop();
        assert_eq!(gait.mode(), GaitMode::Stop);
        assert_eq!(gait.latched_command(), Command::stop());
        assert_eq!(gait.tick(300), ServoAngles::new(97.0, 90.0));
    }

    #[test]
    fn test_new_turn_restarts_preparation() {
        let mut gait = controller();
        gait.apply_command(Command::turn(Action::TurnRight, 5));
        let (_, now) = run_while(&mut gait, GaitMode::TurnRight, 0);
        assert_eq!(gait.mode(), GaitMode::Forward);

        gait.apply_command(Command::turn(Action::TurnRight, 5));
        gait.tick(now + 5000);
        assert_eq!(gait.phase(), TurnPhase::Preparing);
    }

    #[test]
    fn test_angles_clamped() {
        let config = GaitConfig {
            amplitude: 60.0,
            body_rest: 175.0,
            tail_rest: 5.0,
            ..GaitConfig::default()
        };
        let mut gait = GaitController::new(config);
        gait.apply_command(Command::forward(10));
        for now in 0..200 {
            assert_in_range(gait.tick(now));
        }

        gait.apply_command(Command::turn(Action::TurnRight, 10));
        run_while(&mut gait, GaitMode::TurnRight, 200);
    }

    #[test]
    fn test_snapshot_reports_phase_only_when_turning() {
        let mut gait = controller();
        assert_eq!(gait.snapshot().phase, None);

        gait.apply_command(Command::turn(Action::TurnLeft, 3));
        let snapshot = gait.snapshot();
        assert_eq!(snapshot.mode, GaitMode::TurnLeft);
        assert_eq!(snapshot.phase, Some(TurnPhase::Preparing));
        assert_eq!(snapshot.command.action, Action::TurnLeft);
    }

    #[test]
    fn test_ease_in_out_quad() {
        assert_eq!(ease_in_out_quad(0.0), 0.0);
        assert_eq!(ease_in_out_quad(0.5), 0.5);
        assert_eq!(ease_in_out_quad(1.0), 1.0);
        assert!((ease_in_out_quad(0.25) - 0.125).abs() < EPS);
        assert!((ease_in_out_quad(0.75) - 0.875).abs() < EPS);
        assert_eq!(ease_in_out_quad(2.0), 1.0);
    }
}
