//! Motion controller — per-tick orchestration and command handling.
//!
//! Ties the accumulator, tracker, presence detector, target resolver
//! and speed mapper together once per tick and issues the motor
//! command. Also owns the manual-override and stop/reset entry points
//! plus the lifecycle hooks (online/offline/ping/end-stop).
//!
//! Every invalid input degrades to "no motor movement"; there is no
//! fatal path in this module.

use std::sync::Arc;

use bitflags::bitflags;
use shade_common::command::{ShadeCommand, TurnDirection};
use shade_common::hal::{
    Direction, Indicator, LedColor, MANUAL_TURN_DUTY, MotorCommand, MotorDriver, PresenceSensor,
};
use shade_common::params::{ParamWriteback, Params};
use shade_common::telemetry::TelemetrySink;
use tracing::{debug, info, warn};

use crate::presence::PresenceDetector;
use crate::rotation::RotationAccumulator;
use crate::speed::{SpeedProfile, map_speed};
use crate::target::{Mode, resolve_target};
use crate::tracker::PositionTracker;

bitflags! {
    /// Degraded-condition markers, visible to logs and tests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        /// End stop reported since the last reset.
        const END_STOP = 0b0000_0001;
        /// Automation held because heights are unusable.
        const HOLD = 0b0000_0010;
    }
}

/// Explicitly-owned mutable controller state.
///
/// Passed through the component calls instead of living in globals,
/// so ticks are deterministic and unit-testable.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    pub tracker: PositionTracker,
    pub presence: PresenceDetector,
    /// Desired position [units].
    pub target: f64,
    /// Manual drive active (user turn in progress).
    pub manual_drive: bool,
    pub flags: StatusFlags,
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}

/// The control core orchestrator.
pub struct MotionController {
    state: ControllerState,
    params: Params,
    accumulator: Arc<RotationAccumulator>,
    motor: Box<dyn MotorDriver>,
    pir: Box<dyn PresenceSensor>,
    indicator: Box<dyn Indicator>,
    telemetry: Box<dyn TelemetrySink>,
    writeback: Box<dyn ParamWriteback>,
    rng: XorShift64,
}

impl MotionController {
    /// Build a controller around already-initialized drivers.
    ///
    /// The accumulator is passed in because the encoder source needs
    /// the sink handle before the controller exists; its invert flag
    /// is aligned with `params` here.
    ///
    /// `params` must have passed validation (the config loader does
    /// this); runtime snapshots that fail validation are rejected by
    /// [`MotionController::update_params`] instead.
    pub fn new(
        params: Params,
        accumulator: Arc<RotationAccumulator>,
        motor: Box<dyn MotorDriver>,
        pir: Box<dyn PresenceSensor>,
        indicator: Box<dyn Indicator>,
        telemetry: Box<dyn TelemetrySink>,
        writeback: Box<dyn ParamWriteback>,
    ) -> Self {
        accumulator.set_invert(params.invert_encoder);
        Self {
            state: ControllerState::default(),
            params,
            accumulator,
            motor,
            pir,
            indicator,
            telemetry,
            writeback,
            rng: XorShift64::new(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Shared sink handle for the asynchronous encoder source.
    pub fn rotation_sink(&self) -> Arc<RotationAccumulator> {
        Arc::clone(&self.accumulator)
    }

    /// Current controller state (inspection).
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Current parameter snapshot (inspection).
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Operating mode for this tick. Manual wins over automated.
    #[inline]
    pub fn mode(&self) -> Mode {
        Mode::derive(self.state.manual_drive, self.params.automate)
    }

    // ─── Tick Orchestration ─────────────────────────────────────────

    /// Execute one control tick.
    ///
    /// Order matters: the presence threshold uses the pre-integration
    /// position, the rotation delta is drained exactly once, manual
    /// drive exits before any target or speed work, and the motor
    /// command is issued every tick (drivers may no-op on unchanged
    /// commands, but we do not rely on it).
    pub fn tick(&mut self, now_ms: u64) {
        // 1. Presence: adaptive threshold from the current position,
        //    sample, publish on edge only.
        let threshold = PresenceDetector::threshold_for(
            self.state.tracker.position(),
            self.params.rise_height,
            self.params.pir_sensitivity,
        );
        let raw = self.pir.read();
        if self
            .state
            .presence
            .on_sample(raw, threshold, now_ms, self.params.pir_interval_ms)
        {
            let active = self.state.presence.active();
            info!(active, raw, threshold, "motion edge");
            self.telemetry.publish_motion(active);
        }

        // 2. Drain the accumulator once and integrate; publish on
        //    threshold-exceeding change.
        let delta = self.accumulator.drain();
        self.state
            .tracker
            .integrate(delta, self.params.winding_length);
        if let Some(position) = self.state.tracker.poll_report() {
            debug!(position, "position report");
            self.telemetry.publish_position(position);
        }

        // 3. Manual drive: motor already set by the command handler.
        if self.state.manual_drive {
            return;
        }

        // 4. Resolve the target.
        let mode = self.mode();
        if mode == Mode::Automated && !self.params.heights_valid() {
            if !self.state.flags.contains(StatusFlags::HOLD) {
                warn!("automation heights unusable; holding current target");
                self.state.flags.insert(StatusFlags::HOLD);
            }
        } else {
            self.state.flags.remove(StatusFlags::HOLD);
        }
        self.state.target = resolve_target(
            mode,
            self.state.presence.active(),
            self.state.target,
            &self.params,
        );

        // 5. Map the distance to a motor command and issue it.
        let error = self.state.target - self.state.tracker.position();
        let command = map_speed(error, &SpeedProfile::from_params(&self.params));
        self.apply_motor(command);
    }

    // ─── Command Handling ───────────────────────────────────────────

    /// Handle one external command.
    ///
    /// Commands that conflict with automation disable the automate
    /// tunable as an observable side effect, persisted through the
    /// write-back seam. Automation must be explicitly re-enabled.
    pub fn handle_command(&mut self, command: ShadeCommand) {
        debug!(?command, "command");
        match command {
            ShadeCommand::Flash { duration_ms } => {
                self.apply_indicator_flash(
                    LedColor::mono(self.params.flash_intensity),
                    duration_ms,
                );
            }

            ShadeCommand::FlashColor {
                red,
                green,
                blue,
                white,
                duration_ms,
            } => {
                self.apply_indicator_flash(LedColor::rgbw(red, green, blue, white), duration_ms);
            }

            ShadeCommand::Turn(direction) => {
                self.state.manual_drive = true;
                self.disable_automation();
                let direction = match direction {
                    TurnDirection::Up => Direction::Up,
                    TurnDirection::Down => Direction::Down,
                };
                self.apply_motor(MotorCommand::Drive {
                    direction,
                    magnitude: MANUAL_TURN_DUTY,
                });
            }

            ShadeCommand::Move { target } => {
                self.state.manual_drive = false;
                self.state.target = target;
                self.disable_automation();
            }

            ShadeCommand::Stop => {
                self.apply_motor(MotorCommand::Brake);
                self.state.manual_drive = false;
                self.state.target = self.state.tracker.position();
                self.disable_automation();
            }

            ShadeCommand::Reset { position } => {
                self.state.tracker.set_position(position);
                self.state.target = position;
                self.state.manual_drive = false;
                self.state.flags.remove(StatusFlags::END_STOP);
                self.disable_automation();
                self.writeback.persist_saved_position(position);
            }

            ShadeCommand::Disco => {
                let color = LedColor::rgbw(
                    self.rng.next_duty(),
                    self.rng.next_duty(),
                    self.rng.next_duty(),
                    self.rng.next_duty(),
                );
                if let Err(e) = self.indicator.set(color, 100) {
                    warn!(error = %e, "indicator set failed");
                }
            }
        }
    }

    // ─── Lifecycle Hooks ────────────────────────────────────────────

    /// Transport came up: hold still and show the idle light.
    pub fn on_online(&mut self) {
        self.apply_motor(MotorCommand::Brake);
        self.state.target = self.state.tracker.position();
        if let Err(e) = self
            .indicator
            .set(LedColor::mono(self.params.idle_light), 100)
        {
            warn!(error = %e, "indicator set failed");
        }
    }

    /// Transport went away: hold still, lights out.
    pub fn on_offline(&mut self) {
        self.apply_motor(MotorCommand::Brake);
        if let Err(e) = self.indicator.set(LedColor::off(), 100) {
            warn!(error = %e, "indicator set failed");
        }
    }

    /// Identify request: flash white for at least 100ms.
    pub fn on_ping(&mut self) {
        self.apply_indicator_flash(LedColor::mono(512), 100);
    }

    /// Physical limit reached: stop the motor, freeze the target where
    /// the estimate is so the next tick does not re-drive, and log.
    /// No position correction — the estimate stays honest about where
    /// it thinks it is. Automation may still retarget afterwards; the
    /// flag records the event either way.
    pub fn on_end_stop(&mut self) {
        warn!("end stop triggered");
        self.apply_motor(MotorCommand::Brake);
        self.state.target = self.state.tracker.position();
        self.state.flags.insert(StatusFlags::END_STOP);
    }

    /// Replace the parameter snapshot (external store update).
    ///
    /// Invalid snapshots are rejected and the previous tuning stays
    /// live; a valid one takes effect on the next tick.
    pub fn update_params(&mut self, params: Params) {
        if let Err(reason) = params.validate() {
            warn!(%reason, "parameter update rejected");
            return;
        }
        self.accumulator.set_invert(params.invert_encoder);
        self.params = params;
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn disable_automation(&mut self) {
        if self.params.automate {
            self.params.automate = false;
            info!("automation disabled by command");
            self.writeback.persist_automate(false);
        }
    }

    fn apply_motor(&mut self, command: MotorCommand) {
        if let Err(e) = self.motor.apply(command) {
            warn!(error = %e, "motor command failed");
        }
    }

    fn apply_indicator_flash(&mut self, color: LedColor, duration_ms: u32) {
        if let Err(e) = self.indicator.flash(color, duration_ms) {
            warn!(error = %e, "indicator flash failed");
        }
    }
}

// ─── Disco PRNG ─────────────────────────────────────────────────────

/// xorshift64* — indicator colors only, no entropy requirements.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Random duty in `0..=1023`.
    fn next_duty(&mut self) -> u16 {
        (self.next() & 0x3FF) as u16
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use shade_common::hal::HalError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // Recording test doubles. Handles are shared so assertions can
    // look inside after the controller takes ownership of the boxes.

    #[derive(Default)]
    struct MotorLog(Arc<Mutex<Vec<MotorCommand>>>);

    impl MotorDriver for MotorLog {
        fn apply(&mut self, command: MotorCommand) -> Result<(), HalError> {
            self.0.lock().unwrap().push(command);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedPir(Arc<Mutex<VecDeque<i32>>>);

    impl PresenceSensor for ScriptedPir {
        fn read(&mut self) -> i32 {
            self.0.lock().unwrap().pop_front().unwrap_or(0)
        }
    }

    #[derive(Default)]
    struct NullIndicator;

    impl Indicator for NullIndicator {
        fn set(&mut self, _color: LedColor, _fade_ms: u32) -> Result<(), HalError> {
            Ok(())
        }
        fn flash(&mut self, _color: LedColor, _duration_ms: u32) -> Result<(), HalError> {
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    enum Published {
        Motion(bool),
        Position(f64),
    }

    #[derive(Default)]
    struct TelemetryLog(Arc<Mutex<Vec<Published>>>);

    impl TelemetrySink for TelemetryLog {
        fn publish_motion(&mut self, active: bool) {
            self.0.lock().unwrap().push(Published::Motion(active));
        }
        fn publish_position(&mut self, position: f64) {
            self.0.lock().unwrap().push(Published::Position(position));
        }
    }

    #[derive(Debug, PartialEq)]
    enum Persisted {
        Automate(bool),
        SavedPosition(f64),
    }

    #[derive(Default)]
    struct WritebackLog(Arc<Mutex<Vec<Persisted>>>);

    impl ParamWriteback for WritebackLog {
        fn persist_automate(&mut self, enabled: bool) {
            self.0.lock().unwrap().push(Persisted::Automate(enabled));
        }
        fn persist_saved_position(&mut self, position: f64) {
            self.0
                .lock()
                .unwrap()
                .push(Persisted::SavedPosition(position));
        }
    }

    struct Rig {
        controller: MotionController,
        motor: Arc<Mutex<Vec<MotorCommand>>>,
        pir: Arc<Mutex<VecDeque<i32>>>,
        telemetry: Arc<Mutex<Vec<Published>>>,
        writeback: Arc<Mutex<Vec<Persisted>>>,
    }

    fn rig(params: Params) -> Rig {
        let motor = MotorLog::default();
        let pir = ScriptedPir::default();
        let telemetry = TelemetryLog::default();
        let writeback = WritebackLog::default();
        let (m, p, t, w) = (
            motor.0.clone(),
            pir.0.clone(),
            telemetry.0.clone(),
            writeback.0.clone(),
        );
        let accumulator = Arc::new(RotationAccumulator::new(params.invert_encoder));
        Rig {
            controller: MotionController::new(
                params,
                accumulator,
                Box::new(motor),
                Box::new(pir),
                Box::new(NullIndicator),
                Box::new(telemetry),
                Box::new(writeback),
            ),
            motor: m,
            pir: p,
            telemetry: t,
            writeback: w,
        }
    }

    fn base_params() -> Params {
        Params {
            invert_encoder: false,
            ..Params::default()
        }
    }

    fn last_motor(rig: &Rig) -> MotorCommand {
        *rig.motor.lock().unwrap().last().expect("no motor command")
    }

    #[test]
    fn idle_with_zero_error_brakes_every_tick() {
        let mut r = rig(base_params());
        r.controller.tick(0);
        r.controller.tick(10);
        let cmds = r.motor.lock().unwrap();
        assert_eq!(cmds.as_slice(), &[MotorCommand::Brake, MotorCommand::Brake]);
    }

    #[test]
    fn automation_drives_toward_idle_height_then_rise_on_motion() {
        let params = Params {
            automate: true,
            ..base_params()
        };
        let mut r = rig(params);

        // No motion: target = idle height (100), position 0 → drive up at max.
        r.controller.tick(0);
        assert_eq!(r.controller.state().target, 100.0);
        assert_eq!(
            last_motor(&r),
            MotorCommand::Drive {
                direction: Direction::Up,
                magnitude: 950
            }
        );

        // Motion burst (position 0 → threshold 0, any positive raw trips).
        r.pir.lock().unwrap().push_back(500);
        r.controller.tick(10);
        assert_eq!(r.controller.state().target, 150.0);
        assert_eq!(
            r.telemetry.lock().unwrap()[0],
            Published::Motion(true)
        );
    }

    #[test]
    fn integration_and_position_report() {
        let mut r = rig(base_params());
        let sink = r.controller.rotation_sink();
        sink.record(0.2); // 0.2 * 7.5 = 1.5 units
        r.controller.tick(0);
        assert_eq!(r.controller.state().tracker.position(), 1.5);
        assert!(
            r.telemetry
                .lock()
                .unwrap()
                .contains(&Published::Position(1.5))
        );
    }

    #[test]
    fn manual_turn_exits_early_and_disables_automation() {
        let params = Params {
            automate: true,
            ..base_params()
        };
        let mut r = rig(params);
        r.controller.handle_command(ShadeCommand::Turn(TurnDirection::Up));

        assert_eq!(
            last_motor(&r),
            MotorCommand::Drive {
                direction: Direction::Up,
                magnitude: MANUAL_TURN_DUTY
            }
        );
        assert_eq!(
            r.writeback.lock().unwrap().as_slice(),
            &[Persisted::Automate(false)]
        );

        // Ticks in manual mode must not recompute the motor command.
        let before = r.motor.lock().unwrap().len();
        r.controller.tick(0);
        r.controller.tick(10);
        assert_eq!(r.motor.lock().unwrap().len(), before);
        assert_eq!(r.controller.mode(), Mode::Manual);
    }

    #[test]
    fn stop_freezes_target_and_brakes() {
        let mut r = rig(base_params());
        let sink = r.controller.rotation_sink();
        sink.record(4.0); // position 30.0
        r.controller.handle_command(ShadeCommand::Move { target: 200.0 });
        r.controller.tick(0);
        assert!(matches!(last_motor(&r), MotorCommand::Drive { .. }));

        r.controller.handle_command(ShadeCommand::Stop);
        assert_eq!(last_motor(&r), MotorCommand::Brake);
        assert_eq!(r.controller.state().target, 30.0);

        // Next tick: error zero → brake again, no drive.
        r.controller.tick(10);
        assert_eq!(last_motor(&r), MotorCommand::Brake);
    }

    #[test]
    fn stop_mid_automation_disables_it() {
        let params = Params {
            automate: true,
            ..base_params()
        };
        let mut r = rig(params);
        r.controller.tick(0);
        r.controller.handle_command(ShadeCommand::Stop);
        assert!(!r.controller.params().automate);
        assert_eq!(r.controller.mode(), Mode::Idle);
        assert!(
            r.writeback
                .lock()
                .unwrap()
                .contains(&Persisted::Automate(false))
        );
        // Target stays frozen afterwards.
        r.controller.tick(10);
        assert_eq!(r.controller.state().target, 0.0);
    }

    #[test]
    fn reset_rezeroes_position_and_target_then_brakes() {
        let mut r = rig(base_params());
        r.controller.handle_command(ShadeCommand::Move { target: 200.0 });
        r.controller.tick(0);

        r.controller.handle_command(ShadeCommand::Reset { position: 42.0 });
        assert_eq!(r.controller.state().tracker.position(), 42.0);
        assert_eq!(r.controller.state().target, 42.0);
        assert!(
            r.writeback
                .lock()
                .unwrap()
                .contains(&Persisted::SavedPosition(42.0))
        );

        r.controller.tick(10);
        assert_eq!(last_motor(&r), MotorCommand::Brake);
    }

    #[test]
    fn move_command_is_not_persisted_twice() {
        let params = Params {
            automate: true,
            ..base_params()
        };
        let mut r = rig(params);
        r.controller.handle_command(ShadeCommand::Move { target: 50.0 });
        r.controller.handle_command(ShadeCommand::Move { target: 60.0 });
        // Automate was already off for the second command — one write.
        assert_eq!(
            r.writeback.lock().unwrap().as_slice(),
            &[Persisted::Automate(false)]
        );
        assert_eq!(r.controller.state().target, 60.0);
    }

    #[test]
    fn end_stop_brakes_and_flags() {
        let mut r = rig(base_params());
        r.controller.handle_command(ShadeCommand::Move { target: 100.0 });
        r.controller.tick(0);
        r.controller.on_end_stop();
        assert_eq!(last_motor(&r), MotorCommand::Brake);
        assert!(r.controller.state().flags.contains(StatusFlags::END_STOP));
        // Position is not corrected; the target is frozen at it.
        assert_eq!(r.controller.state().tracker.position(), 0.0);
        assert_eq!(r.controller.state().target, 0.0);
        // The next tick must not re-drive toward the stale target.
        r.controller.tick(10);
        assert_eq!(last_motor(&r), MotorCommand::Brake);

        r.controller.handle_command(ShadeCommand::Reset { position: 0.0 });
        assert!(!r.controller.state().flags.contains(StatusFlags::END_STOP));
    }

    #[test]
    fn motion_edges_publish_once_per_flip() {
        let params = Params {
            automate: true,
            pir_interval_ms: 100,
            ..base_params()
        };
        let mut r = rig(params);
        r.pir.lock().unwrap().push_back(500);
        r.controller.tick(0); // rising edge
        r.controller.tick(50); // still active, no publish
        r.controller.tick(101); // decayed, falling edge
        let published: Vec<_> = r
            .telemetry
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches!(p, Published::Motion(_)))
            .map(|p| match p {
                Published::Motion(a) => *a,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(published, vec![true, false]);
    }

    #[test]
    fn invalid_heights_hold_target() {
        let params = Params {
            automate: true,
            rise_height: 0.0,
            ..base_params()
        };
        let mut r = rig(params);
        r.controller.handle_command(ShadeCommand::Move { target: 25.0 });
        // Move disabled automation; re-enable with the bad snapshot
        // rejected, so force it through the valid path first.
        let mut p = r.controller.params().clone();
        p.automate = true;
        p.rise_height = 150.0;
        r.controller.update_params(p.clone());
        p.rise_height = 0.0;
        // Invalid heights arrive in an otherwise valid snapshot.
        r.controller.update_params(p);
        r.controller.tick(0);
        assert_eq!(r.controller.state().target, 25.0);
        assert!(r.controller.state().flags.contains(StatusFlags::HOLD));
    }

    #[test]
    fn param_update_rejected_keeps_previous_tuning() {
        let mut r = rig(base_params());
        let bad = Params {
            min_up_speed: 900,
            max_up_speed: 100,
            ..base_params()
        };
        r.controller.update_params(bad);
        assert_eq!(r.controller.params().max_up_speed, 950);
    }

    #[test]
    fn online_freezes_target_at_position() {
        let mut r = rig(base_params());
        let sink = r.controller.rotation_sink();
        sink.record(2.0); // 15 units
        r.controller.tick(0);
        r.controller.handle_command(ShadeCommand::Move { target: 99.0 });
        r.controller.on_online();
        assert_eq!(r.controller.state().target, 15.0);
        assert_eq!(last_motor(&r), MotorCommand::Brake);
    }
}
