//! Simulated winding plant and sensor drivers.
//!
//! The plant models the motor/spool mechanics: duty drives a rotation
//! rate, rotation deltas are delivered asynchronously to a
//! [`RotationSink`] exactly like the encoder ISR on the device, and an
//! end stop trips outside the travel bounds.
//!
//! The motor driver and the plant are split the way the hardware is:
//! [`SimMotor`] is the "PWM register" the control core writes, the
//! plant reads it when stepped. Both sides are thread-safe so the
//! plant can be stepped from a separate pump thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shade_common::hal::{
    DUTY_LIMIT, HalError, Indicator, LedColor, MotorCommand, MotorDriver, PresenceSensor,
    RotationSink,
};
use tracing::{debug, trace};

// ─── Plant Configuration ────────────────────────────────────────────

/// Simulated plant tuning.
#[derive(Debug, Clone)]
pub struct SimPlantConfig {
    /// Spool rotation rate at full duty [turns/s].
    pub turns_per_sec_at_full_duty: f64,
    /// Winding length per turn [units/turn] — used only to express the
    /// travel bounds in position units.
    pub winding_length: f64,
    /// Lower travel bound [units]; end stop trips below it.
    pub min_position: f64,
    /// Upper travel bound [units]; end stop trips above it.
    pub max_position: f64,
    /// Emit negated deltas, modeling an encoder mounted mirror-wise
    /// (the shipped hardware does this; pair with `invert_encoder`).
    pub invert_output: bool,
}

impl Default for SimPlantConfig {
    fn default() -> Self {
        Self {
            turns_per_sec_at_full_duty: 2.0,
            winding_length: 7.5,
            min_position: -10.0,
            max_position: 400.0,
            invert_output: false,
        }
    }
}

// ─── Motor ──────────────────────────────────────────────────────────

/// Motor driver writing into the shared duty cell.
pub struct SimMotor {
    duty: Arc<AtomicI32>,
}

impl SimMotor {
    /// Last applied signed duty (test inspection).
    pub fn duty(&self) -> i32 {
        self.duty.load(Ordering::Acquire)
    }

    /// A second handle onto the same duty cell.
    pub fn handle(&self) -> SimMotor {
        SimMotor {
            duty: Arc::clone(&self.duty),
        }
    }
}

impl MotorDriver for SimMotor {
    fn apply(&mut self, command: MotorCommand) -> Result<(), HalError> {
        let duty = command.signed_duty();
        if duty.unsigned_abs() > DUTY_LIMIT as u32 {
            return Err(HalError::OutOfRange(format!("duty {duty}")));
        }
        self.duty.store(duty, Ordering::Release);
        trace!(duty, "sim motor duty");
        Ok(())
    }
}

// ─── Plant ──────────────────────────────────────────────────────────

/// Simulated spool mechanics.
pub struct SimPlant {
    config: SimPlantConfig,
    duty: Arc<AtomicI32>,
    sink: Arc<dyn RotationSink>,
    end_stop: Arc<AtomicBool>,
    /// True spool position [turns] — ground truth, not the core's estimate.
    position_turns: f64,
}

impl SimPlant {
    /// Build a plant delivering rotation deltas into `sink`.
    ///
    /// Returns the plant and the motor driver half.
    pub fn new(config: SimPlantConfig, sink: Arc<dyn RotationSink>) -> (Self, SimMotor) {
        let duty = Arc::new(AtomicI32::new(0));
        let motor = SimMotor {
            duty: Arc::clone(&duty),
        };
        let plant = Self {
            config,
            duty,
            sink,
            end_stop: Arc::new(AtomicBool::new(false)),
            position_turns: 0.0,
        };
        (plant, motor)
    }

    /// Advance the mechanics by `dt` and deliver the rotation delta.
    pub fn step(&mut self, dt: Duration) {
        let duty = self.duty.load(Ordering::Acquire);
        if duty == 0 {
            return;
        }
        let rate =
            duty as f64 / DUTY_LIMIT as f64 * self.config.turns_per_sec_at_full_duty;
        let delta = rate * dt.as_secs_f64();
        self.position_turns += delta;

        let emitted = if self.config.invert_output { -delta } else { delta };
        self.sink.record(emitted);

        let units = self.position_turns * self.config.winding_length;
        let tripped = units < self.config.min_position || units > self.config.max_position;
        if tripped && !self.end_stop.load(Ordering::Acquire) {
            debug!(units, "sim end stop tripped");
        }
        self.end_stop.store(tripped, Ordering::Release);
    }

    /// True spool position [units].
    pub fn position_units(&self) -> f64 {
        self.position_turns * self.config.winding_length
    }

    /// Whether the travel limit is currently exceeded.
    pub fn end_stop_hit(&self) -> bool {
        self.end_stop.load(Ordering::Acquire)
    }

    /// Shared end-stop flag for an external watcher.
    pub fn end_stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.end_stop)
    }
}

// ─── Presence Sensor ────────────────────────────────────────────────

/// Scripted PIR source.
///
/// Reads pop from a shared sample queue; once the queue is empty the
/// quiescent level is returned. Tests hold the queue handle to inject
/// bursts mid-run.
pub struct SimPir {
    samples: Arc<Mutex<VecDeque<i32>>>,
    quiescent: i32,
}

impl SimPir {
    pub fn new(quiescent: i32) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::new())),
            quiescent,
        }
    }

    /// Handle for injecting samples while the sensor is owned elsewhere.
    pub fn feed(&self) -> Arc<Mutex<VecDeque<i32>>> {
        Arc::clone(&self.samples)
    }

    /// Queue raw samples to be returned by subsequent reads.
    pub fn push_samples(&self, values: impl IntoIterator<Item = i32>) {
        let mut q = self.samples.lock().expect("sample queue poisoned");
        q.extend(values);
    }
}

impl PresenceSensor for SimPir {
    fn read(&mut self) -> i32 {
        self.samples
            .lock()
            .expect("sample queue poisoned")
            .pop_front()
            .unwrap_or(self.quiescent)
    }
}

// ─── Indicator ──────────────────────────────────────────────────────

/// Recorded indicator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedEvent {
    Set { color: LedColor, fade_ms: u32 },
    Flash { color: LedColor, duration_ms: u32 },
}

/// Indicator that records every request.
pub struct SimIndicator {
    events: Arc<Mutex<Vec<LedEvent>>>,
}

impl SimIndicator {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared event log for assertions.
    pub fn log(&self) -> Arc<Mutex<Vec<LedEvent>>> {
        Arc::clone(&self.events)
    }
}

impl Default for SimIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for SimIndicator {
    fn set(&mut self, color: LedColor, fade_ms: u32) -> Result<(), HalError> {
        self.events
            .lock()
            .expect("led log poisoned")
            .push(LedEvent::Set { color, fade_ms });
        Ok(())
    }

    fn flash(&mut self, color: LedColor, duration_ms: u32) -> Result<(), HalError> {
        self.events
            .lock()
            .expect("led log poisoned")
            .push(LedEvent::Flash { color, duration_ms });
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
