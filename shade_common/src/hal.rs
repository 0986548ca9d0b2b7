//! HAL driver traits and shared actuator types.
//!
//! This module defines:
//! - `MotorDriver` / `PresenceSensor` / `Indicator` traits - pluggable
//!   driver seams consumed by the control core
//! - `RotationSink` trait - asynchronous encoder delta delivery
//! - `MotorCommand` / `Direction` - the per-tick motor output
//! - `LedColor` - RGBW indicator value
//! - `HalError` - error type for driver operations
//!
//! The core assumes drivers are already initialized; driver init
//! failures are surfaced by the hosting binary, not by the core.

use thiserror::Error;

/// Full-scale motor duty magnitude.
pub const DUTY_LIMIT: u16 = 1023;

/// Fixed duty used for manual turn commands.
pub const MANUAL_TURN_DUTY: u16 = 512;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// Hardware communication error
    #[error("hardware communication error: {0}")]
    Communication(String),

    /// Command outside the driver's accepted range
    #[error("command out of range: {0}")]
    OutOfRange(String),
}

/// Direction of travel for the winding motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Winding up (position increasing).
    Up,
    /// Unwinding down (position decreasing).
    Down,
}

/// Motor output issued at most once per tick.
///
/// `Brake` is distinct from `Drive` with zero magnitude: it is the
/// explicit "target reached" command and drivers may engage a
/// short-circuit brake on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    /// Stop and hold.
    Brake,
    /// Run in `direction` at `magnitude` duty (0..=DUTY_LIMIT).
    Drive {
        direction: Direction,
        magnitude: u16,
    },
}

impl MotorCommand {
    /// Signed duty representation: up positive, down negative, brake zero.
    #[inline]
    pub const fn signed_duty(&self) -> i32 {
        match self {
            Self::Brake => 0,
            Self::Drive {
                direction: Direction::Up,
                magnitude,
            } => *magnitude as i32,
            Self::Drive {
                direction: Direction::Down,
                magnitude,
            } => -(*magnitude as i32),
        }
    }

    /// Build from a signed duty, clamping magnitude to `DUTY_LIMIT`.
    /// Zero maps to `Brake`.
    pub fn from_signed(duty: i32) -> Self {
        if duty == 0 {
            return Self::Brake;
        }
        let magnitude = duty.unsigned_abs().min(DUTY_LIMIT as u32) as u16;
        let direction = if duty > 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        Self::Drive {
            direction,
            magnitude,
        }
    }
}

/// RGBW indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedColor {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub white: u16,
}

impl LedColor {
    /// Monochrome value on the white channel.
    pub const fn mono(value: u16) -> Self {
        Self {
            red: 0,
            green: 0,
            blue: 0,
            white: value,
        }
    }

    /// Full RGBW value.
    pub const fn rgbw(red: u16, green: u16, blue: u16, white: u16) -> Self {
        Self {
            red,
            green,
            blue,
            white,
        }
    }

    /// All channels off.
    pub const fn off() -> Self {
        Self::mono(0)
    }
}

/// Winding motor driver.
///
/// `apply` is called every tick with the freshly computed command and
/// must be safe to call repeatedly with an unchanged value.
pub trait MotorDriver: Send {
    fn apply(&mut self, command: MotorCommand) -> Result<(), HalError>;
}

/// Passive-infrared presence sensor.
///
/// `read` is a synchronous poll returning the raw intensity; the core
/// clamps anomalies through the adaptive threshold map, so drivers
/// never need to range-check.
pub trait PresenceSensor: Send {
    fn read(&mut self) -> i32;
}

/// Status indicator (RGBW LED).
pub trait Indicator: Send {
    /// Fade to `color` over `fade_ms`.
    fn set(&mut self, color: LedColor, fade_ms: u32) -> Result<(), HalError>;

    /// Flash `color` for at least `duration_ms`, then restore.
    fn flash(&mut self, color: LedColor, duration_ms: u32) -> Result<(), HalError>;
}

/// Asynchronous rotation delta consumer.
///
/// Implemented by the core's rotation accumulator; the encoder source
/// (ISR shim or simulation) holds it behind an `Arc` and may call
/// `record` at any time, including concurrently with the tick.
pub trait RotationSink: Send + Sync {
    fn record(&self, delta: f64);
}

// ─── Tests ──────────────────────────────────────────────────────────
