//! Speed mapper — distance-to-target into a bounded motor command.
//!
//! Inside the precision band the motor brakes; outside it the duty
//! ramps linearly with distance between the per-direction minimum
//! (stall floor near the target) and maximum (ceiling far from it).

use shade_common::hal::{Direction, MotorCommand};
use shade_common::math::clamped_map;
use shade_common::params::Params;

/// Tunable mapping parameters, snapshotted from [`Params`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedProfile {
    pub min_up: u16,
    pub max_up: u16,
    pub min_down: u16,
    pub max_down: u16,
    /// Distance over which duty ramps from min to max [units].
    pub map_range: f64,
    /// Width of the brake band around the target [units].
    pub precision: f64,
}

impl SpeedProfile {
    pub fn from_params(params: &Params) -> Self {
        Self {
            min_up: params.min_up_speed,
            max_up: params.max_up_speed,
            min_down: params.min_down_speed,
            max_down: params.max_down_speed,
            map_range: params.speed_map_range,
            precision: params.move_precision,
        }
    }
}

/// Map a signed position error (`target - position`) to a motor command.
///
/// `|error| <= precision/2` brakes; a positive error drives up, a
/// negative one down, each with its own duty bounds.
pub fn map_speed(error: f64, profile: &SpeedProfile) -> MotorCommand {
    if error.abs() <= profile.precision / 2.0 {
        return MotorCommand::Brake;
    }
    if error > 0.0 {
        let duty = clamped_map(
            error,
            0.0,
            profile.map_range,
            profile.min_up as f64,
            profile.max_up as f64,
        );
        MotorCommand::Drive {
            direction: Direction::Up,
            magnitude: duty as u16,
        }
    } else {
        let duty = clamped_map(
            -error,
            0.0,
            profile.map_range,
            profile.min_down as f64,
            profile.max_down as f64,
        );
        MotorCommand::Drive {
            direction: Direction::Down,
            magnitude: duty as u16,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
