//! Common re-exports for convenience.

pub use crate::command::{ShadeCommand, TurnDirection};
pub use crate::hal::{
    Direction, HalError, Indicator, LedColor, MotorCommand, MotorDriver, PresenceSensor,
    RotationSink,
};
pub use crate::math::clamped_map;
pub use crate::params::{ParamWriteback, Params};
pub use crate::telemetry::TelemetrySink;
