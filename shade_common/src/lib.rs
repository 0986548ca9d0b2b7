//! Shade Common Library
//!
//! Shared types for the shade-core workspace: tunable parameters,
//! typed commands, HAL driver traits, telemetry sinks, and the
//! clamped-map math used by the control core.
//!
//! # Module Structure
//!
//! - [`command`] - Typed command channel variants and payload parsing
//! - [`hal`] - Driver traits (motor, presence sensor, indicator, rotation sink)
//! - [`math`] - Clamped linear interpolation
//! - [`params`] - Tunable parameter snapshot and write-back trait
//! - [`telemetry`] - Outbound telemetry sink trait
//! - [`prelude`] - Common re-exports for convenience

pub mod command;
pub mod hal;
pub mod math;
pub mod params;
pub mod prelude;
pub mod telemetry;
