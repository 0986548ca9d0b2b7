//! Shade HAL — simulation driver.
//!
//! Implements the driver traits from `shade_common::hal` against a
//! simulated winding plant instead of GPIO/ADC/PWM hardware. The same
//! trait seams would be backed by real drivers on the device; the
//! control core cannot tell the difference.

pub mod sim;

pub use sim::{LedEvent, SimIndicator, SimMotor, SimPir, SimPlant, SimPlantConfig};
