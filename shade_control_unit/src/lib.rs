//! # Shade Control Unit Library
//!
//! Control core for a motorized window-covering actuator. Converts
//! asynchronous rotary-encoder deltas and a raw presence signal into a
//! tracked position, and drives the winding motor toward a target under
//! manual override or motion-triggered automation.
//!
//! ## Tick Pipeline
//!
//! Data flows one direction per tick:
//!
//! encoder → [`rotation`] accumulator → [`tracker`] →
//! ([`target`] resolver ⇄ [`presence`] detector) → [`speed`] mapper →
//! motor command, orchestrated by [`controller`] and paced by
//! [`cycle`].
//!
//! The only concurrent actor is the rotation event source; everything
//! else is a single-threaded cooperative loop with no blocking inside
//! a tick.

pub mod config;
pub mod controller;
pub mod cycle;
pub mod presence;
pub mod rotation;
pub mod speed;
pub mod target;
pub mod tracker;
