//! Outbound telemetry sink.
//!
//! The core publishes two signals: `motion` on a debounced edge and
//! `position` when the estimate drifts past the report threshold.
//! Publishes are at-least-once and best-effort — no delivery guarantee
//! and no back-pressure into the tick.

use tracing::info;

/// Sink for the core's outbound telemetry.
pub trait TelemetrySink: Send {
    /// Debounced presence flag, published only on edges.
    fn publish_motion(&mut self, active: bool);

    /// Position estimate, published on threshold-exceeding change.
    fn publish_position(&mut self, position: f64);
}

/// Telemetry sink backed by the tracing subscriber.
///
/// Default for the binary when no transport is attached.
#[derive(Debug, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn publish_motion(&mut self, active: bool) {
        info!(active, "telemetry: motion");
    }

    fn publish_position(&mut self, position: f64) {
        info!(position, "telemetry: position");
    }
}
