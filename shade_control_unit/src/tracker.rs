//! Position tracker — delta integration and report hysteresis.
//!
//! Integrates drained rotation deltas into the absolute position
//! estimate. The tracker never clamps: physical limits belong to the
//! end-stop collaborator, and silently clamping here would mask a
//! stuck motor.

/// Position change [units] that makes a report due.
pub const REPORT_THRESHOLD: f64 = 1.0;

/// Absolute position estimate with telemetry hysteresis.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    /// Estimated position [units].
    position: f64,
    /// Last externally reported position [units].
    sent_position: f64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position estimate [units].
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Last reported position (test inspection).
    #[inline]
    pub fn sent_position(&self) -> f64 {
        self.sent_position
    }

    /// Integrate one tick's drained delta: `position += delta * winding_length`.
    #[inline]
    pub fn integrate(&mut self, delta: f64, winding_length: f64) {
        self.position += delta * winding_length;
    }

    /// Re-zero the estimate (reset command). Leaves the report
    /// hysteresis untouched — a large jump publishes on the next poll.
    #[inline]
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    /// Report the position if it moved more than [`REPORT_THRESHOLD`]
    /// since the last report, updating the hysteresis on success.
    ///
    /// Bounds telemetry volume under continuous slow movement.
    pub fn poll_report(&mut self) -> Option<f64> {
        if (self.position - self.sent_position).abs() > REPORT_THRESHOLD {
            self.sent_position = self.position;
            Some(self.position)
        } else {
            None
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
