//! Presence detector — position-adaptive threshold, decay window,
//! edge-triggered reporting.
//!
//! The raw sensor gain falls with distance, so the trigger threshold
//! scales linearly with the current position over `[0, rise_height]`
//! and clamps outside that range. A sample above threshold refreshes
//! the trigger timestamp; the debounced `active` flag holds until the
//! decay window elapses. Only flips of `active` are reported outward,
//! which keeps the motion topic from flapping.

use shade_common::math::clamped_map;

/// Debounced presence state.
#[derive(Debug, Clone, Default)]
pub struct PresenceDetector {
    /// Monotonic timestamp of the last above-threshold sample [ms].
    last_triggered_at: Option<u64>,
    /// Debounced flag as of the last sample.
    active: bool,
}

impl PresenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debounced presence flag as of the last sample.
    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Trigger threshold for the given position.
    ///
    /// Linear over `[0, rise_height] → [0, sensitivity]`, clamped to
    /// the nearest bound outside the domain. Monotonically
    /// non-decreasing in position.
    #[inline]
    pub fn threshold_for(position: f64, rise_height: f64, sensitivity: i32) -> i32 {
        clamped_map(position, 0.0, rise_height, 0.0, sensitivity as f64) as i32
    }

    /// Process one raw sample.
    ///
    /// `raw > threshold` refreshes the trigger timestamp; `active`
    /// holds while `now - last_trigger < decay_ms` (strict). Returns
    /// whether `active` flipped — only edges are reported outward.
    pub fn on_sample(&mut self, raw: i32, threshold: i32, now_ms: u64, decay_ms: u64) -> bool {
        if raw > threshold {
            self.last_triggered_at = Some(now_ms);
        }
        let new_active = match self.last_triggered_at {
            Some(at) => now_ms.saturating_sub(at) < decay_ms,
            None => false,
        };
        let edge = new_active != self.active;
        self.active = new_active;
        edge
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
