//! Tunable parameter snapshot and write-back seam.
//!
//! Parameters arrive from an external parameter store as whole-snapshot
//! replacements and take effect on the next tick (last-write-wins, no
//! transactional guarantee). Commands that conflict with automation
//! must persist `automate = false` back to the store, which is what
//! [`ParamWriteback`] models.
//!
//! Numeric defaults mirror the shipped actuator tuning.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::hal::DUTY_LIMIT;

/// Complete tunable snapshot.
///
/// All fields use `#[serde(default)]` so a partial TOML table loads
/// with shipped defaults for the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Motion-triggered automation enabled.
    #[serde(default)]
    pub automate: bool,

    /// Winding length per encoder turn [units/turn].
    #[serde(default = "default_winding_length")]
    pub winding_length: f64,

    /// Automation target while no motion is present [units].
    #[serde(default = "default_idle_height")]
    pub idle_height: f64,

    /// Automation target while motion is present; also the upper bound
    /// of the presence-threshold map domain [units].
    #[serde(default = "default_rise_height")]
    pub rise_height: f64,

    /// Indicator brightness while idle.
    #[serde(default = "default_idle_light")]
    pub idle_light: u16,

    /// Indicator brightness for flash commands.
    #[serde(default = "default_flash_intensity")]
    pub flash_intensity: u16,

    /// Minimum downward duty (stall floor).
    #[serde(default = "default_min_down_speed")]
    pub min_down_speed: u16,

    /// Minimum upward duty (stall floor).
    #[serde(default = "default_min_up_speed")]
    pub min_up_speed: u16,

    /// Maximum downward duty.
    #[serde(default = "default_max_down_speed")]
    pub max_down_speed: u16,

    /// Maximum upward duty.
    #[serde(default = "default_max_up_speed")]
    pub max_up_speed: u16,

    /// Distance over which the duty ramps from min to max [units].
    #[serde(default = "default_speed_map_range")]
    pub speed_map_range: f64,

    /// Negate encoder deltas before accumulation.
    #[serde(default = "default_invert_encoder")]
    pub invert_encoder: bool,

    /// Width of the brake band around the target [units].
    #[serde(default = "default_move_precision")]
    pub move_precision: f64,

    /// Presence threshold at `position == rise_height` (raw sensor units).
    #[serde(default = "default_pir_sensitivity")]
    pub pir_sensitivity: i32,

    /// Presence decay window [ms].
    #[serde(default = "default_pir_interval_ms")]
    pub pir_interval_ms: u64,
}

fn default_winding_length() -> f64 {
    7.5
}
fn default_idle_height() -> f64 {
    100.0
}
fn default_rise_height() -> f64 {
    150.0
}
fn default_idle_light() -> u16 {
    127
}
fn default_flash_intensity() -> u16 {
    1023
}
fn default_min_down_speed() -> u16 {
    350
}
fn default_min_up_speed() -> u16 {
    350
}
fn default_max_down_speed() -> u16 {
    500
}
fn default_max_up_speed() -> u16 {
    950
}
fn default_speed_map_range() -> f64 {
    20.0
}
fn default_invert_encoder() -> bool {
    true
}
fn default_move_precision() -> f64 {
    1.0
}
fn default_pir_sensitivity() -> i32 {
    300
}
fn default_pir_interval_ms() -> u64 {
    2000
}

impl Default for Params {
    fn default() -> Self {
        Self {
            automate: false,
            winding_length: default_winding_length(),
            idle_height: default_idle_height(),
            rise_height: default_rise_height(),
            idle_light: default_idle_light(),
            flash_intensity: default_flash_intensity(),
            min_down_speed: default_min_down_speed(),
            min_up_speed: default_min_up_speed(),
            max_down_speed: default_max_down_speed(),
            max_up_speed: default_max_up_speed(),
            speed_map_range: default_speed_map_range(),
            invert_encoder: default_invert_encoder(),
            move_precision: default_move_precision(),
            pir_sensitivity: default_pir_sensitivity(),
            pir_interval_ms: default_pir_interval_ms(),
        }
    }
}

impl Params {
    /// Validate parameter bounds.
    ///
    /// Returns a human-readable reason on the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_up_speed > self.max_up_speed {
            return Err(format!(
                "min_up_speed {} > max_up_speed {}",
                self.min_up_speed, self.max_up_speed
            ));
        }
        if self.min_down_speed > self.max_down_speed {
            return Err(format!(
                "min_down_speed {} > max_down_speed {}",
                self.min_down_speed, self.max_down_speed
            ));
        }
        if self.max_up_speed > DUTY_LIMIT || self.max_down_speed > DUTY_LIMIT {
            return Err(format!("speed bound exceeds duty limit {DUTY_LIMIT}"));
        }
        if self.move_precision < 0.0 {
            return Err(format!("move_precision {} < 0", self.move_precision));
        }
        if self.speed_map_range <= 0.0 {
            return Err(format!("speed_map_range {} <= 0", self.speed_map_range));
        }
        if self.pir_interval_ms == 0 {
            return Err("pir_interval_ms must be > 0".into());
        }
        Ok(())
    }

    /// Whether the automation heights are usable.
    ///
    /// A non-positive rise height leaves the threshold map without a
    /// domain and automation without a meaningful target; the resolver
    /// fails closed (holds the current target) while this is false.
    #[inline]
    pub fn heights_valid(&self) -> bool {
        self.rise_height > 0.0
    }
}

/// Outbound parameter mutations persisted to the external store.
///
/// Best-effort: the store echoes changes back as a snapshot update,
/// the core does not wait for it.
pub trait ParamWriteback: Send {
    /// Persist the automate flag (disabled by conflicting commands).
    fn persist_automate(&mut self, enabled: bool);

    /// Persist the last reset position.
    fn persist_saved_position(&mut self, position: f64);
}

/// Write-back that only logs — used when no store is attached.
#[derive(Debug, Default)]
pub struct LogWriteback;

impl ParamWriteback for LogWriteback {
    fn persist_automate(&mut self, enabled: bool) {
        info!(enabled, "param write-back: automate");
    }

    fn persist_saved_position(&mut self, position: f64) {
        info!(position, "param write-back: saved-position");
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
