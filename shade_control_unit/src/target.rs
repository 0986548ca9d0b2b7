//! Target resolver — operating mode and automation decision.
//!
//! The original two-boolean encoding (`automate` + `manual`) is
//! modeled as a proper tri-state: manual always wins, automation only
//! runs when explicitly enabled, and everything else is idle with a
//! sticky target.

use shade_common::params::Params;

/// Operating mode for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// User-issued direct motor drive; automation suspended.
    Manual,
    /// Presence-driven target selection every tick.
    Automated,
    /// No automation, no manual drive — target is sticky.
    #[default]
    Idle,
}

impl Mode {
    /// Derive the mode from the drive flag and the automate tunable.
    /// Manual wins over automated.
    #[inline]
    pub fn derive(manual_drive: bool, automate: bool) -> Self {
        if manual_drive {
            Self::Manual
        } else if automate {
            Self::Automated
        } else {
            Self::Idle
        }
    }
}

/// Resolve this tick's target position.
///
/// While `Automated`, presence selects between the rise and idle
/// heights, unconditionally overwriting the previous target. `Manual`
/// and `Idle` keep the current target. Automation with unusable
/// heights fails closed by holding the current target — never an
/// undefined motor command.
pub fn resolve_target(
    mode: Mode,
    motion_active: bool,
    current_target: f64,
    params: &Params,
) -> f64 {
    match mode {
        Mode::Manual | Mode::Idle => current_target,
        Mode::Automated => {
            if !params.heights_valid() {
                current_target
            } else if motion_active {
                params.rise_height
            } else {
                params.idle_height
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
