//! Clamped linear interpolation ("safe map").
//!
//! Inputs outside the source domain clamp to the nearest output bound
//! instead of extrapolating. Used for the position-adaptive presence
//! threshold and the distance-to-speed mapping.

/// Map `x` from `[in_lo, in_hi]` to `[out_lo, out_hi]`, clamping
/// out-of-domain inputs to the nearest output bound.
///
/// A degenerate source domain (`in_hi <= in_lo`) resolves through the
/// clamps, so no division by zero can occur.
#[inline]
pub fn clamped_map(x: f64, in_lo: f64, in_hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    if x <= in_lo {
        return out_lo;
    }
    if x >= in_hi {
        return out_hi;
    }
    out_lo + (x - in_lo) * (out_hi - out_lo) / (in_hi - in_lo)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_interpolates() {
        let y = clamped_map(10.0, 0.0, 20.0, 0.0, 100.0);
        assert!((y - 50.0).abs() < 1e-12);
    }

    #[test]
    fn below_domain_clamps_to_out_lo() {
        assert_eq!(clamped_map(-5.0, 0.0, 20.0, 100.0, 900.0), 100.0);
    }

    #[test]
    fn above_domain_clamps_to_out_hi() {
        assert_eq!(clamped_map(25.0, 0.0, 20.0, 100.0, 900.0), 900.0);
    }

    #[test]
    fn domain_bounds_map_to_output_bounds() {
        assert_eq!(clamped_map(0.0, 0.0, 20.0, 350.0, 950.0), 350.0);
        assert_eq!(clamped_map(20.0, 0.0, 20.0, 350.0, 950.0), 950.0);
    }

    #[test]
    fn degenerate_domain_does_not_divide_by_zero() {
        // in_lo == in_hi: everything resolves through the clamps.
        assert_eq!(clamped_map(0.0, 0.0, 0.0, 0.0, 300.0), 0.0);
        assert_eq!(clamped_map(1.0, 0.0, 0.0, 0.0, 300.0), 300.0);
        assert_eq!(clamped_map(-1.0, 0.0, 0.0, 0.0, 300.0), 0.0);
    }

    #[test]
    fn descending_output_range_supported() {
        let y = clamped_map(5.0, 0.0, 10.0, 100.0, 0.0);
        assert!((y - 50.0).abs() < 1e-12);
    }
}
