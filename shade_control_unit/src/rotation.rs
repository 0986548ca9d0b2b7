//! Rotation accumulator — the one true data race in the system.
//!
//! The encoder source runs in an interrupt-like context and may call
//! [`RotationAccumulator::record`] at any point, including while the
//! control loop is inside [`RotationAccumulator::drain`]. The
//! accumulator therefore composes deltas with a CAS loop over an
//! `AtomicU64` holding f64 bits, and drains with an atomic swap
//! (fetch-and-clear). No delta is ever lost or double-counted.
//!
//! The encoder inversion tunable is applied on `record`, before
//! accumulation, so a drained value is already direction-corrected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use shade_common::hal::RotationSink;

/// Single-producer/single-consumer rotation delta accumulator.
///
/// Shared behind an `Arc`: the encoder source holds it as a
/// [`RotationSink`], the control loop drains it once per tick.
#[derive(Debug)]
pub struct RotationAccumulator {
    /// Accumulated delta, stored as f64 bits.
    bits: AtomicU64,
    /// Negate deltas before accumulating.
    invert: AtomicBool,
}

impl RotationAccumulator {
    pub fn new(invert: bool) -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
            invert: AtomicBool::new(invert),
        }
    }

    /// Update the inversion flag (takes effect on the next `record`).
    pub fn set_invert(&self, invert: bool) {
        self.invert.store(invert, Ordering::Release);
    }

    /// Compose a delta into the accumulator.
    ///
    /// Safe to call from the asynchronous event source at any time;
    /// concurrent calls compose, they never overwrite.
    pub fn record(&self, delta: f64) {
        let delta = if self.invert.load(Ordering::Acquire) {
            -delta
        } else {
            delta
        };
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Atomically take the accumulated delta and reset it to zero.
    ///
    /// A `record` racing with the swap lands either in the returned
    /// value or in the fresh accumulator, never in both, never in
    /// neither.
    pub fn drain(&self) -> f64 {
        f64::from_bits(self.bits.swap(0f64.to_bits(), Ordering::AcqRel))
    }

    /// Current value without clearing (diagnostics only).
    pub fn peek(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

impl RotationSink for RotationAccumulator {
    fn record(&self, delta: f64) {
        RotationAccumulator::record(self, delta);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_compose() {
        let acc = RotationAccumulator::new(false);
        acc.record(0.5);
        acc.record(0.25);
        acc.record(-0.125);
        assert_eq!(acc.drain(), 0.625);
    }

    #[test]
    fn drain_clears() {
        let acc = RotationAccumulator::new(false);
        acc.record(1.5);
        assert_eq!(acc.drain(), 1.5);
        assert_eq!(acc.drain(), 0.0);
        assert_eq!(acc.peek(), 0.0);
    }

    #[test]
    fn invert_negates_before_accumulation() {
        let acc = RotationAccumulator::new(true);
        acc.record(0.5);
        assert_eq!(acc.drain(), -0.5);
    }

    #[test]
    fn invert_toggle_applies_to_subsequent_records() {
        let acc = RotationAccumulator::new(false);
        acc.record(0.25);
        acc.set_invert(true);
        acc.record(0.25);
        assert_eq!(acc.drain(), 0.0);
    }

    #[test]
    fn no_delta_lost_under_concurrent_drains() {
        // Producer records exact binary fractions while the consumer
        // drains continuously; every delta must land exactly once.
        const PULSES: usize = 100_000;
        const DELTA: f64 = 0.25; // exactly representable, sums stay exact

        let acc = Arc::new(RotationAccumulator::new(false));
        let producer = {
            let acc = Arc::clone(&acc);
            std::thread::spawn(move || {
                for _ in 0..PULSES {
                    acc.record(DELTA);
                }
            })
        };

        let mut total = 0.0;
        while !producer.is_finished() {
            total += acc.drain();
        }
        producer.join().unwrap();
        total += acc.drain();

        assert_eq!(total, PULSES as f64 * DELTA);
    }
}
