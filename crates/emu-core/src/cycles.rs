//! The master cycle counter and unit conversions.

/// Elapsed master-crystal cycles since power-on.
///
/// Signed so that differences between two points in time can be negative.
pub type Cycle = i64;

/// Trigger value of a slot that is not armed.
pub const NEVER: Cycle = i64::MAX;

/// Master cycles in `n` DMA cycles (colour clocks).
#[must_use]
pub const fn dma_cycles(n: i64) -> Cycle {
    n << 3
}

/// Master cycles in `n` CIA cycles (E-clock periods).
#[must_use]
pub const fn cia_cycles(n: i64) -> Cycle {
    n * 40
}

/// Whole DMA cycles contained in `cycles`.
#[must_use]
pub const fn as_dma_cycles(cycles: Cycle) -> i64 {
    cycles >> 3
}

/// Whole CIA cycles contained in `cycles`.
#[must_use]
pub const fn as_cia_cycles(cycles: Cycle) -> i64 {
    cycles / 40
}

/// Master cycles in `n` microseconds (28 per µs, rounded down from 28.37).
#[must_use]
pub const fn usec(n: i64) -> Cycle {
    n * 28
}

#[must_use]
pub const fn msec(n: i64) -> Cycle {
    n * 28_000
}

/// Master cycles in `seconds`, truncated.
#[must_use]
pub fn sec(seconds: f64) -> Cycle {
    (seconds * 28_000_000.0) as Cycle
}
