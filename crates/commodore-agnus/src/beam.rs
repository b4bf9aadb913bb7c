//! Beam position and frame bookkeeping (PAL).

/// DMA cycles per rasterline.
pub const HPOS_CNT: i64 = 227;
pub const HPOS_MAX: i64 = HPOS_CNT - 1;

/// Lines in a long and a short PAL frame.
pub const LINES_LONG_FRAME: i64 = 313;
pub const LINES_SHORT_FRAME: i64 = 312;

/// Vertical and horizontal beam position. `h` counts DMA cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Beam {
    pub v: i64,
    pub h: i64,
}

impl Beam {
    #[must_use]
    pub const fn new(v: i64, h: i64) -> Self {
        Self { v, h }
    }

    /// Beam position `cycles` DMA cycles later, assuming no frame wrap.
    #[must_use]
    pub const fn add(self, cycles: i64) -> Self {
        let linear = self.v * HPOS_CNT + self.h + cycles;
        Self {
            v: linear / HPOS_CNT,
            h: linear % HPOS_CNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    pub nr: i64,
    /// Long frame flag (LOF).
    pub lof: bool,
    pub prev_lof: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            nr: 0,
            lof: true,
            prev_lof: true,
        }
    }
}

impl Frame {
    #[must_use]
    pub fn is_long(&self) -> bool {
        self.lof
    }

    #[must_use]
    pub fn num_lines(&self) -> i64 {
        if self.lof {
            LINES_LONG_FRAME
        } else {
            LINES_SHORT_FRAME
        }
    }

    #[must_use]
    pub fn last_line(&self) -> i64 {
        self.num_lines() - 1
    }

    /// Advance to the next frame. Long and short frames only alternate in
    /// interlace mode.
    pub fn next(&mut self, interlace: bool) {
        self.nr += 1;
        self.prev_lof = self.lof;
        if interlace {
            self.lof = !self.lof;
        }
    }
}
