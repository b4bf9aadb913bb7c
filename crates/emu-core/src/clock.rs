//! Master clock configuration.

use crate::Cycle;

/// PAL Amiga master crystal frequency in Hz.
pub const PAL_CRYSTAL_HZ: u64 = 28_375_160;

/// The crystal every chip divides down from.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// Crystal frequency in Hz.
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    #[must_use]
    pub const fn pal() -> Self {
        Self::new(PAL_CRYSTAL_HZ)
    }

    /// Wall-clock seconds represented by `cycles` at this frequency.
    #[must_use]
    pub fn seconds(&self, cycles: Cycle) -> f64 {
        cycles as f64 / self.frequency_hz as f64
    }
}

impl Default for MasterClock {
    fn default() -> Self {
        Self::pal()
    }
}
