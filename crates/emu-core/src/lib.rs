//! Core types and capability traits for cycle-exact chipset emulation.
//!
//! Everything is counted in master-crystal cycles. A DMA cycle is 8 of
//! them, a CIA cycle 40. All component timing derives from this.

mod clock;
mod component;
mod cycles;
mod observable;

pub use clock::{MasterClock, PAL_CRYSTAL_HZ};
pub use component::{Dumpable, Resettable};
pub use cycles::{
    Cycle, NEVER, as_cia_cycles, as_dma_cycles, cia_cycles, dma_cycles, msec, sec, usec,
};
pub use observable::{Observable, Value};
