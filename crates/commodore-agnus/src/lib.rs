//! Commodore Agnus (OCS/ECS): beam counter, event scheduler, bus arbitration,
//! DMA slot tables, sprite DMA and the copper.
//!
//! Agnus owns the master clock and every timed event of the chipset. The
//! machine crate implements [`EventHandler`] and services the slots; Agnus
//! supplies the per-slot DMA work and hands fetched words back to the caller.

mod agnus;
pub mod beam;
pub mod bus;
mod copper;
pub mod ddf;
pub mod dma;
pub mod event;
mod sprite;

pub use agnus::{
    Agnus, AgnusInfo, AgnusRevision, DMACON_BPLEN, DMACON_COPEN, DMACON_DMAEN, DMACON_SET,
    PIPELINE_DELAY, SpriteFetch, reg,
};
pub use beam::{Beam, Frame, HPOS_CNT, HPOS_MAX};
pub use bus::{BusOwner, BusStats, BusTable};
pub use copper::{Copper, State as CopperState};
pub use ddf::{Ddf, DdfPredictor, DdfState};
pub use dma::{BplEvent, BplTable, ChipMemory, DMACON_DSKEN, DMACON_SPREN, DasEvent, DasTable, bpu};
pub use event::{
    ChangeRecorder, Event, EventHandler, EventId, EventQueue, EventSlot, RegChange,
    execute_events_until,
};
pub use sprite::{SpriteDma, SpriteDmaState};
