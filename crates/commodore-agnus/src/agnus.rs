//! Agnus - beam counter, event scheduler owner and DMA controller.
//!
//! Agnus never touches the other chips directly. Services that move data
//! return the fetched word and the machine forwards it to the consumer.

use std::fmt;

use emu_core::{
    Cycle, Dumpable, NEVER, Observable, Resettable, Value, as_cia_cycles, cia_cycles, dma_cycles,
};

use crate::beam::{Beam, Frame, HPOS_CNT, HPOS_MAX};
use crate::bus::{BusOwner, BusTable};
use crate::copper::Copper;
use crate::ddf::{DdfPredictor, DdfState};
use crate::dma::{
    BplEvent, BplTable, ChipMemory, DMACON_AUD_MASK, DMACON_DSKEN, DMACON_SPREN, DasTable, bpu,
};
use crate::event::{ChangeRecorder, EventId, EventQueue, EventSlot, RegChange};
use crate::sprite::{SPRITE_DMA_FIRST_LINE, SpriteDma};

// DMACON bits
pub const DMACON_SET: u16 = 0x8000;
pub const DMACON_DMAEN: u16 = 0x0200;
pub const DMACON_BPLEN: u16 = 0x0100;
pub const DMACON_COPEN: u16 = 0x0080;

// Pending hsync work
const HSYNC_PREDICT_DDF: u8 = 0b001;
const HSYNC_UPDATE_BPL_TABLE: u8 = 0b010;
const HSYNC_UPDATE_DAS_TABLE: u8 = 0b100;

/// Delay between a CPU or copper write and its effect on the fetch logic.
pub const PIPELINE_DELAY: Cycle = dma_cycles(2);

/// Custom register byte offsets handled by Agnus.
pub mod reg {
    pub const DMACONR: u16 = 0x002;
    pub const VPOSR: u16 = 0x004;
    pub const VHPOSR: u16 = 0x006;
    pub const DSKPTH: u16 = 0x020;
    pub const DSKPTL: u16 = 0x022;
    pub const VPOSW: u16 = 0x02A;
    pub const COPCON: u16 = 0x02E;
    pub const COP1LCH: u16 = 0x080;
    pub const COP1LCL: u16 = 0x082;
    pub const COP2LCH: u16 = 0x084;
    pub const COP2LCL: u16 = 0x086;
    pub const COPJMP1: u16 = 0x088;
    pub const COPJMP2: u16 = 0x08A;
    pub const DIWSTRT: u16 = 0x08E;
    pub const DIWSTOP: u16 = 0x090;
    pub const DDFSTRT: u16 = 0x092;
    pub const DDFSTOP: u16 = 0x094;
    pub const DMACON: u16 = 0x096;
    pub const AUD0LCH: u16 = 0x0A0;
    pub const BPL1PTH: u16 = 0x0E0;
    pub const BPL1PTL: u16 = 0x0E2;
    pub const BPL6PTL: u16 = 0x0F6;
    pub const BPLCON0: u16 = 0x100;
    pub const BPLCON1: u16 = 0x102;
    pub const BPL1MOD: u16 = 0x108;
    pub const BPL2MOD: u16 = 0x10A;
    pub const SPR0PTH: u16 = 0x120;
    pub const SPR7PTL: u16 = 0x13E;
    pub const SPR0POS: u16 = 0x140;
    pub const SPR7DATB: u16 = 0x17E;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AgnusRevision {
    /// 8367 (512 KB chip RAM)
    #[default]
    Ocs,
    /// 8372A (1 MB chip RAM)
    Ecs1Mb,
    /// 8375 (2 MB chip RAM)
    Ecs2Mb,
}

impl AgnusRevision {
    #[must_use]
    pub fn is_ecs(self) -> bool {
        self != AgnusRevision::Ocs
    }

    /// Address bits driven by the DMA pointer registers.
    #[must_use]
    pub fn ptr_mask(self) -> u32 {
        match self {
            AgnusRevision::Ocs => 0x07_FFFF,
            AgnusRevision::Ecs1Mb => 0x0F_FFFF,
            AgnusRevision::Ecs2Mb => 0x1F_FFFF,
        }
    }

    #[must_use]
    pub fn chip_ram_limit_kb(self) -> u32 {
        match self {
            AgnusRevision::Ocs => 512,
            AgnusRevision::Ecs1Mb => 1024,
            AgnusRevision::Ecs2Mb => 2048,
        }
    }

    /// Chip id reported in VPOSR.
    #[must_use]
    pub fn id_bits(self) -> u16 {
        if self.is_ecs() { 0x2000 } else { 0x0000 }
    }

    /// Writable bits of DDFSTRT and DDFSTOP.
    #[must_use]
    pub fn ddf_mask(self) -> u16 {
        if self.is_ecs() { 0x00FE } else { 0x00FC }
    }

    /// Line on which the vertical blank interrupt strobes.
    #[must_use]
    pub fn vstrobe_line(self) -> i64 {
        if self.is_ecs() { 0 } else { 1 }
    }
}

/// A word fetched by one of the two sprite DMA cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteFetch {
    Pos(u16),
    Ctl(u16),
    Data(u16),
    Datb(u16),
}

/// Snapshot of the Agnus state for inspection.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgnusInfo {
    pub clock: Cycle,
    pub vpos: i64,
    pub hpos: i64,
    pub frame: i64,
    pub lof: bool,
    pub dmacon: u16,
    pub bplcon0: u16,
    pub bpu: u8,
    pub ddfstrt: u16,
    pub ddfstop: u16,
    pub diwstrt: u16,
    pub diwstop: u16,
    pub bpl1mod: i16,
    pub bpl2mod: i16,
    pub bls: bool,
    pub coppc: u32,
    pub dskpt: u32,
    pub bplpt: [u32; 6],
    pub audpt: [u32; 4],
    pub audlc: [u32; 4],
    pub sprpt: [u32; 8],
    pub copper_activity: f64,
    pub blitter_activity: f64,
    pub disk_activity: f64,
    pub audio_activity: f64,
    pub sprite_activity: f64,
    pub bitplane_activity: f64,
}

fn set_hi(ptr: u32, value: u16, mask: u32) -> u32 {
    ((u32::from(value) << 16) | (ptr & 0xFFFF)) & mask
}

fn set_lo(ptr: u32, value: u16, mask: u32) -> u32 {
    ((ptr & 0xFFFF_0000) | u32::from(value & 0xFFFE)) & mask
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Agnus {
    pub revision: AgnusRevision,

    pub clock: Cycle,
    pub pos: Beam,
    pub frame: Frame,

    pub events: EventQueue,
    pub changes: ChangeRecorder,
    pub bus: BusTable,

    pub ddf: DdfPredictor,
    pub bpl_table: BplTable,
    pub das_table: DasTable,
    pub sprites: SpriteDma,
    pub copper: Copper,

    // Registers
    pub dmacon: u16,
    pub bplcon0: u16,
    pub bplcon1: u16,
    pub ddfstrt: u16,
    pub ddfstop: u16,
    pub diwstrt: u16,
    pub diwstop: u16,
    pub bpl1mod: i16,
    pub bpl2mod: i16,

    // DMA pointers
    pub bplpt: [u32; 6],
    pub audpt: [u32; 4],
    pub audlc: [u32; 4],
    pub sprpt: [u32; 8],
    pub dskpt: u32,

    // Vertical display window and the flops derived from it
    pub diw_vstrt: i64,
    pub diw_vstop: i64,
    pub diw_v_flop: bool,
    pub ddf_v_flop: bool,

    /// Bitplane DMA is on for the current line.
    pub bpl_dma_line: bool,
    /// DMACON enable bits the DAS table was built from.
    pub dma_das: u16,
    hsync_actions: u8,

    /// Blitter slow-down line, raised while the CPU waits for the bus.
    pub bls: bool,
}

impl Default for Agnus {
    fn default() -> Self {
        Self::new(AgnusRevision::default())
    }
}

impl Agnus {
    #[must_use]
    pub fn new(revision: AgnusRevision) -> Self {
        Self {
            revision,
            clock: 0,
            pos: Beam::default(),
            frame: Frame::default(),
            events: EventQueue::new(),
            changes: ChangeRecorder::default(),
            bus: BusTable::default(),
            ddf: DdfPredictor::default(),
            bpl_table: BplTable::default(),
            das_table: DasTable::default(),
            sprites: SpriteDma::default(),
            copper: Copper::new(),
            dmacon: 0,
            bplcon0: 0,
            bplcon1: 0,
            ddfstrt: 0,
            ddfstop: 0,
            diwstrt: 0,
            diwstop: 0,
            bpl1mod: 0,
            bpl2mod: 0,
            bplpt: [0; 6],
            audpt: [0; 4],
            audlc: [0; 4],
            sprpt: [0; 8],
            dskpt: 0,
            diw_vstrt: 0,
            diw_vstop: 0,
            diw_v_flop: false,
            ddf_v_flop: false,
            bpl_dma_line: false,
            dma_das: 0,
            hsync_actions: 0,
            bls: false,
        }
    }

    /// Switch the chip revision. Every DMA pointer is re-masked.
    pub fn set_revision(&mut self, revision: AgnusRevision) {
        log::debug!("Agnus revision {:?} -> {revision:?}", self.revision);
        self.revision = revision;

        let mask = revision.ptr_mask();
        for pt in self
            .bplpt
            .iter_mut()
            .chain(self.audpt.iter_mut())
            .chain(self.audlc.iter_mut())
            .chain(self.sprpt.iter_mut())
        {
            *pt &= mask;
        }
        self.dskpt &= mask;
        self.copper.cop1lc &= mask;
        self.copper.cop2lc &= mask;
        self.copper.pc &= mask;
        self.ddfstrt &= revision.ddf_mask();
        self.ddfstop &= revision.ddf_mask();
    }

    #[must_use]
    pub fn ptr_mask(&self) -> u32 {
        self.revision.ptr_mask()
    }

    //
    // Time and beam
    //

    /// Advance by one DMA cycle.
    pub fn advance(&mut self) {
        self.clock += dma_cycles(1);
        self.pos.h = if self.pos.h < HPOS_MAX { self.pos.h + 1 } else { 0 };
    }

    /// Advance by `n` DMA cycles without leaving the current line.
    pub fn jump(&mut self, n: i64) {
        self.clock += dma_cycles(n);
        self.pos.h += n;
        debug_assert!(self.pos.h <= HPOS_MAX, "jump crossed the end of line");
    }

    #[must_use]
    pub fn cycles_in_frame(&self) -> Cycle {
        dma_cycles(self.frame.num_lines() * HPOS_CNT)
    }

    #[must_use]
    pub fn start_of_frame(&self) -> Cycle {
        self.clock - dma_cycles(self.pos.v * HPOS_CNT + self.pos.h)
    }

    #[must_use]
    pub fn start_of_next_frame(&self) -> Cycle {
        self.start_of_frame() + self.cycles_in_frame()
    }

    #[must_use]
    pub fn belongs_to_previous_frame(&self, cycle: Cycle) -> bool {
        cycle < self.start_of_frame()
    }

    #[must_use]
    pub fn belongs_to_current_frame(&self, cycle: Cycle) -> bool {
        !self.belongs_to_previous_frame(cycle) && !self.belongs_to_next_frame(cycle)
    }

    #[must_use]
    pub fn belongs_to_next_frame(&self, cycle: Cycle) -> bool {
        cycle >= self.start_of_next_frame()
    }

    #[must_use]
    pub fn beam_to_cycle(&self, beam: Beam) -> Cycle {
        self.start_of_frame() + dma_cycles(beam.v * HPOS_CNT + beam.h)
    }

    /// Beam position of a cycle in the current frame.
    #[must_use]
    pub fn cycle_to_beam(&self, cycle: Cycle) -> Beam {
        let diff = (cycle - self.start_of_frame()) >> 3;
        assert!(diff >= 0, "cycle {cycle} lies before the current frame");
        Beam::new(diff / HPOS_CNT, diff % HPOS_CNT)
    }

    #[must_use]
    pub fn in_last_line(&self) -> bool {
        self.pos.v == self.frame.last_line()
    }

    #[must_use]
    pub fn interlace(&self) -> bool {
        self.bplcon0 & 0x0004 != 0
    }

    //
    // Scheduling
    //

    pub fn schedule_rel(&mut self, slot: EventSlot, delta: Cycle, id: EventId) {
        self.events.schedule_abs(slot, self.clock + delta, id);
    }

    pub fn schedule_rel_with(&mut self, slot: EventSlot, delta: Cycle, id: EventId, data: i64) {
        self.events.schedule_abs_with(slot, self.clock + delta, id, data);
    }

    /// Schedule the next bitplane fetch of this line, if any.
    pub fn schedule_next_bpl_event(&mut self) {
        match self.bpl_table.next_after(self.pos.h) {
            Some(h) => self.schedule_rel(EventSlot::Bpl, dma_cycles(h - self.pos.h), EventId::BplFetch),
            None => self.events.cancel(EventSlot::Bpl),
        }
    }

    /// Schedule the next disk, audio, sprite or refresh slot of this line.
    pub fn schedule_next_das_event(&mut self) {
        match self.das_table.next_after(self.pos.h) {
            Some(h) => self.schedule_rel(EventSlot::Das, dma_cycles(h - self.pos.h), EventId::DasFetch),
            None => self.events.cancel(EventSlot::Das),
        }
    }

    /// Queue a register write that takes effect `delay` cycles from now.
    pub fn record_register_change(&mut self, delay: Cycle, addr: u16, value: u16) {
        self.changes
            .insert(self.clock + delay, RegChange { addr, value });
        self.schedule_next_reg_event();
    }

    fn schedule_next_reg_event(&mut self) {
        let trigger = self.changes.trigger();
        if trigger == NEVER {
            self.events.cancel(EventSlot::Reg);
        } else {
            self.events
                .schedule_abs(EventSlot::Reg, trigger, EventId::RegChange);
        }
    }

    /// `Reg` slot: apply every change that is due.
    pub fn service_reg_event(&mut self) {
        while let Some(change) = self.changes.pop_due(self.clock) {
            self.apply(change.addr, change.value);
        }
        self.schedule_next_reg_event();
    }

    //
    // DMACON
    //

    /// True if DMAEN and every bit of `mask` are set.
    #[must_use]
    pub fn dma_enabled(&self, mask: u16) -> bool {
        self.dmacon & DMACON_DMAEN != 0 && self.dmacon & mask == mask
    }

    #[must_use]
    pub fn bpldma(&self) -> bool {
        self.dma_enabled(DMACON_BPLEN)
    }

    #[must_use]
    pub fn copdma(&self) -> bool {
        self.dma_enabled(DMACON_COPEN)
    }

    #[must_use]
    pub fn dskdma(&self) -> bool {
        self.dma_enabled(DMACON_DSKEN)
    }

    #[must_use]
    pub fn sprdma(&self) -> bool {
        self.dma_enabled(DMACON_SPREN)
    }

    fn poke_dmacon(&mut self, value: u16) {
        let old = self.dmacon;
        if value & DMACON_SET != 0 {
            self.dmacon |= value & 0x07FF;
        } else {
            self.dmacon &= !value;
        }

        // The audio state machine reloads its pointer when a channel starts.
        let started = !old & self.dmacon & DMACON_AUD_MASK;
        for ch in 0..4 {
            if started & (1 << ch) != 0 {
                self.audpt[ch] = self.audlc[ch];
            }
        }

        if self.copdma() && self.copper.is_active() && !self.events.has_event(EventSlot::Cop) {
            self.schedule_rel(EventSlot::Cop, dma_cycles(1), EventId::CopStep);
        }
    }

    //
    // Register access
    //

    /// A CPU or copper write to an Agnus register. Writes that feed the
    /// fetch logic go through the change recorder.
    pub fn poke(&mut self, addr: u16, value: u16) {
        match addr {
            reg::DDFSTRT | reg::DDFSTOP | reg::BPLCON0 | reg::BPLCON1 => {
                self.record_register_change(PIPELINE_DELAY, addr, value);
            }
            _ => self.apply(addr, value),
        }
    }

    /// Apply a register write immediately.
    pub fn apply(&mut self, addr: u16, value: u16) {
        let mask = self.ptr_mask();
        match addr {
            reg::DSKPTH => self.dskpt = set_hi(self.dskpt, value, mask),
            reg::DSKPTL => self.dskpt = set_lo(self.dskpt, value, mask),
            reg::VPOSW => self.frame.lof = value & 0x8000 != 0,
            reg::COPCON => self.copper.danger = value & 0x0002 != 0,
            reg::COP1LCH => self.copper.cop1lc = set_hi(self.copper.cop1lc, value, mask),
            reg::COP1LCL => self.copper.cop1lc = set_lo(self.copper.cop1lc, value, mask),
            reg::COP2LCH => self.copper.cop2lc = set_hi(self.copper.cop2lc, value, mask),
            reg::COP2LCL => self.copper.cop2lc = set_lo(self.copper.cop2lc, value, mask),
            reg::COPJMP1 => {
                self.copper.restart_cop1();
                self.kick_copper();
            }
            reg::COPJMP2 => {
                self.copper.restart_cop2();
                self.kick_copper();
            }
            reg::DIWSTRT => {
                self.diwstrt = value;
                self.diw_vstrt = i64::from(value >> 8);
            }
            reg::DIWSTOP => {
                self.diwstop = value;
                let v8 = if value & 0x8000 != 0 { 0 } else { 0x100 };
                self.diw_vstop = i64::from(value >> 8) | v8;
            }
            reg::DDFSTRT => {
                self.ddfstrt = value & self.revision.ddf_mask();
                self.hsync_actions |= HSYNC_PREDICT_DDF;
            }
            reg::DDFSTOP => {
                self.ddfstop = value & self.revision.ddf_mask();
                self.hsync_actions |= HSYNC_PREDICT_DDF;
            }
            reg::DMACON => self.poke_dmacon(value),
            reg::BPLCON0 => {
                if self.bplcon0 != value {
                    self.hsync_actions |= HSYNC_UPDATE_BPL_TABLE;
                }
                self.bplcon0 = value;
            }
            reg::BPLCON1 => {
                self.bplcon1 = value & 0x00FF;
                self.hsync_actions |= HSYNC_PREDICT_DDF;
            }
            reg::BPL1MOD => self.bpl1mod = (value & 0xFFFE) as i16,
            reg::BPL2MOD => self.bpl2mod = (value & 0xFFFE) as i16,
            reg::BPL1PTH..=reg::BPL6PTL => {
                let n = usize::from((addr - reg::BPL1PTH) >> 2);
                self.bplpt[n] = if addr & 2 == 0 {
                    set_hi(self.bplpt[n], value, mask)
                } else {
                    set_lo(self.bplpt[n], value, mask)
                };
            }
            reg::SPR0PTH..=reg::SPR7PTL => {
                let n = usize::from((addr - reg::SPR0PTH) >> 2);
                self.sprpt[n] = if addr & 2 == 0 {
                    set_hi(self.sprpt[n], value, mask)
                } else {
                    set_lo(self.sprpt[n], value, mask)
                };
            }
            reg::SPR0POS..=reg::SPR7DATB => {
                let n = usize::from((addr - reg::SPR0POS) >> 3);
                match addr & 0x6 {
                    0 => self.sprites.poke_pos(n, value, self.pos.v, self.pos.h),
                    2 => self.sprites.poke_ctl(n, value, self.pos.v, self.pos.h),
                    _ => {}
                }
            }
            a if (reg::AUD0LCH..reg::AUD0LCH + 0x40).contains(&a) => {
                let ch = usize::from((a - reg::AUD0LCH) >> 4);
                match a & 0xF {
                    0x0 => self.audlc[ch] = set_hi(self.audlc[ch], value, mask),
                    0x2 => self.audlc[ch] = set_lo(self.audlc[ch], value, mask),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Read an Agnus register. `None` for addresses Agnus does not drive.
    #[must_use]
    pub fn peek(&self, addr: u16) -> Option<u16> {
        match addr {
            reg::DMACONR => Some(self.dmacon & 0x07FF),
            reg::VPOSR => Some(self.peek_vposr()),
            reg::VHPOSR => Some(self.peek_vhposr()),
            _ => None,
        }
    }

    #[must_use]
    pub fn peek_vposr(&self) -> u16 {
        let lof = if self.frame.lof { 0x8000 } else { 0 };
        lof | self.revision.id_bits() | ((self.pos.v >> 8) & 1) as u16
    }

    #[must_use]
    pub fn peek_vhposr(&self) -> u16 {
        (((self.pos.v & 0xFF) << 8) | (self.pos.h & 0xFF)) as u16
    }

    //
    // Line and frame boundaries
    //

    fn in_bpl_dma_line(&self) -> bool {
        self.ddf_v_flop && bpu(self.bplcon0) > 0 && self.bpldma()
    }

    fn das_mask(&self) -> u16 {
        if self.dmacon & DMACON_DMAEN == 0 {
            return 0;
        }
        let mut mask = self.dmacon & 0b11_1111;
        if self.pos.v < SPRITE_DMA_FIRST_LINE || self.pos.v >= self.frame.last_line() {
            mask &= !DMACON_SPREN;
        }
        mask
    }

    fn update_bpl_table(&mut self) {
        if self.bpl_dma_line {
            let hires = self.bplcon0 & 0x8000 != 0;
            let ddf = if hires { self.ddf.hires } else { self.ddf.lores };
            self.bpl_table.build(&ddf, hires, bpu(self.bplcon0));
        } else {
            self.bpl_table.clear();
        }
    }

    /// End of line. Called by the `Ras` service with `h` wrapped to 0.
    /// Returns true if a new frame started.
    pub fn hsync(&mut self) -> bool {
        debug_assert!(self.pos.h == 0, "hsync at hpos {}", self.pos.h);

        // Sprite logic already sees the incremented line counter.
        let sprdma = self.sprdma();
        self.sprites
            .update(self.pos.v + 1, self.frame.last_line(), sprdma);

        self.pos.h = 0;
        self.pos.v += 1;
        let vsync = self.pos.v >= self.frame.num_lines();
        if vsync {
            self.vsync();
        }

        if self.pos.v == self.diw_vstrt && !self.diw_v_flop {
            self.diw_v_flop = true;
        }
        if self.pos.v == self.diw_vstop && self.diw_v_flop {
            self.diw_v_flop = false;
        }
        self.ddf_v_flop = !self.in_last_line() && self.diw_v_flop;

        let bpl_line = self.in_bpl_dma_line();
        if bpl_line != self.bpl_dma_line {
            self.hsync_actions |= HSYNC_UPDATE_BPL_TABLE;
            self.bpl_dma_line = bpl_line;
        }

        let das = self.das_mask();
        if das != self.dma_das {
            self.hsync_actions |= HSYNC_UPDATE_DAS_TABLE;
            self.dma_das = das;
        }

        if self.hsync_actions & HSYNC_PREDICT_DDF != 0 {
            self.hsync_actions &= !HSYNC_PREDICT_DDF;
            let changed = self.ddf.predict(
                self.revision.is_ecs(),
                self.ddfstrt,
                self.ddfstop,
                self.bplcon1,
                self.pos.v,
            );
            if changed {
                self.hsync_actions |= HSYNC_UPDATE_BPL_TABLE | HSYNC_PREDICT_DDF;
            }
        }
        if self.hsync_actions & HSYNC_UPDATE_BPL_TABLE != 0 {
            self.hsync_actions &= !HSYNC_UPDATE_BPL_TABLE;
            self.update_bpl_table();
        }
        if self.hsync_actions & HSYNC_UPDATE_DAS_TABLE != 0 {
            self.hsync_actions &= !HSYNC_UPDATE_DAS_TABLE;
            self.das_table.build(self.dma_das);
        }

        self.bus.clear();
        self.schedule_next_bpl_event();
        self.schedule_next_das_event();

        vsync
    }

    fn vsync(&mut self) {
        self.frame.next(self.interlace());
        self.pos.v = 0;
        self.diw_v_flop = false;
        self.bus.stats.update();

        self.copper.restart_cop1();
        self.kick_copper();
        log::trace!("frame {} ({} lines)", self.frame.nr, self.frame.num_lines());
    }

    fn kick_copper(&mut self) {
        if self.copdma() {
            self.schedule_rel(EventSlot::Cop, 0, EventId::CopStep);
        }
    }

    //
    // DMA services
    //

    /// `Bpl` slot: fetch one bitplane word. Returns the plane and the word
    /// for the bitplane shifter.
    pub fn service_bpl_event<M: ChipMemory + ?Sized>(&mut self, mem: &M) -> Option<(u8, u16)> {
        let h = self.pos.h;
        let result = match self.bpl_table.event_at(h) {
            BplEvent::Fetch { plane, modulo } if self.bus.try_claim(h, BusOwner::Bitplane(plane)) => {
                let n = usize::from(plane);
                let mask = self.ptr_mask();
                let word = mem.peek16(self.bplpt[n] & mask);
                let mut pt = i64::from(self.bplpt[n]) + 2;
                if modulo {
                    pt += i64::from(if plane % 2 == 0 { self.bpl1mod } else { self.bpl2mod });
                }
                self.bplpt[n] = (pt as u32) & mask;
                Some((plane, word))
            }
            _ => None,
        };
        self.schedule_next_bpl_event();
        result
    }

    /// Refresh cycle of the DAS slot.
    pub fn do_refresh(&mut self) {
        self.bus.assign(self.pos.h, BusOwner::Refresh);
    }

    /// Disk DMA from memory to the drive.
    pub fn do_disk_dma_read<M: ChipMemory + ?Sized>(&mut self, mem: &M) -> u16 {
        let mask = self.ptr_mask();
        let word = mem.peek16(self.dskpt & mask);
        self.dskpt = self.dskpt.wrapping_add(2) & mask;
        self.bus.assign(self.pos.h, BusOwner::Disk);
        word
    }

    /// Disk DMA from the drive to memory.
    pub fn do_disk_dma_write<M: ChipMemory + ?Sized>(&mut self, mem: &mut M, word: u16) {
        let mask = self.ptr_mask();
        mem.poke16(self.dskpt & mask, word);
        self.dskpt = self.dskpt.wrapping_add(2) & mask;
        self.bus.assign(self.pos.h, BusOwner::Disk);
    }

    /// Audio DMA for `channel`.
    pub fn do_audio_dma<M: ChipMemory + ?Sized>(&mut self, channel: usize, mem: &M) -> u16 {
        let mask = self.ptr_mask();
        let word = mem.peek16(self.audpt[channel] & mask);
        self.audpt[channel] = self.audpt[channel].wrapping_add(2) & mask;
        self.bus.assign(self.pos.h, BusOwner::Audio);
        word
    }

    fn do_sprite_dma<M: ChipMemory + ?Sized>(&mut self, nr: usize, mem: &M) -> u16 {
        let mask = self.ptr_mask();
        let word = mem.peek16(self.sprpt[nr] & mask);
        self.sprpt[nr] = self.sprpt[nr].wrapping_add(2) & mask;
        self.bus.assign(self.pos.h, BusOwner::Sprite(nr as u8));
        word
    }

    /// First DMA cycle of sprite `nr`: POS on the stop line, DATA while
    /// active.
    pub fn first_sprite_cycle<M: ChipMemory + ?Sized>(&mut self, nr: u8, mem: &M) -> Option<SpriteFetch> {
        self.sprite_cycle(nr, mem, true)
    }

    /// Second DMA cycle of sprite `nr`: CTL on the stop line, DATB while
    /// active.
    pub fn second_sprite_cycle<M: ChipMemory + ?Sized>(&mut self, nr: u8, mem: &M) -> Option<SpriteFetch> {
        self.sprite_cycle(nr, mem, false)
    }

    fn sprite_cycle<M: ChipMemory + ?Sized>(&mut self, nr: u8, mem: &M, first: bool) -> Option<SpriteFetch> {
        let n = usize::from(nr);
        let (v, h) = (self.pos.v, self.pos.h);

        if v == self.sprites.vstop[n] {
            self.sprites.state[n] = crate::sprite::SpriteDmaState::Idle;
            if !self.bus.is_free(h) {
                return None;
            }
            let word = self.do_sprite_dma(n, mem);
            if first {
                self.sprites.poke_pos(n, word, v, h);
                Some(SpriteFetch::Pos(word))
            } else {
                self.sprites.poke_ctl(n, word, v, h);
                Some(SpriteFetch::Ctl(word))
            }
        } else if self.sprites.is_active(n) && self.bus.is_free(h) {
            let word = self.do_sprite_dma(n, mem);
            Some(if first { SpriteFetch::Data(word) } else { SpriteFetch::Datb(word) })
        } else {
            None
        }
    }

    /// `Cop` slot: run one copper step. Returns a MOVE that passed the
    /// write protection check.
    pub fn service_cop_event<M: ChipMemory + ?Sized>(&mut self, mem: &M) -> Option<(u16, u16)> {
        if !self.copdma() || !self.copper.is_active() || self.copper.at_end_of_list() {
            self.events.cancel(EventSlot::Cop);
            return None;
        }

        let h = self.pos.h;

        // The copper runs on even cycles only.
        if h & 1 == 1 {
            self.schedule_rel(EventSlot::Cop, dma_cycles(1), EventId::CopStep);
            return None;
        }
        if self.copper.needs_bus() && !self.bus.try_claim(h, BusOwner::Copper) {
            self.schedule_rel(EventSlot::Cop, dma_cycles(1), EventId::CopStep);
            return None;
        }

        let mask = self.ptr_mask();
        let result = self
            .copper
            .tick(self.pos.v as u16, h as u16, |addr| mem.peek16(addr & mask));
        self.schedule_rel(EventSlot::Cop, dma_cycles(2), EventId::CopStep);

        match result {
            Some((reg, _)) if !self.copper.may_write(reg) => {
                log::warn!("copper write to protected register {reg:#05X}, halting");
                self.copper.halt();
                self.events.cancel(EventSlot::Cop);
                None
            }
            other => other,
        }
    }

    //
    // Inspection
    //

    #[must_use]
    pub fn info(&self) -> AgnusInfo {
        let mask = self.ptr_mask();
        let stats = &self.bus.stats;
        AgnusInfo {
            clock: self.clock,
            vpos: self.pos.v,
            hpos: self.pos.h,
            frame: self.frame.nr,
            lof: self.frame.lof,
            dmacon: self.dmacon,
            bplcon0: self.bplcon0,
            bpu: bpu(self.bplcon0),
            ddfstrt: self.ddfstrt,
            ddfstop: self.ddfstop,
            diwstrt: self.diwstrt,
            diwstop: self.diwstop,
            bpl1mod: self.bpl1mod,
            bpl2mod: self.bpl2mod,
            bls: self.bls,
            coppc: self.copper.pc & mask,
            dskpt: self.dskpt & mask,
            bplpt: self.bplpt.map(|p| p & mask),
            audpt: self.audpt.map(|p| p & mask),
            audlc: self.audlc.map(|p| p & mask),
            sprpt: self.sprpt.map(|p| p & mask),
            copper_activity: stats.copper_activity,
            blitter_activity: stats.blitter_activity,
            disk_activity: stats.disk_activity,
            audio_activity: stats.audio_activity,
            sprite_activity: stats.sprite_activity,
            bitplane_activity: stats.bitplane_activity,
        }
    }
}

impl Resettable for Agnus {
    fn reset(&mut self, hard: bool) {
        let revision = self.revision;
        let clock = self.clock;
        *self = Agnus::new(revision);
        if !hard {
            self.clock = clock;
        }

        self.schedule_rel(EventSlot::Ras, dma_cycles(HPOS_CNT), EventId::RasHsync);
        let cia = cia_cycles(as_cia_cycles(self.clock) + 1);
        self.events
            .schedule_abs(EventSlot::CiaA, cia, EventId::CiaExecute);
        self.events
            .schedule_abs(EventSlot::CiaB, cia + dma_cycles(1), EventId::CiaExecute);
        self.schedule_rel(
            EventSlot::Vbl,
            dma_cycles(HPOS_CNT * revision.vstrobe_line()),
            EventId::VblStrobe,
        );
        self.schedule_next_bpl_event();
        self.schedule_next_das_event();
    }
}

impl Observable for Agnus {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(h) = path.strip_prefix("bus.") {
            let h: i64 = h.parse().ok()?;
            return (0..HPOS_CNT)
                .contains(&h)
                .then(|| Value::from(self.bus.owner_at(h).name()));
        }
        if let Some(slot) = path.strip_prefix("slot.") {
            let slot = EventSlot::ALL.into_iter().find(|s| s.name() == slot)?;
            return Some(Value::I64(self.events.trigger(slot)));
        }
        if let Some(n) = path.strip_prefix("bplpt.") {
            let n: usize = n.parse().ok()?;
            return self.bplpt.get(n).map(|&p| Value::U32(p));
        }
        if let Some(n) = path.strip_prefix("sprpt.") {
            let n: usize = n.parse().ok()?;
            return self.sprpt.get(n).map(|&p| Value::U32(p));
        }
        match path {
            "clock" => Some(Value::I64(self.clock)),
            "vpos" => Some(Value::I64(self.pos.v)),
            "hpos" => Some(Value::I64(self.pos.h)),
            "frame" => Some(Value::I64(self.frame.nr)),
            "lof" => Some(self.frame.lof.into()),
            "revision" => Some(format!("{:?}", self.revision).into()),
            "dmacon" => Some(self.dmacon.into()),
            "bplcon0" => Some(self.bplcon0.into()),
            "bplcon1" => Some(self.bplcon1.into()),
            "ddfstrt" => Some(self.ddfstrt.into()),
            "ddfstop" => Some(self.ddfstop.into()),
            "diwstrt" => Some(self.diwstrt.into()),
            "diwstop" => Some(self.diwstop.into()),
            "dskpt" => Some(self.dskpt.into()),
            "bls" => Some(self.bls.into()),
            "ddf.state" => Some(Value::from(match self.ddf.state {
                DdfState::Off => "off",
                DdfState::On => "on",
            })),
            "ddf.lores" => Some(Value::Array(vec![
                Value::I64(self.ddf.lores.strt_odd),
                Value::I64(self.ddf.lores.stop_odd),
                Value::I64(self.ddf.lores.strt_even),
                Value::I64(self.ddf.lores.stop_even),
            ])),
            "ddf.hires" => Some(Value::Array(vec![
                Value::I64(self.ddf.hires.strt_odd),
                Value::I64(self.ddf.hires.stop_odd),
                Value::I64(self.ddf.hires.strt_even),
                Value::I64(self.ddf.hires.stop_even),
            ])),
            "copper.pc" => Some(self.copper.pc.into()),
            "copper.state" => Some(format!("{:?}", self.copper.state).into()),
            "next_trigger" => Some(Value::I64(self.events.next_trigger)),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "clock",
            "vpos",
            "hpos",
            "frame",
            "lof",
            "revision",
            "dmacon",
            "bplcon0",
            "bplcon1",
            "ddfstrt",
            "ddfstop",
            "diwstrt",
            "diwstop",
            "dskpt",
            "bls",
            "ddf.state",
            "ddf.lores",
            "ddf.hires",
            "copper.pc",
            "copper.state",
            "next_trigger",
            "bus.<n>",
            "slot.<name>",
            "bplpt.<n>",
            "sprpt.<n>",
        ]
    }
}

impl Dumpable for Agnus {
    fn name(&self) -> &'static str {
        "Agnus"
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        if let Err(err) = self.write_state(&mut out) {
            log::warn!("Agnus dump truncated: {err}");
        }
        out
    }
}

impl Agnus {
    fn write_state(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "revision : {:?}", self.revision)?;
        writeln!(out, "   clock : {}", self.clock)?;
        writeln!(out, "    beam : ({}, {}) frame {}", self.pos.v, self.pos.h, self.frame.nr)?;
        writeln!(out, "  dmacon : {:04X}", self.dmacon)?;
        writeln!(out, "   dskpt : {:06X}", self.dskpt)?;
        for (i, pt) in self.bplpt.iter().enumerate() {
            writeln!(out, "bplpt[{i}] : {pt:06X}")?;
        }
        for (i, pt) in self.audpt.iter().enumerate() {
            writeln!(out, "audpt[{i}] : {pt:06X}")?;
        }
        for (i, pt) in self.sprpt.iter().enumerate() {
            writeln!(out, "sprpt[{i}] : {pt:06X}")?;
        }
        writeln!(out, "     diw : v {}..{} flop {}", self.diw_vstrt, self.diw_vstop, self.diw_v_flop)?;
        writeln!(out, "\nEvents:")?;
        for (slot, event) in self.events.slots() {
            if event.trigger == NEVER {
                writeln!(out, "{:>8} : -", slot.name())?;
            } else {
                writeln!(out, "{:>8} : {:?} @ {}", slot.name(), event.id, event.trigger)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::LINES_LONG_FRAME;
    use crate::dma::DasEvent;

    struct Ram(Vec<u16>);

    impl Ram {
        fn new() -> Self {
            Self(vec![0; 0x4_0000])
        }
    }

    impl ChipMemory for Ram {
        fn peek16(&self, addr: u32) -> u16 {
            self.0[((addr >> 1) as usize) % self.0.len()]
        }
        fn poke16(&mut self, addr: u32, value: u16) {
            let len = self.0.len();
            self.0[((addr >> 1) as usize) % len] = value;
        }
    }

    fn reset_agnus(revision: AgnusRevision) -> Agnus {
        let mut agnus = Agnus::new(revision);
        agnus.reset(true);
        agnus
    }

    /// Step to the start of the next line and run hsync.
    fn next_line(agnus: &mut Agnus) -> bool {
        agnus.clock += dma_cycles(HPOS_CNT - agnus.pos.h);
        agnus.pos.h = 0;
        agnus.hsync()
    }

    #[test]
    fn reset_schedules_initial_events() {
        let agnus = reset_agnus(AgnusRevision::Ocs);
        assert_eq!(agnus.events.trigger(EventSlot::Ras), dma_cycles(227));
        assert_eq!(agnus.events.trigger(EventSlot::CiaA), 40);
        assert_eq!(agnus.events.trigger(EventSlot::CiaB), 48);
        assert_eq!(agnus.events.trigger(EventSlot::Vbl), dma_cycles(227));
        assert_eq!(agnus.events.trigger(EventSlot::Das), dma_cycles(1), "first refresh slot");

        let ecs = reset_agnus(AgnusRevision::Ecs1Mb);
        assert_eq!(ecs.events.trigger(EventSlot::Vbl), 0, "ECS strobes on line 0");
    }

    #[test]
    fn beam_and_cycle_conversions_agree() {
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.clock = dma_cycles(5 * HPOS_CNT + 17);
        agnus.pos = Beam::new(5, 17);
        assert_eq!(agnus.start_of_frame(), 0);
        let beam = Beam::new(100, 3);
        assert_eq!(agnus.cycle_to_beam(agnus.beam_to_cycle(beam)), beam);
        assert!(agnus.belongs_to_next_frame(dma_cycles(LINES_LONG_FRAME * HPOS_CNT)));
        assert!(agnus.belongs_to_current_frame(dma_cycles(LINES_LONG_FRAME * HPOS_CNT) - 1));
    }

    #[test]
    fn hsync_wraps_into_new_frame() {
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        let mut vsyncs = 0;
        for _ in 0..LINES_LONG_FRAME {
            if next_line(&mut agnus) {
                vsyncs += 1;
            }
        }
        assert_eq!(vsyncs, 1);
        assert_eq!(agnus.pos.v, 0);
        assert_eq!(agnus.frame.nr, 1);
        assert!(agnus.frame.is_long(), "non-interlaced frames stay long");
    }

    #[test]
    fn diwstop_high_bit_is_inverse_of_bit_15() {
        let mut agnus = Agnus::default();
        agnus.apply(reg::DIWSTOP, 0x2CC1);
        assert_eq!(agnus.diw_vstop, 0x12C);
        agnus.apply(reg::DIWSTOP, 0xF4C1);
        assert_eq!(agnus.diw_vstop, 0xF4);
    }

    #[test]
    fn pipelined_writes_land_after_two_cycles() {
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.poke(reg::DDFSTRT, 0x0038);
        assert_eq!(agnus.ddfstrt, 0);
        assert_eq!(agnus.events.trigger(EventSlot::Reg), PIPELINE_DELAY);

        agnus.clock = PIPELINE_DELAY;
        agnus.service_reg_event();
        assert_eq!(agnus.ddfstrt, 0x38);
        assert!(!agnus.events.is_pending(EventSlot::Reg));
    }

    #[test]
    fn ddf_writes_are_masked_by_revision() {
        let mut agnus = Agnus::new(AgnusRevision::Ocs);
        agnus.apply(reg::DDFSTRT, 0x003A);
        assert_eq!(agnus.ddfstrt, 0x38);
        agnus.set_revision(AgnusRevision::Ecs1Mb);
        agnus.apply(reg::DDFSTRT, 0x003A);
        assert_eq!(agnus.ddfstrt, 0x3A);
    }

    #[test]
    fn revision_change_remasks_pointers() {
        let mut agnus = Agnus::new(AgnusRevision::Ecs2Mb);
        agnus.apply(reg::BPL1PTH, 0x001F);
        agnus.apply(reg::BPL1PTL, 0x2000);
        agnus.apply(reg::DSKPTH, 0x0018);
        assert_eq!(agnus.bplpt[0], 0x1F_2000);
        agnus.set_revision(AgnusRevision::Ocs);
        assert_eq!(agnus.bplpt[0], 0x07_2000);
        assert_eq!(agnus.dskpt, 0);
    }

    #[test]
    fn vposr_reports_lof_and_chip_id() {
        let mut agnus = Agnus::new(AgnusRevision::Ecs1Mb);
        agnus.pos = Beam::new(0x123, 0x45);
        assert_eq!(agnus.peek(reg::VPOSR), Some(0xA001));
        assert_eq!(agnus.peek(reg::VHPOSR), Some(0x2345));
        assert_eq!(agnus.peek(0x180), None);
    }

    #[test]
    fn bitplane_line_fetches_and_applies_modulo() {
        let mut ram = Ram::new();
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.apply(reg::DIWSTRT, 0x2C81);
        agnus.apply(reg::DIWSTOP, 0x2CC1);
        agnus.apply(reg::DDFSTRT, 0x0038);
        agnus.apply(reg::DDFSTOP, 0x00D0);
        agnus.apply(reg::BPLCON0, 0x1200);
        agnus.apply(reg::BPL1MOD, 0x0010);
        agnus.apply(reg::BPL1PTL, 0x1000);
        agnus.apply(reg::DMACON, DMACON_SET | DMACON_DMAEN | DMACON_BPLEN);
        ram.poke16(0x1000, 0xBEEF);

        agnus.pos.v = 0x2B;
        next_line(&mut agnus);
        assert!(agnus.bpl_dma_line);
        assert_eq!(agnus.bpl_table.fetch_count(), 20);
        assert_eq!(
            agnus.events.trigger(EventSlot::Bpl),
            agnus.clock + dma_cycles(0x3F)
        );

        let mut first = None;
        while let Some(h) = agnus.bpl_table.next_after(agnus.pos.h) {
            agnus.clock += dma_cycles(h - agnus.pos.h);
            agnus.pos.h = h;
            let fetched = agnus.service_bpl_event(&ram);
            first = first.or(fetched);
        }
        assert_eq!(first, Some((0, 0xBEEF)));
        assert_eq!(agnus.bplpt[0], 0x1000 + 40 + 0x10);
        assert_eq!(agnus.bus.owner_at(0x3F), BusOwner::Bitplane(0));
        assert!(!agnus.events.is_pending(EventSlot::Bpl));
    }

    #[test]
    fn das_mask_follows_dmacon() {
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.apply(reg::DMACON, DMACON_SET | DMACON_DMAEN | DMACON_DSKEN | DMACON_SPREN);

        agnus.pos.v = 10;
        next_line(&mut agnus);
        assert_eq!(agnus.dma_das, DMACON_DSKEN, "no sprites above line 25");
        assert_eq!(agnus.das_table.event_at(0x04), DasEvent::Disk);

        agnus.pos.v = 40;
        next_line(&mut agnus);
        assert_eq!(agnus.dma_das, DMACON_DSKEN | DMACON_SPREN);
        assert_eq!(agnus.das_table.event_at(0x0B), DasEvent::SpriteFirst(0));
    }

    #[test]
    fn disk_dma_moves_pointer_and_owns_the_cycle() {
        let mut ram = Ram::new();
        let mut agnus = Agnus::default();
        agnus.dskpt = 0x2000;
        agnus.pos.h = 4;
        agnus.do_disk_dma_write(&mut ram, 0x4489);
        assert_eq!(ram.peek16(0x2000), 0x4489);
        assert_eq!(agnus.dskpt, 0x2002);
        assert_eq!(agnus.bus.owner_at(4), BusOwner::Disk);

        agnus.pos.h = 5;
        assert_eq!(agnus.do_disk_dma_read(&ram), 0);
        assert_eq!(agnus.dskpt, 0x2004);
    }

    #[test]
    fn sprite_stop_line_fetches_control_words() {
        let mut ram = Ram::new();
        ram.poke16(0x3000, 0x4050);
        ram.poke16(0x3002, 0x5000);
        let mut agnus = Agnus::default();
        agnus.sprpt[1] = 0x3000;
        agnus.pos = Beam::new(30, 0x0D);
        agnus.sprites.vstop[1] = 30;

        assert_eq!(agnus.first_sprite_cycle(1, &ram), Some(SpriteFetch::Pos(0x4050)));
        agnus.pos.h = 0x0E;
        assert_eq!(agnus.second_sprite_cycle(1, &ram), Some(SpriteFetch::Ctl(0x5000)));
        assert_eq!(agnus.sprites.vstrt[1], 0x40);
        assert_eq!(agnus.sprites.vstop[1], 0x50);
        assert_eq!(agnus.sprpt[1], 0x3004);
    }

    #[test]
    fn copper_halts_on_protected_write() {
        let mut ram = Ram::new();
        // MOVE $1234 -> $040 (BLTCON0), needs danger
        ram.poke16(0x100, 0x0040);
        ram.poke16(0x102, 0x1234);
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.apply(reg::COP1LCL, 0x0100);
        agnus.apply(reg::DMACON, DMACON_SET | DMACON_DMAEN | DMACON_COPEN);
        agnus.apply(reg::COPJMP1, 0);
        assert!(agnus.events.is_pending(EventSlot::Cop));

        agnus.pos.h = 0x20;
        assert_eq!(agnus.service_cop_event(&ram), None);
        agnus.pos.h = 0x22;
        assert_eq!(agnus.service_cop_event(&ram), None);
        assert!(!agnus.copper.is_active());
        assert!(!agnus.events.is_pending(EventSlot::Cop));
    }

    #[test]
    fn copper_retries_when_bus_is_taken() {
        let mut ram = Ram::new();
        ram.poke16(0x100, 0x0180);
        ram.poke16(0x102, 0x0F00);
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.apply(reg::COP1LCL, 0x0100);
        agnus.apply(reg::DMACON, DMACON_SET | DMACON_DMAEN | DMACON_COPEN);
        agnus.apply(reg::COPJMP1, 0);

        agnus.pos.h = 0x40;
        agnus.bus.assign(0x40, BusOwner::Bitplane(0));
        assert_eq!(agnus.service_cop_event(&ram), None);
        assert_eq!(agnus.events.trigger(EventSlot::Cop), agnus.clock + dma_cycles(1));

        agnus.pos.h = 0x42;
        agnus.service_cop_event(&ram);
        agnus.pos.h = 0x44;
        assert_eq!(agnus.service_cop_event(&ram), Some((0x180, 0x0F00)));
    }

    #[test]
    fn observable_paths_resolve() {
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.bus.assign(3, BusOwner::Refresh);
        assert_eq!(agnus.query("bus.3"), Some(Value::from("refresh")));
        assert_eq!(agnus.query("slot.ras"), Some(Value::I64(dma_cycles(227))));
        assert_eq!(agnus.query("ddf.state"), Some(Value::from("off")));
        assert_eq!(agnus.query("bus.227"), None);
        assert_eq!(agnus.query("nonsense"), None);
        assert!(agnus.dump().contains("ras"));
    }

    #[test]
    fn dump_lists_pointers_and_armed_slots() {
        let mut agnus = reset_agnus(AgnusRevision::Ocs);
        agnus.dskpt = 0x01_2344;
        let text = agnus.dump();
        assert!(text.contains("   dskpt : 012344"));
        assert!(text.contains("sprpt[7] : 000000"));
        assert!(text.contains(&format!("{:>8} : -", EventSlot::Bpl.name())));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn write_errors_stop_the_dump() {
        /// Accepts `budget` writes, then fails.
        struct Limited {
            budget: usize,
            lines: usize,
        }

        impl fmt::Write for Limited {
            fn write_str(&mut self, _: &str) -> fmt::Result {
                if self.budget == 0 {
                    return Err(fmt::Error);
                }
                self.budget -= 1;
                self.lines += 1;
                Ok(())
            }
        }

        let agnus = reset_agnus(AgnusRevision::Ocs);
        let mut out = Limited { budget: 3, lines: 0 };
        assert_eq!(agnus.write_state(&mut out), Err(fmt::Error));
        assert_eq!(out.lines, 3);
    }
}
