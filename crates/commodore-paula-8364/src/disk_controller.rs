//! Floppy disk controller: DSKLEN state machine, the six byte FIFO between
//! drive and DMA, and disk change events.

use commodore_agnus::{Agnus, ChipMemory, EventId, EventSlot};
use drive_amiga_floppy::{Disk, FloppyDrive};
use emu_core::{Cycle, Dumpable, Observable, Resettable, Value, dma_cycles, sec, usec};

use crate::irq::{InterruptController, IrqSource};

/// Default DSKSYNC value (the standard MFM sync word).
pub const DEFAULT_SYNC: u16 = 0x4489;

/// Cycles between two bytes passing the head.
pub const ROTATE_CYCLES: Cycle = dma_cycles(56);

/// ADKCON bit 10.
pub const ADKCON_WORDSYNC: u16 = 0x0400;

const DSKLEN_DMAEN: u16 = 0x8000;
const DSKLEN_WRITE: u16 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskControllerConfig {
    /// Drives attached to the controller. df0 is always connected.
    pub connected: [bool; 4],
    /// Feed the FIFO from the `Dsk` slot rather than from the DMA slot.
    pub async_fifo: bool,
    /// Reject DSKSYNC values other than $4489.
    pub lock_dsk_sync: bool,
    /// Fake a sync match when none shows up for a long time.
    pub auto_dsk_sync: bool,
    /// Drain the FIFO byte by byte after a write block instead of at once.
    pub timed_flush: bool,
}

impl Default for DiskControllerConfig {
    fn default() -> Self {
        Self {
            connected: [true, false, false, false],
            async_fifo: true,
            lock_dsk_sync: false,
            auto_dsk_sync: false,
            timed_flush: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveState {
    #[default]
    Off,
    Wait,
    Read,
    Write,
    Flush,
}

impl DriveState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DriveState::Off => "off",
            DriveState::Wait => "wait",
            DriveState::Read => "read",
            DriveState::Write => "write",
            DriveState::Flush => "flush",
        }
    }
}

/// Up to six bytes, newest in the low byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fifo {
    data: u64,
    count: u8,
}

impl Fifo {
    pub const CAPACITY: u8 = 6;

    pub fn clear(&mut self) {
        self.data = 0;
        self.count = 0;
    }

    #[must_use]
    pub fn len(&self) -> u8 {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn has_word(&self) -> bool {
        self.count >= 2
    }

    #[must_use]
    pub fn can_store_word(&self) -> bool {
        self.count <= 4
    }

    /// Push a byte. A full FIFO first loses its oldest word.
    pub fn write(&mut self, byte: u8) {
        if self.count == Self::CAPACITY {
            log::trace!("fifo overflow, dropping oldest word");
            self.count -= 2;
        }
        self.data = (self.data << 8) | u64::from(byte);
        self.count += 1;
    }

    /// Pop the oldest byte.
    pub fn read(&mut self) -> u8 {
        debug_assert!(!self.is_empty(), "read from empty fifo");
        self.count -= 1;
        ((self.data >> (8 * self.count)) & 0xFF) as u8
    }

    /// Pop the oldest word.
    pub fn read16(&mut self) -> u16 {
        debug_assert!(self.has_word(), "word read from fifo holding {} bytes", self.count);
        self.count -= 2;
        ((self.data >> (8 * self.count)) & 0xFFFF) as u16
    }

    /// True if the two newest bytes equal `word`.
    #[must_use]
    pub fn compare(&self, word: u16) -> bool {
        self.has_word() && (self.data & 0xFFFF) as u16 == word
    }

    /// Buffered bytes, oldest first.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        (0..self.count)
            .rev()
            .map(|i| ((self.data >> (8 * i)) & 0xFF) as u8)
            .collect()
    }
}

/// Controller state as shown by the inspector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskControllerInfo {
    pub selected: Option<usize>,
    pub state: DriveState,
    pub fifo: Vec<u8>,
    pub dsklen: u16,
    pub dskbytr: u16,
    pub dsksync: u16,
    pub prb: u8,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskController {
    pub config: DiskControllerConfig,
    pub drives: [FloppyDrive; 4],
    /// First drive whose SEL line is asserted.
    pub selected: Option<usize>,
    pub state: DriveState,
    pub fifo: Fifo,
    /// Last byte from the head. Bit 15 flags a byte not yet seen through
    /// DSKBYTR.
    pub incoming: u16,
    pub dsklen: u16,
    pub dsksync: u16,
    /// Last CIA-B PRB value seen.
    pub prb: u8,
    /// Cycle of the last sync match.
    pub sync_cycle: Cycle,
    sync_counter: u32,
    /// `config.async_fifo` latched at the last DSKLEN write.
    async_fifo: bool,
    disk_to_insert: Option<Box<Disk>>,
}

impl Default for DiskController {
    fn default() -> Self {
        Self::new(DiskControllerConfig::default())
    }
}

impl DiskController {
    #[must_use]
    pub fn new(config: DiskControllerConfig) -> Self {
        Self {
            config,
            drives: std::array::from_fn(FloppyDrive::new),
            selected: None,
            state: DriveState::Off,
            fifo: Fifo::default(),
            incoming: 0,
            dsklen: 0,
            dsksync: DEFAULT_SYNC,
            prb: 0xFF,
            sync_cycle: 0,
            sync_counter: 0,
            async_fifo: config.async_fifo,
            disk_to_insert: None,
        }
    }

    #[must_use]
    pub fn is_connected(&self, nr: usize) -> bool {
        self.config.connected.get(nr).copied().unwrap_or(false)
    }

    /// Attach or detach a drive. df0 cannot be detached.
    pub fn set_connected(&mut self, nr: usize, value: bool) {
        if nr == 0 && !value {
            log::warn!("df0 cannot be disconnected");
            return;
        }
        if let Some(slot) = self.config.connected.get_mut(nr) {
            *slot = value;
        }
    }

    #[must_use]
    pub fn selected_drive(&self) -> Option<&FloppyDrive> {
        self.selected.map(|nr| &self.drives[nr])
    }

    pub fn clear_selected_drive(&mut self) {
        self.selected = None;
    }

    /// Entering OFF clears DSKLEN.
    fn set_state(&mut self, state: DriveState) {
        if state == self.state {
            return;
        }
        log::debug!("disk controller {} -> {}", self.state.name(), state.name());
        self.state = state;
        if state == DriveState::Off {
            self.dsklen = 0;
        }
    }

    //
    // Registers
    //

    pub fn poke_dsklen<M: ChipMemory + ?Sized>(
        &mut self,
        value: u16,
        adkcon: u16,
        irq: &mut InterruptController,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        self.set_dsklen(self.dsklen, value, adkcon, irq, agnus, mem);
    }

    /// DSKLEN must be written twice with bit 15 set to start a transfer.
    pub fn set_dsklen<M: ChipMemory + ?Sized>(
        &mut self,
        old: u16,
        new: u16,
        adkcon: u16,
        irq: &mut InterruptController,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        log::trace!("DSKLEN {old:#06x} -> {new:#06x}");

        self.dsklen = new;
        self.async_fifo = self.config.async_fifo;

        if old & DSKLEN_DMAEN == 0 {
            self.set_state(DriveState::Off);
            self.fifo.clear();
        } else if new & DSKLEN_DMAEN != 0 {
            if new & 0x3FFF == 0 {
                irq.raise_irq(IrqSource::Dskblk);
                return;
            }
            if old & new & DSKLEN_WRITE != 0 {
                self.set_state(DriveState::Write);
            } else if adkcon & ADKCON_WORDSYNC != 0 {
                self.set_state(DriveState::Wait);
            } else {
                self.set_state(DriveState::Read);
            }
            self.fifo.clear();
        }

        if let Some(nr) = self.selected
            && self.drives[nr].is_turbo()
        {
            self.perform_turbo_dma(nr, irq, agnus, mem);
        }
    }

    /// DSKBYTR without the read side effect.
    #[must_use]
    pub fn dskbytr(&self, clock: Cycle, dskdma: bool) -> u16 {
        let mut result = self.incoming;
        if dskdma && self.state != DriveState::Off {
            result |= 1 << 14;
        }
        if self.dsklen & DSKLEN_WRITE != 0 {
            result |= 1 << 13;
        }
        if clock - self.sync_cycle <= usec(2) {
            result |= 1 << 12;
        }
        result
    }

    /// DSKBYTR read: clears the byte-ready flag.
    pub fn peek_dskbytr(&mut self, clock: Cycle, dskdma: bool) -> u16 {
        let result = self.dskbytr(clock, dskdma);
        self.incoming &= 0x7FFF;
        result
    }

    pub fn poke_dsksync(&mut self, value: u16) {
        if self.config.lock_dsk_sync && value != DEFAULT_SYNC {
            log::warn!("DSKSYNC {value:#06x} ignored (locked)");
            return;
        }
        self.dsksync = value;
    }

    //
    // CIA lines
    //

    /// PRA status bits of the selected drives (active low).
    #[must_use]
    pub fn drive_status_flags(&self, clock: Cycle) -> u8 {
        self.drives
            .iter()
            .enumerate()
            .filter(|(nr, _)| self.is_connected(*nr))
            .fold(0xFF, |acc, (_, drive)| acc & drive.status_flags(clock))
    }

    /// CIA-B PRB changed: update the drives and the rotation event.
    pub fn prb_did_change(&mut self, old: u8, new: u8, agnus: &mut Agnus) {
        let clock = agnus.clock;
        let old_selected = self.selected;

        self.prb = new;
        self.selected = None;

        for nr in 0..4 {
            if !self.is_connected(nr) {
                continue;
            }
            self.drives[nr].prb_did_change(old, new, clock);
            if self.selected.is_none() && self.drives[nr].is_selected() {
                self.selected = Some(nr);
            }
        }

        if old_selected != self.selected {
            log::debug!("selected drive {:?} -> {:?}", old_selected, self.selected);
        }

        if !self.drives.iter().any(FloppyDrive::motor) {
            agnus.events.cancel(EventSlot::Dsk);
        } else if !agnus.events.has_event(EventSlot::Dsk) {
            agnus.schedule_rel(EventSlot::Dsk, ROTATE_CYCLES, EventId::DskRotate);
        }
    }

    //
    // Byte transport
    //

    /// Move one byte between the selected drive and the FIFO.
    pub fn execute_fifo(&mut self, irq: &mut InterruptController, clock: Cycle) {
        let Some(nr) = self.selected else {
            return;
        };

        match self.state {
            DriveState::Off | DriveState::Wait | DriveState::Read => {
                let byte = self.drives[nr].read_head();
                self.fifo.write(byte);
                self.incoming = u16::from(byte) | 0x8000;

                let sync = self.fifo.compare(self.dsksync) || {
                    let forced = self.config.auto_dsk_sync && self.sync_counter > 20000;
                    self.sync_counter = self.sync_counter.saturating_add(1);
                    forced
                };
                if sync {
                    self.sync_cycle = clock;
                    irq.raise_irq(IrqSource::Dsksyn);
                    if self.state == DriveState::Wait {
                        self.set_state(DriveState::Read);
                        self.fifo.clear();
                    }
                    self.sync_counter = 0;
                }
            }
            DriveState::Write | DriveState::Flush => {
                if self.fifo.is_empty() {
                    if self.state == DriveState::Flush {
                        self.set_state(DriveState::Off);
                    }
                } else {
                    let byte = self.fifo.read();
                    self.drives[nr].write_head(byte);
                }
            }
        }
    }

    /// `Dsk` slot handler.
    pub fn service_disk_event(&mut self, irq: &mut InterruptController, agnus: &mut Agnus) {
        if self.async_fifo {
            self.execute_fifo(irq, agnus.clock);
        }
        agnus.schedule_rel(EventSlot::Dsk, ROTATE_CYCLES, EventId::DskRotate);
    }

    //
    // DMA
    //

    /// Disk DMA slot of the DAS table.
    pub fn perform_dma<M: ChipMemory + ?Sized>(
        &mut self,
        irq: &mut InterruptController,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        if !self.async_fifo {
            self.execute_fifo(irq, agnus.clock);
            self.execute_fifo(irq, agnus.clock);
        }

        if self.dsklen & 0x3FFF == 0 {
            return;
        }
        let Some(nr) = self.selected else {
            return;
        };
        let count = self.drives[nr].config.speed.max(1);

        match self.state {
            DriveState::Read => self.perform_dma_read(count, irq, agnus, mem),
            DriveState::Write => self.perform_dma_write(nr, count, irq, agnus, mem),
            _ => {}
        }
    }

    fn perform_dma_read<M: ChipMemory + ?Sized>(
        &mut self,
        count: i32,
        irq: &mut InterruptController,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        for i in 0..count {
            if !self.fifo.has_word() {
                return;
            }
            let word = self.fifo.read16();
            agnus.do_disk_dma_write(mem, word);
            log::trace!("disk DMA {word:#06x} -> chip memory");

            self.dsklen -= 1;
            if self.dsklen & 0x3FFF == 0 {
                irq.raise_irq(IrqSource::Dskblk);
                self.set_state(DriveState::Off);
                return;
            }

            if i + 1 < count {
                self.execute_fifo(irq, agnus.clock);
                self.execute_fifo(irq, agnus.clock);
            }
        }
    }

    fn perform_dma_write<M: ChipMemory + ?Sized>(
        &mut self,
        nr: usize,
        count: i32,
        irq: &mut InterruptController,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        for i in 0..count {
            if !self.fifo.can_store_word() {
                return;
            }
            let [hi, lo] = agnus.do_disk_dma_read(mem).to_be_bytes();
            self.fifo.write(hi);
            self.fifo.write(lo);

            self.dsklen -= 1;
            if self.dsklen & 0x3FFF == 0 {
                irq.raise_irq(IrqSource::Dskblk);
                if self.config.timed_flush {
                    self.set_state(DriveState::Flush);
                } else {
                    while !self.fifo.is_empty() {
                        let byte = self.fifo.read();
                        self.drives[nr].write_head(byte);
                    }
                    self.set_state(DriveState::Off);
                }
                return;
            }

            if i + 1 < count {
                self.execute_fifo(irq, agnus.clock);
                self.execute_fifo(irq, agnus.clock);
            }
        }
    }

    /// Move the whole block at once. DSKBLK follows a little later.
    pub fn perform_turbo_dma<M: ChipMemory + ?Sized>(
        &mut self,
        nr: usize,
        irq: &mut InterruptController,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        let words = self.dsklen & 0x3FFF;
        if words == 0 {
            return;
        }

        match self.state {
            DriveState::Wait => {
                self.drives[nr].find_sync_mark();
                self.turbo_read(nr, words, agnus, mem);
                irq.raise_irq(IrqSource::Dsksyn);
            }
            DriveState::Read => {
                self.turbo_read(nr, words, agnus, mem);
                irq.raise_irq(IrqSource::Dsksyn);
            }
            DriveState::Write => self.turbo_write(nr, words, agnus, mem),
            DriveState::Off | DriveState::Flush => return,
        }

        log::debug!("turbo DMA of {words} words on df{nr}");
        irq.schedule_irq_rel(IrqSource::Dskblk, dma_cycles(512), agnus);
        self.set_state(DriveState::Off);
    }

    fn turbo_read<M: ChipMemory + ?Sized>(
        &mut self,
        nr: usize,
        words: u16,
        agnus: &mut Agnus,
        mem: &mut M,
    ) {
        let mask = agnus.ptr_mask();
        for _ in 0..words {
            let word = self.drives[nr].read_head16();
            mem.poke16(agnus.dskpt & mask, word);
            agnus.dskpt = agnus.dskpt.wrapping_add(2) & mask;
        }
    }

    fn turbo_write<M: ChipMemory + ?Sized>(
        &mut self,
        nr: usize,
        words: u16,
        agnus: &mut Agnus,
        mem: &M,
    ) {
        let mask = agnus.ptr_mask();
        for _ in 0..words {
            let word = mem.peek16(agnus.dskpt & mask);
            self.drives[nr].write_head16(word);
            agnus.dskpt = agnus.dskpt.wrapping_add(2) & mask;
        }
    }

    //
    // Disk changes
    //

    /// Insert `disk` into drive `nr` after `delay` cycles. A disk already
    /// in the drive is ejected first, and the new one arrives no sooner
    /// than 1.5 seconds later.
    pub fn insert_disk(&mut self, disk: Box<Disk>, nr: usize, delay: Cycle, agnus: &mut Agnus) {
        debug_assert!(nr < 4);
        let mut delay = delay;
        if self.drives[nr].has_disk() {
            self.drives[nr].eject_disk();
            delay = delay.max(sec(1.5));
        }
        log::debug!("df{nr}: insertion scheduled in {delay} cycles");
        self.disk_to_insert = Some(disk);
        agnus.schedule_rel_with(EventSlot::Dch, delay, EventId::DchInsert, nr as i64);
    }

    pub fn eject_disk(&mut self, nr: usize, delay: Cycle, agnus: &mut Agnus) {
        debug_assert!(nr < 4);
        agnus.schedule_rel_with(EventSlot::Dch, delay, EventId::DchEject, nr as i64);
    }

    /// `Dch` slot handler.
    pub fn service_disk_change_event(&mut self, agnus: &mut Agnus) {
        let id = agnus.events.id(EventSlot::Dch);
        let Ok(nr) = usize::try_from(agnus.events.data(EventSlot::Dch)) else {
            agnus.events.cancel(EventSlot::Dch);
            return;
        };

        if self.state != DriveState::Off {
            log::warn!("df{nr}: disk change while disk DMA is active");
        }

        match (id, self.drives.get_mut(nr)) {
            (EventId::DchInsert, Some(drive)) => {
                if let Some(disk) = self.disk_to_insert.take() {
                    drive.insert_disk(disk);
                }
            }
            (EventId::DchEject, Some(drive)) => {
                drive.eject_disk();
            }
            _ => {}
        }
        agnus.events.cancel(EventSlot::Dch);
    }

    #[must_use]
    pub fn info(&self, clock: Cycle, dskdma: bool) -> DiskControllerInfo {
        DiskControllerInfo {
            selected: self.selected,
            state: self.state,
            fifo: self.fifo.bytes(),
            dsklen: self.dsklen,
            dskbytr: self.dskbytr(clock, dskdma),
            dsksync: self.dsksync,
            prb: self.prb,
        }
    }
}

impl Resettable for DiskController {
    fn reset(&mut self, hard: bool) {
        for drive in &mut self.drives {
            drive.reset(hard);
        }
        self.selected = None;
        self.state = DriveState::Off;
        self.fifo.clear();
        self.incoming = 0;
        self.dsklen = 0;
        self.dsksync = DEFAULT_SYNC;
        self.prb = 0xFF;
        self.sync_cycle = 0;
        self.sync_counter = 0;
        self.async_fifo = self.config.async_fifo;
        self.disk_to_insert = None;
    }
}

impl Observable for DiskController {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "state" => Some(self.state.name().into()),
            "fifo_count" => Some(Value::U8(self.fifo.len())),
            "dsklen" => Some(Value::U16(self.dsklen)),
            "dsksync" => Some(Value::U16(self.dsksync)),
            "selected" => Some(Value::I64(self.selected.map_or(-1, |nr| nr as i64))),
            "prb" => Some(Value::U8(self.prb)),
            "incoming" => Some(Value::U16(self.incoming)),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "state",
            "fifo_count",
            "dsklen",
            "dsksync",
            "selected",
            "prb",
            "incoming",
        ]
    }
}

impl Dumpable for DiskController {
    fn name(&self) -> &'static str {
        "DiskController"
    }

    fn dump(&self) -> String {
        format!(
            "state {} selected {:?} dsklen {:#06x} dsksync {:#06x} prb {:#04x}\nfifo {:02x?}\n",
            self.state.name(),
            self.selected,
            self.dsklen,
            self.dsksync,
            self.prb,
            self.fifo.bytes(),
        )
    }
}
