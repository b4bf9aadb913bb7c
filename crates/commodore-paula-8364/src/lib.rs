//! Commodore 8364 Paula: interrupt controller and floppy disk controller.
//!
//! Paula maps 14 interrupt sources to 6 CPU interrupt levels and moves
//! floppy data between the drives and chip memory. Timed work runs through
//! the Agnus event slots `Irq`, `Dsk` and `Dch`; the machine forwards those
//! slots and the disk DMA slot to the handlers here.

mod disk_controller;
mod irq;

pub use disk_controller::{
    ADKCON_WORDSYNC, DEFAULT_SYNC, DiskController, DiskControllerConfig, DiskControllerInfo,
    DriveState, Fifo, ROTATE_CYCLES,
};
pub use irq::{INTEN, InterruptController, IrqSource};

use commodore_agnus::{Agnus, ChipMemory};
use emu_core::{Dumpable, Observable, Resettable, Value};

/// Paula register byte offsets.
pub mod reg {
    pub const DSKDATR: u16 = 0x008;
    pub const ADKCONR: u16 = 0x010;
    pub const DSKBYTR: u16 = 0x01A;
    pub const INTENAR: u16 = 0x01C;
    pub const INTREQR: u16 = 0x01E;
    pub const DSKLEN: u16 = 0x024;
    pub const DSKDAT: u16 = 0x026;
    pub const DSKSYNC: u16 = 0x07E;
    pub const INTENA: u16 = 0x09A;
    pub const INTREQ: u16 = 0x09C;
    pub const ADKCON: u16 = 0x09E;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PaulaInfo {
    pub intena: u16,
    pub intreq: u16,
    pub adkcon: u16,
    pub ipl: u8,
    pub disk: DiskControllerInfo,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Paula8364 {
    pub irq: InterruptController,
    pub disk: DiskController,
    pub adkcon: u16,
}

impl Paula8364 {
    #[must_use]
    pub fn new(config: DiskControllerConfig) -> Self {
        Self {
            irq: InterruptController::new(),
            disk: DiskController::new(config),
            adkcon: 0,
        }
    }

    pub fn poke_adkcon(&mut self, val: u16) {
        if val & 0x8000 != 0 {
            self.adkcon |= val & 0x7FFF;
        } else {
            self.adkcon &= !(val & 0x7FFF);
        }
    }

    /// Register read. DSKBYTR has a side effect, hence `&mut self`.
    pub fn peek(&mut self, addr: u16, agnus: &Agnus) -> Option<u16> {
        match addr {
            reg::DSKDATR => Some(0),
            reg::ADKCONR => Some(self.adkcon),
            reg::DSKBYTR => Some(self.disk.peek_dskbytr(agnus.clock, agnus.dskdma())),
            reg::INTENAR => Some(self.irq.intena),
            reg::INTREQR => Some(self.irq.intreq),
            _ => None,
        }
    }

    /// Register write. Returns false if `addr` is not a Paula register.
    pub fn poke<M: ChipMemory + ?Sized>(
        &mut self,
        addr: u16,
        value: u16,
        agnus: &mut Agnus,
        mem: &mut M,
    ) -> bool {
        match addr {
            reg::DSKLEN => {
                self.disk
                    .poke_dsklen(value, self.adkcon, &mut self.irq, agnus, mem);
            }
            reg::DSKDAT => log::trace!("DSKDAT {value:#06x} ignored"),
            reg::DSKSYNC => self.disk.poke_dsksync(value),
            reg::INTENA => self.irq.poke_intena(value),
            reg::INTREQ => self.irq.poke_intreq(value),
            reg::ADKCON => self.poke_adkcon(value),
            _ => return false,
        }
        true
    }

    /// Disk slot of the DAS table.
    pub fn perform_disk_dma<M: ChipMemory + ?Sized>(&mut self, agnus: &mut Agnus, mem: &mut M) {
        self.disk.perform_dma(&mut self.irq, agnus, mem);
    }

    /// `Dsk` slot.
    pub fn service_disk_event(&mut self, agnus: &mut Agnus) {
        self.disk.service_disk_event(&mut self.irq, agnus);
    }

    /// `Dch` slot.
    pub fn service_disk_change_event(&mut self, agnus: &mut Agnus) {
        self.disk.service_disk_change_event(agnus);
    }

    /// `Irq` slot.
    pub fn service_irq_event(&mut self, agnus: &mut Agnus) {
        self.irq.service_irq_event(agnus);
    }

    #[must_use]
    pub fn interrupt_level(&self) -> u8 {
        self.irq.interrupt_level()
    }

    #[must_use]
    pub fn info(&self, agnus: &Agnus) -> PaulaInfo {
        PaulaInfo {
            intena: self.irq.intena,
            intreq: self.irq.intreq,
            adkcon: self.adkcon,
            ipl: self.irq.interrupt_level(),
            disk: self.disk.info(agnus.clock, agnus.dskdma()),
        }
    }
}

impl Resettable for Paula8364 {
    fn reset(&mut self, hard: bool) {
        self.irq.reset();
        self.adkcon = 0;
        self.disk.reset(hard);
    }
}

impl Observable for Paula8364 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "intena" => Some(Value::U16(self.irq.intena)),
            "intreq" => Some(Value::U16(self.irq.intreq)),
            "adkcon" => Some(Value::U16(self.adkcon)),
            "ipl" => Some(Value::U8(self.irq.interrupt_level())),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["intena", "intreq", "adkcon", "ipl"]
    }
}

impl Dumpable for Paula8364 {
    fn name(&self) -> &'static str {
        "Paula"
    }

    fn dump(&self) -> String {
        format!(
            "INTENA {:#06x} INTREQ {:#06x} ADKCON {:#06x} IPL {}\n",
            self.irq.intena,
            self.irq.intreq,
            self.adkcon,
            self.irq.interrupt_level(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commodore_agnus::AgnusRevision;

    struct Ram(Vec<u16>);

    impl ChipMemory for Ram {
        fn peek16(&self, addr: u32) -> u16 {
            self.0[((addr >> 1) as usize) % self.0.len()]
        }
        fn poke16(&mut self, addr: u32, value: u16) {
            let len = self.0.len();
            self.0[((addr >> 1) as usize) % len] = value;
        }
    }

    #[test]
    fn registers_round_trip_through_set_clr() {
        let mut agnus = Agnus::new(AgnusRevision::Ocs);
        agnus.reset(true);
        let mut ram = Ram(vec![0; 16]);
        let mut paula = Paula8364::default();

        assert!(paula.poke(reg::ADKCON, 0x8000 | ADKCON_WORDSYNC, &mut agnus, &mut ram));
        assert!(paula.poke(reg::INTENA, 0xC008, &mut agnus, &mut ram));
        assert!(paula.poke(reg::INTREQ, 0x8008, &mut agnus, &mut ram));
        assert!(!paula.poke(0x180, 0, &mut agnus, &mut ram));

        assert_eq!(paula.peek(reg::ADKCONR, &agnus), Some(ADKCON_WORDSYNC));
        assert_eq!(paula.peek(reg::INTENAR, &agnus), Some(0x4008));
        assert_eq!(paula.peek(reg::INTREQR, &agnus), Some(0x0008));
        assert_eq!(paula.interrupt_level(), 2);
        assert_eq!(paula.query("ipl"), Some(Value::U8(2)));
    }

    #[test]
    fn dsklen_write_uses_adkcon_wordsync() {
        let mut agnus = Agnus::new(AgnusRevision::Ocs);
        agnus.reset(true);
        let mut ram = Ram(vec![0; 16]);
        let mut paula = Paula8364::default();

        paula.poke(reg::ADKCON, 0x8000 | ADKCON_WORDSYNC, &mut agnus, &mut ram);
        paula.poke(reg::DSKLEN, 0x8100, &mut agnus, &mut ram);
        paula.poke(reg::DSKLEN, 0x8100, &mut agnus, &mut ram);
        assert_eq!(paula.disk.state, DriveState::Wait);
        assert_eq!(paula.info(&agnus).disk.state, DriveState::Wait);
    }

    #[test]
    fn reset_clears_interrupt_state() {
        let mut paula = Paula8364::default();
        paula.irq.poke_intena(0xFFFF);
        paula.irq.raise_irq(IrqSource::Exter);
        paula.reset(true);
        assert_eq!(paula.irq.intena, 0);
        assert_eq!(paula.irq.intreq, 0);
        assert_eq!(paula.disk.dsksync, DEFAULT_SYNC);
    }
}
