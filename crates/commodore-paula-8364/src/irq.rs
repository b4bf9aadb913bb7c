//! Interrupt controller: INTENA/INTREQ and delayed interrupt requests.

use commodore_agnus::{Agnus, EventId, EventSlot};
use emu_core::{Cycle, NEVER};

/// INTREQ bit numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum IrqSource {
    Tbe = 0,
    Dskblk = 1,
    Soft = 2,
    Ports = 3,
    Coper = 4,
    Vertb = 5,
    Blit = 6,
    Aud0 = 7,
    Aud1 = 8,
    Aud2 = 9,
    Aud3 = 10,
    Rbf = 11,
    Dsksyn = 12,
    Exter = 13,
}

impl IrqSource {
    pub const ALL: [IrqSource; 14] = [
        IrqSource::Tbe,
        IrqSource::Dskblk,
        IrqSource::Soft,
        IrqSource::Ports,
        IrqSource::Coper,
        IrqSource::Vertb,
        IrqSource::Blit,
        IrqSource::Aud0,
        IrqSource::Aud1,
        IrqSource::Aud2,
        IrqSource::Aud3,
        IrqSource::Rbf,
        IrqSource::Dsksyn,
        IrqSource::Exter,
    ];

    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }
}

/// INTENA bit 14.
pub const INTEN: u16 = 0x4000;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterruptController {
    pub intena: u16,
    pub intreq: u16,
    /// Pending request per source, `NEVER` if none.
    set_intreq: [Cycle; 16],
}

impl Default for InterruptController {
    fn default() -> Self {
        Self {
            intena: 0,
            intreq: 0,
            set_intreq: [NEVER; 16],
        }
    }
}

fn set_clr(reg: &mut u16, val: u16) {
    if val & 0x8000 != 0 {
        *reg |= val & 0x7FFF;
    } else {
        *reg &= !(val & 0x7FFF);
    }
}

impl InterruptController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn poke_intena(&mut self, val: u16) {
        set_clr(&mut self.intena, val);
    }

    pub fn poke_intreq(&mut self, val: u16) {
        set_clr(&mut self.intreq, val);
    }

    pub fn raise_irq(&mut self, src: IrqSource) {
        log::trace!("raise {src:?}");
        self.intreq |= src.mask();
    }

    /// Cycle at which `src` is due, `NEVER` if nothing is pending.
    #[must_use]
    pub fn pending(&self, src: IrqSource) -> Cycle {
        self.set_intreq[src as usize]
    }

    pub fn schedule_irq_abs(&mut self, src: IrqSource, trigger: Cycle, agnus: &mut Agnus) {
        self.set_intreq[src as usize] = trigger;
        if trigger < agnus.events.trigger(EventSlot::Irq) {
            agnus.events.schedule_abs(EventSlot::Irq, trigger, EventId::IrqCheck);
        }
    }

    pub fn schedule_irq_rel(&mut self, src: IrqSource, delta: Cycle, agnus: &mut Agnus) {
        let trigger = agnus.clock + delta;
        self.schedule_irq_abs(src, trigger, agnus);
    }

    /// `Irq` slot handler.
    pub fn service_irq_event(&mut self, agnus: &mut Agnus) {
        let clock = agnus.clock;
        let mut next = NEVER;

        for (bit, trigger) in self.set_intreq.iter_mut().enumerate() {
            if clock >= *trigger {
                self.intreq |= 1 << bit;
                *trigger = NEVER;
            } else {
                next = next.min(*trigger);
            }
        }

        if next == NEVER {
            agnus.events.cancel(EventSlot::Irq);
        } else {
            agnus.events.schedule_abs(EventSlot::Irq, next, EventId::IrqCheck);
        }
    }

    /// CPU interrupt priority level for the pending enabled sources.
    #[must_use]
    pub fn interrupt_level(&self) -> u8 {
        if self.intena & INTEN == 0 {
            return 0;
        }

        let active = self.intena & self.intreq & 0x3FFF;
        if active == 0 {
            return 0;
        }

        //   L6: EXTER
        //   L5: DSKSYN, RBF
        //   L4: AUD3..AUD0
        //   L3: BLIT, VERTB, COPER
        //   L2: PORTS
        //   L1: SOFT, DSKBLK, TBE
        if active & 0x2000 != 0 {
            return 6;
        }
        if active & 0x1800 != 0 {
            return 5;
        }
        if active & 0x0780 != 0 {
            return 4;
        }
        if active & 0x0070 != 0 {
            return 3;
        }
        if active & 0x0008 != 0 {
            return 2;
        }
        1
    }
}
