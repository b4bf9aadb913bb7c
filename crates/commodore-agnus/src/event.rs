//! The event scheduler: a fixed bank of timer slots polled in priority order.
//!
//! Each slot holds at most one pending event. Scheduling into an armed slot
//! replaces its trigger. When several slots fire on the same cycle they are
//! serviced in declaration order, which callers rely on (hsync must run
//! before the DMA slots of the same cycle look at the beam).

use emu_core::{Cycle, NEVER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventSlot {
    // Primary slots
    Ras,
    Reg,
    CiaA,
    CiaB,
    Bpl,
    Das,
    Cop,
    Sec,
    // Secondary slots (checked only when `Sec` is due)
    Dsk,
    Dch,
    Vbl,
    Irq,
}

pub const SLOT_COUNT: usize = 12;

impl EventSlot {
    pub const PRIMARY: [EventSlot; 8] = [
        EventSlot::Ras,
        EventSlot::Reg,
        EventSlot::CiaA,
        EventSlot::CiaB,
        EventSlot::Bpl,
        EventSlot::Das,
        EventSlot::Cop,
        EventSlot::Sec,
    ];

    pub const SECONDARY: [EventSlot; 4] = [
        EventSlot::Dsk,
        EventSlot::Dch,
        EventSlot::Vbl,
        EventSlot::Irq,
    ];

    pub const ALL: [EventSlot; SLOT_COUNT] = [
        EventSlot::Ras,
        EventSlot::Reg,
        EventSlot::CiaA,
        EventSlot::CiaB,
        EventSlot::Bpl,
        EventSlot::Das,
        EventSlot::Cop,
        EventSlot::Sec,
        EventSlot::Dsk,
        EventSlot::Dch,
        EventSlot::Vbl,
        EventSlot::Irq,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn is_secondary(self) -> bool {
        self.index() > EventSlot::Sec.index()
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EventSlot::Ras => "ras",
            EventSlot::Reg => "reg",
            EventSlot::CiaA => "ciaa",
            EventSlot::CiaB => "ciab",
            EventSlot::Bpl => "bpl",
            EventSlot::Das => "das",
            EventSlot::Cop => "cop",
            EventSlot::Sec => "sec",
            EventSlot::Dsk => "dsk",
            EventSlot::Dch => "dch",
            EventSlot::Vbl => "vbl",
            EventSlot::Irq => "irq",
        }
    }
}

/// What a slot does when it fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventId {
    #[default]
    None,
    RasHsync,
    RegChange,
    CiaExecute,
    BplFetch,
    DasFetch,
    CopStep,
    SecTrigger,
    DskRotate,
    DchInsert,
    DchEject,
    VblStrobe,
    IrqCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub trigger: Cycle,
    pub id: EventId,
    /// Slot specific payload (the drive number for `Dch`).
    pub data: i64,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            trigger: NEVER,
            id: EventId::None,
            data: 0,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventQueue {
    slots: [Event; SLOT_COUNT],
    /// Earliest trigger over all primary slots.
    pub next_trigger: Cycle,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self {
            slots: [Event::default(); SLOT_COUNT],
            next_trigger: NEVER,
        }
    }
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disarm every slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn slot(&self, slot: EventSlot) -> &Event {
        &self.slots[slot.index()]
    }

    #[must_use]
    pub fn trigger(&self, slot: EventSlot) -> Cycle {
        self.slots[slot.index()].trigger
    }

    #[must_use]
    pub fn id(&self, slot: EventSlot) -> EventId {
        self.slots[slot.index()].id
    }

    #[must_use]
    pub fn data(&self, slot: EventSlot) -> i64 {
        self.slots[slot.index()].data
    }

    #[must_use]
    pub fn has_event(&self, slot: EventSlot) -> bool {
        self.slots[slot.index()].id != EventId::None
    }

    #[must_use]
    pub fn is_pending(&self, slot: EventSlot) -> bool {
        self.trigger(slot) != NEVER
    }

    #[must_use]
    pub fn is_due(&self, slot: EventSlot, cycle: Cycle) -> bool {
        cycle >= self.trigger(slot)
    }

    pub fn schedule_abs(&mut self, slot: EventSlot, cycle: Cycle, id: EventId) {
        self.schedule_abs_with(slot, cycle, id, 0);
    }

    pub fn schedule_abs_with(&mut self, slot: EventSlot, cycle: Cycle, id: EventId, data: i64) {
        debug_assert!(cycle >= 0, "trigger cycle {cycle} is negative");
        self.slots[slot.index()] = Event {
            trigger: cycle,
            id,
            data,
        };
        self.arm(slot, cycle);
    }

    fn arm(&mut self, slot: EventSlot, cycle: Cycle) {
        if cycle < self.next_trigger {
            self.next_trigger = cycle;
        }
        if slot.is_secondary() {
            let sec = &mut self.slots[EventSlot::Sec.index()];
            if cycle < sec.trigger {
                sec.trigger = cycle;
                sec.id = EventId::SecTrigger;
            }
        }
    }

    pub fn cancel(&mut self, slot: EventSlot) {
        self.slots[slot.index()] = Event::default();
        if slot.is_secondary() || slot == EventSlot::Sec {
            self.update_secondary_trigger();
        }
        self.update_next_trigger();
    }

    fn min_trigger(&self, slots: &[EventSlot]) -> Cycle {
        slots
            .iter()
            .map(|&s| self.trigger(s))
            .min()
            .unwrap_or(NEVER)
    }

    /// Recompute `Sec` from the secondary slots.
    fn update_secondary_trigger(&mut self) {
        let next = self.min_trigger(&EventSlot::SECONDARY);
        let sec = &mut self.slots[EventSlot::Sec.index()];
        sec.trigger = next;
        sec.id = if next == NEVER {
            EventId::None
        } else {
            EventId::SecTrigger
        };
    }

    fn update_next_trigger(&mut self) {
        self.next_trigger = self.min_trigger(&EventSlot::PRIMARY);
    }

    /// Per-slot view used by inspection.
    #[must_use]
    pub fn slots(&self) -> Vec<(EventSlot, Event)> {
        EventSlot::ALL
            .iter()
            .map(|&s| (s, *self.slot(s)))
            .collect()
    }
}

/// Something that owns an [`EventQueue`] and knows how to service its slots.
pub trait EventHandler {
    fn events(&mut self) -> &mut EventQueue;

    /// Service a due slot. The handler reschedules or cancels the slot.
    fn service(&mut self, slot: EventSlot);
}

/// Service every slot due at `cycle`, each at most once, in priority order.
pub fn execute_events_until<H: EventHandler + ?Sized>(handler: &mut H, cycle: Cycle) {
    for slot in EventSlot::PRIMARY {
        if slot == EventSlot::Sec {
            continue;
        }
        if handler.events().is_due(slot, cycle) {
            handler.service(slot);
        }
    }

    if handler.events().is_due(EventSlot::Sec, cycle) {
        for slot in EventSlot::SECONDARY {
            if handler.events().is_due(slot, cycle) {
                handler.service(slot);
            }
        }
        handler.events().update_secondary_trigger();
    }

    handler.events().update_next_trigger();
}

/// A delayed write to a chip register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegChange {
    pub addr: u16,
    pub value: u16,
}

/// Pending register writes ordered by the cycle they take effect.
/// Writes recorded for the same cycle keep their order.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeRecorder {
    entries: Vec<(Cycle, RegChange)>,
}

impl ChangeRecorder {
    pub fn insert(&mut self, cycle: Cycle, change: RegChange) {
        let at = self.entries.partition_point(|&(key, _)| key <= cycle);
        self.entries.insert(at, (cycle, change));
    }

    /// Trigger cycle of the oldest pending write.
    #[must_use]
    pub fn trigger(&self) -> Cycle {
        self.entries.first().map_or(NEVER, |&(key, _)| key)
    }

    /// Remove and return the oldest write if it is due at `clock`.
    pub fn pop_due(&mut self, clock: Cycle) -> Option<RegChange> {
        if self.trigger() <= clock {
            Some(self.entries.remove(0).1)
        } else {
            None
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
