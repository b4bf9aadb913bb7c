//! Agnus driven through the event scheduler for whole lines and frames.

use commodore_agnus::{
    Agnus, AgnusRevision, BusOwner, ChipMemory, DMACON_BPLEN, DMACON_DMAEN, DMACON_SET,
    DMACON_SPREN, DasEvent, EventHandler, EventId, EventQueue, EventSlot, HPOS_CNT,
    SpriteDmaState, execute_events_until, reg,
};
use emu_core::{Resettable, dma_cycles};
use proptest::prelude::*;

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

/// Minimal machine: services the Agnus slots and counts fetches.
struct Rig {
    agnus: Agnus,
    ram: Ram,
    bpl_words: usize,
    sprite_words: usize,
    frames: usize,
}

impl EventHandler for Rig {
    fn events(&mut self) -> &mut EventQueue {
        &mut self.agnus.events
    }

    fn service(&mut self, slot: EventSlot) {
        match slot {
            EventSlot::Ras => {
                if self.agnus.hsync() {
                    self.frames += 1;
                }
                self.agnus
                    .schedule_rel(EventSlot::Ras, dma_cycles(HPOS_CNT), EventId::RasHsync);
            }
            EventSlot::Reg => self.agnus.service_reg_event(),
            EventSlot::Bpl => {
                if self.agnus.service_bpl_event(&self.ram).is_some() {
                    self.bpl_words += 1;
                }
            }
            EventSlot::Das => {
                match self.agnus.das_table.event_at(self.agnus.pos.h) {
                    DasEvent::Refresh => self.agnus.do_refresh(),
                    DasEvent::SpriteFirst(n) => {
                        self.sprite_words +=
                            usize::from(self.agnus.first_sprite_cycle(n, &self.ram).is_some());
                    }
                    DasEvent::SpriteSecond(n) => {
                        self.sprite_words +=
                            usize::from(self.agnus.second_sprite_cycle(n, &self.ram).is_some());
                    }
                    _ => {}
                }
                self.agnus.schedule_next_das_event();
            }
            _ => self.agnus.events.cancel(slot),
        }
    }
}

impl Rig {
    fn new() -> Self {
        let mut agnus = Agnus::new(AgnusRevision::Ocs);
        agnus.reset(true);
        agnus.events.cancel(EventSlot::CiaA);
        agnus.events.cancel(EventSlot::CiaB);
        agnus.events.cancel(EventSlot::Vbl);
        Self {
            agnus,
            ram: Ram(vec![0; 0x4_0000]),
            bpl_words: 0,
            sprite_words: 0,
            frames: 0,
        }
    }

    fn step(&mut self) {
        let clock = self.agnus.clock;
        if self.agnus.events.next_trigger <= clock {
            execute_events_until(self, clock);
        }
        self.agnus.advance();
    }

    fn run_lines(&mut self, lines: i64) {
        for _ in 0..lines * HPOS_CNT {
            self.step();
        }
    }
}

#[test]
fn lores_screen_fetches_every_visible_line() {
    let mut rig = Rig::new();
    let agnus = &mut rig.agnus;
    agnus.poke(reg::DIWSTRT, 0x2C81);
    agnus.poke(reg::DIWSTOP, 0x2CC1);
    agnus.poke(reg::DDFSTRT, 0x0038);
    agnus.poke(reg::DDFSTOP, 0x00D0);
    agnus.poke(reg::BPLCON0, 0x2200);
    agnus.poke(reg::DMACON, DMACON_SET | DMACON_DMAEN | DMACON_BPLEN);

    // One full frame plus the first line of the next one.
    rig.run_lines(313 + 1);

    assert_eq!(rig.frames, 1, "exactly one vsync");
    // 256 display lines, 2 planes, 20 words each
    assert_eq!(rig.bpl_words, 256 * 2 * 20);
    assert_eq!(rig.agnus.pos.v, 0);
    assert_eq!(rig.agnus.pos.h, 0);
    let activity = rig.agnus.bus.stats.bitplane_activity;
    assert!((activity - 5120.0).abs() < 1e-9, "averaged bitplane usage {activity}");
}

#[test]
fn refresh_owns_its_slots_each_line() {
    let mut rig = Rig::new();
    rig.run_lines(3);
    // Stop mid line after the last refresh slot.
    for _ in 0..0x20 {
        rig.step();
    }
    for h in [0x01, 0x02, 0x03, 0x1B] {
        assert_eq!(rig.agnus.bus.owner_at(h), BusOwner::Refresh, "hpos {h:#x}");
    }
    assert_eq!(rig.agnus.bus.owner_at(0x04), BusOwner::None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Every sprite channel starts and stops on its programmed lines.
    #[test]
    fn sprite_channels_behave_alike(nr in 0u8..8, start in 40i64..200, height in 1i64..40) {
        let mut rig = Rig::new();
        let n = usize::from(nr);
        let stop = start + height;

        rig.agnus.sprites.vstrt[n] = start;
        rig.agnus.sprites.vstop[n] = stop;
        rig.agnus.sprites.state[n] = SpriteDmaState::Idle;
        rig.agnus.poke(reg::DMACON, DMACON_SET | DMACON_DMAEN | DMACON_SPREN);

        rig.run_lines(30);
        // Line 25 rearms every channel.
        rig.agnus.sprites.vstrt[n] = start;
        rig.agnus.sprites.vstop[n] = stop;

        rig.run_lines(start - 30);
        let before = rig.sprite_words;
        rig.run_lines(height + 1);

        // Two data words per active line plus the two control words fetched
        // on the stop line. Fetched control words are zero, which parks the
        // channel at line 0 afterwards.
        prop_assert_eq!(rig.sprite_words - before, (2 * height + 2) as usize);
        prop_assert!(!rig.agnus.sprites.is_active(n));
    }
}
