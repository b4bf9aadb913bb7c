//! Running the machine: the jump path must land where single steps land.

use emu_core::dma_cycles;
use machine_amiga::commodore_agnus::{
    DMACON_BPLEN, DMACON_DMAEN, DMACON_DSKEN, DMACON_SET, DMACON_SPREN, EventSlot, HPOS_CNT, reg,
};
use machine_amiga::{Amiga, AmigaConfig};
use proptest::prelude::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn display_on(amiga: &mut Amiga, planes: u16, dma: u16) {
    amiga.poke_custom(reg::DIWSTRT, 0x2C81);
    amiga.poke_custom(reg::DIWSTOP, 0x2CC1);
    amiga.poke_custom(reg::DDFSTRT, 0x0038);
    amiga.poke_custom(reg::DDFSTOP, 0x00D0);
    amiga.poke_custom(reg::BPLCON0, (planes << 12) | 0x0200);
    amiga.poke_custom(reg::DMACON, DMACON_SET | DMACON_DMAEN | dma);
}

fn assert_same_state(fast: &Amiga, slow: &Amiga) {
    assert_eq!(fast.agnus.clock, slow.agnus.clock, "clock");
    assert_eq!(fast.agnus.pos, slow.agnus.pos, "beam");
    assert_eq!(fast.agnus.frame, slow.agnus.frame, "frame");
    assert_eq!(fast.agnus.bus.owners(), slow.agnus.bus.owners(), "bus owners");
    assert_eq!(fast.agnus.events.slots(), slow.agnus.events.slots(), "event slots");
}

#[test]
fn execute_until_stops_before_the_next_event() {
    init_logger();
    let mut amiga = Amiga::default();

    amiga.execute_until(dma_cycles(0x1C));
    let next = amiga.agnus.events.next_trigger;
    assert!(next > amiga.agnus.clock);

    amiga.execute_until(next);
    assert_eq!(amiga.agnus.clock, next);
    assert_eq!(amiga.agnus.pos.h, next / dma_cycles(1));
    assert_eq!(amiga.agnus.events.next_trigger, next, "the due event has not run yet");
}

#[test]
fn execute_until_rounds_down_to_dma_cycles() {
    let mut amiga = Amiga::default();
    amiga.execute_until(dma_cycles(10) + 7);
    assert_eq!(amiga.agnus.clock, dma_cycles(10));
    amiga.execute_until(dma_cycles(5));
    assert_eq!(amiga.agnus.clock, dma_cycles(10), "targets in the past are ignored");
}

#[test]
fn frame_boundary_starts_a_new_frame() {
    init_logger();
    let mut amiga = Amiga::default();
    amiga.execute_frame();
    assert_eq!(amiga.agnus.clock, dma_cycles(313 * HPOS_CNT));

    // The hsync of the last line runs on the first cycle of the new frame.
    amiga.execute();
    assert_eq!(amiga.agnus.frame.nr, 1);
    assert_eq!((amiga.agnus.pos.v, amiga.agnus.pos.h), (0, 1));
    assert_eq!(
        amiga.agnus.events.trigger(EventSlot::Ras),
        dma_cycles(314 * HPOS_CNT)
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn jump_path_matches_single_steps(
        planes in 0u16..=6,
        sprites in any::<bool>(),
        start in 0i64..(2 * 313 * HPOS_CNT),
        chunks in prop::collection::vec(1i64..3000, 1..12),
    ) {
        let dma = DMACON_BPLEN | DMACON_DSKEN | if sprites { DMACON_SPREN } else { 0 };

        let mut fast = Amiga::new(AmigaConfig::default());
        let mut slow = Amiga::new(AmigaConfig::default());
        display_on(&mut fast, planes, dma);
        display_on(&mut slow, planes, dma);

        fast.execute_until(dma_cycles(start));
        for _ in 0..start {
            slow.execute();
        }
        assert_same_state(&fast, &slow);

        for n in chunks {
            let target = fast.agnus.clock + dma_cycles(n);
            fast.execute_until(target);
            for _ in 0..n {
                slow.execute();
            }
            assert_same_state(&fast, &slow);
        }
    }
}
