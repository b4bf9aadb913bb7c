//! CPU accesses that have to wait for the bus or the E clock.

use std::sync::{Arc, Mutex};

use emu_core::{Cycle, dma_cycles};
use machine_amiga::commodore_agnus::BusOwner;
use machine_amiga::{Amiga, AmigaConfig, CiaPort, ConfigOption, CpuPort, Ports};

#[derive(Clone, Default)]
struct Waits(Arc<Mutex<Vec<Cycle>>>);

impl Waits {
    fn take(&self) -> Vec<Cycle> {
        std::mem::take(&mut *self.0.lock().expect("lock"))
    }
}

impl CpuPort for Waits {
    fn add_wait_states(&mut self, cycles: Cycle) {
        self.0.lock().expect("lock").push(cycles);
    }
}

struct NoEClock;

impl CiaPort for NoEClock {
    fn eclock_syncing(&self) -> bool {
        false
    }
}

fn machine() -> (Amiga, Waits) {
    let _ = env_logger::builder().is_test(true).try_init();
    let waits = Waits::default();
    let ports = Ports {
        cpu: Box::new(waits.clone()),
        ..Ports::default()
    };
    (Amiga::with_ports(AmigaConfig::default(), ports), waits)
}

#[test]
fn refresh_cycle_delays_the_cpu() {
    let (mut amiga, waits) = machine();

    // Cycle 3 is a refresh slot.
    amiga.execute_until(dma_cycles(4));
    assert_eq!(amiga.agnus.bus.owner_at(3), BusOwner::Refresh);

    amiga.cpu_peek_chip16(0);
    assert_eq!(waits.take(), vec![dma_cycles(1)]);
    assert_eq!(amiga.agnus.bus.owner_at(4), BusOwner::Cpu);
    assert_eq!(amiga.agnus.pos.h, 5);
}

#[test]
fn long_waits_release_bls_afterwards() {
    let (mut amiga, waits) = machine();
    amiga.execute_until(dma_cycles(0x50));
    for h in 0x4F..0x54 {
        amiga.agnus.bus.assign(h, BusOwner::Blitter);
    }

    amiga.cpu_poke_custom16(0xDF_F180, 0x0FFF);
    assert_eq!(waits.take(), vec![dma_cycles(5)]);
    assert!(!amiga.agnus.bls);
    assert_eq!(amiga.agnus.bus.owner_at(0x54), BusOwner::Cpu);
}

#[test]
fn cia_access_syncs_to_eclock_phase_two() {
    let (mut amiga, waits) = machine();

    // Clock 0 is E-clock phase 0: twelve CPU cycles to phase 2.
    amiga.wait_for_free_bus_for_cia();
    assert_eq!(waits.take(), vec![48]);
    assert_eq!(amiga.agnus.clock, 48);
    assert_eq!(amiga.agnus.bus.owner_at(5), BusOwner::Cpu);
    assert!(amiga.in_sync_with_eclock());

    // From phase 2 the next access waits one full E cycle.
    amiga.wait_for_free_bus_for_cia();
    assert_eq!(waits.take(), vec![40]);
    assert_eq!(amiga.agnus.clock, 88);
}

#[test]
fn eclock_sync_can_be_switched_off() {
    let (mut amiga, waits) = machine();
    amiga
        .configure(ConfigOption::EClockSyncing(false))
        .expect("valid option");
    amiga.execute_until(dma_cycles(0x20));
    amiga.wait_for_free_bus_for_cia();
    assert!(waits.take().is_empty());
    assert_eq!(amiga.agnus.clock, dma_cycles(0x20));

    let mut detached = Amiga::with_ports(
        AmigaConfig::default(),
        Ports {
            cia_a: Box::new(NoEClock),
            ..Ports::default()
        },
    );
    detached.sync_with_eclock();
    assert_eq!(detached.agnus.clock, 0, "the CIA port can veto syncing too");
}

#[test]
fn eclock_delay_is_a_whole_number_of_dma_cycles() {
    let (mut amiga, waits) = machine();
    for step in 0..40 {
        amiga.execute_until(amiga.agnus.clock + dma_cycles(step % 7));
        let before = amiga.agnus.clock;
        amiga.sync_with_eclock();
        let delay = amiga.agnus.clock - before;
        assert_eq!(delay % dma_cycles(1), 0);
        assert!((24..=60).contains(&delay), "delay {delay}");
        assert_eq!((amiga.agnus.clock >> 2) % 10, 2);
    }
    assert_eq!(waits.take().len(), 40);
}
