//! Snapshots, queries and run-time configuration.

use std::thread;

use emu_core::{Dumpable, Observable, Resettable, Value, dma_cycles};
use machine_amiga::commodore_agnus::{AgnusRevision, BusOwner, DdfState, EventSlot, reg};
use machine_amiga::commodore_paula_8364::DriveState;
use machine_amiga::{Amiga, AmigaConfig, ConfigError, ConfigOption};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn snapshot_is_published_at_vsync() {
    init_logger();
    let mut amiga = Amiga::default();
    let inspector = amiga.inspector();
    assert_eq!(inspector.snapshot().agnus.frame, 0);

    amiga.execute_until(dma_cycles(1000));
    assert_eq!(inspector.snapshot().agnus.clock, 0, "nothing published mid-frame");

    amiga.execute_frame();
    amiga.execute();
    let info = inspector.snapshot();
    assert_eq!(info.agnus.frame, 1);
    assert_eq!((info.agnus.vpos, info.agnus.hpos), (0, 0));
    assert_eq!(info.agnus.clock, amiga.agnus.start_of_frame());
    assert_eq!(info.slots.len(), EventSlot::ALL.len());
    assert_eq!(info.bus.len(), 227);
    assert_eq!(info.paula.disk.state, DriveState::Off);
}

#[test]
fn snapshots_can_be_read_from_another_thread() {
    let mut amiga = Amiga::default();
    amiga.execute_until(dma_cycles(227 + 10));
    amiga.publish_snapshot();

    let inspector = amiga.inspector();
    let reader = thread::spawn(move || inspector.snapshot());
    let info = reader.join().expect("reader thread");

    assert_eq!(info, amiga.info());
    assert_eq!(info.agnus.vpos, 1);
    assert_eq!(info.bus[0x1B], BusOwner::None, "line 1 has not reached its refresh slot yet");
    assert_eq!(info.bus[0x03], BusOwner::Refresh);
}

#[test]
fn ddf_windows_show_up_in_the_snapshot() {
    let mut amiga = Amiga::default();
    amiga.poke_custom(reg::DDFSTRT, 0x0030);
    amiga.poke_custom(reg::DDFSTOP, 0x0090);
    amiga.execute_until(dma_cycles(3 * 227));

    let info = amiga.info();
    assert_eq!(info.ddf_state, DdfState::Off);
    assert_eq!(info.ddf_lores.strt_odd, 0x30);
    assert_eq!(info.ddf_lores.stop_odd, 0x98, "thirteen fetch units");
    assert_eq!(amiga.query("agnus.ddf.state"), Some(Value::from("off")));
}

#[test]
fn observable_paths_cover_every_component() {
    let mut amiga = Amiga::default();
    amiga.execute_until(dma_cycles(227 + 5));
    amiga.poke_custom(0x09A, 0xC000);

    assert_eq!(amiga.query("agnus.vpos"), Some(Value::I64(1)));
    assert_eq!(amiga.query("agnus.hpos"), Some(Value::I64(5)));
    assert_eq!(amiga.query("agnus.bus.1"), Some(Value::from("refresh")));
    assert_eq!(amiga.query("paula.intena"), Some(Value::U16(0x4000)));
    assert_eq!(amiga.query("disk.fifo_count"), Some(Value::U8(0)));
    assert_eq!(amiga.query("disk.selected"), Some(Value::I64(-1)));
    assert_eq!(amiga.query("drive3.motor"), Some(Value::Bool(false)));
    assert_eq!(amiga.query("denise.palette"), None);

    let names: Vec<_> = amiga.components().iter().map(|c| c.dumpable.name()).collect();
    assert_eq!(names[..3], ["Agnus", "Paula", "DiskController"]);
    assert_eq!(names.len(), 7);
}

#[test]
fn configuration_is_validated() {
    let mut amiga = Amiga::new(AmigaConfig::default());

    assert_eq!(
        amiga.configure(ConfigOption::DriveSpeed(0, 3)),
        Err(ConfigError::InvalidDriveSpeed(3))
    );
    assert_eq!(
        amiga.configure(ConfigOption::DriveSpeed(5, 2)),
        Err(ConfigError::InvalidDrive(5))
    );
    assert_eq!(
        amiga.configure(ConfigOption::DriveConnected(4, true)),
        Err(ConfigError::InvalidDrive(4))
    );
    assert!(!amiga.is_suspended(), "a failed option still resumes");

    amiga.configure(ConfigOption::DriveSpeed(1, 4)).expect("valid");
    assert_eq!(amiga.paula.disk.drives[1].config.speed, 4);

    amiga.configure(ConfigOption::LockDskSync(true)).expect("valid");
    amiga.poke_custom(0x07E, 0x1234);
    assert_eq!(amiga.query("disk.dsksync"), Some(Value::U16(0x4489)));

    // df0 stays connected whatever the option says.
    amiga.configure(ConfigOption::DriveConnected(0, false)).expect("valid");
    assert!(amiga.config.disk.connected[0]);
}

#[test]
fn revision_change_masks_dma_pointers() {
    let mut amiga = Amiga::new(AmigaConfig {
        revision: AgnusRevision::Ecs2Mb,
        ..AmigaConfig::default()
    });
    amiga.poke_custom(reg::DSKPTH, 0x001F);
    amiga.poke_custom(reg::DSKPTL, 0xFFFE);
    assert_eq!(amiga.agnus.dskpt, 0x1F_FFFE);

    amiga
        .configure(ConfigOption::Revision(AgnusRevision::Ocs))
        .expect("valid");
    assert_eq!(amiga.agnus.dskpt, 0x07_FFFE);
    assert_eq!(amiga.mem.chip_ram.len(), 512 * 1024);
    assert_eq!(amiga.peek_custom(reg::VPOSR) & 0x7F00, 0);
}

#[test]
fn soft_reset_keeps_time_and_memory() {
    let mut amiga = Amiga::default();
    amiga.cpu_poke_chip16(0x400, 0x1234);
    amiga.execute_until(dma_cycles(500));
    amiga.reset(false);
    assert_eq!(amiga.agnus.clock, dma_cycles(500));
    assert_eq!(amiga.cpu_peek_chip16(0x400), 0x1234);

    amiga.reset(true);
    assert_eq!(amiga.agnus.clock, 0);
    assert_eq!(amiga.cpu_peek_chip16(0x400), 0);
    assert!(amiga.dump().contains("[DiskController]"));
}

#[cfg(feature = "serde")]
#[test]
fn snapshot_serialises_to_json() {
    let mut amiga = Amiga::default();
    amiga.execute_until(dma_cycles(2 * 227));
    let info = amiga.info();

    let json = serde_json::to_string(&info).expect("serialise");
    assert!(json.contains("\"slots\""));
    let back: machine_amiga::AmigaInfo = serde_json::from_str(&json).expect("deserialise");
    assert_eq!(back, info);
}
