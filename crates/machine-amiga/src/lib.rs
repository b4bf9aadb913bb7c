//! The Amiga chipset registry.
//!
//! [`Amiga`] owns Agnus, Paula, the floppy drives and chip RAM, and drives
//! them from a single event loop. Everything outside the chipset (the CPU,
//! Denise, the CIAs, the audio state machines) is reached through the
//! [`ports`] traits.
//!
//! Time advances one DMA cycle per [`Amiga::execute`]. Before advancing,
//! every event slot that is due is serviced in slot priority order.
//! [`Amiga::execute_until`] skips straight to the target when no event
//! can fire on the way.

pub mod config;
mod error;
mod inspect;
pub mod memory;
pub mod ports;

pub use crate::config::{AmigaConfig, ConfigOption};
pub use crate::error::{ConfigError, InsertError};
pub use crate::inspect::{AmigaInfo, Inspector};
pub use crate::memory::Memory;
pub use crate::ports::{AudioPort, CiaPort, CpuPort, DenisePort, Detached, Ports};

pub use commodore_agnus;
pub use commodore_paula_8364;
pub use drive_amiga_floppy;
pub use format_adf;

use commodore_agnus::{
    Agnus, BusOwner, ChipMemory, DasEvent, EventHandler, EventId, EventQueue, EventSlot,
    HPOS_CNT, HPOS_MAX, execute_events_until,
};
use commodore_paula_8364::{IrqSource, Paula8364};
use drive_amiga_floppy::{Disk, DriveConfig, FloppyDrive};
use emu_core::{Cycle, Dumpable, MasterClock, Observable, Resettable, Value, dma_cycles};
use format_adf::DiskImage;

/// E-clock phase to wait states (in CPU cycles) needed to reach phase 2.
const ECLOCK_SYNC_DELAY: [Cycle; 10] = [12, 11, 10, 9, 8, 7, 6, 15, 14, 13];

const DRIVE_PREFIXES: [&str; 4] = ["drive0", "drive1", "drive2", "drive3"];

/// One entry of the component registration list.
pub struct Component<'a> {
    /// Path prefix under which the component answers queries.
    pub prefix: &'static str,
    pub observable: &'a dyn Observable,
    pub dumpable: &'a dyn Dumpable,
}

pub struct Amiga {
    pub config: AmigaConfig,
    pub agnus: Agnus,
    pub paula: Paula8364,
    pub mem: Memory,
    pub ports: Ports,
    suspend_count: u32,
    inspector: Inspector,
}

impl std::fmt::Debug for Amiga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Amiga")
            .field("clock", &self.agnus.clock)
            .field("pos", &self.agnus.pos)
            .field("mem", &self.mem)
            .field("suspended", &self.is_suspended())
            .finish_non_exhaustive()
    }
}

impl Default for Amiga {
    fn default() -> Self {
        Self::new(AmigaConfig::default())
    }
}

impl Amiga {
    #[must_use]
    pub fn new(config: AmigaConfig) -> Self {
        Self::with_ports(config, Ports::default())
    }

    /// Build a machine wired to the given external chips. The machine is
    /// hard reset and ready to run.
    #[must_use]
    pub fn with_ports(config: AmigaConfig, ports: Ports) -> Self {
        let mut paula = Paula8364::new(config.disk);
        for (drive, drive_config) in paula.disk.drives.iter_mut().zip(config.drives) {
            drive.config = drive_config;
        }
        let chip_ram = config.revision.chip_ram_limit_kb() as usize * 1024;

        let mut amiga = Self {
            agnus: Agnus::new(config.revision),
            paula,
            mem: Memory::new(chip_ram),
            ports,
            suspend_count: 0,
            inspector: Inspector::default(),
            config,
        };
        amiga.reset(true);
        amiga
    }

    //
    // Running
    //

    /// Execute one DMA cycle.
    pub fn execute(&mut self) {
        if self.is_suspended() {
            return;
        }
        self.step();
    }

    /// Execute until the clock reaches `target`, rounded down to a DMA cycle.
    pub fn execute_until(&mut self, target: Cycle) {
        if self.is_suspended() {
            return;
        }
        self.run_until(target);
    }

    /// Run whole DMA cycles until the start of the next frame.
    pub fn execute_frame(&mut self) {
        let target = self.agnus.start_of_next_frame();
        self.execute_until(target);
    }

    /// Emulated time since the last hard reset, at the PAL crystal rate.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        MasterClock::pal().seconds(self.agnus.clock)
    }

    fn step(&mut self) {
        if self.agnus.events.next_trigger <= self.agnus.clock {
            let clock = self.agnus.clock;
            execute_events_until(self, clock);
        }
        self.agnus.advance();
    }

    fn run_until(&mut self, target: Cycle) {
        let target = target & !7;
        let n = (target - self.agnus.clock) / dma_cycles(1);
        if n <= 0 {
            return;
        }
        if target < self.agnus.events.next_trigger {
            self.agnus.jump(n);
        } else {
            for _ in 0..n {
                self.step();
            }
        }
    }

    //
    // Suspension
    //

    pub fn suspend(&mut self) {
        self.suspend_count += 1;
    }

    pub fn resume(&mut self) {
        debug_assert!(self.suspend_count > 0, "resume without suspend");
        self.suspend_count = self.suspend_count.saturating_sub(1);
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspend_count > 0
    }

    /// Run `f` with the emulation suspended.
    pub fn suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.suspend();
        let result = f(self);
        self.resume();
        result
    }

    //
    // Bus arbitration for CPU accesses
    //

    fn eclock_syncing(&self) -> bool {
        self.config.eclock_syncing && self.ports.cia_a.eclock_syncing()
    }

    fn eclock_phase(&self) -> Cycle {
        (self.agnus.clock >> 2) % 10
    }

    /// Delay the CPU until the E clock reaches the phase where a CIA
    /// access can start.
    pub fn sync_with_eclock(&mut self) {
        if !self.eclock_syncing() {
            return;
        }
        let delay = 4 * ECLOCK_SYNC_DELAY[self.eclock_phase() as usize];
        debug_assert_eq!((self.agnus.clock + delay) % dma_cycles(1), 0);

        self.run_until(self.agnus.clock + delay);
        self.ports.cpu.add_wait_states(delay);
    }

    /// True if a CIA access may proceed at the current E-clock phase.
    #[must_use]
    #[allow(clippy::nonminimal_bool)]
    pub fn in_sync_with_eclock(&self) -> bool {
        if !self.eclock_syncing() {
            return true;
        }
        let e = self.eclock_phase();
        // FIXME: holds for every phase. The intended window is unknown.
        e >= 2 || e <= 6
    }

    /// Block the CPU until the bus is free, then claim the cycle for it.
    pub fn wait_for_free_bus(&mut self) {
        self.wait_for_bus(false);
    }

    /// Like [`wait_for_free_bus`](Self::wait_for_free_bus), but first
    /// aligned to the E clock.
    pub fn wait_for_free_bus_for_cia(&mut self) {
        self.sync_with_eclock();
        self.wait_for_bus(true);
    }

    fn wait_for_bus(&mut self, cia: bool) {
        let h = self.agnus.pos.h;
        let mut posh = if h == 0 { HPOS_MAX } else { h - 1 };

        let blocked = |amiga: &Self, posh: i64| {
            !amiga.agnus.bus.is_free(posh) || (cia && !amiga.in_sync_with_eclock())
        };

        if blocked(self, posh) {
            let mut delay = 0;
            loop {
                posh = self.agnus.pos.h;
                self.step();
                delay += 1;
                if delay == 2 {
                    self.agnus.bls = true;
                }
                if !blocked(self, posh) {
                    break;
                }
            }
            self.agnus.bls = false;
            log::trace!("CPU waited {delay} DMA cycles for the bus");
            self.ports.cpu.add_wait_states(dma_cycles(delay));
        }

        self.agnus.bus.assign(posh, BusOwner::Cpu);
    }

    /// CPU word read from chip RAM.
    pub fn cpu_peek_chip16(&mut self, addr: u32) -> u16 {
        self.wait_for_free_bus();
        self.mem.peek16(addr)
    }

    /// CPU word write to chip RAM.
    pub fn cpu_poke_chip16(&mut self, addr: u32, value: u16) {
        self.wait_for_free_bus();
        self.mem.poke16(addr, value);
    }

    /// CPU word read from the custom chip area.
    pub fn cpu_peek_custom16(&mut self, addr: u32) -> u16 {
        self.wait_for_free_bus();
        self.peek_custom(addr as u16)
    }

    /// CPU word write to the custom chip area.
    pub fn cpu_poke_custom16(&mut self, addr: u32, value: u16) {
        self.wait_for_free_bus();
        self.poke_custom(addr as u16, value);
    }

    //
    // Custom registers
    //

    /// Write a custom register. `addr` is the offset from $DFF000.
    pub fn poke_custom(&mut self, addr: u16, value: u16) {
        let addr = addr & 0x1FE;
        if self.paula.poke(addr, value, &mut self.agnus, &mut self.mem) {
            return;
        }
        if is_denise_register(addr) {
            self.ports.denise.poke_register(addr, value);
        }
        self.agnus.poke(addr, value);
    }

    /// Read a custom register. Unmapped registers read as 0.
    pub fn peek_custom(&mut self, addr: u16) -> u16 {
        let addr = addr & 0x1FE;
        self.paula
            .peek(addr, &self.agnus)
            .or_else(|| self.agnus.peek(addr))
            .unwrap_or_else(|| {
                log::trace!("read from unmapped custom register {addr:#05X}");
                0
            })
    }

    #[must_use]
    pub fn interrupt_level(&self) -> u8 {
        self.paula.interrupt_level()
    }

    //
    // Floppy drives
    //

    /// Forward a change of the CIA-B port B output to the drives.
    pub fn prb_did_change(&mut self, old: u8, new: u8) {
        self.paula.disk.prb_did_change(old, new, &mut self.agnus);
    }

    /// Drive status lines for CIA-A port A (active low).
    #[must_use]
    pub fn drive_status_flags(&self) -> u8 {
        self.paula.disk.drive_status_flags(self.agnus.clock)
    }

    #[must_use]
    pub fn drive(&self, nr: usize) -> Option<&FloppyDrive> {
        self.paula.disk.drives.get(nr)
    }

    fn check_drive(&self, nr: usize) -> Result<(), ConfigError> {
        if nr >= self.paula.disk.drives.len() {
            return Err(ConfigError::InvalidDrive(nr));
        }
        if !self.paula.disk.is_connected(nr) {
            return Err(ConfigError::DriveNotConnected(nr));
        }
        Ok(())
    }

    /// Insert `disk` into drive `nr` after `delay` master cycles.
    pub fn insert_disk(&mut self, nr: usize, disk: Box<Disk>, delay: Cycle) -> Result<(), ConfigError> {
        self.check_drive(nr)?;
        self.paula
            .disk
            .insert_disk(disk, nr, delay, &mut self.agnus);
        Ok(())
    }

    /// Encode a sector image and insert it into drive `nr` right away.
    pub fn insert_image(&mut self, nr: usize, image: &dyn DiskImage) -> Result<(), InsertError> {
        self.check_drive(nr)?;
        let disk = Disk::from_image(image)?;
        self.insert_disk(nr, Box::new(disk), 0)?;
        Ok(())
    }

    /// Eject the disk in drive `nr` after `delay` master cycles.
    pub fn eject_disk(&mut self, nr: usize, delay: Cycle) -> Result<(), ConfigError> {
        self.check_drive(nr)?;
        self.paula.disk.eject_disk(nr, delay, &mut self.agnus);
        Ok(())
    }

    //
    // Configuration
    //

    /// Apply a configuration change with the emulation suspended.
    pub fn configure(&mut self, option: ConfigOption) -> Result<(), ConfigError> {
        self.suspended(|amiga| amiga.apply_option(option))
    }

    fn apply_option(&mut self, option: ConfigOption) -> Result<(), ConfigError> {
        log::debug!("configure {option:?}");
        match option {
            ConfigOption::Revision(revision) => {
                self.config.revision = revision;
                self.agnus.set_revision(revision);
                self.mem
                    .resize(revision.chip_ram_limit_kb() as usize * 1024);
            }
            ConfigOption::EClockSyncing(value) => self.config.eclock_syncing = value,
            ConfigOption::DriveConnected(nr, value) => {
                if nr >= self.paula.disk.drives.len() {
                    return Err(ConfigError::InvalidDrive(nr));
                }
                self.paula.disk.set_connected(nr, value);
                self.config.disk.connected = self.paula.disk.config.connected;
            }
            ConfigOption::DriveSpeed(nr, speed) => {
                if !DriveConfig::VALID_SPEEDS.contains(&speed) {
                    return Err(ConfigError::InvalidDriveSpeed(speed));
                }
                self.drive_config_mut(nr)?.speed = speed;
            }
            ConfigOption::MechanicalDelays(nr, value) => {
                self.drive_config_mut(nr)?.mechanical_delays = value;
            }
            ConfigOption::AsyncFifo(value) => self.config.disk.async_fifo = value,
            ConfigOption::LockDskSync(value) => self.config.disk.lock_dsk_sync = value,
            ConfigOption::AutoDskSync(value) => self.config.disk.auto_dsk_sync = value,
            ConfigOption::TimedFlush(value) => self.config.disk.timed_flush = value,
        }
        self.paula.disk.config = self.config.disk;
        for (drive, config) in self.paula.disk.drives.iter_mut().zip(self.config.drives) {
            drive.config = config;
        }
        Ok(())
    }

    fn drive_config_mut(&mut self, nr: usize) -> Result<&mut DriveConfig, ConfigError> {
        self.config
            .drives
            .get_mut(nr)
            .ok_or(ConfigError::InvalidDrive(nr))
    }

    //
    // Inspection
    //

    /// A handle for reading snapshots from another thread.
    #[must_use]
    pub fn inspector(&self) -> Inspector {
        self.inspector.clone()
    }

    #[must_use]
    pub fn info(&self) -> AmigaInfo {
        AmigaInfo {
            agnus: self.agnus.info(),
            slots: self.agnus.events.slots(),
            bus: self.agnus.bus.owners().to_vec(),
            ddf_lores: self.agnus.ddf.lores,
            ddf_hires: self.agnus.ddf.hires,
            ddf_state: self.agnus.ddf.state,
            paula: self.paula.info(&self.agnus),
        }
    }

    /// Publish the current state to every [`Inspector`].
    pub fn publish_snapshot(&self) {
        self.inspector.publish(self.info());
    }

    /// The registration list of inspectable components.
    #[must_use]
    pub fn components(&self) -> Vec<Component<'_>> {
        let mut list = vec![
            Component {
                prefix: "agnus",
                observable: &self.agnus,
                dumpable: &self.agnus,
            },
            Component {
                prefix: "paula",
                observable: &self.paula,
                dumpable: &self.paula,
            },
            Component {
                prefix: "disk",
                observable: &self.paula.disk,
                dumpable: &self.paula.disk,
            },
        ];
        list.extend(
            self.paula
                .disk
                .drives
                .iter()
                .zip(DRIVE_PREFIXES)
                .map(|(drive, prefix)| Component {
                    prefix,
                    observable: drive,
                    dumpable: drive,
                }),
        );
        list
    }

    //
    // Event services
    //

    fn service_ras_event(&mut self) {
        self.ports.denise.end_of_line(self.agnus.pos.v);
        let vsync = self.agnus.hsync();
        self.ports.cia_b.tod_increment();
        if vsync {
            self.ports.denise.vsync();
            self.publish_snapshot();
        }
        self.ports.denise.begin_of_line(self.agnus.pos.v);
        self.agnus
            .schedule_rel(EventSlot::Ras, dma_cycles(HPOS_CNT), EventId::RasHsync);
    }

    fn service_vbl_event(&mut self) {
        self.paula.irq.raise_irq(IrqSource::Vertb);
        self.ports.cia_a.tod_increment();

        let line = self.agnus.revision.vstrobe_line();
        let trigger = self.agnus.start_of_next_frame() + dma_cycles(HPOS_CNT * line);
        self.agnus
            .events
            .schedule_abs(EventSlot::Vbl, trigger, EventId::VblStrobe);
    }

    fn service_cia_event(&mut self, slot: EventSlot) {
        let port = if slot == EventSlot::CiaA {
            &mut self.ports.cia_a
        } else {
            &mut self.ports.cia_b
        };
        port.execute();
        self.agnus
            .schedule_rel(slot, emu_core::cia_cycles(1), EventId::CiaExecute);
    }

    fn service_das_event(&mut self) {
        match self.agnus.das_table.event_at(self.agnus.pos.h) {
            DasEvent::None => {}
            DasEvent::Refresh => self.agnus.do_refresh(),
            DasEvent::Disk => self.paula.perform_disk_dma(&mut self.agnus, &mut self.mem),
            DasEvent::Audio(channel) => {
                let word = self.agnus.do_audio_dma(usize::from(channel), &self.mem);
                self.ports.audio.poke_audio_data(channel, word);
            }
            DasEvent::SpriteFirst(nr) => {
                if let Some(fetch) = self.agnus.first_sprite_cycle(nr, &self.mem) {
                    self.ports.denise.poke_sprite(nr, fetch);
                }
            }
            DasEvent::SpriteSecond(nr) => {
                if let Some(fetch) = self.agnus.second_sprite_cycle(nr, &self.mem) {
                    self.ports.denise.poke_sprite(nr, fetch);
                }
            }
        }
        self.agnus.schedule_next_das_event();
    }
}

/// Registers Denise decodes: DIW, CLXCON, BPLCONx, BPLxDAT, sprites and
/// colours.
fn is_denise_register(addr: u16) -> bool {
    matches!(addr, 0x08E | 0x090 | 0x098 | 0x100..=0x106 | 0x110..=0x11A | 0x140..=0x1BE)
}

impl EventHandler for Amiga {
    fn events(&mut self) -> &mut EventQueue {
        &mut self.agnus.events
    }

    fn service(&mut self, slot: EventSlot) {
        match slot {
            EventSlot::Ras => self.service_ras_event(),
            EventSlot::Reg => self.agnus.service_reg_event(),
            EventSlot::CiaA | EventSlot::CiaB => self.service_cia_event(slot),
            EventSlot::Bpl => {
                if let Some((plane, word)) = self.agnus.service_bpl_event(&self.mem) {
                    self.ports.denise.poke_bpldat(plane, word);
                }
            }
            EventSlot::Das => self.service_das_event(),
            EventSlot::Cop => {
                if let Some((reg, value)) = self.agnus.service_cop_event(&self.mem) {
                    self.poke_custom(reg, value);
                }
            }
            EventSlot::Sec => {}
            EventSlot::Dsk => self.paula.service_disk_event(&mut self.agnus),
            EventSlot::Dch => self.paula.service_disk_change_event(&mut self.agnus),
            EventSlot::Vbl => self.service_vbl_event(),
            EventSlot::Irq => self.paula.service_irq_event(&mut self.agnus),
        }
    }
}

impl Resettable for Amiga {
    fn reset(&mut self, hard: bool) {
        log::debug!("{} reset", if hard { "hard" } else { "soft" });
        self.agnus.reset(hard);
        self.paula.reset(hard);
        if hard {
            self.mem.clear();
        }
        self.publish_snapshot();
    }
}

impl Observable for Amiga {
    fn query(&self, path: &str) -> Option<Value> {
        let (prefix, rest) = path.split_once('.')?;
        self.components()
            .into_iter()
            .find(|c| c.prefix == prefix)
            .and_then(|c| c.observable.query(rest))
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "agnus.<path>",
            "paula.<path>",
            "disk.<path>",
            "drive<n>.<path>",
        ]
    }
}

impl Dumpable for Amiga {
    fn name(&self) -> &'static str {
        "Amiga"
    }

    fn dump(&self) -> String {
        self.components()
            .iter()
            .map(|c| format!("[{}]\n{}", c.dumpable.name(), c.dumpable.dump()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
