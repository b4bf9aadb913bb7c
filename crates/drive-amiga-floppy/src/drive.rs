//! The drive mechanism: head, motor and the CIA control lines.

use emu_core::{Cycle, Dumpable, Observable, Resettable, Value, msec};

use crate::disk::{Disk, NUM_CYLINDERS};
use crate::mfm::TRACK_SIZE;

/// Drive configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveConfig {
    /// Words moved per DMA slot: 1 (stock), 2, 4 or 8. -1 selects turbo
    /// mode, which transfers a whole block at once.
    pub speed: i32,
    /// Model motor spin-up and spin-down times.
    pub mechanical_delays: bool,
    pub start_delay: Cycle,
    pub stop_delay: Cycle,
}

impl DriveConfig {
    pub const VALID_SPEEDS: [i32; 5] = [-1, 1, 2, 4, 8];
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            speed: 1,
            mechanical_delays: true,
            start_delay: msec(380),
            stop_delay: msec(80),
        }
    }
}

/// Head position. `offset` is the byte under the head within the track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveHead {
    pub cylinder: usize,
    pub side: usize,
    pub offset: usize,
}

// CIA-B PRB lines (all active low).
const PRB_STEP: u8 = 0x01;
const PRB_DIR: u8 = 0x02;
const PRB_SIDE: u8 = 0x04;
const PRB_SEL0: u8 = 0x08;
const PRB_MTR: u8 = 0x80;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FloppyDrive {
    /// Drive number (df0..df3), selects the SELx line in PRB.
    pub nr: usize,
    pub config: DriveConfig,
    pub head: DriveHead,
    pub disk: Option<Box<Disk>>,
    motor: bool,
    /// Cycle of the last motor switch and the speed at that moment.
    switch_cycle: Cycle,
    switch_speed: f64,
    selected: bool,
    /// /DSKCHANGE asserted: the disk was removed and the head has not
    /// stepped since.
    disk_changed: bool,
}

impl FloppyDrive {
    #[must_use]
    pub fn new(nr: usize) -> Self {
        assert!(nr < 4, "drive number {nr} out of range");
        Self {
            nr,
            config: DriveConfig::default(),
            head: DriveHead::default(),
            disk: None,
            motor: false,
            switch_cycle: 0,
            switch_speed: 0.0,
            selected: false,
            disk_changed: true,
        }
    }

    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    #[must_use]
    pub fn has_write_enabled_disk(&self) -> bool {
        self.disk.as_ref().is_some_and(|d| !d.write_protected)
    }

    pub fn insert_disk(&mut self, disk: Box<Disk>) {
        log::debug!("df{}: disk inserted (fnv {:#x})", self.nr, disk.fnv);
        self.head.offset = 0;
        self.disk = Some(disk);
    }

    pub fn eject_disk(&mut self) -> Option<Box<Disk>> {
        let disk = self.disk.take();
        if disk.is_some() {
            log::debug!("df{}: disk ejected", self.nr);
            self.disk_changed = true;
        }
        disk
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    #[must_use]
    pub fn is_turbo(&self) -> bool {
        self.config.speed < 0
    }

    #[must_use]
    pub fn motor(&self) -> bool {
        self.motor
    }

    //
    // Motor
    //

    /// Rotation speed in percent of nominal.
    #[must_use]
    pub fn motor_speed(&self, clock: Cycle) -> f64 {
        if !self.config.mechanical_delays {
            return if self.motor { 100.0 } else { 0.0 };
        }
        let elapsed = (clock - self.switch_cycle) as f64;
        if self.motor {
            if self.config.start_delay == 0 {
                return 100.0;
            }
            (self.switch_speed + 100.0 * elapsed / self.config.start_delay as f64).min(100.0)
        } else {
            if self.config.stop_delay == 0 {
                return 0.0;
            }
            (self.switch_speed - 100.0 * elapsed / self.config.stop_delay as f64).max(0.0)
        }
    }

    #[must_use]
    pub fn is_spinning(&self, clock: Cycle) -> bool {
        self.motor_speed(clock) > 0.0
    }

    #[must_use]
    pub fn motor_at_full_speed(&self, clock: Cycle) -> bool {
        self.motor_speed(clock) >= 100.0
    }

    pub fn set_motor(&mut self, on: bool, clock: Cycle) {
        if self.motor == on {
            return;
        }
        self.switch_speed = self.motor_speed(clock);
        self.switch_cycle = clock;
        self.motor = on;
        log::debug!("df{}: motor {}", self.nr, if on { "on" } else { "off" });
    }

    //
    // Control lines
    //

    /// React to a change of the CIA-B PRB output byte.
    pub fn prb_did_change(&mut self, old: u8, new: u8, clock: Cycle) {
        let sel_bit = PRB_SEL0 << self.nr;
        let old_sel = old & sel_bit != 0;
        let new_sel = new & sel_bit != 0;
        let old_step = old & PRB_STEP != 0;
        let new_step = new & PRB_STEP != 0;

        self.selected = !new_sel;

        // Step pulse: STEP falling edge while selected. DIR high = outward.
        if self.selected && old_step && !new_step {
            self.move_head(if new & PRB_DIR != 0 { -1 } else { 1 });
        }

        // The motor line is latched when the drive gets selected.
        if old_sel && !new_sel {
            self.set_motor(new & PRB_MTR == 0, clock);
        }

        self.head.side = if new & PRB_SIDE != 0 { 0 } else { 1 };
    }

    pub fn move_head(&mut self, dir: i32) {
        if dir < 0 {
            self.head.cylinder = self.head.cylinder.saturating_sub(1);
        } else if self.head.cylinder < NUM_CYLINDERS - 1 {
            self.head.cylinder += 1;
        }
        if self.has_disk() {
            self.disk_changed = false;
        }
        log::trace!("df{}: head at cylinder {}", self.nr, self.head.cylinder);
    }

    /// Status bits for CIA-A PRA (active low). All lines float high unless
    /// the drive is selected.
    #[must_use]
    pub fn status_flags(&self, clock: Cycle) -> u8 {
        let mut result = 0xFF;
        if self.selected {
            // PA5: /DSKRDY
            if self.motor && (!self.config.mechanical_delays || self.motor_at_full_speed(clock)) {
                result &= 0b1101_1111;
            }
            // PA4: /DSKTRACK0
            if self.head.cylinder == 0 {
                result &= 0b1110_1111;
            }
            // PA3: /DSKPROT
            if !self.has_write_enabled_disk() {
                result &= 0b1111_0111;
            }
            // PA2: /DSKCHANGE
            if self.disk_changed {
                result &= 0b1111_1011;
            }
        }
        result
    }

    //
    // Head I/O
    //

    fn rotate(&mut self) {
        self.head.offset += 1;
        if self.head.offset >= TRACK_SIZE {
            self.head.offset = 0;
        }
    }

    /// Byte under the head, then advance. Reads `$FF` without a disk.
    pub fn read_head(&mut self) -> u8 {
        let value = self.disk.as_ref().map_or(0xFF, |d| {
            d.read_byte(self.head.cylinder, self.head.side, self.head.offset)
        });
        self.rotate();
        value
    }

    pub fn read_head16(&mut self) -> u16 {
        let hi = self.read_head();
        let lo = self.read_head();
        u16::from_be_bytes([hi, lo])
    }

    /// Write the byte under the head, then advance. Ignored for missing or
    /// write-protected disks.
    pub fn write_head(&mut self, value: u8) {
        if let Some(disk) = self.disk.as_mut()
            && !disk.write_protected
        {
            disk.write_byte(value, self.head.cylinder, self.head.side, self.head.offset);
            disk.modified = true;
        }
        self.rotate();
    }

    pub fn write_head16(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.write_head(hi);
        self.write_head(lo);
    }

    /// Rotate until the head has just passed `$4489` (at most one turn).
    pub fn find_sync_mark(&mut self) {
        for _ in 0..TRACK_SIZE {
            if self.read_head() != 0x44 {
                continue;
            }
            if self.read_head() != 0x89 {
                continue;
            }
            break;
        }
        log::trace!("df{}: sync mark search ends at offset {}", self.nr, self.head.offset);
    }
}

impl Resettable for FloppyDrive {
    fn reset(&mut self, hard: bool) {
        self.head = DriveHead::default();
        self.motor = false;
        self.switch_cycle = 0;
        self.switch_speed = 0.0;
        self.selected = false;
        if hard {
            self.disk_changed = !self.has_disk();
        }
    }
}

impl Observable for FloppyDrive {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "cylinder" => Some(Value::U64(self.head.cylinder as u64)),
            "side" => Some(Value::U64(self.head.side as u64)),
            "offset" => Some(Value::U64(self.head.offset as u64)),
            "motor" => Some(self.motor.into()),
            "selected" => Some(self.selected.into()),
            "has_disk" => Some(self.has_disk().into()),
            "disk_changed" => Some(self.disk_changed.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cylinder",
            "side",
            "offset",
            "motor",
            "selected",
            "has_disk",
            "disk_changed",
        ]
    }
}

impl Dumpable for FloppyDrive {
    fn name(&self) -> &'static str {
        "Drive"
    }

    fn dump(&self) -> String {
        format!(
            "df{}: cyl {} side {} offset {} motor {} selected {} disk {:?}\n",
            self.nr,
            self.head.cylinder,
            self.head.side,
            self.head.offset,
            self.motor,
            self.selected,
            self.disk.as_deref(),
        )
    }
}
