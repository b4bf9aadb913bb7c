//! Chip RAM.

use commodore_agnus::ChipMemory;

pub const CUSTOM_REGS_BASE: u32 = 0xDF_F000;

#[derive(Clone)]
pub struct Memory {
    pub chip_ram: Vec<u8>,
    pub chip_ram_mask: u32,
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("chip_ram", &format_args!("{} KB", self.chip_ram.len() / 1024))
            .finish()
    }
}

impl Memory {
    /// `chip_ram_size` must be a power of two.
    #[must_use]
    pub fn new(chip_ram_size: usize) -> Self {
        debug_assert!(chip_ram_size.is_power_of_two());
        Self {
            chip_ram: vec![0; chip_ram_size],
            chip_ram_mask: (chip_ram_size as u32).wrapping_sub(1),
        }
    }

    /// Grow or shrink chip RAM, keeping the common part.
    pub fn resize(&mut self, chip_ram_size: usize) {
        debug_assert!(chip_ram_size.is_power_of_two());
        self.chip_ram.resize(chip_ram_size, 0);
        self.chip_ram_mask = (chip_ram_size as u32).wrapping_sub(1);
    }

    /// True if `addr` decodes to chip RAM (mirrors included).
    #[must_use]
    pub fn is_chip_ram(addr: u32) -> bool {
        (addr & 0xFF_FFFF) < 0x20_0000
    }

    #[must_use]
    pub fn read_chip_byte(&self, addr: u32) -> u8 {
        self.chip_ram[(addr & self.chip_ram_mask) as usize]
    }

    pub fn write_chip_byte(&mut self, addr: u32, val: u8) {
        self.chip_ram[(addr & self.chip_ram_mask) as usize] = val;
    }

    pub fn clear(&mut self) {
        self.chip_ram.fill(0);
    }
}

impl ChipMemory for Memory {
    fn peek16(&self, addr: u32) -> u16 {
        let addr = addr & self.chip_ram_mask & !1;
        u16::from_be_bytes([
            self.chip_ram[addr as usize],
            self.chip_ram[addr as usize + 1],
        ])
    }

    fn poke16(&mut self, addr: u32, value: u16) {
        let addr = (addr & self.chip_ram_mask & !1) as usize;
        self.chip_ram[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
    }
}
