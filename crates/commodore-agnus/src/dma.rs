//! Per-line DMA event tables.
//!
//! The bitplane table is rebuilt whenever the fetch window, the plane count
//! or the bitplane DMA line status changes. The DAS table (disk, audio,
//! sprite and refresh) only depends on the DMACON enable bits. Each table
//! carries a jump table to the next position holding an event so the
//! scheduler never has to look at empty cycles.

use crate::beam::HPOS_CNT;
use crate::ddf::Ddf;

/// Word access to chip RAM on behalf of a DMA channel.
pub trait ChipMemory {
    fn peek16(&self, addr: u32) -> u16;
    fn poke16(&mut self, addr: u32, value: u16);
}

/// Lores fetch order within an 8-cycle unit. `None` is a free cycle.
pub const LOWRES_DDF_TO_PLANE: [Option<u8>; 8] = [
    None,
    Some(3),
    Some(5),
    Some(1),
    None,
    Some(2),
    Some(4),
    Some(0),
];

/// Hires fetch order within a 4-cycle unit.
pub const HIRES_DDF_TO_PLANE: [u8; 4] = [3, 1, 2, 0];

/// Number of bitplanes enabled by BPLCON0. Invalid BPU values disable all
/// planes in hires and fall back to four planes in lores.
#[must_use]
pub fn bpu(bplcon0: u16) -> u8 {
    let bpu = ((bplcon0 >> 12) & 0b111) as u8;
    let hires = bplcon0 & 0x8000 != 0;
    match (hires, bpu) {
        (true, 5..) => 0,
        (false, 7) => 4,
        _ => bpu,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BplEvent {
    #[default]
    None,
    /// Fetch a word for `plane` (0-based). `modulo` marks the last fetch of
    /// the plane on this line.
    Fetch { plane: u8, modulo: bool },
}

/// Positions of the next event, 0 meaning none. Position 0 never holds an
/// event in either table.
fn build_jump_table(has_event: impl Fn(usize) -> bool) -> Vec<u8> {
    let mut next = vec![0u8; HPOS_CNT as usize];
    let mut upcoming = 0u8;
    for h in (0..HPOS_CNT as usize).rev() {
        next[h] = upcoming;
        if has_event(h) {
            upcoming = h as u8;
        }
    }
    next
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BplTable {
    events: Vec<BplEvent>,
    next: Vec<u8>,
}

impl Default for BplTable {
    fn default() -> Self {
        Self {
            events: vec![BplEvent::None; HPOS_CNT as usize],
            next: vec![0; HPOS_CNT as usize],
        }
    }
}

impl BplTable {
    #[must_use]
    pub fn event_at(&self, h: i64) -> BplEvent {
        self.events[h as usize]
    }

    /// Next position after `h` with an event.
    #[must_use]
    pub fn next_after(&self, h: i64) -> Option<i64> {
        match self.next[h as usize] {
            0 => None,
            n => Some(i64::from(n)),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Build the table for a line fetching `planes` planes in `ddf`.
    pub fn build(&mut self, ddf: &Ddf, hires: bool, planes: u8) {
        self.events.fill(BplEvent::None);

        // Odd planes (BPL1/3/5) are 0-based even indices.
        let halves = [
            (ddf.strt_odd, ddf.stop_odd, 0u8),
            (ddf.strt_even, ddf.stop_even, 1u8),
        ];
        for (strt, stop, parity) in halves {
            for h in strt.max(0)..stop.min(HPOS_CNT) {
                let offset = (h - strt) as usize;
                let plane = if hires {
                    Some(HIRES_DDF_TO_PLANE[offset & 3])
                } else {
                    LOWRES_DDF_TO_PLANE[offset & 7]
                };
                if let Some(plane) = plane
                    && plane % 2 == parity
                    && plane < planes
                {
                    self.events[h as usize] = BplEvent::Fetch {
                        plane,
                        modulo: false,
                    };
                }
            }
        }

        // The last fetch of each plane adds the modulo.
        for p in 0..planes {
            let last = self
                .events
                .iter()
                .rposition(|e| matches!(e, BplEvent::Fetch { plane, .. } if *plane == p));
            if let Some(h) = last {
                self.events[h] = BplEvent::Fetch {
                    plane: p,
                    modulo: true,
                };
            }
        }

        self.next = build_jump_table(|h| self.events[h] != BplEvent::None);
        log::debug!(
            "bitplane table rebuilt ({planes} {} planes)",
            if hires { "hires" } else { "lores" }
        );
    }

    /// Count of fetches scheduled on this line.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.events.iter().filter(|e| **e != BplEvent::None).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DasEvent {
    #[default]
    None,
    Refresh,
    Disk,
    Audio(u8),
    SpriteFirst(u8),
    SpriteSecond(u8),
}

// DMACON enable bits covered by the DAS table.
pub const DMACON_AUD_MASK: u16 = 0b0000_1111;
pub const DMACON_DSKEN: u16 = 0b0001_0000;
pub const DMACON_SPREN: u16 = 0b0010_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DasTable {
    events: Vec<DasEvent>,
    next: Vec<u8>,
}

impl Default for DasTable {
    fn default() -> Self {
        let mut table = Self {
            events: vec![DasEvent::None; HPOS_CNT as usize],
            next: vec![0; HPOS_CNT as usize],
        };
        table.build(0);
        table
    }
}

impl DasTable {
    #[must_use]
    pub fn event_at(&self, h: i64) -> DasEvent {
        self.events[h as usize]
    }

    #[must_use]
    pub fn next_after(&self, h: i64) -> Option<i64> {
        match self.next[h as usize] {
            0 => None,
            n => Some(i64::from(n)),
        }
    }

    /// Build the table from the disk, audio and sprite enable bits.
    pub fn build(&mut self, dma_das: u16) {
        self.events.fill(DasEvent::None);

        for h in [0x01, 0x02, 0x03, 0x1B] {
            self.events[h] = DasEvent::Refresh;
        }
        if dma_das & DMACON_DSKEN != 0 {
            for h in 0x04..=0x06 {
                self.events[h] = DasEvent::Disk;
            }
        }
        for n in 0..4u8 {
            if dma_das & (1 << n) != 0 {
                self.events[0x07 + usize::from(n)] = DasEvent::Audio(n);
            }
        }
        if dma_das & DMACON_SPREN != 0 {
            for n in 0..8u8 {
                let h = 0x0B + 2 * usize::from(n);
                self.events[h] = DasEvent::SpriteFirst(n);
                self.events[h + 1] = DasEvent::SpriteSecond(n);
            }
        }

        self.next = build_jump_table(|h| self.events[h] != DasEvent::None);
    }
}
