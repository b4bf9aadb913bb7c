//! Bus ownership per DMA cycle of the current rasterline.

use crate::beam::HPOS_CNT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusOwner {
    #[default]
    None,
    Cpu,
    Refresh,
    Disk,
    Audio,
    Bitplane(u8),
    Sprite(u8),
    Copper,
    Blitter,
}

pub const BUS_OWNER_COUNT: usize = 21;

impl BusOwner {
    /// Dense index for usage counters.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            BusOwner::None => 0,
            BusOwner::Cpu => 1,
            BusOwner::Refresh => 2,
            BusOwner::Disk => 3,
            BusOwner::Audio => 4,
            BusOwner::Bitplane(n) => {
                assert!(n < 6, "bitplane {n} out of range");
                5 + usize::from(n)
            }
            BusOwner::Sprite(n) => {
                assert!(n < 8, "sprite {n} out of range");
                11 + usize::from(n)
            }
            BusOwner::Copper => 19,
            BusOwner::Blitter => 20,
        }
    }

    #[must_use]
    pub fn name(self) -> String {
        match self {
            BusOwner::None => "none".into(),
            BusOwner::Cpu => "cpu".into(),
            BusOwner::Refresh => "refresh".into(),
            BusOwner::Disk => "disk".into(),
            BusOwner::Audio => "audio".into(),
            BusOwner::Bitplane(n) => format!("bpl{}", n + 1),
            BusOwner::Sprite(n) => format!("spr{n}"),
            BusOwner::Copper => "copper".into(),
            BusOwner::Blitter => "blitter".into(),
        }
    }
}

/// Raw usage counts of the running frame and their smoothed history.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusStats {
    pub usage: [u64; BUS_OWNER_COUNT],
    pub copper_activity: f64,
    pub blitter_activity: f64,
    pub disk_activity: f64,
    pub audio_activity: f64,
    pub sprite_activity: f64,
    pub bitplane_activity: f64,
}

impl Default for BusStats {
    fn default() -> Self {
        Self {
            usage: [0; BUS_OWNER_COUNT],
            copper_activity: 0.0,
            blitter_activity: 0.0,
            disk_activity: 0.0,
            audio_activity: 0.0,
            sprite_activity: 0.0,
            bitplane_activity: 0.0,
        }
    }
}

impl BusStats {
    fn count(&self, owner: BusOwner) -> f64 {
        self.usage[owner.index()] as f64
    }

    /// Fold the counts of the finished frame into the averages and restart
    /// counting.
    pub fn update(&mut self) {
        const W: f64 = 0.5;

        let sprite: f64 = (0..8).map(|n| self.count(BusOwner::Sprite(n))).sum();
        let bitplane: f64 = (0..6).map(|n| self.count(BusOwner::Bitplane(n))).sum();

        self.copper_activity = W * self.copper_activity + (1.0 - W) * self.count(BusOwner::Copper);
        self.blitter_activity =
            W * self.blitter_activity + (1.0 - W) * self.count(BusOwner::Blitter);
        self.disk_activity = W * self.disk_activity + (1.0 - W) * self.count(BusOwner::Disk);
        self.audio_activity = W * self.audio_activity + (1.0 - W) * self.count(BusOwner::Audio);
        self.sprite_activity = W * self.sprite_activity + (1.0 - W) * sprite;
        self.bitplane_activity = W * self.bitplane_activity + (1.0 - W) * bitplane;

        self.usage = [0; BUS_OWNER_COUNT];
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusTable {
    owners: Vec<BusOwner>,
    pub stats: BusStats,
}

impl Default for BusTable {
    fn default() -> Self {
        Self {
            owners: vec![BusOwner::None; HPOS_CNT as usize],
            stats: BusStats::default(),
        }
    }
}

impl BusTable {
    fn slot(h: i64) -> usize {
        assert!((0..HPOS_CNT).contains(&h), "hpos {h} out of range");
        h as usize
    }

    #[must_use]
    pub fn owner_at(&self, h: i64) -> BusOwner {
        self.owners[Self::slot(h)]
    }

    #[must_use]
    pub fn is_free(&self, h: i64) -> bool {
        self.owner_at(h) == BusOwner::None
    }

    /// Grant cycle `h` to `owner` if nobody holds it yet.
    pub fn try_claim(&mut self, h: i64, owner: BusOwner) -> bool {
        debug_assert!(owner != BusOwner::None);
        let i = Self::slot(h);
        if self.owners[i] != BusOwner::None {
            return false;
        }
        self.owners[i] = owner;
        self.stats.usage[owner.index()] += 1;
        true
    }

    /// Hand cycle `h` to `owner` unconditionally. Used where arbitration
    /// has already happened (disk DMA, CPU after a bus wait).
    pub fn assign(&mut self, h: i64, owner: BusOwner) {
        let i = Self::slot(h);
        self.owners[i] = owner;
        self.stats.usage[owner.index()] += 1;
    }

    pub fn clear(&mut self) {
        self.owners.fill(BusOwner::None);
    }

    #[must_use]
    pub fn owners(&self) -> &[BusOwner] {
        &self.owners
    }
}
