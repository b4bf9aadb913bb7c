//! Data fetch window prediction.
//!
//! Once per line the DDFSTRT/DDFSTOP trigger positions are classified as
//! small (left of the hardware stop at $18), medium, or large (never reached
//! because they lie beyond the end of the line). A table keyed by the two
//! classes selects the window. ECS keeps an ON/OFF state across lines that
//! also keys the table. OCS has no state but enables DMA only on every other
//! line when DDFSTRT is small.

use crate::beam::HPOS_CNT;

/// Leftmost and rightmost positions the hardware stops enforce.
pub const DDF_LEFT_EDGE: i64 = 0x18;
pub const DDF_RIGHT_EDGE: i64 = 0xD8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DdfState {
    #[default]
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Small,
    Medium,
    Large,
}

impl Band {
    fn of(reached: Option<i64>) -> Self {
        match reached {
            None => Band::Large,
            Some(pos) if pos < DDF_LEFT_EDGE => Band::Small,
            Some(_) => Band::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Empty,
    StrtStop,
    StrtD8,
    EdgeStop,
    EdgeD8,
}

/// Fetch window of one resolution, split into odd (BPL1/3/5) and even
/// (BPL2/4/6) planes. An empty half has `strt == stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ddf {
    pub strt_odd: i64,
    pub stop_odd: i64,
    pub strt_even: i64,
    pub stop_even: i64,
}

impl Ddf {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strt_odd >= self.stop_odd && self.strt_even >= self.stop_even
    }

    /// Fill both halves for the interval `[strt, stop]`. `scroll_odd` and
    /// `scroll_even` are the BPLCON1 delay nibbles.
    pub fn compute(&mut self, hires: bool, strt: i64, stop: i64, scroll_odd: u16, scroll_even: u16) {
        if stop < strt {
            self.clear();
            return;
        }
        (self.strt_odd, self.stop_odd) = Self::half(hires, strt, stop, scroll_odd);
        (self.strt_even, self.stop_even) = Self::half(hires, strt, stop, scroll_even);
    }

    fn half(hires: bool, strt: i64, stop: i64, scroll: u16) -> (i64, i64) {
        // A large scroll value starts fetching one unit early.
        let extra = match (hires, scroll) {
            (false, s) if s & 0b1000 != 0 => 8,
            (true, s) if s & 0b0100 != 0 => 4,
            _ => 0,
        };
        let units = ((stop - strt) + 15) >> 3;
        let first = strt - extra;
        let last = (first + 8 * units).min(0xE0 - extra);
        (first, last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DdfPredictor {
    pub lores: Ddf,
    pub hires: Ddf,
    pub state: DdfState,
    /// Line on which an OCS Agnus with a small DDFSTRT fetches next.
    pub ocs_early_access_line: i64,
}

impl Default for DdfPredictor {
    fn default() -> Self {
        Self {
            lores: Ddf::default(),
            hires: Ddf::default(),
            state: DdfState::Off,
            ocs_early_access_line: -1,
        }
    }
}

impl DdfPredictor {
    /// Compute the windows for line `v`. Returns true if anything changed, in
    /// which case the caller rebuilds the bitplane table and predicts again
    /// on the next line.
    pub fn predict(&mut self, ecs: bool, ddfstrt: u16, ddfstop: u16, bplcon1: u16, v: i64) -> bool {
        let old = (self.lores, self.hires, self.state);

        let strt = Some(i64::from(ddfstrt)).filter(|&p| p < HPOS_CNT);
        let stop = Some(i64::from(ddfstop)).filter(|&p| p < HPOS_CNT);

        if ecs {
            self.compute_ecs(strt, stop, bplcon1);
        } else {
            self.compute_ocs(strt, stop, bplcon1, v);
        }

        log::trace!(
            "DDF line {v}: lores {:#x}..{:#x} hires {:#x}..{:#x} {:?}",
            self.lores.strt_odd,
            self.lores.stop_odd,
            self.hires.strt_odd,
            self.hires.stop_odd,
            self.state
        );
        (self.lores, self.hires, self.state) != old
    }

    fn apply(&mut self, window: Window, strt: Option<i64>, stop: Option<i64>, odd: u16, even: u16) {
        let (first, last) = match window {
            Window::Empty => {
                self.lores.clear();
                self.hires.clear();
                return;
            }
            Window::StrtStop => (strt, stop),
            Window::StrtD8 => (strt, Some(DDF_RIGHT_EDGE)),
            Window::EdgeStop => (Some(DDF_LEFT_EDGE), stop),
            Window::EdgeD8 => (Some(DDF_LEFT_EDGE), Some(DDF_RIGHT_EDGE)),
        };
        // Every table row that names an endpoint has that endpoint reached.
        let (Some(first), Some(last)) = (first, last) else {
            self.lores.clear();
            self.hires.clear();
            return;
        };
        self.lores.compute(false, first, last, odd, even);
        self.hires.compute(true, first, last, odd, even);
    }

    fn compute_ocs(&mut self, strt: Option<i64>, stop: Option<i64>, bplcon1: u16, v: i64) {
        let scroll = bplcon1 & 0xF;

        // Early start: DMA only on every other line.
        if Band::of(strt) == Band::Small {
            if self.ocs_early_access_line == v {
                let last = stop.or(Some(DDF_RIGHT_EDGE));
                self.apply(Window::StrtStop, strt, last, scroll, scroll);
            } else {
                self.lores.clear();
                self.hires.clear();
                self.ocs_early_access_line = v + 1;
            }
            return;
        }

        let window = match (Band::of(strt), Band::of(stop)) {
            (Band::Medium, Band::Medium) => Window::StrtStop,
            (Band::Medium, Band::Large) => Window::StrtD8,
            (Band::Large, Band::Large) => Window::Empty,
            (a, b) => {
                log::warn!("DDF combination ({a:?}, {b:?}) not handled by OCS Agnus");
                Window::Empty
            }
        };
        self.apply(window, strt, stop, scroll, scroll);
    }

    fn compute_ecs(&mut self, strt: Option<i64>, stop: Option<i64>, bplcon1: u16) {
        use Band::{Large, Medium, Small};
        use DdfState::{Off, On};

        let (window, next) = match (Band::of(strt), Band::of(stop), self.state) {
            (Small, Small, _) => (Window::Empty, Off),
            (Small, Medium, _) => (Window::EdgeStop, Off),
            (Small, Large, _) => (Window::EdgeD8, On),
            (Medium, Medium, Off) => (Window::StrtStop, Off),
            (Medium, Medium, On) => (Window::EdgeStop, Off),
            (Medium, Large, Off) => (Window::StrtD8, On),
            (Medium, Large, On) => (Window::EdgeD8, On),
            (Large, Large, Off) => (Window::Empty, Off),
            (Large, Large, On) => (Window::EdgeD8, On),
            (a, b, _) => {
                log::warn!("DDF combination ({a:?}, {b:?}) not handled by ECS Agnus");
                (Window::Empty, Off)
            }
        };
        self.apply(window, strt, stop, bplcon1 & 0xF, (bplcon1 >> 4) & 0xF);
        self.state = next;
    }
}
