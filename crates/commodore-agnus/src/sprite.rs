//! Sprite DMA: per-sprite vertical trigger lines and fetch state.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpriteDmaState {
    #[default]
    Idle,
    Active,
}

/// First line on which sprite DMA is possible.
pub const SPRITE_DMA_FIRST_LINE: i64 = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpriteDma {
    pub vstrt: [i64; 8],
    pub vstop: [i64; 8],
    pub state: [SpriteDmaState; 8],
}

/// Vertical position the sprite comparators see at `(v, h)`. Late in the
/// line they already compare against the next line.
fn effective_line(v: i64, h: i64) -> i64 {
    if h < 0xDF { v } else { v + 1 }
}

impl SpriteDma {
    fn compare(&mut self, nr: usize, v: i64) {
        if self.vstrt[nr] == v {
            self.state[nr] = SpriteDmaState::Active;
        }
        if self.vstop[nr] == v {
            self.state[nr] = SpriteDmaState::Idle;
        }
    }

    /// SPRxPOS write: bits 15..8 are VSTART 7..0.
    pub fn poke_pos(&mut self, nr: usize, value: u16, v: i64, h: i64) {
        self.vstrt[nr] = i64::from(value >> 8) | (self.vstrt[nr] & 0x100);
        self.compare(nr, effective_line(v, h));
    }

    /// SPRxCTL write: bits 15..8 are VSTOP 7..0, bit 2 is VSTART 8 and bit 1
    /// is VSTOP 8.
    pub fn poke_ctl(&mut self, nr: usize, value: u16, v: i64, h: i64) {
        self.vstrt[nr] = i64::from((value & 0b100) << 6) | (self.vstrt[nr] & 0xFF);
        self.vstop[nr] = i64::from((value & 0b010) << 7) | i64::from(value >> 8);
        self.compare(nr, effective_line(v, h));
    }

    /// Advance the state machines to line `v` (the line about to start).
    pub fn update(&mut self, v: i64, last_line: i64, sprite_dma: bool) {
        if v == SPRITE_DMA_FIRST_LINE && sprite_dma {
            self.vstop = [SPRITE_DMA_FIRST_LINE; 8];
            self.state = [SpriteDmaState::Idle; 8];
            return;
        }
        if v == last_line {
            self.state = [SpriteDmaState::Idle; 8];
            return;
        }
        for nr in 0..8 {
            self.compare(nr, v);
        }
    }

    #[must_use]
    pub fn is_active(&self, nr: usize) -> bool {
        self.state[nr] == SpriteDmaState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctl_sets_high_bits_and_stop_line() {
        let mut spr = SpriteDma::default();
        spr.poke_pos(2, 0x4000, 10, 0);
        spr.poke_ctl(2, 0x5006, 10, 0);
        assert_eq!(spr.vstrt[2], 0x140);
        assert_eq!(spr.vstop[2], 0x150);
    }

    #[test]
    fn start_and_stop_lines_toggle_state() {
        let mut spr = SpriteDma::default();
        spr.poke_pos(0, 0x3000, 0, 0);
        spr.poke_ctl(0, 0x3200, 0, 0);

        spr.update(0x30, 312, true);
        assert!(spr.is_active(0));
        spr.update(0x31, 312, true);
        assert!(spr.is_active(0));
        spr.update(0x32, 312, true);
        assert!(!spr.is_active(0));
    }

    #[test]
    fn line_25_rearms_every_sprite() {
        let mut spr = SpriteDma {
            state: [SpriteDmaState::Active; 8],
            ..SpriteDma::default()
        };
        spr.update(SPRITE_DMA_FIRST_LINE, 312, true);
        assert!(spr.vstop.iter().all(|&v| v == SPRITE_DMA_FIRST_LINE));
        assert!((0..8).all(|n| !spr.is_active(n)));
    }

    #[test]
    fn pos_write_late_in_line_compares_against_next_line() {
        let mut spr = SpriteDma::default();
        spr.poke_pos(5, 0x4100, 0x40, 0xE0);
        assert!(spr.is_active(5));
        spr.poke_pos(6, 0x4100, 0x40, 0x20);
        assert!(!spr.is_active(6));
    }
}
