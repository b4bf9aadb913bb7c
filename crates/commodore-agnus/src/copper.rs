//! Copper - Coprocessor for synchronized register updates.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    #[default]
    Idle,
    Fetch1, // Fetch first word
    Fetch2, // Fetch second word
    Wait,   // Waiting for beam position
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Copper {
    pub state: State,
    pub cop1lc: u32,
    pub cop2lc: u32,
    pub pc: u32,
    pub ir1: u16,
    pub ir2: u16,
    pub danger: bool, // COPCON bit 1
    /// Completed MOVEs since power-on.
    pub moves: u64,
}

impl Copper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart_cop1(&mut self) {
        self.pc = self.cop1lc;
        self.state = State::Fetch1;
    }

    pub fn restart_cop2(&mut self) {
        self.pc = self.cop2lc;
        self.state = State::Fetch1;
    }

    /// Stop until the next restart.
    pub fn halt(&mut self) {
        self.state = State::Idle;
    }

    /// True if the next step reads chip memory.
    #[must_use]
    pub fn needs_bus(&self) -> bool {
        matches!(self.state, State::Fetch1 | State::Fetch2)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != State::Idle
    }

    /// True while parked on the end-of-list WAIT ($FFFF,$FFFE).
    #[must_use]
    pub fn at_end_of_list(&self) -> bool {
        self.state == State::Wait && self.ir1 == 0xFFFF && self.ir2 == 0xFFFE
    }

    /// MOVE target check. `reg` is a byte offset into the custom chip area.
    /// Without COPCON danger everything below $80 is protected, with it only
    /// the range below $40.
    #[must_use]
    pub fn may_write(&self, reg: u16) -> bool {
        reg >= 0x80 || (self.danger && reg >= 0x40)
    }

    /// Perform one Copper cycle.
    /// returns Some((reg_offset, value)) if a MOVE instruction completed.
    pub fn tick(
        &mut self,
        vpos: u16,
        hpos: u16,
        read_mem: impl Fn(u32) -> u16,
    ) -> Option<(u16, u16)> {
        match self.state {
            State::Idle => None,
            State::Fetch1 => {
                self.ir1 = read_mem(self.pc);
                self.pc = self.pc.wrapping_add(2);
                self.state = State::Fetch2;
                None
            }
            State::Fetch2 => {
                self.ir2 = read_mem(self.pc);
                self.pc = self.pc.wrapping_add(2);
                self.execute(vpos, hpos)
            }
            State::Wait => {
                if self.check_wait(vpos, hpos) {
                    self.state = State::Fetch1;
                }
                None
            }
        }
    }

    fn execute(&mut self, vpos: u16, hpos: u16) -> Option<(u16, u16)> {
        if (self.ir1 & 1) == 0 {
            // MOVE
            let reg = self.ir1 & 0x01FE;
            let val = self.ir2;
            self.state = State::Fetch1;
            self.moves += 1;
            Some((reg, val))
        } else if (self.ir2 & 1) != 0 {
            // SKIP: if beam position reached, skip next instruction
            if self.check_wait(vpos, hpos) {
                self.pc = self.pc.wrapping_add(4);
            }
            self.state = State::Fetch1;
            None
        } else {
            // WAIT
            self.state = if self.check_wait(vpos, hpos) {
                State::Fetch1
            } else {
                State::Wait
            };
            None
        }
    }

    fn check_wait(&self, vpos: u16, hpos: u16) -> bool {
        // End-of-list marker ($FFFF,$FFFE): never resolves.
        if self.ir1 == 0xFFFF && self.ir2 == 0xFFFE {
            return false;
        }

        let wait_v = (self.ir1 >> 8) & 0xFF;
        let wait_h = (self.ir1 >> 1) & 0x7F;
        let mask_v = (self.ir2 >> 8) & 0x7F;
        let mask_h = (self.ir2 >> 1) & 0x7F;

        let cur_v = vpos & 0xFF;
        let cur_h = (hpos >> 1) & 0x7F;

        // V7 has no mask bit and is always compared.
        let cmp_cur = ((cur_v & (mask_v | 0x80)) << 7) | (cur_h & mask_h);
        let cmp_wait = ((wait_v & (mask_v | 0x80)) << 7) | (wait_h & mask_h);
        cmp_cur >= cmp_wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(words: &'static [u16]) -> impl Fn(u32) -> u16 {
        move |addr: u32| words.get(addr as usize / 2).copied().unwrap_or(0)
    }

    #[test]
    fn skip_advances_pc_when_condition_met() {
        let mut cop = Copper::new();
        // SKIP VP=0 HP=0, masks $00, always true
        let mem = program(&[0x0001, 0x8001]);
        cop.restart_cop1();

        cop.tick(100, 100, &mem);
        assert_eq!(cop.state, State::Fetch2);
        cop.tick(100, 100, &mem);
        assert_eq!(cop.state, State::Fetch1);
        assert_eq!(cop.pc, 8, "next instruction skipped");
    }

    #[test]
    fn skip_does_not_advance_when_condition_not_met() {
        let mut cop = Copper::new();
        let mem = program(&[0xC801, 0xFF01]);
        cop.restart_cop1();

        cop.tick(50, 0, &mem);
        cop.tick(50, 0, &mem);
        assert_eq!(cop.state, State::Fetch1);
        assert_eq!(cop.pc, 4);
    }

    #[test]
    fn move_returns_register_and_value() {
        let mut cop = Copper::new();
        let mem = program(&[0x0180, 0x0F00]);
        cop.restart_cop1();
        assert_eq!(cop.tick(0, 0, &mem), None);
        assert_eq!(cop.tick(0, 0, &mem), Some((0x180, 0x0F00)));
        assert_eq!(cop.moves, 1);
    }

    #[test]
    fn wait_holds_until_beam_reaches_position() {
        let mut cop = Copper::new();
        // WAIT line $40, hpos $20
        let mem = program(&[0x4021, 0xFFFE]);
        cop.restart_cop1();
        cop.tick(0x30, 0, &mem);
        cop.tick(0x30, 0, &mem);
        assert_eq!(cop.state, State::Wait);
        cop.tick(0x40, 0x10, &mem);
        assert_eq!(cop.state, State::Wait);
        cop.tick(0x40, 0x20, &mem);
        assert_eq!(cop.state, State::Fetch1);
    }

    #[test]
    fn v7_is_always_compared() {
        let mut cop = Copper::new();
        let mem = program(&[0xF401, 0x7FFE]);
        cop.restart_cop1();
        cop.tick(0x74, 0, &mem);
        cop.tick(0x74, 0, &mem);
        assert_eq!(cop.state, State::Wait, "line $74 must not satisfy WAIT $F4");
    }

    #[test]
    fn end_of_list_never_resolves() {
        let mut cop = Copper::new();
        let mem = program(&[0xFFFF, 0xFFFE]);
        cop.restart_cop1();
        cop.tick(0xFF, 0xE2, &mem);
        cop.tick(0xFF, 0xE2, &mem);
        assert!(cop.at_end_of_list());
    }

    #[test]
    fn protected_registers_need_danger() {
        let mut cop = Copper::new();
        assert!(!cop.may_write(0x040));
        assert!(cop.may_write(0x180));
        cop.danger = true;
        assert!(cop.may_write(0x040));
        assert!(!cop.may_write(0x020));
    }
}
