//! Register file.
//!
//! - V0..VF: sixteen 8-bit general registers, VF doubles as the flag
//! - I: 16-bit index register (12 bits address memory)
//! - PC: program counter
//! - DT/ST: delay and sound countdown timers

use crate::cpu::memory::{ADDRESS_MASK, PROGRAM_START};
use serde::{Deserialize, Serialize};

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 16;

/// Index of the carry/borrow/collision flag.
pub const FLAG: usize = 0xF;

/// The register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// V0..VF
    pub v: [u8; REGISTER_COUNT],

    /// I: index register
    pub i: u16,

    /// PC: program counter, always within the 12-bit address space
    pub pc: u16,

    /// DT: delay timer
    pub dt: u8,

    /// ST: sound timer
    pub st: u8,
}

impl Registers {
    /// Create a register file in its reset state.
    pub fn new() -> Self {
        Self {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: PROGRAM_START,
            dt: 0,
            st: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance the program counter by one instruction.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(2) & ADDRESS_MASK;
        old
    }

    /// Skip the next instruction.
    pub fn skip(&mut self) {
        self.advance_pc();
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr & ADDRESS_MASK;
    }

    /// Set VF to 1 or 0.
    pub fn set_flag(&mut self, set: bool) {
        self.v[FLAG] = set as u8;
    }

    /// One timer period: both timers count down, stopping at zero.
    pub fn decay_timers(&mut self) {
        self.dt = self.dt.saturating_sub(1);
        self.st = self.st.saturating_sub(1);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_state() {
        let regs = Registers::new();
        assert_eq!(regs.pc, 0x200);
        assert_eq!(regs.i, 0);
        assert_eq!(regs.v, [0; 16]);
        assert_eq!((regs.dt, regs.st), (0, 0));
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();

        let old = regs.advance_pc();
        assert_eq!(old, 0x200);
        assert_eq!(regs.pc, 0x202);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0xFFE;
        regs.advance_pc();
        assert_eq!(regs.pc, 0x000);
    }

    #[test]
    fn test_jump_masks_address() {
        let mut regs = Registers::new();
        regs.jump(0x1234);
        assert_eq!(regs.pc, 0x234);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut regs = Registers::new();
        regs.dt = 1;
        regs.st = 0;

        regs.decay_timers();
        assert_eq!((regs.dt, regs.st), (0, 0));
        regs.decay_timers();
        assert_eq!((regs.dt, regs.st), (0, 0));
    }
}
