//! Opcode dispatch for the interpreter.
//!
//! The top nibble picks one of sixteen families. Families 0x0, 0x8, 0xE
//! and 0xF need a second look at the low byte or low nibble to pick the
//! operation. The interpreter decodes straight from the bits; the text codec
//! in [`crate::asm::codec`] is only used for trace output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw 16-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opcode(pub u16);

impl Opcode {
    #[inline]
    pub fn family(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Second nibble, usually a register.
    #[inline]
    pub fn x(self) -> usize {
        ((self.0 >> 8) & 0xF) as usize
    }

    /// Third nibble, usually a register.
    #[inline]
    pub fn y(self) -> usize {
        ((self.0 >> 4) & 0xF) as usize
    }

    /// Low nibble.
    #[inline]
    pub fn n(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// Low byte.
    #[inline]
    pub fn kk(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Low 12 bits.
    #[inline]
    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }
}

/// A decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    // ==================== 0x0 ====================
    /// 00E0: clear the framebuffer
    ClearScreen,
    /// 00EE: return from subroutine
    Return,
    /// 0nnn: machine routine call, ignored
    Sys { nnn: u16 },

    // ==================== Flow ====================
    /// 1nnn
    Jump { nnn: u16 },
    /// 2nnn
    Call { nnn: u16 },
    /// 3xkk: skip if Vx == kk
    SkipEqImm { x: usize, kk: u8 },
    /// 4xkk: skip if Vx != kk
    SkipNeImm { x: usize, kk: u8 },
    /// 5xy0: skip if Vx == Vy
    SkipEqReg { x: usize, y: usize },

    // ==================== Immediate ====================
    /// 6xkk
    LoadImm { x: usize, kk: u8 },
    /// 7xkk: wraps, VF untouched
    AddImm { x: usize, kk: u8 },

    // ==================== 0x8 ALU ====================
    /// 8xy0
    Move { x: usize, y: usize },
    /// 8xy1
    Or { x: usize, y: usize },
    /// 8xy2
    And { x: usize, y: usize },
    /// 8xy3
    Xor { x: usize, y: usize },
    /// 8xy4: VF = carry
    AddReg { x: usize, y: usize },
    /// 8xy5: VF = Vx > Vy
    SubReg { x: usize, y: usize },
    /// 8xy6: VF = bit shifted out
    ShiftRight { x: usize, y: usize },
    /// 8xy7: Vx = Vy - Vx, VF = Vy > Vx
    SubReverse { x: usize, y: usize },
    /// 8xyE: VF = bit shifted out
    ShiftLeft { x: usize, y: usize },

    // ==================== Misc ====================
    /// 9xy0: skip if Vx != Vy
    SkipNeReg { x: usize, y: usize },
    /// Annn
    LoadIndex { nnn: u16 },
    /// Bnnn: jump to nnn + V0
    JumpIndexed { nnn: u16 },
    /// Cxkk: random byte masked with kk
    Random { x: usize, kk: u8 },
    /// Dxyn: draw n rows from [I] at (Vx, Vy)
    Draw { x: usize, y: usize, n: u8 },

    // ==================== 0xE keys ====================
    /// Ex9E
    SkipKeyPressed { x: usize },
    /// ExA1
    SkipKeyNotPressed { x: usize },

    // ==================== 0xF timers/memory ====================
    /// Fx07
    LoadDelay { x: usize },
    /// Fx0A: blocks until a key arrives
    WaitKey { x: usize },
    /// Fx15
    SetDelay { x: usize },
    /// Fx18
    SetSound { x: usize },
    /// Fx1E
    AddIndex { x: usize },
    /// Fx29: I = address of glyph Vx
    LoadGlyph { x: usize },
    /// Fx33: BCD of Vx at I, I+1, I+2
    StoreBcd { x: usize },
    /// Fx55: store V0..=Vx at I
    StoreRegs { x: usize },
    /// Fx65: load V0..=Vx from I
    LoadRegs { x: usize },
}

impl Operation {
    /// Decode a word. Fails only for words whose family needs a second
    /// dispatch and whose sub-key is not one of the known ones.
    pub fn decode(raw: u16) -> Result<Operation, DispatchError> {
        let op = Opcode(raw);
        let (x, y) = (op.x(), op.y());

        let operation = match op.family() {
            0x0 => match raw {
                0x00E0 => Operation::ClearScreen,
                0x00EE => Operation::Return,
                _ => Operation::Sys { nnn: op.nnn() },
            },
            0x1 => Operation::Jump { nnn: op.nnn() },
            0x2 => Operation::Call { nnn: op.nnn() },
            0x3 => Operation::SkipEqImm { x, kk: op.kk() },
            0x4 => Operation::SkipNeImm { x, kk: op.kk() },
            0x5 => Operation::SkipEqReg { x, y },
            0x6 => Operation::LoadImm { x, kk: op.kk() },
            0x7 => Operation::AddImm { x, kk: op.kk() },
            0x8 => match op.n() {
                0x0 => Operation::Move { x, y },
                0x1 => Operation::Or { x, y },
                0x2 => Operation::And { x, y },
                0x3 => Operation::Xor { x, y },
                0x4 => Operation::AddReg { x, y },
                0x5 => Operation::SubReg { x, y },
                0x6 => Operation::ShiftRight { x, y },
                0x7 => Operation::SubReverse { x, y },
                0xE => Operation::ShiftLeft { x, y },
                _ => return Err(DispatchError(raw)),
            },
            0x9 => Operation::SkipNeReg { x, y },
            0xA => Operation::LoadIndex { nnn: op.nnn() },
            0xB => Operation::JumpIndexed { nnn: op.nnn() },
            0xC => Operation::Random { x, kk: op.kk() },
            0xD => Operation::Draw { x, y, n: op.n() },
            0xE => match op.kk() {
                0x9E => Operation::SkipKeyPressed { x },
                0xA1 => Operation::SkipKeyNotPressed { x },
                _ => return Err(DispatchError(raw)),
            },
            // 0xF; `family` is a single nibble.
            _ => match op.kk() {
                0x07 => Operation::LoadDelay { x },
                0x0A => Operation::WaitKey { x },
                0x15 => Operation::SetDelay { x },
                0x18 => Operation::SetSound { x },
                0x1E => Operation::AddIndex { x },
                0x29 => Operation::LoadGlyph { x },
                0x33 => Operation::StoreBcd { x },
                0x55 => Operation::StoreRegs { x },
                0x65 => Operation::LoadRegs { x },
                _ => return Err(DispatchError(raw)),
            },
        };

        Ok(operation)
    }
}

/// A word whose family is known but whose sub-operation is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no operation for opcode {0:#06X}")]
pub struct DispatchError(pub u16);
