//! # chip8-kit
//!
//! A CHIP-8 style fantasy microcomputer: a 4 KiB byte-addressed machine with
//! sixteen 8-bit registers, a 64x32 monochrome screen mapped into memory and
//! a sixteen key keypad, plus the tools that share its instruction set.
//!
//! - [`asm::codec`]: the single opcode <-> mnemonic table
//! - [`asm::assemble`]: two-pass assembler with `LABEL:` / `$LABEL`
//! - [`asm::disassemble`]: ROM bytes back to assembler text
//! - [`cpu::Cpu`]: the interpreter, driven through [`host`] collaborators

pub mod asm;
pub mod config;
pub mod cpu;
pub mod host;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use asm::{assemble, disassemble, disassemble_rom, load_rom, save_rom, AssemblerError, RomError};
pub use config::{Config, ConfigError};
pub use cpu::{Cpu, CpuError, CpuState, Memory, Operation, Registers};
pub use host::{Clock, Display, Input, Peripherals, Tracer};

#[cfg(feature = "tui")]
pub use tui::run_tui;
