//! Assembler and disassembler.
//!
//! This module provides:
//! - The instruction codec shared by every tool (opcode <-> mnemonic)
//! - A two-pass assembler (text -> ROM bytes)
//! - A disassembler (ROM bytes -> text)
//! - Raw ROM loading and saving

pub mod assembler;
pub mod codec;
pub mod disasm;
pub mod rom;

pub use assembler::{assemble, Assembly, AssemblerError, AssemblyReport, Diagnostic};
pub use codec::{decode, encode, CodecError};
pub use disasm::{disassemble, disassemble_rom, Disassembly};
pub use rom::{load_rom, read_image, save_rom, RomError};
