//! Disassembler.
//!
//! Converts ROM bytes back to assembly text. Jump and call targets stay as
//! literal addresses; labels are not reconstructed.

use crate::asm::codec;
use crate::cpu::memory::PROGRAM_START;
use log::{debug, warn};
use std::fmt;

/// Every fourth instruction carries its address as a trailing comment.
const ANNOTATE_EVERY: usize = 8;

/// Disassemble a single word for debugger views.
pub fn disassemble_instruction(opcode: u16) -> String {
    codec::decode(opcode).unwrap_or_else(|_| format!("??? ; {:#06X}", opcode))
}

/// Disassemble `bytes` as if loaded at `base`.
///
/// Undecodable words become comment lines; the scan never stops early. A
/// trailing odd byte is not a word and produces no line.
pub fn disassemble(bytes: &[u8], base: u16) -> Disassembly {
    let mut out = Disassembly::default();

    for (offset, pair) in bytes.chunks_exact(2).enumerate().map(|(i, p)| (i * 2, p)) {
        let opcode = u16::from_be_bytes([pair[0], pair[1]]);
        let address = base as usize + offset;

        match codec::decode(opcode) {
            Ok(mnemonic) if offset % ANNOTATE_EVERY == 0 => {
                out.lines.push(format!("{} ; {:#x}", mnemonic, address));
            }
            Ok(mnemonic) => out.lines.push(mnemonic),
            Err(_) => {
                warn!("invalid instruction {:#x} at {:#x}", opcode, address);
                out.lines.push(format!(";{:#x}: invalid instruction (@{:#x})", opcode, address));
                out.invalid.push(InvalidWord { address, opcode });
            }
        }
    }

    if bytes.len() % 2 == 1 {
        debug!("ignoring trailing byte {:#04x}", bytes[bytes.len() - 1]);
    }

    out
}

/// Disassemble with the default load address.
pub fn disassemble_rom(bytes: &[u8]) -> Disassembly {
    disassemble(bytes, PROGRAM_START)
}

/// A word the codec could not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidWord {
    pub address: usize,
    pub opcode: u16,
}

/// Disassembled listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disassembly {
    pub lines: Vec<String>,
    pub invalid: Vec<InvalidWord>,
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_comment_every_fourth_line() {
        let rom = [
            0x00, 0xE0, 0x60, 0x01, 0x61, 0x02, 0x80, 0x14, 0x12, 0x00, 0x00, 0xEE,
        ];
        let listing = disassemble(&rom, 0x200);
        assert_eq!(
            listing.lines,
            vec![
                "CLS ; 0x200",
                "LD V0, 0x01",
                "LD V1, 0x02",
                "ADD V0, V1",
                "JP 0x200 ; 0x208",
                "RET",
            ]
        );
        assert!(listing.invalid.is_empty());
    }

    #[test]
    fn test_invalid_word_does_not_stop_the_scan() {
        let rom = [0x51, 0x21, 0x00, 0xE0, 0xF0, 0xFF];
        let listing = disassemble(&rom, 0x200);
        assert_eq!(
            listing.lines,
            vec![
                ";0x5121: invalid instruction (@0x200)",
                "CLS",
                ";0xf0ff: invalid instruction (@0x204)",
            ]
        );
        assert_eq!(
            listing.invalid,
            vec![
                InvalidWord { address: 0x200, opcode: 0x5121 },
                InvalidWord { address: 0x204, opcode: 0xF0FF },
            ]
        );
    }

    #[test]
    fn test_custom_base_and_odd_length() {
        let listing = disassemble(&[0x00, 0xEE, 0x12], 0x600);
        assert_eq!(listing.lines, vec!["RET ; 0x600"]);
        assert_eq!(listing.to_string(), "RET ; 0x600\n");
    }

    #[test]
    fn test_any_image_length() {
        let empty = disassemble(&[], 0x200);
        assert!(empty.lines.is_empty());
        assert_eq!(empty.to_string(), "");

        // A full memory image is larger than any loadable ROM.
        let full = disassemble(&[0u8; 4096], 0);
        assert_eq!(full.lines.len(), 2048);
        assert!(full.invalid.is_empty());
        assert_eq!(full.lines[0], "SYS 0x000 ; 0x0");
        assert_eq!(full.lines[2044], "SYS 0x000 ; 0xff8");
    }

    #[test]
    fn test_disassemble_instruction() {
        assert_eq!(disassemble_instruction(0xD125), "DRW V1, V2, 0x5");
        assert_eq!(disassemble_instruction(0xFFFF), "??? ; 0xFFFF");
    }
}
