//! Instruction codec shared by the assembler, the disassembler and the
//! interpreter's trace output.
//!
//! Every instruction is described once, as an opcode pattern paired with a
//! mnemonic template. Patterns are written nibble by nibble, high to low:
//! hex digits are fixed nibbles and the letters `x`, `y`, `n` and `k` are
//! fields. Repeating a letter widens the field, so `kk` is a byte and `nnn`
//! a twelve bit address. Templates name the same fields in braces with the
//! same width:
//!
//! ```text
//! 3xkk  <->  SE V{x}, 0x{kk}
//! ```

use std::fmt::Write;
use std::sync::OnceLock;
use thiserror::Error;

/// The instruction set. Overlapping patterns (`00E0` inside `0nnn`, the one
/// operand shifts inside their two operand forms) are resolved by
/// specificity when decoding.
const INSTRUCTION_SET: &[(&str, &str)] = &[
    ("00E0", "CLS"),
    ("00EE", "RET"),
    ("0nnn", "SYS 0x{nnn}"),
    ("1nnn", "JP 0x{nnn}"),
    ("2nnn", "CALL 0x{nnn}"),
    ("3xkk", "SE V{x}, 0x{kk}"),
    ("4xkk", "SNE V{x}, 0x{kk}"),
    ("5xy0", "SE V{x}, V{y}"),
    ("6xkk", "LD V{x}, 0x{kk}"),
    ("7xkk", "ADD V{x}, 0x{kk}"),
    ("8xy0", "LD V{x}, V{y}"),
    ("8xy1", "OR V{x}, V{y}"),
    ("8xy2", "AND V{x}, V{y}"),
    ("8xy3", "XOR V{x}, V{y}"),
    ("8xy4", "ADD V{x}, V{y}"),
    ("8xy5", "SUB V{x}, V{y}"),
    ("8x06", "SHR V{x}"),
    ("8xy6", "SHR V{x}, V{y}"),
    ("8xy7", "SUBN V{x}, V{y}"),
    ("8x0E", "SHL V{x}"),
    ("8xyE", "SHL V{x}, V{y}"),
    ("9xy0", "SNE V{x}, V{y}"),
    ("Annn", "LD I, 0x{nnn}"),
    ("Bnnn", "JP V0, 0x{nnn}"),
    ("Cxkk", "RND V{x}, 0x{kk}"),
    ("Dxyn", "DRW V{x}, V{y}, 0x{n}"),
    ("Ex9E", "SKP V{x}"),
    ("ExA1", "SKNP V{x}"),
    ("Fx07", "LD V{x}, DT"),
    ("Fx0A", "LD V{x}, K"),
    ("Fx15", "LD DT, V{x}"),
    ("Fx18", "LD ST, V{x}"),
    ("Fx1E", "ADD I, V{x}"),
    ("Fx29", "LD F, V{x}"),
    ("Fx33", "LD B, V{x}"),
    ("Fx55", "LD [I], V{x}"),
    ("Fx65", "LD V{x}, [I]"),
];

/// A named run of nibbles inside an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: char,
    /// Bit position of the lowest nibble.
    pub shift: u32,
    /// Width in nibbles.
    pub width: u32,
}

impl Field {
    fn extract(&self, opcode: u16) -> u16 {
        let mask = (1u32 << (4 * self.width)) - 1;
        ((opcode as u32 >> self.shift) & mask) as u16
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field { name: char, width: usize },
}

/// One compiled entry of the instruction table.
#[derive(Debug, Clone)]
pub struct InstructionDef {
    pattern: &'static str,
    bits: u16,
    mask: u16,
    fields: Vec<Field>,
    tokens: Vec<Vec<Segment>>,
}

impl InstructionDef {
    fn compile(pattern: &'static str, template: &'static str) -> Self {
        let mut bits = 0u16;
        let mut mask = 0u16;
        let mut fields: Vec<Field> = Vec::new();

        for (index, c) in pattern.chars().enumerate() {
            let shift = 4 * (3 - index as u32);
            match c.to_digit(16) {
                Some(digit) => {
                    bits |= (digit as u16) << shift;
                    mask |= 0xF << shift;
                }
                None => match fields.last_mut() {
                    Some(field) if field.name == c => {
                        field.width += 1;
                        field.shift = shift;
                    }
                    _ => fields.push(Field { name: c, shift, width: 1 }),
                },
            }
        }

        let tokens = template.split_whitespace().map(parse_token).collect();

        Self { pattern, bits, mask, fields, tokens }
    }

    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field names referenced by the mnemonic template, in order.
    pub fn template_fields(&self) -> Vec<(char, usize)> {
        self.tokens
            .iter()
            .flatten()
            .filter_map(|segment| match segment {
                Segment::Field { name, width } => Some((*name, *width)),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Number of fixed nibbles; higher means more specific.
    pub fn specificity(&self) -> u32 {
        self.mask.count_ones() / 4
    }

    pub fn matches(&self, opcode: u16) -> bool {
        opcode & self.mask == self.bits
    }

    fn field(&self, name: char) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn format(&self, opcode: u16) -> String {
        let mut out = String::new();
        for (index, segments) in self.tokens.iter().enumerate() {
            if index > 0 {
                out.push(' ');
            }
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Field { name, width } => {
                        let value = self.field(*name).map_or(0, |f| f.extract(opcode));
                        let _ = write!(out, "{:0width$X}", value, width = *width);
                    }
                }
            }
        }
        out
    }

    /// Match whitespace separated tokens against the template and build the
    /// opcode, or `None` when any fixed token or field fails to line up.
    fn assemble(&self, tokens: &[&str]) -> Option<u16> {
        if tokens.len() != self.tokens.len() {
            return None;
        }

        let mut opcode = self.bits;
        for (segments, token) in self.tokens.iter().zip(tokens) {
            let mut rest = *token;
            for segment in segments {
                match segment {
                    Segment::Text(text) => rest = rest.strip_prefix(text.as_str())?,
                    Segment::Field { name, width } => {
                        let digits = rest.get(..*width)?;
                        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                            return None;
                        }
                        let value = u16::from_str_radix(digits, 16).ok()?;
                        opcode |= value << self.field(*name)?.shift;
                        rest = &rest[*width..];
                    }
                }
            }
            if !rest.is_empty() {
                return None;
            }
        }
        Some(opcode)
    }
}

fn parse_token(token: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        if c != '{' {
            text.push(c);
            continue;
        }
        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
        if let Some(first) = name.chars().next() {
            segments.push(Segment::Field { name: first, width: name.len() });
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// The compiled instruction table.
pub fn instruction_table() -> &'static [InstructionDef] {
    static TABLE: OnceLock<Vec<InstructionDef>> = OnceLock::new();
    TABLE.get_or_init(|| {
        INSTRUCTION_SET
            .iter()
            .map(|&(pattern, template)| InstructionDef::compile(pattern, template))
            .collect()
    })
}

/// Find the most specific definition whose fixed nibbles agree with `opcode`.
pub fn lookup_opcode(opcode: u16) -> Option<&'static InstructionDef> {
    instruction_table()
        .iter()
        .filter(|def| def.matches(opcode))
        .max_by_key(|def| def.specificity())
}

/// Decode a machine word to its mnemonic, e.g. `0x6A1F` -> `LD VA, 0x1F`.
pub fn decode(opcode: u16) -> Result<String, CodecError> {
    lookup_opcode(opcode)
        .map(|def| def.format(opcode))
        .ok_or(CodecError::UnknownOpcode(opcode))
}

/// Encode a cleaned mnemonic line, e.g. `LD VA, 0x1F` -> `0x6A1F`.
///
/// The line must already be upper-cased with a lower-case `0x` prefix, the
/// way the assembler's preprocessing leaves it.
pub fn encode(line: &str) -> Result<u16, CodecError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    instruction_table()
        .iter()
        .find_map(|def| def.assemble(&tokens))
        .ok_or_else(|| CodecError::UnknownMnemonic(tokens.join(" ")))
}

/// Errors raised when no table entry matches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("no instruction matches opcode {0:#06X}")]
    UnknownOpcode(u16),

    #[error("no instruction matches `{0}`")]
    UnknownMnemonic(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// One representative assignment per definition.
    const CASES: &[(&str, u16)] = &[
        ("CLS", 0x00E0),
        ("RET", 0x00EE),
        ("SYS 0x123", 0x0123),
        ("JP 0x2A4", 0x12A4),
        ("CALL 0x3F0", 0x23F0),
        ("SE V3, 0x1F", 0x331F),
        ("SNE VA, 0x00", 0x4A00),
        ("SE V1, V2", 0x5120),
        ("LD V5, 0xFF", 0x65FF),
        ("ADD VE, 0x01", 0x7E01),
        ("LD V0, V1", 0x8010),
        ("OR V2, V3", 0x8231),
        ("AND V4, V5", 0x8452),
        ("XOR V6, V7", 0x8673),
        ("ADD V8, V9", 0x8894),
        ("SUB VA, VB", 0x8AB5),
        ("SHR VC", 0x8C06),
        ("SHR VC, VD", 0x8CD6),
        ("SUBN VE, VF", 0x8EF7),
        ("SHL V1", 0x810E),
        ("SHL V1, V2", 0x812E),
        ("SNE V3, V4", 0x9340),
        ("LD I, 0x2F0", 0xA2F0),
        ("JP V0, 0x300", 0xB300),
        ("RND V7, 0x0F", 0xC70F),
        ("DRW V1, V2, 0x5", 0xD125),
        ("SKP V4", 0xE49E),
        ("SKNP V4", 0xE4A1),
        ("LD V2, DT", 0xF207),
        ("LD V2, K", 0xF20A),
        ("LD DT, V3", 0xF315),
        ("LD ST, V3", 0xF318),
        ("ADD I, V9", 0xF91E),
        ("LD F, VA", 0xFA29),
        ("LD B, VB", 0xFB33),
        ("LD [I], VC", 0xFC55),
        ("LD VC, [I]", 0xFC65),
    ];

    #[test]
    fn test_every_definition_has_a_case() {
        assert_eq!(CASES.len(), instruction_table().len());
        for def in instruction_table() {
            assert!(
                CASES.iter().any(|&(_, opcode)| std::ptr::eq(lookup_opcode(opcode).unwrap(), def)),
                "no case for {}",
                def.pattern()
            );
        }
    }

    #[test]
    fn test_encode_cases() {
        for &(line, opcode) in CASES {
            assert_eq!(encode(line), Ok(opcode), "encoding {}", line);
        }
    }

    #[test]
    fn test_decode_cases() {
        for &(line, opcode) in CASES {
            assert_eq!(decode(opcode).as_deref(), Ok(line), "decoding {:#06X}", opcode);
        }
    }

    #[test]
    fn test_roundtrip_laws() {
        for &(line, opcode) in CASES {
            assert_eq!(decode(encode(line).unwrap()).unwrap(), line);
            assert_eq!(encode(&decode(opcode).unwrap()).unwrap(), opcode);
        }
    }

    #[test]
    fn test_template_fields_match_pattern() {
        for def in instruction_table() {
            let mut from_pattern: Vec<(char, usize)> = def
                .fields()
                .iter()
                .map(|f| (f.name, f.width as usize))
                .collect();
            let mut from_template = def.template_fields();
            from_pattern.sort();
            from_template.sort();
            assert_eq!(from_pattern, from_template, "{}", def.pattern());
        }
    }

    #[test]
    fn test_most_specific_definition_is_unique() {
        for opcode in 0..=u16::MAX {
            let matching: Vec<_> = instruction_table().iter().filter(|d| d.matches(opcode)).collect();
            if let Some(best) = matching.iter().map(|d| d.specificity()).max() {
                let ties = matching.iter().filter(|d| d.specificity() == best).count();
                assert_eq!(ties, 1, "ambiguous opcode {:#06X}", opcode);
            }
        }
    }

    #[test]
    fn test_overlaps_prefer_specific_form() {
        assert_eq!(decode(0x00E0).unwrap(), "CLS");
        assert_eq!(decode(0x00EE).unwrap(), "RET");
        assert_eq!(decode(0x00E1).unwrap(), "SYS 0x0E1");
        assert_eq!(decode(0x8A06).unwrap(), "SHR VA");
        assert_eq!(decode(0x8A0E).unwrap(), "SHL VA");
        assert_eq!(encode("SHR VA, V0"), Ok(0x8A06));
    }

    #[test]
    fn test_shadowed_forms_decode_to_the_specific_line() {
        for (line, opcode, canonical) in [
            ("SHR VA, V0", 0x8A06, "SHR VA"),
            ("SHL VA, V0", 0x8A0E, "SHL VA"),
            ("SYS 0x0E0", 0x00E0, "CLS"),
            ("SYS 0x0EE", 0x00EE, "RET"),
        ] {
            assert_eq!(encode(line), Ok(opcode), "{}", line);
            assert_eq!(decode(encode(line).unwrap()).unwrap(), canonical);
            // The canonical line still encodes to the same word.
            assert_eq!(encode(canonical), Ok(opcode));
        }
        // Any other Vy keeps the two-operand form.
        assert_eq!(decode(encode("SHR VA, V1").unwrap()).unwrap(), "SHR VA, V1");
    }

    #[test]
    fn test_decode_unknown() {
        for opcode in [0x5121, 0x8008, 0x800F, 0x9001, 0xE000, 0xE09F, 0xF000, 0xF0FF] {
            assert_eq!(decode(opcode), Err(CodecError::UnknownOpcode(opcode)));
        }
    }

    #[test]
    fn test_encode_requires_exact_shape() {
        // Token count must match.
        assert!(encode("CLS V0").is_err());
        assert!(encode("DRW V1, V2").is_err());
        // Field widths are exact.
        assert!(encode("LD V1, 0x5").is_err());
        assert!(encode("JP 0x20").is_err());
        assert!(encode("JP 0x2000").is_err());
        // Fields are hex digits.
        assert!(encode("LD VG, 0x10").is_err());
        // Separators are part of the fixed text.
        assert!(encode("LD V1 0x10").is_err());
        assert!(encode("NOP").is_err());
        assert!(encode("").is_err());
    }

    #[test]
    fn test_encode_ignores_spacing() {
        assert_eq!(encode("  LD   V1,   0x10 "), Ok(0x6110));
    }

    proptest! {
        #[test]
        fn prop_encode_inverts_decode(opcode in any::<u16>()) {
            if let Ok(line) = decode(opcode) {
                prop_assert_eq!(encode(&line), Ok(opcode));
            }
        }

        #[test]
        fn prop_register_fields_roundtrip(x in 0u8..16, y in 0u8..16) {
            let line = format!("SHL V{:X}, V{:X}", x, y);
            let opcode = encode(&line).unwrap();
            prop_assert_eq!(opcode, 0x800E | (x as u16) << 8 | (y as u16) << 4);
            // Vy = V0 lands on the one-operand form.
            let expected = if y == 0 { format!("SHL V{:X}", x) } else { line };
            prop_assert_eq!(decode(opcode).unwrap(), expected);
        }
    }
}
