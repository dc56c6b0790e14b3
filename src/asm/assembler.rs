//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! START:              ; Define a label (address of the next instruction)
//!     LD V0, 0x05
//!     CALL $DRAW      ; Reference a label
//! LOOP: JP $LOOP      ; Label and instruction on one line
//! ```
//!
//! Label references are only recognised as the last operand of `JP`, `CALL`,
//! `SYS` and `LD`. A line that fails to encode is reported and skipped, so
//! everything after it moves up by one instruction.

use crate::asm::codec;
use crate::cpu::memory::PROGRAM_START;
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Prefix marking a label reference.
pub const LABEL_SIGIL: char = '$';

/// Mnemonics whose final operand may be a label reference.
const LABEL_KEYWORDS: [&str; 4] = ["JP", "CALL", "SYS", "LD"];

/// Assemble source text into ROM bytes.
pub fn assemble(source: &str) -> Assembly {
    let Preprocessed { lines, labels, mut diagnostics } = preprocess(source);
    let mut bytes = Vec::with_capacity(lines.len() * 2);

    for line in &lines {
        let encoded = resolve_labels(line, &labels).and_then(|text| {
            codec::encode(&text).map_err(|_| AssemblerError::UnknownInstruction {
                line: line.number,
                text: text.clone(),
            })
        });

        match encoded {
            Ok(opcode) => bytes.extend_from_slice(&opcode.to_be_bytes()),
            Err(err) => {
                warn!("{}", err);
                diagnostics.push(err);
            }
        }
    }

    Assembly { bytes, diagnostics }
}

/// Result of assembling a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    /// Encoded program, two bytes per instruction, high byte first.
    pub bytes: Vec<u8>,
    /// One entry per line that produced no output.
    pub diagnostics: Vec<AssemblerError>,
}

impl Assembly {
    /// True when every line assembled.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The bytes plus every diagnostic, in a form frontends can serialize.
    pub fn report(&self) -> AssemblyReport {
        AssemblyReport {
            bytes: self.bytes.clone(),
            diagnostics: self
                .diagnostics
                .iter()
                .map(|err| Diagnostic { line: err.line(), message: err.to_string() })
                .collect(),
        }
    }
}

/// Serializable view of an [`Assembly`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

/// A cleaned line of code together with its 1-based source line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Output of the first pass.
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    pub lines: Vec<SourceLine>,
    /// Label -> absolute address.
    pub labels: HashMap<String, usize>,
    pub diagnostics: Vec<AssemblerError>,
}

/// Pass 1: clean every line, collect labels and the code lines.
pub fn preprocess(source: &str) -> Preprocessed {
    let mut out = Preprocessed::default();

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let mut text = clean_line(raw);

        if let Some((label, rest)) = split_label(&text) {
            let address = PROGRAM_START as usize + 2 * out.lines.len();
            if out.labels.contains_key(label) {
                let err = AssemblerError::DuplicateLabel { line: number, label: label.to_string() };
                warn!("{}", err);
                out.diagnostics.push(err);
            } else {
                out.labels.insert(label.to_string(), address);
            }
            text = rest.to_string();
        }

        if !text.is_empty() {
            out.lines.push(SourceLine { number, text });
        }
    }

    out
}

/// Strip the comment, collapse whitespace, upper-case, and keep the hex
/// prefix as a lower-case `0x` so it cannot be mistaken for a digit.
pub fn clean_line(raw: &str) -> String {
    let code = raw.split(';').next().unwrap_or("");
    code.split_whitespace()
        .map(normalize_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_token(token: &str) -> String {
    let upper = token.to_uppercase();
    match upper.strip_prefix("0X") {
        Some(digits) => format!("0x{}", digits),
        None => upper,
    }
}

/// Split `NAME: rest` into the label and whatever follows it.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (head, rest) = line.split_once(':')?;
    is_identifier(head).then(|| (head, rest.trim()))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Pass 2 helper: swap a trailing `$LABEL` for its address literal.
fn resolve_labels(line: &SourceLine, labels: &HashMap<String, usize>) -> Result<String, AssemblerError> {
    let tokens: Vec<&str> = line.text.split(' ').collect();

    let keyword = tokens.first().copied().unwrap_or("");
    if !LABEL_KEYWORDS.contains(&keyword) || tokens.len() < 2 {
        return Ok(line.text.clone());
    }

    let label = match tokens.last().and_then(|t| t.strip_prefix(LABEL_SIGIL)) {
        Some(name) if is_identifier(name) => name,
        _ => return Ok(line.text.clone()),
    };

    let address = labels.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
        line: line.number,
        label: label.to_string(),
    })?;

    let head = tokens[..tokens.len() - 1].join(" ");
    Ok(format!("{} 0x{:03X}", head, address))
}

/// Problems reported per source line. None of them stop assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("parse error on line {line}: {text}")]
    UnknownInstruction { line: usize, text: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },
}

impl AssemblerError {
    /// Source line the problem was found on.
    pub fn line(&self) -> usize {
        match self {
            AssemblerError::UnknownInstruction { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::DuplicateLabel { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_referencing_label() {
        let result = assemble("LOOP: JP $LOOP");
        assert!(result.is_clean());
        assert_eq!(result.bytes, vec![0x12, 0x00]);
    }

    #[test]
    fn test_label_on_its_own_line() {
        let source = r#"
            LD V0, 0x00
        LOOP:
            ADD V0, 0x01
            JP $LOOP
        "#;
        let result = assemble(source);
        assert!(result.is_clean());
        assert_eq!(result.bytes, vec![0x60, 0x00, 0x70, 0x01, 0x12, 0x02]);
    }

    #[test]
    fn test_forward_references() {
        let source = r#"
            CALL $SUB
            LD I, $DATA
            JP V0, $SUB
        SUB:
            RET
        DATA:
            SYS $DATA
        "#;
        let result = assemble(source);
        assert!(result.is_clean(), "{:?}", result.diagnostics);
        assert_eq!(
            result.bytes,
            vec![0x22, 0x06, 0xA2, 0x08, 0xB2, 0x06, 0x00, 0xEE, 0x02, 0x08]
        );
    }

    #[test]
    fn test_comments_case_and_spacing() {
        let source = "  ld   v1,0x10 ; ignored\n\n; whole line comment\ncls\nld va, 0Xff";
        let result = assemble(source);
        // `V1,0X10` is one token, so the first line cannot match.
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.bytes, vec![0x00, 0xE0, 0x6A, 0xFF]);
    }

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("  ld   v1,  0x1f   ; comment"), "LD V1, 0x1F");
        assert_eq!(clean_line("; only a comment"), "");
        assert_eq!(clean_line("jp 0X2aB"), "JP 0x2AB");
    }

    #[test]
    fn test_bad_line_is_skipped() {
        let source = "CLS\nBOGUS V0\nRET\nEND: JP $END";
        let result = assemble(source);
        assert_eq!(
            result.diagnostics,
            vec![AssemblerError::UnknownInstruction { line: 2, text: "BOGUS V0".into() }]
        );
        // The label was placed counting the bad line, the output was not.
        assert_eq!(result.bytes, vec![0x00, 0xE0, 0x00, 0xEE, 0x12, 0x06]);
    }

    #[test]
    fn test_report_keeps_bytes_and_every_diagnostic() {
        let result = assemble("CLS\nBOGUS\nJP $NOWHERE\nRET");
        let report = result.report();

        assert_eq!(report.bytes, vec![0x00, 0xE0, 0x00, 0xEE]);
        assert_eq!(
            report.diagnostics,
            vec![
                Diagnostic { line: 2, message: "parse error on line 2: BOGUS".into() },
                Diagnostic { line: 3, message: "undefined label on line 3: NOWHERE".into() },
            ]
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bytes"], serde_json::json!([0, 224, 0, 238]));
        assert_eq!(json["diagnostics"][1]["line"], 3);
    }

    #[test]
    fn test_undefined_label() {
        let result = assemble("JP $NOWHERE\nCLS");
        assert_eq!(
            result.diagnostics,
            vec![AssemblerError::UndefinedLabel { line: 1, label: "NOWHERE".into() }]
        );
        assert_eq!(result.bytes, vec![0x00, 0xE0]);
    }

    #[test]
    fn test_labels_only_for_label_keywords() {
        let result = assemble("TARGET: SE V0, $TARGET");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.bytes.is_empty());
    }

    #[test]
    fn test_duplicate_label_keeps_first() {
        let source = "A: CLS\nA: RET\nJP $A";
        let result = assemble(source);
        assert_eq!(
            result.diagnostics,
            vec![AssemblerError::DuplicateLabel { line: 2, label: "A".into() }]
        );
        assert_eq!(result.bytes, vec![0x00, 0xE0, 0x00, 0xEE, 0x12, 0x00]);
    }

    #[test]
    fn test_preprocess_collects_labels() {
        let pre = preprocess("START:\n  CLS\nNEXT: RET\n\n");
        assert_eq!(pre.labels.get("START"), Some(&0x200));
        assert_eq!(pre.labels.get("NEXT"), Some(&0x202));
        assert_eq!(
            pre.lines,
            vec![
                SourceLine { number: 2, text: "CLS".into() },
                SourceLine { number: 3, text: "RET".into() },
            ]
        );
    }

    #[test]
    fn test_empty_source() {
        let result = assemble("");
        assert!(result.is_clean());
        assert!(result.bytes.is_empty());
    }
}
