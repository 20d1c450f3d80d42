//! Splitting source into statements.

use crate::instr::Cond;
use crate::state::Register;

use super::error::{Diagnostic, ErrorKind, Span};
use super::parse_literal;

/// Opcode position of a statement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Op {
    Instr(Mnemonic),
    Orig,
    End,
    Fill,
    Blkw,
    Stringz,
    /// Unrecognized mnemonic, already reported. Occupies one word so later addresses stay put.
    Invalid,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Mnemonic {
    Br(Cond),
    Add,
    And,
    Not,
    Ld,
    Ldi,
    Ldr,
    Lea,
    St,
    Sti,
    Str,
    Jsr,
    Jsrr,
    Jmp,
    Ret,
    Rti,
    Trap,
    /// `GETC`, `HALT` and friends: `TRAP` with a fixed vector
    TrapAlias(u8),
}

impl Op {
    /// Mnemonics and directives are case-sensitive.
    pub fn parse(token: &str) -> Option<Op> {
        let mnemonic = match token {
            ".ORIG" => return Some(Op::Orig),
            ".END" => return Some(Op::End),
            ".FILL" => return Some(Op::Fill),
            ".BLKW" => return Some(Op::Blkw),
            ".STRINGZ" => return Some(Op::Stringz),
            "ADD" => Mnemonic::Add,
            "AND" => Mnemonic::And,
            "NOT" => Mnemonic::Not,
            "LD" => Mnemonic::Ld,
            "LDI" => Mnemonic::Ldi,
            "LDR" => Mnemonic::Ldr,
            "LEA" => Mnemonic::Lea,
            "ST" => Mnemonic::St,
            "STI" => Mnemonic::Sti,
            "STR" => Mnemonic::Str,
            "JSR" => Mnemonic::Jsr,
            "JSRR" => Mnemonic::Jsrr,
            "JMP" => Mnemonic::Jmp,
            "RET" => Mnemonic::Ret,
            "RTI" => Mnemonic::Rti,
            "TRAP" => Mnemonic::Trap,
            "GETC" => Mnemonic::TrapAlias(0x20),
            "OUT" => Mnemonic::TrapAlias(0x21),
            "PUTS" => Mnemonic::TrapAlias(0x22),
            "IN" => Mnemonic::TrapAlias(0x23),
            "PUTSP" => Mnemonic::TrapAlias(0x24),
            "HALT" => Mnemonic::TrapAlias(0x25),
            _ => Mnemonic::Br(Cond::from_suffix(token.strip_prefix("BR")?)?),
        };
        Some(Op::Instr(mnemonic))
    }
}

/// One non-empty source line, split into label, opcode and raw operand text.
#[derive(Clone, Debug)]
pub(crate) struct Stmt<'a> {
    pub span: Span,
    pub label: Option<&'a str>,
    /// `None` for a line holding only a label.
    pub op: Option<Op>,
    pub operands: &'a str,
}

pub(crate) fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && label.parse::<Register>().is_err()
}

/// Everything before the first `;` that is not inside a string literal.
fn strip_comment(line: &str) -> &str {
    let mut in_str = false;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_str => escaped = true,
            '"' => in_str = !in_str,
            ';' if !in_str => return &line[..i],
            _ => (),
        }
    }
    line
}

fn split_token(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    }
}

/// Could `token` only have been meant as an operand?
fn looks_like_operand(token: &str) -> bool {
    let token = token.trim_end_matches(',');
    token.parse::<Register>().is_ok() || parse_literal(token).is_some()
}

/// Non-empty, comment-stripped lines with their positions in `src`.
pub(crate) fn lines(src: &str) -> impl Iterator<Item = (Span, &str)> {
    let mut offset = 0;
    src.split('\n').enumerate().filter_map(move |(i, raw)| {
        let start = offset;
        offset += raw.len() + 1;
        let code = strip_comment(raw.trim_end_matches('\r'));
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lead = code.len() - code.trim_start().len();
        let span = Span {
            line: i + 1,
            range: start + lead..start + lead + trimmed.len(),
        };
        Some((span, trimmed))
    })
}

/// Classify every line of `src`. Unknown mnemonics and bad labels are reported and kept.
pub(crate) fn classify<'a>(src: &'a str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Stmt<'a>> {
    lines(src)
        .map(|(span, text)| {
            let (first, rest) = split_token(text);
            if let Some(op) = Op::parse(first) {
                return Stmt {
                    span,
                    label: None,
                    op: Some(op),
                    operands: rest,
                };
            }

            let (op, operands) = if rest.is_empty() {
                (None, "")
            } else {
                let (second, operands) = split_token(rest);
                match Op::parse(second) {
                    Some(op) => (Some(op), operands),
                    None => {
                        // `ADDD R1, R2, R3` is a typo, not a label
                        if looks_like_operand(second) {
                            diagnostics.push(Diagnostic::error(
                                span.clone(),
                                ErrorKind::UnknownInstruction(first.to_string()),
                            ));
                            return Stmt {
                                span,
                                label: None,
                                op: Some(Op::Invalid),
                                operands: rest,
                            };
                        }
                        diagnostics.push(Diagnostic::error(
                            span.clone(),
                            ErrorKind::UnknownInstruction(second.to_string()),
                        ));
                        (Some(Op::Invalid), operands)
                    }
                }
            };

            let label = first.strip_suffix(':').unwrap_or(first);
            let label = if is_valid_label(label) {
                Some(label)
            } else {
                diagnostics.push(Diagnostic::error(
                    span.clone(),
                    ErrorKind::InvalidLabel(label.to_string()),
                ));
                None
            };
            Stmt {
                span,
                label,
                op,
                operands,
            }
        })
        .collect()
}

/// Comma separated operands, trimmed. Empty text has no operands.
pub(crate) fn split_operands(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(str::trim).collect()
}

/// Contents of a `"..."` literal as words, without the terminator.
///
/// Supports the escapes `\n`, `\t`, `\r`, `\0`, `\\` and `\"`.
pub(crate) fn parse_string(text: &str) -> Option<Vec<u16>> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut words = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        let ch = match ch {
            '\\' => match chars.next()? {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                '\\' => '\\',
                '"' => '"',
                _ => return None,
            },
            '"' => return None,
            ch => ch,
        };
        words.push(u16::try_from(ch as u32).ok()?);
    }
    Some(words)
}
