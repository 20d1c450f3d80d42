//! Two-pass assembler.
//!
//! The first pass classifies lines and assigns an address to every statement, building the
//! symbol table. The second pass encodes each statement. Diagnostics are collected rather than
//! returned early, so one run reports every problem it can; only structural problems, after
//! which addresses are meaningless, stop the assembler.

mod encode;
mod error;
mod line;
mod symbol;

pub use error::{Diagnostic, ErrorKind, Severity, Span};
pub use symbol::{Symbol, SymbolTable};

use crate::image::Image;
use crate::state::DEVICE_SPACE;

use line::{parse_string, split_operands, Op, Stmt};

/// Result of assembling one source file.
#[derive(Debug)]
pub struct Assembly {
    /// Only present when no errors were found.
    pub image: Option<Image>,
    /// Ordered by line.
    pub diagnostics: Vec<Diagnostic>,
    pub symbols: SymbolTable,
}

impl Assembly {
    pub fn is_ok(&self) -> bool {
        self.image.is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| !diag.is_error())
    }
}

/// Statement with its address and footprint in words.
#[derive(Debug)]
pub(crate) struct Placed<'a> {
    stmt: &'a Stmt<'a>,
    address: u16,
    size: u32,
}

/// Value of a numeric literal: `xBEEF`, `#-12` or `12`.
///
/// Accepts anything in `-32768..=65535`, so both signed and unsigned spellings of a word work.
pub(crate) fn literal_value(token: &str) -> Option<i32> {
    let (digits, radix) = if let Some(hex) = token
        .strip_prefix('x')
        .or_else(|| token.strip_prefix('X'))
        .or_else(|| token.strip_prefix("0x"))
    {
        (hex, 16)
    } else {
        (token.strip_prefix('#').unwrap_or(token), 10)
    };
    let (negative, digits) = match digits.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, digits.strip_prefix('+').unwrap_or(digits)),
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    let magnitude = i32::from_str_radix(digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    (-0x8000..=0xFFFF).contains(&value).then_some(value)
}

/// Parse a numeric literal as a word. Negative values are stored in two's complement.
pub fn parse_literal(token: &str) -> Option<u16> {
    literal_value(token).map(|value| value as u16)
}

/// Words occupied by a statement. Only fails for structural problems.
fn footprint(stmt: &Stmt, diagnostics: &mut Vec<Diagnostic>) -> Result<u32, Diagnostic> {
    let Some(op) = stmt.op else {
        return Ok(0);
    };
    let size = match op {
        Op::Orig | Op::End => 0,
        Op::Instr(_) | Op::Fill | Op::Invalid => 1,
        Op::Blkw => {
            let operands = split_operands(stmt.operands);
            let count = match operands.as_slice() {
                [token] => match literal_value(token) {
                    Some(value) if value >= 0 => Ok(value as u32),
                    Some(value) => Err(ErrorKind::Overflow { value, bits: 16 }),
                    None => Err(ErrorKind::BadLiteral(token.to_string())),
                },
                _ => Err(ErrorKind::OperandCount {
                    expected: 1,
                    found: operands.len(),
                }),
            };
            match count {
                Ok(count) => count,
                Err(kind) => {
                    diagnostics.push(Diagnostic::error(stmt.span.clone(), kind));
                    0
                }
            }
        }
        Op::Stringz => match parse_string(stmt.operands) {
            Some(chars) => chars.len() as u32 + 1,
            None => {
                return Err(Diagnostic::error(
                    stmt.span.clone(),
                    ErrorKind::MalformedString(stmt.operands.to_string()),
                ))
            }
        },
    };
    Ok(size)
}

/// Origin of the program, and every statement from `.ORIG` to `.END` with its address.
fn layout<'a>(
    stmts: &'a [Stmt<'a>],
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(u16, Vec<Placed<'a>>), Diagnostic> {
    let missing_orig = |span: Span| Diagnostic::error(span, ErrorKind::MissingOrig);
    let Some(first) = stmts.first() else {
        return Err(missing_orig(Span { line: 1, range: 0..0 }));
    };
    if first.op != Some(Op::Orig) {
        return Err(missing_orig(first.span.clone()));
    }
    let origin = match split_operands(first.operands).as_slice() {
        [token] => {
            parse_literal(token).ok_or_else(|| {
                Diagnostic::error(first.span.clone(), ErrorKind::BadLiteral(token.to_string()))
            })?
        }
        operands => {
            return Err(Diagnostic::error(
                first.span.clone(),
                ErrorKind::OperandCount {
                    expected: 1,
                    found: operands.len(),
                },
            ))
        }
    };

    let mut placed = vec![Placed {
        stmt: first,
        address: origin,
        size: 0,
    }];
    let mut address = origin as u32;
    let mut reported_overflow = false;
    for (i, stmt) in stmts.iter().enumerate().skip(1) {
        match stmt.op {
            Some(Op::Orig) => {
                return Err(Diagnostic::error(stmt.span.clone(), ErrorKind::RepeatedOrig))
            }
            Some(Op::End) => {
                placed.push(Placed {
                    stmt,
                    address: address as u16,
                    size: 0,
                });
                if let Some(next) = stmts.get(i + 1) {
                    diagnostics.push(Diagnostic::warning(
                        next.span.clone(),
                        ErrorKind::IgnoredAfterEnd,
                    ));
                }
                return Ok((origin, placed));
            }
            _ => (),
        }

        let size = footprint(stmt, diagnostics)?;
        if address + size > DEVICE_SPACE as u32 && !reported_overflow {
            reported_overflow = true;
            diagnostics.push(Diagnostic::error(
                stmt.span.clone(),
                ErrorKind::OutOfMemory {
                    address: address.max(DEVICE_SPACE as u32),
                },
            ));
        }
        placed.push(Placed {
            stmt,
            address: address as u16,
            size,
        });
        address += size;
    }

    let last = stmts.last().unwrap_or(first);
    Err(Diagnostic::error(last.span.clone(), ErrorKind::MissingEnd))
}

fn build_symbols(program: &[Placed]) -> Result<SymbolTable, Diagnostic> {
    let mut symbols = SymbolTable::default();
    for placed in program {
        let Some(label) = placed.stmt.label else {
            continue;
        };
        let line = placed.stmt.span.line;
        symbols
            .define(label, placed.address, line)
            .map_err(|first_line| {
                Diagnostic::error(
                    placed.stmt.span.clone(),
                    ErrorKind::DuplicateLabel {
                        label: label.to_string(),
                        first_line,
                    },
                )
            })?;
    }
    Ok(symbols)
}

/// Assemble `src` into an image.
pub fn assemble(src: &str) -> Assembly {
    let mut diagnostics = Vec::new();
    let stmts = line::classify(src, &mut diagnostics);

    let passes = layout(&stmts, &mut diagnostics).and_then(|(origin, program)| {
        let symbols = build_symbols(&program)?;
        Ok((origin, program, symbols))
    });

    let (image, symbols) = match passes {
        Ok((origin, program, symbols)) => {
            let words = encode::encode(&program, &symbols, &mut diagnostics);
            let image = diagnostics
                .iter()
                .all(|diag| !diag.is_error())
                .then(|| Image::new(origin, words));
            (image, symbols)
        }
        Err(structural) => {
            diagnostics.push(structural);
            (None, SymbolTable::default())
        }
    };

    diagnostics.sort_by_key(|diag| diag.span.line);
    Assembly {
        image,
        diagnostics,
        symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(src: &str) -> Vec<u16> {
        let assembly = assemble(src);
        for diag in &assembly.diagnostics {
            eprintln!("{diag}");
        }
        assembly.image.expect("assembly failed").words
    }

    fn error_kinds(src: &str) -> Vec<ErrorKind> {
        let assembly = assemble(src);
        assert!(assembly.image.is_none());
        assembly.errors().map(|diag| diag.kind.clone()).collect()
    }

    #[test]
    fn minimal_program() {
        let assembly = assemble(".ORIG x3000\nADD R0, R0, #1\n.END\n");
        let image = assembly.image.unwrap();
        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![0x1021]);
        assert_eq!(
            image.to_text(),
            "0011000000000000\n0001000000100001\n"
        );
        assert!(assembly.diagnostics.is_empty());
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal("x3000"), Some(0x3000));
        assert_eq!(parse_literal("xffff"), Some(0xFFFF));
        assert_eq!(parse_literal("#-1"), Some(0xFFFF));
        assert_eq!(parse_literal("-32768"), Some(0x8000));
        assert_eq!(parse_literal("65535"), Some(0xFFFF));
        assert_eq!(parse_literal("65536"), None);
        assert_eq!(parse_literal("#-32769"), None);
        assert_eq!(parse_literal("x"), None);
        assert_eq!(parse_literal("#1a"), None);
        assert_eq!(parse_literal("LOOP"), None);
    }

    #[test]
    fn labels_resolve_relative_to_next_instruction() {
        let src = "
            .ORIG x3000
            LOOP ADD R1, R1, #-1
                 BRp LOOP
                 LD R2, DATA
                 JSR SUB
            SUB  RET
            DATA .FILL LOOP
            .END";
        assert_eq!(
            words(src),
            vec![
                0x127F, // ADD R1, R1, #-1
                0x03FE, // BRp #-2
                0x2402, // LD R2, #2
                0x4800, // JSR #0
                0xC1C0, // RET
                0x3000, // .FILL x3000
            ]
        );
    }

    #[test]
    fn every_opcode() {
        let src = "
            .ORIG x3000
            BR #0
            BRn #-1
            ADD R1, R2, R3
            AND R4, R5, #15
            NOT R6, R7
            LDI R0, #-256
            STI R1, #255
            LDR R2, R3, #-32
            STR R4, R5, #31
            LEA R6, #1
            ST R7, #0
            JSRR R4
            JMP R3
            JMP R7
            RTI
            TRAP x23
            GETC
            HALT
            .END";
        assert_eq!(
            words(src),
            vec![
                0x0E00, 0x09FF, 0x1283, 0x596F, 0x9DFF, 0xA100, 0xB2FF, 0x64E0, 0x795F, 0xEC01,
                0x3E00, 0x4100, 0xC0C0, 0xC1C0, 0x8000, 0xF023, 0xF020, 0xF025,
            ]
        );
    }

    #[test]
    fn directives() {
        let src = "
            .ORIG x4000
            A .BLKW 2
            B .STRINGZ \"Hi\"
            C .FILL #-2
            .END";
        let assembly = assemble(src);
        assert_eq!(
            assembly.image.unwrap().words,
            vec![0, 0, 0x48, 0x69, 0, 0xFFFE]
        );
        assert_eq!(assembly.symbols.get("A"), Some(0x4000));
        assert_eq!(assembly.symbols.get("B"), Some(0x4002));
        assert_eq!(assembly.symbols.get("C"), Some(0x4005));
    }

    #[test]
    fn label_only_line_has_no_footprint() {
        let assembly = assemble(".ORIG x3000\nFIRST\nSECOND ADD R0, R0, R0\n.END");
        assert_eq!(assembly.symbols.get("FIRST"), Some(0x3000));
        assert_eq!(assembly.symbols.get("SECOND"), Some(0x3000));
        assert_eq!(assembly.image.unwrap().words, vec![0x1000]);
    }

    #[test]
    fn field_overflow() {
        let src = "
            .ORIG x3000
            ADD R0, R0, #16
            ADD R0, R0, #-16
            LDR R0, R1, #32
            LD R0, #256
            BR #-257
            TRAP x100
            .END";
        let assembly = assemble(src);
        assert!(assembly.image.is_none());
        let errors: Vec<_> = assembly
            .errors()
            .map(|diag| (diag.span.line, diag.kind.clone()))
            .collect();
        assert_eq!(
            errors,
            vec![
                (3, ErrorKind::Overflow { value: 16, bits: 5 }),
                (5, ErrorKind::Overflow { value: 32, bits: 6 }),
                (6, ErrorKind::Overflow { value: 256, bits: 9 }),
                (7, ErrorKind::Overflow { value: -257, bits: 9 }),
                (8, ErrorKind::Overflow { value: 256, bits: 8 }),
            ]
        );
    }

    #[test]
    fn label_out_of_reach() {
        let src = ".ORIG x3000\nBR FAR\n.BLKW 300\nFAR HALT\n.END";
        assert_eq!(
            error_kinds(src),
            vec![ErrorKind::Overflow { value: 300, bits: 9 }]
        );
    }

    #[test]
    fn errors_accumulate() {
        let src = "
            .ORIG x3000
            ADD R0, R8, #1
            LD R0, NOWHERE
            ADD R0, R0
            AND R0, R0, #1z
            .END";
        assert_eq!(
            error_kinds(src),
            vec![
                ErrorKind::BadRegister("R8".into()),
                ErrorKind::UnknownLabel("NOWHERE".into()),
                ErrorKind::OperandCount { expected: 3, found: 2 },
                ErrorKind::BadLiteral("#1z".into()),
            ]
        );
    }

    #[test]
    fn structural_errors_abort() {
        assert_eq!(error_kinds(""), vec![ErrorKind::MissingOrig]);
        assert_eq!(
            error_kinds("ADD R0, R0, #1\n.END"),
            vec![ErrorKind::MissingOrig]
        );
        assert_eq!(
            error_kinds(".ORIG x3000\nADD R0, R0, #1"),
            vec![ErrorKind::MissingEnd]
        );
        assert_eq!(
            error_kinds(".ORIG x3000\n.ORIG x4000\n.END"),
            vec![ErrorKind::RepeatedOrig]
        );
        assert_eq!(
            error_kinds(".ORIG x3000\nA HALT\nA HALT\nB LD R0, NOWHERE\n.END"),
            vec![ErrorKind::DuplicateLabel {
                label: "A".into(),
                first_line: 2
            }]
        );
        assert_eq!(
            error_kinds(".ORIG x3000\n.STRINGZ hello\n.END"),
            vec![ErrorKind::MalformedString("hello".into())]
        );
    }

    #[test]
    fn code_after_end_warns() {
        let assembly = assemble(".ORIG x3000\nHALT\n.END\nHALT\n");
        let warnings: Vec<_> = assembly.warnings().collect();
        assert_eq!(assembly.image.as_ref().unwrap().words, vec![0xF025]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].span.line, 4);
        assert_eq!(warnings[0].kind, ErrorKind::IgnoredAfterEnd);
    }

    #[test]
    fn program_must_fit_below_devices() {
        let kinds = error_kinds(".ORIG xFDFF\nHALT\nHALT\n.END");
        assert_eq!(kinds, vec![ErrorKind::OutOfMemory { address: 0xFE00 }]);
    }

    #[test]
    fn diagnostic_reports_render() {
        let src = ".ORIG x3000\nADD R0, R0, #99\n.END";
        let assembly = assemble(src);
        let diag = &assembly.diagnostics[0];
        assert_eq!(diag.span.line, 2);
        assert_eq!(&src[diag.span.range.clone()], "ADD R0, R0, #99");
        assert_eq!(
            diag.to_string(),
            "Error at line 2: Cannot represent 99 in a 5-bit field"
        );
        let report = diag.report(src);
        assert_eq!(report.to_string(), "Cannot represent 99 in a 5-bit field");
    }
}
