//! Second pass: operands to machine words.

use crate::bits::{check_number, check_unsigned};
use crate::instr::{Instr, Operand};
use crate::state::Register;

use super::error::{Diagnostic, ErrorKind};
use super::line::{is_valid_label, parse_string, split_operands, Mnemonic, Op};
use super::symbol::SymbolTable;
use super::{literal_value, Placed};

type Result<T> = std::result::Result<T, ErrorKind>;

/// Resolves operands of the statement at `address`.
struct Operands<'a> {
    items: Vec<&'a str>,
    address: u16,
    symbols: &'a SymbolTable,
}

impl<'a> Operands<'a> {
    fn expect(&self, count: usize) -> Result<()> {
        if self.items.len() == count {
            Ok(())
        } else {
            Err(ErrorKind::OperandCount {
                expected: count,
                found: self.items.len(),
            })
        }
    }

    fn reg(&self, i: usize) -> Result<Register> {
        let token = self.items[i];
        token
            .parse()
            .map_err(|()| ErrorKind::BadRegister(token.to_string()))
    }

    fn literal(&self, i: usize) -> Result<(i32, u16)> {
        let token = self.items[i];
        let value = literal_value(token).ok_or_else(|| {
            if token.starts_with('R') {
                ErrorKind::BadRegister(token.to_string())
            } else {
                ErrorKind::BadLiteral(token.to_string())
            }
        })?;
        Ok((value, value as u16))
    }

    fn signed(&self, i: usize, bits: u32) -> Result<u16> {
        let (value, word) = self.literal(i)?;
        if check_number(word, bits) {
            Ok(word)
        } else {
            Err(ErrorKind::Overflow { value, bits })
        }
    }

    /// A label, relative to the incremented PC, or a literal offset.
    fn pc_offset(&self, i: usize, bits: u32) -> Result<u16> {
        let token = self.items[i];
        let Some(target) = self.symbols.get(token) else {
            if literal_value(token).is_none() && is_valid_label(token) {
                return Err(ErrorKind::UnknownLabel(token.to_string()));
            }
            return self.signed(i, bits);
        };
        let offset = target as i32 - (self.address as i32 + 1);
        match i16::try_from(offset) {
            Ok(word) if check_number(word as u16, bits) => Ok(word as u16),
            _ => Err(ErrorKind::Overflow {
                value: offset,
                bits,
            }),
        }
    }

    /// A label's address or any 16-bit literal.
    fn word(&self, i: usize) -> Result<u16> {
        let token = self.items[i];
        match self.symbols.get(token) {
            Some(address) => Ok(address),
            None if literal_value(token).is_none() && is_valid_label(token) => {
                Err(ErrorKind::UnknownLabel(token.to_string()))
            }
            None => self.literal(i).map(|(_, word)| word),
        }
    }

    /// Register or immediate third operand of `ADD`/`AND`.
    fn reg_or_imm5(&self, i: usize) -> Result<Operand> {
        match self.items[i].parse() {
            Ok(reg) => Ok(Operand::Reg(reg)),
            Err(()) => self.signed(i, 5).map(Operand::Imm5),
        }
    }
}

fn encode_instr(mnemonic: Mnemonic, ops: &Operands) -> Result<u16> {
    use Mnemonic as M;

    let instr = match mnemonic {
        M::Br(cond) => {
            ops.expect(1)?;
            Instr::Br {
                cond,
                offset: ops.pc_offset(0, 9)?,
            }
        }
        M::Add | M::And => {
            ops.expect(3)?;
            let (dest, src, operand) = (ops.reg(0)?, ops.reg(1)?, ops.reg_or_imm5(2)?);
            if mnemonic == M::Add {
                Instr::Add { dest, src, operand }
            } else {
                Instr::And { dest, src, operand }
            }
        }
        M::Not => {
            ops.expect(2)?;
            Instr::Not {
                dest: ops.reg(0)?,
                src: ops.reg(1)?,
            }
        }
        M::Ld | M::Ldi | M::Lea | M::St | M::Sti => {
            ops.expect(2)?;
            let (reg, offset) = (ops.reg(0)?, ops.pc_offset(1, 9)?);
            match mnemonic {
                M::Ld => Instr::Ld { dest: reg, offset },
                M::Ldi => Instr::Ldi { dest: reg, offset },
                M::Lea => Instr::Lea { dest: reg, offset },
                M::St => Instr::St { src: reg, offset },
                _ => Instr::Sti { src: reg, offset },
            }
        }
        M::Ldr | M::Str => {
            ops.expect(3)?;
            let (reg, base, offset) = (ops.reg(0)?, ops.reg(1)?, ops.signed(2, 6)?);
            if mnemonic == M::Ldr {
                Instr::Ldr { dest: reg, base, offset }
            } else {
                Instr::Str { src: reg, base, offset }
            }
        }
        M::Jsr => {
            ops.expect(1)?;
            Instr::Jsr {
                offset: ops.pc_offset(0, 11)?,
            }
        }
        M::Jsrr => {
            ops.expect(1)?;
            Instr::Jsrr { base: ops.reg(0)? }
        }
        M::Jmp => {
            ops.expect(1)?;
            match ops.reg(0)? {
                Register::R7 => Instr::Ret,
                base => Instr::Jmp { base },
            }
        }
        M::Ret => {
            ops.expect(0)?;
            Instr::Ret
        }
        M::Rti => {
            ops.expect(0)?;
            Instr::Rti
        }
        M::Trap => {
            ops.expect(1)?;
            let (value, word) = ops.literal(0)?;
            if !check_unsigned(word, 8) || value < 0 {
                return Err(ErrorKind::Overflow { value, bits: 8 });
            }
            Instr::Trap { vect: word as u8 }
        }
        M::TrapAlias(vect) => {
            ops.expect(0)?;
            Instr::Trap { vect }
        }
    };
    Ok(instr.encode())
}

fn encode_stmt(placed: &Placed, ops: &Operands, out: &mut Vec<u16>) -> Result<()> {
    let Some(op) = placed.stmt.op else {
        return Ok(());
    };
    match op {
        Op::Orig | Op::End => (),
        Op::Invalid => out.push(0),
        Op::Instr(mnemonic) => out.push(encode_instr(mnemonic, ops)?),
        Op::Fill => {
            ops.expect(1)?;
            out.push(ops.word(0)?);
        }
        // Operands were checked during layout
        Op::Blkw => out.extend(std::iter::repeat(0).take(placed.size as usize)),
        Op::Stringz => {
            out.extend(parse_string(placed.stmt.operands).unwrap_or_default());
            out.push(0);
        }
    }
    Ok(())
}

/// Encode every placed statement. Failed statements are reported and emit nothing.
pub(crate) fn encode(
    program: &[Placed],
    symbols: &SymbolTable,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<u16> {
    let mut words = Vec::with_capacity(program.iter().map(|p| p.size as usize).sum());
    for placed in program {
        let ops = Operands {
            items: split_operands(placed.stmt.operands),
            address: placed.address,
            symbols,
        };
        if let Err(kind) = encode_stmt(placed, &ops, &mut words) {
            diagnostics.push(Diagnostic::error(placed.stmt.span.clone(), kind));
        }
    }
    words
}
