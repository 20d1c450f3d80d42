use std::fmt;

use crate::bits::{bit, sign_extend, slice};
use crate::state::Register;

/// Condition bits of a branch, `n` in bit 2 down to `p` in bit 0.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Cond(pub u16);

impl Cond {
    pub const NZP: Cond = Cond(0b111);

    /// Parse the suffix of a `BR` mnemonic. A bare `BR` is unconditional.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let bits = match suffix {
            "" | "nzp" => 0b111,
            "n" => 0b100,
            "z" => 0b010,
            "p" => 0b001,
            "nz" => 0b110,
            "zp" => 0b011,
            "np" => 0b101,
            _ => return None,
        };
        Some(Cond(bits))
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (mask, ch) in [(0b100, 'n'), (0b010, 'z'), (0b001, 'p')] {
            if self.0 & mask != 0 {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// Second operand of `ADD` and `AND`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Reg(Register),
    /// Already sign-extended to a full word.
    Imm5(u16),
}

/// A single decoded instruction.
///
/// Offsets and immediates are stored sign-extended; encoding slices them back into their
/// fields, so callers must range-check them first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    /// Branch by `offset9` if any condition bit matches the PSR
    Br { cond: Cond, offset: u16 },
    Add { dest: Register, src: Register, operand: Operand },
    /// Load value from `PC + offset9`
    Ld { dest: Register, offset: u16 },
    St { src: Register, offset: u16 },
    /// Save PC into R7, jump by `offset11`
    Jsr { offset: u16 },
    /// Save PC into R7, jump to the address in `base`
    Jsrr { base: Register },
    And { dest: Register, src: Register, operand: Operand },
    Ldr { dest: Register, base: Register, offset: u16 },
    Str { src: Register, base: Register, offset: u16 },
    Rti,
    Not { dest: Register, src: Register },
    Ldi { dest: Register, offset: u16 },
    Sti { src: Register, offset: u16 },
    Jmp { base: Register },
    /// `JMP R7`
    Ret,
    Reserved,
    Lea { dest: Register, offset: u16 },
    Trap { vect: u8 },
}

fn reg(word: u16, lo: u32) -> Register {
    Register::from_bits(slice(word, lo, lo + 3))
}

impl Instr {
    pub fn decode(word: u16) -> Self {
        let operand = || {
            if bit(word, 5) {
                Operand::Imm5(sign_extend(word, 5))
            } else {
                Operand::Reg(reg(word, 0))
            }
        };
        match word >> 12 {
            0x0 => Instr::Br {
                cond: Cond(slice(word, 9, 12)),
                offset: sign_extend(word, 9),
            },
            0x1 => Instr::Add {
                dest: reg(word, 9),
                src: reg(word, 6),
                operand: operand(),
            },
            0x2 => Instr::Ld {
                dest: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0x3 => Instr::St {
                src: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0x4 if bit(word, 11) => Instr::Jsr {
                offset: sign_extend(word, 11),
            },
            0x4 => Instr::Jsrr { base: reg(word, 6) },
            0x5 => Instr::And {
                dest: reg(word, 9),
                src: reg(word, 6),
                operand: operand(),
            },
            0x6 => Instr::Ldr {
                dest: reg(word, 9),
                base: reg(word, 6),
                offset: sign_extend(word, 6),
            },
            0x7 => Instr::Str {
                src: reg(word, 9),
                base: reg(word, 6),
                offset: sign_extend(word, 6),
            },
            0x8 => Instr::Rti,
            0x9 => Instr::Not {
                dest: reg(word, 9),
                src: reg(word, 6),
            },
            0xA => Instr::Ldi {
                dest: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0xB => Instr::Sti {
                src: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0xC => match reg(word, 6) {
                Register::R7 => Instr::Ret,
                base => Instr::Jmp { base },
            },
            0xD => Instr::Reserved,
            0xE => Instr::Lea {
                dest: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            _ => Instr::Trap {
                vect: slice(word, 0, 8) as u8,
            },
        }
    }

    pub fn encode(&self) -> u16 {
        fn r(reg: Register, shift: u32) -> u16 {
            (reg as u16) << shift
        }
        fn operand(operand: Operand) -> u16 {
            match operand {
                Operand::Reg(reg) => reg as u16,
                Operand::Imm5(imm) => 1 << 5 | slice(imm, 0, 5),
            }
        }
        match *self {
            Instr::Br { cond, offset } => (cond.0 & 0b111) << 9 | slice(offset, 0, 9),
            Instr::Add { dest, src, operand: op } => 0x1000 | r(dest, 9) | r(src, 6) | operand(op),
            Instr::Ld { dest, offset } => 0x2000 | r(dest, 9) | slice(offset, 0, 9),
            Instr::St { src, offset } => 0x3000 | r(src, 9) | slice(offset, 0, 9),
            Instr::Jsr { offset } => 0x4800 | slice(offset, 0, 11),
            Instr::Jsrr { base } => 0x4000 | r(base, 6),
            Instr::And { dest, src, operand: op } => 0x5000 | r(dest, 9) | r(src, 6) | operand(op),
            Instr::Ldr { dest, base, offset } => {
                0x6000 | r(dest, 9) | r(base, 6) | slice(offset, 0, 6)
            }
            Instr::Str { src, base, offset } => {
                0x7000 | r(src, 9) | r(base, 6) | slice(offset, 0, 6)
            }
            Instr::Rti => 0x8000,
            Instr::Not { dest, src } => 0x903F | r(dest, 9) | r(src, 6),
            Instr::Ldi { dest, offset } => 0xA000 | r(dest, 9) | slice(offset, 0, 9),
            Instr::Sti { src, offset } => 0xB000 | r(src, 9) | slice(offset, 0, 9),
            Instr::Jmp { base } => 0xC000 | r(base, 6),
            Instr::Ret => 0xC1C0,
            Instr::Reserved => 0xD000,
            Instr::Lea { dest, offset } => 0xE000 | r(dest, 9) | slice(offset, 0, 9),
            Instr::Trap { vect } => 0xF000 | vect as u16,
        }
    }
}

/// Whether `word` is better shown as data or a no-op than as an instruction.
///
/// Words with non-zero 'unused' bits still execute, but no assembler emits them, so they are
/// almost certainly data. Only affects presentation.
pub fn is_nop(word: u16) -> bool {
    match word >> 12 {
        // Branch that can never be taken
        0x0 => slice(word, 9, 12) == 0,
        0x1 | 0x5 if !bit(word, 5) => slice(word, 3, 5) != 0,
        0x4 if !bit(word, 11) => word & 0x063F != 0,
        0x8 => slice(word, 0, 12) != 0,
        0x9 => slice(word, 0, 6) != 0x3F,
        0xC => word & 0x0E3F != 0,
        0xD => true,
        0xF => slice(word, 8, 12) != 0,
        _ => false,
    }
}

/// Assembly text for `word`, with PC-relative offsets shown as signed decimals.
pub fn disassemble(word: u16) -> String {
    if is_nop(word) {
        return "NOP".to_string();
    }
    Instr::decode(word).to_string()
}

fn imm(value: u16) -> String {
    format!("#{}", value as i16)
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm5(value) => write!(f, "{}", imm(*value)),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Br { cond, offset } => write!(f, "BR{cond} {}", imm(*offset)),
            Instr::Add { dest, src, operand } => write!(f, "ADD {dest}, {src}, {operand}"),
            Instr::Ld { dest, offset } => write!(f, "LD {dest}, {}", imm(*offset)),
            Instr::St { src, offset } => write!(f, "ST {src}, {}", imm(*offset)),
            Instr::Jsr { offset } => write!(f, "JSR {}", imm(*offset)),
            Instr::Jsrr { base } => write!(f, "JSRR {base}"),
            Instr::And { dest, src, operand } => write!(f, "AND {dest}, {src}, {operand}"),
            Instr::Ldr { dest, base, offset } => write!(f, "LDR {dest}, {base}, {}", imm(*offset)),
            Instr::Str { src, base, offset } => write!(f, "STR {src}, {base}, {}", imm(*offset)),
            Instr::Rti => write!(f, "RTI"),
            Instr::Not { dest, src } => write!(f, "NOT {dest}, {src}"),
            Instr::Ldi { dest, offset } => write!(f, "LDI {dest}, {}", imm(*offset)),
            Instr::Sti { src, offset } => write!(f, "STI {src}, {}", imm(*offset)),
            Instr::Jmp { base } => write!(f, "JMP {base}"),
            Instr::Ret => write!(f, "RET"),
            Instr::Reserved => write!(f, "NOP"),
            Instr::Lea { dest, offset } => write!(f, "LEA {dest}, {}", imm(*offset)),
            Instr::Trap { vect } => write!(f, "TRAP x{vect:02X}"),
        }
    }
}
