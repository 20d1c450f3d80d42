use std::fmt;
use std::str::FromStr;

use crate::device::{DSR, MCR};

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;
/// First address of the device register page.
pub const DEVICE_SPACE: u16 = 0xFE00;

pub const RESET_PC: u16 = 0x3000;
/// User mode, `Z` set.
pub const RESET_PSR: u16 = 0x8002;
pub const RESET_SSP: u16 = 0x1000;

/// Privilege bit of the PSR. Set in user mode.
pub const PSR_USER: u16 = 0x8000;
/// Priority field of the PSR, bits 8 to 10.
pub const PSR_PRIORITY: u16 = 0x0700;
/// Condition code bits of the PSR.
pub const PSR_CC: u16 = 0x0007;

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    /// Generally used as the stack pointer.
    R6,
    /// Link register for `JSR`, `JSRR` and `TRAP`.
    R7,
}

impl Register {
    /// Register from the low three bits of `bits`.
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0b111 {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            _ => Register::R7,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = ();

    /// Parses `R0` to `R7`. Case-sensitive, like the rest of the assembly syntax.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R0" => Ok(Register::R0),
            "R1" => Ok(Register::R1),
            "R2" => Ok(Register::R2),
            "R3" => Ok(Register::R3),
            "R4" => Ok(Register::R4),
            "R5" => Ok(Register::R5),
            "R6" => Ok(Register::R6),
            "R7" => Ok(Register::R7),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", *self as u8)
    }
}

/// Represents complete machine state. Holds data only; behaviour lives in the runtime.
#[derive(Clone)]
pub struct Machine {
    /// System memory - 128KB in size.
    pub mem: Box<[u16; MEMORY_MAX]>,
    /// 8x 16-bit registers
    pub reg: [u16; 8],
    /// Program counter
    pub pc: u16,
    /// Processor status register
    pub psr: u16,
    pub mar: u16,
    pub mdr: u16,
    pub ir: u16,
    /// Stack pointer of whichever mode is not currently active in `R6`.
    pub saved_usp: u16,
    pub saved_ssp: u16,
}

impl Machine {
    pub fn new() -> Self {
        let mut machine = Machine {
            mem: Box::new([0; MEMORY_MAX]),
            reg: [0; 8],
            pc: RESET_PC,
            psr: RESET_PSR,
            mar: 0,
            mdr: 0,
            ir: 0,
            saved_usp: 0,
            saved_ssp: RESET_SSP,
        };
        // Display is ready to accept output and the clock is running.
        machine.mem[DSR as usize] = 0x8000;
        machine.mem[MCR as usize] = 0x8000;
        machine
    }

    #[inline]
    pub fn reg(&self, reg: Register) -> u16 {
        self.reg[reg.index()]
    }

    #[inline]
    pub fn reg_mut(&mut self, reg: Register) -> &mut u16 {
        &mut self.reg[reg.index()]
    }

    #[inline]
    pub fn mem(&self, addr: u16) -> u16 {
        self.mem[addr as usize]
    }

    #[inline]
    pub fn mem_mut(&mut self, addr: u16) -> &mut u16 {
        &mut self.mem[addr as usize]
    }

    pub fn is_user_mode(&self) -> bool {
        self.psr & PSR_USER != 0
    }

    pub fn priority(&self) -> u16 {
        (self.psr & PSR_PRIORITY) >> 8
    }

    /// Condition code as a `n`, `z` or `p` character.
    pub fn cc_char(&self) -> char {
        match self.psr & PSR_CC {
            0b100 => 'n',
            0b010 => 'z',
            0b001 => 'p',
            _ => '-',
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("reg", &self.reg)
            .field("pc", &format_args!("0x{:04x}", self.pc))
            .field("psr", &format_args!("0x{:04x}", self.psr))
            .field("ir", &format_args!("0x{:04x}", self.ir))
            .field("saved_usp", &format_args!("0x{:04x}", self.saved_usp))
            .field("saved_ssp", &format_args!("0x{:04x}", self.saved_ssp))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_values() {
        let machine = Machine::new();
        assert_eq!(machine.pc, 0x3000);
        assert_eq!(machine.psr, 0x8002);
        assert_eq!(machine.saved_ssp, 0x1000);
        assert!(machine.is_user_mode());
        assert_eq!(machine.priority(), 0);
        assert_eq!(machine.cc_char(), 'z');
        assert!(machine.reg.iter().all(|r| *r == 0));
        assert!(machine.mem[..DEVICE_SPACE as usize].iter().all(|w| *w == 0));
    }

    #[test]
    fn register_parsing() {
        assert_eq!("R0".parse(), Ok(Register::R0));
        assert_eq!("R7".parse(), Ok(Register::R7));
        assert_eq!("R8".parse::<Register>(), Err(()));
        assert_eq!("r1".parse::<Register>(), Err(()));
        assert_eq!(Register::from_bits(0b1_101), Register::R5);
        assert_eq!(Register::R3.to_string(), "R3");
    }
}
