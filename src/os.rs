//! Built-in system image.
//!
//! Holds the trap vector table, the interrupt vector table, the trap service routines for
//! `GETC`, `OUT`, `PUTS`, `IN`, `PUTSP` and `HALT`, and a keyboard interrupt handler which
//! discards the key. `HALT` stops the machine by clearing the clock bit of the machine control
//! register.

use miette::Result;

use crate::asm;
use crate::error;
use crate::image::Image;

/// Assembly source of the system image.
pub const SOURCE: &str = include_str!("os.asm");

/// Assemble the built-in system image.
pub fn system_image() -> Result<Image> {
    let assembly = asm::assemble(SOURCE);
    match assembly.image {
        Some(image) => Ok(image),
        None => Err(error::builtin_os(&assembly.diagnostics, SOURCE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BufferConsole, MCR};
    use crate::runtime::{Simulator, Status};

    fn run_with_os(src: &str, input: &str) -> Simulator<BufferConsole> {
        let mut sim = Simulator::new(BufferConsole::with_input(input))
            .with_system_image(system_image().unwrap());
        let program = asm::assemble(src).image.unwrap();
        program.load_into(sim.machine_mut()).unwrap();
        sim.run_for(100_000);
        sim
    }

    #[test]
    fn vector_tables() {
        let image = system_image().unwrap();
        assert_eq!(image.origin, 0x0000);
        let symbols = asm::assemble(SOURCE).symbols;
        for (vector, label) in [
            (0x20, "TRAP_GETC"),
            (0x21, "TRAP_OUT"),
            (0x22, "TRAP_PUTS"),
            (0x23, "TRAP_IN"),
            (0x24, "TRAP_PUTSP"),
            (0x25, "TRAP_HALT"),
            (0x101, "KBD_ISR"),
        ] {
            assert_eq!(Some(image.words[vector]), symbols.get(label), "{label}");
        }
        assert_eq!(symbols.get("OS_KBSR"), Some(0x0200));
    }

    #[test]
    fn puts_then_halt() {
        let sim = run_with_os(
            ".ORIG x3000\nLEA R0, MSG\nPUTS\nHALT\nMSG .STRINGZ \"Hello, world!\"\n.END",
            "",
        );
        assert_eq!(sim.status(), Status::Halted);
        assert_eq!(
            sim.console().output_str(),
            "Hello, world!\n--- Halting the LC-3 ---\n"
        );
        assert_eq!(sim.machine().mem(MCR) & 0x8000, 0);
    }

    #[test]
    fn getc_and_out_echo() {
        let sim = run_with_os(".ORIG x3000\nGETC\nOUT\nHALT\n.END", "k");
        assert_eq!(sim.status(), Status::Halted);
        assert!(sim.console().output_str().starts_with("k\n"));
    }

    #[test]
    fn in_prompts() {
        let sim = run_with_os(".ORIG x3000\nIN\nADD R1, R0, #0\nHALT\n.END", "y");
        assert!(sim
            .console()
            .output_str()
            .starts_with("Input a character> y"));
        assert_eq!(sim.machine().reg[1], b'y' as u16);
    }

    #[test]
    fn putsp_unpacks_bytes() {
        let sim = run_with_os(
            ".ORIG x3000\nLEA R0, MSG\nPUTSP\nHALT\nMSG .FILL x6968\n.FILL x0021\n.FILL #0\n.END",
            "",
        );
        assert!(sim.console().output_str().starts_with("hi!\n"));
    }

    #[test]
    fn halt_keeps_registers() {
        let sim = run_with_os(
            ".ORIG x3000\nAND R1, R1, #0\nADD R1, R1, #6\nAND R2, R2, #0\nADD R2, R2, #-2\nHALT\n.END",
            "",
        );
        assert_eq!(sim.status(), Status::Halted);
        assert_eq!(sim.machine().reg[1], 6);
        assert_eq!(sim.machine().reg[2], 0xFFFE);
    }

    #[test]
    fn traps_preserve_registers() {
        let sim = run_with_os(
            ".ORIG x3000\nAND R1, R1, #0\nADD R1, R1, #7\nLEA R0, MSG\nPUTS\nADD R2, R1, #0\nHALT\nMSG .STRINGZ \"x\"\n.END",
            "",
        );
        assert_eq!(sim.machine().reg[2], 7);
    }
}
