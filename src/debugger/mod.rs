//! Execution control: running, breakpoints, loading programs and editing machine state.
//!
//! Operations never fail loudly. Each one queues a [`Message`] describing what happened, which
//! the front end drains with [`Simulator::take_messages`] and prints once.

mod breakpoint;
mod command;
mod message;
mod source;

use std::fmt;
use std::path::Path;

pub use self::breakpoint::Breakpoints;
pub use self::command::{Command, CommandError, HELP};
pub use self::message::{Message, Messages};
pub use self::source::{SourceMode, SourceReader};

use crate::asm::{self, parse_literal, Assembly, SymbolTable};
use crate::device::Console;
use crate::image::Image;
use crate::output::Kind;
use crate::runtime::{Simulator, Status};
use crate::state::{Machine, Register};

/// Destination of [`Simulator::set_value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Register(Register),
    Pc,
    Psr,
    Memory(u16),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Pc => write!(f, "PC"),
            Self::Psr => write!(f, "PSR"),
            Self::Memory(address) => write!(f, "x{address:04X}"),
        }
    }
}

/// Error resolving the operands of a control operation.
#[derive(Debug, PartialEq, Eq)]
pub enum ValueError {
    InvalidTarget(String),
    InvalidValue(String),
    InvalidAddress(String),
}

impl std::error::Error for ValueError {}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget(target) => write!(
                f,
                "Cannot recognize `{target}` (expected R0-R7, PC, PSR or an address)"
            ),
            Self::InvalidValue(value) => write!(f, "Cannot recognize value `{value}`"),
            Self::InvalidAddress(address) => write!(f, "Cannot recognize address `{address}`"),
        }
    }
}

impl<C: Console> Simulator<C> {
    /// Install `image` now and on every reset.
    pub fn with_system_image(mut self, image: Image) -> Self {
        if let Err(error) = image.load_into(&mut self.machine) {
            self.messages
                .push(Kind::Error, format!("System image not loaded: {error}"));
        }
        self.system_image = Some(image);
        self
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Labels of the most recently assembled program.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<Message> {
        self.messages.take()
    }

    /// Step until the status is no longer normal.
    pub fn run(&mut self) -> Status {
        self.console.begin();
        let status = loop {
            let status = self.step();
            if status != Status::Normal {
                break status;
            }
        };
        self.console.end();
        self.report_stop(status);
        status
    }

    /// Step at most `count` times, stopping early like [`Simulator::run`].
    pub fn run_for(&mut self, count: u64) -> Status {
        self.console.begin();
        let mut status = Status::Normal;
        for _ in 0..count {
            status = self.step();
            if status != Status::Normal {
                break;
            }
        }
        self.console.end();
        self.report_stop(status);
        status
    }

    fn report_stop(&mut self, status: Status) {
        let pc = self.machine.pc;
        match status {
            Status::Normal => (),
            Status::Breakpoint => self
                .messages
                .push(Kind::Warning, format!("Breakpoint reached at x{pc:04X}")),
            Status::PrivilegeException => self.messages.push(
                Kind::Error,
                format!("Privilege mode exception at x{:04X}", self.machine.mar),
            ),
            Status::UserInterrupt => self.messages.push(Kind::Warning, "Interrupted by user"),
            Status::Halted => self.messages.push(Kind::Info, "Machine halted"),
        }
    }

    /// Address operand of a command: a literal or a label of the last assembled program.
    pub fn resolve_address(&self, text: &str) -> Result<u16, ValueError> {
        parse_literal(text)
            .or_else(|| self.symbols.get(text))
            .ok_or_else(|| ValueError::InvalidAddress(text.to_string()))
    }

    pub fn resolve_target(&self, text: &str) -> Result<Target, ValueError> {
        if let Ok(reg) = text.parse() {
            return Ok(Target::Register(reg));
        }
        match text {
            "PC" => Ok(Target::Pc),
            "PSR" => Ok(Target::Psr),
            _ => self
                .resolve_address(text)
                .map(Target::Memory)
                .map_err(|_| ValueError::InvalidTarget(text.to_string())),
        }
    }

    fn queue_error<T>(&mut self, result: Result<T, ValueError>) -> Result<T, ValueError> {
        if let Err(error) = &result {
            self.messages.push(Kind::Error, error.to_string());
        }
        result
    }

    /// Idempotent; re-adding a breakpoint is not an error.
    pub fn set_breakpoint(&mut self, address: &str) -> Result<(), ValueError> {
        let address = self.resolve_address(address);
        let address = self.queue_error(address)?;
        self.breakpoints.insert(address);
        self.messages
            .push(Kind::Info, format!("Add breakpoint at x{address:04X}"));
        Ok(())
    }

    pub fn clear_breakpoint(&mut self, address: &str) -> Result<(), ValueError> {
        let address = self.resolve_address(address);
        let address = self.queue_error(address)?;
        if self.breakpoints.remove(address) {
            self.messages
                .push(Kind::Info, format!("Cancel breakpoint at x{address:04X}"));
        } else {
            self.messages
                .push(Kind::Warning, format!("No breakpoint at x{address:04X}"));
        }
        Ok(())
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
        self.messages.push(Kind::Info, "Cancel all breakpoints");
    }

    /// Write `value` to a register, PC, PSR or memory word.
    ///
    /// Nothing is changed if either operand is not recognized.
    pub fn set_value(&mut self, target: &str, value: &str) -> Result<(), ValueError> {
        let resolved = self.resolve_target(target).and_then(|target| {
            parse_literal(value)
                .map(|value| (target, value))
                .ok_or_else(|| ValueError::InvalidValue(value.to_string()))
        });
        let (target, value) = self.queue_error(resolved)?;
        match target {
            Target::Register(reg) => *self.machine.reg_mut(reg) = value,
            Target::Pc => self.machine.pc = value,
            Target::Psr => self.machine.psr = value,
            Target::Memory(address) => *self.machine.mem_mut(address) = value,
        }
        self.messages
            .push(Kind::Info, format!("Set {target} to x{value:04X}"));
        Ok(())
    }

    /// Fresh machine state with the system image reinstalled. Breakpoints, program labels and
    /// the instruction counter are cleared as well.
    pub fn reset(&mut self) {
        self.machine = Machine::new();
        self.status = Status::Normal;
        self.breakpoints.clear();
        self.symbols = SymbolTable::default();
        self.instruction_count = 0;
        if let Some(image) = &self.system_image {
            if let Err(error) = image.load_into(&mut self.machine) {
                self.messages
                    .push(Kind::Error, format!("System image not loaded: {error}"));
            }
        }
        self.messages.push(Kind::Info, "Machine reset");
    }

    pub fn reset_instruction_count(&mut self) {
        self.instruction_count = 0;
        self.messages.push(Kind::Info, "Instruction count cleared");
    }

    /// Install an image and point PC at its origin. Memory is untouched if loading fails.
    pub fn load(&mut self, image: &Image) -> bool {
        match image.load_into(&mut self.machine) {
            Ok(()) => {
                self.machine.pc = image.origin;
                self.messages.push(
                    Kind::Info,
                    format!(
                        "Loaded {} word{} at x{:04X}",
                        image.words.len(),
                        if image.words.len() == 1 { "" } else { "s" },
                        image.origin
                    ),
                );
                true
            }
            Err(error) => {
                self.messages.push(Kind::Error, error.to_string());
                false
            }
        }
    }

    /// Read a binary image file and install it.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match Image::read(path) {
            Ok(image) => {
                self.symbols = SymbolTable::default();
                self.load(&image)
            }
            Err(error) => {
                self.messages
                    .push(Kind::Error, format!("{}: {error}", path.display()));
                false
            }
        }
    }

    /// Assemble source text and install the result, keeping its labels for later commands.
    pub fn load_source(&mut self, src: &str) -> Assembly {
        let assembly = asm::assemble(src);
        self.queue_diagnostics(&assembly);
        if let Some(image) = &assembly.image {
            if self.load(image) {
                self.symbols = assembly.symbols.clone();
            }
        }
        assembly
    }

    /// Assemble the file at `src` and write the image to `out`.
    ///
    /// Without `out`, the image is written next to the source with a `.bin` extension.
    pub fn assemble(&mut self, src: impl AsRef<Path>, out: Option<&Path>) -> bool {
        let src = src.as_ref();
        let text = match std::fs::read_to_string(src) {
            Ok(text) => text,
            Err(error) => {
                self.messages
                    .push(Kind::Error, format!("{}: {error}", src.display()));
                return false;
            }
        };
        let assembly = asm::assemble(&text);
        self.queue_diagnostics(&assembly);
        let Some(image) = assembly.image else {
            let count = assembly.errors().count();
            self.messages.push(
                Kind::Error,
                format!("Assembly failed with {count} error{}", if count == 1 { "" } else { "s" }),
            );
            return false;
        };
        let out = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| src.with_extension("bin"));
        match image.write(&out) {
            Ok(()) => {
                self.messages
                    .push(Kind::Info, format!("Assembled into {}", out.display()));
                true
            }
            Err(error) => {
                self.messages
                    .push(Kind::Error, format!("{}: {error}", out.display()));
                false
            }
        }
    }

    fn queue_diagnostics(&mut self, assembly: &Assembly) {
        for diag in &assembly.diagnostics {
            let kind = if diag.is_error() {
                Kind::Error
            } else {
                Kind::Warning
            };
            self.messages.push(kind, diag.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BufferConsole;

    const COUNTDOWN: &str = "
        .ORIG x3000
        AND R0, R0, #0
        ADD R0, R0, #3
LOOP    ADD R0, R0, #-1
        BRp LOOP
DONE    ADD R1, R1, #1
        .END";

    fn loaded(src: &str) -> Simulator<BufferConsole> {
        let mut sim = Simulator::new(BufferConsole::new());
        assert!(sim.load_source(src).is_ok());
        sim.take_messages();
        sim
    }

    #[test]
    fn run_stops_at_breakpoint() {
        let mut sim = loaded(COUNTDOWN);
        sim.set_breakpoint("DONE").unwrap();
        assert!(sim.breakpoints().contains(0x3004));
        assert_eq!(sim.run(), Status::Breakpoint);
        assert_eq!(sim.machine().pc, 0x3004);
        assert_eq!(sim.machine().reg[0], 0);
        assert_eq!(sim.instruction_count(), 8);
        let messages = sim.take_messages();
        assert_eq!(messages.last().unwrap().text, "Breakpoint reached at x3004");
        assert!(sim.take_messages().is_empty());
    }

    #[test]
    fn run_for_is_bounded() {
        let mut sim = loaded(COUNTDOWN);
        assert_eq!(sim.run_for(3), Status::Normal);
        assert_eq!(sim.instruction_count(), 3);
        assert_eq!(sim.machine().pc, 0x3003);
        assert_eq!(sim.run_for(0), Status::Normal);
        assert_eq!(sim.instruction_count(), 3);
        sim.reset_instruction_count();
        assert_eq!(sim.instruction_count(), 0);
    }

    #[test]
    fn run_ends_on_halt() {
        let mut sim = loaded(".ORIG x3000\nADD R0, R0, #1\n.END");
        *sim.machine_mut().mem_mut(crate::device::MCR) = 0;
        assert_eq!(sim.run(), Status::Halted);
    }

    #[test]
    fn user_interrupt_stops_run() {
        let mut sim = loaded(COUNTDOWN);
        sim.console_mut().input.push_back(crate::device::ESCAPE);
        assert_eq!(sim.run(), Status::UserInterrupt);
        assert_eq!(sim.instruction_count(), 0);
    }

    #[test]
    fn privilege_exception_then_resume() {
        let mut sim = loaded(".ORIG x3000\nRTI\nADD R0, R0, #1\n.END");
        sim.set_breakpoint("x3002").unwrap();
        assert_eq!(sim.run(), Status::PrivilegeException);
        assert_eq!(sim.machine().pc, 0x3001);
        assert_eq!(sim.run(), Status::Breakpoint);
        assert_eq!(sim.machine().reg[0], 1);
    }

    #[test]
    fn breakpoint_operations_are_idempotent() {
        let mut sim = loaded(COUNTDOWN);
        sim.set_breakpoint("x3002").unwrap();
        sim.set_breakpoint("x3002").unwrap();
        assert_eq!(sim.breakpoints().len(), 1);
        sim.clear_breakpoint("LOOP").unwrap();
        sim.clear_breakpoint("LOOP").unwrap();
        assert!(sim.breakpoints().is_empty());
        sim.set_breakpoint("x3000").unwrap();
        sim.set_breakpoint("x3001").unwrap();
        sim.clear_breakpoints();
        assert!(sim.breakpoints().is_empty());
        sim.clear_breakpoints();
        assert!(sim.breakpoints().is_empty());
        assert!(sim
            .take_messages()
            .iter()
            .all(|message| message.kind != Kind::Error));
        assert_eq!(
            sim.set_breakpoint("NOWHERE"),
            Err(ValueError::InvalidAddress("NOWHERE".into()))
        );
    }

    #[test]
    fn set_value_targets() {
        let mut sim = loaded(COUNTDOWN);
        sim.set_value("R3", "#-1").unwrap();
        sim.set_value("PC", "x3002").unwrap();
        sim.set_value("PSR", "x0001").unwrap();
        sim.set_value("x4000", "42").unwrap();
        sim.set_value("LOOP", "x0000").unwrap();
        let machine = sim.machine();
        assert_eq!(machine.reg[3], 0xFFFF);
        assert_eq!(machine.pc, 0x3002);
        assert_eq!(machine.psr, 0x0001);
        assert_eq!(machine.mem(0x4000), 42);
        assert_eq!(machine.mem(0x3002), 0);
    }

    #[test]
    fn set_value_rejects_garbage() {
        let mut sim = loaded(COUNTDOWN);
        let before = sim.machine().clone();
        sim.take_messages();
        assert_eq!(
            sim.set_value("R9", "1"),
            Err(ValueError::InvalidTarget("R9".into()))
        );
        assert_eq!(
            sim.set_value("R1", "x12345"),
            Err(ValueError::InvalidValue("x12345".into()))
        );
        assert_eq!(sim.machine().reg, before.reg);
        let messages = sim.take_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|message| message.kind == Kind::Error));
    }

    #[test]
    fn reset_restores_power_on_state() {
        let system = Image::new(0x0020, vec![0x0400]);
        let mut sim = Simulator::new(BufferConsole::new()).with_system_image(system);
        sim.load_source(COUNTDOWN);
        sim.set_breakpoint("x3003").unwrap();
        sim.run_for(4);
        *sim.machine_mut().mem_mut(0x0020) = 0;

        sim.reset();
        assert_eq!(sim.machine().pc, 0x3000);
        assert_eq!(sim.machine().psr, 0x8002);
        assert_eq!(sim.machine().reg, [0; 8]);
        assert_eq!(sim.machine().mem(0x3000), 0);
        assert_eq!(sim.machine().mem(0x0020), 0x0400);
        assert!(sim.breakpoints().is_empty());
        assert_eq!(sim.instruction_count(), 0);
        assert!(sim.symbols().get("LOOP").is_none());
        assert_eq!(
            sim.set_breakpoint("LOOP"),
            Err(ValueError::InvalidAddress("LOOP".into()))
        );
    }

    #[test]
    fn failed_load_leaves_memory() {
        let mut sim = Simulator::new(BufferConsole::new());
        assert!(!sim.load(&Image::new(0xFDFF, vec![1, 2])));
        assert_eq!(sim.machine().mem(0xFDFF), 0);
        assert_eq!(sim.machine().pc, 0x3000);
        assert!(!sim.load_image("/nonexistent/program.bin"));
        let messages = sim.take_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].text.starts_with("Illegal memory space"));
    }

    #[test]
    fn failed_assembly_loads_nothing() {
        let mut sim = Simulator::new(BufferConsole::new());
        let assembly = sim.load_source(".ORIG x3000\nADD R0, R0, #99\n.END");
        assert!(!assembly.is_ok());
        assert_eq!(sim.machine().mem(0x3000), 0);
        let messages = sim.take_messages();
        assert_eq!(
            messages[0].text,
            "Error at line 2: Cannot represent 99 in a 5-bit field"
        );
    }
}
