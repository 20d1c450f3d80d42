use std::fmt;
use std::path::Path;

use super::source::SourceReader;
use crate::device::Console;
use crate::output::{Condition, Kind, Output};
use crate::runtime::Simulator;
use crate::state::DEVICE_SPACE;
use crate::{dprint, dprintln};

pub const HELP: &str = "\
loadbin <file>                 Load a binary image, PC set to its origin
setvalue|setv|sv <dest> <val>  Set R0-R7, PC, PSR or a memory address
run                            Run until halt, breakpoint or exception (ESC interrupts)
stepover|n                     Execute one instruction
nn...                          Execute one instruction per `n`
step [count]                   Execute `count` instructions (default 1)
setbk|sbk <addr>               Add a breakpoint
cancelbk|cbk <addr>            Remove a breakpoint
cancelallbk|cabk               Remove every breakpoint
breakpoints|bk                 List breakpoints
asm|assemble <src> [dest]      Assemble a source file into a binary image
reset                          Reset the machine and reload the system image
clearcount|cc                  Clear the instruction counter
status|st                      Show registers and status
showmem|smm|mem [addr] [n]     List memory (default: around PC)
help                           Show this message
exit                           Leave the simulator

Addresses and values are written x3000, #-5 or 12. Labels of an assembled program may be used
as addresses.";

/// Amount of words listed by `showmem` when no count is given.
const MEMORY_LINES: u16 = 16;

/// A parsed line-mode command. Arguments are resolved when the command is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    LoadBin { path: &'a str },
    SetValue { target: &'a str, value: &'a str },
    Run,
    Step { count: u64 },
    SetBreakpoint { address: &'a str },
    ClearBreakpoint { address: &'a str },
    ClearBreakpoints,
    ListBreakpoints,
    Assemble { src: &'a str, dest: Option<&'a str> },
    Reset,
    ClearCount,
    Status,
    ShowMemory { start: Option<&'a str>, count: Option<&'a str> },
    Help,
    Exit,
}

/// Error parsing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    InvalidCommand { command_name: String },
    MissingArgument { command_name: &'static str, argument_name: &'static str },
    TooManyArguments { command_name: &'static str, expected_count: usize },
    InvalidCount { value: String },
}

impl std::error::Error for CommandError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand { command_name } => {
                write!(f, "Not a command: `{}`", command_name)
            }
            Self::MissingArgument {
                command_name,
                argument_name,
            } => write!(
                f,
                "Missing argument `{}` for command `{}`",
                argument_name, command_name
            ),
            Self::TooManyArguments {
                command_name,
                expected_count,
            } => write!(
                f,
                "Too many arguments for command `{}` (expected at most {})",
                command_name, expected_count
            ),
            Self::InvalidCount { value } => write!(f, "Invalid step count `{}`", value),
        }
    }
}

/// Whitespace separated arguments of one command.
struct Args<'a> {
    command_name: &'static str,
    items: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn required(&self, i: usize, argument_name: &'static str) -> Result<&'a str, CommandError> {
        self.items
            .get(i)
            .copied()
            .ok_or(CommandError::MissingArgument {
                command_name: self.command_name,
                argument_name,
            })
    }

    fn optional(&self, i: usize) -> Option<&'a str> {
        self.items.get(i).copied()
    }

    fn at_most(&self, count: usize) -> Result<(), CommandError> {
        if self.items.len() > count {
            return Err(CommandError::TooManyArguments {
                command_name: self.command_name,
                expected_count: count,
            });
        }
        Ok(())
    }
}

impl<'a> TryFrom<&'a str> for Command<'a> {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &'a str) -> Result<Self, Self::Error> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let items: Vec<&str> = words.collect();

        let command_name = match name {
            "loadbin" => "loadbin",
            "setvalue" | "setv" | "sv" => "setvalue",
            "run" => "run",
            "stepover" | "step" => "step",
            "setbk" | "sbk" => "setbk",
            "cancelbk" | "cbk" => "cancelbk",
            "cancelallbk" | "cabk" => "cancelallbk",
            "breakpoints" | "bk" => "breakpoints",
            "asm" | "assemble" => "assemble",
            "reset" => "reset",
            "clearcount" | "cc" => "clearcount",
            "status" | "st" => "status",
            "showmem" | "smm" | "mem" => "showmem",
            "help" => "help",
            "exit" | "quit" => "exit",
            // `n`, `nn`, `nnn`...
            _ if !name.is_empty() && name.bytes().all(|ch| ch == b'n') => {
                if !items.is_empty() {
                    return Err(CommandError::TooManyArguments {
                        command_name: "n",
                        expected_count: 0,
                    });
                }
                return Ok(Command::Step {
                    count: name.len() as u64,
                });
            }
            _ => {
                return Err(CommandError::InvalidCommand {
                    command_name: name.to_string(),
                })
            }
        };

        let args = Args {
            command_name,
            items,
        };
        let command = match command_name {
            "loadbin" => {
                args.at_most(1)?;
                Command::LoadBin {
                    path: args.required(0, "file")?,
                }
            }
            "setvalue" => {
                args.at_most(2)?;
                Command::SetValue {
                    target: args.required(0, "dest")?,
                    value: args.required(1, "value")?,
                }
            }
            "step" => {
                args.at_most(1)?;
                let count = match args.optional(0) {
                    None => 1,
                    Some(value) => crate::asm::literal_value(value)
                        .and_then(|count| u64::try_from(count).ok())
                        .ok_or_else(|| CommandError::InvalidCount {
                            value: value.to_string(),
                        })?,
                };
                Command::Step { count }
            }
            "setbk" => {
                args.at_most(1)?;
                Command::SetBreakpoint {
                    address: args.required(0, "addr")?,
                }
            }
            "cancelbk" => {
                args.at_most(1)?;
                Command::ClearBreakpoint {
                    address: args.required(0, "addr")?,
                }
            }
            "assemble" => {
                args.at_most(2)?;
                Command::Assemble {
                    src: args.required(0, "src")?,
                    dest: args.optional(1),
                }
            }
            "showmem" => {
                args.at_most(2)?;
                Command::ShowMemory {
                    start: args.optional(0),
                    count: args.optional(1),
                }
            }
            simple => {
                args.at_most(0)?;
                match simple {
                    "run" => Command::Run,
                    "cancelallbk" => Command::ClearBreakpoints,
                    "breakpoints" => Command::ListBreakpoints,
                    "reset" => Command::Reset,
                    "clearcount" => Command::ClearCount,
                    "status" => Command::Status,
                    "help" => Command::Help,
                    "exit" => Command::Exit,
                    _ => {
                        return Err(CommandError::InvalidCommand {
                            command_name: simple.to_string(),
                        })
                    }
                }
            }
        };
        Ok(command)
    }
}

/// What the command loop does after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Proceed,
    Exit,
}

impl<C: Console> Simulator<C> {
    /// Perform one command. Results are queued as messages, or printed for display commands.
    pub fn execute_command(&mut self, command: Command) -> Action {
        // Errors are queued as messages by each operation
        match command {
            Command::LoadBin { path } => {
                self.load_image(path);
            }
            Command::SetValue { target, value } => {
                let _ = self.set_value(target, value);
            }
            Command::Run => {
                self.run();
                self.print_status();
            }
            Command::Step { count } => {
                self.run_for(count);
                self.print_status();
            }
            Command::SetBreakpoint { address } => {
                let _ = self.set_breakpoint(address);
            }
            Command::ClearBreakpoint { address } => {
                let _ = self.clear_breakpoint(address);
            }
            Command::ClearBreakpoints => self.clear_breakpoints(),
            Command::ListBreakpoints => {
                if self.breakpoints.is_empty() {
                    dprintln!(Always, Normal, "No breakpoints");
                }
                for address in self.breakpoints.iter() {
                    match self.symbols.label_at(address) {
                        Some(label) => dprintln!(Always, Normal, "x{:04X} {}", address, label),
                        None => dprintln!(Always, Normal, "x{:04X}", address),
                    }
                }
            }
            Command::Assemble { src, dest } => {
                self.assemble(src, dest.map(Path::new));
            }
            Command::Reset => self.reset(),
            Command::ClearCount => self.reset_instruction_count(),
            Command::Status => {
                Output::Debugger(Condition::Always, Kind::Normal).print_registers(&self.machine);
                self.print_status();
            }
            Command::ShowMemory { start, count } => self.show_memory(start, count),
            Command::Help => dprintln!(Always, Normal, "{}", HELP),
            Command::Exit => return Action::Exit,
        }
        Action::Proceed
    }

    /// One-line summary of where execution stands.
    pub fn print_status(&mut self) {
        self.print_messages();
        let m = &self.machine;
        dprintln!(
            Always,
            Normal,
            "PC x{:04X}  IR x{:04X}  PSR x{:04X}  CC {}  Status: {}  Count: {}",
            m.pc,
            m.ir,
            m.psr,
            m.cc_char(),
            self.status,
            self.instruction_count,
        );
    }

    fn show_memory(&mut self, start: Option<&str>, count: Option<&str>) {
        let start = match start.map(|start| self.resolve_address(start)) {
            None => self.machine.pc.saturating_sub(MEMORY_LINES / 4),
            Some(Ok(start)) => start,
            Some(Err(error)) => {
                self.messages.push(Kind::Error, error.to_string());
                return;
            }
        };
        let count = match count.map(crate::asm::parse_literal) {
            None => MEMORY_LINES,
            Some(Some(count)) => count,
            Some(None) => {
                self.messages
                    .push(Kind::Error, format!("Invalid count `{}`", count.unwrap_or("")));
                return;
            }
        };
        let output = Output::Debugger(Condition::Always, Kind::Normal);
        output.start_new_line();
        for address in (start as u32..start as u32 + count as u32).take_while(|a| *a <= 0xFFFF) {
            let address = address as u16;
            output.print_memory_line(
                address,
                self.machine.mem(address),
                self.symbols.label_at(address),
                address == self.machine.pc,
                self.breakpoints.contains(address),
            );
        }
    }

    /// Print and discard queued messages.
    pub fn print_messages(&mut self) {
        let messages = self.take_messages();
        if messages.is_empty() {
            return;
        }
        Output::Debugger(Condition::Always, Kind::Normal).start_new_line();
        for message in messages {
            dprintln!(Always, message.kind, "{}", message.text);
        }
    }

    /// Read and execute commands until `exit` or the end of input.
    pub fn interact(&mut self, source: &mut impl SourceReader) {
        dprintln!(Sometimes, Info, "Type `help` for a list of commands.");
        self.print_status();
        loop {
            let Some(line) = source.read() else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let command = match Command::try_from(line) {
                Ok(command) => command,
                Err(error) => {
                    dprintln!(Always, Error, "{}", error);
                    continue;
                }
            };
            let action = self.execute_command(command);
            self.print_messages();
            if self.machine.pc >= DEVICE_SPACE {
                dprint!(Sometimes, Warning, "PC is in device memory\n");
            }
            if action == Action::Exit {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!(
            Command::try_from("sv R1 x10"),
            Ok(Command::SetValue {
                target: "R1",
                value: "x10"
            })
        );
        assert_eq!(
            Command::try_from("setvalue  PC   x3000"),
            Ok(Command::SetValue {
                target: "PC",
                value: "x3000"
            })
        );
        assert_eq!(
            Command::try_from("sbk LOOP"),
            Ok(Command::SetBreakpoint { address: "LOOP" })
        );
        assert_eq!(Command::try_from("cabk"), Ok(Command::ClearBreakpoints));
        assert_eq!(Command::try_from("cc"), Ok(Command::ClearCount));
        assert_eq!(
            Command::try_from("asm prog.asm"),
            Ok(Command::Assemble {
                src: "prog.asm",
                dest: None
            })
        );
    }

    #[test]
    fn parse_steps() {
        assert_eq!(Command::try_from("n"), Ok(Command::Step { count: 1 }));
        assert_eq!(Command::try_from("nnnn"), Ok(Command::Step { count: 4 }));
        assert_eq!(Command::try_from("stepover"), Ok(Command::Step { count: 1 }));
        assert_eq!(Command::try_from("step #20"), Ok(Command::Step { count: 20 }));
        assert_eq!(Command::try_from("step 40000"), Ok(Command::Step { count: 40000 }));
        assert_eq!(Command::try_from("step x8000"), Ok(Command::Step { count: 0x8000 }));
        assert!(matches!(
            Command::try_from("step -1"),
            Err(CommandError::InvalidCount { .. })
        ));
        assert!(matches!(
            Command::try_from("nnx"),
            Err(CommandError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            Command::try_from("sv R1"),
            Err(CommandError::MissingArgument {
                command_name: "setvalue",
                argument_name: "value"
            })
        );
        assert_eq!(
            Command::try_from("run now"),
            Err(CommandError::TooManyArguments {
                command_name: "run",
                expected_count: 0
            })
        );
        assert_eq!(Command::try_from("quit"), Ok(Command::Exit));
        assert_eq!(
            Command::try_from("exit now"),
            Err(CommandError::TooManyArguments {
                command_name: "exit",
                expected_count: 0
            })
        );
        assert_eq!(
            Command::try_from("jump").unwrap_err().to_string(),
            "Not a command: `jump`"
        );
    }
}
