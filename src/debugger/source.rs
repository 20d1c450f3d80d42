use std::io::{self, BufRead, IsTerminal, Write};

use crate::dprintln;
use crate::output::{Condition, Kind, Output};

/// Where debugger commands are read from.
#[allow(private_interfaces)]
#[derive(Debug)]
pub enum SourceMode {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

// Command-line argument
#[derive(Debug)]
struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
struct Stdin {
    stdin: io::Stdin,
    buffer: String,
}

// Interactive terminal, read a line at a time
#[derive(Debug)]
struct Terminal {
    stdin: io::Stdin,
    buffer: String,
    /// Byte index of the next command within `buffer`
    cursor: usize,
}

pub trait SourceReader {
    /// `None` indicates EOF
    /// Returned string slice MAY include leading or trailing whitespace
    fn read(&mut self) -> Option<&str>;
}

impl SourceMode {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return SourceMode::Argument(Argument::from(argument));
        }
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return SourceMode::Terminal(Terminal::new(stdin));
        }
        SourceMode::Stdin(Stdin::from(stdin))
    }

    /// Whether commands are piped through stdin, leaving no keyboard input for the program.
    pub fn is_piped(&self) -> bool {
        matches!(self, Self::Stdin(_))
    }
}

impl SourceReader for SourceMode {
    fn read(&mut self) -> Option<&str> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
            Self::Terminal(terminal) => return terminal.read(),
        };
        // Echo command for non-terminal source
        if let Some(command) = command {
            Output::Debugger(Condition::Sometimes, Kind::Normal).start_new_line();
            dprintln!(Sometimes, Normal, "\x1b[1mCommand:\x1b[0m {}", command.trim());
        }
        command
    }
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceReader for Argument {
    fn read(&mut self) -> Option<&str> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        // Take characters until delimiter
        let start = self.cursor;
        let rest = &self.buffer[start..];
        let end = rest.find(['\n', ';']).map_or(self.buffer.len(), |i| start + i);
        self.cursor = end + 1; // sizeof('\n' or ';')
        self.buffer.get(start..end)
    }
}

impl Stdin {
    pub fn from(stdin: io::Stdin) -> Self {
        Self {
            stdin,
            buffer: String::new(),
        }
    }
}

impl SourceReader for Stdin {
    fn read(&mut self) -> Option<&str> {
        self.buffer.clear();

        // Take bytes until delimiter
        let mut lock = self.stdin.lock();
        loop {
            let mut byte = [0; 1];
            match io::Read::read(&mut lock, &mut byte) {
                Ok(0) | Err(_) => {
                    if self.buffer.is_empty() {
                        return None; // First character is EOF
                    }
                    break;
                }
                Ok(_) => (),
            }
            match byte[0] {
                b'\n' | b';' => break,
                byte => self.buffer.push(byte as char),
            }
        }

        Some(&self.buffer)
    }
}

impl Terminal {
    pub fn new(stdin: io::Stdin) -> Self {
        Self {
            stdin,
            buffer: String::new(),
            cursor: 0,
        }
    }

    fn print_prompt(&self) {
        Output::Debugger(Condition::Always, Kind::Normal).start_new_line();
        eprint!("\x1b[1;34mCommand:\x1b[0m ");
        let _ = io::stderr().flush();
    }

    /// Read an entire (possibly multi-command) line. `false` on EOF.
    fn read_line(&mut self) -> bool {
        self.buffer.clear();
        self.cursor = 0;
        loop {
            self.print_prompt();
            let mut line = String::new();
            match self.stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => (),
            }
            Output::set_line_start(true);
            if !line.trim().is_empty() {
                self.buffer = line.trim_end_matches(['\r', '\n']).to_string();
                return true;
            }
        }
    }

    /// Returns next command from line buffer
    fn get_next_command(&mut self) -> &str {
        let rest = &self.buffer[self.cursor..];
        match rest.find(';') {
            // Multiple commands in buffer
            // Take first command and update head index
            Some(index) => {
                self.cursor += index + 1;
                &rest[..index]
            }
            // Rest of buffer is 1 command
            None => {
                self.cursor = self.buffer.len();
                rest
            }
        }
    }
}

impl SourceReader for Terminal {
    fn read(&mut self) -> Option<&str> {
        // Reached end of line buffer: read new line
        if self.cursor >= self.buffer.len() && !self.read_line() {
            return None;
        }
        Some(self.get_next_command())
    }
}
