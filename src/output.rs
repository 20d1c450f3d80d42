use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::instr::disassemble;
use crate::state::Machine;

#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $kind).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        $crate::output::Output::Debugger($cond, Normal).print_str("\n");
    }};
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $kind).print_str(&s);
    }};
}

/// Where text goes. Program output is written to stdout, everything the simulator itself says
/// goes to stderr.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    Debugger(Condition, Kind),
}

/// Whether a message survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Normal,
    Info,
    Warning,
    Error,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        if let Some(ch) = Decolored::new(string).last() {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                print!("{}", string);
                Self::set_line_start_from_str(string);
            }
            Self::Debugger(condition, kind) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    let string = ColoredString::from(string);
                    let string = match kind {
                        Kind::Normal => string.blue(),
                        Kind::Info => string.green(),
                        Kind::Warning => string.yellow(),
                        Kind::Error => string.red(),
                    };
                    eprint!("{}", string);
                    Self::set_line_start_from_str(&string);
                }
                // Always remove color if `--minimal`
                (true, Condition::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    /// Program output may end mid-line; move simulator messages onto their own line.
    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    pub fn print_registers(&self, machine: &Machine) {
        if Self::is_minimal() {
            for (i, value) in machine.reg.iter().enumerate() {
                self.print_str(&format!("R{} {}\n", i, value));
            }
            self.print_str(&format!("PC {}\n", machine.pc));
            self.print_str(&format!("PSR {}\n", machine.psr));
            self.print_str(&format!("CC {}\n", machine.cc_char()));
            return;
        }

        self.print_str("\x1b[2m┌────────────────────────────────────┐\x1b[0m\n");
        self.print_str(
            "\x1b[2m│        \x1b[3mhex     int    uint    char\x1b[0m\x1b[2m │\x1b[0m\n",
        );
        for (i, value) in machine.reg.iter().enumerate() {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1mR{}\x1b[0m  ", i));
            self.print_integer(*value);
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(&format!(" \x1b[1mPC\x1b[0m  0x{:04x}", machine.pc));
        self.print_str(&format!("  \x1b[1mPSR\x1b[0m 0x{:04x}", machine.psr));
        self.print_str(&format!("    \x1b[1mCC\x1b[0m  {}", machine.cc_char()));
        self.print_str(" \x1b[2m│\x1b[0m\n");
        self.print_str(&format!(
            "\x1b[2m│\x1b[0m \x1b[1mIR\x1b[0m  0x{:04x}  \x1b[1mUSP\x1b[0m 0x{:04x}  \x1b[1mSSP\x1b[0m 0x{:04x} \x1b[2m│\x1b[0m\n",
            machine.ir, machine.saved_usp, machine.saved_ssp,
        ));
        self.print_str("\x1b[2m└────────────────────────────────────┘\x1b[0m\n");
    }

    pub fn print_integer(&self, value: u16) {
        if Self::is_minimal() {
            self.print_str(&format!("{}", value as i16));
            return;
        }
        self.print_str(&format!("0x{:04x}  ", value));
        self.print_str(&format!("{:-6}  ", value as i16));
        self.print_str(&format!("{:-6}  ", value));
        self.print_char_display(value);
    }

    fn print_char_display(&self, value: u16) {
        // Print 3 characters
        match value {
            0x00 => self.print_str("NUL"),
            0x08 => self.print_str("BS "),
            0x09 => self.print_str("HT "),
            0x0a => self.print_str("LF "),
            0x0d => self.print_str("CR "),
            0x1b => self.print_str("ESC"),
            0x7f => self.print_str("DEL"),
            0x20 => self.print_str("[_]"),
            0x21..=0x7e => self.print_str(&format!("{:<3}", value as u8 as char)),
            0x00..=0x7f => self.print_str("\x1b[2m───\x1b[0m"),
            0x0080.. => self.print_str("\x1b[2m┄┄┄\x1b[0m"),
        }
    }

    /// One line of a memory listing: address, value, binary, and disassembly.
    pub fn print_memory_line(
        &self,
        address: u16,
        word: u16,
        label: Option<&str>,
        is_pc: bool,
        is_breakpoint: bool,
    ) {
        let marker = match (is_pc, is_breakpoint) {
            (true, true) => "*>",
            (true, false) => " >",
            (false, true) => "* ",
            (false, false) => "  ",
        };
        let label = label.unwrap_or("");
        self.print_str(&format!(
            "{marker} x{address:04X}  x{word:04X}  {word:016b}  {label:<12} {}\n",
            disassemble(word)
        ));
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    let string: String = Decolored::new(string).collect();
    eprint!("{}", string);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }

    #[test]
    fn minimal_hides_sometimes() {
        Output::set_minimal(true);
        Output::set_line_start(true);
        Output::Debugger(Condition::Sometimes, Kind::Normal).print_str("hidden");
        assert!(Output::is_line_start());
        Output::Debugger(Condition::Always, Kind::Error).print_str("shown");
        assert!(!Output::is_line_start());
        Output::set_minimal(false);
    }
}
