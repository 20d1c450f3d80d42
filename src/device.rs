//! Memory-mapped device registers and the consoles that back them.
//!
//! Each device pair is a status register, whose top bit is the ready flag, and a data register.
//! The runtime calls [`poll_keyboard`] and [`service_display`] once per step, and routes every
//! memory access made by an instruction through [`on_read`] or [`on_write`].

use std::collections::VecDeque;
use std::io::{self, IsTerminal, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

use crate::output::Output;
use crate::state::Machine;
use crate::term;

/// Keyboard status register.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register.
pub const KBDR: u16 = 0xFE02;
/// Display status register.
pub const DSR: u16 = 0xFE04;
/// Display data register.
pub const DDR: u16 = 0xFE06;
/// Machine control register. Clearing bit 15 stops the clock.
pub const MCR: u16 = 0xFFFE;

pub const READY: u16 = 0x8000;
pub const INTERRUPT_ENABLE: u16 = 0x4000;

/// Reserved for interrupting the simulator; never delivered to the program.
pub const ESCAPE: u8 = 0x1B;

/// Source of keystrokes and sink for display output.
pub trait Console {
    /// Next pending key, if any. Must not block.
    fn poll_key(&mut self) -> Option<u8>;
    fn write_byte(&mut self, byte: u8);

    /// Called before a batch of steps.
    fn begin(&mut self) {}
    /// Called after a batch of steps.
    fn end(&mut self) {}
}

/// Result of polling the keyboard for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPoll {
    Idle,
    Latched,
    Escape,
}

/// Capture at most one keystroke into the keyboard registers.
pub fn poll_keyboard(machine: &mut Machine, console: &mut impl Console) -> KeyPoll {
    match console.poll_key() {
        None => KeyPoll::Idle,
        Some(ESCAPE) => KeyPoll::Escape,
        Some(byte) => {
            *machine.mem_mut(KBSR) |= READY;
            *machine.mem_mut(KBDR) = byte as u16;
            KeyPoll::Latched
        }
    }
}

/// Emit the pending display character, if the program has written one.
pub fn service_display(machine: &mut Machine, console: &mut impl Console) {
    if machine.mem(DSR) & READY == 0 {
        console.write_byte((machine.mem(DDR) & 0xFF) as u8);
        *machine.mem_mut(DSR) |= READY;
    }
}

/// Side effects of an instruction reading `addr`. Must run before the read.
#[inline]
pub fn on_read(machine: &mut Machine, addr: u16) {
    if addr == KBDR {
        *machine.mem_mut(KBSR) &= !READY;
    }
}

/// Side effects of an instruction writing `addr`. Must run before the write.
#[inline]
pub fn on_write(machine: &mut Machine, addr: u16) {
    if addr == DDR {
        *machine.mem_mut(DSR) &= !READY;
    }
}

pub fn keyboard_interrupt_requested(machine: &Machine) -> bool {
    let kbsr = machine.mem(KBSR);
    kbsr & READY != 0 && kbsr & INTERRUPT_ENABLE != 0
}

pub fn clock_enabled(machine: &Machine) -> bool {
    machine.mem(MCR) & 0x8000 != 0
}

/// Pick the console matching how stdin is attached.
///
/// `stdin_reserved` is set when the debugger reads its commands from stdin, leaving no keys for
/// the program.
pub fn stdio_console(stdin_reserved: bool) -> Box<dyn Console> {
    if stdin_reserved {
        Box::new(OutputConsole)
    } else if io::stdin().is_terminal() {
        Box::new(TerminalConsole::new())
    } else {
        Box::new(PipedConsole::new())
    }
}

fn write_stdout(bytes: &[u8]) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(bytes);
    let _ = stdout.flush();
    if let Some(last) = bytes.last() {
        Output::set_line_start(*last == b'\n');
    }
}

impl<C: Console + ?Sized> Console for Box<C> {
    fn poll_key(&mut self) -> Option<u8> {
        (**self).poll_key()
    }
    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }
    fn begin(&mut self) {
        (**self).begin()
    }
    fn end(&mut self) {
        (**self).end()
    }
}

/// Interactive terminal. Keys are read as crossterm events while in raw mode.
#[derive(Debug, Default)]
pub struct TerminalConsole {
    is_raw: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self { is_raw: false }
    }
}

impl Console for TerminalConsole {
    fn poll_key(&mut self) -> Option<u8> {
        // Errors from the terminal are treated as no input
        if !event::poll(Duration::ZERO).unwrap_or(false) {
            return None;
        }
        let Ok(Event::Key(key)) = event::read() else {
            return None;
        };
        if matches!(key.kind, KeyEventKind::Release) {
            return None;
        }
        match (key.modifiers, key.code) {
            // Raw mode swallows SIGINT, so Ctrl+C interrupts the simulator like escape
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(ESCAPE),
            (_, KeyCode::Esc) => Some(ESCAPE),
            (_, KeyCode::Enter) => Some(b'\n'),
            (_, KeyCode::Backspace) => Some(0x08),
            (_, KeyCode::Tab) => Some(b'\t'),
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) if ch.is_ascii() => {
                Some(ch as u8)
            }
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) {
        // Raw mode does not translate line feeds
        if byte == b'\n' && self.is_raw {
            write_stdout(b"\r\n");
        } else {
            write_stdout(&[byte]);
        }
    }

    fn begin(&mut self) {
        if !self.is_raw {
            term::enable_raw_mode();
            self.is_raw = true;
        }
    }

    fn end(&mut self) {
        if self.is_raw {
            term::disable_raw_mode();
            self.is_raw = false;
        }
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        self.end();
    }
}

/// Stdin which is not attached to a terminal, i.e. piped.
///
/// A reader thread forwards bytes over a channel so polling never blocks.
#[derive(Debug)]
pub struct PipedConsole {
    input: Receiver<u8>,
    is_closed: bool,
}

impl PipedConsole {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for byte in stdin.lock().bytes() {
                let Ok(byte) = byte else {
                    break;
                };
                if sender.send(byte).is_err() {
                    break;
                }
            }
        });
        Self {
            input: receiver,
            is_closed: false,
        }
    }
}

impl Default for PipedConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for PipedConsole {
    fn poll_key(&mut self) -> Option<u8> {
        if self.is_closed {
            return None;
        }
        match self.input.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.is_closed = true;
                None
            }
        }
    }

    fn write_byte(&mut self, byte: u8) {
        write_stdout(&[byte]);
    }
}

/// Display only. The keyboard never becomes ready.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputConsole;

impl Console for OutputConsole {
    fn poll_key(&mut self) -> Option<u8> {
        None
    }

    fn write_byte(&mut self, byte: u8) {
        write_stdout(&[byte]);
    }
}

/// In-memory console with scripted input and captured output.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for BufferConsole {
    fn poll_key(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystroke_is_latched() {
        let mut machine = Machine::new();
        let mut console = BufferConsole::with_input("a");
        assert_eq!(poll_keyboard(&mut machine, &mut console), KeyPoll::Latched);
        assert_eq!(machine.mem(KBSR) & READY, READY);
        assert_eq!(machine.mem(KBDR), b'a' as u16);
        assert_eq!(poll_keyboard(&mut machine, &mut console), KeyPoll::Idle);
        // Ready flag stays until the program reads the data register
        assert_eq!(machine.mem(KBSR) & READY, READY);
    }

    #[test]
    fn escape_is_not_data() {
        let mut machine = Machine::new();
        let mut console = BufferConsole::with_input([ESCAPE]);
        assert_eq!(poll_keyboard(&mut machine, &mut console), KeyPoll::Escape);
        assert_eq!(machine.mem(KBSR), 0);
        assert_eq!(machine.mem(KBDR), 0);
    }

    #[test]
    fn display_handshake() {
        let mut machine = Machine::new();
        let mut console = BufferConsole::new();

        // Ready after reset, nothing to print
        service_display(&mut machine, &mut console);
        assert!(console.output.is_empty());

        on_write(&mut machine, DDR);
        *machine.mem_mut(DDR) = 0x0148; // only the low byte is printed
        assert_eq!(machine.mem(DSR) & READY, 0);

        service_display(&mut machine, &mut console);
        assert_eq!(console.output_str(), "H");
        assert_eq!(machine.mem(DSR) & READY, READY);
    }

    #[test]
    fn reading_data_clears_ready() {
        let mut machine = Machine::new();
        *machine.mem_mut(KBSR) = READY | INTERRUPT_ENABLE;
        assert!(keyboard_interrupt_requested(&machine));
        on_read(&mut machine, KBSR);
        assert!(keyboard_interrupt_requested(&machine));
        on_read(&mut machine, KBDR);
        assert_eq!(machine.mem(KBSR), INTERRUPT_ENABLE);
        assert!(!keyboard_interrupt_requested(&machine));
    }
}
