use std::fmt;

use crate::asm::SymbolTable;
use crate::debugger::{Breakpoints, Messages};
use crate::device::{self, Console, KeyPoll};
use crate::image::Image;
use crate::instr::{Instr, Operand};
use crate::state::{Machine, Register, PSR_CC, PSR_PRIORITY, PSR_USER};

/// Base of the interrupt vector table.
pub const INTERRUPT_TABLE: u16 = 0x0100;
pub const KEYBOARD_VECTOR: u16 = 0x01;
pub const KEYBOARD_PRIORITY: u16 = 1;

/// Outcome of the most recent step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Normal,
    /// PC reached a breakpoint.
    Breakpoint,
    /// `RTI` in user mode.
    PrivilegeException,
    /// Escape was pressed.
    UserInterrupt,
    /// The machine control register stopped the clock.
    Halted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::Breakpoint => "Breakpoint",
            Self::PrivilegeException => "Privilege exception",
            Self::UserInterrupt => "User interrupt",
            Self::Halted => "Halted",
        };
        f.write_str(name)
    }
}

/// The simulated computer: machine state, attached console and execution bookkeeping.
///
/// Execution control (running, breakpoints, loading) is implemented in [`crate::debugger`].
pub struct Simulator<C: Console> {
    pub(crate) machine: Machine,
    pub(crate) console: C,
    pub(crate) status: Status,
    pub(crate) breakpoints: Breakpoints,
    /// Instructions executed since the counter was last reset.
    pub(crate) instruction_count: u64,
    pub(crate) messages: Messages,
    /// Labels of the loaded program, usable as addresses in commands.
    pub(crate) symbols: SymbolTable,
    /// Installed again on every reset.
    pub(crate) system_image: Option<Image>,
}

impl<C: Console> Simulator<C> {
    /// Bare machine with nothing loaded.
    pub fn new(console: C) -> Self {
        Self {
            machine: Machine::new(),
            console,
            status: Status::Normal,
            breakpoints: Breakpoints::default(),
            instruction_count: 0,
            messages: Messages::default(),
            symbols: SymbolTable::default(),
            system_image: None,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Execute one fetch-execute cycle.
    pub fn step(&mut self) -> Status {
        self.status = Status::Normal;

        if device::poll_keyboard(&mut self.machine, &mut self.console) == KeyPoll::Escape {
            self.status = Status::UserInterrupt;
            return self.status;
        }
        device::service_display(&mut self.machine, &mut self.console);
        if !device::clock_enabled(&self.machine) {
            self.status = Status::Halted;
            return self.status;
        }

        // PC incremented before instruction is performed
        self.machine.mar = self.machine.pc;
        self.machine.pc = self.machine.pc.wrapping_add(1);

        if !self.check_interrupt() {
            let instr = self.machine.mem(self.machine.mar);
            self.machine.mdr = instr;
            self.machine.ir = instr;
            self.execute(Instr::decode(instr));
            self.instruction_count += 1;
        }

        if self.status == Status::Normal && self.breakpoints.contains(self.machine.pc) {
            self.status = Status::Breakpoint;
        }
        self.status
    }

    /// Dispatch the keyboard interrupt if it is pending and outranks the running program.
    fn check_interrupt(&mut self) -> bool {
        if device::keyboard_interrupt_requested(&self.machine)
            && KEYBOARD_PRIORITY > self.machine.priority()
        {
            self.dispatch_interrupt(KEYBOARD_VECTOR, KEYBOARD_PRIORITY);
            true
        } else {
            false
        }
    }

    fn dispatch_interrupt(&mut self, vector: u16, priority: u16) {
        let m = &mut self.machine;
        m.mdr = m.psr;
        m.psr = (m.psr & !PSR_PRIORITY) | ((priority << 8) & PSR_PRIORITY);
        if m.is_user_mode() {
            m.psr &= !PSR_USER;
            m.saved_usp = m.reg(Register::R6);
            *m.reg_mut(Register::R6) = m.saved_ssp;
        }

        let saved_psr = m.mdr;
        // The interrupted instruction was fetched but not executed
        let return_pc = m.pc.wrapping_sub(1);
        self.push(saved_psr);
        self.push(return_pc);

        let m = &mut self.machine;
        m.mar = INTERRUPT_TABLE.wrapping_add(vector);
        m.mdr = m.mem(m.mar);
        m.pc = m.mdr;
    }

    fn push(&mut self, val: u16) {
        let sp = self.machine.reg(Register::R6).wrapping_sub(1);
        *self.machine.reg_mut(Register::R6) = sp;
        self.write(sp, val);
    }

    fn pop(&mut self) -> u16 {
        let sp = self.machine.reg(Register::R6);
        let val = self.read(sp);
        *self.machine.reg_mut(Register::R6) = sp.wrapping_add(1);
        val
    }

    /// Memory read made by an instruction.
    fn read(&mut self, addr: u16) -> u16 {
        device::on_read(&mut self.machine, addr);
        self.machine.mar = addr;
        self.machine.mdr = self.machine.mem(addr);
        self.machine.mdr
    }

    /// Memory write made by an instruction.
    fn write(&mut self, addr: u16, val: u16) {
        device::on_write(&mut self.machine, addr);
        self.machine.mar = addr;
        self.machine.mdr = val;
        *self.machine.mem_mut(addr) = val;
    }

    #[inline]
    fn set_cc(&mut self, val: u16) {
        let flag = if val & 0x8000 != 0 {
            0b100
        } else if val == 0 {
            0b010
        } else {
            0b001
        };
        self.machine.psr = (self.machine.psr & !PSR_CC) | flag;
    }

    /// Write `val` to `dest` and update the condition codes.
    fn load_reg(&mut self, dest: Register, val: u16) {
        *self.machine.reg_mut(dest) = val;
        self.set_cc(val);
    }

    fn operand(&self, operand: Operand) -> u16 {
        match operand {
            Operand::Reg(reg) => self.machine.reg(reg),
            Operand::Imm5(imm) => imm,
        }
    }

    fn pc_relative(&self, offset: u16) -> u16 {
        self.machine.pc.wrapping_add(offset)
    }

    fn execute(&mut self, instr: Instr) {
        match instr {
            Instr::Br { cond, offset } => {
                if cond.0 & self.machine.psr & PSR_CC != 0 {
                    self.machine.pc = self.pc_relative(offset);
                }
            }
            Instr::Add { dest, src, operand } => {
                let val = self.machine.reg(src).wrapping_add(self.operand(operand));
                self.load_reg(dest, val);
            }
            Instr::And { dest, src, operand } => {
                let val = self.machine.reg(src) & self.operand(operand);
                self.load_reg(dest, val);
            }
            Instr::Not { dest, src } => {
                let val = !self.machine.reg(src);
                self.load_reg(dest, val);
            }
            Instr::Ld { dest, offset } => {
                let val = self.read(self.pc_relative(offset));
                self.load_reg(dest, val);
            }
            Instr::Ldi { dest, offset } => {
                let ptr = self.read(self.pc_relative(offset));
                let val = self.read(ptr);
                self.load_reg(dest, val);
            }
            Instr::Ldr { dest, base, offset } => {
                let addr = self.machine.reg(base).wrapping_add(offset);
                let val = self.read(addr);
                self.load_reg(dest, val);
            }
            Instr::Lea { dest, offset } => {
                let val = self.pc_relative(offset);
                self.load_reg(dest, val);
            }
            Instr::St { src, offset } => {
                let val = self.machine.reg(src);
                self.write(self.pc_relative(offset), val);
            }
            Instr::Sti { src, offset } => {
                let val = self.machine.reg(src);
                let ptr = self.read(self.pc_relative(offset));
                self.write(ptr, val);
            }
            Instr::Str { src, base, offset } => {
                let val = self.machine.reg(src);
                let addr = self.machine.reg(base).wrapping_add(offset);
                self.write(addr, val);
            }
            Instr::Jsr { offset } => {
                let target = self.pc_relative(offset);
                *self.machine.reg_mut(Register::R7) = self.machine.pc;
                self.machine.pc = target;
            }
            Instr::Jsrr { base } => {
                // Read base first, `JSRR R7` jumps to the old link
                let target = self.machine.reg(base);
                *self.machine.reg_mut(Register::R7) = self.machine.pc;
                self.machine.pc = target;
            }
            Instr::Jmp { base } => self.machine.pc = self.machine.reg(base),
            Instr::Ret => self.machine.pc = self.machine.reg(Register::R7),
            Instr::Rti => self.rti(),
            Instr::Trap { vect } => {
                *self.machine.reg_mut(Register::R7) = self.machine.pc;
                self.machine.pc = self.read(vect as u16);
            }
            Instr::Reserved => (),
        }
    }

    fn rti(&mut self) {
        if self.machine.is_user_mode() {
            self.status = Status::PrivilegeException;
            return;
        }
        let pc = self.pop();
        let psr = self.pop();
        let m = &mut self.machine;
        m.pc = pc;
        m.psr = psr;
        if m.is_user_mode() {
            m.saved_ssp = m.reg(Register::R6);
            *m.reg_mut(Register::R6) = m.saved_usp;
        }
    }
}
