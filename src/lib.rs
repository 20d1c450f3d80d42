// Machine
pub mod bits;
pub mod instr;
pub mod state;

// Running
pub mod device;
pub mod runtime;
pub use runtime::{Simulator, Status};
mod term;

// Assembling and loading
pub mod asm;
pub use asm::{assemble, Assembly};
pub mod image;
pub use image::Image;
pub mod os;

// Control surface
pub mod debugger;
#[macro_use]
pub mod output;

pub mod env;
pub mod error;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
