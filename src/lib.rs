pub mod debugger;
pub mod emu;
mod nibble;

pub use emu::{Chip8, Chip8Error, Chip8Result, Chip8Runner, RunnerConfig};
pub use nibble::u4;
