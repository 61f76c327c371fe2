/// Result type for a single CHIP-8 step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// Wait for the next frame before continuing
    /// (after a draw, or while FX0A is still waiting for a key).
    WaitForNextFrame,
    /// The program executed 00FD; the machine is halted until reset.
    Exit,
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("Program is too large ({size} bytes), max size is {max_size} bytes")]
    ProgramTooLarge { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },

    #[error("Stack overflow: call to {address:#05X} with {depth} frames already on the stack")]
    StackOverflow { address: u16, depth: usize },

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,

    #[error("Unknown instruction: {opcode:#06X}")]
    UnknownInstruction { opcode: u16 },
}

/// Standard resolution
pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// Super-CHIP extended resolution
pub const HIRES_DISPLAY_X: usize = 128;
pub const HIRES_DISPLAY_Y: usize = 64;
