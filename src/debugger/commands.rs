use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;

use crate::emu::{Chip8Error, Chip8RunnerResult, Opcode, SnapshotError};
use crate::u4;

#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Run for a number of 60Hz frames, stopping at breakpoints
    #[command(visible_alias = "r")]
    Run {
        #[arg(default_value = "60")]
        frames: u32,
    },

    /// Execute single instructions, ignoring timers
    #[command(visible_alias = "s")]
    Step {
        #[arg(default_value = "1")]
        count: u32,
    },

    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    /// Write a register, the index, the program counter or a timer
    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Show registers, timers and the call stack
    #[command(visible_alias = "reg")]
    Regs,

    /// Hex dump of memory
    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "64", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Decode instructions starting at an address
    #[command(visible_alias = "d")]
    Disasm {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "16", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Press or release a keypad key
    #[command(visible_alias = "k")]
    Key {
        #[arg(value_parser = parse_key)]
        key: u4,
        state: KeyState,
    },

    /// Write a state snapshot to a file
    Save { path: PathBuf },

    /// Restore a state snapshot from a file
    Load { path: PathBuf },

    /// Power-cycle the machine and reload the program
    Reset,

    #[command(visible_alias = "q")]
    Quit,
}

pub enum CommandResult {
    Ok,
    Stopped(Chip8RunnerResult),
    Registers,
    Breakpoints(Vec<u16>),
    MemDump { data: Vec<u8>, offset: u16 },
    Disasm { instructions: Vec<(u16, Opcode)>, offset: u16 },
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Error while executing cpu instruction: {0}")]
    Chip8Error(#[from] Chip8Error),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Value out of range")]
    ValueOutOfRange,
}

#[derive(Subcommand, Clone)]
pub enum BreakpointAction {
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "l")]
    List,

    #[command(visible_alias = "ca")]
    ClearAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
    Dt,
    St,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KeyState {
    Down,
    Up,
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),
        "dt" => Ok(SetTarget::Dt),
        "st" => Ok(SetTarget::St),

        _ if lower.starts_with('v') => {
            let hex_str = &lower[1..];
            match u8::from_str_radix(hex_str, 16) {
                Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
                _ => Err(format!("Invalid register: '{}'", s)),
            }
        }

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}

fn parse_key(s: &str) -> Result<u4, String> {
    let digits = s.trim_start_matches("0x");
    match u8::from_str_radix(digits, 16) {
        Ok(val) if val < 16 => Ok(u4::new(val)),
        _ => Err(format!("Invalid key: '{}', expected 0-F", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        Cli::try_parse_from(line.split_whitespace()).map(|cli| cli.command)
    }

    #[test]
    fn parses_aliases_and_defaults() {
        assert!(matches!(parse("s").unwrap(), Command::Step { count: 1 }));
        assert!(matches!(parse("step 5").unwrap(), Command::Step { count: 5 }));
        assert!(matches!(parse("r").unwrap(), Command::Run { frames: 60 }));
        assert!(matches!(parse("q").unwrap(), Command::Quit));
        assert!(matches!(
            parse("m").unwrap(),
            Command::Mem {
                start: 0x200,
                len: 64
            }
        ));
    }

    #[test]
    fn parses_hex_addresses() {
        assert!(matches!(
            parse("b s 0x2A0").unwrap(),
            Command::Breakpoint {
                action: BreakpointAction::Set { addr: 0x2A0 }
            }
        ));
        assert!(matches!(
            parse("disasm 0x300 4").unwrap(),
            Command::Disasm {
                start: 0x300,
                len: 4
            }
        ));
    }

    #[test]
    fn parses_set_targets() {
        assert!(matches!(
            parse("set vA 0x10").unwrap(),
            Command::Set {
                target: SetTarget::V(reg),
                value: 0x10
            } if reg == u4::new(0xA)
        ));
        assert!(matches!(
            parse("set pc 512").unwrap(),
            Command::Set {
                target: SetTarget::Pc,
                value: 512
            }
        ));
        assert!(parse("set vG 1").is_err());
        assert!(parse("set sp 1").is_err());
    }

    #[test]
    fn parses_key_commands() {
        assert!(matches!(
            parse("key f down").unwrap(),
            Command::Key {
                key,
                state: KeyState::Down
            } if key == u4::new(0xF)
        ));
        assert!(matches!(
            parse("k 0x3 up").unwrap(),
            Command::Key {
                state: KeyState::Up,
                ..
            }
        ));
        assert!(parse("key 10 down").is_err());
    }
}
