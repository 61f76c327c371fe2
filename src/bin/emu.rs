use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap_num::maybe_hex;

use chip8_vm::{
    Chip8, Chip8Runner, RunnerConfig,
    emu::{Chip8RunnerResult, Snapshot},
    u4,
};

/// Emulated time covered by one frame.
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Headless CHIP-8 interpreter.
///
/// Runs a ROM for a fixed number of 60Hz frames and prints the final screen.
/// Set RUST_LOG=trace to log every executed instruction.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Number of 60Hz frames to emulate
    #[arg(short, long, default_value = "600")]
    frames: u32,

    /// Instructions executed per second
    #[arg(long, default_value = "700")]
    cpu_hz: f32,

    /// Timer decrements per second
    #[arg(long, default_value = "60")]
    timer_hz: f32,

    /// Keypad keys (0-F) held down for the whole run
    #[arg(long = "hold", value_parser = maybe_hex::<u8>)]
    held_keys: Vec<u8>,

    /// Restore this snapshot after loading the ROM
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a snapshot here when the run ends
    #[arg(long)]
    save_state: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    anyhow::ensure!(
        args.cpu_hz > 0.0 && args.timer_hz > 0.0,
        "Clock rates must be positive"
    );

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let mut chip8 = Chip8::new();
    chip8
        .load_program(&rom)
        .context("Failed to load ROM into CHIP-8 memory")?;

    if let Some(path) = &args.load_state {
        let bytes = std::fs::read(path).context("Failed to read snapshot file")?;
        let snapshot = Snapshot::from_bytes(&bytes).context("Failed to decode snapshot")?;
        chip8
            .restore(&snapshot)
            .context("Failed to restore snapshot")?;
    }

    for &key in &args.held_keys {
        anyhow::ensure!(key < 16, "Key {key:#X} is not on the keypad");
        chip8.set_key(u4::new(key), true);
    }

    let config = RunnerConfig {
        cpu_hz: args.cpu_hz,
        timer_hz: args.timer_hz,
    };
    let mut runner = Chip8Runner::with_config(chip8, config);

    let mut frames_run = 0;
    while frames_run < args.frames {
        frames_run += 1;
        let result = runner.update(FRAME_TIME).context("Chip8 Execution error")?;
        if result == Chip8RunnerResult::Exited {
            log::info!("Program exited after {frames_run} frames");
            break;
        }
    }

    if let Some(path) = &args.save_state {
        let bytes = runner
            .chip8_ref()
            .snapshot()
            .to_bytes()
            .context("Failed to encode snapshot")?;
        std::fs::write(path, bytes).context("Failed to write snapshot file")?;
    }

    print!("{}", runner.chip8_ref().video());
    Ok(())
}
