use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;

use chip8_vm::{
    Chip8, Chip8Runner,
    debugger::{Cli, Command, CommandResult, Executor},
    emu::{Chip8RunnerResult, Opcode},
};

struct App {
    executor: Executor,
    last_command: Option<Command>,
    should_quit: bool,
}

impl App {
    fn new(rom: &[u8]) -> anyhow::Result<Self> {
        let mut chip8 = Chip8::new();
        chip8
            .load_program(rom)
            .context("Failed to load ROM into CHIP-8 memory")?;

        Ok(Self {
            executor: Executor::new(Chip8Runner::new(chip8), rom.to_vec()),
            last_command: None,
            should_quit: false,
        })
    }

    fn run(&mut self, input: impl BufRead, mut out: impl Write) -> anyhow::Result<()> {
        let mut lines = input.lines();

        while !self.should_quit {
            write!(out, "{:03X}> ", self.executor.chip8().pc())?;
            out.flush()?;

            let Some(line) = lines.next() else {
                break;
            };
            let output = self.handle_line(&line?);
            if !output.is_empty() {
                writeln!(out, "{output}")?;
            }
        }

        Ok(())
    }

    /// An empty line repeats the previous command.
    fn handle_line(&mut self, line: &str) -> String {
        if line.trim().is_empty() {
            return match self.last_command.clone() {
                Some(command) => self.execute_command(command),
                None => String::new(),
            };
        }

        match Cli::try_parse_from(line.split_whitespace()) {
            Ok(cli) => {
                self.last_command = Some(cli.command.clone());
                self.execute_command(cli.command)
            }
            Err(e) => {
                self.last_command = None;
                e.to_string()
            }
        }
    }

    fn execute_command(&mut self, command: Command) -> String {
        match self.executor.execute(command) {
            Ok(CommandResult::Ok) => "OK".to_string(),
            Ok(CommandResult::Quit) => {
                self.should_quit = true;
                String::new()
            }
            Ok(CommandResult::Stopped(reason)) => self.render_stop(reason),
            Ok(CommandResult::Registers) => self.render_registers(),
            Ok(CommandResult::Breakpoints(breakpoints)) => {
                let list: Vec<String> = breakpoints.iter().map(|bp| format!("{bp:03X}")).collect();
                format!("Breakpoints: [{}]", list.join(", "))
            }
            Ok(CommandResult::MemDump { data, offset }) => {
                let mut output = String::new();
                for (i, row) in data.chunks(16).enumerate() {
                    let bytes: Vec<String> = row.iter().map(|b| format!("{b:02X}")).collect();
                    output.push_str(&format!(
                        "{:03X}: {}\n",
                        offset as usize + i * 16,
                        bytes.join(" ")
                    ));
                }
                output.trim_end().to_string()
            }
            Ok(CommandResult::Disasm { instructions, .. }) => instructions
                .iter()
                .map(|(addr, opcode)| self.render_instruction(*addr, opcode))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => e.to_string(),
        }
    }

    fn render_stop(&self, reason: Chip8RunnerResult) -> String {
        let chip8 = self.executor.chip8();
        let status = match reason {
            Chip8RunnerResult::HitBreakpoint => "Hit breakpoint",
            Chip8RunnerResult::Exited => "Program exited",
            Chip8RunnerResult::Ok => "Stopped",
        };

        let mut output = format!("{status}\n{}", chip8.video());
        if let Some(next) = self.next_instruction() {
            output.push_str(&next);
        }
        output
    }

    fn next_instruction(&self) -> Option<String> {
        let chip8 = self.executor.chip8();
        let at = chip8.pc() as usize;
        let bytes = chip8.memory().get(at..at + 2)?;
        let opcode = Opcode::decode(u16::from_be_bytes([bytes[0], bytes[1]]));
        Some(self.render_instruction(chip8.pc(), &opcode))
    }

    fn render_instruction(&self, addr: u16, opcode: &Opcode) -> String {
        let marker = if self.executor.breakpoints().contains(&addr) { '*' } else { ' ' };
        format!("{marker}{addr:03X}: {opcode:?}")
    }

    fn render_registers(&self) -> String {
        let chip8 = self.executor.chip8();
        let mut lines = vec![
            format!("PC: {:03X}  I: {:03X}", chip8.pc(), chip8.i()),
            format!(
                "DT: {:02X}   ST: {:02X}",
                chip8.delay_timer(),
                chip8.sound_timer()
            ),
        ];

        let v = chip8.v();
        for idx in 0..8 {
            lines.push(format!(
                "V{:X}: {:02X}   V{:X}: {:02X}",
                idx,
                v[idx],
                idx + 8,
                v[idx + 8]
            ));
        }

        let r: Vec<String> = chip8.r().iter().map(|b| format!("{b:02X}")).collect();
        lines.push(format!("R:  {}", r.join(" ")));

        let stack: Vec<String> = chip8.stack().iter().map(|a| format!("{a:03X}")).collect();
        lines.push(format!("Stack: [{}]", stack.join(", ")));

        let keys: String = chip8
            .keypad()
            .iter()
            .enumerate()
            .map(|(key, down)| if *down { format!("{key:X}") } else { "-".to_string() })
            .collect();
        lines.push(format!("Keys: {keys}"));

        lines.join("\n")
    }
}

/// Line-oriented CHIP-8 debugger.
///
/// Reads commands from stdin; `help` lists them.
#[derive(Parser)]
struct Args {
    /// Path to the ROM file to load
    rom_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;
    let mut app = App::new(&rom).context("Failed to initialize application")?;

    app.run(io::stdin().lock(), io::stdout().lock())
}
