use super::commands::{
    BreakpointAction, Command, CommandError, CommandResult, KeyState, SetTarget,
};
use crate::emu::{Chip8, Chip8Result, Chip8Runner, Chip8RunnerResult, MEMORY_SIZE, Opcode, Snapshot};
use std::collections::HashSet;
use std::path::Path;

/// Emulated time covered by one `run` frame.
const FRAME_TIME: f32 = 1.0 / 60.0;

pub struct Executor {
    runner: Chip8Runner,
    breakpoints: HashSet<u16>,
    /// Kept so `reset` can reload it into the cleared memory
    program: Vec<u8>,
}

impl Executor {
    pub fn new(runner: Chip8Runner, program: Vec<u8>) -> Self {
        Self {
            runner,
            breakpoints: HashSet::new(),
            program,
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run { frames } => self.execute_run(frames),
            Command::Step { count } => self.execute_step(count),
            Command::Breakpoint { action } => self.handle_breakpoint(action),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Regs => Ok(CommandResult::Registers),
            Command::Mem { start, len } => self.handle_mem(start, len),
            Command::Disasm { start, len } => self.handle_disasm(start, len),
            Command::Key { key, state } => {
                self.runner.set_key(key, state == KeyState::Down);
                Ok(CommandResult::Ok)
            }
            Command::Save { path } => self.handle_save(&path),
            Command::Load { path } => self.handle_load(&path),
            Command::Reset => {
                let chip8 = self.runner.chip8_mut();
                chip8.reset();
                chip8.load_program(&self.program)?;
                Ok(CommandResult::Ok)
            }
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    /// Runs whole frames of emulated time until a breakpoint or exit.
    pub fn execute_run(&mut self, frames: u32) -> Result<CommandResult, CommandError> {
        for _ in 0..frames {
            let result = self
                .runner
                .update_with_breakpoints(FRAME_TIME, Some(&self.breakpoints))?;

            if result != Chip8RunnerResult::Ok {
                return Ok(CommandResult::Stopped(result));
            }
        }

        Ok(CommandResult::Stopped(Chip8RunnerResult::Ok))
    }

    pub fn execute_step(&mut self, count: u32) -> Result<CommandResult, CommandError> {
        for _ in 0..count {
            if self.runner.chip8_mut().step()? == Chip8Result::Exit {
                return Ok(CommandResult::Stopped(Chip8RunnerResult::Exited));
            }
        }

        Ok(CommandResult::Stopped(Chip8RunnerResult::Ok))
    }

    pub fn chip8(&self) -> &Chip8 {
        self.runner.chip8_ref()
    }

    pub fn breakpoints(&self) -> &HashSet<u16> {
        &self.breakpoints
    }

    fn handle_breakpoint(
        &mut self,
        action: BreakpointAction,
    ) -> Result<CommandResult, CommandError> {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut bps: Vec<u16> = self.breakpoints.iter().copied().collect();
                bps.sort();
                return Ok(CommandResult::Breakpoints(bps));
            }
        };

        Ok(CommandResult::Ok)
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let chip8 = self.runner.chip8_mut();

        match target {
            SetTarget::V(reg) => chip8.set_v(reg, byte(value)?),
            SetTarget::Dt => chip8.set_delay_timer(byte(value)?),
            SetTarget::St => chip8.set_sound_timer(byte(value)?),
            SetTarget::I => chip8.set_i(address(value)?),
            SetTarget::Pc => chip8.set_pc(address(value)?),
        }

        Ok(CommandResult::Ok)
    }

    fn handle_mem(&self, start: u16, len: u16) -> Result<CommandResult, CommandError> {
        let start = address(start)?;
        let end = (start as usize + len as usize).min(MEMORY_SIZE);

        Ok(CommandResult::MemDump {
            data: self.chip8().memory()[start as usize..end].to_vec(),
            offset: start,
        })
    }

    fn handle_disasm(&self, start: u16, len: u16) -> Result<CommandResult, CommandError> {
        let start = address(start)?;
        let memory = self.chip8().memory();

        let instructions = (start as usize..MEMORY_SIZE - 1)
            .step_by(2)
            .take(len as usize)
            .map(|addr| {
                let word = u16::from_be_bytes([memory[addr], memory[addr + 1]]);
                (addr as u16, Opcode::decode(word))
            })
            .collect();

        Ok(CommandResult::Disasm {
            instructions,
            offset: start,
        })
    }

    fn handle_save(&self, path: &Path) -> Result<CommandResult, CommandError> {
        let bytes = self.chip8().snapshot().to_bytes()?;
        std::fs::write(path, bytes)?;

        log::info!("Saved snapshot to {}", path.display());
        Ok(CommandResult::Ok)
    }

    fn handle_load(&mut self, path: &Path) -> Result<CommandResult, CommandError> {
        let snapshot = Snapshot::from_bytes(&std::fs::read(path)?)?;
        self.runner.chip8_mut().restore(&snapshot)?;

        Ok(CommandResult::Ok)
    }
}

fn byte(value: u16) -> Result<u8, CommandError> {
    u8::try_from(value).map_err(|_| CommandError::ValueOutOfRange)
}

fn address(value: u16) -> Result<u16, CommandError> {
    if (value as usize) < MEMORY_SIZE {
        Ok(value)
    } else {
        Err(CommandError::ValueOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::Cli;
    use crate::emu::{Chip8Error, RunnerConfig};
    use crate::u4;
    use clap::Parser;

    // ld v0, 0; add v0, 1; add v0, 1; jp 0x202
    const PROGRAM: [u8; 8] = [0x60, 0x00, 0x70, 0x01, 0x70, 0x01, 0x12, 0x02];

    fn executor() -> Executor {
        let mut chip8 = Chip8::new();
        chip8.load_program(&PROGRAM).unwrap();
        let config = RunnerConfig {
            cpu_hz: 600.0,
            timer_hz: 60.0,
        };
        Executor::new(Chip8Runner::with_config(chip8, config), PROGRAM.to_vec())
    }

    fn run(executor: &mut Executor, line: &str) -> Result<CommandResult, CommandError> {
        let command = Cli::try_parse_from(line.split_whitespace()).unwrap().command;
        executor.execute(command)
    }

    #[test]
    fn step_executes_single_instructions() {
        let mut executor = executor();

        run(&mut executor, "step 3").unwrap();

        assert_eq!(executor.chip8().pc(), 0x206);
        assert_eq!(executor.chip8().v()[0], 2);
    }

    #[test]
    fn run_stops_at_breakpoint() {
        let mut executor = executor();
        run(&mut executor, "b s 0x206").unwrap();

        let result = run(&mut executor, "run 10").unwrap();

        assert!(matches!(
            result,
            CommandResult::Stopped(Chip8RunnerResult::HitBreakpoint)
        ));
        assert_eq!(executor.chip8().pc(), 0x206);
    }

    #[test]
    fn run_reports_exit() {
        let mut chip8 = Chip8::new();
        chip8.load_program(&[0x00, 0xFD]).unwrap();
        let mut executor = Executor::new(Chip8Runner::new(chip8), vec![0x00, 0xFD]);

        let result = run(&mut executor, "run").unwrap();

        assert!(matches!(
            result,
            CommandResult::Stopped(Chip8RunnerResult::Exited)
        ));
    }

    #[test]
    fn breakpoints_are_listed_sorted() {
        let mut executor = executor();
        run(&mut executor, "b s 0x300").unwrap();
        run(&mut executor, "b s 0x204").unwrap();
        run(&mut executor, "b s 0x250").unwrap();
        run(&mut executor, "b c 0x250").unwrap();

        let CommandResult::Breakpoints(list) = run(&mut executor, "b l").unwrap() else {
            panic!("expected a breakpoint list");
        };
        assert_eq!(list, vec![0x204, 0x300]);

        run(&mut executor, "b ca").unwrap();
        assert!(executor.breakpoints().is_empty());
    }

    #[test]
    fn set_writes_state_and_checks_range() {
        let mut executor = executor();

        run(&mut executor, "set v5 0xAB").unwrap();
        run(&mut executor, "set i 0x300").unwrap();
        run(&mut executor, "set st 3").unwrap();

        assert_eq!(executor.chip8().v()[5], 0xAB);
        assert_eq!(executor.chip8().i(), 0x300);
        assert!(executor.chip8().should_beep());

        assert!(matches!(
            run(&mut executor, "set v1 0x100"),
            Err(CommandError::ValueOutOfRange)
        ));
        assert!(matches!(
            run(&mut executor, "set pc 0x1000"),
            Err(CommandError::ValueOutOfRange)
        ));
    }

    #[test]
    fn mem_dump_is_clamped_to_memory() {
        let exec = &mut executor();

        let CommandResult::MemDump { data, offset } = run(exec, "mem 0x200 4").unwrap() else {
            panic!("expected a memory dump");
        };
        assert_eq!(offset, 0x200);
        assert_eq!(data, vec![0x60, 0x00, 0x70, 0x01]);

        let CommandResult::MemDump { data, .. } = run(exec, "mem 0xFFC 16").unwrap() else {
            panic!("expected a memory dump");
        };
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn disasm_decodes_words() {
        let mut executor = executor();

        let CommandResult::Disasm { instructions, .. } = run(&mut executor, "d 0x202 3").unwrap()
        else {
            panic!("expected a disassembly");
        };

        assert_eq!(
            instructions,
            vec![
                (0x202, Opcode::AddRegImm { x: u4::new(0), nn: 1 }),
                (0x204, Opcode::AddRegImm { x: u4::new(0), nn: 1 }),
                (0x206, Opcode::Jump { nnn: 0x202 }),
            ]
        );
    }

    #[test]
    fn key_command_updates_keypad() {
        let mut executor = executor();

        run(&mut executor, "key a down").unwrap();
        assert!(executor.chip8().keypad()[0xA]);

        run(&mut executor, "key a up").unwrap();
        assert!(!executor.chip8().keypad()[0xA]);
    }

    #[test]
    fn reset_reloads_the_program() {
        let mut executor = executor();
        run(&mut executor, "step 4").unwrap();

        run(&mut executor, "reset").unwrap();

        assert_eq!(executor.chip8().pc(), 0x200);
        assert_eq!(executor.chip8().v()[0], 0);
        assert_eq!(executor.chip8().memory()[0x200..0x208], PROGRAM);
    }

    #[test]
    fn save_and_load_roundtrip_through_a_file() {
        let path = std::env::temp_dir().join(format!("chip8-vm-dbg-{}.json", std::process::id()));
        let mut executor = executor();
        run(&mut executor, "step 2").unwrap();

        run(&mut executor, &format!("save {}", path.display())).unwrap();
        run(&mut executor, "step 5").unwrap();
        run(&mut executor, &format!("load {}", path.display())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(executor.chip8().pc(), 0x204);
        assert_eq!(executor.chip8().v()[0], 1);
    }

    #[test]
    fn cpu_errors_surface_as_command_errors() {
        let mut executor = executor();
        run(&mut executor, "set pc 0x400").unwrap();

        assert!(matches!(
            run(&mut executor, "step"),
            Err(CommandError::Chip8Error(Chip8Error::UnknownInstruction {
                opcode: 0x0000
            }))
        ));
    }
}
