use super::{Chip8, Chip8Error, Chip8Result};
use crate::u4;
use std::collections::HashSet;

/// Clock rates used by [`Chip8Runner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Instructions executed per second.
    pub cpu_hz: f32,
    /// Timer decrements per second.
    pub timer_hz: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 700.0,
            timer_hz: 60.0,
        }
    }
}

/// Drives a [`Chip8`] from wall-clock deltas: timers tick at `timer_hz`
/// and instructions run at `cpu_hz`, each with its own accumulator.
pub struct Chip8Runner {
    chip8: Chip8,
    cpu_time_step: f32,
    timer_time_step: f32,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

/// Why [`Chip8Runner::update`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8RunnerResult {
    /// The pc landed on a breakpoint address after an instruction.
    HitBreakpoint,
    /// The program ran 00FD; further updates return this without executing.
    Exited,
    /// The time slice was used up, or a draw or key wait ended the frame.
    Ok,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self::with_config(chip8, RunnerConfig::default())
    }

    pub fn with_config(chip8: Chip8, config: RunnerConfig) -> Self {
        Self {
            chip8,
            cpu_time_step: 1.0 / config.cpu_hz,
            timer_time_step: 1.0 / config.timer_hz,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Advances the machine by `dt` seconds.
    ///
    /// Pending timer ticks are applied first, then instructions run until the
    /// CPU budget is spent. A step that yields `WaitForNextFrame` or `Exit`
    /// drops the leftover budget so the next call does not catch up.
    pub fn update(&mut self, dt: f32) -> Result<Chip8RunnerResult, Chip8Error> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like [`Chip8Runner::update`], but stops as soon as the pc reaches an
    /// address in `breakpoints`. The instruction at that address has not run.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<Chip8RunnerResult, Chip8Error> {
        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= self.timer_time_step {
            self.timer_dt_accumulator -= self.timer_time_step;
            self.chip8.timers_cycle();
        }

        while self.cpu_dt_accumulator >= self.cpu_time_step {
            self.cpu_dt_accumulator -= self.cpu_time_step;

            let cpu_result = self.chip8.step().inspect_err(|_| {
                self.cpu_dt_accumulator = 0.0;
            })?;

            if let Some(breakpoints) = &breakpoints
                && breakpoints.contains(&self.chip8.pc())
            {
                self.cpu_dt_accumulator = 0.0;
                return Ok(Chip8RunnerResult::HitBreakpoint);
            }

            match cpu_result {
                Chip8Result::WaitForNextFrame => {
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                Chip8Result::Exit => {
                    self.cpu_dt_accumulator = 0.0;
                    return Ok(Chip8RunnerResult::Exited);
                }
                Chip8Result::Continue => {}
            }
        }

        Ok(Chip8RunnerResult::Ok)
    }

    /// Mirrors [`Chip8::should_beep`].
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Reads one pixel of the active resolution; out of range reads as off.
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.get_display_pixel(y, x)
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(opcodes: &[u16], config: RunnerConfig) -> Chip8Runner {
        let program: Vec<u8> = opcodes.iter().flat_map(|op| op.to_be_bytes()).collect();
        let mut chip8 = Chip8::new();
        chip8.load_program(&program).unwrap();
        Chip8Runner::with_config(chip8, config)
    }

    const SLOW: RunnerConfig = RunnerConfig {
        cpu_hz: 10.0,
        timer_hz: 5.0,
    };

    #[test]
    fn runs_cycles_in_proportion_to_elapsed_time() {
        // add v0, 1; jump back
        let mut runner = runner_with(&[0x7001, 0x1200], SLOW);

        runner.update(0.45).unwrap();

        // Four cycles: two adds and two jumps
        assert_eq!(runner.chip8_ref().v()[0], 2);
    }

    #[test]
    fn timers_tick_independently_of_cpu() {
        let mut runner = runner_with(&[0x1200], SLOW);
        runner.chip8_mut().set_delay_timer(10);

        runner.update(1.1).unwrap();

        assert_eq!(runner.chip8_ref().delay_timer(), 5);
    }

    #[test]
    fn draw_ends_the_frame_early() {
        let mut runner = runner_with(&[0xD001, 0x7001, 0x1202], SLOW);

        runner.update(1.0).unwrap();
        assert_eq!(runner.chip8_ref().pc(), 0x202);
        assert_eq!(runner.chip8_ref().v()[0], 0);

        // Leftover time was dropped, so only one more cycle runs
        runner.update(0.15).unwrap();
        assert_eq!(runner.chip8_ref().v()[0], 1);
    }

    #[test]
    fn stops_at_breakpoint() {
        let mut runner = runner_with(&[0x7001, 0x7001, 0x7001, 0x1200], SLOW);
        let breakpoints = HashSet::from([0x204]);

        let result = runner
            .update_with_breakpoints(10.0, Some(&breakpoints))
            .unwrap();

        assert_eq!(result, Chip8RunnerResult::HitBreakpoint);
        assert_eq!(runner.chip8_ref().pc(), 0x204);
        assert_eq!(runner.chip8_ref().v()[0], 2);
    }

    #[test]
    fn reports_exit() {
        let mut runner = runner_with(&[0x00FD], SLOW);

        assert_eq!(runner.update(1.0).unwrap(), Chip8RunnerResult::Exited);
        assert!(runner.chip8_ref().is_halted());

        // Stays halted without fetching anything new
        assert_eq!(runner.update(1.0).unwrap(), Chip8RunnerResult::Exited);
        assert_eq!(runner.chip8_ref().pc(), 0x202);
    }

    #[test]
    fn propagates_errors() {
        let mut runner = runner_with(&[0xFFFF], SLOW);

        assert!(matches!(
            runner.update(1.0),
            Err(Chip8Error::UnknownInstruction { opcode: 0xFFFF })
        ));
    }
}
