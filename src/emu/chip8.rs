use super::{
    BIG_FONT, BIG_FONT_END_ADDRESS, BIG_FONT_START_ADDRESS, Chip8Error, Chip8Result, FONT,
    FONT_END_ADDRESS, FONT_START_ADDRESS, Opcode, VideoMemory,
};
use crate::u4;
use std::ops::Range;

// Standard CHIP-8 memory layout
pub const PROGRAM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START_ADDRESS;
pub const STACK_DEPTH: usize = 16;
pub const FLAG_REGISTERS: usize = 8;

/// CHIP-8 virtual machine state
#[derive(Clone)]
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32, or 128x64 in extended mode
    pub(crate) video: VideoMemory,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Super-CHIP persistent flag registers, written by Fx75
    pub(crate) r: [u8; FLAG_REGISTERS],

    /// Return addresses; `stack[..sp]` are live frames
    pub(crate) stack: [u16; STACK_DEPTH],
    pub(crate) sp: usize,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],

    /// Set when video memory changed; cleared by the display sink
    pub(crate) refresh_screen: bool,
    /// Mirrors `sound_timer != 0`
    pub(crate) play_beep: bool,
    /// Set by 00FD; cleared by reset
    pub(crate) halted: bool,
}

impl Chip8 {
    /// Creates a machine in its power-on state (see [`Chip8::reset`]).
    pub fn new() -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            video: VideoMemory::new(),
            pc: PROGRAM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            r: [0; FLAG_REGISTERS],
            stack: [0; STACK_DEPTH],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            refresh_screen: false,
            play_beep: false,
            halted: false,
        };
        chip8.install_fonts();
        chip8
    }

    /// Returns every field to its power-on value and reinstalls the fonts.
    ///
    /// Memory is zeroed, so a program has to be loaded again afterwards.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Copies a program into memory starting at 0x200.
    ///
    /// Fails without touching memory if the program does not fit between
    /// 0x200 and 0xFFF.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        let program_end = PROGRAM_START_ADDRESS + program.len();
        self.memory
            .get_mut(PROGRAM_START_ADDRESS..program_end)
            .ok_or(Chip8Error::ProgramTooLarge {
                size: program.len(),
                max_size: MAX_PROGRAM_SIZE,
            })?
            .copy_from_slice(program);

        log::info!("Loaded {} byte program at {:#05X}", program.len(), PROGRAM_START_ADDRESS);
        Ok(())
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// Once 00FD has run, this returns [`Chip8Result::Exit`] without
    /// fetching anything until the machine is reset.
    pub fn step(&mut self) -> Result<Chip8Result, Chip8Error> {
        if self.halted {
            return Ok(Chip8Result::Exit);
        }

        let opcode = self.fetch()?;
        let decoded_opcode = Opcode::decode(opcode);
        log::trace!("{:03X}: {opcode:04X} {decoded_opcode:?}", self.pc.wrapping_sub(2));

        self.execute(decoded_opcode)
    }

    /// Updates the delay and sound timers. Should be called at 60Hz,
    /// independently of [`Chip8::step`].
    pub fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        self.play_beep = self.sound_timer != 0;
    }

    /// Returns true while the sound timer is non-zero.
    pub fn should_beep(&self) -> bool {
        self.play_beep
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Replace the whole keypad state at once.
    pub fn set_keys(&mut self, keys: [bool; 16]) {
        self.keypad = keys;
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.video.get(x, y)
    }

    pub fn video(&self) -> &VideoMemory {
        &self.video
    }

    /// Whether the display changed since the sink last acknowledged it.
    pub fn needs_refresh(&self) -> bool {
        self.refresh_screen
    }

    /// Reads and clears the refresh flag.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_screen)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn set_i(&mut self, i: u16) {
        self.i = i;
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn set_v(&mut self, x: u4, value: u8) {
        self.v[x] = value;
    }

    pub fn r(&self) -> &[u8; FLAG_REGISTERS] {
        &self.r
    }

    /// Live call stack frames, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.delay_timer = value;
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn set_sound_timer(&mut self, value: u8) {
        self.sound_timer = value;
        self.play_beep = value != 0;
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.keypad
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    fn install_fonts(&mut self) {
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.memory[BIG_FONT_START_ADDRESS..BIG_FONT_END_ADDRESS].copy_from_slice(&BIG_FONT);
    }

    /// Fetches the next 16-bit opcode from memory and advances the program counter.
    fn fetch(&mut self) -> Result<u16, Chip8Error> {
        let at = self.mem_bounds(self.pc, 2)?.start;
        let opcode = u16::from_be_bytes([self.memory[at], self.memory[at + 1]]);
        self.pc = self.pc.wrapping_add(2);

        Ok(opcode)
    }

    /// Bounds-checked index range of `len` bytes starting at `addr`.
    pub(crate) fn mem_bounds(&self, addr: u16, len: usize) -> Result<Range<usize>, Chip8Error> {
        let start = addr as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            // Report the first address that falls outside memory
            let address = start.max(MEMORY_SIZE) as u16;
            return Err(Chip8Error::MemoryOutOfBounds { address });
        }

        Ok(start..end)
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_installs_fonts_and_sets_pc() {
        let chip8 = Chip8::new();

        assert_eq!(chip8.pc(), 0x200);
        assert_eq!(&chip8.memory()[..80], &FONT);
        assert_eq!(&chip8.memory()[0x50..0xF0], &BIG_FONT);
        assert!(chip8.memory()[0xF0..].iter().all(|b| *b == 0));
    }

    #[test]
    fn reset_twice_matches_reset_once() {
        let mut chip8 = Chip8::new();
        chip8.load_program(&[0x60, 0x01, 0x12, 0x00]).unwrap();
        chip8.step().unwrap();
        chip8.set_key(u4::new(3), true);

        chip8.reset();
        let once = chip8.clone();
        chip8.reset();

        assert_eq!(chip8.memory()[..], once.memory()[..]);
        assert_eq!(chip8.v(), once.v());
        assert_eq!(chip8.pc(), once.pc());
        assert_eq!(chip8.keypad(), &[false; 16]);
        assert!(chip8.video() == once.video());
    }

    #[test]
    fn load_program_accepts_exactly_max_size() {
        let mut chip8 = Chip8::new();
        let program = vec![0xAB; MAX_PROGRAM_SIZE];

        chip8.load_program(&program).unwrap();

        assert_eq!(MAX_PROGRAM_SIZE, 0xFFF - 0x200 + 1);
        assert_eq!(chip8.memory()[0xFFF], 0xAB);
        assert_eq!(chip8.memory()[0x1FF], 0);
    }

    #[test]
    fn load_program_rejects_one_byte_too_many() {
        let mut chip8 = Chip8::new();
        let program = vec![0xAB; MAX_PROGRAM_SIZE + 1];

        let err = chip8.load_program(&program).unwrap_err();

        assert!(matches!(
            err,
            Chip8Error::ProgramTooLarge {
                size: 3585,
                max_size: 3584
            }
        ));
        // Nothing was copied
        assert_eq!(chip8.memory()[0x200], 0);
    }

    #[test]
    fn fetch_past_end_of_memory_fails() {
        let mut chip8 = Chip8::new();
        chip8.set_pc(0xFFF);

        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        ));
        assert_eq!(chip8.pc(), 0xFFF);
    }

    #[test]
    fn timers_count_down_to_zero_and_drive_beep() {
        let mut chip8 = Chip8::new();
        chip8.set_delay_timer(2);
        chip8.set_sound_timer(1);
        assert!(chip8.should_beep());

        chip8.timers_cycle();
        assert_eq!(chip8.delay_timer(), 1);
        assert_eq!(chip8.sound_timer(), 0);
        assert!(!chip8.should_beep());

        chip8.timers_cycle();
        chip8.timers_cycle();
        assert_eq!(chip8.delay_timer(), 0);
    }

    #[test]
    fn take_refresh_clears_flag() {
        let mut chip8 = Chip8::new();
        chip8.load_program(&[0x00, 0xE0]).unwrap();
        chip8.step().unwrap();

        assert!(chip8.needs_refresh());
        assert!(chip8.take_refresh());
        assert!(!chip8.needs_refresh());
    }

    #[test]
    fn mem_bounds_reports_first_bad_address() {
        let chip8 = Chip8::new();

        assert_eq!(chip8.mem_bounds(0xFFE, 2).unwrap(), 0xFFE..0x1000);
        assert!(matches!(
            chip8.mem_bounds(0xFFE, 3),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        ));
        assert!(matches!(
            chip8.mem_bounds(0x1234, 1),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1234 })
        ));
    }
}
