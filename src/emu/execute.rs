use super::{
    BIG_FONT_GLYPH_SIZE, BIG_FONT_START_ADDRESS, Chip8, Chip8Error, Chip8Result,
    FONT_GLYPH_SIZE, FONT_START_ADDRESS, Opcode, OpcodeALU, STACK_DEPTH,
};
use crate::u4;

/// Highest address reachable by the 12-bit address space.
const ADDRESS_MAX: u16 = 0xFFF;
/// Columns moved by 00FB and 00FC.
const HORIZONTAL_SCROLL: usize = 4;

impl Chip8 {
    /// Applies one decoded instruction. `pc` already points past it.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<Chip8Result, Chip8Error> {
        match opcode {
            Opcode::ClearDisplay => {
                self.video.clear();
                self.refresh_screen = true;
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                if self.sp >= STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow {
                        address: nnn,
                        depth: self.sp,
                    });
                }
                self.stack[self.sp] = self.pc;
                self.sp += 1;
                self.pc = nnn;
            }
            Opcode::Return => {
                self.sp = self.sp.checked_sub(1).ok_or(Chip8Error::StackUnderflow)?;
                self.pc = self.stack[self.sp];
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = rand::random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                let value = u16::from(self.v[x]);
                self.v[0xF] = u8::from(self.i.saturating_add(value) > ADDRESS_MAX);
                self.i = self.i.wrapping_add(value);
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::ScrollDown { n } => {
                self.video.scroll_down(n.into());
                self.refresh_screen = true;
            }
            Opcode::ScrollRight => {
                self.video.scroll_right(HORIZONTAL_SCROLL);
                self.refresh_screen = true;
            }
            Opcode::ScrollLeft => {
                self.video.scroll_left(HORIZONTAL_SCROLL);
                self.refresh_screen = true;
            }
            Opcode::LowRes | Opcode::HighRes => {
                let extended = opcode == Opcode::HighRes;
                log::debug!("Switching to {} resolution", if extended { "high" } else { "low" });
                self.video.set_extended(extended);
                self.refresh_screen = true;
            }
            Opcode::Exit => {
                log::debug!("Program exited at {:#05X}", self.pc.wrapping_sub(2));
                self.halted = true;
                return Ok(Chip8Result::Exit);
            }
            Opcode::SkipIfPressed { x } => {
                self.skip_if(self.keypad[u4::from_low_bits(self.v[x])]);
            }
            Opcode::SkipIfNotPressed { x } => {
                self.skip_if(!self.keypad[u4::from_low_bits(self.v[x])]);
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
                self.play_beep = self.sound_timer != 0;
            }
            Opcode::FontChar { x } => {
                // VX is not masked; values above 0xF point past the small font
                let offset = u16::from(self.v[x]) * FONT_GLYPH_SIZE as u16;
                self.i = FONT_START_ADDRESS as u16 + offset;
            }
            Opcode::BigFontChar { x } => {
                let digit = usize::from(self.v[x] & 0x0F);
                self.i = (BIG_FONT_START_ADDRESS + digit * BIG_FONT_GLYPH_SIZE) as u16;
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                let range = self.mem_bounds(self.i, 3)?;
                self.memory[range].copy_from_slice(&[value / 100, (value / 10) % 10, value % 10]);
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let range = self.mem_bounds(self.i, count)?;
                self.memory[range].copy_from_slice(&self.v[..count]);
                self.i = self.i.wrapping_add(count as u16);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let range = self.mem_bounds(self.i, count)?;
                self.v[..count].copy_from_slice(&self.memory[range]);
                self.i = self.i.wrapping_add(count as u16);
            }
            Opcode::StoreFlags { x } => {
                let count = usize::from(x) + 1;
                self.r[..count].copy_from_slice(&self.v[..count]);
            }
            Opcode::LoadFlags { x } => {
                let count = usize::from(x) + 1;
                self.v[..count].copy_from_slice(&self.r[..count]);
            }
            Opcode::Unknown(opcode) => {
                log::debug!("Unknown instruction {opcode:04X} at {:#05X}", self.pc.wrapping_sub(2));
                return Err(Chip8Error::UnknownInstruction { opcode });
            }
        };

        Ok(Chip8Result::Continue)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = if overflow { 1 } else { 0 };
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = if borrow { 0 } else { 1 }; // Notice that borrow is inverted
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = if borrow { 0 } else { 1 };
            }
            OpcodeALU::ShiftRight => {
                let lsb = self.v[x] & 1;
                self.v[x] >>= 1;
                self.v[0xF] = lsb;
            }
            OpcodeALU::ShiftLeft => {
                let msb = (self.v[x] >> 7) & 1;
                self.v[x] <<= 1;
                self.v[0xF] = msb;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<Chip8Result, Chip8Error> {
        let x_pos = usize::from(self.v[x]);
        let y_pos = usize::from(self.v[y]);

        // Dxy0 draws a 16x16 sprite in extended mode and nothing otherwise
        let (rows, width) = match usize::from(n) {
            0 if self.video.is_extended() => (16, 16),
            n => (n, 8),
        };
        let bytes_per_row = width / 8;
        let range = self.mem_bounds(self.i, rows * bytes_per_row)?;

        let mut any_erased = false;
        for (row, bytes) in self.memory[range].chunks_exact(bytes_per_row).enumerate() {
            let bits = bytes.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b));
            any_erased |= self.video.xor_row(x_pos, y_pos + row, bits, width);
        }

        self.v[0xF] = if any_erased { 1 } else { 0 };
        self.refresh_screen = true;
        Ok(Chip8Result::WaitForNextFrame)
    }

    fn execute_wait_for_key(&mut self, x: u4) -> Chip8Result {
        // The highest pressed key wins when several are down
        if let Some(key) = (0..16u8).rev().find(|key| self.keypad[usize::from(*key)]) {
            self.v[x] = key;
            return Chip8Result::Continue;
        }

        // Repeat this instruction until a key is pressed
        self.pc = self.pc.wrapping_sub(2);
        Chip8Result::WaitForNextFrame
    }
}
