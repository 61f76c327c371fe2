use crate::u4;

/// CHIP-8 and Super-CHIP instructions.
///
/// The fields (x, y, n, nn, nnn) correspond to the operands encoded in the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3xnn - Skip next instruction if Vx == nn.
    SkipRegEqualImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    SetRegImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn.
    AddRegImm { x: u4, nn: u8 },
    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx, VF = overflow past 0xFFF.
    AddIndexReg { x: u4 },

    /// 8xyN - ALU operations
    ALU { x: u4, y: u4, op: OpcodeALU },
    /// Cxnn - Set Vx = random byte AND nn.
    Random { x: u4, nn: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// Dxyn - Display sprite.
    Draw { x: u4, y: u4, n: u4 },
    /// 00Cn - Scroll the display down n lines.
    ScrollDown { n: u4 },
    /// 00FB - Scroll the display right 4 pixels.
    ScrollRight,
    /// 00FC - Scroll the display left 4 pixels.
    ScrollLeft,
    /// 00FE - Switch to 64x32 resolution.
    LowRes,
    /// 00FF - Switch to 128x64 resolution.
    HighRes,
    /// 00FD - Exit the interpreter.
    Exit,

    /// Ex9E - Skip next instruction if key with the value of Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key with the value of Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Wait for a key press, store the value of the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of small font glyph for digit Vx.
    FontChar { x: u4 },
    /// Fx30 - Set I = location of large font glyph for digit Vx.
    BigFontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    BCD { x: u4 },

    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },
    /// Fx75 - Store V0 through Vx in the R flag registers (x <= 7).
    StoreFlags { x: u4 },
    /// Fx85 - Read V0 through Vx from the R flag registers (x <= 7).
    LoadFlags { x: u4 },

    /// Any word that does not match a known instruction.
    Unknown(u16),
}

/// ALU operations for the 8xyN instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeALU {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy, VF = carry
    Add,
    /// 8xy5 - Vx = Vx - Vy, VF = NOT borrow
    Sub,
    /// 8xy6 - Vx = Vx SHR 1, VF = shifted out bit
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx, VF = NOT borrow
    SubReverse,
    /// 8xyE - Vx = Vx SHL 1, VF = shifted out bit
    ShiftLeft,
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an `Opcode` enum variant.
    ///
    /// The top nibble picks the instruction family; families 0x0, 0x8, 0xE
    /// and 0xF dispatch a second time on their low bits.
    pub fn decode(opcode: u16) -> Self {
        let nibble = (
            ((opcode & 0xF000) >> 12) as u8,
            ((opcode & 0x0F00) >> 8) as u8,
            ((opcode & 0x00F0) >> 4) as u8,
            (opcode & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let nn = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        match nibble.0 {
            0x0 => Self::decode_system(opcode),
            0x1 => Opcode::Jump { nnn },
            0x2 => Opcode::Call { nnn },
            0x3 => Opcode::SkipRegEqualImm { x, nn },
            0x4 => Opcode::SkipRegNotEqualImm { x, nn },
            0x5 if nibble.3 == 0x0 => Opcode::SkipRegEqualReg { x, y },
            0x6 => Opcode::SetRegImm { x, nn },
            0x7 => Opcode::AddRegImm { x, nn },
            0x8 => match Self::decode_alu(nibble.3) {
                Some(op) => Opcode::ALU { x, y, op },
                None => Opcode::Unknown(opcode),
            },
            0x9 if nibble.3 == 0x0 => Opcode::SkipRegNotEqualReg { x, y },
            0xA => Opcode::SetIndexImm { nnn },
            0xB => Opcode::JumpWithOffset { nnn },
            0xC => Opcode::Random { x, nn },
            0xD => Opcode::Draw { x, y, n },
            0xE => match nn {
                0x9E => Opcode::SkipIfPressed { x },
                0xA1 => Opcode::SkipIfNotPressed { x },
                _ => Opcode::Unknown(opcode),
            },
            0xF => Self::decode_misc(opcode, x, nn),

            _ => Opcode::Unknown(opcode),
        }
    }

    fn decode_system(opcode: u16) -> Self {
        match opcode & 0x0FFF {
            0x0E0 => Opcode::ClearDisplay,
            0x0EE => Opcode::Return,
            0x0FB => Opcode::ScrollRight,
            0x0FC => Opcode::ScrollLeft,
            0x0FD => Opcode::Exit,
            0x0FE => Opcode::LowRes,
            0x0FF => Opcode::HighRes,
            low if low & 0xFF0 == 0x0C0 => Opcode::ScrollDown {
                n: u4::from_low_bits(low as u8),
            },
            _ => Opcode::Unknown(opcode),
        }
    }

    fn decode_alu(op: u8) -> Option<OpcodeALU> {
        match op {
            0x0 => Some(OpcodeALU::Set),
            0x1 => Some(OpcodeALU::Or),
            0x2 => Some(OpcodeALU::And),
            0x3 => Some(OpcodeALU::Xor),
            0x4 => Some(OpcodeALU::Add),
            0x5 => Some(OpcodeALU::Sub),
            0x6 => Some(OpcodeALU::ShiftRight),
            0x7 => Some(OpcodeALU::SubReverse),
            0xE => Some(OpcodeALU::ShiftLeft),
            _ => None,
        }
    }

    fn decode_misc(opcode: u16, x: u4, nn: u8) -> Self {
        match nn {
            0x07 => Opcode::ReadDelayTimer { x },
            0x0A => Opcode::WaitForKey { x },
            0x15 => Opcode::SetDelayTimer { x },
            0x18 => Opcode::SetSoundTimer { x },
            0x1E => Opcode::AddIndexReg { x },
            0x29 => Opcode::FontChar { x },
            0x30 => Opcode::BigFontChar { x },
            0x33 => Opcode::BCD { x },
            0x55 => Opcode::StoreRegs { x },
            0x65 => Opcode::LoadRegs { x },
            // Only eight R registers exist
            0x75 if x.get() <= 7 => Opcode::StoreFlags { x },
            0x85 if x.get() <= 7 => Opcode::LoadFlags { x },
            _ => Opcode::Unknown(opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operand_fields() {
        assert_eq!(
            Opcode::decode(0xD123),
            Opcode::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(3)
            }
        );
        assert_eq!(Opcode::decode(0xA2F0), Opcode::SetIndexImm { nnn: 0x2F0 });
        assert_eq!(
            Opcode::decode(0x6A05),
            Opcode::SetRegImm {
                x: u4::new(0xA),
                nn: 0x05
            }
        );
    }

    #[test]
    fn decodes_system_family_on_low_byte() {
        assert_eq!(Opcode::decode(0x00E0), Opcode::ClearDisplay);
        assert_eq!(Opcode::decode(0x00EE), Opcode::Return);
        assert_eq!(Opcode::decode(0x00C7), Opcode::ScrollDown { n: u4::new(7) });
        assert_eq!(Opcode::decode(0x00FB), Opcode::ScrollRight);
        assert_eq!(Opcode::decode(0x00FC), Opcode::ScrollLeft);
        assert_eq!(Opcode::decode(0x00FD), Opcode::Exit);
        assert_eq!(Opcode::decode(0x00FE), Opcode::LowRes);
        assert_eq!(Opcode::decode(0x00FF), Opcode::HighRes);

        // Machine code routines are not supported
        assert_eq!(Opcode::decode(0x0123), Opcode::Unknown(0x0123));
        assert_eq!(Opcode::decode(0x01E0), Opcode::Unknown(0x01E0));
    }

    #[test]
    fn decodes_every_alu_form() {
        let expected = [
            (0x0, OpcodeALU::Set),
            (0x1, OpcodeALU::Or),
            (0x2, OpcodeALU::And),
            (0x3, OpcodeALU::Xor),
            (0x4, OpcodeALU::Add),
            (0x5, OpcodeALU::Sub),
            (0x6, OpcodeALU::ShiftRight),
            (0x7, OpcodeALU::SubReverse),
            (0xE, OpcodeALU::ShiftLeft),
        ];

        for low in 0x0..=0xFu16 {
            let opcode = 0x8AB0 | low;
            let decoded = Opcode::decode(opcode);
            match expected.iter().find(|(n, _)| *n == low) {
                Some((_, op)) => assert_eq!(
                    decoded,
                    Opcode::ALU {
                        x: u4::new(0xA),
                        y: u4::new(0xB),
                        op: *op
                    }
                ),
                None => assert_eq!(decoded, Opcode::Unknown(opcode)),
            }
        }
    }

    #[test]
    fn register_compare_requires_zero_low_nibble() {
        assert!(matches!(Opcode::decode(0x5120), Opcode::SkipRegEqualReg { .. }));
        assert_eq!(Opcode::decode(0x5121), Opcode::Unknown(0x5121));
        assert!(matches!(Opcode::decode(0x9120), Opcode::SkipRegNotEqualReg { .. }));
        assert_eq!(Opcode::decode(0x912F), Opcode::Unknown(0x912F));
    }

    #[test]
    fn decodes_key_family() {
        assert_eq!(Opcode::decode(0xE39E), Opcode::SkipIfPressed { x: u4::new(3) });
        assert_eq!(Opcode::decode(0xE3A1), Opcode::SkipIfNotPressed { x: u4::new(3) });
        assert_eq!(Opcode::decode(0xE3A2), Opcode::Unknown(0xE3A2));
    }

    #[test]
    fn flag_registers_are_limited_to_eight() {
        assert_eq!(Opcode::decode(0xF775), Opcode::StoreFlags { x: u4::new(7) });
        assert_eq!(Opcode::decode(0xF785), Opcode::LoadFlags { x: u4::new(7) });
        assert_eq!(Opcode::decode(0xF875), Opcode::Unknown(0xF875));
        assert_eq!(Opcode::decode(0xF885), Opcode::Unknown(0xF885));
    }

    #[test]
    fn unknown_misc_forms_are_reported() {
        assert_eq!(Opcode::decode(0xF030), Opcode::BigFontChar { x: u4::new(0) });
        assert_eq!(Opcode::decode(0xF0FF), Opcode::Unknown(0xF0FF));
    }
}
