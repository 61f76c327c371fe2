use serde::{Deserialize, Serialize};

use super::{Chip8, FLAG_REGISTERS, MEMORY_SIZE, STACK_DEPTH, VideoMemory};

/// Errors produced while encoding, decoding or restoring a [`Snapshot`].
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Invalid snapshot: {reason}")]
    Invalid { reason: String },
}

/// A full copy of the machine state, for saving and restoring.
///
/// Arrays are stored as vectors so the layout stays independent of the
/// compile-time sizes; [`Chip8::restore`] checks every length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub memory: Vec<u8>,
    pub v: Vec<u8>,
    pub r: Vec<u8>,
    pub i: u16,
    pub pc: u16,
    pub stack: Vec<u16>,
    pub sp: usize,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub extended_graphics: bool,
    /// Active pixels only, row-major
    pub video: Vec<bool>,
    pub keypad: Vec<bool>,
    pub refresh_screen: bool,
    pub play_beep: bool,
    pub halted: bool,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn invalid(reason: impl Into<String>) -> SnapshotError {
    SnapshotError::Invalid {
        reason: reason.into(),
    }
}

fn fixed<T: Copy, const N: usize>(field: &str, values: &[T]) -> Result<[T; N], SnapshotError> {
    values.try_into().map_err(|_| {
        invalid(format!(
            "{field} has {} entries, expected {N}",
            values.len()
        ))
    })
}

impl Chip8 {
    /// Captures the whole machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            memory: self.memory.to_vec(),
            v: self.v.to_vec(),
            r: self.r.to_vec(),
            i: self.i,
            pc: self.pc,
            stack: self.stack.to_vec(),
            sp: self.sp,
            delay_timer: self.delay_timer,
            sound_timer: self.sound_timer,
            extended_graphics: self.video.is_extended(),
            video: self.video.pixels().to_vec(),
            keypad: self.keypad.to_vec(),
            refresh_screen: self.refresh_screen,
            play_beep: self.play_beep,
            halted: self.halted,
        }
    }

    /// Replaces the whole machine state with `snapshot`.
    ///
    /// Every field is validated first; on error the machine is unchanged.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let memory: [u8; MEMORY_SIZE] = fixed("memory", &snapshot.memory)?;
        let v: [u8; 16] = fixed("v", &snapshot.v)?;
        let r: [u8; FLAG_REGISTERS] = fixed("r", &snapshot.r)?;
        let stack: [u16; STACK_DEPTH] = fixed("stack", &snapshot.stack)?;
        let keypad: [bool; 16] = fixed("keypad", &snapshot.keypad)?;

        if snapshot.sp > STACK_DEPTH {
            return Err(invalid(format!(
                "stack pointer {} exceeds depth {STACK_DEPTH}",
                snapshot.sp
            )));
        }

        let video = VideoMemory::from_parts(snapshot.extended_graphics, &snapshot.video)
            .ok_or_else(|| {
                invalid(format!(
                    "video has {} pixels, which does not match the {} resolution",
                    snapshot.video.len(),
                    if snapshot.extended_graphics { "extended" } else { "standard" }
                ))
            })?;

        *self = Chip8 {
            memory,
            video,
            pc: snapshot.pc,
            i: snapshot.i,
            v,
            r,
            stack,
            sp: snapshot.sp,
            delay_timer: snapshot.delay_timer,
            sound_timer: snapshot.sound_timer,
            keypad,
            refresh_screen: snapshot.refresh_screen,
            // Always mirrors the sound timer
            play_beep: snapshot.sound_timer != 0,
            halted: snapshot.halted,
        };

        log::info!("Restored snapshot at pc {:#05X}", self.pc);
        Ok(())
    }
}
