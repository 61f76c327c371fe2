use super::{DISPLAY_X, DISPLAY_Y, HIRES_DISPLAY_X, HIRES_DISPLAY_Y};

const BUFFER_SIZE: usize = HIRES_DISPLAY_X * HIRES_DISPLAY_Y;

/// Monochrome pixel grid, stored row-major with a stride equal to the width
/// of the active resolution.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoMemory {
    pixels: [bool; BUFFER_SIZE],
    extended: bool,
}

impl VideoMemory {
    pub fn new() -> Self {
        Self {
            pixels: [false; BUFFER_SIZE],
            extended: false,
        }
    }

    pub fn width(&self) -> usize {
        if self.extended { HIRES_DISPLAY_X } else { DISPLAY_X }
    }

    pub fn height(&self) -> usize {
        if self.extended { HIRES_DISPLAY_Y } else { DISPLAY_Y }
    }

    /// Whether the 128x64 Super-CHIP resolution is active.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Switches resolution. The screen is cleared either way.
    pub fn set_extended(&mut self, extended: bool) {
        self.extended = extended;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.pixels = [false; BUFFER_SIZE];
    }

    /// Get the state of a pixel (true = on). Out of range coordinates read as off.
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width() || y >= self.height() {
            return false;
        }
        self.pixels[y * self.width() + x]
    }

    /// The active part of the buffer, `width() * height()` pixels.
    pub fn pixels(&self) -> &[bool] {
        &self.pixels[..self.width() * self.height()]
    }

    /// Iterates the rows of the active resolution, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels().chunks_exact(self.width())
    }

    /// XORs one sprite row onto the screen. The top `width` bits of `bits`
    /// (counted from bit `width - 1`) are plotted left to right starting at
    /// (`x`, `y`); coordinates wrap around both screen edges.
    ///
    /// Returns true if any lit pixel was turned off.
    pub fn xor_row(&mut self, x: usize, y: usize, bits: u16, width: usize) -> bool {
        let screen_w = self.width();
        let row = (y % self.height()) * screen_w;

        let mut erased = false;
        for col in 0..width {
            if bits & (1 << (width - 1 - col)) == 0 {
                continue;
            }

            let pixel = &mut self.pixels[row + (x + col) % screen_w];
            if *pixel {
                erased = true;
            }
            *pixel ^= true;
        }

        erased
    }

    /// Moves every row down by `lines`; vacated rows at the top turn off.
    pub fn scroll_down(&mut self, lines: usize) {
        let (w, h) = (self.width(), self.height());
        let lines = lines.min(h);

        self.pixels.copy_within(0..(h - lines) * w, lines * w);
        self.pixels[..lines * w].fill(false);
    }

    /// Moves every row right by `cols`; vacated columns on the left turn off.
    pub fn scroll_right(&mut self, cols: usize) {
        let (w, h) = (self.width(), self.height());
        let cols = cols.min(w);

        for row in self.pixels[..w * h].chunks_exact_mut(w) {
            row.copy_within(0..w - cols, cols);
            row[..cols].fill(false);
        }
    }

    /// Moves every row left by `cols`; vacated columns on the right turn off.
    pub fn scroll_left(&mut self, cols: usize) {
        let (w, h) = (self.width(), self.height());
        let cols = cols.min(w);

        for row in self.pixels[..w * h].chunks_exact_mut(w) {
            row.copy_within(cols..w, 0);
            row[w - cols..].fill(false);
        }
    }

    /// Rebuilds video memory from a resolution flag and the active pixels.
    /// Returns `None` if the pixel count does not match the resolution.
    pub(crate) fn from_parts(extended: bool, active: &[bool]) -> Option<Self> {
        let mut video = Self::new();
        video.extended = extended;
        if active.len() != video.width() * video.height() {
            return None;
        }

        video.pixels[..active.len()].copy_from_slice(active);
        Some(video)
    }
}

impl Default for VideoMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VideoMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoMemory")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("lit", &self.pixels().iter().filter(|p| **p).count())
            .finish()
    }
}

/// One text line per pixel row, lit pixels drawn as blocks.
impl std::fmt::Display for VideoMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.rows() {
            let line: String = row.iter().map(|lit| if *lit { '█' } else { ' ' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
