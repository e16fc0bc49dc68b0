//! Display drivers: push a framebuffer to something a person can look at.
//!
//! The loop only calls [`MatrixDriver::push`] when the framebuffer is dirty.
//! Drivers also own the panel intensity (0-15, the range of the MAX7219 style
//! controllers these grids are usually built from).
//!
//! ## Rust concepts
//! - Trait objects (`Box<dyn MatrixDriver>`) so the loop doesn't care which
//!   driver it talks to
//! - `Arc<Mutex<T>>` to keep a handle on state after the driver is boxed
//! - Feature-gated code (`#[cfg(feature = "hardware")]`)

use crate::Color;
use crate::framebuffer::FrameBuffer;
use std::io::Write;
use std::sync::{Arc, Mutex};

pub const MIN_INTENSITY: u8 = 0;
pub const MAX_INTENSITY: u8 = 15;
pub const DEFAULT_INTENSITY: u8 = 1;

pub type DriverResult = Result<(), Box<dyn std::error::Error>>;

pub trait MatrixDriver {
    /// Show the current framebuffer contents.
    fn push(&mut self, fb: &FrameBuffer) -> DriverResult;

    fn intensity(&self) -> u8;

    /// Set the intensity, clamped to `MIN_INTENSITY..=MAX_INTENSITY`.
    /// Returns the value actually applied.
    fn set_intensity(&mut self, value: u8) -> u8;
}

pub fn clamp_intensity(value: i64) -> u8 {
    value.clamp(i64::from(MIN_INTENSITY), i64::from(MAX_INTENSITY)) as u8
}

/// Map intensity 0-15 to a brightness percentage. 0 is dim, not off.
pub fn intensity_percent(intensity: u8) -> u8 {
    let level = u16::from(intensity.min(MAX_INTENSITY)) + 1;
    (level * 100 / (u16::from(MAX_INTENSITY) + 1)) as u8
}

// ── Terminal preview ─────────────────────────────────────────────────

/// Draws the grid in the terminal with ANSI true-color escapes.
pub struct TerminalDriver {
    color: Color,
    intensity: u8,
}

impl TerminalDriver {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            intensity: DEFAULT_INTENSITY,
        }
    }

    /// Render one frame as text: `●` for lit cells, `·` for dark ones.
    pub fn frame_text(&self, fb: &FrameBuffer) -> String {
        let lit = self.color.apply_brightness(intensity_percent(self.intensity));
        let mut out = String::from("\x1b[H");
        for y in 0..fb.height() {
            for x in 0..fb.width() {
                if fb.get_pixel(x, y) {
                    out.push_str(&format!("\x1b[38;2;{};{};{}m●", lit.r, lit.g, lit.b));
                } else {
                    out.push_str("\x1b[38;2;40;40;40m·");
                }
            }
            out.push_str("\x1b[0m\n");
        }
        out
    }
}

impl MatrixDriver for TerminalDriver {
    fn push(&mut self, fb: &FrameBuffer) -> DriverResult {
        let text = self.frame_text(fb);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    fn intensity(&self) -> u8 {
        self.intensity
    }

    fn set_intensity(&mut self, value: u8) -> u8 {
        self.intensity = value.min(MAX_INTENSITY);
        self.intensity
    }
}

// ── Headless ─────────────────────────────────────────────────────────

/// Discards frames. Useful on machines without a display attached.
#[derive(Default)]
pub struct HeadlessDriver {
    intensity: u8,
    pushes: u64,
}

impl MatrixDriver for HeadlessDriver {
    fn push(&mut self, fb: &FrameBuffer) -> DriverResult {
        self.pushes += 1;
        tracing::trace!("Frame {} ({} cells lit)", self.pushes, fb.lit_count());
        Ok(())
    }

    fn intensity(&self) -> u8 {
        self.intensity
    }

    fn set_intensity(&mut self, value: u8) -> u8 {
        self.intensity = value.min(MAX_INTENSITY);
        self.intensity
    }
}

// ── Recording (tests and tooling) ────────────────────────────────────

/// What a [`RecordingDriver`] has seen so far.
#[derive(Debug, Default)]
pub struct RecordingState {
    /// Row bitmasks of every pushed frame, oldest first
    pub frames: Vec<Vec<u32>>,
    pub intensity: u8,
}

/// Keeps every pushed frame. Clones share the same recording.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    state: Arc<Mutex<RecordingState>>,
    intensity: u8,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u32>> {
        self.state.lock().map(|s| s.frames.clone()).unwrap_or_default()
    }

    pub fn last_frame(&self) -> Option<Vec<u32>> {
        self.state.lock().ok().and_then(|s| s.frames.last().cloned())
    }
}

impl MatrixDriver for RecordingDriver {
    fn push(&mut self, fb: &FrameBuffer) -> DriverResult {
        let mut state = self.state.lock().map_err(|_| "recording state poisoned")?;
        state.frames.push(fb.rows().to_vec());
        Ok(())
    }

    fn intensity(&self) -> u8 {
        self.intensity
    }

    fn set_intensity(&mut self, value: u8) -> u8 {
        self.intensity = value.min(MAX_INTENSITY);
        if let Ok(mut state) = self.state.lock() {
            state.intensity = self.intensity;
        }
        self.intensity
    }
}

// ── RGB panel (hardware) ─────────────────────────────────────────────

/// Draws the grid on an RGB LED panel, each cell scaled up to a square block.
#[cfg(feature = "hardware")]
pub struct PanelDriver {
    matrix: rpi_led_matrix::LedMatrix,
    canvas: Option<rpi_led_matrix::LedCanvas>,
    color: Color,
    intensity: u8,
    cell: u32,
    offset: (u32, u32),
}

#[cfg(feature = "hardware")]
impl PanelDriver {
    /// `grid` is the logical cell grid, `panel` the physical LED panel.
    pub fn new(
        grid: crate::PanelConfig,
        panel: crate::PanelConfig,
        color: Color,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let matrix = crate::create_matrix(panel)?;
        let canvas = matrix.offscreen_canvas();

        let cell = (panel.cols / grid.cols.max(1))
            .min(panel.rows / grid.rows.max(1))
            .max(1) as u32;
        let used_w = cell * grid.cols as u32;
        let used_h = cell * grid.rows as u32;
        let offset = (
            (panel.cols as u32).saturating_sub(used_w) / 2,
            (panel.rows as u32).saturating_sub(used_h) / 2,
        );

        Ok(Self {
            matrix,
            canvas: Some(canvas),
            color,
            intensity: DEFAULT_INTENSITY,
            cell,
            offset,
        })
    }
}

#[cfg(feature = "hardware")]
impl MatrixDriver for PanelDriver {
    fn push(&mut self, fb: &FrameBuffer) -> DriverResult {
        let mut canvas = self.canvas.take().ok_or("panel canvas missing")?;
        let lit: rpi_led_matrix::LedColor = self
            .color
            .apply_brightness(intensity_percent(self.intensity))
            .into();

        canvas.clear();
        for y in 0..fb.height() {
            for x in 0..fb.width() {
                if !fb.get_pixel(x, y) {
                    continue;
                }
                let px = self.offset.0 + x as u32 * self.cell;
                let py = self.offset.1 + y as u32 * self.cell;
                for dy in 0..self.cell {
                    for dx in 0..self.cell {
                        canvas.set((px + dx) as i32, (py + dy) as i32, &lit);
                    }
                }
            }
        }
        self.canvas = Some(self.matrix.swap(canvas));
        Ok(())
    }

    fn intensity(&self) -> u8 {
        self.intensity
    }

    fn set_intensity(&mut self, value: u8) -> u8 {
        self.intensity = value.min(MAX_INTENSITY);
        self.intensity
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(-5, 0)]
    #[case(0, 0)]
    #[case(7, 7)]
    #[case(15, 15)]
    #[case(99, 15)]
    fn test_clamp_intensity(#[case] input: i64, #[case] expected: u8) {
        assert_eq!(clamp_intensity(input), expected);
    }

    #[rstest]
    #[case(0, 6)]
    #[case(7, 50)]
    #[case(15, 100)]
    #[case(200, 100)]
    fn test_intensity_percent(#[case] intensity: u8, #[case] expected: u8) {
        assert_eq!(intensity_percent(intensity), expected);
    }

    #[test]
    fn recording_driver_shares_frames_between_clones() {
        let driver = RecordingDriver::new();
        let mut boxed: Box<dyn MatrixDriver> = Box::new(driver.clone());
        let mut fb = FrameBuffer::new(4, 2);
        fb.set_pixel(1, 0, true);
        boxed.push(&fb).unwrap();
        assert_eq!(driver.frames(), vec![vec![0b0010, 0]]);
        assert_eq!(driver.last_frame(), Some(vec![0b0010, 0]));
    }

    #[test]
    fn set_intensity_clamps() {
        let mut driver = HeadlessDriver::default();
        assert_eq!(driver.set_intensity(40), MAX_INTENSITY);
        assert_eq!(driver.intensity(), MAX_INTENSITY);
    }

    #[test]
    fn terminal_frame_has_one_line_per_row() {
        let driver = TerminalDriver::new(Color::new(255, 255, 255));
        let mut fb = FrameBuffer::new(3, 2);
        fb.set_pixel(0, 0, true);
        let text = driver.frame_text(&fb);
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.matches('●').count(), 1);
        assert_eq!(text.matches('·').count(), 5);
    }
}
