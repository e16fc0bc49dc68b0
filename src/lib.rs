//! Drive a monochrome LED grid with periodic visualizations.
//!
//! The crate is built around one cooperative loop: each iteration polls the
//! active visualization's scheduler, lets it redraw the shared framebuffer,
//! and pushes the framebuffer to a driver when it changed.
//!
//! - [`framebuffer`]: the shared one-bit-per-cell grid
//! - [`scheduler`]: drift-free interval timer with catch-up
//! - [`visualization`]: the generator capability, the registry, and the
//!   snow simulation
//! - [`driver`]: terminal, headless, recording and RGB-panel outputs
//! - [`render`]: the context object and the loop
//! - [`control`]: transport-agnostic control operations

pub mod control;
pub mod driver;
pub mod framebuffer;
pub mod render;
pub mod scheduler;
pub mod visualization;

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default grid width (four chained 8x8 modules).
pub const MATRIX_COLS: usize = 32;
/// Default grid height.
pub const MATRIX_ROWS: usize = 8;

// ── Panel configuration ────────────────────────────────────────────

/// Grid dimensions in cells.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two usizes).
/// Dimensions are chosen once at startup and passed down explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: usize,
    pub cols: usize,
}

impl PanelConfig {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells on the grid.
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rows: MATRIX_ROWS,
            cols: MATRIX_COLS,
        }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Color used for lit cells on drivers that can show color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

impl Default for Color {
    /// Cool white, close to the look of snow on a panel.
    fn default() -> Self {
        Self::new(200, 220, 255)
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Create an RGB matrix for a physical panel of the given size.
///
/// Initialization fails when not running as root or when GPIO is
/// unavailable; the error is propagated to the caller.
#[cfg(feature = "hardware")]
pub fn create_matrix(panel: PanelConfig) -> Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows as u32);
    options.set_cols(panel.cols as u32);
    options.set_hardware_mapping("adafruit-hat");
    options.set_pwm_bits(8)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2);

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;
    Ok(matrix)
}

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The signal handler runs on its own thread, so the flag it shares with
/// the main loop is an `AtomicBool` behind an `Arc`.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn panel_config_default_is_32x8() {
        let panel = PanelConfig::default();
        assert_eq!(panel.rows, 8);
        assert_eq!(panel.cols, 32);
    }

    #[rstest]
    #[case(8, 32, 256)]
    #[case(3, 4, 12)]
    #[case(16, 16, 256)]
    fn test_pixel_count(#[case] rows: usize, #[case] cols: usize, #[case] expected: usize) {
        assert_eq!(PanelConfig::new(rows, cols).pixel_count(), expected);
    }

    #[test]
    fn apply_brightness_100_is_identity() {
        let c = Color::new(100, 200, 50);
        assert_eq!(c.apply_brightness(100), c);
    }

    #[test]
    fn apply_brightness_0_is_black() {
        let c = Color::new(255, 255, 255);
        assert_eq!(c.apply_brightness(0), Color::new(0, 0, 0));
    }

    #[test]
    fn apply_brightness_50_halves() {
        let c = Color::new(200, 100, 50);
        assert_eq!(c.apply_brightness(50), Color::new(100, 50, 25));
    }

    #[test]
    fn running_flag_reads_atomic() {
        let flag = AtomicBool::new(true);
        assert!(is_running(&flag));
        flag.store(false, Ordering::SeqCst);
        assert!(!is_running(&flag));
    }
}
