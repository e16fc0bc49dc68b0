//! Monochrome framebuffer: one bit per LED, one `u32` bitmask per row.
//!
//! The active visualization writes into the framebuffer; the driver reads it
//! whenever the dirty flag says something changed since the last refresh.
//!
//! ## Rust concepts
//! - Bit manipulation on unsigned integers (`1 << x`, `&`, `|`, `!`)
//! - Out-of-range input handled by returning early instead of panicking
//! - `#[must_use]` on methods whose return value carries information

use crate::PanelConfig;

/// Widest row a framebuffer can hold (bits in a `u32`).
pub const MAX_COLUMNS: usize = u32::BITS as usize;

/// Bitmask with the lowest `width` bits set.
pub fn row_mask(width: usize) -> u32 {
    if width >= MAX_COLUMNS {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────────

/// A fixed-size 2-D grid of on/off cells.
///
/// Bit `x` of `rows[y]` is the cell at column `x`, row `y` (row 0 is the top,
/// column 0 the leftmost). Bits at or above `width` are never set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    rows: Vec<u32>,
    dirty: bool,
}

impl FrameBuffer {
    /// Create an all-off framebuffer. Widths above [`MAX_COLUMNS`] are clamped.
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.min(MAX_COLUMNS);
        Self {
            width,
            height,
            rows: vec![0; height],
            dirty: false,
        }
    }

    pub fn for_panel(panel: PanelConfig) -> Self {
        Self::new(panel.cols, panel.rows)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Turn a cell on or off. Returns whether the cell actually changed.
    ///
    /// Out-of-range coordinates are ignored and report `false`.
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let mask = 1u32 << x;
        let before = self.rows[y];
        if on {
            self.rows[y] |= mask;
        } else {
            self.rows[y] &= !mask;
        }
        let changed = self.rows[y] != before;
        self.dirty |= changed;
        changed
    }

    /// Read a cell. Out-of-range coordinates read as off.
    pub fn get_pixel(&self, x: usize, y: usize) -> bool {
        self.in_bounds(x, y) && (self.rows[y] >> x) & 1 == 1
    }

    /// Turn every cell off and mark the buffer dirty.
    pub fn clear(&mut self) {
        self.rows.fill(0);
        self.dirty = true;
    }

    /// Set every in-range cell to `on` and mark the buffer dirty.
    pub fn fill(&mut self, on: bool) {
        let value = if on { row_mask(self.width) } else { 0 };
        self.rows.fill(value);
        self.dirty = true;
    }

    /// Raw bitmask for row `y` (bit x = column x), or 0 if out of range.
    pub fn row_bits(&self, y: usize) -> u32 {
        self.rows.get(y).copied().unwrap_or(0)
    }

    /// All row bitmasks, top to bottom.
    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    /// Number of lit cells.
    pub fn lit_count(&self) -> usize {
        self.rows.iter().map(|r| r.count_ones() as usize).sum()
    }

    /// True when there are changes the driver has not consumed yet.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.dirty
    }

    /// Mark the current contents as pushed to the hardware.
    pub fn refresh(&mut self) {
        self.dirty = false;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::for_panel(PanelConfig::default())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(31, 7)]
    #[case(5, 3)]
    fn set_then_get_round_trips(#[case] x: usize, #[case] y: usize) {
        let mut fb = FrameBuffer::new(32, 8);
        assert!(fb.set_pixel(x, y, true));
        assert!(fb.get_pixel(x, y));
        assert!(fb.set_pixel(x, y, false));
        assert!(!fb.get_pixel(x, y));
    }

    #[rstest]
    #[case(4, 0)]
    #[case(0, 3)]
    #[case(100, 100)]
    fn out_of_range_is_ignored(#[case] x: usize, #[case] y: usize) {
        let mut fb = FrameBuffer::new(4, 3);
        assert!(!fb.set_pixel(x, y, true));
        assert!(!fb.get_pixel(x, y));
        assert!(!fb.needs_refresh());
        assert_eq!(fb.rows(), &[0, 0, 0]);
    }

    #[test]
    fn setting_same_value_reports_unchanged() {
        let mut fb = FrameBuffer::new(4, 3);
        assert!(fb.set_pixel(1, 1, true));
        fb.refresh();
        assert!(!fb.set_pixel(1, 1, true));
        assert!(!fb.needs_refresh());
    }

    #[test]
    fn fill_is_idempotent() {
        let mut fb = FrameBuffer::new(4, 3);
        fb.fill(true);
        let once = fb.rows().to_vec();
        fb.fill(true);
        assert_eq!(fb.rows(), once.as_slice());
        assert_eq!(once, vec![0b1111; 3]);

        fb.fill(false);
        let cleared = fb.rows().to_vec();
        fb.fill(false);
        assert_eq!(fb.rows(), cleared.as_slice());
        assert_eq!(cleared, vec![0; 3]);
    }

    #[test]
    fn fill_full_width_row_uses_all_bits() {
        let mut fb = FrameBuffer::new(32, 2);
        fb.fill(true);
        assert_eq!(fb.row_bits(0), u32::MAX);
        assert_eq!(fb.lit_count(), 64);
    }

    #[test]
    fn clear_marks_dirty_even_when_empty() {
        let mut fb = FrameBuffer::new(4, 3);
        assert!(!fb.needs_refresh());
        fb.clear();
        assert!(fb.needs_refresh());
        fb.refresh();
        assert!(!fb.needs_refresh());
    }

    #[test]
    fn row_bits_uses_bit_x_for_column_x() {
        let mut fb = FrameBuffer::new(8, 2);
        fb.set_pixel(0, 1, true);
        fb.set_pixel(3, 1, true);
        assert_eq!(fb.row_bits(1), 0b1001);
        assert_eq!(fb.row_bits(0), 0);
        assert_eq!(fb.row_bits(9), 0);
    }

    #[test]
    fn width_is_clamped_to_row_bits() {
        let fb = FrameBuffer::new(64, 4);
        assert_eq!(fb.width(), MAX_COLUMNS);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(3, 0b111)]
    #[case(32, u32::MAX)]
    #[case(40, u32::MAX)]
    fn test_row_mask(#[case] width: usize, #[case] expected: u32) {
        assert_eq!(row_mask(width), expected);
    }
}
