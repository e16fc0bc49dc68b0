//! A single lit column that sweeps across the grid.

use super::Visualization;
use crate::framebuffer::FrameBuffer;
use crate::scheduler::{Millis, Scheduler};

pub const DEFAULT_INTERVAL_MS: Millis = 50;

pub struct Columns {
    scheduler: Scheduler,
    width: usize,
    column: usize,
    /// Reverse at the edges instead of wrapping around.
    bounce: bool,
    forward: bool,
}

impl Columns {
    pub fn new(fb: &mut FrameBuffer, interval: Millis, bounce: bool) -> Self {
        Self {
            scheduler: Scheduler::new(interval),
            width: fb.width(),
            column: 0,
            bounce,
            forward: true,
        }
    }

    pub fn current_column(&self) -> usize {
        self.column
    }

    fn advance(&mut self) {
        if self.width <= 1 {
            return;
        }
        if !self.bounce {
            self.column = (self.column + 1) % self.width;
            return;
        }
        if self.forward && self.column + 1 == self.width {
            self.forward = false;
        } else if !self.forward && self.column == 0 {
            self.forward = true;
        }
        if self.forward {
            self.column += 1;
        } else {
            self.column -= 1;
        }
    }
}

impl Visualization for Columns {
    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn render(&self, fb: &mut FrameBuffer) {
        for y in 0..fb.height() {
            for x in 0..fb.width() {
                fb.set_pixel(x, y, x == self.column);
            }
        }
    }

    fn run(&mut self, fb: &mut FrameBuffer) -> bool {
        self.render(fb);
        self.advance();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sweep(bounce: bool, steps: usize) -> Vec<usize> {
        let mut fb = FrameBuffer::new(4, 2);
        let mut columns = Columns::new(&mut fb, 10, bounce);
        (0..steps)
            .map(|_| {
                columns.run(&mut fb);
                fb.row_bits(0).trailing_zeros() as usize
            })
            .collect()
    }

    #[test]
    fn wraps_without_bounce() {
        assert_eq!(sweep(false, 6), vec![0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn reverses_at_edges_with_bounce() {
        assert_eq!(sweep(true, 8), vec![0, 1, 2, 3, 2, 1, 0, 1]);
    }

    #[test]
    fn lights_exactly_one_full_column() {
        let mut fb = FrameBuffer::new(4, 3);
        let mut columns = Columns::new(&mut fb, 10, true);
        columns.run(&mut fb);
        columns.run(&mut fb);
        assert_eq!(fb.rows(), &[0b0010, 0b0010, 0b0010]);
    }
}
