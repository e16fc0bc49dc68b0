//! Static visualization: leaves the framebuffer to external edits.

use super::Visualization;
use crate::framebuffer::FrameBuffer;
use crate::scheduler::Scheduler;

pub struct Canvas {
    scheduler: Scheduler,
}

impl Canvas {
    pub fn new(_fb: &mut FrameBuffer) -> Self {
        Self {
            scheduler: Scheduler::new(u64::MAX),
        }
    }
}

impl Visualization for Canvas {
    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    // The framebuffer itself is the state.
    fn render(&self, _fb: &mut FrameBuffer) {}

    fn run(&mut self, fb: &mut FrameBuffer) -> bool {
        self.render(fb);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_external_edits() {
        let mut fb = FrameBuffer::new(4, 3);
        let mut canvas = Canvas::new(&mut fb);
        fb.set_pixel(2, 1, true);
        assert_eq!(canvas.check(&mut fb, 0), 1);
        assert_eq!(canvas.check(&mut fb, 60_000), 0);
        assert!(fb.get_pixel(2, 1));
    }
}
