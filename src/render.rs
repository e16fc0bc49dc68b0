//! The matrix context and the cooperative render loop.
//!
//! [`MatrixContext`] bundles everything the loop and the control surface
//! share: the framebuffer, the single active visualization, and the driver.
//! It is created once at startup and passed by reference; there is no global
//! state.
//!
//! ## Rust concepts
//! - Disjoint field borrows: a visualization borrows `self.framebuffer`
//!   mutably while it is itself borrowed out of `self.active`
//! - `Option<Box<dyn Trait>>` for "maybe one active implementation"
//! - `Instant` as a monotonic clock for the scheduler

use crate::driver::MatrixDriver;
use crate::framebuffer::FrameBuffer;
use crate::is_running;
use crate::scheduler::Millis;
use crate::visualization::{Visualization, VisualizationDefinition, registry};
use crate::PanelConfig;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

// ── Context ──────────────────────────────────────────────────────────

pub struct MatrixContext {
    framebuffer: FrameBuffer,
    active: Option<Box<dyn Visualization>>,
    current: Option<&'static VisualizationDefinition>,
    driver: Box<dyn MatrixDriver>,
    refreshes: u64,
}

impl MatrixContext {
    /// Create the context with the default visualization active.
    pub fn new(panel: PanelConfig, driver: Box<dyn MatrixDriver>) -> Self {
        let mut ctx = Self {
            framebuffer: FrameBuffer::for_panel(panel),
            active: None,
            current: None,
            driver,
            refreshes: 0,
        };
        ctx.activate(registry::default_definition());
        ctx
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Identifier of the active visualization, or "" if none is active.
    pub fn current_id(&self) -> &'static str {
        self.current.map(|d| d.id).unwrap_or("")
    }

    pub fn active(&self) -> Option<&dyn Visualization> {
        self.active.as_deref()
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn Visualization + 'static)> {
        self.active.as_deref_mut()
    }

    pub fn driver(&self) -> &dyn MatrixDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn MatrixDriver {
        self.driver.as_mut()
    }

    /// Number of frames pushed to the driver so far.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    fn activate(&mut self, definition: &'static VisualizationDefinition) {
        // The old instance goes first so only one ever writes the framebuffer.
        self.active = None;
        self.framebuffer.clear();
        self.active = Some(registry::create(definition, &mut self.framebuffer));
        self.current = Some(definition);
        tracing::info!("Visualization set to {}", definition.id);
    }

    /// Swap the active visualization by identifier.
    ///
    /// Returns `false` for unknown identifiers. Selecting the visualization
    /// that is already active keeps its state.
    pub fn set_visualization(&mut self, id: &str) -> bool {
        let Some(definition) = registry::find(id) else {
            tracing::warn!("Unknown visualization requested: {}", id);
            return false;
        };
        if self.current == Some(definition) && self.active.is_some() {
            return true;
        }
        self.activate(definition);
        true
    }

    /// Set one cell on behalf of an external request.
    ///
    /// The active visualization gets the first chance to handle it; the
    /// framebuffer is only written directly when it declines. Returns whether
    /// the displayed cell changed.
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) -> bool {
        let before = self.framebuffer.get_pixel(x, y);
        let intercepted = self
            .active
            .as_mut()
            .is_some_and(|v| v.handle_pixel_change(&mut self.framebuffer, x, y, on));
        if !intercepted {
            return self.framebuffer.set_pixel(x, y, on);
        }
        self.framebuffer.get_pixel(x, y) != before
    }

    /// Set every cell, routed through the active visualization first.
    pub fn fill(&mut self, on: bool) {
        let intercepted = self
            .active
            .as_mut()
            .is_some_and(|v| v.handle_fill(&mut self.framebuffer, on));
        if !intercepted {
            self.framebuffer.fill(on);
        }
    }

    pub fn clear(&mut self) {
        self.fill(false);
    }

    /// One loop iteration: run whatever is due, then push if anything changed.
    ///
    /// Returns how many times the visualization ran.
    pub fn tick(&mut self, now: Millis) -> u32 {
        let fires = match self.active.as_mut() {
            Some(v) => v.check(&mut self.framebuffer, now),
            None => 0,
        };
        self.flush();
        fires
    }

    /// Push the framebuffer if it is dirty. Returns whether a push happened.
    pub fn flush(&mut self) -> bool {
        if !self.framebuffer.needs_refresh() {
            return false;
        }
        if let Err(e) = self.driver.push(&self.framebuffer) {
            tracing::error!("Failed to push frame: {}", e);
        }
        // A failed push is not retried until the next change.
        self.framebuffer.refresh();
        self.refreshes += 1;
        true
    }
}

// ── Render loop ──────────────────────────────────────────────────────

/// Run the cooperative loop until `running` turns false.
///
/// Every iteration is synchronous: the visualization's `run()` always
/// completes before a control request or a swap can be handled.
pub fn render_loop(ctx: &mut MatrixContext, running: &AtomicBool, poll: Duration) {
    let start = Instant::now();
    tracing::info!(
        "Render loop started ({}x{}, polling every {}ms)",
        ctx.framebuffer().width(),
        ctx.framebuffer().height(),
        poll.as_millis()
    );

    while is_running(running) {
        let now = start.elapsed().as_millis() as Millis;
        ctx.tick(now);
        thread::sleep(poll);
    }

    tracing::info!("Render loop stopped after {} refreshes", ctx.refreshes());
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingDriver;
    use pretty_assertions::assert_eq;

    fn context(rows: usize, cols: usize) -> (MatrixContext, RecordingDriver) {
        let driver = RecordingDriver::new();
        let ctx = MatrixContext::new(PanelConfig::new(rows, cols), Box::new(driver.clone()));
        (ctx, driver)
    }

    #[test]
    fn starts_with_default_visualization() {
        let (ctx, _) = context(3, 4);
        assert_eq!(ctx.current_id(), "snow");
        assert!(ctx.active().and_then(|v| v.as_snow()).is_some());
    }

    #[test]
    fn first_tick_pushes_the_cleared_frame() {
        let (mut ctx, driver) = context(3, 4);
        ctx.tick(0);
        assert_eq!(driver.frames(), vec![vec![0, 0, 0]]);
        assert_eq!(ctx.refreshes(), 1);
    }

    #[test]
    fn quiet_ticks_do_not_push() {
        let (mut ctx, driver) = context(3, 4);
        ctx.set_visualization("canvas");
        ctx.tick(0);
        ctx.tick(10);
        ctx.tick(20);
        assert_eq!(driver.frames().len(), 1);
    }

    #[test]
    fn unknown_visualization_keeps_the_current_one() {
        let (mut ctx, _) = context(3, 4);
        assert!(!ctx.set_visualization("clock"));
        assert_eq!(ctx.current_id(), "snow");
    }

    #[test]
    fn swapping_clears_the_framebuffer() {
        let (mut ctx, _) = context(3, 4);
        ctx.set_visualization("canvas");
        ctx.set_pixel(1, 1, true);
        assert!(ctx.set_visualization("columns"));
        assert_eq!(ctx.framebuffer().lit_count(), 0);
        assert!(ctx.framebuffer().needs_refresh());
    }

    #[test]
    fn reselecting_keeps_state() {
        let (mut ctx, _) = context(3, 4);
        ctx.set_pixel(2, 2, true);
        assert!(ctx.set_visualization("snow"));
        assert!(ctx.framebuffer().get_pixel(2, 2));
        let snow = ctx.active().and_then(|v| v.as_snow()).unwrap();
        assert_eq!(snow.particle_count(), 1);
    }

    #[test]
    fn pixel_edits_reach_the_snow_shadow_grid() {
        let (mut ctx, _) = context(3, 4);
        assert!(ctx.set_pixel(0, 0, true));
        assert!(!ctx.set_pixel(0, 0, true));
        let snow = ctx.active().and_then(|v| v.as_snow()).unwrap();
        assert!(snow.is_occupied(0, 0));
        assert_eq!(ctx.framebuffer().rows(), snow.rows());
    }

    #[test]
    fn pixel_edits_write_directly_without_a_simulation() {
        let (mut ctx, _) = context(3, 4);
        ctx.set_visualization("canvas");
        assert!(ctx.set_pixel(3, 2, true));
        assert_eq!(ctx.framebuffer().row_bits(2), 0b1000);
        assert!(!ctx.set_pixel(9, 9, true));
    }

    #[test]
    fn fill_routes_through_snow() {
        let (mut ctx, _) = context(3, 4);
        ctx.fill(true);
        let snow = ctx.active().and_then(|v| v.as_snow()).unwrap();
        assert_eq!(snow.particle_count(), 12);
        ctx.clear();
        assert_eq!(ctx.framebuffer().lit_count(), 0);
        let snow = ctx.active().and_then(|v| v.as_snow()).unwrap();
        assert_eq!(snow.particle_count(), 0);
    }

    #[test]
    fn columns_sweep_is_pushed_each_step() {
        let (mut ctx, driver) = context(2, 4);
        ctx.set_visualization("columns");
        ctx.tick(0);
        ctx.tick(50);
        ctx.tick(100);
        let frames = driver.frames();
        assert_eq!(frames.last(), Some(&vec![0b0100, 0b0100]));
        assert_eq!(frames.len(), 3);
    }
}
