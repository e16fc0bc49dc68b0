//! Visualizations: periodic generators that draw into the framebuffer.
//!
//! Every generator implements [`Visualization`]. The [`registry`] functions map
//! string identifiers to constructors so the active generator can be swapped
//! by name at runtime.
//!
//! ## Rust concepts
//! - Traits with default methods (`handle_pixel_change` falls back to `false`)
//! - Trait objects (`Box<dyn Visualization>`) for runtime polymorphism
//! - Function pointers (`fn(&mut FrameBuffer) -> ...`) as factories

pub mod canvas;
pub mod columns;
pub mod snow;

pub use canvas::Canvas;
pub use columns::Columns;
pub use snow::{Snow, SnowSettings, SnowSettingsUpdate};

use crate::framebuffer::FrameBuffer;
use crate::scheduler::{Millis, Scheduler};

/// The capability every generator provides.
///
/// A visualization owns its [`Scheduler`] but not the framebuffer; the
/// framebuffer is lent to each call.
pub trait Visualization {
    fn scheduler_mut(&mut self) -> &mut Scheduler;

    /// Repaint the framebuffer from the current state.
    fn render(&self, fb: &mut FrameBuffer);

    /// Periodic tick body. Returns whether the tick was handled.
    fn run(&mut self, fb: &mut FrameBuffer) -> bool;

    /// Offer an external single-pixel edit to the visualization.
    ///
    /// Returns `true` if the visualization took care of it. `false` means the
    /// caller should write the framebuffer directly.
    fn handle_pixel_change(&mut self, _fb: &mut FrameBuffer, _x: usize, _y: usize, _on: bool) -> bool {
        false
    }

    /// Same contract as [`handle_pixel_change`](Self::handle_pixel_change),
    /// for fill and clear requests covering the whole grid.
    fn handle_fill(&mut self, _fb: &mut FrameBuffer, _on: bool) -> bool {
        false
    }

    fn as_snow(&self) -> Option<&Snow> {
        None
    }

    fn as_snow_mut(&mut self) -> Option<&mut Snow> {
        None
    }

    /// Poll the scheduler and run once per fire. Returns the fire count.
    fn check(&mut self, fb: &mut FrameBuffer, now: Millis) -> u32 {
        let fires = self.scheduler_mut().poll(now);
        for _ in 0..fires {
            self.run(fb);
        }
        fires
    }
}

// ── Registry ─────────────────────────────────────────────────────────

pub type Factory = fn(&mut FrameBuffer) -> Box<dyn Visualization>;

/// A named, constructible visualization.
#[derive(Clone, Copy)]
pub struct VisualizationDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub create: Factory,
}

impl std::fmt::Debug for VisualizationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizationDefinition")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl PartialEq for VisualizationDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

pub mod registry {
    use super::*;

    fn create_snow(fb: &mut FrameBuffer) -> Box<dyn Visualization> {
        Box::new(Snow::new(fb))
    }

    fn create_columns(fb: &mut FrameBuffer) -> Box<dyn Visualization> {
        Box::new(Columns::new(fb, columns::DEFAULT_INTERVAL_MS, true))
    }

    fn create_canvas(fb: &mut FrameBuffer) -> Box<dyn Visualization> {
        Box::new(Canvas::new(fb))
    }

    const DEFINITIONS: &[VisualizationDefinition] = &[
        VisualizationDefinition {
            id: "snow",
            label: "Snow",
            create: create_snow,
        },
        VisualizationDefinition {
            id: "columns",
            label: "Columns",
            create: create_columns,
        },
        VisualizationDefinition {
            id: "canvas",
            label: "Canvas",
            create: create_canvas,
        },
    ];

    pub fn available() -> &'static [VisualizationDefinition] {
        DEFINITIONS
    }

    pub fn find(id: &str) -> Option<&'static VisualizationDefinition> {
        DEFINITIONS.iter().find(|d| d.id == id)
    }

    pub fn default_definition() -> &'static VisualizationDefinition {
        &DEFINITIONS[0]
    }

    pub fn create(definition: &VisualizationDefinition, fb: &mut FrameBuffer) -> Box<dyn Visualization> {
        (definition.create)(fb)
    }

    pub fn create_by_id(id: &str, fb: &mut FrameBuffer) -> Option<Box<dyn Visualization>> {
        find(id).map(|definition| create(definition, fb))
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn registry_lists_ids_in_order() {
        let ids: Vec<&str> = registry::available().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["snow", "columns", "canvas"]);
    }

    #[test]
    fn default_is_snow() {
        assert_eq!(registry::default_definition().id, "snow");
    }

    #[rstest]
    #[case("snow", true)]
    #[case("columns", true)]
    #[case("canvas", true)]
    #[case("clock", false)]
    #[case("", false)]
    #[case("SNOW", false)]
    fn test_find(#[case] id: &str, #[case] found: bool) {
        assert_eq!(registry::find(id).is_some(), found);
    }

    #[test]
    fn create_by_id_builds_snow_with_accessor() {
        let mut fb = FrameBuffer::new(4, 3);
        let viz = registry::create_by_id("snow", &mut fb).expect("snow is registered");
        assert!(viz.as_snow().is_some());
    }

    #[test]
    fn non_simulations_do_not_intercept_edits() {
        let mut fb = FrameBuffer::new(4, 3);
        let mut viz = registry::create_by_id("canvas", &mut fb).expect("canvas is registered");
        assert!(!viz.handle_pixel_change(&mut fb, 1, 1, true));
        assert!(!viz.handle_fill(&mut fb, true));
        assert!(viz.as_snow_mut().is_none());
    }

    #[test]
    fn check_runs_once_per_fire() {
        let mut fb = FrameBuffer::new(4, 3);
        let mut viz = Columns::new(&mut fb, 50, false);
        assert_eq!(viz.check(&mut fb, 0), 1);
        assert_eq!(viz.current_column(), 1);
        assert_eq!(viz.check(&mut fb, 100), 2);
        assert_eq!(viz.current_column(), 3);
        assert_eq!(viz.check(&mut fb, 120), 0);
    }
}
