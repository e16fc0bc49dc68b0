//! Falling snow: a cellular simulation of settled flakes on a bit grid.
//!
//! The simulation keeps its own shadow grid (one `u32` bitmask per row, like
//! the framebuffer). The shadow grid is authoritative; the framebuffer is
//! repainted from it after every tick that changed something.
//!
//! Three leaky buckets turn the fixed base tick into discrete events:
//! spawning a flake in the top row, melting an exposed flake, and one
//! gravity-and-wind step over the whole grid. Each bucket collects elapsed
//! time and fires one event per `rate` milliseconds collected, keeping the
//! remainder so the long-run cadence holds even for rates that are not a
//! multiple of the tick.
//!
//! ## Rust concepts
//! - Seedable RNGs (`StdRng`) so tests can replay exact random sequences
//! - Splitting borrows: helpers take `&[u32]` slices instead of `&self` so
//!   `self.rng` can be borrowed mutably at the same time
//! - `serde` derives for the settings record exposed to the control surface

use super::Visualization;
use crate::framebuffer::{FrameBuffer, row_mask};
use crate::scheduler::{Millis, Scheduler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How often `run()` is invoked.
pub const TICK_INTERVAL_MS: Millis = 10;
pub const DEFAULT_GRAVITY_MS: Millis = 50;
pub const DEFAULT_SNOW_RATE_MS: Millis = 250;
pub const DEFAULT_MELT_RATE_MS: Millis = 4000;
pub const DEFAULT_WIND_PERCENT: u8 = 25;
pub const MAX_WIND_PERCENT: u8 = 100;

/// Most events a single category may fire in one tick; older backlog is dropped.
pub const MAX_EVENTS_PER_TICK: u64 = 16;

// ── Settings ─────────────────────────────────────────────────────────

/// The four tunables, as reported to the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowSettings {
    /// Milliseconds per gravity step (0 = frozen)
    pub gravity: Millis,
    /// Milliseconds per new flake (0 = no new snow)
    pub snow_rate: Millis,
    /// Milliseconds per melted flake (0 = no melting)
    pub melt_rate: Millis,
    /// Chance (0-100) that a moving flake drifts sideways
    pub wind: u8,
}

impl Default for SnowSettings {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY_MS,
            snow_rate: DEFAULT_SNOW_RATE_MS,
            melt_rate: DEFAULT_MELT_RATE_MS,
            wind: DEFAULT_WIND_PERCENT,
        }
    }
}

/// A partial settings change. Absent fields are left alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnowSettingsUpdate {
    pub gravity: Option<Millis>,
    pub snow_rate: Option<Millis>,
    pub melt_rate: Option<Millis>,
    /// Accepts any value; clamped to 100.
    pub wind: Option<u32>,
}

// ── Leaky bucket ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Bucket {
    rate: Millis,
    level: Millis,
}

impl Bucket {
    fn new(rate: Millis) -> Self {
        Self { rate, level: 0 }
    }

    /// Change the rate. 0 suspends the bucket and empties it; a rate below the
    /// current level rebases the level so the change does not cause a burst.
    fn set_rate(&mut self, rate: Millis) {
        self.rate = rate;
        if rate == 0 {
            self.level = 0;
        } else if self.level > rate {
            self.level %= rate;
        }
    }

    /// Add elapsed time and return how many events are now due.
    fn drain(&mut self, elapsed: Millis) -> u64 {
        if self.rate == 0 {
            self.level = 0;
            return 0;
        }
        self.level = self.level.saturating_add(elapsed);
        let due = self.level / self.rate;
        if due > MAX_EVENTS_PER_TICK {
            self.level %= self.rate;
            return MAX_EVENTS_PER_TICK;
        }
        self.level -= due * self.rate;
        due
    }
}

// ── Simulation ───────────────────────────────────────────────────────

fn is_set(rows: &[u32], x: usize, y: usize) -> bool {
    (rows[y] >> x) & 1 == 1
}

/// A destination is taken if a flake sits there now or already landed there
/// earlier in the current step.
fn occupied(current: &[u32], next: &[u32], x: usize, y: usize) -> bool {
    is_set(current, x, y) || is_set(next, x, y)
}

pub struct Snow {
    scheduler: Scheduler,
    width: usize,
    height: usize,
    /// Shadow grid: bit x of rows[y] set means a flake at (x, y).
    rows: Vec<u32>,
    gravity: Bucket,
    snow: Bucket,
    melt: Bucket,
    wind: u8,
    rng: StdRng,
    /// Flipped after every gravity step so neither drift direction is favored.
    scan_left_to_right: bool,
}

impl Snow {
    /// Default tunables, OS-seeded randomness. Clears the framebuffer.
    pub fn new(fb: &mut FrameBuffer) -> Self {
        Self::with_rng(fb, SnowSettings::default(), StdRng::from_os_rng())
    }

    /// Default tunables with a reproducible random sequence.
    pub fn with_seed(fb: &mut FrameBuffer, seed: u64) -> Self {
        Self::with_rng(fb, SnowSettings::default(), StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(fb: &mut FrameBuffer, settings: SnowSettings, rng: StdRng) -> Self {
        fb.clear();
        Self {
            scheduler: Scheduler::new(TICK_INTERVAL_MS),
            width: fb.width(),
            height: fb.height(),
            rows: vec![0; fb.height()],
            gravity: Bucket::new(settings.gravity),
            snow: Bucket::new(settings.snow_rate),
            melt: Bucket::new(settings.melt_rate),
            wind: settings.wind.min(MAX_WIND_PERCENT),
            rng,
            scan_left_to_right: true,
        }
    }

    /// Restart the random sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ── Tunables ─────────────────────────────────────────────────────

    pub fn gravity(&self) -> Millis {
        self.gravity.rate
    }

    pub fn set_gravity(&mut self, value: Millis) {
        self.gravity.set_rate(value);
        tracing::debug!("Snow gravity set to {}ms", value);
    }

    pub fn snow_rate(&self) -> Millis {
        self.snow.rate
    }

    pub fn set_snow_rate(&mut self, value: Millis) {
        self.snow.set_rate(value);
        tracing::debug!("Snow rate set to {}ms", value);
    }

    pub fn melt_rate(&self) -> Millis {
        self.melt.rate
    }

    pub fn set_melt_rate(&mut self, value: Millis) {
        self.melt.set_rate(value);
        tracing::debug!("Melt rate set to {}ms", value);
    }

    pub fn wind(&self) -> u8 {
        self.wind
    }

    /// Set the drift chance. Values above 100 are clamped to 100.
    pub fn set_wind(&mut self, value: u32) {
        self.wind = value.min(u32::from(MAX_WIND_PERCENT)) as u8;
        tracing::debug!("Wind set to {}%", self.wind);
    }

    pub fn settings(&self) -> SnowSettings {
        SnowSettings {
            gravity: self.gravity(),
            snow_rate: self.snow_rate(),
            melt_rate: self.melt_rate(),
            wind: self.wind(),
        }
    }

    /// Apply every field present in `update` and return the resulting settings.
    pub fn apply(&mut self, update: SnowSettingsUpdate) -> SnowSettings {
        if let Some(v) = update.gravity {
            self.set_gravity(v);
        }
        if let Some(v) = update.snow_rate {
            self.set_snow_rate(v);
        }
        if let Some(v) = update.melt_rate {
            self.set_melt_rate(v);
        }
        if let Some(v) = update.wind {
            self.set_wind(v);
        }
        self.settings()
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// The shadow grid, top row first.
    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    pub fn particle_count(&self) -> usize {
        self.rows.iter().map(|r| r.count_ones() as usize).sum()
    }

    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && is_set(&self.rows, x, y)
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Drop a new flake into column `x` of the top row, if that cell is free.
    fn place_flake(&mut self, x: usize) -> bool {
        if x >= self.width || self.height == 0 || is_set(&self.rows, x, 0) {
            return false;
        }
        self.rows[0] |= 1u32 << x;
        true
    }

    /// Spawn a flake in a random free top-row column.
    ///
    /// Probes `width` random columns, then falls back to the leftmost free one.
    fn add_snowflake(&mut self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let full = row_mask(self.width);
        if self.rows[0] & full == full {
            return false;
        }
        for _ in 0..self.width {
            let x = self.rng.random_range(0..self.width);
            if self.place_flake(x) {
                return true;
            }
        }
        (0..self.width).any(|x| self.place_flake(x))
    }

    /// Remove one flake, preferring flakes that rest on something and have
    /// nothing on top of them.
    fn melt_snowflake(&mut self) -> bool {
        let (width, height) = (self.width, self.height);
        let mut candidates = Vec::new();

        for y in 0..height {
            let row = self.rows[y];
            if row == 0 {
                continue;
            }
            let below = if y + 1 < height { self.rows[y + 1] } else { 0 };
            let above = if y > 0 { self.rows[y - 1] } else { 0 };
            for x in 0..width {
                let mask = 1u32 << x;
                if row & mask == 0 {
                    continue;
                }
                let supported = y == height - 1 || below & mask != 0;
                let exposed = above & mask == 0;
                if supported && exposed {
                    candidates.push((x, y));
                }
            }
        }

        if candidates.is_empty() {
            // Nothing rests anywhere: take the first flake from the top.
            let Some(y) = self.rows.iter().position(|&row| row != 0) else {
                return false;
            };
            let x = self.rows[y].trailing_zeros();
            self.rows[y] &= !(1u32 << x);
            return true;
        }

        let (x, y) = candidates[self.rng.random_range(0..candidates.len())];
        self.rows[y] &= !(1u32 << x);
        true
    }

    /// Roll for wind and pick a neighbouring column, if the roll succeeds and
    /// the column exists.
    fn wind_shift(&mut self, x: usize) -> Option<usize> {
        if self.wind == 0 || self.rng.random_range(0..100u8) >= self.wind {
            return None;
        }
        let candidate = if self.rng.random_bool(0.5) {
            x + 1
        } else {
            x.checked_sub(1)?
        };
        (candidate < self.width).then_some(candidate)
    }

    fn destination(&mut self, x: usize, y: usize, next: &[u32]) -> (usize, usize) {
        // The bottom row is the floor.
        if y + 1 >= self.height {
            return (x, y);
        }
        let below = y + 1;

        if !occupied(&self.rows, next, x, below) {
            if let Some(cx) = self.wind_shift(x) {
                if !occupied(&self.rows, next, cx, below) {
                    return (cx, below);
                }
            }
            return (x, below);
        }

        if let Some(cx) = self.wind_shift(x) {
            if !occupied(&self.rows, next, cx, y) {
                return (cx, y);
            }
        }
        (x, y)
    }

    /// Move every flake at most one cell down and/or sideways.
    ///
    /// Rows are processed bottom to top and each destination is checked
    /// against both the current grid and the cells already claimed in this
    /// step, so no flake moves twice and no two flakes share a cell.
    fn apply_gravity_and_wind(&mut self) -> bool {
        let (width, height) = (self.width, self.height);
        let mut next = vec![0u32; height];
        let mut changed = false;

        let left_to_right = self.scan_left_to_right;
        self.scan_left_to_right = !left_to_right;

        for y in (0..height).rev() {
            let row = self.rows[y];
            if row == 0 {
                continue;
            }
            for i in 0..width {
                let x = if left_to_right { i } else { width - 1 - i };
                if (row >> x) & 1 == 0 {
                    continue;
                }
                let (dx, dy) = self.destination(x, y, &next);
                debug_assert!(!is_set(&next, dx, dy), "two flakes landed on ({dx}, {dy})");
                next[dy] |= 1u32 << dx;
                changed |= (dx, dy) != (x, y);
            }
        }

        self.rows = next;
        changed
    }
}

impl Visualization for Snow {
    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn render(&self, fb: &mut FrameBuffer) {
        fb.clear();
        for (y, &row) in self.rows.iter().enumerate() {
            if row == 0 {
                continue;
            }
            for x in 0..self.width {
                if (row >> x) & 1 == 1 {
                    fb.set_pixel(x, y, true);
                }
            }
        }
    }

    fn run(&mut self, fb: &mut FrameBuffer) -> bool {
        let mut changed = false;

        for _ in 0..self.snow.drain(TICK_INTERVAL_MS) {
            changed |= self.add_snowflake();
        }
        for _ in 0..self.melt.drain(TICK_INTERVAL_MS) {
            changed |= self.melt_snowflake();
        }
        for _ in 0..self.gravity.drain(TICK_INTERVAL_MS) {
            changed |= self.apply_gravity_and_wind();
        }

        // One repaint per tick, however many events fired.
        if changed {
            self.render(fb);
        }
        true
    }

    /// Treat the edit as adding or removing a settled flake.
    fn handle_pixel_change(&mut self, fb: &mut FrameBuffer, x: usize, y: usize, on: bool) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let before = self.rows[y];
        if on {
            self.rows[y] |= 1u32 << x;
        } else {
            self.rows[y] &= !(1u32 << x);
        }
        if self.rows[y] != before {
            self.render(fb);
        }
        true
    }

    fn handle_fill(&mut self, fb: &mut FrameBuffer, on: bool) -> bool {
        let value = if on { row_mask(self.width) } else { 0 };
        self.rows.fill(value);
        self.render(fb);
        true
    }

    fn as_snow(&self) -> Option<&Snow> {
        Some(self)
    }

    fn as_snow_mut(&mut self) -> Option<&mut Snow> {
        Some(self)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
