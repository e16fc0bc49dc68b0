//! Interval timer that decides how many times periodic logic is due.
//!
//! The scheduler never resets its phase to "now" on an ordinary poll. It
//! advances the last-fire timestamp by whole intervals, so a late poll fires
//! for every threshold it crossed and the long-run cadence does not drift.
//!
//! ## Rust concepts
//! - `Option<T>` for "not started yet" instead of a sentinel value
//! - `wrapping_sub` so a wrapped millisecond counter still yields the right gap

/// Milliseconds on a monotonic clock.
pub type Millis = u64;

/// Upper bound on fires reported by a single poll.
///
/// After a stall, firing every missed interval would monopolize the loop.
/// The backlog beyond this many fires is dropped.
pub const MAX_CATCH_UP: u32 = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheduler {
    interval: Millis,
    last_fire: Option<Millis>,
}

impl Scheduler {
    /// An interval of 0 is treated as 1 ms.
    pub fn new(interval: Millis) -> Self {
        Self {
            interval: interval.max(1),
            last_fire: None,
        }
    }

    pub fn interval(&self) -> Millis {
        self.interval
    }

    /// Check the clock and return how many times the action is due.
    ///
    /// The first poll anchors the phase and fires once. Afterwards every
    /// interval that fits in the elapsed gap counts as one fire, up to
    /// [`MAX_CATCH_UP`].
    pub fn poll(&mut self, now: Millis) -> u32 {
        let Some(last) = self.last_fire else {
            self.last_fire = Some(now);
            return 1;
        };

        let elapsed = now.wrapping_sub(last);
        let due = elapsed / self.interval;
        if due == 0 {
            return 0;
        }

        if due > u64::from(MAX_CATCH_UP) {
            let dropped = due - u64::from(MAX_CATCH_UP);
            tracing::debug!(
                "Scheduler fell {} intervals behind, dropping {} ({}ms interval)",
                due,
                dropped,
                self.interval
            );
            self.last_fire = Some(now.wrapping_sub(elapsed % self.interval));
            return MAX_CATCH_UP;
        }

        self.last_fire = Some(last.wrapping_add(due * self.interval));
        due as u32
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn first_poll_fires_once() {
        let mut s = Scheduler::new(100);
        assert_eq!(s.poll(5_000), 1);
        assert_eq!(s.poll(5_000), 0);
    }

    #[rstest]
    #[case(99, 0)]
    #[case(100, 1)]
    #[case(250, 2)]
    #[case(1_600, 16)]
    fn fires_once_per_elapsed_interval(#[case] gap: u64, #[case] expected: u32) {
        let mut s = Scheduler::new(100);
        s.poll(0);
        assert_eq!(s.poll(gap), expected);
    }

    #[test]
    fn late_polls_do_not_drift() {
        let mut s = Scheduler::new(100);
        s.poll(0);
        // Polled 30ms late; the next fire is still due at 200, not 230.
        assert_eq!(s.poll(130), 1);
        assert_eq!(s.poll(199), 0);
        assert_eq!(s.poll(200), 1);
    }

    #[test]
    fn catch_up_is_capped_and_keeps_phase() {
        let mut s = Scheduler::new(10);
        s.poll(0);
        assert_eq!(s.poll(1_005), MAX_CATCH_UP);
        // Backlog dropped: only the interval boundary at 1_010 remains ahead.
        assert_eq!(s.poll(1_009), 0);
        assert_eq!(s.poll(1_010), 1);
    }

    #[test]
    fn zero_interval_behaves_as_one_ms() {
        let mut s = Scheduler::new(0);
        assert_eq!(s.interval(), 1);
        s.poll(10);
        assert_eq!(s.poll(13), 3);
    }

    #[test]
    fn survives_clock_wraparound() {
        let mut s = Scheduler::new(10);
        s.poll(u64::MAX - 4);
        assert_eq!(s.poll(4), 0);
        // Ten milliseconds across the wrap.
        assert_eq!(s.poll(5), 1);
    }

    #[test]
    fn static_interval_only_fires_on_first_poll() {
        let mut s = Scheduler::new(u64::MAX);
        assert_eq!(s.poll(0), 1);
        assert_eq!(s.poll(1_000_000_000), 0);
    }
}
