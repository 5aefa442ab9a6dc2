//! Wall-clock to tick conversion
//!
//! Sessions count time in logical ticks. [`TickTimer`] is how a dispatcher
//! decides when to deliver them: it reports how many whole intervals have
//! elapsed since it last fired, so a late loop iteration still delivers
//! every tick it owes.

use std::time::{Duration, Instant};

/// Periodic tick source
#[derive(Debug, Clone)]
pub struct TickTimer {
    interval: Duration,
    last_fire: Instant,
}

impl TickTimer {
    /// Create a new timer with the given interval
    ///
    /// A zero interval is raised to one millisecond.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        TickTimer {
            interval: interval.max(Duration::from_millis(1)),
            last_fire: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks due at `now`, consuming them
    pub fn poll_at(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last_fire);
        let due = (elapsed.as_nanos() / self.interval.as_nanos()) as u32;
        if due > 0 {
            self.last_fire += self.interval * due;
        }
        due
    }

    /// Number of ticks due now, consuming them
    pub fn poll(&mut self) -> u32 {
        self.poll_at(Instant::now())
    }

    /// Time left until the next tick is due
    pub fn time_until_next(&self) -> Duration {
        let elapsed = self.last_fire.elapsed();
        if elapsed >= self.interval {
            Duration::ZERO
        } else {
            self.interval - elapsed
        }
    }
}
