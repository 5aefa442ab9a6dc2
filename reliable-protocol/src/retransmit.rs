//! Timeout-driven retransmission
//!
//! Time is a logical tick count owned by each session. The dispatcher decides
//! how much wall-clock time one tick represents.

use crate::endpoint::Transport;
use crate::send_window::SendWindow;

/// One unit of a session's retransmission clock
pub type Tick = u64;

/// Per-session logical clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalClock {
    now: Tick,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Advance by one tick and return the new time
    pub fn advance(&mut self) -> Tick {
        self.now += 1;
        self.now
    }
}

/// Resends packets whose acknowledgment is overdue
///
/// Holds only the fixed timeout. There is no backoff: an unacknowledged
/// packet is resent every `timeout` ticks until an ACK covers it.
#[derive(Debug, Clone, Copy)]
pub struct RetransmissionScanner {
    timeout: Tick,
}

impl RetransmissionScanner {
    pub fn new(timeout: Tick) -> Self {
        RetransmissionScanner { timeout }
    }

    pub fn timeout(&self) -> Tick {
        self.timeout
    }

    /// Advance `clock` one tick and resend every overdue packet in `window`
    ///
    /// Returns the number of packets retransmitted.
    pub fn on_tick<T: Transport>(
        &self,
        clock: &mut LogicalClock,
        window: &mut SendWindow,
        transport: &mut T,
    ) -> usize {
        let now = clock.advance();
        window.scan_for_retransmit(now, self.timeout, transport)
    }
}
