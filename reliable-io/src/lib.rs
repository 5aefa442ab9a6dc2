//! I/O and Platform Abstraction
//!
//! Non-blocking UDP sockets and the wall-clock timer that turns elapsed time
//! into protocol ticks.

pub mod socket;
pub mod time;

pub use socket::{DatagramSocket, SocketError};
pub use time::TickTimer;
