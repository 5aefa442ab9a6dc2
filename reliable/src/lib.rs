//! reliable - in-order byte streams over lossy datagrams
//!
//! High-level entry point re-exporting the protocol core and the I/O layer.

pub use reliable_io as io;
pub use reliable_protocol as protocol;

// Re-export commonly used types
pub use protocol::{
    AppInput, AppOutput, InputChunk, Packet, SeqNumber, Session, SessionConfig, SessionRegistry,
    SessionState, Transport,
};
