//! Reliable Byte-Stream Protocol Core
//!
//! This crate implements a sliding-window reliable transport over an
//! unreliable datagram channel: packet framing with an Internet checksum,
//! a send window with cumulative ACKs, a reordering receive window with
//! in-order delivery, timeout-driven retransmission, the per-peer session
//! state machine and a registry that demultiplexes peers.

pub mod config;
pub mod endpoint;
pub mod packet;
pub mod recv_window;
pub mod registry;
pub mod retransmit;
pub mod send_window;
pub mod sequence;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use endpoint::{
    AppInput, AppOutput, InputChunk, MemoryInput, MemoryOutput, MemoryTransport, Transport,
};
pub use packet::{AckPacket, DataPacket, Packet, PacketError, PacketKind};
pub use recv_window::{DataOutcome, Delivered, RecvWindow};
pub use registry::SessionRegistry;
pub use retransmit::{LogicalClock, RetransmissionScanner, Tick};
pub use send_window::SendWindow;
pub use sequence::SeqNumber;
pub use session::{Session, SessionState, SessionStats};
