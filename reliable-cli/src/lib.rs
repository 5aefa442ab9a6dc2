//! Reliable Stream CLI Library
//!
//! Shared functionality for the `reliable` command-line tool: configuration
//! files, the process-level session collaborators, the echo server state
//! and statistics reporting.

pub mod config;
pub mod endpoint;
pub mod server;
pub mod stats;

pub use config::{ClientConfig, Config, ConfigFileError, ServerConfig, SessionSettings};
pub use endpoint::{
    echo_pipe, AwaitReply, BufferedOutput, ChannelInput, EchoInput, EchoOutput, UdpTransport,
};
pub use server::{EchoServer, Teardown};
pub use stats::{format_bytes, format_duration, format_session_stats, StatsBoard};
