//! Session State Machine
//!
//! A session binds one send window, one receive window and one
//! retransmission scanner to a transport and an application stream pair.
//! The event dispatcher drives it through four handlers, one at a time:
//!
//! - [`Session::on_packet_received`] when a datagram arrives
//! - [`Session::on_input_available`] when the application has bytes to send
//! - [`Session::on_output_space_freed`] when the application drained output
//! - [`Session::on_timer_tick`] once per retransmission clock tick
//!
//! No handler blocks. A full window or a full output sink just ends the
//! handler early; the next event picks up where it stopped.

use crate::config::{ConfigError, SessionConfig};
use crate::endpoint::{AppInput, AppOutput, InputChunk, Transport};
use crate::packet::{Packet, PacketError, MAX_PAYLOAD_SIZE};
use crate::recv_window::{DataOutcome, RecvWindow};
use crate::retransmit::{LogicalClock, RetransmissionScanner, Tick};
use crate::send_window::SendWindow;
use bytes::{Buf, Bytes};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Normal operation
    Active,
    /// Application input ended; outstanding sends and ACKs still processed
    Draining,
    /// Terminal; every handler is a no-op
    Closed,
}

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// New data packets sent
    pub packets_sent: u64,
    /// Data packets resent after a timeout
    pub packets_retransmitted: u64,
    /// Payload bytes read from the application and sent
    pub bytes_sent: u64,
    /// ACK packets received
    pub acks_received: u64,
    /// ACK packets sent
    pub acks_sent: u64,
    /// Data packets received (valid checksum)
    pub data_received: u64,
    /// Duplicate data packets discarded
    pub duplicates: u64,
    /// Data packets dropped for lying outside the receive window
    pub out_of_window: u64,
    /// Datagrams dropped for a checksum mismatch
    pub corrupt_dropped: u64,
    /// Datagrams dropped for being truncated or mis-sized
    pub malformed_dropped: u64,
    /// Payload bytes handed to the application output
    pub bytes_delivered: u64,
}

/// One reliable byte-stream endpoint
pub struct Session<T, I, O> {
    config: SessionConfig,
    state: SessionState,
    clock: LogicalClock,
    scanner: RetransmissionScanner,
    sender: SendWindow,
    receiver: RecvWindow,
    /// Input already read but not yet framed
    pending: Bytes,
    transport: T,
    input: I,
    output: O,
    stats: SessionStats,
}

impl<T: Transport, I: AppInput, O: AppOutput> Session<T, I, O> {
    /// Create a new session
    ///
    /// Fails if `config` is invalid; no session is created then.
    pub fn new(config: SessionConfig, transport: T, input: I, output: O) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config, transport, input, output))
    }

    pub(crate) fn with_valid_config(config: SessionConfig, transport: T, input: I, output: O) -> Self {
        Session {
            config,
            state: SessionState::Active,
            clock: LogicalClock::new(),
            scanner: RetransmissionScanner::new(config.retransmission_timeout),
            sender: SendWindow::new(config.window_size),
            receiver: RecvWindow::new(config.window_size),
            pending: Bytes::new(),
            transport,
            input,
            output,
            stats: SessionStats::default(),
        }
    }

    /// Handle one datagram from the peer
    ///
    /// Undecodable datagrams are channel noise and are dropped without any
    /// reply; the peer's retransmission timer recovers.
    pub fn on_packet_received(&mut self, datagram: &[u8]) {
        if self.is_closed() {
            return;
        }

        match Packet::decode(datagram) {
            Err(e) => {
                if matches!(e, PacketError::Corrupt { .. }) {
                    self.stats.corrupt_dropped += 1;
                } else {
                    self.stats.malformed_dropped += 1;
                }
                tracing::debug!(error = %e, len = datagram.len(), "dropping undecodable datagram");
            }
            Ok(Packet::Ack(ack)) => {
                self.stats.acks_received += 1;
                let freed = self.sender.on_ack(ack.ack_number);
                if freed > 0 {
                    // Freed slots may unblock input that is already waiting.
                    self.pump_input();
                }
            }
            Ok(Packet::Data(data)) => {
                self.stats.data_received += 1;
                let outcome = self
                    .receiver
                    .on_data(data, &mut self.transport, &mut self.output);
                self.record(outcome);
            }
        }

        self.check_drained();
    }

    /// Send as much application input as the window allows
    pub fn on_input_available(&mut self) {
        if self.is_closed() {
            return;
        }
        self.pump_input();
        self.check_drained();
    }

    /// Retry delivering buffered data after the output drained
    pub fn on_output_space_freed(&mut self) {
        if self.is_closed() {
            return;
        }
        let delivered = self.receiver.flush(&mut self.output);
        self.stats.bytes_delivered += delivered.bytes as u64;
        self.check_drained();
    }

    /// Advance the retransmission clock by one tick
    pub fn on_timer_tick(&mut self) {
        if self.is_closed() {
            return;
        }
        let resent = self
            .scanner
            .on_tick(&mut self.clock, &mut self.sender, &mut self.transport);
        self.stats.packets_retransmitted += resent as u64;
    }

    fn pump_input(&mut self) {
        if self.state != SessionState::Active {
            return;
        }

        while self.sender.has_room() {
            if self.pending.is_empty() {
                match self.input.read(MAX_PAYLOAD_SIZE) {
                    InputChunk::Data(bytes) if !bytes.is_empty() => self.pending = bytes,
                    InputChunk::Data(_) | InputChunk::Empty => break,
                    InputChunk::Eof => {
                        tracing::info!(
                            next_seq = %self.sender.next_seq(),
                            "end of input, draining session"
                        );
                        self.state = SessionState::Draining;
                        break;
                    }
                }
            }

            let len = self.pending.len().min(MAX_PAYLOAD_SIZE);
            let chunk = self.pending.slice(..len);
            match self
                .sender
                .try_send(chunk, self.clock.now(), &mut self.transport)
            {
                Ok(true) => {
                    self.pending.advance(len);
                    self.stats.packets_sent += 1;
                    self.stats.bytes_sent += len as u64;
                }
                Ok(false) => break,
                Err(e) => {
                    // Unreachable with chunks capped at MAX_PAYLOAD_SIZE.
                    tracing::error!(error = %e, "failed to frame input chunk");
                    break;
                }
            }
        }
    }

    fn record(&mut self, outcome: DataOutcome) {
        if outcome.acked() {
            self.stats.acks_sent += 1;
        }
        match outcome {
            DataOutcome::Accepted { delivered } => {
                self.stats.bytes_delivered += delivered.bytes as u64;
            }
            DataOutcome::Stale | DataOutcome::Duplicate => self.stats.duplicates += 1,
            DataOutcome::OutOfWindow | DataOutcome::Oversized => self.stats.out_of_window += 1,
        }
    }

    fn check_drained(&mut self) {
        if self.state == SessionState::Draining
            && self.sender.is_empty()
            && self.pending.is_empty()
            && !self.receiver.has_undelivered()
        {
            tracing::info!(
                packets_sent = self.stats.packets_sent,
                retransmitted = self.stats.packets_retransmitted,
                bytes_delivered = self.stats.bytes_delivered,
                "session closed"
            );
            self.state = SessionState::Closed;
        }
    }

    /// Get current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Get session statistics
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current logical time
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn send_window(&self) -> &SendWindow {
        &self.sender
    }

    pub fn recv_window(&self) -> &RecvWindow {
        &self.receiver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}
