//! Two sessions joined by a scripted lossy channel
//!
//! The channel applies one [`Fault`] per datagram from its script, then
//! carries everything faithfully once the script runs out. Held datagrams
//! are released behind the next batch, which reorders them.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use reliable_protocol::{
    MemoryInput, MemoryOutput, MemoryTransport, Session, SessionConfig, SessionState,
};

pub type MemSession = Session<MemoryTransport, MemoryInput, MemoryOutput>;

/// What the channel does to one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Deliver,
    Drop,
    Duplicate,
    Corrupt,
    Hold,
}

/// One direction of the simulated network
#[derive(Debug, Default)]
pub struct Channel {
    script: Vec<Fault>,
    cursor: usize,
    held: Vec<Bytes>,
    pub carried: u64,
    pub dropped: u64,
}

impl Channel {
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn scripted(script: Vec<Fault>) -> Self {
        Channel {
            script,
            ..Self::default()
        }
    }

    /// Apply faults to `sent` and return what arrives, in arrival order
    pub fn carry(&mut self, sent: Vec<Bytes>) -> Vec<Bytes> {
        let released = std::mem::take(&mut self.held);
        let mut arrived = Vec::with_capacity(sent.len() + released.len());

        for datagram in sent {
            let fault = self.script.get(self.cursor).copied().unwrap_or(Fault::Deliver);
            self.cursor += 1;
            match fault {
                Fault::Deliver => arrived.push(datagram),
                Fault::Drop => self.dropped += 1,
                Fault::Duplicate => {
                    arrived.push(datagram.clone());
                    arrived.push(datagram);
                }
                Fault::Corrupt => arrived.push(flip_last_byte(&datagram)),
                Fault::Hold => self.held.push(datagram),
            }
        }

        arrived.extend(released);
        self.carried += arrived.len() as u64;
        arrived
    }

    pub fn is_idle(&self) -> bool {
        self.held.is_empty()
    }
}

fn flip_last_byte(datagram: &Bytes) -> Bytes {
    let mut bytes = BytesMut::from(&datagram[..]);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x40;
    bytes.freeze()
}

pub fn session(config: SessionConfig, input: MemoryInput) -> MemSession {
    Session::new(config, MemoryTransport::new(), input, MemoryOutput::unbounded()).unwrap()
}

/// Deterministic test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Two sessions and the channels between them
pub struct Link {
    pub a: MemSession,
    pub b: MemSession,
    pub a_to_b: Channel,
    pub b_to_a: Channel,
    pub steps: usize,
}

impl Link {
    pub fn new(a: MemSession, b: MemSession) -> Self {
        Self::with_channels(a, b, Channel::perfect(), Channel::perfect())
    }

    pub fn with_channels(a: MemSession, b: MemSession, a_to_b: Channel, b_to_a: Channel) -> Self {
        Link {
            a,
            b,
            a_to_b,
            b_to_a,
            steps: 0,
        }
    }

    /// One round: pump input, exchange datagrams both ways, tick both clocks
    pub fn step(&mut self) {
        self.a.on_input_available();
        self.b.on_input_available();

        let to_b = self.a_to_b.carry(self.a.transport_mut().drain());
        for datagram in to_b {
            self.b.on_packet_received(&datagram);
        }

        let to_a = self.b_to_a.carry(self.b.transport_mut().drain());
        for datagram in to_a {
            self.a.on_packet_received(&datagram);
        }

        self.a.on_timer_tick();
        self.b.on_timer_tick();
        self.steps += 1;

        self.assert_window_bounds();
    }

    /// Step until `done` holds; panics after `max_steps`
    pub fn run_until<F>(&mut self, max_steps: usize, mut done: F) -> usize
    where
        F: FnMut(&Link) -> bool,
    {
        while !done(self) {
            assert!(
                self.steps < max_steps,
                "no progress after {} steps (a: {:?}, b: {:?})",
                self.steps,
                self.a.state(),
                self.b.state()
            );
            self.step();
        }
        self.steps
    }

    fn assert_window_bounds(&self) {
        for s in [&self.a, &self.b] {
            let window = s.config().window_size;
            assert!(s.send_window().in_flight() <= window);
            assert!(s.recv_window().buffered() <= window);
        }
    }
}

pub fn is_closed(s: &MemSession) -> bool {
    s.state() == SessionState::Closed
}
