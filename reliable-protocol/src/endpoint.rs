//! Collaborator interfaces consumed by a session
//!
//! A [`Session`](crate::Session) never touches sockets or file descriptors
//! itself. It sends datagrams through a [`Transport`], pulls application
//! bytes from an [`AppInput`] and pushes in-order bytes into an
//! [`AppOutput`]. The `Memory*` types are in-process implementations used
//! for tests and loopback setups.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::io;

/// Outbound datagram path to one peer
pub trait Transport {
    /// Hand one encoded packet to the channel. Delivery is not guaranteed.
    fn send(&mut self, datagram: &[u8]);
}

/// Result of one read from the application byte source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputChunk {
    /// Between 1 and `max` bytes
    Data(Bytes),
    /// Nothing available right now; more may arrive later
    Empty,
    /// The source is exhausted
    Eof,
}

/// Application byte source
pub trait AppInput {
    /// Read at most `max` bytes without blocking
    fn read(&mut self, max: usize) -> InputChunk;
}

/// Application byte sink with flow-controlled capacity
pub trait AppOutput {
    /// Bytes the sink can accept right now
    fn capacity(&self) -> usize;

    /// Write all of `bytes`. Callers check [`capacity`](Self::capacity) first.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Transport that records every datagram in an outbox
#[derive(Debug, Default)]
pub struct MemoryTransport {
    outbox: VecDeque<Bytes>,
    sent_total: u64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest unsent datagram
    pub fn pop(&mut self) -> Option<Bytes> {
        self.outbox.pop_front()
    }

    /// Take every queued datagram, oldest first
    pub fn drain(&mut self) -> Vec<Bytes> {
        self.outbox.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Number of datagrams sent over the transport's lifetime
    pub fn sent_total(&self) -> u64 {
        self.sent_total
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, datagram: &[u8]) {
        self.outbox.push_back(Bytes::copy_from_slice(datagram));
        self.sent_total += 1;
    }
}

/// Input backed by a byte buffer that can be extended and closed
#[derive(Debug, Default)]
pub struct MemoryInput {
    buffer: BytesMut,
    closed: bool,
}

impl MemoryInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input that yields `bytes` and then reports end-of-input
    pub fn with_contents(bytes: &[u8]) -> Self {
        let mut input = Self::new();
        input.push(bytes);
        input.close();
        input
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Report end-of-input once the buffer drains
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }
}

impl AppInput for MemoryInput {
    fn read(&mut self, max: usize) -> InputChunk {
        if !self.buffer.is_empty() && max > 0 {
            let n = max.min(self.buffer.len());
            InputChunk::Data(self.buffer.split_to(n).freeze())
        } else if self.closed && self.buffer.is_empty() {
            InputChunk::Eof
        } else {
            InputChunk::Empty
        }
    }
}

/// Output that collects bytes up to a fixed buffered limit
///
/// `capacity()` is the limit minus what is buffered; [`take`](Self::take)
/// plays the role of the application consuming data and frees space.
#[derive(Debug)]
pub struct MemoryOutput {
    buffer: BytesMut,
    limit: usize,
    writes: Vec<usize>,
}

impl MemoryOutput {
    pub fn new(limit: usize) -> Self {
        MemoryOutput {
            buffer: BytesMut::new(),
            limit,
            writes: Vec::new(),
        }
    }

    /// Output that never pushes back
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Consume everything written so far
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn contents(&self) -> &[u8] {
        &self.buffer
    }

    /// Size of each successful write, in order
    pub fn write_sizes(&self) -> &[usize] {
        &self.writes
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }
}

impl AppOutput for MemoryOutput {
    fn capacity(&self) -> usize {
        self.limit.saturating_sub(self.buffer.len())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() > self.capacity() {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "memory output is full",
            ));
        }
        self.buffer.extend_from_slice(bytes);
        self.writes.push(bytes.len());
        Ok(())
    }
}
