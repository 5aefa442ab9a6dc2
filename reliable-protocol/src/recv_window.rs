//! Receiver side of the sliding window
//!
//! Data packets may arrive lost, duplicated or out of order. The receive
//! window buffers any packet inside `[frontier, frontier + window_size)`,
//! hands the contiguous run starting at the frontier to the application in
//! order, and answers with a cumulative ACK naming the new frontier.
//!
//! Delivery is flow-controlled: a payload is written only when the output
//! reports enough capacity for all of it. When it does not, the run stops
//! there and resumes on the next [`RecvWindow::flush`].

use crate::endpoint::{AppOutput, Transport};
use crate::packet::{AckPacket, DataPacket, Packet, MAX_PAYLOAD_SIZE};
use crate::sequence::SeqNumber;
use bytes::Bytes;

/// A buffered, not yet delivered payload
#[derive(Debug, Clone)]
struct ReceiverSlot {
    seq: SeqNumber,
    payload: Bytes,
}

/// What [`RecvWindow::on_data`] did with a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// Buffered; `delivered` is what the following flush handed over
    Accepted { delivered: Delivered },
    /// Already delivered; the peer likely lost our ACK, so it was re-sent
    Stale,
    /// Already buffered and waiting for a gap to fill
    Duplicate,
    /// Too far ahead of the frontier to buffer
    OutOfWindow,
    /// Payload larger than any packet may carry
    Oversized,
}

impl DataOutcome {
    /// Whether an ACK went out while handling the packet
    pub fn acked(&self) -> bool {
        matches!(self, DataOutcome::Accepted { .. } | DataOutcome::Stale)
    }
}

/// Progress made by one delivery flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivered {
    pub packets: usize,
    pub bytes: usize,
}

/// Reassembly buffer for out-of-order data packets
pub struct RecvWindow {
    /// Ring storage, `capacity` entries
    slots: Vec<Option<ReceiverSlot>>,
    /// Mask for fast modulo (capacity - 1)
    mask: usize,
    /// Reorder depth
    window_size: usize,
    /// Next sequence number to hand to the application
    frontier: SeqNumber,
    /// Occupied slots
    buffered: usize,
}

impl RecvWindow {
    /// Create an empty window expecting sequence number 1 first
    pub fn new(window_size: usize) -> Self {
        let capacity = window_size.max(1).next_power_of_two();

        RecvWindow {
            slots: vec![None; capacity],
            mask: capacity - 1,
            window_size,
            frontier: SeqNumber::FIRST,
            buffered: 0,
        }
    }

    #[inline]
    fn index(&self, seq: SeqNumber) -> usize {
        (seq.as_raw() as usize) & self.mask
    }

    /// Process one arriving data packet
    pub fn on_data<T: Transport, O: AppOutput>(
        &mut self,
        packet: DataPacket,
        transport: &mut T,
        output: &mut O,
    ) -> DataOutcome {
        let seq = packet.seq;

        if seq.lt(self.frontier) {
            tracing::debug!(
                seq = %seq,
                frontier = %self.frontier,
                "duplicate of delivered packet, re-sending ACK"
            );
            self.send_ack(transport);
            return DataOutcome::Stale;
        }

        if !seq.in_window(self.frontier, self.window_size) {
            tracing::debug!(
                seq = %seq,
                frontier = %self.frontier,
                window = self.window_size,
                "dropping out-of-window packet"
            );
            return DataOutcome::OutOfWindow;
        }

        if packet.payload.len() > MAX_PAYLOAD_SIZE {
            tracing::debug!(seq = %seq, len = packet.payload.len(), "dropping oversized payload");
            return DataOutcome::Oversized;
        }

        let idx = self.index(seq);
        if matches!(&self.slots[idx], Some(slot) if slot.seq == seq) {
            tracing::trace!(seq = %seq, "dropping duplicate of buffered packet");
            return DataOutcome::Duplicate;
        }

        self.slots[idx] = Some(ReceiverSlot {
            seq,
            payload: packet.payload,
        });
        self.buffered += 1;
        tracing::trace!(seq = %seq, buffered = self.buffered, "buffered data packet");

        let delivered = self.flush(output);

        // ACK even without progress: it repairs a lost earlier ACK and tells
        // the sender where the gap is.
        self.send_ack(transport);

        DataOutcome::Accepted { delivered }
    }

    /// Deliver the contiguous run of buffered payloads at the frontier
    ///
    /// Stops at the first gap, at the first payload the output has no room
    /// for, or at a failed write.
    pub fn flush<O: AppOutput>(&mut self, output: &mut O) -> Delivered {
        let mut delivered = Delivered::default();

        loop {
            let idx = self.index(self.frontier);
            let len = match &self.slots[idx] {
                Some(slot) if slot.seq == self.frontier => slot.payload.len(),
                _ => break,
            };

            if output.capacity() < len {
                tracing::trace!(
                    seq = %self.frontier,
                    len,
                    capacity = output.capacity(),
                    "output full, deferring delivery"
                );
                break;
            }

            if let Some(slot) = &self.slots[idx] {
                if let Err(e) = output.write(&slot.payload) {
                    tracing::warn!(seq = %self.frontier, error = %e, "output write failed");
                    break;
                }
            }

            self.slots[idx] = None;
            self.buffered -= 1;
            self.frontier.increment();
            delivered.packets += 1;
            delivered.bytes += len;
        }

        if delivered.packets > 0 {
            tracing::trace!(
                frontier = %self.frontier,
                packets = delivered.packets,
                bytes = delivered.bytes,
                "delivered in-order data"
            );
        }
        delivered
    }

    /// Cumulative ACK for the current frontier
    pub fn ack_packet(&self) -> AckPacket {
        AckPacket::new(self.frontier)
    }

    fn send_ack<T: Transport>(&self, transport: &mut T) {
        transport.send(&Packet::Ack(self.ack_packet()).encode());
    }

    /// Next sequence number expected in order
    pub fn frontier(&self) -> SeqNumber {
        self.frontier
    }

    /// Number of received payloads not yet delivered
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    pub fn has_undelivered(&self) -> bool {
        self.buffered > 0
    }

    /// Check if `seq` is buffered awaiting delivery
    pub fn is_buffered(&self, seq: SeqNumber) -> bool {
        matches!(&self.slots[self.index(seq)], Some(slot) if slot.seq == seq)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}
