//! Sender side of the sliding window
//!
//! Every transmitted data packet occupies a slot until a cumulative ACK
//! covers it. Slots live in a ring indexed by sequence number; a ring entry
//! is valid for `seq` only while it stores that same sequence number.

use crate::endpoint::Transport;
use crate::packet::{DataPacket, Packet, PacketError};
use crate::retransmit::Tick;
use crate::sequence::SeqNumber;
use bytes::Bytes;

/// One in-flight packet
#[derive(Debug, Clone)]
struct SenderSlot {
    seq: SeqNumber,
    /// Exact bytes last put on the wire; retransmitted verbatim
    wire: Bytes,
    /// Tick of the most recent (re)transmission
    sent_at: Tick,
    /// Number of times this packet has been sent
    send_count: u32,
}

/// Outstanding (sent, unacknowledged) data packets
pub struct SendWindow {
    /// Ring storage, `capacity` entries
    slots: Vec<Option<SenderSlot>>,
    /// Mask for fast modulo (capacity - 1)
    mask: usize,
    /// Maximum in-flight packets
    window_size: usize,
    /// Oldest unacknowledged sequence number
    send_base: SeqNumber,
    /// Next sequence number to assign
    next_seq: SeqNumber,
}

impl SendWindow {
    /// Create an empty window that allows `window_size` packets in flight
    pub fn new(window_size: usize) -> Self {
        // A power-of-two ring divides 2^32, so `seq & mask` stays
        // collision-free across sequence wrap-around.
        let capacity = window_size.max(1).next_power_of_two();

        SendWindow {
            slots: vec![None; capacity],
            mask: capacity - 1,
            window_size,
            send_base: SeqNumber::FIRST,
            next_seq: SeqNumber::FIRST,
        }
    }

    #[inline]
    fn index(&self, seq: SeqNumber) -> usize {
        (seq.as_raw() as usize) & self.mask
    }

    fn slot(&self, seq: SeqNumber) -> Option<&SenderSlot> {
        match &self.slots[self.index(seq)] {
            Some(slot) if slot.seq == seq => Some(slot),
            _ => None,
        }
    }

    /// Number of sequence numbers sent but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        self.send_base.distance_to(self.next_seq) as usize
    }

    /// Whether another packet may be sent now
    pub fn has_room(&self) -> bool {
        self.in_flight() < self.window_size
    }

    /// Check if everything sent has been acknowledged
    pub fn is_empty(&self) -> bool {
        self.in_flight() == 0
    }

    /// Frame `payload` as the next data packet and transmit it
    ///
    /// Returns `Ok(false)` without side effects when the window is full; the
    /// caller retries once an ACK frees space. Fails only if `payload` is
    /// larger than a packet can carry.
    pub fn try_send<T: Transport>(
        &mut self,
        payload: Bytes,
        now: Tick,
        transport: &mut T,
    ) -> Result<bool, PacketError> {
        if !self.has_room() {
            return Ok(false);
        }

        let seq = self.next_seq;
        let wire = Packet::Data(DataPacket::new(seq, payload)?).encode();
        transport.send(&wire);

        tracing::trace!(seq = %seq, len = wire.len(), tick = now, "sent data packet");

        let idx = self.index(seq);
        self.slots[idx] = Some(SenderSlot {
            seq,
            wire,
            sent_at: now,
            send_count: 1,
        });
        self.next_seq.increment();

        Ok(true)
    }

    /// Apply a cumulative ACK meaning "everything before `ack_number` arrived"
    ///
    /// Returns the number of slots freed. ACKs at or behind the send base are
    /// no-ops, as are ACKs for sequence numbers never sent.
    pub fn on_ack(&mut self, ack_number: SeqNumber) -> usize {
        if ack_number.le(self.send_base) {
            return 0;
        }
        if ack_number.gt(self.next_seq) {
            tracing::debug!(
                ack = %ack_number,
                next_seq = %self.next_seq,
                "ignoring ACK beyond anything sent"
            );
            return 0;
        }

        let mut freed = 0;
        let mut current = self.send_base;
        while current.lt(ack_number) {
            let idx = self.index(current);
            if matches!(&self.slots[idx], Some(slot) if slot.seq == current) {
                self.slots[idx] = None;
                freed += 1;
            }
            current.increment();
        }

        self.send_base = ack_number;
        tracing::trace!(send_base = %self.send_base, freed, "cumulative ACK applied");
        freed
    }

    /// Resend every slot whose last transmission is more than `timeout`
    /// ticks old, restarting its timer
    ///
    /// Returns the number of packets retransmitted.
    pub fn scan_for_retransmit<T: Transport>(
        &mut self,
        now: Tick,
        timeout: Tick,
        transport: &mut T,
    ) -> usize {
        let mut resent = 0;
        let mut current = self.send_base;

        while current.lt(self.next_seq) {
            let idx = self.index(current);
            if let Some(slot) = &mut self.slots[idx] {
                if slot.seq == current && now.saturating_sub(slot.sent_at) > timeout {
                    transport.send(&slot.wire);
                    slot.sent_at = now;
                    slot.send_count += 1;
                    resent += 1;

                    tracing::debug!(
                        seq = %current,
                        attempt = slot.send_count,
                        tick = now,
                        "retransmitting timed-out packet"
                    );
                }
            }
            current.increment();
        }

        resent
    }

    /// Check if `seq` occupies a slot
    pub fn contains(&self, seq: SeqNumber) -> bool {
        self.slot(seq).is_some()
    }

    /// How many times `seq` has been transmitted, if it is still in flight
    pub fn send_count(&self, seq: SeqNumber) -> Option<u32> {
        self.slot(seq).map(|slot| slot.send_count)
    }

    /// Tick of the last transmission of `seq`, if it is still in flight
    pub fn sent_at(&self, seq: SeqNumber) -> Option<Tick> {
        self.slot(seq).map(|slot| slot.sent_at)
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Oldest unacknowledged sequence number
    pub fn send_base(&self) -> SeqNumber {
        self.send_base
    }

    /// Next sequence number to be assigned
    pub fn next_seq(&self) -> SeqNumber {
        self.next_seq
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}
