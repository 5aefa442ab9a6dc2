//! Sequence Number Handling
//!
//! Data packets carry a 32-bit sequence number. Numbering starts at
//! [`SeqNumber::FIRST`] and increases by one per packet; comparisons use
//! serial arithmetic so ordering stays correct across the 2^32 wrap.

use std::fmt;

/// Sequence number with 32-bit serial-arithmetic ordering
///
/// `a.lt(b)` means `b` lies ahead of `a` by less than half the sequence
/// space. There is no `Ord`: serial order is not transitive, so every
/// comparison goes through these methods.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// First sequence number assigned by a fresh sender
    pub const FIRST: SeqNumber = SeqNumber(1);

    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u32) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Increment the sequence number by 1
    #[inline]
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0.wrapping_add(1))
    }

    /// Signed distance from this sequence number to `other`
    ///
    /// Positive values mean `other` is ahead of `self`.
    #[inline]
    pub fn distance_to(self, other: SeqNumber) -> i32 {
        other.0.wrapping_sub(self.0) as i32
    }

    /// Check if this sequence number is less than another (accounting for wraparound)
    #[inline]
    pub fn lt(self, other: SeqNumber) -> bool {
        self.distance_to(other) > 0
    }

    /// Check if this sequence number is less than or equal to another
    #[inline]
    pub fn le(self, other: SeqNumber) -> bool {
        self == other || self.lt(other)
    }

    /// Check if this sequence number is greater than another
    #[inline]
    pub fn gt(self, other: SeqNumber) -> bool {
        self.distance_to(other) < 0
    }

    /// Check if this sequence number is greater than or equal to another
    #[inline]
    pub fn ge(self, other: SeqNumber) -> bool {
        self == other || self.gt(other)
    }

    /// Later of the two sequence numbers in serial order
    #[inline]
    pub fn max(self, other: SeqNumber) -> SeqNumber {
        if other.gt(self) {
            other
        } else {
            self
        }
    }

    /// Check if `self` lies in the half-open range `[start, start + len)`
    #[inline]
    pub fn in_window(self, start: SeqNumber, len: usize) -> bool {
        let offset = start.distance_to(self);
        offset >= 0 && (offset as u64) < len as u64
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}
