//! Jitter window: the bounded lookahead buffer of pending packets.
//!
//! The window holds at most `depth + 1` packets. The head is the oldest
//! packet, the next one to be decoded; the slots behind it are lookahead,
//! searched for redundancy when the head was lost.
//!
//! # Memory Bounds
//!
//! Payloads live back to back in one buffer whose capacity is fixed at
//! construction:
//! ```text
//! capacity = MAX_PACKET_BYTES * (depth + 1) = 5120 * 3 = 15360 bytes
//! ```
//! Pushing past that capacity, or finding more bytes buffered than it after
//! a shift, is a `FormatError`.
//!
//! # Lost Packets
//!
//! A lost packet occupies a slot of length 0. Zero-length DTX packets look
//! the same and are handled the same way by the decoder.
//!
//! # Thread Safety
//!
//! This structure is NOT thread-safe. Each decode session owns one.

use crate::error::{FormatError, Result};
use crate::packet::{MAX_LBRR_DELAY, MAX_PACKET_BYTES};
use std::collections::VecDeque;

/// Bounded window of pending packets.
#[derive(Debug)]
pub struct JitterWindow {
    /// Lookahead depth D
    depth: usize,

    /// Payload lengths, head first
    slots: VecDeque<usize>,

    /// Payload bytes of all slots, head first
    buffer: Vec<u8>,

    /// Static payload capacity
    capacity: usize,
}

impl JitterWindow {
    /// Create a window with the given lookahead depth and the matching
    /// static capacity.
    pub fn new(depth: usize) -> Self {
        Self::with_capacity(depth, MAX_PACKET_BYTES * (depth + 1))
    }

    /// Create a window with an explicit payload capacity.
    pub fn with_capacity(depth: usize, capacity: usize) -> Self {
        Self {
            depth,
            slots: VecDeque::with_capacity(depth + 1),
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Lookahead depth D.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of pending packets.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no packets are pending.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when no further packet can be pushed before a shift.
    pub fn is_full(&self) -> bool {
        self.slots.len() > self.depth
    }

    /// Total payload bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Static payload capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a packet at the tail. An empty payload marks a lost packet.
    ///
    /// # Errors
    /// - `FormatError::WindowFull` if `depth + 1` packets are already pending
    /// - `FormatError::WindowOverflow` if the payload does not fit the buffer
    pub fn push(&mut self, payload: &[u8]) -> Result<()> {
        if self.is_full() {
            return Err(FormatError::WindowFull {
                max: self.depth + 1,
            }
            .into());
        }

        let buffered = self.buffer.len() + payload.len();
        if buffered > self.capacity {
            return Err(FormatError::WindowOverflow {
                buffered,
                capacity: self.capacity,
            }
            .into());
        }

        self.buffer.extend_from_slice(payload);
        self.slots.push_back(payload.len());
        Ok(())
    }

    /// Append a lost packet at the tail.
    pub fn push_lost(&mut self) -> Result<()> {
        self.push(&[])
    }

    /// Payload of the head packet; empty if it was lost.
    ///
    /// Returns `None` when the window is empty.
    pub fn head(&self) -> Option<&[u8]> {
        self.slot(0)
    }

    /// Payload of the packet `delay` positions behind the head.
    ///
    /// Returns `None` when that slot does not exist (yet).
    pub fn lookahead(&self, delay: usize) -> Option<&[u8]> {
        self.slot(delay)
    }

    fn slot(&self, index: usize) -> Option<&[u8]> {
        let len = *self.slots.get(index)?;
        let start: usize = self.slots.iter().take(index).sum();
        Some(&self.buffer[start..start + len])
    }

    /// Drop the head packet and move every other slot one position forward.
    ///
    /// # Returns
    /// The byte length of the dropped head, or `None` if the window was empty.
    ///
    /// # Errors
    /// `FormatError::WindowOverflow` if the remaining slots claim more bytes
    /// than the buffer can hold.
    pub fn shift(&mut self) -> Result<Option<usize>> {
        let Some(head_len) = self.slots.pop_front() else {
            return Ok(None);
        };

        let remaining: usize = self.slots.iter().sum();
        if remaining > self.capacity {
            return Err(FormatError::WindowOverflow {
                buffered: remaining,
                capacity: self.capacity,
            }
            .into());
        }

        self.buffer.drain(..head_len);
        Ok(Some(head_len))
    }

    /// Get statistics about current window state.
    pub fn stats(&self) -> WindowStats {
        WindowStats {
            pending: self.slots.len(),
            lost_pending: self.slots.iter().filter(|&&len| len == 0).count(),
            buffered_bytes: self.buffer.len(),
        }
    }
}

impl Default for JitterWindow {
    fn default() -> Self {
        Self::new(MAX_LBRR_DELAY)
    }
}

/// Statistics about window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    /// Number of pending packets
    pub pending: usize,

    /// Pending packets that are lost or empty
    pub lost_pending: usize,

    /// Payload bytes buffered
    pub buffered_bytes: usize,
}
