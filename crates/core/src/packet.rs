//! Packet type and the fixed size limits of the container.
//!
//! A packet is one transport unit: the opaque payload the codec engine
//! produced for one packet interval (one or more 20 ms sub-frames).
//!
//! # Limits
//!
//! ```text
//! MAX_BYTES_PER_FRAME        1024   decoder-side bound per sub-frame
//! ENCODE_MAX_BYTES_PER_FRAME  250   encoder-side bound (100 kbps peak)
//! MAX_INPUT_FRAMES              5   sub-frames per packet
//! MAX_LBRR_DELAY                2   lookahead depth of the jitter window
//! ```

use crate::error::{FormatError, Result};

/// Upper bound on bytes for one sub-frame accepted from a stream.
pub const MAX_BYTES_PER_FRAME: usize = 1024;

/// Upper bound on bytes for one sub-frame produced by the encoder.
pub const ENCODE_MAX_BYTES_PER_FRAME: usize = 250;

/// Maximum sub-frames in one packet.
pub const MAX_INPUT_FRAMES: usize = 5;

/// Largest payload a stream record may carry.
pub const MAX_PACKET_BYTES: usize = MAX_BYTES_PER_FRAME * MAX_INPUT_FRAMES;

/// Largest payload the encoder may emit.
pub const ENCODE_MAX_PACKET_BYTES: usize = ENCODE_MAX_BYTES_PER_FRAME * MAX_INPUT_FRAMES;

/// How many packets after a lost one may carry its redundancy.
pub const MAX_LBRR_DELAY: usize = 2;

/// Duration of one codec sub-frame.
pub const FRAME_LENGTH_MS: u32 = 20;

/// Highest API sample rate, in kHz.
pub const MAX_API_FS_KHZ: u32 = 48;

/// A packet read from or written to the container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    /// Opaque codec payload; empty for DTX packets
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a new packet.
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True for zero-length (DTX) packets.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Validate a record length read from the wire and convert it to a size.
///
/// The end-of-stream sentinel (-1) is handled by the reader before this is
/// called, so every negative value here is a format error.
pub fn checked_len(len: i16) -> Result<usize> {
    if len < 0 {
        return Err(FormatError::NegativeLength(len).into());
    }

    let size = len as usize;
    if size > MAX_PACKET_BYTES {
        return Err(FormatError::OversizedPacket {
            size,
            max: MAX_PACKET_BYTES,
        }
        .into());
    }

    Ok(size)
}
