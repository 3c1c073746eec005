//! Error types for the silk-sim system.
//!
//! Failures split into three domains with different severities:
//! - Format: the container stream is malformed. Fatal for the run.
//! - I/O: a file could not be opened, read or written. Fatal for the run.
//! - Engine: the codec engine reported a nonzero status. Logged by the
//!   session loops and otherwise ignored; only fatal while creating an
//!   encoder session.

use thiserror::Error;

/// Top-level error type for all operations in the system.
#[derive(Debug, Error)]
pub enum Error {
    /// Bitstream container error (header, record length, window bounds)
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Codec engine error
    #[error("codec engine error: {0}")]
    Engine(#[from] EngineError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Container format errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Opening bytes match neither recognized header layout
    #[error("wrong header: {actual:?}")]
    BadHeader { actual: Vec<u8> },

    /// Record length is negative (and not the end-of-stream sentinel)
    #[error("negative packet length {0}")]
    NegativeLength(i16),

    /// Record length exceeds the maximum packet size
    #[error("packet size {size} exceeds maximum {max}")]
    OversizedPacket { size: usize, max: usize },

    /// Buffered payload bytes would exceed the window's static capacity
    #[error("jitter window holds {buffered} bytes, capacity is {capacity}")]
    WindowOverflow { buffered: usize, capacity: usize },

    /// A packet was pushed into a window that already holds depth + 1 packets
    #[error("jitter window full: max {max} packets pending")]
    WindowFull { max: usize },
}

/// Codec engine status errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Sample rate outside the supported range
    #[error("sample rate {0} Hz out of range, valid range 8000 - 48000")]
    InvalidSampleRate(u32),

    /// Encoder input is not exactly one frame
    #[error("input of {actual} samples is not one frame of {expected}")]
    InvalidFrameLength { expected: usize, actual: usize },

    /// Payload could not be parsed
    #[error("corrupt payload: {0}")]
    CorruptPayload(&'static str),

    /// Encoded payload would not fit the output bound
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
