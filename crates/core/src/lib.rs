//! silk-sim-core: packetization and loss-recovery harness for a low-bitrate
//! speech codec
//!
//! This library provides the core components of a file-based emulation of an
//! unreliable real-time transport:
//! - Packetizes encoded audio into a length-prefixed bitstream container
//! - Simulates packet loss with a seeded random source
//! - Recovers lost packets from redundancy (LBRR) carried by later packets
//! - Assembles codec sub-frames into output blocks, guarding against corrupt
//!   streams
//!
//! # Architecture
//!
//! - `wire`: Little-endian record and sample I/O
//! - `packet`: Packet type and size limits
//! - `container`: Bitstream header and record reader/writer
//! - `codec`: The `CodecEngine` capability
//! - `reference`: Built-in deterministic engine
//! - `loss`: Loss simulator
//! - `jitter`: Bounded lookahead window
//! - `fec`: Redundancy search for lost packets
//! - `assembler`: Sub-frame assembly and concealment
//! - `encoder` / `decoder`: Sessions driving the pipeline
//! - `metrics`: Run statistics
//! - `api`: File-level entry points
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and recoverable
//! - **Bounded memory**: The lookahead window has a fixed byte capacity
//! - **Deterministic**: Seeded randomness makes runs reproducible

pub mod api;
pub mod assembler;
pub mod codec;
pub mod container;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fec;
pub mod jitter;
pub mod loss;
pub mod metrics;
pub mod packet;
pub mod reference;
pub mod wire;

// Re-export commonly used types
pub use codec::{CodecEngine, DecoderControl, EncoderControl};
pub use decoder::{Decoder, DecoderConfig};
pub use encoder::{Encoder, EncoderConfig};
pub use error::{Error, Result};
pub use loss::LossConfig;
pub use reference::ReferenceEngine;
