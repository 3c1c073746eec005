//! The codec engine capability consumed by the encode and decode sessions.
//!
//! The perceptual codec is opaque to this crate. Sessions only need the five
//! operations of [`CodecEngine`]; any implementation can be plugged in,
//! including the built-in [`ReferenceEngine`](crate::reference::ReferenceEngine)
//! and the scripted fakes used in tests.
//!
//! Engine calls report failures through `Err`, but output buffers are still
//! considered valid afterwards: sessions log the error and continue with
//! whatever the engine left in them.

use crate::error::EngineError;

/// Encoder parameters passed to every encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderControl {
    /// Input sample rate in Hz
    pub api_sample_rate: u32,

    /// Highest internal sample rate the engine may use, in Hz
    pub max_internal_sample_rate: u32,

    /// Packet duration in samples at the API rate
    pub packet_size: usize,

    /// Expected packet loss, in percent
    pub packet_loss_percentage: u32,

    /// Embed redundancy for earlier packets
    pub use_inband_fec: bool,

    /// Emit zero-length packets during silence
    pub use_dtx: bool,

    /// Complexity level (0 = lowest)
    pub complexity: u32,

    /// Target bitrate in bits per second
    pub bit_rate: u32,
}

impl EncoderControl {
    /// Samples in one 20 ms frame at the API rate.
    pub fn frame_size(&self) -> usize {
        (self.api_sample_rate / 50) as usize
    }

    /// Packet duration in milliseconds.
    pub fn packet_ms(&self) -> u32 {
        if self.api_sample_rate == 0 {
            return 0;
        }
        (1000 * self.packet_size as u64 / self.api_sample_rate as u64) as u32
    }
}

/// Decoder parameters in and status out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderControl {
    /// Requested output sample rate in Hz (set by the caller)
    pub api_sample_rate: u32,

    /// Sub-frames in the most recently decoded packet (set by the engine)
    pub frames_per_packet: usize,

    /// More sub-frames of the current packet remain (set by the engine)
    pub more_internal_frames: bool,
}

impl DecoderControl {
    /// Create a control block for the given output rate.
    ///
    /// Starts at one frame per packet so concealment before the first
    /// packet produces one frame.
    pub fn new(api_sample_rate: u32) -> Self {
        Self {
            api_sample_rate,
            frames_per_packet: 1,
            more_internal_frames: false,
        }
    }
}

/// A codec engine session.
///
/// One value is one session: sessions own their engine exclusively.
pub trait CodecEngine {
    /// Memory footprint of the encoder state, in bytes.
    fn encoder_size(&self) -> Result<usize, EngineError>;

    /// Memory footprint of the decoder state, in bytes.
    fn decoder_size(&self) -> Result<usize, EngineError>;

    /// Reset the encoder state for a new stream.
    fn init_encoder(&mut self, control: &EncoderControl) -> Result<(), EngineError>;

    /// Reset the decoder state for a new stream.
    fn init_decoder(&mut self) -> Result<(), EngineError>;

    /// Encode one 20 ms frame of samples.
    ///
    /// `payload` is cleared and receives the packet once enough frames for
    /// a whole packet have been encoded; it stays empty otherwise.
    fn encode(
        &mut self,
        control: &EncoderControl,
        samples: &[i16],
        payload: &mut Vec<u8>,
    ) -> Result<(), EngineError>;

    /// Decode one sub-frame.
    ///
    /// With `lost == false` successive calls walk the sub-frames of
    /// `payload`, and `control.more_internal_frames` tells whether another
    /// call is needed. With `lost == true` the engine conceals one frame.
    /// `frame` is cleared and receives the output samples.
    fn decode(
        &mut self,
        control: &mut DecoderControl,
        lost: bool,
        payload: &[u8],
        frame: &mut Vec<i16>,
    ) -> Result<(), EngineError>;

    /// Look in `payload` for redundancy describing the packet `delay`
    /// positions earlier. Returns a decodable payload when found.
    fn search_for_lbrr(&self, payload: &[u8], delay: usize) -> Option<Vec<u8>>;
}
