//! Turns one packet into one block of output samples.
//!
//! A packet holds one or more 20 ms sub-frames. The normal path keeps
//! calling the engine on the same payload until it reports no more
//! sub-frames. The concealment path, used when a packet is genuinely lost,
//! asks the engine for exactly `frames_per_packet` concealed frames, the
//! count reported by the last packet that decoded normally.
//!
//! A corrupt payload could make the engine report sub-frames forever, so
//! the normal path stops after `MAX_INPUT_FRAMES`. The whole block is then
//! discarded and the engine is reset so the next packet starts clean.

use crate::codec::{CodecEngine, DecoderControl};
use crate::packet::MAX_INPUT_FRAMES;

/// How a block's samples were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Decoded from the packet's own payload
    Decoded,
    /// Decoded from redundancy found in a later packet
    Recovered,
    /// Synthesized by the engine's concealment
    Concealed,
    /// Dropped because the packet claimed too many sub-frames
    Discarded,
}

/// Samples assembled for one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Output samples; empty for discarded blocks
    pub samples: Vec<i16>,

    /// Number of engine decode calls made
    pub frames: usize,

    /// How the samples were produced
    pub kind: BlockKind,
}

impl DecodedBlock {
    /// Block duration in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        duration_ms(self.samples.len(), sample_rate)
    }
}

/// Duration in milliseconds of `samples` samples at `sample_rate`.
pub fn duration_ms(samples: usize, sample_rate: u32) -> u32 {
    let per_ms = (sample_rate / 1000) as usize;
    if per_ms == 0 {
        return 0;
    }
    (samples / per_ms) as u32
}

/// Drives engine decode calls for one packet at a time.
#[derive(Debug)]
pub struct FrameAssembler {
    /// Scratch buffer for one sub-frame
    frame: Vec<i16>,

    /// Sub-frame count above which a packet is treated as corrupt
    max_frames: usize,
}

impl FrameAssembler {
    /// Create an assembler with the standard sub-frame bound.
    pub fn new() -> Self {
        Self::with_max_frames(MAX_INPUT_FRAMES)
    }

    /// Create an assembler with an explicit sub-frame bound.
    pub fn with_max_frames(max_frames: usize) -> Self {
        Self {
            frame: Vec::new(),
            max_frames,
        }
    }

    /// Decode every sub-frame of `payload`.
    ///
    /// `kind` is `Decoded` or `Recovered` depending on where the payload
    /// came from; it becomes `Discarded` if the corruption guard trips.
    pub fn decode<E: CodecEngine>(
        &mut self,
        engine: &mut E,
        control: &mut DecoderControl,
        payload: &[u8],
        kind: BlockKind,
    ) -> DecodedBlock {
        let mut samples = Vec::new();
        let mut frames = 0;

        loop {
            if let Err(e) = engine.decode(control, false, payload, &mut self.frame) {
                tracing::warn!(error = %e, "decode returned an error");
            }

            frames += 1;
            samples.extend_from_slice(&self.frame);

            if frames > self.max_frames {
                tracing::warn!(
                    frames,
                    max = self.max_frames,
                    "packet yields too many sub-frames, discarding it"
                );
                if let Err(e) = engine.init_decoder() {
                    tracing::warn!(error = %e, "decoder reset returned an error");
                }
                control.more_internal_frames = false;
                return DecodedBlock {
                    samples: Vec::new(),
                    frames,
                    kind: BlockKind::Discarded,
                };
            }

            if !control.more_internal_frames {
                break;
            }
        }

        DecodedBlock {
            samples,
            frames,
            kind,
        }
    }

    /// Conceal one lost packet.
    pub fn conceal<E: CodecEngine>(
        &mut self,
        engine: &mut E,
        control: &mut DecoderControl,
    ) -> DecodedBlock {
        let frames = control.frames_per_packet;
        let mut samples = Vec::new();

        for _ in 0..frames {
            if let Err(e) = engine.decode(control, true, &[], &mut self.frame) {
                tracing::warn!(error = %e, "concealment returned an error");
            }
            samples.extend_from_slice(&self.frame);
        }

        DecodedBlock {
            samples,
            frames,
            kind: BlockKind::Concealed,
        }
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
