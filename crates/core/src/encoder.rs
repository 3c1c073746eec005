//! Encode session: raw PCM in, container stream out.
//!
//! The session reads the input in 20 ms chunks and hands each chunk to the
//! engine. The engine buffers chunks internally and fills the payload once a
//! whole packet interval has been fed; at that boundary the session writes
//! one record, even a zero-length one. A final chunk shorter than 20 ms ends
//! the stream and is not padded.
//!
//! # Error Handling
//!
//! Configuration errors and engine size/init failures abort before any
//! record is written. Engine failures during encoding are logged and the
//! session keeps going with the next chunk.

use crate::codec::{CodecEngine, EncoderControl};
use crate::container::{BitstreamWriter, HeaderLayout};
use crate::error::{Error, Result};
use crate::metrics::{EncoderStats, ACTIVE_ENERGY_THRESHOLD};
use crate::packet::{ENCODE_MAX_PACKET_BYTES, FRAME_LENGTH_MS, MAX_API_FS_KHZ, MAX_INPUT_FRAMES};
use crate::wire;
use std::io::{Read, Write};
use std::time::Instant;

/// Upper bound on the default internal sample rate.
const DEFAULT_MAX_INTERNAL_RATE: u32 = 24000;

/// Highest complexity level engines are asked for.
pub const MAX_COMPLEXITY: u32 = 2;

/// Configuration for an encode session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Input sample rate in Hz
    pub api_sample_rate: u32,

    /// Max internal sample rate; `None` means min(24000, API rate)
    pub max_internal_sample_rate: Option<u32>,

    /// Packet interval in milliseconds (multiple of 20, at most 100)
    pub packet_ms: u32,

    /// Target bitrate in bits per second
    pub bit_rate: u32,

    /// Complexity level, 0 to 2
    pub complexity: u32,

    /// Expected packet loss in percent, tunes redundancy
    pub packet_loss_percentage: u32,

    /// Embed redundancy for earlier packets
    pub use_inband_fec: bool,

    /// Emit zero-length packets during silence
    pub use_dtx: bool,

    /// Write the legacy header layout
    pub legacy_header: bool,

    /// Terminate the stream with the -1 sentinel
    pub end_marker: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            api_sample_rate: 24000,
            max_internal_sample_rate: None,
            packet_ms: 20,
            bit_rate: 25000,
            complexity: 2,
            packet_loss_percentage: 0,
            use_inband_fec: false,
            use_dtx: false,
            legacy_header: false,
            end_marker: false,
        }
    }
}

impl EncoderConfig {
    /// Check every parameter before a session starts.
    pub fn validate(&self) -> Result<()> {
        check_sample_rate("API sample rate", self.api_sample_rate)?;
        if let Some(rate) = self.max_internal_sample_rate {
            check_sample_rate("max internal sample rate", rate)?;
        }

        let max_packet_ms = FRAME_LENGTH_MS * MAX_INPUT_FRAMES as u32;
        if self.packet_ms == 0
            || self.packet_ms % FRAME_LENGTH_MS != 0
            || self.packet_ms > max_packet_ms
        {
            return Err(Error::Config(format!(
                "packet length {} ms must be a multiple of {} ms up to {} ms",
                self.packet_ms, FRAME_LENGTH_MS, max_packet_ms
            )));
        }

        if self.complexity > MAX_COMPLEXITY {
            return Err(Error::Config(format!(
                "complexity {} above maximum {}",
                self.complexity, MAX_COMPLEXITY
            )));
        }
        if self.packet_loss_percentage > 100 {
            return Err(Error::Config(format!(
                "packet loss percentage {} above 100",
                self.packet_loss_percentage
            )));
        }
        Ok(())
    }

    /// Effective max internal sample rate.
    pub fn max_internal_sample_rate(&self) -> u32 {
        self.max_internal_sample_rate
            .unwrap_or_else(|| self.api_sample_rate.min(DEFAULT_MAX_INTERNAL_RATE))
    }

    /// Engine control block for this configuration.
    pub fn control(&self) -> EncoderControl {
        EncoderControl {
            api_sample_rate: self.api_sample_rate,
            max_internal_sample_rate: self.max_internal_sample_rate(),
            packet_size: (self.packet_ms * self.api_sample_rate / 1000) as usize,
            packet_loss_percentage: self.packet_loss_percentage,
            use_inband_fec: self.use_inband_fec,
            use_dtx: self.use_dtx,
            complexity: self.complexity,
            bit_rate: self.bit_rate,
        }
    }

    /// Header layout to write.
    pub fn layout(&self) -> HeaderLayout {
        if self.legacy_header {
            HeaderLayout::Legacy
        } else {
            HeaderLayout::Modern
        }
    }
}

pub(crate) fn check_sample_rate(what: &str, rate: u32) -> Result<()> {
    let max = MAX_API_FS_KHZ * 1000;
    if !(8000..=max).contains(&rate) {
        return Err(Error::Config(format!(
            "{} {} Hz outside 8000 - {} Hz",
            what, rate, max
        )));
    }
    Ok(())
}

fn mean_energy(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let nrg: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    nrg / samples.len() as f64
}

/// An encode session owning its engine.
pub struct Encoder<E: CodecEngine> {
    engine: E,
    control: EncoderControl,
    stats: EncoderStats,

    /// Engine output for the packet being built
    payload: Vec<u8>,

    /// Samples fed since the last packet boundary
    since_boundary: usize,

    /// Mean energy of the most recent chunk
    energy: f64,
}

impl<E: CodecEngine> Encoder<E> {
    /// Validate the configuration and initialize the engine.
    ///
    /// # Errors
    /// - `Error::Config` for an invalid configuration
    /// - `Error::Engine` if the engine cannot report its size or initialize
    pub fn new(mut engine: E, config: &EncoderConfig) -> Result<Self> {
        config.validate()?;
        let control = config.control();

        let size = engine.encoder_size()?;
        engine.init_encoder(&control)?;

        tracing::debug!(
            encoder_size = size,
            sample_rate = control.api_sample_rate,
            max_internal_rate = control.max_internal_sample_rate,
            packet_ms = config.packet_ms,
            bit_rate = control.bit_rate,
            fec = control.use_inband_fec,
            dtx = control.use_dtx,
            "encoder initialized"
        );

        Ok(Self {
            engine,
            control,
            stats: EncoderStats::new(control.api_sample_rate, config.packet_ms),
            payload: Vec::with_capacity(ENCODE_MAX_PACKET_BYTES),
            since_boundary: 0,
            energy: 0.0,
        })
    }

    /// Statistics so far.
    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Feed one 20 ms chunk to the engine.
    ///
    /// Returns true when the chunk completes a packet interval and
    /// [`emit_packet`](Self::emit_packet) should be called.
    pub fn accumulate(&mut self, samples: &[i16]) -> bool {
        self.stats.samples_read += samples.len() as u64;
        self.since_boundary += samples.len();
        self.energy = mean_energy(samples);

        let start = Instant::now();
        let result = self.engine.encode(&self.control, samples, &mut self.payload);
        self.stats.engine_time += start.elapsed();
        if let Err(e) = result {
            tracing::warn!(error = %e, "encode returned an error");
            self.stats.engine_errors += 1;
        }

        let elapsed_ms = 1000 * self.since_boundary / self.control.api_sample_rate as usize;
        elapsed_ms == self.stats.packet_ms as usize
    }

    /// Write the packet built since the last boundary, even if it is empty.
    pub fn emit_packet<W: Write>(&mut self, writer: &mut BitstreamWriter<W>) -> Result<()> {
        let active = self.energy > ACTIVE_ENERGY_THRESHOLD;

        writer.write_packet(&self.payload)?;
        self.stats.record_packet(self.payload.len(), active);
        tracing::trace!(
            packet = self.stats.packets,
            bytes = self.payload.len(),
            active,
            "packet written"
        );

        self.since_boundary = 0;
        self.energy = 0.0;
        Ok(())
    }

    /// Encode all of `input` into `writer`.
    ///
    /// Writes the header first, then one record per packet interval. The
    /// caller finishes the writer.
    pub fn run<R: Read, W: Write>(
        mut self,
        input: &mut R,
        writer: &mut BitstreamWriter<W>,
    ) -> Result<EncoderStats> {
        writer.write_header()?;

        let frame_size = self.control.frame_size();
        let mut chunk = Vec::with_capacity(frame_size);

        loop {
            let n = wire::read_samples(input, &mut chunk, frame_size)?;
            if n < frame_size {
                if n > 0 {
                    tracing::debug!(samples = n, "dropping partial frame at end of input");
                }
                break;
            }

            if self.accumulate(&chunk) {
                self.emit_packet(writer)?;
            }
        }

        tracing::debug!(
            packets = self.stats.packets,
            bytes = self.stats.bytes,
            "encoding finished"
        );
        Ok(self.stats)
    }
}
