//! Decode session: container stream in, raw PCM out, under simulated loss.
//!
//! # Pipeline
//!
//! ```text
//! read header
//! prime: read up to D packets into the window (no loss simulation)
//! loop until end of stream:
//!     read one packet into the tail slot
//!     loss simulator: lost -> store an empty slot
//!     resolve the head, write its samples, shift
//! drain: resolve and shift until the window is empty
//! ```
//!
//! Resolving the head decodes its payload when it has one. An empty head
//! (lost, or a zero-length DTX packet) is first looked up in the lookahead
//! slots for redundancy and only concealed when none is found.
//!
//! # Error Handling
//!
//! Format and I/O errors end the run. Engine errors are logged and the
//! samples the engine produced are written anyway.

use crate::assembler::{BlockKind, DecodedBlock, FrameAssembler};
use crate::codec::{CodecEngine, DecoderControl};
use crate::container::BitstreamReader;
use crate::encoder::check_sample_rate;
use crate::error::Result;
use crate::fec;
use crate::jitter::JitterWindow;
use crate::loss::{LossConfig, LossSimulator, LossStats};
use crate::metrics::DecoderStats;
use crate::packet::MAX_LBRR_DELAY;
use crate::wire;
use std::io::{Read, Write};
use std::time::Instant;

/// Configuration for a decode session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// Output sample rate in Hz
    pub api_sample_rate: u32,

    /// Simulated packet loss
    pub loss: LossConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            api_sample_rate: 24000,
            loss: LossConfig::default(),
        }
    }
}

impl DecoderConfig {
    /// Check every parameter before a session starts.
    pub fn validate(&self) -> Result<()> {
        check_sample_rate("output sample rate", self.api_sample_rate)?;
        self.loss.validate()
    }
}

/// A decode session owning its engine.
pub struct Decoder<E: CodecEngine> {
    engine: E,
    control: DecoderControl,
    window: JitterWindow,
    loss: LossSimulator,
    assembler: FrameAssembler,
    stats: DecoderStats,
}

impl<E: CodecEngine> Decoder<E> {
    /// Validate the configuration and initialize the engine.
    ///
    /// Engine size or init failures are logged, not returned.
    ///
    /// # Errors
    /// `Error::Config` for an invalid configuration.
    pub fn new(mut engine: E, config: &DecoderConfig) -> Result<Self> {
        config.validate()?;

        match engine.decoder_size() {
            Ok(size) => tracing::debug!(decoder_size = size, "decoder size"),
            Err(e) => tracing::warn!(error = %e, "decoder size query failed"),
        }
        if let Err(e) = engine.init_decoder() {
            tracing::warn!(error = %e, "decoder init failed");
        }

        tracing::debug!(
            sample_rate = config.api_sample_rate,
            loss_rate = config.loss.loss_rate,
            seed = config.loss.seed,
            "decoder initialized"
        );

        Ok(Self {
            engine,
            control: DecoderControl::new(config.api_sample_rate),
            window: JitterWindow::new(MAX_LBRR_DELAY),
            loss: LossSimulator::new(config.loss),
            assembler: FrameAssembler::new(),
            stats: DecoderStats::new(config.api_sample_rate),
        })
    }

    /// Statistics so far.
    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Decisions taken by the loss simulator so far.
    pub fn loss_stats(&self) -> LossStats {
        self.loss.stats()
    }

    /// Fill the lookahead slots before the first packet is resolved.
    ///
    /// Reads up to D packets without consulting the loss simulator.
    pub fn prime<R: Read>(&mut self, reader: &mut BitstreamReader<R>) -> Result<()> {
        for _ in 0..self.window.depth() {
            let Some(packet) = reader.read_packet()? else {
                break;
            };
            self.stats.packets += 1;
            if packet.is_empty() {
                self.stats.empty += 1;
            }
            self.window.push(&packet.payload)?;
        }
        Ok(())
    }

    /// Read one packet into the tail slot, then resolve the head.
    ///
    /// Returns false, without touching the window, at end of stream.
    pub fn step<R: Read, W: Write>(
        &mut self,
        reader: &mut BitstreamReader<R>,
        output: &mut W,
    ) -> Result<bool> {
        let Some(packet) = reader.read_packet()? else {
            return Ok(false);
        };

        self.stats.packets += 1;
        let lost = self.loss.is_lost();
        self.stats.lost_by_simulator = self.loss.stats().packets_dropped;
        if lost {
            tracing::trace!(packet = self.stats.packets, "packet dropped by loss simulator");
            self.window.push_lost()?;
        } else {
            if packet.is_empty() {
                self.stats.empty += 1;
            }
            self.window.push(&packet.payload)?;
        }

        self.resolve_head(output)?;
        Ok(true)
    }

    /// Resolve every packet still in the window.
    pub fn drain<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let pending = self.window.stats();
        tracing::debug!(
            pending = pending.pending,
            lost = pending.lost_pending,
            bytes = pending.buffered_bytes,
            "draining jitter window"
        );

        while !self.window.is_empty() {
            self.resolve_head(output)?;
        }
        Ok(())
    }

    /// Decode every packet of `reader` into `output`.
    ///
    /// Reads the header first unless the caller already did.
    ///
    /// # Errors
    /// `FormatError` for a bad header or malformed record, `Error::Io` for
    /// read or write failures.
    pub fn run<R: Read, W: Write>(
        mut self,
        reader: &mut BitstreamReader<R>,
        output: &mut W,
    ) -> Result<DecoderStats> {
        if reader.layout().is_none() {
            reader.read_header()?;
        }

        self.prime(reader)?;
        while self.step(reader, output)? {}
        self.drain(output)?;
        output.flush()?;

        let loss = self.loss.stats();
        tracing::debug!(
            packets = self.stats.packets,
            simulated = loss.packets_seen,
            observed_loss = loss.loss_rate(),
            recovered = self.stats.recovered,
            concealed = self.stats.concealed,
            "decoding finished"
        );
        Ok(self.stats)
    }

    /// Produce the output block for the head packet, write it and shift.
    fn resolve_head<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let Some(head) = self.window.head() else {
            return Ok(());
        };

        let block = if !head.is_empty() {
            let start = Instant::now();
            let block = self
                .assembler
                .decode(&mut self.engine, &mut self.control, head, BlockKind::Decoded);
            self.stats.engine_time += start.elapsed();
            block
        } else {
            let start = Instant::now();
            let recovered = fec::recover(&self.engine, &self.window);
            let block = match recovered {
                Some(r) => self.assembler.decode(
                    &mut self.engine,
                    &mut self.control,
                    &r.payload,
                    BlockKind::Recovered,
                ),
                None => self.assembler.conceal(&mut self.engine, &mut self.control),
            };
            self.stats.engine_time += start.elapsed();
            block
        };

        self.record(&block);
        wire::write_samples(output, &block.samples)?;
        self.window.shift()?;
        Ok(())
    }

    fn record(&mut self, block: &DecodedBlock) {
        match block.kind {
            BlockKind::Decoded => self.stats.decoded += 1,
            BlockKind::Recovered => self.stats.recovered += 1,
            BlockKind::Concealed => self.stats.concealed += 1,
            BlockKind::Discarded => self.stats.discarded += 1,
        }
        self.stats.samples_written += block.samples.len() as u64;
        self.stats.last_packet_ms = block.duration_ms(self.control.api_sample_rate);

        tracing::trace!(
            kind = ?block.kind,
            frames = block.frames,
            ms = self.stats.last_packet_ms,
            "packet resolved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::ScriptedEngine;
    use crate::container::{BitstreamWriter, HeaderLayout};
    use crate::error::{Error, FormatError};
    use std::io::Cursor;

    fn stream(records: &[&[u8]]) -> BitstreamReader<Cursor<Vec<u8>>> {
        let mut writer = BitstreamWriter::new(Vec::new(), HeaderLayout::Modern);
        writer.write_header().unwrap();
        for record in records {
            writer.write_packet(record).unwrap();
        }
        BitstreamReader::new(Cursor::new(writer.finish().unwrap()))
    }

    fn decode(
        engine: ScriptedEngine,
        config: &DecoderConfig,
        records: &[&[u8]],
    ) -> (DecoderStats, Vec<i16>) {
        let decoder = Decoder::new(engine, config).unwrap();
        let mut output = Vec::new();
        let stats = decoder.run(&mut stream(records), &mut output).unwrap();
        (stats, wire::bytes_to_samples(&output))
    }

    fn expected(blocks: &[(i16, usize)], frame_len: usize) -> Vec<i16> {
        blocks
            .iter()
            .flat_map(|&(value, frames)| std::iter::repeat(value).take(frames * frame_len))
            .collect()
    }

    #[test]
    fn test_decodes_every_packet_in_order() {
        let config = DecoderConfig::default();
        let records: [&[u8]; 5] = [&[1], &[2], &[1], &[3], &[1]];
        let (stats, samples) = decode(ScriptedEngine::new(4), &config, &records);

        assert_eq!(samples, expected(&[(1, 1), (2, 2), (1, 1), (3, 3), (1, 1)], 4));
        assert_eq!(stats.packets, 5);
        assert_eq!(stats.decoded, 5);
        assert_eq!(stats.samples_written, 32);
        assert_eq!(stats.lost_by_simulator, 0);
    }

    #[test]
    fn test_empty_packet_recovered_from_lookahead() {
        let mut engine = ScriptedEngine::new(4);
        engine.redundancy.insert((3, 1), vec![2]);

        let config = DecoderConfig::default();
        let (stats, samples) = decode(engine, &config, &[&[1], &[], &[3], &[1]]);

        assert_eq!(samples, expected(&[(1, 1), (2, 2), (3, 3), (1, 1)], 4));
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.recovered, 1);
        assert_eq!(stats.concealed, 0);
    }

    #[test]
    fn test_unrecoverable_packet_concealed() {
        let config = DecoderConfig::default();
        let (stats, samples) = decode(ScriptedEngine::new(4), &config, &[&[2], &[], &[1]]);

        // Concealment repeats the last packet's frame count
        assert_eq!(samples, expected(&[(2, 2), (-1, 2), (1, 1)], 4));
        assert_eq!(stats.concealed, 1);
    }

    #[test]
    fn test_priming_reads_skip_loss_simulation() {
        let config = DecoderConfig {
            loss: LossConfig::with_rate(1.0, 9),
            ..DecoderConfig::default()
        };
        let (stats, samples) = decode(ScriptedEngine::new(4), &config, &[&[1u8][..]; 6]);

        // The first two packets are primed; only the last four face the simulator
        assert_eq!(stats.lost_by_simulator, 4);
        assert_eq!(stats.decoded, 2);
        assert_eq!(stats.concealed, 4);
        assert_eq!(samples.len(), 6 * 4);
    }

    #[test]
    fn test_corrupt_packet_discarded() {
        let config = DecoderConfig::default();
        let (stats, samples) = decode(ScriptedEngine::new(4), &config, &[&[7], &[1], &[1]]);

        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.decoded, 2);
        assert_eq!(samples, expected(&[(1, 2)], 4));
    }

    #[test]
    fn test_short_streams_drain() {
        let config = DecoderConfig::default();

        let (stats, samples) = decode(ScriptedEngine::new(4), &config, &[&[2]]);
        assert_eq!(stats.decoded, 1);
        assert_eq!(samples.len(), 8);

        let (stats, samples) = decode(ScriptedEngine::new(4), &config, &[]);
        assert_eq!(stats.packets, 0);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_step_by_step() {
        let mut decoder = Decoder::new(ScriptedEngine::new(2), &DecoderConfig::default()).unwrap();
        let mut reader = stream(&[&[1], &[2], &[3]]);
        let mut output = Vec::new();
        reader.read_header().unwrap();

        decoder.prime(&mut reader).unwrap();
        assert_eq!(decoder.stats().packets, 2);
        assert!(output.is_empty());

        assert!(decoder.step(&mut reader, &mut output).unwrap());
        assert_eq!(wire::bytes_to_samples(&output), vec![1, 1]);

        assert!(!decoder.step(&mut reader, &mut output).unwrap());
        assert_eq!(decoder.stats().decoded, 1);
        assert_eq!(decoder.loss_stats().packets_seen, 1);

        decoder.drain(&mut output).unwrap();
        assert_eq!(decoder.stats().decoded, 3);
        assert_eq!(output.len(), (2 + 4 + 6) * 2);
    }

    #[test]
    fn test_loss_counts_follow_simulator() {
        let config = DecoderConfig {
            loss: LossConfig::with_rate(1.0, 3),
            ..DecoderConfig::default()
        };
        let mut decoder = Decoder::new(ScriptedEngine::new(2), &config).unwrap();
        let mut reader = stream(&[&[1u8][..]; 5]);
        let mut output = Vec::new();
        reader.read_header().unwrap();

        decoder.prime(&mut reader).unwrap();
        assert_eq!(decoder.loss_stats(), LossStats::default());

        while decoder.step(&mut reader, &mut output).unwrap() {}
        let loss = decoder.loss_stats();
        assert_eq!(loss.packets_seen, 3);
        assert_eq!(loss.packets_dropped, 3);
        assert_eq!(loss.loss_rate(), 1.0);
        assert_eq!(decoder.stats().lost_by_simulator, loss.packets_dropped);
    }

    #[test]
    fn test_bad_header() {
        let decoder = Decoder::new(ScriptedEngine::new(4), &DecoderConfig::default()).unwrap();
        let mut reader = BitstreamReader::new(Cursor::new(b"RIFF....WAVE".to_vec()));
        let mut output = Vec::new();

        let result = decoder.run(&mut reader, &mut output);
        assert!(matches!(result, Err(Error::Format(FormatError::BadHeader { .. }))));
        assert!(output.is_empty());
    }

    #[test]
    fn test_loss_pattern_deterministic() {
        let config = DecoderConfig {
            loss: LossConfig::with_rate(0.4, 77),
            ..DecoderConfig::default()
        };
        let records: Vec<&[u8]> = vec![&[1u8][..]; 50];

        let (a, out_a) = decode(ScriptedEngine::new(4), &config, &records);
        let (b, out_b) = decode(ScriptedEngine::new(4), &config, &records);

        assert_eq!(out_a, out_b);
        assert_eq!(a.lost_by_simulator, b.lost_by_simulator);
        assert!(a.lost_by_simulator > 0);
    }

    #[test]
    fn test_invalid_config() {
        let config = DecoderConfig {
            api_sample_rate: 100,
            ..DecoderConfig::default()
        };
        assert!(matches!(
            Decoder::new(ScriptedEngine::new(4), &config),
            Err(Error::Config(_))
        ));

        let config = DecoderConfig {
            loss: LossConfig::with_rate(2.0, 1),
            ..DecoderConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
