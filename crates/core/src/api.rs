//! File-level entry points.
//!
//! `encode` and `decode` run with the default configuration and report
//! success as a `bool`, logging any failure. The `*_file` variants take an
//! explicit configuration and return the run's statistics; the `*_file_with`
//! variants also accept any [`CodecEngine`].

use crate::codec::CodecEngine;
use crate::container::{BitstreamReader, BitstreamWriter};
use crate::decoder::{Decoder, DecoderConfig};
use crate::encoder::{Encoder, EncoderConfig};
use crate::error::Result;
use crate::metrics::{DecoderStats, EncoderStats};
use crate::reference::ReferenceEngine;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Encode a raw PCM file into a bitstream file with default settings.
///
/// Returns `false` after logging the error if anything fails.
pub fn encode(input: impl AsRef<Path>, output: impl AsRef<Path>) -> bool {
    match encode_file(input, output, &EncoderConfig::default()) {
        Ok(stats) => {
            tracing::info!(packets = stats.packets, bytes = stats.bytes, "encode complete");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "encode failed");
            false
        }
    }
}

/// Decode a bitstream file into a raw PCM file with default settings.
///
/// Returns `false` after logging the error if anything fails.
pub fn decode(input: impl AsRef<Path>, output: impl AsRef<Path>) -> bool {
    match decode_file(input, output, &DecoderConfig::default()) {
        Ok(stats) => {
            tracing::info!(
                packets = stats.packets,
                samples = stats.samples_written,
                "decode complete"
            );
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "decode failed");
            false
        }
    }
}

/// Encode with the built-in reference engine.
pub fn encode_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &EncoderConfig,
) -> Result<EncoderStats> {
    encode_file_with(ReferenceEngine::new(), input, output, config)
}

/// Decode with the built-in reference engine.
pub fn decode_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &DecoderConfig,
) -> Result<DecoderStats> {
    decode_file_with(ReferenceEngine::new(), input, output, config)
}

/// Encode `input` into `output` using `engine`.
///
/// # Errors
/// Configuration and engine init errors are reported before the output
/// file is created.
pub fn encode_file_with<E: CodecEngine>(
    engine: E,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &EncoderConfig,
) -> Result<EncoderStats> {
    let encoder = Encoder::new(engine, config)?;

    let mut reader = BufReader::new(File::open(input.as_ref())?);
    let file = BufWriter::new(File::create(output.as_ref())?);
    let mut writer = BitstreamWriter::new(file, config.layout()).with_end_marker(config.end_marker);

    let stats = encoder.run(&mut reader, &mut writer)?;
    writer.finish()?;
    Ok(stats)
}

/// Decode `input` into `output` using `engine`.
///
/// # Errors
/// A bad header is reported before the output file is created.
pub fn decode_file_with<E: CodecEngine>(
    engine: E,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &DecoderConfig,
) -> Result<DecoderStats> {
    let decoder = Decoder::new(engine, config)?;

    let mut reader = BitstreamReader::new(BufReader::new(File::open(input.as_ref())?));
    let layout = reader.read_header()?;
    tracing::debug!(?layout, "bitstream header accepted");

    let mut writer = BufWriter::new(File::create(output.as_ref())?);
    decoder.run(&mut reader, &mut writer)
}
