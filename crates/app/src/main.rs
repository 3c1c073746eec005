//! silk-sim: command-line harness for the SILK v3 packetization pipeline
//!
//! - `encode`: raw PCM to bitstream
//! - `decode`: bitstream to raw PCM, with optional simulated loss
//! - `generate`: seeded speech-like PCM test signal
//! - `simulate`: generate, encode and decode in one run
//!
//! Logging goes through `tracing`; set `RUST_LOG=debug` (or `trace` for
//! per-packet events) to see what the sessions are doing.

mod config;
mod input_gen;

use anyhow::Context;
use clap::Parser;
use config::{Cli, Command};
use silk_sim_core::api;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Encode {
            input,
            output,
            encoder,
        } => encode(&cli, input, output, &encoder.to_config()),

        Command::Decode {
            input,
            output,
            decoder,
        } => {
            let seed = config::resolve_seed(decoder.seed);
            if decoder.seed.is_none() {
                println!("Seed: {}", seed);
            }
            decode(&cli, input, output, &decoder.to_config(seed))
        }

        Command::Generate {
            output,
            seconds,
            sample_rate,
            seed,
        } => {
            let seed = config::resolve_seed(*seed);
            println!("Seed: {}", seed);
            let samples = input_gen::write_signal_file(output, seed, *seconds, *sample_rate)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Wrote {} samples ({} s at {} Hz) to {}",
                samples,
                seconds,
                sample_rate,
                output.display()
            );
            Ok(())
        }

        Command::Simulate {
            dir,
            seconds,
            encoder,
            decoder,
        } => {
            let seed = config::resolve_seed(decoder.seed);
            let encoder = encoder.to_config();
            let decoder = decoder.to_config(seed);
            println!("Seed: {}", seed);

            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let pcm = dir.join("input.pcm");
            let bits = dir.join("stream.bit");
            let decoded = dir.join("output.pcm");

            input_gen::write_signal_file(&pcm, seed, *seconds, encoder.api_sample_rate)
                .with_context(|| format!("writing {}", pcm.display()))?;
            tracing::info!(path = %pcm.display(), seconds, "test signal generated");

            encode(&cli, &pcm, &bits, &encoder)?;
            decode(&cli, &bits, &decoded, &decoder)
        }
    }
}

fn encode(
    cli: &Cli,
    input: &Path,
    output: &Path,
    config: &silk_sim_core::EncoderConfig,
) -> anyhow::Result<()> {
    config.validate()?;
    if cli.print_config {
        config::print_encoder_config(config);
    }

    let stats = api::encode_file(input, output, config)
        .with_context(|| format!("encoding {} into {}", input.display(), output.display()))?;

    if cli.quiet {
        stats.print_result();
    } else {
        stats.print_summary();
    }
    Ok(())
}

fn decode(
    cli: &Cli,
    input: &Path,
    output: &Path,
    config: &silk_sim_core::DecoderConfig,
) -> anyhow::Result<()> {
    config.validate()?;
    if cli.print_config {
        config::print_decoder_config(config);
    }

    let stats = api::decode_file(input, output, config)
        .with_context(|| format!("decoding {} into {}", input.display(), output.display()))?;

    if cli.quiet {
        stats.print_result();
    } else {
        stats.print_summary();
    }
    Ok(())
}
