//! Configuration for the silk-sim application.
//!
//! Handles parsing command-line arguments and turning them into session
//! configurations for the core library.
//!
//! # Philosophy
//!
//! Every option has a default matching the reference test harness, so a
//! bare `silk-sim simulate` works. When no seed is given one is derived from
//! the clock and printed, so any run can be reproduced.

use clap::{Args, Parser, Subcommand};
use silk_sim_core::{DecoderConfig, EncoderConfig, LossConfig};
use std::path::PathBuf;

/// Encode, decode and loss-test SILK v3 bitstreams.
#[derive(Parser, Debug)]
#[command(name = "silk-sim", version, about = "SILK v3 bitstream packetizer and loss simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print the resolved configuration before running.
    #[arg(long, global = true)]
    pub print_config: bool,

    /// Print a one-line result instead of the full summary.
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode raw 16-bit PCM into a bitstream file.
    Encode {
        /// Raw PCM input (16-bit little-endian mono)
        input: PathBuf,

        /// Bitstream output
        output: PathBuf,

        #[command(flatten)]
        encoder: EncoderArgs,
    },

    /// Decode a bitstream file into raw 16-bit PCM.
    Decode {
        /// Bitstream input
        input: PathBuf,

        /// Raw PCM output
        output: PathBuf,

        #[command(flatten)]
        decoder: DecoderArgs,
    },

    /// Write a seeded speech-like PCM test signal.
    Generate {
        /// Raw PCM output
        output: PathBuf,

        /// Signal length in seconds.
        #[arg(long, default_value_t = 10)]
        seconds: u32,

        /// Sample rate in Hz.
        #[arg(long, default_value_t = 24000)]
        sample_rate: u32,

        /// Random seed (default: derived from the clock).
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Generate a signal, encode it and decode it under loss.
    Simulate {
        /// Directory for the generated, encoded and decoded files.
        #[arg(long, default_value = "./sim")]
        dir: PathBuf,

        /// Signal length in seconds.
        #[arg(long, default_value_t = 10)]
        seconds: u32,

        #[command(flatten)]
        encoder: EncoderArgs,

        #[command(flatten)]
        decoder: DecoderArgs,
    },
}

/// Encoder options.
#[derive(Args, Debug, Clone)]
pub struct EncoderArgs {
    /// Input sample rate in Hz.
    #[arg(long = "fs-api", default_value_t = 24000)]
    pub api_sample_rate: u32,

    /// Max internal sample rate in Hz (default: min(24000, input rate)).
    #[arg(long = "fs-max-internal")]
    pub max_internal_sample_rate: Option<u32>,

    /// Packet length in ms (20, 40, 60, 80 or 100).
    #[arg(long = "packet-length", default_value_t = 20)]
    pub packet_ms: u32,

    /// Target bitrate in bps.
    #[arg(long, default_value_t = 25000)]
    pub rate: u32,

    /// Complexity mode (0 to 2).
    #[arg(long, default_value_t = 2)]
    pub complexity: u32,

    /// Expected packet loss in percent, tunes redundancy.
    #[arg(long, default_value_t = 0)]
    pub expected_loss: u32,

    /// Enable in-band FEC.
    #[arg(long)]
    pub inband_fec: bool,

    /// Enable DTX.
    #[arg(long)]
    pub dtx: bool,

    /// Write the legacy header (0x02 before the magic).
    #[arg(long)]
    pub legacy_header: bool,

    /// Terminate the stream with the -1 end marker.
    #[arg(long)]
    pub end_marker: bool,
}

impl EncoderArgs {
    pub fn to_config(&self) -> EncoderConfig {
        EncoderConfig {
            api_sample_rate: self.api_sample_rate,
            max_internal_sample_rate: self.max_internal_sample_rate,
            packet_ms: self.packet_ms,
            bit_rate: self.rate,
            complexity: self.complexity,
            packet_loss_percentage: self.expected_loss,
            use_inband_fec: self.inband_fec,
            use_dtx: self.dtx,
            legacy_header: self.legacy_header,
            end_marker: self.end_marker,
        }
    }
}

/// Decoder options.
#[derive(Args, Debug, Clone)]
pub struct DecoderArgs {
    /// Output sample rate in Hz.
    #[arg(long = "fs-out", default_value_t = 24000)]
    pub output_sample_rate: u32,

    /// Simulated packet loss probability (0.0 - 1.0).
    #[arg(long, default_value_t = 0.0)]
    pub loss: f64,

    /// Random seed for loss simulation (default: derived from the clock).
    #[arg(long)]
    pub seed: Option<u64>,
}

impl DecoderArgs {
    pub fn to_config(&self, seed: u64) -> DecoderConfig {
        DecoderConfig {
            api_sample_rate: self.output_sample_rate,
            loss: LossConfig::with_rate(self.loss, seed),
        }
    }
}

/// Use the explicit seed, or derive one from the clock.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|t| t.as_millis() as u64)
            .unwrap_or(0)
    })
}

/// Print an encoder configuration in human-readable form.
pub fn print_encoder_config(config: &EncoderConfig) {
    println!("=== Encoder Configuration ===");
    println!("API sample rate:      {} Hz", config.api_sample_rate);
    println!("Max internal rate:    {} Hz", config.max_internal_sample_rate());
    println!("Packet length:        {} ms", config.packet_ms);
    println!("Bitrate:              {} bps", config.bit_rate);
    println!("Complexity:           {}", config.complexity);
    println!("Expected loss:        {}%", config.packet_loss_percentage);
    println!("In-band FEC:          {}", config.use_inband_fec);
    println!("DTX:                  {}", config.use_dtx);
    println!("Header layout:        {:?}", config.layout());
    println!("End marker:           {}", config.end_marker);
    println!();
}

/// Print a decoder configuration in human-readable form.
pub fn print_decoder_config(config: &DecoderConfig) {
    println!("=== Decoder Configuration ===");
    println!("Output sample rate:   {} Hz", config.api_sample_rate);
    println!("Simulated loss:       {:.2}%", config.loss.loss_rate * 100.0);
    println!("Seed:                 {}", config.loss.seed);
    println!();
}
