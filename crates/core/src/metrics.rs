//! Statistics collected by the encode and decode sessions.
//!
//! Counters are plain fields updated by the session loops. They are outputs
//! only and never feed back into control flow.
//!
//! # Bitrates
//!
//! Bitrates follow the packet interval rather than wall time:
//! ```text
//! avg_rate_kbps = 8 / packet_ms * bytes / packets
//! act_rate_kbps = 8 / packet_ms * active_bytes / active_packets
//! ```
//! A packet is active when the mean energy of its source samples exceeds
//! [`ACTIVE_ENERGY_THRESHOLD`].
//!
//! # Thread Safety
//!
//! Not thread-safe. Each session owns its own statistics.

use std::time::Duration;

/// Mean sample energy above which a packet counts as active speech.
pub const ACTIVE_ENERGY_THRESHOLD: f64 = 1e3;

/// Statistics for one encode run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncoderStats {
    // === Input ===
    /// PCM samples consumed
    pub samples_read: u64,

    /// Input sample rate in Hz
    pub sample_rate: u32,

    // === Output ===
    /// Packets written, including zero-length ones
    pub packets: u64,

    /// Packets whose source was active
    pub active_packets: u64,

    /// Payload bytes written, excluding length prefixes
    pub bytes: u64,

    /// Payload bytes of active packets
    pub active_bytes: u64,

    /// Packets of length zero (DTX)
    pub empty_packets: u64,

    /// Engine calls that reported an error
    pub engine_errors: u64,

    // === Timing ===
    /// Packet interval in milliseconds
    pub packet_ms: u32,

    /// Time spent inside the engine
    pub engine_time: Duration,
}

impl EncoderStats {
    /// Create empty statistics for the given input rate and packet interval.
    pub fn new(sample_rate: u32, packet_ms: u32) -> Self {
        Self {
            sample_rate,
            packet_ms,
            ..Self::default()
        }
    }

    /// Account for one written packet.
    pub fn record_packet(&mut self, size: usize, active: bool) {
        self.packets += 1;
        self.bytes += size as u64;
        if size == 0 {
            self.empty_packets += 1;
        }
        if active {
            self.active_packets += 1;
            self.active_bytes += size as u64;
        }
    }

    /// Average bitrate over all packets, in kbps.
    pub fn avg_rate_kbps(&self) -> f64 {
        rate_kbps(self.bytes, self.packets, self.packet_ms)
    }

    /// Average bitrate over active packets, in kbps. Zero if none were active.
    pub fn act_rate_kbps(&self) -> f64 {
        rate_kbps(self.active_bytes, self.active_packets, self.packet_ms)
    }

    /// Input length in seconds.
    pub fn file_seconds(&self) -> f64 {
        seconds(self.samples_read, self.sample_rate)
    }

    /// Engine time as a percentage of the input length.
    pub fn realtime_percent(&self) -> f64 {
        realtime_percent(self.engine_time, self.file_seconds())
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Encode Summary ===");
        println!("File length:        {:.3} s", self.file_seconds());
        println!(
            "Time for encoding:  {:.3} s ({:.3}% of realtime)",
            self.engine_time.as_secs_f64(),
            self.realtime_percent()
        );
        println!();
        println!("Packets:            {} ({} ms each)", self.packets, self.packet_ms);
        println!("Active packets:     {}", self.active_packets);
        println!("Empty packets:      {}", self.empty_packets);
        println!("Payload bytes:      {}", self.bytes);
        println!();
        println!("Average bitrate:    {:.3} kbps", self.avg_rate_kbps());
        println!("Active bitrate:     {:.3} kbps", self.act_rate_kbps());
        if self.engine_errors > 0 {
            println!("Engine errors:      {}", self.engine_errors);
        }
        println!();
    }

    /// Print a compact one-line result.
    pub fn print_result(&self) {
        println!(
            "{:.3} s audio, {} packets, avg {:.3} kbps, active {:.3} kbps, {:.3}% of realtime",
            self.file_seconds(),
            self.packets,
            self.avg_rate_kbps(),
            self.act_rate_kbps(),
            self.realtime_percent()
        );
    }

    /// Export statistics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "samples_read={}\n\
             packets={}\n\
             active_packets={}\n\
             empty_packets={}\n\
             bytes={}\n\
             active_bytes={}\n\
             avg_rate_kbps={:.4}\n\
             act_rate_kbps={:.4}\n\
             engine_errors={}\n",
            self.samples_read,
            self.packets,
            self.active_packets,
            self.empty_packets,
            self.bytes,
            self.active_bytes,
            self.avg_rate_kbps(),
            self.act_rate_kbps(),
            self.engine_errors,
        )
    }
}

/// Statistics for one decode run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoderStats {
    // === Input ===
    /// Packets read from the stream
    pub packets: u64,

    /// Packets marked lost by the loss simulator
    pub lost_by_simulator: u64,

    /// Zero-length packets found in the stream
    pub empty: u64,

    // === Resolution ===
    /// Packets decoded from their own payload
    pub decoded: u64,

    /// Lost packets decoded from redundancy in a later packet
    pub recovered: u64,

    /// Lost packets replaced by concealment
    pub concealed: u64,

    /// Packets dropped by the corruption guard
    pub discarded: u64,

    // === Output ===
    /// PCM samples written
    pub samples_written: u64,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Duration of the last resolved packet in milliseconds
    pub last_packet_ms: u32,

    /// Time spent inside the engine, including redundancy searches
    pub engine_time: Duration,
}

impl DecoderStats {
    /// Create empty statistics for the given output rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Packets resolved into output blocks.
    pub fn resolved(&self) -> u64 {
        self.decoded + self.recovered + self.concealed + self.discarded
    }

    /// Fraction of read packets the simulator dropped.
    pub fn loss_rate(&self) -> f64 {
        if self.packets == 0 {
            0.0
        } else {
            self.lost_by_simulator as f64 / self.packets as f64
        }
    }

    /// Fraction of missing packets that redundancy recovered.
    pub fn recovery_rate(&self) -> f64 {
        let missing = self.recovered + self.concealed;
        if missing == 0 {
            0.0
        } else {
            self.recovered as f64 / missing as f64
        }
    }

    /// Output length in seconds.
    pub fn file_seconds(&self) -> f64 {
        seconds(self.samples_written, self.sample_rate)
    }

    /// Engine time as a percentage of the output length.
    pub fn realtime_percent(&self) -> f64 {
        realtime_percent(self.engine_time, self.file_seconds())
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Decode Summary ===");
        println!("File length:        {:.3} s", self.file_seconds());
        println!(
            "Time for decoding:  {:.3} s ({:.3}% of realtime)",
            self.engine_time.as_secs_f64(),
            self.realtime_percent()
        );
        println!();
        println!("Packets read:       {}", self.packets);
        println!(
            "Simulated loss:     {} ({:.2}%)",
            self.lost_by_simulator,
            self.loss_rate() * 100.0
        );
        println!("Empty packets:      {}", self.empty);
        println!();
        println!("Decoded:            {}", self.decoded);
        println!(
            "Recovered (FEC):    {} ({:.2}% of missing)",
            self.recovered,
            self.recovery_rate() * 100.0
        );
        println!("Concealed:          {}", self.concealed);
        println!("Discarded:          {}", self.discarded);
        println!("Samples written:    {}", self.samples_written);
        println!();
    }

    /// Print a compact one-line result.
    pub fn print_result(&self) {
        println!(
            "{:.3} s audio, {} packets, {} recovered, {} concealed, {:.3}% of realtime",
            self.file_seconds(),
            self.packets,
            self.recovered,
            self.concealed,
            self.realtime_percent()
        );
    }

    /// Export statistics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "packets={}\n\
             lost_by_simulator={}\n\
             empty={}\n\
             decoded={}\n\
             recovered={}\n\
             concealed={}\n\
             discarded={}\n\
             samples_written={}\n\
             loss_rate={:.4}\n",
            self.packets,
            self.lost_by_simulator,
            self.empty,
            self.decoded,
            self.recovered,
            self.concealed,
            self.discarded,
            self.samples_written,
            self.loss_rate(),
        )
    }
}

fn rate_kbps(bytes: u64, packets: u64, packet_ms: u32) -> f64 {
    if packets == 0 || packet_ms == 0 {
        return 0.0;
    }
    8.0 / packet_ms as f64 * bytes as f64 / packets as f64
}

fn seconds(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / sample_rate as f64
}

fn realtime_percent(engine_time: Duration, file_seconds: f64) -> f64 {
    if file_seconds == 0.0 {
        0.0
    } else {
        100.0 * engine_time.as_secs_f64() / file_seconds
    }
}
