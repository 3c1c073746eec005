//! Packet loss injection for decode-path testing.
//!
//! The decoder asks the simulator once per packet read in its main loop
//! whether that packet should be treated as lost. Nothing else consumes
//! randomness, so a fixed seed and loss rate reproduce the same loss
//! pattern on every run.
//!
//! # Determinism
//!
//! All randomness comes from a per-session ChaCha8 RNG seeded from the
//! configuration. There is no shared or global state.

use crate::error::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration for loss simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossConfig {
    /// Packet loss probability [0.0, 1.0]
    pub loss_rate: f64,

    /// Random seed for determinism
    pub seed: u64,
}

impl LossConfig {
    /// Create a configuration that never drops packets.
    pub fn perfect(seed: u64) -> Self {
        Self {
            loss_rate: 0.0,
            seed,
        }
    }

    /// Create a configuration dropping packets with the given probability.
    pub fn with_rate(loss_rate: f64, seed: u64) -> Self {
        Self { loss_rate, seed }
    }

    /// Check that the loss rate is a probability.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(Error::Config(format!(
                "loss rate {} outside [0, 1]",
                self.loss_rate
            )));
        }
        Ok(())
    }
}

impl Default for LossConfig {
    fn default() -> Self {
        Self::perfect(1)
    }
}

/// Decides which freshly read packets are lost.
///
/// # Thread Safety
/// Not thread-safe; each decode session owns its own instance.
pub struct LossSimulator {
    config: LossConfig,
    rng: ChaCha8Rng,

    // Statistics
    packets_seen: u64,
    packets_dropped: u64,
}

impl LossSimulator {
    /// Create a new loss simulator with the given configuration.
    pub fn new(config: LossConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Self {
            config,
            rng,
            packets_seen: 0,
            packets_dropped: 0,
        }
    }

    /// Decide the fate of the next packet.
    ///
    /// Advances the RNG exactly once per call, whatever the loss rate, so
    /// the pattern for a given seed does not depend on earlier decisions.
    pub fn is_lost(&mut self) -> bool {
        self.packets_seen += 1;

        let roll: f64 = self.rng.gen();
        let lost = roll < self.config.loss_rate;
        if lost {
            self.packets_dropped += 1;
        }
        lost
    }

    /// Get statistics about simulator behavior.
    pub fn stats(&self) -> LossStats {
        LossStats {
            packets_seen: self.packets_seen,
            packets_dropped: self.packets_dropped,
        }
    }
}

/// Statistics about loss simulator behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LossStats {
    /// Packets the simulator was asked about
    pub packets_seen: u64,

    /// Packets marked lost
    pub packets_dropped: u64,
}

impl LossStats {
    /// Compute the observed loss rate.
    pub fn loss_rate(&self) -> f64 {
        if self.packets_seen == 0 {
            0.0
        } else {
            self.packets_dropped as f64 / self.packets_seen as f64
        }
    }
}
