//! Test signal generation.
//!
//! When no recording is at hand we generate a PCM signal with speech-like
//! structure, so both active and inactive packets show up in the metrics.
//!
//! # Design
//!
//! The signal is a sequence of segments, 100 to 800 ms each:
//! - Voiced bursts (harmonic tone with a smooth envelope)
//! - Unvoiced bursts (filtered noise)
//! - Pauses (near-silence, low enough for DTX to kick in)

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use silk_sim_core::wire;
use std::f32::consts::TAU;
use std::io::Write;

/// Generate `seconds` of speech-like PCM at `sample_rate`.
pub fn generate_signal(seed: u64, seconds: u32, sample_rate: u32) -> Vec<i16> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let total = seconds as usize * sample_rate as usize;
    let mut samples = Vec::with_capacity(total);

    while samples.len() < total {
        let ms: u32 = rng.gen_range(100..=800);
        let len = (ms as usize * sample_rate as usize / 1000).min(total - samples.len());

        match rng.gen_range(0..10u8) {
            // 50% voiced
            0..=4 => voiced(&mut rng, len, sample_rate, &mut samples),

            // 20% unvoiced
            5..=6 => unvoiced(&mut rng, len, &mut samples),

            // 30% pause
            _ => samples.extend(std::iter::repeat(0).take(len)),
        }
    }

    samples
}

fn voiced(rng: &mut ChaCha8Rng, len: usize, sample_rate: u32, out: &mut Vec<i16>) {
    let pitch: f32 = rng.gen_range(90.0..300.0);
    let amplitude: f32 = rng.gen_range(2000.0..12000.0);

    for i in 0..len {
        let t = i as f32 / sample_rate as f32;
        let envelope = (std::f32::consts::PI * i as f32 / len as f32).sin();
        let value: f32 = (1..=4)
            .map(|h| (TAU * pitch * h as f32 * t).sin() / h as f32)
            .sum();
        out.push((value * amplitude * envelope * 0.5) as i16);
    }
}

fn unvoiced(rng: &mut ChaCha8Rng, len: usize, out: &mut Vec<i16>) {
    let amplitude: f32 = rng.gen_range(500.0..3000.0);
    let mut last = 0.0f32;

    for _ in 0..len {
        let white: f32 = rng.gen_range(-1.0..1.0);
        last = 0.6 * last + 0.4 * white;
        out.push((last * amplitude) as i16);
    }
}

/// Write a generated signal to a raw PCM file.
pub fn write_signal_file(
    path: &std::path::Path,
    seed: u64,
    seconds: u32,
    sample_rate: u32,
) -> std::io::Result<usize> {
    let samples = generate_signal(seed, seconds, sample_rate);
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    wire::write_samples(&mut file, &samples)?;
    file.flush()?;
    Ok(samples.len())
}
