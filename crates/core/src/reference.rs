//! Built-in reference codec engine.
//!
//! A small deterministic codec that honours the full [`CodecEngine`]
//! contract, so streams can be produced and tested without the proprietary
//! speech codec. It is not meant to sound good.
//!
//! Each 20 ms frame is decimated by a factor chosen from the target bitrate
//! and max internal rate, and every kept sample is μ-law companded to one
//! byte. Complexity 0 keeps the first sample of each group; higher levels
//! average the group.
//!
//! # Payload Format
//!
//! ```text
//! +---------------------+
//! | info (1)            |  bits 0-2 frame count, bits 3-4 redundancy delay
//! +---------------------+
//! | rate_khz (1)        |  API rate of the encoder
//! +---------------------+
//! | decimation (1)      |
//! +---------------------+
//! | frames              |  count * ceil(rate_khz * 20 / decimation) bytes
//! +---------------------+
//! | [lbrr_count (1)]    |  present when the redundancy delay is nonzero
//! | [lbrr_decimation(1)]|
//! | [lbrr frames]       |  copy of an earlier packet at half the rate
//! +---------------------+
//! ```
//!
//! A redundancy copy found by `search_for_lbrr` is re-emitted as a plain
//! payload in the same format, so it decodes like any other packet.

use crate::codec::{CodecEngine, DecoderControl, EncoderControl};
use crate::error::EngineError;
use crate::packet::{
    ENCODE_MAX_BYTES_PER_FRAME, ENCODE_MAX_PACKET_BYTES, MAX_API_FS_KHZ, MAX_LBRR_DELAY,
};
use std::collections::VecDeque;

const HEADER_LEN: usize = 3;
const LBRR_HEADER_LEN: usize = 2;
const FRAME_COUNT_MASK: u8 = 0x07;
const LBRR_DELAY_SHIFT: u8 = 3;
const LBRR_DELAY_MASK: u8 = 0x03;

/// Silent frames tolerated before DTX starts emitting empty packets.
const DTX_HANGOVER_FRAMES: usize = 5;

/// Mean square energy below which a frame counts as silent.
const SILENCE_ENERGY: f64 = 100.0;

/// Expected loss at which redundancy moves two packets back.
const HIGH_LOSS_PERCENTAGE: u32 = 10;

const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = MAX_API_FS_KHZ * 1000;
const DEFAULT_MAX_INTERNAL_RATE: u32 = 24000;

/// Deterministic μ-law codec engine.
#[derive(Debug, Default)]
pub struct ReferenceEngine {
    enc: EncoderState,
    dec: DecoderState,
}

impl ReferenceEngine {
    /// Create an engine with fresh encoder and decoder state.
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct EncoderState {
    rate_khz: u8,
    decimation: u8,
    lbrr_decimation: u8,

    /// Coded frames of the packet under construction
    frames: Vec<Vec<u8>>,

    /// Redundancy codes of the same frames
    redundant: Vec<Vec<u8>>,

    /// Consecutive silent frames seen
    silent_frames: usize,

    /// Redundancy codes of the last packets, newest last
    history: VecDeque<Option<Vec<Vec<u8>>>>,
}

#[derive(Debug, Default)]
struct DecoderState {
    /// Packet whose sub-frames are being walked
    current: Option<CodedPacket>,
    next_frame: usize,

    /// Last frame produced, the basis for concealment
    last_frame: Vec<i16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CodedPacket {
    rate_khz: u8,
    decimation: u8,
    frames: Vec<Vec<u8>>,
    lbrr: Option<Redundancy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Redundancy {
    delay: u8,
    decimation: u8,
    frames: Vec<Vec<u8>>,
}

impl CodedPacket {
    fn write_to(&self, out: &mut Vec<u8>) {
        let delay = self.lbrr.as_ref().map_or(0, |r| r.delay);
        out.push((self.frames.len() as u8 & FRAME_COUNT_MASK) | (delay << LBRR_DELAY_SHIFT));
        out.push(self.rate_khz);
        out.push(self.decimation);
        for frame in &self.frames {
            out.extend_from_slice(frame);
        }

        if let Some(lbrr) = &self.lbrr {
            out.push(lbrr.frames.len() as u8);
            out.push(lbrr.decimation);
            for frame in &lbrr.frames {
                out.extend_from_slice(frame);
            }
        }
    }

    fn parse(payload: &[u8]) -> Result<Self, EngineError> {
        if payload.len() < HEADER_LEN {
            return Err(EngineError::CorruptPayload("packet shorter than header"));
        }

        let count = (payload[0] & FRAME_COUNT_MASK) as usize;
        let delay = (payload[0] >> LBRR_DELAY_SHIFT) & LBRR_DELAY_MASK;
        let rate_khz = payload[1];
        let decimation = payload[2];

        if count == 0 {
            return Err(EngineError::CorruptPayload("packet without frames"));
        }
        if !(8..=MAX_API_FS_KHZ as u8).contains(&rate_khz) {
            return Err(EngineError::CorruptPayload("sample rate out of range"));
        }
        if decimation == 0 {
            return Err(EngineError::CorruptPayload("zero decimation"));
        }

        let frame_size = rate_khz as usize * 20;
        let mut rest = &payload[HEADER_LEN..];
        let frames = split_frames(&mut rest, count, coded_len(frame_size, decimation))?;

        let lbrr = if delay > 0 {
            if rest.len() < LBRR_HEADER_LEN {
                return Err(EngineError::CorruptPayload("truncated redundancy header"));
            }
            let lbrr_count = rest[0] as usize;
            let lbrr_decimation = rest[1];
            if lbrr_count == 0 || lbrr_count > FRAME_COUNT_MASK as usize || lbrr_decimation == 0 {
                return Err(EngineError::CorruptPayload("bad redundancy header"));
            }
            rest = &rest[LBRR_HEADER_LEN..];
            let frames = split_frames(
                &mut rest,
                lbrr_count,
                coded_len(frame_size, lbrr_decimation),
            )?;
            Some(Redundancy {
                delay,
                decimation: lbrr_decimation,
                frames,
            })
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(EngineError::CorruptPayload("trailing bytes"));
        }

        Ok(Self {
            rate_khz,
            decimation,
            frames,
            lbrr,
        })
    }
}

fn split_frames(rest: &mut &[u8], count: usize, len: usize) -> Result<Vec<Vec<u8>>, EngineError> {
    if rest.len() < count * len {
        return Err(EngineError::CorruptPayload("truncated frame data"));
    }
    let (frames, tail) = rest.split_at(count * len);
    *rest = tail;
    Ok(frames.chunks_exact(len).map(<[u8]>::to_vec).collect())
}

/// Coded bytes for one frame of `frame_size` samples.
fn coded_len(frame_size: usize, decimation: u8) -> usize {
    frame_size.div_ceil(decimation as usize)
}

fn check_rate(rate: u32) -> Result<(), EngineError> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
        return Err(EngineError::InvalidSampleRate(rate));
    }
    Ok(())
}

/// The payload carries the rate in kHz, so encoding needs a whole-kHz rate.
/// Decoding interpolates to any rate in range.
fn check_encoder_rate(rate: u32) -> Result<(), EngineError> {
    check_rate(rate)?;
    if rate % 1000 != 0 {
        return Err(EngineError::InvalidSampleRate(rate));
    }
    Ok(())
}

/// Pick the smallest decimation that respects the internal rate, the
/// bitrate and the packet size ceiling.
fn choose_decimation(control: &EncoderControl, frames_per_packet: usize) -> u8 {
    let api = control.api_sample_rate as usize;
    let frame_size = control.frame_size();

    let internal = match control.max_internal_sample_rate {
        0 => control.api_sample_rate.min(DEFAULT_MAX_INTERNAL_RATE),
        rate => rate.clamp(MIN_SAMPLE_RATE, control.api_sample_rate),
    } as usize;
    let by_rate = api.div_ceil(internal);

    let budget = (control.bit_rate as usize / 400).max(1);
    let by_bitrate = frame_size.div_ceil(budget);

    let ceiling =
        (ENCODE_MAX_PACKET_BYTES - HEADER_LEN - LBRR_HEADER_LEN) / frames_per_packet.max(1);
    let fits = |d: usize| {
        let main = frame_size.div_ceil(d);
        let extra = if control.use_inband_fec {
            frame_size.div_ceil((2 * d).min(u8::MAX as usize))
        } else {
            0
        };
        main <= ENCODE_MAX_BYTES_PER_FRAME && main + extra <= ceiling
    };

    let mut d = by_rate.max(by_bitrate).max(1);
    while d < u8::MAX as usize && !fits(d) {
        d += 1;
    }
    d.min(u8::MAX as usize) as u8
}

fn decimate(samples: &[i16], decimation: u8, complexity: u32) -> Vec<u8> {
    samples
        .chunks(decimation as usize)
        .map(|group| {
            let value = if complexity == 0 {
                group[0]
            } else {
                let sum: i32 = group.iter().map(|&s| s as i32).sum();
                (sum / group.len() as i32) as i16
            };
            linear_to_ulaw(value)
        })
        .collect()
}

/// Interpolate coded samples up to `out_len` output samples.
fn expand(codes: &[u8], out_len: usize, frame: &mut Vec<i16>) {
    let values: Vec<f32> = codes.iter().map(|&c| ulaw_to_linear(c) as f32).collect();
    let m = values.len();
    if m == 0 {
        frame.resize(out_len, 0);
        return;
    }

    let last = (m - 1) as f32;
    let step = m as f32 / out_len as f32;
    for i in 0..out_len {
        let pos = ((i as f32 + 0.5) * step - 0.5).clamp(0.0, last);
        let i0 = pos.floor() as usize;
        let i1 = (i0 + 1).min(m - 1);
        let frac = pos - i0 as f32;
        let value = values[i0] + (values[i1] - values[i0]) * frac;
        frame.push(value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16);
    }
}

fn mean_energy(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let nrg: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    nrg / samples.len() as f64
}

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32635;

/// G.711 μ-law compression of one sample.
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0
    };
    pcm = pcm.min(ULAW_CLIP) + ULAW_BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && pcm & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (pcm >> (exponent + 3)) & 0x0F;

    !(sign | (exponent << 4) | mantissa) as u8
}

/// G.711 μ-law expansion of one byte.
pub fn ulaw_to_linear(code: u8) -> i16 {
    let code = !code;
    let exponent = ((code >> 4) & 0x07) as i32;
    let mantissa = (code & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + ULAW_BIAS) << exponent) - ULAW_BIAS;

    if code & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

impl ReferenceEngine {
    fn conceal(&mut self, out_len: usize, frame: &mut Vec<i16>) {
        let last = &mut self.dec.last_frame;
        if last.len() != out_len {
            last.clear();
            last.resize(out_len, 0);
        }
        for sample in last.iter_mut() {
            *sample /= 2;
        }
        frame.extend_from_slice(last);
    }
}

impl CodecEngine for ReferenceEngine {
    fn encoder_size(&self) -> Result<usize, EngineError> {
        Ok(std::mem::size_of::<EncoderState>())
    }

    fn decoder_size(&self) -> Result<usize, EngineError> {
        Ok(std::mem::size_of::<DecoderState>())
    }

    fn init_encoder(&mut self, control: &EncoderControl) -> Result<(), EngineError> {
        check_encoder_rate(control.api_sample_rate)?;

        let frame_size = control.frame_size();
        if control.packet_size == 0 || control.packet_size % frame_size != 0 {
            return Err(EngineError::InvalidFrameLength {
                expected: frame_size,
                actual: control.packet_size,
            });
        }

        let decimation = choose_decimation(control, control.packet_size / frame_size);
        self.enc = EncoderState {
            rate_khz: (control.api_sample_rate / 1000) as u8,
            decimation,
            lbrr_decimation: decimation.saturating_mul(2),
            ..EncoderState::default()
        };

        tracing::debug!(decimation, "reference encoder initialized");
        Ok(())
    }

    fn init_decoder(&mut self) -> Result<(), EngineError> {
        self.dec = DecoderState::default();
        Ok(())
    }

    fn encode(
        &mut self,
        control: &EncoderControl,
        samples: &[i16],
        payload: &mut Vec<u8>,
    ) -> Result<(), EngineError> {
        payload.clear();

        let frame_size = control.frame_size();
        if samples.len() != frame_size {
            return Err(EngineError::InvalidFrameLength {
                expected: frame_size,
                actual: samples.len(),
            });
        }

        let enc = &mut self.enc;
        enc.frames.push(decimate(samples, enc.decimation, control.complexity));
        if control.use_inband_fec {
            enc.redundant
                .push(decimate(samples, enc.lbrr_decimation, control.complexity));
        }
        if mean_energy(samples) < SILENCE_ENERGY {
            enc.silent_frames += 1;
        } else {
            enc.silent_frames = 0;
        }

        if enc.frames.len() * frame_size < control.packet_size {
            return Ok(());
        }

        let frames = std::mem::take(&mut enc.frames);
        let redundant = std::mem::take(&mut enc.redundant);
        let count = frames.len();

        if control.use_dtx && enc.silent_frames >= count + DTX_HANGOVER_FRAMES {
            enc.history.push_back(None);
            while enc.history.len() > MAX_LBRR_DELAY {
                enc.history.pop_front();
            }
            return Ok(());
        }

        let lbrr = if control.use_inband_fec {
            let delay = if control.packet_loss_percentage >= HIGH_LOSS_PERCENTAGE {
                2
            } else {
                1
            };
            enc.history
                .len()
                .checked_sub(delay)
                .and_then(|i| enc.history[i].clone())
                .map(|frames| Redundancy {
                    delay: delay as u8,
                    decimation: enc.lbrr_decimation,
                    frames,
                })
        } else {
            None
        };

        enc.history
            .push_back(control.use_inband_fec.then_some(redundant));
        while enc.history.len() > MAX_LBRR_DELAY {
            enc.history.pop_front();
        }

        let packet = CodedPacket {
            rate_khz: enc.rate_khz,
            decimation: enc.decimation,
            frames,
            lbrr,
        };
        packet.write_to(payload);

        if payload.len() > ENCODE_MAX_PACKET_BYTES {
            return Err(EngineError::PayloadTooLarge {
                size: payload.len(),
                max: ENCODE_MAX_PACKET_BYTES,
            });
        }
        Ok(())
    }

    fn decode(
        &mut self,
        control: &mut DecoderControl,
        lost: bool,
        payload: &[u8],
        frame: &mut Vec<i16>,
    ) -> Result<(), EngineError> {
        frame.clear();

        if let Err(e) = check_rate(control.api_sample_rate) {
            control.more_internal_frames = false;
            return Err(e);
        }
        let out_len = (control.api_sample_rate / 50) as usize;

        if lost {
            self.dec.current = None;
            self.dec.next_frame = 0;
            self.conceal(out_len, frame);
            control.more_internal_frames = false;
            return Ok(());
        }

        let packet = match self.dec.current.take() {
            Some(packet) => packet,
            None => match CodedPacket::parse(payload) {
                Ok(packet) => {
                    self.dec.next_frame = 0;
                    packet
                }
                Err(e) => {
                    self.conceal(out_len, frame);
                    control.more_internal_frames = false;
                    return Err(e);
                }
            },
        };

        expand(&packet.frames[self.dec.next_frame], out_len, frame);
        self.dec.next_frame += 1;
        self.dec.last_frame.clear();
        self.dec.last_frame.extend_from_slice(frame);

        control.more_internal_frames = self.dec.next_frame < packet.frames.len();
        if control.more_internal_frames {
            self.dec.current = Some(packet);
        } else {
            control.frames_per_packet = packet.frames.len();
            self.dec.next_frame = 0;
        }
        Ok(())
    }

    fn search_for_lbrr(&self, payload: &[u8], delay: usize) -> Option<Vec<u8>> {
        let packet = CodedPacket::parse(payload).ok()?;
        let lbrr = packet.lbrr?;
        if lbrr.delay as usize != delay {
            return None;
        }

        let recovered = CodedPacket {
            rate_khz: packet.rate_khz,
            decimation: lbrr.decimation,
            frames: lbrr.frames,
            lbrr: None,
        };
        let mut out = Vec::new();
        recovered.write_to(&mut out);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(packet_ms: u32) -> EncoderControl {
        EncoderControl {
            api_sample_rate: 24000,
            max_internal_sample_rate: 24000,
            packet_size: (packet_ms * 24) as usize,
            packet_loss_percentage: 0,
            use_inband_fec: false,
            use_dtx: false,
            complexity: 2,
            bit_rate: 25000,
        }
    }

    fn engine(control: &EncoderControl) -> ReferenceEngine {
        let mut engine = ReferenceEngine::new();
        engine.init_encoder(control).unwrap();
        engine.init_decoder().unwrap();
        engine
    }

    fn tone(frame: usize, amplitude: f32, offset: usize) -> Vec<i16> {
        (0..frame)
            .map(|i| ((offset + i) as f32 * 0.05).sin() * amplitude)
            .map(|v| v as i16)
            .collect()
    }

    /// Encode `frames` frames and return every non-empty packet.
    fn encode_frames(
        engine: &mut ReferenceEngine,
        control: &EncoderControl,
        frames: &[Vec<i16>],
    ) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        let mut payload = Vec::new();
        for frame in frames {
            engine.encode(control, frame, &mut payload).unwrap();
            if !payload.is_empty() {
                packets.push(payload.clone());
            }
        }
        packets
    }

    #[test]
    fn test_ulaw_round_trip() {
        assert_eq!(ulaw_to_linear(linear_to_ulaw(0)), 0);
        assert_eq!(linear_to_ulaw(0), 0xFF);

        for sample in [-32768i16, -20000, -1000, -5, 5, 1000, 20000, 32767] {
            let back = ulaw_to_linear(linear_to_ulaw(sample)) as i32;
            let error = (back - sample as i32).abs();
            assert!(error <= (sample as i32).abs() / 16 + 8, "{} -> {}", sample, back);
            assert_eq!(back.signum(), (sample as i32).signum());
        }
    }

    #[test]
    fn test_default_packet_layout() {
        let c = control(20);
        let mut engine = engine(&c);

        let packets = encode_frames(&mut engine, &c, &[tone(480, 8000.0, 0)]);

        assert_eq!(packets.len(), 1);
        let payload = &packets[0];
        assert_eq!(payload[0], 1);
        assert_eq!(payload[1], 24);
        // 25 kbps leaves 62 bytes per frame: 480 / 8 = 60
        assert_eq!(payload[2], 8);
        assert_eq!(payload.len(), HEADER_LEN + 60);
    }

    #[test]
    fn test_multi_frame_packet() {
        let c = control(60);
        let mut engine = engine(&c);
        let mut payload = Vec::new();

        engine.encode(&c, &tone(480, 5000.0, 0), &mut payload).unwrap();
        assert!(payload.is_empty());
        engine.encode(&c, &tone(480, 5000.0, 480), &mut payload).unwrap();
        assert!(payload.is_empty());
        engine.encode(&c, &tone(480, 5000.0, 960), &mut payload).unwrap();
        assert_eq!(payload[0] & FRAME_COUNT_MASK, 3);

        let mut dc = DecoderControl::new(24000);
        let mut frame = Vec::new();
        let mut total = 0;
        loop {
            engine.decode(&mut dc, false, &payload, &mut frame).unwrap();
            total += frame.len();
            if !dc.more_internal_frames {
                break;
            }
        }
        assert_eq!(total, 1440);
        assert_eq!(dc.frames_per_packet, 3);
    }

    #[test]
    fn test_decode_tracks_signal() {
        let c = EncoderControl {
            bit_rate: 200_000,
            ..control(20)
        };
        let mut engine = engine(&c);
        let input = vec![4000i16; 480];

        let packets = encode_frames(&mut engine, &c, &[input]);
        let mut dc = DecoderControl::new(24000);
        let mut frame = Vec::new();
        engine.decode(&mut dc, false, &packets[0], &mut frame).unwrap();

        assert_eq!(frame.len(), 480);
        assert!(frame.iter().all(|&s| (s - 4000).abs() < 200));
    }

    #[test]
    fn test_output_rate_conversion() {
        let c = control(20);
        let mut engine = engine(&c);
        let packets = encode_frames(&mut engine, &c, &[tone(480, 3000.0, 0)]);

        let mut dc = DecoderControl::new(8000);
        let mut frame = Vec::new();
        engine.decode(&mut dc, false, &packets[0], &mut frame).unwrap();
        assert_eq!(frame.len(), 160);

        let mut dc = DecoderControl::new(48000);
        engine.decode(&mut dc, false, &packets[0], &mut frame).unwrap();
        assert_eq!(frame.len(), 960);
    }

    #[test]
    fn test_dtx_after_hangover() {
        let c = EncoderControl {
            use_dtx: true,
            ..control(20)
        };
        let mut engine = engine(&c);
        let mut payload = Vec::new();
        let silence = vec![0i16; 480];

        let mut sizes = Vec::new();
        for _ in 0..10 {
            engine.encode(&c, &silence, &mut payload).unwrap();
            sizes.push(payload.len());
        }

        assert!(sizes[..DTX_HANGOVER_FRAMES].iter().all(|&n| n > 0));
        assert!(sizes[DTX_HANGOVER_FRAMES..].iter().all(|&n| n == 0));

        // Speech ends DTX immediately
        engine.encode(&c, &tone(480, 8000.0, 0), &mut payload).unwrap();
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_redundancy_one_packet_back() {
        let c = EncoderControl {
            use_inband_fec: true,
            ..control(20)
        };
        let mut engine = engine(&c);
        let frames: Vec<_> = (0..3).map(|k| tone(480, 6000.0, k * 480)).collect();
        let packets = encode_frames(&mut engine, &c, &frames);

        // The first packet has nothing to protect
        assert_eq!((packets[0][0] >> LBRR_DELAY_SHIFT) & LBRR_DELAY_MASK, 0);
        assert_eq!(engine.search_for_lbrr(&packets[0], 1), None);

        let recovered = engine.search_for_lbrr(&packets[1], 1).unwrap();
        assert_eq!(engine.search_for_lbrr(&packets[1], 2), None);
        assert_eq!(recovered[0], 1);
        assert_eq!(recovered[2], 16);

        let mut dc = DecoderControl::new(24000);
        let mut frame = Vec::new();
        engine.decode(&mut dc, false, &recovered, &mut frame).unwrap();
        assert_eq!(frame.len(), 480);
        assert!(!dc.more_internal_frames);
    }

    #[test]
    fn test_redundancy_two_packets_back_under_high_loss() {
        let c = EncoderControl {
            use_inband_fec: true,
            packet_loss_percentage: 20,
            ..control(20)
        };
        let mut engine = engine(&c);
        let frames: Vec<_> = (0..3).map(|k| tone(480, 6000.0, k * 480)).collect();
        let packets = encode_frames(&mut engine, &c, &frames);

        assert_eq!(engine.search_for_lbrr(&packets[1], 2), None);
        assert_eq!(engine.search_for_lbrr(&packets[2], 1), None);
        assert!(engine.search_for_lbrr(&packets[2], 2).is_some());
    }

    #[test]
    fn test_fec_packets_fit_encoder_bound() {
        let c = EncoderControl {
            api_sample_rate: 48000,
            max_internal_sample_rate: 48000,
            packet_size: 4800,
            use_inband_fec: true,
            bit_rate: 1_000_000,
            ..control(20)
        };
        let mut engine = engine(&c);
        let frames: Vec<_> = (0..10).map(|k| tone(960, 9000.0, k * 960)).collect();

        for packet in encode_frames(&mut engine, &c, &frames) {
            assert!(packet.len() <= ENCODE_MAX_PACKET_BYTES);
        }
    }

    #[test]
    fn test_concealment_decays() {
        let c = control(20);
        let mut engine = engine(&c);
        let packets = encode_frames(&mut engine, &c, &[vec![8000i16; 480]]);

        let mut dc = DecoderControl::new(24000);
        let mut frame = Vec::new();
        engine.decode(&mut dc, false, &packets[0], &mut frame).unwrap();
        let level = frame[240].abs();

        engine.decode(&mut dc, true, &[], &mut frame).unwrap();
        assert_eq!(frame.len(), 480);
        assert!(frame[240].abs() <= level / 2 + 1);

        for _ in 0..20 {
            engine.decode(&mut dc, true, &[], &mut frame).unwrap();
        }
        assert!(frame.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_corrupt_payload_is_error() {
        let mut engine = ReferenceEngine::new();
        let mut dc = DecoderControl::new(24000);
        let mut frame = Vec::new();

        let result = engine.decode(&mut dc, false, &[1, 24], &mut frame);
        assert!(matches!(result, Err(EngineError::CorruptPayload(_))));
        assert_eq!(frame.len(), 480);
        assert!(!dc.more_internal_frames);

        // Claims 2 frames of 60 bytes but carries one
        let mut short = vec![2, 24, 8];
        short.extend(std::iter::repeat(0xFF).take(60));
        assert!(engine.decode(&mut dc, false, &short, &mut frame).is_err());
    }

    #[test]
    fn test_seven_frame_payload_walks_all_frames() {
        let mut engine = ReferenceEngine::new();
        let mut payload = vec![7, 24, 8];
        payload.extend(std::iter::repeat(0xFF).take(7 * 60));

        let mut dc = DecoderControl::new(24000);
        let mut frame = Vec::new();
        let mut calls = 0;
        loop {
            engine.decode(&mut dc, false, &payload, &mut frame).unwrap();
            calls += 1;
            if !dc.more_internal_frames {
                break;
            }
        }
        assert_eq!(calls, 7);
    }

    #[test]
    fn test_init_rejects_bad_rates() {
        let mut engine = ReferenceEngine::new();
        for rate in [0, 4000, 44100, 96000] {
            let c = EncoderControl {
                api_sample_rate: rate,
                packet_size: 960,
                ..control(20)
            };
            assert!(matches!(
                engine.init_encoder(&c),
                Err(EngineError::InvalidSampleRate(_))
            ));
        }
    }

    #[test]
    fn test_decode_at_fractional_khz_rate() {
        let c = control(20);
        let mut engine = engine(&c);
        let packets = encode_frames(&mut engine, &c, &[tone(480, 5000.0, 0)]);

        for rate in [44100, 22050, 11025] {
            let mut dc = DecoderControl::new(rate);
            let mut frame = Vec::new();
            engine.decode(&mut dc, false, &packets[0], &mut frame).unwrap();
            assert_eq!(frame.len(), (rate / 50) as usize);
            assert!(frame.iter().any(|&s| s != 0));

            engine.decode(&mut dc, true, &[], &mut frame).unwrap();
            assert_eq!(frame.len(), (rate / 50) as usize);
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range_rate() {
        let c = control(20);
        let mut engine = engine(&c);
        let packets = encode_frames(&mut engine, &c, &[tone(480, 5000.0, 0)]);

        let mut dc = DecoderControl::new(96000);
        let mut frame = Vec::new();
        let result = engine.decode(&mut dc, false, &packets[0], &mut frame);
        assert!(matches!(result, Err(EngineError::InvalidSampleRate(96000))));
        assert!(frame.is_empty());
    }

    #[test]
    fn test_wrong_frame_length_rejected() {
        let c = control(20);
        let mut engine = engine(&c);
        let mut payload = vec![1, 2, 3];

        let result = engine.encode(&c, &[0; 100], &mut payload);
        assert!(matches!(
            result,
            Err(EngineError::InvalidFrameLength {
                expected: 480,
                actual: 100
            })
        ));
        assert!(payload.is_empty());
    }

    #[test]
    fn test_low_internal_rate_raises_decimation() {
        let c = EncoderControl {
            max_internal_sample_rate: 8000,
            bit_rate: 1_000_000,
            ..control(20)
        };
        assert_eq!(choose_decimation(&c, 1), 3);

        let c = EncoderControl {
            max_internal_sample_rate: 0,
            api_sample_rate: 48000,
            bit_rate: 1_000_000,
            ..control(20)
        };
        assert_eq!(choose_decimation(&c, 1), 4);
    }
}
