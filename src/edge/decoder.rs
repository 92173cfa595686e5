//! MM2 frame detection and decoding from edge timings
//!
//! Frame structure (36 edges = 18 pulse pairs):
//! - Sync: a quiet gap of at least 0.5 ms between sync-trigger edges marks
//!   the packet start.
//! - Each pulse pair carries one bit in its internal split point; the first
//!   pair's width is the reference for the whole frame. There is no fixed
//!   clock, every threshold is derived from the frame's own timing.
//! - Bit pairs combine into 9 trits; trits 0-3 are the address, the rest
//!   depend on the frame kind.
//!
//! A frame outside the duration envelope, or whose first pulse pair falls in
//! the MFX width band, is discarded without output and scanning resumes.

use thiserror::Error;
use tracing::{debug, trace};

use super::source::{EdgeKind, EdgeSource};
use crate::annotate::{DecodeEvent, EventSink, Field, Span};
use crate::mm2::fields;
use crate::mm2::types::{FrameKind, Mm2Command, RepeatKind, SpeedCommand, Trit};

/// Edges per frame: 18 pulse pairs, one rising and one falling edge each.
pub const FRAME_EDGES: usize = 36;

/// Minimum quiet gap between sync-trigger edges that marks a packet start.
const MIN_SYNC_GAP_S: f64 = 0.0005;
/// Accepted total frame span, strict bounds. Covers both the ~1.87 ms
/// accessory and the ~3.74 ms locomotive frame with margin.
const MIN_FRAME_S: f64 = 0.0013;
const MAX_FRAME_S: f64 = 0.0042;
/// Frames shorter than this are accessory (magnet) commands.
const MAGNET_SPLIT_S: f64 = 0.0025;
/// First pulse-pair widths in this closed band are MFX traffic sharing the
/// line and must never decode as MM2.
const MFX_PAIR_MIN_S: f64 = 0.000125;
const MFX_PAIR_MAX_S: f64 = 0.000175;
/// Tolerance when matching the inter-frame pause against three trit periods.
const REPEAT_TOLERANCE_S: f64 = 0.0003;

/// Decode errors. Frame rejection is not an error; these are the fatal
/// conditions only.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot decode without a sample rate")]
    MissingSampleRate,
    #[error("capture ended mid-frame after {got} of 36 edges")]
    TruncatedFrame { got: usize },
}

#[derive(Debug, Clone, Default)]
pub struct DecoderStats {
    pub syncs_detected: u64,
    pub frames_decoded: u64,
    pub frames_rejected: u64,
    pub magnet_frames: u64,
    pub locomotive_frames: u64,
    pub repeat_frames: u64,
}

/// MM2 decoder state machine over an edge source.
///
/// The only state carried across frames is the previous frame's end marker,
/// used to classify repeats. One frame is in flight at a time; every wait on
/// the source is a suspension point with no timeout.
pub struct Mm2Decoder<S> {
    source: S,
    sample_rate: u32,
    last_signal: Option<u64>,
    pub stats: DecoderStats,
}

impl<S: EdgeSource> Mm2Decoder<S> {
    pub fn new(source: S, sample_rate: u32) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::MissingSampleRate);
        }
        Ok(Self {
            source,
            sample_rate,
            last_signal: None,
            stats: DecoderStats::default(),
        })
    }

    fn seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate as f64
    }

    /// Advance by one frame attempt: sync, capture, validate, decode.
    ///
    /// Returns `Ok(false)` when the capture ends between packets (a quiet
    /// line is not an error, and neither is a clean end of capture). Ending
    /// mid-frame is fatal: a truncated frame must not be interpreted.
    pub fn poll<K: EventSink>(&mut self, sink: &mut K) -> Result<bool, DecodeError> {
        let Some(start) = self.wait_sync() else {
            return Ok(false);
        };
        self.stats.syncs_detected += 1;
        trace!("sync gap ended at sample {}", start);

        let edges = self.capture_frame(start)?;
        match self.validate(&edges) {
            Some(kind) => self.decode_frame(&edges, kind, sink),
            None => {
                self.stats.frames_rejected += 1;
                debug!(
                    "frame at sample {} rejected: span {:.1} μs, first pair {:.1} μs",
                    edges[0],
                    self.seconds(edges[FRAME_EDGES - 1] - edges[0]) * 1e6,
                    self.seconds(edges[2] - edges[0]) * 1e6,
                );
            }
        }
        Ok(true)
    }

    /// Decode until the capture is exhausted.
    pub fn run<K: EventSink>(&mut self, sink: &mut K) -> Result<(), DecodeError> {
        while self.poll(sink)? {}
        Ok(())
    }

    /// Consume sync-trigger edges until the gap between two consecutive ones
    /// reaches the inter-packet minimum. The edge ending that gap is the
    /// frame's first sample.
    fn wait_sync(&mut self) -> Option<u64> {
        loop {
            let start = self.source.position();
            let stop = self.source.next_edge(EdgeKind::Rising)?;
            if self.seconds(stop - start) >= MIN_SYNC_GAP_S {
                return Some(stop);
            }
        }
    }

    /// Record the 35 transitions following the packet start, any kind.
    fn capture_frame(&mut self, start: u64) -> Result<[u64; FRAME_EDGES], DecodeError> {
        let mut edges = [0u64; FRAME_EDGES];
        edges[0] = start;
        for (i, slot) in edges.iter_mut().enumerate().skip(1) {
            *slot = self
                .source
                .next_edge(EdgeKind::Either)
                .ok_or(DecodeError::TruncatedFrame { got: i })?;
        }
        Ok(edges)
    }

    /// Check the frame envelope and decide the frame kind. `None` means
    /// "not an MM2 frame this time", which is not an error.
    fn validate(&self, edges: &[u64; FRAME_EDGES]) -> Option<FrameKind> {
        let span = self.seconds(edges[FRAME_EDGES - 1] - edges[0]);
        let first_pair = self.seconds(edges[2] - edges[0]);

        if !(span > MIN_FRAME_S && span < MAX_FRAME_S) {
            return None;
        }
        if first_pair >= MFX_PAIR_MIN_S && first_pair <= MFX_PAIR_MAX_S {
            return None;
        }

        Some(if span < MAGNET_SPLIT_S {
            FrameKind::Accessory
        } else {
            FrameKind::Locomotive
        })
    }

    /// Walk a validated frame: timings, bits, trits, fields, classification.
    /// Fields are emitted the moment their prerequisite trits exist.
    fn decode_frame<K: EventSink>(
        &mut self,
        edges: &[u64; FRAME_EDGES],
        kind: FrameKind,
        sink: &mut K,
    ) {
        for i in 0..FRAME_EDGES - 1 {
            sink.emit(DecodeEvent::Timing {
                span: Span::new(edges[i], edges[i + 1]),
                seconds: self.seconds(edges[i + 1] - edges[i]),
            });
        }

        // Per-frame references: the first pulse pair for bits, the first
        // full trit for trit spans and the repeat classification.
        let bit_ref = edges[2] - edges[0];
        let trit_ref = edges[4] - edges[0];

        let mut bits = [0u8; 18];
        let mut trits = [Trit::Zero; 9];
        let mut address = 0u8;
        let mut function = None;
        let mut speed = None;
        let mut step = None;

        for i in 0..18 {
            let split = edges[2 * i + 1] - edges[2 * i];
            bits[i] = (split as f64 / bit_ref as f64 > 0.5) as u8;
            sink.emit(DecodeEvent::Bit {
                span: Span::new(edges[2 * i], edges[2 * i] + bit_ref),
                value: bits[i],
            });

            if i % 2 == 0 {
                continue;
            }
            let j = i / 2;
            trits[j] = Trit::from_bits(bits[i - 1], bits[i]);
            sink.emit(DecodeEvent::Trit {
                span: Span::new(edges[4 * j], edges[4 * j] + trit_ref),
                value: trits[j],
            });

            match j {
                3 => {
                    address = fields::address(&trits);
                    sink.emit(DecodeEvent::Field {
                        span: Span::new(edges[0], edges[16]),
                        field: Field::Address(address),
                    });
                }
                4 => {
                    let span = Span::new(edges[16], edges[20]);
                    let field = match kind {
                        FrameKind::Accessory => Field::MagnetPlaceholder,
                        FrameKind::Locomotive => {
                            function = Some(trits[4]);
                            Field::Function(trits[4])
                        }
                    };
                    sink.emit(DecodeEvent::Field { span, field });
                }
                8 if kind == FrameKind::Locomotive => {
                    let raw_step = fields::speed_step(&bits);
                    step = Some(raw_step);
                    speed = Some(SpeedCommand::from_step(raw_step));
                    sink.emit(DecodeEvent::Field {
                        span: Span::new(edges[20], edges[32] + trit_ref),
                        field: Field::Speed(SpeedCommand::from_step(raw_step)),
                    });
                }
                _ => {}
            }
        }

        let repeat = self.classify_repeat(edges, trit_ref);
        let packet_span = Span::new(edges[0], edges[32] + trit_ref);
        sink.emit(DecodeEvent::Packet {
            span: packet_span,
            repeat,
        });

        let raw = fields::raw_export(address, kind, function, step);
        sink.emit(DecodeEvent::Raw {
            span: packet_span,
            bytes: raw,
        });
        sink.emit(DecodeEvent::Command(Mm2Command {
            address,
            kind,
            function,
            speed,
            repeat,
            start_sample: edges[0],
            end_sample: edges[FRAME_EDGES - 1],
            raw,
        }));

        // End marker for the next frame's classification: last edge plus one
        // pulse width, compensating the untransmitted trailing edge.
        self.last_signal = Some(edges[FRAME_EDGES - 1] + (edges[1] - edges[0]));

        self.stats.frames_decoded += 1;
        match kind {
            FrameKind::Accessory => self.stats.magnet_frames += 1,
            FrameKind::Locomotive => self.stats.locomotive_frames += 1,
        }
        if repeat == RepeatKind::Repeat {
            self.stats.repeat_frames += 1;
        }
    }

    /// A frame following the previous one after a pause of three trit
    /// periods (within tolerance) is the protocol's immediate repeat.
    fn classify_repeat(&self, edges: &[u64; FRAME_EDGES], trit_ref: u64) -> RepeatKind {
        let Some(last_signal) = self.last_signal else {
            return RepeatKind::First;
        };
        let pause = (edges[0] as i64 - last_signal as i64) as f64 / self.sample_rate as f64;
        let trit_time = self.seconds(trit_ref);
        if (trit_time * 3.0 - pause).abs() < REPEAT_TOLERANCE_S {
            RepeatKind::Repeat
        } else {
            RepeatKind::First
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::source::{LevelEdgeSource, Polarity};
    use std::io::Cursor;

    const TEST_RATE: u32 = 1_000_000;
    /// Locomotive bit period at 1 MSPS: 208 samples of 1 μs.
    const LOCO_PERIOD: u64 = 208;
    /// Accessory frames run at double speed.
    const MAGNET_PERIOD: u64 = 104;

    /// Address 42 (trits 0,2,1,1 low-to-high), function 1, raw step 5.
    const LOCO_BITS: [u8; 18] = [0, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 1, 1, 0, 0];

    fn push_quiet(levels: &mut Vec<u8>, n: u64) {
        levels.extend(std::iter::repeat(0).take(n as usize));
    }

    fn push_frame(levels: &mut Vec<u8>, bits: &[u8; 18], period: u64) {
        for &b in bits {
            let high = if b == 1 { period * 7 / 8 } else { period / 8 };
            levels.extend(std::iter::repeat(1).take(high as usize));
            levels.extend(std::iter::repeat(0).take((period - high) as usize));
        }
    }

    fn run_decoder(levels: Vec<u8>) -> (Vec<DecodeEvent>, DecoderStats) {
        let source = LevelEdgeSource::new(Cursor::new(levels), 0, Polarity::ActiveHigh);
        let mut decoder = Mm2Decoder::new(source, TEST_RATE).unwrap();
        let mut events = Vec::new();
        decoder.run(&mut events).unwrap();
        (events, decoder.stats.clone())
    }

    fn commands(events: &[DecodeEvent]) -> Vec<Mm2Command> {
        events
            .iter()
            .filter_map(|e| match e {
                DecodeEvent::Command(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Synthetic edge array touching only the samples validate() reads.
    fn edges_with(span: u64, first_pair: u64) -> [u64; FRAME_EDGES] {
        let mut edges = [0u64; FRAME_EDGES];
        edges[1] = first_pair / 2;
        edges[2] = first_pair;
        for i in 3..FRAME_EDGES {
            edges[i] = first_pair + (span - first_pair) * (i as u64 - 2) / 33;
        }
        edges
    }

    fn validator() -> Mm2Decoder<LevelEdgeSource<Cursor<Vec<u8>>>> {
        let source = LevelEdgeSource::new(Cursor::new(Vec::new()), 0, Polarity::ActiveHigh);
        // 10 MSPS so the envelope can be probed with 0.1 μs resolution.
        Mm2Decoder::new(source, 10_000_000).unwrap()
    }

    #[test]
    fn test_sample_rate_is_required() {
        let source = LevelEdgeSource::new(Cursor::new(Vec::new()), 0, Polarity::ActiveHigh);
        assert!(matches!(
            Mm2Decoder::new(source, 0),
            Err(DecodeError::MissingSampleRate)
        ));
    }

    #[test]
    fn test_span_bounds_are_strict() {
        let decoder = validator();
        // 13000 samples at 10 MSPS = exactly 1.3 ms: on the bound, rejected.
        assert_eq!(decoder.validate(&edges_with(13000, 2000)), None);
        assert_eq!(
            decoder.validate(&edges_with(13001, 2000)),
            Some(FrameKind::Accessory)
        );
        assert_eq!(decoder.validate(&edges_with(42000, 2000)), None);
        assert_eq!(
            decoder.validate(&edges_with(41999, 2000)),
            Some(FrameKind::Locomotive)
        );
    }

    #[test]
    fn test_mfx_width_band_rejected_inclusive() {
        let decoder = validator();
        // 1250 samples = 125 μs, 1750 = 175 μs: band edges are rejected.
        assert_eq!(decoder.validate(&edges_with(30000, 1250)), None);
        assert_eq!(decoder.validate(&edges_with(30000, 1750)), None);
        assert_eq!(decoder.validate(&edges_with(30000, 1500)), None);
        assert!(decoder.validate(&edges_with(30000, 1249)).is_some());
        assert!(decoder.validate(&edges_with(30000, 1751)).is_some());
    }

    #[test]
    fn test_magnet_split() {
        let decoder = validator();
        assert_eq!(
            decoder.validate(&edges_with(24999, 2000)),
            Some(FrameKind::Accessory)
        );
        assert_eq!(
            decoder.validate(&edges_with(25000, 2000)),
            Some(FrameKind::Locomotive)
        );
    }

    #[test]
    fn test_decodes_locomotive_frame() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        push_quiet(&mut levels, 1000);

        let (events, stats) = run_decoder(levels);

        let bits: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                DecodeEvent::Bit { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(bits, LOCO_BITS);

        let trit_count = events
            .iter()
            .filter(|e| matches!(e, DecodeEvent::Trit { .. }))
            .count();
        assert_eq!(trit_count, 9);
        let timing_count = events
            .iter()
            .filter(|e| matches!(e, DecodeEvent::Timing { .. }))
            .count();
        assert_eq!(timing_count, 35);

        let cmds = commands(&events);
        assert_eq!(cmds.len(), 1);
        let cmd = &cmds[0];
        assert_eq!(cmd.address, 42);
        assert_eq!(cmd.kind, FrameKind::Locomotive);
        assert_eq!(cmd.function, Some(Trit::One));
        assert_eq!(cmd.speed, Some(SpeedCommand::Step(4)));
        assert_eq!(cmd.repeat, RepeatKind::First);
        assert_eq!(cmd.raw, [42, 1, 5]);

        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.locomotive_frames, 1);
        assert_eq!(stats.frames_rejected, 0);
    }

    #[test]
    fn test_fields_emitted_incrementally() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        push_quiet(&mut levels, 1000);

        let (events, _) = run_decoder(levels);

        // The address field must appear before the later bits, not after the
        // whole frame: it is emitted right after trit 3.
        let addr_pos = events
            .iter()
            .position(|e| matches!(e, DecodeEvent::Field { field: Field::Address(_), .. }))
            .unwrap();
        let last_bit_pos = events
            .iter()
            .rposition(|e| matches!(e, DecodeEvent::Bit { .. }))
            .unwrap();
        assert!(addr_pos < last_bit_pos);
    }

    #[test]
    fn test_decodes_accessory_frame_with_placeholder() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        // Address 5 = trits [2, 1, 0, 0] low-to-high; rest zero.
        let bits: [u8; 18] = [1, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        push_frame(&mut levels, &bits, MAGNET_PERIOD);
        push_quiet(&mut levels, 1000);

        let (events, stats) = run_decoder(levels);
        let cmds = commands(&events);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].address, 5);
        assert_eq!(cmds[0].kind, FrameKind::Accessory);
        assert_eq!(cmds[0].function, None);
        assert_eq!(cmds[0].speed, None);
        assert_eq!(cmds[0].raw, [5, 0xFF, 0xFF]);
        assert!(events
            .iter()
            .any(|e| matches!(e, DecodeEvent::Field { field: Field::MagnetPlaceholder, .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, DecodeEvent::Field { field: Field::Speed(_), .. })));
        assert_eq!(stats.magnet_frames, 1);
    }

    #[test]
    fn test_split_ratio_tie_decodes_to_zero() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        // Every pulse splits at exactly half the reference pair width.
        for _ in 0..18 {
            levels.extend(std::iter::repeat(1).take((LOCO_PERIOD / 2) as usize));
            levels.extend(std::iter::repeat(0).take((LOCO_PERIOD / 2) as usize));
        }
        push_quiet(&mut levels, 1000);

        let (events, _) = run_decoder(levels);
        let cmds = commands(&events);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].address, 0);
        assert_eq!(cmds[0].speed, Some(SpeedCommand::Stop));
        assert!(events
            .iter()
            .filter_map(|e| match e {
                DecodeEvent::Bit { value, .. } => Some(*value),
                _ => None,
            })
            .all(|b| b == 0));
    }

    #[test]
    fn test_mfx_band_frame_produces_no_output() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        // 150 μs pulse pairs: inside the foreign width band, span still valid.
        push_frame(&mut levels, &[0u8; 18], 150);
        push_quiet(&mut levels, 1000);

        let (events, stats) = run_decoder(levels);
        assert!(events.is_empty());
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_decoded, 0);
    }

    #[test]
    fn test_truncated_frame_is_fatal() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        // Five pulse pairs, then the capture ends mid-frame.
        for _ in 0..5 {
            levels.extend(std::iter::repeat(1).take(26));
            levels.extend(std::iter::repeat(0).take(182));
        }

        let source = LevelEdgeSource::new(Cursor::new(levels), 0, Polarity::ActiveHigh);
        let mut decoder = Mm2Decoder::new(source, TEST_RATE).unwrap();
        let mut events = Vec::new();
        let err = decoder.run(&mut events).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedFrame { .. }));
        assert!(commands(&events).is_empty());
    }

    #[test]
    fn test_quiet_capture_ends_cleanly() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 5000);
        let (events, stats) = run_decoder(levels);
        assert!(events.is_empty());
        assert_eq!(stats.syncs_detected, 0);
    }

    /// Append a second copy of the frame such that the pause between the
    /// previous frame's end marker and the new start is `pause` samples.
    fn push_follow_up(levels: &mut Vec<u8>, bits: &[u8; 18], period: u64, pause: u64) {
        let w0 = if bits[0] == 1 { period * 7 / 8 } else { period / 8 };
        let w17 = if bits[17] == 1 { period * 7 / 8 } else { period / 8 };
        // Marker = last edge + first pulse width; the frame body already ends
        // with (period - w17) low samples.
        let gap = pause + w0 + w17 - period;
        push_quiet(levels, gap);
        push_frame(levels, bits, period);
    }

    #[test]
    fn test_repeat_at_three_trit_periods() {
        let trit_time = 2 * LOCO_PERIOD;
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        push_follow_up(&mut levels, &LOCO_BITS, LOCO_PERIOD, 3 * trit_time);
        push_quiet(&mut levels, 1000);

        let (events, stats) = run_decoder(levels);
        let cmds = commands(&events);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].repeat, RepeatKind::First);
        assert_eq!(cmds[1].repeat, RepeatKind::Repeat);
        assert_eq!(stats.repeat_frames, 1);
    }

    #[test]
    fn test_four_trit_periods_is_a_new_send() {
        let trit_time = 2 * LOCO_PERIOD;
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        push_follow_up(&mut levels, &LOCO_BITS, LOCO_PERIOD, 4 * trit_time);
        push_quiet(&mut levels, 1000);

        let (events, stats) = run_decoder(levels);
        let cmds = commands(&events);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[1].repeat, RepeatKind::First);
        assert_eq!(stats.repeat_frames, 0);
    }

    #[test]
    fn test_frame_without_sync_gap_is_skipped() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        // Too short a gap: the second frame never syncs and is consumed.
        push_quiet(&mut levels, 200);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        push_quiet(&mut levels, 1000);

        let (events, _) = run_decoder(levels);
        assert_eq!(commands(&events).len(), 1);
    }

    #[test]
    fn test_active_low_capture_decodes_identically() {
        let mut levels = Vec::new();
        push_quiet(&mut levels, 1000);
        push_frame(&mut levels, &LOCO_BITS, LOCO_PERIOD);
        push_quiet(&mut levels, 1000);
        // Invert the line; with the polarity option set, decoding must match.
        for level in &mut levels {
            *level = 1 - *level;
        }

        let source = LevelEdgeSource::new(Cursor::new(levels), 0, Polarity::ActiveLow);
        let mut decoder = Mm2Decoder::new(source, TEST_RATE).unwrap();
        let mut events = Vec::new();
        decoder.run(&mut events).unwrap();

        let cmds = commands(&events);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].address, 42);
        assert_eq!(cmds[0].speed, Some(SpeedCommand::Step(4)));
    }
}
