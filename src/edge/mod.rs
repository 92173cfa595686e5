//! Edge-timing capture and MM2 frame decoding
//!
//! This module owns everything between raw level samples and decoded
//! protocol events:
//! 1. Reduce the level stream to transitions with a running sample counter
//! 2. Find packet boundaries by their inter-packet quiet gap
//! 3. Capture 36-edge frames and validate them against the MM2 envelope
//! 4. Extract bits and trits against the frame's own reference timing

pub mod capture;
pub mod decoder;
pub mod source;

pub use capture::{CaptureConfig, CaptureStats, LogicCapture};
pub use decoder::{DecodeError, DecoderStats, Mm2Decoder, FRAME_EDGES};
pub use source::{EdgeKind, EdgeSource, LevelEdgeSource, Polarity};
