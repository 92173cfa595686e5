//! MM2 protocol decoding: field assembly and protocol-level data types

pub mod fields;
pub mod types;

pub use types::{FrameKind, Mm2Command, RepeatKind, SpeedCommand, Trit};
