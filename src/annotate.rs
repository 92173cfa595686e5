//! Decode event stream and annotation spans
//!
//! Every validated frame produces one ordered stream of typed events:
//! inter-edge timings, bits, trits, decoded fields, the package
//! classification, the raw export bytes and finally the assembled command.
//! Fields are emitted as soon as their prerequisite trits exist, not at
//! frame end, so a live display can surface them mid-frame.

use std::fmt;

use serde::Serialize;

use crate::mm2::types::{Mm2Command, RepeatKind, SpeedCommand, Trit};

/// Half-open sample range an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

/// A decoded protocol field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Field {
    Address(u8),
    Function(Trit),
    /// Accessory frames carry a single fixed placeholder after the address;
    /// the remaining sub-fields are unfinished upstream and not decoded.
    MagnetPlaceholder,
    Speed(SpeedCommand),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(a) => write!(f, "Address: {}", a),
            Self::Function(t) => write!(f, "Function: {}", t),
            Self::MagnetPlaceholder => write!(f, "0"),
            Self::Speed(s) => write!(f, "Speed: {}", s),
        }
    }
}

/// One element of a frame's decode output, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Timing { span: Span, seconds: f64 },
    Bit { span: Span, value: u8 },
    Trit { span: Span, value: Trit },
    Field { span: Span, field: Field },
    Packet { span: Span, repeat: RepeatKind },
    Raw { span: Span, bytes: [u8; 3] },
    Command(Mm2Command),
}

/// Receiver for decode events. The decoder pushes events as they become
/// available during a frame walk.
pub trait EventSink {
    fn emit(&mut self, event: DecodeEvent);
}

impl EventSink for Vec<DecodeEvent> {
    fn emit(&mut self, event: DecodeEvent) {
        self.push(event);
    }
}

/// Format a duration in seconds with an auto-scaled unit and one decimal
/// place, for the timing annotation row.
pub fn format_duration(period_t: f64) -> String {
    if period_t == 0.0 || period_t >= 1.0 {
        format!("{:.1} s", period_t)
    } else if period_t <= 1e-12 {
        format!("{:.1} fs", period_t * 1e15)
    } else if period_t <= 1e-9 {
        format!("{:.1} ps", period_t * 1e12)
    } else if period_t <= 1e-6 {
        format!("{:.1} ns", period_t * 1e9)
    } else if period_t <= 1e-3 {
        format!("{:.1} μs", period_t * 1e6)
    } else {
        format!("{:.1} ms", period_t * 1e3)
    }
}
