//! Edge sources: logic-level sample streams reduced to transitions
//!
//! The decoder never looks at levels, only at edge timestamps. This module
//! adapts a stream of packed level bytes (one byte per sample, as written by
//! `sigrok-cli -O binary`) into "next transition of kind X" queries, and
//! applies the configured polarity swap exactly once at this boundary so the
//! state machine can always treat a rising edge as the sync trigger.

use std::io::Read;
use std::str::FromStr;

/// Transition kind a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Rising,
    Falling,
    Either,
}

/// Line polarity. With `ActiveLow` the physical falling edge plays the role
/// of the rising (sync trigger) edge and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    /// Map a requested edge kind onto the physical transition to wait for.
    pub fn physical(self, kind: EdgeKind) -> EdgeKind {
        match (self, kind) {
            (Self::ActiveLow, EdgeKind::Rising) => EdgeKind::Falling,
            (Self::ActiveLow, EdgeKind::Falling) => EdgeKind::Rising,
            _ => kind,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActiveHigh => "active-high",
            Self::ActiveLow => "active-low",
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active-high" => Ok(Self::ActiveHigh),
            "active-low" => Ok(Self::ActiveLow),
            other => Err(format!("unknown polarity '{}'", other)),
        }
    }
}

/// Supplier of edge timestamps on one logical channel.
///
/// `next_edge` blocks until the next matching transition and returns its
/// sample index, or `None` when the capture is exhausted. `position` is the
/// sample index the source has currently advanced to.
pub trait EdgeSource {
    fn next_edge(&mut self, kind: EdgeKind) -> Option<u64>;
    fn position(&self) -> u64;
}

const READ_CHUNK: usize = 64 * 1024;

/// Edge source over a raw level-byte stream.
///
/// Each input byte holds one sample with up to eight channels packed as bits;
/// `channel` selects the bit to watch. The first sample establishes the idle
/// level and is not itself a transition.
pub struct LevelEdgeSource<R> {
    reader: R,
    buf: Vec<u8>,
    buf_len: usize,
    buf_pos: usize,
    mask: u8,
    polarity: Polarity,
    level: Option<bool>,
    position: u64,
}

impl<R: Read> LevelEdgeSource<R> {
    pub fn new(reader: R, channel: u8, polarity: Polarity) -> Self {
        Self {
            reader,
            buf: vec![0u8; READ_CHUNK],
            buf_len: 0,
            buf_pos: 0,
            mask: 1 << (channel & 7),
            polarity,
            level: None,
            position: 0,
        }
    }

    /// Pull the next sample's level, refilling the read buffer as needed.
    fn next_level(&mut self) -> Option<bool> {
        if self.buf_pos >= self.buf_len {
            loop {
                match self.reader.read(&mut self.buf) {
                    Ok(0) => return None,
                    Ok(n) => {
                        self.buf_len = n;
                        self.buf_pos = 0;
                        break;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => return None,
                }
            }
        }
        let byte = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Some(byte & self.mask != 0)
    }
}

impl<R: Read> EdgeSource for LevelEdgeSource<R> {
    fn next_edge(&mut self, kind: EdgeKind) -> Option<u64> {
        let kind = self.polarity.physical(kind);
        loop {
            let level = self.next_level()?;
            let previous = self.level.replace(level);
            if let Some(previous) = previous {
                self.position += 1;
                let matched = match kind {
                    EdgeKind::Rising => !previous && level,
                    EdgeKind::Falling => previous && !level,
                    EdgeKind::Either => previous != level,
                };
                if matched {
                    return Some(self.position);
                }
            }
        }
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(levels: &[u8]) -> LevelEdgeSource<Cursor<Vec<u8>>> {
        LevelEdgeSource::new(Cursor::new(levels.to_vec()), 0, Polarity::ActiveHigh)
    }

    #[test]
    fn test_rising_and_falling_edges() {
        let mut src = source(&[0, 0, 1, 1, 0, 1]);
        assert_eq!(src.next_edge(EdgeKind::Rising), Some(2));
        assert_eq!(src.next_edge(EdgeKind::Falling), Some(4));
        assert_eq!(src.next_edge(EdgeKind::Either), Some(5));
        assert_eq!(src.next_edge(EdgeKind::Either), None);
    }

    #[test]
    fn test_initial_sample_is_not_an_edge() {
        // Stream starting high must not report a rising edge at sample 0.
        let mut src = source(&[1, 1, 0, 1]);
        assert_eq!(src.next_edge(EdgeKind::Rising), Some(3));
    }

    #[test]
    fn test_position_tracks_last_edge() {
        let mut src = source(&[0, 1, 1, 0]);
        assert_eq!(src.position(), 0);
        src.next_edge(EdgeKind::Rising);
        assert_eq!(src.position(), 1);
        src.next_edge(EdgeKind::Falling);
        assert_eq!(src.position(), 3);
    }

    #[test]
    fn test_active_low_swaps_sync_trigger() {
        // Physical falling edge at sample 2 answers a Rising request.
        let levels = vec![1, 1, 0, 0, 1];
        let mut src =
            LevelEdgeSource::new(Cursor::new(levels), 0, Polarity::ActiveLow);
        assert_eq!(src.next_edge(EdgeKind::Rising), Some(2));
        assert_eq!(src.next_edge(EdgeKind::Falling), Some(4));
    }

    #[test]
    fn test_channel_mask() {
        // Channel 1 toggles while channel 0 stays high.
        let levels = vec![0b01, 0b11, 0b01];
        let mut src = LevelEdgeSource::new(Cursor::new(levels), 1, Polarity::ActiveHigh);
        assert_eq!(src.next_edge(EdgeKind::Rising), Some(1));
        assert_eq!(src.next_edge(EdgeKind::Falling), Some(2));
    }

    #[test]
    fn test_polarity_parse() {
        assert_eq!("active-low".parse::<Polarity>(), Ok(Polarity::ActiveLow));
        assert_eq!("active-high".parse::<Polarity>(), Ok(Polarity::ActiveHigh));
        assert!("inverted".parse::<Polarity>().is_err());
    }
}
