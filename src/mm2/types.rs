//! MM2 protocol data types

use std::fmt;

use serde::Serialize;

/// Ternary digit carried by a pair of pulse-width bits.
///
/// `Open` is the protocol's mismatched state: the two bits of the pair
/// disagree, which MM2 uses as the third symbol value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trit {
    Zero,
    One,
    Open,
}

impl Trit {
    /// Combine a bit pair into a trit: both set = 1, both clear = 0,
    /// mismatch = the open state.
    pub fn from_bits(first: u8, second: u8) -> Self {
        match (first, second) {
            (1, 1) => Self::One,
            (0, 0) => Self::Zero,
            _ => Self::Open,
        }
    }

    /// Numeric value in base-3 arithmetic (open counts as 2).
    pub fn value(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Open => 2,
        }
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Frame kind, decided by total frame duration (accessory frames run at
/// double speed and span half the time of a locomotive frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameKind {
    Accessory,
    Locomotive,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accessory => write!(f, "accessory"),
            Self::Locomotive => write!(f, "locomotive"),
        }
    }
}

/// Speed/direction command of a locomotive frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedCommand {
    Stop,
    DirectionChange,
    /// Speed level 1..=14.
    Step(u8),
}

impl SpeedCommand {
    /// Map the raw 4-bit step field: 0 is stop, 1 is a direction change,
    /// 2..=15 are speed levels 1..=14.
    pub fn from_step(step: u8) -> Self {
        match step {
            0 => Self::Stop,
            1 => Self::DirectionChange,
            n => Self::Step(n - 1),
        }
    }
}

impl fmt::Display for SpeedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "Stop"),
            Self::DirectionChange => write!(f, "Dir-change"),
            Self::Step(n) => write!(f, "{}", n),
        }
    }
}

/// Classification of a frame against the one before it. MM2 transmits each
/// command twice in close succession; the second copy is `Repeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepeatKind {
    First,
    Repeat,
}

impl RepeatKind {
    /// Package number as displayed: 1 for a first send, 2 for a repeat.
    pub fn package_number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Repeat => 2,
        }
    }
}

/// One fully decoded MM2 frame.
///
/// `function` and `speed` are only present for locomotive frames; accessory
/// frames carry a single placeholder field and nothing else (the remaining
/// accessory sub-fields are unfinished upstream).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mm2Command {
    pub address: u8,
    pub kind: FrameKind,
    pub function: Option<Trit>,
    pub speed: Option<SpeedCommand>,
    pub repeat: RepeatKind,
    /// Sample index of the frame's first edge.
    pub start_sample: u64,
    /// Sample index of the frame's last edge.
    pub end_sample: u64,
    /// Raw export bytes for the binary passthrough channel.
    pub raw: [u8; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trit_from_bits() {
        assert_eq!(Trit::from_bits(1, 1), Trit::One);
        assert_eq!(Trit::from_bits(0, 0), Trit::Zero);
        assert_eq!(Trit::from_bits(1, 0), Trit::Open);
        assert_eq!(Trit::from_bits(0, 1), Trit::Open);
    }

    #[test]
    fn test_speed_command_mapping() {
        assert_eq!(SpeedCommand::from_step(0), SpeedCommand::Stop);
        assert_eq!(SpeedCommand::from_step(1), SpeedCommand::DirectionChange);
        assert_eq!(SpeedCommand::from_step(2), SpeedCommand::Step(1));
        assert_eq!(SpeedCommand::from_step(15), SpeedCommand::Step(14));
    }

    #[test]
    fn test_package_number() {
        assert_eq!(RepeatKind::First.package_number(), 1);
        assert_eq!(RepeatKind::Repeat.package_number(), 2);
    }
}
