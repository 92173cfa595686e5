//! Locomotive state tracking and aggregation
//!
//! MM2 controllers transmit every command at least twice and keep repeating
//! the current speed while a locomotive is selected. This tracker collapses
//! those repeats into per-address state so the downstream view is "what each
//! locomotive is doing now" rather than the raw command firehose.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::mm2::types::{FrameKind, Mm2Command, RepeatKind, SpeedCommand, Trit};

/// Maximum idle age for a locomotive entry before removal.
const ADDRESS_TIMEOUT_SECS: u64 = 60;

/// Travel direction, toggled by every fresh direction-change command. MM2
/// itself never transmits an absolute direction; it is track-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    fn toggled(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

/// Aggregated state of one locomotive address.
#[derive(Debug, Clone)]
pub struct LocoState {
    pub address: u8,
    pub speed: Option<SpeedCommand>,
    pub direction: Direction,
    pub function: Option<Trit>,
    pub last_seen: Instant,
    pub commands: u64,
    pub repeats_collapsed: u64,
}

impl LocoState {
    fn new(address: u8) -> Self {
        Self {
            address,
            speed: None,
            direction: Direction::Forward,
            function: None,
            last_seen: Instant::now(),
            commands: 0,
            repeats_collapsed: 0,
        }
    }

    /// Whether a command carries nothing new over the stored state.
    fn matches(&self, cmd: &Mm2Command) -> bool {
        self.speed == cmd.speed && self.function == cmd.function
    }
}

/// Per-address command aggregation.
pub struct CommandTracker {
    locos: HashMap<u8, LocoState>,
    magnet_commands: u64,
    timeout: Duration,
}

impl CommandTracker {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            locos: HashMap::new(),
            magnet_commands: 0,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Fold a decoded command into the tracked state.
    ///
    /// Returns the updated state for a fresh locomotive command; `None` for
    /// accessory commands and for immediate repeats that confirm what is
    /// already stored.
    pub fn update(&mut self, cmd: &Mm2Command) -> Option<&LocoState> {
        if cmd.kind == FrameKind::Accessory {
            self.magnet_commands += 1;
            return None;
        }

        let state = self
            .locos
            .entry(cmd.address)
            .or_insert_with(|| LocoState::new(cmd.address));
        state.last_seen = Instant::now();

        if cmd.repeat == RepeatKind::Repeat && state.matches(cmd) {
            state.repeats_collapsed += 1;
            return None;
        }

        state.commands += 1;
        if cmd.speed == Some(SpeedCommand::DirectionChange) {
            state.direction = state.direction.toggled();
        }
        state.speed = cmd.speed;
        state.function = cmd.function;
        Some(state)
    }

    /// Drop addresses not seen within the timeout.
    pub fn expire(&mut self) {
        let timeout = self.timeout;
        self.locos.retain(|address, state| {
            let keep = state.last_seen.elapsed() < timeout;
            if !keep {
                debug!("Expiring idle locomotive address {}", address);
            }
            keep
        });
    }

    pub fn len(&self) -> usize {
        self.locos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locos.is_empty()
    }

    /// One-line summary for the periodic status log.
    pub fn stats_summary(&self) -> String {
        let commands: u64 = self.locos.values().map(|s| s.commands).sum();
        let collapsed: u64 = self.locos.values().map(|s| s.repeats_collapsed).sum();
        format!(
            "{} locomotives | {} commands ({} repeats collapsed) | {} magnet commands",
            self.locos.len(),
            commands,
            collapsed,
            self.magnet_commands,
        )
    }
}

impl Default for CommandTracker {
    fn default() -> Self {
        Self::new(ADDRESS_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loco_command(address: u8, speed: SpeedCommand, repeat: RepeatKind) -> Mm2Command {
        Mm2Command {
            address,
            kind: FrameKind::Locomotive,
            function: Some(Trit::Zero),
            speed: Some(speed),
            repeat,
            start_sample: 0,
            end_sample: 3700,
            raw: [address, 0, 0],
        }
    }

    #[test]
    fn test_fresh_command_updates_state() {
        let mut tracker = CommandTracker::default();
        let cmd = loco_command(24, SpeedCommand::Step(4), RepeatKind::First);
        let state = tracker.update(&cmd).expect("fresh command");
        assert_eq!(state.address, 24);
        assert_eq!(state.speed, Some(SpeedCommand::Step(4)));
        assert_eq!(state.commands, 1);
    }

    #[test]
    fn test_identical_repeat_is_collapsed() {
        let mut tracker = CommandTracker::default();
        tracker.update(&loco_command(24, SpeedCommand::Step(4), RepeatKind::First));
        let repeated = loco_command(24, SpeedCommand::Step(4), RepeatKind::Repeat);
        assert!(tracker.update(&repeated).is_none());
        let summary = tracker.stats_summary();
        assert!(summary.contains("1 repeats collapsed"), "{}", summary);
    }

    #[test]
    fn test_repeat_with_new_content_is_kept() {
        let mut tracker = CommandTracker::default();
        tracker.update(&loco_command(24, SpeedCommand::Step(4), RepeatKind::First));
        let changed = loco_command(24, SpeedCommand::Step(9), RepeatKind::Repeat);
        let state = tracker.update(&changed).expect("content changed");
        assert_eq!(state.speed, Some(SpeedCommand::Step(9)));
    }

    #[test]
    fn test_direction_change_toggles() {
        let mut tracker = CommandTracker::default();
        tracker.update(&loco_command(3, SpeedCommand::Step(2), RepeatKind::First));
        let dir = loco_command(3, SpeedCommand::DirectionChange, RepeatKind::First);
        let state = tracker.update(&dir).unwrap();
        assert_eq!(state.direction, Direction::Reverse);
        // A second fresh direction change toggles back.
        let dir = loco_command(3, SpeedCommand::DirectionChange, RepeatKind::First);
        let state = tracker.update(&dir).unwrap();
        assert_eq!(state.direction, Direction::Forward);
    }

    #[test]
    fn test_accessory_commands_are_counted_not_tracked() {
        let mut tracker = CommandTracker::default();
        let cmd = Mm2Command {
            address: 12,
            kind: FrameKind::Accessory,
            function: None,
            speed: None,
            repeat: RepeatKind::First,
            start_sample: 0,
            end_sample: 1800,
            raw: [12, 0xFF, 0xFF],
        };
        assert!(tracker.update(&cmd).is_none());
        assert!(tracker.is_empty());
        assert!(tracker.stats_summary().contains("1 magnet commands"));
    }

    #[test]
    fn test_expire_drops_idle_addresses() {
        let mut tracker = CommandTracker::new(0);
        tracker.update(&loco_command(24, SpeedCommand::Stop, RepeatKind::First));
        assert_eq!(tracker.len(), 1);
        tracker.expire();
        assert!(tracker.is_empty());
    }
}
