//! Key events to move commands, with a minimum interval between commands

use crate::connection::CommandSink;
use log::debug;
use shared::{ClientCommand, Direction, MOVE_INTERVAL_MS};

/// Backend-neutral keys the client reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    W,
    A,
    S,
    D,
    Enter,
    R,
    Other,
}

impl Key {
    /// Arrow keys are primary, WASD alternate
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Key::Up | Key::W => Some(Direction::UP),
            Key::Down | Key::S => Some(Direction::DOWN),
            Key::Left | Key::A => Some(Direction::LEFT),
            Key::Right | Key::D => Some(Direction::RIGHT),
            _ => None,
        }
    }
}

/// Turns direction keys into `move` commands, dropping anything that
/// arrives sooner than `min_interval_ms` after the last accepted one
pub struct InputController {
    min_interval_ms: u64,
    last_accepted: Option<u64>,
}

impl InputController {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_accepted: None,
        }
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// Returns the direction that was sent, if any
    pub fn on_key_event<S: CommandSink>(
        &mut self,
        key: Key,
        timestamp: u64,
        showing_game: bool,
        sink: &mut S,
    ) -> Option<Direction> {
        if !showing_game {
            return None;
        }
        let direction = key.direction()?;

        if let Some(last) = self.last_accepted {
            let elapsed = timestamp.saturating_sub(last);
            if elapsed < self.min_interval_ms {
                debug!("Throttled {:?} ({}ms since last move)", key, elapsed);
                return None;
            }
        }

        self.last_accepted = Some(timestamp);
        sink.send(ClientCommand::Move { direction });
        Some(direction)
    }
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(MOVE_INTERVAL_MS)
    }
}
