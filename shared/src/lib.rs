use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Pixel edge length of one logical grid cell
pub const CELL_SIZE: u32 = 20;
/// Largest board edge, in cells, a snapshot may declare
pub const MAX_BOARD_CELLS: i32 = 1000;
/// Minimum gap between two accepted move commands
pub const MOVE_INTERVAL_MS: u64 = 50;
/// Time the terminal frame stays visible after the local snake dies
pub const DEATH_REVERT_DELAY_MS: u64 = 1000;
/// Refresh period of the effect countdown
pub const COUNTDOWN_TICK_MS: u64 = 100;
/// Denominator of the effect progress bar
pub const EFFECT_NOMINAL_SECS: u64 = 10;

pub const RECONNECT_DELAY_MS: u64 = 1000;
pub const RECONNECT_DELAY_MAX_MS: u64 = 5000;
pub const RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_JITTER: f64 = 0.5;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3001";

/// Inbound and outbound event names carried in the envelope
pub mod events {
    pub const MOVE: &str = "move";
    pub const START_GAME: &str = "startGame";
    pub const GAME_STATE: &str = "gameState";
    pub const LOBBY_UPDATE: &str = "lobbyUpdate";
    pub const GAME_STARTED: &str = "gameStarted";
    pub const SESSION: &str = "session";
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Every frame on the wire: an event name plus its JSON payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Playing,
    Finished,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Boost,
    Slow,
}

impl EffectKind {
    pub fn label(&self) -> &'static str {
        match self {
            EffectKind::Boost => "Speed boost",
            EffectKind::Slow => "Slowed down",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub kind: EffectKind,
    /// Absolute expiry, epoch milliseconds on the server clock
    pub expires_at: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub segments: Vec<Segment>,
    pub alive: bool,
    pub score: i64,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Player {
    pub fn new(id: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            id: id.into(),
            segments,
            alive: true,
            score: 0,
            effects: Vec::new(),
        }
    }

    pub fn head(&self) -> Option<&Segment> {
        self.segments.first()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Minor,
    Major,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub x: i32,
    pub y: i32,
    pub kind: ItemKind,
}

/// One complete authoritative description of the game
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub players: Vec<Player>,
    pub items: Vec<Item>,
    pub width: i32,
    pub height: i32,
}

impl Snapshot {
    pub fn empty(width: i32, height: i32) -> Self {
        Self {
            phase: Phase::Lobby,
            players: Vec::new(),
            items: Vec::new(),
            width,
            height,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Rejects snapshots that cannot be drawn
    pub fn validate(&self) -> Result<(), String> {
        if self.width <= 0
            || self.height <= 0
            || self.width > MAX_BOARD_CELLS
            || self.height > MAX_BOARD_CELLS
        {
            return Err(format!(
                "invalid board extent {}x{}",
                self.width, self.height
            ));
        }
        if let Some(player) = self.players.iter().find(|p| p.id.is_empty()) {
            return Err(format!("player with empty id ({} segments)", player.segments.len()));
        }
        Ok(())
    }
}

/// Unit step on the grid; at most one axis is nonzero
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Direction {
    pub dx: i8,
    pub dy: i8,
}

impl Direction {
    pub const UP: Direction = Direction { dx: 0, dy: -1 };
    pub const DOWN: Direction = Direction { dx: 0, dy: 1 };
    pub const LEFT: Direction = Direction { dx: -1, dy: 0 };
    pub const RIGHT: Direction = Direction { dx: 1, dy: 0 };

    pub fn is_valid(&self) -> bool {
        let in_range = (-1..=1).contains(&self.dx) && (-1..=1).contains(&self.dy);
        in_range && (self.dx == 0) != (self.dy == 0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbyUpdate {
    #[serde(default)]
    pub status: String,
    pub player_count: u32,
    #[serde(default)]
    pub players: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionGreeting {
    pub id: String,
}

/// Commands the client emits
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Move { direction: Direction },
    StartGame,
}

impl ClientCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientCommand::Move { .. } => events::MOVE,
            ClientCommand::StartGame => events::START_GAME,
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            ClientCommand::Move { direction } => serde_json::json!({ "direction": direction }),
            ClientCommand::StartGame => serde_json::json!({}),
        };
        Envelope::new(self.event_name(), data)
    }
}
