//! Concrete world entities and their spawn rules

use serde::{Deserialize, Serialize};

use super::physics::{EntityKind, KindStats, MovingBody};
use super::rng::RandomSource;
use super::vector::Vector2;

/// Player colour palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
    Magenta,
}

impl PlayerColor {
    pub const PALETTE: [PlayerColor; 6] = [
        PlayerColor::Red,
        PlayerColor::Green,
        PlayerColor::Yellow,
        PlayerColor::Blue,
        PlayerColor::Cyan,
        PlayerColor::Magenta,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlpacaColor {
    Grey,
}

impl AlpacaColor {
    pub const PALETTE: [AlpacaColor; 1] = [AlpacaColor::Grey];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    Grass,
}

impl DecorationKind {
    pub const ALL: [DecorationKind; 1] = [DecorationKind::Grass];
}

/// Uniform whole-number position inside the spawn square of `kind`
fn spawn_position(kind: EntityKind, rng: &mut dyn RandomSource) -> Vector2 {
    let stats = KindStats::for_kind(kind);
    let x = rng.whole(stats.spawn_min, stats.spawn_span);
    let y = rng.whole(stats.spawn_min, stats.spawn_span);
    Vector2::new(x, y)
}

/// A connected client's avatar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    #[serde(skip)]
    pub session_id: String,
    #[serde(flatten)]
    pub body: MovingBody,
    pub color: PlayerColor,
}

impl Player {
    pub fn spawn(session_id: impl Into<String>, rng: &mut dyn RandomSource) -> Self {
        let color = PlayerColor::PALETTE[rng.index(PlayerColor::PALETTE.len())];
        let pos = spawn_position(EntityKind::Player, rng);
        Self::at(session_id, pos, color)
    }

    pub fn at(session_id: impl Into<String>, pos: Vector2, color: PlayerColor) -> Self {
        Self {
            session_id: session_id.into(),
            body: MovingBody::new(EntityKind::Player, pos),
            color,
        }
    }

    pub fn pos(&self) -> Vector2 {
        self.body.pos
    }
}

/// Static scenery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decoration {
    pub pos: Vector2,
    #[serde(rename = "type")]
    pub kind: DecorationKind,
}

impl Decoration {
    pub fn spawn(rng: &mut dyn RandomSource) -> Self {
        let kind = DecorationKind::ALL[rng.index(DecorationKind::ALL.len())];
        Self {
            pos: spawn_position(EntityKind::Decoration, rng),
            kind,
        }
    }
}

/// Autonomous animal. Behavior lives in `behavior.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alpaca {
    #[serde(flatten)]
    pub body: MovingBody,
    pub color: AlpacaColor,
    /// Current wander goal
    pub destination: Vector2,
    /// Milliseconds until the next wander decision
    #[serde(rename = "timer")]
    pub wander_timer: f32,
}

impl Alpaca {
    pub fn spawn(rng: &mut dyn RandomSource) -> Self {
        let color = AlpacaColor::PALETTE[rng.index(AlpacaColor::PALETTE.len())];
        let pos = spawn_position(EntityKind::Alpaca, rng);
        let mut alpaca = Self::at(pos);
        alpaca.color = color;
        alpaca
    }

    /// Resting alpaca at `pos` whose first tick makes a wander decision
    pub fn at(pos: Vector2) -> Self {
        Self {
            body: MovingBody::new(EntityKind::Alpaca, pos),
            color: AlpacaColor::Grey,
            destination: pos,
            wander_timer: 0.0,
        }
    }

    pub fn pos(&self) -> Vector2 {
        self.body.pos
    }
}
