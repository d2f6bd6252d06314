//! Per-kind movement constants and movement integration

use serde::{Deserialize, Serialize};

use super::vector::Vector2;

/// Every kind of thing that can exist in a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Client-controlled avatar
    Player,
    /// Static scenery
    Decoration,
    /// Autonomous wandering animal
    Alpaca,
}

/// Fixed constants per entity kind
#[derive(Debug, Clone, Copy)]
pub struct KindStats {
    /// Travel speed in units per millisecond, `None` for static kinds
    pub speed: Option<f32>,
    /// Spawn area lower bound (both axes)
    pub spawn_min: f32,
    /// Spawn area width (both axes)
    pub spawn_span: f32,
}

impl KindStats {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Player => Self {
                speed: Some(0.4),
                spawn_min: 0.0,
                spawn_span: 600.0,
            },
            EntityKind::Alpaca => Self {
                speed: Some(0.05),
                spawn_min: 0.0,
                spawn_span: 600.0,
            },
            EntityKind::Decoration => Self {
                speed: None,
                spawn_min: -2000.0,
                spawn_span: 4000.0,
            },
        }
    }
}

/// Position plus the movement state shared by players and alpacas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingBody {
    pub pos: Vector2,
    /// Desired direction for this tick; not replicated
    #[serde(skip)]
    pub movement: Vector2,
    /// Intended instantaneous velocity, derived from `movement` on every advance
    pub velocity: Vector2,
    pub speed: f32,
}

impl MovingBody {
    /// Create a resting body for a moving kind. Static kinds get speed 0.
    pub fn new(kind: EntityKind, pos: Vector2) -> Self {
        Self {
            pos,
            movement: Vector2::ZERO,
            velocity: Vector2::ZERO,
            speed: KindStats::for_kind(kind).speed.unwrap_or(0.0),
        }
    }

    pub fn set_movement(&mut self, movement: Vector2) {
        self.movement = movement;
    }

    /// Integrate `delta_ms` milliseconds of travel along the movement intent
    pub fn advance(&mut self, delta_ms: f32) {
        if self.movement.x != 0.0 {
            self.pos.x += self.movement.x * self.speed * delta_ms;
        }
        if self.movement.y != 0.0 {
            self.pos.y += self.movement.y * self.speed * delta_ms;
        }
        self.velocity = self.movement * self.speed;
    }
}
