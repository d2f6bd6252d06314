//! World state: every entity of one room and the per-tick update

use std::collections::HashMap;

use tracing::{debug, warn};

use super::entity::{Alpaca, Decoration, Player};
use super::rng::RandomSource;
use super::vector::Vector2;

/// Claimed positions closer than this to server truth are accepted
pub const RECONCILE_THRESHOLD: f32 = 10.0;

/// Per-room world parameters
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Alpacas spawned by [`World::init`]
    pub alpaca_count: usize,
    /// Decorations spawned by [`World::init`]
    pub decoration_count: usize,
    /// Clamp client movement intents to unit length
    pub clamp_player_intent: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            alpaca_count: 1,
            decoration_count: 100,
            clamp_player_intent: false,
        }
    }
}

/// World mutation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("Player already exists: {0}")]
    PlayerExists(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Vector is not finite")]
    InvalidVector,
}

/// Outcome of checking a client's claimed position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// Claim was close enough and is now the server position
    Accepted,
    /// Claim was too far off; the server position stands
    Rejected { server_pos: Vector2, distance: f32 },
}

/// The full mutable state of one room
pub struct World {
    players: HashMap<String, Player>,
    alpacas: Vec<Alpaca>,
    decorations: Vec<Decoration>,
    config: WorldConfig,
    rng: Box<dyn RandomSource>,
}

impl World {
    /// Empty world; call [`World::init`] to populate it
    pub fn new(config: WorldConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            players: HashMap::new(),
            alpacas: Vec::new(),
            decorations: Vec::new(),
            config,
            rng,
        }
    }

    /// Spawn the configured alpacas and decorations
    pub fn init(&mut self) {
        for _ in 0..self.config.alpaca_count {
            let alpaca = Alpaca::spawn(self.rng.as_mut());
            self.alpacas.push(alpaca);
        }
        for _ in 0..self.config.decoration_count {
            let decoration = Decoration::spawn(self.rng.as_mut());
            self.decorations.push(decoration);
        }
        debug!(
            alpacas = self.alpacas.len(),
            decorations = self.decorations.len(),
            "World initialized"
        );
    }

    pub fn players(&self) -> &HashMap<String, Player> {
        &self.players
    }

    pub fn player(&self, session_id: &str) -> Option<&Player> {
        self.players.get(session_id)
    }

    #[cfg(test)]
    pub(crate) fn player_mut(&mut self, session_id: &str) -> Option<&mut Player> {
        self.players.get_mut(session_id)
    }

    pub fn alpacas(&self) -> &[Alpaca] {
        &self.alpacas
    }

    #[cfg(test)]
    pub(crate) fn alpacas_mut(&mut self) -> &mut Vec<Alpaca> {
        &mut self.alpacas
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    /// Spawn a player for a newly joined session.
    ///
    /// An existing player under the same id is left untouched.
    pub fn create_player(&mut self, session_id: &str) -> Result<&Player, WorldError> {
        if self.players.contains_key(session_id) {
            return Err(WorldError::PlayerExists(session_id.to_string()));
        }
        let player = Player::spawn(session_id, self.rng.as_mut());
        Ok(self.players.entry(session_id.to_string()).or_insert(player))
    }

    /// Remove a player; no-op when absent
    pub fn remove_player(&mut self, session_id: &str) -> Option<Player> {
        self.players.remove(session_id)
    }

    /// Set a player's movement intent as supplied by its client
    pub fn set_player_movement(
        &mut self,
        session_id: &str,
        intent: Vector2,
    ) -> Result<(), WorldError> {
        if !intent.is_finite() {
            return Err(WorldError::InvalidVector);
        }
        let intent = if self.config.clamp_player_intent {
            intent.clamp_length(1.0)
        } else {
            intent
        };

        let player = self
            .players
            .get_mut(session_id)
            .ok_or_else(|| WorldError::PlayerNotFound(session_id.to_string()))?;
        player.body.set_movement(intent);
        Ok(())
    }

    /// Accept a client's claimed position if it is within
    /// [`RECONCILE_THRESHOLD`] of the server position.
    pub fn reconcile_player_position(
        &mut self,
        session_id: &str,
        claimed: Vector2,
    ) -> Result<Reconciliation, WorldError> {
        if !claimed.is_finite() {
            return Err(WorldError::InvalidVector);
        }
        let player = self
            .players
            .get_mut(session_id)
            .ok_or_else(|| WorldError::PlayerNotFound(session_id.to_string()))?;

        let distance = player.pos().distance(claimed);
        if distance < RECONCILE_THRESHOLD {
            player.body.pos = claimed;
            Ok(Reconciliation::Accepted)
        } else {
            warn!(
                session_id = %session_id,
                distance,
                server_x = player.body.pos.x,
                server_y = player.body.pos.y,
                "Position discrepancy detected"
            );
            Ok(Reconciliation::Rejected {
                server_pos: player.body.pos,
                distance,
            })
        }
    }

    /// Advance the simulation by `delta_ms` milliseconds.
    ///
    /// Alpacas decide against the players' pre-move positions, then alpacas
    /// and players integrate. Decorations never change.
    pub fn update(&mut self, delta_ms: f32) {
        for alpaca in &mut self.alpacas {
            alpaca.update(delta_ms, self.players.values(), self.rng.as_mut());
        }
        for alpaca in &mut self.alpacas {
            alpaca.body.advance(delta_ms);
        }
        for player in self.players.values_mut() {
            player.body.advance(delta_ms);
        }
    }
}
