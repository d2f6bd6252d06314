//! Alpaca decision making: flee nearby players, otherwise wander

use super::entity::{Alpaca, Player};
use super::rng::RandomSource;
use super::vector::Vector2;

/// Players closer than this scare an alpaca
pub const FLEE_RADIUS: f32 = 100.0;
/// Wander decisions are spaced by `[min, max)` milliseconds
pub const WANDER_INTERVAL_MIN_MS: f32 = 5000.0;
pub const WANDER_INTERVAL_MAX_MS: f32 = 10000.0;
/// Maximum wander offset on each axis
pub const WANDER_REACH: f32 = 100.0;
/// Destinations closer than this count as reached
pub const ARRIVAL_RADIUS: f32 = 5.0;

impl Alpaca {
    /// Decide this tick's movement intent. Runs before integration.
    ///
    /// `players` is read-only: every alpaca sees the same pre-move positions.
    pub fn update<'a>(
        &mut self,
        delta_ms: f32,
        players: impl IntoIterator<Item = &'a Player>,
        rng: &mut dyn RandomSource,
    ) {
        self.wander_timer -= delta_ms;

        let repulse = self.repulsion(players);
        if repulse.is_nonzero() {
            self.body.movement = repulse.normalized_or_zero();
            self.destination = self.body.pos;
        } else {
            if self.wander_timer <= 0.0 {
                self.pick_wander_goal(rng);
            }
            self.steer_to_destination();
        }
    }

    /// Sum of offsets away from every player inside the flee radius
    fn repulsion<'a>(&self, players: impl IntoIterator<Item = &'a Player>) -> Vector2 {
        let mut repulse = Vector2::ZERO;
        for player in players {
            let away = self.body.pos - player.pos();
            if away.magnitude() < FLEE_RADIUS {
                repulse += away;
            }
        }
        repulse
    }

    fn pick_wander_goal(&mut self, rng: &mut dyn RandomSource) {
        self.wander_timer = rng.range(WANDER_INTERVAL_MIN_MS, WANDER_INTERVAL_MAX_MS);

        let pos = self.body.pos;
        self.destination = if rng.coin_flip() {
            Vector2::new(
                pos.x + rng.whole(-WANDER_REACH, 2.0 * WANDER_REACH),
                pos.y + rng.whole(-WANDER_REACH, 2.0 * WANDER_REACH),
            )
        } else {
            pos
        };
    }

    /// Head for the destination, stopping once inside the arrival radius
    fn steer_to_destination(&mut self) {
        let to_destination = self.destination - self.body.pos;
        self.body.movement = if to_destination.magnitude() > ARRIVAL_RADIUS {
            to_destination.normalized_or_zero()
        } else {
            Vector2::ZERO
        };
    }
}
