//! Replication snapshots of a world

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::{Alpaca, Decoration, Player};
use super::world::World;

/// Replicable copy of a world.
///
/// Decorations never change, so they are only included in full snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub players: BTreeMap<String, Player>,
    pub alpacas: Vec<Alpaca>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorations: Option<Vec<Decoration>>,
}

impl WorldSnapshot {
    /// Everything, for a client that just joined
    pub fn full(world: &World) -> Self {
        Self {
            decorations: Some(world.decorations().to_vec()),
            ..Self::dynamic(world)
        }
    }

    /// Only the entities that move
    pub fn dynamic(world: &World) -> Self {
        Self {
            players: world
                .players()
                .iter()
                .map(|(id, p)| (id.clone(), p.clone()))
                .collect(),
            alpacas: world.alpacas().to_vec(),
            decorations: None,
        }
    }
}

/// Decides which ticks produce a snapshot
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used after joins and leaves)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rng::SeededRandom;
    use crate::game::world::WorldConfig;

    #[test]
    fn sends_every_nth_tick() {
        let mut builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn force_next_sends_immediately() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn zero_interval_sends_every_tick() {
        let mut builder = SnapshotBuilder::new(0);
        assert!(builder.should_send());
        assert!(builder.should_send());
    }

    #[test]
    fn full_snapshot_carries_decorations() {
        let mut world = World::new(WorldConfig::default(), Box::new(SeededRandom::new(5)));
        world.init();
        world.create_player("abc").unwrap();

        let full = WorldSnapshot::full(&world);
        assert_eq!(full.decorations.as_ref().map(Vec::len), Some(100));
        assert_eq!(full.alpacas.len(), 1);
        assert!(full.players.contains_key("abc"));

        let dynamic = serde_json::to_value(WorldSnapshot::dynamic(&world)).unwrap();
        assert!(dynamic.get("decorations").is_none());
        assert_eq!(dynamic["players"]["abc"]["speed"].as_f64().map(|s| s as f32), Some(0.4));
    }
}
