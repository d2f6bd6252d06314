//! Room registry - finds or creates the room a session joins

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::rng::SeededRandom;
use crate::game::snapshot::WorldSnapshot;
use crate::game::{GameRoom, RoomError, RoomHandle, WorldConfig};
use crate::ws::protocol::RoomMetadata;

use super::admission::{JoinOptions, JoinPolicy};

/// A room can close between admission and join; retry this many times
const JOIN_ATTEMPTS: usize = 3;

/// Join errors
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("No room available for this request")]
    NoRoomAvailable,

    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Registry of all running rooms
pub struct RoomRegistry {
    rooms: Arc<DashMap<Uuid, RoomHandle>>,
    policy: Arc<dyn JoinPolicy>,
    world_config: WorldConfig,
}

impl RoomRegistry {
    pub fn new(world_config: WorldConfig, policy: Arc<dyn JoinPolicy>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            policy,
            world_config,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Snapshot of every registered room handle
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_clients(&self) -> usize {
        self.rooms.iter().map(|r| r.value().client_count()).sum()
    }

    /// First live room whose policy admits this request
    fn find_admitting(&self, options: &JoinOptions) -> Option<RoomHandle> {
        self.rooms
            .iter()
            .map(|entry| entry.value().clone())
            .find(|handle| {
                !handle.is_closed() && self.policy.admit(options, false, handle.client_count())
            })
    }

    /// Create a room and spawn its tick loop
    pub fn create_room(&self, options: &JoinOptions) -> Result<RoomHandle, JoinError> {
        let room_id = Uuid::new_v4();
        let metadata = RoomMetadata {
            room_name: options.room_name.clone(),
        };

        let (game_room, handle) = GameRoom::new(
            room_id,
            metadata,
            self.world_config.clone(),
            Box::new(SeededRandom::from_entropy()),
        )?;

        self.rooms.insert(room_id, handle.clone());

        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            game_room.run().await;

            // Cleanup after room is disposed
            rooms.remove(&room_id);
            info!(room_id = %room_id, "Room removed from registry");
        });

        Ok(handle)
    }

    /// Place a session in an admitting room, creating one if the policy
    /// allows. Returns the room and the full world it joined.
    pub async fn join(
        &self,
        session_id: &str,
        options: &JoinOptions,
    ) -> Result<(RoomHandle, WorldSnapshot), JoinError> {
        for attempt in 1..=JOIN_ATTEMPTS {
            let handle = match self.find_admitting(options) {
                Some(handle) => handle,
                None if self.policy.admit(options, true, 0) => self.create_room(options)?,
                None => return Err(JoinError::NoRoomAvailable),
            };

            match handle.join(session_id).await {
                Ok(snapshot) => return Ok((handle, snapshot)),
                Err(RoomError::Closed) => {
                    debug!(room_id = %handle.id, attempt, "Room closed during join, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(JoinError::NoRoomAvailable)
    }

    /// Dispose every room (server shutdown)
    pub async fn shutdown(&self) {
        for handle in self.handles() {
            handle.dispose().await;
        }
        info!("All rooms asked to dispose");
    }
}
