//! Room lifecycle and the authoritative tick loop

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{
    Timer, EMPTY_ROOM_GRACE_TICKS, SIMULATION_TPS, SNAPSHOT_TPS, TICK_DURATION_MICROS,
};
use crate::ws::protocol::{ClientMsg, RoomMetadata, ServerMsg};

use super::rng::RandomSource;
use super::snapshot::{SnapshotBuilder, WorldSnapshot};
use super::world::{Reconciliation, World, WorldConfig, WorldError};

/// Lifecycle phase of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Constructed, no world yet
    Uninitialized,
    /// World installed, accepting clients and ticking
    Active,
    /// Torn down; nothing more happens
    Disposed,
}

/// Room errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is not active (phase {0:?})")]
    NotActive(RoomPhase),

    #[error("Room was already created")]
    AlreadyCreated,

    #[error("Room is closed")]
    Closed,

    #[error(transparent)]
    World(#[from] WorldError),
}

/// One isolated game instance: its world and connected sessions.
///
/// All mutation goes through `&mut self`, so whoever owns the room
/// serializes events and ticks.
pub struct Room {
    id: Uuid,
    metadata: RoomMetadata,
    phase: RoomPhase,
    world: Option<World>,
    clients: HashSet<String>,
    tick: u64,
}

impl Room {
    pub fn new(id: Uuid, metadata: RoomMetadata) -> Self {
        Self {
            id,
            metadata,
            phase: RoomPhase::Uninitialized,
            world: None,
            clients: HashSet::new(),
            tick: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }

    /// Build and populate the world, then go active
    pub fn create(
        &mut self,
        config: WorldConfig,
        rng: Box<dyn RandomSource>,
    ) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Uninitialized {
            return Err(RoomError::AlreadyCreated);
        }

        let mut world = World::new(config, rng);
        world.init();
        self.world = Some(world);
        self.phase = RoomPhase::Active;

        info!(room_id = %self.id, metadata = ?self.metadata, "Room created");
        Ok(())
    }

    fn active_world(&mut self) -> Result<&mut World, RoomError> {
        match (self.phase, self.world.as_mut()) {
            (RoomPhase::Active, Some(world)) => Ok(world),
            (phase, _) => Err(RoomError::NotActive(phase)),
        }
    }

    pub fn on_join(&mut self, session_id: &str) -> Result<(), RoomError> {
        self.active_world()?.create_player(session_id)?;
        self.clients.insert(session_id.to_string());
        Ok(())
    }

    /// Remove a session. `Ok(false)` if it was not in the room.
    pub fn on_leave(&mut self, session_id: &str) -> Result<bool, RoomError> {
        self.active_world()?.remove_player(session_id);
        Ok(self.clients.remove(session_id))
    }

    /// Dispatch one client message.
    ///
    /// Returns a reply meant only for the sender, if any.
    pub fn on_message(
        &mut self,
        session_id: &str,
        msg: ClientMsg,
    ) -> Result<Option<ServerMsg>, RoomError> {
        let world = self.active_world()?;
        match msg {
            ClientMsg::SetPlayerMovement { payload } => {
                world.set_player_movement(session_id, payload)?;
                Ok(None)
            }
            ClientMsg::CheckPlayerPosition { payload } => {
                match world.reconcile_player_position(session_id, payload)? {
                    Reconciliation::Accepted => Ok(None),
                    Reconciliation::Rejected { server_pos, .. } => {
                        Ok(Some(ServerMsg::PositionCorrection {
                            position: server_pos,
                        }))
                    }
                }
            }
            ClientMsg::Unknown => {
                debug!(session_id = %session_id, "Ignoring unknown message kind");
                Ok(None)
            }
        }
    }

    /// Run one simulation tick of `delta_ms` milliseconds
    pub fn update(&mut self, delta_ms: f32) -> Result<(), RoomError> {
        self.active_world()?.update(delta_ms);
        self.tick += 1;
        Ok(())
    }

    pub fn full_snapshot(&self) -> Option<WorldSnapshot> {
        self.world.as_ref().map(WorldSnapshot::full)
    }

    pub fn dynamic_snapshot(&self) -> Option<WorldSnapshot> {
        self.world.as_ref().map(WorldSnapshot::dynamic)
    }

    /// Drop the world. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.phase == RoomPhase::Disposed {
            return;
        }
        self.phase = RoomPhase::Disposed;
        self.world = None;
        self.clients.clear();
        info!(room_id = %self.id, "Room disposed");
    }
}

/// Who an outbound message is for
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    All,
    Session(String),
    AllExcept(String),
}

/// Message published by a room to its connections
#[derive(Debug, Clone)]
pub struct Outbound {
    pub recipient: Recipient,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn is_for(&self, session_id: &str) -> bool {
        match &self.recipient {
            Recipient::All => true,
            Recipient::Session(id) => id == session_id,
            Recipient::AllExcept(id) => id != session_id,
        }
    }
}

/// Events delivered to a running room
#[derive(Debug)]
pub enum RoomEvent {
    Join {
        session_id: String,
        reply: oneshot::Sender<Result<WorldSnapshot, RoomError>>,
    },
    Leave {
        session_id: String,
    },
    Message {
        session_id: String,
        msg: ClientMsg,
    },
    Dispose,
}

/// Handle to a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub metadata: RoomMetadata,
    event_tx: mpsc::Sender<RoomEvent>,
    outbound_tx: broadcast::Sender<Outbound>,
    client_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound_tx.subscribe()
    }

    /// Add a session; resolves with the full world once the room has
    /// processed the join
    pub async fn join(&self, session_id: &str) -> Result<WorldSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.event_tx
            .send(RoomEvent::Join {
                session_id: session_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| RoomError::Closed)?;
        rx.await.map_err(|_| RoomError::Closed)?
    }

    pub async fn leave(&self, session_id: &str) {
        let _ = self
            .event_tx
            .send(RoomEvent::Leave {
                session_id: session_id.to_string(),
            })
            .await;
    }

    pub async fn send_message(&self, session_id: &str, msg: ClientMsg) -> Result<(), RoomError> {
        self.event_tx
            .send(RoomEvent::Message {
                session_id: session_id.to_string(),
                msg,
            })
            .await
            .map_err(|_| RoomError::Closed)
    }

    pub async fn dispose(&self) {
        let _ = self.event_tx.send(RoomEvent::Dispose).await;
    }
}

/// Task that owns a room and drives its tick loop
pub struct GameRoom {
    room: Room,
    event_rx: mpsc::Receiver<RoomEvent>,
    outbound_tx: broadcast::Sender<Outbound>,
    snapshot_builder: SnapshotBuilder,
    client_count: Arc<AtomicUsize>,
    empty_ticks: u64,
}

impl GameRoom {
    /// Create the room and its world; the tick loop starts with [`GameRoom::run`]
    pub fn new(
        id: Uuid,
        metadata: RoomMetadata,
        config: WorldConfig,
        rng: Box<dyn RandomSource>,
    ) -> Result<(Self, RoomHandle), RoomError> {
        let mut room = Room::new(id, metadata.clone());
        room.create(config, rng)?;

        let (event_tx, event_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(64);
        let client_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            metadata,
            event_tx,
            outbound_tx: outbound_tx.clone(),
            client_count: client_count.clone(),
        };

        let game_room = Self {
            room,
            event_rx,
            outbound_tx,
            snapshot_builder: SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS),
            client_count,
            empty_ticks: 0,
        };

        Ok((game_room, handle))
    }

    /// Run the authoritative tick loop until the room is disposed
    pub async fn run(mut self) {
        info!(room_id = %self.room.id(), "Room tick loop started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut clock = Timer::new();

        loop {
            tick_interval.tick().await;
            let delta_ms = clock.lap_ms();

            // Drain event queue
            self.process_events();
            if self.room.phase() != RoomPhase::Active {
                break;
            }

            if let Err(e) = self.room.update(delta_ms) {
                warn!(room_id = %self.room.id(), error = %e, "Tick failed");
                break;
            }

            if self.snapshot_builder.should_send() {
                if let Some(state) = self.room.dynamic_snapshot() {
                    self.publish(
                        Recipient::All,
                        ServerMsg::State {
                            tick: self.room.tick(),
                            state,
                        },
                    );
                }
            }

            if self.room.client_count() == 0 {
                self.empty_ticks += 1;
                if self.empty_ticks >= EMPTY_ROOM_GRACE_TICKS {
                    info!(room_id = %self.room.id(), "Room stayed empty, disposing");
                    break;
                }
            } else {
                self.empty_ticks = 0;
            }
        }

        self.room.dispose();
        self.client_count.store(0, Ordering::Relaxed);
        self.publish(Recipient::All, ServerMsg::RoomDisposed);
    }

    fn publish(&self, recipient: Recipient, msg: ServerMsg) {
        let _ = self.outbound_tx.send(Outbound { recipient, msg });
    }

    /// Apply every queued event
    fn process_events(&mut self) {
        while self.room.phase() == RoomPhase::Active {
            let event = match self.event_rx.try_recv() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.room.dispose();
                    break;
                }
            };

            match event {
                RoomEvent::Join { session_id, reply } => self.handle_join(session_id, reply),
                RoomEvent::Leave { session_id } => self.handle_leave(&session_id),
                RoomEvent::Message { session_id, msg } => self.handle_message(&session_id, msg),
                RoomEvent::Dispose => self.room.dispose(),
            }
        }
    }

    fn handle_join(
        &mut self,
        session_id: String,
        reply: oneshot::Sender<Result<WorldSnapshot, RoomError>>,
    ) {
        let result = self.room.on_join(&session_id).and_then(|()| {
            self.room
                .full_snapshot()
                .ok_or(RoomError::NotActive(self.room.phase()))
        });

        match &result {
            Ok(_) => {
                self.sync_client_count();
                self.snapshot_builder.force_next();
                self.publish(
                    Recipient::AllExcept(session_id.clone()),
                    ServerMsg::PlayerJoined {
                        session_id: session_id.clone(),
                    },
                );
                info!(
                    room_id = %self.room.id(),
                    session_id = %session_id,
                    client_count = self.room.client_count(),
                    "Client joined room"
                );
            }
            Err(e) => {
                warn!(room_id = %self.room.id(), session_id = %session_id, error = %e, "Join rejected");
            }
        }

        let _ = reply.send(result);
    }

    fn handle_leave(&mut self, session_id: &str) {
        match self.room.on_leave(session_id) {
            Ok(true) => {}
            Ok(false) => {
                debug!(room_id = %self.room.id(), session_id = %session_id, "Leave for unknown session ignored");
                return;
            }
            Err(e) => {
                warn!(room_id = %self.room.id(), session_id = %session_id, error = %e, "Leave failed");
                return;
            }
        }
        self.sync_client_count();
        self.snapshot_builder.force_next();
        self.publish(
            Recipient::All,
            ServerMsg::PlayerLeft {
                session_id: session_id.to_string(),
            },
        );
        info!(
            room_id = %self.room.id(),
            session_id = %session_id,
            client_count = self.room.client_count(),
            "Client left room"
        );

        if self.room.client_count() == 0 {
            info!(room_id = %self.room.id(), "Last client left, disposing");
            self.room.dispose();
        }
    }

    fn handle_message(&mut self, session_id: &str, msg: ClientMsg) {
        match self.room.on_message(session_id, msg) {
            Ok(Some(reply)) => self.publish(Recipient::Session(session_id.to_string()), reply),
            Ok(None) => {}
            Err(e) => {
                warn!(room_id = %self.room.id(), session_id = %session_id, error = %e, "Message rejected");
            }
        }
    }

    fn sync_client_count(&self) {
        self.client_count
            .store(self.room.client_count(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rng::SeededRandom;
    use crate::game::vector::Vector2;
    use tokio::time::timeout;

    fn small_config() -> WorldConfig {
        WorldConfig {
            alpaca_count: 2,
            decoration_count: 5,
            clamp_player_intent: false,
        }
    }

    fn active_room() -> Room {
        let mut room = Room::new(Uuid::new_v4(), RoomMetadata::default());
        room.create(small_config(), Box::new(SeededRandom::new(11)))
            .unwrap();
        room
    }

    #[test]
    fn create_installs_world_once() {
        let mut room = Room::new(Uuid::new_v4(), RoomMetadata::default());
        assert_eq!(room.phase(), RoomPhase::Uninitialized);
        assert!(room.world().is_none());

        room.create(small_config(), Box::new(SeededRandom::new(1)))
            .unwrap();
        assert_eq!(room.phase(), RoomPhase::Active);
        let world = room.world().unwrap();
        assert_eq!(world.alpacas().len(), 2);
        assert_eq!(world.decorations().len(), 5);

        assert_eq!(
            room.create(small_config(), Box::new(SeededRandom::new(1))),
            Err(RoomError::AlreadyCreated)
        );
    }

    #[test]
    fn events_before_create_are_refused() {
        let mut room = Room::new(Uuid::new_v4(), RoomMetadata::default());
        assert_eq!(
            room.on_join("s1"),
            Err(RoomError::NotActive(RoomPhase::Uninitialized))
        );
        assert!(room.update(16.0).is_err());
    }

    #[test]
    fn join_and_leave_track_players() {
        let mut room = active_room();
        room.on_join("s1").unwrap();
        room.on_join("s2").unwrap();
        assert_eq!(room.client_count(), 2);
        assert_eq!(room.world().unwrap().players().len(), 2);

        assert!(room.on_leave("s1").unwrap());
        assert!(!room.on_leave("s1").unwrap());
        assert!(!room.on_leave("never-joined").unwrap());
        assert_eq!(room.client_count(), 1);
        assert!(room.world().unwrap().player("s1").is_none());
    }

    #[test]
    fn messages_dispatch_by_kind() {
        let mut room = active_room();
        room.on_join("s1").unwrap();

        let reply = room
            .on_message(
                "s1",
                ClientMsg::SetPlayerMovement {
                    payload: Vector2::new(0.0, 1.0),
                },
            )
            .unwrap();
        assert!(reply.is_none());
        let player = room.world().unwrap().player("s1").unwrap();
        assert_eq!(player.body.movement, Vector2::new(0.0, 1.0));

        assert!(room.on_message("s1", ClientMsg::Unknown).unwrap().is_none());
    }

    #[test]
    fn rejected_position_check_replies_with_correction() {
        let mut room = active_room();
        room.on_join("s1").unwrap();
        let server_pos = room.world().unwrap().player("s1").unwrap().pos();
        let claimed = Vector2::new(server_pos.x + 500.0, server_pos.y);

        let reply = room
            .on_message("s1", ClientMsg::CheckPlayerPosition { payload: claimed })
            .unwrap();
        match reply {
            Some(ServerMsg::PositionCorrection { position }) => assert_eq!(position, server_pos),
            other => panic!("expected correction, got {other:?}"),
        }

        let near = Vector2::new(server_pos.x + 1.0, server_pos.y);
        let reply = room
            .on_message("s1", ClientMsg::CheckPlayerPosition { payload: near })
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(room.world().unwrap().player("s1").unwrap().pos(), near);
    }

    #[test]
    fn message_from_departed_session_is_harmless() {
        let mut room = active_room();
        room.on_join("s1").unwrap();
        room.on_leave("s1").unwrap();

        let res = room.on_message(
            "s1",
            ClientMsg::SetPlayerMovement {
                payload: Vector2::new(1.0, 0.0),
            },
        );
        assert!(matches!(
            res,
            Err(RoomError::World(WorldError::PlayerNotFound(_)))
        ));
        assert!(room.world().unwrap().player("s1").is_none());
        room.update(16.0).unwrap();
    }

    #[test]
    fn dispose_is_terminal() {
        let mut room = active_room();
        room.on_join("s1").unwrap();
        room.update(16.0).unwrap();
        assert_eq!(room.tick(), 1);

        room.dispose();
        room.dispose();
        assert_eq!(room.phase(), RoomPhase::Disposed);
        assert!(room.world().is_none());
        assert_eq!(room.on_join("s2"), Err(RoomError::NotActive(RoomPhase::Disposed)));
        assert!(room.full_snapshot().is_none());
    }

    #[test]
    fn outbound_targets() {
        let out = Outbound {
            recipient: Recipient::AllExcept("a".into()),
            msg: ServerMsg::RoomDisposed,
        };
        assert!(!out.is_for("a"));
        assert!(out.is_for("b"));

        let out = Outbound {
            recipient: Recipient::Session("a".into()),
            msg: ServerMsg::RoomDisposed,
        };
        assert!(out.is_for("a"));
        assert!(!out.is_for("b"));
    }

    #[tokio::test]
    async fn running_room_replicates_and_disposes_when_empty() {
        let (game_room, handle) = GameRoom::new(
            Uuid::new_v4(),
            RoomMetadata::default(),
            small_config(),
            Box::new(SeededRandom::new(8)),
        )
        .unwrap();
        let mut rx = handle.subscribe();
        let task = tokio::spawn(game_room.run());

        let snapshot = handle.join("s1").await.unwrap();
        assert_eq!(snapshot.decorations.as_ref().map(Vec::len), Some(5));
        assert!(snapshot.players.contains_key("s1"));
        assert_eq!(handle.client_count(), 1);

        handle
            .send_message(
                "s1",
                ClientMsg::SetPlayerMovement {
                    payload: Vector2::new(1.0, 0.0),
                },
            )
            .await
            .unwrap();

        let state = timeout(Duration::from_secs(2), async {
            loop {
                let out = rx.recv().await.unwrap();
                if let ServerMsg::State { state, .. } = out.msg {
                    return state;
                }
            }
        })
        .await
        .expect("no state snapshot");
        assert!(state.players.contains_key("s1"));
        assert!(state.decorations.is_none());

        handle.leave("s1").await;
        timeout(Duration::from_secs(2), task)
            .await
            .expect("room did not dispose")
            .unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.client_count(), 0);
        assert!(matches!(handle.join("s2").await, Err(RoomError::Closed)));
    }

    #[tokio::test]
    async fn stray_leave_does_not_close_fresh_room() {
        let (game_room, handle) = GameRoom::new(
            Uuid::new_v4(),
            RoomMetadata::default(),
            small_config(),
            Box::new(SeededRandom::new(3)),
        )
        .unwrap();
        let mut rx = handle.subscribe();
        let task = tokio::spawn(game_room.run());

        handle.leave("ghost").await;
        let snapshot = handle.join("s1").await.unwrap();
        assert!(snapshot.players.contains_key("s1"));
        assert_eq!(handle.client_count(), 1);
        assert!(!handle.is_closed());

        handle.dispose().await;
        timeout(Duration::from_secs(2), task)
            .await
            .expect("room did not dispose")
            .unwrap();

        while let Ok(out) = rx.try_recv() {
            assert!(
                !matches!(out.msg, ServerMsg::PlayerLeft { .. }),
                "unexpected {:?}",
                out.msg
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn room_nobody_joins_disposes_after_grace() {
        let (game_room, handle) = GameRoom::new(
            Uuid::new_v4(),
            RoomMetadata::default(),
            small_config(),
            Box::new(SeededRandom::new(5)),
        )
        .unwrap();
        let mut rx = handle.subscribe();
        let task = tokio::spawn(game_room.run());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!task.is_finished());
        assert!(!handle.is_closed());

        timeout(Duration::from_secs(60), task)
            .await
            .expect("empty room was not disposed")
            .unwrap();
        assert!(handle.is_closed());

        let mut disposed = false;
        loop {
            match rx.try_recv() {
                Ok(out) => disposed |= matches!(out.msg, ServerMsg::RoomDisposed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(disposed, "RoomDisposed was not published");
    }
}
