//! Game simulation modules

pub mod behavior;
pub mod entity;
pub mod physics;
pub mod rng;
pub mod room;
pub mod snapshot;
pub mod vector;
pub mod world;

pub use room::{GameRoom, Outbound, RoomError, RoomHandle};
pub use world::WorldConfig;
