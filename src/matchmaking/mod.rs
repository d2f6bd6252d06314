//! Matchmaking: room admission and the room registry

pub mod admission;
pub mod service;

pub use admission::{AdmissionPolicy, JoinOptions};
pub use service::{JoinError, RoomRegistry};
