//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::snapshot::WorldSnapshot;
use crate::game::vector::Vector2;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Desired movement direction for the sender's player
    SetPlayerMovement { payload: Vector2 },

    /// Client's view of its own position, for reconciliation
    CheckPlayerPosition { payload: Vector2 },

    /// Any other message kind; ignored
    #[serde(other)]
    Unknown,
}

/// Opaque room metadata supplied by the creating client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMetadata {
    pub room_name: Option<String>,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Confirmation of room join with the full world
    RoomJoined {
        room_id: Uuid,
        session_id: String,
        metadata: RoomMetadata,
        state: WorldSnapshot,
    },

    /// Periodic state of the moving entities
    State {
        /// Server tick number
        tick: u64,
        state: WorldSnapshot,
    },

    /// Another client joined the room
    PlayerJoined { session_id: String },

    /// A client left the room
    PlayerLeft { session_id: String },

    /// Claimed position was rejected; this is the authoritative one
    PositionCorrection { position: Vector2 },

    /// Room is shutting down
    RoomDisposed,

    /// Error message
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movement_message() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"set_player_movement","payload":{"x":1,"y":-0.5}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMsg::SetPlayerMovement {
                payload: Vector2::new(1.0, -0.5)
            }
        );
    }

    #[test]
    fn parses_position_check() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"check_player_position","payload":{"x":12.5,"y":300}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::CheckPlayerPosition {
                payload: Vector2::new(12.5, 300.0)
            }
        );
    }

    #[test]
    fn unknown_kind_is_tolerated() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"dance","payload":{"style":"tango"}}"#).unwrap();
        assert_eq!(msg, ClientMsg::Unknown);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let res = serde_json::from_str::<ClientMsg>(r#"{"type":"set_player_movement","payload":{"x":"fast"}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMsg::PositionCorrection {
            position: Vector2::new(1.0, 2.0),
        })
        .unwrap();
        assert_eq!(json["type"], "position_correction");
        assert_eq!(json["position"]["y"], 2.0);

        let json = serde_json::to_value(RoomMetadata {
            room_name: Some("meadow".into()),
        })
        .unwrap();
        assert_eq!(json["roomName"], "meadow");
    }
}
