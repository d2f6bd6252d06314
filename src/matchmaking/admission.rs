//! Join admission policies

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

/// Options a client sends when asking to join
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOptions {
    /// Client explicitly asks for a new room
    #[serde(default)]
    pub create: bool,
    /// Passed through to room metadata
    pub room_name: Option<String>,
}

/// Decides whether a room accepts a join request
pub trait JoinPolicy: Send + Sync {
    /// `is_new_room` is true when the room would be created for this request
    fn admit(&self, options: &JoinOptions, is_new_room: bool, connected_clients: usize) -> bool;
}

/// Creating requests only get a fresh room; plain joins only land in
/// rooms somebody is already playing in.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOrOccupied;

impl JoinPolicy for CreateOrOccupied {
    fn admit(&self, options: &JoinOptions, is_new_room: bool, connected_clients: usize) -> bool {
        if options.create {
            is_new_room
        } else {
            connected_clients > 0
        }
    }
}

/// Any room takes anyone
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAdmission;

impl JoinPolicy for OpenAdmission {
    fn admit(&self, _options: &JoinOptions, _is_new_room: bool, _connected_clients: usize) -> bool {
        true
    }
}

/// Configurable choice of policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    CreateOrOccupied,
    Open,
}

impl AdmissionPolicy {
    pub fn build(self) -> Arc<dyn JoinPolicy> {
        match self {
            AdmissionPolicy::CreateOrOccupied => Arc::new(CreateOrOccupied),
            AdmissionPolicy::Open => Arc::new(OpenAdmission),
        }
    }
}

impl FromStr for AdmissionPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create_or_occupied" => Ok(AdmissionPolicy::CreateOrOccupied),
            "open" => Ok(AdmissionPolicy::Open),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(create: bool) -> JoinOptions {
        JoinOptions {
            create,
            room_name: None,
        }
    }

    #[test]
    fn create_request_only_takes_new_room() {
        let policy = CreateOrOccupied;
        assert!(policy.admit(&opts(true), true, 0));
        assert!(!policy.admit(&opts(true), false, 3));
    }

    #[test]
    fn plain_join_needs_an_occupied_room() {
        let policy = CreateOrOccupied;
        assert!(!policy.admit(&opts(false), false, 0));
        assert!(!policy.admit(&opts(false), true, 0));
        assert!(policy.admit(&opts(false), false, 1));
    }

    #[test]
    fn open_admits_everything() {
        let policy = OpenAdmission;
        assert!(policy.admit(&opts(false), true, 0));
        assert!(policy.admit(&opts(true), false, 9));
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("open".parse::<AdmissionPolicy>(), Ok(AdmissionPolicy::Open));
        assert_eq!(
            " Create_Or_Occupied ".parse::<AdmissionPolicy>(),
            Ok(AdmissionPolicy::CreateOrOccupied)
        );
        assert!("lottery".parse::<AdmissionPolicy>().is_err());
    }

    #[test]
    fn join_options_from_query() {
        let options: JoinOptions =
            serde_json::from_str(r#"{"create":true,"roomName":"meadow"}"#).unwrap();
        assert!(options.create);
        assert_eq!(options.room_name.as_deref(), Some("meadow"));

        let options: JoinOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.create);
    }
}
