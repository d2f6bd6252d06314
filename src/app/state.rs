//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matchmaking::RoomRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize room registry with the configured world and admission policy
        let rooms = Arc::new(RoomRegistry::new(
            config.world.clone(),
            config.admission.build(),
        ));

        Self { config, rooms }
    }
}
