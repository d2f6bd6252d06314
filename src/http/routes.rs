//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::RoomHandle;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::RoomMetadata;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(list_rooms_handler))
        .route("/rooms/:room_id", get(room_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS configuration - `*` or comma-separated origins
fn build_cors(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_clients: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.rooms.active_rooms(),
        active_clients: state.rooms.total_clients(),
    })
}

// ============================================================================
// Room listing
// ============================================================================

#[derive(Serialize)]
struct RoomInfo {
    room_id: Uuid,
    metadata: RoomMetadata,
    clients: usize,
}

impl From<&RoomHandle> for RoomInfo {
    fn from(handle: &RoomHandle) -> Self {
        Self {
            room_id: handle.id,
            metadata: handle.metadata.clone(),
            clients: handle.client_count(),
        }
    }
}

async fn list_rooms_handler(State(state): State<AppState>) -> Json<Vec<RoomInfo>> {
    Json(state.rooms.handles().iter().map(RoomInfo::from).collect())
}

async fn room_handler(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomInfo>, AppError> {
    let handle = state
        .rooms
        .get(&room_id)
        .ok_or_else(|| AppError::NotFound(format!("room {room_id}")))?;
    Ok(Json(RoomInfo::from(&handle)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
