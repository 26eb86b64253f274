//! HTTP and WebSocket endpoints for the scene server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::animation::AnimationRunner;
use crate::error::StreamError;
use crate::protocol::{parse_client, serialize_server, ClientMessage, ServerMessage};
use crate::sync::{CameraSync, CameraUpdate, DEFAULT_GUARD_INTERVAL_MS};

/// Scene server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Base URL clients reach this server under (no port).
    pub base_url: String,
    /// Directory served under `/data`; converter output lands here too.
    pub data_dir: PathBuf,
    /// Minimum gap a camera update must exceed beyond the stored
    /// timestamp to be accepted (same units as `lastUpdate`).
    pub guard_interval_ms: i64,
    pub print_component_tree: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            base_url: "http://127.0.0.1".to_string(),
            data_dir: PathBuf::from("data"),
            guard_interval_ms: DEFAULT_GUARD_INTERVAL_MS,
            print_component_tree: false,
        }
    }
}

/// State shared across connections
pub struct AppState {
    /// Component trees built once per run, keyed by scene id.
    pub trees: RwLock<HashMap<u64, Value>>,
    pub sync: CameraSync,
    pub runner: AnimationRunner,
    next_connection_id: AtomicU64,
}

impl AppState {
    pub fn new(trees: HashMap<u64, Value>, sync: CameraSync, runner: AnimationRunner) -> Self {
        Self {
            trees: RwLock::new(trees),
            sync,
            runner,
            next_connection_id: AtomicU64::new(0),
        }
    }
}

/// Create the router for the scene server
pub fn create_router(state: Arc<AppState>, data_dir: &FsPath) -> Router {
    Router::new()
        .route("/component-tree/:scene_id", get(component_tree_handler))
        .route("/camera/:scene_id", get(camera_handler))
        .route("/ws", get(ws_handler))
        // Converted clouds, written geometry, and linked images.
        .nest_service("/data", ServeDir::new(data_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn component_tree_handler(
    Path(scene_id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let tree = state.trees.read().get(&scene_id).cloned();
    match tree {
        Some(tree) => (StatusCode::OK, Json(tree)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            StreamError::SceneNotFound(scene_id).to_string(),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct CameraQuery {
    since: Option<i64>,
}

/// Polling fallback for clients without a live socket: the current state
/// only if it is newer than `since`, else an explicit no-update marker.
async fn camera_handler(
    Path(scene_id): Path<u64>,
    Query(query): Query<CameraQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let since = query.since.unwrap_or(i64::MIN);
    match state.sync.current_since(scene_id, since) {
        Some(camera) => Json(json!({
            "type": "cameraState",
            "sceneId": scene_id,
            "state": camera,
        })),
        None => Json(json!({ "type": "noUpdate" })),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = state.next_connection_id.fetch_add(1, Ordering::Relaxed);
    tracing::info!("client {} connected", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.sync.subscribe();
    // Messages addressed to this client only (animation frames, errors, pongs).
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMessage>(32);

    loop {
        tokio::select! {
            update = updates.recv() => {
                let update = match update {
                    Ok(update) => update,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("client {} lagged by {} camera updates", connection_id, n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(message) = camera_update_message(update, connection_id) else {
                    continue;
                };
                if sender.send(Message::Text(serialize_server(&message))).await.is_err() {
                    break;
                }
            }

            direct = direct_rx.recv() => {
                // The runner holds a clone of direct_tx, so this only ends
                // with the connection.
                let Some(message) = direct else { break };
                if sender.send(Message::Text(serialize_server(&message))).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("client {} socket error: {}", connection_id, e);
                        break;
                    }
                    _ => continue,
                };
                match parse_client(&text) {
                    Ok(message) => {
                        handle_client_message(message, connection_id, &state, &direct_tx);
                    }
                    Err(e) => {
                        let _ = direct_tx.try_send(ServerMessage::Error {
                            message: format!("malformed message: {}", e),
                        });
                    }
                }
            }
        }
    }

    tracing::info!("client {} disconnected", connection_id);
}

/// Turn an accepted camera update into the message for one connection,
/// or nothing when the update would loop back to its sender.
fn camera_update_message(update: CameraUpdate, connection_id: u64) -> Option<ServerMessage> {
    if update.is_echo(connection_id) {
        return None;
    }
    Some(ServerMessage::CameraSync {
        scene_id: update.scene_id,
        state: update.state,
    })
}

fn handle_client_message(
    message: ClientMessage,
    connection_id: u64,
    state: &Arc<AppState>,
    direct_tx: &mpsc::Sender<ServerMessage>,
) {
    match message {
        ClientMessage::CameraSync {
            scene_id,
            state: camera,
        } => {
            // Stale updates are silent no-ops by contract.
            if state.sync.submit(connection_id, scene_id, camera) {
                tracing::debug!("client {} moved scene {} camera", connection_id, scene_id);
            }
        }

        ClientMessage::StartAnimation {
            scene_id,
            animation_name,
        } => match state.runner.start(&animation_name, direct_tx.clone()) {
            Ok(true) => {
                tracing::info!(
                    "client {} started animation {:?} on scene {}",
                    connection_id,
                    animation_name,
                    scene_id
                );
            }
            Ok(false) => {
                tracing::debug!(
                    "animation already in flight, dropping start of {:?}",
                    animation_name
                );
            }
            Err(e) => {
                tracing::warn!("client {}: {}", connection_id, e);
                let _ = direct_tx.try_send(ServerMessage::Error {
                    message: e.to_string(),
                });
            }
        },

        ClientMessage::StopAnimation => state.runner.stop(),

        ClientMessage::Ping { client_time } => {
            let server_time = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let _ = direct_tx.try_send(ServerMessage::Pong {
                client_time,
                server_time,
            });
        }
    }
}

/// Bind and serve until the process ends.
pub async fn run_server(config: &ServerConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let router = create_router(state, &config.data_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("scene server ready at {}:{}", config.base_url, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}
