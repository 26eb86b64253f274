//! Wire protocol between browser clients and the scene server.

use scenic_scene::CameraState;
use serde::{Deserialize, Serialize};

/// Message from a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Publish a camera pose for a scene
    #[serde(rename_all = "camelCase")]
    CameraSync { scene_id: u64, state: CameraState },

    /// Start a registered animation; frames stream back to this client only
    #[serde(rename_all = "camelCase")]
    StartAnimation {
        scene_id: u64,
        animation_name: String,
    },

    /// Stop the in-flight animation (best-effort, checked between steps)
    StopAnimation,

    /// Ping for keepalive / latency measurement
    #[serde(rename_all = "camelCase")]
    Ping { client_time: u64 },
}

/// Message to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Camera pose accepted from another client on the same scene
    #[serde(rename_all = "camelCase")]
    CameraSync { scene_id: u64, state: CameraState },

    /// One animation step, delivered to the originating client only
    #[serde(rename_all = "camelCase")]
    AnimationFrame {
        camera_state: CameraState,
        capture_screenshot: bool,
        screenshot_directory: String,
    },

    /// Pong response
    #[serde(rename_all = "camelCase")]
    Pong { client_time: u64, server_time: u64 },

    /// Structured error report; never fatal to the connection
    Error { message: String },
}

/// Parse a client message from JSON
pub fn parse_client(json: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(json)
}

/// Serialize a server message to JSON
pub fn serialize_server(message: &ServerMessage) -> String {
    serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
}
