//! Camera pose exchanged between server and clients.

use glam::DQuat;
use serde::{Deserialize, Serialize};

/// Full camera pose for one scene.
///
/// `last_update` is a logical timestamp (milliseconds in practice, but only
/// monotonicity per scene matters); it arbitrates which of two concurrent
/// updates is newer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub position: [f64; 3],
    /// Orientation quaternion (x, y, z, w).
    pub rotation: [f64; 4],
    pub fov: f64,
    pub near: f64,
    pub far: f64,
    pub last_update: i64,
}

impl CameraState {
    /// Orientation as a glam quaternion.
    pub fn orientation(&self) -> DQuat {
        DQuat::from_xyzw(
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
            self.rotation[3],
        )
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: [38.26, 34.89, 31.93],
            rotation: [0.0, 0.0, 0.0, 1.0],
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
            last_update: 0,
        }
    }
}
