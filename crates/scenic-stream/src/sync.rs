//! Per-scene camera state arbitration and fan-out.
//!
//! Last-update-wins with a guard interval: an incoming pose replaces the
//! stored one only if its logical timestamp exceeds the stored timestamp
//! by more than `guard_ms`. The guard absorbs bursts from a dragging
//! client and keeps a client's own echoed update from being re-accepted
//! as newer. Stale updates are silent no-ops.

use std::collections::HashMap;

use parking_lot::RwLock;
use scenic_scene::CameraState;
use tokio::sync::broadcast;

pub const DEFAULT_GUARD_INTERVAL_MS: i64 = 30;

/// Accepted camera update, tagged with the connection that sent it.
#[derive(Clone, Debug)]
pub struct CameraUpdate {
    pub origin: u64,
    pub scene_id: u64,
    pub state: CameraState,
}

impl CameraUpdate {
    /// True when this update would loop back to the connection it came
    /// from; the sender already holds the authoritative state.
    pub fn is_echo(&self, connection_id: u64) -> bool {
        self.origin == connection_id
    }
}

pub struct CameraSync {
    states: RwLock<HashMap<u64, CameraState>>,
    guard_ms: i64,
    update_tx: broadcast::Sender<CameraUpdate>,
}

impl CameraSync {
    pub fn new(guard_ms: i64) -> Self {
        let (update_tx, _) = broadcast::channel(64);
        Self {
            states: RwLock::new(HashMap::new()),
            guard_ms,
            update_tx,
        }
    }

    /// Subscribe to accepted updates across all scenes.
    pub fn subscribe(&self) -> broadcast::Receiver<CameraUpdate> {
        self.update_tx.subscribe()
    }

    /// Current state for a scene, if any client has published one.
    pub fn current(&self, scene_id: u64) -> Option<CameraState> {
        self.states.read().get(&scene_id).cloned()
    }

    /// Current state only if it is newer than `since`; used by the
    /// polling endpoint.
    pub fn current_since(&self, scene_id: u64, since: i64) -> Option<CameraState> {
        self.states
            .read()
            .get(&scene_id)
            .filter(|state| state.last_update > since)
            .cloned()
    }

    /// Arbitrate one update. The first state for a scene is stored
    /// unconditionally; afterwards only updates beyond the guard interval
    /// replace it. Returns whether the update was accepted (and fanned out
    /// to the other connections).
    pub fn submit(&self, origin: u64, scene_id: u64, state: CameraState) -> bool {
        let mut states = self.states.write();
        if let Some(current) = states.get(&scene_id) {
            if state.last_update <= current.last_update + self.guard_ms {
                return false;
            }
        }
        states.insert(scene_id, state.clone());
        // Broadcast while still holding the lock so the fan-out order
        // matches the acceptance order; a send after releasing could
        // deliver a stale pose after a newer one.
        let _ = self.update_tx.send(CameraUpdate {
            origin,
            scene_id,
            state,
        });
        true
    }
}
