//! Registered camera animations and their single-flight runner.
//!
//! At most one animation task is in flight per process. The Idle -> Running
//! transition is an atomic compare-and-swap, so two simultaneous start
//! requests cannot both spawn; the loser is a dropped no-op. Frames go to
//! the originating client's channel only, never the broadcast bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scenic_scene::CameraState;
use tokio::sync::mpsc;

use crate::error::{StreamError, StreamResult};
use crate::protocol::ServerMessage;

/// Pure step function: pose for step `i`, or `None` once the animation is done.
pub type FrameFn = Arc<dyn Fn(u64) -> Option<CameraState> + Send + Sync>;

#[derive(Clone)]
pub struct AnimationSpec {
    pub name: String,
    frames: FrameFn,
    pub step_delay: Duration,
    pub capture_screenshot: bool,
    pub screenshot_directory: String,
}

impl AnimationSpec {
    pub fn new(name: impl Into<String>, frames: FrameFn) -> Self {
        Self {
            name: name.into(),
            frames,
            step_delay: Duration::from_millis(80),
            capture_screenshot: false,
            screenshot_directory: String::new(),
        }
    }

    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn with_screenshots(mut self, directory: impl Into<String>) -> Self {
        self.capture_screenshot = true;
        self.screenshot_directory = directory.into();
        self
    }
}

/// Releases the Running slot on every exit path.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub struct AnimationRunner {
    animations: HashMap<String, AnimationSpec>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl AnimationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an animation ahead of serving. Re-registering a name
    /// replaces the previous spec.
    pub fn register(&mut self, spec: AnimationSpec) {
        self.animations.insert(spec.name.clone(), spec);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request the in-flight animation to stop. Best-effort: the flag is
    /// checked at the top of each step, not mid-sleep.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Start an animation, streaming frames to `frames_tx` (the
    /// originating client's channel).
    ///
    /// Returns `Ok(false)` when another animation is already in flight:
    /// the request is dropped, not queued. Unknown names fail with
    /// `AnimationNotFound` without touching the run slot.
    pub fn start(
        &self,
        name: &str,
        frames_tx: mpsc::Sender<ServerMessage>,
    ) -> StreamResult<bool> {
        let spec = self
            .animations
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::AnimationNotFound(name.to_string()))?;

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        self.stop.store(false, Ordering::Release);

        let guard = RunGuard(self.running.clone());
        let stop = self.stop.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let mut step = 0u64;
            loop {
                if stop.load(Ordering::Acquire) {
                    tracing::info!("animation {:?} stopped at step {}", spec.name, step);
                    break;
                }
                let Some(camera_state) = (spec.frames)(step) else {
                    tracing::info!("animation {:?} finished after {} steps", spec.name, step);
                    break;
                };
                let frame = ServerMessage::AnimationFrame {
                    camera_state,
                    capture_screenshot: spec.capture_screenshot,
                    screenshot_directory: spec.screenshot_directory.clone(),
                };
                if frames_tx.send(frame).await.is_err() {
                    tracing::info!("animation {:?} client went away", spec.name);
                    break;
                }
                step += 1;
                tokio::time::sleep(spec.step_delay).await;
            }
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn short_spec(name: &str, steps: u64) -> AnimationSpec {
        AnimationSpec::new(
            name,
            Arc::new(move |i| {
                (i < steps).then(|| CameraState {
                    last_update: i as i64,
                    ..CameraState::default()
                })
            }),
        )
        .with_step_delay(Duration::from_millis(5))
    }

    async fn wait_idle(runner: &AnimationRunner) {
        timeout(Duration::from_secs(2), async {
            while runner.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("runner never went idle");
    }

    #[tokio::test]
    async fn test_unknown_animation_reported() {
        let runner = AnimationRunner::new();
        let (tx, _rx) = mpsc::channel(8);
        match runner.start("missing", tx) {
            Err(StreamError::AnimationNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("expected AnimationNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_frames_delivered_then_done() {
        let mut runner = AnimationRunner::new();
        runner.register(short_spec("orbit", 3).with_screenshots("shots"));
        let (tx, mut rx) = mpsc::channel(8);
        assert!(runner.start("orbit", tx).unwrap());

        for expected in 0..3 {
            let frame = timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            match frame {
                ServerMessage::AnimationFrame {
                    camera_state,
                    capture_screenshot,
                    screenshot_directory,
                } => {
                    assert_eq!(camera_state.last_update, expected);
                    assert!(capture_screenshot);
                    assert_eq!(screenshot_directory, "shots");
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
        wait_idle(&runner).await;
    }

    #[tokio::test]
    async fn test_single_flight_drops_second_start() {
        let mut runner = AnimationRunner::new();
        runner.register(short_spec("long", 10_000));
        let (tx_a, mut rx_a) = mpsc::channel(64);
        let (tx_b, mut rx_b) = mpsc::channel(64);

        assert!(runner.start("long", tx_a).unwrap());
        // Second start while running: dropped, no frames on its channel.
        assert!(!runner.start("long", tx_b).unwrap());

        let first = timeout(Duration::from_secs(2), rx_a.recv()).await.unwrap();
        assert!(first.is_some());
        assert!(rx_b.try_recv().is_err());

        runner.stop();
        wait_idle(&runner).await;
        drop(rx_a);
    }

    #[tokio::test]
    async fn test_completion_releases_slot_for_next_start() {
        let mut runner = AnimationRunner::new();
        runner.register(short_spec("short", 2));
        let (tx, mut rx) = mpsc::channel(8);
        assert!(runner.start("short", tx).unwrap());
        while timeout(Duration::from_secs(2), rx.recv()).await.unwrap().is_some() {}
        wait_idle(&runner).await;

        let (tx2, mut rx2) = mpsc::channel(8);
        assert!(runner.start("short", tx2).unwrap());
        assert!(timeout(Duration::from_secs(2), rx2.recv())
            .await
            .unwrap()
            .is_some());
        wait_idle(&runner).await;
    }

    #[tokio::test]
    async fn test_stop_terminates_endless_animation() {
        let mut runner = AnimationRunner::new();
        // Never returns the done sentinel on its own.
        runner.register(short_spec("endless", u64::MAX));
        let (tx, mut rx) = mpsc::channel(64);
        assert!(runner.start("endless", tx).unwrap());
        assert!(timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .is_some());

        runner.stop();
        wait_idle(&runner).await;
    }
}
