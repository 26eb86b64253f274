use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use glam::DQuat;
use scenic_scene::{CameraState, SceneElement, TrajectoryPose};
use scenic_stream::{AnimationSpec, SceneApp, ServerConfig};

#[derive(Parser)]
#[command(name = "scenic")]
#[command(about = "3D scene server with live camera sync")]
struct Cli {
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Base URL clients reach this server under (no port)
    #[arg(long, default_value = "http://127.0.0.1")]
    base_url: String,

    /// Directory served under /data
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Minimum timestamp gap for a camera update to be accepted
    #[arg(long, default_value_t = 30)]
    guard_interval_ms: i64,

    /// Streamed point cloud to include in the demo scene
    #[arg(long)]
    point_cloud: Option<PathBuf>,

    /// Log the built component tree at startup
    #[arg(long, default_value_t = false)]
    print_tree: bool,
}

fn orbit_animation() -> AnimationSpec {
    AnimationSpec::new(
        "orbit",
        Arc::new(|step| {
            if step >= 240 {
                return None;
            }
            let angle = step as f64 * std::f64::consts::TAU / 240.0;
            let radius = 60.0;
            let rotation = DQuat::from_rotation_y(angle);
            Some(CameraState {
                position: [radius * angle.cos(), 25.0, radius * angle.sin()],
                rotation: [rotation.x, rotation.y, rotation.z, rotation.w],
                last_update: step as i64,
                ..CameraState::default()
            })
        }),
    )
    .with_step_delay(Duration::from_millis(80))
}

fn build_demo_scene(app: &mut SceneApp, point_cloud: Option<PathBuf>) {
    let lines = SceneElement::line_set(
        app.ids(),
        vec![
            [[-10.0, -5.0, 0.0], [-10.0, 5.0, 0.0]],
            [[-20.0, -20.0, 10.0], [10.0, 50.0, 0.0]],
        ],
    )
    .with_name("Edges")
    .with_group(["Site A"]);
    app.add_element(lines);

    let trajectory = SceneElement::camera_trajectory(
        app.ids(),
        vec![
            [-0.5, 0.5, 1.0],
            [0.5, 0.5, 1.0],
            [0.5, -0.5, 1.0],
            [-0.5, -0.5, 1.0],
        ],
        vec![TrajectoryPose {
            translation: [2.0, 2.0, 2.0],
            rotation: [0.5, 0.5, 0.5, 2.0],
            image: Some("images/frame_0.jpg".to_string()),
        }],
    )
    .with_name("Frustum 1")
    .with_group(["Site A", "Cameras"]);
    app.add_element(trajectory);

    if let Some(path) = point_cloud {
        let cloud = SceneElement::streamed_point_cloud(app.ids(), path)
            .with_name("Cloud 1")
            .with_group(["Site A"])
            .with_material("size", serde_json::json!(2));
        app.add_element(cloud);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = ServerConfig {
        port: cli.port,
        base_url: cli.base_url,
        data_dir: cli.data_dir,
        guard_interval_ms: cli.guard_interval_ms,
        print_component_tree: cli.print_tree,
    };

    let mut app = SceneApp::new(config);
    build_demo_scene(&mut app, cli.point_cloud);
    app.add_animation(orbit_animation());

    let failures = app.build(0)?;
    for (element_id, error) in &failures {
        tracing::warn!("element {} left out of the scene: {}", element_id, error);
    }

    app.serve().await
}
