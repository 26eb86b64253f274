//! Scene element variants and their resolution to servable sources.
//!
//! An element carries raw constructor input until `resolve` runs; only a
//! resolved element can be serialized into the component tree. The variant
//! set is closed: adding one is a compile-checked exhaustiveness change.

use std::collections::BTreeMap;
use std::path::PathBuf;

use glam::DQuat;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{SceneError, SceneResult};
use crate::ids::IdAllocator;
use crate::resolve::ResolveContext;

/// One camera pose along a trajectory, with an optional linked image.
#[derive(Clone, Debug)]
pub struct TrajectoryPose {
    pub translation: [f64; 3],
    /// Quaternion (x, y, z, w); normalized during resolution.
    pub rotation: [f64; 4],
    /// Image path relative to the served data root.
    pub image: Option<String>,
}

/// Raw input supplied at construction, before resolution.
#[derive(Clone, Debug)]
pub enum ElementInput {
    /// Filesystem path to point geometry.
    Path(PathBuf),
    /// In-memory point geometry.
    Points(Vec<[f32; 3]>),
    /// Line segments, each a pair of 3D endpoints.
    Segments(Vec<[[f32; 3]; 2]>),
    /// Camera frustum corners plus per-camera poses.
    Trajectory {
        corners: Vec<[f32; 3]>,
        poses: Vec<TrajectoryPose>,
    },
}

impl ElementInput {
    fn shape(&self) -> &'static str {
        match self {
            ElementInput::Path(_) => "path",
            ElementInput::Points(_) => "points",
            ElementInput::Segments(_) => "segments",
            ElementInput::Trajectory { .. } => "trajectory",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// Point cloud converted to a streaming layout by an external converter.
    StreamedPointCloud,
    /// Point cloud served directly from a path or written-out geometry.
    SimplePointCloud,
    LineSet,
    CameraTrajectory,
}

impl ElementKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ElementKind::StreamedPointCloud => "streamed_point_cloud",
            ElementKind::SimplePointCloud => "simple_point_cloud",
            ElementKind::LineSet => "line_set",
            ElementKind::CameraTrajectory => "camera_trajectory",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            ElementKind::StreamedPointCloud => "Streamed Point Cloud",
            ElementKind::SimplePointCloud => "Point Cloud",
            ElementKind::LineSet => "Line Set",
            ElementKind::CameraTrajectory => "Camera Trajectory",
        }
    }
}

/// Camera pose with normalized arrays and an absolute image URL.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedPose {
    pub t: [f64; 3],
    pub r: [f64; 4],
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Final servable source, set exactly once by `resolve`.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ResolvedSource {
    Url(String),
    Segments(Vec<[[f32; 3]; 2]>),
    Trajectory {
        corners: Vec<[f32; 3]>,
        poses: Vec<ResolvedPose>,
    },
}

#[derive(Clone, Debug)]
pub struct SceneElement {
    element_id: u64,
    kind: ElementKind,
    name: String,
    group: Vec<String>,
    material: BTreeMap<String, Value>,
    transform: Option<[f64; 16]>,
    input: ElementInput,
    source: Option<ResolvedSource>,
}

impl SceneElement {
    /// Generic constructor; the typed helpers below are the usual entry point.
    pub fn new(ids: &IdAllocator, kind: ElementKind, input: ElementInput) -> Self {
        Self {
            element_id: ids.next_element_id(),
            kind,
            name: kind.default_name().to_string(),
            group: Vec::new(),
            material: BTreeMap::new(),
            transform: None,
            input,
            source: None,
        }
    }

    pub fn streamed_point_cloud(ids: &IdAllocator, path: impl Into<PathBuf>) -> Self {
        Self::new(
            ids,
            ElementKind::StreamedPointCloud,
            ElementInput::Path(path.into()),
        )
    }

    pub fn simple_point_cloud_from_path(ids: &IdAllocator, path: impl Into<PathBuf>) -> Self {
        Self::new(
            ids,
            ElementKind::SimplePointCloud,
            ElementInput::Path(path.into()),
        )
    }

    pub fn simple_point_cloud_from_points(ids: &IdAllocator, points: Vec<[f32; 3]>) -> Self {
        Self::new(ids, ElementKind::SimplePointCloud, ElementInput::Points(points))
    }

    pub fn line_set(ids: &IdAllocator, segments: Vec<[[f32; 3]; 2]>) -> Self {
        Self::new(ids, ElementKind::LineSet, ElementInput::Segments(segments))
    }

    pub fn camera_trajectory(
        ids: &IdAllocator,
        corners: Vec<[f32; 3]>,
        poses: Vec<TrajectoryPose>,
    ) -> Self {
        Self::new(
            ids,
            ElementKind::CameraTrajectory,
            ElementInput::Trajectory { corners, poses },
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_group(mut self, group: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group = group.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_material(mut self, key: impl Into<String>, value: Value) -> Self {
        self.material.insert(key.into(), value);
        self
    }

    /// Flattened 4x4 transform, row-major.
    pub fn with_transform(mut self, transform: [f64; 16]) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn element_id(&self) -> u64 {
        self.element_id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_resolved(&self) -> bool {
        self.source.is_some()
    }

    /// Group segments plus the element's own label; locates the element in
    /// the group hierarchy. Empty only if the name was explicitly cleared.
    pub fn name_path(&self) -> Vec<String> {
        let mut path = self.group.clone();
        if !self.name.is_empty() {
            path.push(self.name.clone());
        }
        path
    }

    /// Convert the raw input into the final servable source.
    ///
    /// Each call re-runs the conversion; callers invoke this once per run.
    pub fn resolve(&mut self, ctx: &ResolveContext) -> SceneResult<()> {
        let source = match (self.kind, &self.input) {
            (ElementKind::StreamedPointCloud, ElementInput::Path(path)) => {
                if !path.exists() {
                    return Err(SceneError::SourceNotFound(path.clone()));
                }
                let hash = ctx.content_hash(path)?;
                let out_dir = ctx.output_dir.join(&hash);
                if out_dir.exists() {
                    tracing::debug!("converter output for {} already present", hash);
                } else {
                    ctx.converter.convert(path, &out_dir)?;
                }
                ResolvedSource::Url(format!("{}/data/{}/", ctx.http_base(), hash))
            }
            (ElementKind::SimplePointCloud, ElementInput::Path(path)) => {
                if !path.exists() {
                    return Err(SceneError::SourceNotFound(path.clone()));
                }
                ResolvedSource::Url(path.to_string_lossy().into_owned())
            }
            (ElementKind::SimplePointCloud, ElementInput::Points(points)) => {
                let path = ctx
                    .writer
                    .write_points(points, &ctx.output_dir, self.element_id)?;
                ResolvedSource::Url(path.to_string_lossy().into_owned())
            }
            (ElementKind::LineSet, ElementInput::Segments(segments)) => {
                ResolvedSource::Segments(segments.clone())
            }
            (ElementKind::CameraTrajectory, ElementInput::Trajectory { corners, poses }) => {
                let poses = poses
                    .iter()
                    .map(|pose| ResolvedPose {
                        t: pose.translation,
                        r: normalize_rotation(pose.rotation),
                        image_url: pose.image.as_ref().map(|rel| {
                            format!("{}/{}", ctx.http_base(), rel.trim_start_matches('/'))
                        }),
                    })
                    .collect();
                ResolvedSource::Trajectory {
                    corners: corners.clone(),
                    poses,
                }
            }
            (kind, input) => {
                return Err(SceneError::UnsupportedInput {
                    kind: kind.tag(),
                    got: input.shape(),
                })
            }
        };
        self.source = Some(source);
        Ok(())
    }

    /// Wire form consumed by the viewer. Only valid after `resolve`.
    pub fn serialized(&self) -> SceneResult<Value> {
        let source = self
            .source
            .as_ref()
            .ok_or(SceneError::Unresolved(self.element_id))?;

        let mut attributes = serde_json::Map::new();
        attributes.insert("name".to_string(), json!(self.name));
        attributes.insert("material".to_string(), json!(self.material));
        if let Some(transform) = &self.transform {
            attributes.insert("transform".to_string(), json!(transform.to_vec()));
        }

        Ok(json!({
            "kind": self.kind.tag(),
            "elementId": self.element_id,
            "source": source,
            "attributes": attributes,
        }))
    }
}

/// Normalize a quaternion, falling back to identity for degenerate input.
fn normalize_rotation(rotation: [f64; 4]) -> [f64; 4] {
    let q = DQuat::from_xyzw(rotation[0], rotation[1], rotation[2], rotation[3]);
    if q.length_squared() < f64::EPSILON {
        return [0.0, 0.0, 0.0, 1.0];
    }
    let q = q.normalize();
    [q.x, q.y, q.z, q.w]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::PointCloudConverter;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_ctx(dir: &Path) -> ResolveContext {
        ResolveContext::new("http://127.0.0.1", 5000, dir)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("scenic_element_tests").join(name);
        // Fresh per run; stale converter output would skew the call counts.
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    struct RecordingConverter {
        calls: AtomicUsize,
    }

    impl PointCloudConverter for RecordingConverter {
        fn convert(&self, _input: &Path, out_dir: &Path) -> SceneResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(out_dir)?;
            Ok(())
        }
    }

    #[test]
    fn test_line_set_passthrough() {
        let ids = IdAllocator::new();
        let segments = vec![[[-10.0, -5.0, 0.0], [-10.0, 5.0, 0.0]]];
        let mut element = SceneElement::line_set(&ids, segments.clone());
        element.resolve(&test_ctx(Path::new("unused"))).unwrap();

        let json = element.serialized().unwrap();
        assert_eq!(json["kind"], "line_set");
        assert_eq!(json["elementId"], 0);
        assert_eq!(json["source"], serde_json::to_value(&segments).unwrap());
    }

    #[test]
    fn test_unsupported_input_shape() {
        let ids = IdAllocator::new();
        let mut element = SceneElement::new(
            &ids,
            ElementKind::StreamedPointCloud,
            ElementInput::Segments(vec![]),
        );
        let err = element.resolve(&test_ctx(Path::new("unused"))).unwrap_err();
        match err {
            SceneError::UnsupportedInput { kind, got } => {
                assert_eq!(kind, "streamed_point_cloud");
                assert_eq!(got, "segments");
            }
            other => panic!("expected UnsupportedInput, got {:?}", other),
        }
        assert!(!element.is_resolved());
    }

    #[test]
    fn test_missing_path_is_source_not_found() {
        let ids = IdAllocator::new();
        let mut element =
            SceneElement::streamed_point_cloud(&ids, "/definitely/not/here.ply");
        let err = element.resolve(&test_ctx(Path::new("unused"))).unwrap_err();
        assert!(matches!(err, SceneError::SourceNotFound(_)));
    }

    #[test]
    fn test_serialize_before_resolve_errors() {
        let ids = IdAllocator::new();
        let element = SceneElement::line_set(&ids, vec![]);
        assert!(matches!(
            element.serialized(),
            Err(SceneError::Unresolved(0))
        ));
    }

    #[test]
    fn test_streamed_cloud_conversion_is_content_addressed() {
        let dir = temp_dir("streamed");
        let input = dir.join("cloud.ply");
        std::fs::write(&input, b"ply points").unwrap();

        let converter = Arc::new(RecordingConverter {
            calls: AtomicUsize::new(0),
        });
        let ctx = test_ctx(&dir).with_converter(converter.clone());

        let ids = IdAllocator::new();
        let mut element = SceneElement::streamed_point_cloud(&ids, &input);
        element.resolve(&ctx).unwrap();
        let url = match element.source.as_ref().unwrap() {
            ResolvedSource::Url(url) => url.clone(),
            other => panic!("expected URL source, got {:?}", other),
        };
        assert!(url.starts_with("http://127.0.0.1:5000/data/"));
        assert!(url.ends_with('/'));

        // Second resolution of the same content reuses the converted output.
        let mut again = SceneElement::streamed_point_cloud(&ids, &input);
        again.resolve(&ctx).unwrap();
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_points_written_out() {
        let dir = temp_dir("written");
        let ids = IdAllocator::new();
        let mut element = SceneElement::simple_point_cloud_from_points(
            &ids,
            vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]],
        );
        element.resolve(&test_ctx(&dir)).unwrap();
        let json = element.serialized().unwrap();
        let path = json["source"].as_str().unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("element vertex 2"));
    }

    #[test]
    fn test_trajectory_normalizes_and_links_images() {
        let ids = IdAllocator::new();
        let mut element = SceneElement::camera_trajectory(
            &ids,
            vec![[-0.5, 0.5, 1.0], [0.5, 0.5, 1.0]],
            vec![TrajectoryPose {
                translation: [2.0, 2.0, 2.0],
                rotation: [2.0, 2.0, 2.0, 2.0],
                image: Some("data/images/frame_0.jpg".to_string()),
            }],
        );
        element.resolve(&test_ctx(Path::new("unused"))).unwrap();

        let json = element.serialized().unwrap();
        let pose = &json["source"]["poses"][0];
        assert_eq!(pose["t"], json!([2.0, 2.0, 2.0]));
        let r: Vec<f64> = serde_json::from_value(pose["r"].clone()).unwrap();
        let len: f64 = r.iter().map(|c| c * c).sum::<f64>().sqrt();
        assert!((len - 1.0).abs() < 1e-9, "rotation not normalized: {:?}", r);
        assert_eq!(
            pose["imageUrl"],
            "http://127.0.0.1:5000/data/images/frame_0.jpg"
        );
    }

    #[test]
    fn test_name_path_combines_group_and_label() {
        let ids = IdAllocator::new();
        let element = SceneElement::line_set(&ids, vec![])
            .with_name("Edges")
            .with_group(["Site A"]);
        assert_eq!(element.name_path(), vec!["Site A", "Edges"]);
    }

    #[test]
    fn test_each_kind_gets_its_display_name_by_default() {
        let ids = IdAllocator::new();
        let streamed = SceneElement::streamed_point_cloud(&ids, "cloud.las");
        let simple = SceneElement::simple_point_cloud_from_points(&ids, vec![]);
        let lines = SceneElement::line_set(&ids, vec![]);
        let trajectory = SceneElement::camera_trajectory(&ids, vec![], vec![]);

        assert_eq!(streamed.name_path(), vec!["Streamed Point Cloud"]);
        assert_eq!(simple.name_path(), vec!["Point Cloud"]);
        assert_eq!(lines.name_path(), vec!["Line Set"]);
        assert_eq!(trajectory.name_path(), vec!["Camera Trajectory"]);
    }
}
