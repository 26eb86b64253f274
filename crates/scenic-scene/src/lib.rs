pub mod camera;
pub mod components;
pub mod element;
pub mod error;
pub mod group;
pub mod ids;
pub mod resolve;

pub use camera::CameraState;
pub use components::build_tree;
pub use element::{ElementInput, ElementKind, SceneElement, TrajectoryPose};
pub use error::{SceneError, SceneResult};
pub use group::{Group, GroupForest};
pub use ids::IdAllocator;
pub use resolve::ResolveContext;
