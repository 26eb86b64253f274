pub mod animation;
pub mod app;
pub mod error;
pub mod protocol;
pub mod server;
pub mod sync;

pub use animation::{AnimationRunner, AnimationSpec};
pub use app::SceneApp;
pub use error::{StreamError, StreamResult};
pub use server::ServerConfig;
pub use sync::CameraSync;
