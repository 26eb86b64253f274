//! Top-level scene application: collect elements, build the tree, serve.
//!
//! Lifecycle: add elements and animations, `build` each scene once (element
//! resolution + grouping + component tree), then `serve`. All state lives
//! for the server process; nothing persists across restarts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use scenic_scene::{
    build_tree, GroupForest, IdAllocator, ResolveContext, SceneElement, SceneError,
};
use serde_json::Value;

use crate::animation::{AnimationRunner, AnimationSpec};
use crate::server::{run_server, AppState, ServerConfig};
use crate::sync::CameraSync;

pub struct SceneApp {
    config: ServerConfig,
    ids: IdAllocator,
    elements: Vec<SceneElement>,
    forest: GroupForest,
    /// Element ids already placed in the forest; `build` runs once per
    /// scene and must not re-assign elements grouped by an earlier build.
    grouped: HashSet<u64>,
    runner: AnimationRunner,
    trees: HashMap<u64, Value>,
}

impl SceneApp {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            ids: IdAllocator::new(),
            elements: Vec::new(),
            forest: GroupForest::new(),
            grouped: HashSet::new(),
            runner: AnimationRunner::new(),
            trees: HashMap::new(),
        }
    }

    /// Allocator element constructors draw their ids from.
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn add_element(&mut self, element: SceneElement) {
        self.elements.push(element);
    }

    pub fn add_animation(&mut self, spec: AnimationSpec) {
        self.runner.register(spec);
    }

    /// Resolve every element, group the resolved ones, and build the
    /// component tree for `scene_id`.
    ///
    /// Elements that fail to resolve (or carry an empty name path) are
    /// excluded from the tree for this run and returned with their errors;
    /// the run never serializes a half-resolved element.
    pub fn build(&mut self, scene_id: u64) -> Result<Vec<(u64, SceneError)>, SceneError> {
        let ctx = ResolveContext::new(
            self.config.base_url.clone(),
            self.config.port,
            self.config.data_dir.clone(),
        );

        let mut failures = Vec::new();
        for element in &mut self.elements {
            if element.name_path().is_empty() {
                failures.push((element.element_id(), SceneError::EmptyNamePath));
                continue;
            }
            // Elements resolved by an earlier build keep their source.
            if element.is_resolved() {
                continue;
            }
            if let Err(e) = element.resolve(&ctx) {
                tracing::error!("element {} excluded from tree: {}", element.element_id(), e);
                failures.push((element.element_id(), e));
            }
        }

        let included: Vec<&SceneElement> = self
            .elements
            .iter()
            .filter(|element| element.is_resolved())
            .collect();
        for element in &included {
            if self.grouped.insert(element.element_id()) {
                self.forest
                    .assign(&element.name_path(), element.element_id(), &self.ids);
            }
        }

        let tree = build_tree(scene_id, None, &included, &self.forest)?;
        if self.config.print_component_tree {
            tracing::info!(
                "component tree for scene {}:\n{}",
                scene_id,
                serde_json::to_string_pretty(&tree).unwrap_or_default()
            );
        }
        self.trees.insert(scene_id, tree);
        Ok(failures)
    }

    /// Serve the built scenes until the process ends.
    pub async fn serve(self) -> anyhow::Result<()> {
        let state = Arc::new(AppState::new(
            self.trees,
            CameraSync::new(self.config.guard_interval_ms),
            self.runner,
        ));
        run_server(&self.config, state).await?;
        Ok(())
    }
}
