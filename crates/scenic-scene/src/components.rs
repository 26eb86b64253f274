//! Component tree assembly and wire serialization.
//!
//! The front end consumes a fixed two-column layout: a sidebar (scene
//! settings plus the grouped element tree) and the viewer. Component ids
//! are zero-based per sibling list and assigned at serialization time;
//! they are unrelated to element/group ids.

use serde_json::{json, Value};

use crate::camera::CameraState;
use crate::element::SceneElement;
use crate::error::SceneResult;
use crate::group::GroupForest;

const SIDEBAR_WIDTH: u32 = 3;
const VIEWER_WIDTH: u32 = 9;

#[derive(Debug)]
pub enum ComponentNode {
    Row {
        children: Vec<ComponentNode>,
    },
    Col {
        width: u32,
        children: Vec<ComponentNode>,
    },
    SceneSettings {
        scene_id: u64,
    },
    ElementTree {
        groups: Value,
    },
    Viewer {
        scene_id: u64,
        camera: CameraState,
        elements: Vec<Value>,
    },
}

impl ComponentNode {
    fn tag(&self) -> &'static str {
        match self {
            ComponentNode::Row { .. } => "row",
            ComponentNode::Col { .. } => "col",
            ComponentNode::SceneSettings { .. } => "scene_settings",
            ComponentNode::ElementTree { .. } => "element_tree",
            ComponentNode::Viewer { .. } => "viewer",
        }
    }

    /// Serialize this node as the `component_id`-th child of its parent.
    pub fn serialized(&self, component_id: usize) -> Value {
        let mut data = serde_json::Map::new();
        data.insert("id".to_string(), json!(component_id));

        let children: &[ComponentNode] = match self {
            ComponentNode::Row { children } => children.as_slice(),
            ComponentNode::Col { width, children } => {
                data.insert("width".to_string(), json!(width));
                children.as_slice()
            }
            ComponentNode::SceneSettings { scene_id } => {
                data.insert("sceneId".to_string(), json!(scene_id));
                &[]
            }
            ComponentNode::ElementTree { groups } => {
                data.insert("groups".to_string(), groups.clone());
                &[]
            }
            ComponentNode::Viewer {
                scene_id,
                camera,
                elements,
            } => {
                data.insert("sceneId".to_string(), json!(scene_id));
                data.insert("camera".to_string(), json!(camera));
                data.insert("elements".to_string(), Value::Array(elements.clone()));
                &[]
            }
        };

        json!({
            "component": self.tag(),
            "data": data,
            "children": children
                .iter()
                .enumerate()
                .map(|(index, child)| child.serialized(index))
                .collect::<Vec<_>>(),
        })
    }
}

/// Build and serialize the full layout for one scene.
///
/// Elements are serialized in ascending id order so the wire array index is
/// a stable function of the id regardless of insertion order. Every element
/// must already be resolved.
pub fn build_tree(
    scene_id: u64,
    camera: Option<&CameraState>,
    elements: &[&SceneElement],
    forest: &GroupForest,
) -> SceneResult<Value> {
    let mut ordered: Vec<&SceneElement> = elements.to_vec();
    ordered.sort_by_key(|element| element.element_id());
    let serialized = ordered
        .iter()
        .map(|element| element.serialized())
        .collect::<SceneResult<Vec<_>>>()?;

    let root = ComponentNode::Row {
        children: vec![
            ComponentNode::Col {
                width: SIDEBAR_WIDTH,
                children: vec![
                    ComponentNode::SceneSettings { scene_id },
                    ComponentNode::ElementTree {
                        groups: forest.serialized(),
                    },
                ],
            },
            ComponentNode::Col {
                width: VIEWER_WIDTH,
                children: vec![ComponentNode::Viewer {
                    scene_id,
                    camera: camera.cloned().unwrap_or_default(),
                    elements: serialized,
                }],
            },
        ],
    };

    Ok(root.serialized(0))
}
