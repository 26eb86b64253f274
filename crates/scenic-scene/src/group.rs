//! Hierarchical grouping of scene elements by name path.
//!
//! Groups form a forest with unique sibling names. Each name-path segment
//! either matches an existing group at its level (exact, case-sensitive)
//! or creates one; the terminal group receives the element id. Groups are
//! created lazily and never deleted during a run.

use serde::Serialize;
use serde_json::Value;

use crate::ids::IdAllocator;

/// Fallback group for elements that arrive without any path segments, so
/// an element can never lose its grouping.
pub const UNKNOWN_GROUP: &str = "Unknown";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: u64,
    pub name: String,
    pub element_ids: Vec<u64>,
    pub subgroups: Vec<Group>,
    pub visible: bool,
}

impl Group {
    fn new(group_id: u64, name: impl Into<String>) -> Self {
        Self {
            group_id,
            name: name.into(),
            element_ids: Vec::new(),
            subgroups: Vec::new(),
            visible: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct GroupForest {
    roots: Vec<Group>,
}

impl GroupForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[Group] {
        &self.roots
    }

    /// Walk `name_path` from the root, creating missing groups along the
    /// way, and add `element_id` to the terminal group. Elements with
    /// identical paths share one chain; an empty path lands in "Unknown".
    pub fn assign(&mut self, name_path: &[String], element_id: u64, ids: &IdAllocator) {
        let unknown = [UNKNOWN_GROUP.to_string()];
        let path: &[String] = if name_path.is_empty() {
            &unknown
        } else {
            name_path
        };

        let mut level = &mut self.roots;
        for (depth, segment) in path.iter().enumerate() {
            let index = match level.iter().position(|g| g.name == *segment) {
                Some(index) => index,
                None => {
                    level.push(Group::new(ids.next_group_id(), segment.clone()));
                    level.len() - 1
                }
            };
            if depth + 1 == path.len() {
                level[index].element_ids.push(element_id);
                return;
            }
            level = &mut level[index].subgroups;
        }
    }

    /// Wire form of the whole forest.
    pub fn serialized(&self) -> Value {
        serde_json::to_value(&self.roots).unwrap_or(Value::Array(Vec::new()))
    }
}
