//! Accessible node snapshots
//!
//! A node is a detached copy of what the accessibility bus reported at one
//! moment. Providers build them; the rest of the screen reader only reads
//! them.

use super::roles::Role;
use super::states::StateSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Screen rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One element of the accessibility tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibleNode {
    /// Provider-specific identifier, stable while the element lives
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub states: StateSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AccessibleNode>,
}

impl AccessibleNode {
    pub fn new(id: impl Into<String>, role: Role, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            name: name.into(),
            description: String::new(),
            states: StateSet::empty(),
            text: None,
            actions: Vec::new(),
            bounds: None,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_states(mut self, states: StateSet) -> Self {
        self.states = states;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_child(mut self, child: AccessibleNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_focused(&self) -> bool {
        self.states.contains(StateSet::FOCUSED)
    }

    /// Visible and actually on screen
    pub fn is_visible(&self) -> bool {
        self.states.contains(StateSet::VISIBLE | StateSet::SHOWING)
    }

    pub fn is_enabled(&self) -> bool {
        self.states.intersects(StateSet::ENABLED | StateSet::SENSITIVE)
    }

    /// Text content, empty when the node exposes none
    pub fn get_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Depth-first, pre-order traversal starting at this node
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Deepest focused node in this subtree
    pub fn find_focused(&self) -> Option<&AccessibleNode> {
        self.walk().filter(|n| n.is_focused()).last()
    }

    pub fn find_by_role(&self, role: &Role) -> Vec<&AccessibleNode> {
        self.walk().filter(|n| &n.role == role).collect()
    }

    /// First node whose name matches, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&AccessibleNode> {
        let wanted = name.to_lowercase();
        self.walk().find(|n| n.name.to_lowercase() == wanted)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&AccessibleNode> {
        self.walk().find(|n| n.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut AccessibleNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_by_id_mut(id))
    }

    /// Nodes from this one down to `id`, both included
    pub fn path_to(&self, id: &str) -> Option<Vec<&AccessibleNode>> {
        if self.id == id {
            return Some(vec![self]);
        }
        for child in &self.children {
            if let Some(mut path) = child.path_to(id) {
                path.insert(0, self);
                return Some(path);
            }
        }
        None
    }

    /// Summary used by the "status of focus" command and debug dumps
    pub fn element_info(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "role": self.role.atspi_name(),
            "description": self.description,
            "states": self.states.names(),
            "text": self.get_text(),
            "actions": self.actions,
            "children": self.children.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        })
    }
}

/// Pre-order iterator over a node tree
pub struct Walk<'a> {
    stack: Vec<&'a AccessibleNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a AccessibleNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A running application as listed on the desktop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub pid: Option<u32>,
    pub role: String,
    pub description: String,
}

impl ApplicationInfo {
    /// Describe an application node; the pid comes from its `pid` attribute
    pub fn from_node(node: &AccessibleNode) -> Self {
        Self {
            name: node.name.clone(),
            pid: node.attributes.get("pid").and_then(|p| p.parse().ok()),
            role: node.role.atspi_name().to_string(),
            description: node.description.clone(),
        }
    }
}
