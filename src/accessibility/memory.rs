//! In-memory accessibility provider
//!
//! Serves a desktop tree loaded from JSON or built in code. Used when no
//! accessibility bus is available and by the test suite.

use super::{AccessibilityProvider, AccessibleNode, ApplicationInfo, Role, StateSet};
use crate::{NvdaError, Result};
use log::{debug, info};
use std::fs;
use std::path::Path;

/// Provider backed by a desktop snapshot
pub struct MemoryProvider {
    desktop: AccessibleNode,
    initialized: bool,
    /// (node id, action) pairs performed so far
    performed: Vec<(String, String)>,
}

impl MemoryProvider {
    /// Wrap a desktop tree
    ///
    /// A root that is not a desktop is placed under an empty one.
    pub fn new(root: AccessibleNode) -> Self {
        let desktop = if root.role == Role::Desktop {
            root
        } else {
            AccessibleNode::new("desktop", Role::Desktop, "main").with_child(root)
        };
        Self {
            desktop,
            initialized: false,
            performed: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(AccessibleNode::new("desktop", Role::Desktop, "main"))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let root: AccessibleNode = serde_json::from_str(json)?;
        Ok(Self::new(root))
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading accessibility snapshot from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn desktop(&self) -> &AccessibleNode {
        &self.desktop
    }

    /// Replace a running application, or add it
    pub fn upsert_application(&mut self, app: AccessibleNode) {
        match self.desktop.children.iter_mut().find(|c| c.id == app.id) {
            Some(existing) => *existing = app,
            None => self.desktop.children.push(app),
        }
    }

    /// Move keyboard focus to the node with this id
    pub fn set_focus(&mut self, id: &str) -> Result<()> {
        if self.desktop.find_by_id(id).is_none() {
            return Err(NvdaError::Accessibility(format!("No node with id {}", id)));
        }
        clear_focus(&mut self.desktop);
        if let Some(node) = self.desktop.find_by_id_mut(id) {
            node.states.insert(StateSet::FOCUSED);
        }
        Ok(())
    }

    pub fn performed_actions(&self) -> &[(String, String)] {
        &self.performed
    }

    /// Desktop child holding the focused node
    fn focused_app_node(&self) -> Option<&AccessibleNode> {
        let focused = self.desktop.find_focused()?;
        let path = self.desktop.path_to(&focused.id)?;
        path.into_iter().find(|n| n.role == Role::Application)
    }
}

fn clear_focus(node: &mut AccessibleNode) {
    node.states.remove(StateSet::FOCUSED);
    for child in &mut node.children {
        clear_focus(child);
    }
}

/// Deepest visible node under the point; nodes without bounds are containers
fn hit_test(node: &AccessibleNode, x: i32, y: i32) -> Option<&AccessibleNode> {
    if let Some(bounds) = node.bounds {
        if !node.is_visible() || !bounds.contains(x, y) {
            return None;
        }
    }
    let deeper = node.children.iter().rev().find_map(|c| hit_test(c, x, y));
    match deeper {
        Some(found) => Some(found),
        None if node.bounds.is_some() => Some(node),
        None => None,
    }
}

impl AccessibilityProvider for MemoryProvider {
    fn initialize(&mut self) -> Result<()> {
        info!(
            "Memory accessibility provider ready with {} applications",
            self.desktop.children.len()
        );
        self.initialized = true;
        Ok(())
    }

    fn focused_node(&mut self) -> Result<Option<AccessibleNode>> {
        Ok(self.desktop.find_focused().cloned())
    }

    fn focused_application(&mut self) -> Result<Option<ApplicationInfo>> {
        Ok(self.focused_app_node().map(ApplicationInfo::from_node))
    }

    fn node_at_point(&mut self, x: i32, y: i32) -> Result<Option<AccessibleNode>> {
        Ok(hit_test(&self.desktop, x, y).cloned())
    }

    fn applications(&mut self) -> Result<Vec<ApplicationInfo>> {
        Ok(self
            .desktop
            .children
            .iter()
            .filter(|c| c.role == Role::Application)
            .map(ApplicationInfo::from_node)
            .collect())
    }

    fn perform_action(&mut self, node_id: &str, action: &str) -> Result<()> {
        let node = self
            .desktop
            .find_by_id(node_id)
            .ok_or_else(|| NvdaError::Accessibility(format!("No node with id {}", node_id)))?;

        if !node.actions.iter().any(|a| a == action) {
            return Err(NvdaError::Accessibility(format!(
                "{} has no action '{}'",
                node.name, action
            )));
        }

        debug!("Performing {} on {}", action, node_id);
        self.performed.push((node_id.to_string(), action.to_string()));
        Ok(())
    }

    fn window_title(&mut self) -> Result<Option<String>> {
        let Some(focused) = self.desktop.find_focused() else {
            return Ok(None);
        };
        Ok(self.desktop.path_to(&focused.id).and_then(|path| {
            path.into_iter()
                .filter(|n| n.role.is_window())
                .last()
                .map(|n| n.name.clone())
        }))
    }

    fn shutdown(&mut self) -> Result<()> {
        self.initialized = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
