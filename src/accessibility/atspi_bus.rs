//! Live AT-SPI2 provider
//!
//! The `atspi` crate is async-only. The provider owns a single-threaded
//! tokio runtime and blocks on each bus call, so callers stay synchronous.
//! Node ids are `<bus name>|<object path>`.

use super::{AccessibilityProvider, AccessibleNode, ApplicationInfo, Bounds, Role, StateSet};
use crate::{NvdaError, Result};
use atspi::connection::AccessibilityConnection;
use atspi::proxy::accessible::AccessibleProxy;
use atspi::proxy::action::ActionProxy;
use atspi::proxy::component::ComponentProxy;
use atspi::proxy::text::TextProxy;
use atspi::{CoordType, State};
use log::{debug, info, warn};
use std::fmt::Display;
use tokio::runtime::{Builder, Runtime};

/// Well-known name and root object of the AT-SPI registry
const REGISTRY_BUS: &str = "org.a11y.atspi.Registry";
const REGISTRY_ROOT: &str = "/org/a11y/atspi/accessible/root";

/// Path AT-SPI uses for "no object"
const NULL_PATH: &str = "/org/a11y/atspi/null";

/// How deep the focus search descends below an application
const MAX_DEPTH: usize = 16;

/// Children examined per node during the focus search
const MAX_CHILDREN: usize = 256;

fn bus_err(e: impl Display) -> NvdaError {
    NvdaError::Accessibility(format!("AT-SPI: {}", e))
}

fn split_id(id: &str) -> Result<(&str, &str)> {
    id.split_once('|')
        .ok_or_else(|| NvdaError::Accessibility(format!("Malformed node id {}", id)))
}

fn map_states(set: &atspi::StateSet) -> StateSet {
    let pairs = [
        (State::Focused, StateSet::FOCUSED),
        (State::Focusable, StateSet::FOCUSABLE),
        (State::Visible, StateSet::VISIBLE),
        (State::Showing, StateSet::SHOWING),
        (State::Enabled, StateSet::ENABLED),
        (State::Sensitive, StateSet::SENSITIVE),
        (State::Checked, StateSet::CHECKED),
        (State::Selected, StateSet::SELECTED),
        (State::Expandable, StateSet::EXPANDABLE),
        (State::Expanded, StateSet::EXPANDED),
        (State::Editable, StateSet::EDITABLE),
        (State::ReadOnly, StateSet::READ_ONLY),
        (State::Required, StateSet::REQUIRED),
        (State::InvalidEntry, StateSet::INVALID),
        (State::MultiLine, StateSet::MULTI_LINE),
        (State::Busy, StateSet::BUSY),
    ];
    pairs
        .into_iter()
        .filter(|(state, _)| set.contains(*state))
        .fold(StateSet::empty(), |acc, (_, flag)| acc | flag)
}

/// AT-SPI2 provider over D-Bus
pub struct AtspiProvider {
    runtime: Runtime,
    conn: Option<AccessibilityConnection>,
}

impl AtspiProvider {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NvdaError::Accessibility(format!("Failed to start runtime: {}", e)))?;
        Ok(Self {
            runtime,
            conn: None,
        })
    }

    fn conn(&self) -> Result<&AccessibilityConnection> {
        self.conn
            .as_ref()
            .ok_or_else(|| NvdaError::Accessibility("AT-SPI provider not initialized".to_string()))
    }
}

async fn accessible<'a>(
    conn: &'a AccessibilityConnection,
    bus: &'a str,
    path: &'a str,
) -> Result<AccessibleProxy<'a>> {
    AccessibleProxy::builder(conn.connection())
        .destination(bus)
        .map_err(bus_err)?
        .path(path)
        .map_err(bus_err)?
        .build()
        .await
        .map_err(bus_err)
}

async fn component<'a>(
    conn: &'a AccessibilityConnection,
    bus: &'a str,
    path: &'a str,
) -> Result<ComponentProxy<'a>> {
    ComponentProxy::builder(conn.connection())
        .destination(bus)
        .map_err(bus_err)?
        .path(path)
        .map_err(bus_err)?
        .build()
        .await
        .map_err(bus_err)
}

/// Snapshot one object, without its children
async fn snapshot(conn: &AccessibilityConnection, bus: &str, path: &str) -> Result<AccessibleNode> {
    let proxy = accessible(conn, bus, path).await?;
    let role = Role::from_atspi_name(&proxy.get_role_name().await.map_err(bus_err)?);
    let mut node = AccessibleNode::new(format!("{}|{}", bus, path), role, proxy.name().await.map_err(bus_err)?);
    node.description = proxy.description().await.unwrap_or_default();
    node.states = proxy
        .get_state()
        .await
        .map(|s| map_states(&s))
        .unwrap_or_default();
    if let Ok(attrs) = proxy.get_attributes().await {
        node.attributes = attrs.into_iter().collect();
    }

    if let Ok(comp) = component(conn, bus, path).await {
        if let Ok((x, y, w, h)) = comp.get_extents(CoordType::Screen).await {
            node.bounds = Some(Bounds::new(x, y, w, h));
        }
    }

    if node.role.is_text() {
        if let Ok(builder) = TextProxy::builder(conn.connection()).destination(bus) {
            if let Ok(builder) = builder.path(path) {
                if let Ok(text) = builder.build().await {
                    node.text = text.get_text(0, -1).await.ok();
                }
            }
        }
    }

    if let Ok(builder) = ActionProxy::builder(conn.connection()).destination(bus) {
        if let Ok(builder) = builder.path(path) {
            if let Ok(action) = builder.build().await {
                let count = action.nactions().await.unwrap_or(0);
                for i in 0..count {
                    if let Ok(name) = action.get_name(i).await {
                        node.actions.push(name);
                    }
                }
            }
        }
    }

    Ok(node)
}

/// (bus, path) of every child of an object
async fn children(conn: &AccessibilityConnection, bus: &str, path: &str) -> Result<Vec<(String, String)>> {
    let proxy = accessible(conn, bus, path).await?;
    let refs = proxy.get_children().await.map_err(bus_err)?;
    Ok(refs
        .into_iter()
        .map(|r| (r.name.as_str().to_string(), r.path.as_str().to_string()))
        .collect())
}

/// (bus, path) of the registry's application children
async fn application_refs(conn: &AccessibilityConnection) -> Result<Vec<(String, String)>> {
    let root = accessible(conn, REGISTRY_BUS, REGISTRY_ROOT).await?;
    let refs = root.get_children().await.map_err(bus_err)?;
    Ok(refs
        .into_iter()
        .map(|r| (r.name.as_str().to_string(), r.path.as_str().to_string()))
        .collect())
}

/// Depth-first search for a showing, focused object
async fn find_focused(conn: &AccessibilityConnection, bus: &str, path: &str) -> Result<Option<String>> {
    let mut stack = vec![(path.to_string(), 0usize)];
    while let Some((current, depth)) = stack.pop() {
        let proxy = accessible(conn, bus, &current).await?;
        let states = proxy.get_state().await.map_err(bus_err)?;
        if states.contains(State::Focused) {
            return Ok(Some(current));
        }
        if depth > 0 && !states.contains(State::Showing) {
            continue;
        }
        if depth < MAX_DEPTH {
            let kids = children(conn, bus, &current).await.unwrap_or_default();
            for (_, child) in kids.into_iter().take(MAX_CHILDREN).rev() {
                stack.push((child, depth + 1));
            }
        }
    }
    Ok(None)
}

async fn focused_in_apps(conn: &AccessibilityConnection) -> Result<Option<(String, String, String)>> {
    for (bus, app_path) in application_refs(conn).await? {
        match find_focused(conn, &bus, &app_path).await {
            Ok(Some(path)) => return Ok(Some((bus, app_path, path))),
            Ok(None) => {}
            Err(e) => debug!("Skipping {}: {}", bus, e),
        }
    }
    Ok(None)
}

async fn app_info(conn: &AccessibilityConnection, bus: &str, path: &str) -> Result<ApplicationInfo> {
    let node = snapshot(conn, bus, path).await?;
    let mut info = ApplicationInfo::from_node(&node);
    if info.pid.is_none() {
        if let Ok(dbus) = zbus::fdo::DBusProxy::new(conn.connection()).await {
            if let Ok(name) = zbus::names::BusName::try_from(bus) {
                info.pid = dbus.get_connection_unix_process_id(name).await.ok();
            }
        }
    }
    Ok(info)
}

impl AccessibilityProvider for AtspiProvider {
    fn initialize(&mut self) -> Result<()> {
        let conn = self
            .runtime
            .block_on(AccessibilityConnection::new())
            .map_err(bus_err)?;
        info!("Connected to the AT-SPI registry");
        self.conn = Some(conn);
        Ok(())
    }

    fn focused_node(&mut self) -> Result<Option<AccessibleNode>> {
        let conn = self.conn()?;
        self.runtime.block_on(async {
            match focused_in_apps(conn).await? {
                Some((bus, _, path)) => snapshot(conn, &bus, &path).await.map(Some),
                None => Ok(None),
            }
        })
    }

    fn focused_application(&mut self) -> Result<Option<ApplicationInfo>> {
        let conn = self.conn()?;
        self.runtime.block_on(async {
            match focused_in_apps(conn).await? {
                Some((bus, app_path, _)) => app_info(conn, &bus, &app_path).await.map(Some),
                None => Ok(None),
            }
        })
    }

    fn node_at_point(&mut self, x: i32, y: i32) -> Result<Option<AccessibleNode>> {
        let conn = self.conn()?;
        self.runtime.block_on(async {
            for (bus, app_path) in application_refs(conn).await? {
                for (_, window) in children(conn, &bus, &app_path).await.unwrap_or_default() {
                    let mut current = window;
                    let Ok(comp) = component(conn, &bus, &current).await else {
                        continue;
                    };
                    if !comp.contains(x, y, CoordType::Screen).await.unwrap_or(false) {
                        continue;
                    }
                    loop {
                        let comp = component(conn, &bus, &current).await?;
                        let hit = comp
                            .get_accessible_at_point(x, y, CoordType::Screen)
                            .await
                            .map_err(bus_err)?;
                        let next = hit.path.as_str().to_string();
                        if next == NULL_PATH || next == current {
                            break;
                        }
                        current = next;
                    }
                    return snapshot(conn, &bus, &current).await.map(Some);
                }
            }
            Ok(None)
        })
    }

    fn applications(&mut self) -> Result<Vec<ApplicationInfo>> {
        let conn = self.conn()?;
        self.runtime.block_on(async {
            let mut apps = Vec::new();
            for (bus, path) in application_refs(conn).await? {
                match app_info(conn, &bus, &path).await {
                    Ok(info) => apps.push(info),
                    Err(e) => warn!("Skipping application {}: {}", bus, e),
                }
            }
            Ok(apps)
        })
    }

    fn perform_action(&mut self, node_id: &str, action: &str) -> Result<()> {
        let (bus, path) = split_id(node_id)?;
        let conn = self.conn()?;
        self.runtime.block_on(async {
            let proxy = ActionProxy::builder(conn.connection())
                .destination(bus)
                .map_err(bus_err)?
                .path(path)
                .map_err(bus_err)?
                .build()
                .await
                .map_err(bus_err)?;
            let count = proxy.nactions().await.map_err(bus_err)?;
            for i in 0..count {
                if proxy.get_name(i).await.map_err(bus_err)? == action {
                    return match proxy.do_action(i).await.map_err(bus_err)? {
                        true => Ok(()),
                        false => Err(NvdaError::Accessibility(format!("Action '{}' failed", action))),
                    };
                }
            }
            Err(NvdaError::Accessibility(format!("No action '{}' on {}", action, node_id)))
        })
    }

    fn window_title(&mut self) -> Result<Option<String>> {
        let conn = self.conn()?;
        self.runtime.block_on(async {
            let Some((bus, app_path, _)) = focused_in_apps(conn).await? else {
                return Ok(None);
            };
            for (_, window) in children(conn, &bus, &app_path).await? {
                let proxy = accessible(conn, &bus, &window).await?;
                let states = proxy.get_state().await.map_err(bus_err)?;
                if states.contains(State::Active) || states.contains(State::Showing) {
                    return Ok(Some(proxy.name().await.map_err(bus_err)?));
                }
            }
            Ok(None)
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.conn.take().is_some() {
            debug!("Dropped AT-SPI connection");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "atspi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_id() {
        assert_eq!(
            split_id(":1.42|/org/a11y/atspi/accessible/7").unwrap(),
            (":1.42", "/org/a11y/atspi/accessible/7")
        );
        assert!(split_id("no-separator").is_err());
    }

    #[test]
    fn test_map_states() {
        let set = atspi::StateSet::new(State::Focused | State::Showing | State::Checked);
        let mapped = map_states(&set);
        assert!(mapped.contains(StateSet::FOCUSED | StateSet::SHOWING | StateSet::CHECKED));
        assert!(!mapped.contains(StateSet::EDITABLE));
    }

    #[test]
    fn test_calls_before_initialize_fail() {
        let mut provider = AtspiProvider::new().unwrap();
        assert_eq!(provider.name(), "atspi");
        assert!(provider.focused_node().is_err());
        assert!(provider.perform_action("bad id", "click").is_err());
        assert!(provider.shutdown().is_ok());
    }
}
