//! Accessibility tree access
//!
//! Providers expose the desktop's accessible objects as detached
//! `AccessibleNode` snapshots. The live provider talks AT-SPI2 over D-Bus
//! (feature `atspi`); `MemoryProvider` serves a stored tree.

pub mod memory;
pub mod node;
pub mod roles;
pub mod states;

#[cfg(feature = "atspi")]
pub mod atspi_bus;

pub use memory::MemoryProvider;
pub use node::{AccessibleNode, ApplicationInfo, Bounds};
pub use roles::Role;
pub use states::StateSet;

use crate::state::config::Config;
use crate::{NvdaError, Result};

/// Source of accessibility information
pub trait AccessibilityProvider: Send {
    /// Connect to the accessibility bus
    fn initialize(&mut self) -> Result<()>;

    /// Node holding keyboard focus, if any
    fn focused_node(&mut self) -> Result<Option<AccessibleNode>>;

    /// Application owning the focused node
    fn focused_application(&mut self) -> Result<Option<ApplicationInfo>>;

    /// Deepest visible node at a screen position
    fn node_at_point(&mut self, x: i32, y: i32) -> Result<Option<AccessibleNode>>;

    /// Running applications
    fn applications(&mut self) -> Result<Vec<ApplicationInfo>>;

    /// Application by name, ignoring case
    fn find_application(&mut self, name: &str) -> Result<Option<ApplicationInfo>> {
        let wanted = name.to_lowercase();
        Ok(self
            .applications()?
            .into_iter()
            .find(|app| app.name.to_lowercase() == wanted))
    }

    /// Run a named action (e.g. "click") on a node
    fn perform_action(&mut self, node_id: &str, action: &str) -> Result<()>;

    /// Title of the window holding focus
    fn window_title(&mut self) -> Result<Option<String>>;

    /// Release the bus connection
    fn shutdown(&mut self) -> Result<()>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Create the live provider configured for this platform
pub fn create_provider(config: &Config) -> Result<Box<dyn AccessibilityProvider>> {
    if !config.platform_feature("linux", "atspi") {
        return Err(NvdaError::Accessibility(
            "AT-SPI disabled in configuration (platforms.linux.atspi)".to_string(),
        ));
    }

    #[cfg(feature = "atspi")]
    {
        Ok(Box::new(atspi_bus::AtspiProvider::new()?))
    }

    #[cfg(not(feature = "atspi"))]
    {
        Err(NvdaError::Accessibility(
            "Built without AT-SPI support (enable the `atspi` feature)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_in_config() {
        let mut config = Config::defaults();
        config.set("platforms", "linux.atspi", "false");
        let err = create_provider(&config).err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Accessibility error: AT-SPI disabled in configuration (platforms.linux.atspi)")
        );
    }
}
