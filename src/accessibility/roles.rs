//! Accessible roles
//!
//! AT-SPI reports roles by name ("push button", "page tab list"). They are
//! mapped onto `Role`; names we have no variant for are kept verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an accessible node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Desktop,
    Application,
    Frame,
    Window,
    Dialog,
    Button,
    ToggleButton,
    CheckBox,
    RadioButton,
    ComboBox,
    Entry,
    PasswordText,
    Text,
    Label,
    Link,
    List,
    ListItem,
    Menu,
    MenuBar,
    MenuItem,
    CheckMenuItem,
    PageTab,
    PageTabList,
    Table,
    TableCell,
    Tree,
    TreeItem,
    Slider,
    SpinButton,
    ProgressBar,
    ScrollBar,
    ToolBar,
    StatusBar,
    Heading,
    Paragraph,
    Document,
    Image,
    Separator,
    Terminal,
    Panel,
    Unknown(String),
}

impl Role {
    /// Map an AT-SPI role name
    ///
    /// Case, underscores and dashes are ignored, so `PUSH_BUTTON`,
    /// `push-button` and `push button` are the same role.
    pub fn from_atspi_name(name: &str) -> Role {
        let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "desktop frame" | "desktop" => Role::Desktop,
            "application" => Role::Application,
            "frame" => Role::Frame,
            "window" => Role::Window,
            "dialog" | "alert" | "file chooser" | "color chooser" => Role::Dialog,
            "push button" | "button" => Role::Button,
            "toggle button" => Role::ToggleButton,
            "check box" | "checkbox" => Role::CheckBox,
            "radio button" => Role::RadioButton,
            "combo box" | "combobox" => Role::ComboBox,
            "entry" | "edit" => Role::Entry,
            "password text" => Role::PasswordText,
            "text" => Role::Text,
            "label" | "static" => Role::Label,
            "link" => Role::Link,
            "list" | "list box" => Role::List,
            "list item" => Role::ListItem,
            "menu" => Role::Menu,
            "menu bar" => Role::MenuBar,
            "menu item" => Role::MenuItem,
            "check menu item" => Role::CheckMenuItem,
            "page tab" => Role::PageTab,
            "page tab list" => Role::PageTabList,
            "table" | "tree table" => Role::Table,
            "table cell" => Role::TableCell,
            "tree" => Role::Tree,
            "tree item" => Role::TreeItem,
            "slider" => Role::Slider,
            "spin button" => Role::SpinButton,
            "progress bar" => Role::ProgressBar,
            "scroll bar" => Role::ScrollBar,
            "tool bar" | "toolbar" => Role::ToolBar,
            "status bar" | "statusbar" => Role::StatusBar,
            "heading" => Role::Heading,
            "paragraph" => Role::Paragraph,
            "document frame" | "document web" | "document text" | "document" => Role::Document,
            "image" | "icon" => Role::Image,
            "separator" => Role::Separator,
            "terminal" => Role::Terminal,
            "panel" | "filler" | "section" | "grouping" => Role::Panel,
            _ => Role::Unknown(normalized),
        }
    }

    /// Canonical AT-SPI name, used when serializing
    pub fn atspi_name(&self) -> &str {
        match self {
            Role::Desktop => "desktop frame",
            Role::Application => "application",
            Role::Frame => "frame",
            Role::Window => "window",
            Role::Dialog => "dialog",
            Role::Button => "push button",
            Role::ToggleButton => "toggle button",
            Role::CheckBox => "check box",
            Role::RadioButton => "radio button",
            Role::ComboBox => "combo box",
            Role::Entry => "entry",
            Role::PasswordText => "password text",
            Role::Text => "text",
            Role::Label => "label",
            Role::Link => "link",
            Role::List => "list",
            Role::ListItem => "list item",
            Role::Menu => "menu",
            Role::MenuBar => "menu bar",
            Role::MenuItem => "menu item",
            Role::CheckMenuItem => "check menu item",
            Role::PageTab => "page tab",
            Role::PageTabList => "page tab list",
            Role::Table => "table",
            Role::TableCell => "table cell",
            Role::Tree => "tree",
            Role::TreeItem => "tree item",
            Role::Slider => "slider",
            Role::SpinButton => "spin button",
            Role::ProgressBar => "progress bar",
            Role::ScrollBar => "scroll bar",
            Role::ToolBar => "tool bar",
            Role::StatusBar => "status bar",
            Role::Heading => "heading",
            Role::Paragraph => "paragraph",
            Role::Document => "document",
            Role::Image => "image",
            Role::Separator => "separator",
            Role::Terminal => "terminal",
            Role::Panel => "panel",
            Role::Unknown(name) => name,
        }
    }

    /// Phrase spoken after a node's name; empty for roles that are not announced
    pub fn spoken(&self) -> &str {
        match self {
            Role::Button => "button",
            Role::ToggleButton => "toggle button",
            Role::CheckBox => "check box",
            Role::RadioButton => "radio button",
            Role::ComboBox => "combo box",
            Role::Entry | Role::Text => "edit",
            Role::PasswordText => "password edit",
            Role::Link => "link",
            Role::List => "list",
            Role::Menu => "menu",
            Role::MenuBar => "menu bar",
            Role::MenuItem => "menu item",
            Role::CheckMenuItem => "check menu item",
            Role::PageTab => "tab",
            Role::PageTabList => "tab control",
            Role::Table => "table",
            Role::Tree => "tree view",
            Role::TreeItem => "tree view item",
            Role::Slider => "slider",
            Role::SpinButton => "spin button",
            Role::ProgressBar => "progress bar",
            Role::ScrollBar => "scroll bar",
            Role::ToolBar => "tool bar",
            Role::StatusBar => "status bar",
            Role::Heading => "heading",
            Role::Document => "document",
            Role::Image => "graphic",
            Role::Separator => "separator",
            Role::Terminal => "terminal",
            Role::Dialog => "dialog",
            Role::Frame | Role::Window => "window",
            Role::Application => "application",
            Role::Desktop
            | Role::Label
            | Role::ListItem
            | Role::TableCell
            | Role::Paragraph
            | Role::Panel
            | Role::Unknown(_) => "",
        }
    }

    /// Roles whose name is a window title
    pub fn is_window(&self) -> bool {
        matches!(self, Role::Frame | Role::Window | Role::Dialog)
    }

    /// Roles holding editable or readable text
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Role::Entry | Role::PasswordText | Role::Text | Role::Document | Role::Terminal
        )
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Role::from_atspi_name(&name)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.atspi_name().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.atspi_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_atspi_name() {
        assert_eq!(Role::from_atspi_name("push button"), Role::Button);
        assert_eq!(Role::from_atspi_name("PAGE_TAB_LIST"), Role::PageTabList);
        assert_eq!(Role::from_atspi_name("document web"), Role::Document);
        assert_eq!(
            Role::from_atspi_name("Ruler"),
            Role::Unknown("ruler".to_string())
        );
    }

    #[test]
    fn test_name_round_trip() {
        for role in [Role::Button, Role::CheckMenuItem, Role::Desktop] {
            assert_eq!(Role::from_atspi_name(role.atspi_name()), role);
        }
    }

    #[test]
    fn test_spoken() {
        assert_eq!(Role::Button.spoken(), "button");
        assert_eq!(Role::PasswordText.spoken(), "password edit");
        assert_eq!(Role::Label.spoken(), "");
    }
}
