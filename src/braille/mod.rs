//! Braille output
//!
//! Text is translated cell by cell through a `BrailleTable` and shown on a
//! display reached through a `BrailleDriver` (BrlAPI, i.e. BRLTTY).

pub mod brlapi;
pub mod display;
pub mod table;

pub use brlapi::BrlapiDriver;
pub use display::{BrailleDisplay, BrailleSettings};
pub use table::BrailleTable;

use crate::state::config::Config;
use crate::{NvdaError, Result};
use std::str::FromStr;

/// One braille cell; dot n is bit n-1
pub type Dots = u8;

/// Parse a dot list such as "1256"; "0" or "" is the blank cell
pub fn dots_from_str(s: &str) -> Result<Dots> {
    let mut dots = 0u8;
    for ch in s.chars() {
        match ch.to_digit(10) {
            Some(0) if s.len() == 1 => return Ok(0),
            Some(n @ 1..=8) => dots |= 1 << (n - 1),
            _ => return Err(NvdaError::Braille(format!("Invalid dot pattern: {}", s))),
        }
    }
    Ok(dots)
}

/// Dot list for a cell, "0" when blank
pub fn dots_to_string(dots: Dots) -> String {
    if dots == 0 {
        return "0".to_string();
    }
    (0..8)
        .filter(|bit| dots & (1 << bit) != 0)
        .map(|bit| char::from(b'1' + bit))
        .collect()
}

/// Unicode braille pattern for a cell (U+2800 block)
pub fn to_unicode(dots: Dots) -> char {
    char::from_u32(0x2800 + dots as u32).unwrap_or(' ')
}

/// Render cells as Unicode braille, for logs and tests
pub fn cells_to_unicode(cells: &[Dots]) -> String {
    cells.iter().map(|&d| to_unicode(d)).collect()
}

/// Commands coming from display keys, or typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrailleCommand {
    Clear,
    ScrollLeft,
    ScrollRight,
    Home,
    End,
    /// Routing key above a cell (0-based)
    Route(u16),
}

impl FromStr for BrailleCommand {
    type Err = NvdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "clear" => Ok(BrailleCommand::Clear),
            "scroll_left" => Ok(BrailleCommand::ScrollLeft),
            "scroll_right" => Ok(BrailleCommand::ScrollRight),
            "home" => Ok(BrailleCommand::Home),
            "end" => Ok(BrailleCommand::End),
            other => Err(NvdaError::Braille(format!("Unknown braille command: {}", other))),
        }
    }
}

/// Receives commands from a display's key reader thread
pub type CommandSink = Box<dyn Fn(BrailleCommand) + Send + 'static>;

/// A braille display connection
pub trait BrailleDriver: Send {
    fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;

    /// Cells per line reported by the display, once connected
    fn display_size(&self) -> Option<usize>;

    /// Show one window of cells
    fn write_cells(&mut self, cells: &[Dots]) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Create the driver named by `braille.display`
pub fn create_driver(config: &Config, sink: Option<CommandSink>) -> Result<Box<dyn BrailleDriver>> {
    match config.braille_display().as_str() {
        "auto" | "brlapi" | "brltty" => Ok(Box::new(BrlapiDriver::from_env(sink))),
        other => Err(NvdaError::Braille(format!("Unknown braille display: {}", other))),
    }
}

/// Display configured from `[braille]`, not yet connected
pub fn create_display(config: &Config, sink: Option<CommandSink>) -> Result<BrailleDisplay> {
    let driver = create_driver(config, sink)?;
    let table = BrailleTable::by_name(&config.braille_table())?;
    Ok(BrailleDisplay::new(driver, table, config.braille_cells()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dots_parsing() {
        assert_eq!(dots_from_str("1").ok(), Some(0b1));
        assert_eq!(dots_from_str("1256").ok(), Some(0b11_0011));
        assert_eq!(dots_from_str("78").ok(), Some(0b1100_0000));
        assert_eq!(dots_from_str("0").ok(), Some(0));
        assert!(dots_from_str("19").is_err());
        assert!(dots_from_str("a").is_err());
    }

    #[test]
    fn test_dots_display() {
        assert_eq!(dots_to_string(0b11_0011), "1256");
        assert_eq!(dots_to_string(0), "0");
        assert_eq!(to_unicode(0b1), '\u{2801}');
        assert_eq!(cells_to_unicode(&[0b1, 0b11]), "\u{2801}\u{2803}");
    }

    #[test]
    fn test_command_names() {
        assert_eq!("scroll_left".parse::<BrailleCommand>().ok(), Some(BrailleCommand::ScrollLeft));
        assert!("commande_invalide".parse::<BrailleCommand>().is_err());
    }
}
