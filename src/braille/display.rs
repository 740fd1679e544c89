//! Braille display state: current text, panning window, settings

use super::{BrailleCommand, BrailleDriver, BrailleTable, Dots};
use crate::{NvdaError, Result};
use log::{debug, info};

/// Largest display we accept (two 80-cell lines)
pub const MAX_CELLS: usize = 160;

/// Settings changeable at runtime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrailleSettings {
    pub cells: Option<usize>,
    /// Table name or path, see `BrailleTable::by_name`
    pub table: Option<String>,
}

/// Text shown on a braille display, one window at a time
pub struct BrailleDisplay {
    driver: Box<dyn BrailleDriver>,
    table: BrailleTable,
    cells: usize,
    connected: bool,
    text: String,
    translated: Vec<Dots>,
    /// First cell of the window, always a multiple of `cells`
    offset: usize,
}

impl BrailleDisplay {
    pub fn new(driver: Box<dyn BrailleDriver>, table: BrailleTable, cells: usize) -> Self {
        Self {
            driver,
            table,
            cells: cells.clamp(1, MAX_CELLS),
            connected: false,
            text: String::new(),
            translated: Vec::new(),
            offset: 0,
        }
    }

    /// Connect the driver; its reported size replaces the configured one
    pub fn connect(&mut self) -> Result<()> {
        self.driver.connect()?;
        if let Some(size) = self.driver.display_size().filter(|&n| n > 0 && n <= MAX_CELLS) {
            self.cells = size;
        }
        self.connected = true;
        info!("Braille display connected via {} ({} cells)", self.driver.name(), self.cells);
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            self.driver.disconnect()?;
            debug!("Braille display disconnected");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn table(&self) -> &BrailleTable {
        &self.table
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Show new text from its beginning
    ///
    /// Returns false when nothing was shown (not connected, empty text).
    pub fn show_text(&mut self, text: &str) -> Result<bool> {
        if !self.connected || text.is_empty() {
            return Ok(false);
        }
        self.text = text.to_string();
        self.translated = self.table.translate(text);
        self.offset = 0;
        self.refresh()?;
        Ok(true)
    }

    /// The window currently shown, exactly `cells` long
    pub fn window(&self) -> Vec<Dots> {
        let mut window: Vec<Dots> = self
            .translated
            .iter()
            .skip(self.offset)
            .take(self.cells)
            .copied()
            .collect();
        window.resize(self.cells, 0);
        window
    }

    /// Run a named command (`clear`, `scroll_left`, ...); unknown names give false
    pub fn execute_command(&mut self, name: &str) -> Result<bool> {
        match name.parse::<BrailleCommand>() {
            Ok(cmd) => self.apply(cmd),
            Err(e) => {
                debug!("{}", e);
                Ok(false)
            }
        }
    }

    /// Apply a display command; routing keys are left to the caller
    pub fn apply(&mut self, cmd: BrailleCommand) -> Result<bool> {
        if !self.connected {
            return Ok(false);
        }
        match cmd {
            BrailleCommand::Clear => {
                self.text.clear();
                self.translated.clear();
                self.offset = 0;
            }
            BrailleCommand::ScrollLeft => {
                self.offset = self.offset.saturating_sub(self.cells);
            }
            BrailleCommand::ScrollRight => {
                if self.offset + self.cells < self.translated.len() {
                    self.offset += self.cells;
                }
            }
            BrailleCommand::Home => self.offset = 0,
            BrailleCommand::End => self.offset = self.last_window_start(),
            BrailleCommand::Route(_) => return Ok(false),
        }
        self.refresh()?;
        Ok(true)
    }

    /// Change the cell count or table; the current text is re-rendered
    pub fn configure(&mut self, settings: &BrailleSettings) -> Result<bool> {
        if let Some(cells) = settings.cells {
            if cells == 0 || cells > MAX_CELLS {
                return Err(NvdaError::Braille(format!(
                    "Cell count {} outside 1-{}",
                    cells, MAX_CELLS
                )));
            }
            self.cells = cells;
        }
        if let Some(name) = &settings.table {
            self.table = BrailleTable::by_name(name)?;
            debug!("Braille table set to {}", self.table.name());
        }
        self.translated = self.table.translate(&self.text);
        self.offset = 0;
        if self.connected {
            self.refresh()?;
        }
        Ok(true)
    }

    /// Cell index into the translated text under a routing key
    pub fn route_to_position(&self, cell: u16) -> Option<usize> {
        let cell = cell as usize;
        let pos = self.offset + cell;
        (cell < self.cells && pos < self.translated.len()).then_some(pos)
    }

    fn last_window_start(&self) -> usize {
        match self.translated.len() {
            0 => 0,
            len => (len - 1) / self.cells * self.cells,
        }
    }

    fn refresh(&mut self) -> Result<()> {
        let window = self.window();
        self.driver.write_cells(&window)
    }
}

impl Drop for BrailleDisplay {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Driver recording every window written
    struct RecordingDriver {
        written: Arc<Mutex<Vec<Vec<Dots>>>>,
        size: Option<usize>,
    }

    impl BrailleDriver for RecordingDriver {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }
        fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }
        fn display_size(&self) -> Option<usize> {
            self.size
        }
        fn write_cells(&mut self, cells: &[Dots]) -> Result<()> {
            self.written.lock().unwrap().push(cells.to_vec());
            Ok(())
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn display(size: Option<usize>) -> (BrailleDisplay, Arc<Mutex<Vec<Vec<Dots>>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let driver = RecordingDriver { written: written.clone(), size };
        (BrailleDisplay::new(Box::new(driver), BrailleTable::builtin(), 40), written)
    }

    #[test]
    fn test_not_connected() {
        let (mut d, written) = display(None);
        assert!(!d.show_text("test").unwrap());
        assert!(!d.execute_command("home").unwrap());
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_show_and_pan() {
        let (mut d, written) = display(None);
        d.connect().unwrap();
        assert!(!d.show_text("").unwrap());
        assert!(d.show_text(&"a".repeat(50)).unwrap());
        assert_eq!(d.window().len(), 40);
        assert_eq!(written.lock().unwrap().last().map(|w| w.len()), Some(40));

        assert!(d.execute_command("scroll_right").unwrap());
        assert_eq!(d.offset(), 40);
        assert_eq!(d.window().iter().filter(|&&c| c != 0).count(), 10);
        // Already on the last window
        assert!(d.execute_command("scroll_right").unwrap());
        assert_eq!(d.offset(), 40);
        assert!(d.execute_command("home").unwrap());
        assert_eq!(d.offset(), 0);
        assert!(d.execute_command("end").unwrap());
        assert_eq!(d.offset(), 40);
        assert!(d.execute_command("clear").unwrap());
        assert_eq!(d.window(), vec![0; 40]);
        assert!(!d.execute_command("commande_invalide").unwrap());
    }

    #[test]
    fn test_driver_size_wins() {
        let (mut d, _) = display(Some(20));
        d.connect().unwrap();
        assert_eq!(d.cells(), 20);
    }

    #[test]
    fn test_configure() {
        let (mut d, written) = display(None);
        d.connect().unwrap();
        d.show_text("abc").unwrap();
        let settings = BrailleSettings { cells: Some(20), table: Some("fr".to_string()) };
        assert!(d.configure(&settings).unwrap());
        assert_eq!(d.cells(), 20);
        assert_eq!(written.lock().unwrap().last().map(|w| w.len()), Some(20));
        assert!(d.configure(&BrailleSettings { cells: Some(0), table: None }).is_err());
    }

    #[test]
    fn test_routing() {
        let (mut d, _) = display(None);
        d.connect().unwrap();
        d.show_text("hello").unwrap();
        assert_eq!(d.route_to_position(4), Some(4));
        assert_eq!(d.route_to_position(5), None);
    }
}
