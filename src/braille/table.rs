//! Braille translation tables
//!
//! Uncontracted, one cell per character. The built-in table is an 8-dot
//! computer table with French accented letters.

use super::{dots_from_str, Dots};
use crate::{NvdaError, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DOT7: Dots = 1 << 6;

/// Cells written for a line break
const NEWLINE_CELLS: usize = 4;

const LETTERS: &[(char, &str)] = &[
    ('a', "1"),
    ('b', "12"),
    ('c', "14"),
    ('d', "145"),
    ('e', "15"),
    ('f', "124"),
    ('g', "1245"),
    ('h', "125"),
    ('i', "24"),
    ('j', "245"),
    ('k', "13"),
    ('l', "123"),
    ('m', "134"),
    ('n', "1345"),
    ('o', "135"),
    ('p', "1234"),
    ('q', "12345"),
    ('r', "1235"),
    ('s', "234"),
    ('t', "2345"),
    ('u', "136"),
    ('v', "1236"),
    ('w', "2456"),
    ('x', "1346"),
    ('y', "13456"),
    ('z', "1356"),
    ('é', "123456"),
    ('à', "12356"),
    ('è', "2346"),
    ('ù', "23456"),
    ('â', "16"),
    ('ê', "126"),
    ('î', "146"),
    ('ô', "1456"),
    ('û', "156"),
    ('ë', "1246"),
    ('ï', "12456"),
    ('ü', "1256"),
    ('œ', "246"),
    ('ç', "12346"),
];

/// Antoine notation, with dot 8 to tell digits from accented letters
const DIGITS: &[(char, &str)] = &[
    ('1', "168"),
    ('2', "1268"),
    ('3', "1468"),
    ('4', "14568"),
    ('5', "1568"),
    ('6', "12468"),
    ('7', "124568"),
    ('8', "12568"),
    ('9', "2468"),
    ('0', "34568"),
];

const PUNCTUATION: &[(char, &str)] = &[
    (',', "2"),
    (';', "23"),
    (':', "25"),
    ('.', "256"),
    ('?', "26"),
    ('!', "235"),
    ('"', "2356"),
    ('(', "236"),
    (')', "356"),
    ('\'', "3"),
    ('-', "36"),
    ('/', "34"),
    ('*', "35"),
    ('+', "2358"),
    ('=', "23568"),
    ('@', "345"),
    ('#', "3456"),
    ('&', "123468"),
    ('%', "3468"),
    ('$', "2348"),
    ('_', "368"),
];

/// Character to cell mapping, both ways
#[derive(Debug, Clone)]
pub struct BrailleTable {
    name: String,
    to_dots: HashMap<char, Dots>,
    to_char: HashMap<Dots, char>,
}

impl BrailleTable {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            to_dots: HashMap::new(),
            to_char: HashMap::new(),
        }
    }

    /// Add a mapping; the first character mapped to a pattern wins on reverse lookup
    pub fn insert(&mut self, ch: char, dots: Dots) {
        self.to_dots.insert(ch, dots);
        if dots != 0 {
            self.to_char.entry(dots).or_insert(ch);
        }
    }

    /// Built-in 8-dot computer table
    pub fn builtin() -> Self {
        let mut table = Self::empty("builtin");
        for &(ch, pattern) in LETTERS.iter().chain(DIGITS).chain(PUNCTUATION) {
            if let Ok(dots) = dots_from_str(pattern) {
                table.insert(ch, dots);
            }
        }
        // Capitals are their lower-case cell plus dot 7
        for &(ch, pattern) in LETTERS {
            if let (Some(upper), Ok(dots)) = (ch.to_uppercase().next(), dots_from_str(pattern)) {
                table.insert(upper, dots | DOT7);
            }
        }
        table.insert(' ', 0);
        table
    }

    /// Load a table file
    ///
    /// One mapping per line: `<char> <dots>`, e.g. `a 1`. `space` names the
    /// space character; `#` starts a comment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "custom".to_string());
        let table = Self::parse(&name, &content)?;
        debug!("Loaded braille table {} ({} entries)", name, table.len());
        Ok(table)
    }

    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let mut table = Self::empty(name);
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = || NvdaError::Braille(format!("{}: malformed line {}: {}", name, index + 1, raw));

            let mut fields = line.split_whitespace();
            let (Some(key), Some(pattern), None) = (fields.next(), fields.next(), fields.next()) else {
                return Err(malformed());
            };

            let ch = match key {
                "space" => ' ',
                _ => {
                    let mut chars = key.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => return Err(malformed()),
                    }
                }
            };
            let dots = dots_from_str(pattern).map_err(|_| malformed())?;
            table.insert(ch, dots);
        }
        Ok(table)
    }

    /// Resolve a `braille.translation_table` value
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "builtin" | "default" | "comp8" | "fr" | "fr-comp8" => Ok(Self::builtin()),
            path => Self::load(Path::new(path)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.to_dots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_dots.is_empty()
    }

    pub fn dots(&self, ch: char) -> Dots {
        self.to_dots.get(&ch).copied().unwrap_or(0)
    }

    /// Text to cells, one per character; a newline is four blank cells
    pub fn translate(&self, text: &str) -> Vec<Dots> {
        let mut cells = Vec::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '\n' => cells.extend(std::iter::repeat(0).take(NEWLINE_CELLS)),
                '\r' => {}
                _ => cells.push(self.dots(ch)),
            }
        }
        cells
    }

    /// Cells back to text; blank cells are spaces and unknown patterns `?`
    pub fn translate_reverse(&self, cells: &[Dots]) -> String {
        cells
            .iter()
            .map(|&dots| match dots {
                0 => ' ',
                _ => self.to_char.get(&dots).copied().unwrap_or('?'),
            })
            .collect()
    }
}

impl Default for BrailleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_translate() {
        let t = BrailleTable::builtin();
        assert_eq!(t.translate("abc"), vec![0b1, 0b11, 0b1001]);
        assert_eq!(t.translate("a b"), vec![0b1, 0, 0b11]);
        assert_eq!(t.translate("a\nb"), vec![0b1, 0, 0, 0, 0, 0b11]);
        assert_eq!(t.translate("A"), vec![0b100_0001]);
    }

    #[test]
    fn test_reverse() {
        let t = BrailleTable::builtin();
        assert_eq!(t.translate_reverse(&t.translate("abc")), "abc");
        assert_eq!(t.translate_reverse(&[0b1, 0, 0b11]), "a b");
        assert_eq!(t.translate_reverse(&[0b1000_0000]), "?");
    }

    #[test]
    fn test_builtin_patterns_unique() {
        let t = BrailleTable::builtin();
        let mut seen = HashSet::new();
        for (ch, dots) in &t.to_dots {
            if *ch != ' ' {
                assert!(seen.insert(*dots), "duplicate pattern for {:?}", ch);
            }
        }
        assert_eq!(t.dots('é'), 0b11_1111);
        assert_eq!(t.translate_reverse(&t.translate("Noël 2024")), "Noël 2024");
    }

    #[test]
    fn test_parse_file() {
        let t = BrailleTable::parse("mini", "# tiny\na 1\nspace 0\nb 12\n").unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.translate("ab z"), vec![0b1, 0b11, 0, 0]);

        let err = BrailleTable::parse("bad", "a 1\nb\n").err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Braille error: bad: malformed line 2: b"));
        assert!(BrailleTable::parse("bad", "ab 12\n").is_err());
    }
}
