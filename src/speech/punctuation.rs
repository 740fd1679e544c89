//! Punctuation and symbol processing for speech output
//!
//! Symbols are spoken by name once the configured punctuation level reaches
//! theirs, and runs of the same symbol are condensed ("====" becomes
//! "4 equals").

use crate::NvdaError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How much punctuation gets spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PunctuationLevel {
    None,
    #[default]
    Some,
    Most,
    All,
}

impl PunctuationLevel {
    /// Lowest level at which `ch` is spoken by name
    pub fn of_symbol(ch: char) -> Option<PunctuationLevel> {
        match ch {
            '#' | '$' | '%' | '&' | '*' | '@' | '^' | '_' | '|' | '~' | '\\' | '/' | '<'
            | '>' | '=' | '+' => Some(PunctuationLevel::Some),
            '"' | '(' | ')' | '[' | ']' | '{' | '}' | '-' | '\'' | '`' => {
                Some(PunctuationLevel::Most)
            }
            '.' | ',' | ';' | ':' | '!' | '?' => Some(PunctuationLevel::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PunctuationLevel::None => "none",
            PunctuationLevel::Some => "some",
            PunctuationLevel::Most => "most",
            PunctuationLevel::All => "all",
        }
    }
}

impl FromStr for PunctuationLevel {
    type Err = NvdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(PunctuationLevel::None),
            "some" => Ok(PunctuationLevel::Some),
            "most" => Ok(PunctuationLevel::Most),
            "all" => Ok(PunctuationLevel::All),
            other => Err(NvdaError::Config(format!(
                "Unknown punctuation level: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PunctuationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace symbols with their spoken names
///
/// A symbol is replaced when its level is at or below `level` and the
/// symbol table has a name for it. Repeated runs become "N name".
pub fn process_symbols(text: &str, level: PunctuationLevel, symbols: &HashMap<u32, String>) -> String {
    if level == PunctuationLevel::None || text.is_empty() {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let name = match PunctuationLevel::of_symbol(ch) {
            Some(needed) if needed <= level => symbols.get(&(ch as u32)),
            _ => None,
        };

        let Some(name) = name else {
            result.push(ch);
            continue;
        };

        // Regex has no backreferences, so count the run by hand
        let mut count = 1;
        while chars.peek() == Some(&ch) {
            chars.next();
            count += 1;
        }

        if count > 1 {
            result.push_str(&format!(" {} {} ", count, name));
        } else {
            result.push_str(&format!(" {} ", name));
        }
    }

    collapse_spaces(&result)
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> HashMap<u32, String> {
        let mut m = HashMap::new();
        m.insert('=' as u32, "equals".to_string());
        m.insert('.' as u32, "dot".to_string());
        m.insert('(' as u32, "left paren".to_string());
        m.insert('@' as u32, "at".to_string());
        m
    }

    #[test]
    fn test_condense_repeated() {
        let s = symbols();
        assert_eq!(process_symbols("====", PunctuationLevel::Some, &s), "4 equals");
        assert_eq!(process_symbols("a=b", PunctuationLevel::Some, &s), "a equals b");
    }

    #[test]
    fn test_levels() {
        let s = symbols();
        assert_eq!(process_symbols("x (y).", PunctuationLevel::Some, &s), "x (y).");
        assert_eq!(
            process_symbols("x (y).", PunctuationLevel::Most, &s),
            "x left paren y)."
        );
        assert_eq!(
            process_symbols("x (y).", PunctuationLevel::All, &s),
            "x left paren y) dot"
        );
        assert_eq!(process_symbols("me@home", PunctuationLevel::None, &s), "me@home");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("MOST".parse::<PunctuationLevel>().ok(), Some(PunctuationLevel::Most));
        assert!("loud".parse::<PunctuationLevel>().is_err());
        assert_eq!(PunctuationLevel::default(), PunctuationLevel::Some);
    }
}
