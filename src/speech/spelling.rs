//! Spelling and the phonetic alphabet
//!
//! Saying the focus twice spells it letter by letter; the NATO alphabet
//! disambiguates letters that sound alike.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// NATO phonetic alphabet
pub static PHONETICS: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    [
        ('a', "alpha"),
        ('b', "bravo"),
        ('c', "charlie"),
        ('d', "delta"),
        ('e', "echo"),
        ('f', "foxtrot"),
        ('g', "golf"),
        ('h', "hotel"),
        ('i', "india"),
        ('j', "juliet"),
        ('k', "kilo"),
        ('l', "lima"),
        ('m', "mike"),
        ('n', "november"),
        ('o', "oscar"),
        ('p', "papa"),
        ('q', "quebec"),
        ('r', "romeo"),
        ('s', "sierra"),
        ('t', "tango"),
        ('u', "uniform"),
        ('v', "victor"),
        ('w', "whiskey"),
        ('x', "x ray"),
        ('y', "yankee"),
        ('z', "zulu"),
    ]
    .into_iter()
    .collect()
});

/// Phonetic word for a letter, case-insensitive
pub fn phonetic(ch: char) -> Option<&'static str> {
    ch.to_lowercase()
        .next()
        .and_then(|lower| PHONETICS.get(&lower).copied())
}

/// Spell text one character at a time
///
/// Upper-case letters are prefixed with "cap", spaces are spoken as "space".
pub fn spell(text: &str) -> Vec<String> {
    text.chars()
        .map(|ch| {
            if ch == ' ' {
                "space".to_string()
            } else if ch.is_uppercase() {
                format!("cap {}", ch.to_lowercase())
            } else {
                ch.to_string()
            }
        })
        .collect()
}
