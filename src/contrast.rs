//! Colour contrast checks (WCAG 2.x)
//!
//! Colours come from AT-SPI text attributes (`fg-color`, `bg-color`) or from
//! user input, so several spellings are accepted.

use crate::{NvdaError, Result};
use std::fmt;
use std::str::FromStr;

/// An sRGB colour with 8-bit components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or `r,g,b`
    ///
    /// AT-SPI reports 16-bit components (`65535,65535,65535`); when any
    /// component exceeds 255 all three are scaled down.
    pub fn parse(input: &str) -> Result<Color> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex).ok_or_else(|| bad_color(input));
        }

        let inner = s
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(s);

        let parts: Vec<u32> = inner
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| bad_color(input))?;

        let &[r, g, b] = parts.as_slice() else {
            return Err(bad_color(input));
        };

        if r > 65535 || g > 65535 || b > 65535 {
            return Err(bad_color(input));
        }

        if r > 255 || g > 255 || b > 255 {
            let scale = |v: u32| ((v * 255 + 32767) / 65535) as u8;
            Ok(Color::new(scale(r), scale(g), scale(b)))
        } else {
            Ok(Color::new(r as u8, g as u8, b as u8))
        }
    }

    fn parse_hex(hex: &str) -> Option<Color> {
        // from_str_radix accepts a leading sign
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let digit = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
        match hex.len() {
            3 => Some(Color::new(digit(0, 1)? * 17, digit(1, 1)? * 17, digit(2, 1)? * 17)),
            6 => Some(Color::new(digit(0, 2)?, digit(2, 2)?, digit(4, 2)?)),
            _ => None,
        }
    }

    /// WCAG relative luminance, 0.0 (black) to 1.0 (white)
    pub fn relative_luminance(&self) -> f64 {
        fn channel(c: u8) -> f64 {
            let c = c as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * channel(self.r) + 0.7152 * channel(self.g) + 0.0722 * channel(self.b)
    }
}

fn bad_color(input: &str) -> NvdaError {
    NvdaError::Other(format!("Invalid colour: {}", input))
}

impl FromStr for Color {
    type Err = NvdaError;

    fn from_str(s: &str) -> Result<Self> {
        Color::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Contrast ratio between two colours, from 1.0 to 21.0
pub fn contrast_ratio(fg: Color, bg: Color) -> f64 {
    let a = fg.relative_luminance();
    let b = bg.relative_luminance();
    let (lighter, darker) = if a >= b { (a, b) } else { (b, a) };
    (lighter + 0.05) / (darker + 0.05)
}

/// WCAG conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WcagLevel {
    A,
    AA,
    AAA,
}

impl WcagLevel {
    /// Minimum contrast ratio for this level
    pub fn threshold(&self) -> f64 {
        match self {
            WcagLevel::A => 3.0,
            WcagLevel::AA => 4.5,
            WcagLevel::AAA => 7.0,
        }
    }

    /// Highest level a ratio satisfies
    pub fn for_ratio(ratio: f64) -> Option<WcagLevel> {
        [WcagLevel::AAA, WcagLevel::AA, WcagLevel::A]
            .into_iter()
            .find(|level| ratio >= level.threshold())
    }
}

impl FromStr for WcagLevel {
    type Err = NvdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(WcagLevel::A),
            "AA" => Ok(WcagLevel::AA),
            "AAA" => Ok(WcagLevel::AAA),
            other => Err(NvdaError::Other(format!("Unknown WCAG level: {}", other))),
        }
    }
}

impl fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WcagLevel::A => "A",
            WcagLevel::AA => "AA",
            WcagLevel::AAA => "AAA",
        };
        f.write_str(s)
    }
}

/// Does this colour pair meet the level?
pub fn is_accessible(fg: Color, bg: Color, level: WcagLevel) -> bool {
    contrast_ratio(fg, bg) >= level.threshold()
}

/// Sentence reporting the contrast of a colour pair
pub fn describe(fg: Color, bg: Color) -> String {
    let ratio = contrast_ratio(fg, bg);
    match WcagLevel::for_ratio(ratio) {
        Some(level) => format!("contrast {:.1} to 1, meets WCAG {}", ratio, level),
        None => format!("contrast {:.1} to 1, fails WCAG", ratio),
    }
}
