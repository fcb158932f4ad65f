use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Error, HighlightResult};

/// RGBA color with 8-bit components
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct Color {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

fn parse_hex_component(hex: &str, original: &str) -> HighlightResult<u8> {
    u8::from_str_radix(hex, 16).map_err(|_| Error::InvalidHexColor {
        value: original.to_string(),
        reason: format!("invalid hex component '{}'", hex),
    })
}

impl Color {
    pub(crate) const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
    pub(crate) const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    /// Fallback foreground used when a light theme doesn't define one.
    pub(crate) const LIGHT_FG_FALLBACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };
    /// Fallback foreground used when a dark theme doesn't define one.
    pub(crate) const DARK_FG_FALLBACK: Color = Color {
        r: 216,
        g: 216,
        b: 216,
        a: 255,
    };
    /// Fallback background used when a light theme doesn't define one.
    pub(crate) const LIGHT_BG_FALLBACK: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
    /// Fallback background used when a dark theme doesn't define one.
    pub(crate) const DARK_BG_FALLBACK: Color = Color {
        r: 30,
        g: 30,
        b: 30,
        a: 255,
    };

    /// Outputs the hex value for that colour.
    #[inline]
    pub fn as_hex(&self) -> String {
        if self.a < 255 {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        } else {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        }
    }

    #[inline]
    pub(crate) fn as_css_color_property(&self) -> String {
        format!("color: {};", self.as_hex())
    }

    #[inline]
    pub(crate) fn as_css_bg_color_property(&self) -> String {
        format!("background-color: {};", self.as_hex())
    }

    #[inline]
    pub(crate) fn as_css_light_dark_color_property(light: &Color, dark: &Color) -> String {
        format!("color: light-dark({}, {});", light.as_hex(), dark.as_hex())
    }

    #[inline]
    pub(crate) fn as_css_light_dark_bg_color_property(light: &Color, dark: &Color) -> String {
        format!(
            "background-color: light-dark({}, {});",
            light.as_hex(),
            dark.as_hex()
        )
    }

    /// Writes the truecolor foreground SGR parameter (no leading `\x1b[` or trailing `m`),
    /// meant to be composed with other SGR fragments inside a single escape sequence.
    pub(crate) fn as_ansi_fg(&self, f: &mut String) -> std::fmt::Result {
        write!(f, "38;2;{};{};{}", self.r, self.g, self.b)
    }

    /// Writes the truecolor background SGR parameter, with a leading `;` since it's
    /// always composed after another fragment (or alone, where the empty leading
    /// parameter is a harmless no-op reset).
    pub(crate) fn as_ansi_bg(&self, f: &mut String) -> std::fmt::Result {
        write!(f, ";48;2;{};{};{}", self.r, self.g, self.b)
    }

    /// Creates a Color from a string (in theory a hex but it can also be black/white).
    ///
    /// Errors if the string is not a valid hex colour.
    pub fn from_hex(hex: &str) -> HighlightResult<Self> {
        let original = hex;
        let hex = hex.trim_start_matches('#');

        if hex == "white" {
            return Ok(Color::WHITE);
        } else if hex == "black" {
            return Ok(Color::BLACK);
        }
        // Parse based on length
        match hex.len() {
            // #RGB format (e.g., #F00 for red)
            3 => {
                let r = parse_hex_component(&hex[0..1], original)?;
                let g = parse_hex_component(&hex[1..2], original)?;
                let b = parse_hex_component(&hex[2..3], original)?;
                Ok(Color {
                    r: r * 17, // Convert 0xF to 0xFF
                    g: g * 17,
                    b: b * 17,
                    a: 255,
                })
            }
            // #RGBA format (e.g., #F00F for red with full opacity)
            4 => {
                let r = parse_hex_component(&hex[0..1], original)?;
                let g = parse_hex_component(&hex[1..2], original)?;
                let b = parse_hex_component(&hex[2..3], original)?;
                let a = parse_hex_component(&hex[3..4], original)?;
                Ok(Color {
                    r: r * 17,
                    g: g * 17,
                    b: b * 17,
                    a: a * 17,
                })
            }
            // #RRGGBB format (e.g., #FF0000 for red)
            6 => {
                let r = parse_hex_component(&hex[0..2], original)?;
                let g = parse_hex_component(&hex[2..4], original)?;
                let b = parse_hex_component(&hex[4..6], original)?;
                Ok(Color { r, g, b, a: 255 })
            }
            // #RRGGBBAA format (e.g., #FF0000FF for red with full opacity)
            8 => {
                let r = parse_hex_component(&hex[0..2], original)?;
                let g = parse_hex_component(&hex[2..4], original)?;
                let b = parse_hex_component(&hex[4..6], original)?;
                let a = parse_hex_component(&hex[6..8], original)?;
                Ok(Color { r, g, b, a })
            }
            _ => Err(Error::InvalidHexColor {
                value: original.to_string(),
                reason: format!("invalid length {}", hex.len()),
            }),
        }
    }
}
