use serde::{Deserialize, Serialize};

// Removed scope ID dependencies - now using strings directly
use crate::themes::Color;
use crate::themes::font_style::FontStyle;
use crate::themes::raw::{RawTheme, TokenColorSettings};
use crate::themes::selector::{ThemeSelector, parse_selector};

/// A complete style with foreground, background colors and font styling
///
/// This is the runtime representation that always has concrete values.
/// Total size: 9 bytes (4 + 4 + 1)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct Style {
    pub foreground: Color,
    pub background: Color,
    pub font_style: FontStyle,
}

impl Default for Style {
    fn default() -> Style {
        Style {
            foreground: Color::BLACK,
            background: Color::WHITE,
            font_style: FontStyle::default(),
        }
    }
}

/// A style modifier with optional values for theme parsing
///
/// This represents theme entries where colors and font styles are optional.
/// Used during theme loading and then resolved to concrete Style values.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct StyleModifier {
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub font_style: Option<FontStyle>,
}

impl StyleModifier {
    /// Applies the `Some` fields of this modifier on top of a base style.
    pub(crate) fn apply(&self, base: Style) -> Style {
        Style {
            foreground: self.foreground.unwrap_or(base.foreground),
            background: self.background.unwrap_or(base.background),
            font_style: self.font_style.unwrap_or(base.font_style),
        }
    }
}

impl TryFrom<TokenColorSettings> for StyleModifier {
    type Error = Box<dyn std::error::Error>;

    fn try_from(settings: TokenColorSettings) -> Result<Self, Self::Error> {
        let foreground = if let Some(s) = settings.foreground() {
            Some(Color::from_hex(s)?)
        } else {
            None
        };
        let background = if let Some(s) = settings.background() {
            Some(Color::from_hex(s)?)
        } else {
            None
        };

        let font_style = settings.font_style.map(|s| FontStyle::from_theme_str(&s));

        Ok(Self {
            foreground,
            background,
            font_style,
        })
    }
}

/// Theme type for determining fallback colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThemeType {
    Light,
    #[default]
    Dark,
}

impl ThemeType {
    // (fg, bg)
    pub fn default_colors(&self) -> (Color, Color) {
        match self {
            ThemeType::Light => (Color::LIGHT_FG_FALLBACK, Color::LIGHT_BG_FALLBACK),
            ThemeType::Dark => (Color::DARK_FG_FALLBACK, Color::DARK_BG_FALLBACK),
        }
    }

    pub fn from_str(s: &str) -> ThemeType {
        if s.eq_ignore_ascii_case("light") {
            ThemeType::Light
        } else {
            ThemeType::Dark
        }
    }
}

/// A value that can differ between a light and a dark variant of a theme, or be single.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeVariant<T> {
    Single(T),
    Dual { light: T, dark: T },
}

impl<T> ThemeVariant<T> {
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ThemeVariant<U> {
        match self {
            ThemeVariant::Single(v) => ThemeVariant::Single(f(v)),
            ThemeVariant::Dual { light, dark } => ThemeVariant::Dual {
                light: f(light),
                dark: f(dark),
            },
        }
    }

    pub fn as_ref(&self) -> ThemeVariant<&T> {
        match self {
            ThemeVariant::Single(v) => ThemeVariant::Single(v),
            ThemeVariant::Dual { light, dark } => ThemeVariant::Dual { light, dark },
        }
    }
}

impl ThemeVariant<Style> {
    /// Whether merging adjacent whitespace-only tokens under this style would be visually lossy,
    /// i.e. the style carries a background or decoration that would otherwise be dropped.
    pub(crate) fn has_decoration(&self) -> bool {
        let check = |s: &Style| !s.font_style.is_empty();
        match self {
            ThemeVariant::Single(s) => check(s),
            ThemeVariant::Dual { light, dark } => check(light) || check(dark),
        }
    }
}

/// Compiled theme rule for efficient matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledThemeRule {
    pub selector: ThemeSelector,
    pub style_modifier: StyleModifier,
}

impl CompiledThemeRule {
    /// Specificity score used to order rules so more specific selectors are applied last.
    fn specificity(&self) -> usize {
        self.selector.parent_scopes.len() * 1000 + self.selector.target_scope.len() as usize
    }
}

/// Compiled theme optimized for fast lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledTheme {
    pub name: String,
    /// Theme type ("light" or "dark")
    pub theme_type: ThemeType,
    /// Default style for tokens with no specific rules
    pub default_style: Style,
    /// Background used to highlight specific lines, if the theme defines one
    pub highlight_background_color: Option<Color>,
    /// Foreground used to render the line-number gutter, if the theme defines one
    pub line_number_foreground: Option<Color>,
    /// Theme rules sorted by specificity (least specific first, so later rules win on overlay)
    pub rules: Vec<CompiledThemeRule>,
}

impl CompiledTheme {
    pub fn from_raw_theme(raw_theme: RawTheme) -> Result<Self, Box<dyn std::error::Error>> {
        let theme_type = raw_theme
            .kind
            .map(|s| ThemeType::from_str(&s))
            .unwrap_or_default();

        let foreground = Color::from_hex(&raw_theme.colors.foreground)?;
        let background = Color::from_hex(&raw_theme.colors.background)?;

        let default_style = Style {
            foreground,
            background,
            font_style: FontStyle::default(),
        };

        let highlight_background_color = raw_theme
            .colors
            .highlight_background
            .as_deref()
            .map(Color::from_hex)
            .transpose()?;

        let mut rules = Vec::new();

        for token_rule in raw_theme.token_colors {
            if token_rule.scope.is_empty() {
                continue;
            }

            let style_modifier = StyleModifier::try_from(token_rule.settings)?;

            for scope_str in &token_rule.scope {
                let Some(selector) = parse_selector(scope_str) else {
                    continue;
                };
                rules.push(CompiledThemeRule {
                    selector,
                    style_modifier,
                });
            }
        }

        rules.sort_by_key(CompiledThemeRule::specificity);

        Ok(CompiledTheme {
            name: raw_theme.name,
            theme_type,
            default_style,
            highlight_background_color,
            line_number_foreground: None,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::themes::raw::{Colors, RawTheme, TokenColorRule, TokenColorSettings};

    #[test]
    fn can_load_and_compile_all_shiki_themes() {
        let entries = fs::read_dir("grammars-themes/packages/tm-themes/themes")
            .expect("Failed to read grammars directory");

        for entry in entries {
            let entry = entry.expect("Failed to read directory entry");
            let path = entry.path();
            println!("{:?}", path);
            RawTheme::load_from_file(&path)
                .unwrap()
                .compile()
                .unwrap_or_else(|_| panic!("Failed to compile theme: {path:?}"));
        }
    }

    fn rule(scope: &str, foreground: Option<&str>) -> TokenColorRule {
        TokenColorRule {
            scope: vec![scope.to_string()],
            settings: TokenColorSettings {
                foreground: foreground.map(str::to_string),
                background: None,
                font_style: None,
            },
        }
    }

    #[test]
    fn test_theme_inheritance() {
        let raw = RawTheme {
            name: "test".to_string(),
            kind: Some("dark".to_string()),
            colors: Colors {
                foreground: "#FFFFFF".to_string(),
                background: "#000000".to_string(),
                highlight_background: None,
            },
            token_colors: vec![
                rule("string", Some("#AAAAAA")),
                rule("string.quoted", Some("#BBBBBB")),
                rule("string.quoted.double", Some("#CCCCCC")),
            ],
        };

        let theme = CompiledTheme::from_raw_theme(raw).unwrap();
        assert_eq!(theme.rules.len(), 3);

        let stack = vec![
            crate::scope::Scope::new("source.js")[0],
            crate::scope::Scope::new("string.quoted.double")[0],
        ];
        let matched: Vec<_> = theme
            .rules
            .iter()
            .filter(|r| r.selector.matches(&stack))
            .collect();
        assert_eq!(matched.len(), 3);
        // most specific rule must be last so it wins on overlay
        assert_eq!(
            matched.last().unwrap().style_modifier.foreground,
            Some(Color::from_hex("#CCCCCC").unwrap())
        );
    }

    #[test]
    fn test_real_world_theme_inheritance() {
        let theme = RawTheme::load_from_file(
            "grammars-themes/packages/tm-themes/themes/vitesse-black.json",
        )
        .unwrap()
        .compile()
        .unwrap();

        let stack = vec![crate::scope::Scope::new("invalid.illegal")[0]];
        let matched = theme
            .rules
            .iter()
            .filter(|r| r.selector.matches(&stack))
            .last()
            .expect("expected a matching rule for invalid.illegal");

        assert_eq!(
            matched.style_modifier.foreground,
            Some(Color::from_hex("#FDAEB7").unwrap())
        );
    }
}
