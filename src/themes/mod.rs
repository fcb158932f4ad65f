mod color;
pub(crate) mod compiled;
pub(crate) mod css;
pub(crate) mod font_style;
pub(crate) mod raw;
pub(crate) mod selector;

pub use color::Color;
pub use compiled::{
    CompiledTheme, CompiledThemeRule, Style, StyleModifier, ThemeType, ThemeVariant,
};
pub use css::{generate_css, scope_to_css_selector};
pub use font_style::FontStyle;
pub use raw::{Colors, RawTheme, TokenColorRule, TokenColorSettings};
pub use selector::{Parent, ThemeSelector, parse_selector};
