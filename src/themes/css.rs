//! Renders a [`CompiledTheme`] as a static CSS stylesheet, one rule per theme rule,
//! for callers that want to ship highlighted HTML with a shared stylesheet instead
//! of inline styles (see [`HighlightedText::as_html`](crate::HighlightedText) with a
//! `css_class_prefix`).

use crate::error::HighlightResult;
use crate::scope::Scope;
use crate::themes::CompiledTheme;

/// Builds the CSS class selector(s) for a single scope.
///
/// When `per_atom` is true each dot-separated atom of the scope gets its own class
/// (e.g. `keyword.control` -> `"g-keyword g-keyword-control"`-like, space separated
/// cumulative classes), which lets a stylesheet target broad categories (`g-keyword`)
/// as well as the precise one. Otherwise the whole scope is rendered as a single
/// hyphenated class.
pub(crate) fn scope_to_css_selector(scope: Scope, prefix: &str, per_atom: bool) -> String {
    let full = scope.build_string();
    if per_atom {
        full.split('.')
            .filter(|atom| !atom.is_empty())
            .map(|atom| format!("{prefix}{atom}"))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        format!("{prefix}{}", full.replace('.', "-"))
    }
}

/// Generates a CSS stylesheet for `theme`, one selector block per theme rule, so that
/// highlighted HTML rendered with a `css_class_prefix` can be styled without inline styles.
pub fn generate_css(theme: &CompiledTheme, prefix: &str) -> HighlightResult<String> {
    let mut out = String::new();

    out.push_str(&format!(
        "body {{\n  {}\n  {}\n}}\n",
        theme.default_style.foreground.as_css_color_property(),
        theme.default_style.background.as_css_bg_color_property(),
    ));

    for rule in &theme.rules {
        let selector = scope_to_css_selector(rule.selector.target_scope, prefix, false);
        let mut declarations = String::new();

        if let Some(fg) = rule.style_modifier.foreground {
            declarations.push_str(&fg.as_css_color_property());
            declarations.push(' ');
        }
        if let Some(bg) = rule.style_modifier.background {
            declarations.push_str(&bg.as_css_bg_color_property());
            declarations.push(' ');
        }
        if let Some(font_style) = rule.style_modifier.font_style {
            for attr in font_style.css_attributes() {
                declarations.push_str(attr);
                declarations.push(' ');
            }
        }

        if declarations.is_empty() {
            continue;
        }

        out.push_str(&format!(".{selector} {{ {} }}\n", declarations.trim()));
    }

    Ok(out)
}
