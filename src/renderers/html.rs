use std::fmt;
use std::fmt::Write as _;

use crate::themes::Color;
use crate::{HighlightedCode, RenderOptions, ThemeVariant};

/// Escapes `&`, `<`, `>`, `"` and `'` for safe inclusion in HTML text or attribute values.
pub(crate) struct HtmlEscaped<'a>(pub(crate) &'a str);

impl fmt::Display for HtmlEscaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&#39;")?,
                _ => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

/// Renders highlighted code to an HTML `<pre><code>` block, one `<span>` per line and one nested
/// `<span>` per token, using [`crate::HIGHLIGHT_CSS`] for the line/gutter layout.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HtmlRenderer {
    /// When set, every token's style is emitted as CSS classes derived from its scope stack
    /// (prefixed with this string) instead of an inline `style` attribute. Pair with
    /// [`crate::Registry::generate_css`] using the same prefix.
    pub css_class_prefix: Option<String>,
}

impl HtmlRenderer {
    /// Renders `highlighted` to a standalone HTML string.
    pub fn render(&self, highlighted: &HighlightedCode, options: &RenderOptions) -> String {
        let mut output = String::from("<pre><code>");
        let line_numbers_size = options.line_number_width(highlighted.tokens.len());

        let highlight_background_style = match highlighted.theme {
            ThemeVariant::Single(theme) => theme
                .highlight_background_color
                .map(|c| c.as_css_bg_color_property()),
            ThemeVariant::Dual { light, dark } => {
                match (light.highlight_background_color, dark.highlight_background_color) {
                    (Some(l), Some(d)) => Some(Color::as_css_light_dark_bg_color_property(&l, &d)),
                    _ => None,
                }
            }
        };

        let mut tokens = highlighted.tokens.iter().enumerate().peekable();
        while let Some((idx, line_tokens)) = tokens.next() {
            let line_num = idx + 1; // 1-indexed

            // Matches TerminalRenderer: the trailing newline of the input produces one last
            // empty line, which isn't rendered.
            if tokens.peek().is_none() && line_tokens.is_empty() {
                continue;
            }

            if options.hide_lines.iter().any(|r| r.contains(&line_num)) {
                continue;
            }

            let is_highlighted = options.highlight_lines.iter().any(|r| r.contains(&line_num));

            output.push_str(r#"<span class="prismtm-l""#);
            if is_highlighted && let Some(style) = &highlight_background_style {
                output.push_str(&format!(r#" style="{style}""#));
            }
            output.push('>');

            if options.show_line_numbers {
                let displayed_num = options.line_number_start + idx as isize;
                output.push_str(&format!(
                    r#"<span class="prismtm-ln">{:>width$}</span>"#,
                    displayed_num,
                    width = line_numbers_size
                ));
            }

            for token in line_tokens {
                output.push_str(&token.as_html(&highlighted.theme, self.css_class_prefix.as_deref()));
            }

            output.push_str("</span>\n");
        }

        output.push_str("</code></pre>");
        output
    }
}
