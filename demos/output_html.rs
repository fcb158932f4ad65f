//! Renders highlighted code to a standalone HTML snippet, with line numbers and one
//! highlighted line.
//!
//! Requires a prebuilt `builtin.zst` registry dump (see `tools/build_registry.rs`).

use prismtm::{HighlightOptions, HtmlRenderer, RenderOptions, Registry, ThemeVariant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::load_from_file("builtin.zst")?;

    let code = "const x = 1;\nconst y = 2;\nconsole.log(x + y);";
    let options = HighlightOptions::new("javascript", ThemeVariant::Single("vitesse-black"));
    let highlighted = registry.highlight(code, &options)?;

    let render_options = RenderOptions {
        show_line_numbers: true,
        highlight_lines: vec![3..=3],
        ..Default::default()
    };

    let html = HtmlRenderer::default().render(&highlighted, &render_options);
    println!("<style>{}</style>", prismtm::HIGHLIGHT_CSS);
    println!("{html}");

    Ok(())
}
