//! Renders highlighted code with ANSI escape codes for display in a truecolor terminal.
//!
//! Requires a prebuilt `builtin.zst` registry dump (see `tools/build_registry.rs`).

use prismtm::{HighlightOptions, RenderOptions, Registry, TerminalRenderer, ThemeVariant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::load_from_file("builtin.zst")?;

    let code = "def greet(name):\n    print(f\"hello {name}\")";
    let options = HighlightOptions::new("python", ThemeVariant::Single("vitesse-black"));
    let highlighted = registry.highlight(code, &options)?;

    let render_options = RenderOptions {
        show_line_numbers: true,
        ..Default::default()
    };

    println!("{}", TerminalRenderer::default().render(&highlighted, &render_options));

    Ok(())
}
