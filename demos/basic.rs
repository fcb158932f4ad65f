//! Highlights a snippet of Rust and prints the plain tokens and their resolved scopes.
//!
//! Requires a prebuilt `builtin.zst` registry dump (see `tools/build_registry.rs`).

use prismtm::{HighlightOptions, Registry, ThemeVariant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::load_from_file("builtin.zst")?;

    let code = "fn main() {\n    println!(\"hello\");\n}";
    let options = HighlightOptions::new("rust", ThemeVariant::Single("vitesse-black"));
    let highlighted = registry.highlight(code, &options)?;

    for line in highlighted.tokens {
        for token in line {
            println!("{:?}", token.text);
        }
    }

    Ok(())
}
