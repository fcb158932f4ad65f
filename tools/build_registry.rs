use std::collections::HashMap;
use std::fs;

use prismtm::Registry;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GrammarMetadata {
    name: String,
    aliases: Vec<String>,
}

fn load_grammar_metadata() -> Result<HashMap<String, Vec<String>>, Box<dyn std::error::Error>> {
    let metadata_path = "grammar_metadata.json";

    if !std::path::Path::new(metadata_path).exists() {
        println!("grammar metadata file not found at {metadata_path}, skipping aliases");
        return Ok(HashMap::new());
    }

    let metadata_content = fs::read_to_string(metadata_path)?;
    let metadata: Vec<GrammarMetadata> = serde_json::from_str(&metadata_content)?;

    Ok(metadata
        .into_iter()
        .map(|grammar| (grammar.name, grammar.aliases))
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Building Registry with all grammars and themes from grammars-themes folder...");

    let alias_map = load_grammar_metadata()?;

    let mut registry = Registry::default();
    let mut grammar_count = 0;
    let mut theme_count = 0;
    let mut grammar_errors = 0;
    let mut theme_errors = 0;
    let mut aliases_registered = 0;

    let grammars_dir = "grammars-themes/packages/tm-grammars/grammars";
    for entry in fs::read_dir(grammars_dir)? {
        let path = entry?.path();
        if path.extension() != Some("json".as_ref()) {
            continue;
        }
        let grammar_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

        match registry.add_grammar_from_path(&path) {
            Ok(()) => {
                grammar_count += 1;
                if let Some(aliases) = alias_map.get(grammar_name) {
                    for alias in aliases {
                        registry
                            .add_alias(grammar_name, alias)
                            .expect("grammar was just loaded");
                        aliases_registered += 1;
                    }
                }
            }
            Err(e) => {
                eprintln!("failed to load grammar {grammar_name}: {e}");
                grammar_errors += 1;
            }
        }
    }

    let themes_dir = "grammars-themes/packages/tm-themes/themes";
    let mut theme_names = Vec::new();
    for entry in fs::read_dir(themes_dir)? {
        let path = entry?.path();
        if path.extension() != Some("json".as_ref()) {
            continue;
        }
        let theme_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

        match registry.add_theme_from_path(&path) {
            Ok(()) => {
                theme_names.push(theme_name.to_string());
                theme_count += 1;
            }
            Err(e) => {
                eprintln!("failed to load theme {theme_name}: {e}");
                theme_errors += 1;
            }
        }
    }

    registry.add_plain_grammar(&["txt"])?;
    registry.link_grammars();

    println!("Summary:");
    println!("- Successfully loaded: {grammar_count} grammars ({grammar_errors} failed)");
    println!("- Successfully loaded: {theme_count} themes ({theme_errors} failed)");
    println!("- Registered aliases: {aliases_registered} total");

    registry.dump_to_file("builtin.zst")?;
    let size = fs::metadata("builtin.zst")?.len();
    println!("Registry saved to builtin.zst ({:.2} MB)", size as f64 / (1024.0 * 1024.0));

    Ok(())
}
