use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use prismtm::{HighlightOptions, HtmlRenderer, RenderOptions, Registry, TerminalRenderer, ThemeVariant};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Html,
    Terminal,
}

/// Highlight a source file using a prebuilt grammar/theme registry.
#[derive(Parser, Debug)]
#[command(name = "prismtm-cli", about = "Highlight a file using TextMate grammars and themes")]
struct Cli {
    /// File to highlight.
    file: PathBuf,

    /// Path to the registry dump produced by `build-registry`.
    #[arg(long, default_value = "builtin.zst")]
    registry: PathBuf,

    /// Grammar name or file extension alias to use. Guessed from the file extension if omitted.
    #[arg(long)]
    lang: Option<String>,

    /// Theme name to highlight with.
    #[arg(long, default_value = "vitesse-black")]
    theme: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
    format: OutputFormat,

    /// Show line numbers in the output.
    #[arg(long)]
    line_numbers: bool,
}

fn guess_lang(path: &std::path::Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("txt")
        .to_string()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let registry = Registry::load_from_file(&cli.registry)?;
    let code = fs::read_to_string(&cli.file)?;
    let lang = cli.lang.unwrap_or_else(|| guess_lang(&cli.file));

    let options = HighlightOptions::new(lang, ThemeVariant::Single(cli.theme.as_str()));
    let highlighted = registry.highlight(&code, &options)?;

    let render_options = RenderOptions {
        show_line_numbers: cli.line_numbers,
        ..Default::default()
    };

    let rendered = match cli.format {
        OutputFormat::Html => HtmlRenderer::default().render(&highlighted, &render_options),
        OutputFormat::Terminal => TerminalRenderer::default().render(&highlighted, &render_options),
    };

    println!("{rendered}");

    Ok(())
}
