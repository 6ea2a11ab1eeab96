//! textpdf CLI: lay out an HTML article as paginated text.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use textpdf::{FontFetcher, OfflineFetcher};
use textpdf_render::{ConversionOutput, RenderEngine, RenderEngineOptions};

#[derive(Parser)]
#[command(name = "textpdf")]
#[command(version)]
#[command(about = "Extract an HTML article and paginate it for A4 text output", long_about = None)]
struct Cli {
    /// Input HTML file (`-` reads stdin)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// JSON file with conversion options; missing fields keep their defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Skip font downloads and use the built-in default font
    #[arg(long)]
    offline: bool,

    /// Print progress events to stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Full conversion result
    Json,
    /// Page text, one section per page
    Text,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let opts = match &cli.config {
        Some(path) => load_options(path)?,
        None => RenderEngineOptions::default(),
    };
    let mut engine = RenderEngine::new(opts);
    if cli.progress {
        engine.set_progress_sink(|event| {
            eprintln!("[{:>5.1}%] {}", event.percent, event.status);
        });
    }

    let html = read_input(&cli.input)?;
    let mut fetcher = font_fetcher(cli.offline);
    let output = engine.convert_html(&html, fetcher.as_mut())?;
    log::info!(
        "{} -> {} ({} pages)",
        cli.input.display(),
        output.file_name,
        output.summary.page_count
    );

    let rendered = match cli.format {
        OutputFormat::Json if cli.pretty => serde_json::to_string_pretty(&output)?,
        OutputFormat::Json => serde_json::to_string(&output)?,
        OutputFormat::Text => render_text(&output),
    };
    match &cli.output {
        Some(path) => fs::write(path, rendered)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn load_options(path: &Path) -> Result<RenderEngineOptions, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
    let opts = serde_json::from_str(&raw)
        .map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
    Ok(opts)
}

fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    fs::read(path)
}

#[cfg(feature = "http")]
fn font_fetcher(offline: bool) -> Box<dyn FontFetcher> {
    if offline {
        Box::new(OfflineFetcher)
    } else {
        Box::new(textpdf::HttpFontFetcher)
    }
}

#[cfg(not(feature = "http"))]
fn font_fetcher(offline: bool) -> Box<dyn FontFetcher> {
    if !offline {
        log::info!("built without `http`; font downloads disabled");
    }
    Box::new(OfflineFetcher)
}

fn render_text(output: &ConversionOutput) -> String {
    let mut out = String::new();
    for page in &output.pages {
        out.push_str(&format!("--- Page {} ---\n", page.page_number));
        for line in page.content_lines() {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
