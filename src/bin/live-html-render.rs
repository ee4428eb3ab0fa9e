use live_html::{render_markdown_page, LiveHtmlError, PreviewConfig};
use std::env;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

struct Args {
    input: String,
    config: Option<String>,
    out: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(env::args().skip(1).collect()) {
        Some(args) => args,
        None => {
            print_usage();
            process::exit(1);
        }
    };

    match run(&args) {
        Ok(written) => {
            if let Some(path) = written {
                eprintln!("✓ {} rendered to {}", args.input, path);
            }
        }
        Err(e) => {
            eprintln!("✗ {} failed:", args.input);
            eprintln!("  {}", e);
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: live-html-render <file.md> [--config preview.yaml] [--out page.html]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  live-html-render notes.md > notes.html");
    eprintln!("  live-html-render notes.md --config preview.yaml --out notes.html");
}

fn parse_args(raw: Vec<String>) -> Option<Args> {
    let mut input = None;
    let mut config = None;
    let mut out = None;
    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(iter.next()?),
            "--out" => out = Some(iter.next()?),
            "-h" | "--help" => return None,
            _ if input.is_none() && !arg.starts_with("--") => input = Some(arg),
            _ => return None,
        }
    }
    Some(Args {
        input: input?,
        config,
        out,
    })
}

fn run(args: &Args) -> Result<Option<String>, LiveHtmlError> {
    let config = match &args.config {
        Some(path) => PreviewConfig::load(path)?,
        None => PreviewConfig::default(),
    };
    let markdown = fs::read_to_string(&args.input).map_err(|e| LiveHtmlError::Io {
        path: args.input.clone(),
        message: e.to_string(),
    })?;
    let page = render_markdown_page(&markdown, &config)?;

    match &args.out {
        Some(path) => {
            fs::write(path, page).map_err(|e| LiveHtmlError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            Ok(Some(path.clone()))
        }
        None => {
            print!("{}", page);
            Ok(None)
        }
    }
}
