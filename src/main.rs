use std::{
    fs::File,
    io::{self, IsTerminal, Read},
    path::Path,
    time::Duration,
};

use anyhow::{Context, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream};

use crate::{
    cli::{Cli, Command, LookupArgs},
    config::Config,
    search::SearchResult,
    select::{Choice, Preview, Prompter},
};

mod cli;
mod config;
mod entry;
mod identifier;
mod metadata;
mod pdf;
mod resolver;
mod search;
mod select;
mod text;

/// A PDF must carry this marker within its first kilobyte.
const PDF_MAGIC: &[u8] = b"%PDF-";

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(&args);
    let config = Config::load(args.config.as_deref())?;

    match &args.command {
        Command::Metadata { file } => {
            check_pdf(file)?;
            let metadata = pdf::parse_pdf(file, &config.parsing);
            println!("{metadata}");
        }
        Command::Lookup(lookup_args) => lookup(lookup_args, &config)?,
    }
    Ok(())
}

fn init_logging(args: &Cli) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_level()),
    );
    if !args.debug {
        builder.format_timestamp(None);
    }
    builder.init();
}

fn lookup(args: &LookupArgs, config: &Config) -> anyhow::Result<()> {
    let settings = config.search_settings();
    if settings.mailto().is_none() {
        log::warn!("`polite_pool_email` not set, not in the Crossref polite pool");
    }

    let color = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let mut prompter = Prompter::new(io::stdin().lock(), io::stderr(), color);

    let file = (!args.query).then(|| Path::new(&args.target));
    let mut results = match file {
        None => {
            if args.interactive {
                prompter.header("Query")?;
                prompter.line(&format!("    {}", args.target))?;
            }
            with_spinner("Searching", || {
                search::query_identifier(&args.target, &settings)
            })
        }
        Some(path) => {
            check_pdf(path)?;
            let metadata = pdf::parse_pdf(path, &config.parsing);
            log::info!("extracted metadata:\n{metadata}");
            if args.interactive {
                prompter.header("Metadata")?;
                for line in metadata.to_string().lines() {
                    prompter.line(&format!("    {line}"))?;
                }
            }
            with_spinner("Searching", || search::query_metadata(&metadata, &settings))
        }
    };

    if results.is_empty() {
        eprintln!(
            "{}",
            "No results found".if_supports_color(Stream::Stderr, |t| t.yellow())
        );
        return Ok(());
    }

    let index = if args.interactive {
        let lines = config.pdflu.show_first_lines;
        let show = || match file.map(|p| pdf::first_lines(p, lines)) {
            Some(Ok(lines)) => lines,
            Some(Err(err)) => vec![format!("{err:#}")],
            None => Vec::new(),
        };
        let preview: Option<Preview<'_>> = file.is_some().then_some(&show as Preview<'_>);
        match prompter.choose(&results, preview)? {
            Choice::Selected(index) => index,
            Choice::Quit => return Ok(()),
        }
    } else {
        0
    };

    let chosen: &mut Box<dyn SearchResult> = &mut results[index];
    log::info!("using {} result:\n{}", chosen.provider(), chosen);
    let entry = with_spinner("Fetching entry", || chosen.get_entry(false).cloned())
        .context("could not build a BibTeX entry")?;
    let text = entry::format_entry(&entry, &config.pdflu.field_order);
    println!("{text}");

    if config.pdflu.use_clipboard && !args.no_clipboard {
        copy_to_clipboard(&text);
    }
    Ok(())
}

/// Fail unless `path` is a readable regular file that looks like a PDF.
fn check_pdf(path: &Path) -> anyhow::Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let meta = file
        .metadata()
        .with_context(|| format!("cannot read {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a file", path.display());
    }

    let mut head = Vec::with_capacity(1024);
    file.by_ref()
        .take(1024)
        .read_to_end(&mut head)
        .with_context(|| format!("cannot read {}", path.display()))?;
    if !head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        bail!("{} is not a PDF file", path.display());
    }
    Ok(())
}

fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let out = f();
    spinner.finish_and_clear();
    out
}

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_owned())) {
        Ok(()) => log::info!("copied entry to clipboard"),
        Err(err) => log::warn!("could not copy to clipboard: {err}"),
    }
}
