// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for ccexport.
//!
//! This binary provides the `ccexport` command for exporting Claude Code
//! session logs to a Markdown document.

use ccexport::dates::{DateError, DateWindow};
use ccexport::discovery::{self, DiscoveryError};
use ccexport::export::{self, ExportError, ExportOptions};
use ccexport::normalizer::{ExportContext, NormalizeOptions};
use ccexport::preview::{DEFAULT_TITLE, HtmlPreview};
use ccexport::renderer::{self, RenderOptions};
use ccexport::secrets::{SecretScanner, TruffleHogScanner};
use chrono::Local;
use lexopt::prelude::*;
use snafu::{ensure, prelude::*};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write the document and its logs to the specified directory.
    Directory(PathBuf),
    /// Write the document to stdout.
    Stdout,
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    input: Vec<PathBuf>,
    project: Option<PathBuf>,
    output: OutputTarget,
    from: Option<String>,
    to: Option<String>,
    today: bool,
    show_timestamps: bool,
    redact: bool,
    preview: bool,
    quiet: bool,
    dry_run: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("--today cannot be combined with --from or --to"))]
    ConflictingDates,

    #[snafu(display("{source}"))]
    Dates { source: DateError },

    #[snafu(display("failed to resolve project path {}: {source}", path.display()))]
    ProjectPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{source}"))]
    Discovery { source: DiscoveryError },

    #[snafu(display("no .jsonl session files found in the given inputs"))]
    NoInputFiles,

    #[snafu(display("{source}"))]
    Export { source: ExportError },
}

fn print_help() {
    println!(
        "\
{name} {version}
Export Claude Code session logs to Markdown

Usage: {name} [OPTIONS] [INPUT]...

Arguments:
  [INPUT]...  Session .jsonl files or directories (default: discover
              sessions for the project)

Options:
  -p, --project <PATH>  Project root (default: current directory)
  -o, --out <DIR>       Output directory (default: claude-conversations,
                        or - for stdout)

Filtering:
      --from <DATE>     Only include messages on or after DATE
      --to <DATE>       Only include messages on or before DATE
      --today           Only include messages from today
                        DATE is YYYY-MM-DD or \"August 09, 2025 at 06:03:43 PM\"

Output:
      --timestamps      Show message timestamps in headings
      --no-redact       Do not scan for and redact secrets
      --preview         Also write an HTML preview (requires cmark-gfm)

Other options:
  -q, --quiet           Suppress progress messages
  -n, --dry-run         Show what would be processed without writing
  -h, --help            Print help
  -V, --version         Print version

Logging is controlled with RUST_LOG (default: ccexport=info).",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    let mut input = Vec::new();
    let mut project = None;
    let mut output = OutputTarget::Directory(PathBuf::from("claude-conversations"));
    let mut from = None;
    let mut to = None;
    let mut today = false;
    let mut show_timestamps = false;
    let mut redact = true;
    let mut preview = false;
    let mut quiet = false;
    let mut dry_run = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('p') | Long("project") => project = Some(parser.value()?.parse()?),
            Short('o') | Long("out" | "output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                };
            }
            Long("from") => from = Some(parser.value()?.string()?),
            Long("to") => to = Some(parser.value()?.string()?),
            Long("today") => today = true,
            Long("timestamps") => show_timestamps = true,
            Long("no-redact") => redact = false,
            Long("preview") => preview = true,
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        project,
        output,
        from,
        to,
        today,
        show_timestamps,
        redact,
        preview,
        quiet,
        dry_run,
    })
}

fn init_logging(quiet: bool) {
    let default = if quiet { "ccexport=warn" } else { "ccexport=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    init_logging(cli.quiet);

    let project_arg = cli.project.clone().unwrap_or_else(|| PathBuf::from("."));
    let project =
        std::path::absolute(&project_arg).context(ProjectPathSnafu { path: &project_arg })?;

    let date_window = date_window(&cli)?;
    let files = session_files(&cli, &project)?;
    if !cli.quiet {
        eprintln!("Found {} session file(s)", files.len());
    }

    let project_path = project.to_string_lossy().into_owned();
    let opts = ExportOptions {
        output_dir: match &cli.output {
            OutputTarget::Directory(dir) => dir.clone(),
            OutputTarget::Stdout => PathBuf::new(),
        },
        normalize: NormalizeOptions {
            project_path: project_path.clone(),
            date_window,
        },
        render: RenderOptions {
            show_timestamps: cli.show_timestamps,
            project_path,
        },
        write_sidecars: true,
    };

    if cli.dry_run {
        for file in &files {
            eprintln!("Would read {}", file.display());
        }
        if let OutputTarget::Directory(dir) = &cli.output {
            eprintln!("Would write to {}", dir.display());
        }
        return Ok(());
    }

    let mut ctx = ExportContext::new(secret_scanner(cli.redact));
    match &cli.output {
        OutputTarget::Stdout => export_to_stdout(&files, &opts, &mut ctx),
        OutputTarget::Directory(_) => export_to_directory(&files, &opts, &mut ctx, &cli),
    }
}

/// Builds the date window from `--from`, `--to` and `--today`.
fn date_window(cli: &Cli) -> Result<DateWindow, Error> {
    if cli.today {
        ensure!(cli.from.is_none() && cli.to.is_none(), ConflictingDatesSnafu);
        return Ok(DateWindow::day_of(Local::now()));
    }
    DateWindow::parse(cli.from.as_deref(), cli.to.as_deref()).context(DatesSnafu)
}

/// Resolves the session files to read, from explicit inputs or discovery.
fn session_files(cli: &Cli, project: &Path) -> Result<Vec<PathBuf>, Error> {
    if cli.input.is_empty() {
        let home = discovery::find_claude_home_from_env().context(DiscoverySnafu)?;
        return discovery::discover_sessions(&home, project).context(DiscoverySnafu);
    }

    let files = discovery::collect_input_files(&cli.input);
    ensure!(!files.is_empty(), NoInputFilesSnafu);
    Ok(files)
}

fn secret_scanner(enabled: bool) -> Option<Box<dyn SecretScanner>> {
    if !enabled {
        return None;
    }
    match TruffleHogScanner::new() {
        Ok(scanner) => Some(Box::new(scanner)),
        Err(e) => {
            warn!("{e}; secrets will not be redacted");
            None
        }
    }
}

fn export_to_stdout(
    files: &[PathBuf],
    opts: &ExportOptions,
    ctx: &mut ExportContext,
) -> Result<(), Error> {
    let sessions = export::load_sessions(files, &opts.normalize, ctx).context(ExportSnafu)?;
    if sessions.is_empty() {
        eprintln!("No messages to export");
        return Ok(());
    }

    print!("{}", renderer::render_document(&sessions, &opts.render));
    Ok(())
}

fn export_to_directory(
    files: &[PathBuf],
    opts: &ExportOptions,
    ctx: &mut ExportContext,
    cli: &Cli,
) -> Result<(), Error> {
    let summary = export::export(files, opts, ctx).context(ExportSnafu)?;

    let Some(path) = &summary.output_path else {
        if !cli.quiet {
            eprintln!("No messages to export");
        }
        return Ok(());
    };

    if !cli.quiet {
        eprintln!(
            "Exported {} conversation(s) ({} messages) to {}",
            summary.sessions_exported,
            summary.total_messages,
            path.display()
        );
        let skipped = ctx.logged_skips().count();
        if skipped > 0 {
            eprintln!("Skipped {skipped} line(s); see the _skipped.jsonl log");
        }
        if !ctx.secrets.is_empty() {
            eprintln!("Redacted {} secret(s)", ctx.secrets.len());
        }
    }

    if cli.preview {
        let title = summary
            .leaf_summaries
            .last()
            .map_or(DEFAULT_TITLE, |leaf| leaf.summary.as_str());
        // Preview failures never fail the export.
        match HtmlPreview::default().write_preview(path, title) {
            Ok(html) => {
                if !cli.quiet {
                    eprintln!("HTML preview: {}", html.display());
                }
            }
            Err(e) => eprintln!("Preview failed: {e}"),
        }
    }

    Ok(())
}
