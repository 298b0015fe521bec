// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Export orchestration: sessions in, one Markdown file out.
//!
//! An export reads every session file in order, normalizes it, renders all
//! non-empty sessions into one document and writes it to the output
//! directory together with the skip and secret logs.

use crate::event::{LeafSummary, ReadError};
use crate::normalizer::{ExportContext, NormalizeOptions, Role, Session, read_session};
use crate::renderer::{RenderOptions, chronological, render_document};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use snafu::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Filler words dropped from the start of a title.
static TITLE_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(drop it\.?|real|actually|honestly)\b[\s,.]*")
        .expect("title filler pattern is valid")
});

const MAX_TITLE_LEN: usize = 50;
const TITLE_WORDS: usize = 5;

/// Error type for export failures.
#[derive(Debug, Snafu)]
pub enum ExportError {
    /// A session file could not be read.
    #[snafu(display("{source}"))]
    Read {
        /// The underlying read error.
        source: ReadError,
    },

    /// The output directory could not be created.
    #[snafu(display("failed to create output directory {}: {source}", path.display()))]
    CreateOutputDir {
        /// The directory being created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An output file could not be written.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A log record could not be serialized.
    #[snafu(display("failed to serialize log record: {source}"))]
    SerializeLog {
        /// The underlying serialization error.
        source: serde_json::Error,
    },
}

/// Options for a full export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Directory receiving the Markdown file and its logs.
    pub output_dir: PathBuf,
    /// Normalization options applied to every session.
    pub normalize: NormalizeOptions,
    /// Rendering options for the document.
    pub render: RenderOptions,
    /// Whether to write the skip and secret logs.
    pub write_sidecars: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("claude-conversations"),
            normalize: NormalizeOptions::default(),
            render: RenderOptions::default(),
            write_sidecars: true,
        }
    }
}

/// What an export produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Number of sessions that contributed messages.
    pub sessions_exported: usize,
    /// Number of messages across those sessions.
    pub total_messages: usize,
    /// The Markdown file written, if any.
    pub output_path: Option<PathBuf>,
    /// Leaf summaries seen while reading.
    pub leaf_summaries: Vec<LeafSummary>,
}

/// Reads and normalizes session files, dropping sessions with no messages.
///
/// # Errors
///
/// Returns an error if any file cannot be read.
pub fn load_sessions(
    files: &[PathBuf],
    opts: &NormalizeOptions,
    ctx: &mut ExportContext,
) -> Result<Vec<Session>, ExportError> {
    let mut sessions = Vec::new();
    for path in files {
        let session = read_session(path, opts, ctx).context(ReadSnafu)?;
        if session.messages.is_empty() {
            debug!(session = %session.id, "session has no messages, not exporting");
            continue;
        }
        sessions.push(session);
    }
    Ok(sessions)
}

/// Exports `files` into a single Markdown document under the output
/// directory.
///
/// No file is written when no session has any message.
///
/// # Errors
///
/// Returns an error if a session cannot be read or an output file cannot be
/// written.
pub fn export(
    files: &[PathBuf],
    opts: &ExportOptions,
    ctx: &mut ExportContext,
) -> Result<ExportSummary, ExportError> {
    let sessions = load_sessions(files, &opts.normalize, ctx)?;
    let total_messages = sessions.iter().map(|s| s.messages.len()).sum();

    let mut summary = ExportSummary {
        sessions_exported: sessions.len(),
        total_messages,
        output_path: None,
        leaf_summaries: ctx.leaf_summaries.clone(),
    };
    if sessions.is_empty() {
        info!("no messages to export");
        return Ok(summary);
    }

    let markdown = render_document(&sessions, &opts.render);
    let filename = output_filename(&sessions, Local::now());
    let path = opts.output_dir.join(&filename);

    std::fs::create_dir_all(&opts.output_dir).context(CreateOutputDirSnafu {
        path: &opts.output_dir,
    })?;
    std::fs::write(&path, &markdown).context(WriteFileSnafu { path: &path })?;

    if opts.write_sidecars {
        write_sidecars(&path, ctx)?;
    }

    info!(
        sessions = summary.sessions_exported,
        messages = summary.total_messages,
        path = %path.display(),
        "export complete"
    );
    summary.output_path = Some(path);
    Ok(summary)
}

/// Writes `<stem>_skipped.jsonl` and `<stem>_secrets.jsonl` next to
/// `markdown_path`, each only when it would be non-empty.
///
/// Date-filtered lines are not written to the skip log.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or a file cannot be
/// written.
pub fn write_sidecars(markdown_path: &Path, ctx: &ExportContext) -> Result<(), ExportError> {
    write_jsonl(
        &sidecar_path(markdown_path, "skipped"),
        ctx.logged_skips(),
    )?;
    write_jsonl(&sidecar_path(markdown_path, "secrets"), ctx.secrets.iter())?;
    Ok(())
}

fn sidecar_path(markdown_path: &Path, kind: &str) -> PathBuf {
    let stem = markdown_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    markdown_path.with_file_name(format!("{stem}_{kind}.jsonl"))
}

fn write_jsonl<T: Serialize>(
    path: &Path,
    records: impl Iterator<Item = T>,
) -> Result<(), ExportError> {
    let mut out = String::new();
    for record in records {
        let line = serde_json::to_string(&record).context(SerializeLogSnafu)?;
        writeln!(out, "{line}").unwrap();
    }
    if out.is_empty() {
        return Ok(());
    }

    std::fs::write(path, out).context(WriteFileSnafu { path })
}

/// Builds the output file name for `sessions`.
///
/// One session: `<YYYYmmdd-HHMMSS>-<title>-<session id>.md`; several:
/// `<YYYYmmdd-HHMMSS>-<title>-combined-<N>-sessions.md`.
#[must_use]
pub fn output_filename(sessions: &[Session], now: DateTime<Local>) -> String {
    let ordered = chronological(sessions);
    let stamp = now.format("%Y%m%d-%H%M%S");
    let title = generate_title(&ordered);

    match ordered.as_slice() {
        [session] => format!("{stamp}-{title}-{}.md", session.id),
        _ => format!("{stamp}-{title}-combined-{}-sessions.md", ordered.len()),
    }
}

/// Derives a short, file-name-safe title from the first user message.
#[must_use]
pub fn generate_title(sessions: &[&Session]) -> String {
    let Some(message) = sessions
        .iter()
        .flat_map(|s| &s.messages)
        .find(|m| m.role == Role::User)
    else {
        return "untitled".to_owned();
    };

    let first_line = message.content.lines().next().unwrap_or_default();
    let stripped = TITLE_FILLER.replace(first_line, "");

    let mut title: String = stripped
        .split(|c: char| c.is_whitespace() || c == '/')
        .filter(|w| !w.is_empty())
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    title.truncate(MAX_TITLE_LEN);

    if title.is_empty() {
        "untitled".to_owned()
    } else {
        title
    }
}
