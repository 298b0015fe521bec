// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! HTML preview of an exported document.
//!
//! Markdown is converted by the external `cmark-gfm` renderer and wrapped in
//! a minimal HTML page written next to the Markdown file. A failure here
//! only affects the preview, never the export itself.

use snafu::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Title used when no leaf summary is available.
pub const DEFAULT_TITLE: &str = "Claude Code Conversation";

const EXTENSIONS: &[&str] = &["table", "strikethrough", "autolink", "tasklist"];

/// Error type for preview failures.
#[derive(Debug, Snafu)]
pub enum PreviewError {
    /// The renderer binary could not be started.
    #[snafu(display("{program} not found ({source}); install it with: brew install cmark-gfm"))]
    RendererUnavailable {
        /// The program that was looked up.
        program: String,
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// The renderer could not be fed its input or read from.
    #[snafu(display("failed to communicate with {program}: {source}"))]
    Pipe {
        /// The program being run.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The renderer exited unsuccessfully.
    #[snafu(display("{program} failed ({status}): {stderr}"))]
    RendererFailed {
        /// The program that ran.
        program: String,
        /// Its exit status.
        status: ExitStatus,
        /// What it printed to stderr.
        stderr: String,
    },

    /// The Markdown file could not be read.
    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadMarkdown {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The HTML file could not be written.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteHtml {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Renders Markdown to HTML with `cmark-gfm`.
#[derive(Debug, Clone)]
pub struct HtmlPreview {
    program: String,
}

impl Default for HtmlPreview {
    fn default() -> Self {
        Self::with_program("cmark-gfm")
    }
}

impl HtmlPreview {
    /// Uses `program` instead of `cmark-gfm`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Converts a Markdown document to an HTML fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer cannot be run or exits
    /// unsuccessfully.
    pub fn render(&self, markdown: &str) -> Result<String, PreviewError> {
        let program = &self.program;
        let mut command = Command::new(program);
        command.arg("--unsafe");
        for ext in EXTENSIONS {
            command.args(["-e", ext]);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context(RendererUnavailableSnafu { program })?;

        let written = child
            .stdin
            .take()
            .map_or(Ok(()), |mut stdin| stdin.write_all(markdown.as_bytes()));
        let output = child
            .wait_with_output()
            .context(PipeSnafu { program })?;

        ensure!(
            output.status.success(),
            RendererFailedSnafu {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }
        );
        written.context(PipeSnafu { program })?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Writes `<stem>.html` next to `markdown_path` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the Markdown cannot be read, rendered, or the
    /// HTML cannot be written.
    pub fn write_preview(&self, markdown_path: &Path, title: &str) -> Result<PathBuf, PreviewError> {
        let markdown = std::fs::read_to_string(markdown_path).context(ReadMarkdownSnafu {
            path: markdown_path,
        })?;
        let body = self.render(&markdown)?;

        let path = markdown_path.with_extension("html");
        std::fs::write(&path, html_document(title, &body)).context(WriteHtmlSnafu { path: &path })?;
        Ok(path)
    }
}

/// Wraps an HTML fragment in a minimal page.
#[must_use]
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body.trim_end()
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
