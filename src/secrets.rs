// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Secret detection and redaction.
//!
//! Detection is delegated to an external scanner behind the [`SecretScanner`]
//! trait. The production implementation, [`TruffleHogScanner`], shells out to
//! `trufflehog`; tests substitute an in-memory scanner.

use serde_json::Value;
use snafu::prelude::*;
use std::io::Write;
use std::process::{Command, Stdio};

/// Default replacement text for redacted secrets.
pub const REDACTED: &str = "[REDACTED]";

/// Error type for secret scanning failures.
#[derive(Debug, Snafu)]
pub enum ScanError {
    /// The scanner binary could not be run at all.
    #[snafu(display("{program} not found: {source}"))]
    Unavailable {
        /// The program that was looked up.
        program: String,
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// The text could not be staged for scanning.
    #[snafu(display("failed to write scan input: {source}"))]
    TempFile {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The scanner started but could not be run to completion.
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        /// The program that was run.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// A secret found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// The finding category (always "secret" for the bundled scanner).
    pub kind: String,
    /// The detector that matched (e.g., "AWS", "Slack").
    pub pattern_name: String,
    /// The exact substring that matched.
    pub matched_text: String,
    /// Whether the scanner verified the secret as live.
    pub confidence: bool,
}

/// Something that can find secrets in text.
pub trait SecretScanner {
    /// Returns every secret found in `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scanner cannot be run.
    fn scan(&self, text: &str) -> Result<Vec<Finding>, ScanError>;

    /// Scans `text` and replaces every finding with `replacement`.
    ///
    /// Longer matches are replaced first so that a secret containing
    /// another secret is not left partially exposed.
    ///
    /// # Errors
    ///
    /// Returns an error if the scanner cannot be run.
    fn redact(&self, text: &str, replacement: &str) -> Result<(String, Vec<Finding>), ScanError> {
        if text.trim().is_empty() {
            return Ok((text.to_owned(), Vec::new()));
        }

        let findings = self.scan(text)?;
        Ok((redact_findings(text, &findings, replacement), findings))
    }
}

/// Replaces each finding's matched text, longest match first.
#[must_use]
pub fn redact_findings(text: &str, findings: &[Finding], replacement: &str) -> String {
    let mut matches: Vec<&str> = findings
        .iter()
        .map(|f| f.matched_text.as_str())
        .filter(|m| !m.is_empty())
        .collect();
    matches.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    matches.dedup();

    matches
        .into_iter()
        .fold(text.to_owned(), |acc, m| acc.replace(m, replacement))
}

/// Scans text with the `trufflehog` command-line tool.
///
/// Each scan stages the text in a temporary file and runs
/// `trufflehog filesystem --json --no-verification` over it.
#[derive(Debug, Clone)]
pub struct TruffleHogScanner {
    program: String,
}

impl TruffleHogScanner {
    /// Creates a scanner, checking that `trufflehog` can be executed.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Unavailable`] if the binary cannot be spawned.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_program("trufflehog")
    }

    /// Creates a scanner that runs the given program instead of `trufflehog`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Unavailable`] if the program cannot be spawned.
    pub fn with_program(program: impl Into<String>) -> Result<Self, ScanError> {
        let program = program.into();
        Command::new(&program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context(UnavailableSnafu { program: &program })?;
        Ok(Self { program })
    }
}

impl SecretScanner for TruffleHogScanner {
    fn scan(&self, text: &str) -> Result<Vec<Finding>, ScanError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut file = tempfile::Builder::new()
            .prefix("ccexport_scan")
            .suffix(".txt")
            .tempfile()
            .context(TempFileSnafu)?;
        file.write_all(text.as_bytes()).context(TempFileSnafu)?;
        file.flush().context(TempFileSnafu)?;

        let output = Command::new(&self.program)
            .args(["filesystem", "--json", "--no-verification"])
            .arg(file.path())
            .stderr(Stdio::null())
            .output()
            .context(SpawnSnafu {
                program: &self.program,
            })?;

        Ok(parse_trufflehog_output(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

/// Parses trufflehog's JSON-lines output, ignoring log lines and noise.
fn parse_trufflehog_output(output: &str) -> Vec<Finding> {
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .filter_map(|result| {
            let detector = result.get("DetectorName")?.as_str()?;
            let raw = result.get("Raw")?.as_str()?;
            Some(Finding {
                kind: "secret".to_owned(),
                pattern_name: detector.to_owned(),
                matched_text: raw.to_owned(),
                confidence: result
                    .get("Verified")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}
