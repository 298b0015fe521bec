// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Locating session logs on disk.
//!
//! Claude Code keeps one directory per project under `<home>/projects/`,
//! named after the project's absolute path with separators replaced by `-`.
//! Each directory holds one `<session id>.jsonl` file per session.

use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Error type for discovery failures.
///
/// All of these are fatal: they are raised before any session is read.
#[derive(Debug, Snafu)]
pub enum DiscoveryError {
    /// No candidate home directory has a `projects` sub-directory.
    #[snafu(display("Claude home directory not found. Searched: {}", display_paths(searched)))]
    ClaudeHomeNotFound {
        /// The candidates that were checked.
        searched: Vec<PathBuf>,
    },

    /// No session directory matches the project.
    #[snafu(display("No Claude sessions found for project: {}", project.display()))]
    NoSessions {
        /// The project path that was looked up.
        project: PathBuf,
    },

    /// The session directory (or explicit inputs) contain no `.jsonl` files.
    #[snafu(display("No session files found in {}", dir.display()))]
    NoSessionFiles {
        /// The directory that was listed.
        dir: PathBuf,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds the Claude home under `home`.
///
/// Checks `~/.claude` then `~/.config/claude` and returns the first one
/// containing a `projects` directory.
///
/// # Errors
///
/// Returns [`DiscoveryError::ClaudeHomeNotFound`] if neither qualifies.
pub fn find_claude_home(home: &Path) -> Result<PathBuf, DiscoveryError> {
    let candidates = vec![home.join(".claude"), home.join(".config").join("claude")];

    let found = candidates.iter().find(|c| c.join("projects").is_dir()).cloned();
    found.context(ClaudeHomeNotFoundSnafu {
        searched: candidates,
    })
}

/// Finds the Claude home from the `HOME` environment variable.
///
/// # Errors
///
/// Returns [`DiscoveryError::ClaudeHomeNotFound`] if `HOME` is unset or no
/// candidate qualifies.
pub fn find_claude_home_from_env() -> Result<PathBuf, DiscoveryError> {
    let home = std::env::var_os("HOME").context(ClaudeHomeNotFoundSnafu {
        searched: Vec::<PathBuf>::new(),
    })?;
    find_claude_home(Path::new(&home))
}

/// Encodes a project path the way Claude Code names project directories.
#[must_use]
pub fn encode_project_path(path: &Path) -> String {
    path.to_string_lossy().replace(['/', '_'], "-")
}

/// Finds the session directory for `project` under `claude_home`.
///
/// Uses the encoded project path when that directory exists; otherwise
/// falls back to the first project directory (by name) whose name contains
/// the project's base name.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoSessions`] if nothing matches.
pub fn find_session_dir(claude_home: &Path, project: &Path) -> Result<PathBuf, DiscoveryError> {
    let projects = claude_home.join("projects");
    let exact = projects.join(encode_project_path(project));
    if exact.is_dir() {
        return Ok(exact);
    }

    let name = project
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context(NoSessionsSnafu { project })?;
    debug!(project = %project.display(), "no exact session directory, searching by name");

    WalkDir::new(&projects)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|e| e.file_type().is_dir() && e.file_name().to_string_lossy().contains(&name))
        .map(walkdir::DirEntry::into_path)
        .context(NoSessionsSnafu { project })
}

/// Lists the `*.jsonl` files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoSessionFiles`] if there are none.
pub fn list_session_files(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_jsonl(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    ensure!(!files.is_empty(), NoSessionFilesSnafu { dir });
    Ok(files)
}

/// Finds every session file for `project`.
///
/// # Errors
///
/// Returns an error if the Claude home, the project's session directory,
/// or any session file cannot be found.
pub fn discover_sessions(claude_home: &Path, project: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let dir = find_session_dir(claude_home, project)?;
    list_session_files(&dir)
}

/// Collects session files from explicit inputs (files and directories).
///
/// Directories are walked recursively for `*.jsonl`; files are taken as
/// given.
#[must_use]
pub fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && is_jsonl(e.path()))
            {
                files.push(entry.into_path());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
}
