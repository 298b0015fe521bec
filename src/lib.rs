// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Export Claude Code session logs to Markdown.
//!
//! Claude Code records each session as a JSONL file: one JSON record per
//! line, mixing conversation messages with tool calls, tool results,
//! compacted summaries and bookkeeping entries. This crate turns those logs
//! into a single readable Markdown document.
//!
//! # Overview
//!
//! 1. [`event`] reads log lines into typed records
//! 2. [`normalizer`] pairs tool calls with their results, drops noise and
//!    redacts secrets, producing an ordered message list per session
//! 3. [`renderer`] lays the sessions out as Markdown, re-ticking nested code
//!    fences with [`fence`] so they cannot break the document
//! 4. [`export`] ties it together and writes the file plus its logs
//!
//! # Example
//!
//! ```no_run
//! use ccexport::export::{export, ExportOptions};
//! use ccexport::normalizer::ExportContext;
//! use std::path::PathBuf;
//!
//! let files = vec![PathBuf::from("session.jsonl")];
//! let mut ctx = ExportContext::default();
//! let summary = export(&files, &ExportOptions::default(), &mut ctx).unwrap();
//!
//! println!("{} messages", summary.total_messages);
//! ```
//!
//! # Modules
//!
//! - [`event`]: JSONL parsing and record classification
//! - [`normalizer`]: the per-session state machine
//! - [`tools`]: Markdown templates for tool calls
//! - [`fence`]: nested code fence analysis and escaping
//! - [`renderer`]: document layout
//! - [`secrets`]: secret scanning and redaction
//! - [`dates`]: date window filtering
//! - [`discovery`]: locating session logs on disk
//! - [`export`]: export orchestration
//! - [`preview`]: HTML preview via an external renderer

#![deny(missing_docs)]

pub mod dates;
pub mod discovery;
pub mod event;
pub mod export;
pub mod fence;
pub mod normalizer;
pub mod preview;
pub mod renderer;
pub mod secrets;
pub mod tools;
