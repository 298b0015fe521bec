// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering for normalized sessions.
//!
//! This module assembles one or more [`Session`]s into a single Markdown
//! document. Sessions are ordered by their first timestamp, every message
//! body is passed through [`escape_nested_fences`], and absolute project
//! paths are rewritten to relative ones in a final pass.
//!
//! # Output Format
//!
//! The rendered Markdown includes:
//! - A top-level `# Claude Code Conversation` heading
//! - Session metadata (id, start, last activity, message counts)
//! - A role heading per message, e.g. `## 👤 User` or `## 🤖 Assistant`
//! - For several sessions, a `# Session N` section per session, each
//!   preceded by a `---` rule
//!
//! # Example
//!
//! ```
//! use ccexport::normalizer::{NormalizedMessage, Role, Session};
//! use ccexport::renderer::{render_document, RenderOptions};
//!
//! let session = Session {
//!     id: "abc123".into(),
//!     messages: vec![NormalizedMessage {
//!         role: Role::User,
//!         content: "Hello!".into(),
//!         timestamp: None,
//!         message_id: None,
//!         sequence_index: 0,
//!     }],
//! };
//!
//! let markdown = render_document(&[session], &RenderOptions::default());
//!
//! assert!(markdown.starts_with("# Claude Code Conversation"));
//! assert!(markdown.contains("## 👤 User\n\nHello!"));
//! ```

use crate::dates::HEADING_TIMESTAMP_FORMAT;
use crate::fence::escape_nested_fences;
use crate::normalizer::{NormalizedMessage, Role, Session};
use crate::tools::TOOL_HEADING;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

/// Format of the start and last-activity metadata lines.
const METADATA_TIME_FORMAT: &str = "%B %d, %Y at %I:%M %p";

/// Configuration options for Markdown rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Whether to show each message's timestamp next to its heading.
    pub show_timestamps: bool,

    /// Project root; occurrences in the output are made relative.
    ///
    /// Empty disables the rewrite.
    pub project_path: String,
}

/// Returns the heading for a role.
const fn role_heading(role: Role) -> &'static str {
    match role {
        Role::User => "## 👤 User",
        Role::Assistant => "## 🤖 Assistant",
        Role::AssistantThinking => "## 🤖💭 Assistant",
        Role::System => "## ⚙️ System",
    }
}

/// Renders sessions as a single Markdown document.
///
/// Sessions are sorted by first timestamp; sessions without any timestamp
/// go last, keeping their relative order.
#[must_use]
pub fn render_document(sessions: &[Session], opts: &RenderOptions) -> String {
    let ordered = chronological(sessions);

    let mut out = String::new();
    writeln!(out, "# Claude Code Conversation\n").unwrap();

    if let &[session] = ordered.as_slice() {
        writeln!(out, "**Session:** `{}`  ", session.id).unwrap();
        render_summary(&mut out, &[session]);
        render_messages(&mut out, session, opts);
    } else {
        writeln!(out, "**Sessions:** {}  ", ordered.len()).unwrap();
        render_summary(&mut out, &ordered);

        for (index, session) in ordered.iter().copied().enumerate() {
            if index > 0 {
                writeln!(out, "---\n").unwrap();
            }
            writeln!(out, "# Session {}\n", index + 1).unwrap();
            writeln!(out, "**Session:** `{}`  ", session.id).unwrap();
            render_summary(&mut out, &[session]);
            render_messages(&mut out, session, opts);
        }
    }

    make_paths_relative(out.trim_end(), &opts.project_path) + "\n"
}

/// Orders sessions by first timestamp, undated sessions last.
#[must_use]
pub fn chronological(sessions: &[Session]) -> Vec<&Session> {
    let mut ordered: Vec<&Session> = sessions.iter().collect();
    ordered.sort_by_key(|s| {
        let first = s.first_timestamp();
        (first.is_none(), first)
    });
    ordered
}

/// Writes start, last activity and message counts, then a rule.
fn render_summary(out: &mut String, sessions: &[&Session]) {
    let first = sessions.iter().filter_map(|s| s.first_timestamp()).min();
    let last = sessions.iter().filter_map(|s| s.last_timestamp()).max();

    if let Some(first) = first {
        writeln!(out, "**Started:** {}  ", local_time(first, METADATA_TIME_FORMAT)).unwrap();
    }
    if let Some(last) = last {
        writeln!(
            out,
            "**Last activity:** {}  ",
            local_time(last, METADATA_TIME_FORMAT)
        )
        .unwrap();
    }

    let total: usize = sessions.iter().map(|s| s.messages.len()).sum();
    let users: usize = sessions.iter().map(|s| s.user_count()).sum();
    let assistants: usize = sessions.iter().map(|s| s.assistant_count()).sum();
    writeln!(
        out,
        "**Messages:** {total} ({users} user, {assistants} assistant)\n\n---\n"
    )
    .unwrap();
}

fn render_messages(out: &mut String, session: &Session, opts: &RenderOptions) {
    for message in &session.messages {
        render_message(out, message, opts);
    }
}

fn render_message(out: &mut String, message: &NormalizedMessage, opts: &RenderOptions) {
    let timestamp = message
        .timestamp
        .filter(|_| opts.show_timestamps)
        .map(|ts| local_time(ts, HEADING_TIMESTAMP_FORMAT));

    // Tool blocks carry their own heading; the timestamp goes beneath it.
    let body = if let Some(rest) = message.content.strip_prefix(TOOL_HEADING) {
        writeln!(out, "{TOOL_HEADING}\n").unwrap();
        if let Some(ts) = &timestamp {
            writeln!(out, "*{ts}*\n").unwrap();
        }
        rest.trim_start_matches('\n')
    } else {
        match &timestamp {
            Some(ts) => writeln!(out, "{} - {ts}\n", role_heading(message.role)).unwrap(),
            None => writeln!(out, "{}\n", role_heading(message.role)).unwrap(),
        }
        message.content.as_str()
    };

    if let Some(id) = &message.message_id {
        writeln!(out, "<!-- message_id: {id} -->").unwrap();
    }
    writeln!(out, "{}\n", escape_nested_fences(body)).unwrap();
}

fn local_time(ts: DateTime<Utc>, format: &str) -> String {
    ts.with_timezone(&Local).format(format).to_string()
}

/// Rewrites absolute project paths to relative ones.
///
/// `<project>/` is removed first, then any remaining bare `<project>`
/// becomes `.`.
#[must_use]
pub fn make_paths_relative(text: &str, project_path: &str) -> String {
    let project = project_path.trim_end_matches('/');
    if project.is_empty() {
        return text.to_owned();
    }
    text.replace(&format!("{project}/"), "").replace(project, ".")
}
