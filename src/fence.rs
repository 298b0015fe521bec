// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Re-ticking of nested Markdown code fences.
//!
//! Tool output often contains fenced code, and that output is itself
//! wrapped in a fence when rendered. With every fence using three backticks,
//! the first inner fence closes the outer block early. This module finds the
//! fences in a text block, guesses how they pair up, and rewrites each pair
//! so that an enclosing block always uses more backticks than anything it
//! contains.
//!
//! Pairing is a heuristic, not a Markdown parser. The rules are applied in a
//! fixed order (see [`analyze`]) and known mis-pairings are kept as they are
//! so that output stays stable across versions.
//!
//! # Example
//!
//! ```
//! use ccexport::fence::escape_nested_fences;
//!
//! let text = "```markdown\nSome docs here\n```json\n{\"a\": 1, \"b\": 2}\n```\nmore text here\n```";
//! let escaped = escape_nested_fences(text);
//!
//! assert!(escaped.starts_with("````markdown\n"));
//! assert!(escaped.contains("```json\n"));
//! assert!(escaped.ends_with("\n````"));
//! ```

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// A run of three or more backticks at the start of a line, with an optional
/// language tag. The leading newline, when present, is part of the match.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^|\n)(`{3,})([a-zA-Z0-9]*)").expect("fence pattern is valid")
});

/// Minimum trimmed length of the text between two fences for an untagged
/// fence to close the opener before it.
const MIN_BLOCK_CONTENT: usize = 10;

/// The smallest number of backticks that forms a fence.
const MIN_TICKS: usize = 3;

/// A fence delimiter found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFence {
    /// Byte offset of the match (including the leading newline, if any).
    pub position: usize,
    /// Byte offset of the first backtick.
    pub ticks_start: usize,
    /// Number of backticks in the run.
    pub tick_count: usize,
    /// Language tag following the run, if any.
    pub language: Option<String>,
    /// Byte offset just past the match.
    pub end: usize,
}

impl CodeFence {
    /// Returns `true` if the fence carries a language tag.
    #[must_use]
    pub const fn has_language_tag(&self) -> bool {
        self.language.is_some()
    }
}

/// A pair of fences treated as one code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Index of the opening fence.
    pub opener: usize,
    /// Index of the closing fence.
    pub closer: usize,
    /// Byte offset where the block starts.
    pub start_pos: usize,
    /// Byte offset just past the closing fence.
    pub end_pos: usize,
    /// Backticks on the opening fence as written.
    pub tick_count: usize,
    /// Number of other blocks that strictly contain this one.
    pub depth: usize,
    /// Byte range between the two fences.
    pub content: Range<usize>,
    /// Backticks this block gets after escaping.
    pub target_ticks: usize,
}

/// The fences and blocks found in a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceAnalysis {
    /// Every fence, in text order.
    pub fences: Vec<CodeFence>,
    /// Every paired block, in the order pairs were formed.
    pub blocks: Vec<CodeBlock>,
}

/// Finds and pairs the code fences in `text`.
///
/// Each fence is examined in order against an explicit stack of unmatched
/// openers, and the first matching rule decides:
///
/// 1. A fence with a language tag opens a block.
/// 2. An untagged fence closes the opener on top of the stack when both have
///    the same tick count and more than a few characters separate them.
/// 3. An untagged fence that is not the last one, and is followed by
///    non-empty text not starting with `#`, opens a block.
/// 4. Otherwise it closes the most recent opener with the same tick count,
///    or failing that the most recent opener of any tick count.
///
/// Fences left on the stack at the end are not paired and keep their ticks.
#[must_use]
pub fn analyze(text: &str) -> FenceAnalysis {
    let fences = find_fences(text);
    let pairs = pair_fences(text, &fences);

    let mut blocks: Vec<CodeBlock> = pairs
        .into_iter()
        .map(|(opener, closer)| {
            let open = &fences[opener];
            let close = &fences[closer];
            CodeBlock {
                opener,
                closer,
                start_pos: open.position,
                end_pos: close.end,
                tick_count: open.tick_count,
                depth: 0,
                content: open.end..close.position,
                target_ticks: open.tick_count,
            }
        })
        .collect();

    let depths: Vec<usize> = blocks
        .iter()
        .map(|block| {
            blocks
                .iter()
                .filter(|other| other.start_pos < block.start_pos && block.end_pos < other.end_pos)
                .count()
        })
        .collect();

    let max_depth = depths.iter().copied().max().unwrap_or(0);
    for (block, depth) in blocks.iter_mut().zip(depths) {
        block.depth = depth;
        block.target_ticks = MIN_TICKS + (max_depth - depth);
    }

    FenceAnalysis { fences, blocks }
}

/// Rewrites the fences in `text` so nested blocks cannot close their parents.
///
/// The outermost blocks get the longest backtick runs and the innermost get
/// exactly three. Unpaired fences are left untouched.
#[must_use]
pub fn escape_nested_fences(text: &str) -> String {
    let analysis = analyze(text);

    let mut edits: Vec<(usize, usize, usize)> = Vec::new();
    for block in &analysis.blocks {
        for index in [block.opener, block.closer] {
            let fence = &analysis.fences[index];
            if fence.tick_count != block.target_ticks {
                edits.push((fence.ticks_start, fence.tick_count, block.target_ticks));
            }
        }
    }

    // Apply back to front so earlier offsets stay valid.
    edits.sort_by(|a, b| b.0.cmp(&a.0));

    let mut result = text.to_owned();
    for (start, old, new) in edits {
        result.replace_range(start..start + old, &"`".repeat(new));
    }
    result
}

/// Returns a backtick run long enough to fence `content` safely.
///
/// The run is one longer than the longest run that starts a line in
/// `content`, and never shorter than three.
#[must_use]
pub fn fence_for(content: &str) -> String {
    let longest = content
        .lines()
        .map(|line| line.trim_start().chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(MIN_TICKS))
}

fn find_fences(text: &str) -> Vec<CodeFence> {
    FENCE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let ticks = caps.get(2)?;
            let language = caps
                .get(3)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_owned);
            Some(CodeFence {
                position: whole.start(),
                ticks_start: ticks.start(),
                tick_count: ticks.len(),
                language,
                end: whole.end(),
            })
        })
        .collect()
}

fn pair_fences(text: &str, fences: &[CodeFence]) -> Vec<(usize, usize)> {
    let mut stack: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();

    for (i, fence) in fences.iter().enumerate() {
        if fence.has_language_tag() {
            stack.push(i);
            continue;
        }

        if let Some(&top) = stack.last()
            && i > 0
        {
            let opener = &fences[top];
            let between = text[opener.end..fence.position].trim();
            if between.chars().count() > MIN_BLOCK_CONTENT && opener.tick_count == fence.tick_count
            {
                pairs.push((top, i));
                stack.pop();
                continue;
            }
        }

        if let Some(next) = fences.get(i + 1) {
            let after = text[fence.end..next.position].trim();
            if !after.is_empty() && !after.starts_with('#') {
                stack.push(i);
                continue;
            }
        }

        if let Some(j) = stack
            .iter()
            .rposition(|&s| fences[s].tick_count == fence.tick_count)
        {
            pairs.push((stack.remove(j), i));
        } else if let Some(top) = stack.pop() {
            pairs.push((top, i));
        }
    }

    pairs
}
