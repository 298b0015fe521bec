// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown templates for tool invocations.
//!
//! Each tool call becomes a self-headed block: a fixed heading, then a
//! collapsible `<details>` element whose summary names the tool. A few tools
//! get dedicated templates; everything else shows its input as JSON. When a
//! result is available it follows in a second collapsible section.

use crate::fence::fence_for;
use serde_json::Value;
use std::fmt::Write;
use std::path::Path;

/// Heading that starts every rendered tool block.
pub const TOOL_HEADING: &str = "## 🤖🔧 Assistant";

/// Summary and body of a tool's collapsible section.
struct Section {
    summary: String,
    body: String,
}

type TemplateFn = fn(&ToolTemplateRenderer, &Value) -> Option<Section>;

/// Tools with dedicated templates. A template returns `None` when the input
/// lacks the field it is keyed on, and the default template is used instead.
const TEMPLATES: &[(&str, TemplateFn)] = &[
    ("Write", ToolTemplateRenderer::write),
    ("Edit", ToolTemplateRenderer::edit),
    ("Bash", ToolTemplateRenderer::bash),
    ("TodoWrite", ToolTemplateRenderer::todo_write),
];

/// Renders tool invocations (and optionally their results) as Markdown.
#[derive(Debug, Clone, Default)]
pub struct ToolTemplateRenderer {
    project_path: String,
}

impl ToolTemplateRenderer {
    /// Creates a renderer that shows paths relative to `project_path`.
    #[must_use]
    pub fn new(project_path: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Renders one tool invocation.
    ///
    /// # Arguments
    ///
    /// * `name` - The tool name, used to pick a template
    /// * `input` - The tool's input parameters
    /// * `result` - The tool's output, if it has been paired
    #[must_use]
    pub fn render(&self, name: &str, input: &Value, result: Option<&Value>) -> String {
        let section = TEMPLATES
            .iter()
            .find(|(tool, _)| *tool == name)
            .and_then(|(_, template)| template(self, input))
            .unwrap_or_else(|| Section {
                summary: name.to_owned(),
                body: json_block(input),
            });

        let mut out = String::new();
        writeln!(out, "{TOOL_HEADING}").unwrap();
        writeln!(out, "<details>").unwrap();
        writeln!(out, "<summary>{}</summary>", section.summary).unwrap();
        writeln!(out).unwrap();
        writeln!(out, "{}", section.body).unwrap();
        write!(out, "</details>").unwrap();

        if let Some(result) = result {
            let text = result_text(result);
            let fence = fence_for(&text);
            write!(
                out,
                "\n\n<details>\n<summary>Tool Result</summary>\n\n{fence}\n{text}\n{fence}\n</details>"
            )
            .unwrap();
        }

        out
    }

    fn write(&self, input: &Value) -> Option<Section> {
        let file_path = input.get("file_path")?.as_str()?;
        let body = match input.get("content").and_then(Value::as_str) {
            Some(content) => fenced(content, language_for(file_path)),
            None => json_block(input),
        };

        Some(Section {
            summary: format!("Write {}", self.relative_path(file_path)),
            body,
        })
    }

    fn edit(&self, input: &Value) -> Option<Section> {
        let file_path = input.get("file_path")?.as_str()?;
        let old = input.get("old_string").and_then(Value::as_str);
        let new = input.get("new_string").and_then(Value::as_str);

        let body = match (old, new) {
            (Some(old), Some(new)) => {
                let language = language_for(file_path);
                format!(
                    "**Before:**\n{}\n\n**After:**\n{}",
                    fenced(old, language),
                    fenced(new, language)
                )
            }
            _ => json_block(input),
        };

        Some(Section {
            summary: format!("Edit {}", self.relative_path(file_path)),
            body,
        })
    }

    fn bash(&self, input: &Value) -> Option<Section> {
        let command = input.get("command")?.as_str()?;
        let description = input
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("Run bash command");

        let command = if self.project_path.is_empty() {
            command.to_owned()
        } else {
            command.replace(&self.project_path, ".")
        };

        Some(Section {
            summary: format!("Bash: {description}"),
            body: fenced(&command, "bash"),
        })
    }

    #[allow(clippy::unused_self)]
    fn todo_write(&self, input: &Value) -> Option<Section> {
        let todos = input.get("todos")?.as_array()?;
        Some(Section {
            summary: "TodoWrite".to_owned(),
            body: todo_list(todos),
        })
    }

    /// Strips the project root from `path`.
    fn relative_path(&self, path: &str) -> String {
        if self.project_path.is_empty() {
            return path.to_owned();
        }
        path.replace(&self.project_path, "")
            .trim_start_matches('/')
            .to_owned()
    }
}

/// Formats a todo list as one status-emoji line per item.
///
/// Lines end in two spaces so Markdown renders them as separate lines.
fn todo_list(todos: &[Value]) -> String {
    todos
        .iter()
        .map(|todo| {
            let emoji = match todo.get("status").and_then(Value::as_str) {
                Some("completed") => "✅",
                Some("in_progress") => "🔄",
                Some("pending") => "⏳",
                _ => "❓",
            };
            let content = todo.get("content").and_then(Value::as_str).unwrap_or("");
            format!("{emoji} {content}  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Picks a fence language from a file extension.
fn language_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("rb") => "ruby",
        Some("js") => "javascript",
        Some("py") => "python",
        Some("ts") => "typescript",
        Some("json") => "json",
        Some("md") => "markdown",
        Some("yml" | "yaml") => "yaml",
        Some("sh") => "bash",
        Some("rs") => "rust",
        _ => "",
    }
}

/// Wraps `content` in a fence long enough that it cannot be closed early.
fn fenced(content: &str, language: &str) -> String {
    let fence = fence_for(content);
    format!("{fence}{language}\n{content}\n{fence}")
}

fn json_block(value: &Value) -> String {
    fenced(&pretty_json(value), "json")
}

/// Pretty-prints a JSON value.
pub(crate) fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Extracts displayable text from a tool result payload.
///
/// Strings are used verbatim and lists of text blocks are joined; anything
/// else is pretty-printed.
#[must_use]
pub fn result_text(result: &Value) -> String {
    if let Some(text) = result.as_str() {
        return text.to_owned();
    }

    if let Some(items) = result.as_array() {
        let texts: Option<Vec<&str>> = items
            .iter()
            .map(|item| {
                (item.get("type")?.as_str()? == "text")
                    .then(|| item.get("text")?.as_str())
                    .flatten()
            })
            .collect();
        if let Some(texts) = texts
            && !texts.is_empty()
        {
            return texts.join("\n");
        }
    }

    pretty_json(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer() -> ToolTemplateRenderer {
        ToolTemplateRenderer::new("/test/project")
    }

    #[test]
    fn renders_default_template_as_json() {
        let out = renderer().render("Read", &json!({ "file_path": "/path/to/file.txt" }), None);

        assert!(out.starts_with(TOOL_HEADING));
        assert!(out.contains("<details>"));
        assert!(out.contains("<summary>Read</summary>"));
        assert!(out.contains("```json"));
        assert!(out.contains("\"file_path\""));
        assert!(out.ends_with("</details>"));
        assert!(!out.contains("Tool Result"));
    }

    #[test]
    fn appends_tool_result_section() {
        let out = renderer().render(
            "Read",
            &json!({ "file_path": "/path/to/file.txt" }),
            Some(&json!("File contents here")),
        );

        assert!(out.contains("<summary>Tool Result</summary>"));
        assert!(out.contains("```\nFile contents here\n```"));
        assert_eq!(out.matches("</details>").count(), 2);
    }

    #[test]
    fn pretty_prints_non_string_results() {
        let out = renderer().render("Glob", &json!({}), Some(&json!({ "matches": 2 })));
        assert!(out.contains("\"matches\": 2"));
    }

    #[test]
    fn write_uses_relative_path_and_language() {
        let out = renderer().render(
            "Write",
            &json!({ "file_path": "/test/project/lib/example.rb", "content": "puts \"hello\"" }),
            None,
        );

        assert!(out.contains("<summary>Write lib/example.rb</summary>"));
        assert!(out.contains("```ruby\nputs \"hello\"\n```"));
    }

    #[test]
    fn write_detects_languages() {
        let cases = [
            ("js", "javascript"),
            ("py", "python"),
            ("ts", "typescript"),
            ("json", "json"),
            ("md", "markdown"),
            ("yml", "yaml"),
            ("yaml", "yaml"),
            ("sh", "bash"),
        ];
        for (ext, lang) in cases {
            let out = renderer().render(
                "Write",
                &json!({ "file_path": format!("/test/project/file.{ext}"), "content": "content" }),
                None,
            );
            assert!(out.contains(&format!("```{lang}\n")), "{ext} -> {lang}");
        }
    }

    #[test]
    fn write_outgrows_fences_in_content() {
        let out = renderer().render(
            "Write",
            &json!({
                "file_path": "/test/project/README.md",
                "content": "# Title\n\n```rust\nfn main() {}\n```"
            }),
            None,
        );

        assert!(out.contains("````markdown\n# Title"));
        assert!(out.contains("```\n````"));
    }

    #[test]
    fn write_without_content_falls_back_to_json() {
        let out = renderer().render("Write", &json!({ "file_path": "/test/project/a.txt" }), None);
        assert!(out.contains("<summary>Write a.txt</summary>"));
        assert!(out.contains("```json"));
    }

    #[test]
    fn write_without_path_uses_default() {
        let out = renderer().render("Write", &json!({ "content": "x" }), None);
        assert!(out.contains("<summary>Write</summary>"));
    }

    #[test]
    fn edit_shows_before_and_after() {
        let out = renderer().render(
            "Edit",
            &json!({
                "file_path": "/test/project/src/code.rb",
                "old_string": "def old_method\nend",
                "new_string": "def new_method\nend"
            }),
            None,
        );

        assert!(out.contains("<summary>Edit src/code.rb</summary>"));
        assert!(out.contains("**Before:**\n```ruby\ndef old_method\nend\n```"));
        assert!(out.contains("**After:**\n```ruby\ndef new_method\nend\n```"));
    }

    #[test]
    fn edit_without_strings_falls_back_to_json() {
        let out = renderer().render(
            "Edit",
            &json!({ "file_path": "/test/project/file.txt", "some_param": "value" }),
            None,
        );

        assert!(out.contains("```json"));
        assert!(out.contains("\"some_param\""));
        assert!(!out.contains("**Before:**"));
    }

    #[test]
    fn bash_shows_description_and_relative_command() {
        let out = renderer().render(
            "Bash",
            &json!({
                "command": "/test/project/bin/script && /test/project/lib/test.rb",
                "description": "Test with paths"
            }),
            None,
        );

        assert!(out.contains("<summary>Bash: Test with paths</summary>"));
        assert!(out.contains("```bash\n./bin/script && ./lib/test.rb\n```"));
    }

    #[test]
    fn bash_has_default_description() {
        let out = renderer().render("Bash", &json!({ "command": "ls" }), None);
        assert!(out.contains("<summary>Bash: Run bash command</summary>"));
    }

    #[test]
    fn todo_write_lists_statuses_without_fence() {
        let out = renderer().render(
            "TodoWrite",
            &json!({ "todos": [
                { "content": "First task", "status": "completed" },
                { "content": "Second task", "status": "in_progress" },
                { "content": "Third task", "status": "pending" },
                { "content": "Fourth task", "status": "blocked" }
            ]}),
            None,
        );

        assert!(out.contains("<summary>TodoWrite</summary>"));
        assert!(out.contains("✅ First task  \n🔄 Second task  \n⏳ Third task  \n❓ Fourth task  "));
        assert!(!out.contains("```"));
    }

    #[test]
    fn result_fence_outgrows_result_content() {
        let out = renderer().render("Read", &json!({}), Some(&json!("```\ncode\n```")));
        assert!(out.contains("````\n```\ncode\n```\n````"));
    }

    #[test]
    fn joins_text_block_results() {
        let result = json!([
            { "type": "text", "text": "line one" },
            { "type": "text", "text": "line two" }
        ]);
        assert_eq!(result_text(&result), "line one\nline two");
    }

    #[test]
    fn mixed_block_results_are_pretty_printed() {
        let result = json!([{ "type": "image", "source": "x" }]);
        assert!(result_text(&result).contains("\"image\""));
    }

    #[test]
    fn no_project_path_keeps_absolute_paths() {
        let out = ToolTemplateRenderer::default().render(
            "Write",
            &json!({ "file_path": "/abs/file.py", "content": "x" }),
            None,
        );
        assert!(out.contains("<summary>Write /abs/file.py</summary>"));
    }
}
