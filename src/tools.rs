//! Document access tools exposed to the exploration agent.
//!
//! Each tool is a name, a one-line description for the system prompt, and a
//! `run` over a single string argument. Dispatch is by exact name; anything
//! else is an error observation, never a panic. Tool failures are values the
//! agent can read and route around.

use regex::RegexBuilder;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::discover;
use crate::error::ToolError;
use crate::extract;

/// Ceiling on text returned from one `read_file` call.
const MAX_READ_CHARS: usize = 20_000;
/// Ceiling on reported matches in one `grep` call.
const MAX_GREP_MATCHES: usize = 20;
const DEFAULT_GREP_CONTEXT: usize = 3;

/// Everything a tool needs to operate: the corpus root and the active
/// configuration (for discovery excludes).
pub struct ToolContext {
    pub root: PathBuf,
    pub config: Config,
}

/// One callable document tool.
pub trait DocTool: Send + Sync {
    fn name(&self) -> &'static str;
    /// One-line description rendered into the system prompt.
    fn describe(&self) -> &'static str;
    fn run(&self, argument: &str, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Registry of available tools; dispatch is by exact name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn DocTool>>,
}

impl ToolRegistry {
    pub fn with_builtins() -> Self {
        Self {
            tools: vec![
                Box::new(ReadFileTool),
                Box::new(GrepTool),
                Box::new(ListDocsTool),
            ],
        }
    }

    pub fn dispatch(
        &self,
        name: &str,
        argument: &str,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let name = name.trim();
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => tool.run(argument.trim(), ctx),
            None => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// Render the name/description block for system prompts.
    pub fn render_block(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.describe()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Resolve a model-supplied relative path inside the corpus root.
///
/// Rejects absolute paths and any traversal that would escape the root.
/// `tool` names the caller in the error so observations point at the right
/// tool.
fn resolve_in_root(root: &Path, relative: &str, tool: &str) -> Result<PathBuf, ToolError> {
    if relative.is_empty() {
        return Err(ToolError::BadArgument {
            tool: tool.to_string(),
            message: "expected a document path".to_string(),
        });
    }
    let rel = Path::new(relative);
    if rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(ToolError::BadArgument {
            tool: tool.to_string(),
            message: format!("path must be relative to the document directory: {relative}"),
        });
    }
    Ok(root.join(rel))
}

struct ReadFileTool;

impl DocTool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn describe(&self) -> &'static str {
        "Read the full text of one document. Argument: its relative path."
    }

    fn run(&self, argument: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        let path = resolve_in_root(&ctx.root, argument, self.name())?;
        let text = extract::extract_text(&path)?;
        if text.chars().count() > MAX_READ_CHARS {
            let truncated: String = text.chars().take(MAX_READ_CHARS).collect();
            return Ok(format!("{truncated}\n\n[Content truncated]"));
        }
        Ok(text)
    }
}

struct GrepTool;

/// Parsed form of the grep micro-syntax `pattern[, path[, context_lines]]`.
#[derive(Debug, PartialEq)]
struct GrepArgs {
    pattern: String,
    path: Option<String>,
    context: usize,
}

fn parse_grep_args(argument: &str) -> Result<GrepArgs, ToolError> {
    let bad = |message: String| ToolError::BadArgument {
        tool: "grep".to_string(),
        message,
    };

    let parts: Vec<&str> = argument.splitn(3, ',').map(str::trim).collect();
    let pattern = parts
        .first()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| bad("expected a search pattern".to_string()))?
        .to_string();

    let path = parts
        .get(1)
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string());
    let context = match parts.get(2) {
        None => DEFAULT_GREP_CONTEXT,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| bad(format!("context line count is not a number: {raw}")))?,
    };

    Ok(GrepArgs {
        pattern,
        path,
        context,
    })
}

impl DocTool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn describe(&self) -> &'static str {
        "Search documents for a pattern. Argument: pattern[, relative path[, context lines]]. \
         Without a path, every document is searched."
    }

    fn run(&self, argument: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        let args = parse_grep_args(argument)?;
        match &args.path {
            Some(path) => {
                let resolved = resolve_in_root(&ctx.root, path, self.name())?;
                let text = extract::extract_text(&resolved)?;
                let hits = grep_text(&text, &args.pattern, args.context, MAX_GREP_MATCHES);
                if hits.is_empty() {
                    return Ok(format!(
                        "No matches found for '{}' in {}",
                        args.pattern, path
                    ));
                }
                Ok(format!("== {} ==\n{}", path, hits.join("\n")))
            }
            None => grep_corpus(&args.pattern, args.context, usize::MAX, ctx),
        }
    }
}

/// Search every discoverable document. Shared by the grep tool and the
/// answer-quality fallback (which caps `max_files`).
pub fn grep_corpus(
    pattern: &str,
    context: usize,
    max_files: usize,
    ctx: &ToolContext,
) -> Result<String, ToolError> {
    let documents = discover::list_documents(&ctx.root, &ctx.config).map_err(|e| {
        ToolError::Extraction {
            path: ctx.root.clone(),
            message: e.to_string(),
        }
    })?;

    let mut sections = Vec::new();
    let mut remaining = MAX_GREP_MATCHES;

    for doc in &documents {
        if sections.len() >= max_files || remaining == 0 {
            break;
        }
        // Unreadable files are skipped, not fatal: one bad PDF must not
        // poison a corpus-wide search.
        let Ok(text) = extract::extract_text(&ctx.root.join(&doc.path)) else {
            continue;
        };
        let hits = grep_text(&text, pattern, context, remaining);
        if hits.is_empty() {
            continue;
        }
        remaining = remaining.saturating_sub(hits.len());
        sections.push(format!("== {} ==\n{}", doc.path, hits.join("\n")));
    }

    if sections.is_empty() {
        return Ok(format!("No matches found for '{pattern}'"));
    }
    Ok(sections.join("\n\n"))
}

/// Match lines against the pattern and render each hit with its context
/// block. Invalid regex syntax degrades to a literal, case-insensitive
/// search rather than erroring.
fn grep_text(text: &str, pattern: &str, context: usize, max_matches: usize) -> Vec<String> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(pattern))
                .case_insensitive(true)
                .build()
        });
    let Ok(regex) = regex else {
        return Vec::new();
    };

    let lines: Vec<&str> = text.lines().collect();
    let mut out = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if out.len() >= max_matches {
            break;
        }
        if !regex.is_match(line) {
            continue;
        }

        let start = idx.saturating_sub(context);
        let end = (idx + context + 1).min(lines.len());
        let mut block = vec![format!(">>> Line {}:", idx + 1)];
        for (n, ctx_line) in lines[start..end].iter().enumerate() {
            let lineno = start + n + 1;
            let marker = if lineno == idx + 1 { ">" } else { " " };
            block.push(format!("{marker} {lineno:4}: {ctx_line}"));
        }
        out.push(block.join("\n"));
    }
    out
}

struct ListDocsTool;

impl DocTool for ListDocsTool {
    fn name(&self) -> &'static str {
        "list_docs"
    }

    fn describe(&self) -> &'static str {
        "List every document in the collection with its type and size. No argument."
    }

    fn run(&self, _argument: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        let documents =
            discover::list_documents(&ctx.root, &ctx.config).map_err(|e| ToolError::Extraction {
                path: ctx.root.clone(),
                message: e.to_string(),
            })?;
        Ok(discover::format_listing(&ctx.root, &documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("notes.md"),
            "line one\nline two has ERROR here\nline three\nline four\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("other.txt"), "nothing relevant\n").unwrap();
        let ctx = ToolContext {
            root: dir.path().to_path_buf(),
            config: Config::default(),
        };
        (dir, ctx)
    }

    #[test]
    fn dispatch_unknown_tool_names_known_ones() {
        let (_dir, ctx) = context();
        let err = ToolRegistry::with_builtins()
            .dispatch("browse_web", "x", &ctx)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("browse_web"));
        assert!(msg.contains("read_file"));
    }

    #[test]
    fn read_file_returns_content() {
        let (_dir, ctx) = context();
        let out = ToolRegistry::with_builtins()
            .dispatch("read_file", "notes.md", &ctx)
            .unwrap();
        assert!(out.contains("line two has ERROR here"));
    }

    #[test]
    fn read_file_missing_is_not_found() {
        let (_dir, ctx) = context();
        let err = ToolRegistry::with_builtins()
            .dispatch("read_file", "ghost.md", &ctx)
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn read_file_rejects_traversal() {
        let (_dir, ctx) = context();
        let err = ToolRegistry::with_builtins()
            .dispatch("read_file", "../outside.md", &ctx)
            .unwrap_err();
        assert!(matches!(err, ToolError::BadArgument { .. }));
    }

    #[test]
    fn grep_bad_path_names_grep_in_the_error() {
        let (_dir, ctx) = context();
        let err = ToolRegistry::with_builtins()
            .dispatch("grep", "error, ../outside.md", &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("invalid argument for grep"));
    }

    #[test]
    fn grep_args_all_forms() {
        assert_eq!(
            parse_grep_args("error").unwrap(),
            GrepArgs {
                pattern: "error".to_string(),
                path: None,
                context: DEFAULT_GREP_CONTEXT,
            }
        );
        assert_eq!(
            parse_grep_args("error, notes.md, 1").unwrap(),
            GrepArgs {
                pattern: "error".to_string(),
                path: Some("notes.md".to_string()),
                context: 1,
            }
        );
        assert!(parse_grep_args("error, notes.md, many").is_err());
        assert!(parse_grep_args("").is_err());
    }

    #[test]
    fn grep_single_file_with_context_marker() {
        let (_dir, ctx) = context();
        let out = ToolRegistry::with_builtins()
            .dispatch("grep", "error, notes.md, 1", &ctx)
            .unwrap();
        assert!(out.contains(">>> Line 2:"));
        assert!(out.contains(">    2: line two has ERROR here"));
        assert!(out.contains("line one"));
        assert!(out.contains("line three"));
        assert!(!out.contains("line four"));
    }

    #[test]
    fn grep_corpus_wide_without_path() {
        let (_dir, ctx) = context();
        let out = ToolRegistry::with_builtins()
            .dispatch("grep", "error", &ctx)
            .unwrap();
        assert!(out.contains("== notes.md =="));
        assert!(!out.contains("other.txt"));
    }

    #[test]
    fn grep_no_matches_is_a_message_not_an_error() {
        let (_dir, ctx) = context();
        let out = ToolRegistry::with_builtins()
            .dispatch("grep", "absent_token", &ctx)
            .unwrap();
        assert!(out.starts_with("No matches found"));
    }

    #[test]
    fn grep_invalid_regex_degrades_to_literal() {
        let (_dir, ctx) = context();
        std::fs::write(ctx.root.join("paren.txt"), "a literal ( appears\n").unwrap();
        let out = ToolRegistry::with_builtins()
            .dispatch("grep", "literal (", &ctx)
            .unwrap();
        assert!(out.contains("paren.txt"));
    }

    #[test]
    fn list_docs_reports_both_files() {
        let (_dir, ctx) = context();
        let out = ToolRegistry::with_builtins()
            .dispatch("list_docs", "", &ctx)
            .unwrap();
        assert!(out.contains("notes.md"));
        assert!(out.contains("other.txt"));
    }
}
