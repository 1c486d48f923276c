//! Core data models used throughout LocalLM.
//!
//! These types represent the persisted knowledge map, the documents it
//! describes, and the conversation state that flows through the exploration
//! agent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// File type of a discovered document, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
    Md,
}

impl FileType {
    /// Derive the file type from a path's extension, if supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" | "doc" => Some(FileType::Docx),
            "txt" => Some(FileType::Txt),
            "md" | "markdown" => Some(FileType::Md),
            _ => None,
        }
    }

    /// Uppercase label used in listings and placeholder concepts.
    pub fn label(&self) -> &'static str {
        match self {
            FileType::Pdf => "PDF",
            FileType::Docx => "DOCX",
            FileType::Txt => "TXT",
            FileType::Md => "MD",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry per discovered document in the knowledge map.
///
/// `id` and `path` are each unique within a map. `key_concepts` is never
/// persisted empty: the builder substitutes a type-label placeholder when
/// every extraction path fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub path: String,
    pub file_type: FileType,
    pub size_bytes: u64,
    /// Model-authored free text, 200-300 word target. Empty only when
    /// generation failed outright.
    pub description: String,
    pub key_concepts: Vec<String>,
}

/// The persisted directory of per-document summaries.
///
/// Built by a full scan, loaded once per process invocation, and held
/// read-only afterwards. Never mutated incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMap {
    pub version: String,
    pub root: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub documents: Vec<DocumentRecord>,
}

impl KnowledgeMap {
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// Metadata for a discoverable document, shared by the lister tool and the
/// map builder.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub name: String,
    /// Relative to the corpus root.
    pub path: String,
    pub file_type: FileType,
    pub size_bytes: u64,
    pub modified_secs: i64,
}

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in the conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Map-building variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Sample head and tail of the full text.
    Full,
    /// Summarize a TOC/abstract region when one can be located.
    Fast,
}
