//! Document discovery.
//!
//! Recursive enumeration of supported documents under the corpus root.
//! The same enumeration backs the map builder, the `list_docs` tool, the
//! `list` command, and the change watcher, so they never disagree about what
//! exists.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::{DocumentMeta, FileType};

/// Enumerate supported documents under `root`, sorted by path.
///
/// The knowledge-map file itself and the usual vcs/build directories are
/// excluded; extra excludes come from `documents.exclude_globs`.
pub fn list_documents(root: &Path, config: &Config) -> Result<Vec<DocumentMeta>> {
    if !root.exists() {
        bail!("directory does not exist: {}", root.display());
    }

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
        format!("**/{}", config.map.filename),
    ];
    excludes.extend(config.documents.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(file_type) = FileType::from_path(path) else {
            continue;
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let metadata = std::fs::metadata(path)?;
        let modified_secs = metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        documents.push(DocumentMeta {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: rel_str,
            file_type,
            size_bytes: metadata.len(),
            modified_secs,
        });
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Render a discovery listing the way the `list_docs` tool reports it.
pub fn format_listing(root: &Path, documents: &[DocumentMeta]) -> String {
    if documents.is_empty() {
        return format!("No documents found in {}", root.display());
    }

    let mut out = vec![format!(
        "Found {} document(s) in {}:\n",
        documents.len(),
        root.display()
    )];
    for doc in documents {
        out.push(format!(
            "  - {} ({}, {:.2} KB)",
            doc.name,
            doc.file_type,
            doc.size_bytes as f64 / 1024.0
        ));
        out.push(format!("    Path: {}", doc.path));
    }
    out.join("\n")
}
