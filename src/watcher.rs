//! Knowledge-map staleness detection.
//!
//! The map is rebuilt only on demand, so commands that consult it first
//! compare it against the directory as it is now and warn about drift.
//! Detection is by path set plus size/mtime; content hashing would cost a
//! full corpus read for a warning.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;
use crate::discover;
use crate::models::KnowledgeMap;

/// Differences between the persisted map and the directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MapDrift {
    /// On disk but not in the map.
    pub added: Vec<String>,
    /// In the map but gone from disk.
    pub removed: Vec<String>,
    /// Present in both, but changed since the map was generated.
    pub modified: Vec<String>,
}

impl MapDrift {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// One-line warning for the CLI, or `None` when the map is current.
    pub fn warning(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!(
            "knowledge map is out of date ({} new, {} removed, {} changed); \
             run 'locallm rebuild-map' to refresh it",
            self.added.len(),
            self.removed.len(),
            self.modified.len(),
        ))
    }
}

/// Compare the map against the directory contents right now.
pub fn detect_drift(map: &KnowledgeMap, root: &Path, config: &Config) -> Result<MapDrift> {
    let documents = discover::list_documents(root, config)?;
    let generated_secs = map.generated_at.timestamp();

    let mapped: HashMap<&str, u64> = map
        .documents
        .iter()
        .map(|d| (d.path.as_str(), d.size_bytes))
        .collect();

    let mut drift = MapDrift::default();
    let mut seen = Vec::with_capacity(documents.len());

    for doc in &documents {
        seen.push(doc.path.as_str());
        match mapped.get(doc.path.as_str()) {
            None => drift.added.push(doc.path.clone()),
            Some(&size) => {
                if size != doc.size_bytes || doc.modified_secs > generated_secs {
                    drift.modified.push(doc.path.clone());
                }
            }
        }
    }

    for path in mapped.keys() {
        if !seen.contains(path) {
            drift.removed.push((*path).to_string());
        }
    }
    drift.removed.sort();

    Ok(drift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRecord, FileType};

    fn map_for(entries: &[(&str, u64)], generated_at: chrono::DateTime<chrono::Utc>) -> KnowledgeMap {
        KnowledgeMap {
            version: "1".to_string(),
            root: ".".to_string(),
            generated_at,
            documents: entries
                .iter()
                .enumerate()
                .map(|(i, (path, size))| DocumentRecord {
                    id: format!("doc_{i:03}"),
                    title: path.to_string(),
                    path: path.to_string(),
                    file_type: FileType::Md,
                    size_bytes: *size,
                    description: "d".to_string(),
                    key_concepts: vec!["c".to_string()],
                })
                .collect(),
        }
    }

    #[test]
    fn current_map_has_no_drift() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "hello").unwrap();
        let future = chrono::Utc::now() + chrono::Duration::hours(1);
        let map = map_for(&[("a.md", 5)], future);

        let drift = detect_drift(&map, dir.path(), &Config::default()).unwrap();
        assert!(drift.is_empty());
        assert!(drift.warning().is_none());
    }

    #[test]
    fn added_and_removed_documents_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("new.md"), "hello").unwrap();
        let future = chrono::Utc::now() + chrono::Duration::hours(1);
        let map = map_for(&[("gone.md", 3)], future);

        let drift = detect_drift(&map, dir.path(), &Config::default()).unwrap();
        assert_eq!(drift.added, vec!["new.md"]);
        assert_eq!(drift.removed, vec!["gone.md"]);
        assert!(drift.warning().unwrap().contains("rebuild-map"));
    }

    #[test]
    fn size_change_counts_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "longer content now").unwrap();
        let future = chrono::Utc::now() + chrono::Duration::hours(1);
        let map = map_for(&[("a.md", 5)], future);

        let drift = detect_drift(&map, dir.path(), &Config::default()).unwrap();
        assert_eq!(drift.modified, vec!["a.md"]);
    }

    #[test]
    fn newer_mtime_counts_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "hello").unwrap();
        // Map generated before the file was written.
        let past = chrono::Utc::now() - chrono::Duration::hours(1);
        let map = map_for(&[("a.md", 5)], past);

        let drift = detect_drift(&map, dir.path(), &Config::default()).unwrap();
        assert_eq!(drift.modified, vec!["a.md"]);
    }
}
