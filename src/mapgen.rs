//! Knowledge-map construction.
//!
//! A build enumerates the corpus, extracts text per document, samples an
//! excerpt, and asks the model for a description plus key concepts. Every
//! model-dependent step has a deterministic fallback, so a build always
//! produces a usable map; only an unreachable backend aborts it.
//!
//! Full mode samples the head and tail of the text. Fast mode tries to find
//! an abstract or table-of-contents region first and summarizes only that,
//! falling back to full sampling when no usable region exists.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::concepts;
use crate::config::Config;
use crate::discover;
use crate::error::LlmError;
use crate::extract;
use crate::llm::ModelClient;
use crate::models::{BuildMode, DocumentMeta, DocumentRecord, KnowledgeMap};
use crate::profile::{self, Task};
use crate::prompts;
use crate::sanitize;

pub const MAP_VERSION: &str = "1";

/// Excerpt budget per document, split 60% head / 40% tail.
const SAMPLE_CHARS: usize = 8000;
const SAMPLE_HEAD_CHARS: usize = SAMPLE_CHARS * 6 / 10;
const SAMPLE_JOINER: &str = "\n\n...\n\n";

/// How far into a document a table of contents may start.
const TOC_SEARCH_CHARS: usize = 3000;
/// A located overview region shorter than this is unusable.
const MIN_REGION_CHARS: usize = 100;
/// Model descriptions shorter than this are replaced deterministically.
const MIN_DESCRIPTION_CHARS: usize = 100;

const ABSTRACT_MARKERS: &[&str] = &["abstract", "executive summary", "摘要"];
const TOC_MARKERS: &[&str] = &["table of contents", "contents", "目錄", "目录"];

/// Build progress callbacks, so long scans stay observable without the
/// builder knowing about terminals.
pub trait MapProgressReporter: Send + Sync {
    fn document_started(&self, index: usize, total: usize, path: &str) {
        let _ = (index, total, path);
    }
    fn note(&self, message: &str) {
        let _ = message;
    }
}

/// Reporter that writes progress lines to stderr.
pub struct StderrReporter;

impl MapProgressReporter for StderrReporter {
    fn document_started(&self, index: usize, total: usize, path: &str) {
        eprintln!("[{}/{}] {}", index + 1, total, path);
    }

    fn note(&self, message: &str) {
        eprintln!("  {message}");
    }
}

/// Silent reporter for tests and embedding.
pub struct NullReporter;

impl MapProgressReporter for NullReporter {}

/// Outcome counters for one build, rendered by the CLI.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub fallback_descriptions: usize,
}

/// Build a fresh map over every discoverable document under `root`.
///
/// Documents yielding no text are skipped with a note. Per-document model
/// failures degrade to deterministic summaries; [`LlmError::Unreachable`]
/// aborts the whole build.
pub async fn build_knowledge_map(
    config: &Config,
    client: &dyn ModelClient,
    root: &Path,
    mode: BuildMode,
    reporter: &dyn MapProgressReporter,
) -> Result<(KnowledgeMap, BuildSummary)> {
    let documents = discover::list_documents(root, config)
        .with_context(|| format!("discovering documents under {}", root.display()))?;

    let mut records = Vec::with_capacity(documents.len());
    let mut summary = BuildSummary::default();
    let total = documents.len();

    for (index, meta) in documents.iter().enumerate() {
        reporter.document_started(index, total, &meta.path);

        let text = match extract::extract_text(&root.join(&meta.path)) {
            Ok(text) => text,
            Err(e) => {
                reporter.note(&format!("skipped: {e}"));
                tracing::warn!(path = %meta.path, "extraction failed: {e}");
                summary.skipped += 1;
                continue;
            }
        };
        if text.trim().is_empty() {
            reporter.note("skipped: no extractable text");
            tracing::warn!(path = %meta.path, "no extractable text");
            summary.skipped += 1;
            continue;
        }

        let record = summarize_document(client, meta, &text, mode, records.len()).await?;
        if record.description.chars().count() < MIN_DESCRIPTION_CHARS {
            summary.fallback_descriptions += 1;
        }
        summary.indexed += 1;
        records.push(record);
    }

    let map = KnowledgeMap {
        version: MAP_VERSION.to_string(),
        root: root.display().to_string(),
        generated_at: chrono::Utc::now(),
        documents: records,
    };
    Ok((map, summary))
}

/// Summarize one document into a map record.
///
/// Identifiers are positional (`doc_000`, `doc_001`, ...) and reassigned on
/// every rebuild; paths are the stable handle.
async fn summarize_document(
    client: &dyn ModelClient,
    meta: &DocumentMeta,
    text: &str,
    mode: BuildMode,
    ordinal: usize,
) -> Result<DocumentRecord> {
    let excerpt = match mode {
        BuildMode::Full => sample_text(text, SAMPLE_CHARS),
        BuildMode::Fast => match locate_overview_region(text) {
            Some(region) => region,
            None => sample_text(text, SAMPLE_CHARS),
        },
    };

    let (description, model_concepts) = match request_summary(client, meta, &excerpt).await {
        Ok(parsed) => parsed,
        Err(e @ LlmError::Unreachable { .. }) => return Err(e.into()),
        Err(e) => {
            tracing::warn!(path = %meta.path, "model summary failed: {e}");
            (String::new(), Vec::new())
        }
    };

    let description = if description.chars().count() < MIN_DESCRIPTION_CHARS {
        fallback_description(text)
    } else {
        description
    };

    let mut key_concepts = concepts::filter_concepts(model_concepts);
    if key_concepts.is_empty() {
        let larger = sample_text(text, SAMPLE_CHARS * 2);
        key_concepts = concepts::extract_concepts(client, &excerpt, &larger, meta.file_type).await;
    }

    Ok(DocumentRecord {
        id: format!("doc_{ordinal:03}"),
        title: meta.name.clone(),
        path: meta.path.clone(),
        file_type: meta.file_type,
        size_bytes: meta.size_bytes,
        description,
        key_concepts,
    })
}

#[derive(Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    description: String,
    #[serde(default)]
    key_concepts: Vec<String>,
}

async fn request_summary(
    client: &dyn ModelClient,
    meta: &DocumentMeta,
    excerpt: &str,
) -> Result<(String, Vec<String>), LlmError> {
    let prompt = prompts::document_summary(&meta.name, meta.file_type.label(), excerpt);
    let num_ctx = profile::context_for_task(&client.model_name(), Task::MapGeneration);
    let raw = client.generate(&prompt, num_ctx).await?;
    Ok(parse_summary(&raw).unwrap_or_default())
}

/// Extract the `{description, key_concepts}` object from model output.
pub fn parse_summary(raw: &str) -> Option<(String, Vec<String>)> {
    let clean = sanitize::strip_reasoning_blocks(raw);
    let start = clean.find('{')?;
    let end = clean.rfind('}')?;
    if end <= start {
        return None;
    }
    let payload: SummaryPayload = serde_json::from_str(&clean[start..=end]).ok()?;
    Some((
        sanitize::collapse_whitespace(&payload.description),
        payload.key_concepts,
    ))
}

/// Head/tail sample of a long text, 60% head and 40% tail of `budget`,
/// joined with an elision marker. Short texts pass through unchanged.
pub fn sample_text(text: &str, budget: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return text.to_string();
    }
    let head_len = budget * 6 / 10;
    let tail_len = budget - head_len;
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{head}{SAMPLE_JOINER}{tail}")
}

/// Find an abstract or table-of-contents region for fast-mode builds.
///
/// Abstract markers are honored anywhere; TOC markers only near the start.
/// A region shorter than [`MIN_REGION_CHARS`] is treated as not found.
pub fn locate_overview_region(text: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid in the original text.
    let lower = text.to_ascii_lowercase();

    let abstract_pos = ABSTRACT_MARKERS
        .iter()
        .filter_map(|m| lower.find(m))
        .min();
    let toc_pos = TOC_MARKERS
        .iter()
        .filter_map(|m| lower.find(m))
        .filter(|&pos| lower[..pos].chars().count() <= TOC_SEARCH_CHARS)
        .min();

    let start = abstract_pos.or(toc_pos)?;
    let region: String = text[start..].chars().take(SAMPLE_CHARS).collect();
    if region.trim().chars().count() < MIN_REGION_CHARS {
        return None;
    }
    Some(region)
}

/// Deterministic description: the opening paragraphs of the document,
/// capped and whitespace-collapsed.
pub fn fallback_description(text: &str) -> String {
    let mut out = String::new();
    for paragraph in text.split("\n\n") {
        let paragraph = sanitize::collapse_whitespace(paragraph);
        if paragraph.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&paragraph);
        if out.chars().count() >= 300 {
            break;
        }
    }
    if out.chars().count() > 400 {
        let truncated: String = out.chars().take(400).collect();
        out = format!("{truncated}...");
    }
    out
}

/// Persist a map as YAML next to the documents it describes.
pub fn save_map(map: &KnowledgeMap, config: &Config, root: &Path) -> Result<()> {
    let path = root.join(&config.map.filename);
    let yaml = serde_yaml::to_string(map).context("serializing knowledge map")?;
    std::fs::write(&path, yaml)
        .with_context(|| format!("writing knowledge map to {}", path.display()))?;
    Ok(())
}

/// Load the persisted map, or `None` when no map has been built yet.
pub fn load_map(config: &Config, root: &Path) -> Result<Option<KnowledgeMap>> {
    let path = root.join(&config.map.filename);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading knowledge map from {}", path.display()))?;
    let map: KnowledgeMap = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing knowledge map {}", path.display()))?;
    Ok(Some(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileType;

    #[test]
    fn short_text_is_not_sampled() {
        assert_eq!(sample_text("short text", 8000), "short text");
    }

    #[test]
    fn long_text_sampled_head_and_tail() {
        let text: String = std::iter::repeat('a')
            .take(6000)
            .chain(std::iter::repeat('z').take(6000))
            .collect();
        let sample = sample_text(&text, 8000);
        assert!(sample.contains(SAMPLE_JOINER));
        assert!(sample.starts_with('a'));
        assert!(sample.ends_with('z'));
        // 60/40 split of the budget plus the joiner.
        assert_eq!(
            sample.chars().count(),
            8000 + SAMPLE_JOINER.chars().count()
        );
    }

    #[test]
    fn sampling_respects_multibyte_content() {
        let text = "界".repeat(10_000);
        let sample = sample_text(&text, 8000);
        assert!(sample.contains(SAMPLE_JOINER));
    }

    #[test]
    fn abstract_region_found_anywhere() {
        let text = format!("{}Abstract\n{}", "x".repeat(5000), "real overview ".repeat(20));
        let region = locate_overview_region(&text).unwrap();
        assert!(region.to_lowercase().starts_with("abstract"));
    }

    #[test]
    fn toc_only_counts_near_the_start() {
        let early = format!("Table of Contents\n{}", "1. chapter one\n".repeat(20));
        assert!(locate_overview_region(&early).is_some());

        let late = format!("{}\nTable of Contents\nshort", "y".repeat(5000));
        // Marker is past the search window and no abstract exists.
        assert!(locate_overview_region(&late).is_none());
    }

    #[test]
    fn tiny_region_is_rejected() {
        let text = "Abstract\nok.";
        assert!(locate_overview_region(text).is_none());
    }

    #[test]
    fn parse_summary_extracts_object() {
        let raw = "<think>deciding</think>Here: {\"description\": \"covers deployment\", \
                   \"key_concepts\": [\"deployment\"]} done";
        let (desc, concepts) = parse_summary(raw).unwrap();
        assert_eq!(desc, "covers deployment");
        assert_eq!(concepts, vec!["deployment"]);
    }

    #[test]
    fn parse_summary_tolerates_missing_concepts() {
        let (desc, concepts) = parse_summary("{\"description\": \"d\"}").unwrap();
        assert_eq!(desc, "d");
        assert!(concepts.is_empty());
    }

    #[test]
    fn parse_summary_rejects_garbage() {
        assert!(parse_summary("not json at all").is_none());
    }

    #[test]
    fn fallback_description_uses_opening_paragraphs() {
        let text = "First paragraph\nwith a break.\n\nSecond paragraph.\n\nThird.";
        let desc = fallback_description(text);
        assert!(desc.starts_with("First paragraph with a break."));
        assert!(desc.contains("Second paragraph."));
    }

    #[test]
    fn map_round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let map = KnowledgeMap {
            version: MAP_VERSION.to_string(),
            root: dir.path().display().to_string(),
            generated_at: chrono::Utc::now(),
            documents: vec![DocumentRecord {
                id: "doc_000".to_string(),
                title: "a.md".to_string(),
                path: "a.md".to_string(),
                file_type: FileType::Md,
                size_bytes: 12,
                description: "About a.".to_string(),
                key_concepts: vec!["alpha".to_string()],
            }],
        };

        save_map(&map, &config, dir.path()).unwrap();
        let loaded = load_map(&config, dir.path()).unwrap().unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn missing_map_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_map(&Config::default(), dir.path()).unwrap().is_none());
    }
}
