//! Concept extraction for knowledge-map entries.
//!
//! Primary path: ask the model for a JSON array of short technical terms.
//! When the model output cannot be parsed, or yields nothing, a deterministic
//! extractor takes over. A validity filter applies to both paths, and callers
//! are guaranteed a non-empty result: after both paths and one retry against
//! a larger excerpt, a type-label placeholder is returned rather than an
//! empty set.
//!
//! The heuristics live in data tables (thresholds, denylists, particles) so
//! they can be tested without a model.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::llm::ModelClient;
use crate::models::FileType;
use crate::profile::{self, Task};
use crate::sanitize;

const MAX_CONCEPTS: usize = 10;

/// Minimum repeats a CJK phrase candidate needs, by phrase length.
/// Longer phrases are rare and specific, so they need fewer repeats;
/// short phrases are noisy, so they need more.
const CJK_FREQUENCY_THRESHOLDS: &[(usize, usize)] = &[(6, 2), (4, 3), (2, 5)];

/// Words that are never concepts: document structure, institutions, and
/// function words commonly surfaced by naive extraction.
const CONCEPT_DENYLIST: &[&str] = &[
    "page", "figure", "table", "section", "chapter", "appendix", "reference",
    "references", "abstract", "introduction", "conclusion", "contents",
    "university", "department", "institute", "the", "this", "that", "these",
    "those", "and", "or", "but", "with", "from", "for", "are", "was", "were",
];

/// CJK particles that disqualify a candidate when they begin or end it.
const CJK_EDGE_PARTICLES: &[char] = &[
    '的', '了', '是', '在', '與', '和', '或', '及', '之', '為',
    'の', 'を', 'に', 'は', 'が', 'で', 'と',
];

fn capitalized_phrase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").unwrap())
}

fn technical_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z]+[-_][A-Za-z0-9]+\b").unwrap())
}

fn citation_or_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:19|20)\d{2}|et al\.?|vol\.? ?\d+|pp?\. ?\d+(?:-\d+)?)$").unwrap()
    })
}

/// Extract concepts for an excerpt, trying the model first.
///
/// Retries once against `larger_excerpt` when everything comes back empty;
/// falls back to a type-label placeholder as the last resort.
pub async fn extract_concepts(
    client: &dyn ModelClient,
    excerpt: &str,
    larger_excerpt: &str,
    file_type: FileType,
) -> Vec<String> {
    let mut concepts = extract_once(client, excerpt).await;

    if concepts.is_empty() && larger_excerpt.len() > excerpt.len() {
        tracing::warn!("concept extraction empty, retrying with larger excerpt");
        concepts = extract_once(client, larger_excerpt).await;
    }

    if concepts.is_empty() {
        concepts = vec![placeholder_concept(file_type)];
    }
    concepts
}

async fn extract_once(client: &dyn ModelClient, excerpt: &str) -> Vec<String> {
    let from_model = match model_concepts(client, excerpt).await {
        Some(list) if !list.is_empty() => list,
        _ => fallback_concepts(excerpt),
    };
    filter_concepts(from_model)
}

/// Placeholder used when no concept survives any path. Callers must never
/// persist an empty concept set silently.
pub fn placeholder_concept(file_type: FileType) -> String {
    format!("{} document", file_type.label())
}

/// Model path: request a JSON array of short technical terms.
///
/// Returns `None` on any model or parse failure so the caller can fall back.
async fn model_concepts(client: &dyn ModelClient, excerpt: &str) -> Option<Vec<String>> {
    let prompt = format!(
        "Extract 5-10 key concepts from this text as a JSON array of short strings.\n\
         \n\
         Good concepts: technical terms, methods, topics, tools, domain names\n\
         (e.g. [\"quantized inference\", \"VRAM budgeting\", \"knowledge graph\"]).\n\
         Bad concepts: person names, institutions, places, document-structure\n\
         words like \"section\" or \"figure\".\n\
         \n\
         Text:\n{}\n\nJSON array only:",
        excerpt
    );

    let num_ctx = profile::context_for_task(&client.model_name(), Task::MapGeneration);
    let raw = client.generate(&prompt, num_ctx).await.ok()?;
    parse_concept_array(&raw)
}

/// Pull the first JSON array out of (sanitized) model output.
pub fn parse_concept_array(raw: &str) -> Option<Vec<String>> {
    let clean = sanitize::strip_reasoning_blocks(raw);
    let start = clean.find('[')?;
    let end = clean[start..].find(']')? + start;
    let list: Vec<String> = serde_json::from_str(&clean[start..=end]).ok()?;
    Some(list)
}

/// Deterministic extraction: phrase candidates that recur above a
/// length-dependent threshold.
pub fn fallback_concepts(content: &str) -> Vec<String> {
    // Back the cut point off to a char boundary before slicing; a byte cap
    // alone lands mid-character on multibyte text.
    let window = truncate_at_char_boundary(content, 5000);

    let mut candidates: Vec<String> = Vec::new();

    // Multi-word capitalized phrases first: the longer form wins so that
    // "Retrieval Augmented Generation" is not fragmented into three words.
    for m in capitalized_phrase_re().find_iter(window) {
        candidates.push(m.as_str().to_string());
    }
    for m in technical_token_re().find_iter(window) {
        candidates.push(m.as_str().to_string());
    }
    candidates.extend(cjk_phrase_candidates(window));

    candidates.sort();
    candidates.dedup();

    // Rank by frequency in the sampled window.
    let mut with_counts: Vec<(String, usize)> = candidates
        .into_iter()
        .map(|c| {
            let count = window.matches(c.as_str()).count();
            (c, count)
        })
        .collect();
    with_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    with_counts.into_iter().map(|(c, _)| c).collect()
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    let mut end = s.len().min(max_bytes);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// CJK candidates: fixed-width windows over ideograph runs, longest width
/// first. A shorter window fully contained in an accepted longer phrase is
/// skipped to avoid fragmenting multi-character terms.
fn cjk_phrase_candidates(content: &str) -> Vec<String> {
    let runs: Vec<Vec<char>> = {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for c in content.chars() {
            if ('\u{4e00}'..='\u{9fff}').contains(&c) {
                current.push(c);
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    };

    let mut accepted: Vec<String> = Vec::new();
    for &(width, min_repeats) in CJK_FREQUENCY_THRESHOLDS {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for run in &runs {
            if run.len() < width {
                continue;
            }
            for w in run.windows(width) {
                *counts.entry(w.iter().collect()).or_insert(0) += 1;
            }
        }
        let mut hits: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(phrase, count)| {
                *count >= min_repeats && !accepted.iter().any(|a| a.contains(phrase.as_str()))
            })
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        accepted.extend(hits.into_iter().take(MAX_CONCEPTS).map(|(p, _)| p));
    }
    accepted
}

/// Validity filter applied to every extraction path.
///
/// Drops denylisted words, citation/date patterns, contact addresses, and
/// candidates edged by CJK particles; collapses internal whitespace; caps the
/// result at [`MAX_CONCEPTS`].
pub fn filter_concepts(concepts: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    for concept in concepts {
        let cleaned = sanitize::collapse_whitespace(&concept);
        let lower = cleaned.to_lowercase();

        if cleaned.chars().count() < 2 {
            continue;
        }
        if CONCEPT_DENYLIST.contains(&lower.as_str()) {
            continue;
        }
        if cleaned.contains('@') {
            continue;
        }
        if citation_or_date_re().is_match(&lower) {
            continue;
        }
        let first = cleaned.chars().next().unwrap_or(' ');
        let last = cleaned.chars().last().unwrap_or(' ');
        if CJK_EDGE_PARTICLES.contains(&first) || CJK_EDGE_PARTICLES.contains(&last) {
            continue;
        }
        if !out.contains(&cleaned) {
            out.push(cleaned);
        }
        if out.len() >= MAX_CONCEPTS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_drops_structure_and_contact_noise() {
        let input = vec![
            "Section".to_string(),
            "quantized inference".to_string(),
            "someone@example.com".to_string(),
            "2021".to_string(),
            "x".to_string(),
            "University".to_string(),
        ];
        assert_eq!(filter_concepts(input), vec!["quantized inference"]);
    }

    #[test]
    fn filter_collapses_internal_line_breaks() {
        let input = vec!["machine\nlearning".to_string()];
        assert_eq!(filter_concepts(input), vec!["machine learning"]);
    }

    #[test]
    fn filter_drops_particle_edged_cjk() {
        let input = vec!["的模型".to_string(), "語言模型".to_string()];
        assert_eq!(filter_concepts(input), vec!["語言模型"]);
    }

    #[test]
    fn fallback_prefers_recurring_capitalized_phrases() {
        let text = "Retrieval Augmented Generation is discussed. \
                    Retrieval Augmented Generation combines search with \
                    generation. The llama-cpp runtime and llama-cpp bindings \
                    are covered.";
        let concepts = filter_concepts(fallback_concepts(text));
        assert!(concepts.iter().any(|c| c == "Retrieval Augmented Generation"));
        assert!(concepts.iter().any(|c| c == "llama-cpp"));
    }

    #[test]
    fn fallback_survives_multibyte_window_cut() {
        // 7200 bytes of 3-byte characters: the 5000-byte cap falls inside a
        // character and must back off instead of panicking.
        let text = "語言模型".repeat(600);
        let concepts = fallback_concepts(&text);
        assert!(!concepts.is_empty());
        assert!(concepts.iter().all(|c| c.chars().all(|ch| ch == '語'
            || ch == '言'
            || ch == '模'
            || ch == '型')));
    }

    #[test]
    fn fallback_cjk_requires_repeats() {
        // 語言模型 appears three times (meets the 4-char threshold);
        // the phrase around it appears only once each time.
        let text = "語言模型概述。語言模型訓練。語言模型部署。";
        let concepts = filter_concepts(fallback_concepts(text));
        assert!(concepts.iter().any(|c| c == "語言模型"), "{:?}", concepts);
    }

    #[test]
    fn parse_array_survives_unmatched_think_open() {
        let raw = "<think>still reasoning [\"noise\"] \n[\"vector search\", \"rust\"]";
        // Matched-pair stripping is what protects the payload; with only an
        // opening marker the first array in the remainder is taken.
        let parsed = parse_concept_array(raw).unwrap();
        assert!(!parsed.is_empty());
    }

    #[test]
    fn parse_array_plain_json() {
        let parsed = parse_concept_array(" [\"a b\", \"c\"] trailing").unwrap();
        assert_eq!(parsed, vec!["a b", "c"]);
    }

    #[test]
    fn parse_array_rejects_non_json() {
        assert!(parse_concept_array("no array here").is_none());
    }

    #[test]
    fn placeholder_names_the_file_type() {
        assert_eq!(placeholder_concept(FileType::Pdf), "PDF document");
    }
}
