//! Prompt templates.
//!
//! Everything the model is told lives here, so behavior changes are a text
//! edit rather than a logic change. The exploration protocol (`Action:` /
//! `Action Input:` / `Final Answer:`) is defined once in the system prompt and
//! parsed in `agent`; the two must stay in sync.

use crate::language::Lang;
use crate::models::KnowledgeMap;

/// Line prefixes of the exploration micro-protocol. The parser in `agent`
/// matches these exact strings.
pub const ACTION_PREFIX: &str = "Action:";
pub const ACTION_INPUT_PREFIX: &str = "Action Input:";
pub const FINAL_ANSWER_PREFIX: &str = "Final Answer:";

/// System prompt for the exploration agent.
///
/// `tools_block` is the registry's rendered name/description list;
/// `map_block` the knowledge-map digest from [`knowledge_map_digest`].
pub fn explorer_system(tools_block: &str, map_block: &str, lang: Lang) -> String {
    format!(
        "You are a document exploration assistant. You answer questions about \
         a local document collection by reading the documents, never from \
         outside knowledge.\n\
         \n\
         You have these tools:\n{tools}\n\
         \n\
         To use a tool, reply with exactly:\n\
         {action} <tool name>\n\
         {input} <argument>\n\
         \n\
         After each tool use you will receive an Observation with the result. \
         Use as many tool steps as you need. When you can answer the \
         question, reply with:\n\
         {final} <your answer>\n\
         \n\
         Ground every claim in document content you have actually read. If \
         the documents do not contain the answer, say so.\n\
         {lang_instruction}\n\
         \n\
         Document collection overview:\n{map}",
        tools = tools_block,
        action = ACTION_PREFIX,
        input = ACTION_INPUT_PREFIX,
        final = FINAL_ANSWER_PREFIX,
        lang_instruction = lang.instruction(),
        map = map_block,
    )
}

/// Compact per-document digest of the knowledge map, embedded in the
/// exploration and chat system prompts so the model can pick files to read.
pub fn knowledge_map_digest(map: &KnowledgeMap) -> String {
    if map.documents.is_empty() {
        return "(no documents indexed)".to_string();
    }
    let mut out = Vec::with_capacity(map.documents.len());
    for doc in &map.documents {
        let concepts = if doc.key_concepts.is_empty() {
            String::new()
        } else {
            format!(" [{}]", doc.key_concepts.join(", "))
        };
        out.push(format!(
            "- {} ({}): {}{}",
            doc.path,
            doc.file_type,
            doc.description,
            concepts
        ));
    }
    out.join("\n")
}

/// System prompt for free-form chat over the collection.
pub fn chat_system(tools_block: &str, map_block: &str, lang: Lang) -> String {
    // Chat uses the same protocol; only the framing differs.
    format!(
        "You are a helpful assistant discussing a local document collection \
         with the user. Prefer reading documents over guessing.\n\
         \n\
         You have these tools:\n{tools}\n\
         \n\
         To consult a document, reply with exactly:\n\
         {action} <tool name>\n\
         {input} <argument>\n\
         and wait for the Observation. When replying to the user directly, \
         answer plainly (no prefix needed) or use:\n\
         {final} <your reply>\n\
         {lang_instruction}\n\
         \n\
         Document collection overview:\n{map}",
        tools = tools_block,
        action = ACTION_PREFIX,
        input = ACTION_INPUT_PREFIX,
        final = FINAL_ANSWER_PREFIX,
        lang_instruction = lang.instruction(),
        map = map_block,
    )
}

/// Summarization request for one document excerpt, used by the map builder.
/// The reply must be a single JSON object.
pub fn document_summary(title: &str, file_type_label: &str, excerpt: &str) -> String {
    format!(
        "Summarize this {kind} document for a catalog of a local document \
         collection.\n\
         \n\
         Document: {title}\n\
         Excerpt:\n{excerpt}\n\
         \n\
         Reply with a single JSON object, nothing else:\n\
         {{\"description\": \"200-300 word summary of what the document \
         covers and what questions it can answer\", \
         \"key_concepts\": [\"5-10 short technical terms\"]}}",
        kind = file_type_label,
        title = title,
        excerpt = excerpt,
    )
}

/// Observation sent back when a turn names an action but omits its input,
/// or otherwise breaks the protocol.
pub fn corrective_observation() -> &'static str {
    "Observation: Your last message did not follow the expected format. \
     To use a tool reply with exactly:\n\
     Action: <tool name>\n\
     Action Input: <argument>\n\
     To answer, start with: Final Answer:"
}

/// Injected on the final permitted iteration to force a direct answer.
pub fn escalation() -> &'static str {
    "You have used all available exploration steps. Do not request any more \
     tools. Using only what you have observed so far, give your best \
     Final Answer now, and note explicitly anything you could not verify."
}

/// Header for results appended by the keyword fallback search.
pub const FALLBACK_SECTION_HEADER: &str = "\n\n---\nFallback Search Results:\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRecord, FileType};

    fn sample_map() -> KnowledgeMap {
        KnowledgeMap {
            version: "1".to_string(),
            root: "/docs".to_string(),
            generated_at: chrono::Utc::now(),
            documents: vec![DocumentRecord {
                id: "doc_000".to_string(),
                title: "guide".to_string(),
                path: "guide.md".to_string(),
                file_type: FileType::Md,
                size_bytes: 10,
                description: "A setup guide.".to_string(),
                key_concepts: vec!["setup".to_string(), "install".to_string()],
            }],
        }
    }

    #[test]
    fn digest_lists_path_description_and_concepts() {
        let digest = knowledge_map_digest(&sample_map());
        assert!(digest.contains("guide.md"));
        assert!(digest.contains("A setup guide."));
        assert!(digest.contains("[setup, install]"));
    }

    #[test]
    fn digest_handles_empty_map() {
        let mut map = sample_map();
        map.documents.clear();
        assert_eq!(knowledge_map_digest(&map), "(no documents indexed)");
    }

    #[test]
    fn explorer_system_states_the_protocol() {
        let p = explorer_system("- read_file: read", "(none)", Lang::English);
        assert!(p.contains(ACTION_PREFIX));
        assert!(p.contains(ACTION_INPUT_PREFIX));
        assert!(p.contains(FINAL_ANSWER_PREFIX));
        assert!(p.contains("Please answer in English."));
    }

    #[test]
    fn summary_prompt_demands_json() {
        let p = document_summary("t", "PDF", "excerpt text");
        assert!(p.contains("\"description\""));
        assert!(p.contains("\"key_concepts\""));
    }
}
