//! Per-model context-window profiles.
//!
//! Local models differ widely in usable context. The table below maps model
//! families to their window size; tasks then take a fraction of it so the
//! remainder stays available for document content (Q&A), history (chat), or
//! nothing much (map generation).

/// Context window sizes in tokens, by model-family prefix.
const MODEL_CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("qwen3", 32768),
    ("qwen2.5", 32768),
    ("qwen2", 32768),
    ("qwen", 32768),
    ("llama3.3", 131072),
    ("llama3.2", 131072),
    ("llama3.1", 131072),
    ("llama3", 8192),
    ("llama2", 4096),
    ("mistral-nemo", 131072),
    ("mistral", 32768),
    ("mixtral", 32768),
    ("deepseek-r1", 65536),
    ("deepseek-v3", 65536),
    ("deepseek-coder", 16384),
    ("gemma2", 8192),
    ("gemma", 8192),
    ("phi4", 16384),
    ("phi3", 131072),
];

const DEFAULT_CONTEXT_WINDOW: usize = 8192;

/// What the context budget is being spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Question answering: leave room for document content.
    Qa,
    /// Chat: leave room for accumulated history.
    Chat,
    /// Map generation: summaries only.
    MapGeneration,
}

/// Look up the context window for a model name like `qwen3:latest`.
///
/// The tag after `:` is ignored; the longest matching family prefix wins
/// (the table is ordered longest-first within each family).
pub fn context_window(model_name: &str) -> usize {
    let base = model_name
        .split(':')
        .next()
        .unwrap_or(model_name)
        .to_ascii_lowercase();

    for &(family, window) in MODEL_CONTEXT_WINDOWS {
        if base == family || base.starts_with(family) {
            return window;
        }
    }
    DEFAULT_CONTEXT_WINDOW
}

/// Context budget for a task, as a fraction of the model's window with a cap.
pub fn context_for_task(model_name: &str, task: Task) -> usize {
    let max = context_window(model_name);
    match task {
        Task::Qa => (max * 6 / 10).min(32768),
        Task::Chat => (max * 4 / 10).min(16384),
        Task::MapGeneration => (max * 3 / 10).min(8192),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_family_with_tag() {
        assert_eq!(context_window("qwen3:latest"), 32768);
        assert_eq!(context_window("llama3.1:8b"), 131072);
    }

    #[test]
    fn longer_family_prefix_wins() {
        assert_eq!(context_window("deepseek-coder:6.7b"), 16384);
        assert_eq!(context_window("mistral-nemo"), 131072);
    }

    #[test]
    fn unknown_model_gets_default() {
        assert_eq!(context_window("some-new-model"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn task_budgets_are_capped_fractions() {
        assert_eq!(context_for_task("llama2", Task::Qa), 4096 * 6 / 10);
        // Large windows hit the cap.
        assert_eq!(context_for_task("llama3.1", Task::Chat), 16384);
        assert_eq!(context_for_task("llama3.1", Task::MapGeneration), 8192);
    }
}
