//! The exploration agent.
//!
//! Drives a tool-use loop over streamed model turns: the model is shown the
//! knowledge map and the tool list, replies in a line-oriented protocol
//! (`Action:` / `Action Input:` / `Final Answer:`), and observations are fed
//! back until it answers or the iteration budget runs out. A turn that names
//! no action at all is treated as an implicit final answer; models frequently
//! answer directly when the map already contains what they need.
//!
//! Tool failures never abort the loop. They become observations, which is
//! what lets the model recover from a bad path or a mistyped tool name.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::language::{self, Lang};
use crate::llm::ModelClient;
use crate::models::{KnowledgeMap, Message};
use crate::profile::{self, Task};
use crate::prompts;
use crate::sanitize;
use crate::stream::{self, CancelToken, StreamLimits, StreamOutcome};
use crate::tools::{self, ToolContext, ToolRegistry};

/// Filler words excluded when deriving fallback search keywords.
const QUERY_STOP_WORDS: &[&str] = &[
    "what", "when", "where", "which", "whose", "does", "about", "explain",
    "describe", "please", "could", "would", "should", "tell", "show", "list",
    "give", "find", "this", "that", "these", "those", "there", "their",
    "document", "documents", "question",
];

/// One parsed assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// The model answered, explicitly or implicitly.
    FinalAnswer(String),
    /// The model requested a tool.
    ToolCall { name: String, argument: String },
    /// An action was named but its input is missing; the raw turn is kept
    /// for the corrective observation path.
    Malformed(String),
}

/// Parse an assistant turn against the exploration protocol.
///
/// Reasoning blocks are stripped first. A `Final Answer:` line wins when it
/// precedes any `Action:` line; an `Action:` line without a following
/// `Action Input:` is malformed; a turn with neither prefix is an implicit
/// final answer.
pub fn parse_turn(content: &str) -> Turn {
    let clean = sanitize::strip_reasoning_blocks(content);
    let lines: Vec<&str> = clean.lines().collect();

    let action_line = lines
        .iter()
        .position(|l| l.trim_start().starts_with(prompts::ACTION_PREFIX));
    let final_line = lines
        .iter()
        .position(|l| l.trim_start().starts_with(prompts::FINAL_ANSWER_PREFIX));

    match (action_line, final_line) {
        (Some(a), Some(f)) if f < a => final_answer_from(&lines, f),
        (Some(a), _) => tool_call_from(&clean, &lines, a),
        (None, Some(f)) => final_answer_from(&lines, f),
        (None, None) => Turn::FinalAnswer(clean.trim().to_string()),
    }
}

fn final_answer_from(lines: &[&str], at: usize) -> Turn {
    let first = lines[at]
        .trim_start()
        .strip_prefix(prompts::FINAL_ANSWER_PREFIX)
        .unwrap_or("")
        .trim_start();
    let mut answer = first.to_string();
    for line in &lines[at + 1..] {
        answer.push('\n');
        answer.push_str(line);
    }
    Turn::FinalAnswer(answer.trim().to_string())
}

fn tool_call_from(raw: &str, lines: &[&str], action_at: usize) -> Turn {
    let name = lines[action_at]
        .trim_start()
        .strip_prefix(prompts::ACTION_PREFIX)
        .unwrap_or("")
        .trim()
        .to_string();

    let input = lines[action_at..].iter().find_map(|l| {
        l.trim_start()
            .strip_prefix(prompts::ACTION_INPUT_PREFIX)
            .map(|rest| rest.trim().to_string())
    });

    match input {
        Some(argument) if !name.is_empty() => Turn::ToolCall { name, argument },
        _ => Turn::Malformed(raw.trim().to_string()),
    }
}

/// Result of one question.
#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    Answer(String),
    /// A hard cancel fired mid-exploration; nothing was produced.
    Cancelled,
}

/// The exploration agent. Owns its tool registry and, in chat mode, the
/// accumulated conversation history.
pub struct DocumentExplorer {
    client: Arc<dyn ModelClient>,
    registry: ToolRegistry,
    tool_ctx: ToolContext,
    config: Config,
    map: KnowledgeMap,
    cancel: Arc<CancelToken>,
    /// Chat history, system prompt excluded. Unused by one-shot asks.
    history: Vec<Message>,
    /// Echo tool calls and observation sizes to stderr.
    verbose: bool,
}

impl DocumentExplorer {
    pub fn new(
        client: Arc<dyn ModelClient>,
        config: Config,
        map: KnowledgeMap,
        tool_ctx: ToolContext,
        cancel: Arc<CancelToken>,
    ) -> Self {
        Self {
            client,
            registry: ToolRegistry::with_builtins(),
            tool_ctx,
            config,
            map,
            cancel,
            history: Vec::new(),
            verbose: false,
        }
    }

    pub fn set_verbose(&mut self, on: bool) {
        self.verbose = on;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tool_context(&self) -> &ToolContext {
        &self.tool_ctx
    }

    /// Swap in a freshly built knowledge map; later turns see the new digest.
    pub fn replace_map(&mut self, map: KnowledgeMap) {
        self.map = map;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The model client this agent streams through. Model switches must go
    /// through this handle to affect subsequent turns.
    pub fn client(&self) -> Arc<dyn ModelClient> {
        self.client.clone()
    }

    /// Answer one question with a fresh conversation.
    pub async fn ask(
        &self,
        question: &str,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<AskOutcome> {
        let lang = language::detect(question);
        let system = prompts::explorer_system(
            &self.registry.render_block(),
            &prompts::knowledge_map_digest(&self.map),
            lang,
        );
        let mut messages = vec![Message::system(system), Message::user(question)];
        self.explore(&mut messages, question, Task::Qa, sink).await
    }

    /// One chat exchange; history persists across calls. A cancelled
    /// exchange leaves the history exactly as it was.
    pub async fn chat_turn(
        &mut self,
        user_input: &str,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<AskOutcome> {
        let lang = language::detect(user_input);
        let system = prompts::chat_system(
            &self.registry.render_block(),
            &prompts::knowledge_map_digest(&self.map),
            lang,
        );

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(user_input));

        let outcome = self
            .explore(&mut messages, user_input, Task::Chat, sink)
            .await?;

        if let AskOutcome::Answer(answer) = &outcome {
            self.history.push(Message::user(user_input));
            self.history.push(Message::assistant(answer.clone()));
        }
        Ok(outcome)
    }

    /// The exploration loop proper.
    async fn explore(
        &self,
        messages: &mut Vec<Message>,
        question: &str,
        task: Task,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<AskOutcome> {
        let num_ctx = profile::context_for_task(&self.client.model_name(), task);
        let limits = StreamLimits::from(&self.config.stream);
        let max_iterations = self.config.agent.max_iterations;
        let mut last_content = String::new();

        for iteration in 0..max_iterations {
            if iteration + 1 == max_iterations {
                messages.push(Message::user(prompts::escalation()));
            }

            self.cancel.reset();
            let outcome = stream::consume_chat_stream(
                self.client.as_ref(),
                messages,
                num_ctx,
                &limits,
                self.cancel.as_ref(),
                sink,
            )
            .await?;

            let content = match outcome {
                StreamOutcome::Cancelled => return Ok(AskOutcome::Cancelled),
                StreamOutcome::Completed(c) | StreamOutcome::Truncated(c) => c,
            };

            let clean = sanitize::strip_reasoning_blocks(&content);
            messages.push(Message::assistant(clean.clone()));
            last_content = clean.clone();

            match parse_turn(&clean) {
                Turn::FinalAnswer(answer) => {
                    return Ok(AskOutcome::Answer(self.check_answer(answer, question)));
                }
                Turn::ToolCall { name, argument } => {
                    tracing::debug!(tool = %name, arg = %argument, "tool call");
                    if self.verbose {
                        eprintln!("[tool] {name}: {argument}");
                    }
                    let observation = match self.registry.dispatch(&name, &argument, &self.tool_ctx)
                    {
                        Ok(result) => result,
                        Err(e) => e.to_string(),
                    };
                    if self.verbose {
                        eprintln!("[observation] {} chars", observation.chars().count());
                    }
                    messages.push(Message::user(format!("Observation: {observation}")));
                }
                Turn::Malformed(_) => {
                    messages.push(Message::user(prompts::corrective_observation()));
                }
            }
        }

        // Budget exhausted with the model still exploring: the last turn is
        // the best available answer.
        tracing::warn!("iteration budget exhausted without a final answer");
        Ok(AskOutcome::Answer(self.check_answer(last_content, question)))
    }

    /// Answer-quality gate: when the answer admits it found nothing, run a
    /// corpus-wide keyword search and attach whatever turns up.
    fn check_answer(&self, answer: String, question: &str) -> String {
        let lower = answer.to_lowercase();
        let looks_incomplete = language::incomplete_answer_markers()
            .iter()
            .any(|m| lower.contains(m));
        if !looks_incomplete {
            return answer;
        }

        let Some(keyword) = fallback_keyword(question) else {
            return answer;
        };
        tracing::debug!(%keyword, "answer looks incomplete, running fallback search");
        match tools::grep_corpus(&regex::escape(&keyword), 2, 3, &self.tool_ctx) {
            Ok(results) if !results.starts_with("No matches") => {
                format!("{answer}{}{results}", prompts::FALLBACK_SECTION_HEADER)
            }
            _ => answer,
        }
    }
}

/// Pick the most specific keyword from a question for the fallback search:
/// the longest non-stop-word token of at least four characters, or the
/// longest CJK run for unsegmented scripts.
pub fn fallback_keyword(question: &str) -> Option<String> {
    if language::detect(question) != Lang::English {
        let mut best = String::new();
        let mut current = String::new();
        for c in question.chars() {
            let is_cjk = ('\u{4e00}'..='\u{9fff}').contains(&c)
                || ('\u{3040}'..='\u{30ff}').contains(&c)
                || ('\u{ac00}'..='\u{d7af}').contains(&c);
            if is_cjk {
                current.push(c);
            } else {
                if current.chars().count() > best.chars().count() {
                    best = std::mem::take(&mut current);
                } else {
                    current.clear();
                }
            }
        }
        if current.chars().count() > best.chars().count() {
            best = current;
        }
        return (!best.is_empty()).then_some(best);
    }

    question
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .filter(|t| t.len() >= 4)
        .filter(|t| !QUERY_STOP_WORDS.contains(&t.to_lowercase().as_str()))
        .max_by_key(|t| t.len())
        .map(|t| t.to_string())
}
