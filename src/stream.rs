//! Streaming/interrupt coordination around model calls.
//!
//! Wraps a [`ModelClient::chat`] invocation so token fragments can be
//! consumed incrementally, bounded, and cancelled. Two safety ceilings apply
//! independent of the model's own stop behavior: a fragment-count ceiling and
//! a cumulative-character ceiling. Exceeding either truncates the stream and
//! appends a fixed notice, so a looping model cannot consume unboundedly.
//!
//! Cancellation is edge-triggered and cooperative: the first request opens a
//! grace window (the caller surfaces a warning); a second request inside that
//! window terminates consumption unconditionally and the outcome is
//! `Cancelled`, not a partial answer. A single request followed by silence
//! does not disturb the stream.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::StreamConfig;
use crate::error::LlmError;
use crate::llm::{ModelClient, StreamControl};
use crate::models::Message;
use crate::sanitize;

const TRUNCATED_FRAGMENTS_NOTICE: &str = "\n\n[Response truncated: exceeded maximum chunks]";
const TRUNCATED_LENGTH_NOTICE: &str = "\n\n[Response truncated: exceeded maximum length]";

/// Result of consuming one model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The model finished on its own.
    Completed(String),
    /// A ceiling fired; the content ends with a truncation notice.
    Truncated(String),
    /// A hard cancel fired. No content is returned and the caller must not
    /// append anything to conversation state.
    Cancelled,
}

/// Stage reached by a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStage {
    /// First request: warn and start the grace window.
    Warned,
    /// Second request within the window: terminate.
    Hard,
}

#[derive(Default)]
struct CancelInner {
    first_at: Option<Instant>,
    hard: bool,
}

/// Cooperative cancellation token shared between the interrupt handler and
/// the stream coordinator.
pub struct CancelToken {
    inner: Mutex<CancelInner>,
    grace: Duration,
}

impl CancelToken {
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Mutex::new(CancelInner::default()),
            grace,
        }
    }

    /// Register a cancellation request and report the stage it reached.
    ///
    /// A request outside the grace window restarts it rather than escalating.
    pub fn request(&self) -> CancelStage {
        let mut inner = self.inner.lock().expect("cancel lock poisoned");
        let now = Instant::now();
        match inner.first_at {
            Some(first) if now.duration_since(first) <= self.grace => {
                inner.hard = true;
                CancelStage::Hard
            }
            _ => {
                inner.first_at = Some(now);
                CancelStage::Warned
            }
        }
    }

    pub fn is_hard(&self) -> bool {
        self.inner.lock().expect("cancel lock poisoned").hard
    }

    /// Clear state before a new exchange.
    pub fn reset(&self) {
        *self.inner.lock().expect("cancel lock poisoned") = CancelInner::default();
    }
}

/// Ceilings for one model turn.
#[derive(Debug, Clone)]
pub struct StreamLimits {
    pub max_fragments: usize,
    pub max_chars: usize,
}

impl From<&StreamConfig> for StreamLimits {
    fn from(cfg: &StreamConfig) -> Self {
        Self {
            max_fragments: cfg.max_fragments,
            max_chars: cfg.max_chars,
        }
    }
}

/// Consume one streamed chat turn under ceilings and cancellation.
///
/// Sanitized fragments are forwarded to `sink` as they arrive (the sink owns
/// any delivery throttle; it is a UX concern, not a correctness one). A
/// backend error after partial content has arrived degrades to a completed
/// turn with that content; an unreachable backend always propagates.
pub async fn consume_chat_stream(
    client: &dyn ModelClient,
    messages: &[Message],
    num_ctx: usize,
    limits: &StreamLimits,
    cancel: &CancelToken,
    sink: &mut (dyn FnMut(&str) + Send),
) -> Result<StreamOutcome, LlmError> {
    let mut content = String::new();
    let mut fragments = 0usize;
    let mut cancelled = false;
    let mut truncated: Option<&'static str> = None;

    let result = {
        let mut on_fragment = |raw: &str| {
            if cancel.is_hard() {
                cancelled = true;
                return StreamControl::Stop;
            }

            fragments += 1;
            if fragments > limits.max_fragments {
                truncated = Some(TRUNCATED_FRAGMENTS_NOTICE);
                return StreamControl::Stop;
            }

            let clean = sanitize::clean_fragment(raw);
            if clean.is_empty() {
                return StreamControl::Continue;
            }

            if content.len() + clean.len() > limits.max_chars {
                truncated = Some(TRUNCATED_LENGTH_NOTICE);
                return StreamControl::Stop;
            }

            content.push_str(&clean);
            sink(&clean);
            StreamControl::Continue
        };
        client.chat(messages, num_ctx, &mut on_fragment).await
    };

    if cancelled || cancel.is_hard() {
        return Ok(StreamOutcome::Cancelled);
    }

    match result {
        Ok(()) => {}
        Err(e @ LlmError::Unreachable { .. }) => return Err(e),
        Err(e) => {
            if content.is_empty() {
                return Err(e);
            }
            tracing::warn!("stream ended early: {e}");
        }
    }

    if let Some(notice) = truncated {
        content.push_str(notice);
        return Ok(StreamOutcome::Truncated(content));
    }
    Ok(StreamOutcome::Completed(content))
}
