//! Error taxonomy and process exit-code mapping.
//!
//! Only two conditions are fatal to a command: the model backend refusing
//! connections and filesystem failures during initial discovery. Everything
//! else degrades: extraction failures skip the document, protocol violations
//! are fed back to the model as observations, and budget exhaustion returns a
//! best-effort answer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend refused the connection. Fatal to the current command.
    #[error("model backend unreachable at {url}: {message}\nIs the server running? Try: ollama serve")]
    Unreachable { url: String, message: String },

    /// The backend answered with a non-success status.
    #[error("model backend error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// Errors produced by tool execution. Rendered as observations and fed back
/// into the agent loop, never propagated as hard failures.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The assistant named a tool outside the fixed set.
    #[error("unknown tool '{0}'. Available tools: read_file, grep, list_docs")]
    UnknownTool(String),

    /// The argument did not match the tool's micro-syntax.
    #[error("invalid argument for {tool}: {message}")]
    BadArgument { tool: String, message: String },

    /// The referenced document does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The referenced file has an unsupported extension.
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    /// Text could not be obtained from the document.
    #[error("could not extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },
}

/// Exit-code categories for the `locallm` binary.
///
/// The numeric values are an implementation choice, not a contract; the
/// categories are.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const GENERIC: i32 = 1;
    pub const DOCUMENT_NOT_FOUND: i32 = 2;
    pub const MODEL_UNREACHABLE: i32 = 3;
}

/// Map an error chain to an exit-code category.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(LlmError::Unreachable { .. }) = cause.downcast_ref::<LlmError>() {
            return exit::MODEL_UNREACHABLE;
        }
        if let Some(ToolError::NotFound(_)) = cause.downcast_ref::<ToolError>() {
            return exit::DOCUMENT_NOT_FOUND;
        }
    }
    exit::GENERIC
}
