//! # LocalLM
//!
//! Local document exploration with a local language model.
//!
//! LocalLM points an Ollama-hosted model at a directory of documents and
//! answers questions about them. There is no vector database and no cloud
//! call: a one-time scan builds a YAML knowledge map of per-document
//! summaries, and at question time an exploration agent reads, greps, and
//! lists the actual files until it can answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────────────┐
//! │ Documents │──▶│ Map builder  │──▶│knowledge_map.yaml │
//! │ pdf/docx/ │   │ sample+model │   └─────────┬─────────┘
//! │  txt/md   │   └──────────────┘             │
//! └─────┬─────┘                                ▼
//!       │        ┌──────────────┐   ┌───────────────────┐
//!       └───────▶│ read/grep/   │◀──│ Exploration agent │◀──▶ Ollama
//!                │ list tools   │   │  (Action: loop)   │
//!                └──────────────┘   └───────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! locallm rebuild-map               # index the current directory
//! locallm ask "what is deployed where?"
//! locallm                           # interactive chat
//! locallm search "timeout"          # direct grep across all documents
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`discover`] | Document enumeration |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`mapgen`] | Knowledge-map construction |
//! | [`concepts`] | Key-concept extraction |
//! | [`agent`] | The exploration loop |
//! | [`tools`] | read_file / grep / list_docs |
//! | [`llm`] | Model backend abstraction (Ollama) |
//! | [`stream`] | Streaming ceilings and cancellation |
//! | [`watcher`] | Map staleness detection |

pub mod agent;
pub mod chat;
pub mod concepts;
pub mod config;
pub mod discover;
pub mod error;
pub mod extract;
pub mod language;
pub mod llm;
pub mod mapgen;
pub mod models;
pub mod profile;
pub mod prompts;
pub mod sanitize;
pub mod stream;
pub mod tools;
pub mod watcher;
