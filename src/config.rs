use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            name: default_model_name(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model_name() -> String {
    "qwen3:latest".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DocumentsConfig {
    /// Extra exclude globs applied on top of the built-in ones
    /// (`.git`, `target`, `node_modules`).
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    #[serde(default = "default_map_filename")]
    pub filename: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            filename: default_map_filename(),
        }
    }
}

fn default_map_filename() -> String {
    "knowledge_map.yaml".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Ceiling on fragments consumed from one model turn.
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,
    /// Ceiling on cumulative characters in one model turn.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Inter-character delivery delay in milliseconds. UX only.
    #[serde(default = "default_char_delay_ms")]
    pub char_delay_ms: u64,
    /// Window after a first cancel request in which a second one terminates
    /// the stream.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_fragments: default_max_fragments(),
            max_chars: default_max_chars(),
            char_delay_ms: default_char_delay_ms(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

fn default_max_fragments() -> usize {
    2000
}
fn default_max_chars() -> usize {
    16000
}
fn default_char_delay_ms() -> u64 {
    5
}
fn default_cancel_grace_ms() -> u64 {
    2000
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error: the built-in defaults apply, so the tool
/// works out of the box in any document directory.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.agent.max_iterations == 0 {
        anyhow::bail!("agent.max_iterations must be > 0");
    }

    if !(0.0..=1.0).contains(&config.model.temperature) {
        anyhow::bail!("model.temperature must be in [0.0, 1.0]");
    }

    if config.stream.max_fragments == 0 || config.stream.max_chars == 0 {
        anyhow::bail!("stream.max_fragments and stream.max_chars must be > 0");
    }

    Ok(config)
}
