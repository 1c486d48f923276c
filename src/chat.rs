//! Interactive chat over the document collection.
//!
//! A line-oriented REPL around [`DocumentExplorer::chat_turn`]. Slash
//! commands are handled locally and never reach the model. When stdin is not
//! a terminal the prompt and banner are suppressed so piped input produces
//! clean output.

use anyhow::Result;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::agent::{AskOutcome, DocumentExplorer};
use crate::config::Config;
use crate::discover;
use crate::llm::ModelClient;
use crate::mapgen::{self, StderrReporter};
use crate::models::BuildMode;
use crate::tools;

const HELP: &str = "\
Commands:
  /help            show this help
  /clear           forget the conversation so far
  /list            list the documents in the collection
  /search <text>   grep the documents directly, no model
  /rebuild [--fast] rebuild the knowledge map
  /model <name>    switch to another installed model
  /models          list installed models
  /quit            leave chat (also /exit, exit, quit, Ctrl-D)";

/// Run the chat loop until EOF or a quit command.
pub async fn run(
    explorer: &mut DocumentExplorer,
    client: Arc<dyn ModelClient>,
    config: &Config,
    document_count: usize,
) -> Result<()> {
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!(
            "Chatting about {} document(s) with {}. Type /help for commands.",
            document_count,
            client.model_name()
        );
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let input = line?.trim().to_string();
        if input.is_empty() {
            continue;
        }
        // Bare words work too; people type them without the slash.
        if input == "exit" || input == "quit" {
            break;
        }

        if let Some(command) = input.strip_prefix('/') {
            if handle_command(command, explorer, client.as_ref()).await? {
                break;
            }
            continue;
        }

        let mut sink = console_sink(config.stream.char_delay_ms);
        match explorer.chat_turn(&input, &mut sink).await? {
            AskOutcome::Answer(_) => println!(),
            AskOutcome::Cancelled => println!("\n[cancelled]"),
        }
    }
    Ok(())
}

/// Handle one slash command; returns `true` to leave the loop.
async fn handle_command(
    command: &str,
    explorer: &mut DocumentExplorer,
    client: &dyn ModelClient,
) -> Result<bool> {
    let mut parts = command.splitn(2, ' ');
    let verb = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match verb {
        "quit" | "exit" => return Ok(true),
        "help" => println!("{HELP}"),
        "clear" => {
            explorer.clear_history();
            println!("Conversation cleared.");
        }
        "list" => {
            let ctx = explorer.tool_context();
            match discover::list_documents(&ctx.root, &ctx.config) {
                Ok(documents) => println!("{}", discover::format_listing(&ctx.root, &documents)),
                Err(e) => println!("Could not list documents: {e:#}"),
            }
        }
        "search" => {
            if rest.is_empty() {
                println!("Usage: /search <pattern>");
            } else {
                match tools::grep_corpus(rest, 3, usize::MAX, explorer.tool_context()) {
                    Ok(results) => println!("{results}"),
                    Err(e) => println!("Search failed: {e}"),
                }
            }
        }
        "rebuild" => {
            let mode = if rest == "--fast" {
                BuildMode::Fast
            } else {
                BuildMode::Full
            };
            let config = explorer.config().clone();
            let root = explorer.tool_context().root.clone();
            let result = mapgen::build_knowledge_map(
                &config,
                client,
                &root,
                mode,
                &StderrReporter,
            )
            .await;
            match result {
                Ok((map, summary)) => {
                    if let Err(e) = mapgen::save_map(&map, &config, &root) {
                        println!("Could not save the rebuilt map: {e:#}");
                    } else {
                        println!(
                            "Indexed {} document(s) ({} skipped).",
                            summary.indexed, summary.skipped
                        );
                        explorer.replace_map(map);
                    }
                }
                Err(e) => println!("Rebuild failed: {e:#}"),
            }
        }
        "model" => {
            if rest.is_empty() {
                println!("Current model: {}", client.model_name());
            } else {
                client.set_model(rest);
                println!("Switched to {rest}.");
            }
        }
        "models" => match client.list_models().await {
            Ok(models) if models.is_empty() => println!("No models installed."),
            Ok(models) => {
                for m in models {
                    println!(
                        "  {} ({:.1} GB)",
                        m.name,
                        m.size_bytes as f64 / 1_073_741_824.0
                    );
                }
            }
            Err(e) => println!("Could not list models: {e}"),
        },
        other => println!("Unknown command '/{other}'. Type /help for commands."),
    }
    Ok(false)
}

/// Stdout sink with the configured inter-character delay. The delay is
/// presentation only; a zero delay prints fragments whole.
///
/// The sink is called synchronously from the stream consumer, so the delay
/// is a blocking sleep on the runtime worker. This process streams one
/// answer at a time; set `char_delay_ms = 0` to disable the throttle.
pub fn console_sink(char_delay_ms: u64) -> impl FnMut(&str) + Send {
    let delay = Duration::from_millis(char_delay_ms);
    move |fragment: &str| {
        if delay.is_zero() {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
            return;
        }
        for c in fragment.chars() {
            print!("{c}");
            let _ = std::io::stdout().flush();
            std::thread::sleep(delay);
        }
    }
}
