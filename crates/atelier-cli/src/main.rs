//! Atelier CLI - replay tool-call streams against a project
//!
//! Usage:
//!   atelier replay events.jsonl                 Replay onto an empty project
//!   atelier replay --snapshot in.json -         Replay stdin onto a snapshot
//!   atelier tools [--json]                      Print the tool catalog
//!
//! Per-call status goes to stderr; the resulting snapshot goes to stdout.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use atelier::agent::{
    CallState, ToolCallEvent, ToolCallSequencer, ToolRegistry, VecToolRegistry, generate_index_txt,
};
use atelier::{EngineConfig, FileTree, Snapshot};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "atelier", version, about = "Replay tool-call streams against an in-memory project")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply a JSONL stream of tool-call events and print the resulting snapshot
    Replay {
        /// Event file, one JSON event per line (`-` or omitted reads stdin)
        events: Option<PathBuf>,

        /// Snapshot JSON document to start from
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Engine configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Prefix `view` output lines with their line number
        #[arg(long)]
        number_lines: bool,

        /// Pretty-print the snapshot
        #[arg(long)]
        pretty: bool,
    },
    /// Print the tool catalog
    Tools {
        /// Print full JSON definitions instead of the index
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    match Cli::parse().command {
        Commands::Replay {
            events,
            snapshot,
            config,
            number_lines,
            pretty,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::from_json(&read_file(&path)?)
                    .with_context(|| format!("parsing config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            config.number_view_lines |= number_lines;

            let snapshot = match snapshot {
                Some(path) => Snapshot::from_json(&read_file(&path)?)?,
                None => Snapshot::new(),
            };
            let input = match events.as_deref() {
                Some(path) if path != Path::new("-") => read_file(path)?,
                _ => {
                    let mut input = String::new();
                    io::stdin()
                        .read_to_string(&mut input)
                        .context("reading events from stdin")?;
                    input
                }
            };

            let snapshot = replay(config, &snapshot, &input).await?;
            let json = if pretty {
                snapshot.to_json_pretty()?
            } else {
                snapshot.to_json()?
            };
            writeln!(io::stdout(), "{json}")?;
        }
        Commands::Tools { json } => {
            let registry = VecToolRegistry::builtin();
            if json {
                writeln!(
                    io::stdout(),
                    "{}",
                    serde_json::to_string_pretty(registry.definitions())?
                )?;
            } else {
                write!(io::stdout(), "{}", generate_index_txt(&registry.list_tools()))?;
            }
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

async fn replay(config: EngineConfig, snapshot: &Snapshot, input: &str) -> anyhow::Result<Snapshot> {
    let mut tree = FileTree::from_snapshot(snapshot)?;
    let mut sequencer = ToolCallSequencer::new(config);

    let events = input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            ToolCallEvent::from_json(line).with_context(|| format!("line {}: invalid event", i + 1))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::debug!(events = events.len(), "replaying");

    let outcome = sequencer
        .apply_stream(&mut tree, futures::stream::iter(events))
        .await;

    for record in sequencer.records() {
        let status = record.status();
        match &record.state {
            CallState::Result { .. } => eprintln!("ok      {}", status.text),
            CallState::Error { error, .. } => eprintln!("failed  {}: {}", status.text, error),
            _ => eprintln!("pending {}", status.text),
        }
    }

    let mutations = outcome.context("tool-call stream rejected")?;
    tracing::info!(mutations, files = tree.len(), "replay finished");
    Ok(tree.serialize())
}
