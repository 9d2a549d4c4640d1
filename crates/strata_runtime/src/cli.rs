use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use strata::AggregateIdentifier;
use strata_message_store::FileStore;
use strata_runtime::EventStore;

/// Inspect a strata event log
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
struct Cli {
    /// Event log file
    #[clap(short, long, env = "STRATA_LOG_PATH", default_value = "./strata.log")]
    log_path: PathBuf,
    /// Bounded context of the streams to read
    #[clap(short, long, env = "STRATA_CONTEXT")]
    context: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every stream with its current version
    Streams,
    /// Print the events of one aggregate
    Read {
        /// Aggregate name
        #[clap(long)]
        name: String,
        /// Aggregate ID
        #[clap(long)]
        id: String,
        /// Only events after this version
        #[clap(long, default_value_t = 0)]
        after: u64,
        /// Maximum number of events
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Print the events of every aggregate in global order
    All {
        /// Number of events to skip
        #[clap(long, default_value_t = 0)]
        skip: usize,
        /// Maximum number of events
        #[clap(long)]
        limit: Option<usize>,
    },
}

pub async fn start() -> Result<()> {
    let cli = Cli::parse();

    let store = FileStore::open_read_only(&cli.log_path)
        .with_context(|| format!("failed to open log file {}", cli.log_path.display()))?;
    let mut event_store = EventStore::new(store);
    if let Some(context) = cli.context {
        event_store = event_store.with_context(context);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Streams => {
            let mut streams: BTreeMap<AggregateIdentifier, u64> = BTreeMap::new();
            for event in event_store.load_all_events(0, None).await? {
                streams.insert(event.aggregate.clone(), event.version);
            }
            for (aggregate, version) in streams {
                write_line(&mut out, &json!({ "aggregate": aggregate, "version": version }))?;
            }
        }
        Command::Read {
            name,
            id,
            after,
            limit,
        } => {
            let aggregate = AggregateIdentifier::new(name, id);
            for event in event_store.load_events(&aggregate, after, limit).await? {
                write_line(&mut out, &event)?;
            }
        }
        Command::All { skip, limit } => {
            for event in event_store.load_all_events(skip, limit).await? {
                write_line(&mut out, &event)?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
