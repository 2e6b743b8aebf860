//! `docdb` — a command-line operator surface over the embedded engine.
//!
//! Every subcommand opens the database at `--data-dir` (default
//! `.docdb`), performs one operation, and exits; there is no REPL or
//! long-running server mode, matching the embedded, single-process
//! nature of the engine itself.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docdb_api::Engine;
use docdb_core::{JsonPatch, JsonPath};

#[derive(Parser)]
#[command(name = "docdb", version, about = "Operator CLI for the embedded document database")]
struct Cli {
    /// Root directory holding every named database.
    #[arg(long, default_value = ".docdb", global = true)]
    data_dir: PathBuf,

    /// Database name within the data directory.
    #[arg(long, default_value = "default", global = true)]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Opens (creating if absent) the database and reports its stats.
    Open,
    /// Writes a document. Fails if the payload is not a JSON object.
    Put {
        collection: String,
        doc_id: u64,
        /// JSON object payload, e.g. '{"name":"ada"}'.
        payload: String,
    },
    /// Reads a document and prints its JSON payload.
    Get { collection: String, doc_id: u64 },
    /// Deletes a document.
    Delete { collection: String, doc_id: u64 },
    /// Sets `path` to a JSON-encoded `value` on an existing document.
    Patch {
        collection: String,
        doc_id: u64,
        path: String,
        value: String,
    },
    /// Runs a compaction pass on every partition.
    Compact,
    /// Repairs one document from WAL history.
    Heal { collection: String, doc_id: u64 },
    /// Prints live/tombstoned document counts and memory usage.
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let engine = Engine::open(&cli.data_dir).context("opening engine root")?;
    let db = engine
        .create_database(&cli.database)
        .with_context(|| format!("opening database '{}'", cli.database))?;

    match cli.command {
        Command::Open => {
            let stats = db.stats();
            println!(
                "database '{}' open: {} partitions, {} live documents",
                cli.database, stats.partitions, stats.live_documents
            );
        }
        Command::Put {
            collection,
            doc_id,
            payload,
        } => {
            db.create(&collection, doc_id, payload.as_bytes())
                .context("writing document")?;
            println!("ok");
        }
        Command::Get { collection, doc_id } => match db.get(&collection, doc_id).context("reading document")? {
            Some(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            None => println!("(not found)"),
        },
        Command::Delete { collection, doc_id } => {
            db.delete(&collection, doc_id).context("deleting document")?;
            println!("ok");
        }
        Command::Patch {
            collection,
            doc_id,
            path,
            value,
        } => {
            let parsed_value: serde_json::Value =
                serde_json::from_str(&value).context("parsing patch value as JSON")?;
            let parsed_path = JsonPath::parse(&path).context("parsing patch path")?;
            let patch = JsonPatch::new().set(parsed_path, parsed_value);
            db.patch(&collection, doc_id, &patch).context("applying patch")?;
            println!("ok");
        }
        Command::Compact => {
            let stats = db.compact_all().context("compacting")?;
            for (i, s) in stats.iter().enumerate() {
                println!(
                    "partition {i}: {} -> {} bytes, {} versions rewritten",
                    s.bytes_before, s.bytes_after, s.live_versions_rewritten
                );
            }
        }
        Command::Heal { collection, doc_id } => {
            db.heal(&collection, doc_id).context("healing document")?;
            println!("ok");
        }
        Command::Stats => {
            let stats = db.stats();
            println!("partitions: {}", stats.partitions);
            println!("open transactions: {}", stats.open_transactions);
            println!("committed transactions: {}", stats.committed_transactions);
            println!("memory: {}/{} bytes", stats.memory_used_bytes, stats.memory_limit_bytes);
            println!("live documents: {}", stats.live_documents);
            println!("tombstoned documents: {}", stats.tombstoned_documents);
        }
    }

    Ok(())
}
