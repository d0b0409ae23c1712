use clap::{Parser, ValueEnum};
use cmp_ra::application::engine::RaEngine;
use cmp_ra::domain::config::RaConfig;
use cmp_ra::domain::ports::{MessageCodec, TransactionStore, UpstreamTransport};
use cmp_ra::infrastructure::in_memory::InMemoryTransactionStore;
use cmp_ra::infrastructure::loopback::{LoopbackCa, LoopbackMode};
use cmp_ra::interfaces::json::JsonCodec;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Copy, ValueEnum)]
enum UpstreamKind {
    /// In-process CA double answering on the same call
    Loopback,
    /// No upstream configured; requests are answered with systemUnavail
    None,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file with one JSON-encoded request per line
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Upstream wired into the engine
    #[arg(long, value_enum, default_value_t = UpstreamKind::Loopback)]
    upstream: UpstreamKind,

    /// Poll hint returned while an upstream exchange is pending
    #[arg(long, default_value_t = 10)]
    check_after_secs: u64,

    /// Retention horizon for waiting transactions, in seconds
    #[arg(long, default_value_t = 600)]
    retention_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RaConfig {
        retention_secs: cli.retention_secs,
        check_after_secs: cli.check_after_secs,
        known_profiles: Vec::new(),
    };
    let codec: Arc<dyn MessageCodec> = Arc::new(JsonCodec);

    let store: Arc<dyn TransactionStore> = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Arc::new(
            cmp_ra::infrastructure::rocksdb::RocksDbTransactionStore::open(path)
                .into_diagnostic()?,
        ),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => miette::bail!("--db-path requires the storage-rocksdb feature"),
        None => Arc::new(InMemoryTransactionStore::new()),
    };

    let transport: Option<Arc<dyn UpstreamTransport>> = match cli.upstream {
        UpstreamKind::Loopback => {
            Some(Arc::new(LoopbackCa::new(codec.clone(), LoopbackMode::Sync)))
        }
        UpstreamKind::None => None,
    };

    let engine = RaEngine::new(config, store, codec, transport);

    // Replay requests one per line, responses one per line.
    let file = File::open(cli.input).into_diagnostic()?;
    for line in BufReader::new(file).lines() {
        let line = line.into_diagnostic()?;
        if line.trim().is_empty() {
            continue;
        }
        match engine.process_downstream_request(line.as_bytes()).await {
            Ok(raw) => println!("{}", String::from_utf8_lossy(&raw)),
            Err(e) => eprintln!("Error processing message: {e}"),
        }
    }

    Ok(())
}
