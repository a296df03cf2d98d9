//! Ingest Runtime - folds the sensor sample stream into bucket storage.
//!
//! Tails a JSONL file of one-minute lane samples, feeds them through the
//! ingest pipeline and persists sealed buckets into the partitioned sqlite
//! store. Ctrl-C (or truncating the stream) drains the pipeline so every
//! open bucket is sealed before exit.
//!
//! ## Environment Variables
//!
//! - SAMPLE_STREAM_PATH - JSONL sample stream to tail (required)
//! - LANEFLOW_DB_PATH - sqlite database path (default: data/laneflow.db)
//! - PIPELINE_CHANNEL_BUFFER - sample channel bound (default: 10000)
//! - RUST_LOG - log level (default: info)

use laneflow::config::RuntimeConfig;
use laneflow::flow::FlowSample;
use laneflow::ingest::FlowPipeline;
use laneflow::snapshot::InMemorySnapshotCache;
use laneflow::storage::SqliteFlowStore;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = RuntimeConfig::from_env()?;

    log::info!("starting laneflow ingest runtime");
    log::info!("   sample stream: {}", config.sample_stream_path);
    log::info!("   database: {}", config.db_path);
    log::info!("   channel buffer: {}", config.channel_buffer);

    let store = Arc::new(SqliteFlowStore::open(&config.db_path)?);
    let snapshots = Arc::new(InMemorySnapshotCache::new());
    let pipeline = FlowPipeline::start(store, snapshots, config.channel_buffer);

    let file = File::open(&config.sample_stream_path).await?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut parsed = 0u64;
    let mut rejected = 0u64;

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_line(&mut line) => {
                match read {
                    Ok(0) => {
                        // caught up with the writer; poll for more
                        sleep(Duration::from_millis(500)).await;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match FlowSample::from_jsonl(trimmed) {
                            Ok(sample) => {
                                pipeline.post(sample).await?;
                                parsed += 1;
                            }
                            Err(e) => {
                                rejected += 1;
                                log::warn!("failed to parse sample line: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        log::error!("sample stream read error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutdown signal received");
                break;
            }
        }
    }

    log::info!(
        "draining pipeline ({} samples posted, {} rejected)",
        parsed,
        rejected
    );
    pipeline.complete().await;
    log::info!("ingest runtime stopped");

    Ok(())
}
