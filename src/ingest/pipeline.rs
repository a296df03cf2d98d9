//! Ingest pipeline: bounded-channel fan-in, per-lane aggregator banks.
//!
//! One consumer task owns all aggregator state, so every lane's fold is a
//! strictly sequential single-threaded pass regardless of how many producers
//! call [`FlowPipeline::post`]. Sealed buckets go to the [`BucketSink`];
//! both sealed and open buckets are mirrored into the snapshot cache so
//! status views see near-real-time values.

use crate::bucket::Granularity;
use crate::flow::{FlowRecord, FlowSample};
use crate::ingest::window::WindowAggregator;
use crate::snapshot::SnapshotCache;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Destination for sealed bucket records (the sqlite store in production).
#[async_trait::async_trait]
pub trait BucketSink: Send + Sync {
    async fn write_bucket(
        &self,
        level: Granularity,
        record: FlowRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug)]
pub enum PipelineError {
    Closed,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Closed => write!(f, "ingest pipeline is closed"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Handle to the running ingest pipeline.
pub struct FlowPipeline {
    tx: mpsc::Sender<FlowSample>,
    handle: JoinHandle<()>,
}

impl FlowPipeline {
    /// Spawn the consumer task. `buffer` bounds the sample channel; a full
    /// channel backpressures `post`.
    pub fn start(
        sink: Arc<dyn BucketSink>,
        snapshots: Arc<dyn SnapshotCache>,
        buffer: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        let handle = tokio::spawn(run_ingest(rx, sink, snapshots));
        Self { tx, handle }
    }

    /// Enqueue one sample. Awaits when the channel is full.
    pub async fn post(&self, sample: FlowSample) -> Result<(), PipelineError> {
        self.tx
            .send(sample)
            .await
            .map_err(|_| PipelineError::Closed)
    }

    /// Signal end-of-stream and await full drain: all buffered samples are
    /// processed and every open bucket is sealed and written before this
    /// returns.
    pub async fn complete(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            log::error!("ingest task ended abnormally: {}", e);
        }
    }
}

fn new_bank() -> Vec<WindowAggregator> {
    Granularity::stored()
        .iter()
        .map(|level| WindowAggregator::new(*level))
        .collect()
}

async fn run_ingest(
    mut rx: mpsc::Receiver<FlowSample>,
    sink: Arc<dyn BucketSink>,
    snapshots: Arc<dyn SnapshotCache>,
) {
    log::info!("ingest pipeline started");

    let mut lanes: HashMap<String, Vec<WindowAggregator>> = HashMap::new();
    let mut sample_count = 0u64;
    let mut last_log = std::time::Instant::now();

    while let Some(sample) = rx.recv().await {
        let bank = lanes
            .entry(sample.lane_id.clone())
            .or_insert_with(new_bank);

        for aggregator in bank.iter_mut() {
            let level = aggregator.level();
            if let Some(sealed) = aggregator.push(&sample) {
                snapshots.put(level, sealed.clone());
                if let Err(e) = sink.write_bucket(level, sealed).await {
                    log::error!("failed to persist {} bucket: {}", level.as_str(), e);
                }
            }
            if let Some(open) = aggregator.open_bucket() {
                snapshots.put(level, open.clone());
            }
        }

        sample_count += 1;
        if last_log.elapsed().as_secs() >= 10 {
            let rate = sample_count as f64 / last_log.elapsed().as_secs_f64();
            log::info!(
                "ingest rate: {:.1} samples/sec across {} lanes",
                rate,
                lanes.len()
            );
            sample_count = 0;
            last_log = std::time::Instant::now();
        }
    }

    // End of stream: seal every open bucket before reporting drained.
    log::info!("sample channel closed, sealing open buckets");
    let mut sealed_count = 0usize;
    for bank in lanes.values_mut() {
        for aggregator in bank.iter_mut() {
            let level = aggregator.level();
            if let Some(sealed) = aggregator.finish() {
                snapshots.put(level, sealed.clone());
                if let Err(e) = sink.write_bucket(level, sealed).await {
                    log::error!("failed to persist final {} bucket: {}", level.as_str(), e);
                } else {
                    sealed_count += 1;
                }
            }
        }
    }
    log::info!(
        "ingest pipeline drained: {} final buckets sealed across {} lanes",
        sealed_count,
        lanes.len()
    );
}
