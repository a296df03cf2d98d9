//! Streaming ingest: per-granularity window folds driven by a bounded
//! channel.
//!
//! ```text
//! FlowSample ──post()──▶ mpsc ──▶ per-lane WindowAggregator bank
//!                                      │ sealed buckets
//!                                      ├──▶ BucketSink (storage)
//!                                      └──▶ SnapshotCache (open + sealed)
//! ```

pub mod pipeline;
pub mod window;

pub use pipeline::{BucketSink, FlowPipeline, PipelineError};
pub use window::WindowAggregator;
