//! laneflow - streaming aggregation and bucketed queries for per-lane
//! traffic-sensor samples.
//!
//! One-minute samples are folded into 1/5/15-minute, hour and day buckets as
//! they arrive, persisted into calendar-partitioned storage, and read back
//! through a list/chart query contract that re-aggregates across lanes,
//! partitions and (in clustered deployments) remote nodes.
//!
//! ```text
//! FlowSample (JSONL, 1/min/lane)
//!     ↓
//! FlowPipeline (per-lane WindowAggregator bank)
//!     ↓                         ↓
//! BucketSink (sqlite)      SnapshotCache (open + sealed buckets)
//!     ↓                         ↓
//! LocalQueryEngine / ClusterQueryEngine → StatusService (rollup cache)
//! ```

pub mod bucket;
pub mod config;
pub mod flow;
pub mod ingest;
pub mod query;
pub mod snapshot;
pub mod sqlite_pragma;
pub mod status;
pub mod storage;
pub mod topology;
