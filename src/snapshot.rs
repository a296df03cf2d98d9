//! Shared snapshot cache of open and freshly sealed buckets.
//!
//! The ingest side writes a lane's current bucket record at every level
//! after each sample, so day-status views can read near-real-time "today"
//! values without touching bucket storage. Modeled as an injected trait so
//! tests substitute in-memory fakes; in a clustered deployment this sits on
//! a process-shared cache.

use crate::bucket::Granularity;
use crate::flow::FlowRecord;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait SnapshotCache: Send + Sync {
    fn get(&self, lane_id: &str, level: Granularity, bucket_start: NaiveDateTime)
        -> Option<FlowRecord>;

    fn put(&self, level: Granularity, record: FlowRecord);
}

#[derive(Default)]
pub struct InMemorySnapshotCache {
    entries: Mutex<HashMap<(String, Granularity, NaiveDateTime), FlowRecord>>,
}

impl InMemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for InMemorySnapshotCache {
    fn get(
        &self,
        lane_id: &str,
        level: Granularity,
        bucket_start: NaiveDateTime,
    ) -> Option<FlowRecord> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&(lane_id.to_string(), level, bucket_start))
            .cloned()
    }

    fn put(&self, level: Granularity, record: FlowRecord) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            (record.lane_id.clone(), level, record.bucket_start),
            record,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_put_overwrites_open_bucket() {
        let cache = InMemorySnapshotCache::new();
        let start = NaiveDate::from_ymd_opt(2019, 4, 29)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();

        let mut record = FlowRecord::empty("L-1", start);
        record.cars = 3;
        cache.put(Granularity::Hour, record.clone());

        record.cars = 7;
        cache.put(Granularity::Hour, record);

        let got = cache.get("L-1", Granularity::Hour, start).unwrap();
        assert_eq!(got.cars, 7);
        assert!(cache.get("L-1", Granularity::Day, start).is_none());
    }
}
