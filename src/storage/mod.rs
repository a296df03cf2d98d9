//! Persisted bucket storage: one logical table per granularity, physically
//! partitioned by calendar period.
//!
//! Sub-day levels partition by calendar day, the day level by calendar
//! month. A partition that was never written simply has no table; readers
//! treat that as an empty contribution, never as a fatal error.

pub mod sqlite;

pub use sqlite::SqliteFlowStore;

use crate::bucket::Granularity;
use crate::flow::FlowRecord;
use chrono::NaiveDateTime;

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Bucket storage seam consumed by the local query engine and the ingest
/// sink. `level` is always a stored level (see [`Granularity::stored`]).
pub trait FlowStore: Send + Sync {
    /// Records for `lane_ids` within `[start, end]` from one partition,
    /// ascending by `bucket_start`. An empty `lane_ids` slice means no lane
    /// filter.
    fn query_partition(
        &self,
        level: Granularity,
        partition: &str,
        lane_ids: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FlowRecord>, StoreError>;

    /// Upsert one sealed bucket record into its partition.
    fn write(&self, level: Granularity, record: &FlowRecord) -> Result<(), StoreError>;
}

/// Partition keys overlapping `[start, end]` for a stored level: daily keys
/// (`yyyymmdd`) below the day level, monthly keys (`yyyymm`) at day level.
pub fn partition_keys(level: Granularity, start: NaiveDateTime, end: NaiveDateTime) -> Vec<String> {
    let mut keys = Vec::new();
    if end < start {
        return keys;
    }
    if level.is_sub_day() {
        let mut day = start.date();
        while day <= end.date() {
            keys.push(day.format("%Y%m%d").to_string());
            day = day.succ_opt().unwrap_or(day);
        }
    } else {
        let mut month = Granularity::Month.align(start);
        while month <= end {
            keys.push(month.format("%Y%m").to_string());
            month = Granularity::Month.next(month);
        }
    }
    keys
}

/// Physical table name for a partition of a stored level.
pub fn table_name(level: Granularity, partition: &str) -> String {
    format!("flow_{}_{}", level.as_str(), partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_sub_day_levels_partition_by_day() {
        let keys = partition_keys(
            Granularity::Hour,
            ts(2019, 4, 29, 6),
            ts(2019, 4, 30, 18),
        );
        assert_eq!(keys, ["20190429", "20190430"]);
    }

    #[test]
    fn test_day_level_partitions_by_month() {
        let keys = partition_keys(Granularity::Day, ts(2019, 11, 20, 0), ts(2020, 1, 5, 0));
        assert_eq!(keys, ["201911", "201912", "202001"]);
    }

    #[test]
    fn test_single_partition_window() {
        let keys = partition_keys(
            Granularity::Minute,
            ts(2019, 4, 29, 0),
            ts(2019, 4, 29, 23),
        );
        assert_eq!(keys, ["20190429"]);
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let keys = partition_keys(Granularity::Hour, ts(2019, 5, 2, 0), ts(2019, 5, 1, 0));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_table_names() {
        assert_eq!(table_name(Granularity::Minute, "20190429"), "flow_1min_20190429");
        assert_eq!(table_name(Granularity::Day, "201904"), "flow_day_201904");
    }
}
