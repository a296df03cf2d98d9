//! List/chart query contract shared by the local and cluster engines.
//!
//! Both engines produce identical results for identical stored data; they
//! differ only in sourcing (local partition fan-out vs. remote node HTTP
//! fan-out). Failures on either path degrade the returned dataset instead
//! of propagating: a missing partition or unreachable node contributes an
//! empty set.

pub mod cluster;
pub mod local;

pub use cluster::ClusterQueryEngine;
pub use local::LocalQueryEngine;

use crate::bucket::Granularity;
use crate::flow::{ChartPoint, FlowRecord, FlowType};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One inclusive query window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }
}

/// The query contract satisfied by [`LocalQueryEngine`] and
/// [`ClusterQueryEngine`]; callers pick the sourcing strategy at
/// construction time.
#[async_trait::async_trait]
pub trait FlowQuery: Send + Sync {
    /// Re-aggregated records for one window, ascending by `bucket_start`.
    async fn list(
        &self,
        lane_ids: &[String],
        level: Granularity,
        window: TimeWindow,
    ) -> Vec<FlowRecord>;

    /// One chart series per requested window, caller order preserved.
    /// Axes are shifted so all series overlay on the baseline period.
    async fn chart(
        &self,
        lane_ids: &[String],
        level: Granularity,
        windows: &[TimeWindow],
        baseline: NaiveDateTime,
        flow_type: FlowType,
    ) -> Vec<Vec<ChartPoint>>;
}

/// Day-and-coarser windows are widened to full bucket bounds before
/// filtering; sub-day windows pass through unchanged.
pub(crate) fn effective_window(level: Granularity, window: TimeWindow) -> TimeWindow {
    if level.is_sub_day() {
        window
    } else {
        TimeWindow {
            start: level.align(window.start),
            end: level.next(window.end) - Duration::seconds(1),
        }
    }
}

/// Group records by bucket alignment and merge each group additively.
/// Grouping is identity for levels with their own storage table; month
/// queries fold day records here. Output is ascending by bucket start.
pub(crate) fn rollup(level: Granularity, records: &[FlowRecord]) -> Vec<FlowRecord> {
    let mut groups: BTreeMap<NaiveDateTime, FlowRecord> = BTreeMap::new();
    for record in records {
        let key = level.align(record.bucket_start);
        groups
            .entry(key)
            .and_modify(|group| group.merge(record))
            .or_insert_with(|| {
                let mut group = FlowRecord::empty(record.lane_id.clone(), key);
                group.merge(record);
                group
            });
    }
    groups.into_values().collect()
}

/// Build one chart series from grouped records. `axis` is the bucket key
/// shifted by the baseline span; `remark` keeps the true calendar label.
pub(crate) fn chart_series(
    level: Granularity,
    window: TimeWindow,
    baseline: NaiveDateTime,
    flow_type: FlowType,
    grouped: &[FlowRecord],
) -> Vec<ChartPoint> {
    let span = level.align(baseline) - level.align(window.start);
    grouped
        .iter()
        .map(|group| ChartPoint {
            axis: group.bucket_start + span,
            remark: level.format(group.bucket_start),
            value: group.metric(flow_type),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 4, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn record(lane: &str, start: NaiveDateTime, cars: i64) -> FlowRecord {
        let mut record = FlowRecord::empty(lane, start);
        record.cars = cars;
        record.sample_count = 60;
        record
    }

    #[test]
    fn test_rollup_merges_lanes_per_bucket() {
        let records = vec![
            record("L-2", ts(29, 9, 0), 5),
            record("L-1", ts(29, 8, 0), 10),
            record("L-2", ts(29, 8, 0), 20),
        ];

        let grouped = rollup(Granularity::Hour, &records);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].bucket_start, ts(29, 8, 0));
        assert_eq!(grouped[0].cars, 30);
        assert_eq!(grouped[0].sample_count, 120);
        assert_eq!(grouped[1].cars, 5);
    }

    #[test]
    fn test_rollup_day_records_to_month() {
        let records = vec![
            record("L-1", ts(1, 0, 0), 100),
            record("L-1", ts(29, 0, 0), 200),
        ];

        let grouped = rollup(Granularity::Month, &records);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].bucket_start, ts(1, 0, 0));
        assert_eq!(grouped[0].cars, 300);
    }

    #[test]
    fn test_effective_window_widens_day_level() {
        let window = TimeWindow::new(ts(29, 8, 30), ts(30, 9, 15));
        let widened = effective_window(Granularity::Day, window);
        assert_eq!(widened.start, ts(29, 0, 0));
        assert_eq!(widened.end, ts(30, 23, 59) + Duration::seconds(59));

        let sub_day = effective_window(Granularity::Hour, window);
        assert_eq!(sub_day, window);
    }

    #[test]
    fn test_chart_series_shifts_axis_keeps_remark() {
        let window = TimeWindow::new(ts(28, 0, 0), ts(28, 23, 59));
        let baseline = ts(29, 0, 0);
        let grouped = vec![record("L-1", ts(28, 8, 0), 12)];

        let series = chart_series(
            Granularity::Hour,
            window,
            baseline,
            FlowType::Total,
            &grouped,
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].axis, ts(29, 8, 0));
        assert_eq!(series[0].remark, "2019-04-28 08");
        assert_eq!(series[0].value, 12.0);
    }
}
