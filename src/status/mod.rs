//! Per-channel day and hour status views.
//!
//! A view composes, for each of today / yesterday / same day last month /
//! same day last year, a synthetic all-lanes entry (index 0) plus one entry
//! per physical lane. Historical parts are expensive (they re-aggregate
//! bucket storage) and live in the rollup cache until the day rolls over;
//! the today and yesterday-hour parts are rebuilt from snapshot-cache
//! entries on every request so they track near-real-time state.

pub mod rollup;

pub use rollup::{DayRollup, HourRollup, InMemoryRollupStore, RollupStore};

use crate::bucket::Granularity;
use crate::flow::{ChartPoint, FlowRecord, FlowType, ALL_LANES};
use crate::query::{chart_series, FlowQuery, TimeWindow};
use crate::snapshot::SnapshotCache;
use crate::topology::LaneDirectory;
use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ChannelDayStatus {
    pub channel_id: String,
    pub day: NaiveDate,
    /// Day totals per lane, all-lanes row first.
    pub today_lanes: Vec<FlowRecord>,
    pub yesterday_lanes: Vec<FlowRecord>,
    pub last_month_lanes: Vec<FlowRecord>,
    pub last_year_lanes: Vec<FlowRecord>,
    /// Hour-granularity series per lane, all-lanes series first, axes
    /// overlaid on today.
    pub today_charts: Vec<Vec<ChartPoint>>,
    pub yesterday_charts: Vec<Vec<ChartPoint>>,
    pub last_month_charts: Vec<Vec<ChartPoint>>,
    pub last_year_charts: Vec<Vec<ChartPoint>>,
}

#[derive(Debug, Clone)]
pub struct ChannelHourStatus {
    pub channel_id: String,
    pub hour_start: NaiveDateTime,
    /// Minute-granularity series per lane, all-lanes series first, axes
    /// overlaid on the current clock hour.
    pub today_charts: Vec<Vec<ChartPoint>>,
    pub yesterday_charts: Vec<Vec<ChartPoint>>,
    pub last_month_charts: Vec<Vec<ChartPoint>>,
    pub last_year_charts: Vec<Vec<ChartPoint>>,
}

pub struct StatusService {
    query: Arc<dyn FlowQuery>,
    topology: Arc<dyn LaneDirectory>,
    snapshots: Arc<dyn SnapshotCache>,
    rollups: Arc<dyn RollupStore>,
}

fn day_window(day_start: NaiveDateTime) -> TimeWindow {
    TimeWindow::new(
        day_start,
        Granularity::Day.next(day_start) - Duration::seconds(1),
    )
}

fn hour_window(hour_start: NaiveDateTime) -> TimeWindow {
    TimeWindow::new(
        hour_start,
        Granularity::Hour.next(hour_start) - Duration::seconds(1),
    )
}

impl StatusService {
    pub fn new(
        query: Arc<dyn FlowQuery>,
        topology: Arc<dyn LaneDirectory>,
        snapshots: Arc<dyn SnapshotCache>,
        rollups: Arc<dyn RollupStore>,
    ) -> Self {
        Self {
            query,
            topology,
            snapshots,
            rollups,
        }
    }

    pub async fn channel_day_status(
        &self,
        channel_id: &str,
        now: NaiveDateTime,
    ) -> ChannelDayStatus {
        let lane_ids = self.channel_lane_ids(channel_id);

        let today = Granularity::Day.align(now);
        let yesterday = today - Duration::days(1);
        let last_month = today
            .checked_sub_months(Months::new(1))
            .unwrap_or(yesterday);
        let last_year = today
            .checked_sub_months(Months::new(12))
            .unwrap_or(yesterday);

        let historical = match self.rollups.get_day(channel_id, today.date()) {
            Some(cached) => cached,
            None => {
                log::debug!(
                    "computing day rollup for channel {} ({})",
                    channel_id,
                    today.date()
                );
                let rollup = DayRollup {
                    yesterday_lanes: self.period_lane_rows(&lane_ids, yesterday).await,
                    last_month_lanes: self.period_lane_rows(&lane_ids, last_month).await,
                    last_year_lanes: self.period_lane_rows(&lane_ids, last_year).await,
                    last_month_charts: self
                        .period_charts(&lane_ids, Granularity::Hour, day_window(last_month), today)
                        .await,
                    last_year_charts: self
                        .period_charts(&lane_ids, Granularity::Hour, day_window(last_year), today)
                        .await,
                };
                self.rollups.put_day(channel_id, today.date(), rollup.clone());
                rollup
            }
        };

        ChannelDayStatus {
            channel_id: channel_id.to_string(),
            day: today.date(),
            today_lanes: self.today_lane_rows(&lane_ids, today),
            yesterday_lanes: historical.yesterday_lanes,
            last_month_lanes: historical.last_month_lanes,
            last_year_lanes: historical.last_year_lanes,
            today_charts: self.snapshot_charts(
                &lane_ids,
                Granularity::Hour,
                day_window(today),
                today,
            ),
            yesterday_charts: self.snapshot_charts(
                &lane_ids,
                Granularity::Hour,
                day_window(yesterday),
                today,
            ),
            last_month_charts: historical.last_month_charts,
            last_year_charts: historical.last_year_charts,
        }
    }

    pub async fn channel_hour_status(
        &self,
        channel_id: &str,
        now: NaiveDateTime,
    ) -> ChannelHourStatus {
        use chrono::Timelike;

        let lane_ids = self.channel_lane_ids(channel_id);

        let hour_start = Granularity::Hour.align(now);
        let today = Granularity::Day.align(now);
        let yesterday_hour = hour_start - Duration::days(1);
        let last_month_hour = hour_start
            .checked_sub_months(Months::new(1))
            .unwrap_or(yesterday_hour);
        let last_year_hour = hour_start
            .checked_sub_months(Months::new(12))
            .unwrap_or(yesterday_hour);

        let clock_hour = hour_start.time().hour();
        let historical = match self.rollups.get_hour(channel_id, today.date(), clock_hour) {
            Some(cached) => cached,
            None => {
                let rollup = HourRollup {
                    last_month_charts: self
                        .period_charts(
                            &lane_ids,
                            Granularity::Minute,
                            hour_window(last_month_hour),
                            hour_start,
                        )
                        .await,
                    last_year_charts: self
                        .period_charts(
                            &lane_ids,
                            Granularity::Minute,
                            hour_window(last_year_hour),
                            hour_start,
                        )
                        .await,
                };
                self.rollups
                    .put_hour(channel_id, today.date(), clock_hour, rollup.clone());
                rollup
            }
        };

        ChannelHourStatus {
            channel_id: channel_id.to_string(),
            hour_start,
            today_charts: self.snapshot_charts(
                &lane_ids,
                Granularity::Minute,
                hour_window(hour_start),
                hour_start,
            ),
            yesterday_charts: self.snapshot_charts(
                &lane_ids,
                Granularity::Minute,
                hour_window(yesterday_hour),
                hour_start,
            ),
            last_month_charts: historical.last_month_charts,
            last_year_charts: historical.last_year_charts,
        }
    }

    fn channel_lane_ids(&self, channel_id: &str) -> Vec<String> {
        let lane_ids: Vec<String> = self
            .topology
            .channel_lanes(channel_id)
            .into_iter()
            .map(|lane| lane.lane_id)
            .collect();
        if lane_ids.is_empty() {
            log::warn!("channel {} has no lanes in topology", channel_id);
        }
        lane_ids
    }

    /// Day summary rows for a historical period via the query engine:
    /// all-lanes row first, then one row per lane.
    async fn period_lane_rows(
        &self,
        lane_ids: &[String],
        day_start: NaiveDateTime,
    ) -> Vec<FlowRecord> {
        // an empty lane list would read as "no lane filter" downstream
        if lane_ids.is_empty() {
            return Vec::new();
        }
        let window = day_window(day_start);
        let mut rows = Vec::with_capacity(lane_ids.len() + 1);

        let merged = self.query.list(lane_ids, Granularity::Day, window).await;
        rows.push(single_row(merged, ALL_LANES, day_start));

        for lane_id in lane_ids {
            let list = self
                .query
                .list(std::slice::from_ref(lane_id), Granularity::Day, window)
                .await;
            rows.push(single_row(list, lane_id, day_start));
        }
        rows
    }

    /// Chart series for a historical period via the query engine:
    /// all-lanes series first, then one per lane.
    async fn period_charts(
        &self,
        lane_ids: &[String],
        level: Granularity,
        window: TimeWindow,
        baseline: NaiveDateTime,
    ) -> Vec<Vec<ChartPoint>> {
        if lane_ids.is_empty() {
            return Vec::new();
        }
        let windows = [window];
        let mut charts = Vec::with_capacity(lane_ids.len() + 1);

        let merged = self
            .query
            .chart(lane_ids, level, &windows, baseline, FlowType::Total)
            .await;
        charts.push(merged.into_iter().next().unwrap_or_default());

        for lane_id in lane_ids {
            let series = self
                .query
                .chart(
                    std::slice::from_ref(lane_id),
                    level,
                    &windows,
                    baseline,
                    FlowType::Total,
                )
                .await;
            charts.push(series.into_iter().next().unwrap_or_default());
        }
        charts
    }

    /// Today's day rows straight from the snapshot cache.
    fn today_lane_rows(&self, lane_ids: &[String], day_start: NaiveDateTime) -> Vec<FlowRecord> {
        if lane_ids.is_empty() {
            return Vec::new();
        }
        let per_lane: Vec<FlowRecord> = lane_ids
            .iter()
            .map(|lane_id| {
                self.snapshots
                    .get(lane_id, Granularity::Day, day_start)
                    .unwrap_or_else(|| FlowRecord::empty(lane_id.clone(), day_start))
            })
            .collect();

        let mut rows = Vec::with_capacity(per_lane.len() + 1);
        rows.push(FlowRecord::merged(ALL_LANES, day_start, per_lane.iter()));
        rows.extend(per_lane);
        rows
    }

    /// Chart series rebuilt from snapshot entries: all-lanes series first.
    /// Buckets with no snapshot for any lane are skipped, so a partially
    /// elapsed period yields a partial series.
    fn snapshot_charts(
        &self,
        lane_ids: &[String],
        level: Granularity,
        window: TimeWindow,
        baseline: NaiveDateTime,
    ) -> Vec<Vec<ChartPoint>> {
        if lane_ids.is_empty() {
            return Vec::new();
        }
        let mut charts = Vec::with_capacity(lane_ids.len() + 1);

        let merged = self.merged_snapshot_records(lane_ids, level, window);
        charts.push(chart_series(
            level,
            window,
            baseline,
            FlowType::Total,
            &merged,
        ));

        for lane_id in lane_ids {
            let records = self.lane_snapshot_records(lane_id, level, window);
            charts.push(chart_series(
                level,
                window,
                baseline,
                FlowType::Total,
                &records,
            ));
        }
        charts
    }

    fn lane_snapshot_records(
        &self,
        lane_id: &str,
        level: Granularity,
        window: TimeWindow,
    ) -> Vec<FlowRecord> {
        let mut records = Vec::new();
        let mut bucket = level.align(window.start);
        while bucket <= window.end {
            if let Some(record) = self.snapshots.get(lane_id, level, bucket) {
                records.push(record);
            }
            bucket = level.next(bucket);
        }
        records
    }

    fn merged_snapshot_records(
        &self,
        lane_ids: &[String],
        level: Granularity,
        window: TimeWindow,
    ) -> Vec<FlowRecord> {
        let mut records = Vec::new();
        let mut bucket = level.align(window.start);
        while bucket <= window.end {
            let found: Vec<FlowRecord> = lane_ids
                .iter()
                .filter_map(|lane_id| self.snapshots.get(lane_id, level, bucket))
                .collect();
            if !found.is_empty() {
                records.push(FlowRecord::merged(ALL_LANES, bucket, found.iter()));
            }
            bucket = level.next(bucket);
        }
        records
    }
}

fn single_row(list: Vec<FlowRecord>, lane_id: &str, day_start: NaiveDateTime) -> FlowRecord {
    let mut row = list
        .into_iter()
        .next()
        .unwrap_or_else(|| FlowRecord::empty(lane_id, day_start));
    row.lane_id = lane_id.to_string();
    row
}
