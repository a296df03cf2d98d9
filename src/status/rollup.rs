//! Rollup cache for the expensive historical parts of channel views.
//!
//! Keyed by `(channel_id, calendar_day)` (plus the clock hour for hour
//! views). Entries are never evicted here; a new calendar day simply
//! misses under the new key and stale entries are left to the backing
//! cache's own policy. Two concurrent misses may both compute and both
//! write; the computations are deterministic, so last write wins.

use crate::flow::{ChartPoint, FlowRecord};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

/// Historical portion of a channel day view. Series/rows are indexed like
/// the view itself: synthetic all-lanes entry first, then one per lane.
#[derive(Debug, Clone, Default)]
pub struct DayRollup {
    pub yesterday_lanes: Vec<FlowRecord>,
    pub last_month_lanes: Vec<FlowRecord>,
    pub last_year_lanes: Vec<FlowRecord>,
    pub last_month_charts: Vec<Vec<ChartPoint>>,
    pub last_year_charts: Vec<Vec<ChartPoint>>,
}

/// Historical portion of a channel hour view.
#[derive(Debug, Clone, Default)]
pub struct HourRollup {
    pub last_month_charts: Vec<Vec<ChartPoint>>,
    pub last_year_charts: Vec<Vec<ChartPoint>>,
}

pub trait RollupStore: Send + Sync {
    fn get_day(&self, channel_id: &str, day: NaiveDate) -> Option<DayRollup>;
    fn put_day(&self, channel_id: &str, day: NaiveDate, rollup: DayRollup);
    fn get_hour(&self, channel_id: &str, day: NaiveDate, hour: u32) -> Option<HourRollup>;
    fn put_hour(&self, channel_id: &str, day: NaiveDate, hour: u32, rollup: HourRollup);
}

#[derive(Default)]
pub struct InMemoryRollupStore {
    days: Mutex<HashMap<(String, NaiveDate), DayRollup>>,
    hours: Mutex<HashMap<(String, NaiveDate, u32), HourRollup>>,
}

impl InMemoryRollupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RollupStore for InMemoryRollupStore {
    fn get_day(&self, channel_id: &str, day: NaiveDate) -> Option<DayRollup> {
        self.days
            .lock()
            .unwrap()
            .get(&(channel_id.to_string(), day))
            .cloned()
    }

    fn put_day(&self, channel_id: &str, day: NaiveDate, rollup: DayRollup) {
        self.days
            .lock()
            .unwrap()
            .insert((channel_id.to_string(), day), rollup);
    }

    fn get_hour(&self, channel_id: &str, day: NaiveDate, hour: u32) -> Option<HourRollup> {
        self.hours
            .lock()
            .unwrap()
            .get(&(channel_id.to_string(), day, hour))
            .cloned()
    }

    fn put_hour(&self, channel_id: &str, day: NaiveDate, hour: u32, rollup: HourRollup) {
        self.hours
            .lock()
            .unwrap()
            .insert((channel_id.to_string(), day, hour), rollup);
    }
}
