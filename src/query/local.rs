//! Query engine over local partitioned bucket storage.

use crate::bucket::Granularity;
use crate::flow::{ChartPoint, FlowRecord, FlowType};
use crate::query::{chart_series, effective_window, rollup, FlowQuery, TimeWindow};
use crate::storage::{partition_keys, FlowStore};
use chrono::NaiveDateTime;
use std::sync::Arc;

pub struct LocalQueryEngine {
    store: Arc<dyn FlowStore>,
}

impl LocalQueryEngine {
    pub fn new(store: Arc<dyn FlowStore>) -> Self {
        Self { store }
    }

    /// Raw records for one window across every overlapping partition.
    /// A failing partition contributes an empty set; the query never aborts.
    fn fetch(
        &self,
        lane_ids: &[String],
        level: Granularity,
        window: TimeWindow,
    ) -> Vec<FlowRecord> {
        let source = level.source_level();
        let window = effective_window(level, window);

        let mut records = Vec::new();
        for partition in partition_keys(source, window.start, window.end) {
            match self
                .store
                .query_partition(source, &partition, lane_ids, window.start, window.end)
            {
                Ok(batch) => records.extend(batch),
                Err(e) => log::warn!(
                    "partition {} unavailable for {} query: {}",
                    partition,
                    level.as_str(),
                    e
                ),
            }
        }
        records
    }
}

#[async_trait::async_trait]
impl FlowQuery for LocalQueryEngine {
    async fn list(
        &self,
        lane_ids: &[String],
        level: Granularity,
        window: TimeWindow,
    ) -> Vec<FlowRecord> {
        rollup(level, &self.fetch(lane_ids, level, window))
    }

    async fn chart(
        &self,
        lane_ids: &[String],
        level: Granularity,
        windows: &[TimeWindow],
        baseline: NaiveDateTime,
        flow_type: FlowType,
    ) -> Vec<Vec<ChartPoint>> {
        let mut series = Vec::with_capacity(windows.len());
        for window in windows {
            let grouped = rollup(level, &self.fetch(lane_ids, level, *window));
            series.push(chart_series(level, *window, baseline, flow_type, &grouped));
        }
        series
    }
}
