//! Single-stream windowed fold from samples to sealed bucket records.

use crate::bucket::Granularity;
use crate::flow::{FlowRecord, FlowSample};

/// Folds an ordered sample stream into one bucket record per elapsed window.
///
/// Three states: idle (no open bucket), accumulating (one open record) and
/// closed (after [`WindowAggregator::finish`]). Samples must arrive in
/// non-decreasing time order; an out-of-order sample reopens an earlier
/// bucket and the previously open record is emitted as-is, which undercounts
/// the reopened bucket. This is not detected beyond a debug log.
pub struct WindowAggregator {
    level: Granularity,
    current: Option<FlowRecord>,
    closed: bool,
}

impl WindowAggregator {
    pub fn new(level: Granularity) -> Self {
        Self {
            level,
            current: None,
            closed: false,
        }
    }

    pub fn level(&self) -> Granularity {
        self.level
    }

    /// The open bucket while accumulating.
    pub fn open_bucket(&self) -> Option<&FlowRecord> {
        self.current.as_ref()
    }

    /// Feed one sample. Returns the sealed record when the sample opens a
    /// new bucket, `None` while the current bucket keeps accumulating.
    pub fn push(&mut self, sample: &FlowSample) -> Option<FlowRecord> {
        if self.closed {
            log::debug!(
                "ignoring sample for lane {} on closed {} aggregator",
                sample.lane_id,
                self.level.as_str()
            );
            return None;
        }

        let start = self.level.align(sample.timestamp);
        match self.current.take() {
            None => {
                self.current = Some(sample.to_record(start));
                None
            }
            Some(mut open) => {
                if open.bucket_start == start {
                    open.merge(&sample.to_record(start));
                    self.current = Some(open);
                    None
                } else {
                    if start < open.bucket_start {
                        log::debug!(
                            "out-of-order sample at {} reopened {} bucket before {}",
                            sample.timestamp,
                            self.level.as_str(),
                            open.bucket_start
                        );
                    }
                    self.current = Some(sample.to_record(start));
                    Some(open)
                }
            }
        }
    }

    /// End of stream: seal and return the open bucket. The aggregator is
    /// closed afterwards and ignores further samples.
    pub fn finish(&mut self) -> Option<FlowRecord> {
        self.closed = true;
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn minute_sample(lane: &str, t: NaiveDateTime, cars: i64) -> FlowSample {
        FlowSample {
            lane_id: lane.to_string(),
            timestamp: t,
            cars,
            buses: 0,
            trucks: 0,
            tractors: 0,
            motorcycles: 0,
            tricycles: 0,
            bicycles: 0,
            pedestrians: 0,
            occupancy: 10.0,
            time_occupancy: 8.0,
            headway_time: 3.0,
            travel_time: 60.0,
            distance: 700.0,
        }
    }

    fn day_start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 4, 29)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_full_day_into_five_minute_buckets() {
        // 1440 one-minute samples with cars=1 -> 288 sealed records of 5
        let mut aggregator = WindowAggregator::new(Granularity::FiveMinutes);
        let mut sealed = Vec::new();

        for minute in 0..1440i64 {
            let t = day_start() + chrono::Duration::minutes(minute);
            sealed.extend(aggregator.push(&minute_sample("L-1", t, 1)));
        }
        sealed.extend(aggregator.finish());

        assert_eq!(sealed.len(), 288);
        for (i, record) in sealed.iter().enumerate() {
            assert_eq!(
                record.bucket_start,
                day_start() + chrono::Duration::minutes(5 * i as i64)
            );
            assert_eq!(record.total(), 5);
            assert_eq!(record.sample_count, 5);
        }
    }

    #[test]
    fn test_sums_carry_through_bucket() {
        let mut aggregator = WindowAggregator::new(Granularity::Hour);
        for minute in 0..60i64 {
            let t = day_start() + chrono::Duration::minutes(minute);
            assert!(aggregator.push(&minute_sample("L-1", t, 2)).is_none());
        }

        let sealed = aggregator
            .push(&minute_sample("L-1", day_start() + chrono::Duration::hours(1), 1))
            .unwrap();
        assert_eq!(sealed.bucket_start, day_start());
        assert_eq!(sealed.cars, 120);
        assert_eq!(sealed.sample_count, 60);
        assert!((sealed.occupancy - 600.0).abs() < 1e-9);
        assert!((sealed.occupancy_pct() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_finish_seals_partial_bucket() {
        let mut aggregator = WindowAggregator::new(Granularity::QuarterHour);
        aggregator.push(&minute_sample("L-1", day_start(), 1));
        aggregator.push(&minute_sample("L-1", day_start() + chrono::Duration::minutes(1), 1));

        let sealed = aggregator.finish().unwrap();
        assert_eq!(sealed.sample_count, 2);

        // closed: further input is ignored
        assert!(aggregator
            .push(&minute_sample("L-1", day_start() + chrono::Duration::minutes(20), 1))
            .is_none());
        assert!(aggregator.finish().is_none());
    }

    #[test]
    fn test_out_of_order_sample_loses_reopened_bucket() {
        let mut aggregator = WindowAggregator::new(Granularity::FiveMinutes);
        aggregator.push(&minute_sample("L-1", day_start(), 1));
        let sealed = aggregator
            .push(&minute_sample("L-1", day_start() + chrono::Duration::minutes(6), 1));
        assert!(sealed.is_some());

        // stepping back reopens the first bucket as a fresh record
        let sealed = aggregator
            .push(&minute_sample("L-1", day_start() + chrono::Duration::minutes(1), 1))
            .unwrap();
        assert_eq!(
            sealed.bucket_start,
            day_start() + chrono::Duration::minutes(5)
        );
        assert_eq!(aggregator.open_bucket().unwrap().sample_count, 1);
    }
}
