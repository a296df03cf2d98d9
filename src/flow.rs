//! Flow records, raw sensor samples and derived traffic metrics.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lane id carried by the synthetic "all lanes" row in channel views.
pub const ALL_LANES: &str = "*";

/// One bucket's aggregated traffic counts for one lane.
///
/// Counters and sums are additive across samples, lanes and partitions.
/// `occupancy`/`time_occupancy` are sums of percentage·sample and the
/// headway/travel/distance fields are formula inputs only; none of them is
/// displayable without dividing by `sample_count` first. Every derived rate
/// resolves to zero when its denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub lane_id: String,
    pub bucket_start: NaiveDateTime,
    pub cars: i64,
    pub buses: i64,
    pub trucks: i64,
    pub tractors: i64,
    pub motorcycles: i64,
    pub tricycles: i64,
    pub bicycles: i64,
    pub pedestrians: i64,
    pub occupancy: f64,
    pub time_occupancy: f64,
    pub headway_time_sum: f64,
    pub travel_time_sum: f64,
    pub distance_sum: f64,
    pub sample_count: i64,
}

impl FlowRecord {
    pub fn empty(lane_id: impl Into<String>, bucket_start: NaiveDateTime) -> Self {
        Self {
            lane_id: lane_id.into(),
            bucket_start,
            cars: 0,
            buses: 0,
            trucks: 0,
            tractors: 0,
            motorcycles: 0,
            tricycles: 0,
            bicycles: 0,
            pedestrians: 0,
            occupancy: 0.0,
            time_occupancy: 0.0,
            headway_time_sum: 0.0,
            travel_time_sum: 0.0,
            distance_sum: 0.0,
            sample_count: 0,
        }
    }

    /// Fold another record into this one. All counters and sums add;
    /// `lane_id` and `bucket_start` keep their current values, so the caller
    /// decides what the merged row represents.
    pub fn merge(&mut self, other: &FlowRecord) {
        self.cars += other.cars;
        self.buses += other.buses;
        self.trucks += other.trucks;
        self.tractors += other.tractors;
        self.motorcycles += other.motorcycles;
        self.tricycles += other.tricycles;
        self.bicycles += other.bicycles;
        self.pedestrians += other.pedestrians;
        self.occupancy += other.occupancy;
        self.time_occupancy += other.time_occupancy;
        self.headway_time_sum += other.headway_time_sum;
        self.travel_time_sum += other.travel_time_sum;
        self.distance_sum += other.distance_sum;
        self.sample_count += other.sample_count;
    }

    /// Merge an iterator of records into a single row.
    pub fn merged<'a>(
        lane_id: impl Into<String>,
        bucket_start: NaiveDateTime,
        records: impl IntoIterator<Item = &'a FlowRecord>,
    ) -> Self {
        let mut out = Self::empty(lane_id, bucket_start);
        for record in records {
            out.merge(record);
        }
        out
    }

    /// Sum of the eight class counters.
    pub fn total(&self) -> i64 {
        self.cars
            + self.buses
            + self.trucks
            + self.tractors
            + self.motorcycles
            + self.tricycles
            + self.bicycles
            + self.pedestrians
    }

    /// distance/travel-time converted to km/h, 0 when no travel time.
    pub fn average_speed_kmh(&self) -> f64 {
        if self.travel_time_sum > 0.0 {
            self.distance_sum / self.travel_time_sum * 3600.0 / 1000.0
        } else {
            0.0
        }
    }

    /// Mean headway time in seconds, 0 when the bucket holds no samples.
    pub fn headway_time_secs(&self) -> f64 {
        if self.sample_count > 0 {
            self.headway_time_sum / self.sample_count as f64
        } else {
            0.0
        }
    }

    /// Mean headway distance in meters: mean headway time times mean speed.
    pub fn headway_space_m(&self) -> f64 {
        if self.sample_count > 0 && self.travel_time_sum > 0.0 {
            (self.headway_time_sum / self.sample_count as f64)
                * (self.distance_sum / self.travel_time_sum)
        } else {
            0.0
        }
    }

    pub fn occupancy_pct(&self) -> f64 {
        if self.sample_count > 0 {
            self.occupancy / self.sample_count as f64
        } else {
            0.0
        }
    }

    pub fn time_occupancy_pct(&self) -> f64 {
        if self.sample_count > 0 {
            self.time_occupancy / self.sample_count as f64
        } else {
            0.0
        }
    }

    /// Value charted for `flow_type`.
    pub fn metric(&self, flow_type: FlowType) -> f64 {
        match flow_type {
            FlowType::Total => self.total() as f64,
            FlowType::Cars => self.cars as f64,
            FlowType::Buses => self.buses as f64,
            FlowType::Trucks => self.trucks as f64,
            FlowType::Tractors => self.tractors as f64,
            FlowType::Motorcycles => self.motorcycles as f64,
            FlowType::Tricycles => self.tricycles as f64,
            FlowType::Bicycles => self.bicycles as f64,
            FlowType::Pedestrians => self.pedestrians as f64,
            FlowType::Motorized => {
                (self.cars + self.buses + self.trucks + self.tractors + self.motorcycles
                    + self.tricycles) as f64
            }
            FlowType::NonMotorized => (self.bicycles + self.pedestrians) as f64,
            FlowType::AverageSpeed => self.average_speed_kmh(),
            FlowType::HeadwayTime => self.headway_time_secs(),
            FlowType::HeadwaySpace => self.headway_space_m(),
            FlowType::Occupancy => self.occupancy_pct(),
            FlowType::TimeOccupancy => self.time_occupancy_pct(),
        }
    }
}

/// Metric or vehicle-class selection for chart queries.
///
/// Class variants chart the summed counter; the rate variants chart the
/// corresponding derived formula recomputed after re-aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Total,
    Cars,
    Buses,
    Trucks,
    Tractors,
    Motorcycles,
    Tricycles,
    Bicycles,
    Pedestrians,
    Motorized,
    NonMotorized,
    AverageSpeed,
    HeadwayTime,
    HeadwaySpace,
    Occupancy,
    TimeOccupancy,
}

/// One point of a chart series. `axis` is shifted onto the baseline
/// period's x-axis; `remark` keeps the true calendar label of the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub axis: NaiveDateTime,
    pub remark: String,
    pub value: f64,
}

/// One finest-resolution sensor reading for one lane (one-minute cadence).
///
/// `occupancy`/`time_occupancy` are the percentages observed during the
/// minute; `headway_time`/`travel_time` are seconds, `distance` meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSample {
    pub lane_id: String,
    pub timestamp: NaiveDateTime,
    pub cars: i64,
    pub buses: i64,
    pub trucks: i64,
    pub tractors: i64,
    pub motorcycles: i64,
    pub tricycles: i64,
    pub bicycles: i64,
    pub pedestrians: i64,
    pub occupancy: f64,
    pub time_occupancy: f64,
    pub headway_time: f64,
    pub travel_time: f64,
    pub distance: f64,
}

impl FlowSample {
    /// Parse a sample from a JSONL line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// The sample as a one-sample record anchored at `bucket_start`.
    pub fn to_record(&self, bucket_start: NaiveDateTime) -> FlowRecord {
        FlowRecord {
            lane_id: self.lane_id.clone(),
            bucket_start,
            cars: self.cars,
            buses: self.buses,
            trucks: self.trucks,
            tractors: self.tractors,
            motorcycles: self.motorcycles,
            tricycles: self.tricycles,
            bicycles: self.bicycles,
            pedestrians: self.pedestrians,
            occupancy: self.occupancy,
            time_occupancy: self.time_occupancy,
            headway_time_sum: self.headway_time,
            travel_time_sum: self.travel_time,
            distance_sum: self.distance,
            sample_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 4, 29)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn sample_record() -> FlowRecord {
        FlowRecord {
            lane_id: "lane-1".to_string(),
            bucket_start: ts(8, 0),
            cars: 10,
            buses: 2,
            trucks: 3,
            tractors: 0,
            motorcycles: 1,
            tricycles: 0,
            bicycles: 4,
            pedestrians: 5,
            occupancy: 120.0,
            time_occupancy: 90.0,
            headway_time_sum: 30.0,
            travel_time_sum: 180.0,
            distance_sum: 2500.0,
            sample_count: 5,
        }
    }

    #[test]
    fn test_total_sums_all_classes() {
        assert_eq!(sample_record().total(), 25);
    }

    #[test]
    fn test_average_speed_formula() {
        let record = sample_record();
        // 2500m over 180s -> 50 km/h
        assert!((record.average_speed_kmh() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_headway_space_formula() {
        let record = sample_record();
        // (30/5) * (2500/180) = 6 * 13.888.. = 83.33..m
        assert!((record.headway_space_m() - 83.333333).abs() < 1e-4);
    }

    #[test]
    fn test_zero_sample_count_guards() {
        let record = FlowRecord::empty("lane-1", ts(8, 0));
        assert_eq!(record.average_speed_kmh(), 0.0);
        assert_eq!(record.headway_time_secs(), 0.0);
        assert_eq!(record.headway_space_m(), 0.0);
        assert_eq!(record.occupancy_pct(), 0.0);
        assert_eq!(record.time_occupancy_pct(), 0.0);
    }

    #[test]
    fn test_zero_travel_time_guards() {
        let mut record = sample_record();
        record.travel_time_sum = 0.0;
        assert_eq!(record.average_speed_kmh(), 0.0);
        assert_eq!(record.headway_space_m(), 0.0);
    }

    #[test]
    fn test_merge_is_additive() {
        let mut left = sample_record();
        let right = sample_record();
        left.merge(&right);

        assert_eq!(left.cars, 20);
        assert_eq!(left.pedestrians, 10);
        assert_eq!(left.sample_count, 10);
        assert!((left.occupancy - 240.0).abs() < 1e-9);
        // averages are stable under self-merge
        assert!((left.average_speed_kmh() - 50.0).abs() < 1e-9);
        assert!((left.occupancy_pct() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_metric_selection() {
        let record = sample_record();
        assert_eq!(record.metric(FlowType::Total), 25.0);
        assert_eq!(record.metric(FlowType::Cars), 10.0);
        assert_eq!(record.metric(FlowType::Motorized), 16.0);
        assert_eq!(record.metric(FlowType::NonMotorized), 9.0);
        assert!((record.metric(FlowType::AverageSpeed) - 50.0).abs() < 1e-9);
        assert!((record.metric(FlowType::Occupancy) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_sample_jsonl() {
        let line = r#"{"lane_id":"L-004-2","timestamp":"2019-04-29T08:13:00","cars":12,"buses":1,"trucks":2,"tractors":0,"motorcycles":3,"tricycles":0,"bicycles":5,"pedestrians":2,"occupancy":23.5,"time_occupancy":18.0,"headway_time":4.2,"travel_time":51.0,"distance":640.0}"#;

        let sample = FlowSample::from_jsonl(line).unwrap();
        assert_eq!(sample.lane_id, "L-004-2");
        assert_eq!(sample.cars, 12);
        assert_eq!(sample.timestamp, ts(8, 13));

        let record = sample.to_record(ts(8, 10));
        assert_eq!(record.sample_count, 1);
        assert_eq!(record.total(), 25);
        assert_eq!(record.bucket_start, ts(8, 10));
    }

    #[test]
    fn test_malformed_jsonl() {
        assert!(FlowSample::from_jsonl(r#"{"lane_id": 12"#).is_err());
    }
}
