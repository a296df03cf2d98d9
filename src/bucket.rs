//! Calendar bucket arithmetic for the six query granularities.
//!
//! Pure functions only: align a timestamp to its bucket start, advance to the
//! next bucket, and render the display label. Sub-day levels floor on fixed
//! widths; day and month floor on calendar boundaries.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Bucket width of a stored or queried series.
///
/// Ordering follows coarseness: `Minute < FiveMinutes < ... < Month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    Minute,
    FiveMinutes,
    QuarterHour,
    Hour,
    Day,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Minute => "1min",
            Granularity::FiveMinutes => "5min",
            Granularity::QuarterHour => "15min",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1min" => Some(Granularity::Minute),
            "5min" => Some(Granularity::FiveMinutes),
            "15min" => Some(Granularity::QuarterHour),
            "hour" => Some(Granularity::Hour),
            "day" => Some(Granularity::Day),
            "month" => Some(Granularity::Month),
            _ => None,
        }
    }

    pub fn all() -> [Granularity; 6] {
        [
            Granularity::Minute,
            Granularity::FiveMinutes,
            Granularity::QuarterHour,
            Granularity::Hour,
            Granularity::Day,
            Granularity::Month,
        ]
    }

    /// Levels that have their own windower and storage table. Month is a
    /// query-time rollup of the day table.
    pub fn stored() -> [Granularity; 5] {
        [
            Granularity::Minute,
            Granularity::FiveMinutes,
            Granularity::QuarterHour,
            Granularity::Hour,
            Granularity::Day,
        ]
    }

    /// The stored level a query at this level reads from.
    pub fn source_level(&self) -> Granularity {
        match self {
            Granularity::Month => Granularity::Day,
            other => *other,
        }
    }

    pub fn is_sub_day(&self) -> bool {
        matches!(
            self,
            Granularity::Minute
                | Granularity::FiveMinutes
                | Granularity::QuarterHour
                | Granularity::Hour
        )
    }

    /// Fixed width in seconds. Months vary; they advance via calendar
    /// arithmetic in [`Granularity::next`] and never consult this.
    fn width_secs(&self) -> i64 {
        match self {
            Granularity::Minute => 60,
            Granularity::FiveMinutes => 5 * 60,
            Granularity::QuarterHour => 15 * 60,
            Granularity::Hour => 60 * 60,
            Granularity::Day => 24 * 60 * 60,
            Granularity::Month => 0,
        }
    }

    /// Bucket start containing `t`. Idempotent: `align(align(t)) == align(t)`.
    pub fn align(&self, t: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Minute
            | Granularity::FiveMinutes
            | Granularity::QuarterHour
            | Granularity::Hour => {
                let secs = t.and_utc().timestamp();
                let floored = secs - secs.rem_euclid(self.width_secs());
                DateTime::from_timestamp(floored, 0)
                    .map(|dt| dt.naive_utc())
                    .unwrap_or(t)
            }
            Granularity::Day => t.date().and_time(NaiveTime::MIN),
            Granularity::Month => t
                .date()
                .with_day(1)
                .map(|d| d.and_time(NaiveTime::MIN))
                .unwrap_or_else(|| t.date().and_time(NaiveTime::MIN)),
        }
    }

    /// Start of the bucket after the one containing `t`.
    pub fn next(&self, t: NaiveDateTime) -> NaiveDateTime {
        let start = self.align(t);
        match self {
            Granularity::Month => start
                .checked_add_months(Months::new(1))
                .unwrap_or(start),
            other => start + Duration::seconds(other.width_secs()),
        }
    }

    /// Calendar label for a bucket start at this level.
    pub fn format(&self, t: NaiveDateTime) -> String {
        match self {
            Granularity::Minute | Granularity::FiveMinutes | Granularity::QuarterHour => {
                t.format("%Y-%m-%d %H:%M").to_string()
            }
            Granularity::Hour => t.format("%Y-%m-%d %H").to_string(),
            Granularity::Day => t.format("%Y-%m-%d").to_string(),
            Granularity::Month => t.format("%Y-%m").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_align_sub_day_levels() {
        let t = ts(2019, 4, 29, 13, 37, 42);

        assert_eq!(Granularity::Minute.align(t), ts(2019, 4, 29, 13, 37, 0));
        assert_eq!(Granularity::FiveMinutes.align(t), ts(2019, 4, 29, 13, 35, 0));
        assert_eq!(Granularity::QuarterHour.align(t), ts(2019, 4, 29, 13, 30, 0));
        assert_eq!(Granularity::Hour.align(t), ts(2019, 4, 29, 13, 0, 0));
    }

    #[test]
    fn test_align_calendar_levels() {
        let t = ts(2019, 4, 29, 13, 37, 42);

        assert_eq!(Granularity::Day.align(t), ts(2019, 4, 29, 0, 0, 0));
        assert_eq!(Granularity::Month.align(t), ts(2019, 4, 1, 0, 0, 0));
    }

    #[test]
    fn test_align_idempotent() {
        let t = ts(2021, 12, 31, 23, 59, 59);
        for level in Granularity::all() {
            let once = level.align(t);
            assert_eq!(level.align(once), once, "level {:?}", level);
        }
    }

    #[test]
    fn test_next_advances_one_unit() {
        let t = ts(2019, 4, 29, 13, 37, 0);

        assert_eq!(Granularity::FiveMinutes.next(t), ts(2019, 4, 29, 13, 40, 0));
        assert_eq!(Granularity::Hour.next(t), ts(2019, 4, 29, 14, 0, 0));
        assert_eq!(Granularity::Day.next(t), ts(2019, 4, 30, 0, 0, 0));
        assert_eq!(Granularity::Month.next(t), ts(2019, 5, 1, 0, 0, 0));
    }

    #[test]
    fn test_next_crosses_year_boundary() {
        let t = ts(2019, 12, 15, 8, 0, 0);
        assert_eq!(Granularity::Month.next(t), ts(2020, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_format_labels() {
        let t = ts(2019, 4, 29, 13, 35, 0);

        assert_eq!(Granularity::FiveMinutes.format(t), "2019-04-29 13:35");
        assert_eq!(Granularity::Hour.format(t), "2019-04-29 13");
        assert_eq!(Granularity::Day.format(t), "2019-04-29");
        assert_eq!(Granularity::Month.format(t), "2019-04");
    }

    #[test]
    fn test_str_roundtrip() {
        for level in Granularity::all() {
            assert_eq!(Granularity::from_str(level.as_str()), Some(level));
        }
        assert_eq!(Granularity::from_str("weekly"), None);
    }

    #[test]
    fn test_source_level() {
        assert_eq!(Granularity::Month.source_level(), Granularity::Day);
        assert_eq!(Granularity::Hour.source_level(), Granularity::Hour);
    }
}
