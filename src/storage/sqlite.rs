//! Sqlite-backed bucket store with calendar-partitioned tables.
//!
//! Partition tables are created lazily on first write; the partition a
//! record belongs to is derived from its `bucket_start`. Reads against a
//! partition that was never created fail with a "no such table" database
//! error, which callers treat as an empty contribution.

use crate::bucket::Granularity;
use crate::flow::FlowRecord;
use crate::ingest::BucketSink;
use crate::sqlite_pragma::apply_optimized_pragmas;
use crate::storage::{partition_keys, table_name, FlowStore, StoreError};
use chrono::{DateTime, NaiveDateTime};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

const RECORD_COLUMNS: &str = "lane_id, bucket_start, cars, buses, trucks, tractors, \
     motorcycles, tricycles, bicycles, pedestrians, occupancy, time_occupancy, \
     headway_time_sum, travel_time_sum, distance_sum, sample_count";

pub struct SqliteFlowStore {
    conn: Mutex<Connection>,
    created_tables: Mutex<HashSet<String>>,
}

impl SqliteFlowStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            created_tables: Mutex::new(HashSet::new()),
        })
    }

    fn ensure_table(&self, conn: &Connection, table: &str) -> Result<(), StoreError> {
        {
            let created = self.created_tables.lock().unwrap();
            if created.contains(table) {
                return Ok(());
            }
        }
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    lane_id TEXT NOT NULL,
                    bucket_start INTEGER NOT NULL,
                    cars INTEGER NOT NULL,
                    buses INTEGER NOT NULL,
                    trucks INTEGER NOT NULL,
                    tractors INTEGER NOT NULL,
                    motorcycles INTEGER NOT NULL,
                    tricycles INTEGER NOT NULL,
                    bicycles INTEGER NOT NULL,
                    pedestrians INTEGER NOT NULL,
                    occupancy REAL NOT NULL,
                    time_occupancy REAL NOT NULL,
                    headway_time_sum REAL NOT NULL,
                    travel_time_sum REAL NOT NULL,
                    distance_sum REAL NOT NULL,
                    sample_count INTEGER NOT NULL,
                    PRIMARY KEY (lane_id, bucket_start)
                )",
                table
            ),
            [],
        )?;
        self.created_tables.lock().unwrap().insert(table.to_string());
        Ok(())
    }
}

fn secs(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp()
}

fn from_secs(secs: i64) -> Result<NaiveDateTime, rusqlite::Error> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or(rusqlite::Error::InvalidQuery)
}

fn record_from_row(row: &rusqlite::Row<'_>) -> Result<FlowRecord, rusqlite::Error> {
    Ok(FlowRecord {
        lane_id: row.get(0)?,
        bucket_start: from_secs(row.get(1)?)?,
        cars: row.get(2)?,
        buses: row.get(3)?,
        trucks: row.get(4)?,
        tractors: row.get(5)?,
        motorcycles: row.get(6)?,
        tricycles: row.get(7)?,
        bicycles: row.get(8)?,
        pedestrians: row.get(9)?,
        occupancy: row.get(10)?,
        time_occupancy: row.get(11)?,
        headway_time_sum: row.get(12)?,
        travel_time_sum: row.get(13)?,
        distance_sum: row.get(14)?,
        sample_count: row.get(15)?,
    })
}

impl FlowStore for SqliteFlowStore {
    fn query_partition(
        &self,
        level: Granularity,
        partition: &str,
        lane_ids: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FlowRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let table = table_name(level, partition);

        let mut sql = format!(
            "SELECT {} FROM {} WHERE bucket_start >= ? AND bucket_start <= ?",
            RECORD_COLUMNS, table
        );
        if !lane_ids.is_empty() {
            let placeholders = vec!["?"; lane_ids.len()].join(",");
            sql.push_str(&format!(" AND lane_id IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY bucket_start ASC, lane_id ASC");

        let mut params: Vec<rusqlite::types::Value> =
            vec![secs(start).into(), secs(end).into()];
        params.extend(
            lane_ids
                .iter()
                .map(|lane| rusqlite::types::Value::from(lane.clone())),
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn write(&self, level: Granularity, record: &FlowRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let keys = partition_keys(level, record.bucket_start, record.bucket_start);
        let partition = match keys.first() {
            Some(key) => key.clone(),
            None => return Ok(()),
        };
        let table = table_name(level, &partition);
        self.ensure_table(&conn, &table)?;

        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                table, RECORD_COLUMNS
            ),
            rusqlite::params![
                record.lane_id,
                secs(record.bucket_start),
                record.cars,
                record.buses,
                record.trucks,
                record.tractors,
                record.motorcycles,
                record.tricycles,
                record.bicycles,
                record.pedestrians,
                record.occupancy,
                record.time_occupancy,
                record.headway_time_sum,
                record.travel_time_sum,
                record.distance_sum,
                record.sample_count,
            ],
        )?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BucketSink for SqliteFlowStore {
    async fn write_bucket(
        &self,
        level: Granularity,
        record: FlowRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(level, &record)?;
        Ok(())
    }
}
