//! SQLite access.
//!
//! Two tables: `stations` (seeded by the corpus import, read at startup)
//! and `station_ranks` (the only runtime-writable state). Dwell seconds are
//! additionally cached in-process; the upsert path persists first, then
//! refreshes the cache.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{FromRow, SqlitePool};
use tokio::sync::RwLock;

use crate::corpus::StationRecord;

/// In-process cache of `station_id -> dwell seconds`.
pub type DwellCache = Arc<RwLock<HashMap<String, i64>>>;

/// Station importance rank; decides the default dwell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationRank {
    /// Major terminal.
    S,
    /// Principal station.
    A,
    /// Ordinary station.
    B,
}

impl StationRank {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "S" => Some(StationRank::S),
            "A" => Some(StationRank::A),
            "B" => Some(StationRank::B),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StationRank::S => "S",
            StationRank::A => "A",
            StationRank::B => "B",
        }
    }

    /// Default dwell seconds for the rank.
    pub fn default_dwell_seconds(&self) -> i64 {
        match self {
            StationRank::S => 50,
            StationRank::A => 35,
            StationRank::B => 20,
        }
    }
}

#[derive(Debug, FromRow)]
struct StationRow {
    id: String,
    line_id: String,
    name_ja: Option<String>,
    name_en: Option<String>,
    lon: Option<f64>,
    lat: Option<f64>,
}

/// All stations in persisted order.
pub async fn load_stations(pool: &SqlitePool) -> sqlx::Result<Vec<StationRecord>> {
    let rows: Vec<StationRow> =
        sqlx::query_as("SELECT id, line_id, name_ja, name_en, lon, lat FROM stations ORDER BY rowid")
            .fetch_all(pool)
            .await?;
    Ok(rows
        .into_iter()
        .map(|r| StationRecord {
            id: r.id,
            line_id: r.line_id,
            name_ja: r.name_ja,
            name_en: r.name_en,
            lon: r.lon,
            lat: r.lat,
        })
        .collect())
}

#[derive(Debug, FromRow)]
pub struct RankRow {
    pub station_id: String,
    pub rank: String,
    pub dwell_seconds: i64,
}

/// All dwell rank rows.
pub async fn load_ranks(pool: &SqlitePool) -> sqlx::Result<Vec<RankRow>> {
    sqlx::query_as("SELECT station_id, rank, dwell_seconds FROM station_ranks")
        .fetch_all(pool)
        .await
}

/// Build the dwell cache content from the store.
pub async fn load_dwell_map(pool: &SqlitePool) -> sqlx::Result<HashMap<String, i64>> {
    Ok(load_ranks(pool)
        .await?
        .into_iter()
        .map(|r| (r.station_id, r.dwell_seconds))
        .collect())
}

pub async fn count_stations(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stations")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Seed the stations table from raw corpus rows. Existing ids are left
/// untouched.
pub async fn seed_stations(
    pool: &SqlitePool,
    rows: &[crate::corpus::model::RawStationRow],
) -> sqlx::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;
    for row in rows {
        if row.id.is_empty() {
            continue;
        }
        let (lon, lat) = match row.coord.as_slice() {
            [lon, lat, ..] => (Some(*lon), Some(*lat)),
            _ => (None, None),
        };
        let result = sqlx::query(
            "INSERT OR IGNORE INTO stations (id, line_id, name_ja, name_en, lon, lat)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.railway)
        .bind(&row.title.ja)
        .bind(&row.title.en)
        .bind(lon)
        .bind(lat)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    tx.commit().await?;
    Ok(inserted)
}

pub async fn station_exists(pool: &SqlitePool, station_id: &str) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM stations WHERE id = ?")
        .bind(station_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Persist a dwell rank, then refresh the in-process cache.
///
/// Readers may observe the previous value for the brief window between the
/// commit and the cache write; nothing stronger is required.
pub async fn upsert_station_rank(
    pool: &SqlitePool,
    dwell_cache: &DwellCache,
    station_id: &str,
    rank: StationRank,
    dwell_seconds: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO station_ranks (station_id, rank, dwell_seconds) VALUES (?, ?, ?)
         ON CONFLICT(station_id) DO UPDATE SET rank = excluded.rank,
                                               dwell_seconds = excluded.dwell_seconds",
    )
    .bind(station_id)
    .bind(rank.as_str())
    .bind(dwell_seconds)
    .execute(pool)
    .await?;

    dwell_cache
        .write()
        .await
        .insert(station_id.to_string(), dwell_seconds);
    Ok(())
}
