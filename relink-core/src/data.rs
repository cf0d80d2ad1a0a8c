use crate::error::Result;
use crate::model::{CanonicalEntry, Verdict};
use crate::reconcile::ReconcileStats;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Local SQLite store of reconciled catalog snapshots.
pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub created_at: String,
    pub tool_count: i64,
    pub stats: Option<ReconcileStats>,
}

impl Database {
    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    tool_count INTEGER NOT NULL,
    stats TEXT                -- JSON reconcile stats
);

CREATE TABLE IF NOT EXISTS tools (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id TEXT NOT NULL,
    slug TEXT NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    tags TEXT NOT NULL,
    description TEXT NOT NULL,
    website_url TEXT NOT NULL,
    domain TEXT NOT NULL,
    quality_status TEXT NOT NULL CHECK(quality_status IN ('verified', 'recovered', 'scraped_verified')),
    recovered_confidence REAL,

    FOREIGN KEY(snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE,
    UNIQUE(snapshot_id, slug)
);

CREATE INDEX IF NOT EXISTS idx_tools_snapshot ON tools(snapshot_id);
CREATE INDEX IF NOT EXISTS idx_tools_domain ON tools(snapshot_id, domain);
            ",
        )?;
        Ok(())
    }

    /// Store one reconciled catalog as a new snapshot and return its id.
    pub fn record_snapshot(
        &mut self,
        catalog: &[CanonicalEntry],
        stats: &ReconcileStats,
    ) -> Result<String> {
        let snapshot_id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();
        let stats_json = serde_json::to_string(stats)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshots (id, created_at, tool_count, stats) VALUES (?1, ?2, ?3, ?4)",
            params![&snapshot_id, &created_at, catalog.len() as i64, &stats_json],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tools (
                    snapshot_id, slug, name, category, tags, description,
                    website_url, domain, quality_status, recovered_confidence
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for entry in catalog {
                stmt.execute(params![
                    &snapshot_id,
                    &entry.slug,
                    &entry.name,
                    &entry.category,
                    &entry.tags,
                    &entry.description,
                    &entry.url,
                    &entry.domain,
                    entry.verdict.as_str(),
                    entry.recovered_confidence,
                ])?;
            }
        }
        tx.commit()?;

        info!("Recorded snapshot {} with {} tools", snapshot_id, catalog.len());
        Ok(snapshot_id)
    }

    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, tool_count, stats FROM snapshots ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, created_at, tool_count, stats)| -> Result<SnapshotInfo> {
                Ok(SnapshotInfo {
                    id,
                    created_at,
                    tool_count,
                    stats: stats.map(|s| serde_json::from_str(&s)).transpose()?,
                })
            })
            .collect()
    }

    pub fn latest_snapshot(&self) -> Result<Option<SnapshotInfo>> {
        Ok(self.list_snapshots()?.into_iter().next())
    }

    pub fn snapshot_exists(&self, snapshot_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM snapshots WHERE id = ?1",
                params![snapshot_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Catalog rows of one snapshot, sorted by name.
    pub fn load_snapshot(&self, snapshot_id: &str) -> Result<Vec<CanonicalEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT slug, name, category, tags, description, website_url, domain,
                    quality_status, recovered_confidence
             FROM tools WHERE snapshot_id = ?1 ORDER BY name",
        )?;
        let entries = stmt
            .query_map(params![snapshot_id], |row| {
                let status: String = row.get(7)?;
                let verdict = Verdict::from_str(&status).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        7,
                        Type::Text,
                        format!("unknown quality status '{}'", status).into(),
                    )
                })?;
                Ok(CanonicalEntry {
                    slug: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    tags: row.get(3)?,
                    description: row.get(4)?,
                    url: row.get(5)?,
                    domain: row.get(6)?,
                    verdict,
                    recovered_confidence: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn verdict_counts(&self, snapshot_id: &str) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT quality_status, COUNT(*) FROM tools WHERE snapshot_id = ?1
             GROUP BY quality_status ORDER BY quality_status",
        )?;
        let counts = stmt
            .query_map(params![snapshot_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}
