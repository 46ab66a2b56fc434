use super::models::*;
use super::sqlite::{quote_table, Database};
use crate::engine::ResultSet;
use crate::error::Error;
use crate::model::MediaRecord;
use rusqlite::{params, OptionalExtension, Result};
use tracing::{debug, info};

/// `<source>_deduped_phash` or `<source>_deduped_dhash_phash`.
pub fn default_output_table(source: &str, result: &ResultSet) -> String {
    format!("{}_deduped_{}", source, result.label())
}

impl Database {
    // ── Media tables ─────────────────────────────────────────────

    /// Create an empty table with the scanner's media layout.
    pub fn create_media_table(&self, table: &str) -> std::result::Result<(), Error> {
        let quoted = quote_table(table)?;
        self.connection().execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (
                file_path      TEXT PRIMARY KEY,
                file_name      TEXT NOT NULL,
                file_directory TEXT NOT NULL,
                file_type      TEXT NOT NULL DEFAULT 'image',
                file_size      INTEGER NOT NULL DEFAULT 0,
                blake3         TEXT,
                ahash          TEXT,
                dhash          TEXT,
                phash          TEXT,
                whash          TEXT,
                chash          TEXT,
                date           TEXT
            );"
        ))?;
        debug!("Media table {} ready", table);
        Ok(())
    }

    pub fn insert_media_rows(
        &self,
        table: &str,
        rows: &[MediaRow],
    ) -> std::result::Result<usize, Error> {
        let quoted = quote_table(table)?;
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {quoted} \
                 (file_path, file_name, file_directory, file_type, file_size, \
                  blake3, ahash, dhash, phash, whash, chash, date) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;
            for row in rows {
                count += stmt.execute(params![
                    row.file_path,
                    row.file_name,
                    row.file_directory,
                    row.file_type,
                    row.file_size,
                    row.blake3,
                    row.ahash,
                    row.dhash,
                    row.phash,
                    row.whash,
                    row.chash,
                    row.date,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} media rows into {}", count, table);
        Ok(count)
    }

    pub fn load_media_rows(&self, table: &str) -> std::result::Result<Vec<MediaRow>, Error> {
        let quoted = quote_table(table)?;
        let mut stmt = self.connection().prepare(&format!(
            "SELECT file_path, file_name, file_directory, file_type, file_size, \
                    blake3, ahash, dhash, phash, whash, chash, CAST(date AS TEXT) \
             FROM {quoted} ORDER BY file_path"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MediaRow {
                    file_path: row.get(0)?,
                    file_name: row.get(1)?,
                    file_directory: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    file_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    file_size: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                    blake3: row.get(5)?,
                    ahash: row.get(6)?,
                    dhash: row.get(7)?,
                    phash: row.get(8)?,
                    whash: row.get(9)?,
                    chash: row.get(10)?,
                    date: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Read a scanner media table as engine input.
    pub fn load_media_records(
        &self,
        table: &str,
    ) -> std::result::Result<Vec<MediaRecord>, Error> {
        let rows = self.load_media_rows(table)?;
        info!("Loaded {} rows from {}", rows.len(), table);
        Ok(rows.iter().map(MediaRow::to_record).collect())
    }

    // ── Output tables ────────────────────────────────────────────

    /// Recreate `target` with the columns of `source` plus the grouping columns,
    /// then copy every grouped row across in one transaction.
    pub fn write_result_set(
        &self,
        source: &str,
        target: &str,
        result: &ResultSet,
    ) -> std::result::Result<usize, Error> {
        let source_q = quote_table(source)?;
        let target_q = quote_table(target)?;

        self.connection().execute_batch(&format!(
            "DROP TABLE IF EXISTS {target_q};
             CREATE TABLE {target_q} AS SELECT * FROM {source_q} WHERE 0;
             ALTER TABLE {target_q} ADD COLUMN group_id INTEGER;
             ALTER TABLE {target_q} ADD COLUMN is_representative INTEGER NOT NULL DEFAULT 0;
             ALTER TABLE {target_q} ADD COLUMN dedupe_method TEXT;
             ALTER TABLE {target_q} ADD COLUMN dedupe_phase1 TEXT;
             ALTER TABLE {target_q} ADD COLUMN dedupe_phase2 TEXT;"
        ))?;

        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {target_q} \
                 SELECT s.*, ?2, ?3, ?4, ?5, ?6 FROM {source_q} AS s WHERE s.file_path = ?1"
            ))?;
            let two_phase = result.plan.phases().len() > 1;
            for group in &result.groups {
                let method = group.method.label();
                let (phase1, phase2) = if two_phase {
                    (group.method.phase_label(0), group.method.phase_label(1))
                } else {
                    (None, None)
                };
                for id in &group.member_ids {
                    count += stmt.execute(params![
                        id,
                        group.group_id.as_i64(),
                        *id == group.representative_id,
                        method,
                        phase1,
                        phase2,
                    ])?;
                }
            }
        }
        tx.commit()?;

        self.connection().execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{target}_is_representative\" ON {target_q}(is_representative);
             CREATE INDEX IF NOT EXISTS \"idx_{target}_file_directory\" ON {target_q}(file_directory);
             CREATE INDEX IF NOT EXISTS \"idx_{target}_group_id\" ON {target_q}(group_id);"
        ))?;

        info!(
            "Inserted {} rows into {} ({} representatives)",
            count,
            target,
            result.groups.len()
        );
        Ok(count)
    }

    /// Files and representatives per directory of an output table.
    pub fn directory_summary(
        &self,
        target: &str,
    ) -> std::result::Result<Vec<DirectorySummary>, Error> {
        let target_q = quote_table(target)?;
        let mut stmt = self.connection().prepare(&format!(
            "SELECT file_directory, COUNT(*), SUM(CASE WHEN is_representative = 1 THEN 1 ELSE 0 END) \
             FROM {target_q} GROUP BY file_directory ORDER BY file_directory"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DirectorySummary {
                    directory: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    total_files: row.get(1)?,
                    representatives: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Run log ──────────────────────────────────────────────────

    pub fn start_run(&self, source: &str, target: &str, plan: &str) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO dedupe_run (started_at, status, source_table, target_table, plan) \
             VALUES (?1, 'running', ?2, ?3, ?4)",
            params![now, source, target, plan],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn complete_run(&self, run_id: i64, result: &ResultSet, cancelled: bool) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let status = if cancelled { "cancelled" } else { "completed" };
        self.connection().execute(
            "UPDATE dedupe_run SET completed_at = ?1, status = ?2, records = ?3, \
             group_count = ?4, duplicate_count = ?5 WHERE id = ?6",
            params![
                now,
                status,
                result.stats.records as i64,
                result.stats.groups as i64,
                result.stats.duplicate_groups as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<DedupeRun>> {
        self.connection()
            .query_row(
                "SELECT id, started_at, completed_at, status, source_table, target_table, \
                        plan, records, group_count, duplicate_count \
                 FROM dedupe_run WHERE id = ?1",
                params![run_id],
                map_run,
            )
            .optional()
    }

    /// Most recent runs first.
    pub fn list_runs(&self, limit: i64) -> Result<Vec<DedupeRun>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT id, started_at, completed_at, status, source_table, target_table, \
                    plan, records, group_count, duplicate_count \
             FROM dedupe_run ORDER BY id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit], map_run)?
            .collect::<Result<Vec<_>>>()?;
        Ok(runs)
    }
}

fn map_run(row: &rusqlite::Row<'_>) -> Result<DedupeRun> {
    Ok(DedupeRun {
        id: row.get(0)?,
        started_at: row.get(1)?,
        completed_at: row.get(2)?,
        status: row.get(3)?,
        source_table: row.get(4)?,
        target_table: row.get(5)?,
        plan: row.get(6)?,
        records: row.get(7)?,
        group_count: row.get(8)?,
        duplicate_count: row.get(9)?,
    })
}
