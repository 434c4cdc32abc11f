use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::pagination::PaginationConfig;
use crate::reader::Position;
use crate::text_metrics::normalize;
use crate::typing::TypingStats;

/// Key under which a chapter's progress is stored: a SHA-256 over the
/// normalized text and the limits it was paginated with, since chunk ids
/// only mean something for one segmentation. Texts that differ only in line
/// endings or blank-line runs map to the same id.
pub fn chapter_id(text: &str, config: &PaginationConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    hasher.update(
        format!(
            "\0{}/{}/{}",
            config.words_per_chunk, config.max_chunk_chars, config.chunks_per_page
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

/// One completed chunk, as handed to the progress store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub chapter_id: String,
    pub page_number: usize,
    pub chunk_id: u32,
    pub chunk_number: usize,
    pub total_chunks: usize,
    pub stats: TypingStats,
    pub recorded_at: DateTime<Local>,
}

impl ProgressRecord {
    pub fn position(&self) -> Position {
        Position {
            page_number: self.page_number,
            chunk_id: self.chunk_id,
        }
    }
}

/// Per-chapter figures over every recorded chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterSummary {
    pub chunks_typed: usize,
    pub distinct_chunks: usize,
    pub total_chunks: usize,
    pub avg_wpm: f64,
    pub avg_accuracy: f64,
    pub best_wpm: u32,
    pub total_secs: f64,
    pub last_recorded_at: Option<DateTime<Local>>,
}

impl ChapterSummary {
    /// Distinct chunks typed over chapter chunks.
    pub fn progress_percent(&self) -> u32 {
        if self.total_chunks == 0 {
            return 0;
        }
        let pct = (self.distinct_chunks as f64 / self.total_chunks as f64) * 100.0;
        pct.round().min(100.0) as u32
    }
}

/// Where chunk completions are persisted and read back.
pub trait ProgressStore {
    fn record(&mut self, record: &ProgressRecord) -> Result<()>;

    /// Records for a chapter, oldest first.
    fn chapter_records(&self, chapter_id: &str) -> Result<Vec<ProgressRecord>>;

    /// Position of the most recently completed chunk.
    fn last_position(&self, chapter_id: &str) -> Result<Option<Position>>;

    fn chapter_summary(&self, chapter_id: &str) -> Result<Option<ChapterSummary>>;

    /// Deletes a chapter's records, returning how many were removed.
    fn clear_chapter(&mut self, chapter_id: &str) -> Result<usize>;
}

/// SQLite backed progress store
#[derive(Debug)]
pub struct SqliteProgressStore {
    conn: Connection,
}

impl SqliteProgressStore {
    /// Opens (and creates if needed) the database under the state directory.
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("tovel_progress.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                chunk_id INTEGER NOT NULL,
                chunk_number INTEGER NOT NULL,
                total_chunks INTEGER NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                correct_chars INTEGER NOT NULL,
                incorrect_chars INTEGER NOT NULL,
                total_chars INTEGER NOT NULL,
                time_elapsed_secs REAL NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunk_progress_chapter ON chunk_progress(chapter_id)",
            [],
        )?;

        Ok(Self { conn })
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<ProgressRecord> {
        let recorded_at: String = row.get(11)?;
        let recorded_at = parse_timestamp(&recorded_at, 11)?;

        Ok(ProgressRecord {
            chapter_id: row.get(0)?,
            page_number: row.get(1)?,
            chunk_id: row.get(2)?,
            chunk_number: row.get(3)?,
            total_chunks: row.get(4)?,
            stats: TypingStats {
                wpm: row.get(5)?,
                accuracy: row.get(6)?,
                correct_chars: row.get(7)?,
                incorrect_chars: row.get(8)?,
                total_chars: row.get(9)?,
                time_elapsed_secs: row.get(10)?,
            },
            recorded_at,
        })
    }
}

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                column,
                "recorded_at".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

impl ProgressStore for SqliteProgressStore {
    fn record(&mut self, record: &ProgressRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO chunk_progress
            (chapter_id, page_number, chunk_id, chunk_number, total_chunks,
             wpm, accuracy, correct_chars, incorrect_chars, total_chars,
             time_elapsed_secs, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.chapter_id,
                record.page_number,
                record.chunk_id,
                record.chunk_number,
                record.total_chunks,
                record.stats.wpm,
                record.stats.accuracy,
                record.stats.correct_chars,
                record.stats.incorrect_chars,
                record.stats.total_chars,
                record.stats.time_elapsed_secs,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn chapter_records(&self, chapter_id: &str) -> Result<Vec<ProgressRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT chapter_id, page_number, chunk_id, chunk_number, total_chunks,
                   wpm, accuracy, correct_chars, incorrect_chars, total_chars,
                   time_elapsed_secs, recorded_at
            FROM chunk_progress
            WHERE chapter_id = ?1
            ORDER BY id ASC
            "#,
        )?;

        let records = stmt
            .query_map([chapter_id], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn last_position(&self, chapter_id: &str) -> Result<Option<Position>> {
        let position = self
            .conn
            .query_row(
                r#"
                SELECT page_number, chunk_id
                FROM chunk_progress
                WHERE chapter_id = ?1
                ORDER BY id DESC
                LIMIT 1
                "#,
                [chapter_id],
                |row| {
                    Ok(Position {
                        page_number: row.get(0)?,
                        chunk_id: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(position)
    }

    fn chapter_summary(&self, chapter_id: &str) -> Result<Option<ChapterSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                COUNT(*),
                COUNT(DISTINCT chunk_id),
                MAX(total_chunks),
                AVG(wpm),
                AVG(accuracy),
                MAX(wpm),
                SUM(time_elapsed_secs),
                (SELECT recorded_at FROM chunk_progress
                 WHERE chapter_id = ?1 ORDER BY id DESC LIMIT 1)
            FROM chunk_progress
            WHERE chapter_id = ?1
            "#,
        )?;

        let summary = stmt.query_row([chapter_id], |row| {
            let chunks_typed: usize = row.get(0)?;
            if chunks_typed == 0 {
                return Ok(None);
            }
            let last: Option<String> = row.get(7)?;
            let last_recorded_at = last
                .as_deref()
                .map(|raw| parse_timestamp(raw, 7))
                .transpose()?;

            Ok(Some(ChapterSummary {
                chunks_typed,
                distinct_chunks: row.get(1)?,
                total_chunks: row.get(2)?,
                avg_wpm: row.get(3)?,
                avg_accuracy: row.get(4)?,
                best_wpm: row.get(5)?,
                total_secs: row.get(6)?,
                last_recorded_at,
            }))
        })?;
        Ok(summary)
    }

    fn clear_chapter(&mut self, chapter_id: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM chunk_progress WHERE chapter_id = ?1", [chapter_id])?;
        Ok(removed)
    }
}
