// 💾 Output Sinks - Where generated tables land
// CSV directory (one file per table) or SQLite (content-addressed, with a write log)

use crate::table::Table;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub trait Sink {
    /// Persist named tables, returning how many were actually written
    fn write(&mut self, outputs: &[(String, Table)]) -> Result<usize>;
}

/// Generated names contain dates like 03/03/2024
pub fn file_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            other => other,
        })
        .collect()
}

// ============================================================================
// CSV DIRECTORY SINK
// ============================================================================

/// What to do when a file with the same name already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateHandling {
    /// Leave the existing file, skip this table
    Ignore,
    /// Write next to it as "name (n).csv"
    Number,
    /// Replace the existing file
    Overwrite,
}

impl FromStr for DuplicateHandling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(DuplicateHandling::Ignore),
            "number" => Ok(DuplicateHandling::Number),
            "overwrite" => Ok(DuplicateHandling::Overwrite),
            other => Err(format!("unknown duplicate handling '{other}'")),
        }
    }
}

pub struct CsvDirSink {
    dir: PathBuf,
    duplicates: DuplicateHandling,
}

impl CsvDirSink {
    pub fn new(dir: &Path, duplicates: DuplicateHandling) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        Ok(CsvDirSink {
            dir: dir.to_path_buf(),
            duplicates,
        })
    }

    fn target_path(&self, name: &str) -> Option<PathBuf> {
        let base = file_safe_name(name);
        let path = self.dir.join(format!("{}.csv", base));
        if !path.exists() {
            return Some(path);
        }

        match self.duplicates {
            DuplicateHandling::Ignore => None,
            DuplicateHandling::Overwrite => Some(path),
            DuplicateHandling::Number => (1..)
                .map(|n| self.dir.join(format!("{} ({}).csv", base, n)))
                .find(|p| !p.exists()),
        }
    }
}

impl Sink for CsvDirSink {
    fn write(&mut self, outputs: &[(String, Table)]) -> Result<usize> {
        let mut written = 0;

        for (name, table) in outputs {
            let Some(path) = self.target_path(name) else {
                tracing::info!(output = %name, "file exists, ignoring");
                continue;
            };

            let file = fs::File::create(&path)
                .with_context(|| format!("Failed to create file: {:?}", path))?;
            table
                .to_csv_writer(file)
                .with_context(|| format!("Failed to write CSV: {:?}", path))?;

            tracing::debug!(path = %path.display(), rows = table.len(), "wrote table");
            written += 1;
        }

        Ok(written)
    }
}

// ============================================================================
// SQLITE SINK
// ============================================================================

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteSink { conn })
    }

    /// Most recently stored table with this name
    pub fn load(&self, name: &str) -> Result<Option<Table>> {
        let csv_text: Option<String> = self
            .conn
            .query_row(
                "SELECT csv FROM outputs WHERE name = ?1 ORDER BY id DESC LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        csv_text
            .map(|text| Table::from_csv_reader(text.as_bytes()).context("Stored CSV is unreadable"))
            .transpose()
    }

    pub fn output_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM outputs", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn event_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS outputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_hash TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            row_count INTEGER NOT NULL,
            csv TEXT NOT NULL,
            write_id TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            event_id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_outputs_name ON outputs(name)", [])?;
    Ok(())
}

/// Hash of name and content, so re-running a pipeline never stores the same output twice
pub fn content_hash(name: &str, csv_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(csv_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Sink for SqliteSink {
    fn write(&mut self, outputs: &[(String, Table)]) -> Result<usize> {
        let write_id = uuid::Uuid::new_v4().to_string();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        let mut duplicates = 0;

        for (name, table) in outputs {
            let csv_text = table
                .to_csv_string()
                .with_context(|| format!("Failed to render {}", name))?;
            let hash = content_hash(name, &csv_text);

            let result = tx.execute(
                "INSERT INTO outputs (content_hash, name, row_count, csv, write_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![hash, name, table.len() as i64, csv_text, write_id],
            );

            match result {
                Ok(_) => {
                    inserted += 1;
                    let data = serde_json::json!({
                        "name": name,
                        "rows": table.len(),
                        "write_id": write_id,
                    });
                    tx.execute(
                        "INSERT INTO events (event_id, timestamp, event_type, entity_id, data)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            uuid::Uuid::new_v4().to_string(),
                            Utc::now().to_rfc3339(),
                            "output_written",
                            hash,
                            data.to_string(),
                        ],
                    )?;
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        tracing::info!(inserted, duplicates, write_id = %write_id, "stored outputs");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs() -> Vec<(String, Table)> {
        vec![(
            "Ficomm-Cont-03/03/2024-GF".to_string(),
            Table::new(["Organization Name", "Amount Allocated"]).with_row(["Chess Club", "200"]),
        )]
    }

    #[test]
    fn test_file_safe_name() {
        assert_eq!(file_safe_name("Ficomm-Cont-03/03/2024-GF"), "Ficomm-Cont-03-03-2024-GF");
    }

    #[test]
    fn test_csv_sink_numbers_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvDirSink::new(dir.path(), DuplicateHandling::Number).unwrap();

        assert_eq!(sink.write(&outputs()).unwrap(), 1);
        assert_eq!(sink.write(&outputs()).unwrap(), 1);
        assert_eq!(sink.write(&outputs()).unwrap(), 1);

        assert!(dir.path().join("Ficomm-Cont-03-03-2024-GF.csv").exists());
        assert!(dir.path().join("Ficomm-Cont-03-03-2024-GF (1).csv").exists());
        assert!(dir.path().join("Ficomm-Cont-03-03-2024-GF (2).csv").exists());
    }

    #[test]
    fn test_csv_sink_ignore_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut ignore = CsvDirSink::new(dir.path(), DuplicateHandling::Ignore).unwrap();
        assert_eq!(ignore.write(&outputs()).unwrap(), 1);
        assert_eq!(ignore.write(&outputs()).unwrap(), 0);

        let mut overwrite = CsvDirSink::new(dir.path(), DuplicateHandling::Overwrite).unwrap();
        let replacement = vec![(
            "Ficomm-Cont-03/03/2024-GF".to_string(),
            Table::new(["x"]).with_row(["1"]),
        )];
        assert_eq!(overwrite.write(&replacement).unwrap(), 1);

        let text = fs::read_to_string(dir.path().join("Ficomm-Cont-03-03-2024-GF.csv")).unwrap();
        assert_eq!(text, "x\n1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_sqlite_sink_skips_identical_outputs() {
        let mut sink = SqliteSink::in_memory().unwrap();

        assert_eq!(sink.write(&outputs()).unwrap(), 1);
        assert_eq!(sink.write(&outputs()).unwrap(), 0);
        assert_eq!(sink.output_count().unwrap(), 1);
        assert_eq!(sink.event_count().unwrap(), 1);

        let stored = sink.load("Ficomm-Cont-03/03/2024-GF").unwrap().unwrap();
        assert_eq!(stored, outputs()[0].1);
        assert!(sink.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_sink_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.db");
        {
            let mut sink = SqliteSink::open(&path).unwrap();
            sink.write(&outputs()).unwrap();
        }
        let sink = SqliteSink::open(&path).unwrap();
        assert_eq!(sink.output_count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_handling_parse() {
        assert_eq!("Number".parse::<DuplicateHandling>(), Ok(DuplicateHandling::Number));
        assert!("rename".parse::<DuplicateHandling>().is_err());
    }
}
