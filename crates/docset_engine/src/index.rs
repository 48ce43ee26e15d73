use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docset_core::DocEntry;
use engine_logging::engine_info;
use rusqlite::Connection;

pub const INDEX_FILENAME: &str = "docSet.dsidx";

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("cannot replace existing index {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// The single-table search index read by docset browsers.
pub struct SearchIndex {
    conn: Connection,
}

impl SearchIndex {
    /// Creates a fresh index at `path`, replacing any previous one.
    pub fn create(path: &Path) -> Result<Self, IndexError> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(IndexError::Replace {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, IndexError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, IndexError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS searchIndex(
                id INTEGER PRIMARY KEY,
                name TEXT,
                type TEXT,
                path TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS anchor ON searchIndex (name, type, path);",
        )?;
        Ok(Self { conn })
    }

    /// Inserts all entries in one transaction. Duplicates are ignored;
    /// returns how many rows were actually added.
    pub fn store(&mut self, entries: &[DocEntry]) -> Result<usize, IndexError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO searchIndex (name, type, path) VALUES (?1, ?2, ?3)",
            )?;
            for entry in entries {
                inserted += stmt.execute(rusqlite::params![
                    entry.name,
                    entry.entry_type.as_str(),
                    entry.path
                ])?;
            }
        }
        tx.commit()?;
        engine_info!(
            "Indexed {} entries ({} duplicates ignored)",
            inserted,
            entries.len() - inserted
        );
        Ok(inserted)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM searchIndex", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// `(name, type, path)` rows ordered by insertion.
    pub fn rows(&self) -> Result<Vec<(String, String, String)>, IndexError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, path FROM searchIndex ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
