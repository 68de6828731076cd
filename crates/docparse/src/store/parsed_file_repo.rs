//! CRUD operations for the `parsed_files` table.
//!
//! This table deliberately holds only file-level metadata. Extracted text
//! belongs in `ocr_results`, tabular data in `table_extractions`.

use rusqlite::{params, Row};

use super::{Database, StoreError};

/// Lifecycle status of a parsed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(FileStatus::Uploaded),
            "processing" => Some(FileStatus::Processing),
            "completed" => Some(FileStatus::Completed),
            "failed" => Some(FileStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw parsed file row from the database.
#[derive(Debug, Clone)]
pub struct ParsedFileRow {
    pub id: String,
    pub original_name: String,
    pub stored_path: String,
    pub file_type: String,
    pub declared_mime: Option<String>,
    pub size_bytes: i64,
    pub status: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ParsedFileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_name: row.get("original_name")?,
            stored_path: row.get("stored_path")?,
            file_type: row.get("file_type")?,
            declared_mime: row.get("declared_mime")?,
            size_bytes: row.get("size_bytes")?,
            status: row.get("status")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new parsed file row.
pub fn insert(db: &Database, file: &ParsedFileRow) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO parsed_files (id, original_name, stored_path, file_type, declared_mime,
             size_bytes, status, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                file.id,
                file.original_name,
                file.stored_path,
                file.file_type,
                file.declared_mime,
                file.size_bytes,
                file.status,
                file.error,
                file.created_at,
                file.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a parsed file by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ParsedFileRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM parsed_files WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ParsedFileRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists parsed files, newest first, optionally filtered by status.
pub fn list(db: &Database, status: Option<FileStatus>) -> Result<Vec<ParsedFileRow>, StoreError> {
    db.with_conn(|conn| {
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM parsed_files WHERE status = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map(params![status.as_str()], ParsedFileRow::from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM parsed_files ORDER BY created_at DESC")?;
                let rows = stmt.query_map([], ParsedFileRow::from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    })
}

/// Updates status, error text, and updated_at of a file.
pub fn update_status(
    db: &Database,
    id: &str,
    status: FileStatus,
    error: Option<&str>,
    updated_at: &str,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE parsed_files SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, status.as_str(), error, updated_at],
        )?;
        Ok(())
    })
}

/// Deletes a parsed file row. Child rows in ocr_results, file_metadata
/// and table_extractions cascade.
pub fn delete(db: &Database, id: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM parsed_files WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Counts files with the given status.
pub fn count_by_status(db: &Database, status: FileStatus) -> Result<u64, StoreError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM parsed_files WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
