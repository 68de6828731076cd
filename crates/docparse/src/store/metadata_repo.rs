//! Aggregate stats for a processing run.

use rusqlite::{params, Row};

use super::{Database, StoreError};

/// A raw file metadata row from the database.
#[derive(Debug, Clone)]
pub struct FileMetadataRow {
    pub file_id: String,
    pub char_count: i64,
    pub word_count: i64,
    pub page_count: i64,
    pub duration_ms: i64,
    pub created_at: String,
}

impl FileMetadataRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            file_id: row.get("file_id")?,
            char_count: row.get("char_count")?,
            word_count: row.get("word_count")?,
            page_count: row.get("page_count")?,
            duration_ms: row.get("duration_ms")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts or replaces the metadata row for a file. A retry overwrites
/// the previous run's stats.
pub fn upsert(db: &Database, metadata: &FileMetadataRow) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO file_metadata (file_id, char_count, word_count,
             page_count, duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metadata.file_id,
                metadata.char_count,
                metadata.word_count,
                metadata.page_count,
                metadata.duration_ms,
                metadata.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds the metadata row for a file.
pub fn find_by_file(db: &Database, file_id: &str) -> Result<Option<FileMetadataRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM file_metadata WHERE file_id = ?1")?;
        let mut rows = stmt.query_map(params![file_id], FileMetadataRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::parsed_file_repo;

    fn test_db_with_file(id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        parsed_file_repo::insert(&db, &parsed_file_repo::tests::sample_file(id)).unwrap();
        db
    }

    fn sample_metadata(file_id: &str) -> FileMetadataRow {
        FileMetadataRow {
            file_id: file_id.to_string(),
            char_count: 1234,
            word_count: 210,
            page_count: 2,
            duration_ms: 870,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let db = test_db_with_file("f1");
        upsert(&db, &sample_metadata("f1")).unwrap();

        let found = find_by_file(&db, "f1").unwrap().unwrap();
        assert_eq!(found.char_count, 1234);
        assert_eq!(found.page_count, 2);
    }

    #[test]
    fn test_upsert_replaces_previous_run() {
        let db = test_db_with_file("f2");
        upsert(&db, &sample_metadata("f2")).unwrap();

        let mut rerun = sample_metadata("f2");
        rerun.char_count = 99;
        rerun.duration_ms = 12;
        upsert(&db, &rerun).unwrap();

        let found = find_by_file(&db, "f2").unwrap().unwrap();
        assert_eq!(found.char_count, 99);
        assert_eq!(found.duration_ms, 12);
    }

    #[test]
    fn test_find_missing() {
        let db = test_db_with_file("f3");
        assert!(find_by_file(&db, "f3").unwrap().is_none());
    }

    #[test]
    fn test_cascade_on_parent_delete() {
        let db = test_db_with_file("f4");
        upsert(&db, &sample_metadata("f4")).unwrap();

        parsed_file_repo::delete(&db, "f4").unwrap();
        assert!(find_by_file(&db, "f4").unwrap().is_none());
    }
}
