//! Per-page recognized text for a file.

use rusqlite::{params, Row};

use super::{Database, StoreError};

/// A raw OCR result row from the database.
#[derive(Debug, Clone)]
pub struct OcrResultRow {
    pub id: i64,
    pub file_id: String,
    pub page_index: u32,
    pub engine_used: String,
    pub confidence: Option<f64>,
    pub extracted_text: String,
    pub created_at: String,
}

impl OcrResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_id: row.get("file_id")?,
            page_index: row.get("page_index")?,
            engine_used: row.get("engine_used")?,
            confidence: row.get("confidence")?,
            extracted_text: row.get("extracted_text")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A page result awaiting insertion.
#[derive(Debug, Clone)]
pub struct NewOcrResult {
    pub page_index: u32,
    pub engine_used: String,
    pub confidence: Option<f64>,
    pub extracted_text: String,
}

/// Inserts one page result for a file.
pub fn insert(
    db: &Database,
    file_id: &str,
    result: &NewOcrResult,
    created_at: &str,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO ocr_results (file_id, page_index, engine_used, confidence,
             extracted_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file_id,
                result.page_index,
                result.engine_used,
                result.confidence,
                result.extracted_text,
                created_at,
            ],
        )?;
        Ok(())
    })
}

/// All page results for a file, ordered by page index.
pub fn find_by_file(db: &Database, file_id: &str) -> Result<Vec<OcrResultRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM ocr_results WHERE file_id = ?1 ORDER BY page_index ASC")?;
        let rows = stmt
            .query_map(params![file_id], OcrResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Removes all page results for a file. Used before a retry so a rerun
/// never mixes pages from two attempts.
pub fn delete_by_file(db: &Database, file_id: &str) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM ocr_results WHERE file_id = ?1",
            params![file_id],
        )?;
        Ok(())
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

    fn page(index: u32, engine: &str, text: &str) -> NewOcrResult {
        NewOcrResult {
            page_index: index,
            engine_used: engine.to_string(),
            confidence: Some(0.93),
            extracted_text: text.to_string(),
        }
    }

    #[test]
    fn test_insert_and_find_ordered() {
        let db = test_db_with_file("f1");
        insert(&db, "f1", &page(1, "local-tesseract", "second"), "2026-01-01").unwrap();
        insert(&db, "f1", &page(0, "pdf-native", "first"), "2026-01-01").unwrap();

        let rows = find_by_file(&db, "f1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].page_index, 0);
        assert_eq!(rows[0].extracted_text, "first");
        assert_eq!(rows[1].engine_used, "local-tesseract");
    }

    #[test]
    fn test_confidence_may_be_null() {
        let db = test_db_with_file("f2");
        let mut result = page(0, "pdf-native", "native text");
        result.confidence = None;
        insert(&db, "f2", &result, "2026-01-01").unwrap();

        let rows = find_by_file(&db, "f2").unwrap();
        assert!(rows[0].confidence.is_none());
    }

    #[test]
    fn test_delete_by_file() {
        let db = test_db_with_file("f3");
        insert(&db, "f3", &page(0, "cloud-vision", "text"), "2026-01-01").unwrap();

        delete_by_file(&db, "f3").unwrap();
        assert!(find_by_file(&db, "f3").unwrap().is_empty());
    }

    #[test]
    fn test_cascade_on_parent_delete() {
        let db = test_db_with_file("f4");
        insert(&db, "f4", &page(0, "cloud-vision", "text"), "2026-01-01").unwrap();

        parsed_file_repo::delete(&db, "f4").unwrap();
        assert!(find_by_file(&db, "f4").unwrap().is_empty());
    }

    #[test]
    fn test_insert_requires_parent() {
        let db = Database::open_in_memory().unwrap();
        let result = insert(&db, "orphan", &page(0, "cloud-vision", "text"), "2026-01-01");
        assert!(result.is_err());
    }
}
