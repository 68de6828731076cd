//! One row per extracted spreadsheet sheet.

use rusqlite::{params, Row};

use super::{Database, StoreError};
use crate::extractor::SheetTable;

/// A raw table extraction row from the database.
#[derive(Debug, Clone)]
pub struct TableExtractionRow {
    pub id: i64,
    pub file_id: String,
    pub sheet_name: String,
    pub header_json: String,
    pub rows_json: String,
    pub column_types_json: String,
    pub row_count: i64,
    pub column_count: i64,
    pub created_at: String,
}

impl TableExtractionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_id: row.get("file_id")?,
            sheet_name: row.get("sheet_name")?,
            header_json: row.get("header_json")?,
            rows_json: row.get("rows_json")?,
            column_types_json: row.get("column_types_json")?,
            row_count: row.get("row_count")?,
            column_count: row.get("column_count")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Deserializes the stored sheet back into its in-memory form.
    pub fn to_sheet(&self) -> Result<SheetTable, StoreError> {
        Ok(SheetTable {
            sheet_name: self.sheet_name.clone(),
            header: serde_json::from_str(&self.header_json)?,
            rows: serde_json::from_str(&self.rows_json)?,
            column_types: serde_json::from_str(&self.column_types_json)?,
        })
    }
}

/// Inserts one extracted sheet for a file.
pub fn insert(
    db: &Database,
    file_id: &str,
    sheet: &SheetTable,
    created_at: &str,
) -> Result<(), StoreError> {
    let header_json = serde_json::to_string(&sheet.header)?;
    let rows_json = serde_json::to_string(&sheet.rows)?;
    let column_types_json = serde_json::to_string(&sheet.column_types)?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO table_extractions (file_id, sheet_name, header_json, rows_json,
             column_types_json, row_count, column_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                file_id,
                sheet.sheet_name,
                header_json,
                rows_json,
                column_types_json,
                sheet.row_count() as i64,
                sheet.column_count() as i64,
                created_at,
            ],
        )?;
        Ok(())
    })
}

/// All extracted sheets for a file, in insertion order.
pub fn find_by_file(db: &Database, file_id: &str) -> Result<Vec<TableExtractionRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM table_extractions WHERE file_id = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![file_id], TableExtractionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Removes all extracted sheets for a file ahead of a retry.
pub fn delete_by_file(db: &Database, file_id: &str) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM table_extractions WHERE file_id = ?1",
            params![file_id],
        )?;
        Ok(())
    })
}
