//! Spreadsheet extraction: XLSX workbooks into typed tabular records.
//!
//! Walks the OOXML container directly (workbook.xml for sheet names,
//! sharedStrings.xml, then each worksheet's cell grid). Column type
//! inference is best-effort and informational only; cells that do not
//! parse as the inferred type are kept as raw text, never rejected.

use std::io::{Cursor, Read, Seek};

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Number,
    Date,
    Text,
}

/// One sheet parsed into a header row plus data rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetTable {
    pub sheet_name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_types: Vec<ColumnType>,
}

impl SheetTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }
}

pub struct SpreadsheetTableExtractor;

impl SpreadsheetTableExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parses every non-empty sheet of the workbook. Fails with
    /// `CorruptDocument` only when the container cannot be opened.
    pub fn extract(&self, workbook_bytes: &[u8]) -> Result<Vec<SheetTable>, ExtractError> {
        let _span = tracing::info_span!("extractor.spreadsheet").entered();

        let cursor = Cursor::new(workbook_bytes);
        let mut archive = zip::ZipArchive::new(cursor).map_err(|e| {
            ExtractError::CorruptDocument(format!("Failed to open workbook: {}", e))
        })?;

        let shared = read_shared_strings(&mut archive)?;
        let sheet_names = read_sheet_names(&mut archive)?;

        let mut tables = Vec::new();

        for (index, sheet_name) in sheet_names.iter().enumerate() {
            let path = format!("xl/worksheets/sheet{}.xml", index + 1);
            let xml = match read_archive_file(&mut archive, &path) {
                Some(xml) => xml,
                None => {
                    log::warn!("Worksheet part '{}' missing from workbook", path);
                    continue;
                }
            };

            let raw_rows = parse_sheet_xml(&xml, &shared)?;
            let mut rows: Vec<Vec<String>> = raw_rows
                .into_iter()
                .filter(|row| row.iter().any(|cell| !cell.is_empty()))
                .collect();

            // Empty sheets are skipped, not recorded as zero-row extractions.
            if rows.is_empty() {
                continue;
            }

            let header = rows.remove(0);
            let column_types = infer_column_types(&header, &rows);

            tables.push(SheetTable {
                sheet_name: sheet_name.clone(),
                header,
                rows,
                column_types,
            });
        }

        Ok(tables)
    }
}

impl Default for SpreadsheetTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn read_archive_file<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Sheet names from xl/workbook.xml, in workbook order.
fn read_sheet_names<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<String>, ExtractError> {
    let xml = read_archive_file(archive, "xl/workbook.xml").ok_or_else(|| {
        ExtractError::CorruptDocument("Workbook is missing xl/workbook.xml".to_string())
    })?;

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut names = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"name" {
                        names.push(attr.unescape_value().unwrap_or_default().to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::CorruptDocument(format!(
                    "Invalid workbook.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(names)
}

/// Shared string table, one entry per `<si>` (rich-text runs concatenated).
fn read_shared_strings<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<String>, ExtractError> {
    let xml = match read_archive_file(archive, "xl/sharedStrings.xml") {
        Some(xml) => xml,
        None => return Ok(Vec::new()),
    };

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(current.clone()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::CorruptDocument(format!(
                    "Invalid sharedStrings.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// Walks one worksheet's cell grid into dense string rows. Gaps between
/// referenced cells become empty strings so column positions stay aligned.
fn parse_sheet_xml(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<(usize, String)> = Vec::new();
    let mut cell_col: Option<usize> = None;
    let mut cell_type = String::new();
    let mut pending = String::new();
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => current.clear(),
                b"c" => {
                    cell_col = None;
                    cell_type.clear();
                    pending.clear();
                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"r" => {
                                let reference = attr.unescape_value().unwrap_or_default();
                                cell_col = column_index(&reference);
                            }
                            b"t" => {
                                cell_type = attr.unescape_value().unwrap_or_default().to_string();
                            }
                            _ => {}
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_value || in_inline_text {
                    pending.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    let col = cell_col.take().unwrap_or(current.len());
                    let value = resolve_cell(&pending, &cell_type, shared);
                    current.push((col, value));
                    pending.clear();
                }
                b"row" => {
                    rows.push(materialize_row(&current));
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::CorruptDocument(format!(
                    "Invalid worksheet XML: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rows)
}

fn resolve_cell(raw: &str, cell_type: &str, shared: &[String]) -> String {
    match cell_type {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .cloned()
            .unwrap_or_default(),
        "b" => {
            if raw.trim() == "1" {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        _ => raw.trim().to_string(),
    }
}

/// Converts an A1-style reference into a zero-based column index.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }

    let mut index: usize = 0;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

fn materialize_row(cells: &[(usize, String)]) -> Vec<String> {
    let width = cells.iter().map(|(col, _)| col + 1).max().unwrap_or(0);
    let mut row = vec![String::new(); width];
    for (col, value) in cells {
        row[*col] = value.clone();
    }
    row
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Best-effort column typing over the data rows. Informational only.
fn infer_column_types(header: &[String], rows: &[Vec<String>]) -> Vec<ColumnType> {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    (0..columns)
        .map(|col| {
            let values: Vec<&str> = rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .collect();

            if values.is_empty() {
                return ColumnType::Text;
            }
            if values.iter().all(|v| v.parse::<i64>().is_ok()) {
                return ColumnType::Integer;
            }
            if values
                .iter()
                .all(|v| v.replace(',', "").parse::<f64>().is_ok())
            {
                return ColumnType::Number;
            }
            if values.iter().all(|v| {
                DATE_FORMATS
                    .iter()
                    .any(|f| NaiveDate::parse_from_str(v, f).is_ok())
            }) {
                return ColumnType::Date;
            }
            ColumnType::Text
        })
        .collect()
}
