//! Content extractors for the supported document families.

pub mod pdf;
pub mod spreadsheet;

pub use pdf::{PdfExtraction, PdfPage, PdfTextExtractor};
pub use spreadsheet::{ColumnType, SheetTable, SpreadsheetTableExtractor};
