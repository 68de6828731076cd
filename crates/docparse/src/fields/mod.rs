//! Structured field extraction from raw extracted text.
//!
//! The extractor carries no document-type-specific logic. Everything about a
//! layout lives in the [`FieldTable`] configuration: labels, stop markers,
//! value transforms, defaults and derived totals. Missing fields are expected
//! and non-fatal; they yield their declared default.

pub mod spec;

use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

pub use spec::{FieldDefault, FieldSource, FieldSpec, FieldTable, ValueTransform};

use crate::error::ConfigError;

/// Result of one extraction pass. `defaulted` names every field that fell
/// back to its declared default rather than erroring.
#[derive(Debug)]
pub struct ExtractedRecord {
    pub record: Value,
    pub defaulted: Vec<String>,
}

/// A normalized field value. Money is fixed-point cents so that derived
/// sums stay exact.
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Text(String),
    Integer(i64),
    Money(i64),
    Date(String),
    Null,
}

impl FieldValue {
    fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Money(cents) => serde_json::Number::from_f64(*cents as f64 / 100.0)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Date(iso) => Value::String(iso.clone()),
            FieldValue::Null => Value::Null,
        }
    }
}

pub struct StructuredFieldExtractor {
    compiled: Vec<CompiledField>,
}

struct CompiledField {
    name: String,
    group: Option<String>,
    transform: ValueTransform,
    default: FieldDefault,
    source: CompiledSource,
}

enum CompiledSource {
    Matched { label: Regex, stops: Vec<Regex> },
    Derived { sum_of: Vec<String> },
}

impl StructuredFieldExtractor {
    pub fn new(table: &FieldTable) -> Result<Self, ConfigError> {
        table.validate()?;

        let mut compiled = Vec::with_capacity(table.fields.len());
        for field in &table.fields {
            let source = match &field.source {
                FieldSource::Matched {
                    label,
                    stop_markers,
                } => {
                    let label = literal_regex(label, &field.name)?;
                    let stops = stop_markers
                        .iter()
                        .map(|m| literal_regex(m, &field.name))
                        .collect::<Result<Vec<_>, _>>()?;
                    CompiledSource::Matched { label, stops }
                }
                FieldSource::Derived { sum_of } => CompiledSource::Derived {
                    sum_of: sum_of.clone(),
                },
            };

            compiled.push(CompiledField {
                name: field.name.clone(),
                group: field.group.clone(),
                transform: field.transform,
                default: field.default,
                source,
            });
        }

        Ok(Self { compiled })
    }

    /// Extracts all fields from `text` in table order. First match in
    /// document order wins; never returns an error.
    pub fn extract(&self, text: &str) -> ExtractedRecord {
        let mut values: Vec<(&CompiledField, FieldValue)> = Vec::with_capacity(self.compiled.len());
        let mut by_name: HashMap<&str, FieldValue> = HashMap::new();
        let mut defaulted = Vec::new();

        for field in &self.compiled {
            let value = match &field.source {
                CompiledSource::Matched { label, stops } => {
                    match capture_after_label(text, label, stops)
                        .and_then(|raw| transform_value(&raw, field.transform))
                    {
                        Some(value) => value,
                        None => {
                            defaulted.push(field.name.clone());
                            default_value(field.default, field.transform)
                        }
                    }
                }
                CompiledSource::Derived { sum_of } => {
                    derive_sum(sum_of, &by_name, field.transform)
                }
            };

            by_name.insert(field.name.as_str(), value.clone());
            values.push((field, value));
        }

        if !defaulted.is_empty() {
            log::debug!("Fields defaulted during extraction: {:?}", defaulted);
        }

        ExtractedRecord {
            record: nest_by_group(&values),
            defaulted,
        }
    }
}

fn literal_regex(literal: &str, field: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("(?i){}", regex::escape(literal))).map_err(|e| {
        ConfigError::InvalidFieldSpec {
            name: field.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Captures the text between the first occurrence of `label` and the
/// earliest following stop marker (or end of text).
fn capture_after_label(text: &str, label: &Regex, stops: &[Regex]) -> Option<String> {
    let label_match = label.find(text)?;
    let rest = &text[label_match.end()..];

    let end = stops
        .iter()
        .filter_map(|stop| stop.find(rest).map(|m| m.start()))
        .min()
        .unwrap_or(rest.len());

    let raw = rest[..end].trim();
    let raw = raw.trim_start_matches(':').trim();
    Some(raw.to_string())
}

/// Applies the declared transform. `None` means the raw capture could not
/// be normalized, which degrades to the field's default.
fn transform_value(raw: &str, transform: ValueTransform) -> Option<FieldValue> {
    match transform {
        ValueTransform::Text => {
            if raw.is_empty() {
                None
            } else {
                Some(FieldValue::Text(raw.to_string()))
            }
        }
        ValueTransform::Integer => parse_integer(raw).map(FieldValue::Integer),
        ValueTransform::Money => parse_money(raw).map(FieldValue::Money),
        ValueTransform::Date => parse_date(raw).map(FieldValue::Date),
    }
}

fn default_value(default: FieldDefault, transform: ValueTransform) -> FieldValue {
    match default {
        FieldDefault::Null => FieldValue::Null,
        FieldDefault::Empty => FieldValue::Text(String::new()),
        FieldDefault::Zero => match transform {
            ValueTransform::Money => FieldValue::Money(0),
            _ => FieldValue::Integer(0),
        },
    }
}

fn derive_sum(
    sum_of: &[String],
    by_name: &HashMap<&str, FieldValue>,
    transform: ValueTransform,
) -> FieldValue {
    let mut cents: i64 = 0;
    for name in sum_of {
        match by_name.get(name.as_str()) {
            Some(FieldValue::Money(c)) => cents += c,
            Some(FieldValue::Integer(i)) => cents += i * 100,
            _ => {}
        }
    }

    match transform {
        ValueTransform::Money => FieldValue::Money(cents),
        _ => FieldValue::Integer(cents / 100),
    }
}

/// Digits only, per the integer transform contract.
fn parse_integer(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parses a monetary capture into fixed-point cents. Thousands separators
/// and currency symbols are stripped; at most two fraction digits are kept.
fn parse_money(raw: &str) -> Option<i64> {
    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let negative = cleaned.starts_with('-');
    let cleaned = cleaned.trim_start_matches('-');
    if cleaned.contains('-') {
        return None;
    }

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned, ""),
    };
    if frac_part.contains('.') {
        return None;
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };

    let mut frac = frac_part.to_string();
    frac.truncate(2);
    while frac.len() < 2 {
        frac.push('0');
    }
    let frac: i64 = frac.parse().ok()?;

    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -cents } else { cents })
}

/// Accepted date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d %b %Y", "%b %d, %Y"];

fn parse_date(raw: &str) -> Option<String> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Builds the nested output record, grouping fields in declaration order.
fn nest_by_group(values: &[(&CompiledField, FieldValue)]) -> Value {
    let mut root = Map::new();

    for (field, value) in values {
        let json = value.to_json();
        match &field.group {
            Some(group) => {
                let entry = root
                    .entry(group.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = entry {
                    map.insert(field.name.clone(), json);
                }
            }
            None => {
                root.insert(field.name.clone(), json);
            }
        }
    }

    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn simple_table() -> FieldTable {
        FieldTable::new(vec![
            FieldSpec {
                name: "employeeName".to_string(),
                group: None,
                source: FieldSource::Matched {
                    label: "Employee Name".to_string(),
                    stop_markers: vec!["Payable".to_string()],
                },
                transform: ValueTransform::Text,
                default: FieldDefault::Empty,
            },
            FieldSpec {
                name: "payableDays".to_string(),
                group: None,
                source: FieldSource::Matched {
                    label: "Payable Days".to_string(),
                    stop_markers: vec!["Paid".to_string()],
                },
                transform: ValueTransform::Integer,
                default: FieldDefault::Zero,
            },
        ])
    }

    #[test]
    fn test_end_to_end_capture_between_labels() {
        let extractor = StructuredFieldExtractor::new(&simple_table()).unwrap();
        let result = extractor.extract("Employee Name John Doe Payable Days30Paid Days30");

        assert_eq!(result.record["employeeName"], json!("John Doe"));
        assert_eq!(result.record["payableDays"], json!(30));
        assert!(result.defaulted.is_empty());
    }

    #[test]
    fn test_missing_field_yields_declared_default() {
        let table = FieldTable::payslip();
        let extractor = StructuredFieldExtractor::new(&table).unwrap();

        // No "Basic" label anywhere.
        let result = extractor.extract("Employee Name Jane Roe Net Pay 1,000.00");

        assert_eq!(result.record["earnings"]["basic"], json!(0.0));
        assert!(result.defaulted.contains(&"basic".to_string()));
    }

    #[test]
    fn test_first_match_wins() {
        let table = FieldTable::new(vec![FieldSpec {
            name: "amount".to_string(),
            group: None,
            source: FieldSource::Matched {
                label: "Amount".to_string(),
                stop_markers: vec!["End".to_string()],
            },
            transform: ValueTransform::Money,
            default: FieldDefault::Zero,
        }]);
        let extractor = StructuredFieldExtractor::new(&table).unwrap();

        let result = extractor.extract("Amount 10.00 End Amount 99.00 End");
        assert_eq!(result.record["amount"], json!(10.0));
    }

    #[test]
    fn test_numeric_parse_failure_degrades_to_default() {
        let table = FieldTable::new(vec![FieldSpec {
            name: "total".to_string(),
            group: None,
            source: FieldSource::Matched {
                label: "Total".to_string(),
                stop_markers: vec![],
            },
            transform: ValueTransform::Money,
            default: FieldDefault::Zero,
        }]);
        let extractor = StructuredFieldExtractor::new(&table).unwrap();

        let result = extractor.extract("Total not-a-number");
        assert_eq!(result.record["total"], json!(0.0));
        assert_eq!(result.defaulted, vec!["total".to_string()]);
    }

    #[test]
    fn test_money_strips_thousands_separators() {
        assert_eq!(parse_money("1,234.56"), Some(123_456));
        assert_eq!(parse_money("₹ 45,000"), Some(4_500_000));
        assert_eq!(parse_money("1000"), Some(100_000));
        assert_eq!(parse_money("-12.5"), Some(-1250));
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("abc"), None);
    }

    #[test]
    fn test_integer_keeps_digits_only() {
        assert_eq!(parse_integer("30 days"), Some(30));
        assert_eq!(parse_integer(": 12"), Some(12));
        assert_eq!(parse_integer("none"), None);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("31/01/2026"), Some("2026-01-31".to_string()));
        assert_eq!(parse_date("2026-01-31"), Some("2026-01-31".to_string()));
        assert_eq!(parse_date("31 Jan 2026"), Some("2026-01-31".to_string()));
        assert_eq!(parse_date("Jan 31, 2026"), Some("2026-01-31".to_string()));
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_derived_totals_are_summed_exactly() {
        let table = FieldTable::payslip();
        let extractor = StructuredFieldExtractor::new(&table).unwrap();

        let text = "Basic 20,000.10 HRA 8,000.20 Conveyance Allowance 1,600.00 \
                    Special Allowance 400.03 Provident Fund 2,400.00 \
                    Professional Tax 200.00 Income Tax 1,500.00 Net Pay 25,900.33";
        let result = extractor.extract(text);

        assert_eq!(result.record["earnings"]["gross_earnings"], json!(30000.33));
        assert_eq!(result.record["deductions"]["total_deductions"], json!(4100.0));
        // Net pay is matched from text, never recomputed.
        assert_eq!(result.record["summary"]["net_pay"], json!(25900.33));
    }

    #[test]
    fn test_label_order_in_document_does_not_matter() {
        let table = FieldTable::payslip();
        let extractor = StructuredFieldExtractor::new(&table).unwrap();

        // Paid Days appears before Payable Days; the closed stop set still
        // bounds each capture correctly.
        let result = extractor.extract("Paid Days 28 Payable Days 30 Employee Name Ada");
        assert_eq!(result.record["pay_period"]["paid_days"], json!(28));
        assert_eq!(result.record["pay_period"]["payable_days"], json!(30));
        assert_eq!(result.record["employee"]["employee_name"], json!("Ada"));
    }

    #[test]
    fn test_extraction_never_errors_on_arbitrary_text() {
        let extractor = StructuredFieldExtractor::new(&FieldTable::payslip()).unwrap();
        for text in ["", "\0\0\0", "ランダムなテキスト", "Basic Basic Basic"] {
            let result = extractor.extract(text);
            assert!(result.record.is_object());
        }
    }

    #[test]
    fn test_case_insensitive_labels() {
        let extractor = StructuredFieldExtractor::new(&simple_table()).unwrap();
        let result = extractor.extract("EMPLOYEE NAME Grace Payable Days 12 Paid");
        assert_eq!(result.record["employeeName"], json!("Grace"));
        assert_eq!(result.record["payableDays"], json!(12));
    }
}
