//! Declarative field specifications for the structured view.
//!
//! A field spec describes how to locate and normalize one field inside raw
//! extracted text. Document layouts are added by writing new tables, never
//! by touching the parser.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Group under which the field nests in the structured record.
    /// Ungrouped fields land at the top level.
    #[serde(default)]
    pub group: Option<String>,
    pub source: FieldSource,
    #[serde(default)]
    pub transform: ValueTransform,
    #[serde(default)]
    pub default: FieldDefault,
}

/// Where a field's value comes from. Totals are matched from text unless a
/// spec entry explicitly declares itself derived; derivation is a property
/// of the table, never an extractor heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSource {
    /// Scan for `label`, capture up to the earliest stop marker.
    /// The stop markers should be the closed set of all labels the layout
    /// can produce, so a reordered document degrades to a shorter capture
    /// instead of swallowing the next field's value.
    Matched {
        label: String,
        #[serde(default)]
        stop_markers: Vec<String>,
    },
    /// Sum of previously matched numeric sibling fields.
    Derived { sum_of: Vec<String> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTransform {
    #[default]
    Text,
    /// Strip thousands separators, parse as fixed-point decimal (cents).
    Money,
    /// Parse against the accepted date formats, normalize to ISO-8601.
    Date,
    /// Keep digits only, parse as integer.
    Integer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDefault {
    Empty,
    Zero,
    #[default]
    Null,
}

/// An ordered field-spec table. Order matters: derived fields may only
/// reference fields declared before them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTable {
    pub fields: Vec<FieldSpec>,
}

impl FieldTable {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Rejects tables the extractor cannot evaluate: duplicate names, empty
    /// labels, derived fields referencing unknown or non-numeric siblings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();

        for spec in &self.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::InvalidFieldSpec {
                    name: spec.name.clone(),
                    reason: "Duplicate field name".to_string(),
                });
            }

            match &spec.source {
                FieldSource::Matched { label, .. } => {
                    if label.trim().is_empty() {
                        return Err(ConfigError::InvalidFieldSpec {
                            name: spec.name.clone(),
                            reason: "Label must not be empty".to_string(),
                        });
                    }
                }
                FieldSource::Derived { sum_of } => {
                    if !matches!(spec.transform, ValueTransform::Money | ValueTransform::Integer) {
                        return Err(ConfigError::InvalidFieldSpec {
                            name: spec.name.clone(),
                            reason: "Derived fields must be money or integer".to_string(),
                        });
                    }
                    for referenced in sum_of {
                        if !seen.contains(referenced.as_str()) {
                            return Err(ConfigError::InvalidFieldSpec {
                                name: spec.name.clone(),
                                reason: format!(
                                    "References '{}', which is not declared earlier in the table",
                                    referenced
                                ),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Built-in table for payslip documents: employee info, pay period,
    /// earnings and deductions with derived totals, matched net pay.
    pub fn payslip() -> Self {
        // The closed set of labels a payslip layout can produce. Every
        // matched field stops at any of these, so label order in the source
        // document does not matter.
        const LABELS: &[&str] = &[
            "Employee Name",
            "Employee ID",
            "Designation",
            "Department",
            "Pay Period",
            "Pay Date",
            "Payable Days",
            "Paid Days",
            "LOP Days",
            "Basic",
            "HRA",
            "Conveyance Allowance",
            "Special Allowance",
            "Provident Fund",
            "Professional Tax",
            "Income Tax",
            "Net Pay",
        ];

        fn matched(
            name: &str,
            group: &str,
            label: &str,
            transform: ValueTransform,
            default: FieldDefault,
        ) -> FieldSpec {
            let stop_markers = LABELS
                .iter()
                .filter(|l| **l != label)
                .map(|l| l.to_string())
                .collect();
            FieldSpec {
                name: name.to_string(),
                group: Some(group.to_string()),
                source: FieldSource::Matched {
                    label: label.to_string(),
                    stop_markers,
                },
                transform,
                default,
            }
        }

        fn derived(name: &str, group: &str, sum_of: &[&str]) -> FieldSpec {
            FieldSpec {
                name: name.to_string(),
                group: Some(group.to_string()),
                source: FieldSource::Derived {
                    sum_of: sum_of.iter().map(|s| s.to_string()).collect(),
                },
                transform: ValueTransform::Money,
                default: FieldDefault::Zero,
            }
        }

        use FieldDefault::{Empty, Zero};
        use ValueTransform::{Date, Integer, Money, Text};

        Self::new(vec![
            matched("employee_name", "employee", "Employee Name", Text, Empty),
            matched("employee_id", "employee", "Employee ID", Text, Empty),
            matched("designation", "employee", "Designation", Text, Empty),
            matched("department", "employee", "Department", Text, Empty),
            matched("pay_period", "pay_period", "Pay Period", Text, Empty),
            matched("pay_date", "pay_period", "Pay Date", Date, Empty),
            matched("payable_days", "pay_period", "Payable Days", Integer, Zero),
            matched("paid_days", "pay_period", "Paid Days", Integer, Zero),
            matched("lop_days", "pay_period", "LOP Days", Integer, Zero),
            matched("basic", "earnings", "Basic", Money, Zero),
            matched("hra", "earnings", "HRA", Money, Zero),
            matched(
                "conveyance_allowance",
                "earnings",
                "Conveyance Allowance",
                Money,
                Zero,
            ),
            matched(
                "special_allowance",
                "earnings",
                "Special Allowance",
                Money,
                Zero,
            ),
            derived(
                "gross_earnings",
                "earnings",
                &["basic", "hra", "conveyance_allowance", "special_allowance"],
            ),
            matched(
                "provident_fund",
                "deductions",
                "Provident Fund",
                Money,
                Zero,
            ),
            matched(
                "professional_tax",
                "deductions",
                "Professional Tax",
                Money,
                Zero,
            ),
            matched("income_tax", "deductions", "Income Tax", Money, Zero),
            derived(
                "total_deductions",
                "deductions",
                &["provident_fund", "professional_tax", "income_tax"],
            ),
            matched("net_pay", "summary", "Net Pay", Money, Zero),
        ])
    }
}
