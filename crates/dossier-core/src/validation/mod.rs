//! Validation rules for profile records
//!
//! Validation never fails fast: every rule runs and all problems are reported
//! together so the user can fix them in one pass.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::models::{extension_of, RecordSchema, SlotDefinition};

static YEAR_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{4}$").expect("year range pattern compiles"));

/// Format constraints a scalar field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldFormat {
    /// `YYYY-YYYY`: four ASCII digits, a hyphen, four ASCII digits.
    YearRange,
}

impl FieldFormat {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            FieldFormat::YearRange => YEAR_RANGE.is_match(value),
        }
    }

    pub fn expected(&self) -> &'static str {
        match self {
            FieldFormat::YearRange => "YYYY-YYYY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{label} is required")]
    MissingField { field: String, label: String },

    #[error("{label} must be in {expected} format")]
    MalformedField {
        field: String,
        label: String,
        expected: String,
    },

    #[error("{label} is required")]
    MissingAttachment { slot: String, label: String },

    #[error("{file_name} is not an accepted file type for {label} (accepted: {accepted})")]
    UnsupportedFileType {
        slot: String,
        label: String,
        file_name: String,
        accepted: String,
    },
}

impl ValidationError {
    /// Field or slot the error is about.
    pub fn target(&self) -> &str {
        match self {
            ValidationError::MissingField { field, .. }
            | ValidationError::MalformedField { field, .. } => field,
            ValidationError::MissingAttachment { slot, .. }
            | ValidationError::UnsupportedFileType { slot, .. } => slot,
        }
    }
}

/// Non-empty list of validation problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Errors concerning one field or slot.
    pub fn for_target<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.0.iter().filter(move |e| e.target() == target)
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Required-and-format checks for every scalar field of the schema, in schema order.
/// Whitespace-only values count as missing.
pub fn validate_fields(schema: &RecordSchema, fields: &BTreeMap<String, String>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for def in &schema.fields {
        let value = fields.get(def.name).map(String::as_str).unwrap_or_default();
        if value.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: def.name.to_string(),
                label: def.label.to_string(),
            });
            continue;
        }
        if let Some(format) = def.format {
            if !format.matches(value) {
                errors.push(ValidationError::MalformedField {
                    field: def.name.to_string(),
                    label: def.label.to_string(),
                    expected: format.expected().to_string(),
                });
            }
        }
    }
    errors
}

pub fn is_allowed_file(slot: &SlotDefinition, file_name: &str) -> bool {
    match extension_of(file_name) {
        Some(ext) => slot
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Extension check only; file contents are never inspected.
pub fn validate_file_type(slot: &SlotDefinition, file_name: &str) -> Result<(), ValidationError> {
    if is_allowed_file(slot, file_name) {
        return Ok(());
    }
    Err(ValidationError::UnsupportedFileType {
        slot: slot.name.to_string(),
        label: slot.label.to_string(),
        file_name: file_name.to_string(),
        accepted: slot
            .allowed_extensions
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

pub fn missing_attachment(slot: &SlotDefinition) -> ValidationError {
    ValidationError::MissingAttachment {
        slot: slot.name.to_string(),
        label: slot.label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company_fields(period: &str) -> BTreeMap<String, String> {
        [
            ("companyName", "Acme"),
            ("jobTitle", "Engineer"),
            ("employmentPeriod", period),
            ("salary", "85000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn year_range_accepts_only_four_digit_pairs() {
        assert!(FieldFormat::YearRange.matches("2020-2023"));
        for bad in ["2020", "2020-23", "abcd-abcd", " 2020-2023", "2020-2023 ", "2020–2023", "٢٠٢٠-٢٠٢٣"] {
            assert!(!FieldFormat::YearRange.matches(bad), "{bad:?} should fail");
        }
    }

    #[test]
    fn malformed_period_is_reported_as_format_error() {
        let schema = RecordSchema::company();
        for bad in ["2020", "2020-23", "abcd-abcd"] {
            let errors = validate_fields(&schema, &company_fields(bad));
            assert_eq!(
                errors,
                vec![ValidationError::MalformedField {
                    field: "employmentPeriod".to_string(),
                    label: "Employment period".to_string(),
                    expected: "YYYY-YYYY".to_string(),
                }]
            );
        }
        assert!(validate_fields(&schema, &company_fields("2020-2023")).is_empty());
    }

    #[test]
    fn every_missing_field_is_reported() {
        let schema = RecordSchema::company();
        let mut fields = company_fields("");
        fields.insert("jobTitle".to_string(), "   ".to_string());
        fields.remove("salary");

        let errors = validate_fields(&schema, &fields);
        let targets: Vec<_> = errors.iter().map(ValidationError::target).collect();
        assert_eq!(targets, vec!["jobTitle", "employmentPeriod", "salary"]);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::MissingField { .. })));
    }

    #[test]
    fn file_type_check_uses_extension() {
        let slot = SlotDefinition::single("coverLetter", "Cover letter");
        assert!(validate_file_type(&slot, "letter.DOCX").is_ok());
        let err = validate_file_type(&slot, "letter.exe").unwrap_err();
        assert_eq!(
            err.to_string(),
            "letter.exe is not an accepted file type for Cover letter (accepted: .pdf, .doc, .docx)"
        );
        assert!(validate_file_type(&slot, "noextension").is_err());
    }

    #[test]
    fn messages_match_form_wording() {
        let errors = ValidationErrors::new(vec![
            ValidationError::MissingAttachment {
                slot: "appointmentLetter".to_string(),
                label: "Appointment letter".to_string(),
            },
            ValidationError::MalformedField {
                field: "employmentPeriod".to_string(),
                label: "Employment period".to_string(),
                expected: "YYYY-YYYY".to_string(),
            },
        ]);
        assert_eq!(
            errors.to_string(),
            "Appointment letter is required; Employment period must be in YYYY-YYYY format"
        );
        assert_eq!(errors.for_target("employmentPeriod").count(), 1);
    }
}
