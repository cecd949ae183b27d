//! Record schemas
//!
//! A schema describes one kind of profile record as data: its scalar fields, its
//! attachment slots and the endpoints the record is fetched from and submitted to.
//! Personal and company records share every piece of form and reconciliation logic;
//! only the tables below differ.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::slot::Cardinality;
use crate::validation::FieldFormat;

/// File types accepted by every profile slot.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Personal,
    Company,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Personal => "personal",
            RecordKind::Company => "company",
        }
    }

    pub fn schema(&self) -> RecordSchema {
        match self {
            RecordKind::Personal => RecordSchema::personal(),
            RecordKind::Company => RecordSchema::company(),
        }
    }

    pub fn all() -> [RecordKind; 2] {
        [RecordKind::Personal, RecordKind::Company]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal" => Ok(RecordKind::Personal),
            "company" => Ok(RecordKind::Company),
            other => Err(format!(
                "unknown record kind '{}' (expected personal or company)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub format: Option<FieldFormat>,
}

impl FieldDefinition {
    pub const fn text(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            format: None,
        }
    }

    pub const fn formatted(name: &'static str, label: &'static str, format: FieldFormat) -> Self {
        Self {
            name,
            label,
            format: Some(format),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub cardinality: Cardinality,
    /// Only meaningful for `Single` slots.
    pub required: bool,
    pub allowed_extensions: &'static [&'static str],
}

impl SlotDefinition {
    pub const fn single(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            cardinality: Cardinality::Single,
            required: false,
            allowed_extensions: DOCUMENT_EXTENSIONS,
        }
    }

    pub const fn required_single(name: &'static str, label: &'static str) -> Self {
        Self {
            required: true,
            ..Self::single(name, label)
        }
    }

    /// Multiple slots are never required.
    pub const fn multiple(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            cardinality: Cardinality::Multiple,
            required: false,
            allowed_extensions: DOCUMENT_EXTENSIONS,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required && self.cardinality == Cardinality::Single
    }
}

/// Where a record kind lives on the server. Create and update share `submit_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEndpoints {
    pub fetch_path: &'static str,
    pub submit_path: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub kind: RecordKind,
    pub fields: Vec<FieldDefinition>,
    pub slots: Vec<SlotDefinition>,
    pub endpoints: RecordEndpoints,
}

impl RecordSchema {
    pub fn personal() -> Self {
        Self {
            kind: RecordKind::Personal,
            fields: vec![
                FieldDefinition::text("degree", "Degree"),
                FieldDefinition::text("institution", "Institution"),
                FieldDefinition::text("graduationYear", "Graduation year"),
                FieldDefinition::text("portfolioLink", "Portfolio link"),
            ],
            slots: vec![
                SlotDefinition::required_single("resume", "Resume"),
                // optional even on first save; only the resume is required
                SlotDefinition::single("coverLetter", "Cover letter"),
            ],
            endpoints: RecordEndpoints {
                fetch_path: "/api/display-personal-details",
                submit_path: "/api/personal-details",
            },
        }
    }

    pub fn company() -> Self {
        Self {
            kind: RecordKind::Company,
            fields: vec![
                FieldDefinition::text("companyName", "Company name"),
                FieldDefinition::text("jobTitle", "Job title"),
                FieldDefinition::formatted(
                    "employmentPeriod",
                    "Employment period",
                    FieldFormat::YearRange,
                ),
                FieldDefinition::text("salary", "Salary"),
            ],
            slots: vec![
                SlotDefinition::required_single("appointmentLetter", "Appointment letter"),
                SlotDefinition::single("incrementLetter", "Increment letter"),
                SlotDefinition::single("promotionLetter", "Promotion letter"),
                SlotDefinition::multiple("payslips", "Payslips"),
                SlotDefinition::multiple("recognitionAwards", "Recognition awards"),
                SlotDefinition::multiple("exitDocuments", "Exit documents"),
            ],
            endpoints: RecordEndpoints {
                fetch_path: "/api/fetchCompanyDetails",
                submit_path: "/api/company-details",
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Slot whose keep marker is named `marker`, e.g. `keepPayslips`.
    pub fn slot_for_keep_marker(&self, marker: &str) -> Option<&SlotDefinition> {
        self.slots
            .iter()
            .find(|s| crate::message::keep_marker_name(s.name) == marker)
    }
}
