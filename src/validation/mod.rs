//! Two-phase validation.
//!
//! The structural phase checks the tree against the bundled MNX JSON Schema: required
//! keys, JSON kinds, enumerations, fraction shapes and content discriminants. The
//! semantic phase runs only once the structure is sound (or when `best_effort` is set)
//! and checks what a schema cannot: references resolve, sequences fill their measures,
//! beams and ottavas make sense. Both phases accumulate located errors into one result.

mod semantic;
mod structural;

pub use semantic::validate_semantics;
pub use structural::{validate_structure, validate_structure_with_schema, MNX_SCHEMA};

use crate::content::DispatchMode;
use crate::document::Document;
use crate::entity::{EntityMap, EntityMapPolicies};
use crate::error::MnxError;
use crate::pointer::JsonPointer;
use log::info;
use miette::Diagnostic;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{self, Display};
use std::ops::Deref;

/// Validation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationOptions {
    /// How unrecognized content discriminants are treated. Lenient dispatch reports
    /// them as warnings instead of errors.
    pub dispatch: DispatchMode,
    /// Run the semantic phase even when the structural phase found errors.
    pub best_effort: bool,
    /// Check that every sequence fills its measure.
    pub check_sequence_durations: bool,
    pub policies: EntityMapPolicies,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Strict,
            best_effort: false,
            check_sequence_durations: true,
            policies: EntityMapPolicies::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One located finding.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub severity: Severity,
    pub error: MnxError,
}

impl ValidationError {
    /// Where the problem is; the document root for errors without a location.
    #[must_use]
    pub fn pointer(&self) -> JsonPointer {
        self.error.pointer().cloned().unwrap_or_else(JsonPointer::root)
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// The diagnostic code, e.g. `mnx::duration_mismatch`.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        self.error.code().map(|code| code.to_string())
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "At {} - {}: {}", self.pointer(), self.severity, self.error)
    }
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ValidationError", 4)?;
        state.serialize_field("pointer", self.pointer().as_str())?;
        state.serialize_field("message", &self.message())?;
        state.serialize_field("severity", &self.severity)?;
        state.serialize_field("code", &self.code())?;
        state.end()
    }
}

/// An ordered list of findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: MnxError) {
        self.errors.push(ValidationError {
            severity: Severity::Error,
            error,
        });
    }

    pub fn warn(&mut self, error: MnxError) {
        self.errors.push(ValidationError {
            severity: Severity::Warning,
            error,
        });
    }

    /// Every finding, warnings included, in the order found.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Findings of severity `Error`.
    pub fn error_iter(&self) -> impl Iterator<Item = &MnxError> {
        self.errors
            .iter()
            .filter(|entry| entry.severity == Severity::Error)
            .map(|entry| &entry.error)
    }

    /// True when there are no findings of severity `Error`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error_iter().next().is_none()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Serializes the findings as a pretty-printed JSON array of
    /// `{pointer, message, severity, code}` records.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.errors)
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.errors {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationResult {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Structural findings followed by semantic ones.
#[derive(Debug, Clone)]
pub struct SemanticValidationResult {
    result: ValidationResult,
    structural_len: usize,
    semantic_ran: bool,
    entity_map: Option<EntityMap>,
}

impl SemanticValidationResult {
    pub(crate) fn from_structural(result: ValidationResult) -> Self {
        let structural_len = result.len();
        Self {
            result,
            structural_len,
            semantic_ran: false,
            entity_map: None,
        }
    }

    /// Findings of the structural phase, unchanged.
    #[must_use]
    pub fn structural(&self) -> &[ValidationError] {
        &self.result.errors[..self.structural_len]
    }

    #[must_use]
    pub fn semantic(&self) -> &[ValidationError] {
        &self.result.errors[self.structural_len..]
    }

    /// Whether the semantic phase ran.
    #[must_use]
    pub fn semantic_ran(&self) -> bool {
        self.semantic_ran
    }

    /// The entity map built by the semantic phase.
    #[must_use]
    pub fn entity_map(&self) -> Option<&EntityMap> {
        self.entity_map.as_ref()
    }

    #[must_use]
    pub fn into_result(self) -> ValidationResult {
        self.result
    }
}

impl Deref for SemanticValidationResult {
    type Target = ValidationResult;

    fn deref(&self) -> &ValidationResult {
        &self.result
    }
}

/// Runs both phases.
#[must_use]
pub fn validate(document: &Document, options: &ValidationOptions) -> SemanticValidationResult {
    let structural = validate_structure(document, options);
    let structurally_valid = structural.is_valid();
    let mut result = SemanticValidationResult::from_structural(structural);
    if structurally_valid || options.best_effort {
        semantic::run(document, options, &mut result);
    } else {
        info!("skipping semantic validation after {} structural errors", result.len());
    }
    result
}
