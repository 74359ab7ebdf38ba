//! Schema checks over the raw tree.
//!
//! The document is checked against the bundled MNX JSON Schema (draft 2020-12) with
//! `jsonschema`. Raw schema errors are then mapped onto [`MnxError`] and thinned out:
//! once an array element or dictionary entry has failed, nothing else inside it is
//! reported, but independent problems in sibling subtrees all are. An unknown content
//! discriminant becomes `UnrecognizedVariant`, which lenient dispatch reports as a
//! warning.

use super::{ValidationOptions, ValidationResult};
use crate::base::{kind_name, View};
use crate::content::{DispatchMode, TYPE_KEY};
use crate::document::Document;
use crate::error::MnxError;
use crate::pointer::JsonPointer;
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::Validator;
use log::{debug, trace};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// The MNX schema used by [`validate_structure`].
pub const MNX_SCHEMA: &str = include_str!("mnx_schema.json");

const CONTENT_KEY: &str = "content";

/// Keys whose values are maps of independent entries.
const DICTIONARY_KEYS: &[&str] = &["lineMetadata", "lines"];

fn compile(schema: &Value) -> Result<Validator, MnxError> {
    jsonschema::validator_for(schema)
        .map_err(|err| MnxError::invalid_value(&JsonPointer::root(), format!("schema does not compile: {err}")))
}

fn bundled_validator() -> Result<&'static Validator, MnxError> {
    static VALIDATOR: OnceLock<Result<Validator, MnxError>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(MNX_SCHEMA)?;
            compile(&schema)
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// One mapped schema error.
struct Finding {
    pointer: JsonPointer,
    error: MnxError,
    /// Kind errors win over value errors at the same depth.
    rank: u8,
    unrecognized: bool,
}

impl Finding {
    fn from_schema_error(error: &jsonschema::ValidationError<'_>) -> Self {
        let pointer = JsonPointer::parse(&error.instance_path.to_string()).unwrap_or_default();
        let instance: &Value = &error.instance;
        match &error.kind {
            ValidationErrorKind::Required { property } => {
                let key = property.as_str().unwrap_or_default();
                let pointer = pointer.push(key);
                Self {
                    error: MnxError::not_found(&pointer, format!("required property \"{key}\"")),
                    pointer,
                    rank: 0,
                    unrecognized: false,
                }
            }
            ValidationErrorKind::Type { kind } => Self {
                error: MnxError::type_mismatch(&pointer, expected_kind(kind), kind_name(instance)),
                pointer,
                rank: 0,
                unrecognized: false,
            },
            ValidationErrorKind::Enum { .. } => {
                let text = instance.as_str().map_or_else(|| instance.to_string(), str::to_string);
                match content_item_of(&pointer) {
                    Some(item) => Self {
                        error: MnxError::UnrecognizedVariant {
                            pointer: item.clone(),
                            type_name: text,
                        },
                        pointer: item,
                        rank: 1,
                        unrecognized: true,
                    },
                    None => Self {
                        error: MnxError::InvalidEnumValue {
                            pointer: pointer.clone(),
                            enum_name: pointer.last_token().unwrap_or_default(),
                            value: text,
                        },
                        pointer,
                        rank: 1,
                        unrecognized: false,
                    },
                }
            }
            _ => Self {
                error: MnxError::invalid_value(&pointer, error.to_string()),
                pointer,
                rank: 1,
                unrecognized: false,
            },
        }
    }
}

fn expected_kind(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Single(primitive) => primitive.to_string(),
        TypeKind::Multiple(_) => "one of several kinds".to_string(),
    }
}

/// The content element owning a `.../content/<n>/type` pointer.
fn content_item_of(pointer: &JsonPointer) -> Option<JsonPointer> {
    let tokens = pointer.tokens();
    match tokens.as_slice() {
        [.., container, index, key]
            if container == CONTENT_KEY && key == TYPE_KEY && index.parse::<usize>().is_ok() =>
        {
            pointer.parent()
        }
        _ => None,
    }
}

/// The innermost array element or dictionary entry containing `pointer`.
fn failure_scope(pointer: &JsonPointer) -> JsonPointer {
    let tokens = pointer.tokens();
    let mut scope = JsonPointer::root();
    let mut current = JsonPointer::root();
    for (position, token) in tokens.iter().enumerate() {
        current = current.push(token);
        let in_dictionary = position > 0 && DICTIONARY_KEYS.contains(&tokens[position - 1].as_str());
        if in_dictionary || token.parse::<usize>().is_ok() {
            scope = current.clone();
        }
    }
    scope
}

/// Token-wise order with array indices compared numerically.
fn document_order(a: &JsonPointer, b: &JsonPointer) -> Ordering {
    let (left, right) = (a.tokens(), b.tokens());
    for (x, y) in left.iter().zip(right.iter()) {
        let ordering = match (x.parse::<usize>(), y.parse::<usize>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn report(mut findings: Vec<Finding>, mode: DispatchMode, result: &mut ValidationResult) {
    findings.sort_by_key(|finding| (finding.pointer.tokens().len(), finding.rank));
    let mut failed: Vec<JsonPointer> = Vec::new();
    let mut kept = Vec::new();
    for finding in findings {
        if failed.iter().any(|scope| finding.pointer.starts_with(scope)) {
            trace!("suppressed {}", finding.error);
            continue;
        }
        failed.push(failure_scope(&finding.pointer));
        kept.push(finding);
    }
    kept.sort_by(|a, b| document_order(&a.pointer, &b.pointer));
    for finding in kept {
        if finding.unrecognized && mode == DispatchMode::Lenient {
            result.warn(finding.error);
        } else {
            result.push(finding.error);
        }
    }
}

fn check(document: &Document, validator: &Validator, mode: DispatchMode) -> ValidationResult {
    let mut result = ValidationResult::new();
    let findings = document.node().read(|value| {
        validator
            .iter_errors(value)
            .map(|error| Finding::from_schema_error(&error))
            .collect::<Vec<_>>()
    });
    match findings {
        Ok(findings) => report(findings, mode, &mut result),
        Err(err) => result.push(err),
    }
    debug!("structural validation: {} findings", result.len());
    result
}

/// Checks the document against the bundled MNX schema.
#[must_use]
pub fn validate_structure(document: &Document, options: &ValidationOptions) -> ValidationResult {
    match bundled_validator() {
        Ok(validator) => check(document, validator, options.dispatch),
        Err(err) => {
            let mut result = ValidationResult::new();
            result.push(err);
            result
        }
    }
}

/// Checks the document against a caller-supplied schema, such as a newer MNX draft.
///
/// # Errors
/// `InvalidValue` at the root if `schema` does not compile.
pub fn validate_structure_with_schema(
    document: &Document,
    schema: &Value,
    options: &ValidationOptions,
) -> Result<ValidationResult, MnxError> {
    let validator = compile(schema)?;
    Ok(check(document, &validator, options.dispatch))
}
