use crate::fraction::FractionValue;
use crate::pointer::JsonPointer;
use miette::Diagnostic;
use std::fmt::{self, Display};
use thiserror::Error;

/// Which way a sequence misses its measure length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMismatchKind {
    /// The content ends before the measure does.
    Shortfall,
    /// The content runs past the end of the measure.
    Overflow,
}

impl Display for DurationMismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shortfall => write!(f, "shortfall"),
            Self::Overflow => write!(f, "overflow"),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum MnxError {
    #[error("Missing {what} at \"{pointer}\"")]
    #[diagnostic(
        code(mnx::not_found),
        help("A required node is absent, or the view points at an element that no longer exists.")
    )]
    NotFound { pointer: JsonPointer, what: String },

    #[error("Expected {expected} at \"{pointer}\", but found {found}")]
    #[diagnostic(
        code(mnx::type_mismatch),
        help("The JSON node exists but has the wrong kind for this view.")
    )]
    TypeMismatch {
        pointer: JsonPointer,
        expected: String,
        found: String,
    },

    #[error("Unrecognized content type \"{type_name}\" at \"{pointer}\"")]
    #[diagnostic(
        code(mnx::unrecognized_variant),
        help("Known content types are listed by the containing array. Lenient dispatch skips unknown types with a warning.")
    )]
    UnrecognizedVariant {
        pointer: JsonPointer,
        type_name: String,
    },

    #[error("ID \"{id}\" already exists for {kind} at \"{existing}\"")]
    #[diagnostic(
        code(mnx::duplicate_id),
        help("IDs must be unique within their scope.")
    )]
    DuplicateId {
        pointer: JsonPointer,
        id: String,
        kind: String,
        existing: JsonPointer,
    },

    #[error("ID \"{id}\" not found in ID mapping for {expected} (referenced at \"{pointer}\")")]
    #[diagnostic(
        code(mnx::dangling_reference),
        help("The reference must name an existing entity of the expected kind.")
    )]
    DanglingReference {
        pointer: JsonPointer,
        id: String,
        expected: String,
    },

    #[error("Malformed nesting at \"{pointer}\": {message}")]
    #[diagnostic(
        code(mnx::malformed_nesting),
        help("Tuplets, grace groups and tremolos must nest within the supported limits.")
    )]
    MalformedNesting { pointer: JsonPointer, message: String },

    #[error("Rhythmic position {position} at \"{pointer}\" is negative")]
    #[diagnostic(
        code(mnx::negative_position),
        help("Rhythmic positions are measured from the start of a measure and cannot be negative.")
    )]
    NegativePosition {
        pointer: JsonPointer,
        position: FractionValue,
    },

    #[error("Duration {kind} at \"{pointer}\": content lasts {actual} but {expected} is required")]
    #[diagnostic(
        code(mnx::duration_mismatch),
        help("The non-grace content of each sequence must add up to the length of its measure.")
    )]
    DurationMismatch {
        pointer: JsonPointer,
        kind: DurationMismatchKind,
        expected: FractionValue,
        actual: FractionValue,
    },

    #[error("Invalid value \"{value}\" for {enum_name} at \"{pointer}\"")]
    #[diagnostic(
        code(mnx::invalid_enum_value),
        help("Enumerated properties accept only the values listed for their type.")
    )]
    InvalidEnumValue {
        pointer: JsonPointer,
        enum_name: String,
        value: String,
    },

    #[error("Invalid value at \"{pointer}\": {message}")]
    #[diagnostic(code(mnx::invalid_value))]
    InvalidValue { pointer: JsonPointer, message: String },

    #[error("{message} (at \"{pointer}\")")]
    #[diagnostic(code(mnx::semantic))]
    Semantic { pointer: JsonPointer, message: String },

    #[error("Index {index} is out of range for array of length {len} at \"{pointer}\"")]
    #[diagnostic(code(mnx::index_out_of_range))]
    IndexOutOfRange {
        pointer: JsonPointer,
        index: usize,
        len: usize,
    },

    #[error("I/O error: {0}")]
    #[diagnostic(code(mnx::io))]
    Io(String),

    #[error("JSON error: {0}")]
    #[diagnostic(code(mnx::json), help("The input is not well-formed JSON."))]
    Json(String),
}

impl MnxError {
    /// The location the error is attributed to, if it has one.
    #[must_use]
    pub fn pointer(&self) -> Option<&JsonPointer> {
        match self {
            Self::NotFound { pointer, .. }
            | Self::TypeMismatch { pointer, .. }
            | Self::UnrecognizedVariant { pointer, .. }
            | Self::DuplicateId { pointer, .. }
            | Self::DanglingReference { pointer, .. }
            | Self::MalformedNesting { pointer, .. }
            | Self::NegativePosition { pointer, .. }
            | Self::DurationMismatch { pointer, .. }
            | Self::InvalidEnumValue { pointer, .. }
            | Self::InvalidValue { pointer, .. }
            | Self::Semantic { pointer, .. }
            | Self::IndexOutOfRange { pointer, .. } => Some(pointer),
            Self::Io(_) | Self::Json(_) => None,
        }
    }

    pub(crate) fn not_found(pointer: &JsonPointer, what: impl Into<String>) -> Self {
        Self::NotFound {
            pointer: pointer.clone(),
            what: what.into(),
        }
    }

    pub(crate) fn type_mismatch(
        pointer: &JsonPointer,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            pointer: pointer.clone(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn invalid_value(pointer: &JsonPointer, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            pointer: pointer.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn semantic(pointer: &JsonPointer, message: impl Into<String>) -> Self {
        Self::Semantic {
            pointer: pointer.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn overflow(pointer: &JsonPointer) -> Self {
        Self::invalid_value(pointer, "rhythmic value exceeds the 64-bit fraction range")
    }

    pub(crate) fn malformed(pointer: &JsonPointer, message: impl Into<String>) -> Self {
        Self::MalformedNesting {
            pointer: pointer.clone(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for MnxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MnxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
