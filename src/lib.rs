//! Typed views over MNX music notation documents.
//!
//! A [`Document`] owns a mutable JSON tree; every typed element is a lightweight view
//! (shared root plus JSON Pointer) that reads and writes that tree in place. On top of the
//! views sit an ID index ([`EntityMap`]), a rhythmic walker over sequence content
//! ([`SequenceWalker`], [`walk_sequence`]) and two-phase validation
//! ([`Document::validate`]).

#[macro_use]
mod macros;

pub mod base;
pub mod common;
pub mod content;
pub mod document;
pub mod entity;
pub mod enums;
pub mod error;
pub mod fraction;
pub mod global;
pub mod layout;
pub mod part;
pub mod pointer;
pub mod score;
pub mod sequence;
pub mod validation;
pub mod walker;

/// The MNX format version this crate reads and writes.
pub const MNX_VERSION: i64 = 1;

pub use base::{Array, Dictionary, Node, Object, View};
pub use content::{Content, ContentFamily, ContentView, DispatchMode};
pub use document::Document;
pub use entity::{EntityKind, EntityMap, EntityMapPolicies, StaffKey};
pub use error::{DurationMismatchKind, MnxError};
pub use fraction::FractionValue;
pub use pointer::JsonPointer;
pub use validation::{
    validate, validate_semantics, validate_structure, validate_structure_with_schema, SemanticValidationResult,
    Severity, ValidationError, ValidationOptions, ValidationResult, MNX_SCHEMA,
};
pub use walker::{
    for_each_event, walk_sequence, Phase, SequenceVisitor, SequenceWalker, WalkControl, WalkOptions, WalkOutcome,
    WalkState, WalkStep, MAX_TUPLET_DEPTH,
};
