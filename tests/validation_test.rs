use miette::Report;
use mnx_dom::{
    validate_semantics, validate_structure, DispatchMode, Document, DurationMismatchKind, FractionValue, MnxError,
    Severity, ValidationOptions,
};
use serde_json::{json, Value};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn load_fixture(name: &str) -> Document {
    match Document::from_path(fixture_path(name)) {
        Ok(doc) => doc,
        Err(err) => {
            let report = Report::from(err);
            panic!("{:#}", report);
        }
    }
}

fn fixture_value(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to read fixture: {name}"));
    serde_json::from_str(&text).unwrap()
}

fn assert_valid(doc: &Document, options: &ValidationOptions) {
    let result = doc.validate(options);
    let first = result.error_iter().next().cloned();
    if let Some(err) = first {
        let report = Report::from(err);
        panic!("{:#}\nall findings:\n{}", report, *result);
    }
}

#[test]
fn test_valid_score_passes_both_phases() {
    let doc = load_fixture("valid_score.json");
    let result = doc.validate(&ValidationOptions::default());
    assert!(result.is_valid(), "{}", *result);
    assert!(result.is_empty());
    assert!(result.semantic_ran());
    let map = result.entity_map().unwrap();
    assert!(map.has_measure(2));
    assert_eq!(map.len(), 15);
}

#[test]
fn test_short_measure_reports_one_shortfall() {
    let doc = load_fixture("short_measure.json");
    let result = doc.validate(&ValidationOptions::default());
    assert!(result.structural().is_empty());
    assert_eq!(result.len(), 1, "{}", *result);
    let entry = &result.errors()[0];
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.pointer().as_str(), "/parts/0/measures/0/sequences/0");
    assert_eq!(entry.code().as_deref(), Some("mnx::duration_mismatch"));
    match &entry.error {
        MnxError::DurationMismatch {
            kind,
            expected,
            actual,
            ..
        } => {
            assert_eq!(*kind, DurationMismatchKind::Shortfall);
            assert_eq!(*expected, FractionValue::one());
            assert_eq!(*actual, FractionValue::new(3, 4).unwrap());
        }
        other => panic!("expected DurationMismatch, got {other:?}"),
    }
}

#[test]
fn test_exact_measure_after_fix() {
    let doc = load_fixture("short_measure.json");
    let content = doc
        .bind_at::<mnx_dom::sequence::Sequence>("/parts/0/measures/0/sequences/0")
        .unwrap()
        .content()
        .unwrap();
    let event = content
        .append_event(Some(mnx_dom::common::NoteValueFields::new(
            mnx_dom::enums::NoteValueBase::Quarter,
            0,
        )))
        .unwrap();
    event
        .append_note(mnx_dom::enums::NoteStep::F, 4, None)
        .unwrap();
    assert_valid(&doc, &ValidationOptions::default());
}

#[test]
fn test_duration_check_can_be_disabled() {
    let doc = load_fixture("short_measure.json");
    let options = ValidationOptions {
        check_sequence_durations: false,
        ..ValidationOptions::default()
    };
    assert_valid(&doc, &options);
}

#[test]
fn test_duplicate_note_id() {
    let mut value = fixture_value("short_measure.json");
    value["parts"][0]["measures"][0]["sequences"][0]["content"][1]["notes"][0]["id"] = json!("n1");
    let doc = Document::from_value(value).unwrap();
    let result = doc.validate(&ValidationOptions::default());
    let duplicate = result
        .error_iter()
        .find(|err| matches!(err, MnxError::DuplicateId { .. }))
        .unwrap();
    match duplicate {
        MnxError::DuplicateId {
            pointer,
            id,
            kind,
            existing,
        } => {
            assert_eq!(id, "n1");
            assert_eq!(kind, "note");
            assert_eq!(pointer.as_str(), "/parts/0/measures/0/sequences/0/content/1/notes/0");
            assert_eq!(existing.as_str(), "/parts/0/measures/0/sequences/0/content/0/notes/0");
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_dangling_tie_is_reported_at_tie() {
    let mut value = fixture_value("valid_score.json");
    value["parts"][0]["measures"][0]["sequences"][0]["content"][1]["notes"][0]["ties"][0]["target"] =
        json!("nowhere");
    let doc = Document::from_value(value).unwrap();
    let result = doc.validate(&ValidationOptions::default());
    assert_eq!(result.len(), 1, "{}", *result);
    match &result.errors()[0].error {
        MnxError::DanglingReference { pointer, id, expected } => {
            assert_eq!(
                pointer.as_str(),
                "/parts/0/measures/0/sequences/0/content/1/notes/0/ties/0"
            );
            assert_eq!(id, "nowhere");
            assert_eq!(expected, "note");
        }
        other => panic!("expected DanglingReference, got {other:?}"),
    }
}

#[test]
fn test_structural_errors_skip_semantics() {
    let mut value = fixture_value("short_measure.json");
    value["global"]["measures"][0]["time"]["unit"] = json!(3);
    value["parts"][0]["measures"][0]["sequences"][0]["content"][1]["notes"][0]["id"] = json!("n1");
    let doc = Document::from_value(value).unwrap();

    let result = doc.validate(&ValidationOptions::default());
    assert!(!result.semantic_ran());
    assert_eq!(result.len(), 1);
    assert!(matches!(result.errors()[0].error, MnxError::InvalidEnumValue { .. }));
    assert_eq!(result.errors()[0].pointer().as_str(), "/global/measures/0/time/unit");

    let options = ValidationOptions {
        best_effort: true,
        ..ValidationOptions::default()
    };
    let result = doc.validate(&options);
    assert!(result.semantic_ran());
    assert_eq!(result.structural().len(), 1);
    assert!(matches!(result.semantic()[0].error, MnxError::DuplicateId { .. }));
}

#[test]
fn test_lenient_dispatch_downgrades_unknown_content() {
    let mut value = fixture_value("valid_score.json");
    let content = value["parts"][0]["measures"][1]["sequences"][0]["content"]
        .as_array_mut()
        .unwrap();
    content.push(json!({"type": "futureThing", "payload": 1}));
    let doc = Document::from_value(value).unwrap();

    let strict = doc.validate(&ValidationOptions::default());
    assert!(!strict.is_valid());
    assert!(matches!(
        strict.errors()[0].error,
        MnxError::UnrecognizedVariant { .. }
    ));

    let options = ValidationOptions {
        dispatch: DispatchMode::Lenient,
        ..ValidationOptions::default()
    };
    let lenient = doc.validate(&options);
    assert!(lenient.is_valid(), "{}", *lenient);
    assert_eq!(lenient.len(), 1);
    assert_eq!(lenient.errors()[0].severity, Severity::Warning);
}

#[test]
fn test_phases_run_separately() {
    let doc = load_fixture("short_measure.json");
    let options = ValidationOptions::default();
    assert!(validate_structure(&doc, &options).is_empty());
    let semantic = validate_semantics(&doc, &options);
    assert!(semantic.structural().is_empty());
    assert_eq!(semantic.semantic().len(), 1);
}

#[test]
fn test_findings_serialize_for_tooling() {
    let doc = load_fixture("short_measure.json");
    let result = doc.validate(&ValidationOptions::default());
    let json: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(
        json[0]["pointer"],
        json!("/parts/0/measures/0/sequences/0")
    );
    assert_eq!(json[0]["severity"], json!("error"));
    assert_eq!(json[0]["code"], json!("mnx::duration_mismatch"));
    assert!(json[0]["message"].as_str().unwrap().contains("shortfall"));
    assert!(result.to_string().starts_with("At /parts/0/measures/0/sequences/0 - error:"));
}

#[test]
fn test_options_deserialize_with_defaults() {
    let options: ValidationOptions = serde_json::from_value(json!({"dispatch": "lenient"})).unwrap();
    assert_eq!(options.dispatch, DispatchMode::Lenient);
    assert!(options.check_sequence_durations);
    assert!(!options.best_effort);
    assert!(options.policies.ottavas_respect_grace_targets);
}

#[test]
fn test_layout_and_score_references() {
    let mut value = fixture_value("valid_score.json");
    value["layouts"][0]["content"][0]["content"][0]["sources"][0]["staff"] = json!(2);
    value["scores"][0]["pages"][0]["systems"][1]["layoutChanges"][0]["layout"] = json!("L9");
    let doc = Document::from_value(value).unwrap();
    let result = doc.validate(&ValidationOptions::default());
    let messages: Vec<String> = result.iter().map(ToString::to_string).collect();
    assert_eq!(messages.len(), 2, "{messages:?}");
    assert!(messages[0].contains("invalid staff number (2) for part P1"));
    assert!(matches!(
        &result.errors()[1].error,
        MnxError::DanglingReference { id, expected, .. } if id == "L9" && expected == "layout"
    ));
}

#[test]
fn test_ottava_ending_before_start() {
    let mut value = fixture_value("valid_score.json");
    value["parts"][0]["measures"][0]["ottavas"][0]["position"]["fraction"] = json!([1, 2]);
    let doc = Document::from_value(value).unwrap();
    let result = doc.validate(&ValidationOptions::default());
    assert_eq!(result.len(), 1, "{}", *result);
    assert!(result.errors()[0].message().contains("Ottava ends before it begins (in the same measure)"));
}
