//! Cross-reference and rhythm checks on a structurally sound document.

use super::{SemanticValidationResult, ValidationOptions, ValidationResult};
use crate::base::{Array, View};
use crate::document::Document;
use crate::entity::{EntityMap, StaffKey};
use crate::error::{DurationMismatchKind, MnxError};
use crate::fraction::FractionValue;
use crate::layout::{flatten_layout_staves, Layout};
use crate::part::{Beam, Part, PartMeasure};
use crate::pointer::JsonPointer;
use crate::sequence::{ContentArray, ContentItem, Event, Note, Sequence, Tuplet};
use crate::walker::{walk_sequence, SequenceVisitor, WalkControl, WalkOptions, WalkStep};
use log::debug;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Runs only the semantic phase, whatever the structural state of the document.
#[must_use]
pub fn validate_semantics(document: &Document, options: &ValidationOptions) -> SemanticValidationResult {
    let mut result = SemanticValidationResult::from_structural(ValidationResult::new());
    run(document, options, &mut result);
    result
}

pub(super) fn run(document: &Document, options: &ValidationOptions, result: &mut SemanticValidationResult) {
    let mut errors = Vec::new();
    let map = EntityMap::build_with(document, options.dispatch, options.policies, &mut errors);
    for err in errors {
        result.result.push(err);
    }
    let before = result.result.len();
    let mut checker = Checker {
        document,
        options,
        map: &map,
        result: &mut result.result,
        lyric_lines: HashMap::new(),
        unusable_duration: false,
    };
    checker.check_document();
    debug!("semantic validation: {} findings", result.result.len() - before);
    result.semantic_ran = true;
    result.entity_map = Some(map);
}

/// Compares content length against the length it has to fill.
fn duration_mismatch(pointer: &JsonPointer, expected: FractionValue, actual: FractionValue) -> Option<MnxError> {
    let kind = match actual.cmp(&expected) {
        Ordering::Less => DurationMismatchKind::Shortfall,
        Ordering::Greater => DurationMismatchKind::Overflow,
        Ordering::Equal => return None,
    };
    Some(MnxError::DurationMismatch {
        pointer: pointer.clone(),
        kind,
        expected,
        actual,
    })
}

fn event_label(event: &Event) -> Result<String, MnxError> {
    Ok(event.id()?.unwrap_or_else(|| "<no-id>".to_string()))
}

/// Collects tuplets whose content does not add up to their outer quantity.
#[derive(Default)]
struct TupletFill {
    mismatches: Vec<MnxError>,
}

impl SequenceVisitor for TupletFill {
    fn leave_tuplet(&mut self, tuplet: &Tuplet, step: &WalkStep) -> WalkControl {
        match step.position.checked_sub(step.start) {
            Some(actual) => self
                .mismatches
                .extend(duration_mismatch(tuplet.pointer(), step.duration, actual)),
            None => self.mismatches.push(MnxError::overflow(tuplet.pointer())),
        }
        WalkControl::Continue
    }
}

struct Checker<'a> {
    document: &'a Document,
    options: &'a ValidationOptions,
    map: &'a EntityMap,
    result: &'a mut ValidationResult,
    /// Declared lyric line IDs. Empty when the document declares none.
    lyric_lines: HashMap<String, JsonPointer>,
    /// Set when an event in the current sequence has no usable duration.
    unusable_duration: bool,
}

impl Checker<'_> {
    fn push(&mut self, error: MnxError) {
        self.result.push(error);
    }

    fn semantic(&mut self, pointer: &JsonPointer, message: impl Into<String>) {
        self.push(MnxError::semantic(pointer, message));
    }

    /// Records a failed read; the caller moves on to the next element.
    fn record<T>(&mut self, result: Result<T, MnxError>) -> Option<T> {
        result.map_err(|err| self.push(err)).ok()
    }

    fn check_document(&mut self) {
        let outcome = self.check_global();
        self.record(outcome);
        let outcome = self.check_parts();
        self.record(outcome);
        let outcome = self.check_layouts();
        self.record(outcome);
        let outcome = self.check_scores();
        self.record(outcome);
    }

    fn check_global(&mut self) -> Result<(), MnxError> {
        let Some(lyrics) = self.document.global()?.lyrics()? else {
            return Ok(());
        };
        let metadata = lyrics.line_metadata()?;
        if let Some(line_order) = lyrics.line_order()? {
            for (index, line_id) in line_order.iter().enumerate() {
                let line_id = line_id?;
                let pointer = line_order.pointer().push_index(index);
                if let Some(existing) = self.lyric_lines.get(&line_id) {
                    let err = MnxError::DuplicateId {
                        pointer,
                        id: line_id,
                        kind: "lyric line".to_string(),
                        existing: existing.clone(),
                    };
                    self.push(err);
                } else {
                    self.lyric_lines.insert(line_id, pointer);
                }
            }
            if let Some(metadata) = metadata {
                if metadata.len()? != self.lyric_lines.len() {
                    self.semantic(metadata.pointer(), "Size of line metadata does not match size of line order.");
                }
                for line_id in metadata.keys()? {
                    if !self.lyric_lines.contains_key(&line_id) {
                        let err = MnxError::DanglingReference {
                            pointer: metadata.pointer().push(&line_id),
                            id: line_id,
                            expected: "lyric line".to_string(),
                        };
                        self.push(err);
                    }
                }
            }
        } else if let Some(metadata) = metadata {
            for line_id in metadata.keys()? {
                let pointer = metadata.pointer().push(&line_id);
                self.lyric_lines.insert(line_id, pointer);
            }
        }
        Ok(())
    }

    fn check_parts(&mut self) -> Result<(), MnxError> {
        let global_count = self.document.global()?.measures()?.len()?;
        for part in self.document.parts()?.iter() {
            let outcome = part.and_then(|part| self.check_part(&part, global_count));
            self.record(outcome);
        }
        Ok(())
    }

    fn check_part(&mut self, part: &Part, global_count: usize) -> Result<(), MnxError> {
        let measures = part.measures()?;
        let count = match &measures {
            Some(measures) => measures.len()?,
            None => 0,
        };
        if count != global_count {
            let index = part.array_index().unwrap_or_default();
            self.semantic(
                part.pointer(),
                format!(
                    "Part[{index}] contains a different number of measures ({count}) than are defined globally ({global_count})"
                ),
            );
        }
        let Some(measures) = measures else {
            return Ok(());
        };
        for measure in measures.iter() {
            let outcome = measure.and_then(|measure| self.check_measure_sequences(&measure));
            self.record(outcome);
        }
        // Beams and ottavas refer across measures, so they go after every sequence.
        for measure in measures.iter() {
            let measure = measure?;
            if let Some(beams) = measure.beams()? {
                let outcome = self.check_beams(&beams, 1);
                self.record(outcome);
            }
            let outcome = self.check_ottavas(&measure);
            self.record(outcome);
        }
        Ok(())
    }

    fn check_measure_sequences(&mut self, measure: &PartMeasure) -> Result<(), MnxError> {
        let full_measure = measure.calc_duration().ok().flatten();
        let mut voices: HashMap<StaffKey, JsonPointer> = HashMap::new();
        for sequence in measure.sequences()?.iter() {
            let sequence = sequence?;
            let key = sequence.staff_key()?;
            if let Some(existing) = voices.get(&key) {
                let err = MnxError::DuplicateId {
                    pointer: sequence.pointer().clone(),
                    id: key.to_string(),
                    kind: "voice".to_string(),
                    existing: existing.clone(),
                };
                self.push(err);
            } else {
                voices.insert(key, sequence.pointer().clone());
            }
            self.unusable_duration = false;
            let outcome = sequence.content().and_then(|content| self.check_content(&content));
            let content_read = outcome.is_ok();
            self.record(outcome);
            // Rhythm is only meaningful once every event has a usable duration.
            if content_read && !self.unusable_duration {
                self.check_sequence_duration(&sequence, full_measure);
            }
        }
        Ok(())
    }

    fn check_sequence_duration(&mut self, sequence: &Sequence, full_measure: Option<FractionValue>) {
        let options = WalkOptions {
            full_measure,
            ..WalkOptions::with_dispatch(self.options.dispatch)
        };
        let mut fill = TupletFill::default();
        let outcome = walk_sequence(sequence, &mut fill, options);
        for err in fill.mismatches {
            self.push(err);
        }
        let end = match outcome.into_result() {
            Ok(end) => end,
            Err(err) => return self.push(err),
        };
        if !self.options.check_sequence_durations {
            return;
        }
        if let Some(expected) = full_measure {
            if let Some(err) = duration_mismatch(sequence.pointer(), expected, end) {
                self.push(err);
            }
        }
    }

    fn check_content(&mut self, content: &ContentArray) -> Result<(), MnxError> {
        for item in content.iter(self.options.dispatch) {
            let nested = match item? {
                ContentItem::Event(event) => {
                    let outcome = self.check_event(&event);
                    self.record(outcome);
                    None
                }
                ContentItem::Grace(grace) => Some(grace.content()?),
                ContentItem::Tuplet(tuplet) => Some(tuplet.content()?),
                ContentItem::MultiNoteTremolo(tremolo) => Some(tremolo.content()?),
                ContentItem::Space(_) | ContentItem::Unknown(_) => None,
            };
            if let Some(nested) = nested {
                self.check_content(&nested)?;
            }
        }
        Ok(())
    }

    fn check_event(&mut self, event: &Event) -> Result<(), MnxError> {
        let label = event_label(event)?;
        let shape = event
            .measure()
            .and_then(|measure| Ok((measure.unwrap_or(false), event.duration()?.is_some())));
        let (full_measure, has_duration) = match shape {
            Ok(shape) => shape,
            Err(err) => {
                self.unusable_duration = true;
                return Err(err);
            }
        };
        if full_measure == has_duration {
            self.unusable_duration = true;
        }
        if full_measure && has_duration {
            self.semantic(
                event.pointer(),
                format!("Event \"{label}\" has both full measure indicator and duration."),
            );
        } else if !full_measure && !has_duration {
            self.semantic(
                event.pointer(),
                format!("Event \"{label}\" has neither full measure indicator nor duration."),
            );
        }
        let notes = event.notes()?;
        let has_notes = match &notes {
            Some(notes) => !notes.is_empty()?,
            None => false,
        };
        match (event.rest()?.is_some(), has_notes) {
            (true, true) => self.semantic(event.pointer(), format!("Event \"{label}\" is a rest but also has notes.")),
            (false, false) => self.semantic(
                event.pointer(),
                format!("Event \"{label}\" is neither a rest nor has notes."),
            ),
            _ => {}
        }
        if let Some(notes) = notes {
            for note in notes.iter() {
                let outcome = note.and_then(|note| self.check_ties(&note));
                self.record(outcome);
            }
        }
        if !self.lyric_lines.is_empty() {
            if let Some(lyrics) = event.lyrics()? {
                let lines = lyrics.lines()?;
                for line_id in lines.keys()? {
                    if !self.lyric_lines.contains_key(&line_id) {
                        let err = MnxError::DanglingReference {
                            pointer: lines.pointer().push(&line_id),
                            id: line_id,
                            expected: "lyric line".to_string(),
                        };
                        self.push(err);
                    }
                }
            }
        }
        if let Some(slurs) = event.slurs()? {
            for slur in slurs.iter() {
                let slur = slur?;
                let target = self.record(self.map.get::<Event>(&slur.target()?, slur.pointer()));
                if let Some(end_note) = slur.end_note()? {
                    let found = match &target {
                        Some(target) => target.find_note(&end_note)?.is_some(),
                        None => false,
                    };
                    if !found {
                        self.semantic(
                            slur.pointer(),
                            format!("Slur contains end note \"{end_note}\" that does not exist in target."),
                        );
                    }
                }
                if let Some(start_note) = slur.start_note()? {
                    if event.find_note(&start_note)?.is_none() {
                        self.semantic(
                            slur.pointer(),
                            format!("Slur contains start note \"{start_note}\" that does not exist in the containing event."),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn check_ties(&mut self, note: &Note) -> Result<(), MnxError> {
        let Some(ties) = note.ties()? else {
            return Ok(());
        };
        for tie in ties.iter() {
            let tie = tie?;
            let lv = tie.lv()?;
            let Some(target) = tie.target()? else {
                if !lv {
                    self.semantic(tie.pointer(), "Tie has neither a target nor is it an lv tie.");
                }
                continue;
            };
            if lv {
                self.semantic(tie.pointer(), "Tie has both a target and is an lv tie.");
            }
            let Some(target_note) = self.record(self.map.get::<Note>(&target, tie.pointer())) else {
                continue;
            };
            let part_of = |pointer: &JsonPointer| pointer.enclosing(&["parts", "*"]);
            if part_of(target_note.pointer()) != part_of(note.pointer()) {
                self.semantic(tie.pointer(), "Tie points to a note in a different part.");
            }
            if !note.pitch()?.is_same_pitch(&target_note.pitch()?)? {
                self.semantic(tie.pointer(), "Tie points to a note with a different pitch.");
            }
        }
        Ok(())
    }

    fn check_beams(&mut self, beams: &Array<Beam>, depth: u32) -> Result<(), MnxError> {
        for beam in beams.iter() {
            let beam = beam?;
            let outcome = self.check_beam(&beam, depth);
            self.record(outcome);
        }
        Ok(())
    }

    fn check_beam(&mut self, beam: &Beam, depth: u32) -> Result<(), MnxError> {
        let events = beam.events()?;
        if events.len()? <= 1 {
            self.semantic(beam.pointer(), "Beam contains only one or fewer events.");
        }
        let mut ids = HashSet::new();
        let mut grace_beam: Option<bool> = None;
        let mut voice: Option<String> = None;
        for (index, event_id) in events.iter().enumerate() {
            let event_id = event_id?;
            if !ids.insert(event_id.clone()) {
                self.semantic(beam.pointer(), format!("Event \"{event_id}\" is duplicated in beam."));
                continue;
            }
            let referrer = events.pointer().push_index(index);
            let Some(event) = self.record(self.map.get::<Event>(&event_id, &referrer)) else {
                continue;
            };
            let is_grace = event.is_grace();
            match grace_beam {
                Some(expected) if expected != is_grace => self.semantic(
                    beam.pointer(),
                    format!("Event \"{event_id}\" attempts to beam a grace note to a non grace note."),
                ),
                Some(_) => {}
                None => grace_beam = Some(is_grace),
            }
            match event.sequence() {
                Ok(sequence) => {
                    let event_voice = sequence.voice()?.unwrap_or_default();
                    match &voice {
                        Some(expected) if *expected != event_voice => self.semantic(
                            beam.pointer(),
                            format!("Event \"{event_id}\" attempts to beam events from different voices together."),
                        ),
                        Some(_) => {}
                        None => voice = Some(event_voice),
                    }
                }
                Err(_) => self.semantic(event.pointer(), format!("Event \"{event_id}\" is not part of a sequence.")),
            }
            if let Some(duration) = event.duration()? {
                if depth > duration.calc_number_of_flags()? {
                    self.semantic(beam.pointer(), format!("Event \"{event_id}\" cannot have {depth} beams"));
                }
            }
        }
        if let Some(hooks) = beam.hooks()? {
            for hook in hooks.iter() {
                let hook = hook?;
                let event_id = hook.event()?;
                if !ids.contains(&event_id) {
                    self.semantic(beam.pointer(), format!("Hook event \"{event_id}\" is not part of the beam."));
                    continue;
                }
                let Some(event) = self.record(self.map.get::<Event>(&event_id, hook.pointer())) else {
                    continue;
                };
                if let Some(duration) = event.duration()? {
                    if depth >= duration.calc_number_of_flags()? {
                        self.semantic(
                            beam.pointer(),
                            format!("Hook event \"{event_id}\" cannot have a hook because it already has {depth} beams"),
                        );
                    }
                }
            }
        }
        if let Some(inner) = beam.inner()? {
            self.check_beams(&inner, depth + 1)?;
        }
        Ok(())
    }

    fn check_ottavas(&mut self, measure: &PartMeasure) -> Result<(), MnxError> {
        let Some(ottavas) = measure.ottavas()? else {
            return Ok(());
        };
        let this_index = measure.array_index();
        for ottava in ottavas.iter() {
            let ottava = ottava?;
            let end = ottava.end()?;
            let Some(end_measure) = self.record(self.map.measure(end.measure()?, ottava.pointer())) else {
                continue;
            };
            match this_index.cmp(&end_measure.array_index()) {
                Ordering::Greater => self.semantic(ottava.pointer(), "Ottava ends before it begins"),
                Ordering::Equal if ottava.position()?.value()? > end.position()?.value()? => {
                    self.semantic(ottava.pointer(), "Ottava ends before it begins (in the same measure)");
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_layouts(&mut self) -> Result<(), MnxError> {
        let Some(layouts) = self.document.layouts()? else {
            return Ok(());
        };
        for layout in layouts.iter() {
            let outcome = layout.and_then(|layout| self.check_layout(&layout));
            self.record(outcome);
        }
        Ok(())
    }

    fn check_layout(&mut self, layout: &Layout) -> Result<(), MnxError> {
        let layout_id = layout.id()?;
        let Some(staves) = flatten_layout_staves(&layout.content()?, self.options.dispatch)? else {
            return Ok(());
        };
        for staff in staves {
            for source in staff.sources()?.iter() {
                let source = source?;
                let part_id = source.part()?;
                let Some(part) = self.record(self.map.get::<Part>(&part_id, source.pointer())) else {
                    continue;
                };
                let staff_number = source.staff()?;
                if staff_number < 1 || staff_number > part.staves()? {
                    self.semantic(
                        source.pointer(),
                        format!("Layout \"{layout_id}\" has invalid staff number ({staff_number}) for part {part_id}"),
                    );
                }
            }
        }
        Ok(())
    }

    fn check_layout_ref(&mut self, layout_id: Option<String>, referrer: &JsonPointer) {
        if let Some(layout_id) = layout_id {
            self.record(self.map.get::<Layout>(&layout_id, referrer));
        }
    }

    fn check_scores(&mut self) -> Result<(), MnxError> {
        let Some(scores) = self.document.scores()? else {
            return Ok(());
        };
        let measure_count = self.document.global()?.measures()?.len()?;
        for score in scores.iter() {
            let score = score?;
            let name = score.name()?;
            self.check_layout_ref(score.layout()?, score.pointer());
            if let Some(rests) = score.multimeasure_rests()? {
                for rest in rests.iter() {
                    let rest = rest?;
                    let start = rest.start()?;
                    let Some(measure) = self.record(self.map.measure(start, rest.pointer())) else {
                        continue;
                    };
                    let first = measure.array_index().unwrap_or_default();
                    let span = usize::try_from(rest.duration()?).unwrap_or_default();
                    if first.saturating_add(span) > measure_count {
                        self.semantic(
                            rest.pointer(),
                            format!("Multimeasure rest at measure {start} in score \"{name}\" spans non-existent measures"),
                        );
                    }
                }
            }
            let Some(pages) = score.pages()? else {
                continue;
            };
            let mut previous: Option<usize> = None;
            let mut first_system = true;
            for page in pages.iter() {
                let page = page?;
                self.check_layout_ref(page.layout()?, page.pointer());
                for system in page.systems()?.iter() {
                    let system = system?;
                    self.check_layout_ref(system.layout()?, system.pointer());
                    let current = self
                        .record(self.map.measure(system.measure()?, system.pointer()))
                        .and_then(|measure| measure.array_index());
                    if first_system && current.is_some_and(|index| index > 0) {
                        self.semantic(
                            system.pointer(),
                            format!("The first system in score \"{name}\" starts after the first measure"),
                        );
                    }
                    first_system = false;
                    if let (Some(last), Some(index)) = (previous, current) {
                        let relation = match index.cmp(&last) {
                            Ordering::Less => Some("starts before"),
                            Ordering::Equal => Some("starts on the same measure as"),
                            Ordering::Greater => None,
                        };
                        if let Some(relation) = relation {
                            self.semantic(
                                system.pointer(),
                                format!("Score \"{name}\" contains system that {relation} previous system"),
                            );
                        }
                    }
                    previous = current;
                    if let Some(changes) = system.layout_changes()? {
                        for change in changes.iter() {
                            let change = change?;
                            self.check_layout_ref(Some(change.layout()?), change.pointer());
                            let location = change.location()?;
                            self.record(self.map.measure(location.measure()?, change.pointer()));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn quarter(id: &str, step: &str) -> Value {
        json!({"id": id, "duration": {"base": "quarter"},
               "notes": [{"id": format!("{id}n"), "pitch": {"step": step, "octave": 4}}]})
    }

    fn document(content: Value) -> Document {
        Document::from_value(json!({
            "mnx": {"version": 1},
            "global": {"measures": [{"time": {"count": 4, "unit": 4}}]},
            "parts": [{"id": "P1", "measures": [{"sequences": [{"content": content}]}]}]
        }))
        .unwrap()
    }

    fn semantic_errors(document: &Document) -> Vec<MnxError> {
        validate_semantics(document, &ValidationOptions::default())
            .error_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_exact_measure_is_clean() {
        let doc = document(json!([
            quarter("e1", "C"), quarter("e2", "D"), quarter("e3", "E"), quarter("e4", "F")
        ]));
        let errors = semantic_errors(&doc);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_shortfall_and_overflow_are_distinct() {
        let short = document(json!([quarter("e1", "C"), quarter("e2", "D"), quarter("e3", "E")]));
        let errors = semantic_errors(&short);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            MnxError::DurationMismatch {
                pointer,
                kind,
                expected,
                actual,
            } => {
                assert_eq!(pointer.as_str(), "/parts/0/measures/0/sequences/0");
                assert_eq!(*kind, DurationMismatchKind::Shortfall);
                assert_eq!(*expected, FractionValue::one());
                assert_eq!(*actual, FractionValue::new(3, 4).unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }

        let long = document(json!([
            {"duration": {"base": "whole"}, "rest": {}},
            quarter("e1", "C")
        ]));
        let errors = semantic_errors(&long);
        assert!(matches!(
            errors.as_slice(),
            [MnxError::DurationMismatch { kind: DurationMismatchKind::Overflow, .. }]
        ));
    }

    #[test]
    fn test_grace_notes_take_no_time() {
        let doc = document(json!([
            {"type": "grace", "content": [{"duration": {"base": "eighth"}, "notes": [{"pitch": {"step": "B", "octave": 3}}]}]},
            {"measure": true, "rest": {}}
        ]));
        assert!(semantic_errors(&doc).is_empty());
    }

    #[test]
    fn test_underfull_tuplet_is_reported_at_tuplet() {
        let doc = document(json!([
            {"type": "tuplet",
             "inner": {"multiple": 3, "duration": {"base": "eighth"}},
             "outer": {"multiple": 2, "duration": {"base": "eighth"}},
             "content": [quarter("t1", "C")]},
            {"duration": {"base": "half"}, "rest": {}},
            {"duration": {"base": "quarter"}, "rest": {}}
        ]));
        let errors = semantic_errors(&doc);
        let tuplet = errors
            .iter()
            .find(|err| err.pointer().map(JsonPointer::as_str) == Some("/parts/0/measures/0/sequences/0/content/0"));
        assert!(
            matches!(tuplet, Some(MnxError::DurationMismatch { kind: DurationMismatchKind::Shortfall, .. })),
            "{errors:?}"
        );
    }

    #[test]
    fn test_event_shape_rules() {
        let doc = document(json!([
            {"id": "both", "measure": true, "duration": {"base": "whole"}, "rest": {}},
            {"id": "empty", "duration": {"base": "quarter"}}
        ]));
        let messages: Vec<String> = semantic_errors(&doc).iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("has both full measure indicator and duration")));
        assert!(messages.iter().any(|m| m.contains("is neither a rest nor has notes")));
        assert!(!messages.iter().any(|m| m.starts_with("Duration")));
    }

    #[test]
    fn test_tie_target_must_resolve() {
        let mut first = quarter("e1", "C");
        first["notes"][0]["ties"] = json!([{"target": "missing"}]);
        let doc = document(json!([first, quarter("e2", "C"), quarter("e3", "C"), quarter("e4", "C")]));
        let errors = semantic_errors(&doc);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            MnxError::DanglingReference { pointer, id, .. }
                if pointer.as_str() == "/parts/0/measures/0/sequences/0/content/0/notes/0/ties/0" && id == "missing"
        ));
    }

    #[test]
    fn test_reference_errors_do_not_hide_rhythm() {
        let mut first = quarter("e1", "C");
        first["notes"][0]["ties"] = json!([{"target": "missing"}]);
        let doc = document(json!([first, quarter("e2", "C"), quarter("e3", "C")]));
        let errors = semantic_errors(&doc);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(matches!(&errors[0], MnxError::DanglingReference { id, .. } if id == "missing"));
        assert!(matches!(
            &errors[1],
            MnxError::DurationMismatch { kind: DurationMismatchKind::Shortfall, .. }
        ));
    }

    #[test]
    fn test_tie_pitch_must_match() {
        let mut first = quarter("e1", "C");
        first["notes"][0]["ties"] = json!([{"target": "e2n"}]);
        let doc = document(json!([first, quarter("e2", "D"), quarter("e3", "C"), quarter("e4", "C")]));
        let messages: Vec<String> = semantic_errors(&doc).iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("different pitch"));
    }

    #[test]
    fn test_duplicate_voice_in_measure() {
        let doc = Document::from_value(json!({
            "mnx": {"version": 1},
            "global": {"measures": [{"time": {"count": 1, "unit": 4}}]},
            "parts": [{"measures": [{"sequences": [
                {"content": [quarter("a", "C")]},
                {"content": [quarter("b", "C")]}
            ]}]}]
        }))
        .unwrap();
        let errors = semantic_errors(&doc);
        assert!(matches!(
            errors.as_slice(),
            [MnxError::DuplicateId { kind, .. }] if kind == "voice"
        ));
    }

    #[test]
    fn test_beam_rules() {
        let mut doc_value = json!({
            "mnx": {"version": 1},
            "global": {"measures": [{"time": {"count": 1, "unit": 4}}]},
            "parts": [{"measures": [{"sequences": [{"content": [
                {"id": "a", "duration": {"base": "eighth"}, "notes": [{"pitch": {"step": "C", "octave": 4}}]},
                {"id": "b", "duration": {"base": "eighth"}, "notes": [{"pitch": {"step": "D", "octave": 4}}]}
            ]}]}]}]
        });
        doc_value["parts"][0]["measures"][0]["beams"] = json!([
            {"events": ["a", "b"], "inner": [{"events": ["a", "b"]}]}
        ]);
        let doc = Document::from_value(doc_value).unwrap();
        let messages: Vec<String> = semantic_errors(&doc).iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages.iter().all(|m| m.contains("cannot have 2 beams")));
    }

    #[test]
    fn test_score_systems_ascend() {
        let doc = Document::from_value(json!({
            "mnx": {"version": 1},
            "global": {"measures": [{}, {}]},
            "parts": [],
            "scores": [{"name": "Full", "layout": "nowhere", "pages": [{"systems": [
                {"measure": 2}, {"measure": 1}
            ]}]}]
        }))
        .unwrap();
        let errors = semantic_errors(&doc);
        assert!(matches!(errors[0], MnxError::DanglingReference { .. }));
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("starts after the first measure")));
        assert!(messages.iter().any(|m| m.contains("starts before previous system")));
    }
}
