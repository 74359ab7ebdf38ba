//! Identity and cross-reference resolution.
//!
//! An [`EntityMap`] indexes every identifiable element of a document (parts, events,
//! notes, layouts, global measures) so that references such as tie targets and slur
//! targets can be resolved to typed views. IDs are unique per entity kind. The map is
//! an explicit value built from a document; nothing is cached globally, and a map goes
//! stale as soon as the document is edited.
//!
//! Building the map also derives two per-event facts: which top-level beam an event
//! belongs to (with the shallowest beam level starting at it) and the octave shift in
//! force from ottava lines.

use crate::base::{Node, SharedJson, View};
use crate::content::DispatchMode;
use crate::document::Document;
use crate::error::MnxError;
use crate::fraction::FractionValue;
use crate::global::GlobalMeasure;
use crate::layout::Layout;
use crate::part::{Beam, Ottava, Part};
use crate::pointer::JsonPointer;
use crate::sequence::{ContentArray, ContentItem, Event, Grace, Note, Sequence};
use crate::walker::{walk_sequence, SequenceVisitor, WalkControl, WalkOptions, WalkStep};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;

/// The kinds of element an [`EntityMap`] indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Part,
    Event,
    Note,
    Layout,
    GlobalMeasure,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Part => "part",
            Self::Event => "event",
            Self::Note => "note",
            Self::Layout => "layout",
            Self::GlobalMeasure => "global measure",
        };
        write!(f, "{name}")
    }
}

/// A view type that can be looked up by ID.
pub trait Entity: View {
    const KIND: EntityKind;
}

impl Entity for Part {
    const KIND: EntityKind = EntityKind::Part;
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;
}

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;
}

impl Entity for Layout {
    const KIND: EntityKind = EntityKind::Layout;
}

/// A staff number (1-based) and voice label (empty for the default voice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StaffKey {
    pub staff: i64,
    pub voice: String,
}

impl StaffKey {
    #[must_use]
    pub fn new(staff: i64, voice: impl Into<String>) -> Self {
        Self {
            staff,
            voice: voice.into(),
        }
    }
}

impl Display for StaffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.voice.is_empty() {
            write!(f, "staff {}", self.staff)
        } else {
            write!(f, "staff {} voice \"{}\"", self.staff, self.voice)
        }
    }
}

/// How ottava lines are matched to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityMapPolicies {
    /// Honor `graceIndex` on ottava endpoints. When false, grace notes share the fate of
    /// the event they lead into.
    pub ottavas_respect_grace_targets: bool,
    /// Honor an ottava's `voice`. When false, an ottava applies to every voice on its staff.
    pub ottavas_respect_voice_targets: bool,
}

impl Default for EntityMapPolicies {
    fn default() -> Self {
        Self {
            ottavas_respect_grace_targets: true,
            ottavas_respect_voice_targets: true,
        }
    }
}

/// Beam membership of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeamEntry {
    /// The top-level beam containing the event.
    pub beam: JsonPointer,
    /// The shallowest beam level (1 = primary) starting at this event, or 0 if none does.
    pub start_level: usize,
}

/// ID index of one document.
#[derive(Debug, Clone)]
pub struct EntityMap {
    root: SharedJson,
    objects: HashMap<(EntityKind, String), JsonPointer>,
    measures: HashMap<i64, JsonPointer>,
    beams: HashMap<String, BeamEntry>,
    ottava_shifts: HashMap<JsonPointer, i64>,
}

impl EntityMap {
    /// An empty map over `root`.
    #[must_use]
    pub fn new(root: SharedJson) -> Self {
        Self {
            root,
            objects: HashMap::new(),
            measures: HashMap::new(),
            beams: HashMap::new(),
            ottava_shifts: HashMap::new(),
        }
    }

    /// Indexes `document` with default policies and strict dispatch.
    ///
    /// # Errors
    /// The first problem found: `DuplicateId`, an unrecognized content type, or a
    /// malformed node.
    pub fn build(document: &Document) -> Result<Self, MnxError> {
        let mut errors = Vec::new();
        let map = Self::build_with(document, DispatchMode::Strict, EntityMapPolicies::default(), &mut errors);
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(map),
        }
    }

    /// Indexes `document`, recording every problem in `errors` and keeping the first
    /// occurrence of each duplicated ID.
    pub fn build_with(
        document: &Document,
        mode: DispatchMode,
        policies: EntityMapPolicies,
        errors: &mut Vec<MnxError>,
    ) -> Self {
        let mut builder = Builder {
            map: Self::new(Rc::clone(document.node().root())),
            mode,
            policies,
            errors,
        };
        builder.index_document(document);
        debug!(
            "indexed {} entities, {} measures, {} beamed events",
            builder.map.objects.len(),
            builder.map.measures.len(),
            builder.map.beams.len()
        );
        builder.map
    }

    /// Registers `id` for an element of `kind` at `pointer`.
    ///
    /// # Errors
    /// `DuplicateId` if the ID is already taken for that kind; the map is unchanged.
    pub fn insert(&mut self, kind: EntityKind, id: &str, pointer: &JsonPointer) -> Result<(), MnxError> {
        let key = (kind, id.to_string());
        if let Some(existing) = self.objects.get(&key) {
            return Err(MnxError::DuplicateId {
                pointer: pointer.clone(),
                id: id.to_string(),
                kind: kind.to_string(),
                existing: existing.clone(),
            });
        }
        self.objects.insert(key, pointer.clone());
        Ok(())
    }

    /// Registers a global measure under its computed index.
    ///
    /// # Errors
    /// `DuplicateId` if another measure has the same index.
    pub fn insert_measure(&mut self, index: i64, pointer: &JsonPointer) -> Result<(), MnxError> {
        if let Some(existing) = self.measures.get(&index) {
            return Err(MnxError::DuplicateId {
                pointer: pointer.clone(),
                id: index.to_string(),
                kind: EntityKind::GlobalMeasure.to_string(),
                existing: existing.clone(),
            });
        }
        self.measures.insert(index, pointer.clone());
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.objects.contains_key(&(kind, id.to_string()))
    }

    /// Number of indexed ID-bearing elements, not counting measures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Looks up `id` as a `T`.
    ///
    /// # Errors
    /// Fails only if the indexed node no longer binds as `T`.
    pub fn try_get<T: Entity>(&self, id: &str) -> Result<Option<T>, MnxError> {
        match self.objects.get(&(T::KIND, id.to_string())) {
            Some(pointer) => T::bind(Node::new(Rc::clone(&self.root), pointer.clone())).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves a reference to `id` made at `referrer`.
    ///
    /// # Errors
    /// `DanglingReference` at `referrer` if no `T` has that ID.
    pub fn get<T: Entity>(&self, id: &str, referrer: &JsonPointer) -> Result<T, MnxError> {
        self.try_get(id)?.ok_or_else(|| MnxError::DanglingReference {
            pointer: referrer.clone(),
            id: id.to_string(),
            expected: T::KIND.to_string(),
        })
    }

    /// The global measure with computed index `index`.
    ///
    /// # Errors
    /// `DanglingReference` at `referrer` if there is no such measure.
    pub fn measure(&self, index: i64, referrer: &JsonPointer) -> Result<GlobalMeasure, MnxError> {
        match self.measures.get(&index) {
            Some(pointer) => GlobalMeasure::bind(Node::new(Rc::clone(&self.root), pointer.clone())),
            None => Err(MnxError::DanglingReference {
                pointer: referrer.clone(),
                id: index.to_string(),
                expected: EntityKind::GlobalMeasure.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn has_measure(&self, index: i64) -> bool {
        self.measures.contains_key(&index)
    }

    /// Beam membership of the event with `event_id`.
    #[must_use]
    pub fn event_beam(&self, event_id: &str) -> Option<&BeamEntry> {
        self.beams.get(event_id)
    }

    /// The top-level beam containing `event_id`.
    ///
    /// # Errors
    /// Fails if the beam node has been removed since the map was built.
    pub fn beam_for_event(&self, event_id: &str) -> Result<Option<Beam>, MnxError> {
        self.beams
            .get(event_id)
            .map(|entry| Beam::bind(Node::new(Rc::clone(&self.root), entry.beam.clone())))
            .transpose()
    }

    /// The shallowest beam level starting at `event_id`, 0 if none.
    #[must_use]
    pub fn beam_start_level(&self, event_id: &str) -> usize {
        self.beams.get(event_id).map_or(0, |entry| entry.start_level)
    }

    /// Octaves to add to the written pitch of `event`'s notes to get the sounding pitch:
    /// the negated sum of every ottava covering the event.
    #[must_use]
    pub fn ottava_shift(&self, event: &Event) -> i64 {
        self.ottava_shifts.get(event.pointer()).copied().unwrap_or(0)
    }
}

struct Builder<'a> {
    map: EntityMap,
    mode: DispatchMode,
    policies: EntityMapPolicies,
    errors: &'a mut Vec<MnxError>,
}

impl Builder<'_> {
    fn record<T>(&mut self, result: Result<T, MnxError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{err}");
                self.errors.push(err);
                None
            }
        }
    }

    fn index_document(&mut self, document: &Document) {
        let indices = self.index_global(document).unwrap_or_default();
        if let Some(Some(layouts)) = self.record(document.layouts()) {
            for layout in layouts.iter() {
                let Some(layout) = self.record(layout) else {
                    continue;
                };
                if let Some(id) = self.record(layout.id()) {
                    let result = self.map.insert(EntityKind::Layout, &id, layout.pointer());
                    self.record(result);
                }
            }
        }
        let Some(parts) = self.record(document.parts()) else {
            return;
        };
        for part in parts.iter() {
            if let Some(part) = self.record(part) {
                self.index_part(&part, &indices);
            }
        }
    }

    /// Indexes global measures, returning their computed indices in array order.
    fn index_global(&mut self, document: &Document) -> Option<Vec<i64>> {
        let measures = self.record(document.global().and_then(|global| global.measures()))?;
        let mut indices = Vec::new();
        let mut previous: i64 = 0;
        for measure in measures.iter() {
            // A broken measure still occupies its slot so later positions stay aligned.
            let index = match self.record(measure) {
                Some(measure) => {
                    let index = self.record(measure.index()).flatten().unwrap_or(previous.saturating_add(1));
                    let result = self.map.insert_measure(index, measure.pointer());
                    self.record(result);
                    index
                }
                None => previous.saturating_add(1),
            };
            indices.push(index);
            previous = index;
        }
        Some(indices)
    }

    fn index_part(&mut self, part: &Part, indices: &[i64]) {
        if let Some(Some(id)) = self.record(part.id()) {
            let result = self.map.insert(EntityKind::Part, &id, part.pointer());
            self.record(result);
        }
        let Some(Some(measures)) = self.record(part.measures()) else {
            return;
        };
        let mut ottavas = Vec::new();
        let mut placed_sequences = Vec::new();
        for (position, measure) in measures.iter().enumerate() {
            let Some(measure) = self.record(measure) else {
                continue;
            };
            if let Some(sequences) = self.record(measure.sequences()) {
                for sequence in sequences.iter() {
                    if let Some(sequence) = self.record(sequence) {
                        if let Some(content) = self.record(sequence.content()) {
                            self.index_content(&content);
                        }
                        if let Some(&index) = indices.get(position) {
                            placed_sequences.push((sequence, index));
                        }
                    }
                }
            }
            if let Some(Some(beams)) = self.record(measure.beams()) {
                for beam in beams.iter() {
                    if let Some(beam) = self.record(beam) {
                        self.index_beam(&beam);
                    }
                }
            }
            if let (Some(&index), Some(Some(list))) = (indices.get(position), self.record(measure.ottavas())) {
                for ottava in list.iter() {
                    let span = self.record(ottava.and_then(|ottava| OttavaSpan::read(&ottava, index)));
                    ottavas.extend(span);
                }
            }
        }
        if ottavas.is_empty() {
            return;
        }
        let mut placed = Vec::new();
        for (sequence, index) in &placed_sequences {
            placed.extend(self.place_events(sequence, *index));
        }
        for event in &placed {
            let shift: i64 = ottavas
                .iter()
                .filter(|span| span.covers(event, self.policies))
                .map(|span| span.shift)
                .sum();
            if shift != 0 {
                self.map.ottava_shifts.insert(event.pointer.clone(), shift);
            }
        }
    }

    fn index_content(&mut self, content: &ContentArray) {
        for item in content.iter(self.mode) {
            let Some(item) = self.record(item) else {
                continue;
            };
            let nested = match &item {
                ContentItem::Event(event) => {
                    self.index_event(event);
                    None
                }
                ContentItem::Grace(grace) => Some(grace.content()),
                ContentItem::Tuplet(tuplet) => Some(tuplet.content()),
                ContentItem::MultiNoteTremolo(tremolo) => Some(tremolo.content()),
                ContentItem::Space(_) | ContentItem::Unknown(_) => None,
            };
            if let Some(Some(nested)) = nested.map(|content| self.record(content)) {
                self.index_content(&nested);
            }
        }
    }

    fn index_event(&mut self, event: &Event) {
        if let Some(Some(id)) = self.record(event.id()) {
            let result = self.map.insert(EntityKind::Event, &id, event.pointer());
            self.record(result);
        }
        let Some(Some(notes)) = self.record(event.notes()) else {
            return;
        };
        for note in notes.iter() {
            let Some(note) = self.record(note) else {
                continue;
            };
            if let Some(Some(id)) = self.record(note.id()) {
                let result = self.map.insert(EntityKind::Note, &id, note.pointer());
                self.record(result);
            }
        }
    }

    fn index_beam(&mut self, beam: &Beam) {
        let Some(events) = self.record(beam.events().and_then(|events| events.to_vec())) else {
            return;
        };
        for event_id in &events {
            if let Some(existing) = self.map.beams.get(event_id) {
                let err = MnxError::DuplicateId {
                    pointer: beam.pointer().push("events"),
                    id: event_id.clone(),
                    kind: "beam".to_string(),
                    existing: existing.beam.clone(),
                };
                self.record::<()>(Err(err));
                continue;
            }
            self.map.beams.insert(
                event_id.clone(),
                BeamEntry {
                    beam: beam.pointer().clone(),
                    start_level: 0,
                },
            );
        }
        self.mark_beam_starts(beam, 1);
    }

    fn mark_beam_starts(&mut self, beam: &Beam, level: usize) {
        if let Some(Some(first)) = self.record(beam.events().and_then(|events| events.iter().next().transpose())) {
            match self.map.beams.get_mut(&first) {
                Some(entry) if entry.start_level == 0 => entry.start_level = level,
                Some(entry) => entry.start_level = entry.start_level.min(level),
                None => {
                    let err = MnxError::semantic(
                        &beam.pointer().push("events"),
                        format!("event \"{first}\" is not part of its enclosing beam"),
                    );
                    self.record::<()>(Err(err));
                }
            }
        }
        if let Some(Some(inner)) = self.record(beam.inner()) {
            for child in inner.iter() {
                if let Some(child) = self.record(child) {
                    self.mark_beam_starts(&child, level + 1);
                }
            }
        }
    }

    fn place_events(&mut self, sequence: &Sequence, measure: i64) -> Vec<PlacedEvent> {
        let Some(key) = self.record(sequence.staff_key()) else {
            return Vec::new();
        };
        let mut placer = EventPlacer {
            measure,
            key,
            placed: Vec::new(),
            grace_start: None,
            failure: None,
        };
        let outcome = walk_sequence(sequence, &mut placer, WalkOptions::with_dispatch(self.mode));
        if let Some(err) = outcome.error.or(placer.failure.take()) {
            self.record::<()>(Err(err));
        }
        placer.placed
    }
}

/// An event located in time for ottava matching.
#[derive(Debug)]
struct PlacedEvent {
    pointer: JsonPointer,
    measure: i64,
    position: FractionValue,
    /// 0 for a main event; for grace notes, how many grace notes back from the main event.
    grace_rank: u32,
    staff: i64,
    voice: String,
}

impl PlacedEvent {
    fn time_key(&self, respect_grace: bool) -> (i64, FractionValue, i64) {
        let rank = if respect_grace { i64::from(self.grace_rank) } else { 0 };
        (self.measure, self.position, -rank)
    }
}

struct EventPlacer {
    measure: i64,
    key: StaffKey,
    placed: Vec<PlacedEvent>,
    grace_start: Option<usize>,
    failure: Option<MnxError>,
}

impl SequenceVisitor for EventPlacer {
    fn enter_event(&mut self, event: &Event, step: &WalkStep) -> WalkControl {
        let staff = match event.staff() {
            Ok(staff) => staff.unwrap_or(self.key.staff),
            Err(err) => {
                self.failure = Some(err);
                return WalkControl::Stop;
            }
        };
        self.placed.push(PlacedEvent {
            pointer: event.pointer().clone(),
            measure: self.measure,
            position: step.start,
            grace_rank: 0,
            staff,
            voice: self.key.voice.clone(),
        });
        WalkControl::Continue
    }

    fn enter_grace(&mut self, _grace: &Grace, _step: &WalkStep) -> WalkControl {
        self.grace_start = Some(self.placed.len());
        WalkControl::Continue
    }

    fn leave_grace(&mut self, _grace: &Grace, _step: &WalkStep) -> WalkControl {
        if let Some(start) = self.grace_start.take() {
            let graces = &mut self.placed[start..];
            let count = graces.len();
            for (offset, event) in graces.iter_mut().enumerate() {
                event.grace_rank = u32::try_from(count - offset).unwrap_or(u32::MAX);
            }
        }
        WalkControl::Continue
    }
}

/// One ottava line resolved to absolute endpoints.
#[derive(Debug)]
struct OttavaSpan {
    start: (i64, FractionValue, i64),
    end: (i64, FractionValue, i64),
    staff: i64,
    voice: Option<String>,
    shift: i64,
}

impl OttavaSpan {
    fn read(ottava: &Ottava, measure: i64) -> Result<Self, MnxError> {
        let position = ottava.position()?;
        let end = ottava.end()?;
        let end_position = end.position()?;
        Ok(Self {
            start: (
                measure,
                position.value()?,
                -i64::from(position.grace_index()?.unwrap_or(0)),
            ),
            end: (
                end.measure()?,
                end_position.value()?,
                -i64::from(end_position.grace_index()?.unwrap_or(0)),
            ),
            staff: ottava.staff()?.unwrap_or(1),
            voice: ottava.voice()?,
            shift: -ottava.value()?.value(),
        })
    }

    fn covers(&self, event: &PlacedEvent, policies: EntityMapPolicies) -> bool {
        if event.staff != self.staff {
            return false;
        }
        if policies.ottavas_respect_voice_targets {
            if let Some(voice) = &self.voice {
                if *voice != event.voice {
                    return false;
                }
            }
        }
        let respect_grace = policies.ottavas_respect_grace_targets;
        let (start, end) = if respect_grace {
            (self.start, self.end)
        } else {
            ((self.start.0, self.start.1, 0), (self.end.0, self.end.1, 0))
        };
        let key = event.time_key(respect_grace);
        start <= key && key <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn base(sequences: serde_json::Value) -> serde_json::Value {
        json!({
            "mnx": {"version": 1},
            "global": {"measures": [{"time": {"count": 4, "unit": 4}}]},
            "parts": [{"id": "P1", "measures": [{"sequences": sequences}]}]
        })
    }

    fn quarter(id: &str) -> serde_json::Value {
        json!({"type": "event", "id": id, "duration": {"base": "quarter"},
               "notes": [{"id": format!("{id}n"), "pitch": {"step": "C", "octave": 4}}]})
    }

    #[test]
    fn test_lookup_by_kind() {
        let document = doc(base(json!([{"content": [quarter("e1")]}])));
        let map = EntityMap::build(&document).unwrap();
        let event: Event = map.get("e1", &JsonPointer::root()).unwrap();
        assert_eq!(event.pointer().as_str(), "/parts/0/measures/0/sequences/0/content/0");
        let note: Note = map.get("e1n", &JsonPointer::root()).unwrap();
        assert_eq!(note.event().unwrap(), event);
        assert!(map.try_get::<Note>("e1").unwrap().is_none());
        assert!(map.contains(EntityKind::Part, "P1"));
    }

    #[test]
    fn test_dangling_reference_names_referrer() {
        let document = doc(base(json!([{"content": [quarter("e1")]}])));
        let map = EntityMap::build(&document).unwrap();
        let referrer = JsonPointer::parse("/parts/0/measures/0/sequences/0/content/0/slurs/0").unwrap();
        let err = map.get::<Event>("missing", &referrer).unwrap_err();
        assert!(matches!(err, MnxError::DanglingReference { ref pointer, .. } if *pointer == referrer));
    }

    #[test]
    fn test_duplicate_insert_leaves_map_unchanged() {
        let document = doc(base(json!([{"content": []}])));
        let mut map = EntityMap::new(Rc::clone(document.node().root()));
        let first = JsonPointer::parse("/a").unwrap();
        let second = JsonPointer::parse("/b").unwrap();
        map.insert(EntityKind::Note, "n1", &first).unwrap();
        let err = map.insert(EntityKind::Note, "n1", &second).unwrap_err();
        assert!(matches!(err, MnxError::DuplicateId { ref existing, .. } if *existing == first));
        assert_eq!(map.len(), 1);
        map.insert(EntityKind::Event, "n1", &second).unwrap();
    }

    #[test]
    fn test_measure_indices_continue_from_explicit() {
        let document = doc(json!({
            "mnx": {"version": 1},
            "global": {"measures": [{"index": 5}, {}, {"index": 1}]},
            "parts": []
        }));
        let map = EntityMap::build(&document).unwrap();
        assert!(map.has_measure(5));
        assert!(map.has_measure(6));
        assert!(map.has_measure(1));
        assert!(map.measure(2, &JsonPointer::root()).is_err());
    }

    #[test]
    fn test_bad_measure_index_keeps_later_measures() {
        let document = doc(json!({
            "mnx": {"version": 1},
            "global": {"measures": [{}, {"index": "two"}, {}, 7]},
            "parts": []
        }));
        let mut errors = Vec::new();
        let map = EntityMap::build_with(
            &document,
            DispatchMode::Strict,
            EntityMapPolicies::default(),
            &mut errors,
        );
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], MnxError::TypeMismatch { ref pointer, .. }
            if pointer.as_str() == "/global/measures/1/index"));
        assert!(map.has_measure(1));
        assert!(map.has_measure(2));
        assert!(map.has_measure(3));
        assert!(!map.has_measure(4));
    }

    #[test]
    fn test_beam_start_levels_take_minimum() {
        let mut value = base(json!([{"content": [
            quarter("a"), quarter("b"), quarter("c"), quarter("d")
        ]}]));
        value["parts"][0]["measures"][0]["beams"] = json!([{
            "events": ["a", "b", "c", "d"],
            "inner": [
                {"events": ["a", "b"]},
                {"events": ["c", "d"], "inner": [{"events": ["c"]}]}
            ]
        }]);
        let map = EntityMap::build(&doc(value)).unwrap();
        assert_eq!(map.beam_start_level("a"), 1);
        assert_eq!(map.beam_start_level("b"), 0);
        assert_eq!(map.beam_start_level("c"), 2);
        assert_eq!(map.beam_start_level("d"), 0);
        assert_eq!(
            map.event_beam("d").unwrap().beam.as_str(),
            "/parts/0/measures/0/beams/0"
        );
    }

    #[test]
    fn test_event_in_two_beams_is_duplicate() {
        let mut value = base(json!([{"content": [quarter("a"), quarter("b")]}]));
        value["parts"][0]["measures"][0]["beams"] = json!([
            {"events": ["a", "b"]},
            {"events": ["b"]}
        ]);
        let err = EntityMap::build(&doc(value)).unwrap_err();
        assert!(matches!(err, MnxError::DuplicateId { ref id, .. } if id == "b"));
    }

    #[test]
    fn test_ottava_shift_respects_staff_and_voice() {
        let mut value = base(json!([
            {"voice": "upper", "content": [quarter("u1"), quarter("u2"), quarter("u3"), quarter("u4")]},
            {"voice": "lower", "content": [quarter("l1"), quarter("l2"), quarter("l3"), quarter("l4")]},
            {"staff": 2, "content": [quarter("s1"), quarter("s2"), quarter("s3"), quarter("s4")]}
        ]));
        value["parts"][0]["staves"] = json!(2);
        value["parts"][0]["measures"][0]["ottavas"] = json!([
            {"value": 1, "position": {"fraction": [1, 4]},
             "end": {"measure": 1, "position": {"fraction": [1, 2]}}},
            {"value": 2, "voice": "upper", "position": {"fraction": [1, 2]},
             "end": {"measure": 1, "position": {"fraction": [3, 4]}}}
        ]);
        let document = doc(value);
        let map = EntityMap::build(&document).unwrap();
        let shift = |id: &str| map.ottava_shift(&map.get::<Event>(id, &JsonPointer::root()).unwrap());
        assert_eq!(shift("u1"), 0);
        assert_eq!(shift("u2"), -1);
        assert_eq!(shift("u3"), -3);
        assert_eq!(shift("u4"), -2);
        assert_eq!(shift("l3"), -1);
        assert_eq!(shift("l4"), 0);
        assert_eq!(shift("s2"), 0);

        let mut errors = Vec::new();
        let policies = EntityMapPolicies {
            ottavas_respect_voice_targets: false,
            ..EntityMapPolicies::default()
        };
        let map = EntityMap::build_with(&document, DispatchMode::Strict, policies, &mut errors);
        assert!(errors.is_empty());
        let l4 = map.get::<Event>("l4", &JsonPointer::root()).unwrap();
        assert_eq!(map.ottava_shift(&l4), -2);
    }

    #[test]
    fn test_ottava_start_excludes_leading_graces() {
        let mut value = base(json!([{"content": [
            quarter("m1"),
            {"type": "grace", "content": [
                {"type": "event", "id": "g1", "duration": {"base": "eighth"}},
                {"type": "event", "id": "g2", "duration": {"base": "eighth"}}
            ]},
            quarter("m2"), {"type": "event", "id": "m3", "duration": {"base": "half"}}
        ]}]));
        value["parts"][0]["measures"][0]["ottavas"] = json!([
            {"value": -1, "position": {"fraction": [1, 4]},
             "end": {"measure": 1, "position": {"fraction": [1, 2]}}}
        ]);
        let document = doc(value.clone());
        let map = EntityMap::build(&document).unwrap();
        let shift = |map: &EntityMap, id: &str| map.ottava_shift(&map.get::<Event>(id, &JsonPointer::root()).unwrap());
        assert_eq!(shift(&map, "g1"), 0);
        assert_eq!(shift(&map, "g2"), 0);
        assert_eq!(shift(&map, "m2"), 1);
        assert_eq!(shift(&map, "m3"), 1);

        value["parts"][0]["measures"][0]["ottavas"][0]["position"]["graceIndex"] = json!(1);
        let map = EntityMap::build(&doc(value)).unwrap();
        assert_eq!(shift(&map, "g1"), 0);
        assert_eq!(shift(&map, "g2"), 1);

        let mut errors = Vec::new();
        let policies = EntityMapPolicies {
            ottavas_respect_grace_targets: false,
            ..EntityMapPolicies::default()
        };
        let map = EntityMap::build_with(&document, DispatchMode::Strict, policies, &mut errors);
        assert_eq!(shift(&map, "g1"), 1);
    }
}
