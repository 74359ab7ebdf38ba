use mnx_dom::common::{NoteValueFields, NoteValueQuantityFields, TimeSignature};
use mnx_dom::enums::{NoteValueBase, TimeSignatureUnit};
use mnx_dom::sequence::{ContentItem, Event, Sequence, Tuplet};
use mnx_dom::{
    for_each_event, walk_sequence, DispatchMode, Document, FractionValue, MnxError, Phase, SequenceVisitor,
    SequenceWalker, ValidationOptions, View, WalkControl, WalkOptions, WalkState, WalkStep, MAX_TUPLET_DEPTH,
};
use serde_json::json;

fn frac(numerator: i64, denominator: i64) -> FractionValue {
    FractionValue::new(numerator, denominator).unwrap()
}

fn note(base: NoteValueBase) -> NoteValueFields {
    NoteValueFields::new(base, 0)
}

fn quantity(multiple: u32, base: NoteValueBase) -> NoteValueQuantityFields {
    NoteValueQuantityFields::new(multiple, base, 0)
}

/// A one-measure, one-part document in `count`/4 with an empty sequence.
fn single_sequence(count: i64) -> (Document, Sequence) {
    let doc = Document::new();
    let measure = doc.global().unwrap().measures().unwrap().append().unwrap();
    TimeSignature::create(measure.node(), "time", count, TimeSignatureUnit::Quarter).unwrap();
    let part = doc.parts().unwrap().append().unwrap();
    part.set_id("P1").unwrap();
    let part_measure = part.ensure_measures().unwrap().append().unwrap();
    let sequence = part_measure.create_sequences().unwrap().append().unwrap();
    sequence.create_content().unwrap();
    (doc, sequence)
}

/// Three quarters in the time of two.
fn triplet_sequence() -> (Document, Sequence) {
    let (doc, sequence) = single_sequence(2);
    let tuplet = sequence
        .content()
        .unwrap()
        .append_tuplet(quantity(3, NoteValueBase::Quarter), quantity(2, NoteValueBase::Quarter))
        .unwrap();
    let inner = tuplet.content().unwrap();
    for _ in 0..3 {
        inner.append_event(Some(note(NoteValueBase::Quarter))).unwrap();
    }
    (doc, sequence)
}

fn event_starts(sequence: &Sequence) -> Vec<FractionValue> {
    let mut starts = Vec::new();
    let outcome = for_each_event(sequence, WalkOptions::default(), |_, step| {
        starts.push(step.start);
        WalkControl::Continue
    });
    assert!(outcome.completed(), "{:?}", outcome.error);
    starts
}

#[test]
fn test_tuplet_children_fill_outer_duration() {
    let (_doc, sequence) = triplet_sequence();
    let mut durations = Vec::new();
    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, step| {
        durations.push(step.duration);
        assert_eq!(step.depth, 1);
        assert_eq!(step.scale, frac(2, 3));
        WalkControl::Continue
    });
    assert_eq!(durations, vec![frac(1, 6); 3]);
    let total = durations.into_iter().fold(FractionValue::zero(), |sum, d| sum + d);
    assert_eq!(total, frac(1, 2));
    assert_eq!(outcome.into_result().unwrap(), frac(1, 2));
    assert_eq!(event_starts(&sequence), vec![frac(0, 1), frac(1, 6), frac(1, 3)]);
}

#[test]
fn test_tuplet_leave_step_reports_end() {
    let (_doc, sequence) = triplet_sequence();
    let steps: Vec<WalkStep> = SequenceWalker::new(sequence, WalkOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(steps.len(), 8);
    let leave = steps.last().unwrap();
    assert_eq!(leave.phase, Phase::Leave);
    assert!(matches!(leave.item, ContentItem::Tuplet(_)));
    assert_eq!(leave.start, frac(0, 1));
    assert_eq!(leave.position, frac(1, 2));
    assert_eq!(leave.duration, frac(1, 2));
}

#[test]
fn test_walk_is_repeatable() {
    let (_doc, sequence) = triplet_sequence();
    let first: Vec<WalkStep> = SequenceWalker::new(sequence.clone(), WalkOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    let second: Vec<WalkStep> = SequenceWalker::new(sequence, WalkOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_walker_state_tracks_nesting() {
    let (_doc, sequence) = triplet_sequence();
    let mut walker = SequenceWalker::new(sequence, WalkOptions::default());
    assert_eq!(walker.state(), WalkState::AtMeasureStart);
    let tuplet = walker.next().unwrap().unwrap();
    assert!(matches!(tuplet.item, ContentItem::Tuplet(_)));
    walker.next().unwrap().unwrap();
    assert_eq!(
        walker.state(),
        WalkState::InTuplet {
            position: frac(0, 1),
            scale: frac(2, 3),
            depth: 1
        }
    );
    for step in walker.by_ref() {
        step.unwrap();
    }
    assert_eq!(walker.state(), WalkState::Done);
    assert_eq!(walker.position(), frac(1, 2));
}

#[test]
fn test_grace_notes_take_no_time() {
    let (_doc, sequence) = single_sequence(1);
    let content = sequence.content().unwrap();
    let grace = content.append_grace().unwrap();
    let grace_content = grace.content().unwrap();
    grace_content.append_event(Some(note(NoteValueBase::Eighth))).unwrap();
    grace_content.append_event(Some(note(NoteValueBase::Eighth))).unwrap();
    content.append_event(Some(note(NoteValueBase::Quarter))).unwrap();

    let mut seen = Vec::new();
    let outcome = for_each_event(&sequence, WalkOptions::default(), |event, step| {
        seen.push((event.is_grace(), step.in_grace, step.start, step.duration));
        WalkControl::Continue
    });
    let zero = FractionValue::zero();
    assert_eq!(
        seen,
        vec![
            (true, true, zero, zero),
            (true, true, zero, zero),
            (false, false, zero, frac(1, 4)),
        ]
    );
    assert_eq!(outcome.end_position, frac(1, 4));
}

#[test]
fn test_full_measure_event_uses_time_signature() {
    let (_doc, sequence) = single_sequence(3);
    sequence.content().unwrap().append_event(None).unwrap();
    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, _| WalkControl::Continue);
    assert_eq!(outcome.into_result().unwrap(), frac(3, 4));

    let options = WalkOptions {
        full_measure: Some(frac(5, 8)),
        ..WalkOptions::default()
    };
    let outcome = for_each_event(&sequence, options, |_, _| WalkControl::Continue);
    assert_eq!(outcome.into_result().unwrap(), frac(5, 8));
}

#[test]
fn test_tremolo_children_take_no_time() {
    let (_doc, sequence) = single_sequence(2);
    let tremolo = sequence
        .content()
        .unwrap()
        .append_tremolo(3, quantity(2, NoteValueBase::Quarter))
        .unwrap();
    let inner = tremolo.content().unwrap();
    inner.append_event(Some(note(NoteValueBase::Quarter))).unwrap();
    inner.append_event(Some(note(NoteValueBase::Quarter))).unwrap();
    assert_eq!(event_starts(&sequence), vec![frac(0, 1), frac(0, 1)]);
    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, _| WalkControl::Continue);
    assert_eq!(outcome.end_position, frac(1, 2));
}

struct StopAtSecondEvent {
    events: usize,
}

impl SequenceVisitor for StopAtSecondEvent {
    fn enter_event(&mut self, _event: &Event, _step: &WalkStep) -> WalkControl {
        self.events += 1;
        if self.events == 2 {
            WalkControl::Stop
        } else {
            WalkControl::Continue
        }
    }
}

#[test]
fn test_visitor_can_stop_the_walk() {
    let (_doc, sequence) = triplet_sequence();
    let mut visitor = StopAtSecondEvent { events: 0 };
    let outcome = walk_sequence(&sequence, &mut visitor, WalkOptions::default());
    assert!(outcome.cancelled);
    assert!(!outcome.completed());
    assert_eq!(visitor.events, 2);
    // tuplet enter, first event enter and leave, second event enter
    assert_eq!(outcome.steps, 4);
    assert_eq!(outcome.end_position, frac(1, 6));
}

#[derive(Default)]
struct SkipTuplets {
    events: usize,
    left: Option<WalkStep>,
}

impl SequenceVisitor for SkipTuplets {
    fn enter_event(&mut self, _event: &Event, _step: &WalkStep) -> WalkControl {
        self.events += 1;
        WalkControl::Continue
    }

    fn enter_tuplet(&mut self, _tuplet: &Tuplet, _step: &WalkStep) -> WalkControl {
        WalkControl::SkipChildren
    }

    fn leave_tuplet(&mut self, _tuplet: &Tuplet, step: &WalkStep) -> WalkControl {
        self.left = Some(step.clone());
        WalkControl::Continue
    }
}

#[test]
fn test_skipped_tuplet_advances_by_outer_duration() {
    let (_doc, sequence) = triplet_sequence();
    sequence
        .content()
        .unwrap()
        .append_event(Some(note(NoteValueBase::Half)))
        .unwrap();
    let mut visitor = SkipTuplets::default();
    let outcome = walk_sequence(&sequence, &mut visitor, WalkOptions::default());
    assert!(outcome.completed());
    assert_eq!(visitor.events, 1);
    assert_eq!(visitor.left.unwrap().position, frac(1, 2));
    assert_eq!(outcome.end_position, frac(1, 1));
}

#[test]
fn test_grace_inside_grace_is_malformed() {
    let (_doc, sequence) = single_sequence(1);
    let grace = sequence.content().unwrap().append_grace().unwrap();
    grace.content().unwrap().append_grace().unwrap();
    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, _| WalkControl::Continue);
    match outcome.error {
        Some(MnxError::MalformedNesting { pointer, .. }) => {
            assert_eq!(pointer.as_str(), "/parts/0/measures/0/sequences/0/content/0/content/0");
        }
        other => panic!("expected MalformedNesting, got {other:?}"),
    }
}

#[test]
fn test_negative_position_is_rejected() {
    let (_doc, sequence) = single_sequence(1);
    sequence
        .content()
        .unwrap()
        .append_event(Some(note(NoteValueBase::Quarter)))
        .unwrap();
    let options = WalkOptions {
        start: frac(-1, 4),
        ..WalkOptions::default()
    };
    let mut walker = SequenceWalker::new(sequence, options);
    assert!(matches!(
        walker.next(),
        Some(Err(MnxError::NegativePosition { .. }))
    ));
    assert!(walker.next().is_none());
}

#[test]
fn test_unknown_content_depends_on_dispatch_mode() {
    let doc = Document::from_value(json!({
        "mnx": {"version": 1},
        "global": {"measures": [{"time": {"count": 1, "unit": 4}}]},
        "parts": [{"measures": [{"sequences": [{"content": [
            {"type": "chord"},
            {"duration": {"base": "quarter"}, "rest": {}}
        ]}]}]}]
    }))
    .unwrap();
    let sequence: Sequence = doc.bind_at("/parts/0/measures/0/sequences/0").unwrap();

    let mut strict = SequenceWalker::new(sequence.clone(), WalkOptions::default());
    assert!(matches!(
        strict.next(),
        Some(Err(MnxError::UnrecognizedVariant { ref type_name, .. })) if type_name == "chord"
    ));

    let mut lenient = SequenceWalker::new(sequence.clone(), WalkOptions::with_dispatch(DispatchMode::Lenient));
    let steps: Vec<WalkStep> = lenient.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(lenient.warnings().len(), 1);
    assert_eq!(lenient.position(), frac(1, 4));

    let mut rests = 0;
    struct CountRests<'a>(&'a mut usize);
    impl SequenceVisitor for CountRests<'_> {
        fn rest(&mut self, _event: &Event, _step: &WalkStep) -> WalkControl {
            *self.0 += 1;
            WalkControl::Continue
        }
    }
    let outcome = walk_sequence(
        &sequence,
        &mut CountRests(&mut rests),
        WalkOptions::with_dispatch(DispatchMode::Lenient),
    );
    assert!(outcome.completed());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(rests, 1);
}

fn nest_tuplets(sequence: &Sequence, inner_multiples: &[u32]) -> Tuplet {
    let mut content = sequence.content().unwrap();
    let mut innermost = None;
    for &multiple in inner_multiples {
        let tuplet = content
            .append_tuplet(quantity(multiple, NoteValueBase::Quarter), quantity(1, NoteValueBase::Quarter))
            .unwrap();
        content = tuplet.content().unwrap();
        innermost = Some(tuplet);
    }
    content.append_event(Some(note(NoteValueBase::Quarter))).unwrap();
    innermost.unwrap()
}

#[test]
fn test_tuplet_depth_is_limited() {
    let (_doc, sequence) = single_sequence(1);
    nest_tuplets(&sequence, &[1; MAX_TUPLET_DEPTH]);
    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, _| WalkControl::Continue);
    assert!(outcome.completed(), "{:?}", outcome.error);
    assert_eq!(outcome.end_position, frac(1, 4));

    let (_doc, sequence) = single_sequence(1);
    let deepest = nest_tuplets(&sequence, &[1; MAX_TUPLET_DEPTH + 1]);
    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, _| WalkControl::Continue);
    match outcome.error {
        Some(MnxError::MalformedNesting { pointer, .. }) => assert_eq!(&pointer, deepest.pointer()),
        other => panic!("expected MalformedNesting, got {other:?}"),
    }
}

#[test]
fn test_scale_overflow_is_an_error() {
    let (doc, sequence) = single_sequence(1);
    nest_tuplets(&sequence, &[4_294_967_291, 4_294_967_279, 4_294_967_231]);
    let second: Tuplet = doc
        .bind_at("/parts/0/measures/0/sequences/0/content/0/content/0")
        .unwrap();

    let outcome = for_each_event(&sequence, WalkOptions::default(), |_, _| WalkControl::Continue);
    match outcome.error {
        Some(MnxError::InvalidValue { pointer, .. }) => assert_eq!(&pointer, second.pointer()),
        other => panic!("expected InvalidValue, got {other:?}"),
    }

    let result = doc.validate(&ValidationOptions::default());
    assert!(!result.is_valid());
    assert!(result
        .error_iter()
        .any(|err| matches!(err, MnxError::InvalidValue { pointer, .. } if pointer == second.pointer())));
}
