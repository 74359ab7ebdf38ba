//! Sequences and the rhythmic content they hold.

use crate::base::{Array, Dictionary, Node, View};
use crate::common::{NoteValue, NoteValueFields, NoteValueQuantity, NoteValueQuantityFields};
use crate::content::{Content, ContentFamily, ContentObject, ContentView, Decoder};
use crate::entity::StaffKey;
use crate::enums::{
    AccidentalEnclosureSymbol, AutoYesNo, BreathMarkSymbol, GraceType, LineType, LyricLineType,
    MarkingUpDown, NoteStep, SlurTieEndLocation, SlurTieSide, StemDirection, TupletDisplaySetting,
};
use crate::error::MnxError;
use crate::fraction::FractionValue;
use crate::part::PartMeasure;
use crate::pointer::JsonPointer;

const SEQUENCE_PATTERN: [&str; 6] = ["parts", "*", "measures", "*", "sequences", "*"];
const PART_PATTERN: [&str; 2] = ["parts", "*"];

/// The sequence content family: events, spaces, graces, tuplets and tremolos.
#[derive(Debug, Clone, Copy)]
pub struct SequenceContent;

/// An array of sequence content.
pub type ContentArray = Content<SequenceContent>;

/// A decoded element of a [`ContentArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Event(Event),
    Space(Space),
    Grace(Grace),
    Tuplet(Tuplet),
    MultiNoteTremolo(MultiNoteTremolo),
    /// An element with an unrecognized discriminant, kept under lenient dispatch.
    Unknown(ContentObject),
}

impl ContentItem {
    #[must_use]
    pub fn pointer(&self) -> &JsonPointer {
        match self {
            Self::Event(v) => v.pointer(),
            Self::Space(v) => v.pointer(),
            Self::Grace(v) => v.pointer(),
            Self::Tuplet(v) => v.pointer(),
            Self::MultiNoteTremolo(v) => v.pointer(),
            Self::Unknown(v) => v.pointer(),
        }
    }

    /// The discriminant this item was decoded from.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Event(_) => Event::CONTENT_TYPE,
            Self::Space(_) => Space::CONTENT_TYPE,
            Self::Grace(_) => Grace::CONTENT_TYPE,
            Self::Tuplet(_) => Tuplet::CONTENT_TYPE,
            Self::MultiNoteTremolo(_) => MultiNoteTremolo::CONTENT_TYPE,
            Self::Unknown(_) => "unknown",
        }
    }
}

fn decode_event(node: Node) -> Result<ContentItem, MnxError> {
    Event::bind(node).map(ContentItem::Event)
}

fn decode_space(node: Node) -> Result<ContentItem, MnxError> {
    Space::bind(node).map(ContentItem::Space)
}

fn decode_grace(node: Node) -> Result<ContentItem, MnxError> {
    Grace::bind(node).map(ContentItem::Grace)
}

fn decode_tuplet(node: Node) -> Result<ContentItem, MnxError> {
    Tuplet::bind(node).map(ContentItem::Tuplet)
}

fn decode_tremolo(node: Node) -> Result<ContentItem, MnxError> {
    MultiNoteTremolo::bind(node).map(ContentItem::MultiNoteTremolo)
}

impl ContentFamily for SequenceContent {
    type Item = ContentItem;

    const NAME: &'static str = "sequence";
    const DEFAULT_TYPE: Option<&'static str> = Some("event");
    const DECODERS: &'static [(&'static str, Decoder<ContentItem>)] = &[
        ("event", decode_event),
        ("space", decode_space),
        ("grace", decode_grace),
        ("tuplet", decode_tuplet),
        ("multiNoteTremolo", decode_tremolo),
    ];

    fn unknown(object: ContentObject) -> ContentItem {
        ContentItem::Unknown(object)
    }
}

impl ContentArray {
    /// Appends an event. `None` makes it a full-measure event.
    ///
    /// # Errors
    /// Fails if the array node is missing.
    pub fn append_event(&self, duration: Option<NoteValueFields>) -> Result<Event, MnxError> {
        let event = self.append::<Event>()?;
        match duration {
            Some(fields) => {
                NoteValue::create(event.node(), "duration", fields)?;
            }
            None => event.set_measure(true)?,
        }
        Ok(event)
    }

    /// # Errors
    /// Fails if the array node is missing.
    pub fn append_space(&self, duration: NoteValueQuantityFields) -> Result<Space, MnxError> {
        let space = self.append::<Space>()?;
        NoteValueQuantity::create(space.node(), "duration", duration)?;
        Ok(space)
    }

    /// # Errors
    /// Fails if the array node is missing.
    pub fn append_grace(&self) -> Result<Grace, MnxError> {
        let grace = self.append::<Grace>()?;
        grace.create_content()?;
        Ok(grace)
    }

    /// Appends a tuplet playing `inner` in the time of `outer`.
    ///
    /// # Errors
    /// Fails if the array node is missing.
    pub fn append_tuplet(
        &self,
        inner: NoteValueQuantityFields,
        outer: NoteValueQuantityFields,
    ) -> Result<Tuplet, MnxError> {
        let tuplet = self.append::<Tuplet>()?;
        NoteValueQuantity::create(tuplet.node(), "inner", inner)?;
        NoteValueQuantity::create(tuplet.node(), "outer", outer)?;
        tuplet.create_content()?;
        Ok(tuplet)
    }

    /// # Errors
    /// Fails if the array node is missing.
    pub fn append_tremolo(&self, marks: u32, outer: NoteValueQuantityFields) -> Result<MultiNoteTremolo, MnxError> {
        let tremolo = self.append::<MultiNoteTremolo>()?;
        tremolo.set_marks(marks)?;
        NoteValueQuantity::create(tremolo.node(), "outer", outer)?;
        tremolo.create_content()?;
        Ok(tremolo)
    }
}

mnx_object! {
    /// One voice of one staff within a part measure.
    pub struct Sequence;
}

impl Sequence {
    required_child!(content, create_content, ContentArray, "content");
    optional_property!(staff, set_staff, clear_staff, i64, "staff");
    optional_property!(voice, set_voice, clear_voice, String, "voice");

    /// The part measure holding this sequence.
    ///
    /// # Errors
    /// `NotFound` if the sequence does not live under `/parts/*/measures/*`.
    pub fn part_measure(&self) -> Result<PartMeasure, MnxError> {
        let pointer = self
            .pointer()
            .enclosing(&SEQUENCE_PATTERN[..4])
            .ok_or_else(|| MnxError::not_found(self.pointer(), "enclosing part measure"))?;
        PartMeasure::bind(self.node.at(pointer))
    }

    /// Staff (default 1) and voice label (default empty).
    ///
    /// # Errors
    /// Fails if either property has the wrong kind.
    pub fn staff_key(&self) -> Result<StaffKey, MnxError> {
        Ok(StaffKey::new(
            self.staff()?.unwrap_or(1),
            self.voice()?.unwrap_or_default(),
        ))
    }
}

mnx_object! {
    /// A note, chord or rest.
    pub struct Event;
}

impl ContentView<SequenceContent> for Event {
    const CONTENT_TYPE: &'static str = "event";
}

impl Event {
    optional_property!(id, set_id, clear_id, String, "id");
    optional_child!(duration, ensure_duration, clear_duration, NoteValue, "duration");
    optional_property!(
        /// True when the event fills the whole measure regardless of its time signature.
        measure, set_measure, clear_measure, bool, "measure"
    );
    optional_child!(notes, ensure_notes, clear_notes, Array<Note>, "notes");
    optional_child!(rest, ensure_rest, clear_rest, Rest, "rest");
    optional_child!(slurs, ensure_slurs, clear_slurs, Array<Slur>, "slurs");
    optional_child!(lyrics, ensure_lyrics, clear_lyrics, EventLyrics, "lyrics");
    optional_child!(markings, ensure_markings, clear_markings, EventMarkings, "markings");
    optional_property!(staff, set_staff, clear_staff, i64, "staff");
    optional_property!(stem_direction, set_stem_direction, clear_stem_direction, StemDirection, "stemDirection");

    /// # Errors
    /// Fails if the event node is gone.
    pub fn append_note(&self, step: NoteStep, octave: i64, alter: Option<i64>) -> Result<Note, MnxError> {
        let note = self.ensure_notes()?.append()?;
        let pitch = note.create_pitch()?;
        pitch.set_step(step)?;
        pitch.set_octave(octave)?;
        if let Some(alter) = alter {
            pitch.set_alter(alter)?;
        }
        Ok(note)
    }

    /// # Errors
    /// Fails if `rest` has the wrong kind.
    pub fn is_rest(&self) -> Result<bool, MnxError> {
        self.node.has("rest")
    }

    /// Whether the event sits directly inside a grace group.
    #[must_use]
    pub fn is_grace(&self) -> bool {
        self.node
            .parent()
            .and_then(|content| content.parent())
            .and_then(|container| container.get::<String>("type").ok().flatten())
            .is_some_and(|type_name| type_name == Grace::CONTENT_TYPE)
    }

    /// # Errors
    /// Fails if the notes array or a note id is malformed.
    pub fn find_note(&self, note_id: &str) -> Result<Option<Note>, MnxError> {
        if let Some(notes) = self.notes()? {
            for note in notes.iter() {
                let note = note?;
                if note.id()?.as_deref() == Some(note_id) {
                    return Ok(Some(note));
                }
            }
        }
        Ok(None)
    }

    /// The sequence the event belongs to, however deeply nested.
    ///
    /// # Errors
    /// `NotFound` if the event is not inside `/parts/*/measures/*/sequences/*`.
    pub fn sequence(&self) -> Result<Sequence, MnxError> {
        let pointer = self
            .pointer()
            .enclosing(&SEQUENCE_PATTERN)
            .ok_or_else(|| MnxError::not_found(self.pointer(), "enclosing sequence"))?;
        Sequence::bind(self.node.at(pointer))
    }

    /// Pointer of the part the event belongs to.
    #[must_use]
    pub fn part_pointer(&self) -> Option<JsonPointer> {
        self.pointer().enclosing(&PART_PATTERN)
    }

    /// The written duration, or `full_measure` for full-measure events.
    ///
    /// # Errors
    /// `NotFound` when the event has neither a duration nor a usable full-measure length.
    pub fn calc_duration(&self, full_measure: Option<FractionValue>) -> Result<FractionValue, MnxError> {
        if let Some(duration) = self.duration()? {
            return duration.to_fraction();
        }
        if self.measure()?.unwrap_or(false) {
            return full_measure.ok_or_else(|| MnxError::not_found(self.pointer(), "time signature for full-measure event"));
        }
        Err(MnxError::not_found(&self.pointer().push("duration"), "event duration"))
    }
}

mnx_object! {
    pub struct Rest;
}

impl Rest {
    optional_property!(staff_position, set_staff_position, clear_staff_position, i64, "staffPosition");
}

mnx_object! {
    pub struct Note;
}

impl Note {
    optional_property!(id, set_id, clear_id, String, "id");
    required_child!(pitch, create_pitch, Pitch, "pitch");
    optional_child!(ties, ensure_ties, clear_ties, Array<Tie>, "ties");
    optional_child!(
        accidental_display,
        ensure_accidental_display,
        clear_accidental_display,
        AccidentalDisplay,
        "accidentalDisplay"
    );
    optional_property!(staff, set_staff, clear_staff, i64, "staff");

    /// The event holding this note.
    ///
    /// # Errors
    /// `NotFound` if the note is not an element of an event's `notes`.
    pub fn event(&self) -> Result<Event, MnxError> {
        let pointer = self
            .pointer()
            .parent()
            .and_then(|notes| notes.parent())
            .ok_or_else(|| MnxError::not_found(self.pointer(), "enclosing event"))?;
        Event::bind(self.node.at(pointer))
    }

    /// # Errors
    /// Fails if the note node is gone.
    pub fn append_tie(&self, target: Option<&str>) -> Result<Tie, MnxError> {
        let tie = self.ensure_ties()?.append()?;
        match target {
            Some(target) => tie.set_target(target)?,
            None => tie.set_lv(true)?,
        }
        Ok(tie)
    }
}

mnx_object! {
    pub struct Pitch;
}

impl Pitch {
    required_property!(step, set_step, NoteStep, "step");
    required_property!(octave, set_octave, i64, "octave");
    default_property!(alter, set_alter, clear_alter, i64, "alter", 0);

    /// Absolute semitone number, C4 = 48.
    ///
    /// # Errors
    /// Fails if a required field is missing or the pitch is out of range.
    pub fn semitones(&self) -> Result<i64, MnxError> {
        let (step, alter) = (self.step()?.semitones(), self.alter()?);
        self.octave()?
            .checked_mul(12)
            .and_then(|value| value.checked_add(step))
            .and_then(|value| value.checked_add(alter))
            .ok_or_else(|| MnxError::invalid_value(self.pointer(), "pitch out of range"))
    }

    /// Same sounding pitch, allowing enharmonic spellings.
    ///
    /// # Errors
    /// Fails if either pitch is malformed.
    pub fn is_same_pitch(&self, other: &Pitch) -> Result<bool, MnxError> {
        Ok(self.semitones()? == other.semitones()?)
    }
}

mnx_object! {
    pub struct Tie;
}

impl Tie {
    optional_property!(
        /// Note id this tie ends on.
        target, set_target, clear_target, String, "target"
    );
    default_property!(
        /// Laissez vibrer: a tie to nothing.
        lv, set_lv, clear_lv, bool, "lv", false
    );
    optional_property!(side, set_side, clear_side, SlurTieSide, "side");
    optional_property!(location, set_location, clear_location, SlurTieEndLocation, "location");
}

mnx_object! {
    pub struct Slur;
}

impl Slur {
    required_property!(
        /// Event id the slur ends on.
        target, set_target, String, "target"
    );
    optional_property!(start_note, set_start_note, clear_start_note, String, "startNote");
    optional_property!(end_note, set_end_note, clear_end_note, String, "endNote");
    optional_property!(side, set_side, clear_side, SlurTieSide, "side");
    optional_property!(side_end, set_side_end, clear_side_end, SlurTieSide, "sideEnd");
    optional_property!(line_type, set_line_type, clear_line_type, LineType, "lineType");
}

mnx_object! {
    pub struct AccidentalDisplay;
}

impl AccidentalDisplay {
    required_property!(show, set_show, bool, "show");
    optional_property!(cautionary, set_cautionary, clear_cautionary, bool, "cautionary");
    optional_property!(editorial, set_editorial, clear_editorial, bool, "editorial");
    optional_child!(enclosure, ensure_enclosure, clear_enclosure, AccidentalEnclosure, "enclosure");
}

mnx_object! {
    pub struct AccidentalEnclosure;
}

impl AccidentalEnclosure {
    required_property!(symbol, set_symbol, AccidentalEnclosureSymbol, "symbol");
}

mnx_object! {
    pub struct EventLyrics;
}

impl EventLyrics {
    required_child!(
        /// Syllables keyed by lyric line id.
        lines, create_lines, Dictionary<EventLyricLine>, "lines"
    );
}

mnx_object! {
    pub struct EventLyricLine;
}

impl EventLyricLine {
    required_property!(text, set_text, String, "text");
    default_property!(line_type, set_line_type, clear_line_type, LyricLineType, "type", LyricLineType::Whole);
}

mnx_object! {
    /// Accent-like marks that may point up or down.
    pub struct AccentMarking;
}

impl AccentMarking {
    optional_property!(pointing, set_pointing, clear_pointing, MarkingUpDown, "pointing");
}

mnx_object! {
    /// A mark with no properties of its own, such as a staccato.
    pub struct SimpleMarking;
}

mnx_object! {
    pub struct BreathMark;
}

impl BreathMark {
    optional_property!(symbol, set_symbol, clear_symbol, BreathMarkSymbol, "symbol");
}

mnx_object! {
    pub struct SingleNoteTremolo;
}

impl SingleNoteTremolo {
    required_property!(marks, set_marks, u32, "marks");
}

mnx_object! {
    pub struct EventMarkings;
}

impl EventMarkings {
    optional_child!(accent, ensure_accent, clear_accent, AccentMarking, "accent");
    optional_child!(breath, ensure_breath, clear_breath, BreathMark, "breath");
    optional_child!(soft_accent, ensure_soft_accent, clear_soft_accent, SimpleMarking, "softAccent");
    optional_child!(spiccato, ensure_spiccato, clear_spiccato, SimpleMarking, "spiccato");
    optional_child!(staccatissimo, ensure_staccatissimo, clear_staccatissimo, SimpleMarking, "staccatissimo");
    optional_child!(staccato, ensure_staccato, clear_staccato, SimpleMarking, "staccato");
    optional_child!(stress, ensure_stress, clear_stress, SimpleMarking, "stress");
    optional_child!(strong_accent, ensure_strong_accent, clear_strong_accent, AccentMarking, "strongAccent");
    optional_child!(tenuto, ensure_tenuto, clear_tenuto, SimpleMarking, "tenuto");
    optional_child!(tremolo, ensure_tremolo, clear_tremolo, SingleNoteTremolo, "tremolo");
    optional_child!(unstress, ensure_unstress, clear_unstress, SimpleMarking, "unstress");
}

mnx_object! {
    /// Time that passes without an event.
    pub struct Space;
}

impl ContentView<SequenceContent> for Space {
    const CONTENT_TYPE: &'static str = "space";
}

impl Space {
    required_child!(duration, create_duration, NoteValueQuantity, "duration");
}

mnx_object! {
    /// Grace notes; their content takes no metric time.
    pub struct Grace;
}

impl ContentView<SequenceContent> for Grace {
    const CONTENT_TYPE: &'static str = "grace";
}

impl Grace {
    required_child!(content, create_content, ContentArray, "content");
    default_property!(slash, set_slash, clear_slash, bool, "slash", true);
    optional_property!(grace_type, set_grace_type, clear_grace_type, GraceType, "graceType");
    optional_property!(color, set_color, clear_color, String, "color");
    optional_property!(style_class, set_style_class, clear_style_class, String, "class");
}

mnx_object! {
    /// Content played `inner` in the time of `outer`.
    pub struct Tuplet;
}

impl ContentView<SequenceContent> for Tuplet {
    const CONTENT_TYPE: &'static str = "tuplet";
}

impl Tuplet {
    required_child!(inner, create_inner, NoteValueQuantity, "inner");
    required_child!(outer, create_outer, NoteValueQuantity, "outer");
    required_child!(content, create_content, ContentArray, "content");
    default_property!(bracket, set_bracket, clear_bracket, AutoYesNo, "bracket", AutoYesNo::Auto);
    default_property!(
        show_number,
        set_show_number,
        clear_show_number,
        TupletDisplaySetting,
        "showNumber",
        TupletDisplaySetting::Inner
    );
    default_property!(
        show_value,
        set_show_value,
        clear_show_value,
        TupletDisplaySetting,
        "showValue",
        TupletDisplaySetting::NoNumber
    );
    optional_property!(staff, set_staff, clear_staff, i64, "staff");

    /// The factor applied to inner content: `outer / inner`. Three eighths in the time
    /// of two quarters scale each eighth by 4/3.
    ///
    /// # Errors
    /// `MalformedNesting` when `inner` has zero length.
    pub fn ratio(&self) -> Result<FractionValue, MnxError> {
        let outer = self.outer()?.to_fraction()?;
        let inner = self.inner()?.to_fraction()?;
        if inner.is_zero() {
            return Err(MnxError::malformed(&self.pointer().push("inner"), "tuplet inner quantity is zero"));
        }
        outer.checked_div(inner).ok_or_else(|| MnxError::overflow(self.pointer()))
    }
}

mnx_object! {
    /// Alternating notes; the content is written at full value but shares `outer`.
    pub struct MultiNoteTremolo;
}

impl ContentView<SequenceContent> for MultiNoteTremolo {
    const CONTENT_TYPE: &'static str = "multiNoteTremolo";
}

impl MultiNoteTremolo {
    required_property!(marks, set_marks, u32, "marks");
    required_child!(outer, create_outer, NoteValueQuantity, "outer");
    required_child!(content, create_content, ContentArray, "content");
}
