//! Parts and their per-measure content.

use crate::base::{Array, View};
use crate::common::{MeasureRhythmicPosition, RhythmicPosition, TimeSignature};
use crate::enums::{BeamHookDirection, ClefSign, OttavaAmount};
use crate::error::MnxError;
use crate::fraction::FractionValue;
use crate::global::{global_measure_at, GlobalMeasure};
use crate::sequence::Sequence;

mnx_object! {
    /// One instrument or voice group, with its own measures.
    pub struct Part;
}

impl Part {
    optional_property!(id, set_id, clear_id, String, "id");
    optional_property!(name, set_name, clear_name, String, "name");
    optional_property!(short_name, set_short_name, clear_short_name, String, "shortName");
    optional_property!(smufl_font, set_smufl_font, clear_smufl_font, String, "smuflFont");
    default_property!(staves, set_staves, clear_staves, i64, "staves", 1);
    optional_child!(measures, ensure_measures, clear_measures, Array<PartMeasure>, "measures");
}

mnx_object! {
    /// A part's content for one global measure.
    pub struct PartMeasure;
}

impl PartMeasure {
    required_child!(sequences, create_sequences, Array<Sequence>, "sequences");
    optional_child!(beams, ensure_beams, clear_beams, Array<Beam>, "beams");
    optional_child!(ottavas, ensure_ottavas, clear_ottavas, Array<Ottava>, "ottavas");
    optional_child!(clefs, ensure_clefs, clear_clefs, Array<PositionedClef>, "clefs");
    optional_child!(dynamics, ensure_dynamics, clear_dynamics, Array<Dynamic>, "dynamics");

    /// The global measure at the same array position.
    ///
    /// # Errors
    /// `NotFound` if there is no global measure at this position.
    pub fn global_measure(&self) -> Result<GlobalMeasure, MnxError> {
        let position = self
            .array_index()
            .ok_or_else(|| MnxError::not_found(self.pointer(), "part measure array index"))?;
        global_measure_at(&self.node, position)
    }

    /// The part this measure belongs to.
    ///
    /// # Errors
    /// `NotFound` if the measure is not under `/parts/*`.
    pub fn part(&self) -> Result<Part, MnxError> {
        let pointer = self
            .pointer()
            .enclosing(&["parts", "*"])
            .ok_or_else(|| MnxError::not_found(self.pointer(), "enclosing part"))?;
        Part::bind(self.node.at(pointer))
    }

    /// # Errors
    /// See [`PartMeasure::global_measure`].
    pub fn calc_current_time(&self) -> Result<Option<TimeSignature>, MnxError> {
        self.global_measure()?.calc_current_time()
    }

    /// The measure length in whole notes, if a time signature is in effect.
    ///
    /// # Errors
    /// See [`PartMeasure::global_measure`].
    pub fn calc_duration(&self) -> Result<Option<FractionValue>, MnxError> {
        self.global_measure()?.calc_duration()
    }
}

mnx_object! {
    /// A beamed group, possibly with secondary beams in `inner`.
    pub struct Beam;
}

impl Beam {
    required_child!(events, create_events, Array<String>, "events");
    optional_child!(hooks, ensure_hooks, clear_hooks, Array<BeamHook>, "hooks");
    optional_child!(inner, ensure_inner, clear_inner, Array<Beam>, "inner");
}

mnx_object! {
    pub struct BeamHook;
}

impl BeamHook {
    required_property!(event, set_event, String, "event");
    required_property!(direction, set_direction, BeamHookDirection, "direction");
}

mnx_object! {
    /// An octave line from `position` in this measure through `end`.
    pub struct Ottava;
}

impl Ottava {
    required_property!(value, set_value, OttavaAmount, "value");
    required_child!(position, create_position, RhythmicPosition, "position");
    required_child!(end, create_end, MeasureRhythmicPosition, "end");
    optional_property!(staff, set_staff, clear_staff, i64, "staff");
    optional_property!(voice, set_voice, clear_voice, String, "voice");
}

mnx_object! {
    pub struct Dynamic;
}

impl Dynamic {
    required_property!(value, set_value, String, "value");
    required_child!(position, create_position, RhythmicPosition, "position");
    optional_property!(glyph, set_glyph, clear_glyph, String, "glyph");
    optional_property!(staff, set_staff, clear_staff, i64, "staff");
    optional_property!(voice, set_voice, clear_voice, String, "voice");
}

mnx_object! {
    pub struct PositionedClef;
}

impl PositionedClef {
    required_child!(clef, create_clef, Clef, "clef");
    optional_child!(position, ensure_position, clear_position, RhythmicPosition, "position");
    optional_property!(staff, set_staff, clear_staff, i64, "staff");
}

mnx_object! {
    pub struct Clef;
}

impl Clef {
    required_property!(sign, set_sign, ClefSign, "sign");
    required_property!(
        /// Staff position of the clef's reference line, 0 = middle line.
        staff_position, set_staff_position, i64, "staffPosition"
    );
    default_property!(octave, set_octave, clear_octave, i64, "octave", 0);
}
