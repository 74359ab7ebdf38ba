//! Scores: named renderings of the music with page and system breaks.

use crate::base::Array;
use crate::common::MeasureRhythmicPosition;

mnx_object! {
    pub struct Score;
}

impl Score {
    required_property!(
        /// Such as "Full Score" or "Flute 1".
        name, set_name, String, "name"
    );
    optional_property!(layout, set_layout, clear_layout, String, "layout");
    optional_child!(
        multimeasure_rests,
        ensure_multimeasure_rests,
        clear_multimeasure_rests,
        Array<MultimeasureRest>,
        "multimeasureRests"
    );
    optional_child!(pages, ensure_pages, clear_pages, Array<Page>, "pages");
}

mnx_object! {
    pub struct MultimeasureRest;
}

impl MultimeasureRest {
    required_property!(
        /// Global index of the first measure.
        start, set_start, i64, "start"
    );
    required_property!(
        /// Number of measures.
        duration, set_duration, i64, "duration"
    );
    optional_property!(label, set_label, clear_label, String, "label");
}

mnx_object! {
    pub struct Page;
}

impl Page {
    optional_property!(layout, set_layout, clear_layout, String, "layout");
    required_child!(systems, create_systems, Array<System>, "systems");
}

mnx_object! {
    pub struct System;
}

impl System {
    required_property!(
        /// Global index of the first measure on the system.
        measure, set_measure, i64, "measure"
    );
    optional_property!(layout, set_layout, clear_layout, String, "layout");
    optional_child!(
        layout_changes,
        ensure_layout_changes,
        clear_layout_changes,
        Array<LayoutChange>,
        "layoutChanges"
    );
}

mnx_object! {
    /// A switch to another layout partway through a system.
    pub struct LayoutChange;
}

impl LayoutChange {
    required_property!(layout, set_layout, String, "layout");
    required_child!(location, create_location, MeasureRhythmicPosition, "location");
}
