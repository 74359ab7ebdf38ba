//! Measure-wide data shared by every part.

use crate::base::{Array, Dictionary, Node, View};
use crate::common::{KeySignature, TimeSignature};
use crate::enums::BarlineType;
use crate::error::MnxError;
use crate::fraction::FractionValue;
use crate::pointer::JsonPointer;

mnx_object! {
    pub struct Global;
}

impl Global {
    required_child!(measures, create_measures, Array<GlobalMeasure>, "measures");
    optional_child!(lyrics, ensure_lyrics, clear_lyrics, LyricsGlobal, "lyrics");

    /// Finds the measure whose computed index is `index`.
    ///
    /// # Errors
    /// Fails if the measures array is malformed.
    pub fn find_measure(&self, index: i64) -> Result<Option<GlobalMeasure>, MnxError> {
        for measure in self.measures()?.iter() {
            let measure = measure?;
            if measure.calc_measure_index()? == index {
                return Ok(Some(measure));
            }
        }
        Ok(None)
    }
}

mnx_object! {
    /// One measure of the global timeline.
    pub struct GlobalMeasure;
}

impl GlobalMeasure {
    optional_property!(
        /// Explicit measure index. When absent the index is the previous one plus 1.
        index, set_index, clear_index, i64, "index"
    );
    optional_property!(number, set_number, clear_number, i64, "number");
    optional_child!(time, ensure_time, clear_time, TimeSignature, "time");
    optional_child!(key, ensure_key, clear_key, KeySignature, "key");
    optional_child!(barline, ensure_barline, clear_barline, Barline, "barline");

    fn siblings(&self) -> Result<(Array<GlobalMeasure>, usize), MnxError> {
        let position = self
            .array_index()
            .ok_or_else(|| MnxError::not_found(self.pointer(), "global measure array index"))?;
        let parent = self
            .node
            .parent()
            .ok_or_else(|| MnxError::not_found(self.pointer(), "global measures array"))?;
        Ok((Array::bind(parent)?, position))
    }

    /// The measure index, counting from the nearest explicit `index` at or before this
    /// measure, or from 1 at the start of the piece.
    ///
    /// # Errors
    /// Fails if this view is not an element of the measures array.
    pub fn calc_measure_index(&self) -> Result<i64, MnxError> {
        let (measures, position) = self.siblings()?;
        let mut offset = 0;
        for current in (0..=position).rev() {
            if let Some(index) = measures.get(current)?.index()? {
                return Ok(index.saturating_add(offset));
            }
            offset += 1;
        }
        Ok(offset)
    }

    /// The time signature in effect: this measure's or the nearest earlier one.
    ///
    /// # Errors
    /// Fails if this view is not an element of the measures array.
    pub fn calc_current_time(&self) -> Result<Option<TimeSignature>, MnxError> {
        let (measures, position) = self.siblings()?;
        for current in (0..=position).rev() {
            if let Some(time) = measures.get(current)?.time()? {
                return Ok(Some(time));
            }
        }
        Ok(None)
    }

    /// The length of this measure in whole notes, if any time signature is in effect.
    ///
    /// # Errors
    /// Fails if the governing time signature is malformed.
    pub fn calc_duration(&self) -> Result<Option<FractionValue>, MnxError> {
        self.calc_current_time()?.map(|time| time.to_fraction()).transpose()
    }

    /// The explicit barline, else final for the last measure and regular elsewhere.
    ///
    /// # Errors
    /// Fails if this view is not an element of the measures array.
    pub fn calc_barline_type(&self) -> Result<BarlineType, MnxError> {
        if let Some(barline) = self.barline()? {
            return barline.barline_type();
        }
        let (measures, position) = self.siblings()?;
        if position + 1 == measures.len()? {
            Ok(BarlineType::Final)
        } else {
            Ok(BarlineType::Regular)
        }
    }
}

mnx_object! {
    pub struct Barline;
}

impl Barline {
    required_property!(barline_type, set_barline_type, BarlineType, "type");
}

mnx_object! {
    pub struct LyricsGlobal;
}

impl LyricsGlobal {
    optional_child!(
        /// Lyric line ids in display order.
        line_order, ensure_line_order, clear_line_order, Array<String>, "lineOrder"
    );
    optional_child!(
        line_metadata,
        ensure_line_metadata,
        clear_line_metadata,
        Dictionary<LyricLineMetadata>,
        "lineMetadata"
    );
}

mnx_object! {
    pub struct LyricLineMetadata;
}

impl LyricLineMetadata {
    optional_property!(label, set_label, clear_label, String, "label");
    optional_property!(lang, set_lang, clear_lang, String, "lang");
}

/// Binds the global measure at array position `position` of the document owning `node`.
pub(crate) fn global_measure_at(node: &Node, position: usize) -> Result<GlobalMeasure, MnxError> {
    let pointer = JsonPointer::root()
        .push("global")
        .push("measures")
        .push_index(position);
    GlobalMeasure::bind(node.at(pointer))
}
