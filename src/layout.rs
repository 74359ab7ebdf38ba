//! System layouts: how part staves are grouped and stacked.

use crate::base::{Array, Node, View};
use crate::content::{Content, ContentFamily, ContentObject, ContentView, Decoder, DispatchMode};
use crate::enums::{LabelRef, LayoutSymbol, StemDirection};
use crate::error::MnxError;
use crate::pointer::JsonPointer;
use std::collections::{HashMap, HashSet};

/// The layout content family: groups and staves.
#[derive(Debug, Clone, Copy)]
pub struct LayoutContent;

pub type LayoutContentArray = Content<LayoutContent>;

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutItem {
    Group(LayoutGroup),
    Staff(LayoutStaff),
    Unknown(ContentObject),
}

impl LayoutItem {
    #[must_use]
    pub fn pointer(&self) -> &JsonPointer {
        match self {
            Self::Group(v) => v.pointer(),
            Self::Staff(v) => v.pointer(),
            Self::Unknown(v) => v.pointer(),
        }
    }
}

fn decode_group(node: Node) -> Result<LayoutItem, MnxError> {
    LayoutGroup::bind(node).map(LayoutItem::Group)
}

fn decode_staff(node: Node) -> Result<LayoutItem, MnxError> {
    LayoutStaff::bind(node).map(LayoutItem::Staff)
}

impl ContentFamily for LayoutContent {
    type Item = LayoutItem;

    const NAME: &'static str = "layout";
    const DEFAULT_TYPE: Option<&'static str> = None;
    const DECODERS: &'static [(&'static str, Decoder<LayoutItem>)] =
        &[("group", decode_group), ("staff", decode_staff)];

    fn unknown(object: ContentObject) -> LayoutItem {
        LayoutItem::Unknown(object)
    }
}

mnx_object! {
    pub struct Layout;
}

impl Layout {
    required_property!(id, set_id, String, "id");
    required_child!(content, create_content, LayoutContentArray, "content");
}

mnx_object! {
    /// A bracketed or braced group of staves.
    pub struct LayoutGroup;
}

impl ContentView<LayoutContent> for LayoutGroup {
    const CONTENT_TYPE: &'static str = "group";
}

impl LayoutGroup {
    required_child!(content, create_content, LayoutContentArray, "content");
    optional_property!(label, set_label, clear_label, String, "label");
    optional_property!(symbol, set_symbol, clear_symbol, LayoutSymbol, "symbol");
}

mnx_object! {
    /// One visual staff fed by one or more part staves.
    pub struct LayoutStaff;
}

impl ContentView<LayoutContent> for LayoutStaff {
    const CONTENT_TYPE: &'static str = "staff";
}

impl LayoutStaff {
    required_child!(sources, create_sources, Array<StaffSource>, "sources");
    optional_property!(label, set_label, clear_label, String, "label");
    optional_property!(labelref, set_labelref, clear_labelref, LabelRef, "labelref");
    optional_property!(symbol, set_symbol, clear_symbol, LayoutSymbol, "symbol");

    /// # Errors
    /// Fails if the staff node is gone.
    pub fn append_source(&self, part: &str, staff: i64, voice: Option<&str>) -> Result<StaffSource, MnxError> {
        let sources = self.node.ensure_view::<Array<StaffSource>>("sources")?;
        let source = sources.append()?;
        source.set_part(part)?;
        if staff != 1 {
            source.set_staff(staff)?;
        }
        if let Some(voice) = voice {
            source.set_voice(voice)?;
        }
        Ok(source)
    }
}

mnx_object! {
    pub struct StaffSource;
}

impl StaffSource {
    required_property!(part, set_part, String, "part");
    default_property!(staff, set_staff, clear_staff, i64, "staff", 1);
    optional_property!(label, set_label, clear_label, String, "label");
    optional_property!(labelref, set_labelref, clear_labelref, LabelRef, "labelref");
    optional_property!(voice, set_voice, clear_voice, String, "voice");
    optional_property!(stem, set_stem, clear_stem, StemDirection, "stem");
}

/// A staff of a part: part id plus 1-based staff number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartStaffKey {
    pub part_id: String,
    pub staff: i64,
}

/// Layout staves in visual order, expanding groups depth-first.
///
/// Returns `Ok(None)` if the content holds an element that is neither a group nor a
/// staff (only possible under lenient dispatch).
///
/// # Errors
/// Decode errors from the content arrays.
pub fn flatten_layout_staves(
    content: &LayoutContentArray,
    mode: DispatchMode,
) -> Result<Option<Vec<LayoutStaff>>, MnxError> {
    let mut result = Vec::new();
    for item in content.iter(mode) {
        match item? {
            LayoutItem::Group(group) => match flatten_layout_staves(&group.content()?, mode)? {
                Some(nested) => result.extend(nested),
                None => return Ok(None),
            },
            LayoutItem::Staff(staff) => result.push(staff),
            LayoutItem::Unknown(_) => return Ok(None),
        }
    }
    Ok(Some(result))
}

#[derive(Default)]
struct KeyState {
    count: usize,
    any_missing_voice: bool,
    voices: HashSet<String>,
}

/// The part staves a layout staff draws from, if its voice assignments are coherent.
///
/// Each part staff may feed the layout staff once with an optional voice, or several
/// times with distinct non-empty voices. Returns `Ok(None)` for an empty source list,
/// an empty part id or voice, a repeated voice, or a repeated part staff with a missing
/// voice.
///
/// # Errors
/// Decode errors from the sources.
pub fn analyze_layout_staff_voices(staff: &LayoutStaff) -> Result<Option<HashSet<PartStaffKey>>, MnxError> {
    let sources = staff.sources()?;
    if sources.is_empty()? {
        return Ok(None);
    }
    let mut states: HashMap<PartStaffKey, KeyState> = HashMap::new();
    for source in sources.iter() {
        let source = source?;
        let part_id = source.part()?;
        if part_id.is_empty() {
            return Ok(None);
        }
        let state = states
            .entry(PartStaffKey {
                part_id,
                staff: source.staff()?,
            })
            .or_default();
        state.count += 1;
        match source.voice()? {
            None => state.any_missing_voice = true,
            Some(voice) if voice.is_empty() => return Ok(None),
            Some(voice) => {
                if !state.voices.insert(voice) {
                    return Ok(None);
                }
            }
        }
    }
    let coherent = states
        .values()
        .all(|state| state.count == 1 || (!state.any_missing_voice && state.voices.len() == state.count));
    Ok(coherent.then(|| states.into_keys().collect()))
}
