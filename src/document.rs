//! The document root, with loading and saving.

use crate::base::{Array, Node, View};
use crate::entity::EntityMap;
use crate::error::MnxError;
use crate::global::Global;
use crate::layout::Layout;
use crate::part::Part;
use crate::pointer::JsonPointer;
use crate::score::Score;
use crate::validation::{self, SemanticValidationResult, ValidationOptions};
use crate::MNX_VERSION;
use log::debug;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

mnx_object! {
    /// The root of an MNX document.
    ///
    /// Cloning a `Document` clones the handle, not the tree: both clones edit the same data.
    pub struct Document;
}

mnx_object! {
    /// The `mnx` header: format version and feature flags.
    pub struct MnxMetadata;
}

impl MnxMetadata {
    required_property!(version, set_version, i64, "version");
    optional_child!(support, ensure_support, clear_support, Support, "support");
}

mnx_object! {
    pub struct Support;
}

impl Support {
    default_property!(
        /// Whether notes carry explicit `accidentalDisplay` everywhere.
        use_accidental_display, set_use_accidental_display, clear_use_accidental_display, bool,
        "useAccidentalDisplay", false
    );
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A minimal valid document: version header, no measures, no parts.
    #[must_use]
    pub fn new() -> Self {
        Self::from_tree(json!({
            "mnx": {"version": MNX_VERSION},
            "global": {"measures": []},
            "parts": []
        }))
    }

    fn from_tree(value: Value) -> Self {
        Self::from_node(Node::new(Rc::new(RefCell::new(value)), JsonPointer::root()))
    }

    /// Wraps an already parsed tree. Nothing beyond the root kind is checked; call
    /// [`Document::validate`] for that.
    ///
    /// # Errors
    /// `TypeMismatch` if the root is not an object.
    pub fn from_value(value: Value) -> Result<Self, MnxError> {
        Self::bind(Self::from_tree(value).node().clone())
    }

    /// # Errors
    /// `Json` for malformed input, `TypeMismatch` for a non-object root.
    pub fn from_reader(reader: impl Read) -> Result<Self, MnxError> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    /// # Errors
    /// `Io` if the file cannot be read, otherwise as [`Document::from_reader`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MnxError> {
        let path = path.as_ref();
        debug!("loading {}", path.display());
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Serializes the tree. `None` writes compact JSON; `Some(n)` indents by `n` spaces.
    ///
    /// # Errors
    /// `NotFound` if the root has been replaced by something unreadable.
    pub fn to_json_string(&self, indent: Option<usize>) -> Result<String, MnxError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, indent)?;
        String::from_utf8(buffer).map_err(|err| MnxError::Json(err.to_string()))
    }

    /// # Errors
    /// `Io` or `Json` on write failure.
    pub fn write_to(&self, writer: impl Write, indent: Option<usize>) -> Result<(), MnxError> {
        self.node.read(|value| match indent {
            None => serde_json::to_writer(writer, value),
            Some(width) => {
                let spaces = " ".repeat(width);
                let formatter = PrettyFormatter::with_indent(spaces.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
                value.serialize(&mut serializer)
            }
        })??;
        Ok(())
    }

    /// # Errors
    /// `Io` if the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>, indent: Option<usize>) -> Result<(), MnxError> {
        let path = path.as_ref();
        debug!("saving {}", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer, indent)?;
        writer.flush()?;
        Ok(())
    }

    required_child!(mnx, create_mnx, MnxMetadata, "mnx");
    required_child!(global, create_global, Global, "global");
    required_child!(parts, create_parts, Array<Part>, "parts");
    optional_child!(layouts, ensure_layouts, clear_layouts, Array<Layout>, "layouts");
    optional_child!(scores, ensure_scores, clear_scores, Array<Score>, "scores");

    /// Binds a view of type `V` at an arbitrary pointer.
    ///
    /// # Errors
    /// `InvalidValue` for a malformed pointer, otherwise as [`View::bind`].
    pub fn bind_at<V: View>(&self, pointer: &str) -> Result<V, MnxError> {
        let parsed = JsonPointer::parse(pointer)
            .ok_or_else(|| MnxError::invalid_value(&JsonPointer::root(), format!("malformed JSON pointer \"{pointer}\"")))?;
        V::bind(self.node.at(parsed))
    }

    /// Indexes the document's IDs. The map reflects the document as it is now.
    ///
    /// # Errors
    /// See [`EntityMap::build`].
    pub fn build_entity_map(&self) -> Result<EntityMap, MnxError> {
        EntityMap::build(self)
    }

    /// Runs structural then semantic validation.
    #[must_use]
    pub fn validate(&self, options: &ValidationOptions) -> SemanticValidationResult {
        validation::validate(self, options)
    }
}

impl FromStr for Document {
    type Err = MnxError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }
}
