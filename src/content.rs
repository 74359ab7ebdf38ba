//! Polymorphic content arrays.
//!
//! Mixed-content arrays hold objects whose concrete kind is named by a `"type"`
//! discriminant. Each family of content (sequence content, layout content) registers one
//! decoder per discriminant; the kind is re-read on every access, so editing the
//! discriminant changes what the element decodes to.

use crate::base::{Array, Element, Node, Shape, View};
use crate::error::MnxError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::marker::PhantomData;

/// The discriminant key of every content object.
pub const TYPE_KEY: &str = "type";

/// What to do with an element whose discriminant no decoder recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Fail with `UnrecognizedVariant`.
    #[default]
    Strict,
    /// Decode to the family's `Unknown` variant and log a warning.
    Lenient,
}

pub type Decoder<I> = fn(Node) -> Result<I, MnxError>;

/// A closed set of content kinds sharing one array.
pub trait ContentFamily {
    type Item: 'static;

    /// Used in log and error messages.
    const NAME: &'static str;

    /// The kind assumed when an element has no discriminant, if any.
    const DEFAULT_TYPE: Option<&'static str>;

    const DECODERS: &'static [(&'static str, Decoder<Self::Item>)];

    fn unknown(object: ContentObject) -> Self::Item;

    /// Whether `type_name` has a registered decoder.
    fn recognizes(type_name: &str) -> bool {
        Self::DECODERS.iter().any(|(name, _)| *name == type_name)
    }
}

/// A concrete content kind belonging to family `F`.
pub trait ContentView<F: ContentFamily>: View {
    const CONTENT_TYPE: &'static str;
}

mnx_object! {
    /// Any element of a content array, before dispatch.
    pub struct ContentObject;
}

impl ContentObject {
    optional_property!(
        /// The raw discriminant.
        type_name, set_type_name, clear_type_name, String, "type"
    );

    /// The discriminant, falling back to the family default.
    ///
    /// # Errors
    /// `NotFound` when there is neither a discriminant nor a default.
    pub fn resolved_type<F: ContentFamily>(&self) -> Result<String, MnxError> {
        match self.type_name()? {
            Some(name) => Ok(name),
            None => F::DEFAULT_TYPE.map(str::to_string).ok_or_else(|| {
                MnxError::not_found(&self.pointer().push(TYPE_KEY), format!("{} content type", F::NAME))
            }),
        }
    }
}

/// Decodes the content object at `node` through family `F`'s decoder table.
///
/// # Errors
/// The variant's decode error, or `UnrecognizedVariant` in strict mode.
pub fn dispatch<F: ContentFamily>(node: Node, mode: DispatchMode) -> Result<F::Item, MnxError> {
    let object = ContentObject::bind(node)?;
    let type_name = object.resolved_type::<F>()?;
    if let Some((_, decode)) = F::DECODERS.iter().find(|(name, _)| *name == type_name) {
        return decode(object.node().clone());
    }
    match mode {
        DispatchMode::Strict => Err(MnxError::UnrecognizedVariant {
            pointer: object.pointer().clone(),
            type_name,
        }),
        DispatchMode::Lenient => {
            log::warn!(
                "skipping unrecognized {} content type \"{}\" at {}",
                F::NAME,
                type_name,
                object.pointer()
            );
            Ok(F::unknown(object))
        }
    }
}

/// A mixed-content array of family `F`.
pub struct Content<F> {
    node: Node,
    _family: PhantomData<F>,
}

impl<F> Clone for Content<F> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<F> fmt::Debug for Content<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Content").field(&self.node.pointer().as_str()).finish()
    }
}

impl<F> View for Content<F> {
    const SHAPE: Shape = Shape::Array;

    fn from_node(node: Node) -> Self {
        Self {
            node,
            _family: PhantomData,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }
}

impl<F> Element for Content<F> {
    fn load(node: Node) -> Result<Self, MnxError> {
        Self::bind(node)
    }
}

impl<F: ContentFamily> Content<F> {
    fn items(&self) -> Array<ContentObject> {
        Array::from_node(self.node.clone())
    }

    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn len(&self) -> Result<usize, MnxError> {
        self.items().len()
    }

    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn is_empty(&self) -> Result<bool, MnxError> {
        self.items().is_empty()
    }

    /// The untyped element at `index`.
    ///
    /// # Errors
    /// `IndexOutOfRange` past the end.
    pub fn object(&self, index: usize) -> Result<ContentObject, MnxError> {
        self.items().get(index)
    }

    /// Decodes element `index` with the given dispatch policy.
    ///
    /// # Errors
    /// `IndexOutOfRange`, the variant's decode error, or `UnrecognizedVariant` in strict mode.
    pub fn get_with(&self, index: usize, mode: DispatchMode) -> Result<F::Item, MnxError> {
        dispatch::<F>(self.object(index)?.node().clone(), mode)
    }

    /// Decodes element `index`, rejecting unknown kinds.
    ///
    /// # Errors
    /// See [`Content::get_with`].
    pub fn get(&self, index: usize) -> Result<F::Item, MnxError> {
        self.get_with(index, DispatchMode::Strict)
    }

    #[must_use]
    pub fn iter(&self, mode: DispatchMode) -> ContentIter<F> {
        ContentIter {
            content: self.clone(),
            mode,
            index: 0,
            len: None,
        }
    }

    /// Appends an element of kind `V` carrying only its discriminant.
    ///
    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn append<V: ContentView<F>>(&self) -> Result<V, MnxError> {
        let index = self.items().push_value(json!({ TYPE_KEY: V::CONTENT_TYPE }))?;
        V::bind(self.node.index(index))
    }

    /// Removes element `index`; views to later elements shift by one.
    ///
    /// # Errors
    /// `IndexOutOfRange` past the end.
    pub fn remove(&self, index: usize) -> Result<(), MnxError> {
        self.items().remove(index)
    }
}

/// Lazily dispatching iterator over a [`Content`] array.
pub struct ContentIter<F> {
    content: Content<F>,
    mode: DispatchMode,
    index: usize,
    len: Option<usize>,
}

impl<F: ContentFamily> Iterator for ContentIter<F> {
    type Item = Result<F::Item, MnxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = match self.len {
            Some(len) => len,
            None => match self.content.len() {
                Ok(len) => {
                    self.len = Some(len);
                    len
                }
                Err(err) => {
                    self.len = Some(0);
                    return Some(Err(err));
                }
            },
        };
        if self.index >= len {
            return None;
        }
        let item = dispatch::<F>(self.content.node.index(self.index), self.mode);
        self.index += 1;
        Some(item)
    }
}
