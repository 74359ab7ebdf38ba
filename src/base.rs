//! The view binding layer.
//!
//! A document is one shared, mutable `serde_json::Value`. Views are cheap handles made of
//! that shared root plus a [`JsonPointer`]; they never copy the data they expose. Every
//! read and write dereferences the pointer into the live tree at call time, so two views
//! with the same pointer always agree, and a view whose node has been removed reports
//! `NotFound` on its next access instead of returning stale data.
//!
//! Borrows of the tree are confined to single accessor calls. Code holding a view may
//! therefore call back into other views (or mutate the tree) freely between calls.

use crate::error::MnxError;
use crate::pointer::JsonPointer;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// The shared document tree every view points into.
pub type SharedJson = Rc<RefCell<Value>>;

/// Human-readable JSON kind of a value, used in `TypeMismatch` messages.
#[must_use]
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A location in a shared document tree.
#[derive(Clone)]
pub struct Node {
    root: SharedJson,
    pointer: JsonPointer,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Node").field(&self.pointer.as_str()).finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.root, &other.root) && self.pointer == other.pointer
    }
}

impl Node {
    #[must_use]
    pub fn new(root: SharedJson, pointer: JsonPointer) -> Self {
        Self { root, pointer }
    }

    #[must_use]
    pub fn pointer(&self) -> &JsonPointer {
        &self.pointer
    }

    #[must_use]
    pub fn root(&self) -> &SharedJson {
        &self.root
    }

    /// A node in the same tree at an arbitrary pointer.
    #[must_use]
    pub fn at(&self, pointer: JsonPointer) -> Self {
        Self::new(Rc::clone(&self.root), pointer)
    }

    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        self.at(self.pointer.push(key))
    }

    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.at(self.pointer.push_index(index))
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.pointer.parent().map(|pointer| self.at(pointer))
    }

    /// Whether the pointer currently resolves.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.root.borrow().pointer(self.pointer.as_str()).is_some()
    }

    /// Runs `f` against the node's current value.
    ///
    /// # Errors
    /// Returns `NotFound` if the pointer no longer resolves.
    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> Result<R, MnxError> {
        let root = self.root.borrow();
        let value = root
            .pointer(self.pointer.as_str())
            .ok_or_else(|| MnxError::not_found(&self.pointer, "node"))?;
        Ok(f(value))
    }

    /// Runs `f` against the node's current value, mutably.
    ///
    /// # Errors
    /// Returns `NotFound` if the pointer no longer resolves.
    pub fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R, MnxError> {
        let mut root = self.root.borrow_mut();
        let value = root
            .pointer_mut(self.pointer.as_str())
            .ok_or_else(|| MnxError::not_found(&self.pointer, "node"))?;
        Ok(f(value))
    }

    /// A deep copy of the subtree.
    ///
    /// # Errors
    /// Returns `NotFound` if the pointer no longer resolves.
    pub fn value(&self) -> Result<Value, MnxError> {
        self.read(Value::clone)
    }

    /// Replaces the subtree wholesale.
    ///
    /// # Errors
    /// Returns `NotFound` if the pointer no longer resolves.
    pub fn replace(&self, value: Value) -> Result<(), MnxError> {
        self.write(|slot| *slot = value)
    }

    fn with_object<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> Result<R, MnxError> {
        self.read(|value| match value.as_object() {
            Some(map) => Ok(f(map)),
            None => Err(MnxError::type_mismatch(&self.pointer, "object", kind_name(value))),
        })?
    }

    fn with_object_mut<R>(
        &self,
        f: impl FnOnce(&mut Map<String, Value>) -> R,
    ) -> Result<R, MnxError> {
        let pointer = self.pointer.clone();
        self.write(|value| {
            let found = kind_name(value);
            match value.as_object_mut() {
                Some(map) => Ok(f(map)),
                None => Err(MnxError::type_mismatch(&pointer, "object", found)),
            }
        })?
    }

    /// Whether this object node has `key`.
    ///
    /// # Errors
    /// Fails if this node is missing or not an object.
    pub fn has(&self, key: &str) -> Result<bool, MnxError> {
        self.with_object(|map| map.contains_key(key))
    }

    /// Reads an optional scalar property.
    ///
    /// # Errors
    /// Fails if this node is missing or not an object, or if the property has the wrong kind.
    pub fn get<P: Property>(&self, key: &str) -> Result<Option<P>, MnxError> {
        let pointer = self.pointer.push(key);
        self.with_object(|map| map.get(key).map(|value| P::decode(value, &pointer)))?
            .transpose()
    }

    /// Reads a required scalar property.
    ///
    /// # Errors
    /// Returns `NotFound` if the property is absent.
    pub fn required<P: Property>(&self, key: &str) -> Result<P, MnxError> {
        self.get(key)?
            .ok_or_else(|| MnxError::not_found(&self.pointer.push(key), format!("required property \"{key}\"")))
    }

    /// Writes a scalar property, creating it if absent.
    ///
    /// # Errors
    /// Fails if this node is missing or not an object.
    pub fn set<P: Property>(&self, key: &str, value: &P) -> Result<(), MnxError> {
        self.set_value(key, value.encode())
    }

    /// Writes a raw JSON value under `key`.
    ///
    /// # Errors
    /// Fails if this node is missing or not an object.
    pub fn set_value(&self, key: &str, value: Value) -> Result<(), MnxError> {
        self.with_object_mut(|map| {
            map.insert(key.to_string(), value);
        })
    }

    /// Removes `key` if present.
    ///
    /// # Errors
    /// Fails if this node is missing or not an object.
    pub fn remove(&self, key: &str) -> Result<(), MnxError> {
        self.with_object_mut(|map| {
            map.remove(key);
        })
    }

    /// Binds an optional child view.
    ///
    /// # Errors
    /// Fails if the child exists with an incompatible shape.
    pub fn child_view<V: View>(&self, key: &str) -> Result<Option<V>, MnxError> {
        if self.has(key)? {
            V::bind(self.child(key)).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Binds a required child view.
    ///
    /// # Errors
    /// Returns `NotFound` if the child is absent.
    pub fn required_view<V: View>(&self, key: &str) -> Result<V, MnxError> {
        self.child_view(key)?
            .ok_or_else(|| MnxError::not_found(&self.pointer.push(key), format!("required child \"{key}\"")))
    }

    /// Returns the child view, creating an empty one if absent.
    ///
    /// # Errors
    /// Fails if this node is not an object or the child has an incompatible shape.
    pub fn ensure_view<V: View>(&self, key: &str) -> Result<V, MnxError> {
        if !self.has(key)? {
            self.set_value(key, V::SHAPE.empty())?;
        }
        V::bind(self.child(key))
    }

    /// Replaces the child with an empty one and returns its view.
    ///
    /// # Errors
    /// Fails if this node is missing or not an object.
    pub fn create_view<V: View>(&self, key: &str) -> Result<V, MnxError> {
        self.set_value(key, V::SHAPE.empty())?;
        V::bind(self.child(key))
    }
}

/// The JSON kind a view binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
}

impl Shape {
    #[must_use]
    pub fn empty(self) -> Value {
        match self {
            Self::Object => Value::Object(Map::new()),
            Self::Array => Value::Array(Vec::new()),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// A typed façade over an object or array node.
pub trait View: Sized {
    const SHAPE: Shape;

    /// Wraps a node without checking it. Accessors report problems later.
    fn from_node(node: Node) -> Self;

    fn node(&self) -> &Node;

    /// Wraps a node after checking that it exists and has this view's shape.
    ///
    /// # Errors
    /// `NotFound` if the node is absent, `TypeMismatch` if it has the wrong kind.
    fn bind(node: Node) -> Result<Self, MnxError> {
        let accepted = node.read(|value| {
            if Self::SHAPE.accepts(value) {
                Ok(())
            } else {
                Err(kind_name(value))
            }
        })?;
        match accepted {
            Ok(()) => Ok(Self::from_node(node)),
            Err(found) => Err(MnxError::type_mismatch(node.pointer(), Self::SHAPE.name(), found)),
        }
    }

    fn pointer(&self) -> &JsonPointer {
        self.node().pointer()
    }

    /// The view's position in its parent array, if it is an array element.
    fn array_index(&self) -> Option<usize> {
        self.pointer().array_index()
    }

    /// A deep copy of the viewed subtree.
    ///
    /// # Errors
    /// `NotFound` if the node no longer exists.
    fn dump(&self) -> Result<Value, MnxError> {
        self.node().value()
    }
}

/// Anything an `Array` or `Dictionary` can hold.
pub trait Element: Sized {
    /// Decodes the element at `node`.
    ///
    /// # Errors
    /// Fails when the node is absent or cannot be decoded as `Self`.
    fn load(node: Node) -> Result<Self, MnxError>;
}

/// A scalar stored directly in the tree.
pub trait Property: Sized {
    /// # Errors
    /// `TypeMismatch` for the wrong JSON kind, `InvalidEnumValue` for unknown enum strings.
    fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError>;

    fn encode(&self) -> Value;
}

impl Property for bool {
    fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
        value
            .as_bool()
            .ok_or_else(|| MnxError::type_mismatch(pointer, "boolean", kind_name(value)))
    }

    fn encode(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Property for String {
    fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| MnxError::type_mismatch(pointer, "string", kind_name(value)))
    }

    fn encode(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Property for i64 {
    fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
        value
            .as_i64()
            .ok_or_else(|| MnxError::type_mismatch(pointer, "integer", kind_name(value)))
    }

    fn encode(&self) -> Value {
        Value::from(*self)
    }
}

impl Property for u32 {
    fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| MnxError::type_mismatch(pointer, "unsigned integer", kind_name(value)))
    }

    fn encode(&self) -> Value {
        Value::from(*self)
    }
}

impl Property for f64 {
    fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
        value
            .as_f64()
            .ok_or_else(|| MnxError::type_mismatch(pointer, "number", kind_name(value)))
    }

    fn encode(&self) -> Value {
        Value::from(*self)
    }
}

macro_rules! scalar_elements {
    ($($ty:ty),*) => {
        $(
            impl Element for $ty {
                fn load(node: Node) -> Result<Self, MnxError> {
                    let pointer = node.pointer().clone();
                    node.read(|value| <$ty as Property>::decode(value, &pointer))?
                }
            }
        )*
    };
}

scalar_elements!(bool, String, i64, u32, f64);

/// An untyped object view, for nodes without a dedicated type.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    node: Node,
}

impl View for Object {
    const SHAPE: Shape = Shape::Object;

    fn from_node(node: Node) -> Self {
        Self { node }
    }

    fn node(&self) -> &Node {
        &self.node
    }
}

impl Element for Object {
    fn load(node: Node) -> Result<Self, MnxError> {
        Self::bind(node)
    }
}

impl Object {
    /// # Errors
    /// See [`Node::get`].
    pub fn get<P: Property>(&self, key: &str) -> Result<Option<P>, MnxError> {
        self.node.get(key)
    }

    /// # Errors
    /// See [`Node::set`].
    pub fn set<P: Property>(&self, key: &str, value: &P) -> Result<(), MnxError> {
        self.node.set(key, value)
    }

    /// # Errors
    /// See [`Node::remove`].
    pub fn remove(&self, key: &str) -> Result<(), MnxError> {
        self.node.remove(key)
    }

    /// The object's keys in document order.
    ///
    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn keys(&self) -> Result<Vec<String>, MnxError> {
        self.node.with_object(|map| map.keys().cloned().collect())
    }
}

/// A typed view over a JSON array.
pub struct Array<T> {
    node: Node,
    _element: PhantomData<T>,
}

impl<T> Clone for Array<T> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<T> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Array").field(&self.node.pointer().as_str()).finish()
    }
}

impl<T> View for Array<T> {
    const SHAPE: Shape = Shape::Array;

    fn from_node(node: Node) -> Self {
        Self {
            node,
            _element: PhantomData,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }
}

impl<T> Element for Array<T> {
    fn load(node: Node) -> Result<Self, MnxError> {
        Self::bind(node)
    }
}

impl<T> Array<T> {
    fn with_items<R>(&self, f: impl FnOnce(&Vec<Value>) -> R) -> Result<R, MnxError> {
        self.node.read(|value| match value.as_array() {
            Some(items) => Ok(f(items)),
            None => Err(MnxError::type_mismatch(self.node.pointer(), "array", kind_name(value))),
        })?
    }

    fn with_items_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, MnxError> {
        let pointer = self.node.pointer().clone();
        self.node.write(|value| {
            let found = kind_name(value);
            match value.as_array_mut() {
                Some(items) => Ok(f(items)),
                None => Err(MnxError::type_mismatch(&pointer, "array", found)),
            }
        })?
    }

    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn len(&self) -> Result<usize, MnxError> {
        self.with_items(Vec::len)
    }

    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn is_empty(&self) -> Result<bool, MnxError> {
        self.with_items(Vec::is_empty)
    }

    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn clear(&self) -> Result<(), MnxError> {
        self.with_items_mut(Vec::clear)
    }

    /// Removes element `index`. Views previously bound to later elements now point one
    /// slot further than the element they were created for.
    ///
    /// # Errors
    /// `IndexOutOfRange` if there is no such element.
    pub fn remove(&self, index: usize) -> Result<(), MnxError> {
        let pointer = self.node.pointer().clone();
        self.with_items_mut(|items| {
            if index < items.len() {
                items.remove(index);
                Ok(())
            } else {
                Err(MnxError::IndexOutOfRange {
                    pointer,
                    index,
                    len: items.len(),
                })
            }
        })?
    }

    pub(crate) fn push_value(&self, value: Value) -> Result<usize, MnxError> {
        self.with_items_mut(|items| {
            items.push(value);
            items.len() - 1
        })
    }
}

impl<T: Element> Array<T> {
    /// Decodes element `index`.
    ///
    /// # Errors
    /// `IndexOutOfRange` past the end, or the element's decode error.
    pub fn get(&self, index: usize) -> Result<T, MnxError> {
        let len = self.len()?;
        if index >= len {
            return Err(MnxError::IndexOutOfRange {
                pointer: self.node.pointer().clone(),
                index,
                len,
            });
        }
        T::load(self.node.index(index))
    }

    /// Lazily decodes each element in order.
    #[must_use]
    pub fn iter(&self) -> ArrayIter<T> {
        ArrayIter {
            array: self.clone(),
            index: 0,
            len: None,
        }
    }

    /// Decodes every element, failing on the first bad one.
    ///
    /// # Errors
    /// The first element decode error.
    pub fn to_vec(&self) -> Result<Vec<T>, MnxError> {
        self.iter().collect()
    }
}

impl<T: Element + View> Array<T> {
    /// Appends an empty element and returns a view bound to it.
    ///
    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn append(&self) -> Result<T, MnxError> {
        let index = self.push_value(T::SHAPE.empty())?;
        T::bind(self.node.index(index))
    }
}

impl<T: Element + Property> Array<T> {
    /// # Errors
    /// Fails if the node is missing or not an array.
    pub fn push(&self, value: T) -> Result<(), MnxError> {
        self.push_value(value.encode()).map(|_| ())
    }

    /// # Errors
    /// `IndexOutOfRange` past the end.
    pub fn set(&self, index: usize, value: T) -> Result<(), MnxError> {
        let pointer = self.node.pointer().clone();
        self.with_items_mut(|items| {
            let len = items.len();
            match items.get_mut(index) {
                Some(slot) => {
                    *slot = value.encode();
                    Ok(())
                }
                None => Err(MnxError::IndexOutOfRange { pointer, index, len }),
            }
        })?
    }
}

/// Iterator over an [`Array`]. The length is read once, on the first call to `next`.
pub struct ArrayIter<T> {
    array: Array<T>,
    index: usize,
    len: Option<usize>,
}

impl<T: Element> Iterator for ArrayIter<T> {
    type Item = Result<T, MnxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = match self.len {
            Some(len) => len,
            None => match self.array.len() {
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
        let item = T::load(self.array.node.index(self.index));
        self.index += 1;
        Some(item)
    }
}

/// A string-keyed map view over a JSON object.
pub struct Dictionary<T> {
    node: Node,
    _element: PhantomData<T>,
}

impl<T> Clone for Dictionary<T> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<T> fmt::Debug for Dictionary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dictionary").field(&self.node.pointer().as_str()).finish()
    }
}

impl<T> View for Dictionary<T> {
    const SHAPE: Shape = Shape::Object;

    fn from_node(node: Node) -> Self {
        Self {
            node,
            _element: PhantomData,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }
}

impl<T> Element for Dictionary<T> {
    fn load(node: Node) -> Result<Self, MnxError> {
        Self::bind(node)
    }
}

impl<T> Dictionary<T> {
    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn len(&self) -> Result<usize, MnxError> {
        self.node.with_object(Map::len)
    }

    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn is_empty(&self) -> Result<bool, MnxError> {
        self.node.with_object(Map::is_empty)
    }

    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn contains_key(&self, key: &str) -> Result<bool, MnxError> {
        self.node.has(key)
    }

    /// Keys in document order.
    ///
    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn keys(&self) -> Result<Vec<String>, MnxError> {
        self.node.with_object(|map| map.keys().cloned().collect())
    }

    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn remove(&self, key: &str) -> Result<(), MnxError> {
        self.node.remove(key)
    }
}

impl<T: Element> Dictionary<T> {
    /// # Errors
    /// `NotFound` if `key` is absent, or the value's decode error.
    pub fn get(&self, key: &str) -> Result<T, MnxError> {
        self.find(key)?
            .ok_or_else(|| MnxError::not_found(&self.node.pointer().push(key), format!("key \"{key}\"")))
    }

    /// # Errors
    /// The value's decode error.
    pub fn find(&self, key: &str) -> Result<Option<T>, MnxError> {
        if self.contains_key(key)? {
            T::load(self.node.child(key)).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Decodes every entry in document order.
    ///
    /// # Errors
    /// The first decode error.
    pub fn entries(&self) -> Result<Vec<(String, T)>, MnxError> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let value = T::load(self.node.child(&key))?;
                Ok((key, value))
            })
            .collect()
    }
}

impl<T: Element + View> Dictionary<T> {
    /// Inserts an empty value under `key`, replacing any existing one.
    ///
    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn append(&self, key: &str) -> Result<T, MnxError> {
        self.node.create_view(key)
    }
}

impl<T: Element + Property> Dictionary<T> {
    /// # Errors
    /// Fails if the node is missing or not an object.
    pub fn insert(&self, key: &str, value: T) -> Result<(), MnxError> {
        self.node.set(key, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value, pointer: &str) -> Node {
        Node::new(
            Rc::new(RefCell::new(value)),
            JsonPointer::parse(pointer).unwrap(),
        )
    }

    #[test]
    fn test_bind_checks_shape() {
        let root = node(json!({"a": [1, 2], "b": 3}), "");
        let err = Array::<i64>::bind(root.child("b")).unwrap_err();
        assert!(matches!(err, MnxError::TypeMismatch { ref found, .. } if found == "integer"));
        let err = Object::bind(root.child("missing")).unwrap_err();
        assert!(matches!(err, MnxError::NotFound { .. }));
        assert!(Array::<i64>::bind(root.child("a")).is_ok());
    }

    #[test]
    fn test_views_share_one_tree() {
        let root = node(json!({"items": []}), "");
        let first = Array::<String>::bind(root.child("items")).unwrap();
        let second = Array::<String>::bind(root.child("items")).unwrap();
        first.push("x".to_string()).unwrap();
        assert_eq!(second.len().unwrap(), 1);
        assert_eq!(second.get(0).unwrap(), "x");
    }

    #[test]
    fn test_required_property_reports_pointer() {
        let root = node(json!({"inner": {}}), "/inner");
        let err = root.required::<i64>("count").unwrap_err();
        assert_eq!(err.pointer().unwrap().as_str(), "/inner/count");
    }

    #[test]
    fn test_dictionary_entries_keep_order() {
        let root = node(json!({"d": {"z": 1, "a": 2}}), "");
        let dict = Dictionary::<i64>::bind(root.child("d")).unwrap();
        dict.insert("m", 3).unwrap();
        let entries = dict.entries().unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert!(matches!(dict.get("q"), Err(MnxError::NotFound { .. })));
    }
}
