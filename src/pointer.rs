//! RFC 6901 JSON Pointers.
//!
//! Every view in the document model is addressed by a [`JsonPointer`] into the shared
//! tree. The textual form is kept exactly as RFC 6901 prescribes so that pointers in
//! validation errors can be handed to any other JSON tool unchanged.

use serde::{Serialize, Serializer};
use std::fmt::{self, Display};

/// An escaped RFC 6901 pointer. The empty pointer addresses the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct JsonPointer(String);

impl JsonPointer {
    /// The pointer to the document root.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Wraps an already-escaped pointer string such as `/parts/0/measures`.
    ///
    /// Returns `None` unless the string is empty or starts with `/`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() || text.starts_with('/') {
            Some(Self(text.to_string()))
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new pointer with `token` appended, escaping `~` and `/`.
    #[must_use]
    pub fn push(&self, token: &str) -> Self {
        let mut text = String::with_capacity(self.0.len() + token.len() + 1);
        text.push_str(&self.0);
        text.push('/');
        for ch in token.chars() {
            match ch {
                '~' => text.push_str("~0"),
                '/' => text.push_str("~1"),
                other => text.push(other),
            }
        }
        Self(text)
    }

    #[must_use]
    pub fn push_index(&self, index: usize) -> Self {
        self.push(&index.to_string())
    }

    /// The pointer one level up, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let cut = self.0.rfind('/')?;
        Some(Self(self.0[..cut].to_string()))
    }

    /// The unescaped reference tokens.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0[1..]
            .split('/')
            .map(|token| token.replace("~1", "/").replace("~0", "~"))
            .collect()
    }

    /// The last unescaped token, if any.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.tokens().pop()
    }

    /// The last token read as an array index.
    #[must_use]
    pub fn array_index(&self) -> Option<usize> {
        self.last_token()?.parse().ok()
    }

    /// Finds the longest prefix of this pointer matching `pattern`, where `"*"` matches
    /// any single token. Used to navigate from a nested element to an enclosing one,
    /// e.g. `["parts", "*", "measures", "*"]` from an event pointer yields its measure.
    #[must_use]
    pub fn enclosing(&self, pattern: &[&str]) -> Option<Self> {
        let tokens = self.tokens();
        if tokens.len() < pattern.len() {
            return None;
        }
        let matches = pattern
            .iter()
            .zip(tokens.iter())
            .all(|(expected, actual)| *expected == "*" || expected == actual);
        if !matches {
            return None;
        }
        let mut result = Self::root();
        for token in &tokens[..pattern.len()] {
            result = result.push(token);
        }
        Some(result)
    }

    /// True when `self` equals `other` or lies underneath it.
    #[must_use]
    pub fn starts_with(&self, other: &JsonPointer) -> bool {
        other.is_root()
            || self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('/'))
    }
}

impl Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
