//! Exact rational arithmetic for rhythmic time.
//!
//! All durations and positions are fractions of a whole note. [`FractionValue`] is the
//! detached value type used for arithmetic; [`Fraction`] is the view over a
//! `[numerator, denominator]` pair stored in the document.

use crate::base::{kind_name, Element, Node, Shape, View};
use crate::error::MnxError;
use crate::pointer::JsonPointer;
use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};
use serde_json::Value;
use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// An exact, always-reduced rational number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FractionValue(Rational64);

impl FractionValue {
    /// Builds `numerator / denominator` in lowest terms.
    ///
    /// Returns `None` for a zero denominator.
    #[must_use]
    pub fn new(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 {
            None
        } else {
            Some(Self(Rational64::new(numerator, denominator)))
        }
    }

    #[must_use]
    pub fn from_integer(value: i64) -> Self {
        Self(Rational64::from_integer(value))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    #[must_use]
    pub fn one() -> Self {
        Self::from_integer(1)
    }

    #[must_use]
    pub fn numerator(&self) -> i64 {
        *self.0.numer()
    }

    #[must_use]
    pub fn denominator(&self) -> i64 {
        *self.0.denom()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.numerator() == 0
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.numerator() < 0
    }

    /// `None` when the sum does not fit in 64-bit terms.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(&rhs.0).map(Self)
    }

    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(&rhs.0).map(Self)
    }

    #[must_use]
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        self.0.checked_mul(&rhs.0).map(Self)
    }

    /// Division that reports a zero divisor or overflow instead of panicking.
    #[must_use]
    pub fn checked_div(self, divisor: Self) -> Option<Self> {
        if divisor.is_zero() {
            None
        } else {
            self.0.checked_div(&divisor.0).map(Self)
        }
    }
}

impl Display for FractionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator(), self.denominator())
    }
}

impl Add for FractionValue {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for FractionValue {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for FractionValue {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul for FractionValue {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Mul<i64> for FractionValue {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

/// Panics on a zero divisor, like integer division. Use the `checked_*` methods when
/// the operands come from document data.
impl Div for FractionValue {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self(self.0 / rhs.0)
    }
}

/// A `[numerator, denominator]` pair in the document, kept in lowest terms by every
/// operation that writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fraction {
    node: Node,
}

impl View for Fraction {
    const SHAPE: Shape = Shape::Array;

    fn from_node(node: Node) -> Self {
        Self { node }
    }

    fn node(&self) -> &Node {
        &self.node
    }

    fn bind(node: Node) -> Result<Self, MnxError> {
        let checked = node.read(|value| match value.as_array() {
            Some(items) if items.len() == 2 => Ok(()),
            Some(items) => Err(format!("array of {} elements", items.len())),
            None => Err(kind_name(value).to_string()),
        })?;
        match checked {
            Ok(()) => Ok(Self::from_node(node)),
            Err(found) => Err(MnxError::type_mismatch(
                node.pointer(),
                "fraction [numerator, denominator]",
                found,
            )),
        }
    }
}

impl Element for Fraction {
    fn load(node: Node) -> Result<Self, MnxError> {
        Self::bind(node)
    }
}

pub(crate) fn encode_fraction(value: FractionValue) -> Value {
    Value::Array(vec![
        Value::from(value.numerator()),
        Value::from(value.denominator()),
    ])
}

pub(crate) fn decode_fraction(value: &Value, pointer: &JsonPointer) -> Result<FractionValue, MnxError> {
    let expected = "fraction [numerator, denominator]";
    let items = match value.as_array() {
        Some(items) if items.len() == 2 => items,
        _ => return Err(MnxError::type_mismatch(pointer, expected, kind_name(value))),
    };
    let part = |index: usize| {
        items[index].as_u64().and_then(|n| i64::try_from(n).ok()).ok_or_else(|| {
            MnxError::type_mismatch(&pointer.push_index(index), "unsigned integer", kind_name(&items[index]))
        })
    };
    let numerator = part(0)?;
    let denominator = part(1)?;
    FractionValue::new(numerator, denominator)
        .ok_or_else(|| MnxError::invalid_value(&pointer.push_index(1), "denominator must not be zero"))
}

impl Fraction {
    /// Writes `value` under `key` of `parent` and returns the new view.
    ///
    /// # Errors
    /// `NegativePosition` for negative values; fails if `parent` is not an object.
    pub fn create(parent: &Node, key: &str, value: FractionValue) -> Result<Self, MnxError> {
        check_non_negative(&parent.pointer().push(key), value)?;
        parent.set_value(key, encode_fraction(value))?;
        Ok(Self::from_node(parent.child(key)))
    }

    /// The stored value, reduced.
    ///
    /// # Errors
    /// `TypeMismatch` for malformed pairs, `InvalidValue` for a zero denominator.
    pub fn value(&self) -> Result<FractionValue, MnxError> {
        let pointer = self.node.pointer().clone();
        self.node.read(|value| decode_fraction(value, &pointer))?
    }

    /// # Errors
    /// See [`Fraction::value`].
    pub fn numerator(&self) -> Result<i64, MnxError> {
        self.value().map(|v| v.numerator())
    }

    /// # Errors
    /// See [`Fraction::value`].
    pub fn denominator(&self) -> Result<i64, MnxError> {
        self.value().map(|v| v.denominator())
    }

    /// Overwrites the pair with `value` in lowest terms.
    ///
    /// # Errors
    /// `NegativePosition` for negative values; `NotFound` if the node is gone.
    pub fn set(&self, value: FractionValue) -> Result<(), MnxError> {
        check_non_negative(self.node.pointer(), value)?;
        self.node.replace(encode_fraction(value))
    }

    /// Rewrites an unreduced stored pair in lowest terms.
    ///
    /// # Errors
    /// See [`Fraction::value`].
    pub fn normalize(&self) -> Result<(), MnxError> {
        let value = self.value()?;
        self.node.replace(encode_fraction(value))
    }
}

pub(crate) fn check_non_negative(pointer: &JsonPointer, value: FractionValue) -> Result<(), MnxError> {
    if value.is_negative() {
        Err(MnxError::NegativePosition {
            pointer: pointer.clone(),
            position: value,
        })
    } else {
        Ok(())
    }
}
