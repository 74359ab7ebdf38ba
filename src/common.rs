//! Shared duration, position and signature views.

use crate::base::{Node, View};
use crate::enums::{NoteValueBase, TimeSignatureUnit};
use crate::error::MnxError;
use crate::fraction::{check_non_negative, Fraction, FractionValue};

/// Dots beyond this overflow the exact arithmetic long before they mean anything musically.
pub const MAX_DOTS: u32 = 20;

/// A detached written note value: base plus dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteValueFields {
    pub base: NoteValueBase,
    pub dots: u32,
}

impl NoteValueFields {
    #[must_use]
    pub fn new(base: NoteValueBase, dots: u32) -> Self {
        Self { base, dots }
    }

    /// Length in whole notes. Each dot adds half the previous increment, so `d` dots
    /// multiply the base by `(2^(d+1) - 1) / 2^d`.
    ///
    /// Returns `None` when `dots` exceeds [`MAX_DOTS`].
    #[must_use]
    pub fn to_fraction(&self) -> Option<FractionValue> {
        if self.dots > MAX_DOTS {
            return None;
        }
        let exponent = self.base.exponent();
        let base = if exponent >= 0 {
            FractionValue::from_integer(1 << exponent)
        } else {
            FractionValue::new(1, 1 << -exponent)?
        };
        let dot_factor = FractionValue::new((1 << (self.dots + 1)) - 1, 1 << self.dots)?;
        Some(base * dot_factor)
    }

    /// Length with an extra multiplier applied last, e.g. a tuplet ratio.
    #[must_use]
    pub fn scaled(&self, multiplier: FractionValue) -> Option<FractionValue> {
        self.to_fraction().map(|value| value * multiplier)
    }

    /// The note value with the fewest dots whose length is exactly `value`.
    #[must_use]
    pub fn from_fraction(value: FractionValue) -> Option<Self> {
        (0..=MAX_DOTS).find_map(|dots| {
            NoteValueBase::ALL.iter().find_map(|base| {
                let candidate = Self::new(*base, dots);
                (candidate.to_fraction()? == value).then_some(candidate)
            })
        })
    }
}

/// A detached count of note values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteValueQuantityFields {
    pub multiple: u32,
    pub duration: NoteValueFields,
}

impl NoteValueQuantityFields {
    #[must_use]
    pub fn new(multiple: u32, base: NoteValueBase, dots: u32) -> Self {
        Self {
            multiple,
            duration: NoteValueFields::new(base, dots),
        }
    }

    #[must_use]
    pub fn to_fraction(&self) -> Option<FractionValue> {
        self.duration.to_fraction().map(|unit| unit * i64::from(self.multiple))
    }
}

mnx_object! {
    /// A written note value such as a dotted quarter.
    pub struct NoteValue;
}

impl NoteValue {
    required_property!(base, set_base, NoteValueBase, "base");
    default_property!(dots, set_dots, clear_dots, u32, "dots", 0);

    /// Writes `fields` under `key` of `parent`.
    ///
    /// # Errors
    /// Fails if `parent` is not an object.
    pub fn create(parent: &Node, key: &str, fields: NoteValueFields) -> Result<Self, MnxError> {
        let value = parent.create_view::<Self>(key)?;
        value.assign(fields)?;
        Ok(value)
    }

    /// # Errors
    /// Fails if the node is gone.
    pub fn assign(&self, fields: NoteValueFields) -> Result<(), MnxError> {
        self.set_base(fields.base)?;
        if fields.dots > 0 {
            self.set_dots(fields.dots)
        } else {
            self.clear_dots()
        }
    }

    /// # Errors
    /// Fails if `base` is missing or invalid.
    pub fn fields(&self) -> Result<NoteValueFields, MnxError> {
        Ok(NoteValueFields::new(self.base()?, self.dots()?))
    }

    /// Length in whole notes.
    ///
    /// # Errors
    /// Fails if the stored value is malformed or has too many dots.
    pub fn to_fraction(&self) -> Result<FractionValue, MnxError> {
        self.fields()?
            .to_fraction()
            .ok_or_else(|| MnxError::invalid_value(&self.pointer().push("dots"), format!("more than {MAX_DOTS} dots")))
    }

    /// # Errors
    /// Fails if `base` is missing or invalid.
    pub fn calc_number_of_flags(&self) -> Result<u32, MnxError> {
        Ok(self.base()?.flag_count())
    }
}

mnx_object! {
    /// A count of note values, as used for tuplet ratios and spaces.
    pub struct NoteValueQuantity;
}

impl NoteValueQuantity {
    required_property!(multiple, set_multiple, u32, "multiple");
    required_child!(duration, create_duration, NoteValue, "duration");

    /// # Errors
    /// Fails if `parent` is not an object.
    pub fn create(parent: &Node, key: &str, fields: NoteValueQuantityFields) -> Result<Self, MnxError> {
        let value = parent.create_view::<Self>(key)?;
        value.set_multiple(fields.multiple)?;
        NoteValue::create(value.node(), "duration", fields.duration)?;
        Ok(value)
    }

    /// # Errors
    /// Fails if either field is missing or malformed.
    pub fn fields(&self) -> Result<NoteValueQuantityFields, MnxError> {
        Ok(NoteValueQuantityFields {
            multiple: self.multiple()?,
            duration: self.duration()?.fields()?,
        })
    }

    /// `multiple` times the length of `duration`.
    ///
    /// # Errors
    /// Fails if either field is missing or malformed.
    pub fn to_fraction(&self) -> Result<FractionValue, MnxError> {
        Ok(self.duration()?.to_fraction()? * i64::from(self.multiple()?))
    }
}

mnx_object! {
    pub struct TimeSignature;
}

impl TimeSignature {
    required_property!(count, set_count, i64, "count");
    required_property!(unit, set_unit, TimeSignatureUnit, "unit");

    /// # Errors
    /// Fails if `parent` is not an object.
    pub fn create(parent: &Node, key: &str, count: i64, unit: TimeSignatureUnit) -> Result<Self, MnxError> {
        let time = parent.create_view::<Self>(key)?;
        time.set_count(count)?;
        time.set_unit(unit)?;
        Ok(time)
    }

    /// The measure length in whole notes: `count / unit`.
    ///
    /// # Errors
    /// `InvalidValue` for a non-positive count.
    pub fn to_fraction(&self) -> Result<FractionValue, MnxError> {
        let count = self.count()?;
        if count <= 0 {
            return Err(MnxError::invalid_value(&self.pointer().push("count"), "count must be positive"));
        }
        FractionValue::new(count, self.unit()?.value())
            .ok_or_else(|| MnxError::invalid_value(&self.pointer().push("unit"), "unit must not be zero"))
    }
}

mnx_object! {
    pub struct KeySignature;
}

impl KeySignature {
    required_property!(
        /// Sharps (positive) or flats (negative) in the signature.
        fifths, set_fifths, i64, "fifths"
    );
    optional_property!(color, set_color, clear_color, String, "color");
    optional_property!(style_class, set_style_class, clear_style_class, String, "class");
}

mnx_object! {
    /// A position within a measure.
    pub struct RhythmicPosition;
}

impl RhythmicPosition {
    required_child!(fraction, create_fraction, Fraction, "fraction");
    optional_property!(
        /// Which grace note at this position, counting back from the main event.
        grace_index, set_grace_index, clear_grace_index, u32, "graceIndex"
    );

    /// # Errors
    /// `NegativePosition` for negative values; fails if `parent` is not an object.
    pub fn create(parent: &Node, key: &str, value: FractionValue) -> Result<Self, MnxError> {
        check_non_negative(&parent.pointer().push(key), value)?;
        let position = parent.create_view::<Self>(key)?;
        Fraction::create(position.node(), "fraction", value)?;
        Ok(position)
    }

    /// # Errors
    /// Fails if the fraction is missing or malformed.
    pub fn value(&self) -> Result<FractionValue, MnxError> {
        self.fraction()?.value()
    }

    /// # Errors
    /// `NegativePosition` for negative values.
    pub fn set_value(&self, value: FractionValue) -> Result<(), MnxError> {
        Fraction::create(&self.node, "fraction", value).map(|_| ())
    }
}

mnx_object! {
    /// A position qualified by its global measure index.
    pub struct MeasureRhythmicPosition;
}

impl MeasureRhythmicPosition {
    required_property!(measure, set_measure, i64, "measure");
    required_child!(position, create_position, RhythmicPosition, "position");

    /// # Errors
    /// `NegativePosition` for negative positions; fails if `parent` is not an object.
    pub fn create(parent: &Node, key: &str, measure: i64, position: FractionValue) -> Result<Self, MnxError> {
        let result = parent.create_view::<Self>(key)?;
        result.set_measure(measure)?;
        RhythmicPosition::create(result.node(), "position", position)?;
        Ok(result)
    }

    /// `(measure index, position)`, ordered the way positions occur in time.
    ///
    /// # Errors
    /// Fails if either field is missing or malformed.
    pub fn sort_key(&self) -> Result<(i64, FractionValue), MnxError> {
        Ok((self.measure()?, self.position()?.value()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frac(n: i64, d: i64) -> FractionValue {
        FractionValue::new(n, d).unwrap()
    }

    #[test]
    fn test_note_value_lengths() {
        assert_eq!(NoteValueFields::new(NoteValueBase::Quarter, 0).to_fraction(), Some(frac(1, 4)));
        assert_eq!(NoteValueFields::new(NoteValueBase::Quarter, 1).to_fraction(), Some(frac(3, 8)));
        assert_eq!(NoteValueFields::new(NoteValueBase::Half, 2).to_fraction(), Some(frac(7, 8)));
        assert_eq!(NoteValueFields::new(NoteValueBase::DuplexMaxima, 0).to_fraction(), Some(frac(16, 1)));
        assert_eq!(NoteValueFields::new(NoteValueBase::Note4096th, 0).to_fraction(), Some(frac(1, 4096)));
        assert_eq!(NoteValueFields::new(NoteValueBase::Whole, MAX_DOTS + 1).to_fraction(), None);
    }

    #[test]
    fn test_minimal_note_value_from_fraction() {
        for base in NoteValueBase::ALL {
            for dots in 0..3 {
                let fields = NoteValueFields::new(base, dots);
                let value = fields.to_fraction().unwrap();
                assert_eq!(NoteValueFields::from_fraction(value), Some(fields));
            }
        }
        assert_eq!(NoteValueFields::from_fraction(frac(1, 3)), None);
    }

    #[test]
    fn test_scaled_and_quantities() {
        let eighth = NoteValueFields::new(NoteValueBase::Eighth, 0);
        assert_eq!(eighth.scaled(frac(2, 3)), Some(frac(1, 12)));
        let quantity = NoteValueQuantityFields::new(3, NoteValueBase::Eighth, 0);
        assert_eq!(quantity.to_fraction(), Some(frac(3, 8)));
    }
}
