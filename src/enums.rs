//! Enumerated property values.
//!
//! String-backed enums round-trip through their exact MNX spelling; integer-backed ones
//! use `serde_repr`. An unknown value is an `InvalidEnumValue` error, never a panic.

use crate::base::{kind_name, Element, Node, Property};
use crate::error::MnxError;
use crate::pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt::{self, Display};

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every spelling, in declaration order.
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            #[must_use]
            pub fn parse(text: &str) -> Option<Self> {
                match text {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Property for $name {
            fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
                let text = value
                    .as_str()
                    .ok_or_else(|| MnxError::type_mismatch(pointer, "string", kind_name(value)))?;
                Self::parse(text).ok_or_else(|| MnxError::InvalidEnumValue {
                    pointer: pointer.clone(),
                    enum_name: stringify!($name).to_string(),
                    value: text.to_string(),
                })
            }

            fn encode(&self) -> Value {
                Value::String(self.as_str().to_string())
            }
        }

        impl Element for $name {
            fn load(node: Node) -> Result<Self, MnxError> {
                let pointer = node.pointer().clone();
                node.read(|value| <Self as Property>::decode(value, &pointer))?
            }
        }
    };
}

macro_rules! integer_enum {
    ($name:ident, $repr:ty, $values:expr) => {
        impl $name {
            /// Every legal value.
            pub const VALUES: &'static [i64] = $values;

            #[must_use]
            pub fn value(&self) -> i64 {
                *self as $repr as i64
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.value())
            }
        }

        impl Property for $name {
            fn decode(value: &Value, pointer: &JsonPointer) -> Result<Self, MnxError> {
                if value.as_i64().is_none() {
                    return Err(MnxError::type_mismatch(pointer, "integer", kind_name(value)));
                }
                serde_json::from_value(value.clone()).map_err(|_| MnxError::InvalidEnumValue {
                    pointer: pointer.clone(),
                    enum_name: stringify!($name).to_string(),
                    value: value.to_string(),
                })
            }

            fn encode(&self) -> Value {
                Value::from(self.value())
            }
        }

        impl Element for $name {
            fn load(node: Node) -> Result<Self, MnxError> {
                let pointer = node.pointer().clone();
                node.read(|value| <Self as Property>::decode(value, &pointer))?
            }
        }
    };
}

string_enum! {
    AccidentalEnclosureSymbol {
        Brackets => "brackets",
        Parentheses => "parentheses",
    }
}

string_enum! {
    AutoYesNo {
        Auto => "auto",
        Yes => "yes",
        No => "no",
    }
}

string_enum! {
    BarlineType {
        Regular => "regular",
        Dashed => "dashed",
        Dotted => "dotted",
        Double => "double",
        Final => "final",
        Heavy => "heavy",
        HeavyHeavy => "heavyHeavy",
        HeavyLight => "heavyLight",
        NoBarline => "noBarline",
        Short => "short",
        Tick => "tick",
    }
}

string_enum! {
    BeamHookDirection {
        Left => "left",
        Right => "right",
    }
}

string_enum! {
    BreathMarkSymbol {
        Comma => "comma",
        Tick => "tick",
        Upbow => "upbow",
        Salzedo => "salzedo",
    }
}

string_enum! {
    ClefSign {
        CClef => "C",
        FClef => "F",
        GClef => "G",
    }
}

string_enum! {
    /// How grace notes take their time.
    GraceType {
        StealPrevious => "stealPrevious",
        StealFollowing => "stealFollowing",
        MakeTime => "makeTime",
    }
}

string_enum! {
    /// Which part name a layout staff label uses.
    LabelRef {
        Name => "name",
        ShortName => "shortName",
    }
}

string_enum! {
    LayoutSymbol {
        NoSymbol => "noSymbol",
        Brace => "brace",
        Bracket => "bracket",
    }
}

string_enum! {
    LineType {
        Solid => "solid",
        Dashed => "dashed",
        Dotted => "dotted",
        Wavy => "wavy",
    }
}

string_enum! {
    LyricLineType {
        End => "end",
        Middle => "middle",
        Start => "start",
        Whole => "whole",
    }
}

string_enum! {
    MarkingUpDown {
        Down => "down",
        Up => "up",
    }
}

string_enum! {
    NoteStep {
        C => "C",
        D => "D",
        E => "E",
        F => "F",
        G => "G",
        A => "A",
        B => "B",
    }
}

impl NoteStep {
    /// Semitones above C within the octave.
    #[must_use]
    pub fn semitones(&self) -> i64 {
        match self {
            Self::C => 0,
            Self::D => 2,
            Self::E => 4,
            Self::F => 5,
            Self::G => 7,
            Self::A => 9,
            Self::B => 11,
        }
    }
}

string_enum! {
    /// Written note value without dots, from the 4096th note up to the duplex maxima.
    NoteValueBase {
        Note4096th => "4096th",
        Note2048th => "2048th",
        Note1024th => "1024th",
        Note512th => "512th",
        Note256th => "256th",
        Note128th => "128th",
        Note64th => "64th",
        Note32nd => "32nd",
        Note16th => "16th",
        Eighth => "eighth",
        Quarter => "quarter",
        Half => "half",
        Whole => "whole",
        Breve => "breve",
        Longa => "longa",
        Maxima => "maxima",
        DuplexMaxima => "duplexMaxima",
    }
}

impl NoteValueBase {
    /// All bases from shortest to longest.
    pub const ALL: [Self; 17] = [
        Self::Note4096th,
        Self::Note2048th,
        Self::Note1024th,
        Self::Note512th,
        Self::Note256th,
        Self::Note128th,
        Self::Note64th,
        Self::Note32nd,
        Self::Note16th,
        Self::Eighth,
        Self::Quarter,
        Self::Half,
        Self::Whole,
        Self::Breve,
        Self::Longa,
        Self::Maxima,
        Self::DuplexMaxima,
    ];

    /// Base-2 exponent of the value in whole notes: quarter is -2, breve is 1.
    #[must_use]
    pub fn exponent(&self) -> i32 {
        let position = Self::ALL.iter().position(|base| base == self).unwrap_or(12);
        position as i32 - 12
    }

    /// Flags (or beams) a note of this value carries.
    #[must_use]
    pub fn flag_count(&self) -> u32 {
        let exponent = self.exponent();
        if exponent <= -3 {
            (-exponent - 2) as u32
        } else {
            0
        }
    }
}

string_enum! {
    StemDirection {
        Down => "down",
        Up => "up",
    }
}

string_enum! {
    SlurTieEndLocation {
        Outgoing => "outgoing",
        Incoming => "incoming",
    }
}

string_enum! {
    SlurTieSide {
        Down => "down",
        Up => "up",
    }
}

string_enum! {
    TupletDisplaySetting {
        Inner => "inner",
        NoNumber => "noNumber",
        Both => "both",
    }
}

/// The denominator of a time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum TimeSignatureUnit {
    Whole = 1,
    Half = 2,
    Quarter = 4,
    Eighth = 8,
    Value16th = 16,
    Value32nd = 32,
    Value64th = 64,
    Value128th = 128,
}

integer_enum!(TimeSignatureUnit, u8, &[1, 2, 4, 8, 16, 32, 64, 128]);

/// Octave displacement of an ottava line; negative values sound lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum OttavaAmount {
    ThreeOctavesDown = -3,
    TwoOctavesDown = -2,
    OctaveDown = -1,
    OctaveUp = 1,
    TwoOctavesUp = 2,
    ThreeOctavesUp = 3,
}

integer_enum!(OttavaAmount, i8, &[-3, -2, -1, 1, 2, 3]);
