//! Encoder configuration.
//!
//! [`LzmaOptions`] is the typed form. The [`CoderPropId`] / [`PropValue`] pairs are the
//! loosely typed form, applied one property at a time through
//! [`crate::SetCoderProperties`].

use std::{fmt, str::FromStr};

use crate::compressors::lzma::codecs::{
    header_codec::{LzmaProperties, LC_MAX, LP_MAX, PB_MAX},
    length_codec::MATCH_LEN_MAX,
};
use crate::error::{LzmaError, Result};

pub const DICT_SIZE_MIN: u32 = 1;
pub const DICT_SIZE_MAX: u32 = 1 << 30;

pub const FAST_BYTES_MIN: u32 = 5;
pub const FAST_BYTES_MAX: u32 = MATCH_LEN_MAX as u32;

/// Algorithm 0 is the fast parser, 1 and 2 the normal one.
pub const ALGORITHM_MAX: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchFinderKind {
    /// Binary tree over 2 byte hashes.
    BT2,
    /// Binary tree over 4 byte hashes, with 2 and 3 byte hashes for short matches.
    #[default]
    BT4,
}

impl FromStr for MatchFinderKind {
    type Err = LzmaError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("bt2") {
            Ok(MatchFinderKind::BT2)
        } else if s.eq_ignore_ascii_case("bt4") {
            Ok(MatchFinderKind::BT4)
        } else {
            Err(LzmaError::Unsupported("match finder must be bt2 or bt4"))
        }
    }
}

impl fmt::Display for MatchFinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFinderKind::BT2 => f.write_str("bt2"),
            MatchFinderKind::BT4 => f.write_str("bt4"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoderPropId {
    DictionarySize,
    PosStateBits,
    LitContextBits,
    LitPosBits,
    Algorithm,
    NumFastBytes,
    MatchFinder,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    U32(u32),
    Bool(bool),
    Str(String),
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::U32(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LzmaOptions {
    pub dict_size: u32,
    /// Matches at least this long are taken without further search. Also known as the nice
    /// length.
    pub fast_bytes: u32,
    pub algorithm: u32,
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
    pub match_finder: MatchFinderKind,
    /// Terminate the stream with an end marker, for streams of unknown length.
    pub end_marker: bool,
}

impl Default for LzmaOptions {
    fn default() -> Self {
        Self {
            dict_size: 1 << 23,
            fast_bytes: 128,
            algorithm: 2,
            lc: 3,
            lp: 0,
            pb: 2,
            match_finder: MatchFinderKind::BT4,
            end_marker: false,
        }
    }
}

fn check_range(name: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(LzmaError::out_of_range(name, value as u64, min as u64, max as u64));
    }
    Ok(())
}

fn expect_u32(value: &PropValue) -> Result<u32> {
    match value {
        PropValue::U32(value) => Ok(*value),
        _ => Err(LzmaError::Unsupported("expected an integer property value")),
    }
}

impl LzmaOptions {
    pub fn with_dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Dictionary size as a power of two.
    pub fn with_dict_bits(mut self, bits: u32) -> Self {
        self.dict_size = 1u32.checked_shl(bits).unwrap_or(u32::MAX);
        self
    }

    pub fn with_fast_bytes(mut self, fast_bytes: u32) -> Self {
        self.fast_bytes = fast_bytes;
        self
    }

    pub fn with_algorithm(mut self, algorithm: u32) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_lc(mut self, lc: u32) -> Self {
        self.lc = lc;
        self
    }

    pub fn with_lp(mut self, lp: u32) -> Self {
        self.lp = lp;
        self
    }

    pub fn with_pb(mut self, pb: u32) -> Self {
        self.pb = pb;
        self
    }

    pub fn with_match_finder(mut self, match_finder: MatchFinderKind) -> Self {
        self.match_finder = match_finder;
        self
    }

    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Check every value against its bounds. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        check_range("dictionary size", self.dict_size, DICT_SIZE_MIN, DICT_SIZE_MAX)?;
        check_range("fast bytes", self.fast_bytes, FAST_BYTES_MIN, FAST_BYTES_MAX)?;
        check_range("algorithm", self.algorithm, 0, ALGORITHM_MAX)?;
        check_range("lc", self.lc, 0, LC_MAX)?;
        check_range("lp", self.lp, 0, LP_MAX)?;
        check_range("pb", self.pb, 0, PB_MAX)?;
        Ok(())
    }

    /// The subset of the options that goes into the stream header.
    pub fn properties(&self) -> LzmaProperties {
        LzmaProperties {
            lc: self.lc,
            lp: self.lp,
            pb: self.pb,
            dict_size: self.dict_size,
        }
    }

    /// Apply one loosely typed property. The options are left untouched on error.
    pub fn set_property(&mut self, id: CoderPropId, value: &PropValue) -> Result<()> {
        match id {
            CoderPropId::DictionarySize => {
                let value = expect_u32(value)?;
                check_range("dictionary size", value, DICT_SIZE_MIN, DICT_SIZE_MAX)?;
                self.dict_size = value;
            }
            CoderPropId::PosStateBits => {
                let value = expect_u32(value)?;
                check_range("pb", value, 0, PB_MAX)?;
                self.pb = value;
            }
            CoderPropId::LitContextBits => {
                let value = expect_u32(value)?;
                check_range("lc", value, 0, LC_MAX)?;
                self.lc = value;
            }
            CoderPropId::LitPosBits => {
                let value = expect_u32(value)?;
                check_range("lp", value, 0, LP_MAX)?;
                self.lp = value;
            }
            CoderPropId::Algorithm => {
                let value = expect_u32(value)?;
                check_range("algorithm", value, 0, ALGORITHM_MAX)?;
                self.algorithm = value;
            }
            CoderPropId::NumFastBytes => {
                let value = expect_u32(value)?;
                check_range("fast bytes", value, FAST_BYTES_MIN, FAST_BYTES_MAX)?;
                self.fast_bytes = value;
            }
            CoderPropId::MatchFinder => match value {
                PropValue::Str(name) => self.match_finder = name.parse()?,
                _ => return Err(LzmaError::Unsupported("match finder must be a string")),
            },
            CoderPropId::EndMarker => match value {
                PropValue::Bool(end_marker) => self.end_marker = *end_marker,
                _ => return Err(LzmaError::Unsupported("end marker must be a boolean")),
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = LzmaOptions::default();
        options.validate().unwrap();
        assert_eq!(options.properties(), LzmaProperties::default());
    }

    #[test]
    fn test_validate_rejects_without_clamping() {
        let options = LzmaOptions::default().with_fast_bytes(4);
        assert!(matches!(
            options.validate(),
            Err(LzmaError::OutOfRange {
                name: "fast bytes",
                value: 4,
                ..
            })
        ));
        assert_eq!(options.fast_bytes, 4);

        assert!(LzmaOptions::default().with_lc(9).validate().is_err());
        assert!(LzmaOptions::default().with_lp(5).validate().is_err());
        assert!(LzmaOptions::default().with_pb(5).validate().is_err());
        assert!(LzmaOptions::default().with_algorithm(3).validate().is_err());
        assert!(LzmaOptions::default().with_dict_bits(31).validate().is_err());
        assert!(LzmaOptions::default().with_dict_size(0).validate().is_err());
    }

    #[test]
    fn test_boundary_values_are_accepted() {
        LzmaOptions::default()
            .with_lc(8)
            .with_lp(4)
            .with_pb(4)
            .with_dict_bits(0)
            .with_fast_bytes(273)
            .validate()
            .unwrap();
        LzmaOptions::default()
            .with_dict_bits(30)
            .with_fast_bytes(5)
            .with_algorithm(0)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_set_property() {
        let mut options = LzmaOptions::default();
        options
            .set_property(CoderPropId::DictionarySize, &PropValue::U32(1 << 16))
            .unwrap();
        options
            .set_property(CoderPropId::MatchFinder, &"BT2".into())
            .unwrap();
        options
            .set_property(CoderPropId::EndMarker, &true.into())
            .unwrap();

        assert_eq!(options.dict_size, 1 << 16);
        assert_eq!(options.match_finder, MatchFinderKind::BT2);
        assert!(options.end_marker);
    }

    #[test]
    fn test_set_property_errors() {
        let mut options = LzmaOptions::default();

        let err = options
            .set_property(CoderPropId::LitContextBits, &PropValue::U32(9))
            .unwrap_err();
        assert!(matches!(err, LzmaError::OutOfRange { name: "lc", .. }));
        assert_eq!(options.lc, 3);

        let err = options
            .set_property(CoderPropId::NumFastBytes, &PropValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, LzmaError::Unsupported(_)));

        let err = options
            .set_property(CoderPropId::MatchFinder, &"hc4".into())
            .unwrap_err();
        assert!(matches!(err, LzmaError::Unsupported(_)));
    }
}
