//! Value types shared by the sampling and reporting subsystems.

use std::borrow::Cow;
use std::fmt;

/// A 128-bit trace identifier, split into two 64-bit halves.
///
/// The low half is the input to probabilistic sampling decisions; see
/// [`ProbabilisticSampler`](crate::sampler::ProbabilisticSampler).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceId {
    high: u64,
    low: u64,
}

impl TraceId {
    /// Construct a trace id from its high and low halves.
    pub const fn new(high: u64, low: u64) -> Self {
        TraceId { high, low }
    }

    /// Construct a trace id from a single 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        TraceId {
            high: (value >> 64) as u64,
            low: value as u64,
        }
    }

    /// The high 64 bits.
    pub const fn high(&self) -> u64 {
        self.high
    }

    /// The low 64 bits.
    pub const fn low(&self) -> u64 {
        self.low
    }

    /// The identifier as a single 128-bit value.
    pub const fn to_u128(&self) -> u128 {
        ((self.high as u128) << 64) | self.low as u128
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.to_u128())
    }
}

impl From<u128> for TraceId {
    fn from(value: u128) -> Self {
        TraceId::from_u128(value)
    }
}

/// The value of a [`Tag`].
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// A boolean value.
    Bool(bool),
    /// A signed 64-bit integer.
    I64(i64),
    /// A 64-bit float.
    F64(f64),
    /// A string value.
    String(String),
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::I64(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::F64(value)
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_owned())
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(v) => write!(f, "{}", v),
            TagValue::I64(v) => write!(f, "{}", v),
            TagValue::F64(v) => write!(f, "{}", v),
            TagValue::String(v) => f.write_str(v),
        }
    }
}

/// A key/value annotation attached to spans and sampling decisions.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    key: Cow<'static, str>,
    value: TagValue,
}

impl Tag {
    /// Create a tag. Tag keys must be non-empty; an empty key is replaced
    /// with `"unknown"` and reported through the diagnostics channel.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<TagValue>) -> Self {
        let key = key.into();
        let key = if key.is_empty() {
            tracing::warn!("discarding empty tag key");
            Cow::Borrowed("unknown")
        } else {
            key
        };
        Tag {
            key,
            value: value.into(),
        }
    }

    /// The tag key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tag value.
    pub fn value(&self) -> &TagValue {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_halves_round_trip() {
        let id = TraceId::from_u128(0x0123_4567_89ab_cdef_1122_3344_5566_7788);
        assert_eq!(id.high(), 0x0123_4567_89ab_cdef);
        assert_eq!(id.low(), 0x1122_3344_5566_7788);
        assert_eq!(TraceId::new(id.high(), id.low()), id);
        assert_eq!(id.to_u128(), 0x0123_4567_89ab_cdef_1122_3344_5566_7788);
    }

    #[test]
    fn trace_id_displays_as_padded_hex() {
        assert_eq!(
            TraceId::new(0, 42).to_string(),
            "0000000000000000000000000000002a"
        );
    }

    #[test]
    fn tag_value_conversions() {
        assert_eq!(TagValue::from(true), TagValue::Bool(true));
        assert_eq!(TagValue::from(7i64), TagValue::I64(7));
        assert_eq!(TagValue::from(0.5), TagValue::F64(0.5));
        assert_eq!(TagValue::from("x"), TagValue::String("x".to_owned()));
    }

    #[test]
    fn empty_tag_key_is_replaced() {
        let tag = Tag::new("", 1i64);
        assert_eq!(tag.key(), "unknown");
    }
}
