//! Typed attribute values exchanged between the data model and drivers.
//!
//! Every attribute is declared with an [`AttributeType`]; a value is only
//! accepted when its tag matches the declaration. Nothing is ever widened or
//! narrowed implicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type EndpointId = u16;
pub type ClusterId = u32;
pub type AttributeId = u32;
pub type CommandId = u32;

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AttributeType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bytes,
    Utf8,
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    Utf8(String),
    Null,
}

impl AttributeValue {
    /// Tag of this value, `None` for [`AttributeValue::Null`].
    pub fn attribute_type(&self) -> Option<AttributeType> {
        let kind = match self {
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::U8(_) => AttributeType::U8,
            AttributeValue::U16(_) => AttributeType::U16,
            AttributeValue::U32(_) => AttributeType::U32,
            AttributeValue::U64(_) => AttributeType::U64,
            AttributeValue::I8(_) => AttributeType::I8,
            AttributeValue::I16(_) => AttributeType::I16,
            AttributeValue::I32(_) => AttributeType::I32,
            AttributeValue::I64(_) => AttributeType::I64,
            AttributeValue::F32(_) => AttributeType::F32,
            AttributeValue::F64(_) => AttributeType::F64,
            AttributeValue::Bytes(_) => AttributeType::Bytes,
            AttributeValue::Utf8(_) => AttributeType::Utf8,
            AttributeValue::Null => return None,
        };
        Some(kind)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of any integer variant, used for range checks.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AttributeValue::U8(v) => Some(v.into()),
            AttributeValue::U16(v) => Some(v.into()),
            AttributeValue::U32(v) => Some(v.into()),
            AttributeValue::U64(v) => i64::try_from(v).ok(),
            AttributeValue::I8(v) => Some(v.into()),
            AttributeValue::I16(v) => Some(v.into()),
            AttributeValue::I32(v) => Some(v.into()),
            AttributeValue::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            AttributeValue::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            AttributeValue::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            AttributeValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Utf8(v) => Some(v),
            _ => None,
        }
    }

    /// Parse `text` as a value of the declared type.
    ///
    /// `null` parses to [`AttributeValue::Null`] for every type; nullability is
    /// checked later against the attribute declaration. Byte strings are hex.
    pub fn parse(kind: AttributeType, text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("null") {
            return Ok(AttributeValue::Null);
        }

        fn num<T: FromStr>(text: &str) -> Result<T, String>
        where
            T::Err: fmt::Display,
        {
            text.parse::<T>().map_err(|e| format!("{text}: {e}"))
        }

        let value = match kind {
            AttributeType::Bool => match text {
                "true" | "1" | "on" => AttributeValue::Bool(true),
                "false" | "0" | "off" => AttributeValue::Bool(false),
                _ => return Err(format!("not a boolean: {text}")),
            },
            AttributeType::U8 => AttributeValue::U8(num(text)?),
            AttributeType::U16 => AttributeValue::U16(num(text)?),
            AttributeType::U32 => AttributeValue::U32(num(text)?),
            AttributeType::U64 => AttributeValue::U64(num(text)?),
            AttributeType::I8 => AttributeValue::I8(num(text)?),
            AttributeType::I16 => AttributeValue::I16(num(text)?),
            AttributeType::I32 => AttributeValue::I32(num(text)?),
            AttributeType::I64 => AttributeValue::I64(num(text)?),
            AttributeType::F32 => AttributeValue::F32(num(text)?),
            AttributeType::F64 => AttributeValue::F64(num(text)?),
            AttributeType::Bytes => AttributeValue::Bytes(parse_hex(text)?),
            AttributeType::Utf8 => AttributeValue::Utf8(text.to_string()),
        };
        Ok(value)
    }

    /// Parse the `type:value` form used for command arguments, e.g. `u8:128`.
    pub fn parse_typed(text: &str) -> Result<Self, String> {
        let (kind, value) = text
            .split_once(':')
            .ok_or_else(|| format!("expected type:value, got {text}"))?;
        let kind = AttributeType::from_str(kind).map_err(|_| format!("unknown type: {kind}"))?;
        Self::parse(kind, value)
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    if !text.is_ascii() || text.len() % 2 != 0 {
        return Err(format!("not a hex byte string: {text}"));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16).map_err(|e| format!("{text}: {e}"))
        })
        .collect()
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::U8(v) => write!(f, "{v}"),
            AttributeValue::U16(v) => write!(f, "{v}"),
            AttributeValue::U32(v) => write!(f, "{v}"),
            AttributeValue::U64(v) => write!(f, "{v}"),
            AttributeValue::I8(v) => write!(f, "{v}"),
            AttributeValue::I16(v) => write!(f, "{v}"),
            AttributeValue::I32(v) => write!(f, "{v}"),
            AttributeValue::I64(v) => write!(f, "{v}"),
            AttributeValue::F32(v) => write!(f, "{v}"),
            AttributeValue::F64(v) => write!(f, "{v}"),
            AttributeValue::Bytes(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            AttributeValue::Utf8(v) => write!(f, "\"{v}\""),
            AttributeValue::Null => write!(f, "null"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
    String => Utf8,
);

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Utf8(value.to_string())
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttributeValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_reflects_variant() {
        assert_eq!(
            AttributeValue::U8(3).attribute_type(),
            Some(AttributeType::U8)
        );
        assert_eq!(
            AttributeValue::from("x").attribute_type(),
            Some(AttributeType::Utf8)
        );
        assert_eq!(AttributeValue::Null.attribute_type(), None);
    }

    #[test]
    fn test_parse_respects_declared_type() {
        assert_eq!(
            AttributeValue::parse(AttributeType::U8, "128"),
            Ok(AttributeValue::U8(128))
        );
        assert!(AttributeValue::parse(AttributeType::U8, "256").is_err());
        assert_eq!(
            AttributeValue::parse(AttributeType::Bool, "off"),
            Ok(AttributeValue::Bool(false))
        );
        assert_eq!(
            AttributeValue::parse(AttributeType::U16, "null"),
            Ok(AttributeValue::Null)
        );
        assert_eq!(
            AttributeValue::parse(AttributeType::Bytes, "0aff"),
            Ok(AttributeValue::Bytes(vec![0x0a, 0xff]))
        );
    }

    #[test]
    fn test_parse_typed() {
        assert_eq!(
            AttributeValue::parse_typed("u16:250"),
            Ok(AttributeValue::U16(250))
        );
        assert!(AttributeValue::parse_typed("250").is_err());
        assert!(AttributeValue::parse_typed("u7:1").is_err());
    }

    #[test]
    fn test_option_maps_to_null() {
        assert_eq!(AttributeValue::from(None::<u8>), AttributeValue::Null);
        assert_eq!(AttributeValue::from(Some(5u8)), AttributeValue::U8(5));
    }

    #[test]
    fn test_as_i64_does_not_cross_families() {
        assert_eq!(AttributeValue::I8(-3).as_i64(), Some(-3));
        assert_eq!(AttributeValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(AttributeValue::Bool(true).as_i64(), None);
    }
}
