//! Dynamically typed bridge arguments.
//!
//! Tags 0-4 are fixed by the wire format and shared with every host
//! implementation. Do not renumber.

use std::fmt;

use bytes::Bytes;

use crate::error::CodecError;

/// Wire type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// No value (missing or undefined argument).
    Absent = 0,
    /// One-byte boolean.
    Boolean = 1,
    /// UTF-8 text.
    Text = 2,
    /// 8-byte big-endian IEEE-754 double.
    Number = 3,
    /// Raw bytes.
    Bytes = 4,
}

impl Tag {
    /// Returns a human-readable name for the tag.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Absent => "absent",
            Tag::Boolean => "boolean",
            Tag::Text => "text",
            Tag::Number => "number",
            Tag::Bytes => "bytes",
        }
    }
}

impl TryFrom<u8> for Tag {
    type Error = CodecError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Tag::Absent),
            1 => Ok(Tag::Boolean),
            2 => Ok(Tag::Text),
            3 => Ok(Tag::Number),
            4 => Ok(Tag::Bytes),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

/// One self-describing argument.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Absent,
    Boolean(bool),
    Text(String),
    Number(f64),
    Bytes(Bytes),
}

impl Value {
    /// The wire tag for this value.
    pub fn tag(&self) -> Tag {
        match self {
            Value::Absent => Tag::Absent,
            Value::Boolean(_) => Tag::Boolean,
            Value::Text(_) => Tag::Text,
            Value::Number(_) => Tag::Number,
            Value::Bytes(_) => Tag::Bytes,
        }
    }

    /// Length of the payload on the wire (excluding the 5-byte header).
    pub fn payload_len(&self) -> usize {
        match self {
            Value::Absent => 0,
            Value::Boolean(_) => 1,
            Value::Text(text) => text.len(),
            Value::Number(_) => 8,
            Value::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Consume the value and return its text, if it is text.
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("absent"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(f64::from(n))
                }
            }
        )*
    };
}

number_from!(f32, i8, i16, i32, u8, u16, u32);

impl From<Bytes> for Value {
    fn from(bytes: Bytes) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Absent, Into::into)
    }
}
