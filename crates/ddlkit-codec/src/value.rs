use std::fmt;

use ddlkit_layout::ScalarType;
use serde::Serialize;

/// A scalar element value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

macro_rules! cast_number {
    ($value:expr, $target:ty) => {
        match $value {
            Value::Int(v) => v as $target,
            Value::UInt(v) => v as $target,
            Value::Float(v) => v as $target,
            Value::Bool(_) => return None,
        }
    };
}

impl Value {
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Bool(b) => f64::from(u8::from(b)),
            Value::Int(v) => v as f64,
            Value::UInt(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Bool(b) => i64::from(b),
            Value::Int(v) => v,
            Value::UInt(v) => v as i64,
            Value::Float(v) => v as i64,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            Value::Bool(b) => u64::from(b),
            Value::Int(v) => v as u64,
            Value::UInt(v) => v,
            Value::Float(v) => v as u64,
        }
    }

    /// Convert to the value domain of `scalar` with `as` cast semantics.
    ///
    /// Returns `None` when a boolean meets a numeric type.
    pub fn cast(self, scalar: ScalarType) -> Option<Value> {
        let value = match scalar {
            ScalarType::Bool => match self {
                Value::Bool(b) => Value::Bool(b),
                _ => return None,
            },
            ScalarType::Char | ScalarType::Int8 => Value::Int(i64::from(cast_number!(self, i8))),
            ScalarType::Int16 => Value::Int(i64::from(cast_number!(self, i16))),
            ScalarType::Int32 => Value::Int(i64::from(cast_number!(self, i32))),
            ScalarType::Int64 => Value::Int(cast_number!(self, i64)),
            ScalarType::UInt8 => Value::UInt(u64::from(cast_number!(self, u8))),
            ScalarType::UInt16 => Value::UInt(u64::from(cast_number!(self, u16))),
            ScalarType::UInt32 => Value::UInt(u64::from(cast_number!(self, u32))),
            ScalarType::UInt64 => Value::UInt(cast_number!(self, u64)),
            ScalarType::Float32 => Value::Float(f64::from(cast_number!(self, f32))),
            ScalarType::Float64 => Value::Float(cast_number!(self, f64)),
        };
        Some(value)
    }

    /// Parse a literal such as a default or constant attribute.
    ///
    /// Integers accept a `0x` prefix, booleans accept `true`/`false` and
    /// `1`/`0`.
    pub fn parse(scalar: ScalarType, text: &str) -> Option<Value> {
        let text = text.trim();
        if scalar == ScalarType::Bool {
            return match text {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            };
        }
        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Value::UInt(u64::from_str_radix(hex, 16).ok()?)
        } else if let Ok(v) = text.parse::<i64>() {
            Value::Int(v)
        } else if let Ok(v) = text.parse::<u64>() {
            Value::UInt(v)
        } else {
            Value::Float(text.parse::<f64>().ok()?)
        };
        parsed.cast(scalar)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Rust scalar types that can be read from and written to elements.
///
/// When an element's stored form equals the native form of `Self`, access
/// copies memory directly; everything else goes through [`Value`].
pub trait CodecScalar: Copy + Send + Sync + 'static {
    const SCALAR: ScalarType;

    fn from_value(value: Value) -> Option<Self>;
    fn into_value(self) -> Value;
    /// `bytes` has exactly the native size of `Self`.
    fn read_ne(bytes: &[u8]) -> Self;
    fn write_ne(self, out: &mut [u8]);
}

macro_rules! codec_scalar {
    ($($ty:ty => $scalar:ident, $variant:ident, $wide:ty;)*) => {$(
        impl CodecScalar for $ty {
            const SCALAR: ScalarType = ScalarType::$scalar;

            fn from_value(value: Value) -> Option<Self> {
                Some(cast_number!(value, $ty))
            }

            fn into_value(self) -> Value {
                Value::$variant(self as $wide)
            }

            fn read_ne(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(raw)
            }

            fn write_ne(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }
        }
    )*};
}

codec_scalar! {
    i8 => Int8, Int, i64;
    u8 => UInt8, UInt, u64;
    i16 => Int16, Int, i64;
    u16 => UInt16, UInt, u64;
    i32 => Int32, Int, i64;
    u32 => UInt32, UInt, u64;
    i64 => Int64, Int, i64;
    u64 => UInt64, UInt, u64;
    f32 => Float32, Float, f64;
    f64 => Float64, Float, f64;
}

impl CodecScalar for bool {
    const SCALAR: ScalarType = ScalarType::Bool;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn read_ne(bytes: &[u8]) -> Self {
        bytes.first().is_some_and(|b| *b != 0)
    }

    fn write_ne(self, out: &mut [u8]) {
        if let Some(byte) = out.first_mut() {
            *byte = u8::from(self);
        }
    }
}
