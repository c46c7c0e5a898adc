use std::fmt;

use ddlkit_model::DataType;
use serde::Serialize;

/// Machine scalar an element is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Scalar behind a predefined type name such as `tInt32` or `uint8_t`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let scalar = match name {
            "tBool" | "bool" => ScalarType::Bool,
            "tChar" | "char" => ScalarType::Char,
            "tInt8" | "int8_t" => ScalarType::Int8,
            "tUInt8" | "uint8_t" => ScalarType::UInt8,
            "tInt16" | "int16_t" => ScalarType::Int16,
            "tUInt16" | "uint16_t" => ScalarType::UInt16,
            "tInt32" | "int32_t" => ScalarType::Int32,
            "tUInt32" | "uint32_t" => ScalarType::UInt32,
            "tInt64" | "int64_t" => ScalarType::Int64,
            "tUInt64" | "uint64_t" => ScalarType::UInt64,
            "tFloat32" | "float" => ScalarType::Float32,
            "tFloat64" | "double" => ScalarType::Float64,
            _ => return None,
        };
        Some(scalar)
    }

    /// Predefined names map directly; any other data type is an unsigned
    /// integer wide enough for its bit size.
    pub fn for_data_type(data_type: &DataType) -> Self {
        Self::from_type_name(&data_type.name)
            .unwrap_or_else(|| Self::unsigned_for_bits(data_type.bit_size))
    }

    pub fn unsigned_for_bits(bits: u32) -> Self {
        match bits {
            0..=8 => ScalarType::UInt8,
            9..=16 => ScalarType::UInt16,
            17..=32 => ScalarType::UInt32,
            _ => ScalarType::UInt64,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Char | ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }

    pub fn bit_size(self) -> u32 {
        self.byte_size() as u32 * 8
    }

    /// Natural in-memory alignment.
    pub fn alignment(self) -> usize {
        self.byte_size()
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::Int8
                | ScalarType::Int16
                | ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Float32
                | ScalarType::Float64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }

    pub fn is_integer(self) -> bool {
        !self.is_float() && self != ScalarType::Bool
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Char => "char",
            ScalarType::Int8 => "int8",
            ScalarType::UInt8 => "uint8",
            ScalarType::Int16 => "int16",
            ScalarType::UInt16 => "uint16",
            ScalarType::Int32 => "int32",
            ScalarType::UInt32 => "uint32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt64 => "uint64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
