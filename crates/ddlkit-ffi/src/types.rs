use std::ffi::c_void;

use ddlkit_codec::{CodecFactory, ResultCode};
use ddlkit_layout::{Representation, ScalarType};
use ddlkit_model::DataDefinition;

/// Result of every fallible export. Zero is success, failures are negative
/// and equal to the codec result codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlResult {
    Ok = 0,
    Unexpected = -3,
    InvalidArgument = -5,
    InvalidIndex = -10,
    Memory = -12,
    NotSupported = -19,
    NotFound = -20,
    NotInitialized = -37,
    Failed = -38,
    InvalidState = -40,
    InvalidType = -42,
    OutOfRange = -49,
    Internal = -99,
}

impl From<ResultCode> for DdlResult {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Ok => DdlResult::Ok,
            ResultCode::Unexpected => DdlResult::Unexpected,
            ResultCode::InvalidArg => DdlResult::InvalidArgument,
            ResultCode::InvalidIndex => DdlResult::InvalidIndex,
            ResultCode::Memory => DdlResult::Memory,
            ResultCode::NotSupported => DdlResult::NotSupported,
            ResultCode::NotFound => DdlResult::NotFound,
            ResultCode::NotInitialized => DdlResult::NotInitialized,
            ResultCode::Failed => DdlResult::Failed,
            ResultCode::InvalidState => DdlResult::InvalidState,
            ResultCode::InvalidType => DdlResult::InvalidType,
            ResultCode::OutOfRange => DdlResult::OutOfRange,
        }
    }
}

#[allow(dead_code)]
pub const DDL_OK: DdlResult = DdlResult::Ok;
#[allow(dead_code)]
pub const DDL_ERR_INVALID_ARGUMENT: DdlResult = DdlResult::InvalidArgument;
#[allow(dead_code)]
pub const DDL_ERR_INVALID_INDEX: DdlResult = DdlResult::InvalidIndex;
#[allow(dead_code)]
pub const DDL_ERR_NOT_FOUND: DdlResult = DdlResult::NotFound;
#[allow(dead_code)]
pub const DDL_ERR_NOT_INITIALIZED: DdlResult = DdlResult::NotInitialized;
#[allow(dead_code)]
pub const DDL_ERR_INVALID_TYPE: DdlResult = DdlResult::InvalidType;
#[allow(dead_code)]
pub const DDL_ERR_OUT_OF_RANGE: DdlResult = DdlResult::OutOfRange;
#[allow(dead_code)]
pub const DDL_ERR_INTERNAL: DdlResult = DdlResult::Internal;

pub const DDL_SERIALIZED: i32 = 0;
pub const DDL_DESERIALIZED: i32 = 1;

pub(crate) fn representation_arg(value: i32) -> Option<Representation> {
    match value {
        DDL_SERIALIZED => Some(Representation::Serialized),
        DDL_DESERIALIZED => Some(Representation::Deserialized),
        _ => None,
    }
}

/// Location and type of one resolved element.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdlElementInfo {
    pub serialized_bit_offset: u64,
    pub serialized_bit_count: u64,
    pub deserialized_offset: usize,
    pub deserialized_size: usize,
    /// Position in `Bool, Char, Int8, UInt8, ... Float32, Float64`.
    pub scalar_type: i32,
    /// Non-zero for enum elements.
    pub is_enum: i32,
}

pub(crate) fn scalar_code(scalar: ScalarType) -> i32 {
    match scalar {
        ScalarType::Bool => 0,
        ScalarType::Char => 1,
        ScalarType::Int8 => 2,
        ScalarType::UInt8 => 3,
        ScalarType::Int16 => 4,
        ScalarType::UInt16 => 5,
        ScalarType::Int32 => 6,
        ScalarType::UInt32 => 7,
        ScalarType::Int64 => 8,
        ScalarType::UInt64 => 9,
        ScalarType::Float32 => 10,
        ScalarType::Float64 => 11,
    }
}

pub type DdlDefinitionHandle = *mut c_void;
pub type DdlFactoryHandle = *mut c_void;

pub(crate) struct DefinitionHandle {
    pub(crate) definition: DataDefinition,
    pub(crate) problem_count: usize,
}

pub(crate) struct FactoryHandle {
    pub(crate) factory: CodecFactory,
}
