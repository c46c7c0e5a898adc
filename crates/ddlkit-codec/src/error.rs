use ddlkit_layout::LayoutError;

use crate::status::{ResultCode, Status};

/// Errors raised while resolving elements or accessing buffers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The struct has no usable layout.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// The factory was created for an unusable struct.
    #[error("codec factory for '{0}' is not valid")]
    InvalidFactory(String),

    /// No element matches the path.
    #[error("element '{0}' not found")]
    PathNotFound(String),

    /// An array index suffix is not a number or the path is empty.
    #[error("malformed element path '{0}'")]
    MalformedPath(String),

    /// The path ends at a struct instead of a scalar.
    #[error("element '{0}' is not a leaf")]
    NotALeaf(String),

    #[error("index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// An offset behind a dynamic array is still unknown.
    #[error("offset of '{0}' depends on an unknown dynamic array size")]
    UnresolvedOffset(String),

    #[error("buffer too small ({actual} bytes, need {required})")]
    BufferTooSmall { required: usize, actual: usize },

    /// Boolean and numeric values mixed, or a raw length mismatch.
    #[error("type mismatch for '{path}': {reason}")]
    TypeMismatch { path: String, reason: String },

    /// Expanding the struct's arrays yields too many leaves.
    #[error("struct expands to more than {limit} elements")]
    TooManyElements { limit: usize },

    /// A default or constant string does not parse for its element.
    #[error("invalid value '{value}' for '{path}'")]
    InvalidValue { path: String, value: String },
}

impl CodecError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            CodecError::Layout(LayoutError::UnknownStruct(_)) => ResultCode::NotFound,
            CodecError::Layout(LayoutError::ElementTooLarge { .. })
            | CodecError::TooManyElements { .. } => ResultCode::NotSupported,
            CodecError::Layout(_) | CodecError::InvalidFactory(_) => ResultCode::NotInitialized,
            CodecError::PathNotFound(_) => ResultCode::NotFound,
            CodecError::MalformedPath(_) | CodecError::NotALeaf(_) => ResultCode::InvalidArg,
            CodecError::IndexOutOfRange { .. } => ResultCode::InvalidIndex,
            CodecError::UnresolvedOffset(_) => ResultCode::NotSupported,
            CodecError::BufferTooSmall { .. } => ResultCode::OutOfRange,
            CodecError::TypeMismatch { .. } => ResultCode::InvalidType,
            CodecError::InvalidValue { .. } => ResultCode::InvalidArg,
        }
    }

    /// Negative numeric code of this error.
    pub fn code(&self) -> i32 {
        self.result_code().code()
    }
}

impl From<&CodecError> for Status {
    fn from(err: &CodecError) -> Self {
        Status::with_detail(err.result_code(), err.to_string())
    }
}

impl From<CodecError> for Status {
    fn from(err: CodecError) -> Self {
        Status::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
