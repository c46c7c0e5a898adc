use ddlkit_codec::{CodecError, ResultCode, Status};
use ddlkit_model::ModelError;

/// Errors raised by the mapping configuration and runtime.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The configuration document is not a mapping or misses required parts.
    #[error("invalid mapping configuration: {0}")]
    Configuration(String),

    #[error("target '{0}' is not configured")]
    UnknownTarget(String),

    #[error("source '{0}' is not configured")]
    UnknownSource(String),

    #[error("transformation '{0}' is not defined")]
    UnknownTransformation(String),

    /// The host could not provide a usable description of a type.
    #[error("type '{0}' cannot be resolved")]
    TypeNotFound(String),

    #[error("{0}")]
    Unsupported(String),

    /// The call is not allowed in the current engine state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("target '{0}' is already mapped")]
    AlreadyMapped(String),

    #[error("unknown target handle {0}")]
    InvalidHandle(u64),

    /// The host environment refused a registration.
    #[error("host rejected {what}: {status}")]
    Host { what: String, status: Status },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MappingError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            MappingError::Model(_) | MappingError::Configuration(_) => ResultCode::InvalidArg,
            MappingError::Codec(err) => err.result_code(),
            MappingError::UnknownTarget(_)
            | MappingError::UnknownSource(_)
            | MappingError::UnknownTransformation(_) => ResultCode::NotFound,
            MappingError::TypeNotFound(_) => ResultCode::InvalidType,
            MappingError::Unsupported(_) => ResultCode::NotSupported,
            MappingError::InvalidState(_) | MappingError::AlreadyMapped(_) => {
                ResultCode::InvalidState
            }
            MappingError::InvalidHandle(_) => ResultCode::InvalidArg,
            MappingError::Host { status, .. } => {
                status.result_code().unwrap_or(ResultCode::Failed)
            }
            MappingError::Io(_) => ResultCode::Failed,
        }
    }

    pub fn code(&self) -> i32 {
        self.result_code().code()
    }
}

impl From<&MappingError> for Status {
    fn from(err: &MappingError) -> Self {
        Status::with_detail(err.result_code(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
