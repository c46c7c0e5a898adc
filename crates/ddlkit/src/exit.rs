use std::fmt;
use std::io;

use ddlkit_codec::CodecError;
use ddlkit_layout::LayoutError;
use ddlkit_mapping::MappingError;
use ddlkit_model::ModelError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn model_error(context: &str, err: ModelError) -> CliError {
    match err {
        ModelError::Io(source) => io_error(context, source),
        ModelError::MalformedDocument(_)
        | ModelError::UnsupportedVersion(_)
        | ModelError::Unrepresentable { .. }
        | ModelError::DocumentTooLarge { .. }
        | ModelError::Xml(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ModelError::NotFound { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn layout_error(context: &str, err: LayoutError) -> CliError {
    match err {
        LayoutError::UnknownStruct(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::Layout(LayoutError::UnknownStruct(_))
        | CodecError::PathNotFound(_)
        | CodecError::MalformedPath(_)
        | CodecError::NotALeaf(_)
        | CodecError::IndexOutOfRange { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn mapping_error(context: &str, err: MappingError) -> CliError {
    match err {
        MappingError::Model(err) => model_error(context, err),
        MappingError::Codec(err) => codec_error(context, err),
        MappingError::Io(source) => io_error(context, source),
        MappingError::Configuration(_)
        | MappingError::TypeNotFound(_)
        | MappingError::Unsupported(_)
        | MappingError::UnknownTransformation(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        MappingError::UnknownTarget(_) | MappingError::UnknownSource(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        MappingError::Host { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_exit_codes() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(io_error("read", missing).code, FAILURE);
        assert_eq!(
            model_error("read", ModelError::UnsupportedVersion("9.9".into())).code,
            DATA_INVALID
        );
        assert_eq!(
            codec_error("decode", CodecError::PathNotFound("x".into())).code,
            USAGE
        );
        let short = CodecError::BufferTooSmall {
            required: 8,
            actual: 2,
        };
        assert_eq!(codec_error("decode", short).code, DATA_INVALID);
        assert_eq!(
            mapping_error("map", MappingError::UnknownTarget("t".into())).code,
            USAGE
        );
        let err = mapping_error("map", MappingError::Configuration("bad".into()));
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(err.to_string(), "map: invalid mapping configuration: bad");
    }
}
