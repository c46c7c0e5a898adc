use ddlkit_model::ValidationLevel;

/// Reasons a struct layout cannot be computed.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// No struct of that name exists.
    #[error("struct '{0}' not found")]
    UnknownStruct(String),

    /// The struct has not been validated or is invalid.
    #[error("struct '{name}' is not usable (validation level {level})")]
    NotUsable {
        name: String,
        level: ValidationLevel,
    },

    /// An element type does not resolve to a scalar, enum or struct.
    #[error("element '{element}' of struct '{name}' has unresolved type '{type_name}'")]
    UnresolvedType {
        name: String,
        element: String,
        type_name: String,
    },

    /// An element's total size does not fit the addressable range.
    #[error("element '{element}' of struct '{name}' exceeds {limit} bytes")]
    ElementTooLarge {
        name: String,
        element: String,
        limit: u64,
    },
}

pub type Result<T> = std::result::Result<T, LayoutError>;
