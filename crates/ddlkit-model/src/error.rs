use std::fmt;

use serde::Serialize;

use crate::entity::EntityKind;

/// Errors that can occur while building or loading a data definition.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The name is already used in the entity's namespace.
    #[error("name collision: {kind} '{name}' already exists")]
    NameCollision { kind: EntityKind, name: String },

    /// The named entity does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// A subscriber refused a rename; nothing was changed.
    #[error("rename of {kind} '{old}' to '{new}' rejected: {reason}")]
    RenameRejected {
        kind: EntityKind,
        old: String,
        new: String,
        reason: String,
    },

    /// The document as a whole cannot be interpreted as a data definition.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// The document declares a language version this crate does not know.
    #[error("unsupported language version '{0}'")]
    UnsupportedVersion(String),

    /// The definition uses a feature the target version cannot express.
    #[error("not representable in language version {version}: {reason}")]
    Unrepresentable { version: String, reason: String },

    /// The document exceeds the configured size limit.
    #[error("document too large ({size} bytes, max {max})")]
    DocumentTooLarge { size: usize, max: usize },

    /// The XML text could not be parsed.
    #[error("xml error: {0}")]
    Xml(String),

    /// Reading a document from disk failed.
    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for ModelError {
    fn from(err: quick_xml::Error) -> Self {
        ModelError::Xml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// A structural problem found while loading or validating a definition.
///
/// Problems are collected rather than returned as errors so that a mostly
/// valid document stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    /// Where the problem was found, e.g. `struct 'Pos' element 'x'`.
    pub context: String,
    pub message: String,
}

impl Problem {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}
