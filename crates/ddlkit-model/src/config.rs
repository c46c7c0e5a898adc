use crate::version::DdlVersion;

/// Controls how schema documents are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// When true, the first malformed fragment fails the whole load.
    pub strict: bool,
    /// Maximum bytes accepted for one document.
    pub max_document_size: usize,
    /// When true, predefined scalar types, SI units and prefixes are added
    /// before the document is read (document entries replace them).
    pub merge_predefined: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_document_size: 16 * 1024 * 1024,
            merge_predefined: false,
        }
    }
}

/// Controls how schema documents are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Target language version; `None` keeps the header's version.
    pub version: Option<DdlVersion>,
    /// Emit the `<streammetatypes>` section (4.0 and later only).
    pub include_stream_meta_types: bool,
    /// Spaces per indentation level; zero writes a single line.
    pub indent: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            version: None,
            include_stream_meta_types: true,
            indent: 2,
        }
    }
}
