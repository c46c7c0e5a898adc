//! Data definitions, binary layouts, codecs and signal mapping.
//!
//! ddlkit reads and writes data definition schema documents, computes the
//! serialized and deserialized layouts of their structs, gives typed access
//! to buffers of those structs and maps signals between struct instances.
//!
//! # Crate Structure
//!
//! - [`model`]: Units, data types, enums, structs and streams with validation
//! - [`layout`]: Serialized and deserialized struct layouts
//! - [`codec`]: Element paths, decoders and codecs over raw buffers
//! - [`mapping`]: Mapping configuration and runtime (behind `mapping` feature)

/// Re-export model types.
pub mod model {
    pub use ddlkit_model::*;
}

/// Re-export layout types.
pub mod layout {
    pub use ddlkit_layout::*;
}

/// Re-export codec types.
pub mod codec {
    pub use ddlkit_codec::*;
}

/// Re-export mapping types (requires `mapping` feature).
#[cfg(feature = "mapping")]
pub mod mapping {
    pub use ddlkit_mapping::*;
}
