//! Data definition model for ddlkit schemas.
//!
//! A [`DataDefinition`] holds units, scalar data types, enums, structs,
//! stream meta types and streams. Names are unique per namespace, every
//! reference between entities is tracked in a reverse dependency graph, and
//! structural changes reset the validation state of exactly the entities
//! that depend on what changed.
//!
//! Schema documents of language versions 1.0 to 4.1 are read with
//! [`DdlReader`] and written with [`DdlWriter`].

pub mod collection;
pub mod config;
pub mod definition;
pub mod dependency;
pub mod document;
pub mod entity;
pub mod error;
pub mod events;
pub mod extension;
pub mod predefined;
pub mod reader;
pub mod validation;
pub mod version;
pub mod writer;

pub use collection::{Collection, EntityInfo};
pub use config::{ReaderConfig, WriterConfig};
pub use definition::DataDefinition;
pub use dependency::{DependencyGraph, DependencyKind, EntityRef};
pub use document::{Node, XmlDocument};
pub use entity::{
    ArraySize, BaseUnit, ByteOrder, DataType, DeserializedInfo, Element, Entity, EntityKind,
    EnumElement, EnumType, ExtDeclaration, Header, Namespace, Property, RefUnit, Reference,
    SerializedInfo, Stream, StreamMetaType, StreamStruct, StructType, Unit, UnitPrefix,
};
pub use error::{ModelError, Problem, Result};
pub use events::{ChangeCode, EventFilter, EventResponse, ModelEvent, SubscriptionId};
pub use extension::Extensions;
pub use reader::{DdlReader, Loaded};
pub use validation::ValidationLevel;
pub use version::DdlVersion;
pub use writer::DdlWriter;
