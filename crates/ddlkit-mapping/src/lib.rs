//! Signal mapping between ddlkit struct instances.
//!
//! A [`MapConfiguration`] names sources, targets, per-element assignments,
//! triggers and transformations. A [`MappingEngine`] maps targets on demand:
//! samples delivered through [`MappingEngine::on_sample_received`] are
//! copied (and transformed) into target buffers, and triggers transmit
//! those buffers through the host's [`MappingEnvironment`].
//!
//! # Features
//!
//! - `async`: [`TokioTimer`] drives periodic triggers on a tokio runtime.

pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
mod runtime;
pub mod transformation;

#[cfg(feature = "async")]
pub mod timer;

pub use config::{
    AssignmentSource, Comparator, EngineConfig, MapAssignment, MapConfiguration, MapFunction,
    MapHeader, MapSource, MapTarget, MapTransformation, MapTrigger,
};
pub use engine::MappingEngine;
pub use environment::{MappingEnvironment, PeriodicListener, TargetHandle};
pub use error::{MappingError, Result};
pub use transformation::{EnumTable, Polynomial, Transformation};

#[cfg(feature = "async")]
pub use timer::TokioTimer;
