//! Layout computation for ddlkit structs.
//!
//! Every validated struct has two layouts: the bit-packed serialized wire
//! layout with per-element byte order, and the naturally aligned
//! deserialized host layout. [`layout_of`] computes both and caches the
//! result on the struct, where the model drops it again on any change.
//!
//! Offsets behind a dynamic array are unknown until the array counts are
//! known; [`StructLayout::instantiate`] applies them.

pub mod builder;
pub mod error;
pub mod layout;
pub mod scalar;

pub use builder::{layout_of, try_layout_of};
pub use error::{LayoutError, Result};
pub use layout::{
    ArraySpec, DynamicArray, ElementKind, ElementLayout, Representation, StructLayout,
};
pub use scalar::ScalarType;
