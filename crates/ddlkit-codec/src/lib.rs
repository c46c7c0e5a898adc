//! Element resolution and value access for ddlkit struct buffers.
//!
//! A [`CodecFactory`] resolves a struct once: element paths such as
//! `a.b[2].c` become [`CodecIndex`] descriptors that carry absolute offsets
//! in both representations. [`Decoder`] and [`Codec`] bind a factory to a
//! concrete buffer, reading dynamic array sizes from it, and give raw,
//! [`Value`] and typed access.
//!
//! Failures carry stable negative result codes; [`Status`] is the value
//! passed across outer boundaries.

pub mod access;
pub mod codec;
pub mod error;
pub mod factory;
pub mod index;
pub mod status;
pub mod transform;
pub mod value;

pub use codec::{Codec, Decoder, LeafRef};
pub use ddlkit_layout::Representation;
pub use error::{CodecError, Result};
pub use factory::CodecFactory;
pub use index::{resolve_path, CodecIndex, MAX_LEAF_COUNT};
pub use status::{ErrorDetail, ResultCode, Status};
pub use transform::transform;
pub use value::{CodecScalar, Value};
