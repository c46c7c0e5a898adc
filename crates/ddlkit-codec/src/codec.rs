use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use ddlkit_layout::{Representation, StructLayout};
use tracing::trace;

use crate::access::{read, read_raw, read_value, write, write_raw, write_value};
use crate::error::{CodecError, Result};
use crate::factory::CodecFactory;
use crate::index::{collect_leaves, resolve_path, CodecIndex};
use crate::value::{CodecScalar, Value};

/// Something that identifies a leaf: its position or a resolved index.
pub trait LeafRef {
    fn locate<'s>(&'s self, leaves: &'s [CodecIndex]) -> Result<&'s CodecIndex>;
}

impl LeafRef for usize {
    fn locate<'s>(&'s self, leaves: &'s [CodecIndex]) -> Result<&'s CodecIndex> {
        leaves.get(*self).ok_or(CodecError::IndexOutOfRange {
            index: *self,
            count: leaves.len(),
        })
    }
}

impl LeafRef for CodecIndex {
    fn locate<'s>(&'s self, _leaves: &'s [CodecIndex]) -> Result<&'s CodecIndex> {
        Ok(self)
    }
}

impl<T: LeafRef + ?Sized> LeafRef for &T {
    fn locate<'s>(&'s self, leaves: &'s [CodecIndex]) -> Result<&'s CodecIndex> {
        (**self).locate(leaves)
    }
}

/// Apply the dynamic array counts stored in `buffer`.
///
/// Counts are read in element order, so the size of a later array may sit
/// behind an earlier one.
fn instantiate(
    layout: &Arc<StructLayout>,
    leaves: &Arc<[CodecIndex]>,
    buffer: &[u8],
    representation: Representation,
) -> Result<(Arc<StructLayout>, Arc<[CodecIndex]>)> {
    if !layout.has_dynamic_arrays() {
        return Ok((Arc::clone(layout), Arc::clone(leaves)));
    }
    let mut counts = HashMap::new();
    let mut current = Arc::clone(layout);
    while let Some(next) = current.dynamic_arrays().into_iter().next() {
        let size_index = resolve_path(&current, &next.size_path)?;
        let raw = read_value(buffer, &size_index, representation)?.as_u64();
        let count = u32::try_from(raw)
            .ok()
            .filter(|count| (*count as usize) <= buffer.len().saturating_mul(8))
            .ok_or(CodecError::BufferTooSmall {
                required: raw.div_ceil(8) as usize,
                actual: buffer.len(),
            })?;
        trace!(array = %next.path, count, "dynamic array size");
        counts.insert(next.path, count);
        current = Arc::new(layout.instantiate(&counts));
    }
    let (leaves, _) = collect_leaves(&current)?;
    Ok((current, leaves.into()))
}

fn required_size(layout: &StructLayout, leaves: &[CodecIndex], representation: Representation) -> usize {
    layout.size(representation).unwrap_or_else(|| {
        leaves
            .iter()
            .map(|leaf| leaf.end(representation))
            .max()
            .unwrap_or(0)
    })
}

/// Read access to one buffer of a struct.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    factory: &'a CodecFactory,
    layout: Arc<StructLayout>,
    leaves: Arc<[CodecIndex]>,
    buffer: &'a [u8],
    representation: Representation,
}

impl<'a> Decoder<'a> {
    /// Bind `buffer`. Fails with `BufferTooSmall` when the buffer is shorter
    /// than the struct, dynamic array counts included.
    pub fn new(
        factory: &'a CodecFactory,
        buffer: &'a [u8],
        representation: Representation,
    ) -> Result<Self> {
        let (layout, leaves) = factory.static_parts()?;
        let (layout, leaves) = instantiate(layout, leaves, buffer, representation)?;
        let required = required_size(&layout, &leaves, representation);
        if buffer.len() < required {
            return Err(CodecError::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            factory,
            layout,
            leaves,
            buffer,
            representation,
        })
    }

    pub fn factory(&self) -> &'a CodecFactory {
        self.factory
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Layout with this buffer's dynamic array counts applied.
    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    pub fn element_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn elements(&self) -> std::slice::Iter<'_, CodecIndex> {
        self.leaves.iter()
    }

    /// Size of this buffer's content in either representation.
    pub fn buffer_size(&self, representation: Representation) -> usize {
        required_size(&self.layout, &self.leaves, representation)
    }

    pub fn resolve(&self, path: &str) -> Result<CodecIndex> {
        resolve_path(&self.layout, path)
    }

    /// Stored bytes of a byte aligned element; bit fields come back as
    /// their value in little endian order.
    pub fn get_raw<L: LeafRef>(&self, leaf: L) -> Result<Bytes> {
        let index = leaf.locate(&self.leaves)?;
        raw_bytes(self.buffer, index, self.representation)
    }

    pub fn get_value<L: LeafRef>(&self, leaf: L) -> Result<Value> {
        let index = leaf.locate(&self.leaves)?;
        read_value(self.buffer, index, self.representation)
    }

    pub fn get<T: CodecScalar, L: LeafRef>(&self, leaf: L) -> Result<T> {
        let index = leaf.locate(&self.leaves)?;
        read(self.buffer, index, self.representation)
    }

    pub fn get_by_path(&self, path: &str) -> Result<Value> {
        let index = self.resolve(path)?;
        read_value(self.buffer, &index, self.representation)
    }

    /// Symbolic name of an enum element's current value.
    pub fn get_enum_name<L: LeafRef>(&self, leaf: L) -> Result<Option<String>> {
        let index = leaf.locate(&self.leaves)?;
        enum_name(self.factory, self.buffer, index, self.representation)
    }
}

/// Read and write access to one buffer of a struct.
///
/// Dynamic array counts are read when the codec is created; changing a
/// size element afterwards needs a new codec.
#[derive(Debug)]
pub struct Codec<'a> {
    factory: &'a CodecFactory,
    layout: Arc<StructLayout>,
    leaves: Arc<[CodecIndex]>,
    buffer: &'a mut [u8],
    representation: Representation,
}

impl<'a> Codec<'a> {
    pub fn new(
        factory: &'a CodecFactory,
        buffer: &'a mut [u8],
        representation: Representation,
    ) -> Result<Self> {
        let (layout, leaves) = factory.static_parts()?;
        let (layout, leaves) = instantiate(layout, leaves, buffer, representation)?;
        let required = required_size(&layout, &leaves, representation);
        if buffer.len() < required {
            return Err(CodecError::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            factory,
            layout,
            leaves,
            buffer,
            representation,
        })
    }

    /// Read view of the same buffer.
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder {
            factory: self.factory,
            layout: Arc::clone(&self.layout),
            leaves: Arc::clone(&self.leaves),
            buffer: &*self.buffer,
            representation: self.representation,
        }
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    pub fn element_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn elements(&self) -> std::slice::Iter<'_, CodecIndex> {
        self.leaves.iter()
    }

    pub fn buffer_size(&self, representation: Representation) -> usize {
        required_size(&self.layout, &self.leaves, representation)
    }

    pub fn resolve(&self, path: &str) -> Result<CodecIndex> {
        resolve_path(&self.layout, path)
    }

    pub fn get_raw<L: LeafRef>(&self, leaf: L) -> Result<Bytes> {
        let index = leaf.locate(&self.leaves)?;
        raw_bytes(self.buffer, index, self.representation)
    }

    pub fn get_value<L: LeafRef>(&self, leaf: L) -> Result<Value> {
        let index = leaf.locate(&self.leaves)?;
        read_value(self.buffer, index, self.representation)
    }

    pub fn get<T: CodecScalar, L: LeafRef>(&self, leaf: L) -> Result<T> {
        let index = leaf.locate(&self.leaves)?;
        read(self.buffer, index, self.representation)
    }

    pub fn get_by_path(&self, path: &str) -> Result<Value> {
        let index = self.resolve(path)?;
        read_value(self.buffer, &index, self.representation)
    }

    pub fn get_enum_name<L: LeafRef>(&self, leaf: L) -> Result<Option<String>> {
        let index = leaf.locate(&self.leaves)?;
        enum_name(self.factory, self.buffer, index, self.representation)
    }

    /// Store the raw form returned by [`get_raw`](Self::get_raw).
    pub fn set_raw<L: LeafRef>(&mut self, leaf: L, bytes: &[u8]) -> Result<()> {
        let index = leaf.locate(&self.leaves)?;
        let expected = raw_len(index, self.representation);
        if bytes.len() != expected {
            return Err(CodecError::TypeMismatch {
                path: index.path.clone(),
                reason: format!("raw value has {} bytes, element has {expected}", bytes.len()),
            });
        }
        match aligned_range(index, self.representation) {
            Some(range) => {
                let actual = self.buffer.len();
                self.buffer
                    .get_mut(range.clone())
                    .ok_or(CodecError::BufferTooSmall {
                        required: range.end,
                        actual,
                    })?
                    .copy_from_slice(bytes);
                Ok(())
            }
            None => {
                let mut raw = [0u8; 8];
                raw[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
                write_raw(self.buffer, index, self.representation, u64::from_le_bytes(raw))
            }
        }
    }

    pub fn set_value<L: LeafRef>(&mut self, leaf: L, value: Value) -> Result<()> {
        let index = leaf.locate(&self.leaves)?;
        write_value(self.buffer, index, self.representation, value)
    }

    pub fn set<T: CodecScalar, L: LeafRef>(&mut self, leaf: L, value: T) -> Result<()> {
        let index = leaf.locate(&self.leaves)?;
        write(self.buffer, index, self.representation, value)
    }

    pub fn set_by_path(&mut self, path: &str, value: Value) -> Result<()> {
        let index = self.resolve(path)?;
        write_value(self.buffer, &index, self.representation, value)
    }

    /// Write every element default, then every constant.
    ///
    /// Defaults may be numeric literals or enumerator names.
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        let leaves = Arc::clone(&self.leaves);
        for index in leaves.iter() {
            if let Some(text) = &index.default_value {
                let value = literal(self.factory, index, text)?;
                write_value(self.buffer, index, self.representation, value)?;
            }
        }
        for index in leaves.iter() {
            if let Some(text) = &index.constant {
                let value = literal(self.factory, index, text)?;
                write_value(self.buffer, index, self.representation, value)?;
            }
        }
        Ok(())
    }
}

fn literal(factory: &CodecFactory, index: &CodecIndex, text: &str) -> Result<Value> {
    Value::parse(index.scalar, text)
        .or_else(|| {
            let enum_type = factory.enum_type(index.enum_name.as_deref()?)?;
            Value::parse(index.scalar, enum_type.value_of(text.trim())?)
        })
        .ok_or_else(|| CodecError::InvalidValue {
            path: index.path.clone(),
            value: text.to_string(),
        })
}

fn enum_name(
    factory: &CodecFactory,
    buffer: &[u8],
    index: &CodecIndex,
    representation: Representation,
) -> Result<Option<String>> {
    let Some(enum_type) = index.enum_name.as_deref().and_then(|n| factory.enum_type(n)) else {
        return Ok(None);
    };
    let value = read_value(buffer, index, representation)?;
    Ok(enum_type
        .elements
        .iter()
        .find(|e| Value::parse(index.scalar, &e.value) == Some(value))
        .map(|e| e.name.clone()))
}

fn aligned_range(index: &CodecIndex, representation: Representation) -> Option<std::ops::Range<usize>> {
    match representation {
        Representation::Deserialized => {
            Some(index.deserialized_offset..index.deserialized_offset + index.deserialized_size)
        }
        Representation::Serialized => {
            if index.serialized_bit_offset % 8 != 0 || index.serialized_bit_count % 8 != 0 {
                return None;
            }
            let start = (index.serialized_bit_offset / 8) as usize;
            Some(start..start + (index.serialized_bit_count / 8) as usize)
        }
    }
}

fn raw_len(index: &CodecIndex, representation: Representation) -> usize {
    match representation {
        Representation::Deserialized => index.deserialized_size,
        Representation::Serialized => index.serialized_bit_count.div_ceil(8) as usize,
    }
}

fn raw_bytes(buffer: &[u8], index: &CodecIndex, representation: Representation) -> Result<Bytes> {
    match aligned_range(index, representation) {
        Some(range) => buffer
            .get(range.clone())
            .map(Bytes::copy_from_slice)
            .ok_or(CodecError::BufferTooSmall {
                required: range.end,
                actual: buffer.len(),
            }),
        None => {
            let raw = read_raw(buffer, index, representation)?;
            let len = raw_len(index, representation);
            Ok(Bytes::copy_from_slice(&raw.to_le_bytes()[..len.min(8)]))
        }
    }
}
