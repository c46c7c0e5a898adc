use ddlkit_layout::{ElementKind, Representation, ScalarType, StructLayout};
use ddlkit_model::ByteOrder;
use serde::Serialize;

use crate::error::{CodecError, Result};

/// Buffer independent access descriptor of one leaf element.
///
/// Offsets are absolute within the top level struct, so one index can be
/// used with every buffer of that struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodecIndex {
    pub path: String,
    pub scalar: ScalarType,
    /// Enum type name for enum elements.
    pub enum_name: Option<String>,
    pub serialized_bit_offset: u64,
    pub serialized_bit_count: u64,
    pub byte_order: ByteOrder,
    pub deserialized_offset: usize,
    pub deserialized_size: usize,
    pub default_value: Option<String>,
    pub constant: Option<String>,
}

impl CodecIndex {
    /// First byte past the element in the given representation.
    pub fn end(&self, representation: Representation) -> usize {
        match representation {
            Representation::Serialized => {
                (self.serialized_bit_offset + self.serialized_bit_count).div_ceil(8) as usize
            }
            Representation::Deserialized => self.deserialized_offset + self.deserialized_size,
        }
    }
}

/// Split `name[3]` into its name and index.
fn parse_segment<'p>(segment: &'p str, path: &str) -> Result<(&'p str, Option<usize>)> {
    let malformed = || CodecError::MalformedPath(path.to_string());
    match segment.find('[') {
        None => {
            if segment.is_empty() || segment.contains(']') {
                return Err(malformed());
            }
            Ok((segment, None))
        }
        Some(open) => {
            let inner = segment[open + 1..]
                .strip_suffix(']')
                .ok_or_else(malformed)?;
            let index = inner.trim().parse::<usize>().map_err(|_| malformed())?;
            let name = &segment[..open];
            if name.is_empty() {
                return Err(malformed());
            }
            Ok((name, Some(index)))
        }
    }
}

/// Resolve `a.b[2].c` (or `a/b[2]/c`) against `layout`.
///
/// Indices are zero based. A path without an index on an array element
/// addresses its first entry.
pub fn resolve_path(layout: &StructLayout, path: &str) -> Result<CodecIndex> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let segments: Vec<&str> = trimmed.split(['.', '/']).collect();
    if trimmed.is_empty() {
        return Err(CodecError::MalformedPath(path.to_string()));
    }

    let mut current = layout;
    let mut serialized = 0u64;
    let mut deserialized = 0usize;
    for (position, segment) in segments.iter().enumerate() {
        let (name, index) = parse_segment(segment, path)?;
        let element = current
            .element(name)
            .ok_or_else(|| CodecError::PathNotFound(path.to_string()))?;
        let unresolved = || CodecError::UnresolvedOffset(path.to_string());
        let count = element.count().ok_or_else(unresolved)? as usize;
        let index = index.unwrap_or(0);
        if index >= count {
            return Err(CodecError::IndexOutOfRange { index, count });
        }

        let bit_offset = element.serialized_bit_offset.ok_or_else(unresolved)?;
        let entry_bits = element.serialized_entry_bits.ok_or_else(unresolved)?;
        let offset = element.deserialized_offset.ok_or_else(unresolved)?;
        let entry_size = element.deserialized_entry_size.ok_or_else(unresolved)?;
        serialized += bit_offset + index as u64 * entry_bits;
        deserialized += offset + index * entry_size;

        let last = position + 1 == segments.len();
        match &element.kind {
            ElementKind::Struct(nested) => {
                if last {
                    return Err(CodecError::NotALeaf(path.to_string()));
                }
                current = &**nested;
            }
            ElementKind::Scalar(scalar) | ElementKind::Enum { scalar, .. } => {
                if !last {
                    return Err(CodecError::PathNotFound(path.to_string()));
                }
                return Ok(CodecIndex {
                    path: path.to_string(),
                    scalar: *scalar,
                    enum_name: match &element.kind {
                        ElementKind::Enum { name, .. } => Some(name.clone()),
                        _ => None,
                    },
                    serialized_bit_offset: serialized,
                    serialized_bit_count: entry_bits.min(64),
                    byte_order: element.byte_order,
                    deserialized_offset: deserialized,
                    deserialized_size: entry_size,
                    default_value: element.default_value.clone(),
                    constant: element.constant.clone(),
                });
            }
        }
    }
    Err(CodecError::PathNotFound(path.to_string()))
}

/// Upper bound for the number of expanded leaves of one struct.
pub const MAX_LEAF_COUNT: usize = 1 << 20;

/// Every leaf of `layout` in element order, arrays expanded.
///
/// Stops at the first element whose offset is unknown and reports whether
/// the list is complete. Fails once more than [`MAX_LEAF_COUNT`] leaves
/// would be expanded.
pub(crate) fn collect_leaves(layout: &StructLayout) -> Result<(Vec<CodecIndex>, bool)> {
    let mut out = Vec::new();
    let complete = collect_into(layout, "", 0, 0, &mut out)?;
    Ok((out, complete))
}

fn collect_into(
    layout: &StructLayout,
    prefix: &str,
    serialized_base: u64,
    deserialized_base: usize,
    out: &mut Vec<CodecIndex>,
) -> Result<bool> {
    for element in &layout.elements {
        let (Some(count), Some(bit_offset), Some(entry_bits), Some(offset), Some(entry_size)) = (
            element.count(),
            element.serialized_bit_offset,
            element.serialized_entry_bits,
            element.deserialized_offset,
            element.deserialized_entry_size,
        ) else {
            return Ok(false);
        };
        for entry in 0..count as usize {
            let path = if count == 1 {
                format!("{prefix}{}", element.name)
            } else {
                format!("{prefix}{}[{entry}]", element.name)
            };
            let serialized = serialized_base + bit_offset + entry as u64 * entry_bits;
            let deserialized = deserialized_base + offset + entry * entry_size;
            match &element.kind {
                ElementKind::Struct(nested) => {
                    if !collect_into(nested, &format!("{path}."), serialized, deserialized, out)? {
                        return Ok(false);
                    }
                }
                ElementKind::Scalar(scalar) | ElementKind::Enum { scalar, .. } => {
                    if out.len() >= MAX_LEAF_COUNT {
                        return Err(CodecError::TooManyElements {
                            limit: MAX_LEAF_COUNT,
                        });
                    }
                    out.push(CodecIndex {
                        path,
                        scalar: *scalar,
                        enum_name: match &element.kind {
                            ElementKind::Enum { name, .. } => Some(name.clone()),
                            _ => None,
                        },
                        serialized_bit_offset: serialized,
                        serialized_bit_count: entry_bits.min(64),
                        byte_order: element.byte_order,
                        deserialized_offset: deserialized,
                        deserialized_size: entry_size,
                        default_value: element.default_value.clone(),
                        constant: element.constant.clone(),
                    });
                }
            }
        }
    }
    Ok(true)
}
