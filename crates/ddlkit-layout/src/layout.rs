use std::collections::HashMap;
use std::sync::Arc;

use ddlkit_model::ByteOrder;
use serde::Serialize;

use crate::scalar::ScalarType;

/// The two buffer representations a struct can be laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// Bit-packed wire layout with explicit byte order.
    Serialized,
    /// Naturally aligned host layout.
    Deserialized,
}

/// What an element stores.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Scalar(ScalarType),
    Enum { name: String, scalar: ScalarType },
    Struct(Arc<StructLayout>),
}

impl ElementKind {
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            ElementKind::Scalar(scalar) | ElementKind::Enum { scalar, .. } => Some(*scalar),
            ElementKind::Struct(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ArraySpec {
    Fixed(u32),
    /// Count is read from the named earlier sibling.
    Dynamic(String),
}

/// Placement of one element inside its struct.
///
/// Offsets are relative to the start of the struct and `None` once a
/// dynamic array precedes the element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementLayout {
    pub name: String,
    pub kind: ElementKind,
    pub array: ArraySpec,
    pub byte_order: ByteOrder,
    pub serialized_bit_offset: Option<u64>,
    /// Serialized bits of one array entry.
    pub serialized_entry_bits: Option<u64>,
    pub deserialized_offset: Option<usize>,
    /// Deserialized bytes of one array entry.
    pub deserialized_entry_size: Option<usize>,
    pub alignment: usize,
    pub default_value: Option<String>,
    pub constant: Option<String>,
    pub(crate) explicit_bit_offset: Option<u64>,
}

impl ElementLayout {
    pub fn count(&self) -> Option<u32> {
        match &self.array {
            ArraySpec::Fixed(n) => Some(*n),
            ArraySpec::Dynamic(_) => None,
        }
    }

    /// True for dynamic arrays and for nested structs containing one.
    pub fn is_dynamic(&self) -> bool {
        match (&self.array, &self.kind) {
            (ArraySpec::Dynamic(_), _) => true,
            (_, ElementKind::Struct(nested)) => nested.has_dynamic_arrays(),
            _ => false,
        }
    }

    pub fn serialized_bits(&self) -> Option<u64> {
        Some(self.serialized_entry_bits? * u64::from(self.count()?))
    }

    pub fn deserialized_size(&self) -> Option<usize> {
        Some(self.deserialized_entry_size? * self.count()? as usize)
    }

    pub fn offset(&self, representation: Representation) -> Option<usize> {
        match representation {
            Representation::Serialized => self
                .serialized_bit_offset
                .map(|bits| (bits / 8) as usize),
            Representation::Deserialized => self.deserialized_offset,
        }
    }

    pub fn entry_size(&self, representation: Representation) -> Option<usize> {
        match representation {
            Representation::Serialized => self
                .serialized_entry_bits
                .map(|bits| bits.div_ceil(8) as usize),
            Representation::Deserialized => self.deserialized_entry_size,
        }
    }
}

/// A dynamic array reachable from a struct without crossing another array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicArray {
    /// Dotted path of the array element.
    pub path: String,
    /// Dotted path of the element holding its count.
    pub size_path: String,
}

/// Computed layout of a struct in both representations.
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    pub name: String,
    pub elements: Vec<ElementLayout>,
    /// Deserialized alignment of the whole struct.
    pub alignment: usize,
    explicit_alignment: Option<usize>,
    serialized_bits: Option<u64>,
    deserialized_size: Option<usize>,
}

impl StructLayout {
    /// Place `elements` and compute the struct totals.
    pub(crate) fn place(
        name: String,
        mut elements: Vec<ElementLayout>,
        explicit_alignment: Option<usize>,
    ) -> Self {
        let mut serialized_cursor = Some(0u64);
        let mut serialized_end = Some(0u64);
        let mut deserialized_cursor = Some(0usize);
        let mut max_alignment = 1usize;

        for element in &mut elements {
            max_alignment = max_alignment.max(element.alignment);

            let start = serialized_cursor.map(|cursor| element.explicit_bit_offset.unwrap_or(cursor));
            element.serialized_bit_offset = start;
            serialized_cursor = match (start, element.serialized_bits()) {
                (Some(start), Some(bits)) => Some(start + bits),
                _ => None,
            };
            serialized_end = match (serialized_end, serialized_cursor) {
                (Some(end), Some(cursor)) => Some(end.max(cursor)),
                _ => None,
            };

            let start = deserialized_cursor.map(|cursor| align_up(cursor, element.alignment));
            element.deserialized_offset = start;
            deserialized_cursor = match (start, element.deserialized_size()) {
                (Some(start), Some(size)) => Some(start + size),
                _ => None,
            };
        }

        let alignment = explicit_alignment.unwrap_or(max_alignment).max(1);
        Self {
            name,
            elements,
            alignment,
            explicit_alignment,
            serialized_bits: serialized_end,
            deserialized_size: deserialized_cursor.map(|size| align_up(size, alignment)),
        }
    }

    pub fn element(&self, name: &str) -> Option<&ElementLayout> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn element_index(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    pub fn has_dynamic_arrays(&self) -> bool {
        self.elements.iter().any(ElementLayout::is_dynamic)
    }

    /// Static serialized size in bits; `None` with dynamic arrays.
    pub fn serialized_bits(&self) -> Option<u64> {
        self.serialized_bits
    }

    /// Static serialized size in whole bytes.
    pub fn serialized_size(&self) -> Option<usize> {
        self.serialized_bits.map(|bits| bits.div_ceil(8) as usize)
    }

    pub fn deserialized_size(&self) -> Option<usize> {
        self.deserialized_size
    }

    pub fn size(&self, representation: Representation) -> Option<usize> {
        match representation {
            Representation::Serialized => self.serialized_size(),
            Representation::Deserialized => self.deserialized_size(),
        }
    }

    /// Dynamic arrays in element order, descending into nested structs
    /// that are not themselves arrays.
    pub fn dynamic_arrays(&self) -> Vec<DynamicArray> {
        let mut out = Vec::new();
        self.collect_dynamic("", &mut out);
        out
    }

    fn collect_dynamic(&self, prefix: &str, out: &mut Vec<DynamicArray>) {
        for element in &self.elements {
            let path = format!("{prefix}{}", element.name);
            if let ArraySpec::Dynamic(size_element) = &element.array {
                out.push(DynamicArray {
                    path: path.clone(),
                    size_path: format!("{prefix}{size_element}"),
                });
            }
            if let (ElementKind::Struct(nested), ArraySpec::Fixed(1)) = (&element.kind, &element.array) {
                nested.collect_dynamic(&format!("{path}."), out);
            }
        }
    }

    /// Layout with the given dynamic array counts applied.
    ///
    /// `counts` is keyed by the dotted path of the array element. Arrays
    /// without a count stay dynamic, so everything after them stays unset.
    /// Elements following a dynamic array are packed contiguously in the
    /// serialized representation.
    pub fn instantiate(&self, counts: &HashMap<String, u32>) -> StructLayout {
        self.instantiate_at("", counts)
    }

    fn instantiate_at(&self, prefix: &str, counts: &HashMap<String, u32>) -> StructLayout {
        let mut after_dynamic = false;
        let elements = self
            .elements
            .iter()
            .map(|element| {
                let mut element = element.clone();
                let was_dynamic = element.is_dynamic();
                if after_dynamic {
                    element.explicit_bit_offset = None;
                }
                let path = format!("{prefix}{}", element.name);
                if let ArraySpec::Dynamic(_) = element.array {
                    if let Some(count) = counts.get(&path) {
                        element.array = ArraySpec::Fixed(*count);
                    }
                }
                if let (ElementKind::Struct(nested), ArraySpec::Fixed(1)) =
                    (&element.kind, &element.array)
                {
                    if nested.has_dynamic_arrays() {
                        let nested = nested.instantiate_at(&format!("{path}."), counts);
                        element.serialized_entry_bits = nested.serialized_size().map(|b| b as u64 * 8);
                        element.deserialized_entry_size = nested.deserialized_size();
                        element.kind = ElementKind::Struct(Arc::new(nested));
                    }
                }
                after_dynamic |= was_dynamic;
                element
            })
            .collect();
        StructLayout::place(self.name.clone(), elements, self.explicit_alignment)
    }
}

pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiples() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(9, 8), 16);
        assert_eq!(align_up(7, 1), 7);
    }
}
