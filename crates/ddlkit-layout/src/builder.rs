use std::sync::Arc;

use ddlkit_model::{
    ArraySize, DataDefinition, DataType, EntityKind, EntityRef, EnumType, Namespace, StructType,
};
use tracing::{debug, trace};

use crate::error::{LayoutError, Result};
use crate::layout::{ArraySpec, ElementKind, ElementLayout, StructLayout};
use crate::scalar::ScalarType;

/// Upper bound for the serialized size of one element, arrays included.
pub const MAX_ELEMENT_BYTES: u64 = u32::MAX as u64;

/// Layout of a validated struct, or `None` when it is unknown, not yet
/// validated or invalid.
///
/// Results are cached in the struct's extension map and dropped by the
/// model whenever the struct or anything it uses changes.
pub fn layout_of(definition: &DataDefinition, struct_name: &str) -> Option<Arc<StructLayout>> {
    match try_layout_of(definition, struct_name) {
        Ok(layout) => Some(layout),
        Err(err) => {
            debug!(struct_name, error = %err, "layout unavailable");
            None
        }
    }
}

pub fn try_layout_of(definition: &DataDefinition, struct_name: &str) -> Result<Arc<StructLayout>> {
    let entity = EntityRef::new(EntityKind::StructType, struct_name);
    let info = definition
        .info_of(&entity)
        .ok_or_else(|| LayoutError::UnknownStruct(struct_name.to_string()))?;
    if !info.level().is_usable() {
        return Err(LayoutError::NotUsable {
            name: struct_name.to_string(),
            level: info.level(),
        });
    }
    if let Some(cached) = info.extensions().get::<StructLayout>() {
        return Ok(cached);
    }
    let struct_type = definition
        .get::<StructType>(struct_name)
        .ok_or_else(|| LayoutError::UnknownStruct(struct_name.to_string()))?;
    let layout = Arc::new(build(definition, struct_type)?);
    info.extensions().insert(Arc::clone(&layout));
    trace!(
        struct_name,
        serialized = ?layout.serialized_size(),
        deserialized = ?layout.deserialized_size(),
        "layout computed"
    );
    Ok(layout)
}

fn build(definition: &DataDefinition, struct_type: &StructType) -> Result<StructLayout> {
    let mut elements = Vec::with_capacity(struct_type.elements.len());
    for element in &struct_type.elements {
        let unresolved = || LayoutError::UnresolvedType {
            name: struct_type.name.clone(),
            element: element.name.clone(),
            type_name: element.type_name.clone(),
        };

        let (kind, type_bits, type_default, multiplier) =
            match definition.kind_of(Namespace::Type, &element.type_name) {
                Some(EntityKind::DataType) => {
                    let data_type = definition
                        .get::<DataType>(&element.type_name)
                        .ok_or_else(unresolved)?;
                    (
                        ElementKind::Scalar(ScalarType::for_data_type(data_type)),
                        u64::from(data_type.bit_size),
                        data_type.default_value.clone(),
                        data_type.array_size.unwrap_or(1),
                    )
                }
                Some(EntityKind::EnumType) => {
                    let enum_type = definition
                        .get::<EnumType>(&element.type_name)
                        .ok_or_else(unresolved)?;
                    let data_type = definition
                        .get::<DataType>(&enum_type.data_type_name)
                        .ok_or_else(unresolved)?;
                    (
                        ElementKind::Enum {
                            name: enum_type.name.clone(),
                            scalar: ScalarType::for_data_type(data_type),
                        },
                        u64::from(data_type.bit_size),
                        data_type.default_value.clone(),
                        1,
                    )
                }
                Some(EntityKind::StructType) => {
                    let nested = try_layout_of(definition, &element.type_name)?;
                    let bits = nested.serialized_size().map(|bytes| bytes as u64 * 8);
                    (ElementKind::Struct(nested), bits.unwrap_or(0), None, 1)
                }
                _ => return Err(unresolved()),
            };

        let too_large = || LayoutError::ElementTooLarge {
            name: struct_type.name.clone(),
            element: element.name.clone(),
            limit: MAX_ELEMENT_BYTES,
        };
        let array = match &element.array_size {
            ArraySize::Fixed(n) => {
                ArraySpec::Fixed(n.checked_mul(multiplier).ok_or_else(too_large)?)
            }
            ArraySize::Dynamic(sibling) => ArraySpec::Dynamic(sibling.clone()),
        };

        let (serialized_entry_bits, deserialized_entry_size, natural_alignment) = match &kind {
            ElementKind::Scalar(scalar) | ElementKind::Enum { scalar, .. } => (
                Some(element.serialized.num_bits.map_or(type_bits, u64::from)),
                Some(scalar.byte_size()),
                scalar.alignment(),
            ),
            ElementKind::Struct(nested) => (
                nested.serialized_size().map(|_| type_bits),
                nested.deserialized_size(),
                nested.alignment,
            ),
        };

        if let ArraySpec::Fixed(count) = &array {
            let entry_bytes = serialized_entry_bits
                .unwrap_or(0)
                .div_ceil(8)
                .max(deserialized_entry_size.unwrap_or(0) as u64);
            match entry_bytes.checked_mul(u64::from(*count)) {
                Some(total) if total <= MAX_ELEMENT_BYTES => {}
                _ => return Err(too_large()),
            }
        }

        let explicit_bit_offset = element.serialized.byte_pos.map(|byte| {
            u64::from(byte) * 8 + u64::from(element.serialized.bit_pos.unwrap_or(0))
        });

        elements.push(ElementLayout {
            name: element.name.clone(),
            kind,
            array,
            byte_order: element.serialized.byte_order,
            serialized_bit_offset: None,
            serialized_entry_bits,
            deserialized_offset: None,
            deserialized_entry_size,
            alignment: element
                .deserialized
                .alignment
                .filter(|a| *a > 0)
                .map_or(natural_alignment, |a| a as usize),
            default_value: element.default_value.clone().or(type_default),
            constant: element.value.clone(),
            explicit_bit_offset,
        });
    }
    let explicit_alignment = struct_type.alignment.map(|a| a as usize);
    Ok(StructLayout::place(
        struct_type.name.clone(),
        elements,
        explicit_alignment,
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ddlkit_model::{ByteOrder, Element, ValidationLevel};

    use super::*;
    use crate::layout::Representation;

    fn definition() -> DataDefinition {
        let mut dd = DataDefinition::with_predefined();
        dd.add(
            StructType::new("Pos")
                .with_element(Element::new("x", "tInt32").at_byte(0))
                .with_element(Element::new("y", "tInt32").at_byte(4)),
        )
        .unwrap();
        dd.add(
            StructType::new("Mixed")
                .with_element(Element::new("flag", "tBool").at_byte(0))
                .with_element(Element::new("value", "tFloat64").at_byte(1))
                .with_element(Element::new("small", "tUInt16").at_byte(9)),
        )
        .unwrap();
        dd.add(
            StructType::new("Outer")
                .with_element(Element::new("id", "tUInt8").at_byte(0))
                .with_element(
                    Element::new("points", "Pos")
                        .at_byte(1)
                        .with_array(ArraySize::Fixed(2)),
                )
                .with_element(Element::new("tail", "tUInt16").at_byte(17)),
        )
        .unwrap();
        dd.add(
            StructType::new("Bits")
                .with_element(Element::new("a", "tUInt8").at_bit(0, 0).with_bits(3))
                .with_element(Element::new("b", "tUInt8").at_bit(0, 3).with_bits(5))
                .with_element(
                    Element::new("c", "tUInt16")
                        .at_byte(1)
                        .with_byte_order(ByteOrder::BigEndian),
                ),
        )
        .unwrap();
        dd.add(
            StructType::new("Dyn")
                .with_element(Element::new("n", "tUInt8").at_byte(0))
                .with_element(
                    Element::new("values", "tUInt16")
                        .at_byte(1)
                        .with_array(ArraySize::Dynamic("n".to_string())),
                )
                .with_element(Element::new("after", "tUInt32").at_byte(99)),
        )
        .unwrap();
        assert_eq!(dd.validate(), ValidationLevel::Valid);
        dd
    }

    #[test]
    fn flat_struct_offsets() {
        let dd = definition();
        let layout = layout_of(&dd, "Pos").unwrap();
        assert_eq!(layout.serialized_size(), Some(8));
        assert_eq!(layout.deserialized_size(), Some(8));
        let y = layout.element("y").unwrap();
        assert_eq!(y.serialized_bit_offset, Some(32));
        assert_eq!(y.deserialized_offset, Some(4));
    }

    #[test]
    fn deserialized_padding_differs_from_packed_wire() {
        let dd = definition();
        let layout = layout_of(&dd, "Mixed").unwrap();
        let value = layout.element("value").unwrap();
        assert_eq!(value.serialized_bit_offset, Some(8));
        assert_eq!(value.deserialized_offset, Some(8));
        let small = layout.element("small").unwrap();
        assert_eq!(small.deserialized_offset, Some(16));
        assert_eq!(layout.serialized_size(), Some(11));
        // 18 bytes rounded up to the 8 byte struct alignment.
        assert_eq!(layout.deserialized_size(), Some(24));
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn nested_fixed_arrays() {
        let dd = definition();
        let layout = layout_of(&dd, "Outer").unwrap();
        let points = layout.element("points").unwrap();
        assert_eq!(points.serialized_bits(), Some(128));
        assert_eq!(points.deserialized_offset, Some(4));
        assert_eq!(points.deserialized_size(), Some(16));
        let tail = layout.element("tail").unwrap();
        assert_eq!(tail.serialized_bit_offset, Some(17 * 8));
        assert_eq!(tail.deserialized_offset, Some(20));
        assert_eq!(layout.size(Representation::Serialized), Some(19));
        assert_eq!(layout.size(Representation::Deserialized), Some(24));
    }

    #[test]
    fn sub_byte_packing() {
        let dd = definition();
        let layout = layout_of(&dd, "Bits").unwrap();
        assert_eq!(layout.element("b").unwrap().serialized_bit_offset, Some(3));
        assert_eq!(layout.element("b").unwrap().serialized_entry_bits, Some(5));
        assert_eq!(layout.serialized_size(), Some(3));
        assert_eq!(
            layout.element("c").unwrap().byte_order,
            ByteOrder::BigEndian
        );
    }

    #[test]
    fn dynamic_arrays_leave_following_offsets_unset() {
        let dd = definition();
        let layout = layout_of(&dd, "Dyn").unwrap();
        assert!(layout.has_dynamic_arrays());
        assert_eq!(layout.element("values").unwrap().serialized_bit_offset, Some(8));
        assert_eq!(layout.element("after").unwrap().serialized_bit_offset, None);
        assert_eq!(layout.element("after").unwrap().deserialized_offset, None);
        assert_eq!(layout.serialized_size(), None);
        assert_eq!(
            layout.dynamic_arrays()[0].size_path,
            "n".to_string()
        );

        let counts = HashMap::from([("values".to_string(), 3u32)]);
        let instance = layout.instantiate(&counts);
        assert!(!instance.has_dynamic_arrays());
        let after = instance.element("after").unwrap();
        assert_eq!(after.serialized_bit_offset, Some(7 * 8));
        assert_eq!(after.deserialized_offset, Some(8));
        assert_eq!(instance.serialized_size(), Some(11));
        assert_eq!(instance.deserialized_size(), Some(12));
    }

    #[test]
    fn unvalidated_and_invalid_structs_have_no_layout() {
        let mut dd = definition();
        dd.add(StructType::new("Fresh").with_element(Element::new("a", "tUInt8")))
            .unwrap();
        assert!(layout_of(&dd, "Fresh").is_none());

        dd.add(StructType::new("Broken").with_element(Element::new("a", "Nope")))
            .unwrap();
        dd.validate();
        assert!(layout_of(&dd, "Fresh").is_some());
        assert!(matches!(
            try_layout_of(&dd, "Broken"),
            Err(LayoutError::NotUsable { .. })
        ));
    }

    #[test]
    fn oversized_arrays_are_rejected() {
        let mut dd = DataDefinition::with_predefined();
        let mut vector = DataType::new("tVec", 32);
        vector.array_size = Some(2);
        dd.add(vector).unwrap();
        dd.add(
            StructType::new("Overflow").with_element(
                Element::new("v", "tVec")
                    .at_byte(0)
                    .with_array(ArraySize::Fixed(3_000_000_000)),
            ),
        )
        .unwrap();
        dd.add(
            StructType::new("Huge").with_element(
                Element::new("v", "tFloat64")
                    .at_byte(0)
                    .with_array(ArraySize::Fixed(1 << 30)),
            ),
        )
        .unwrap();
        dd.add(
            StructType::new("Pair").with_element(
                Element::new("v", "tVec")
                    .at_byte(0)
                    .with_array(ArraySize::Fixed(3)),
            ),
        )
        .unwrap();
        dd.validate();

        for name in ["Overflow", "Huge"] {
            assert!(matches!(
                try_layout_of(&dd, name),
                Err(LayoutError::ElementTooLarge { .. })
            ));
            assert!(layout_of(&dd, name).is_none());
        }
        let pair = layout_of(&dd, "Pair").unwrap();
        assert_eq!(pair.element("v").unwrap().count(), Some(6));
        assert_eq!(pair.serialized_size(), Some(24));
    }

    #[test]
    fn layouts_are_cached_until_a_dependency_changes() {
        let mut dd = definition();
        let first = layout_of(&dd, "Outer").unwrap();
        let second = layout_of(&dd, "Outer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        dd.update_struct("Pos", |s| s.elements.push(Element::new("z", "tInt32").at_byte(8)))
            .unwrap();
        assert!(layout_of(&dd, "Outer").is_none());
        dd.validate();
        let third = layout_of(&dd, "Outer").unwrap();
        assert_eq!(third.element("points").unwrap().deserialized_size(), Some(24));
    }
}
