use std::collections::HashMap;
use std::sync::Arc;

use ddlkit_layout::{try_layout_of, ElementKind, Representation, StructLayout};
use ddlkit_model::{DataDefinition, EnumType};
use tracing::debug;

use crate::codec::{Codec, Decoder};
use crate::error::{CodecError, Result};
use crate::index::{collect_leaves, resolve_path, CodecIndex};
use crate::status::Status;

#[derive(Debug)]
struct Resolved {
    layout: Arc<StructLayout>,
    leaves: Arc<[CodecIndex]>,
    enums: HashMap<String, EnumType>,
}

/// Creates decoders and codecs for one struct type.
///
/// Holds everything it needs from the data definition, so it outlives the
/// definition and can be shared between threads.
#[derive(Debug)]
pub struct CodecFactory {
    struct_name: String,
    resolved: std::result::Result<Resolved, Status>,
}

impl CodecFactory {
    /// Factory for `struct_name`. Check [`is_valid`](Self::is_valid) before
    /// use; an invalid factory fails every operation.
    pub fn new(definition: &DataDefinition, struct_name: &str) -> Self {
        let resolved = Self::resolve_struct(definition, struct_name).map_err(|err| {
            debug!(struct_name, error = %err, "codec factory invalid");
            Status::from(&err)
        });
        Self {
            struct_name: struct_name.to_string(),
            resolved,
        }
    }

    /// Like [`new`](Self::new) but returns the failure.
    pub fn try_new(definition: &DataDefinition, struct_name: &str) -> Result<Self> {
        let resolved = Self::resolve_struct(definition, struct_name)?;
        Ok(Self {
            struct_name: struct_name.to_string(),
            resolved: Ok(resolved),
        })
    }

    fn resolve_struct(definition: &DataDefinition, struct_name: &str) -> Result<Resolved> {
        let layout = try_layout_of(definition, struct_name)?;
        let (leaves, _) = collect_leaves(&layout)?;
        let mut enums = HashMap::new();
        collect_enums(&layout, definition, &mut enums);
        Ok(Resolved {
            layout,
            leaves: leaves.into(),
            enums,
        })
    }

    fn resolved(&self) -> Result<&Resolved> {
        self.resolved
            .as_ref()
            .map_err(|_| CodecError::InvalidFactory(self.struct_name.clone()))
    }

    pub fn struct_name(&self) -> &str {
        &self.struct_name
    }

    pub fn is_valid(&self) -> bool {
        self.resolved.is_ok()
    }

    /// Why the factory is invalid, or [`Status::OK`].
    pub fn status(&self) -> Status {
        match &self.resolved {
            Ok(_) => Status::OK,
            Err(status) => status.clone(),
        }
    }

    pub fn layout(&self) -> Result<&Arc<StructLayout>> {
        Ok(&self.resolved()?.layout)
    }

    /// Leaves with a static position. For structs with dynamic arrays these
    /// are the leaves before the first dynamic array.
    pub fn elements(&self) -> std::slice::Iter<'_, CodecIndex> {
        match &self.resolved {
            Ok(resolved) => resolved.leaves.iter(),
            Err(_) => std::slice::Iter::default(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements().len()
    }

    pub fn resolve(&self, path: &str) -> Result<CodecIndex> {
        resolve_path(&self.resolved()?.layout, path)
    }

    pub fn resolve_leaf(&self, index: usize) -> Result<&CodecIndex> {
        let leaves = &self.resolved()?.leaves;
        leaves.get(index).ok_or(CodecError::IndexOutOfRange {
            index,
            count: leaves.len(),
        })
    }

    /// Size of a buffer of this struct; `None` when it has dynamic arrays.
    pub fn static_buffer_size(&self, representation: Representation) -> Option<usize> {
        self.resolved.as_ref().ok()?.layout.size(representation)
    }

    pub fn has_dynamic_arrays(&self) -> bool {
        self.resolved
            .as_ref()
            .is_ok_and(|r| r.layout.has_dynamic_arrays())
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.resolved.as_ref().ok()?.enums.get(name)
    }

    pub fn make_decoder<'a>(
        &'a self,
        buffer: &'a [u8],
        representation: Representation,
    ) -> Result<Decoder<'a>> {
        Decoder::new(self, buffer, representation)
    }

    pub fn make_codec<'a>(
        &'a self,
        buffer: &'a mut [u8],
        representation: Representation,
    ) -> Result<Codec<'a>> {
        Codec::new(self, buffer, representation)
    }

    pub(crate) fn static_parts(&self) -> Result<(&Arc<StructLayout>, &Arc<[CodecIndex]>)> {
        let resolved = self.resolved()?;
        Ok((&resolved.layout, &resolved.leaves))
    }
}

fn collect_enums(
    layout: &StructLayout,
    definition: &DataDefinition,
    out: &mut HashMap<String, EnumType>,
) {
    for element in &layout.elements {
        match &element.kind {
            ElementKind::Enum { name, .. } => {
                if let Some(enum_type) = definition.get::<EnumType>(name) {
                    out.entry(name.clone()).or_insert_with(|| enum_type.clone());
                }
            }
            ElementKind::Struct(nested) => collect_enums(nested, definition, out),
            ElementKind::Scalar(_) => {}
        }
    }
}
