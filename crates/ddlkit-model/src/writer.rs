use std::path::Path;

use tracing::debug;

use crate::config::WriterConfig;
use crate::definition::DataDefinition;
use crate::document::{Node, XmlDocument};
use crate::entity::Element;
use crate::error::{ModelError, Result};
use crate::version::DdlVersion;

/// Writes a data definition as a schema document of a chosen version.
#[derive(Debug, Clone, Default)]
pub struct DdlWriter {
    config: WriterConfig,
}

impl DdlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WriterConfig) -> Self {
        Self { config }
    }

    /// Version the document will be written in.
    pub fn target_version(&self, definition: &DataDefinition) -> DdlVersion {
        self.config
            .version
            .or_else(|| definition.header().language_version.parse().ok())
            .unwrap_or(DdlVersion::LATEST)
    }

    pub fn write_string(&self, definition: &DataDefinition) -> Result<String> {
        let root = self.to_node(definition)?;
        XmlDocument::new(root).to_xml_string(self.config.indent)
    }

    pub fn write_file(&self, definition: &DataDefinition, path: &Path) -> Result<()> {
        let text = self.write_string(definition)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "schema document written");
        Ok(())
    }

    pub fn to_node(&self, definition: &DataDefinition) -> Result<Node> {
        let version = self.target_version(definition);
        let mut root = Node::new("adtf:ddl").with_attribute("xmlns:adtf", "adtf");

        let header = definition.header();
        let node = root.create_child("header");
        node.create_child("language_version")
            .set_data(version.as_str());
        node.create_child("author").set_data(header.author.as_str());
        node.create_child("date_creation")
            .set_data(header.date_creation.as_str());
        node.create_child("date_change")
            .set_data(header.date_change.as_str());
        node.create_child("description")
            .set_data(header.description.as_str());
        for ext in &header.ext_declarations {
            let child = node.create_child("ext_declaration");
            child.set_attribute("key", ext.key.as_str());
            child.set_attribute("value", ext.value.as_str());
        }

        let units = root.create_child("units");
        for unit in definition.base_units().iter() {
            let node = units.create_child("baseunit");
            node.set_attribute("name", unit.name.as_str());
            node.set_attribute("symbol", unit.symbol.as_str());
            node.set_attribute("description", unit.description.as_str());
        }
        for prefix in definition.prefixes().iter() {
            let node = units.create_child("prefixes");
            node.set_attribute("name", prefix.name.as_str());
            node.set_attribute("symbol", prefix.symbol.as_str());
            node.set_attribute("power", prefix.power.to_string());
        }
        for unit in definition.units().iter() {
            let node = units.create_child("unit");
            node.set_attribute("name", unit.name.as_str());
            node.create_child("numerator").set_data(unit.numerator.as_str());
            node.create_child("denominator")
                .set_data(unit.denominator.as_str());
            node.create_child("offset").set_data(unit.offset.as_str());
            for ref_unit in &unit.ref_units {
                let child = node.create_child("refUnit");
                child.set_attribute("name", ref_unit.unit_name.as_str());
                child.set_attribute("power", ref_unit.power.to_string());
                child.set_attribute("prefix", ref_unit.prefix_name.as_str());
            }
        }

        let data_types = root.create_child("datatypes");
        for data_type in definition.data_types().iter() {
            let node = data_types.create_child("datatype");
            node.set_attribute(version.data_type_name_attribute(), data_type.name.as_str());
            node.set_attribute("size", data_type.bit_size.to_string());
            if !data_type.description.is_empty() {
                node.set_attribute("description", data_type.description.as_str());
            }
            if let Some(array_size) = data_type.array_size {
                node.set_attribute("arraysize", array_size.to_string());
            }
            set_opt(node, "unit", &data_type.unit_name);
            if version.supports_value_ranges() {
                set_opt(node, "min", &data_type.minimum);
                set_opt(node, "max", &data_type.maximum);
                set_opt(node, "default", &data_type.default_value);
            }
        }

        let enums = root.create_child("enums");
        for enum_type in definition.enums().iter() {
            let node = enums.create_child("enum");
            node.set_attribute("name", enum_type.name.as_str());
            node.set_attribute("type", enum_type.data_type_name.as_str());
            for element in &enum_type.elements {
                let child = node.create_child("element");
                child.set_attribute("name", element.name.as_str());
                child.set_attribute("value", element.value.as_str());
            }
        }

        let structs = root.create_child("structs");
        for struct_type in definition.structs().iter() {
            let node = structs.create_child("struct");
            node.set_attribute("name", struct_type.name.as_str());
            node.set_attribute("version", struct_type.version.as_str());
            if let Some(alignment) = struct_type.alignment {
                node.set_attribute("alignment", alignment.to_string());
            }
            if !struct_type.comment.is_empty() {
                node.set_attribute("comment", struct_type.comment.as_str());
            }
            set_opt(node, "ddlversion", &struct_type.language_version);
            for element in &struct_type.elements {
                node.push_child(element_node(element, version)?);
            }
        }

        if version.supports_stream_meta_types()
            && self.config.include_stream_meta_types
            && !definition.stream_meta_types().is_empty()
        {
            let metas = root.create_child("streammetatypes");
            for meta in definition.stream_meta_types().iter() {
                let node = metas.create_child("streammetatype");
                node.set_attribute("name", meta.name.as_str());
                node.set_attribute("version", meta.version.as_str());
                set_opt(node, "parent", &meta.parent);
                for property in &meta.properties {
                    let child = node.create_child("property");
                    child.set_attribute("name", property.name.as_str());
                    child.set_attribute("type", property.type_name.as_str());
                }
            }
        }

        let streams = root.create_child("streams");
        for stream in definition.streams().iter() {
            let node = streams.create_child("stream");
            node.set_attribute("name", stream.name.as_str());
            node.set_attribute("type", stream.struct_name.as_str());
            if !stream.description.is_empty() {
                node.set_attribute("description", stream.description.as_str());
            }
            for entry in &stream.structs {
                let child = node.create_child("struct");
                child.set_attribute("name", entry.name.as_str());
                child.set_attribute("type", entry.type_name.as_str());
                child.set_attribute("bytepos", entry.byte_pos.to_string());
            }
        }

        Ok(root)
    }
}

fn element_node(element: &Element, version: DdlVersion) -> Result<Node> {
    let mut node = Node::new("element")
        .with_attribute("name", element.name.as_str())
        .with_attribute("type", element.type_name.as_str());
    if element.array_size.is_dynamic() && !version.supports_dynamic_arrays() {
        return Err(ModelError::Unrepresentable {
            version: version.to_string(),
            reason: format!("element '{}' is a dynamic array", element.name),
        });
    }
    node.set_attribute("arraysize", element.array_size.to_string());
    set_opt(&mut node, "unit", &element.unit_name);
    if !element.description.is_empty() {
        node.set_attribute("description", element.description.as_str());
    }
    if !element.comment.is_empty() {
        node.set_attribute("comment", element.comment.as_str());
    }
    set_opt(&mut node, "value", &element.value);
    if version.supports_value_ranges() {
        set_opt(&mut node, "min", &element.minimum);
        set_opt(&mut node, "max", &element.maximum);
        set_opt(&mut node, "default", &element.default_value);
        set_opt(&mut node, "scale", &element.scale);
        set_opt(&mut node, "offset", &element.offset);
    }

    let serialized = &element.serialized;
    let mut layout = Node::new("serialized");
    if let Some(byte_pos) = serialized.byte_pos {
        layout.set_attribute("bytepos", byte_pos.to_string());
    }
    if let Some(bit_pos) = serialized.bit_pos {
        layout.set_attribute("bitpos", bit_pos.to_string());
    }
    if let Some(num_bits) = serialized.num_bits {
        layout.set_attribute("numbits", num_bits.to_string());
    }
    layout.set_attribute("byteorder", serialized.byte_order.as_str());
    let alignment = element.deserialized.alignment.map(|a| a.to_string());

    if version.has_layout_children() {
        node.push_child(layout);
        let deserialized = node.create_child("deserialized");
        if let Some(alignment) = alignment {
            deserialized.set_attribute("alignment", alignment);
        }
    } else {
        for (key, value) in layout.attributes() {
            node.set_attribute(key, value);
        }
        if let Some(alignment) = alignment {
            node.set_attribute("alignment", alignment);
        }
    }
    Ok(node)
}

fn set_opt(node: &mut Node, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        node.set_attribute(key, value.as_str());
    }
}
