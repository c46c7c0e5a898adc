use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::definition::DataDefinition;
use crate::document::{Node, XmlDocument};
use crate::entity::{
    ArraySize, BaseUnit, ByteOrder, DataType, Element, Entity, EnumType, ExtDeclaration, Header,
    Property, RefUnit, Stream, StreamMetaType, StreamStruct, StructType, Unit, UnitPrefix,
};
use crate::error::{ModelError, Problem, Result};
use crate::validation::ValidationLevel;
use crate::version::DdlVersion;

/// Outcome of reading a schema document.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub definition: DataDefinition,
    pub version: DdlVersion,
    /// Fragments that were skipped.
    pub problems: Vec<Problem>,
    pub level: ValidationLevel,
}

/// Reads schema documents of any supported language version.
#[derive(Debug, Clone, Default)]
pub struct DdlReader {
    config: ReaderConfig,
}

impl DdlReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn read_str(&self, text: &str) -> Result<Loaded> {
        if text.len() > self.config.max_document_size {
            return Err(ModelError::DocumentTooLarge {
                size: text.len(),
                max: self.config.max_document_size,
            });
        }
        let document = XmlDocument::parse(text)?;
        self.read_node(document.root())
    }

    pub fn read_file(&self, path: &Path) -> Result<Loaded> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        let max = self.config.max_document_size;
        if size > max as u64 {
            return Err(ModelError::DocumentTooLarge {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                max,
            });
        }
        let read_limit = u64::try_from(max.saturating_add(1)).unwrap_or(u64::MAX);
        let mut text = String::new();
        file.take(read_limit).read_to_string(&mut text)?;
        debug!(path = %path.display(), bytes = text.len(), "read schema document");
        self.read_str(&text)
    }

    /// Interpret a document tree whose root is `ddl` (or `adtf:ddl`).
    pub fn read_node(&self, root: &Node) -> Result<Loaded> {
        if !matches!(root.name(), "ddl" | "adtf:ddl" | "ddl:ddl") {
            return Err(ModelError::MalformedDocument(format!(
                "unexpected root element '{}'",
                root.name()
            )));
        }
        let version = match root
            .find_node("header/language_version")
            .map(|node| node.data().trim())
            .filter(|text| !text.is_empty())
        {
            Some(text) => text.parse::<DdlVersion>()?,
            None => DdlVersion::LATEST,
        };

        let definition = if self.config.merge_predefined {
            DataDefinition::with_predefined()
        } else {
            DataDefinition::new()
        };
        let mut session = Session {
            config: self.config,
            version,
            definition,
            problems: Vec::new(),
        };
        session.read(root)?;

        let Session {
            mut definition,
            problems,
            ..
        } = session;
        let level = definition.validate();
        debug!(
            %version,
            entities = definition.entity_count(),
            skipped = problems.len(),
            %level,
            "schema document loaded"
        );
        Ok(Loaded {
            definition,
            version,
            problems,
            level,
        })
    }
}

struct Session {
    config: ReaderConfig,
    version: DdlVersion,
    definition: DataDefinition,
    problems: Vec<Problem>,
}

impl Session {
    fn read(&mut self, root: &Node) -> Result<()> {
        if let Some(header) = root.child("header") {
            self.header(header);
        }
        for units in root.children_named("units") {
            for node in units.children() {
                match node.name() {
                    "baseunit" => self.base_unit(node)?,
                    "prefixes" | "prefix" => self.prefix(node)?,
                    "unit" => self.unit(node)?,
                    other => self.problem("units", format!("unknown tag '{other}'"))?,
                }
            }
        }
        for node in root.find_nodes("datatypes/datatype") {
            self.data_type(node)?;
        }
        for node in root.find_nodes("enums/enum") {
            self.enum_type(node)?;
        }
        for node in root.find_nodes("structs/struct") {
            self.struct_type(node)?;
        }
        let meta_types = root.find_nodes("streammetatypes/streammetatype");
        if !meta_types.is_empty() && !self.version.supports_stream_meta_types() {
            self.problem(
                "streammetatypes",
                format!("stream meta types require 4.0, document is {}", self.version),
            )?;
        } else {
            for node in meta_types {
                self.stream_meta_type(node)?;
            }
        }
        for node in root.find_nodes("streams/stream") {
            self.stream(node)?;
        }
        Ok(())
    }

    fn problem(&mut self, context: impl Into<String>, message: impl Into<String>) -> Result<()> {
        let problem = Problem::new(context, message);
        if self.config.strict {
            return Err(ModelError::MalformedDocument(problem.to_string()));
        }
        warn!(%problem, "skipping malformed schema fragment");
        self.problems.push(problem);
        Ok(())
    }

    fn insert<T: Entity>(&mut self, item: T) -> Result<()> {
        let context = format!("{} '{}'", T::KIND, item.name());
        let outcome = if self.config.merge_predefined {
            self.definition.emplace(item)
        } else {
            self.definition.add(item)
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(err @ ModelError::NameCollision { .. }) => self.problem(context, err.to_string()),
            Err(err) => Err(err),
        }
    }

    fn header(&mut self, node: &Node) {
        let text = |name: &str| node.child_data(name).unwrap_or_default().trim().to_string();
        let header = Header {
            language_version: self.version.as_str().to_string(),
            author: text("author"),
            date_creation: text("date_creation"),
            date_change: text("date_change"),
            description: text("description"),
            ext_declarations: node
                .children_named("ext_declaration")
                .map(|ext| ExtDeclaration {
                    key: ext.attribute("key").unwrap_or_default().to_string(),
                    value: ext.attribute("value").unwrap_or_default().to_string(),
                })
                .collect(),
        };
        self.definition.set_header(header);
    }

    fn base_unit(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "baseunit")? else {
            return Ok(());
        };
        let unit = BaseUnit::new(
            name,
            attr(node, "symbol").unwrap_or_default(),
            attr(node, "description").unwrap_or_default(),
        );
        self.insert(unit)
    }

    fn prefix(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "prefix")? else {
            return Ok(());
        };
        let context = format!("unit prefix '{name}'");
        let Some(power) = self.required_parse::<i32>(node, "power", &context)? else {
            return Ok(());
        };
        self.insert(UnitPrefix::new(
            name,
            attr(node, "symbol").unwrap_or_default(),
            power,
        ))
    }

    fn unit(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "unit")? else {
            return Ok(());
        };
        let context = format!("unit '{name}'");
        let mut unit = Unit::new(name);
        if let Some(text) = node.child_data("numerator") {
            unit.numerator = text.trim().to_string();
        }
        if let Some(text) = node.child_data("denominator") {
            unit.denominator = text.trim().to_string();
        }
        if let Some(text) = node.child_data("offset") {
            unit.offset = text.trim().to_string();
        }
        for ref_node in node.children_named("refUnit") {
            let Some(unit_name) = attr(ref_node, "name") else {
                self.problem(&context, "refUnit without name")?;
                continue;
            };
            let power = self.parse_attr::<i32>(ref_node, "power", &context)?.unwrap_or(1);
            unit.ref_units.push(RefUnit {
                unit_name: unit_name.to_string(),
                power,
                prefix_name: attr(ref_node, "prefix").unwrap_or_default().to_string(),
            });
        }
        self.insert(unit)
    }

    fn data_type(&mut self, node: &Node) -> Result<()> {
        let primary = self.version.data_type_name_attribute();
        let fallback = if primary == "name" { "type" } else { "name" };
        let Some(name) = attr(node, primary).or_else(|| attr(node, fallback)) else {
            return self.problem("datatype", format!("missing '{primary}' attribute"));
        };
        let context = format!("data type '{name}'");
        let Some(bit_size) = self.required_parse::<u32>(node, "size", &context)? else {
            return Ok(());
        };
        let mut data_type = DataType::new(name, bit_size);
        data_type.description = attr(node, "description").unwrap_or_default().to_string();
        data_type.array_size = self
            .parse_attr::<u32>(node, "arraysize", &context)?
            .filter(|n| *n != 1);
        data_type.unit_name = attr(node, "unit").map(str::to_string);
        if self.version.supports_value_ranges() {
            data_type.minimum = attr(node, "min").map(str::to_string);
            data_type.maximum = attr(node, "max").map(str::to_string);
            data_type.default_value = attr(node, "default").map(str::to_string);
        }
        self.insert(data_type)
    }

    fn enum_type(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "enum")? else {
            return Ok(());
        };
        let context = format!("enum type '{name}'");
        let Some(data_type) = attr(node, "type") else {
            return self.problem(context, "missing type");
        };
        let mut enum_type = EnumType::new(name, data_type);
        for element in node.children_named("element") {
            match (attr(element, "name"), attr(element, "value")) {
                (Some(n), Some(v)) => enum_type = enum_type.with_element(n, v),
                _ => self.problem(&context, "enumerator needs name and value")?,
            }
        }
        self.insert(enum_type)
    }

    fn struct_type(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "struct")? else {
            return Ok(());
        };
        let context = format!("struct '{name}'");
        let mut struct_type = StructType::new(name);
        if let Some(version) = attr(node, "version") {
            struct_type.version = version.to_string();
        }
        struct_type.alignment = self
            .parse_attr::<u32>(node, "alignment", &context)?
            .filter(|a| *a != 0);
        struct_type.comment = attr(node, "comment").unwrap_or_default().to_string();
        struct_type.language_version = attr(node, "ddlversion").map(str::to_string);
        for element_node in node.children_named("element") {
            if let Some(element) = self.element(element_node, &context)? {
                struct_type.elements.push(element);
            }
        }
        self.insert(struct_type)
    }

    fn element(&mut self, node: &Node, struct_context: &str) -> Result<Option<Element>> {
        let (Some(name), Some(type_name)) = (attr(node, "name"), attr(node, "type")) else {
            self.problem(struct_context, "element needs name and type")?;
            return Ok(None);
        };
        let context = format!("{struct_context} element '{name}'");
        let mut element = Element::new(name, type_name);
        element.description = attr(node, "description").unwrap_or_default().to_string();
        element.comment = attr(node, "comment").unwrap_or_default().to_string();
        element.unit_name = attr(node, "unit").map(str::to_string);
        element.value = attr(node, "value").map(str::to_string);

        if let Some(size) = attr(node, "arraysize") {
            element.array_size = match size.trim().parse::<u32>() {
                Ok(n) => ArraySize::Fixed(n),
                Err(_) if self.version.supports_dynamic_arrays() => {
                    ArraySize::Dynamic(size.trim().to_string())
                }
                Err(_) => {
                    self.problem(
                        &context,
                        format!("dynamic array size '{size}' requires 2.0"),
                    )?;
                    return Ok(None);
                }
            };
        }

        if self.version.supports_value_ranges() {
            element.minimum = attr(node, "min").map(str::to_string);
            element.maximum = attr(node, "max").map(str::to_string);
            element.default_value = attr(node, "default").map(str::to_string);
            element.scale = attr(node, "scale").map(str::to_string);
            element.offset = attr(node, "offset").map(str::to_string);
        }

        let (serialized, deserialized) = if self.version.has_layout_children() {
            (node.child("serialized"), node.child("deserialized"))
        } else {
            (Some(node), Some(node))
        };
        if let Some(s) = serialized {
            element.serialized.byte_pos = self.parse_attr::<u32>(s, "bytepos", &context)?;
            element.serialized.bit_pos = self.parse_attr::<u8>(s, "bitpos", &context)?;
            element.serialized.num_bits = self.parse_attr::<u32>(s, "numbits", &context)?;
            if let Some(order) = attr(s, "byteorder") {
                match order.parse::<ByteOrder>() {
                    Ok(order) => element.serialized.byte_order = order,
                    Err(message) => {
                        self.problem(&context, message)?;
                        return Ok(None);
                    }
                }
            }
        }
        if let Some(d) = deserialized {
            element.deserialized.alignment = self.parse_attr::<u32>(d, "alignment", &context)?;
        }
        Ok(Some(element))
    }

    fn stream_meta_type(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "streammetatype")? else {
            return Ok(());
        };
        let mut meta = StreamMetaType::new(name, attr(node, "version").unwrap_or("1"));
        meta.parent = attr(node, "parent").map(str::to_string);
        for property in node.children_named("property") {
            match (attr(property, "name"), attr(property, "type")) {
                (Some(n), Some(t)) => meta.properties.push(Property {
                    name: n.to_string(),
                    type_name: t.to_string(),
                }),
                _ => self.problem(
                    format!("stream meta type '{name}'"),
                    "property needs name and type",
                )?,
            }
        }
        self.insert(meta)
    }

    fn stream(&mut self, node: &Node) -> Result<()> {
        let Some(name) = self.required(node, "name", "stream")? else {
            return Ok(());
        };
        let context = format!("stream '{name}'");
        let Some(struct_name) = attr(node, "type") else {
            return self.problem(context, "missing type");
        };
        let mut stream = Stream::new(name, struct_name);
        stream.description = attr(node, "description").unwrap_or_default().to_string();
        for entry in node.children_named("struct") {
            let (Some(entry_name), Some(type_name)) = (attr(entry, "name"), attr(entry, "type"))
            else {
                self.problem(&context, "struct entry needs name and type")?;
                continue;
            };
            let byte_pos = self.parse_attr::<u32>(entry, "bytepos", &context)?.unwrap_or(0);
            stream.structs.push(StreamStruct {
                name: entry_name.to_string(),
                type_name: type_name.to_string(),
                byte_pos,
            });
        }
        self.insert(stream)
    }

    /// A non-empty attribute, or a recorded problem.
    fn required<'n>(&mut self, node: &'n Node, key: &str, context: &str) -> Result<Option<&'n str>> {
        match attr(node, key) {
            Some(value) => Ok(Some(value)),
            None => {
                self.problem(context, format!("missing '{key}' attribute"))?;
                Ok(None)
            }
        }
    }

    fn required_parse<T: FromStr>(
        &mut self,
        node: &Node,
        key: &str,
        context: &str,
    ) -> Result<Option<T>> {
        if attr(node, key).is_none() {
            self.problem(context, format!("missing '{key}' attribute"))?;
            return Ok(None);
        }
        self.parse_attr(node, key, context)
    }

    /// Parse an optional attribute; unparsable text is a problem and reads
    /// as absent.
    fn parse_attr<T: FromStr>(&mut self, node: &Node, key: &str, context: &str) -> Result<Option<T>> {
        let Some(text) = attr(node, key) else {
            return Ok(None);
        };
        match text.trim().parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                self.problem(context, format!("invalid {key} '{text}'"))?;
                Ok(None)
            }
        }
    }
}

/// Attribute value, treating empty text as absent.
fn attr<'n>(node: &'n Node, key: &str) -> Option<&'n str> {
    node.attribute(key).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::EntityRef;
    use crate::entity::EntityKind;

    fn doc(version: &str, body: &str) -> String {
        format!(
            "<adtf:ddl xmlns:adtf=\"adtf\"><header><language_version>{version}</language_version>\
             <author>test</author></header>{body}</adtf:ddl>"
        )
    }

    #[test]
    fn data_type_attribute_depends_on_version() {
        let old = doc("2.0", r#"<datatypes><datatype type="tSpeed" size="32"/></datatypes>"#);
        let new = doc("3.0", r#"<datatypes><datatype name="tSpeed" size="32"/></datatypes>"#);

        let old = DdlReader::new().read_str(&old).unwrap();
        let new = DdlReader::new().read_str(&new).unwrap();

        assert_eq!(old.version, DdlVersion::V2_0);
        assert_eq!(
            old.definition.get::<DataType>("tSpeed").unwrap().name,
            new.definition.get::<DataType>("tSpeed").unwrap().name
        );
    }

    #[test]
    fn layout_attributes_move_into_children_at_4_0() {
        let v3 = doc(
            "3.0",
            r#"<datatypes><datatype name="tInt16" size="16"/></datatypes>
            <structs><struct name="S" version="1">
              <element name="a" type="tInt16" arraysize="1" bytepos="2" byteorder="BE" alignment="2"/>
            </struct></structs>"#,
        );
        let v4 = doc(
            "4.0",
            r#"<datatypes><datatype name="tInt16" size="16"/></datatypes>
            <structs><struct name="S" version="1">
              <element name="a" type="tInt16" arraysize="1">
                <serialized bytepos="2" byteorder="BE"/>
                <deserialized alignment="2"/>
              </element>
            </struct></structs>"#,
        );
        for text in [v3, v4] {
            let loaded = DdlReader::new().read_str(&text).unwrap();
            let element = &loaded.definition.get::<StructType>("S").unwrap().elements[0];
            assert_eq!(element.serialized.byte_pos, Some(2));
            assert_eq!(element.serialized.byte_order, ByteOrder::BigEndian);
            assert_eq!(element.deserialized.alignment, Some(2));
            assert!(loaded.problems.is_empty());
        }
    }

    #[test]
    fn malformed_root_fails_whole_load() {
        let err = DdlReader::new().read_str("<mapping/>").unwrap_err();
        assert!(matches!(err, ModelError::MalformedDocument(_)));

        let err = DdlReader::new()
            .read_str(&doc("7.5", ""))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedVersion(_)));
    }

    #[test]
    fn malformed_fragment_is_skipped() {
        let text = doc(
            "4.0",
            r#"<datatypes>
                 <datatype name="tInt32" size="32"/>
                 <datatype name="broken" size="lots"/>
               </datatypes>
               <structs><struct name="S">
                 <element name="x" type="tInt32"><serialized bytepos="0" byteorder="sideways"/></element>
                 <element name="y" type="tInt32"><serialized bytepos="4"/></element>
               </struct></structs>"#,
        );
        let loaded = DdlReader::new().read_str(&text).unwrap();
        assert_eq!(loaded.problems.len(), 2);
        assert!(loaded.definition.get::<DataType>("broken").is_none());
        assert_eq!(loaded.definition.get::<StructType>("S").unwrap().elements.len(), 1);

        let strict = DdlReader::with_config(ReaderConfig {
            strict: true,
            ..ReaderConfig::default()
        });
        assert!(strict.read_str(&text).is_err());
    }

    #[test]
    fn dynamic_array_needs_2_0() {
        let body = r#"<datatypes><datatype type="tUInt8" size="8"/></datatypes>
            <structs><struct name="S">
              <element name="n" type="tUInt8" bytepos="0"/>
              <element name="v" type="tUInt8" bytepos="1" arraysize="n"/>
            </struct></structs>"#;
        let v1 = DdlReader::new().read_str(&doc("1.0", body)).unwrap();
        assert_eq!(v1.problems.len(), 1);

        let v2 = DdlReader::new().read_str(&doc("2.0", body)).unwrap();
        let s = v2.definition.get::<StructType>("S").unwrap();
        assert_eq!(s.elements[1].array_size, ArraySize::Dynamic("n".to_string()));
        assert_eq!(v2.level, ValidationLevel::Valid);
    }

    #[test]
    fn merge_predefined_lets_document_override() {
        let text = doc("4.1", r#"<datatypes><datatype name="tInt32" size="32" description="mine"/></datatypes>
            <streams><stream name="s" type="Missing"/></streams>"#);
        let reader = DdlReader::with_config(ReaderConfig {
            merge_predefined: true,
            ..ReaderConfig::default()
        });
        let loaded = reader.read_str(&text).unwrap();
        assert_eq!(
            loaded.definition.get::<DataType>("tInt32").unwrap().description,
            "mine"
        );
        assert!(loaded.definition.contains::<DataType>("tFloat64"));
        assert_eq!(loaded.level, ValidationLevel::Invalid);
        assert_eq!(
            loaded
                .definition
                .level_of(&EntityRef::new(EntityKind::Stream, "s")),
            ValidationLevel::Invalid
        );
    }

    #[test]
    fn size_limit_is_enforced() {
        let reader = DdlReader::with_config(ReaderConfig {
            max_document_size: 8,
            ..ReaderConfig::default()
        });
        assert!(matches!(
            reader.read_str(&doc("4.0", "")),
            Err(ModelError::DocumentTooLarge { .. })
        ));
    }
}
