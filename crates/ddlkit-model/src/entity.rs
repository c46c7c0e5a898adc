//! Schema entities: units, data types, enums, structs and streams.
//!
//! Entities are plain data. Everything that is derived from them (validation
//! level, problems, cached layout metadata) lives next to them in the
//! owning [`Collection`](crate::collection::Collection).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::definition::DataDefinition;

/// The kind of a schema entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    BaseUnit,
    UnitPrefix,
    Unit,
    DataType,
    EnumType,
    StructType,
    StreamMetaType,
    Stream,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::BaseUnit,
        EntityKind::UnitPrefix,
        EntityKind::Unit,
        EntityKind::DataType,
        EntityKind::EnumType,
        EntityKind::StructType,
        EntityKind::StreamMetaType,
        EntityKind::Stream,
    ];

    /// The namespace names of this kind must be unique in.
    pub fn namespace(self) -> Namespace {
        match self {
            EntityKind::BaseUnit | EntityKind::Unit => Namespace::Unit,
            EntityKind::UnitPrefix => Namespace::Prefix,
            EntityKind::DataType | EntityKind::EnumType | EntityKind::StructType => Namespace::Type,
            EntityKind::StreamMetaType => Namespace::StreamMetaType,
            EntityKind::Stream => Namespace::Stream,
        }
    }

    /// Only types may settle at `GoodEnough`; everything else is valid or not.
    pub fn may_be_good_enough(self) -> bool {
        matches!(
            self,
            EntityKind::DataType | EntityKind::EnumType | EntityKind::StructType
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::BaseUnit => "base unit",
            EntityKind::UnitPrefix => "unit prefix",
            EntityKind::Unit => "unit",
            EntityKind::DataType => "data type",
            EntityKind::EnumType => "enum type",
            EntityKind::StructType => "struct type",
            EntityKind::StreamMetaType => "stream meta type",
            EntityKind::Stream => "stream",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name uniqueness domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Unit,
    Prefix,
    Type,
    StreamMetaType,
    Stream,
}

impl Namespace {
    pub fn kinds(self) -> &'static [EntityKind] {
        match self {
            Namespace::Unit => &[EntityKind::BaseUnit, EntityKind::Unit],
            Namespace::Prefix => &[EntityKind::UnitPrefix],
            Namespace::Type => &[
                EntityKind::DataType,
                EntityKind::EnumType,
                EntityKind::StructType,
            ],
            Namespace::StreamMetaType => &[EntityKind::StreamMetaType],
            Namespace::Stream => &[EntityKind::Stream],
        }
    }
}

/// A by-name reference from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub namespace: Namespace,
    pub name: String,
}

impl Reference {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

/// Common behaviour of every entity stored in a [`DataDefinition`].
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    /// Every by-name reference this entity holds.
    fn references(&self) -> Vec<Reference>;

    /// Rewrite references to `old` in `namespace` so they point at `new`.
    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str);

    #[doc(hidden)]
    fn collection(definition: &DataDefinition) -> &Collection<Self>;

    #[doc(hidden)]
    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self>;
}

fn rename_in(slot: &mut String, old: &str, new: &str) {
    if slot == old {
        *slot = new.to_string();
    }
}

fn rename_in_opt(slot: &mut Option<String>, old: &str, new: &str) {
    if let Some(value) = slot {
        rename_in(value, old, new);
    }
}

/// Document header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub language_version: String,
    pub author: String,
    pub date_creation: String,
    pub date_change: String,
    pub description: String,
    pub ext_declarations: Vec<ExtDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtDeclaration {
    pub key: String,
    pub value: String,
}

/// An SI style base unit such as `Metre`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseUnit {
    pub name: String,
    pub symbol: String,
    pub description: String,
}

impl BaseUnit {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            description: description.into(),
        }
    }
}

/// A decimal unit prefix such as `kilo` (power 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPrefix {
    pub name: String,
    pub symbol: String,
    pub power: i32,
}

impl UnitPrefix {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, power: i32) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            power,
        }
    }
}

/// A base unit raised to a power and scaled by a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefUnit {
    pub unit_name: String,
    pub power: i32,
    pub prefix_name: String,
}

/// A derived unit built from reference units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    pub offset: String,
    pub ref_units: Vec<RefUnit>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            numerator: "1".to_string(),
            denominator: "1".to_string(),
            offset: "0".to_string(),
            ref_units: Vec::new(),
        }
    }

    pub fn with_ref_unit(
        mut self,
        unit_name: impl Into<String>,
        power: i32,
        prefix_name: impl Into<String>,
    ) -> Self {
        self.ref_units.push(RefUnit {
            unit_name: unit_name.into(),
            power,
            prefix_name: prefix_name.into(),
        });
        self
    }
}

/// A scalar data type with a fixed bit size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    pub name: String,
    pub bit_size: u32,
    pub description: String,
    pub array_size: Option<u32>,
    pub unit_name: Option<String>,
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    pub default_value: Option<String>,
}

impl DataType {
    pub fn new(name: impl Into<String>, bit_size: u32) -> Self {
        Self {
            name: name.into(),
            bit_size,
            description: String::new(),
            array_size: None,
            unit_name: None,
            minimum: None,
            maximum: None,
            default_value: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit_name: impl Into<String>) -> Self {
        self.unit_name = Some(unit_name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumElement {
    pub name: String,
    pub value: String,
}

/// A named set of values of an underlying data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub data_type_name: String,
    pub elements: Vec<EnumElement>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, data_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type_name: data_type_name.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.elements.push(EnumElement {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Value text of a named enumerator.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }
}

/// Byte order of a serialized element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "LE",
            ByteOrder::BigEndian => "BE",
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "LE" | "le" | "Intel" | "intel" | "1" => Ok(ByteOrder::LittleEndian),
            "BE" | "be" | "Motorola" | "motorola" | "2" => Ok(ByteOrder::BigEndian),
            other => Err(format!("unknown byte order '{other}'")),
        }
    }
}

/// Array specification of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArraySize {
    Fixed(u32),
    /// Count is read at runtime from the named sibling element.
    Dynamic(String),
}

impl Default for ArraySize {
    fn default() -> Self {
        ArraySize::Fixed(1)
    }
}

impl ArraySize {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ArraySize::Dynamic(_))
    }

    pub fn fixed(&self) -> Option<u32> {
        match self {
            ArraySize::Fixed(n) => Some(*n),
            ArraySize::Dynamic(_) => None,
        }
    }
}

impl fmt::Display for ArraySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySize::Fixed(n) => write!(f, "{n}"),
            ArraySize::Dynamic(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedInfo {
    pub byte_pos: Option<u32>,
    pub bit_pos: Option<u8>,
    pub num_bits: Option<u32>,
    pub byte_order: ByteOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeserializedInfo {
    pub alignment: Option<u32>,
}

/// One member of a [`StructType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub type_name: String,
    pub description: String,
    pub unit_name: Option<String>,
    pub comment: String,
    pub array_size: ArraySize,
    pub serialized: SerializedInfo,
    pub deserialized: DeserializedInfo,
    /// Constant value; elements with a constant are written on reset.
    pub value: Option<String>,
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    pub default_value: Option<String>,
    pub scale: Option<String>,
    pub offset: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: String::new(),
            unit_name: None,
            comment: String::new(),
            array_size: ArraySize::default(),
            serialized: SerializedInfo::default(),
            deserialized: DeserializedInfo::default(),
            value: None,
            minimum: None,
            maximum: None,
            default_value: None,
            scale: None,
            offset: None,
        }
    }

    pub fn at_byte(mut self, byte_pos: u32) -> Self {
        self.serialized.byte_pos = Some(byte_pos);
        self
    }

    pub fn at_bit(mut self, byte_pos: u32, bit_pos: u8) -> Self {
        self.serialized.byte_pos = Some(byte_pos);
        self.serialized.bit_pos = Some(bit_pos);
        self
    }

    pub fn with_bits(mut self, num_bits: u32) -> Self {
        self.serialized.num_bits = Some(num_bits);
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.serialized.byte_order = byte_order;
        self
    }

    pub fn with_alignment(mut self, alignment: u32) -> Self {
        self.deserialized.alignment = Some(alignment);
        self
    }

    pub fn with_array(mut self, array_size: ArraySize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_unit(mut self, unit_name: impl Into<String>) -> Self {
        self.unit_name = Some(unit_name.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_constant(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A structured type made of ordered elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    pub name: String,
    pub version: String,
    pub alignment: Option<u32>,
    pub comment: String,
    pub language_version: Option<String>,
    pub elements: Vec<Element>,
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1".to_string(),
            alignment: None,
            comment: String::new(),
            language_version: None,
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_alignment(mut self, alignment: u32) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn element_position(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub type_name: String,
}

/// Describes the kind of a stream independent of its sample type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetaType {
    pub name: String,
    pub version: String,
    pub parent: Option<String>,
    pub properties: Vec<Property>,
}

impl StreamMetaType {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            parent: None,
            properties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStruct {
    pub name: String,
    pub type_name: String,
    pub byte_pos: u32,
}

/// A named stream carrying samples of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub name: String,
    pub struct_name: String,
    pub description: String,
    pub structs: Vec<StreamStruct>,
}

impl Stream {
    pub fn new(name: impl Into<String>, struct_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            struct_name: struct_name.into(),
            description: String::new(),
            structs: Vec::new(),
        }
    }
}

impl Entity for BaseUnit {
    const KIND: EntityKind = EntityKind::BaseUnit;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn rename_reference(&mut self, _namespace: Namespace, _old: &str, _new: &str) {}

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.base_units
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.base_units
    }
}

impl Entity for UnitPrefix {
    const KIND: EntityKind = EntityKind::UnitPrefix;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn rename_reference(&mut self, _namespace: Namespace, _old: &str, _new: &str) {}

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.prefixes
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.prefixes
    }
}

impl Entity for Unit {
    const KIND: EntityKind = EntityKind::Unit;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        for ref_unit in &self.ref_units {
            refs.push(Reference::new(Namespace::Unit, &ref_unit.unit_name));
            if !ref_unit.prefix_name.is_empty() {
                refs.push(Reference::new(Namespace::Prefix, &ref_unit.prefix_name));
            }
        }
        refs
    }

    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str) {
        for ref_unit in &mut self.ref_units {
            match namespace {
                Namespace::Unit => rename_in(&mut ref_unit.unit_name, old, new),
                Namespace::Prefix => rename_in(&mut ref_unit.prefix_name, old, new),
                _ => {}
            }
        }
    }

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.units
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.units
    }
}

impl Entity for DataType {
    const KIND: EntityKind = EntityKind::DataType;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        self.unit_name
            .iter()
            .map(|unit| Reference::new(Namespace::Unit, unit))
            .collect()
    }

    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str) {
        if namespace == Namespace::Unit {
            rename_in_opt(&mut self.unit_name, old, new);
        }
    }

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.data_types
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.data_types
    }
}

impl Entity for EnumType {
    const KIND: EntityKind = EntityKind::EnumType;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(Namespace::Type, &self.data_type_name)]
    }

    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str) {
        if namespace == Namespace::Type {
            rename_in(&mut self.data_type_name, old, new);
        }
    }

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.enums
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.enums
    }
}

impl Entity for StructType {
    const KIND: EntityKind = EntityKind::StructType;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        for element in &self.elements {
            refs.push(Reference::new(Namespace::Type, &element.type_name));
            if let Some(unit) = &element.unit_name {
                refs.push(Reference::new(Namespace::Unit, unit));
            }
        }
        refs
    }

    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str) {
        for element in &mut self.elements {
            match namespace {
                Namespace::Type => rename_in(&mut element.type_name, old, new),
                Namespace::Unit => rename_in_opt(&mut element.unit_name, old, new),
                _ => {}
            }
        }
    }

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.structs
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.structs
    }
}

impl Entity for StreamMetaType {
    const KIND: EntityKind = EntityKind::StreamMetaType;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        self.parent
            .iter()
            .map(|parent| Reference::new(Namespace::StreamMetaType, parent))
            .collect()
    }

    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str) {
        if namespace == Namespace::StreamMetaType {
            rename_in_opt(&mut self.parent, old, new);
        }
    }

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.stream_meta_types
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.stream_meta_types
    }
}

impl Entity for Stream {
    const KIND: EntityKind = EntityKind::Stream;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new(Namespace::Type, &self.struct_name)];
        for entry in &self.structs {
            refs.push(Reference::new(Namespace::Type, &entry.type_name));
        }
        refs
    }

    fn rename_reference(&mut self, namespace: Namespace, old: &str, new: &str) {
        if namespace == Namespace::Type {
            rename_in(&mut self.struct_name, old, new);
            for entry in &mut self.structs {
                rename_in(&mut entry.type_name, old, new);
            }
        }
    }

    fn collection(definition: &DataDefinition) -> &Collection<Self> {
        &definition.streams
    }

    fn collection_mut(definition: &mut DataDefinition) -> &mut Collection<Self> {
        &mut definition.streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_parses_aliases() {
        assert_eq!("LE".parse::<ByteOrder>(), Ok(ByteOrder::LittleEndian));
        assert_eq!("Motorola".parse::<ByteOrder>(), Ok(ByteOrder::BigEndian));
        assert!("sideways".parse::<ByteOrder>().is_err());
    }

    #[test]
    fn struct_rename_reference_rewrites_types_and_units() {
        let mut s = StructType::new("S")
            .with_element(Element::new("a", "tInt32").with_unit("Metre"))
            .with_element(Element::new("b", "Inner"));
        s.rename_reference(Namespace::Type, "Inner", "Nested");
        s.rename_reference(Namespace::Unit, "Metre", "m");

        assert_eq!(s.elements[1].type_name, "Nested");
        assert_eq!(s.elements[0].unit_name.as_deref(), Some("m"));
        assert_eq!(s.elements[0].type_name, "tInt32");
    }

    #[test]
    fn namespaces_group_kinds() {
        assert_eq!(EntityKind::BaseUnit.namespace(), Namespace::Unit);
        assert_eq!(EntityKind::EnumType.namespace(), Namespace::Type);
        assert!(Namespace::Type.kinds().contains(&EntityKind::StructType));
        assert!(!EntityKind::Stream.may_be_good_enough());
    }
}
