//! Validation levels and the rules that compute them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::definition::DataDefinition;
use crate::dependency::EntityRef;
use crate::entity::{
    ArraySize, BaseUnit, DataType, EntityKind, EnumType, Namespace, Stream, StreamMetaType,
    StructType, Unit, UnitPrefix,
};
use crate::error::Problem;
use crate::predefined::{is_integer_type, MAX_DATA_TYPE_BITS};

/// How far an entity can be trusted.
///
/// `GoodEnough` means the layout is computable although something
/// descriptive, such as a unit, is undefined. Only types reach it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    #[default]
    Unknown,
    Invalid,
    GoodEnough,
    Valid,
}

impl ValidationLevel {
    /// True when a layout may be computed from the entity.
    pub fn is_usable(self) -> bool {
        matches!(self, ValidationLevel::GoodEnough | ValidationLevel::Valid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationLevel::Unknown => "unknown",
            ValidationLevel::Invalid => "invalid",
            ValidationLevel::GoodEnough => "good_enough",
            ValidationLevel::Valid => "valid",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) type Verdict = (ValidationLevel, Vec<Problem>);

/// Computes levels for every entity still at `Unknown`.
///
/// Entities that already carry a level are trusted as-is; the definition
/// resets dependents to `Unknown` whenever something they use changes.
pub(crate) struct Validator<'a> {
    definition: &'a DataDefinition,
    results: HashMap<EntityRef, Verdict>,
    visiting: HashSet<EntityRef>,
}

impl<'a> Validator<'a> {
    pub(crate) fn new(definition: &'a DataDefinition) -> Self {
        Self {
            definition,
            results: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    pub(crate) fn run(mut self) -> HashMap<EntityRef, Verdict> {
        let pending: Vec<EntityRef> = self
            .definition
            .entity_refs()
            .filter(|r| self.definition.level_of(r) == ValidationLevel::Unknown)
            .collect();
        for entity in pending {
            self.level(&entity);
        }
        self.results
    }

    fn level(&mut self, entity: &EntityRef) -> ValidationLevel {
        if let Some((level, _)) = self.results.get(entity) {
            return *level;
        }
        let stored = self.definition.level_of(entity);
        if stored != ValidationLevel::Unknown {
            return stored;
        }
        if !self.visiting.insert(entity.clone()) {
            // Cycle; the entity currently being validated reports it.
            return ValidationLevel::Invalid;
        }
        let verdict = self.compute(entity);
        self.visiting.remove(entity);
        let level = verdict.0;
        self.results.insert(entity.clone(), verdict);
        level
    }

    fn compute(&mut self, entity: &EntityRef) -> Verdict {
        let dd = self.definition;
        let name = entity.name.as_str();
        let verdict = match entity.kind {
            EntityKind::BaseUnit => dd.get::<BaseUnit>(name).map(check_base_unit),
            EntityKind::UnitPrefix => dd.get::<UnitPrefix>(name).map(check_prefix),
            EntityKind::Unit => dd.get::<Unit>(name).map(|u| self.check_unit(u)),
            EntityKind::DataType => dd.get::<DataType>(name).map(|t| self.check_data_type(t)),
            EntityKind::EnumType => dd.get::<EnumType>(name).map(|e| self.check_enum(e)),
            EntityKind::StructType => dd.get::<StructType>(name).map(|s| self.check_struct(s)),
            EntityKind::StreamMetaType => dd
                .get::<StreamMetaType>(name)
                .map(|m| self.check_stream_meta_type(m)),
            EntityKind::Stream => dd.get::<Stream>(name).map(|s| self.check_stream(s)),
        };
        verdict.unwrap_or_else(|| {
            (
                ValidationLevel::Invalid,
                vec![Problem::new(entity.to_string(), "entity does not exist")],
            )
        })
    }

    fn check_unit(&mut self, unit: &Unit) -> Verdict {
        let mut v = Check::new(format!("unit '{}'", unit.name));
        v.require(!unit.name.is_empty(), "name must not be empty");
        for ref_unit in &unit.ref_units {
            let found = self
                .definition
                .kind_of(Namespace::Unit, &ref_unit.unit_name)
                .filter(|_| ref_unit.unit_name != unit.name);
            v.require(
                found.is_some(),
                format!("reference unit '{}' is not defined", ref_unit.unit_name),
            );
            if !ref_unit.prefix_name.is_empty() {
                v.require(
                    self.definition
                        .kind_of(Namespace::Prefix, &ref_unit.prefix_name)
                        .is_some(),
                    format!("unit prefix '{}' is not defined", ref_unit.prefix_name),
                );
            }
        }
        v.finish(EntityKind::Unit)
    }

    fn check_data_type(&mut self, data_type: &DataType) -> Verdict {
        let mut v = Check::new(format!("data type '{}'", data_type.name));
        v.require(!data_type.name.is_empty(), "name must not be empty");
        v.require(data_type.bit_size > 0, "bit size must be greater than zero");
        v.require(
            data_type.bit_size <= MAX_DATA_TYPE_BITS,
            format!("bit size must not exceed {MAX_DATA_TYPE_BITS}"),
        );
        if let Some(0) = data_type.array_size {
            v.fail("array size must be greater than zero");
        }
        if let Some(unit) = &data_type.unit_name {
            self.check_unit_reference(&mut v, unit);
        }
        v.finish(EntityKind::DataType)
    }

    fn check_enum(&mut self, enum_type: &EnumType) -> Verdict {
        let mut v = Check::new(format!("enum type '{}'", enum_type.name));
        match self
            .definition
            .kind_of(Namespace::Type, &enum_type.data_type_name)
        {
            Some(EntityKind::DataType) => {
                let target = EntityRef::new(EntityKind::DataType, &enum_type.data_type_name);
                let level = self.level(&target);
                v.inherit(level, || {
                    format!("data type '{}' is invalid", enum_type.data_type_name)
                });
            }
            Some(_) => v.fail(format!(
                "underlying type '{}' is not a scalar data type",
                enum_type.data_type_name
            )),
            None => v.fail(format!(
                "data type '{}' is not defined",
                enum_type.data_type_name
            )),
        }
        let mut names = HashSet::new();
        for element in &enum_type.elements {
            v.require(
                names.insert(element.name.as_str()),
                format!("duplicate enumerator '{}'", element.name),
            );
            v.require(
                is_numeric(&element.value),
                format!(
                    "enumerator '{}' has non-numeric value '{}'",
                    element.name, element.value
                ),
            );
        }
        v.finish(EntityKind::EnumType)
    }

    fn check_struct(&mut self, struct_type: &StructType) -> Verdict {
        let mut v = Check::new(format!("struct '{}'", struct_type.name));
        v.require(!struct_type.name.is_empty(), "name must not be empty");
        if let Some(alignment) = struct_type.alignment {
            v.require(
                is_alignment(alignment),
                format!("alignment {alignment} is not a power of two"),
            );
        }

        let mut names = HashSet::new();
        for (position, element) in struct_type.elements.iter().enumerate() {
            let context = format!("struct '{}' element '{}'", struct_type.name, element.name);
            v.require_in(&context, !element.name.is_empty(), "name must not be empty");
            v.require_in(
                &context,
                names.insert(element.name.as_str()),
                "duplicate element name",
            );

            let type_kind = self
                .definition
                .kind_of(Namespace::Type, &element.type_name);
            match type_kind {
                None => v.fail_in(
                    &context,
                    format!("type '{}' is not defined", element.type_name),
                ),
                Some(kind) => {
                    let target = EntityRef::new(kind, &element.type_name);
                    if kind == EntityKind::StructType && self.visiting.contains(&target) {
                        v.fail_in(&context, "recursive struct containment");
                    } else {
                        let level = self.level(&target);
                        if level == ValidationLevel::Invalid {
                            v.fail_in(&context, format!("type '{}' is invalid", element.type_name));
                        } else {
                            v.degrade(level);
                        }
                    }
                    if kind == EntityKind::DataType {
                        if let (Some(bits), Some(data_type)) = (
                            element.serialized.num_bits,
                            self.definition.get::<DataType>(&element.type_name),
                        ) {
                            v.require_in(
                                &context,
                                bits <= data_type.bit_size,
                                format!(
                                    "num_bits {bits} exceeds type size {}",
                                    data_type.bit_size
                                ),
                            );
                        }
                    }
                }
            }

            if let Some(unit) = &element.unit_name {
                self.check_unit_reference(&mut v, unit);
            }

            match &element.array_size {
                ArraySize::Fixed(0) => v.fail_in(&context, "array size must be greater than zero"),
                ArraySize::Fixed(_) => {}
                ArraySize::Dynamic(size_element) => {
                    let sibling = struct_type.elements[..position]
                        .iter()
                        .find(|e| &e.name == size_element);
                    match sibling {
                        None => v.fail_in(
                            &context,
                            format!(
                                "dynamic array size element '{size_element}' must precede the array"
                            ),
                        ),
                        Some(sibling) => {
                            let integer = self
                                .scalar_data_type(&sibling.type_name)
                                .is_some_and(|data_type| {
                                    is_integer_type(data_type)
                                        && data_type.array_size.unwrap_or(1) == 1
                                });
                            v.require_in(
                                &context,
                                integer && sibling.array_size == ArraySize::Fixed(1),
                                format!(
                                    "dynamic array size element '{size_element}' must be an integer scalar"
                                ),
                            );
                        }
                    }
                }
            }

            if let Some(bit_pos) = element.serialized.bit_pos {
                v.require_in(&context, bit_pos <= 7, "bit position must be within 0..=7");
            }
            if let Some(0) = element.serialized.num_bits {
                v.fail_in(&context, "num_bits must be greater than zero");
            }
            if let Some(alignment) = element.deserialized.alignment {
                v.require_in(
                    &context,
                    alignment == 0 || is_alignment(alignment),
                    format!("alignment {alignment} is not a power of two"),
                );
            }
        }
        v.finish(EntityKind::StructType)
    }

    /// Data type behind a data type or enum type name.
    fn scalar_data_type(&self, type_name: &str) -> Option<&'a DataType> {
        let data_type_name = match self.definition.kind_of(Namespace::Type, type_name)? {
            EntityKind::DataType => type_name,
            EntityKind::EnumType => self.definition.get::<EnumType>(type_name)?.data_type_name.as_str(),
            _ => return None,
        };
        self.definition.get::<DataType>(data_type_name)
    }

    fn check_stream_meta_type(&mut self, meta: &StreamMetaType) -> Verdict {
        let mut v = Check::new(format!("stream meta type '{}'", meta.name));
        v.require(!meta.name.is_empty(), "name must not be empty");
        if let Some(parent) = &meta.parent {
            let target = EntityRef::new(EntityKind::StreamMetaType, parent);
            if self.definition.get::<StreamMetaType>(parent).is_none() {
                v.fail(format!("parent '{parent}' is not defined"));
            } else if self.visiting.contains(&target) || parent == &meta.name {
                v.fail("recursive parent chain");
            } else {
                let level = self.level(&target);
                v.inherit(level, || format!("parent '{parent}' is invalid"));
            }
        }
        v.finish(EntityKind::StreamMetaType)
    }

    fn check_stream(&mut self, stream: &Stream) -> Verdict {
        let mut v = Check::new(format!("stream '{}'", stream.name));
        v.require(!stream.name.is_empty(), "name must not be empty");
        let mut types = vec![stream.struct_name.as_str()];
        types.extend(stream.structs.iter().map(|s| s.type_name.as_str()));
        for type_name in types {
            if self.definition.get::<StructType>(type_name).is_none() {
                v.fail(format!("struct '{type_name}' is not defined"));
                continue;
            }
            let level = self.level(&EntityRef::new(EntityKind::StructType, type_name));
            v.inherit(level, || format!("struct '{type_name}' is invalid"));
        }
        v.finish(EntityKind::Stream)
    }

    fn check_unit_reference(&mut self, v: &mut Check, unit: &str) {
        match self.definition.kind_of(Namespace::Unit, unit) {
            None => v.soft(format!("unit '{unit}' is not defined")),
            Some(kind) => {
                if !self.level(&EntityRef::new(kind, unit)).is_usable() {
                    v.soft(format!("unit '{unit}' is invalid"));
                }
            }
        }
    }
}

/// Accumulates problems for one entity.
struct Check {
    context: String,
    level: ValidationLevel,
    problems: Vec<Problem>,
}

impl Check {
    fn new(context: String) -> Self {
        Self {
            context,
            level: ValidationLevel::Valid,
            problems: Vec::new(),
        }
    }

    fn require(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.fail(message);
        }
    }

    fn require_in(&mut self, context: &str, ok: bool, message: impl Into<String>) {
        if !ok {
            self.fail_in(context, message);
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.problems.push(Problem::new(self.context.clone(), message));
        self.level = ValidationLevel::Invalid;
    }

    fn fail_in(&mut self, context: &str, message: impl Into<String>) {
        self.problems.push(Problem::new(context, message));
        self.level = ValidationLevel::Invalid;
    }

    /// Record a problem that keeps the layout computable.
    fn soft(&mut self, message: impl Into<String>) {
        self.problems.push(Problem::new(self.context.clone(), message));
        self.degrade(ValidationLevel::GoodEnough);
    }

    fn degrade(&mut self, level: ValidationLevel) {
        if level != ValidationLevel::Unknown && level < self.level {
            self.level = level;
        }
    }

    fn inherit(&mut self, level: ValidationLevel, message: impl FnOnce() -> String) {
        if level == ValidationLevel::Invalid {
            self.fail(message());
        } else {
            self.degrade(level);
        }
    }

    fn finish(mut self, kind: EntityKind) -> Verdict {
        if self.level == ValidationLevel::GoodEnough && !kind.may_be_good_enough() {
            self.level = ValidationLevel::Valid;
        }
        (self.level, self.problems)
    }
}

fn check_base_unit(unit: &BaseUnit) -> Verdict {
    let mut v = Check::new(format!("base unit '{}'", unit.name));
    v.require(!unit.name.is_empty(), "name must not be empty");
    v.finish(EntityKind::BaseUnit)
}

fn check_prefix(prefix: &UnitPrefix) -> Verdict {
    let mut v = Check::new(format!("unit prefix '{}'", prefix.name));
    v.require(!prefix.name.is_empty(), "name must not be empty");
    v.finish(EntityKind::UnitPrefix)
}

fn is_alignment(value: u32) -> bool {
    value.is_power_of_two()
}

fn is_numeric(text: &str) -> bool {
    let text = text.trim();
    text.parse::<i64>().is_ok()
        || text.parse::<u64>().is_ok()
        || text.parse::<f64>().is_ok()
        || text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .is_some_and(|hex| u64::from_str_radix(hex, 16).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_from_invalid_to_valid() {
        assert!(ValidationLevel::Invalid < ValidationLevel::GoodEnough);
        assert!(ValidationLevel::GoodEnough < ValidationLevel::Valid);
        assert!(ValidationLevel::GoodEnough.is_usable());
        assert!(!ValidationLevel::Unknown.is_usable());
    }

    #[test]
    fn numeric_detection_accepts_hex_and_floats() {
        assert!(is_numeric("42"));
        assert!(is_numeric("-3"));
        assert!(is_numeric("0x1F"));
        assert!(is_numeric("2.5"));
        assert!(!is_numeric("many"));
    }

    #[test]
    fn non_type_entities_never_stay_good_enough() {
        let mut check = Check::new("unit 'x'".to_string());
        check.soft("prefix missing");
        let (level, problems) = check.finish(EntityKind::Unit);
        assert_eq!(level, ValidationLevel::Valid);
        assert_eq!(problems.len(), 1);
    }
}
