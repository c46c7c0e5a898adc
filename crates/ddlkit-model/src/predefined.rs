//! Built-in scalar types, SI base units and unit prefixes.

use crate::definition::DataDefinition;
use crate::entity::{BaseUnit, DataType, Namespace, UnitPrefix};
use crate::error::Result;

/// `(name, bit size, description)` of every predefined scalar type.
pub const DATA_TYPES: &[(&str, u32, &str)] = &[
    ("tBool", 8, "boolean"),
    ("tChar", 8, "character"),
    ("tInt8", 8, "signed 8 bit integer"),
    ("tUInt8", 8, "unsigned 8 bit integer"),
    ("tInt16", 16, "signed 16 bit integer"),
    ("tUInt16", 16, "unsigned 16 bit integer"),
    ("tInt32", 32, "signed 32 bit integer"),
    ("tUInt32", 32, "unsigned 32 bit integer"),
    ("tInt64", 64, "signed 64 bit integer"),
    ("tUInt64", 64, "unsigned 64 bit integer"),
    ("tFloat32", 32, "IEEE 754 single precision"),
    ("tFloat64", 64, "IEEE 754 double precision"),
    ("bool", 8, "boolean"),
    ("char", 8, "character"),
    ("int8_t", 8, "signed 8 bit integer"),
    ("uint8_t", 8, "unsigned 8 bit integer"),
    ("int16_t", 16, "signed 16 bit integer"),
    ("uint16_t", 16, "unsigned 16 bit integer"),
    ("int32_t", 32, "signed 32 bit integer"),
    ("uint32_t", 32, "unsigned 32 bit integer"),
    ("int64_t", 64, "signed 64 bit integer"),
    ("uint64_t", 64, "unsigned 64 bit integer"),
    ("float", 32, "IEEE 754 single precision"),
    ("double", 64, "IEEE 754 double precision"),
];

pub const BASE_UNITS: &[(&str, &str, &str)] = &[
    ("Metre", "m", "length"),
    ("Kilogram", "kg", "mass"),
    ("Second", "s", "time"),
    ("Ampere", "A", "electric current"),
    ("Kelvin", "K", "thermodynamic temperature"),
    ("Mole", "mol", "amount of substance"),
    ("Candela", "cd", "luminous intensity"),
    ("Degree", "deg", "plane angle"),
    ("Radiant", "rad", "plane angle"),
    ("Unitless", "", "no unit"),
    ("Nou", "", "no unit"),
];

pub const PREFIXES: &[(&str, &str, i32)] = &[
    ("yotta", "Y", 24),
    ("zetta", "Z", 21),
    ("exa", "E", 18),
    ("peta", "P", 15),
    ("tera", "T", 12),
    ("giga", "G", 9),
    ("mega", "M", 6),
    ("kilo", "k", 3),
    ("hecto", "h", 2),
    ("deca", "da", 1),
    ("deci", "d", -1),
    ("centi", "c", -2),
    ("milli", "m", -3),
    ("micro", "u", -6),
    ("nano", "n", -9),
    ("pico", "p", -12),
    ("femto", "f", -15),
    ("atto", "a", -18),
    ("zepto", "z", -21),
    ("yocto", "y", -24),
];

pub fn is_predefined_type(name: &str) -> bool {
    DATA_TYPES.iter().any(|(n, _, _)| *n == name)
}

/// Add every predefined entity that is not already present.
/// Widest data type a value can be read into without truncation.
pub const MAX_DATA_TYPE_BITS: u32 = 64;

/// Whether values of `data_type` are integers. Predefined boolean and
/// floating point types are not; user data types are unsigned integers.
pub fn is_integer_type(data_type: &DataType) -> bool {
    !matches!(
        data_type.name.as_str(),
        "tBool" | "bool" | "tFloat32" | "tFloat64" | "float" | "double"
    )
}

pub fn merge_into(definition: &mut DataDefinition) -> Result<()> {
    for (name, bits, description) in DATA_TYPES {
        if definition.kind_of(Namespace::Type, name).is_none() {
            definition.add(DataType::new(*name, *bits).with_description(*description))?;
        }
    }
    for (name, symbol, description) in BASE_UNITS {
        if definition.kind_of(Namespace::Unit, name).is_none() {
            definition.add(BaseUnit::new(*name, *symbol, *description))?;
        }
    }
    for (name, symbol, power) in PREFIXES {
        if definition.kind_of(Namespace::Prefix, name).is_none() {
            definition.add(UnitPrefix::new(*name, *symbol, *power))?;
        }
    }
    Ok(())
}

impl DataDefinition {
    /// A definition pre-populated with the standard scalar types, SI base
    /// units and SI prefixes.
    pub fn with_predefined() -> Self {
        let mut definition = DataDefinition::new();
        for (name, bits, description) in DATA_TYPES {
            definition
                .data_types
                .push(DataType::new(*name, *bits).with_description(*description));
        }
        for (name, symbol, description) in BASE_UNITS {
            definition
                .base_units
                .push(BaseUnit::new(*name, *symbol, *description));
        }
        for (name, symbol, power) in PREFIXES {
            definition
                .prefixes
                .push(UnitPrefix::new(*name, *symbol, *power));
        }
        definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationLevel;

    #[test]
    fn predefined_definition_validates_and_stays_empty() {
        let mut dd = DataDefinition::with_predefined();
        assert!(dd.is_empty());
        assert_eq!(dd.data_types().len(), DATA_TYPES.len());
        assert_eq!(dd.get::<DataType>("tFloat64").unwrap().bit_size, 64);
        assert_eq!(dd.validate(), ValidationLevel::Valid);
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let mut dd = DataDefinition::new();
        dd.add(DataType::new("tInt32", 16)).unwrap();
        merge_into(&mut dd).unwrap();
        assert_eq!(dd.get::<DataType>("tInt32").unwrap().bit_size, 16);
        assert!(dd.contains::<UnitPrefix>("kilo"));
    }
}
