use std::collections::HashMap;

use ddlkit_model::{DataDefinition, EnumType};

use crate::config::MapTransformation;
use crate::error::{MappingError, Result};

/// A numeric conversion applied to an assigned source value.
pub trait Transformation: Send + Sync {
    fn evaluate(&self, value: f64) -> f64;
}

/// `a + b*x + c*x^2 + d*x^3 + e*x^4`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polynomial {
    pub coefficients: [f64; 5],
}

impl Polynomial {
    pub fn new(coefficients: [f64; 5]) -> Self {
        Self { coefficients }
    }

    pub fn linear(scale: f64, offset: f64) -> Self {
        Self::new([offset, scale, 0.0, 0.0, 0.0])
    }
}

impl Transformation for Polynomial {
    fn evaluate(&self, value: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, coefficient| acc * value + coefficient)
    }
}

/// Converts enumerator values of one enum into values of another.
///
/// Input values without a conversion map to the default enumerator.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumTable {
    table: HashMap<i64, f64>,
    default: f64,
}

impl EnumTable {
    pub fn from_config(transformation: &MapTransformation, definition: &DataDefinition) -> Result<Self> {
        let MapTransformation::EnumTable {
            name,
            from_enum,
            to_enum,
            default,
            conversions,
        } = transformation
        else {
            return Err(MappingError::Configuration(format!(
                "'{}' is not an enum table",
                transformation.name()
            )));
        };
        let lookup = |enum_name: &str| {
            definition
                .get::<EnumType>(enum_name)
                .ok_or_else(|| MappingError::Configuration(format!("{name}: unknown enum '{enum_name}'")))
        };
        let from = lookup(from_enum)?;
        let to = lookup(to_enum)?;
        let number = |enumeration: &EnumType, element: &str| -> Result<f64> {
            enumeration
                .value_of(element)
                .and_then(parse_number)
                .ok_or_else(|| {
                    MappingError::Configuration(format!(
                        "{name}: '{element}' is not a numeric element of '{}'",
                        enumeration.name
                    ))
                })
        };
        let mut table = HashMap::new();
        for (from_name, to_name) in conversions {
            // Enumerator values are integral.
            table.insert(number(from, from_name)? as i64, number(to, to_name)?);
        }
        Ok(Self {
            table,
            default: number(to, default)?,
        })
    }
}

impl Transformation for EnumTable {
    fn evaluate(&self, value: f64) -> f64 {
        self.table
            .get(&(value as i64))
            .copied()
            .unwrap_or(self.default)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok().map(|v| v as f64),
        None => text.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial_evaluation() {
        assert_eq!(Polynomial::linear(0.5, 1.0).evaluate(10.0), 6.0);
        // 1 + 2x + 3x^2 at x = 2
        assert_eq!(Polynomial::new([1.0, 2.0, 3.0, 0.0, 0.0]).evaluate(2.0), 17.0);
        assert_eq!(Polynomial::new([0.0; 5]).evaluate(123.0), 0.0);
    }

    #[test]
    fn enum_table_lookup_and_default() {
        let mut dd = DataDefinition::with_predefined();
        dd.add(
            EnumType::new("Light", "tUInt8")
                .with_element("RED", "1")
                .with_element("GREEN", "2"),
        )
        .unwrap();
        dd.add(
            EnumType::new("Signal", "tUInt8")
                .with_element("STOP", "10")
                .with_element("GO", "0x14")
                .with_element("UNKNOWN", "255"),
        )
        .unwrap();
        let config = MapTransformation::EnumTable {
            name: "lights".to_string(),
            from_enum: "Light".to_string(),
            to_enum: "Signal".to_string(),
            default: "UNKNOWN".to_string(),
            conversions: vec![
                ("RED".to_string(), "STOP".to_string()),
                ("GREEN".to_string(), "GO".to_string()),
            ],
        };
        let table = EnumTable::from_config(&config, &dd).unwrap();
        assert_eq!(table.evaluate(1.0), 10.0);
        assert_eq!(table.evaluate(2.0), 20.0);
        assert_eq!(table.evaluate(7.0), 255.0);

        let broken = MapTransformation::EnumTable {
            name: "broken".to_string(),
            from_enum: "Light".to_string(),
            to_enum: "Missing".to_string(),
            default: "X".to_string(),
            conversions: Vec::new(),
        };
        assert!(EnumTable::from_config(&broken, &dd).is_err());
    }
}
