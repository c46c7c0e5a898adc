use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ModelError;

/// Schema language versions understood by the reader and writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DdlVersion {
    V1_0,
    V2_0,
    V3_0,
    V4_0,
    #[default]
    V4_1,
}

impl DdlVersion {
    pub const ALL: [DdlVersion; 5] = [
        DdlVersion::V1_0,
        DdlVersion::V2_0,
        DdlVersion::V3_0,
        DdlVersion::V4_0,
        DdlVersion::V4_1,
    ];

    pub const LATEST: DdlVersion = DdlVersion::V4_1;

    pub fn as_str(self) -> &'static str {
        match self {
            DdlVersion::V1_0 => "1.0",
            DdlVersion::V2_0 => "2.0",
            DdlVersion::V3_0 => "3.0",
            DdlVersion::V4_0 => "4.0",
            DdlVersion::V4_1 => "4.1",
        }
    }

    /// Attribute carrying a data type's name: `type` before 3.0.
    pub fn data_type_name_attribute(self) -> &'static str {
        if self >= DdlVersion::V3_0 {
            "name"
        } else {
            "type"
        }
    }

    /// Serialized/deserialized info lives in child tags from 4.0 on.
    pub fn has_layout_children(self) -> bool {
        self >= DdlVersion::V4_0
    }

    pub fn supports_dynamic_arrays(self) -> bool {
        self >= DdlVersion::V2_0
    }

    /// `min`, `max`, `default`, `scale` and `offset` element attributes.
    pub fn supports_value_ranges(self) -> bool {
        self >= DdlVersion::V3_0
    }

    pub fn supports_stream_meta_types(self) -> bool {
        self >= DdlVersion::V4_0
    }
}

impl fmt::Display for DdlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DdlVersion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "1.0" | "1.00" => Ok(DdlVersion::V1_0),
            "2" | "2.0" | "2.00" => Ok(DdlVersion::V2_0),
            "3" | "3.0" | "3.00" => Ok(DdlVersion::V3_0),
            "4" | "4.0" | "4.00" => Ok(DdlVersion::V4_0),
            "4.1" | "4.01" | "4.10" => Ok(DdlVersion::V4_1),
            other => Err(ModelError::UnsupportedVersion(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_attribute_switches_at_3_0() {
        assert_eq!(DdlVersion::V2_0.data_type_name_attribute(), "type");
        assert_eq!(DdlVersion::V3_0.data_type_name_attribute(), "name");
        assert!(!DdlVersion::V3_0.has_layout_children());
        assert!(DdlVersion::V4_0.has_layout_children());
    }

    #[test]
    fn parses_loose_spellings() {
        assert_eq!("4.01".parse::<DdlVersion>().unwrap(), DdlVersion::V4_1);
        assert_eq!("2".parse::<DdlVersion>().unwrap(), DdlVersion::V2_0);
        assert!(matches!(
            "9.9".parse::<DdlVersion>(),
            Err(ModelError::UnsupportedVersion(_))
        ));
    }
}
