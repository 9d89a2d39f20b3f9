//! Variable and dimension catalog for the daily output files.
//!
//! The catalog is a JSON document declaring the output dimensions, the global
//! attributes and every variable with its datatype, dimensions, missing-value
//! sentinel and descriptive attributes. It is loaded and validated once at
//! startup and only read afterwards.
//!
//! ```json
//! {
//!   "dimensions": [
//!     { "name": "time", "axis": "time" },
//!     { "name": "drop_class", "axis": "drop_class" },
//!     { "name": "str_dim", "size": 255 }
//!   ],
//!   "global_attributes": { "datastream": "sgpdisdrometerM1.b1" },
//!   "variables": [
//!     { "name": "rain_rate", "dimensions": ["time"], "datatype": "float32",
//!       "missing_value": -9999.0, "units": "mm/h", "long_name": "Rain rate" }
//!   ]
//! }
//! ```

use crate::constants::{DATASTREAM_ATTRIBUTE, DEFAULT_MISSING_VALUE};
use crate::error::{DsdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Runtime axis a dimension is sized from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Slots in the daily window
    Time,
    /// Diameter bins of the instrument
    DropClass,
}

/// A named output dimension, either bound to a runtime axis or of fixed size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

/// Storage type of an output variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "f8", alias = "double")]
    Float64,
    #[serde(alias = "f4", alias = "float")]
    Float32,
    #[serde(alias = "i8")]
    Int64,
    #[serde(alias = "i4", alias = "int")]
    Int32,
    #[serde(alias = "i2", alias = "short")]
    Int16,
    #[serde(alias = "i1", alias = "byte")]
    Int8,
    #[serde(alias = "u8")]
    UInt64,
    #[serde(alias = "u4")]
    UInt32,
    #[serde(alias = "u2")]
    UInt16,
    #[serde(alias = "u1", alias = "ubyte")]
    UInt8,
}

impl DataType {
    /// Whether `value` survives a cast to this type unchanged
    pub fn can_represent(self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let integral = value.fract() == 0.0;
        match self {
            Self::Float64 => true,
            Self::Float32 => value.abs() <= f64::from(f32::MAX),
            Self::Int64 => integral && value >= i64::MIN as f64 && value < i64::MAX as f64,
            Self::Int32 => integral && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX),
            Self::Int16 => integral && value >= f64::from(i16::MIN) && value <= f64::from(i16::MAX),
            Self::Int8 => integral && value >= f64::from(i8::MIN) && value <= f64::from(i8::MAX),
            Self::UInt64 => integral && value >= 0.0 && value < u64::MAX as f64,
            Self::UInt32 => integral && value >= 0.0 && value <= f64::from(u32::MAX),
            Self::UInt16 => integral && value >= 0.0 && value <= f64::from(u16::MAX),
            Self::UInt8 => integral && value >= 0.0 && value <= f64::from(u8::MAX),
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Float64 | Self::Float32)
    }
}

/// A value written straight from the catalog rather than computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticValue {
    Number(f64),
    Numbers(Vec<f64>),
    /// Stored as character codes padded with zeros along the variable's dimension
    Text(String),
}

/// One output variable.
///
/// Keys other than the typed ones below are kept in `attributes` and written
/// as variable attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSchemaEntry {
    pub name: String,

    /// Optional variables without a value are filled with 0 instead of failing the day
    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub dimensions: Vec<String>,

    pub datatype: DataType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<StaticValue>,

    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl VariableSchemaEntry {
    /// Sentinel replacing NaN for this variable
    pub fn sentinel(&self) -> f64 {
        self.missing_value.unwrap_or(DEFAULT_MISSING_VALUE)
    }

    pub fn is_static(&self) -> bool {
        self.value.is_some()
    }
}

/// The complete output catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub dimensions: Vec<DimensionSpec>,

    #[serde(default)]
    pub global_attributes: BTreeMap<String, serde_json::Value>,

    pub variables: Vec<VariableSchemaEntry>,
}

impl Catalog {
    /// Load and validate a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Self =
            serde_json::from_str(&content).map_err(|source| DsdError::InvalidSchemaDocument {
                path: path.to_path_buf(),
                source,
            })?;
        catalog.validate()?;
        debug!(
            "Loaded catalog with {} dimensions and {} variables from {}",
            catalog.dimensions.len(),
            catalog.variables.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Check the catalog is internally consistent
    pub fn validate(&self) -> Result<()> {
        let mut dimension_names = HashSet::new();
        for dimension in &self.dimensions {
            if !dimension_names.insert(dimension.name.as_str()) {
                return Err(DsdError::configuration(format!(
                    "dimension '{}' is declared twice",
                    dimension.name
                )));
            }
            match (dimension.axis, dimension.size) {
                (Some(_), None) => {}
                (None, Some(size)) if size > 0 => {}
                _ => {
                    return Err(DsdError::configuration(format!(
                        "dimension '{}' needs exactly one of a runtime axis or a positive size",
                        dimension.name
                    )));
                }
            }
        }

        for axis in [Axis::Time, Axis::DropClass] {
            let bound = self
                .dimensions
                .iter()
                .filter(|d| d.axis == Some(axis))
                .count();
            if bound != 1 {
                return Err(DsdError::configuration(format!(
                    "exactly one dimension must be bound to the {:?} axis, found {}",
                    axis, bound
                )));
            }
        }

        let mut variable_names = HashSet::new();
        for variable in &self.variables {
            if !variable_names.insert(variable.name.as_str()) {
                return Err(DsdError::configuration(format!(
                    "variable '{}' is declared twice",
                    variable.name
                )));
            }
            if let Some(unknown) = variable
                .dimensions
                .iter()
                .find(|d| !dimension_names.contains(d.as_str()))
            {
                return Err(DsdError::UnknownDimension {
                    variable: variable.name.clone(),
                    dimension: unknown.clone(),
                });
            }
            if !variable.is_static() && !variable.datatype.can_represent(variable.sentinel()) {
                return Err(DsdError::configuration(format!(
                    "missing value {} of variable '{}' does not fit its {:?} datatype",
                    variable.sentinel(),
                    variable.name,
                    variable.datatype
                )));
            }
            if matches!(variable.value, Some(StaticValue::Text(_)))
                && !variable.datatype.is_integer()
            {
                return Err(DsdError::configuration(format!(
                    "text value of variable '{}' needs an integer datatype",
                    variable.name
                )));
            }
        }

        self.datastream()?;
        Ok(())
    }

    /// Platform/datastream identifier used in output file names
    pub fn datastream(&self) -> Result<&str> {
        self.global_attributes
            .get(DATASTREAM_ATTRIBUTE)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                DsdError::configuration(format!(
                    "global attribute '{}' must be a non-empty string",
                    DATASTREAM_ATTRIBUTE
                ))
            })
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSchemaEntry> {
        self.variables.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal catalog over the two-bin test instrument
    pub(crate) fn test_catalog() -> Catalog {
        serde_json::from_value(json!({
            "dimensions": [
                { "name": "time", "axis": "time" },
                { "name": "drop_class", "axis": "drop_class" },
                { "name": "str_dim", "size": 32 }
            ],
            "global_attributes": {
                "datastream": "testdisdrometer.b1",
                "institution": "Test Lab",
                "version": 2
            },
            "variables": [
                { "name": "base_time", "datatype": "int64", "long_name": "Base time in epoch" },
                { "name": "time_offset", "dimensions": ["time"], "datatype": "float64" },
                { "name": "time", "dimensions": ["time"], "datatype": "float64" },
                { "name": "drop_avg_class", "dimensions": ["drop_class"], "datatype": "float32", "units": "mm" },
                { "name": "num_drop", "dimensions": ["time", "drop_class"], "datatype": "int32",
                  "missing_value": -9999 },
                { "name": "rain_rate", "dimensions": ["time"], "datatype": "float32",
                  "missing_value": -9999.0, "units": "mm/h" },
                { "name": "radar_reflectivity", "dimensions": ["time"], "datatype": "float32",
                  "missing_value": -9999.0, "units": "dBZ" },
                { "name": "qc_number_detected_particles", "dimensions": ["time"], "datatype": "int16",
                  "missing_value": -99 },
                { "name": "snow_rate", "dimensions": ["time"], "datatype": "float32", "optional": true },
                { "name": "lat", "datatype": "float32", "value": 40.5, "units": "degree_N" },
                { "name": "description", "dimensions": ["str_dim"], "datatype": "u1",
                  "value": "test disdrometer" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_catalog_parses_and_validates() {
        let catalog = test_catalog();
        catalog.validate().unwrap();

        assert_eq!(catalog.datastream().unwrap(), "testdisdrometer.b1");
        let rain = catalog.variable("rain_rate").unwrap();
        assert_eq!(rain.datatype, DataType::Float32);
        assert_eq!(rain.attributes["units"], json!("mm/h"));
        assert!(!rain.attributes.contains_key("missing_value"));

        let description = catalog.variable("description").unwrap();
        assert_eq!(description.datatype, DataType::UInt8);
        assert_eq!(
            description.value,
            Some(StaticValue::Text("test disdrometer".to_string()))
        );
        assert_eq!(catalog.variable("snow_rate").unwrap().sentinel(), -9999.0);
    }

    #[test]
    fn test_rejects_undeclared_dimension() {
        let mut catalog = test_catalog();
        catalog.variables[5].dimensions = vec!["height".to_string()];

        match catalog.validate().unwrap_err() {
            DsdError::UnknownDimension { variable, dimension } => {
                assert_eq!(variable, "rain_rate");
                assert_eq!(dimension, "height");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_missing_axis_binding() {
        let mut catalog = test_catalog();
        catalog.dimensions.retain(|d| d.axis != Some(Axis::DropClass));
        catalog.variables.retain(|v| !v.dimensions.iter().any(|d| d == "drop_class"));
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_sentinel() {
        let mut catalog = test_catalog();
        let qc = catalog
            .variables
            .iter_mut()
            .find(|v| v.name == "qc_number_detected_particles")
            .unwrap();
        qc.datatype = DataType::UInt8;
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("qc_number_detected_particles"));
    }

    #[test]
    fn test_requires_datastream() {
        let mut catalog = test_catalog();
        catalog.global_attributes.remove("datastream");
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_datatype_range_checks() {
        assert!(DataType::Int16.can_represent(-9999.0));
        assert!(!DataType::Int8.can_represent(-9999.0));
        assert!(!DataType::UInt16.can_represent(-1.0));
        assert!(!DataType::Int32.can_represent(0.5));
        assert!(DataType::Float32.can_represent(-9999.0));
        assert!(!DataType::Float64.can_represent(f64::NAN));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string(&test_catalog()).unwrap()).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded, test_catalog());
    }
}
