//! Catalog-driven serialization of one day of fields.
//!
//! Serialization runs in two phases. [`prepare`] resolves every catalog
//! variable against the day's fields, checks shapes against the resolved
//! dimensions and substitutes missing values; it touches no files. Only a
//! fully prepared [`ArtifactPlan`] reaches the [`ArtifactWriter`], so a day
//! that fails validation never leaves a partial file behind.

pub mod writer;

pub use writer::ArtifactWriter;

use crate::catalog::{Axis, Catalog, StaticValue, VariableSchemaEntry};
use crate::constants::ARTIFACT_TIMESTAMP_FORMAT;
use crate::error::{DsdError, Result};
use crate::models::{FieldArray, FieldSet};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::warn;

/// Runtime sizes for one day's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayLayout {
    /// First slot of the day
    pub start: NaiveDateTime,
    pub time_len: usize,
    pub bins: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDimension {
    pub name: String,
    pub len: usize,
}

/// A variable ready to be written: values in `f64`, NaN already replaced
#[derive(Debug, Clone)]
pub struct PreparedVariable<'c> {
    pub entry: &'c VariableSchemaEntry,
    pub values: Vec<f64>,
    /// Sentinel recorded as the `missing_value` attribute; `None` when the
    /// catalog declares none and no value had to be replaced
    pub missing_value: Option<f64>,
}

/// Everything needed to write one artifact
#[derive(Debug, Clone)]
pub struct ArtifactPlan<'c> {
    pub datastream: &'c str,
    pub global_attributes: &'c BTreeMap<String, serde_json::Value>,
    pub layout: DayLayout,
    pub dimensions: Vec<ResolvedDimension>,
    pub variables: Vec<PreparedVariable<'c>>,
    /// Optional variables filled with zeros because no value was available
    pub substituted: Vec<String>,
}

impl ArtifactPlan<'_> {
    pub fn file_name(&self) -> String {
        artifact_name(self.datastream, self.layout.start)
    }
}

/// `<datastream>.<YYYYmmdd>.<HHMMSS>.nc`
pub fn artifact_name(datastream: &str, start: NaiveDateTime) -> String {
    format!(
        "{}.{}.nc",
        datastream,
        start.format(ARTIFACT_TIMESTAMP_FORMAT)
    )
}

/// Sizes of the catalog dimensions for this day, in declaration order
pub fn resolve_dimensions(catalog: &Catalog, layout: &DayLayout) -> Vec<ResolvedDimension> {
    catalog
        .dimensions
        .iter()
        .map(|d| ResolvedDimension {
            name: d.name.clone(),
            len: match (d.axis, d.size) {
                (Some(Axis::Time), _) => layout.time_len,
                (Some(Axis::DropClass), _) => layout.bins,
                (None, size) => size.unwrap_or(0),
            },
        })
        .collect()
}

/// Resolve and validate every catalog variable for one day
pub fn prepare<'c>(
    catalog: &'c Catalog,
    layout: &DayLayout,
    fields: &FieldSet,
) -> Result<ArtifactPlan<'c>> {
    let datastream = catalog.datastream()?;
    let dimensions = resolve_dimensions(catalog, layout);
    let mut variables = Vec::with_capacity(catalog.variables.len());
    let mut substituted = Vec::new();

    for entry in &catalog.variables {
        let shape = entry
            .dimensions
            .iter()
            .map(|name| {
                dimensions
                    .iter()
                    .find(|d| &d.name == name)
                    .map(|d| d.len)
                    .ok_or_else(|| DsdError::UnknownDimension {
                        variable: entry.name.clone(),
                        dimension: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let prepared = match &entry.value {
            Some(value) => PreparedVariable {
                entry,
                values: static_values(entry, value, &shape)?,
                missing_value: entry.missing_value,
            },
            None => {
                let array = match fields.get(&entry.name) {
                    Some(array) => {
                        check_shape(entry, &shape, array.shape())?;
                        array.values().to_vec()
                    }
                    None if entry.optional => {
                        warn!(
                            "Optional variable '{}' has no value; writing zeros",
                            entry.name
                        );
                        substituted.push(entry.name.clone());
                        FieldArray::filled(shape, 0.0).into_values()
                    }
                    None => {
                        return Err(DsdError::MissingVariable {
                            name: entry.name.clone(),
                        });
                    }
                };
                let sentinel = entry.sentinel();
                let has_gaps = array.iter().any(|v| v.is_nan());
                PreparedVariable {
                    entry,
                    values: array
                        .into_iter()
                        .map(|v| if v.is_nan() { sentinel } else { v })
                        .collect(),
                    // The default sentinel is only declared where it was used
                    missing_value: entry.missing_value.or(has_gaps.then_some(sentinel)),
                }
            }
        };
        variables.push(prepared);
    }

    Ok(ArtifactPlan {
        datastream,
        global_attributes: &catalog.global_attributes,
        layout: *layout,
        dimensions,
        variables,
        substituted,
    })
}

fn check_shape(entry: &VariableSchemaEntry, expected: &[usize], found: &[usize]) -> Result<()> {
    if expected.len() != found.len() {
        return Err(DsdError::RankMismatch {
            variable: entry.name.clone(),
            expected: expected.len(),
            found: found.len(),
        });
    }
    for ((dimension, want), got) in entry.dimensions.iter().zip(expected).zip(found) {
        if want != got {
            return Err(DsdError::DimensionMismatch {
                variable: entry.name.clone(),
                dimension: dimension.clone(),
                expected: *want,
                found: *got,
            });
        }
    }
    Ok(())
}

/// Catalog-provided values shaped to the variable's dimensions.
///
/// A single number is broadcast; text becomes character codes padded with
/// zeros along the variable's only dimension.
fn static_values(
    entry: &VariableSchemaEntry,
    value: &StaticValue,
    shape: &[usize],
) -> Result<Vec<f64>> {
    match value {
        StaticValue::Number(n) => Ok(FieldArray::filled(shape.to_vec(), *n).into_values()),
        StaticValue::Numbers(values) => {
            check_shape(entry, shape, &[values.len()])?;
            Ok(values.clone())
        }
        StaticValue::Text(text) => {
            let [len] = shape else {
                return Err(DsdError::configuration(format!(
                    "text value of variable '{}' needs exactly one dimension",
                    entry.name
                )));
            };
            if text.len() > *len {
                return Err(DsdError::DimensionMismatch {
                    variable: entry.name.clone(),
                    dimension: entry.dimensions[0].clone(),
                    expected: *len,
                    found: text.len(),
                });
            }
            let mut codes: Vec<f64> = text.bytes().map(f64::from).collect();
            codes.resize(*len, 0.0);
            Ok(codes)
        }
    }
}
