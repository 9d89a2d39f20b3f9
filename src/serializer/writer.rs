//! NetCDF output for prepared daily plans.

use super::{ArtifactPlan, DayLayout, prepare};
use crate::catalog::{Catalog, DataType};
use crate::constants::fields;
use crate::error::Result;
use crate::models::FieldSet;
use netcdf::AttributeValue;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of writing one day
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub substituted: Vec<String>,
}

/// Writes one NetCDF file per day into an output directory
#[derive(Debug)]
pub struct ArtifactWriter<'c> {
    catalog: &'c Catalog,
    output_dir: PathBuf,
}

impl<'c> ArtifactWriter<'c> {
    pub fn new(catalog: &'c Catalog, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            output_dir: output_dir.into(),
        }
    }

    /// Validate the day's fields against the catalog and write the file.
    ///
    /// Validation failures return before anything is created on disk.
    pub fn write_day(&self, layout: &DayLayout, fields: &FieldSet) -> Result<WrittenArtifact> {
        let plan = prepare(self.catalog, layout, fields)?;
        let path = self.write(&plan)?;
        Ok(WrittenArtifact {
            path,
            substituted: plan.substituted,
        })
    }

    /// Write a prepared plan, replacing any file of the same name
    pub fn write(&self, plan: &ArtifactPlan<'_>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(plan.file_name());

        if path.exists() {
            info!("{} already exists, overwriting", path.display());
            std::fs::remove_file(&path)?;
        }

        if let Err(error) = write_netcdf(&path, plan) {
            if let Err(cleanup) = std::fs::remove_file(&path) {
                warn!(
                    "Could not remove partial file {}: {}",
                    path.display(),
                    cleanup
                );
            }
            return Err(error);
        }

        debug!(
            "Wrote {} variables to {}",
            plan.variables.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Add a variable of the given element type, cast the values and the
/// sentinel to it and write them.
macro_rules! add_typed_variable {
    ($file:expr, $variable:expr, $dims:expr, $ty:ty) => {{
        let data: Vec<$ty> = $variable.values.iter().map(|v| *v as $ty).collect();
        let mut var = $file.add_variable::<$ty>(&$variable.entry.name, $dims)?;
        if let Some(missing) = $variable.missing_value {
            var.put_attribute("missing_value", missing as $ty)?;
        }
        var.put_values(&data, ..)?;
        var
    }};
}

fn write_netcdf(path: &Path, plan: &ArtifactPlan<'_>) -> Result<()> {
    let mut file = netcdf::create(path)?;

    for dimension in &plan.dimensions {
        file.add_dimension(&dimension.name, dimension.len)?;
    }

    for (name, value) in plan.global_attributes {
        file.add_attribute(name, json_attribute(value))?;
    }

    let time_string = time_attribute(&plan.layout);

    for variable in &plan.variables {
        let dims: Vec<&str> = variable
            .entry
            .dimensions
            .iter()
            .map(String::as_str)
            .collect();

        let mut var = match variable.entry.datatype {
            DataType::Float64 => add_typed_variable!(file, variable, &dims, f64),
            DataType::Float32 => add_typed_variable!(file, variable, &dims, f32),
            DataType::Int64 => add_typed_variable!(file, variable, &dims, i64),
            DataType::Int32 => add_typed_variable!(file, variable, &dims, i32),
            DataType::Int16 => add_typed_variable!(file, variable, &dims, i16),
            DataType::Int8 => add_typed_variable!(file, variable, &dims, i8),
            DataType::UInt64 => add_typed_variable!(file, variable, &dims, u64),
            DataType::UInt32 => add_typed_variable!(file, variable, &dims, u32),
            DataType::UInt16 => add_typed_variable!(file, variable, &dims, u16),
            DataType::UInt8 => add_typed_variable!(file, variable, &dims, u8),
        };

        for (key, value) in &variable.entry.attributes {
            var.put_attribute(key, json_attribute(value))?;
        }

        match variable.entry.name.as_str() {
            fields::BASE_TIME => {
                var.put_attribute("string", time_string.as_str())?;
            }
            fields::TIME_OFFSET | fields::TIME => {
                var.put_attribute("units", format!("seconds since {}", time_string))?;
            }
            _ => {}
        }
    }

    Ok(())
}

/// `YYYY-MM-DD HH:MM:SS 0:00` for the first slot of the day
pub fn time_attribute(layout: &DayLayout) -> String {
    layout.start.format("%Y-%m-%d %H:%M:%S 0:00").to_string()
}

/// Map a catalog attribute onto a NetCDF attribute value
fn json_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::Str(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Longlong(i),
            None => AttributeValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number) => {
            AttributeValue::Doubles(items.iter().filter_map(Value::as_f64).collect())
        }
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
            AttributeValue::Strs(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            )
        }
        other => AttributeValue::Str(other.to_string()),
    }
}
