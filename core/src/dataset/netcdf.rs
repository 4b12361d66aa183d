//! NetCDF reading and writing through the native `netcdf` library.
//!
//! Time variables follow CF conventions: a `units` attribute of the form
//! `"<unit> since <datetime>"` decodes to [`VariableData::Time`], and a bare
//! time unit on an integer variable decodes to [`VariableData::Duration`].

use super::time::{datetime_to_nanos, parse_datetime};
use super::{AttrValue, Dataset, Variable, VariableData};
use crate::prelude::{LmaError, LmaResult};
use log::debug;
use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use std::collections::BTreeMap;
use std::path::Path;

const TIME_UNITS: &str = "nanoseconds since 1970-01-01T00:00:00Z";
const DURATION_UNITS: &str = "nanoseconds";

fn nc_err(context: &str, err: netcdf::Error) -> LmaError {
    LmaError::NetCdf(format!("{}: {}", context, err))
}

pub fn read_netcdf(path: &Path) -> LmaResult<Dataset> {
    let file = netcdf::open(path).map_err(|e| nc_err(&path.display().to_string(), e))?;
    let mut dataset = Dataset::new();

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|dim| dim.name()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|dim| dim.len()).collect();
        let mut attrs = read_attrs(var.attributes())?;
        let units = match attrs.get("units") {
            Some(AttrValue::Text(units)) => Some(units.clone()),
            _ => None,
        };

        let data = match (var.vartype(), units.as_deref().map(parse_time_units)) {
            (_, Some(Some(TimeUnits::Since { scale, epoch }))) => {
                attrs.remove("units");
                let values: Vec<f64> = var.get_values(..).map_err(|e| nc_err(&name, e))?;
                VariableData::Time(to_array(
                    &shape,
                    values.iter().map(|v| epoch + (v * scale as f64).round() as i64).collect(),
                )?)
            }
            (NcVariableType::Int(_), Some(Some(TimeUnits::Elapsed { scale }))) => {
                attrs.remove("units");
                let values: Vec<i64> = var.get_values(..).map_err(|e| nc_err(&name, e))?;
                VariableData::Duration(to_array(&shape, values.iter().map(|v| v * scale).collect())?)
            }
            (NcVariableType::Int(IntType::U8 | IntType::U16 | IntType::U32 | IntType::U64), _) => {
                let values: Vec<u64> = var.get_values(..).map_err(|e| nc_err(&name, e))?;
                VariableData::UInt(to_array(&shape, values)?)
            }
            (NcVariableType::Int(_), _) => {
                let values: Vec<i64> = var.get_values(..).map_err(|e| nc_err(&name, e))?;
                VariableData::Int(to_array(&shape, values)?)
            }
            (NcVariableType::Float(FloatType::F32 | FloatType::F64), _) => {
                let values: Vec<f64> = var.get_values(..).map_err(|e| nc_err(&name, e))?;
                VariableData::Float(to_array(&shape, values)?)
            }
            (other, _) => {
                debug!("skipping NetCDF variable {} of type {:?}", name, other);
                continue;
            }
        };

        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        let mut variable = Variable::new(&name, &dim_refs, data)?;
        variable.attrs = attrs;
        dataset.insert(variable)?;
    }

    for (key, value) in read_attrs(file.attributes())? {
        dataset.set_attr(&key, value);
    }
    Ok(dataset)
}

pub fn write_netcdf(dataset: &Dataset, path: &Path) -> LmaResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = netcdf::create(path).map_err(|e| nc_err(&path.display().to_string(), e))?;
    for dim in dataset.dims() {
        file.add_dimension(&dim.name, dim.len)
            .map_err(|e| nc_err(&dim.name, e))?;
    }

    for variable in dataset.variables() {
        let dims: Vec<&str> = variable.dims.iter().map(String::as_str).collect();
        let name = variable.name.as_str();
        let mut attrs = variable.attrs.clone();
        match &variable.data {
            VariableData::Float(arr) => {
                let mut var = file.add_variable::<f64>(name, &dims).map_err(|e| nc_err(name, e))?;
                var.put_values(&flat(arr), ..).map_err(|e| nc_err(name, e))?;
                write_attrs(&mut var, &attrs)?;
            }
            VariableData::Int(arr) => {
                let mut var = file.add_variable::<i64>(name, &dims).map_err(|e| nc_err(name, e))?;
                var.put_values(&flat(arr), ..).map_err(|e| nc_err(name, e))?;
                write_attrs(&mut var, &attrs)?;
            }
            VariableData::UInt(arr) => {
                let mut var = file.add_variable::<u64>(name, &dims).map_err(|e| nc_err(name, e))?;
                var.put_values(&flat(arr), ..).map_err(|e| nc_err(name, e))?;
                write_attrs(&mut var, &attrs)?;
            }
            VariableData::Time(arr) | VariableData::Duration(arr) => {
                let units = if matches!(variable.data, VariableData::Time(_)) {
                    TIME_UNITS
                } else {
                    DURATION_UNITS
                };
                attrs.insert("units".to_string(), AttrValue::Text(units.to_string()));
                let mut var = file.add_variable::<i64>(name, &dims).map_err(|e| nc_err(name, e))?;
                var.put_values(&flat(arr), ..).map_err(|e| nc_err(name, e))?;
                write_attrs(&mut var, &attrs)?;
            }
        }
    }

    for (key, value) in dataset.attrs() {
        let result = match value {
            AttrValue::Int(v) => file.add_attribute(key, *v),
            AttrValue::Float(v) => file.add_attribute(key, *v),
            AttrValue::Text(v) => file.add_attribute(key, v.as_str()),
            AttrValue::FloatList(v) => file.add_attribute(key, v.clone()),
        };
        result.map_err(|e| nc_err(key, e))?;
    }
    Ok(())
}

fn flat<T: Clone>(arr: &ArrayD<T>) -> Vec<T> {
    arr.iter().cloned().collect()
}

fn to_array<T>(shape: &[usize], values: Vec<T>) -> LmaResult<ArrayD<T>> {
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}

fn read_attrs<'a>(
    attrs: impl Iterator<Item = netcdf::Attribute<'a>>,
) -> LmaResult<BTreeMap<String, AttrValue>> {
    let mut out = BTreeMap::new();
    for attr in attrs {
        let name = attr.name().to_string();
        let value = match attr.value().map_err(|e| nc_err(&name, e))? {
            AttributeValue::Str(text) => AttrValue::Text(text),
            AttributeValue::Double(v) => AttrValue::Float(v),
            AttributeValue::Float(v) => AttrValue::Float(v as f64),
            AttributeValue::Doubles(v) => AttrValue::FloatList(v),
            AttributeValue::Floats(v) => AttrValue::FloatList(v.into_iter().map(f64::from).collect()),
            AttributeValue::Longlong(v) => AttrValue::Int(v),
            AttributeValue::Int(v) => AttrValue::Int(v as i64),
            AttributeValue::Short(v) => AttrValue::Int(v as i64),
            AttributeValue::Schar(v) => AttrValue::Int(v as i64),
            AttributeValue::Uchar(v) => AttrValue::Int(v as i64),
            AttributeValue::Ushort(v) => AttrValue::Int(v as i64),
            AttributeValue::Uint(v) => AttrValue::Int(v as i64),
            other => {
                debug!("skipping attribute {} ({:?})", name, other);
                continue;
            }
        };
        out.insert(name, value);
    }
    Ok(out)
}

fn write_attrs(var: &mut netcdf::VariableMut<'_>, attrs: &BTreeMap<String, AttrValue>) -> LmaResult<()> {
    for (key, value) in attrs {
        let result = match value {
            AttrValue::Int(v) => var.put_attribute(key, *v),
            AttrValue::Float(v) => var.put_attribute(key, *v),
            AttrValue::Text(v) => var.put_attribute(key, v.as_str()),
            AttrValue::FloatList(v) => var.put_attribute(key, v.clone()),
        };
        result.map_err(|e| nc_err(key, e))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeUnits {
    /// Nanoseconds per unit, and the epoch in nanoseconds.
    Since { scale: i64, epoch: i64 },
    Elapsed { scale: i64 },
}

fn unit_nanos(unit: &str) -> Option<i64> {
    Some(match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 86_400_000_000_000,
        "hours" | "hour" | "h" => 3_600_000_000_000,
        "minutes" | "minute" | "min" => 60_000_000_000,
        "seconds" | "second" | "s" | "sec" => 1_000_000_000,
        "milliseconds" | "millisecond" | "ms" => 1_000_000,
        "microseconds" | "microsecond" | "us" => 1_000,
        "nanoseconds" | "nanosecond" | "ns" => 1,
        _ => return None,
    })
}

fn parse_time_units(units: &str) -> Option<TimeUnits> {
    match units.split_once(" since ") {
        Some((unit, reference)) => {
            let scale = unit_nanos(unit)?;
            let epoch = parse_datetime(reference.trim())
                .and_then(datetime_to_nanos)
                .ok()?;
            Some(TimeUnits::Since { scale, epoch })
        }
        None => unit_nanos(units).map(|scale| TimeUnits::Elapsed { scale }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cf_units_are_recognised() {
        assert_eq!(
            parse_time_units("seconds since 1970-01-01 00:00:00"),
            Some(TimeUnits::Since {
                scale: 1_000_000_000,
                epoch: 0
            })
        );
        assert_eq!(
            parse_time_units("nanoseconds"),
            Some(TimeUnits::Elapsed { scale: 1 })
        );
        assert_eq!(parse_time_units("m"), None);
    }

    #[test]
    fn netcdf_round_trip() {
        let ds = Dataset::from_variables([
            Variable::new("event_time", &["number_of_events"], VariableData::time(vec![5, 6])).unwrap(),
            Variable::new("event_altitude", &["number_of_events"], VariableData::float(vec![1.0, 2.0]))
                .unwrap()
                .with_attr("units", "m"),
            Variable::new("flash_id", &["number_of_flashes"], VariableData::uint(vec![0])).unwrap(),
            Variable::scalar("flash_time_separation_threshold", VariableData::scalar_duration(150_000_000))
                .unwrap(),
        ])
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("lma.nc");
        write_netcdf(&ds, &path).unwrap();
        let loaded = read_netcdf(&path).unwrap();
        assert_eq!(loaded, ds);
    }
}
