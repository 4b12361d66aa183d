use super::json_float;
use crate::prelude::{LmaError, LmaResult};
use ndarray::{Array1, ArrayD, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const NANOS_PER_SECOND: f64 = 1.0e9;

/// Element type of a variable, used for schema checks and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Float,
    Int,
    UInt,
    Time,
    Duration,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataKind::Float => "float64",
            DataKind::Int => "int64",
            DataKind::UInt => "uint64",
            DataKind::Time => "datetime64[ns]",
            DataKind::Duration => "timedelta64[ns]",
        };
        f.write_str(label)
    }
}

/// Typed n-dimensional storage for one variable.
///
/// `Time` holds nanoseconds since the Unix epoch and `Duration` holds
/// nanosecond spans; both convert to float seconds through [`VariableData::to_f64`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum VariableData {
    Float(#[serde(with = "json_float::array")] ArrayD<f64>),
    Int(ArrayD<i64>),
    UInt(ArrayD<u64>),
    Time(ArrayD<i64>),
    Duration(ArrayD<i64>),
}

macro_rules! map_arrays {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            VariableData::Float($arr) => VariableData::Float($body),
            VariableData::Int($arr) => VariableData::Int($body),
            VariableData::UInt($arr) => VariableData::UInt($body),
            VariableData::Time($arr) => VariableData::Time($body),
            VariableData::Duration($arr) => VariableData::Duration($body),
        }
    };
}

macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            VariableData::Float($arr) => $body,
            VariableData::Int($arr) => $body,
            VariableData::UInt($arr) => $body,
            VariableData::Time($arr) => $body,
            VariableData::Duration($arr) => $body,
        }
    };
}

impl VariableData {
    pub fn float(values: Vec<f64>) -> Self {
        VariableData::Float(Array1::from(values).into_dyn())
    }

    pub fn int(values: Vec<i64>) -> Self {
        VariableData::Int(Array1::from(values).into_dyn())
    }

    pub fn uint(values: Vec<u64>) -> Self {
        VariableData::UInt(Array1::from(values).into_dyn())
    }

    pub fn time(nanos: Vec<i64>) -> Self {
        VariableData::Time(Array1::from(nanos).into_dyn())
    }

    pub fn duration(nanos: Vec<i64>) -> Self {
        VariableData::Duration(Array1::from(nanos).into_dyn())
    }

    pub fn scalar_float(value: f64) -> Self {
        VariableData::Float(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn scalar_duration(nanos: i64) -> Self {
        VariableData::Duration(ArrayD::from_elem(IxDyn(&[]), nanos))
    }

    pub fn kind(&self) -> DataKind {
        match self {
            VariableData::Float(_) => DataKind::Float,
            VariableData::Int(_) => DataKind::Int,
            VariableData::UInt(_) => DataKind::UInt,
            VariableData::Time(_) => DataKind::Time,
            VariableData::Duration(_) => DataKind::Duration,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, arr => arr.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        with_array!(self, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Float view of the data; times become epoch seconds, durations seconds.
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            VariableData::Float(arr) => arr.clone(),
            VariableData::Int(arr) => arr.mapv(|v| v as f64),
            VariableData::UInt(arr) => arr.mapv(|v| v as f64),
            VariableData::Time(arr) | VariableData::Duration(arr) => {
                arr.mapv(|v| v as f64 / NANOS_PER_SECOND)
            }
        }
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        match self {
            VariableData::Float(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&ArrayD<i64>> {
        match self {
            VariableData::Int(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<&ArrayD<u64>> {
        match self {
            VariableData::UInt(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&ArrayD<i64>> {
        match self {
            VariableData::Time(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<&ArrayD<i64>> {
        match self {
            VariableData::Duration(arr) => Some(arr),
            _ => None,
        }
    }

    /// Integer-valued view for columns stored as either signed or unsigned.
    pub fn to_i64(&self) -> Option<ArrayD<i64>> {
        match self {
            VariableData::Int(arr) => Some(arr.clone()),
            VariableData::UInt(arr) => Some(arr.mapv(|v| v.min(i64::MAX as u64) as i64)),
            _ => None,
        }
    }

    /// Pick `indices` along `axis`; indices may repeat or reorder.
    pub fn select(&self, axis: usize, indices: &[usize]) -> LmaResult<Self> {
        let shape = self.shape();
        if axis >= shape.len() {
            return Err(LmaError::InvalidInput(format!(
                "axis {} out of range for {}-d data",
                axis,
                shape.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&idx| idx >= shape[axis]) {
            return Err(LmaError::InvalidInput(format!(
                "index {} out of bounds for axis of length {}",
                bad, shape[axis]
            )));
        }
        Ok(map_arrays!(self, arr => arr.select(Axis(axis), indices)))
    }

    /// Adds a new axis of length one at `axis`.
    pub fn insert_axis(&self, axis: usize) -> LmaResult<Self> {
        if axis > self.ndim() {
            return Err(LmaError::InvalidInput(format!(
                "cannot insert axis {} into {}-d data",
                axis,
                self.ndim()
            )));
        }
        Ok(map_arrays!(self, arr => arr.clone().insert_axis(Axis(axis))))
    }

    /// Joins `parts` along an existing axis. All parts must share a kind.
    pub fn concatenate(axis: usize, parts: &[&VariableData]) -> LmaResult<Self> {
        let first = parts
            .first()
            .ok_or_else(|| LmaError::InvalidInput("nothing to concatenate".into()))?;
        let kind = first.kind();
        if let Some(other) = parts.iter().find(|part| part.kind() != kind) {
            return Err(LmaError::MalformedDataset(format!(
                "cannot concatenate {} with {}",
                kind,
                other.kind()
            )));
        }
        if parts.iter().any(|part| axis >= part.ndim()) {
            return Err(LmaError::MalformedDataset(format!(
                "concatenation axis {} missing from a part",
                axis
            )));
        }

        let joined = match kind {
            DataKind::Float => VariableData::Float(join(axis, parts, VariableData::as_float)?),
            DataKind::UInt => VariableData::UInt(join(axis, parts, VariableData::as_uint)?),
            DataKind::Int => VariableData::Int(join(axis, parts, VariableData::as_int)?),
            DataKind::Time => VariableData::Time(join(axis, parts, VariableData::as_time)?),
            DataKind::Duration => {
                VariableData::Duration(join(axis, parts, VariableData::as_duration)?)
            }
        };
        Ok(joined)
    }
}

fn join<T: Clone>(
    axis: usize,
    parts: &[&VariableData],
    pick: impl Fn(&VariableData) -> Option<&ArrayD<T>>,
) -> LmaResult<ArrayD<T>> {
    let views: Vec<ArrayViewD<'_, T>> = parts
        .iter()
        .filter_map(|part| pick(*part))
        .map(|arr| arr.view())
        .collect();
    Ok(ndarray::concatenate(Axis(axis), &views)?)
}

/// Attribute values attached to variables and datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(#[serde(with = "json_float::scalar")] f64),
    Text(String),
    FloatList(#[serde(with = "json_float::list")] Vec<f64>),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

/// A named array with one dimension name per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: VariableData,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Variable {
    pub fn new(name: &str, dims: &[&str], data: VariableData) -> LmaResult<Self> {
        let variable = Self {
            name: name.to_string(),
            dims: dims.iter().map(|dim| dim.to_string()).collect(),
            data,
            attrs: BTreeMap::new(),
        };
        variable.validate()?;
        Ok(variable)
    }

    /// A zero-dimensional variable.
    pub fn scalar(name: &str, data: VariableData) -> LmaResult<Self> {
        Self::new(name, &[], data)
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|name| name == dim)
    }

    pub fn validate(&self) -> LmaResult<()> {
        if self.dims.len() != self.data.ndim() {
            return Err(LmaError::MalformedDataset(format!(
                "variable {} names {} dimensions but holds {}-d data",
                self.name,
                self.dims.len(),
                self.data.ndim()
            )));
        }
        for (idx, dim) in self.dims.iter().enumerate() {
            if self.dims[..idx].contains(dim) {
                return Err(LmaError::MalformedDataset(format!(
                    "variable {} repeats dimension {}",
                    self.name, dim
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_rejects_dimension_count_mismatch() {
        let err = Variable::new("x", &["a", "b"], VariableData::float(vec![1.0, 2.0])).unwrap_err();
        assert!(matches!(err, LmaError::MalformedDataset(_)));
    }

    #[test]
    fn durations_convert_to_seconds() {
        let data = VariableData::duration(vec![1_500_000_000, 250_000_000]);
        let seconds = data.to_f64();
        assert_eq!(seconds.as_slice().unwrap(), &[1.5, 0.25]);
    }

    #[test]
    fn concatenate_rejects_mixed_kinds() {
        let a = VariableData::float(vec![1.0]);
        let b = VariableData::int(vec![1]);
        assert!(VariableData::concatenate(0, &[&a, &b]).is_err());
    }

    #[test]
    fn concatenate_joins_in_order() {
        let a = VariableData::time(vec![1, 2]);
        let b = VariableData::time(vec![3]);
        let joined = VariableData::concatenate(0, &[&a, &b]).unwrap();
        assert_eq!(joined.as_time().unwrap().as_slice().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn select_checks_bounds() {
        let data = VariableData::uint(vec![4, 5, 6]);
        assert!(data.select(0, &[3]).is_err());
        let picked = data.select(0, &[2, 0]).unwrap();
        assert_eq!(picked.as_uint().unwrap().as_slice().unwrap(), &[6, 4]);
    }

    #[test]
    fn scalar_promotes_to_one_element_axis() {
        let data = VariableData::scalar_float(3.0);
        let promoted = data.insert_axis(0).unwrap();
        assert_eq!(promoted.shape(), &[1]);
    }
}
