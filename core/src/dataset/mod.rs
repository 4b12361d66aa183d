//! Labelled columnar datasets: named variables over named dimensions.
//!
//! Dimensions are not stored separately; they are derived from the variables
//! in first-appearance order, and every variable must agree on the length of
//! each dimension it shares with the others.

pub mod io;
mod json_float;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod reshape;
pub mod time;
pub mod variable;

pub use io::{load_dataset, save_dataset};
pub use variable::{AttrValue, DataKind, Variable, VariableData};

use crate::prelude::{LmaError, LmaResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named axis and its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from variables, checking dimension consistency.
    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> LmaResult<Self> {
        let mut dataset = Self::new();
        for variable in variables {
            dataset.insert(variable)?;
        }
        Ok(dataset)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|var| var.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|var| var.name == name)
    }

    pub fn require(&self, name: &str) -> LmaResult<&Variable> {
        self.get(name)
            .ok_or_else(|| LmaError::MissingVariable(name.to_string()))
    }

    pub fn dims(&self) -> Vec<Dimension> {
        collect_dims(self.variables.iter())
    }

    pub fn dim_names(&self) -> Vec<String> {
        self.dims().into_iter().map(|dim| dim.name).collect()
    }

    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims()
            .into_iter()
            .find(|dim| dim.name == name)
            .map(|dim| dim.len)
    }

    /// Adds or replaces a variable. Replacement keeps the variable's position.
    pub fn insert(&mut self, variable: Variable) -> LmaResult<()> {
        variable.validate()?;
        let others = collect_dims(self.variables.iter().filter(|var| var.name != variable.name));
        for (dim, &len) in variable.dims.iter().zip(variable.data.shape()) {
            if let Some(existing) = others.iter().find(|known| &known.name == dim) {
                if existing.len != len {
                    return Err(LmaError::MalformedDataset(format!(
                        "variable {} gives dimension {} length {}, dataset has {}",
                        variable.name, dim, len, existing.len
                    )));
                }
            }
        }

        match self.variables.iter_mut().find(|var| var.name == variable.name) {
            Some(slot) => *slot = variable,
            None => self.variables.push(variable),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        let idx = self.variables.iter().position(|var| var.name == name)?;
        Some(self.variables.remove(idx))
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// Copy without any variable that uses one of `dims`.
    pub fn drop_dims(&self, dims: &[&str]) -> LmaResult<Self> {
        let known = self.dim_names();
        if let Some(missing) = dims.iter().find(|dim| !known.iter().any(|name| name.as_str() == **dim)) {
            return Err(LmaError::MissingDimension(missing.to_string()));
        }
        let variables = self
            .variables
            .iter()
            .filter(|var| !var.dims.iter().any(|dim| dims.contains(&dim.as_str())))
            .cloned()
            .collect();
        Ok(Self {
            variables,
            attrs: self.attrs.clone(),
        })
    }

    pub fn drop_vars(&self, names: &[&str]) -> LmaResult<Self> {
        if let Some(missing) = names.iter().find(|name| !self.contains(name)) {
            return Err(LmaError::MissingVariable(missing.to_string()));
        }
        let variables = self
            .variables
            .iter()
            .filter(|var| !names.contains(&var.name.as_str()))
            .cloned()
            .collect();
        Ok(Self {
            variables,
            attrs: self.attrs.clone(),
        })
    }

    /// Index selection along one dimension, applied to every variable using it.
    pub fn isel(&self, dim: &str, indices: &[usize]) -> LmaResult<Self> {
        if self.dim_len(dim).is_none() {
            return Err(LmaError::MissingDimension(dim.to_string()));
        }
        let mut variables = Vec::with_capacity(self.variables.len());
        for var in &self.variables {
            let selected = match var.axis_of(dim) {
                Some(axis) => Variable {
                    data: var.data.select(axis, indices)?,
                    ..var.clone()
                },
                None => var.clone(),
            };
            variables.push(selected);
        }
        Ok(Self {
            variables,
            attrs: self.attrs.clone(),
        })
    }

    /// Merges `other` into `self`; variables and attributes from `other` win.
    pub fn update(&mut self, other: Dataset) -> LmaResult<()> {
        for variable in other.variables {
            self.insert(variable)?;
        }
        self.attrs.extend(other.attrs);
        Ok(())
    }

    /// Re-checks invariants, e.g. after deserializing.
    pub fn validate(&self) -> LmaResult<()> {
        let mut checked = Dataset::new();
        for variable in &self.variables {
            if checked.contains(&variable.name) {
                return Err(LmaError::MalformedDataset(format!(
                    "duplicate variable {}",
                    variable.name
                )));
            }
            checked.insert(variable.clone())?;
        }
        Ok(())
    }
}

fn collect_dims<'a>(variables: impl Iterator<Item = &'a Variable>) -> Vec<Dimension> {
    let mut dims: Vec<Dimension> = Vec::new();
    for var in variables {
        for (name, &len) in var.dims.iter().zip(var.data.shape()) {
            if !dims.iter().any(|dim| &dim.name == name) {
                dims.push(Dimension {
                    name: name.clone(),
                    len,
                });
            }
        }
    }
    dims
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn sample() -> Dataset {
        let grid = VariableData::Float(ArrayD::zeros(IxDyn(&[2, 3])));
        Dataset::from_variables([
            Variable::new("x", &["x"], VariableData::float(vec![0.0, 1.0])).unwrap(),
            Variable::new("y", &["y"], VariableData::float(vec![0.0, 1.0, 2.0])).unwrap(),
            Variable::new("t", &["t"], VariableData::time(vec![10, 20, 30, 40])).unwrap(),
            Variable::new("p", &["x", "y"], grid).unwrap(),
            Variable::scalar("s", VariableData::scalar_float(5.0)).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn dims_follow_first_appearance() {
        let ds = sample();
        assert_eq!(ds.dim_names(), vec!["x", "y", "t"]);
        assert_eq!(ds.dim_len("t"), Some(4));
    }

    #[test]
    fn insert_rejects_conflicting_length() {
        let mut ds = sample();
        let err = ds
            .insert(Variable::new("bad", &["x"], VariableData::float(vec![1.0])).unwrap())
            .unwrap_err();
        assert!(matches!(err, LmaError::MalformedDataset(_)));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut ds = sample();
        ds.insert(Variable::new("x", &["x"], VariableData::float(vec![7.0, 8.0])).unwrap())
            .unwrap();
        assert_eq!(ds.variable_names()[0], "x");
        assert_eq!(ds.len(), 5);
    }

    #[test]
    fn drop_dims_removes_dependent_variables() {
        let ds = sample();
        let dropped = ds.drop_dims(&["x", "y"]).unwrap();
        assert_eq!(dropped.variable_names(), vec!["t", "s"]);
    }

    #[test]
    fn drop_dims_reports_unknown_dimension() {
        let ds = sample();
        let err = ds.drop_dims(&["z"]).unwrap_err();
        assert!(matches!(err, LmaError::MissingDimension(ref dim) if dim == "z"));
    }

    #[test]
    fn isel_selects_along_every_user_of_the_dimension() {
        let ds = sample();
        let picked = ds.isel("y", &[2]).unwrap();
        assert_eq!(picked.dim_len("y"), Some(1));
        assert_eq!(picked.require("p").unwrap().data.shape(), &[2, 1]);
        assert_eq!(picked.dim_len("t"), Some(4));
    }

    #[test]
    fn require_reports_missing_variable() {
        let ds = sample();
        assert!(matches!(
            ds.require("nope"),
            Err(LmaError::MissingVariable(_))
        ));
    }
}
