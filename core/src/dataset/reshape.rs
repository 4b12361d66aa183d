//! Helpers that split datasets by dimension and stitch them back together.

use super::{Dataset, Variable, VariableData};
use crate::prelude::{LmaError, LmaResult};

/// Dimensions used only by one-dimensional variables.
///
/// Any dimension that appears in a 2-D or higher variable is excluded.
pub fn one_dimensional_dims(dataset: &Dataset) -> Vec<String> {
    let mut dims = dataset.dim_names();
    for var in dataset.variables().iter().filter(|var| var.ndim() > 1) {
        dims.retain(|dim| !var.dims.contains(dim));
    }
    dims
}

/// Lazily yields one dataset per one-dimensional dimension, holding only the
/// variables along that dimension plus the scalars.
pub fn gen_1d_datasets(dataset: &Dataset) -> impl Iterator<Item = LmaResult<Dataset>> + '_ {
    let all_dims = dataset.dim_names();
    one_dimensional_dims(dataset).into_iter().map(move |keep| {
        let others: Vec<&str> = all_dims
            .iter()
            .map(String::as_str)
            .filter(|dim| *dim != keep)
            .collect();
        dataset.drop_dims(&others)
    })
}

pub fn one_dimensional_datasets(dataset: &Dataset) -> LmaResult<Vec<Dataset>> {
    gen_1d_datasets(dataset).collect()
}

pub fn scalar_vars(dataset: &Dataset) -> Vec<String> {
    dataset
        .variables()
        .iter()
        .filter(|var| var.is_scalar())
        .map(|var| var.name.clone())
        .collect()
}

/// Concatenates, in input order, every variable along each dimension that is
/// only used by one-dimensional variables. Scalars are dropped unless
/// `stack_scalars` names a new dimension to stack them along.
pub fn concat_1d_dims(datasets: &[Dataset], stack_scalars: Option<&str>) -> LmaResult<Dataset> {
    let mut groups: Vec<(String, Vec<Dataset>)> = Vec::new();

    for dataset in datasets {
        let scalars = scalar_vars(dataset);
        let scalar_refs: Vec<&str> = scalars.iter().map(String::as_str).collect();
        for initial in gen_1d_datasets(dataset) {
            let single = initial?.drop_vars(&scalar_refs)?;
            let Some(dim) = single.dim_names().into_iter().next() else {
                continue;
            };
            push_group(&mut groups, dim, single);
        }

        if let Some(stack_dim) = stack_scalars {
            let mut stacked = Dataset::new();
            for name in &scalars {
                let scalar = dataset.require(name)?;
                stacked.insert(Variable {
                    name: name.clone(),
                    dims: vec![stack_dim.to_string()],
                    data: scalar.data.insert_axis(0)?,
                    attrs: scalar.attrs.clone(),
                })?;
            }
            push_group(&mut groups, stack_dim.to_string(), stacked);
        }
    }

    let mut unified = Dataset::new();
    for (dim, members) in groups {
        unified.update(concat_along(&dim, &members)?)?;
    }
    Ok(unified)
}

fn push_group(groups: &mut Vec<(String, Vec<Dataset>)>, dim: String, dataset: Dataset) {
    match groups.iter_mut().find(|(name, _)| *name == dim) {
        Some((_, members)) => members.push(dataset),
        None => groups.push((dim, vec![dataset])),
    }
}

fn concat_along(dim: &str, members: &[Dataset]) -> LmaResult<Dataset> {
    let mut names: Vec<String> = Vec::new();
    for member in members {
        for var in member.variables().iter().filter(|var| var.axis_of(dim).is_some()) {
            if !names.contains(&var.name) {
                names.push(var.name.clone());
            }
        }
    }

    let mut combined = Dataset::new();
    for name in names {
        let parts: Vec<&Variable> = members
            .iter()
            .filter(|member| !member.is_empty())
            .map(|member| {
                member.get(&name).ok_or_else(|| {
                    LmaError::MalformedDataset(format!(
                        "variable {} is missing from some datasets along {}",
                        name, dim
                    ))
                })
            })
            .collect::<LmaResult<_>>()?;
        let first = parts[0];
        let axis = first
            .axis_of(dim)
            .ok_or_else(|| LmaError::MissingDimension(dim.to_string()))?;
        if let Some(odd) = parts.iter().find(|part| part.dims != first.dims) {
            return Err(LmaError::MalformedDataset(format!(
                "variable {} has dimensions {:?} and {:?}",
                name, first.dims, odd.dims
            )));
        }
        let data: Vec<&VariableData> = parts.iter().map(|part| &part.data).collect();
        combined.insert(Variable {
            name: name.clone(),
            dims: first.dims.clone(),
            data: VariableData::concatenate(axis, &data)?,
            attrs: first.attrs.clone(),
        })?;
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn build(offset: f64, size: usize) -> Dataset {
        let seq = |n: usize, scale: f64| -> Vec<f64> {
            (0..n).map(|i| offset * scale + i as f64).collect()
        };
        let grid = VariableData::Float(ArrayD::from_elem(IxDyn(&[size, size / 2]), offset));
        Dataset::from_variables([
            Variable::new("x", &["x"], VariableData::float(seq(size, 10.0))).unwrap(),
            Variable::new("y", &["y"], VariableData::float(seq(size / 2, 10.0))).unwrap(),
            Variable::new("t", &["t"], VariableData::float(seq(size * 3, 20.0))).unwrap(),
            Variable::new("d", &["t"], VariableData::float(seq(size * 3, 11.0))).unwrap(),
            Variable::new("u", &["u"], VariableData::float(seq(size * 5, 10.0))).unwrap(),
            Variable::new("z", &["z"], VariableData::float(seq(size * 4, 10.0))).unwrap(),
            Variable::new("P", &["x", "y"], grid).unwrap(),
            Variable::scalar("s", VariableData::scalar_float(offset)).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn one_dimensional_dims_skip_grid_dimensions() {
        let ds = build(0.0, 4);
        assert_eq!(one_dimensional_dims(&ds), vec!["t", "u", "z"]);
    }

    #[test]
    fn generated_datasets_hold_one_dimension_and_scalars() {
        let ds = build(0.0, 4);
        let singles = one_dimensional_datasets(&ds).unwrap();
        assert_eq!(singles.len(), 3);
        assert_eq!(singles[0].variable_names(), vec!["t", "d", "s"]);
        assert_eq!(singles[1].dim_names(), vec!["u"]);
    }

    #[test]
    fn scalar_vars_lists_zero_dimensional_variables() {
        assert_eq!(scalar_vars(&build(1.0, 4)), vec!["s"]);
    }

    #[test]
    fn concat_joins_each_dimension_in_order() {
        let datasets = vec![build(0.0, 4), build(1.0, 6)];
        let unified = concat_1d_dims(&datasets, None).unwrap();
        assert_eq!(unified.dim_len("t"), Some(12 + 18));
        assert_eq!(unified.dim_len("z"), Some(16 + 24));
        assert!(!unified.contains("P"));
        assert!(!unified.contains("s"));
        let t = unified.require("t").unwrap().data.to_f64();
        assert_eq!(t[[12]], 20.0);
    }

    #[test]
    fn concat_can_stack_scalars() {
        let datasets = vec![build(2.0, 4), build(3.0, 4)];
        let unified = concat_1d_dims(&datasets, Some("file")).unwrap();
        let stacked = unified.require("s").unwrap();
        assert_eq!(stacked.dims, vec!["file"]);
        assert_eq!(stacked.data.to_f64().as_slice().unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn concat_rejects_variables_missing_from_some_inputs() {
        let full = build(0.0, 4);
        let partial = full.drop_vars(&["d"]).unwrap();
        let err = concat_1d_dims(&[full, partial], None).unwrap_err();
        assert!(matches!(err, LmaError::MalformedDataset(_)));
    }
}
