use super::{
    Detection, EVENT_ALTITUDE, EVENT_CHI2, EVENT_DIM, EVENT_LATITUDE, EVENT_LONGITUDE,
    EVENT_PARENT_FLASH_ID, EVENT_POWER, EVENT_STATIONS, EVENT_TIME, FLASH_DIM, FLASH_ID,
};
use crate::dataset::time::{datetime_to_nanos, nanos_to_datetime, NAT};
use crate::dataset::{DataKind, Dataset, Variable, VariableData};
use crate::prelude::{LmaError, LmaResult};

/// Struct-of-arrays view over the source variables of a dataset.
///
/// Times are nanoseconds since the Unix epoch. Quality columns are optional
/// because clustering only needs position and time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub altitude: Vec<f64>,
    pub time: Vec<i64>,
    pub chi2: Option<Vec<f64>>,
    pub stations: Option<Vec<i64>>,
    pub power: Option<Vec<f64>>,
}

impl EventTable {
    pub fn from_dataset(dataset: &Dataset) -> LmaResult<Self> {
        let time_var = event_column(dataset, EVENT_TIME)?;
        let time: Vec<i64> = time_var
            .data
            .as_time()
            .ok_or_else(|| {
                LmaError::MalformedDataset(format!(
                    "{} must hold times, found {}",
                    EVENT_TIME,
                    time_var.data.kind()
                ))
            })?
            .iter()
            .copied()
            .collect();
        if let Some(missing) = time.iter().position(|&t| t == NAT) {
            return Err(LmaError::MalformedDataset(format!(
                "{} is missing (NaT) for source {}",
                EVENT_TIME, missing
            )));
        }

        let stations = match dataset.get(EVENT_STATIONS) {
            Some(_) => {
                let var = event_column(dataset, EVENT_STATIONS)?;
                let values = var.data.to_i64().ok_or_else(|| {
                    LmaError::MalformedDataset(format!(
                        "{} must hold integers, found {}",
                        EVENT_STATIONS,
                        var.data.kind()
                    ))
                })?;
                Some(values.iter().copied().collect())
            }
            None => None,
        };

        Ok(Self {
            longitude: float_column(dataset, EVENT_LONGITUDE)?,
            latitude: float_column(dataset, EVENT_LATITUDE)?,
            altitude: float_column(dataset, EVENT_ALTITUDE)?,
            time,
            chi2: optional_float_column(dataset, EVENT_CHI2)?,
            stations,
            power: optional_float_column(dataset, EVENT_POWER)?,
        })
    }

    pub fn from_detections(detections: &[Detection]) -> LmaResult<Self> {
        let mut table = Self {
            chi2: Some(Vec::with_capacity(detections.len())),
            stations: Some(Vec::with_capacity(detections.len())),
            power: detections
                .iter()
                .all(|det| det.power.is_some())
                .then(|| Vec::with_capacity(detections.len())),
            ..Default::default()
        };
        for det in detections {
            table.longitude.push(det.longitude);
            table.latitude.push(det.latitude);
            table.altitude.push(det.altitude);
            table.time.push(datetime_to_nanos(det.time)?);
            if let Some(chi2) = table.chi2.as_mut() {
                chi2.push(det.chi2);
            }
            if let Some(stations) = table.stations.as_mut() {
                stations.push(det.stations);
            }
            if let (Some(power), Some(value)) = (table.power.as_mut(), det.power) {
                power.push(value);
            }
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Checks that every column, optional ones included, has one entry per
    /// source.
    pub fn check_columns(&self) -> LmaResult<()> {
        let n = self.len();
        let lengths = [
            (EVENT_LONGITUDE, Some(self.longitude.len())),
            (EVENT_LATITUDE, Some(self.latitude.len())),
            (EVENT_ALTITUDE, Some(self.altitude.len())),
            (EVENT_CHI2, self.chi2.as_ref().map(Vec::len)),
            (EVENT_STATIONS, self.stations.as_ref().map(Vec::len)),
            (EVENT_POWER, self.power.as_ref().map(Vec::len)),
        ];
        for (name, len) in lengths {
            if let Some(len) = len.filter(|&len| len != n) {
                return Err(LmaError::InvalidInput(format!(
                    "{} has {} entries for {} sources",
                    name, len, n
                )));
            }
        }
        Ok(())
    }

    pub fn detection(&self, index: usize) -> Option<Detection> {
        Some(Detection {
            time: nanos_to_datetime(*self.time.get(index)?),
            longitude: *self.longitude.get(index)?,
            latitude: *self.latitude.get(index)?,
            altitude: *self.altitude.get(index)?,
            chi2: match &self.chi2 {
                Some(chi2) => *chi2.get(index)?,
                None => f64::NAN,
            },
            stations: match &self.stations {
                Some(stations) => *stations.get(index)?,
                None => 0,
            },
            power: match &self.power {
                Some(power) => Some(*power.get(index)?),
                None => None,
            },
        })
    }

    pub fn to_dataset(&self) -> LmaResult<Dataset> {
        let mut variables = vec![
            Variable::new(EVENT_TIME, &[EVENT_DIM], VariableData::time(self.time.clone()))?
                .with_attr("long_name", "VHF source time"),
            Variable::new(
                EVENT_LONGITUDE,
                &[EVENT_DIM],
                VariableData::float(self.longitude.clone()),
            )?
            .with_attr("units", "degrees_east"),
            Variable::new(
                EVENT_LATITUDE,
                &[EVENT_DIM],
                VariableData::float(self.latitude.clone()),
            )?
            .with_attr("units", "degrees_north"),
            Variable::new(
                EVENT_ALTITUDE,
                &[EVENT_DIM],
                VariableData::float(self.altitude.clone()),
            )?
            .with_attr("units", "m"),
        ];
        if let Some(chi2) = &self.chi2 {
            variables.push(
                Variable::new(EVENT_CHI2, &[EVENT_DIM], VariableData::float(chi2.clone()))?
                    .with_attr("long_name", "reduced chi-squared"),
            );
        }
        if let Some(stations) = &self.stations {
            variables.push(Variable::new(
                EVENT_STATIONS,
                &[EVENT_DIM],
                VariableData::int(stations.clone()),
            )?);
        }
        if let Some(power) = &self.power {
            variables.push(
                Variable::new(EVENT_POWER, &[EVENT_DIM], VariableData::float(power.clone()))?
                    .with_attr("units", "dBW"),
            );
        }
        Dataset::from_variables(variables)
    }
}

/// Parent flash label of every source, as written by clustering.
pub fn parent_flash_ids(dataset: &Dataset) -> LmaResult<Vec<u64>> {
    let var = event_column(dataset, EVENT_PARENT_FLASH_ID)?;
    match &var.data {
        VariableData::UInt(arr) => Ok(arr.iter().copied().collect()),
        VariableData::Int(arr) => Ok(arr.iter().map(|&id| id as u64).collect()),
        other => Err(LmaError::MalformedDataset(format!(
            "{} must hold integers, found {}",
            EVENT_PARENT_FLASH_ID,
            other.kind()
        ))),
    }
}

/// Flash labels along `number_of_flashes`.
pub fn flash_ids(dataset: &Dataset) -> LmaResult<Vec<u64>> {
    let var = column(dataset, FLASH_ID, FLASH_DIM)?;
    match &var.data {
        VariableData::UInt(arr) => Ok(arr.iter().copied().collect()),
        VariableData::Int(arr) => Ok(arr.iter().map(|&id| id as u64).collect()),
        other => Err(LmaError::MalformedDataset(format!(
            "{} must hold integers, found {}",
            FLASH_ID,
            other.kind()
        ))),
    }
}

fn event_column<'a>(dataset: &'a Dataset, name: &str) -> LmaResult<&'a Variable> {
    column(dataset, name, EVENT_DIM)
}

fn column<'a>(dataset: &'a Dataset, name: &str, dim: &str) -> LmaResult<&'a Variable> {
    let var = dataset.require(name)?;
    if var.dims.len() != 1 || var.dims[0] != dim {
        return Err(LmaError::MalformedDataset(format!(
            "{} must lie along {}, found {:?}",
            name, dim, var.dims
        )));
    }
    Ok(var)
}

fn float_column(dataset: &Dataset, name: &str) -> LmaResult<Vec<f64>> {
    let var = event_column(dataset, name)?;
    match var.data.kind() {
        DataKind::Float | DataKind::Int | DataKind::UInt => {
            Ok(var.data.to_f64().iter().copied().collect())
        }
        kind => Err(LmaError::MalformedDataset(format!(
            "{} must be numeric, found {}",
            name, kind
        ))),
    }
}

fn optional_float_column(dataset: &Dataset, name: &str) -> LmaResult<Option<Vec<f64>>> {
    if dataset.contains(name) {
        float_column(dataset, name).map(Some)
    } else {
        Ok(None)
    }
}
