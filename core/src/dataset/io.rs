use super::Dataset;
use crate::prelude::{LmaError, LmaResult};
use log::debug;
use std::fs;
use std::path::Path;

/// On-disk encodings understood by [`load_dataset`] and [`save_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Json,
    NetCdf,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> LmaResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => Ok(DatasetFormat::Json),
            Some("nc") | Some("nc4") | Some("cdf") => Ok(DatasetFormat::NetCdf),
            _ => Err(LmaError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> LmaResult<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LmaError::FileNotFound(path.to_path_buf()));
    }
    debug!("loading dataset {}", path.display());
    match DatasetFormat::from_path(path)? {
        DatasetFormat::Json => load_json(path),
        DatasetFormat::NetCdf => load_netcdf(path),
    }
}

pub fn save_dataset<P: AsRef<Path>>(dataset: &Dataset, path: P) -> LmaResult<()> {
    let path = path.as_ref();
    debug!("writing dataset {}", path.display());
    match DatasetFormat::from_path(path)? {
        DatasetFormat::Json => save_json(dataset, path),
        DatasetFormat::NetCdf => save_netcdf(dataset, path),
    }
}

pub fn load_json(path: &Path) -> LmaResult<Dataset> {
    let contents = fs::read_to_string(path)?;
    let dataset: Dataset = serde_json::from_str(&contents)?;
    dataset.validate()?;
    Ok(dataset)
}

pub fn save_json(dataset: &Dataset, path: &Path) -> LmaResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(dataset)?)?;
    Ok(())
}

#[cfg(feature = "netcdf")]
fn load_netcdf(path: &Path) -> LmaResult<Dataset> {
    super::netcdf::read_netcdf(path)
}

#[cfg(not(feature = "netcdf"))]
fn load_netcdf(path: &Path) -> LmaResult<Dataset> {
    Err(LmaError::UnsupportedFormat(format!(
        "{} (built without the netcdf feature)",
        path.display()
    )))
}

#[cfg(feature = "netcdf")]
fn save_netcdf(dataset: &Dataset, path: &Path) -> LmaResult<()> {
    super::netcdf::write_netcdf(dataset, path)
}

#[cfg(not(feature = "netcdf"))]
fn save_netcdf(_dataset: &Dataset, path: &Path) -> LmaResult<()> {
    Err(LmaError::UnsupportedFormat(format!(
        "{} (built without the netcdf feature)",
        path.display()
    )))
}
