use crate::generator::profile::StormConfig;
use anyhow::Context;
use lmacore::lma::FLASH_EVENT_COUNT;
use lmacore::processing::{ClusterConfig, FlashFilter, SelectionBounds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over a loaded workflow file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CliOverrides {
    pub distance: Option<f64>,
    pub time: Option<f64>,
    pub min_points: Option<usize>,
    pub min_events: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

impl CliOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub input: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub cluster: ClusterConfig,
    pub filter: FlashFilter,
    /// Display window for the viewer; derived from the data when absent.
    pub selection: Option<SelectionBounds>,
    /// Synthetic storm used when no input file is given.
    pub generator: Option<StormConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from("output"),
            cluster: ClusterConfig::default(),
            filter: FlashFilter::default(),
            selection: None,
            generator: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .cluster
            .validate()
            .with_context(|| format!("checking clustering thresholds in {}", path_ref.display()))?;
        Ok(config)
    }

    /// Replaces the clustering thresholds, event-count filter and output
    /// directory with any values given on the command line.
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) -> anyhow::Result<()> {
        if let Some(distance) = overrides.distance {
            self.cluster.distance = distance;
        }
        if let Some(time) = overrides.time {
            self.cluster.time = time;
        }
        if let Some(min_points) = overrides.min_points {
            self.cluster.min_points = min_points;
        }
        if let Some(min) = overrides.min_events {
            self.filter = std::mem::take(&mut self.filter).with_range(
                FLASH_EVENT_COUNT,
                Some(min as f64),
                None,
            );
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        self.cluster
            .validate()
            .context("checking clustering thresholds from the command line")?;
        Ok(())
    }

    pub fn from_args(
        input: Option<PathBuf>,
        distance: f64,
        time: f64,
        min_points: usize,
        min_events: Option<u64>,
        output_dir: PathBuf,
    ) -> Self {
        let filter = match min_events {
            Some(min) => FlashFilter::new().with_range(FLASH_EVENT_COUNT, Some(min as f64), None),
            None => FlashFilter::new(),
        };
        Self {
            input,
            output_dir,
            cluster: ClusterConfig {
                distance,
                time,
                min_points,
            },
            filter,
            selection: None,
            generator: None,
        }
    }
}
