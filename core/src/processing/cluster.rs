use crate::coords::{CoordinateSystem, GeographicSystem};
use crate::dataset::time::{nanos_to_seconds, seconds_to_nanos};
use crate::dataset::{Dataset, Variable, VariableData};
use crate::lma::{
    parent_flash_ids, EventTable, EVENT_DIM, EVENT_PARENT_FLASH_ID, FLASH_DIM, FLASH_ID,
    FLASH_SPACE_THRESHOLD, FLASH_TIME_THRESHOLD, NOISE_FLASH_ID,
};
use crate::prelude::{DatasetStage, LmaError, LmaResult, StageMetadata, StageOutput};
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};

/// Space and time separation thresholds for grouping sources into flashes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Metres.
    pub distance: f64,
    /// Seconds.
    pub time: f64,
    /// Sources, counting the source itself, needed within the combined
    /// threshold for a source to seed or extend a flash.
    pub min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            distance: 3000.0,
            time: 0.15,
            min_points: 1,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> LmaResult<()> {
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(LmaError::InvalidInput(format!(
                "distance threshold must be positive, got {}",
                self.distance
            )));
        }
        if !(self.time.is_finite() && self.time > 0.0) {
            return Err(LmaError::InvalidInput(format!(
                "time threshold must be positive, got {}",
                self.time
            )));
        }
        if self.min_points == 0 {
            return Err(LmaError::InvalidInput("min_points must be at least 1".into()));
        }
        Ok(())
    }
}

/// Groups sources into flashes by density-based clustering in scaled
/// space-time.
///
/// Positions are converted to ECEF, centred on their mean and divided by
/// `distance`; times are seconds since the earliest source divided by
/// `time`. Two sources are neighbours when the Euclidean distance between
/// their scaled 4-vectors is at most one.
///
/// Returns a copy of `dataset` with `event_parent_flash_id`, `flash_id` and
/// the two threshold scalars added. Any flash variables already present are
/// replaced.
pub fn cluster_flashes(dataset: &Dataset, config: &ClusterConfig) -> LmaResult<Dataset> {
    config.validate()?;
    let table = EventTable::from_dataset(dataset)?;
    let points = scaled_points(&table, config)?;
    let (labels, flash_count) = dbscan(&points, config.min_points);

    let mut output = if dataset.dim_len(FLASH_DIM).is_some() {
        dataset.drop_dims(&[FLASH_DIM])?
    } else {
        dataset.clone()
    };
    output.insert(
        Variable::new(EVENT_PARENT_FLASH_ID, &[EVENT_DIM], VariableData::uint(labels))?
            .with_attr("long_name", "ID of the flash this source belongs to")
            .with_attr("noise_value", NOISE_FLASH_ID.to_string().as_str()),
    )?;
    output.insert(
        Variable::new(
            FLASH_ID,
            &[FLASH_DIM],
            VariableData::uint((0..flash_count as u64).collect()),
        )?
        .with_attr("long_name", "flash identifier"),
    )?;
    output.insert(
        Variable::scalar(
            FLASH_TIME_THRESHOLD,
            VariableData::scalar_duration(seconds_to_nanos(config.time)),
        )?
        .with_attr("long_name", "maximum time between sources of one flash"),
    )?;
    output.insert(
        Variable::scalar(FLASH_SPACE_THRESHOLD, VariableData::scalar_float(config.distance))?
            .with_attr("units", "m")
            .with_attr("long_name", "maximum distance between sources of one flash"),
    )?;
    Ok(output)
}

fn scaled_points(table: &EventTable, config: &ClusterConfig) -> LmaResult<Vec<[f64; 4]>> {
    table.check_columns()?;
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let geo = GeographicSystem::default();
    let (x, y, z) = geo.to_ecef_many(&table.longitude, &table.latitude, &table.altitude)?;
    let n = table.len() as f64;
    let centre = [
        x.iter().sum::<f64>() / n,
        y.iter().sum::<f64>() / n,
        z.iter().sum::<f64>() / n,
    ];
    let t0 = table.time.iter().copied().min().unwrap_or_default();

    let points = (0..table.len())
        .map(|i| {
            let elapsed = table.time[i].checked_sub(t0).ok_or_else(|| {
                LmaError::InvalidInput(format!("source {} time is out of range", i))
            })?;
            Ok([
                (x[i] - centre[0]) / config.distance,
                (y[i] - centre[1]) / config.distance,
                (z[i] - centre[2]) / config.distance,
                nanos_to_seconds(elapsed) / config.time,
            ])
        })
        .collect::<LmaResult<Vec<_>>>()?;
    if let Some(bad) = points.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
        return Err(LmaError::InvalidInput(format!(
            "source {} has a non-finite position or time",
            bad
        )));
    }
    Ok(points)
}

/// Neighbour lookup over points sorted by their scaled time, so only the
/// window `|dt| <= 1` is scanned for each query.
struct TimeIndex<'a> {
    points: &'a [[f64; 4]],
    order: Vec<usize>,
    times: Vec<f64>,
}

impl<'a> TimeIndex<'a> {
    fn new(points: &'a [[f64; 4]]) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| points[a][3].total_cmp(&points[b][3]).then(a.cmp(&b)));
        let times = order.iter().map(|&i| points[i][3]).collect();
        Self {
            points,
            order,
            times,
        }
    }

    fn neighbours(&self, idx: usize) -> Vec<usize> {
        let query = self.points[idx];
        let start = self.times.partition_point(|&t| t < query[3] - 1.0);
        let end = self.times.partition_point(|&t| t <= query[3] + 1.0);
        self.order[start..end]
            .iter()
            .copied()
            .filter(|&other| {
                let p = self.points[other];
                let dist_sq: f64 = (0..4).map(|k| (p[k] - query[k]).powi(2)).sum();
                dist_sq <= 1.0
            })
            .collect()
    }
}

/// Labels points with cluster ids in order of discovery, scanning input
/// order. Non-core points reached from no core point are noise.
fn dbscan(points: &[[f64; 4]], min_points: usize) -> (Vec<u64>, usize) {
    let index = TimeIndex::new(points);
    let neighbours: Vec<Vec<usize>> = (0..points.len()).map(|i| index.neighbours(i)).collect();
    let is_core: Vec<bool> = neighbours.iter().map(|n| n.len() >= min_points).collect();

    let mut labels = vec![NOISE_FLASH_ID; points.len()];
    let mut next_label = 0u64;
    for seed in 0..points.len() {
        if labels[seed] != NOISE_FLASH_ID || !is_core[seed] {
            continue;
        }
        labels[seed] = next_label;
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            if !is_core[current] {
                continue;
            }
            for &other in &neighbours[current] {
                if labels[other] == NOISE_FLASH_ID {
                    labels[other] = next_label;
                    stack.push(other);
                }
            }
        }
        next_label += 1;
    }
    (labels, next_label as usize)
}

/// Clustering as a pipeline stage.
pub struct ClusterStage {
    config: ClusterConfig,
    logger: LogManager,
}

impl ClusterStage {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            logger: LogManager::for_stage("cluster"),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }
}

impl DatasetStage for ClusterStage {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn execute(&self, input: &Dataset) -> LmaResult<StageOutput> {
        let dataset = cluster_flashes(input, &self.config)?;
        let event_count = dataset.dim_len(EVENT_DIM).unwrap_or(0);
        let flash_count = dataset.dim_len(FLASH_DIM).unwrap_or(0);
        let noise = parent_flash_ids(&dataset)?
            .iter()
            .filter(|&&id| id == NOISE_FLASH_ID)
            .count();

        self.logger.record(&format!(
            "clustered {} sources into {} flashes ({} m, {} s, min_points {})",
            event_count, flash_count, self.config.distance, self.config.time, self.config.min_points
        ));
        if noise > 0 {
            self.logger.detail(&format!("{} sources left as noise", noise));
        }

        let mut notes = vec![format!(
            "{} flashes from {} sources",
            flash_count, event_count
        )];
        if noise > 0 {
            notes.push(format!("{} noise sources", noise));
        }
        Ok(StageOutput {
            dataset,
            metadata: StageMetadata {
                event_count: Some(event_count),
                flash_count: Some(flash_count),
                notes,
            },
        })
    }
}
