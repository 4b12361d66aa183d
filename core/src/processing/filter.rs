use crate::dataset::Dataset;
use crate::lma::{flash_ids, parent_flash_ids, EVENT_DIM, EVENT_PARENT_FLASH_ID, FLASH_DIM};
use crate::prelude::{DatasetStage, LmaError, LmaResult, StageMetadata, StageOutput};
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Inclusive range; a missing end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bound {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bound {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    pub fn at_most(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Named ranges on per-flash variables.
///
/// Time variables compare as seconds since the Unix epoch and durations as
/// seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashFilter {
    pub criteria: BTreeMap<String, Bound>,
    /// Also drop sources whose parent flash was removed.
    pub prune: bool,
}

impl Default for FlashFilter {
    fn default() -> Self {
        Self {
            criteria: BTreeMap::new(),
            prune: true,
        }
    }
}

impl FlashFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bound(mut self, variable: &str, bound: Bound) -> Self {
        self.criteria.insert(variable.to_string(), bound);
        self
    }

    pub fn with_range(self, variable: &str, min: Option<f64>, max: Option<f64>) -> Self {
        self.with_bound(variable, Bound::new(min, max))
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Keeps the flashes whose variables all fall within their bounds.
pub fn filter_flashes(dataset: &Dataset, filter: &FlashFilter) -> LmaResult<Dataset> {
    let flash_count = dataset
        .dim_len(FLASH_DIM)
        .ok_or_else(|| LmaError::MissingDimension(FLASH_DIM.to_string()))?;

    let mut keep = vec![true; flash_count];
    for (name, bound) in &filter.criteria {
        let var = dataset.require(name)?;
        if var.dims.len() != 1 || var.dims[0] != FLASH_DIM {
            return Err(LmaError::InvalidInput(format!(
                "{} does not lie along {} (dims {:?})",
                name, FLASH_DIM, var.dims
            )));
        }
        for (slot, &value) in keep.iter_mut().zip(var.data.to_f64().iter()) {
            *slot &= bound.contains(value);
        }
    }

    let kept: Vec<usize> = (0..flash_count).filter(|&i| keep[i]).collect();
    if kept.is_empty() {
        return Err(LmaError::EmptySelection(format!(
            "no flash of {} satisfies {}",
            flash_count,
            describe(filter)
        )));
    }
    let reduced = dataset.isel(FLASH_DIM, &kept)?;
    if !filter.prune || !reduced.contains(EVENT_PARENT_FLASH_ID) {
        return Ok(reduced);
    }

    let survivors: HashSet<u64> = flash_ids(&reduced)?.into_iter().collect();
    let events: Vec<usize> = parent_flash_ids(&reduced)?
        .iter()
        .enumerate()
        .filter(|(_, parent)| survivors.contains(*parent))
        .map(|(i, _)| i)
        .collect();
    reduced.isel(EVENT_DIM, &events)
}

fn describe(filter: &FlashFilter) -> String {
    filter
        .criteria
        .iter()
        .map(|(name, bound)| {
            let lo = bound.min.map_or_else(|| "-inf".to_string(), |v| v.to_string());
            let hi = bound.max.map_or_else(|| "inf".to_string(), |v| v.to_string());
            format!("{} in [{}, {}]", name, lo, hi)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Flash filtering as a pipeline stage.
pub struct FilterStage {
    filter: FlashFilter,
    logger: LogManager,
}

impl FilterStage {
    pub fn new(filter: FlashFilter) -> Self {
        Self {
            filter,
            logger: LogManager::for_stage("filter"),
        }
    }
}

impl DatasetStage for FilterStage {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn execute(&self, input: &Dataset) -> LmaResult<StageOutput> {
        let before = input.dim_len(FLASH_DIM).unwrap_or(0);
        let dataset = filter_flashes(input, &self.filter)?;
        let after = dataset.dim_len(FLASH_DIM).unwrap_or(0);
        self.logger.record(&format!(
            "kept {} of {} flashes ({})",
            after,
            before,
            describe(&self.filter)
        ));
        Ok(StageOutput {
            metadata: StageMetadata {
                event_count: dataset.dim_len(EVENT_DIM),
                flash_count: Some(after),
                notes: vec![format!("filter kept {} of {} flashes", after, before)],
            },
            dataset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lma::fixtures;
    use crate::lma::{FLASH_DURATION, FLASH_EVENT_COUNT, FLASH_ID};
    use crate::processing::cluster::{cluster_flashes, ClusterConfig};
    use crate::processing::properties::flash_stats;

    fn stats() -> Dataset {
        let clustered = cluster_flashes(&fixtures::storm(), &ClusterConfig::default()).unwrap();
        flash_stats(&clustered).unwrap()
    }

    fn counts(ds: &Dataset) -> Vec<f64> {
        ds.require(FLASH_EVENT_COUNT).unwrap().data.to_f64().iter().copied().collect()
    }

    #[test]
    fn bounds_are_inclusive() {
        let bound = Bound::new(Some(1.0), Some(2.0));
        assert!(bound.contains(1.0));
        assert!(bound.contains(2.0));
        assert!(!bound.contains(2.5));
        assert!(!bound.contains(f64::NAN));
        assert!(Bound::default().contains(-1e300));
    }

    #[test]
    fn lower_bound_only_keeps_large_flashes() {
        let filter = FlashFilter::new().with_range(FLASH_EVENT_COUNT, Some(3.0), None);
        let filtered = filter_flashes(&stats(), &filter).unwrap();
        assert!(counts(&filtered).iter().all(|&c| c >= 3.0));
        assert_eq!(flash_ids(&filtered).unwrap(), vec![0, 1]);
        assert_eq!(filtered.dim_len(EVENT_DIM), Some(7));
    }

    #[test]
    fn pruning_can_be_disabled() {
        let filter = FlashFilter::new()
            .with_bound(FLASH_EVENT_COUNT, Bound::at_most(1.0))
            .with_prune(false);
        let filtered = filter_flashes(&stats(), &filter).unwrap();
        assert_eq!(flash_ids(&filtered).unwrap(), vec![2]);
        assert_eq!(filtered.dim_len(EVENT_DIM), Some(8));
    }

    #[test]
    fn criteria_combine() {
        let filter = FlashFilter::new()
            .with_bound(FLASH_EVENT_COUNT, Bound::at_least(2.0))
            .with_bound(FLASH_DURATION, Bound::at_most(0.2));
        let filtered = filter_flashes(&stats(), &filter).unwrap();
        assert_eq!(counts(&filtered), vec![4.0, 3.0]);
    }

    #[test]
    fn no_criteria_keeps_everything() {
        let all = stats();
        assert_eq!(filter_flashes(&all, &FlashFilter::new()).unwrap(), all);
    }

    #[test]
    fn nothing_left_is_an_empty_selection() {
        let filter = FlashFilter::new().with_range(FLASH_EVENT_COUNT, Some(100.0), None);
        assert!(matches!(
            filter_flashes(&stats(), &filter),
            Err(LmaError::EmptySelection(_))
        ));
    }

    #[test]
    fn bad_criteria_are_reported() {
        let unknown = FlashFilter::new().with_bound("flash_colour", Bound::at_least(1.0));
        assert!(matches!(
            filter_flashes(&stats(), &unknown),
            Err(LmaError::MissingVariable(_))
        ));
        let wrong_dim = FlashFilter::new().with_bound("event_altitude", Bound::at_least(1.0));
        assert!(matches!(
            filter_flashes(&stats(), &wrong_dim),
            Err(LmaError::InvalidInput(_))
        ));
        assert!(matches!(
            filter_flashes(&fixtures::storm(), &FlashFilter::new()),
            Err(LmaError::MissingDimension(_))
        ));
    }

    #[test]
    fn filter_parses_from_json() {
        let filter: FlashFilter =
            serde_json::from_str(r#"{"criteria": {"flash_event_count": {"min": 100}}}"#).unwrap();
        assert!(filter.prune);
        assert_eq!(filter.criteria[FLASH_EVENT_COUNT], Bound::at_least(100.0));
        assert!(!filter.criteria.contains_key(FLASH_ID));
    }
}
