use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use lmacore::lma::EVENT_DIM;
use lmacore::processing::{summarize_flashes, ClusterStage, FilterStage, FlashSummary, StatsStage};
use lmacore::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use lmacore::{Dataset, DatasetStage, LmaError};
use std::sync::Arc;

pub struct WorkflowResult {
    pub clustered: Dataset,
    pub stats: Dataset,
    /// `None` when no flash passed the filter.
    pub filtered: Option<Dataset>,
    pub summaries: Vec<FlashSummary>,
    pub notes: Vec<String>,
}

impl WorkflowResult {
    pub fn event_count(&self) -> usize {
        self.clustered.dim_len(EVENT_DIM).unwrap_or(0)
    }

    pub fn flash_count(&self) -> usize {
        self.summaries.len()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::for_stage("workflow"),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn execute(&self, dataset: &Dataset) -> anyhow::Result<WorkflowResult> {
        let result = self.run_stages(dataset);
        match &result {
            Ok(result) => self
                .metrics
                .record_dataset(result.event_count(), result.flash_count()),
            Err(_) => self.metrics.record_error(),
        }
        result
    }

    fn run_stages(&self, dataset: &Dataset) -> anyhow::Result<WorkflowResult> {
        let cluster_stage = ClusterStage::new(self.config.cluster);
        let cluster_output = cluster_stage
            .execute(dataset)
            .context("executing cluster stage")?;

        let stats_stage = StatsStage::new();
        let stats_output = stats_stage
            .execute(&cluster_output.dataset)
            .context("executing stats stage")?;

        let mut notes = cluster_output.metadata.notes.clone();
        notes.extend(stats_output.metadata.notes.iter().cloned());

        let filter_stage = FilterStage::new(self.config.filter.clone());
        let filtered = match filter_stage.execute(&stats_output.dataset) {
            Ok(output) => {
                notes.extend(output.metadata.notes);
                Some(output.dataset)
            }
            Err(LmaError::EmptySelection(reason)) => {
                self.logger.warn(&format!("filter removed every flash: {}", reason));
                notes.push(format!("no flashes passed the filter ({})", reason));
                None
            }
            Err(err) => return Err(err).context("executing filter stage"),
        };

        let summaries =
            summarize_flashes(&stats_output.dataset).context("summarizing flashes")?;

        Ok(WorkflowResult {
            clustered: cluster_output.dataset,
            stats: stats_output.dataset,
            filtered,
            summaries,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_storm;
    use lmacore::lma::FLASH_DIM;
    use std::path::PathBuf;

    #[test]
    fn runner_executes_workflow() {
        let cfg = WorkflowConfig::from_args(None, 3000.0, 0.15, 1, Some(10), PathBuf::from("out"));
        let runner = Runner::new(cfg);
        let storm = build_storm(4, 12).unwrap();
        let result = runner.execute(&storm).unwrap();
        assert_eq!(result.flash_count(), 4);
        assert_eq!(result.event_count(), 48);
        let filtered = result.filtered.unwrap();
        assert_eq!(filtered.dim_len(FLASH_DIM), Some(4));
        assert_eq!(filtered.dim_len(EVENT_DIM), Some(48));

        let metrics = runner.metrics();
        assert_eq!((metrics.datasets, metrics.events, metrics.flashes), (1, 48, 4));
    }

    #[test]
    fn empty_filter_result_becomes_a_note() {
        let cfg = WorkflowConfig::from_args(None, 3000.0, 0.15, 1, Some(100), PathBuf::from("out"));
        let runner = Runner::new(cfg);
        let result = runner.execute(&build_storm(2, 5).unwrap()).unwrap();
        assert!(result.filtered.is_none());
        assert!(result
            .notes
            .iter()
            .any(|note| note.starts_with("no flashes passed the filter")));
    }

    #[test]
    fn stage_failures_are_counted() {
        let runner = Runner::new(WorkflowConfig::default());
        assert!(runner.execute(&Dataset::new()).is_err());
        assert_eq!(runner.metrics().errors, 1);
    }
}
