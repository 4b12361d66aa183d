use crate::dataset::Dataset;
use std::path::PathBuf;

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub event_count: Option<usize>,
    pub flash_count: Option<usize>,
    pub notes: Vec<String>,
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub dataset: Dataset,
    pub metadata: StageMetadata,
}

/// Common error type for dataset handling and flash processing.
#[derive(thiserror::Error, Debug)]
pub enum LmaError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("missing variable: {0}")]
    MissingVariable(String),
    #[error("missing dimension: {0}")]
    MissingDimension(String),
    #[error("malformed dataset: {0}")]
    MalformedDataset(String),
    #[error("empty selection: {0}")]
    EmptySelection(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("NetCDF error: {0}")]
    NetCdf(String),
}

impl From<ndarray::ShapeError> for LmaError {
    fn from(err: ndarray::ShapeError) -> Self {
        LmaError::MalformedDataset(err.to_string())
    }
}

pub type LmaResult<T> = Result<T, LmaError>;

/// A pure transformation from one dataset to another.
///
/// Stages hold only their configuration; executing a stage never mutates it,
/// so the same stage can be run over any number of datasets.
pub trait DatasetStage {
    fn name(&self) -> &'static str;
    fn execute(&self, input: &Dataset) -> LmaResult<StageOutput>;
}
