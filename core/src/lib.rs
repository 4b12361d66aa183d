//! Lightning Mapping Array analysis: labelled datasets, geodetic
//! coordinate systems, flash clustering and statistics, and the data
//! preparation behind the standard LMA display panels.

pub mod coords;
pub mod dataset;
pub mod lma;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use dataset::{load_dataset, save_dataset, Dataset, Variable, VariableData};
pub use prelude::{DatasetStage, LmaError, LmaResult, StageMetadata, StageOutput};
