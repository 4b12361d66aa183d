pub mod cluster;
pub mod filter;
pub mod properties;
pub mod selection;

pub use cluster::{cluster_flashes, ClusterConfig, ClusterStage};
pub use filter::{filter_flashes, Bound, FilterStage, FlashFilter};
pub use properties::{flash_stats, summarize_flashes, FlashSummary, StatsStage};
pub use selection::{
    altitude_profile, color_by_time, setup_hist, subset, AltitudeProfile, HistogramBins,
    SelectionBounds, SourceHistograms, Subset, TimeColors,
};
