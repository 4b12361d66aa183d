pub mod histogram;
pub mod hull;
pub mod matrix;
pub mod stats;

pub use histogram::Histogram2d;
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
