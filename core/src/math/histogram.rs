use crate::prelude::{LmaError, LmaResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Counts of (x, y) pairs over explicit bin edges.
///
/// Bins are half-open `[lo, hi)` except the last along each axis, which also
/// includes its upper edge. Values outside the edges, or NaN, are not counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2d {
    pub counts: Array2<f64>,
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
}

impl Histogram2d {
    pub fn compute(x: &[f64], y: &[f64], x_edges: &[f64], y_edges: &[f64]) -> LmaResult<Self> {
        if x.len() != y.len() {
            return Err(LmaError::InvalidInput(format!(
                "histogram inputs differ in length: {} and {}",
                x.len(),
                y.len()
            )));
        }
        check_edges(x_edges)?;
        check_edges(y_edges)?;

        let mut counts = Array2::zeros((x_edges.len() - 1, y_edges.len() - 1));
        for (&xv, &yv) in x.iter().zip(y) {
            if let (Some(i), Some(j)) = (bin_index(x_edges, xv), bin_index(y_edges, yv)) {
                counts[[i, j]] += 1.0;
            }
        }
        Ok(Self {
            counts,
            x_edges: x_edges.to_vec(),
            y_edges: y_edges.to_vec(),
        })
    }

    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// Counts with empty cells replaced by NaN so mesh panels leave them blank.
    pub fn masked(&self) -> Array2<f64> {
        self.counts.mapv(|count| if count == 0.0 { f64::NAN } else { count })
    }
}

/// `bins + 1` evenly spaced edges from `lo` to `hi` inclusive.
pub fn uniform_edges(lo: f64, hi: f64, bins: usize) -> LmaResult<Vec<f64>> {
    if bins == 0 || !(lo < hi) {
        return Err(LmaError::InvalidInput(format!(
            "cannot build {} bins over [{}, {}]",
            bins, lo, hi
        )));
    }
    let step = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| lo + step * i as f64).collect();
    edges.push(hi);
    Ok(edges)
}

fn check_edges(edges: &[f64]) -> LmaResult<()> {
    if edges.len() < 2 {
        return Err(LmaError::InvalidInput("histogram needs at least two edges".into()));
    }
    if edges.windows(2).any(|pair| !(pair[0] < pair[1])) {
        return Err(LmaError::InvalidInput(
            "histogram edges must increase monotonically".into(),
        ));
    }
    Ok(())
}

fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let last = edges.len() - 1;
    if value.is_nan() || value < edges[0] || value > edges[last] {
        return None;
    }
    if value == edges[last] {
        return Some(last - 1);
    }
    Some(edges.partition_point(|&edge| edge <= value) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_land_in_expected_cells() {
        let edges = [0.0, 1.0, 2.0];
        let hist = Histogram2d::compute(&[0.5, 1.5, 2.0, 3.0], &[0.5, 0.5, 2.0, 0.5], &edges, &edges)
            .unwrap();
        assert_eq!(hist.counts[[0, 0]], 1.0);
        assert_eq!(hist.counts[[1, 0]], 1.0);
        assert_eq!(hist.counts[[1, 1]], 1.0);
        assert_eq!(hist.total(), 3.0);
    }

    #[test]
    fn masked_blanks_empty_cells() {
        let edges = [0.0, 1.0, 2.0];
        let hist = Histogram2d::compute(&[0.5], &[0.5], &edges, &edges).unwrap();
        let masked = hist.masked();
        assert_eq!(masked[[0, 0]], 1.0);
        assert!(masked[[1, 1]].is_nan());
    }

    #[test]
    fn rejects_bad_edges() {
        assert!(Histogram2d::compute(&[], &[], &[1.0], &[0.0, 1.0]).is_err());
        assert!(Histogram2d::compute(&[], &[], &[1.0, 0.0], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn uniform_edges_hit_both_ends() {
        let edges = uniform_edges(0.0, 20.0, 80).unwrap();
        assert_eq!(edges.len(), 81);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[80], 20.0);
        assert!(uniform_edges(1.0, 1.0, 4).is_err());
    }
}
