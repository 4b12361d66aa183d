//! Small synthetic storms shared by the processing tests.

use super::EventTable;
use crate::dataset::Dataset;

/// 2020-09-13T12:26:40Z.
pub(crate) const BASE_TIME_NS: i64 = 1_600_000_000_000_000_000;

/// `(seconds after BASE_TIME_NS, lon, lat, alt)`.
pub(crate) type Source = (f64, f64, f64, f64);

/// Three flashes interleaved in input order:
/// flash A at indices 0, 1, 3, 6; flash C at 2, 5, 7; a lone source B at 4.
pub(crate) const STORM: [Source; 8] = [
    (0.00, -101.80, 33.60, 8000.0),
    (0.05, -101.80, 33.61, 8200.0),
    (2.00, -102.00, 33.40, 10000.0),
    (0.10, -101.81, 33.61, 7800.0),
    (1.00, -101.50, 33.90, 6000.0),
    (2.06, -102.00, 33.40, 10500.0),
    (0.08, -101.79, 33.60, 9000.0),
    (2.10, -102.01, 33.40, 10000.0),
];

/// Flash labels the default clustering assigns to `STORM`.
pub(crate) const STORM_LABELS: [u64; 8] = [0, 0, 1, 0, 2, 1, 0, 1];

pub(crate) fn table(sources: &[Source]) -> EventTable {
    let n = sources.len();
    EventTable {
        longitude: sources.iter().map(|s| s.1).collect(),
        latitude: sources.iter().map(|s| s.2).collect(),
        altitude: sources.iter().map(|s| s.3).collect(),
        time: sources
            .iter()
            .map(|s| BASE_TIME_NS + (s.0 * 1e9).round() as i64)
            .collect(),
        chi2: Some((0..n).map(|i| 0.5 + i as f64 * 0.25).collect()),
        stations: Some((0..n).map(|i| 6 + i as i64).collect()),
        power: Some(vec![10.0; n]),
    }
}

pub(crate) fn dataset(sources: &[Source]) -> Dataset {
    table(sources).to_dataset().unwrap()
}

pub(crate) fn storm() -> Dataset {
    dataset(&STORM)
}
