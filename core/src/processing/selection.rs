//! Source selection, time coloring and gridding for the five-panel LMA
//! display (plan, time-height, lon-height, lat-height, altitude histogram).
//! Only the data is prepared here; drawing is left to the viewer.

use crate::dataset::time::{datetime_to_nanos, nanos_to_datetime, nanos_to_seconds};
use crate::lma::{EventTable, EVENT_CHI2, EVENT_STATIONS};
use crate::math::histogram::uniform_edges;
use crate::math::{Histogram2d, StatsHelper};
use crate::prelude::{LmaError, LmaResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display window and source quality thresholds.
///
/// Position and time bounds are exclusive. A source passes the quality
/// checks when `chi2 <= max_chi2` and `stations >= min_stations`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionBounds {
    pub longitude: (f64, f64),
    pub latitude: (f64, f64),
    /// Metres.
    pub altitude: (f64, f64),
    pub time: (DateTime<Utc>, DateTime<Utc>),
    #[serde(default = "default_max_chi2")]
    pub max_chi2: f64,
    #[serde(default = "default_min_stations")]
    pub min_stations: i64,
}

fn default_max_chi2() -> f64 {
    1.0
}

fn default_min_stations() -> i64 {
    6
}

impl SelectionBounds {
    /// Bounds that admit every source of `table` strictly inside a small
    /// margin around its extent.
    pub fn around(table: &EventTable) -> LmaResult<Self> {
        let span = |values: &[f64]| -> LmaResult<(f64, f64)> {
            let (lo, hi) = StatsHelper::min_max(values)
                .ok_or_else(|| LmaError::EmptySelection("no sources to bound".into()))?;
            let pad = ((hi - lo) * 0.05).max(1e-6);
            Ok((lo - pad, hi + pad))
        };
        let first = table.time.iter().copied().min();
        let last = table.time.iter().copied().max();
        let (Some(first), Some(last)) = (first, last) else {
            return Err(LmaError::EmptySelection("no sources to bound".into()));
        };
        Ok(Self {
            longitude: span(&table.longitude)?,
            latitude: span(&table.latitude)?,
            altitude: span(&table.altitude)?,
            time: (
                nanos_to_datetime(first - 1),
                nanos_to_datetime(last + 1),
            ),
            max_chi2: default_max_chi2(),
            min_stations: default_min_stations(),
        })
    }

    fn time_nanos(&self) -> LmaResult<(i64, i64)> {
        Ok((datetime_to_nanos(self.time.0)?, datetime_to_nanos(self.time.1)?))
    }
}

/// Sources that passed `subset`, plus the mask over the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subset {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub altitude: Vec<f64>,
    /// Nanoseconds since the Unix epoch.
    pub time: Vec<i64>,
    pub mask: Vec<bool>,
}

impl Subset {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

pub fn subset(table: &EventTable, bounds: &SelectionBounds) -> LmaResult<Subset> {
    table.check_columns()?;
    let chi2 = table
        .chi2
        .as_ref()
        .ok_or_else(|| LmaError::MissingVariable(EVENT_CHI2.to_string()))?;
    let stations = table
        .stations
        .as_ref()
        .ok_or_else(|| LmaError::MissingVariable(EVENT_STATIONS.to_string()))?;
    let (t_lo, t_hi) = bounds.time_nanos()?;
    let inside = |value: f64, (lo, hi): (f64, f64)| value > lo && value < hi;

    let mask: Vec<bool> = (0..table.len())
        .map(|i| {
            inside(table.altitude[i], bounds.altitude)
                && inside(table.longitude[i], bounds.longitude)
                && inside(table.latitude[i], bounds.latitude)
                && table.time[i] > t_lo
                && table.time[i] < t_hi
                && chi2[i] <= bounds.max_chi2
                && stations[i] >= bounds.min_stations
        })
        .collect();

    let pick_f = |column: &[f64]| -> Vec<f64> {
        column
            .iter()
            .zip(&mask)
            .filter_map(|(&v, &keep)| keep.then_some(v))
            .collect()
    };
    Ok(Subset {
        longitude: pick_f(&table.longitude),
        latitude: pick_f(&table.latitude),
        altitude: pick_f(&table.altitude),
        time: table
            .time
            .iter()
            .zip(&mask)
            .filter_map(|(&t, &keep)| keep.then_some(t))
            .collect(),
        mask,
    })
}

/// Color values for sources by time, in seconds since the earliest source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeColors {
    pub vmin: f64,
    pub vmax: f64,
    pub values: Vec<f64>,
}

impl TimeColors {
    /// Values scaled to `[0, 1]` over `vmin..vmax`; all zero when the range
    /// is empty or undefined.
    pub fn normalized(&self) -> Vec<f64> {
        let range = self.vmax - self.vmin;
        if !(range.is_finite() && range > 0.0) {
            return vec![0.0; self.values.len()];
        }
        self.values
            .iter()
            .map(|v| ((v - self.vmin) / range).clamp(0.0, 1.0))
            .collect()
    }
}

/// `vmax` runs to the end of the display window `tlim`. An empty input
/// gives `vmax = 0` and no values.
pub fn color_by_time(times: &[i64], tlim: (DateTime<Utc>, DateTime<Utc>)) -> LmaResult<TimeColors> {
    let Some(first) = times.iter().copied().min() else {
        return Ok(TimeColors {
            vmin: 0.0,
            vmax: 0.0,
            values: Vec::new(),
        });
    };
    let end = datetime_to_nanos(tlim.1)?;
    Ok(TimeColors {
        vmin: 0.0,
        vmax: nanos_to_seconds(end - first),
        values: times.iter().map(|&t| nanos_to_seconds(t - first)).collect(),
    })
}

/// Bin edges per axis. Time edges are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBins {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub altitude: Vec<f64>,
    pub time: Vec<f64>,
}

impl HistogramBins {
    /// Evenly spaced edges spanning `bounds`, `counts` bins per axis in
    /// (lon, lat, alt, time) order.
    pub fn uniform(bounds: &SelectionBounds, counts: (usize, usize, usize, usize)) -> LmaResult<Self> {
        let (t_lo, t_hi) = bounds.time_nanos()?;
        Ok(Self {
            longitude: uniform_edges(bounds.longitude.0, bounds.longitude.1, counts.0)?,
            latitude: uniform_edges(bounds.latitude.0, bounds.latitude.1, counts.1)?,
            altitude: uniform_edges(bounds.altitude.0, bounds.altitude.1, counts.2)?,
            time: uniform_edges(nanos_to_seconds(t_lo), nanos_to_seconds(t_hi), counts.3)?,
        })
    }
}

/// Gridded source counts for the four projection panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHistograms {
    /// (lon, alt)
    pub alt_lon: Histogram2d,
    /// (alt, lat)
    pub alt_lat: Histogram2d,
    /// (time, alt)
    pub alt_time: Histogram2d,
    /// (lon, lat)
    pub lat_lon: Histogram2d,
}

pub fn setup_hist(selected: &Subset, bins: &HistogramBins) -> LmaResult<SourceHistograms> {
    let seconds: Vec<f64> = selected.time.iter().map(|&t| nanos_to_seconds(t)).collect();
    Ok(SourceHistograms {
        alt_lon: Histogram2d::compute(
            &selected.longitude,
            &selected.altitude,
            &bins.longitude,
            &bins.altitude,
        )?,
        alt_lat: Histogram2d::compute(
            &selected.altitude,
            &selected.latitude,
            &bins.altitude,
            &bins.latitude,
        )?,
        alt_time: Histogram2d::compute(&seconds, &selected.altitude, &bins.time, &bins.altitude)?,
        lat_lon: Histogram2d::compute(
            &selected.longitude,
            &selected.latitude,
            &bins.longitude,
            &bins.latitude,
        )?,
    })
}

/// Altitude distribution for the histogram panel: density over `bins`
/// equal bins of `range` (km), integrating to one when any source falls in
/// range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeProfile {
    pub edges: Vec<f64>,
    pub density: Vec<f64>,
    pub sources: usize,
}

pub const PROFILE_BINS: usize = 80;
pub const PROFILE_RANGE_KM: (f64, f64) = (0.0, 20.0);

pub fn altitude_profile(altitudes_m: &[f64], bins: usize, range_km: (f64, f64)) -> LmaResult<AltitudeProfile> {
    let edges = uniform_edges(range_km.0, range_km.1, bins)?;
    let km: Vec<f64> = altitudes_m.iter().map(|alt| alt / 1000.0).collect();
    let zeros = vec![0.0; km.len()];
    let hist = Histogram2d::compute(&km, &zeros, &edges, &[-1.0, 1.0])?;

    let width = (range_km.1 - range_km.0) / bins as f64;
    let total = hist.total();
    let density = hist
        .counts
        .column(0)
        .iter()
        .map(|&count| if total > 0.0 { count / (total * width) } else { 0.0 })
        .collect();
    Ok(AltitudeProfile {
        edges,
        density,
        sources: altitudes_m.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lma::fixtures::{self, BASE_TIME_NS, STORM};

    fn bounds() -> SelectionBounds {
        SelectionBounds {
            longitude: (-102.1, -101.4),
            latitude: (33.3, 34.0),
            altitude: (0.0, 20_000.0),
            time: (
                nanos_to_datetime(BASE_TIME_NS - 1),
                nanos_to_datetime(BASE_TIME_NS + 10_000_000_000),
            ),
            max_chi2: 5.0,
            min_stations: 6,
        }
    }

    #[test]
    fn generous_window_keeps_every_source() {
        let table = fixtures::table(&STORM);
        let selected = subset(&table, &bounds()).unwrap();
        assert_eq!(selected.len(), STORM.len());
        assert!(selected.mask.iter().all(|&m| m));
    }

    #[test]
    fn bounds_are_exclusive_and_quality_inclusive() {
        let table = fixtures::table(&STORM);
        let mut window = bounds();
        // chi2 runs 0.5, 0.75, ...; stations run 6, 7, ...
        window.max_chi2 = 1.0;
        window.min_stations = 7;
        window.altitude = (6000.0, 20_000.0);
        let selected = subset(&table, &window).unwrap();
        assert_eq!(
            selected.mask,
            vec![false, true, true, false, false, false, false, false]
        );
        assert_eq!(selected.altitude, vec![8200.0, 10000.0]);
    }

    #[test]
    fn ragged_table_is_rejected() {
        let mut table = fixtures::table(&STORM);
        table.stations = Some(vec![8; STORM.len() - 1]);
        assert!(matches!(subset(&table, &bounds()), Err(LmaError::InvalidInput(_))));
    }

    #[test]
    fn zero_or_one_survivor_is_fine() {
        let table = fixtures::table(&STORM);
        let mut window = bounds();
        window.max_chi2 = 0.0;
        let none = subset(&table, &window).unwrap();
        assert!(none.is_empty());
        assert_eq!(none.mask.len(), STORM.len());

        window.max_chi2 = 0.5;
        let one = subset(&table, &window).unwrap();
        assert_eq!(one.len(), 1);
        let colors = color_by_time(&one.time, window.time).unwrap();
        assert_eq!(colors.values, vec![0.0]);
        assert!(colors.normalized().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn quality_columns_are_required() {
        let mut table = fixtures::table(&STORM);
        table.stations = None;
        assert!(matches!(
            subset(&table, &bounds()),
            Err(LmaError::MissingVariable(_))
        ));
    }

    #[test]
    fn colors_run_to_window_end() {
        let times = [BASE_TIME_NS + 2_000_000_000, BASE_TIME_NS + 500_000_000];
        let colors = color_by_time(&times, bounds().time).unwrap();
        assert_eq!(colors.vmin, 0.0);
        assert!((colors.vmax - 9.5).abs() < 1e-9);
        assert!((colors.values[0] - 1.5).abs() < 1e-9);
        assert_eq!(colors.values[1], 0.0);
        let normalized = colors.normalized();
        assert!((normalized[0] - 1.5 / 9.5).abs() < 1e-9);
    }

    #[test]
    fn empty_times_have_a_defined_range() {
        let colors = color_by_time(&[], bounds().time).unwrap();
        assert_eq!((colors.vmin, colors.vmax), (0.0, 0.0));
        assert!(colors.values.is_empty());
        assert!(colors.normalized().is_empty());
    }

    #[test]
    fn histograms_count_every_selected_source() {
        let table = fixtures::table(&STORM);
        let mut window = bounds();
        window.time = (
            nanos_to_datetime(BASE_TIME_NS - 500_000_000),
            nanos_to_datetime(BASE_TIME_NS + 9_500_000_000),
        );
        let selected = subset(&table, &window).unwrap();
        let bins = HistogramBins::uniform(&window, (7, 7, 20, 10)).unwrap();
        let hists = setup_hist(&selected, &bins).unwrap();
        for hist in [&hists.alt_lon, &hists.alt_lat, &hists.alt_time, &hists.lat_lon] {
            assert_eq!(hist.total(), STORM.len() as f64);
        }
        assert_eq!(hists.alt_lon.counts.dim(), (7, 20));
        assert_eq!(hists.alt_lat.counts.dim(), (20, 7));
        assert_eq!(hists.alt_time.counts.dim(), (10, 20));
        // One-second time bins centred on whole seconds.
        assert_eq!(hists.alt_time.counts.row(0).sum(), 4.0);
        assert_eq!(hists.alt_time.counts.row(1).sum(), 1.0);
        assert_eq!(hists.alt_time.counts.row(2).sum(), 3.0);
        assert!(hists.lat_lon.masked().iter().any(|v| v.is_nan()));
    }

    #[test]
    fn altitude_profile_integrates_to_one() {
        let altitudes: Vec<f64> = STORM.iter().map(|s| s.3).collect();
        let profile = altitude_profile(&altitudes, PROFILE_BINS, PROFILE_RANGE_KM).unwrap();
        assert_eq!(profile.edges.len(), PROFILE_BINS + 1);
        let width = 20.0 / PROFILE_BINS as f64;
        let integral: f64 = profile.density.iter().map(|d| d * width).sum();
        assert!((integral - 1.0).abs() < 1e-9);
        assert_eq!(profile.sources, STORM.len());

        let empty = altitude_profile(&[], PROFILE_BINS, PROFILE_RANGE_KM).unwrap();
        assert!(empty.density.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn window_around_table_admits_all_sources() {
        let table = fixtures::table(&STORM);
        let mut window = SelectionBounds::around(&table).unwrap();
        window.max_chi2 = f64::INFINITY;
        window.min_stations = 0;
        assert_eq!(subset(&table, &window).unwrap().len(), STORM.len());
        assert!(SelectionBounds::around(&fixtures::table(&[])).is_err());
    }
}
