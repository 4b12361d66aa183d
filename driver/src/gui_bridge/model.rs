use crate::workflow::runner::WorkflowResult;
use anyhow::Context;
use chrono::{DateTime, Utc};
use lmacore::dataset::time::{nanos_to_datetime, nanos_to_seconds};
use lmacore::lma::{EventTable, EVENT_CHI2, EVENT_STATIONS, FLASH_DIM};
use lmacore::processing::selection::{PROFILE_BINS, PROFILE_RANGE_KM};
use lmacore::processing::{
    altitude_profile, color_by_time, setup_hist, subset, AltitudeProfile, FlashSummary,
    HistogramBins, SelectionBounds, SourceHistograms,
};
use serde::{Deserialize, Serialize};

/// Histogram bins per axis (lon, lat, alt, time) for the gridded panels.
const GRID_BINS: (usize, usize, usize, usize) = (40, 40, 40, 40);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashView {
    pub id: usize,
    pub event_count: u64,
    pub start: DateTime<Utc>,
    pub duration: f64,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub center_altitude: f64,
    pub area: f64,
    pub volume: f64,
}

impl FlashView {
    fn new(id: usize, summary: &FlashSummary) -> Self {
        Self {
            id,
            event_count: summary.event_count,
            start: nanos_to_datetime(summary.time_start),
            duration: nanos_to_seconds(summary.duration()),
            center_latitude: summary.center_latitude,
            center_longitude: summary.center_longitude,
            center_altitude: summary.center_altitude,
            area: summary.area,
            volume: summary.volume,
        }
    }
}

/// A selected source and its time color in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcePoint {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub color: f64,
}

/// Everything an external viewer needs to draw the LMA panels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerModel {
    pub event_count: usize,
    pub flash_count: usize,
    pub filtered_flash_count: usize,
    pub flashes: Vec<FlashView>,
    pub points: Vec<SourcePoint>,
    pub window: Option<SelectionBounds>,
    pub histograms: Option<SourceHistograms>,
    pub altitude_profile: Option<AltitudeProfile>,
    pub notes: Vec<String>,
}

impl ViewerModel {
    pub fn from_result(
        result: &WorkflowResult,
        window: Option<&SelectionBounds>,
    ) -> anyhow::Result<Self> {
        let mut model = Self {
            event_count: result.event_count(),
            flash_count: result.flash_count(),
            filtered_flash_count: result
                .filtered
                .as_ref()
                .and_then(|ds| ds.dim_len(FLASH_DIM))
                .unwrap_or(0),
            flashes: result
                .summaries
                .iter()
                .enumerate()
                .map(|(id, summary)| FlashView::new(id, summary))
                .collect(),
            notes: result.notes.clone(),
            ..Default::default()
        };

        let table = EventTable::from_dataset(&result.clustered).context("reading sources")?;
        if table.is_empty() {
            return Ok(model);
        }
        if table.chi2.is_none() || table.stations.is_none() {
            model.notes.push(format!(
                "{} or {} missing; no source points or histograms",
                EVENT_CHI2, EVENT_STATIONS
            ));
            return Ok(model);
        }
        let window = match window {
            Some(bounds) => *bounds,
            None => SelectionBounds::around(&table).context("deriving display window")?,
        };

        let selected = subset(&table, &window).context("selecting sources")?;
        let colors = color_by_time(&selected.time, window.time).context("coloring sources")?;
        model.points = selected
            .longitude
            .iter()
            .zip(&selected.latitude)
            .zip(&selected.altitude)
            .zip(colors.normalized())
            .map(|(((&longitude, &latitude), &altitude), color)| SourcePoint {
                longitude,
                latitude,
                altitude,
                color,
            })
            .collect();

        let bins = HistogramBins::uniform(&window, GRID_BINS).context("building histogram bins")?;
        model.histograms = Some(setup_hist(&selected, &bins).context("gridding sources")?);
        model.altitude_profile = Some(
            altitude_profile(&selected.altitude, PROFILE_BINS, PROFILE_RANGE_KM)
                .context("building altitude profile")?,
        );
        model.window = Some(window);
        Ok(model)
    }
}
