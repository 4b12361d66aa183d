use anyhow::{ensure, Context};
use chrono::{DateTime, Duration, TimeZone, Utc};
use lmacore::coords::{CoordinateSystem, GeographicSystem, TangentPlaneCartesianSystem};
use lmacore::lma::{Detection, EventTable};
use lmacore::Dataset;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating a synthetic storm.
///
/// Each flash is a burst of sources inside a cube of side
/// `2 * flash_spread` metres lasting `flash_length` seconds; flashes start
/// `flash_spacing` seconds apart. With the default clustering thresholds
/// every generated flash clusters into exactly one flash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StormConfig {
    pub flashes: usize,
    pub sources_per_flash: usize,
    pub seed: u64,
    pub start: DateTime<Utc>,
    pub center_latitude: f64,
    pub center_longitude: f64,
    /// Degrees around the centre within which flash origins fall.
    pub region: f64,
    pub flash_spacing: f64,
    pub flash_length: f64,
    pub flash_spread: f64,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            flashes: 20,
            sources_per_flash: 40,
            seed: 0,
            start: Utc.with_ymd_and_hms(2023, 12, 24, 0, 57, 0).single().unwrap_or_default(),
            center_latitude: 33.606968,
            center_longitude: -101.822625,
            region: 0.5,
            flash_spacing: 1.0,
            flash_length: 0.1,
            flash_spread: 500.0,
            description: None,
            scenario: None,
        }
    }
}

impl StormConfig {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.flash_spacing > self.flash_length,
            "flash spacing {} s must exceed flash length {} s",
            self.flash_spacing,
            self.flash_length
        );
        ensure!(
            self.flash_length >= 0.0 && self.flash_spread >= 0.0 && self.region >= 0.0,
            "flash length, spread and region must not be negative"
        );
        Ok(())
    }
}

fn build_detections(config: &StormConfig) -> anyhow::Result<Vec<Detection>> {
    config.validate()?;
    let total = config
        .flashes
        .checked_mul(config.sources_per_flash)
        .context("overflow computing source count for generator")?;

    let geo = GeographicSystem::default();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut detections = Vec::with_capacity(total);

    for flash_index in 0..config.flashes {
        let origin_lat = config.center_latitude + rng.gen_range(-1.0..=1.0) * config.region;
        let origin_lon = config.center_longitude + rng.gen_range(-1.0..=1.0) * config.region;
        let origin_alt = rng.gen_range(4_000.0..12_000.0);
        let plane = TangentPlaneCartesianSystem::with_system(&geo, origin_lat, origin_lon, origin_alt);
        let flash_start = flash_index as f64 * config.flash_spacing;

        for _ in 0..config.sources_per_flash {
            let spread = config.flash_spread;
            let (x, y, z) = plane.to_ecef(
                rng.gen_range(-spread..=spread),
                rng.gen_range(-spread..=spread),
                rng.gen_range(-spread..=spread),
            );
            let (lon, lat, alt) = geo.from_ecef(x, y, z);
            let offset = flash_start + rng.gen_range(0.0..=config.flash_length);
            let time = config.start + Duration::nanoseconds((offset * 1e9).round() as i64);
            let chi2 = rng.gen_range(0.05..1.0);
            let stations = rng.gen_range(6..=12);
            detections.push(
                Detection::new(time, lon, lat, alt, chi2, stations)
                    .with_power(rng.gen_range(-5.0..30.0)),
            );
        }
    }
    Ok(detections)
}

pub fn build_storm_from_config(config: &StormConfig) -> anyhow::Result<Dataset> {
    let detections = build_detections(config)?;
    let table = EventTable::from_detections(&detections).context("tabulating synthetic sources")?;
    let mut dataset = table.to_dataset().context("building synthetic dataset")?;
    if let Some(description) = &config.description {
        dataset.set_attr("description", description.as_str());
    }
    Ok(dataset)
}

pub fn build_storm(flashes: usize, sources_per_flash: usize) -> anyhow::Result<Dataset> {
    let config = StormConfig {
        flashes,
        sources_per_flash,
        ..Default::default()
    };
    build_storm_from_config(&config)
}
