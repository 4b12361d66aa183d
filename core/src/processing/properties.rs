use crate::coords::{CoordinateSystem, GeographicSystem, TangentPlaneCartesianSystem};
use crate::dataset::{Dataset, Variable, VariableData};
use crate::lma::{
    flash_ids, parent_flash_ids, EventTable, EVENT_DIM, EVENT_POWER, FLASH_AREA, FLASH_CENTER_ALTITUDE,
    FLASH_CENTER_LATITUDE, FLASH_CENTER_LONGITUDE, FLASH_DIM, FLASH_DURATION, FLASH_EVENT_COUNT,
    FLASH_INIT_ALTITUDE, FLASH_INIT_LATITUDE, FLASH_INIT_LONGITUDE, FLASH_POWER, FLASH_TIME_END,
    FLASH_TIME_START, FLASH_VOLUME, NOISE_FLASH_ID,
};
use crate::math::hull::{hull_area, hull_volume};
use crate::math::StatsHelper;
use crate::prelude::{DatasetStage, LmaError, LmaResult, StageMetadata, StageOutput};
use crate::telemetry::LogManager;
use std::collections::HashMap;

const SQ_METRES_PER_SQ_KM: f64 = 1e6;
const CU_METRES_PER_CU_KM: f64 = 1e9;

/// Per-flash summary computed from the member sources.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashSummary {
    pub event_count: u64,
    pub time_start: i64,
    pub time_end: i64,
    pub init_latitude: f64,
    pub init_longitude: f64,
    pub init_altitude: f64,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub center_altitude: f64,
    /// km².
    pub area: f64,
    /// km³.
    pub volume: f64,
    /// Total source power in dBW, summed in watts.
    pub power: Option<f64>,
}

impl FlashSummary {
    pub fn duration(&self) -> i64 {
        self.time_end - self.time_start
    }

    fn from_members(table: &EventTable, members: &[usize], geo: &GeographicSystem) -> Self {
        let lons = gather(&table.longitude, members);
        let lats = gather(&table.latitude, members);
        let alts = gather(&table.altitude, members);
        let times: Vec<i64> = members.iter().map(|&i| table.time[i]).collect();

        let first = StatsHelper::argmin(&times).unwrap_or(0);
        let center_latitude = StatsHelper::mean(&lats).unwrap_or(f64::NAN);
        let center_longitude = StatsHelper::mean(&lons).unwrap_or(f64::NAN);
        let center_altitude = StatsHelper::mean(&alts).unwrap_or(f64::NAN);

        let (area, volume) = if members.len() < 3 {
            (0.0, 0.0)
        } else {
            let plane =
                TangentPlaneCartesianSystem::with_system(geo, center_latitude, center_longitude, 0.0);
            let local: Vec<(f64, f64, f64)> = lons
                .iter()
                .zip(&lats)
                .zip(&alts)
                .map(|((&lon, &lat), &alt)| {
                    let (x, y, z) = geo.to_ecef(lon, lat, alt);
                    plane.from_ecef(x, y, z)
                })
                .collect();
            let plan: Vec<(f64, f64)> = local.iter().map(|&(e, n, _)| (e, n)).collect();
            (
                hull_area(&plan) / SQ_METRES_PER_SQ_KM,
                hull_volume(&local) / CU_METRES_PER_CU_KM,
            )
        };

        Self {
            event_count: members.len() as u64,
            time_start: times.iter().copied().min().unwrap_or_default(),
            time_end: times.iter().copied().max().unwrap_or_default(),
            init_latitude: lats[first],
            init_longitude: lons[first],
            init_altitude: alts[first],
            center_latitude,
            center_longitude,
            center_altitude,
            area,
            volume,
            power: table.power.as_ref().map(|power| {
                let watts: f64 = members.iter().map(|&i| dbw_to_watts(power[i])).sum();
                watts_to_dbw(watts)
            }),
        }
    }
}

fn dbw_to_watts(dbw: f64) -> f64 {
    10f64.powf(dbw / 10.0)
}

fn watts_to_dbw(watts: f64) -> f64 {
    10.0 * watts.log10()
}

fn gather(column: &[f64], members: &[usize]) -> Vec<f64> {
    members.iter().map(|&i| column[i]).collect()
}

/// Summaries in `flash_id` order.
pub fn summarize_flashes(dataset: &Dataset) -> LmaResult<Vec<FlashSummary>> {
    let table = EventTable::from_dataset(dataset)?;
    let parents = parent_flash_ids(dataset)?;
    let flashes = flash_ids(dataset)?;

    let slot: HashMap<u64, usize> = flashes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); flashes.len()];
    let mut orphans = 0usize;
    for (event, parent) in parents.iter().enumerate() {
        match slot.get(parent) {
            Some(&flash) => members[flash].push(event),
            None if *parent == NOISE_FLASH_ID => {}
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        log::debug!(
            target: "stats",
            "{} sources reference flashes not in {}",
            orphans,
            FLASH_DIM
        );
    }

    let geo = GeographicSystem::default();
    flashes
        .iter()
        .zip(&members)
        .map(|(id, members)| {
            if members.is_empty() {
                return Err(LmaError::MalformedDataset(format!(
                    "flash {} has no sources",
                    id
                )));
            }
            Ok(FlashSummary::from_members(&table, members, &geo))
        })
        .collect()
}

/// Adds per-flash statistics along `number_of_flashes` to a clustered
/// dataset. Sources are kept.
pub fn flash_stats(dataset: &Dataset) -> LmaResult<Dataset> {
    let summaries = summarize_flashes(dataset)?;
    let column = |f: fn(&FlashSummary) -> f64| summaries.iter().map(f).collect::<Vec<f64>>();

    let mut variables = vec![
        Variable::new(
            FLASH_EVENT_COUNT,
            &[FLASH_DIM],
            VariableData::uint(summaries.iter().map(|s| s.event_count).collect()),
        )?,
        Variable::new(
            FLASH_TIME_START,
            &[FLASH_DIM],
            VariableData::time(summaries.iter().map(|s| s.time_start).collect()),
        )?,
        Variable::new(
            FLASH_TIME_END,
            &[FLASH_DIM],
            VariableData::time(summaries.iter().map(|s| s.time_end).collect()),
        )?,
        Variable::new(
            FLASH_DURATION,
            &[FLASH_DIM],
            VariableData::duration(summaries.iter().map(FlashSummary::duration).collect()),
        )?,
        Variable::new(FLASH_INIT_LATITUDE, &[FLASH_DIM], VariableData::float(column(|s| s.init_latitude)))?
            .with_attr("units", "degrees_north"),
        Variable::new(FLASH_INIT_LONGITUDE, &[FLASH_DIM], VariableData::float(column(|s| s.init_longitude)))?
            .with_attr("units", "degrees_east"),
        Variable::new(FLASH_INIT_ALTITUDE, &[FLASH_DIM], VariableData::float(column(|s| s.init_altitude)))?
            .with_attr("units", "m"),
        Variable::new(FLASH_CENTER_LATITUDE, &[FLASH_DIM], VariableData::float(column(|s| s.center_latitude)))?
            .with_attr("units", "degrees_north"),
        Variable::new(FLASH_CENTER_LONGITUDE, &[FLASH_DIM], VariableData::float(column(|s| s.center_longitude)))?
            .with_attr("units", "degrees_east"),
        Variable::new(FLASH_CENTER_ALTITUDE, &[FLASH_DIM], VariableData::float(column(|s| s.center_altitude)))?
            .with_attr("units", "m"),
        Variable::new(FLASH_AREA, &[FLASH_DIM], VariableData::float(column(|s| s.area)))?
            .with_attr("units", "km^2"),
        Variable::new(FLASH_VOLUME, &[FLASH_DIM], VariableData::float(column(|s| s.volume)))?
            .with_attr("units", "km^3"),
    ];
    if summaries.iter().all(|s| s.power.is_some()) && dataset.contains(EVENT_POWER) {
        variables.push(
            Variable::new(
                FLASH_POWER,
                &[FLASH_DIM],
                VariableData::float(column(|s| s.power.unwrap_or(f64::NAN))),
            )?
            .with_attr("units", "dBW"),
        );
    }

    let mut output = dataset.clone();
    for variable in variables {
        output.insert(variable)?;
    }
    Ok(output)
}

/// Flash statistics as a pipeline stage.
pub struct StatsStage {
    logger: LogManager,
}

impl StatsStage {
    pub fn new() -> Self {
        Self {
            logger: LogManager::for_stage("stats"),
        }
    }
}

impl Default for StatsStage {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetStage for StatsStage {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn execute(&self, input: &Dataset) -> LmaResult<StageOutput> {
        let dataset = flash_stats(input)?;
        let flash_count = dataset.dim_len(FLASH_DIM).unwrap_or(0);
        let largest = dataset
            .get(FLASH_EVENT_COUNT)
            .map(|var| var.data.to_f64().fold(0.0, |acc: f64, &v| acc.max(v)))
            .unwrap_or(0.0);
        self.logger.record(&format!(
            "computed statistics for {} flashes, largest has {} sources",
            flash_count, largest
        ));
        Ok(StageOutput {
            metadata: StageMetadata {
                event_count: dataset.dim_len(EVENT_DIM),
                flash_count: Some(flash_count),
                notes: vec![format!("largest flash {} sources", largest)],
            },
            dataset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lma::fixtures::{self, BASE_TIME_NS};
    use crate::lma::{EVENT_PARENT_FLASH_ID, FLASH_ID};
    use crate::processing::cluster::{cluster_flashes, ClusterConfig};

    fn clustered_storm() -> Dataset {
        cluster_flashes(&fixtures::storm(), &ClusterConfig::default()).unwrap()
    }

    fn floats(ds: &Dataset, name: &str) -> Vec<f64> {
        ds.require(name).unwrap().data.to_f64().iter().copied().collect()
    }

    fn label(mut ds: Dataset, parents: Vec<u64>, flashes: Vec<u64>) -> Dataset {
        ds.insert(Variable::new(EVENT_PARENT_FLASH_ID, &[EVENT_DIM], VariableData::uint(parents)).unwrap())
            .unwrap();
        ds.insert(Variable::new(FLASH_ID, &[FLASH_DIM], VariableData::uint(flashes)).unwrap())
            .unwrap();
        ds
    }

    #[test]
    fn storm_statistics() {
        let stats = flash_stats(&clustered_storm()).unwrap();
        assert_eq!(floats(&stats, FLASH_EVENT_COUNT), vec![4.0, 3.0, 1.0]);
        assert_eq!(
            stats.require(FLASH_TIME_START).unwrap().data.as_time().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![BASE_TIME_NS, BASE_TIME_NS + 2_000_000_000, BASE_TIME_NS + 1_000_000_000]
        );
        let durations = floats(&stats, FLASH_DURATION);
        assert!((durations[0] - 0.10).abs() < 1e-9);
        assert!((durations[1] - 0.10).abs() < 1e-9);
        assert_eq!(durations[2], 0.0);

        assert_eq!(floats(&stats, FLASH_INIT_ALTITUDE), vec![8000.0, 10000.0, 6000.0]);
        assert_eq!(floats(&stats, FLASH_INIT_LONGITUDE), vec![-101.80, -102.00, -101.50]);
        let centre_lat = floats(&stats, FLASH_CENTER_LATITUDE);
        assert!((centre_lat[0] - 33.605).abs() < 1e-9);
        assert!((floats(&stats, FLASH_CENTER_ALTITUDE)[1] - 10166.666666666666).abs() < 1e-6);
        // Every fixture source radiates 10 dBW.
        let power = floats(&stats, FLASH_POWER);
        assert!((power[0] - (10.0 + 10.0 * 4f64.log10())).abs() < 1e-9);
        assert!((power[1] - (10.0 + 10.0 * 3f64.log10())).abs() < 1e-9);
        assert!((power[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn small_flashes_have_no_extent() {
        let stats = flash_stats(&clustered_storm()).unwrap();
        let area = floats(&stats, FLASH_AREA);
        let volume = floats(&stats, FLASH_VOLUME);
        assert!(area[0] > 0.0);
        assert!(volume[0] > 0.0);
        // Flash 1 has two sources stacked vertically, so its plan view is a line.
        assert!(area[1].abs() < 1e-9);
        assert_eq!(volume[1], 0.0);
        assert_eq!(area[2], 0.0);
        assert_eq!(volume[2], 0.0);
    }

    #[test]
    fn cube_of_sources_has_known_extent() {
        let geo = GeographicSystem::default();
        let plane = TangentPlaneCartesianSystem::new(35.0, -98.0, 0.0);
        let mut sources = Vec::new();
        for (i, &(e, n, u)) in [
            (-1000.0, -1000.0, 5000.0),
            (1000.0, -1000.0, 5000.0),
            (1000.0, 1000.0, 5000.0),
            (-1000.0, 1000.0, 5000.0),
            (-1000.0, -1000.0, 7000.0),
            (1000.0, -1000.0, 7000.0),
            (1000.0, 1000.0, 7000.0),
            (-1000.0, 1000.0, 7000.0),
        ]
        .iter()
        .enumerate()
        {
            let (x, y, z) = plane.to_ecef(e, n, u);
            let (lon, lat, alt) = geo.from_ecef(x, y, z);
            sources.push((i as f64 * 0.01, lon, lat, alt));
        }
        let ds = label(fixtures::dataset(&sources), vec![0; 8], vec![0]);
        let stats = flash_stats(&ds).unwrap();
        assert!((floats(&stats, FLASH_AREA)[0] - 4.0).abs() < 1e-3);
        assert!((floats(&stats, FLASH_VOLUME)[0] - 8.0).abs() < 1e-6);
    }

    #[test]
    fn noise_sources_are_ignored() {
        let ds = label(
            fixtures::storm(),
            vec![0, 0, NOISE_FLASH_ID, 0, NOISE_FLASH_ID, NOISE_FLASH_ID, 0, NOISE_FLASH_ID],
            vec![0],
        );
        let stats = flash_stats(&ds).unwrap();
        assert_eq!(floats(&stats, FLASH_EVENT_COUNT), vec![4.0]);
        assert_eq!(stats.dim_len(EVENT_DIM), Some(8));
    }

    #[test]
    fn flash_without_sources_is_malformed() {
        let ds = label(fixtures::storm(), vec![0; 8], vec![0, 1]);
        assert!(matches!(flash_stats(&ds), Err(LmaError::MalformedDataset(_))));
    }

    #[test]
    fn power_adds_in_watts() {
        assert!((watts_to_dbw(dbw_to_watts(0.0) + dbw_to_watts(0.0)) - 10.0 * 2f64.log10()).abs() < 1e-12);
        assert!((dbw_to_watts(20.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn power_is_optional() {
        let ds = clustered_storm().drop_vars(&[EVENT_POWER]).unwrap();
        let stats = flash_stats(&ds).unwrap();
        assert!(!stats.contains(FLASH_POWER));
    }

    #[test]
    fn unclustered_input_is_rejected() {
        assert!(matches!(
            flash_stats(&fixtures::storm()),
            Err(LmaError::MissingVariable(_))
        ));
    }

    #[test]
    fn stage_reports_largest_flash() {
        let output = StatsStage::new().execute(&clustered_storm()).unwrap();
        assert_eq!(output.metadata.flash_count, Some(3));
        assert_eq!(output.metadata.notes, vec!["largest flash 4 sources".to_string()]);
    }
}
