use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single located VHF source as reported by the LMA solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub time: DateTime<Utc>,
    pub longitude: f64,
    pub latitude: f64,
    /// Metres above the ellipsoid.
    pub altitude: f64,
    /// Reduced chi-square of the location solution.
    pub chi2: f64,
    pub stations: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

impl Detection {
    pub fn new(
        time: DateTime<Utc>,
        longitude: f64,
        latitude: f64,
        altitude: f64,
        chi2: f64,
        stations: i64,
    ) -> Self {
        Self {
            time,
            longitude,
            latitude,
            altitude,
            chi2,
            stations,
            power: None,
        }
    }

    pub fn with_power(mut self, power_dbw: f64) -> Self {
        self.power = Some(power_dbw);
        self
    }
}
