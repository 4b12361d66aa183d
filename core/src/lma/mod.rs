//! Fixed schema for LMA source and flash variables.

pub mod detection;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod table;

pub use detection::Detection;
pub use table::{flash_ids, parent_flash_ids, EventTable};

pub const EVENT_DIM: &str = "number_of_events";
pub const FLASH_DIM: &str = "number_of_flashes";

pub const EVENT_LONGITUDE: &str = "event_longitude";
pub const EVENT_LATITUDE: &str = "event_latitude";
pub const EVENT_ALTITUDE: &str = "event_altitude";
pub const EVENT_TIME: &str = "event_time";
pub const EVENT_CHI2: &str = "event_chi2";
pub const EVENT_STATIONS: &str = "event_stations";
pub const EVENT_POWER: &str = "event_power";
pub const EVENT_PARENT_FLASH_ID: &str = "event_parent_flash_id";

pub const FLASH_ID: &str = "flash_id";
pub const FLASH_EVENT_COUNT: &str = "flash_event_count";
pub const FLASH_TIME_START: &str = "flash_time_start";
pub const FLASH_TIME_END: &str = "flash_time_end";
pub const FLASH_DURATION: &str = "flash_duration";
pub const FLASH_INIT_LATITUDE: &str = "flash_init_latitude";
pub const FLASH_INIT_LONGITUDE: &str = "flash_init_longitude";
pub const FLASH_INIT_ALTITUDE: &str = "flash_init_altitude";
pub const FLASH_CENTER_LATITUDE: &str = "flash_center_latitude";
pub const FLASH_CENTER_LONGITUDE: &str = "flash_center_longitude";
pub const FLASH_CENTER_ALTITUDE: &str = "flash_center_altitude";
pub const FLASH_AREA: &str = "flash_area";
pub const FLASH_VOLUME: &str = "flash_volume";
pub const FLASH_POWER: &str = "flash_power";

pub const FLASH_TIME_THRESHOLD: &str = "flash_time_separation_threshold";
pub const FLASH_SPACE_THRESHOLD: &str = "flash_space_separation_threshold";

/// Label given to sources that belong to no flash.
pub const NOISE_FLASH_ID: u64 = u64::MAX;
