//! Data structures returned by the vacuum.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current status of the vacuum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VacuumStatus {
    /// Battery level (0 to 100)
    pub battery: u32,
    /// Area cleaned in the current or last run, in m²
    pub clean_area: f64,
    /// Duration of the current or last run
    pub clean_time: Duration,
    /// Error code, 0 means no error
    pub error_code: i64,
    /// Device-defined fan speed code
    pub fanspeed: i64,
    pub in_segment_cleaning: bool,
    pub in_zone_cleaning: bool,
    /// Whether the vacuum is cleaning in any mode
    pub is_on: bool,
    pub is_paused: bool,
    pub is_water_box_attached: bool,
    pub is_water_box_carriage_attached: bool,
    pub is_water_shortage: bool,
    /// Device state code (idle, cleaning, charging, error, ...)
    pub state: i64,
}

/// Lifetime cleaning counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Number of cleaning runs
    pub count: u64,
    /// Number of dust collections by the auto-empty dock
    pub dust_collection_count: u64,
    /// Total area cleaned, in m²
    pub total_area: f64,
    /// Total time spent cleaning
    pub total_duration: Duration,
}

/// Remaining lifetime of the wearable parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumableStatus {
    pub filter_left: Duration,
    pub main_brush_left: Duration,
    pub side_brush_left: Duration,
    pub sensor_dirty_left: Duration,
}

/// Everything collected in one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Timestamp when this snapshot was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    pub status: VacuumStatus,
    pub history: CleaningSummary,
    pub consumables: ConsumableStatus,
}

impl DeviceSnapshot {
    /// Bundle the three query results, stamped with the current time.
    pub fn new(
        status: VacuumStatus,
        history: CleaningSummary,
        consumables: ConsumableStatus,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
            status,
            history,
            consumables,
        }
    }
}

/// Identity of the device as reported by `miIO.info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub model: String,
    #[serde(rename = "fw_ver")]
    pub firmware_version: String,
    #[serde(rename = "hw_ver")]
    pub hardware_version: String,
    #[serde(rename = "mac")]
    pub mac_address: String,
}
