//! Roborock vacuum client over miIO.

use crate::config::Token;
use crate::device::data::{CleaningSummary, ConsumableStatus, DeviceInfo, VacuumStatus};
use crate::device::miio::MiioClient;
use crate::device::traits::VacuumClient;
use crate::error::{ExporterError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;

const HOUR: u64 = 3600;

/// Rated lifetime of the main brush.
pub const MAIN_BRUSH_LIFETIME: Duration = Duration::from_secs(300 * HOUR);
/// Rated lifetime of the side brush.
pub const SIDE_BRUSH_LIFETIME: Duration = Duration::from_secs(200 * HOUR);
/// Rated lifetime of the filter.
pub const FILTER_LIFETIME: Duration = Duration::from_secs(150 * HOUR);
/// Interval between sensor cleanings.
pub const SENSOR_DIRTY_LIFETIME: Duration = Duration::from_secs(30 * HOUR);

/// States in which the vacuum counts as cleaning: cleaning, remote
/// control, spot, zone and segment cleaning.
const CLEANING_STATES: [i64; 5] = [5, 7, 11, 17, 18];
const PAUSED_STATE: i64 = 10;

const IN_ZONE_CLEANING: i64 = 2;
const IN_SEGMENT_CLEANING: i64 = 3;

/// Areas arrive in mm².
fn area_m2(raw: u64) -> f64 {
    raw as f64 / 1_000_000.0
}

/// A Roborock vacuum reachable over the local network.
pub struct RoborockVacuum {
    client: MiioClient,
}

impl RoborockVacuum {
    /// Create a client for the vacuum at `addr`. Nothing is sent yet.
    pub fn new(addr: SocketAddr, token: &Token, timeout: Duration) -> Self {
        Self {
            client: MiioClient::new(addr, token, timeout),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.client.addr()
    }

    /// Ask the device for its model and firmware.
    pub async fn info(&mut self) -> Result<DeviceInfo> {
        let result = self.client.send("miIO.info", json!([])).await?;
        Ok(serde_json::from_value(result)?)
    }
}

impl VacuumClient for RoborockVacuum {
    async fn status(&mut self) -> Result<VacuumStatus> {
        let result = self.client.send("get_status", json!([])).await?;
        decode_status(result)
    }

    async fn clean_history(&mut self) -> Result<CleaningSummary> {
        let result = self.client.send("get_clean_summary", json!([])).await?;
        decode_clean_summary(result)
    }

    async fn consumable_status(&mut self) -> Result<ConsumableStatus> {
        let result = self.client.send("get_consumable", json!([])).await?;
        decode_consumables(result)
    }
}

/// Status and consumables come wrapped in a one-element list.
fn first_object(value: Value) -> Result<Value> {
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(items) => items
            .into_iter()
            .next()
            .filter(Value::is_object)
            .ok_or_else(|| ExporterError::protocol_error("expected a list holding one object")),
        other => Err(ExporterError::protocol_error(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    battery: u32,
    clean_area: u64,
    clean_time: u64,
    error_code: i64,
    fan_power: i64,
    state: i64,
    #[serde(default)]
    in_cleaning: i64,
    #[serde(default)]
    water_box_status: i64,
    #[serde(default)]
    water_box_carriage_status: i64,
    #[serde(default)]
    water_shortage_status: i64,
}

pub(crate) fn decode_status(value: Value) -> Result<VacuumStatus> {
    let raw: RawStatus = serde_json::from_value(first_object(value)?)?;

    Ok(VacuumStatus {
        battery: raw.battery,
        clean_area: area_m2(raw.clean_area),
        clean_time: Duration::from_secs(raw.clean_time),
        error_code: raw.error_code,
        fanspeed: raw.fan_power,
        in_segment_cleaning: raw.in_cleaning == IN_SEGMENT_CLEANING,
        in_zone_cleaning: raw.in_cleaning == IN_ZONE_CLEANING,
        is_on: CLEANING_STATES.contains(&raw.state),
        is_paused: raw.state == PAUSED_STATE,
        is_water_box_attached: raw.water_box_status == 1,
        is_water_box_carriage_attached: raw.water_box_carriage_status == 1,
        is_water_shortage: raw.water_shortage_status == 1,
        state: raw.state,
    })
}

#[derive(Debug, Deserialize)]
struct RawCleanSummary {
    clean_time: u64,
    clean_area: u64,
    clean_count: u64,
    #[serde(default)]
    dust_collection_count: u64,
}

/// Newer firmware answers with an object, older firmware with
/// `[clean_time, clean_area, clean_count, records]`.
pub(crate) fn decode_clean_summary(value: Value) -> Result<CleaningSummary> {
    let raw = match value {
        Value::Object(_) => serde_json::from_value::<RawCleanSummary>(value)?,
        Value::Array(mut items) if matches!(items.first(), Some(Value::Object(_))) => {
            return decode_clean_summary(items.swap_remove(0));
        }
        Value::Array(items) => {
            let field = |index: usize, name: &str| {
                items.get(index).and_then(Value::as_u64).ok_or_else(|| {
                    ExporterError::protocol_error(format!("clean summary lacks {}", name))
                })
            };
            RawCleanSummary {
                clean_time: field(0, "clean_time")?,
                clean_area: field(1, "clean_area")?,
                clean_count: field(2, "clean_count")?,
                dust_collection_count: 0,
            }
        }
        other => {
            return Err(ExporterError::protocol_error(format!(
                "unexpected clean summary {}",
                other
            )))
        }
    };

    Ok(CleaningSummary {
        count: raw.clean_count,
        dust_collection_count: raw.dust_collection_count,
        total_area: area_m2(raw.clean_area),
        total_duration: Duration::from_secs(raw.clean_time),
    })
}

#[derive(Debug, Deserialize)]
struct RawConsumables {
    main_brush_work_time: u64,
    side_brush_work_time: u64,
    filter_work_time: u64,
    sensor_dirty_time: u64,
}

pub(crate) fn decode_consumables(value: Value) -> Result<ConsumableStatus> {
    let raw: RawConsumables = serde_json::from_value(first_object(value)?)?;
    let left = |lifetime: Duration, used: u64| lifetime.saturating_sub(Duration::from_secs(used));

    Ok(ConsumableStatus {
        filter_left: left(FILTER_LIFETIME, raw.filter_work_time),
        main_brush_left: left(MAIN_BRUSH_LIFETIME, raw.main_brush_work_time),
        side_brush_left: left(SIDE_BRUSH_LIFETIME, raw.side_brush_work_time),
        sensor_dirty_left: left(SENSOR_DIRTY_LIFETIME, raw.sensor_dirty_time),
    })
}
