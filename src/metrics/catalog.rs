//! Prometheus gauges published by the exporter.
//!
//! Every field of a [`DeviceSnapshot`] has exactly one gauge. All gauges are
//! registered up front so a scrape that lands before the first poll still
//! sees every series, at zero.

use crate::device::data::DeviceSnapshot;
use crate::error::Result;
use prometheus::{Gauge, Registry};

/// Name and help text of one gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub help: &'static str,
}

const fn def(name: &'static str, help: &'static str) -> MetricDefinition {
    MetricDefinition { name, help }
}

pub const BATTERY: MetricDefinition = def("roborock_battery", "Current battery percentage");
pub const CLEAN_AREA: MetricDefinition = def("roborock_clean_area", "Clean area in m2");
pub const CLEAN_TIME: MetricDefinition = def("roborock_clean_time", "Cleaning time in seconds");
pub const ERROR_CODE: MetricDefinition =
    def("roborock_error_code", "Current error code, 0 if no error occurred");
pub const FANSPEED: MetricDefinition = def("roborock_fanspeed", "Current fanspeed code");
pub const IN_SEGMENT_CLEANING: MetricDefinition = def(
    "roborock_in_segment_cleaning",
    "Boolean if is in segment cleaning",
);
pub const IN_ZONE_CLEANING: MetricDefinition =
    def("roborock_in_zone_cleaning", "Boolean if is in zone cleaning");
pub const IS_ON: MetricDefinition = def("roborock_is_on", "Boolean if vacuum is cleaning");
pub const IS_PAUSE: MetricDefinition = def("roborock_is_pause", "Boolean if vacuum is paused");
pub const IS_WATER_BOX_ATTACHED: MetricDefinition = def(
    "roborock_is_water_box_attached",
    "Boolean if waterbox is attached",
);
pub const IS_WATER_BOX_CARRIAGE_ATTACHED: MetricDefinition = def(
    "roborock_is_water_box_carriage_attached",
    "Boolean if carriage is attached",
);
pub const WATER_SHORTAGE_STATUS: MetricDefinition = def(
    "roborock_water_shortage_status",
    "Boolean if there is water shortage",
);
pub const STATE: MetricDefinition = def("roborock_state", "Roborock state code");

pub const CLEAN_COUNT: MetricDefinition =
    def("roborock_clean_count", "Integer count of cleanings");
pub const DUST_COLLECTION_COUNT: MetricDefinition = def(
    "roborock_dust_collection_count",
    "Integer count of dust collections",
);
pub const TOTAL_AREA: MetricDefinition =
    def("roborock_total_area", "Metric of total cleaned area in m2");
pub const TOTAL_DURATION: MetricDefinition = def(
    "roborock_total_duration",
    "Metric of total time cleaning in seconds",
);

pub const FILTER_LEFT: MetricDefinition = def(
    "roborock_filter_left",
    "Seconds left until change of filter",
);
pub const MAIN_BRUSH_LEFT: MetricDefinition = def(
    "roborock_main_brush_left",
    "Seconds left until change of main brush",
);
pub const SENSOR_DIRTY_LEFT: MetricDefinition = def(
    "roborock_sensor_dirty_left",
    "Seconds left until cleaning of sensors",
);
pub const SIDE_BRUSH_LEFT: MetricDefinition = def(
    "roborock_side_brush_left",
    "Seconds left until change of side brush",
);

/// Every gauge the exporter registers, in registration order.
pub const DEFINITIONS: [MetricDefinition; 21] = [
    BATTERY,
    CLEAN_AREA,
    CLEAN_TIME,
    ERROR_CODE,
    FANSPEED,
    IN_SEGMENT_CLEANING,
    IN_ZONE_CLEANING,
    IS_ON,
    IS_PAUSE,
    IS_WATER_BOX_ATTACHED,
    IS_WATER_BOX_CARRIAGE_ATTACHED,
    WATER_SHORTAGE_STATUS,
    STATE,
    CLEAN_COUNT,
    DUST_COLLECTION_COUNT,
    TOTAL_AREA,
    TOTAL_DURATION,
    FILTER_LEFT,
    MAIN_BRUSH_LEFT,
    SENSOR_DIRTY_LEFT,
    SIDE_BRUSH_LEFT,
];

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// The registered gauges of one vacuum.
#[derive(Clone)]
pub struct RoborockMetrics {
    // ========== Status ==========
    pub battery: Gauge,
    pub clean_area: Gauge,
    pub clean_time: Gauge,
    pub error_code: Gauge,
    pub fanspeed: Gauge,
    pub in_segment_cleaning: Gauge,
    pub in_zone_cleaning: Gauge,
    pub is_on: Gauge,
    pub is_pause: Gauge,
    pub is_water_box_attached: Gauge,
    pub is_water_box_carriage_attached: Gauge,
    pub water_shortage_status: Gauge,
    pub state: Gauge,

    // ========== Cleaning history ==========
    pub clean_count: Gauge,
    pub dust_collection_count: Gauge,
    pub total_area: Gauge,
    pub total_duration: Gauge,

    // ========== Consumables ==========
    pub filter_left: Gauge,
    pub main_brush_left: Gauge,
    pub sensor_dirty_left: Gauge,
    pub side_brush_left: Gauge,
}

impl RoborockMetrics {
    /// Creates and registers all gauges with the registry.
    ///
    /// Fails if any of the names is already registered.
    pub fn new(registry: &Registry) -> Result<Self> {
        let gauge = |definition: MetricDefinition| -> Result<Gauge> {
            let gauge = Gauge::new(definition.name, definition.help)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        Ok(Self {
            battery: gauge(BATTERY)?,
            clean_area: gauge(CLEAN_AREA)?,
            clean_time: gauge(CLEAN_TIME)?,
            error_code: gauge(ERROR_CODE)?,
            fanspeed: gauge(FANSPEED)?,
            in_segment_cleaning: gauge(IN_SEGMENT_CLEANING)?,
            in_zone_cleaning: gauge(IN_ZONE_CLEANING)?,
            is_on: gauge(IS_ON)?,
            is_pause: gauge(IS_PAUSE)?,
            is_water_box_attached: gauge(IS_WATER_BOX_ATTACHED)?,
            is_water_box_carriage_attached: gauge(IS_WATER_BOX_CARRIAGE_ATTACHED)?,
            water_shortage_status: gauge(WATER_SHORTAGE_STATUS)?,
            state: gauge(STATE)?,

            clean_count: gauge(CLEAN_COUNT)?,
            dust_collection_count: gauge(DUST_COLLECTION_COUNT)?,
            total_area: gauge(TOTAL_AREA)?,
            total_duration: gauge(TOTAL_DURATION)?,

            filter_left: gauge(FILTER_LEFT)?,
            main_brush_left: gauge(MAIN_BRUSH_LEFT)?,
            sensor_dirty_left: gauge(SENSOR_DIRTY_LEFT)?,
            side_brush_left: gauge(SIDE_BRUSH_LEFT)?,
        })
    }

    /// Overwrite all 21 gauges with the values of `snapshot`.
    pub fn publish(&self, snapshot: &DeviceSnapshot) {
        let status = &snapshot.status;
        self.battery.set(f64::from(status.battery));
        self.clean_area.set(status.clean_area);
        self.clean_time.set(status.clean_time.as_secs_f64());
        self.error_code.set(status.error_code as f64);
        self.fanspeed.set(status.fanspeed as f64);
        self.in_segment_cleaning.set(bool_value(status.in_segment_cleaning));
        self.in_zone_cleaning.set(bool_value(status.in_zone_cleaning));
        self.is_on.set(bool_value(status.is_on));
        self.is_pause.set(bool_value(status.is_paused));
        self.is_water_box_attached.set(bool_value(status.is_water_box_attached));
        self.is_water_box_carriage_attached
            .set(bool_value(status.is_water_box_carriage_attached));
        self.water_shortage_status.set(bool_value(status.is_water_shortage));
        self.state.set(status.state as f64);

        let history = &snapshot.history;
        self.clean_count.set(history.count as f64);
        self.dust_collection_count.set(history.dust_collection_count as f64);
        self.total_area.set(history.total_area);
        self.total_duration.set(history.total_duration.as_secs_f64());

        let consumables = &snapshot.consumables;
        self.filter_left.set(consumables.filter_left.as_secs_f64());
        self.main_brush_left.set(consumables.main_brush_left.as_secs_f64());
        self.sensor_dirty_left.set(consumables.sensor_dirty_left.as_secs_f64());
        self.side_brush_left.set(consumables.side_brush_left.as_secs_f64());
    }
}
