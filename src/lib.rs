//! # Roborock Exporter
//!
//! Polls a Roborock vacuum over its local miIO protocol and republishes its
//! status, cleaning history and consumable wear as Prometheus gauges.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roborock_exporter::{
//!     web, ExporterConfig, Poller, RoborockMetrics, RoborockVacuum, WebConfig,
//! };
//! use prometheus::Registry;
//! use std::net::SocketAddr;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExporterConfig::new(
//!         Some("192.168.1.30"),
//!         Some("476e6b70343055483230644c53707a12"),
//!         30,
//!         5,
//!         WebConfig::default(),
//!     )?;
//!
//!     let registry = Registry::new();
//!     let metrics = RoborockMetrics::new(&registry)?;
//!     let cancel = CancellationToken::new();
//!
//!     let listener = web::bind(&config.web).await?;
//!     tokio::spawn(web::serve(listener, registry, cancel.clone()));
//!
//!     let addr = SocketAddr::new(config.ip_address, roborock_exporter::device::miio::MIIO_PORT);
//!     let vacuum = RoborockVacuum::new(addr, &config.token, config.device_timeout);
//!     Poller::new(vacuum, metrics, config.polling_interval).run(cancel).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod web;

// Re-export public API
pub use config::{ExporterConfig, Token};
pub use device::{
    data::{CleaningSummary, ConsumableStatus, DeviceInfo, DeviceSnapshot, VacuumStatus},
    traits::VacuumClient,
    vacuum::RoborockVacuum,
};
pub use error::{ExporterError, Result};
pub use metrics::{Poller, RoborockMetrics};
pub use web::WebConfig;

/// The default polling interval in seconds
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 30;

/// The default metrics endpoint port
pub const DEFAULT_EXPORTER_PORT: u16 = 9877;

/// The default per-request device timeout in seconds
pub const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 5;
