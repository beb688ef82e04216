//! Access to the vacuum over its local network protocol.
//!
//! [`VacuumClient`] is the seam the poll loop depends on; [`RoborockVacuum`]
//! implements it on top of the miIO transport in [`miio`].

pub mod data;
pub mod miio;
pub mod traits;
pub mod vacuum;

// Re-export commonly used items
pub use data::{CleaningSummary, ConsumableStatus, DeviceInfo, DeviceSnapshot, VacuumStatus};
pub use traits::VacuumClient;
pub use vacuum::RoborockVacuum;
