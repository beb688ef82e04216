//! Traits for talking to a vacuum.

use crate::device::data::{CleaningSummary, ConsumableStatus, VacuumStatus};
use crate::error::Result;

/// Query interface of a vacuum on the local network.
///
/// Each call is a single request/response exchange and may fail with a
/// transport or protocol error. Implementations keep whatever session state
/// they need, hence `&mut self`.
pub trait VacuumClient {
    /// Fetch the current status.
    fn status(&mut self) -> impl std::future::Future<Output = Result<VacuumStatus>> + Send;

    /// Fetch the lifetime cleaning counters.
    fn clean_history(
        &mut self,
    ) -> impl std::future::Future<Output = Result<CleaningSummary>> + Send;

    /// Fetch the remaining lifetime of the consumables.
    fn consumable_status(
        &mut self,
    ) -> impl std::future::Future<Output = Result<ConsumableStatus>> + Send;
}
