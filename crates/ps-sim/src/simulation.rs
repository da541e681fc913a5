//! The interface every simulation kind exposes to the manager.

use ps_config::AddressMap;
use ps_process::{ProcessStatus, TankParams, TickOutcome};

use crate::error::SimResult;
use crate::field::{FieldMap, FieldValue, ImportReport};

/// Borrowed view handed to the sync engine each cycle.
pub struct SimParts<'a> {
    pub map: &'a AddressMap,
    pub params: &'a TankParams,
    pub status: &'a mut ProcessStatus,
}

/// A running process instance: its status, its constants and the signal map
/// it is wired with.
pub trait Simulation: Send {
    /// Registered kind this instance was built from.
    fn kind(&self) -> &str;
    /// Instance name given at load time.
    fn name(&self) -> &str;

    fn start(&mut self);
    fn stop(&mut self);
    /// Back to initial status with history dropped; stays stopped.
    fn reset(&mut self);
    fn is_running(&self) -> bool;

    /// Advance by `dt` seconds.
    fn update(&mut self, dt: f64) -> TickOutcome;

    fn status(&self) -> &ProcessStatus;
    fn status_mut(&mut self) -> &mut ProcessStatus;
    fn set_status(&mut self, status: ProcessStatus);
    fn params(&self) -> &TankParams;
    fn address_map(&self) -> &AddressMap;
    fn set_address_map(&mut self, map: AddressMap);
    fn parts_mut(&mut self) -> SimParts<'_>;

    fn export_status(&self) -> SimResult<FieldMap>;
    fn import_status(&mut self, fields: &FieldMap) -> SimResult<ImportReport>;
    fn export_config(&self) -> SimResult<FieldMap>;
    fn import_config(&mut self, fields: &FieldMap) -> SimResult<ImportReport>;

    /// Write one status field by name (operator input).
    fn set_input(&mut self, key: &str, value: &FieldValue) -> SimResult<()>;
    /// Read any status field by name.
    fn get_output(&self, key: &str) -> Option<FieldValue>;
}
