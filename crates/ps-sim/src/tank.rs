//! Heated tank simulation.

use ps_config::AddressMap;
use ps_process::{ProcessModel, ProcessStatus, TankModel, TankParams, TickOutcome};
use tracing::{debug, info, warn};

use crate::error::SimResult;
use crate::field::{self, FieldMap, FieldValue, ImportReport};
use crate::simulation::{SimParts, Simulation};

/// Registered kind name; also what state files record.
pub const TANK_KIND: &str = "PIDtankValve";

#[derive(Debug, Clone)]
pub struct TankSimulation {
    name: String,
    params: TankParams,
    status: ProcessStatus,
    model: TankModel,
    map: AddressMap,
}

impl TankSimulation {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_params(name, TankParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: TankParams) -> Self {
        Self {
            name: name.into(),
            model: TankModel::new(&params),
            params,
            status: ProcessStatus::default(),
            map: AddressMap::with_defaults(),
        }
    }

    pub fn params_mut(&mut self) -> &mut TankParams {
        &mut self.params
    }
}

impl Simulation for TankSimulation {
    fn kind(&self) -> &str {
        TANK_KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) {
        self.status.sim_running = true;
    }

    fn stop(&mut self) {
        self.status.sim_running = false;
    }

    fn reset(&mut self) {
        self.status = ProcessStatus::default();
        self.model.reset();
        debug!(name = %self.name, "tank reset");
    }

    fn is_running(&self) -> bool {
        self.status.sim_running
    }

    fn update(&mut self, dt: f64) -> TickOutcome {
        self.model.tick(&self.params, &mut self.status, dt)
    }

    fn status(&self) -> &ProcessStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut ProcessStatus {
        &mut self.status
    }

    fn set_status(&mut self, status: ProcessStatus) {
        self.status = status;
    }

    fn params(&self) -> &TankParams {
        &self.params
    }

    fn address_map(&self) -> &AddressMap {
        &self.map
    }

    fn set_address_map(&mut self, map: AddressMap) {
        info!(name = %self.name, enabled = map.enabled_signals().count(), "signal map replaced");
        self.map = map;
    }

    fn parts_mut(&mut self) -> SimParts<'_> {
        SimParts {
            map: &self.map,
            params: &self.params,
            status: &mut self.status,
        }
    }

    fn export_status(&self) -> SimResult<FieldMap> {
        field::export_fields(&self.status, ProcessStatus::PERSISTED_FIELDS)
    }

    fn import_status(&mut self, fields: &FieldMap) -> SimResult<ImportReport> {
        field::import_fields(&mut self.status, ProcessStatus::PERSISTED_FIELDS, fields)
    }

    fn export_config(&self) -> SimResult<FieldMap> {
        field::export_fields(&self.params, TankParams::PERSISTED_FIELDS)
    }

    fn import_config(&mut self, fields: &FieldMap) -> SimResult<ImportReport> {
        let report = field::import_fields(&mut self.params, TankParams::PERSISTED_FIELDS, fields)?;
        if let Err(e) = self.params.validate() {
            warn!(name = %self.name, error = %e, "tank parameters out of range, model will clamp");
        }
        // Delay depth follows the new constants on the next tick.
        self.model.reset();
        Ok(report)
    }

    fn set_input(&mut self, key: &str, value: &FieldValue) -> SimResult<()> {
        field::set_field(&mut self.status, key, value)
    }

    fn get_output(&self, key: &str) -> Option<FieldValue> {
        field::all_fields(&self.status).ok()?.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_reset() {
        let mut sim = TankSimulation::new("tank");
        assert!(!sim.is_running());
        sim.start();
        assert!(sim.is_running());

        sim.status_mut().valve_in_fraction = 1.0;
        assert_eq!(sim.update(1.0), TickOutcome::Started);
        assert_eq!(sim.update(2.0), TickOutcome::Advanced);
        assert_eq!(sim.status().volume, 110.0);

        sim.stop();
        assert_eq!(sim.update(2.0), TickOutcome::Stopped);
        assert_eq!(sim.status().volume, 110.0);

        sim.reset();
        assert_eq!(sim.status(), &ProcessStatus::default());
    }

    #[test]
    fn inputs_and_outputs_by_name() {
        let mut sim = TankSimulation::new("tank");
        sim.set_input("heater_fraction", &FieldValue::Float(0.25))
            .unwrap();
        sim.set_input("start_cmd", &FieldValue::Int(1)).unwrap();
        assert_eq!(sim.status().heater_fraction, 0.25);
        assert!(sim.status().start_cmd);

        assert_eq!(sim.get_output("volume"), Some(FieldValue::Float(100.0)));
        assert_eq!(sim.get_output("level_low"), Some(FieldValue::Bool(false)));
        assert_eq!(sim.get_output("pressure"), None);
        assert!(sim.set_input("pressure", &FieldValue::Float(1.0)).is_err());
    }

    #[test]
    fn config_import_changes_physics() {
        let mut sim = TankSimulation::new("tank");
        let mut fields = FieldMap::new();
        fields.insert("valve_in_max_flow".into(), FieldValue::Int(10));
        sim.import_config(&fields).unwrap();
        assert_eq!(sim.params().valve_in_max_flow, 10.0);

        sim.start();
        sim.status_mut().valve_in_fraction = 1.0;
        sim.update(1.0);
        sim.update(1.0);
        assert_eq!(sim.status().volume, 110.0);
    }
}
