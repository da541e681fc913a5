//! Registry of simulation kinds and owner of the active instance.

use std::collections::BTreeMap;
use std::fmt;

use ps_process::{ProcessStatus, TickOutcome};
use tracing::{info, warn};

use crate::error::{SimError, SimResult};
use crate::field::{FieldMap, FieldValue, ImportReport};
use crate::simulation::Simulation;
use crate::tank::{TANK_KIND, TankSimulation};

/// Builds an instance from its instance name.
pub type SimulationFactory = Box<dyn Fn(&str) -> SimResult<Box<dyn Simulation>> + Send>;

pub struct SimulationManager {
    factories: BTreeMap<String, SimulationFactory>,
    active: Option<Box<dyn Simulation>>,
}

impl fmt::Debug for SimulationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationManager")
            .field("registered", &self.registered())
            .field("active", &self.active_name())
            .finish()
    }
}

impl Default for SimulationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationManager {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            active: None,
        }
    }

    /// Manager with the built-in tank kind registered.
    pub fn with_builtin() -> Self {
        let mut manager = Self::new();
        manager.register(
            TANK_KIND,
            Box::new(|name| Ok(Box::new(TankSimulation::new(name)) as Box<dyn Simulation>)),
        );
        manager
    }

    /// Register a kind. Registering a name again replaces its factory.
    pub fn register(&mut self, kind: impl Into<String>, factory: SimulationFactory) {
        let kind = kind.into();
        if self.factories.insert(kind.clone(), factory).is_none() {
            info!(%kind, "simulation registered");
        }
    }

    pub fn registered(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build an instance without touching the active one.
    pub fn instantiate(&self, kind: &str, name: &str) -> SimResult<Box<dyn Simulation>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| SimError::UnknownSimulation(kind.to_string()))?;
        factory(name)
    }

    /// Stop and drop the current instance, then build and activate a new one.
    ///
    /// A failed build leaves nothing active.
    pub fn load(&mut self, kind: &str, name: &str) -> SimResult<()> {
        if !self.is_registered(kind) {
            warn!(%kind, "cannot load unregistered simulation");
            return Err(SimError::UnknownSimulation(kind.to_string()));
        }
        if let Some(mut current) = self.active.take() {
            current.stop();
        }
        match self.instantiate(kind, name) {
            Ok(sim) => {
                info!(%kind, %name, "simulation loaded");
                self.active = Some(sim);
                Ok(())
            }
            Err(e) => {
                warn!(%kind, error = %e, "simulation failed to load");
                Err(e)
            }
        }
    }

    /// Swap in an already built instance (e.g. restored from a state file).
    pub fn activate_instance(&mut self, sim: Box<dyn Simulation>) {
        if let Some(mut current) = self.active.take() {
            current.stop();
        }
        info!(kind = sim.kind(), name = sim.name(), "simulation activated");
        self.active = Some(sim);
    }

    pub fn unload(&mut self) {
        if let Some(mut current) = self.active.take() {
            current.stop();
            info!(kind = current.kind(), "simulation unloaded");
        }
    }

    /// Kind of the active instance.
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(|sim| sim.kind())
    }

    pub fn active(&self) -> Option<&dyn Simulation> {
        self.active.as_deref()
    }

    pub fn active_mut(&mut self) -> Option<&mut dyn Simulation> {
        match self.active.as_mut() {
            Some(sim) => Some(sim.as_mut()),
            None => None,
        }
    }

    fn require(&mut self, action: &str) -> SimResult<&mut dyn Simulation> {
        match self.active.as_mut() {
            Some(sim) => Ok(sim.as_mut()),
            None => {
                warn!(action, "no active simulation");
                Err(SimError::NoActiveSimulation)
            }
        }
    }

    fn require_ref(&self) -> SimResult<&dyn Simulation> {
        self.active.as_deref().ok_or(SimError::NoActiveSimulation)
    }

    pub fn start(&mut self) -> SimResult<()> {
        let sim = self.require("start")?;
        sim.start();
        info!(kind = sim.kind(), "simulation started");
        Ok(())
    }

    pub fn stop(&mut self) -> SimResult<()> {
        let sim = self.require("stop")?;
        sim.stop();
        info!(kind = sim.kind(), "simulation stopped");
        Ok(())
    }

    pub fn reset(&mut self) -> SimResult<()> {
        let sim = self.require("reset")?;
        sim.reset();
        info!(kind = sim.kind(), "simulation reset");
        Ok(())
    }

    /// Optionally replace the status, then advance by `dt`.
    pub fn update(&mut self, dt: f64, external: Option<ProcessStatus>) -> SimResult<TickOutcome> {
        let sim = self.require("update")?;
        if let Some(status) = external {
            sim.set_status(status);
        }
        Ok(sim.update(dt))
    }

    pub fn status(&self) -> SimResult<FieldMap> {
        self.require_ref()?.export_status()
    }

    pub fn set_status(&mut self, fields: &FieldMap) -> SimResult<ImportReport> {
        self.require("set_status")?.import_status(fields)
    }

    pub fn config(&self) -> SimResult<FieldMap> {
        self.require_ref()?.export_config()
    }

    pub fn set_config(&mut self, fields: &FieldMap) -> SimResult<ImportReport> {
        self.require("set_config")?.import_config(fields)
    }

    pub fn set_input(&mut self, key: &str, value: &FieldValue) -> SimResult<()> {
        self.require("set_input")?.set_input(key, value)
    }

    pub fn get_output(&self, key: &str) -> Option<FieldValue> {
        self.active.as_deref()?.get_output(key)
    }
}
