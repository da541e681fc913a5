//! Saving and restoring a whole session: main settings, the active simulation
//! with its constants and status, and the signal map in effect.
//!
//! Loading is all-or-nothing. Everything is restored into staged copies and
//! swapped in only once every step has succeeded.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::Utc;
use ps_config::{ReloadReport, SignalMapFile};
use ps_process::ControlMode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{SimError, SimResult};
use crate::field::{FieldMap, ImportReport};
use crate::manager::SimulationManager;

pub const STATE_VERSION: &str = "2.0";

/// Keys a state file must carry to be loadable at all.
const REQUIRED_KEYS: [&str; 2] = ["version", "main_config"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: String,
    /// RFC 3339 save time. Kept as text so older files with local ISO stamps load.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub description: String,
    pub main_config: FieldMap,
    #[serde(default)]
    pub active_simulation: Option<String>,
    #[serde(default)]
    pub simulation_config: FieldMap,
    #[serde(default)]
    pub simulation_status: FieldMap,
    #[serde(default)]
    pub io_config: Option<SignalMapFile>,
    #[serde(default)]
    pub io_config_original_path: Option<String>,
}

/// Application-level settings that travel with a state file.
pub trait MainConfig {
    fn export_fields(&self) -> SimResult<FieldMap>;
    fn import_fields(&mut self, fields: &FieldMap) -> SimResult<ImportReport>;
    fn control_mode(&self) -> ControlMode;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub version: String,
    pub active_simulation: Option<String>,
    pub main: ImportReport,
    pub config: ImportReport,
    pub status: ImportReport,
    pub io: Option<ReloadReport>,
    /// Actuators were released to the controller after restore.
    pub released_actuators: bool,
}

/// Short description of a state file, for listing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSummary {
    pub version: String,
    pub timestamp: String,
    pub description: String,
    pub active_simulation: Option<String>,
    pub has_io_config: bool,
}

impl fmt::Display for StateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Valid state file (v{})", self.version)?;
        writeln!(f, "Timestamp: {}", or_unknown(&self.timestamp))?;
        if !self.description.is_empty() {
            writeln!(f, "Description: {}", self.description)?;
        }
        writeln!(
            f,
            "Simulation: {}",
            self.active_simulation.as_deref().unwrap_or("None")
        )?;
        write!(f, "IO config: {}", if self.has_io_config { "yes" } else { "no" })
    }
}

fn or_unknown(text: &str) -> &str {
    if text.is_empty() { "unknown" } else { text }
}

impl StateDocument {
    /// Snapshot the current session.
    pub fn capture(
        main: &impl MainConfig,
        sims: &SimulationManager,
        description: &str,
        io_config_path: Option<&Path>,
    ) -> SimResult<Self> {
        let mut doc = StateDocument {
            version: STATE_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            description: description.to_string(),
            main_config: main.export_fields()?,
            active_simulation: None,
            simulation_config: FieldMap::new(),
            simulation_status: FieldMap::new(),
            io_config: None,
            io_config_original_path: io_config_path.map(|p| p.display().to_string()),
        };
        if let Some(sim) = sims.active() {
            doc.active_simulation = Some(sim.kind().to_string());
            doc.simulation_config = sim.export_config()?;
            doc.simulation_status = sim.export_status()?;
            doc.io_config = Some(sim.address_map().to_file());
        }
        Ok(doc)
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            version: self.version.clone(),
            timestamp: self.timestamp.clone(),
            description: self.description.clone(),
            active_simulation: self.active_simulation.clone(),
            has_io_config: self.io_config.is_some(),
        }
    }
}

/// Parse a state file, requiring the top-level keys before anything else.
pub fn read_state(path: &Path) -> SimResult<StateDocument> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let Value::Object(object) = &value else {
        return Err(SimError::InvalidState("top level is not an object".into()));
    };
    if let Some(missing) = REQUIRED_KEYS.iter().find(|k| !object.contains_key(**k)) {
        return Err(SimError::MissingKey(*missing));
    }
    let doc: StateDocument = serde_json::from_value(value)?;
    if doc.version != STATE_VERSION {
        warn!(version = %doc.version, expected = STATE_VERSION, "state file version differs");
    }
    Ok(doc)
}

pub fn write_state(path: &Path, doc: &StateDocument) -> SimResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(path, json)?;
    Ok(())
}

/// Capture and write the session to `path`.
pub fn save_state(
    path: &Path,
    main: &impl MainConfig,
    sims: &SimulationManager,
    description: &str,
    io_config_path: Option<&Path>,
) -> SimResult<StateDocument> {
    let doc = StateDocument::capture(main, sims, description, io_config_path)?;
    write_state(path, &doc)?;
    info!(
        path = %path.display(),
        simulation = doc.active_simulation.as_deref().unwrap_or("none"),
        config = doc.simulation_config.len(),
        status = doc.simulation_status.len(),
        "state saved"
    );
    Ok(doc)
}

/// Restore a session from `path`.
///
/// On error `main` and `sims` are left exactly as they were.
pub fn load_state<M>(path: &Path, main: &mut M, sims: &mut SimulationManager) -> SimResult<LoadReport>
where
    M: MainConfig + Clone,
{
    let doc = read_state(path)?;

    if let Some(kind) = &doc.active_simulation
        && !sims.is_registered(kind)
    {
        warn!(%kind, "state file names an unregistered simulation");
        return Err(SimError::UnknownSimulation(kind.clone()));
    }

    let mut staged_main = main.clone();
    let mut report = LoadReport {
        version: doc.version.clone(),
        active_simulation: doc.active_simulation.clone(),
        main: staged_main.import_fields(&doc.main_config)?,
        ..LoadReport::default()
    };

    let staged_sim = match &doc.active_simulation {
        Some(kind) => {
            let mut sim = sims.instantiate(kind, &format!("{kind}_loaded"))?;
            report.config = sim.import_config(&doc.simulation_config)?;
            report.status = sim.import_status(&doc.simulation_status)?;
            if let Some(io) = &doc.io_config {
                let (map, io_report) = sim.address_map().reloaded(io);
                sim.set_address_map(map);
                report.io = Some(io_report);
            }
            if staged_main.control_mode() == ControlMode::Plc {
                let status = sim.status_mut();
                status.valve_in_fraction = 0.0;
                status.valve_out_fraction = 0.0;
                status.heater_fraction = 0.0;
                status.force_auto();
                report.released_actuators = true;
            }
            Some(sim)
        }
        None => None,
    };

    if let Some(sim) = staged_sim {
        sims.activate_instance(sim);
    } else if let (Some(io), Some(active)) = (&doc.io_config, sims.active_mut()) {
        let (map, io_report) = active.address_map().reloaded(io);
        active.set_address_map(map);
        report.io = Some(io_report);
    }
    *main = staged_main;

    info!(
        path = %path.display(),
        version = %report.version,
        simulation = report.active_simulation.as_deref().unwrap_or("none"),
        main = report.main.applied.len(),
        config = report.config.applied.len(),
        status = report.status.applied.len(),
        "state loaded"
    );
    Ok(report)
}

/// Check that `path` is a loadable state file and summarize it.
pub fn validate_state_file(path: &Path) -> SimResult<StateSummary> {
    read_state(path).map(|doc| doc.summary())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ps_sim_state_{}_{name}.json", std::process::id()))
    }

    #[test]
    fn missing_required_key_is_reported() {
        let path = temp_path("missing_key");
        fs::write(&path, r#"{"version": "2.0", "active_simulation": null}"#).unwrap();
        assert!(matches!(read_state(&path), Err(SimError::MissingKey("main_config"))));

        fs::write(&path, r#"{"main_config": {}}"#).unwrap();
        assert!(matches!(read_state(&path), Err(SimError::MissingKey("version"))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn non_object_is_invalid() {
        let path = temp_path("array");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(read_state(&path), Err(SimError::InvalidState(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn minimal_document_uses_defaults() {
        let path = temp_path("minimal");
        fs::write(&path, r#"{"version": "1.0", "main_config": {"plc_gui_control": "gui"}}"#).unwrap();
        let doc = read_state(&path).unwrap();
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.active_simulation, None);
        assert!(doc.simulation_status.is_empty());

        let summary = validate_state_file(&path).unwrap();
        let text = summary.to_string();
        assert!(text.contains("Valid state file (v1.0)"));
        assert!(text.contains("Timestamp: unknown"));
        assert!(text.contains("Simulation: None"));
        assert!(text.ends_with("IO config: no"));
        let _ = fs::remove_file(&path);
    }
}
