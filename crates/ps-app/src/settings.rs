//! Main application settings: who drives the actuators, how to reach the
//! controller and how fast to cycle.

use std::path::{Path, PathBuf};

use ps_process::ControlMode;
use ps_protocol::{ConnectionSettings, ProtocolKind};
use ps_sim::{FieldMap, FieldValue, ImportReport, MainConfig, SimResult, TANK_KIND, field};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Connection keys that travel with a saved session.
const CONNECTION_FIELDS: &[&str] = &[
    "protocol",
    "ip",
    "port",
    "rack",
    "slot",
    "tsap_local",
    "tsap_remote",
    "network_adapter",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainSettings {
    pub control_mode: ControlMode,
    pub connection: ConnectionSettings,
    /// Wall-clock pacing of the cycle loop.
    pub cycle_interval_ms: u64,
    /// Simulation kind loaded at startup.
    pub simulation: String,
    /// Signal map applied at startup, if any.
    pub io_config_path: Option<PathBuf>,
}

impl Default for MainSettings {
    fn default() -> Self {
        Self {
            control_mode: ControlMode::Plc,
            connection: ConnectionSettings::default(),
            cycle_interval_ms: 100,
            simulation: TANK_KIND.to_string(),
            io_config_path: None,
        }
    }
}

impl MainSettings {
    /// Load from YAML or JSON, chosen by extension.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::SettingsFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: MainSettings = match extension(path).as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| AppError::Settings(format!("Failed to parse settings YAML: {e}")))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| AppError::Settings(format!("Failed to parse settings JSON: {e}")))?,
            _ => {
                return Err(AppError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let content = match extension(path).as_deref() {
            Some("yaml" | "yml") => serde_yaml::to_string(self)
                .map_err(|e| AppError::Settings(format!("Failed to serialize settings: {e}")))?,
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| AppError::Settings(format!("Failed to serialize settings: {e}")))?,
            _ => {
                return Err(AppError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        std::fs::write(path, content).map_err(|e| AppError::SettingsFileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.cycle_interval_ms == 0 {
            return Err(AppError::Settings(
                "cycle_interval_ms must be positive".to_string(),
            ));
        }
        if self.connection.ip.trim().is_empty() {
            return Err(AppError::Settings("controller IP is empty".to_string()));
        }
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl MainConfig for MainSettings {
    fn export_fields(&self) -> SimResult<FieldMap> {
        let mut fields = field::export_fields(&self.connection, CONNECTION_FIELDS)?;
        fields.insert(
            "control_mode".to_string(),
            FieldValue::Text(self.control_mode.as_str().to_string()),
        );
        Ok(fields)
    }

    /// Mode and protocol names are checked here so a bad name is skipped
    /// instead of failing the whole record.
    fn import_fields(&mut self, fields: &FieldMap) -> SimResult<ImportReport> {
        let mut report = ImportReport::default();
        let mut connection = FieldMap::new();

        for (key, value) in fields {
            match key.as_str() {
                "control_mode" => match ControlMode::parse(&value.to_string()) {
                    Some(mode) => {
                        self.control_mode = mode;
                        report.applied.push(key.clone());
                    }
                    None => report.rejected.push(key.clone()),
                },
                "protocol" => match ProtocolKind::parse(&value.to_string()) {
                    Some(kind) => {
                        connection.insert(key.clone(), FieldValue::Text(kind.as_str().to_string()));
                    }
                    None => report.rejected.push(key.clone()),
                },
                _ => {
                    connection.insert(key.clone(), value.clone());
                }
            }
        }

        let inner = field::import_fields(&mut self.connection, CONNECTION_FIELDS, &connection)?;
        report.applied.extend(inner.applied);
        report.ignored.extend(inner.ignored);
        report.rejected.extend(inner.rejected);
        Ok(report)
    }

    fn control_mode(&self) -> ControlMode {
        self.control_mode
    }
}
