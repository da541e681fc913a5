//! On-disk signal map format.
//!
//! ```json
//! {"signals": [
//!   {"name": "Sim_InletValveOnOff", "type": "bool", "byte": 0, "bit": 0},
//!   {"name": "Sim_WaterLevelMeasurement", "type": "int", "byte": "2", "bit": ""}
//! ]}
//! ```
//!
//! Byte and bit are accepted as numbers or numeric strings; an empty or
//! missing bit marks a word signal. A legacy `address` string (`I0.1`,
//! `QW2`) is accepted in place of byte/bit.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalMapFile {
    pub signals: Vec<SignalEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
    #[serde(default, skip_serializing_if = "NumberField::is_empty")]
    pub byte: NumberField,
    #[serde(default, skip_serializing_if = "NumberField::is_empty")]
    pub bit: NumberField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A number that may arrive as a JSON number, a numeric string, or nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberField {
    #[default]
    Empty,
    Number(i64),
    Text(String),
}

impl NumberField {
    pub fn is_empty(&self) -> bool {
        match self {
            NumberField::Empty => true,
            NumberField::Text(s) => s.trim().is_empty(),
            NumberField::Number(_) => false,
        }
    }

    /// `Ok(None)` for an empty field, `Err` with the offending text otherwise.
    pub fn parse(&self) -> Result<Option<i64>, String> {
        match self {
            NumberField::Empty => Ok(None),
            NumberField::Number(n) => Ok(Some(*n)),
            NumberField::Text(s) if s.trim().is_empty() => Ok(None),
            NumberField::Text(s) => s.trim().parse().map(Some).map_err(|_| s.clone()),
        }
    }
}

impl From<i64> for NumberField {
    fn from(n: i64) -> Self {
        NumberField::Number(n)
    }
}
