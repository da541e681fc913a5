//! Flat key/value views of status and config records.
//!
//! Persistence and generic front ends work on [`FieldMap`]s without knowing
//! the concrete simulation. Imports coerce each incoming value to the type
//! the target field already has, and only touch whitelisted keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

pub type FieldMap = BTreeMap<String, FieldValue>;

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl FieldValue {
    fn from_json(value: &Value) -> Option<FieldValue> {
        match value {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) if n.is_i64() => n.as_i64().map(FieldValue::Int),
            Value::Number(n) if n.is_u64() => n.as_u64().map(|u| FieldValue::Int(u as i64)),
            Value::Number(n) => n.as_f64().map(FieldValue::Float),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            _ => None,
        }
    }

    fn to_json(&self) -> Option<Value> {
        Some(match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number((*i).into()),
            FieldValue::Float(x) => Value::Number(Number::from_f64(*x)?),
            FieldValue::Text(s) => Value::String(s.clone()),
        })
    }

    /// Convert to the same variant as `like`.
    ///
    /// Floats going into integer fields truncate toward zero; text is parsed.
    pub fn coerce_like(&self, like: &FieldValue) -> Result<FieldValue, String> {
        match like {
            FieldValue::Bool(_) => self.to_bool().map(FieldValue::Bool),
            FieldValue::Int(_) => self.to_int().map(FieldValue::Int),
            FieldValue::Float(_) => self.to_float().map(FieldValue::Float),
            FieldValue::Text(_) => Ok(FieldValue::Text(self.to_string())),
        }
    }

    fn to_bool(&self) -> Result<bool, String> {
        match self {
            FieldValue::Bool(b) => Ok(*b),
            FieldValue::Int(i) => Ok(*i != 0),
            FieldValue::Float(x) => Ok(*x != 0.0),
            FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" | "" => Ok(false),
                other => Err(format!("'{other}' is not a boolean")),
            },
        }
    }

    fn to_int(&self) -> Result<i64, String> {
        match self {
            FieldValue::Bool(b) => Ok(*b as i64),
            FieldValue::Int(i) => Ok(*i),
            FieldValue::Float(x) if x.is_finite() => Ok(x.trunc() as i64),
            FieldValue::Float(x) => Err(format!("{x} is not finite")),
            FieldValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .or_else(|_| {
                        s.parse::<f64>()
                            .ok()
                            .filter(|x| x.is_finite())
                            .map(|x| x.trunc() as i64)
                            .ok_or(())
                    })
                    .map_err(|()| format!("'{s}' is not an integer"))
            }
        }
    }

    fn to_float(&self) -> Result<f64, String> {
        let x = match self {
            FieldValue::Bool(b) => *b as i64 as f64,
            FieldValue::Int(i) => *i as f64,
            FieldValue::Float(x) => *x,
            FieldValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{s}' is not a number"))?,
        };
        if x.is_finite() {
            Ok(x)
        } else {
            Err(format!("{x} is not finite"))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub applied: Vec<String>,
    /// Keys present in the input but not importable.
    pub ignored: Vec<String>,
    /// Importable keys whose value could not be converted.
    pub rejected: Vec<String>,
}

fn as_object<T: Serialize>(record: &T) -> SimResult<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(SimError::InvalidState(format!(
            "expected a record, got {other}"
        ))),
    }
}

/// Every scalar field of `record`.
pub fn all_fields<T: Serialize>(record: &T) -> SimResult<FieldMap> {
    Ok(as_object(record)?
        .iter()
        .filter_map(|(k, v)| FieldValue::from_json(v).map(|fv| (k.clone(), fv)))
        .collect())
}

/// The whitelisted fields of `record`.
pub fn export_fields<T: Serialize>(record: &T, whitelist: &[&str]) -> SimResult<FieldMap> {
    let mut fields = all_fields(record)?;
    fields.retain(|k, _| whitelist.contains(&k.as_str()));
    Ok(fields)
}

/// Apply whitelisted entries of `fields` to `record`, coercing each value to
/// the field's current type. Other keys and unconvertible values are skipped.
pub fn import_fields<T>(record: &mut T, whitelist: &[&str], fields: &FieldMap) -> SimResult<ImportReport>
where
    T: Serialize + DeserializeOwned,
{
    let mut object = as_object(record)?;
    let mut report = ImportReport::default();

    for (key, incoming) in fields {
        let current = object.get(key).and_then(FieldValue::from_json);
        let (true, Some(current)) = (whitelist.contains(&key.as_str()), current) else {
            debug!(field = %key, "field not importable, skipped");
            report.ignored.push(key.clone());
            continue;
        };
        match incoming.coerce_like(&current).map(|v| v.to_json()) {
            Ok(Some(json)) => {
                object.insert(key.clone(), json);
                report.applied.push(key.clone());
            }
            Ok(None) => {
                warn!(field = %key, value = %incoming, "value not representable, skipped");
                report.rejected.push(key.clone());
            }
            Err(reason) => {
                warn!(field = %key, %reason, "cannot convert field, skipped");
                report.rejected.push(key.clone());
            }
        }
    }

    *record = serde_json::from_value(Value::Object(object))?;
    Ok(report)
}

/// Set one field regardless of whitelist, failing if it does not exist or
/// cannot be converted.
pub fn set_field<T>(record: &mut T, key: &str, value: &FieldValue) -> SimResult<()>
where
    T: Serialize + DeserializeOwned,
{
    let mut object = as_object(record)?;
    let current = object
        .get(key)
        .and_then(FieldValue::from_json)
        .ok_or_else(|| SimError::UnknownField(key.to_string()))?;
    let json = value
        .coerce_like(&current)
        .and_then(|v| v.to_json().ok_or_else(|| "not representable".to_string()))
        .map_err(|reason| SimError::InvalidValue {
            field: key.to_string(),
            reason,
        })?;
    object.insert(key.to_string(), json);
    *record = serde_json::from_value(Value::Object(object))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_process::{ProcessStatus, TankParams};

    #[test]
    fn coercion_follows_existing_type() {
        let b = FieldValue::Bool(false);
        let i = FieldValue::Int(0);
        let f = FieldValue::Float(0.0);
        let t = FieldValue::Text(String::new());

        assert_eq!(FieldValue::from("yes").coerce_like(&b), Ok(FieldValue::Bool(true)));
        assert_eq!(FieldValue::Float(3.9).coerce_like(&i), Ok(FieldValue::Int(3)));
        assert_eq!(FieldValue::from("-7.5").coerce_like(&i), Ok(FieldValue::Int(-7)));
        assert_eq!(FieldValue::Int(4).coerce_like(&f), Ok(FieldValue::Float(4.0)));
        assert_eq!(FieldValue::Bool(true).coerce_like(&t), Ok(FieldValue::from("true")));
        assert!(FieldValue::from("warm").coerce_like(&f).is_err());
        assert!(FieldValue::Float(f64::NAN).coerce_like(&f).is_err());
    }

    #[test]
    fn floats_stay_floats_in_export() {
        let fields = all_fields(&TankParams::default()).unwrap();
        assert_eq!(fields.get("tank_volume"), Some(&FieldValue::Float(200.0)));
    }

    #[test]
    fn export_respects_whitelist() {
        let status = ProcessStatus::default();
        let fields = export_fields(&status, &["volume", "auto_mode"]).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("auto_mode"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn import_coerces_and_skips() {
        let mut status = ProcessStatus::default();
        let mut fields = FieldMap::new();
        fields.insert("volume".into(), FieldValue::Int(150));
        fields.insert("control1".into(), FieldValue::from("12"));
        fields.insert("manual_mode".into(), FieldValue::Int(1));
        fields.insert("level_high".into(), FieldValue::Bool(true));
        fields.insert("temperature".into(), FieldValue::from("hot"));
        fields.insert("nonsense".into(), FieldValue::Int(1));

        let report = import_fields(
            &mut status,
            &["volume", "control1", "manual_mode", "temperature"],
            &fields,
        )
        .unwrap();

        assert_eq!(status.volume, 150.0);
        assert_eq!(status.control1, 12);
        assert!(status.manual_mode);
        assert!(!status.level_high);
        assert_eq!(status.temperature, 21.0);
        assert_eq!(report.applied, vec!["control1", "manual_mode", "volume"]);
        assert_eq!(report.ignored, vec!["level_high", "nonsense"]);
        assert_eq!(report.rejected, vec!["temperature"]);
    }

    #[test]
    fn set_field_rejects_unknown_key() {
        let mut status = ProcessStatus::default();
        set_field(&mut status, "heater_fraction", &FieldValue::Float(0.5)).unwrap();
        assert_eq!(status.heater_fraction, 0.5);
        assert!(matches!(
            set_field(&mut status, "flux", &FieldValue::Int(1)),
            Err(SimError::UnknownField(_))
        ));
    }
}
