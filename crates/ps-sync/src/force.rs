//! Operator force overrides.
//!
//! A forced value replaces what the engine would otherwise perceive for a
//! signal: the controller's output for actuator signals, the physical value
//! for sensor and command signals. Forces are never persisted.

use std::collections::BTreeMap;

use ps_config::Signal;
use ps_core::ANALOG_SPAN;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForcedValue {
    Bool(bool),
    /// Raw analog word, `0..=27648` nominal.
    Word(i32),
}

impl ForcedValue {
    pub fn as_bool(self) -> bool {
        match self {
            ForcedValue::Bool(b) => b,
            ForcedValue::Word(w) => w != 0,
        }
    }

    /// A forced `true` on an analog signal reads as full scale.
    pub fn as_word(self) -> i32 {
        match self {
            ForcedValue::Bool(true) => ANALOG_SPAN,
            ForcedValue::Bool(false) => 0,
            ForcedValue::Word(w) => w,
        }
    }
}

impl From<bool> for ForcedValue {
    fn from(b: bool) -> Self {
        ForcedValue::Bool(b)
    }
}

impl From<i32> for ForcedValue {
    fn from(w: i32) -> Self {
        ForcedValue::Word(w)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForcedValues {
    values: BTreeMap<Signal, ForcedValue>,
}

impl ForcedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, signal: Signal, value: impl Into<ForcedValue>) {
        self.values.insert(signal, value.into());
    }

    /// Force by attribute key, file name or alias. False if the name is unknown.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<ForcedValue>) -> bool {
        match Signal::from_name(name) {
            Some(signal) => {
                self.set(signal, value);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, signal: Signal) -> Option<ForcedValue> {
        self.values.remove(&signal)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn get(&self, signal: Signal) -> Option<ForcedValue> {
        self.values.get(&signal).copied()
    }

    pub fn is_forced(&self, signal: Signal) -> bool {
        self.values.contains_key(&signal)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Signal, ForcedValue)> + '_ {
        self.values.iter().map(|(s, v)| (*s, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_between_shapes() {
        assert!(ForcedValue::Word(5).as_bool());
        assert!(!ForcedValue::Word(0).as_bool());
        assert_eq!(ForcedValue::Bool(true).as_word(), ANALOG_SPAN);
        assert_eq!(ForcedValue::Word(1234).as_word(), 1234);
    }

    #[test]
    fn set_by_any_name() {
        let mut forced = ForcedValues::new();
        assert!(forced.set_by_name("DQValveIn", true));
        assert!(forced.set_by_name("Sim_WaterLevelMeasurement", 500));
        assert!(!forced.set_by_name("NoSuchSignal", true));

        assert_eq!(forced.len(), 2);
        assert_eq!(forced.get(Signal::ValveInOnOff), Some(ForcedValue::Bool(true)));
        assert_eq!(forced.get(Signal::LevelMeasurement), Some(ForcedValue::Word(500)));

        forced.remove(Signal::ValveInOnOff);
        assert!(!forced.is_forced(Signal::ValveInOnOff));
        forced.clear();
        assert!(forced.is_empty());
    }
}
