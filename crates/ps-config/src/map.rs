//! The signal-name to controller-address map.
//!
//! An `AddressMap` is replaced wholesale on reload (see [`AddressMap::reloaded`]);
//! the cycle only ever borrows a complete map.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::address::{IoAddress, SignalType, parse_legacy_address};
use crate::schema::{NumberField, SignalEntry, SignalMapFile};
use crate::signal::{Direction, Signal};
use crate::{ConfigError, ConfigResult};

/// Byte range reported when no signal is enabled.
pub const DEFAULT_BYTE_RANGE: (u16, u16) = (0, 10);

/// Two enabled signals of the same direction sharing controller memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub direction: Direction,
    pub at: IoAddress,
    pub first: Signal,
    pub second: Signal,
}

/// An entry of a signal map file that was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub applied: usize,
    pub unknown: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressMap {
    addresses: BTreeMap<Signal, IoAddress>,
    enabled: BTreeSet<Signal>,
    /// Name each signal carried in the file it was loaded from.
    loaded_names: BTreeMap<Signal, String>,
    custom_names: BTreeMap<Signal, String>,
    conflicts: Vec<Conflict>,
}

impl Default for AddressMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AddressMap {
    /// Built-in default addresses with every catalog signal enabled.
    pub fn with_defaults() -> Self {
        let mut map = Self::disabled();
        map.enabled = Signal::ALL.into_iter().collect();
        map.refresh();
        map
    }

    /// Built-in default addresses with nothing enabled.
    pub fn disabled() -> Self {
        Self {
            addresses: Signal::ALL
                .into_iter()
                .map(|s| (s, s.default_address()))
                .collect(),
            enabled: BTreeSet::new(),
            loaded_names: BTreeMap::new(),
            custom_names: BTreeMap::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn address(&self, signal: Signal) -> IoAddress {
        self.addresses
            .get(&signal)
            .copied()
            .unwrap_or_else(|| signal.default_address())
    }

    /// Address of an enabled signal; `None` means "do not touch".
    pub fn enabled_address(&self, signal: Signal) -> Option<IoAddress> {
        self.is_enabled(signal).then(|| self.address(signal))
    }

    pub fn is_enabled(&self, signal: Signal) -> bool {
        self.enabled.contains(&signal)
    }

    pub fn enabled_signals(&self) -> impl Iterator<Item = Signal> + '_ {
        self.enabled.iter().copied()
    }

    /// Move a signal to a new address (user edit).
    pub fn set_address(&mut self, signal: Signal, address: IoAddress) -> ConfigResult<()> {
        if !address.is_valid() {
            return Err(ConfigError::InvalidAddress {
                signal: signal.key(),
                address: address.to_string(),
            });
        }
        if address.signal_type() != signal.signal_type() {
            return Err(ConfigError::TypeMismatch {
                signal: signal.key(),
                expected: signal.signal_type(),
            });
        }
        self.addresses.insert(signal, address);
        self.refresh();
        Ok(())
    }

    pub fn set_enabled(&mut self, signal: Signal, enabled: bool) {
        if enabled {
            self.enabled.insert(signal);
        } else {
            self.enabled.remove(&signal);
        }
        self.refresh();
    }

    /// Give a signal a user-chosen name; it is accepted by subsequent reloads.
    pub fn set_custom_name(&mut self, signal: Signal, name: impl Into<String>) {
        let name = name.into();
        if name.trim().is_empty() {
            self.custom_names.remove(&signal);
        } else {
            self.custom_names.insert(signal, name);
        }
    }

    pub fn custom_name(&self, signal: Signal) -> Option<&str> {
        self.custom_names.get(&signal).map(String::as_str)
    }

    /// Display name: name from the loaded file, else custom, else canonical.
    pub fn signal_name(&self, signal: Signal) -> &str {
        self.loaded_names
            .get(&signal)
            .or_else(|| self.custom_names.get(&signal))
            .map(String::as_str)
            .unwrap_or(signal.spec().name)
    }

    /// Resolve a file name to a signal; custom names win over the catalog.
    pub fn resolve(&self, name: &str) -> Option<Signal> {
        self.custom_names
            .iter()
            .find(|(_, custom)| custom.as_str() == name)
            .map(|(signal, _)| *signal)
            .or_else(|| Signal::from_name(name))
    }

    /// Lowest and highest byte touched by enabled signals.
    pub fn byte_range(&self) -> (u16, u16) {
        let mut range: Option<(u16, u16)> = None;
        for signal in &self.enabled {
            let addr = self.address(*signal);
            range = Some(match range {
                None => (addr.byte, addr.end_byte()),
                Some((lo, hi)) => (lo.min(addr.byte), hi.max(addr.end_byte())),
            });
        }
        range.unwrap_or(DEFAULT_BYTE_RANGE)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Shared address if `signal` collides with another enabled signal.
    pub fn conflict_for(&self, signal: Signal) -> Option<IoAddress> {
        self.conflicts
            .iter()
            .find(|c| c.first == signal || c.second == signal)
            .map(|c| c.at)
    }

    /// Build the map that results from applying `file` on top of this one.
    ///
    /// Signals absent from the file keep their address but are disabled.
    /// Custom names carry over. Bad entries are skipped and reported.
    pub fn reloaded(&self, file: &SignalMapFile) -> (AddressMap, ReloadReport) {
        let mut next = AddressMap {
            addresses: self.addresses.clone(),
            enabled: BTreeSet::new(),
            loaded_names: BTreeMap::new(),
            custom_names: self.custom_names.clone(),
            conflicts: Vec::new(),
        };
        let mut report = ReloadReport::default();

        for entry in &file.signals {
            let Some(signal) = self.resolve(&entry.name) else {
                debug!(name = %entry.name, "ignoring unknown signal");
                report.unknown.push(entry.name.clone());
                continue;
            };
            match entry_address(signal, entry) {
                Ok(address) => {
                    next.addresses.insert(signal, address);
                    next.enabled.insert(signal);
                    next.loaded_names.insert(signal, entry.name.clone());
                    report.applied += 1;
                }
                Err(reason) => {
                    warn!(name = %entry.name, %reason, "skipping signal map entry");
                    report.skipped.push(SkippedEntry {
                        name: entry.name.clone(),
                        reason,
                    });
                }
            }
        }

        next.refresh();
        let (lo, hi) = next.byte_range();
        info!(
            applied = report.applied,
            skipped = report.skipped.len(),
            unknown = report.unknown.len(),
            lo,
            hi,
            "signal map loaded"
        );
        (next, report)
    }

    /// Export enabled signals in file form.
    pub fn to_file(&self) -> SignalMapFile {
        let signals = self
            .enabled
            .iter()
            .map(|signal| {
                let addr = self.address(*signal);
                SignalEntry {
                    name: self.signal_name(*signal).to_string(),
                    signal_type: Some(addr.signal_type().as_str().to_string()),
                    byte: NumberField::from(addr.byte as i64),
                    bit: addr
                        .bit
                        .map(|b| NumberField::from(b as i64))
                        .unwrap_or_default(),
                    address: None,
                }
            })
            .collect();
        SignalMapFile { signals }
    }

    fn refresh(&mut self) {
        let enabled: Vec<(Signal, IoAddress)> = self
            .enabled
            .iter()
            .map(|s| (*s, self.address(*s)))
            .collect();
        let mut conflicts = Vec::new();
        for (i, (a, addr_a)) in enabled.iter().enumerate() {
            for (b, addr_b) in &enabled[i + 1..] {
                if a.direction() != b.direction() {
                    continue;
                }
                if let Some(at) = addr_a.overlap(addr_b) {
                    conflicts.push(Conflict {
                        direction: a.direction(),
                        at,
                        first: *a,
                        second: *b,
                    });
                }
            }
        }
        self.conflicts = conflicts;
    }
}

fn entry_address(signal: Signal, entry: &SignalEntry) -> Result<IoAddress, String> {
    let address = if entry.byte.is_empty() {
        match entry.address.as_deref() {
            Some(text) => {
                parse_legacy_address(text).ok_or_else(|| format!("cannot parse address '{text}'"))?
            }
            None => return Err("missing byte".to_string()),
        }
    } else {
        let byte = entry
            .byte
            .parse()
            .map_err(|t| format!("cannot parse byte '{t}'"))?
            .ok_or("missing byte")?;
        let byte = u16::try_from(byte).map_err(|_| format!("byte {byte} out of range"))?;
        match entry.bit.parse().map_err(|t| format!("cannot parse bit '{t}'"))? {
            Some(bit) if (0..=7).contains(&bit) => IoAddress::digital(byte, bit as u8),
            Some(bit) => return Err(format!("bit {bit} out of range 0..=7")),
            None => IoAddress::word(byte),
        }
    };

    let expected = signal.signal_type();
    if address.signal_type() != expected {
        return Err(format!(
            "{} expects a {} address, got {}",
            signal.key(),
            match expected {
                SignalType::Bool => "bit",
                SignalType::Word => "word",
            },
            address
        ));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, byte: i64, bit: Option<i64>) -> SignalEntry {
        SignalEntry {
            name: name.to_string(),
            signal_type: None,
            byte: byte.into(),
            bit: bit.map(NumberField::from).unwrap_or_default(),
            address: None,
        }
    }

    #[test]
    fn defaults_have_no_conflicts() {
        let map = AddressMap::with_defaults();
        assert!(map.conflicts().is_empty(), "{:?}", map.conflicts());
        assert_eq!(map.enabled_signals().count(), Signal::ALL.len());
    }

    #[test]
    fn reload_enables_only_listed_signals() {
        let map = AddressMap::with_defaults();
        let file = SignalMapFile {
            signals: vec![
                entry("Sim_InletValveOnOff", 4, Some(3)),
                entry("Sim_WaterLevelMeasurement", 20, None),
                entry("SomethingElse", 1, Some(1)),
            ],
        };
        let (next, report) = map.reloaded(&file);
        assert_eq!(report.applied, 2);
        assert_eq!(report.unknown, vec!["SomethingElse".to_string()]);
        assert!(next.is_enabled(Signal::ValveInOnOff));
        assert!(!next.is_enabled(Signal::ValveOutOnOff));
        assert_eq!(next.address(Signal::ValveInOnOff), IoAddress::digital(4, 3));
        // Absent signals keep their address but are disabled.
        assert_eq!(next.address(Signal::ValveOutOnOff), IoAddress::digital(0, 1));
        assert_eq!(next.enabled_address(Signal::ValveOutOnOff), None);
        assert_eq!(next.byte_range(), (4, 21));
        // The source map is untouched.
        assert!(map.is_enabled(Signal::ValveOutOnOff));
    }

    #[test]
    fn type_mismatch_is_skipped() {
        let file = SignalMapFile {
            signals: vec![
                entry("Sim_HeaterPowerLevel", 6, Some(0)),
                entry("Sim_HeaterOnOff", 0, None),
                entry("Sim_WaterLevelHigh", 0, Some(9)),
            ],
        };
        let (next, report) = AddressMap::disabled().reloaded(&file);
        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(next.enabled_signals().count(), 0);
        assert_eq!(next.byte_range(), DEFAULT_BYTE_RANGE);
    }

    #[test]
    fn custom_names_resolve_on_reload() {
        let mut map = AddressMap::disabled();
        map.set_custom_name(Signal::Control1, "MixerSpeed");
        let file = SignalMapFile {
            signals: vec![entry("MixerSpeed", 30, None)],
        };
        let (next, _) = map.reloaded(&file);
        assert_eq!(next.enabled_address(Signal::Control1), Some(IoAddress::word(30)));
        assert_eq!(next.signal_name(Signal::Control1), "MixerSpeed");
    }

    #[test]
    fn conflicts_are_per_direction() {
        let file = SignalMapFile {
            signals: vec![
                // Same bit, both controller inputs.
                entry("Sim_WaterLevelHigh", 0, Some(0)),
                entry("Start", 0, Some(0)),
                // Same bit as an input, but a controller output: fine.
                entry("Sim_InletValveOnOff", 0, Some(0)),
            ],
        };
        let (next, _) = AddressMap::disabled().reloaded(&file);
        assert_eq!(next.conflicts().len(), 1);
        let c = &next.conflicts()[0];
        assert_eq!(c.direction, Direction::ControllerInput);
        assert_eq!(c.at, IoAddress::digital(0, 0));
        assert_eq!(next.conflict_for(Signal::Start), Some(IoAddress::digital(0, 0)));
        assert_eq!(next.conflict_for(Signal::ValveInOnOff), None);
    }

    #[test]
    fn export_roundtrips_through_reload() {
        let mut map = AddressMap::with_defaults();
        map.set_address(Signal::TempSetpoint, IoAddress::word(40)).unwrap();
        let file = map.to_file();
        let (again, report) = AddressMap::disabled().reloaded(&file);
        assert_eq!(report.applied, Signal::ALL.len());
        assert_eq!(again.address(Signal::TempSetpoint), IoAddress::word(40));
        assert_eq!(
            again.enabled_signals().collect::<Vec<_>>(),
            map.enabled_signals().collect::<Vec<_>>()
        );
    }

    #[test]
    fn set_address_rejects_wrong_shape() {
        let mut map = AddressMap::with_defaults();
        assert!(map
            .set_address(Signal::LevelHigh, IoAddress::word(0))
            .is_err());
        assert!(map
            .set_address(Signal::LevelHigh, IoAddress::digital(0, 8))
            .is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn located(name: &str, byte: i64, bit: Option<i64>) -> SignalEntry {
        SignalEntry {
            name: name.to_string(),
            signal_type: None,
            byte: byte.into(),
            bit: bit.map(NumberField::from).unwrap_or_default(),
            address: None,
        }
    }

    proptest! {
        #[test]
        fn bits_conflict_only_when_equal(
            a_byte in 0i64..4, a_bit in 0i64..8,
            b_byte in 0i64..4, b_bit in 0i64..8,
        ) {
            let file = SignalMapFile {
                signals: vec![
                    located("Start", a_byte, Some(a_bit)),
                    located("Stop", b_byte, Some(b_bit)),
                ],
            };
            let (map, report) = AddressMap::disabled().reloaded(&file);
            prop_assert_eq!(report.applied, 2);
            let collide = a_byte == b_byte && a_bit == b_bit;
            prop_assert_eq!(map.conflicts().len(), usize::from(collide));

            let (lo, hi) = map.byte_range();
            prop_assert_eq!(i64::from(lo), a_byte.min(b_byte));
            prop_assert_eq!(i64::from(hi), a_byte.max(b_byte));
        }

        #[test]
        fn words_conflict_within_two_bytes(a in 0i64..20, b in 0i64..20) {
            let file = SignalMapFile {
                signals: vec![located("Control1", a, None), located("Control2", b, None)],
            };
            let (map, _) = AddressMap::disabled().reloaded(&file);
            prop_assert_eq!(map.conflicts().is_empty(), (a - b).abs() >= 2);
            prop_assert_eq!(i64::from(map.byte_range().1), a.max(b) + 1);
        }
    }
}
