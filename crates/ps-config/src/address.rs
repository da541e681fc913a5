//! Byte/bit controller addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of a signal on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// One bit of a byte.
    Bool,
    /// A 16-bit word starting at a byte.
    #[serde(alias = "int")]
    Word,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Bool => "bool",
            SignalType::Word => "int",
        }
    }
}

/// Controller address: a byte plus a bit index for digital signals.
///
/// A digital address always carries a bit in `0..=7`; a word address never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IoAddress {
    pub byte: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit: Option<u8>,
}

impl IoAddress {
    pub const fn digital(byte: u16, bit: u8) -> Self {
        Self {
            byte,
            bit: Some(bit),
        }
    }

    pub const fn word(byte: u16) -> Self {
        Self { byte, bit: None }
    }

    pub fn signal_type(&self) -> SignalType {
        if self.bit.is_some() {
            SignalType::Bool
        } else {
            SignalType::Word
        }
    }

    pub fn is_valid(&self) -> bool {
        self.bit.is_none_or(|b| b <= 7)
    }

    /// Last byte touched by this address.
    pub fn end_byte(&self) -> u16 {
        match self.bit {
            Some(_) => self.byte,
            None => self.byte.saturating_add(1),
        }
    }

    /// Where two addresses share memory, if they do.
    ///
    /// Words occupy two consecutive bytes, so a bit inside either byte of a
    /// word, or two words less than two bytes apart, overlap.
    pub fn overlap(&self, other: &IoAddress) -> Option<IoAddress> {
        match (self.bit, other.bit) {
            (Some(_), Some(_)) => (self == other).then_some(*self),
            (None, None) => {
                (self.byte.abs_diff(other.byte) < 2).then(|| IoAddress::word(self.byte.max(other.byte)))
            }
            (Some(_), None) => {
                (self.byte >= other.byte && self.byte <= other.end_byte()).then_some(*self)
            }
            (None, Some(_)) => other.overlap(self),
        }
    }
}

impl fmt::Display for IoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bit {
            Some(bit) => write!(f, "{}.{}", self.byte, bit),
            None => write!(f, "W{}", self.byte),
        }
    }
}

/// Parse a legacy address string such as `I0.1`, `Q1.7`, `IW2` or `QW14`.
pub fn parse_legacy_address(text: &str) -> Option<IoAddress> {
    let text = text.trim();
    let body = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let prefix = &text[..text.len() - body.len()];
    if let Some((byte, bit)) = body.split_once('.') {
        let byte = byte.parse().ok()?;
        let bit: u8 = bit.parse().ok()?;
        let addr = IoAddress::digital(byte, bit);
        return addr.is_valid().then_some(addr);
    }
    if prefix.ends_with(['W', 'w']) {
        return body.parse().ok().map(IoAddress::word);
    }
    None
}
