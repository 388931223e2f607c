pub mod compiled;
pub mod entry;
pub mod loader;
pub mod pattern;
pub mod prelude;
pub mod store;
pub mod table_path;

use anyhow::Context;
use rkyv::Archive;
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

pub use compiled::CompiledTable;
pub use entry::{ElementEntry, ElementKind, SequenceEntry, TableEntry};
pub use store::{LocalKey, TableKey, TableLookup, TableSet, TableStore};

/// A 16-bit BUFR descriptor split into its class (`f`), group (`x`) and item (`y`).
#[derive(
    Archive,
    SerdeSerialize,
    SerdeDeserialize,
    rkyv::Serialize,
    rkyv::Deserialize,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    std::hash::Hash,
)]
#[rkyv(derive(Debug, Clone, Copy, std::hash::Hash, PartialEq, Eq))]
pub struct FXY {
    pub f: u8,
    pub x: u8,
    pub y: u8,
}

impl FXY {
    pub const fn new(f: u8, x: u8, y: u8) -> Self {
        FXY { f, x, y }
    }

    /// Split a wire descriptor: F (2 bits) | X (6 bits) | Y (8 bits).
    pub const fn from_u16(code: u16) -> Self {
        FXY {
            f: ((code >> 14) & 0x03) as u8,
            x: ((code >> 8) & 0x3F) as u8,
            y: (code & 0xFF) as u8,
        }
    }

    pub const fn to_u16(&self) -> u16 {
        ((self.f as u16) << 14) | ((self.x as u16) << 8) | (self.y as u16)
    }

    /// Parse the six-digit `FXXYYY` notation used by the WMO tables.
    pub fn from_str(fxy_str: &str) -> anyhow::Result<Self> {
        let fxy_str = fxy_str.trim();
        if fxy_str.len() != 6 || !fxy_str.is_ascii() {
            return Err(anyhow::anyhow!("Invalid FXY string: {:?}", fxy_str));
        }

        let f = fxy_str[0..1]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse F from FXY: {}", fxy_str))?;
        let x = fxy_str[1..3]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse X from FXY: {}", fxy_str))?;
        let y = fxy_str[3..6]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse Y from FXY: {}", fxy_str))?;

        if f > 3 || x > 63 {
            return Err(anyhow::anyhow!("FXY out of range: {}", fxy_str));
        }

        Ok(FXY { f, x, y })
    }

    pub fn is_element(&self) -> bool {
        self.f == 0
    }

    pub fn is_replication(&self) -> bool {
        self.f == 1
    }

    pub fn is_operator(&self) -> bool {
        self.f == 2
    }

    pub fn is_sequence(&self) -> bool {
        self.f == 3
    }
}

impl From<&ArchivedFXY> for FXY {
    fn from(value: &ArchivedFXY) -> Self {
        FXY::new(value.f, value.x, value.y)
    }
}

impl std::fmt::Display for FXY {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}-{:03}", self.f, self.x, self.y)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableType {
    B,
    D,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fxy_wire_split() {
        let fxy = FXY::from_u16(0b01_000001_00000000);
        assert_eq!(fxy, FXY::new(1, 1, 0));
        assert_eq!(fxy.to_u16(), 0x4100);

        let fxy = FXY::from_u16(0xC000 | (1 << 8) | 1);
        assert_eq!(fxy, FXY::new(3, 1, 1));
        assert!(fxy.is_sequence());
    }

    #[test]
    fn test_fxy_from_str() {
        assert_eq!(FXY::from_str("012101").unwrap(), FXY::new(0, 12, 101));
        assert_eq!(FXY::from_str(" 301011").unwrap(), FXY::new(3, 1, 11));
        assert!(FXY::from_str("01210").is_err());
        assert!(FXY::from_str("412101").is_err());
        assert!(FXY::from_str("0a2101").is_err());
    }

    #[test]
    fn test_fxy_display() {
        assert_eq!(FXY::new(0, 31, 1).to_string(), "0-31-001");
    }
}
