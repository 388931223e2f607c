//! Bit accounting for decoded Data sections.
//!
//! Uncompressed messages record one [`RowCounter`] per observation,
//! compressed messages one [`FieldCounter`] per column. Either way the
//! total is checked against the declared section length by [`BitBudget`].

mod field;
mod row;

pub use field::{DelayedBits, FieldCounter, INCREMENT_WIDTH_BITS, total_bits};
pub use row::{FieldBits, RowCounter};

use crate::errors::{Error, Result};

/// Length of the Data section header (3-byte length plus reserved byte).
pub const DATA_SECTION_HEADER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BitBudget {
    pub consumed_bits: usize,
    /// Declared length of Section 4, header included.
    pub declared_bytes: usize,
}

impl BitBudget {
    pub fn new(consumed_bits: usize, declared_bytes: usize) -> Self {
        BitBudget {
            consumed_bits,
            declared_bytes,
        }
    }

    /// Section length implied by the consumed bits.
    pub fn consumed_bytes(&self) -> usize {
        self.consumed_bits.div_ceil(8) + DATA_SECTION_HEADER
    }

    /// Declared minus consumed bytes; positive when the section has padding.
    pub fn slack(&self) -> i64 {
        self.declared_bytes as i64 - self.consumed_bytes() as i64
    }

    /// Accept the decode if consumed and declared lengths differ by at most
    /// `tolerance_bytes`. Editions up to 3 pad sections to an even length.
    pub fn check(&self, tolerance_bytes: usize) -> Result<()> {
        if self.slack().unsigned_abs() as usize > tolerance_bytes {
            return Err(Error::SizeMismatch {
                consumed_bits: self.consumed_bits,
                declared_bytes: self.declared_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_within_tolerance() {
        // 33 bits round up to 5 bytes, plus the 4-byte header.
        let budget = BitBudget::new(33, 9);
        assert_eq!(budget.consumed_bytes(), 9);
        assert!(budget.check(0).is_ok());

        let padded = BitBudget::new(33, 10);
        assert_eq!(padded.slack(), 1);
        assert!(padded.check(1).is_ok());
        assert!(padded.check(0).is_err());
    }

    #[test]
    fn test_budget_overrun_is_mismatch() {
        let budget = BitBudget::new(80, 9);
        assert!(matches!(
            budget.check(1),
            Err(Error::SizeMismatch {
                consumed_bits: 80,
                declared_bytes: 9
            })
        ));
    }
}
