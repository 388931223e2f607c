//! Table entries carried inside BUFR messages (data category 11).
//!
//! Each entry starts with its F, X and Y as text (`0-00-010`, `0-00-011`,
//! `0-00-012`). Table B entries continue with name, unit, scale, reference
//! and width; Table D entries list their chain with `0-00-030`.

use crate::reader::{Field, Observation, Value};
use bufrtables::{ElementEntry, FXY, SequenceEntry, TableKey, TableLookup};

#[derive(Debug, Default)]
struct PendingEntry {
    f: Option<u8>,
    x: Option<u8>,
    y: Option<u8>,
    name: String,
    unit: String,
    scale_negative: bool,
    scale: Option<i32>,
    reference_negative: bool,
    reference: Option<i64>,
    width: Option<u32>,
    chain: Vec<FXY>,
}

impl PendingEntry {
    fn is_empty(&self) -> bool {
        self.f.is_none() && self.x.is_none() && self.y.is_none()
    }

    fn fxy(&self) -> Option<FXY> {
        Some(FXY::new(self.f?, self.x?, self.y?))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmbeddedTables {
    pub elements: Vec<ElementEntry>,
    pub sequences: Vec<SequenceEntry>,
}

impl EmbeddedTables {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut tables = EmbeddedTables::default();
        let mut pending = PendingEntry::default();
        for observation in observations {
            for field in observation.leaves() {
                tables.accept(&mut pending, field);
            }
        }
        tables.finish(pending);
        tables
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.sequences.is_empty()
    }

    /// Register the entries as an override for `key`.
    pub fn apply(self, tables: &dyn TableLookup, key: &TableKey) -> (usize, usize) {
        let counts = (self.elements.len(), self.sequences.len());
        tables.apply_override(key, self.elements, self.sequences);
        counts
    }

    fn accept(&mut self, pending: &mut PendingEntry, field: &Field) {
        let fxy = field.fxy;
        if fxy.f != 0 || fxy.x != 0 {
            return;
        }
        let Some(text) = field.value().and_then(Value::as_str).map(str::trim) else {
            return;
        };

        match fxy.y {
            10 => {
                self.finish(std::mem::take(pending));
                pending.f = text.parse().ok();
            }
            11 => pending.x = text.parse().ok(),
            12 => pending.y = text.parse().ok(),
            13 => pending.name = text.to_string(),
            14 => {
                if !text.is_empty() {
                    if !pending.name.is_empty() {
                        pending.name.push(' ');
                    }
                    pending.name.push_str(text);
                }
            }
            15 => pending.unit = text.to_string(),
            16 => pending.scale_negative = text == "-",
            17 => pending.scale = text.parse().ok(),
            18 => pending.reference_negative = text == "-",
            19 => pending.reference = text.parse().ok(),
            20 => pending.width = text.parse().ok(),
            30 => match FXY::from_str(text) {
                Ok(child) => pending.chain.push(child),
                Err(e) => eprintln!("Warning: Skipping embedded sequence member {:?}: {}", text, e),
            },
            _ => {}
        }
    }

    fn finish(&mut self, pending: PendingEntry) {
        if pending.is_empty() {
            return;
        }
        let Some(fxy) = pending.fxy() else {
            eprintln!("Warning: Skipping embedded table entry with incomplete descriptor");
            return;
        };

        match fxy.f {
            0 => {
                let (Some(scale), Some(reference), Some(width)) =
                    (pending.scale, pending.reference, pending.width)
                else {
                    eprintln!("Warning: Skipping incomplete embedded Table B entry {}", fxy);
                    return;
                };
                let scale = if pending.scale_negative { -scale } else { scale };
                let reference = if pending.reference_negative {
                    -reference
                } else {
                    reference
                };
                self.elements.push(ElementEntry::new(
                    fxy,
                    pending.name,
                    pending.unit,
                    scale,
                    reference,
                    width,
                ));
            }
            3 if !pending.chain.is_empty() => {
                let title = (!pending.name.is_empty()).then_some(pending.name);
                self.sequences
                    .push(SequenceEntry::new(fxy, title, pending.chain));
            }
            _ => eprintln!("Warning: Skipping embedded table entry {}", fxy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{FieldData, Record};

    fn text(y: u8, s: &str) -> Field {
        Field {
            name: format!("0-00-{:03}", y),
            unit: "CCITT IA5".to_string(),
            fxy: FXY::new(0, 0, y),
            data: FieldData::Single(Value::String(s.to_string())),
            associated: None,
        }
    }

    #[test]
    fn test_element_and_sequence_entries() {
        let record = Record::new(vec![
            text(10, "0"),
            text(11, "63"),
            text(12, "200"),
            text(13, "LOCAL TEMPERATURE"),
            text(14, ""),
            text(15, "K"),
            text(16, "+"),
            text(17, "1"),
            text(18, "-"),
            text(19, "500"),
            text(20, "12"),
            text(10, "3"),
            text(11, "63"),
            text(12, "001"),
            text(30, "004001"),
            text(30, "063200"),
        ]);
        let tables = EmbeddedTables::from_observations(&[Observation { index: 0, record }]);

        assert_eq!(
            tables.elements,
            vec![ElementEntry::new(
                FXY::new(0, 63, 200),
                "LOCAL TEMPERATURE",
                "K",
                1,
                -500,
                12
            )]
        );
        assert_eq!(tables.sequences.len(), 1);
        assert_eq!(tables.sequences[0].fxy, FXY::new(3, 63, 1));
        assert_eq!(
            tables.sequences[0].chain,
            vec![FXY::new(0, 4, 1), FXY::new(0, 63, 200)]
        );
    }

    #[test]
    fn test_incomplete_entry_is_skipped() {
        let record = Record::new(vec![text(10, "0"), text(11, "63"), text(12, "201"), text(13, "NO WIDTH")]);
        let tables = EmbeddedTables::from_observations(&[Observation { index: 0, record }]);
        assert!(tables.is_empty());
    }
}
