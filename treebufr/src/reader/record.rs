use super::Value;
use bufrtables::FXY;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum FieldData {
    Single(Value),
    /// Fixed replication, one record per repeat.
    Group(Vec<Record>),
    /// Delayed replication, length taken from the data.
    Sequence(Vec<Record>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Field {
    pub name: String,
    pub unit: String,
    pub fxy: FXY,
    pub data: FieldData,
    /// Associated field bits read ahead of the value.
    pub associated: Option<u64>,
}

impl Field {
    pub fn value(&self) -> Option<&Value> {
        match &self.data {
            FieldData::Single(v) => Some(v),
            _ => None,
        }
    }

    pub fn records(&self) -> &[Record] {
        match &self.data {
            FieldData::Single(_) => &[],
            FieldData::Group(rs) | FieldData::Sequence(rs) => rs,
        }
    }

    fn shows_unit(&self) -> bool {
        !matches!(
            self.unit.to_ascii_lowercase().as_str(),
            "" | "ccitt ia5" | "code table" | "code-table" | "flag table" | "flag-table"
        )
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize, width: usize) -> std::fmt::Result {
        let pad = depth * 2;
        write!(f, "{:pad$}{:<width$} : ", "", self.name)?;
        match &self.data {
            FieldData::Single(v) => {
                match v {
                    Value::Missing => write!(f, "MISSING")?,
                    Value::String(s) => write!(f, "\"{}\"", s)?,
                    Value::Number(n) if self.shows_unit() => write!(f, "{:>12.6} {}", n, self.unit)?,
                    v => write!(f, "{}", v)?,
                }
                if let Some(a) = self.associated {
                    write!(f, " (associated {})", a)?;
                }
                writeln!(f)
            }
            FieldData::Group(records) | FieldData::Sequence(records) => {
                writeln!(f, "[len={}]", records.len())?;
                for (i, record) in records.iter().enumerate() {
                    writeln!(f, "{:pad$}  #{}", "", i + 1)?;
                    record.fmt_indented(f, depth + 2)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Record {
    pub fields: Vec<Field>,
}

impl Record {
    pub fn new(fields: Vec<Field>) -> Self {
        Record { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn by_fxy(&self, fxy: FXY) -> Option<&Field> {
        self.fields.iter().find(|f| f.fxy == fxy)
    }

    /// Single-valued fields in depth-first order.
    pub fn leaves(&self) -> Vec<&Field> {
        let mut out = vec![];
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Field>) {
        for field in &self.fields {
            match &field.data {
                FieldData::Single(_) => out.push(field),
                FieldData::Group(rs) | FieldData::Sequence(rs) => {
                    for r in rs {
                        r.collect_leaves(out);
                    }
                }
            }
        }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let width = self
            .fields
            .iter()
            .map(|f| f.name.len())
            .max()
            .unwrap_or(0)
            .min(50);
        for field in &self.fields {
            field.fmt_indented(f, depth, width)?;
        }
        Ok(())
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// One decoded subset.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Observation {
    pub index: usize,
    pub record: Record,
}

impl Observation {
    pub fn leaves(&self) -> Vec<&Field> {
        self.record.leaves()
    }

    /// Missing flag of every leaf, depth-first.
    pub fn missing_mask(&self) -> Vec<bool> {
        self.leaves()
            .iter()
            .map(|f| f.value().is_some_and(Value::is_missing))
            .collect()
    }
}

impl Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Observation {}", self.index + 1)?;
        self.record.fmt_indented(f, 1)
    }
}
