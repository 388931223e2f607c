use crate::FXY;
use rkyv::Archive;
use rkyv::api::high::HighSerializer;
use rkyv::rancor::Error;
use serde::Serialize as SerdeSerialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display};

/// Common shape of the entries a table file holds.
pub trait TableEntry:
    SerdeSerialize
    + DeserializeOwned
    + Display
    + Debug
    + Clone
    + Sized
    + Archive
    + for<'a> rkyv::Serialize<
        HighSerializer<rkyv::util::AlignedVec, rkyv::ser::allocator::ArenaHandle<'a>, Error>,
    >
{
    const TABLE_TYPE: crate::TableType;

    fn fxy(&self) -> FXY;
}

/// How the bits of an element are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElementKind {
    Numeric,
    Character,
    Enumerated,
}

/// Table B entry.
#[derive(
    Debug,
    Clone,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct ElementEntry {
    pub fxy: FXY,
    pub name: String,
    pub unit: String,
    pub scale: i32,
    pub reference: i64,
    pub width: u32,
}

impl ElementEntry {
    pub fn new(
        fxy: FXY,
        name: impl Into<String>,
        unit: impl Into<String>,
        scale: i32,
        reference: i64,
        width: u32,
    ) -> Self {
        ElementEntry {
            fxy,
            name: name.into(),
            unit: unit.into(),
            scale,
            reference,
            width,
        }
    }

    pub fn kind(&self) -> ElementKind {
        let unit = self.unit.trim().to_ascii_lowercase();
        match unit.as_str() {
            "ccitt ia5" | "ccittia5" | "character" => ElementKind::Character,
            "code table" | "code-table" | "flag table" | "flag-table" => ElementKind::Enumerated,
            _ => ElementKind::Numeric,
        }
    }
}

impl Display for ElementEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = if self.name.len() > 40 {
            format!("{}...", self.name.chars().take(37).collect::<String>())
        } else {
            self.name.clone()
        };

        let unit = if self.unit.len() > 15 {
            format!("{}...", self.unit.chars().take(12).collect::<String>())
        } else {
            self.unit.clone()
        };

        write!(
            f,
            "{} | {:<40} | {:<15} | {:>5} | {:>11} | {:>5}",
            self.fxy, name, unit, self.scale, self.reference, self.width
        )
    }
}

/// Table D entry.
#[derive(
    Debug,
    Clone,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct SequenceEntry {
    pub fxy: FXY,
    pub title: Option<String>,
    pub chain: Vec<FXY>,
}

impl SequenceEntry {
    pub fn new(fxy: FXY, title: Option<String>, chain: Vec<FXY>) -> Self {
        SequenceEntry { fxy, title, chain }
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

impl Display for SequenceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chain: String = self
            .chain
            .iter()
            .map(|fxy| fxy.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let title = self.title.as_deref().unwrap_or("N/A");
        let title = if title.len() > 50 {
            format!("{}...", title.chars().take(47).collect::<String>())
        } else {
            title.to_string()
        };

        write!(f, "{} | {:<50} | [{}]", self.fxy, title, chain)
    }
}

impl TableEntry for ElementEntry {
    const TABLE_TYPE: crate::TableType = crate::TableType::B;

    fn fxy(&self) -> FXY {
        self.fxy
    }
}

impl TableEntry for SequenceEntry {
    const TABLE_TYPE: crate::TableType = crate::TableType::D;

    fn fxy(&self) -> FXY {
        self.fxy
    }
}
