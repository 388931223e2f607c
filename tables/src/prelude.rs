pub use crate::FXY;
pub use crate::TableType;
pub use crate::compiled::CompiledTable;
pub use crate::entry::{ElementEntry, ElementKind, SequenceEntry};
pub use crate::loader::{CsvTableLoader, ElementCsvLoader, SequenceCsvLoader};
pub use crate::store::{LocalKey, TableKey, TableLookup, TableSet, TableStore};

pub type CompiledTableB = CompiledTable<ElementEntry>;
pub type CompiledTableD = CompiledTable<SequenceEntry>;
