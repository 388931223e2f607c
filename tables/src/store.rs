//! Layered, thread-safe table lookup.
//!
//! A lookup for a [`TableKey`] walks three layers in order: entries embedded
//! in earlier messages for the same local key, the center's local tables,
//! and the master tables for the key's master version. A missing master
//! version falls back to the newest lower version available.

use crate::compiled::CompiledTable;
use crate::entry::{ElementEntry, SequenceEntry, TableEntry};
use crate::loader::{CsvTableLoader, ElementCsvLoader, SequenceCsvLoader};
use crate::pattern::{TableFormat, TableMetadata, TableScanner};
use crate::{FXY, TableType};
use anyhow::Context;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Table-versioning fields of a message's Identification section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableKey {
    pub master_table: u8,
    pub center: u16,
    pub subcenter: u16,
    pub master_version: u8,
    pub local_version: u8,
    pub category: u8,
}

impl TableKey {
    pub fn local_key(&self) -> LocalKey {
        LocalKey {
            center: self.center,
            subcenter: self.subcenter,
            version: self.local_version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalKey {
    pub center: u16,
    pub subcenter: u16,
    pub version: u8,
}

pub trait TableLookup: Send + Sync {
    fn element(&self, key: &TableKey, fxy: FXY) -> Option<Arc<ElementEntry>>;

    fn sequence(&self, key: &TableKey, fxy: FXY) -> Option<Arc<SequenceEntry>>;

    /// Register entries carried inside a message for all later lookups under `key`.
    fn apply_override(
        &self,
        key: &TableKey,
        elements: Vec<ElementEntry>,
        sequences: Vec<SequenceEntry>,
    );
}

enum Layer<E: TableEntry> {
    Memory(FxHashMap<FXY, Arc<E>>),
    Compiled(CompiledTable<E>),
}

impl<E> Layer<E>
where
    E: TableEntry,
    <E as rkyv::Archive>::Archived:
        rkyv::Deserialize<E, rkyv::rancor::Strategy<rkyv::de::Pool, rkyv::rancor::Error>>,
    crate::compiled::ArchivedTableFile<E>: for<'a> rkyv::bytecheck::CheckBytes<
            rkyv::api::high::HighValidator<'a, rkyv::rancor::Error>,
        >,
    crate::compiled::TableFile<E>: for<'a> rkyv::Serialize<
            rkyv::api::high::HighSerializer<
                rkyv::util::AlignedVec,
                rkyv::ser::allocator::ArenaHandle<'a>,
                rkyv::rancor::Error,
            >,
        >,
{
    fn memory(entries: Vec<E>) -> Self {
        Layer::Memory(
            entries
                .into_iter()
                .map(|e| (e.fxy(), Arc::new(e)))
                .collect(),
        )
    }

    fn get(&self, fxy: FXY) -> Option<Arc<E>> {
        match self {
            Layer::Memory(map) => map.get(&fxy).cloned(),
            Layer::Compiled(table) => table.get(fxy).map(Arc::new),
        }
    }

    fn len(&self) -> usize {
        match self {
            Layer::Memory(map) => map.len(),
            Layer::Compiled(table) => table.len(),
        }
    }

    fn merge(&mut self, entries: Vec<E>) {
        if let Layer::Compiled(table) = self {
            let existing = table.entries();
            *self = Layer::memory(existing);
        }
        if let Layer::Memory(map) = self {
            for e in entries {
                map.insert(e.fxy(), Arc::new(e));
            }
        }
    }
}

/// One Table B plus one Table D.
pub struct TableSet {
    elements: Layer<ElementEntry>,
    sequences: Layer<SequenceEntry>,
}

impl TableSet {
    pub fn new(elements: Vec<ElementEntry>, sequences: Vec<SequenceEntry>) -> Self {
        TableSet {
            elements: Layer::memory(elements),
            sequences: Layer::memory(sequences),
        }
    }

    pub fn compiled(
        elements: CompiledTable<ElementEntry>,
        sequences: CompiledTable<SequenceEntry>,
    ) -> Self {
        TableSet {
            elements: Layer::Compiled(elements),
            sequences: Layer::Compiled(sequences),
        }
    }

    pub fn element(&self, fxy: FXY) -> Option<Arc<ElementEntry>> {
        self.elements.get(fxy)
    }

    pub fn sequence(&self, fxy: FXY) -> Option<Arc<SequenceEntry>> {
        self.sequences.get(fxy)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    fn merge(&mut self, elements: Vec<ElementEntry>, sequences: Vec<SequenceEntry>) {
        self.elements.merge(elements);
        self.sequences.merge(sequences);
    }
}

#[derive(Debug, Clone, Default)]
struct TableFiles {
    b: Option<(PathBuf, TableFormat)>,
    d: Option<(PathBuf, TableFormat)>,
}

impl TableFiles {
    fn add(&mut self, path: PathBuf, meta: &TableMetadata) {
        let slot = match meta.kind {
            TableType::B => &mut self.b,
            TableType::D => &mut self.d,
        };
        // A compiled file wins over the CSV it was built from.
        let replace = match slot {
            None => true,
            Some((_, TableFormat::Csv)) => meta.format == TableFormat::Compiled,
            Some((_, TableFormat::Compiled)) => false,
        };
        if replace {
            *slot = Some((path, meta.format));
        }
    }

    fn load(&self) -> anyhow::Result<TableSet> {
        let elements = match &self.b {
            Some((path, TableFormat::Compiled)) => {
                Layer::Compiled(CompiledTable::<ElementEntry>::load(path)?)
            }
            Some((path, TableFormat::Csv)) => {
                Layer::memory(CsvTableLoader::<ElementCsvLoader>::default().load_path(path)?)
            }
            None => Layer::memory(vec![]),
        };
        let sequences = match &self.d {
            Some((path, TableFormat::Compiled)) => {
                Layer::Compiled(CompiledTable::<SequenceEntry>::load(path)?)
            }
            Some((path, TableFormat::Csv)) => {
                Layer::memory(CsvTableLoader::<SequenceCsvLoader>::default().load_path(path)?)
            }
            None => Layer::memory(vec![]),
        };
        Ok(TableSet {
            elements,
            sequences,
        })
    }
}

type Slot = Option<Arc<TableSet>>;

/// The default [`TableLookup`]: in-memory tables plus whatever a table
/// directory holds, loaded from disk once on first use.
#[derive(Default)]
pub struct TableStore {
    master_files: FxHashMap<u8, TableFiles>,
    local_files: FxHashMap<LocalKey, TableFiles>,
    masters: RwLock<FxHashMap<u8, Slot>>,
    /// Master version each requested version resolved to.
    resolved: RwLock<FxHashMap<u8, Option<u8>>>,
    locals: RwLock<FxHashMap<LocalKey, Slot>>,
    overrides: RwLock<FxHashMap<LocalKey, TableSet>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every table file under `dir`; nothing is read until a lookup needs it.
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let found = TableScanner::new()
            .scan_directory(dir)
            .with_context(|| format!("Failed to scan table directory {}", dir.display()))?;

        let mut store = Self::new();
        for (path, meta) in found {
            match (meta.center, meta.subcenter) {
                (Some(center), subcenter) => {
                    let key = LocalKey {
                        center,
                        subcenter: subcenter.unwrap_or(0),
                        version: meta.version,
                    };
                    store.local_files.entry(key).or_default().add(path, &meta);
                }
                (None, _) => {
                    store
                        .master_files
                        .entry(meta.version)
                        .or_default()
                        .add(path, &meta);
                }
            }
        }
        Ok(store)
    }

    /// Open the directory resolved by [`crate::table_path::get_tables_base_path`].
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(crate::table_path::get_tables_base_path())
    }

    pub fn insert_master(
        &self,
        version: u8,
        elements: Vec<ElementEntry>,
        sequences: Vec<SequenceEntry>,
    ) {
        write(&self.masters).insert(version, Some(Arc::new(TableSet::new(elements, sequences))));
        write(&self.resolved).clear();
    }

    pub fn insert_local(
        &self,
        key: LocalKey,
        elements: Vec<ElementEntry>,
        sequences: Vec<SequenceEntry>,
    ) {
        write(&self.locals).insert(key, Some(Arc::new(TableSet::new(elements, sequences))));
    }

    pub fn master_versions(&self) -> Vec<u8> {
        let mut versions: Vec<u8> = self
            .master_files
            .keys()
            .copied()
            .chain(read(&self.masters).iter().filter(|(_, s)| s.is_some()).map(|(v, _)| *v))
            .collect();
        versions.sort_unstable();
        versions.dedup();
        versions
    }

    fn load_master(&self, version: u8) -> Slot {
        if let Some(slot) = read(&self.masters).get(&version) {
            return slot.clone();
        }

        let loaded = match self.master_files.get(&version) {
            Some(files) => match files.load() {
                Ok(set) => Some(Arc::new(set)),
                Err(e) => {
                    eprintln!("Warning: Failed to load master table {}: {:#}", version, e);
                    None
                }
            },
            None => None,
        };

        write(&self.masters).entry(version).or_insert(loaded).clone()
    }

    /// Master tables for `version`, or the newest lower version present.
    pub fn master(&self, version: u8) -> Option<Arc<TableSet>> {
        self.resolve_master(version).and_then(|v| self.load_master(v))
    }

    /// The master version used for `version`, found once and remembered.
    pub fn resolve_master(&self, version: u8) -> Option<u8> {
        if let Some(resolved) = read(&self.resolved).get(&version) {
            return *resolved;
        }
        let found = (0..=version).rev().find(|v| self.load_master(*v).is_some());
        let first = write(&self.resolved).insert(version, found).is_none();
        if let Some(v) = found.filter(|v| first && *v != version) {
            eprintln!("Falling back to Master Table version {}", v);
        }
        found
    }

    pub fn local(&self, key: LocalKey) -> Option<Arc<TableSet>> {
        if key.version == 0 {
            return None;
        }
        if let Some(slot) = read(&self.locals).get(&key) {
            return slot.clone();
        }

        let loaded = match self.local_files.get(&key) {
            Some(files) => match files.load() {
                Ok(set) => Some(Arc::new(set)),
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to load local table {}/{}/{}: {:#}",
                        key.center, key.subcenter, key.version, e
                    );
                    None
                }
            },
            None => None,
        };

        write(&self.locals).entry(key).or_insert(loaded).clone()
    }

    fn lookup<E>(
        &self,
        key: &TableKey,
        fxy: FXY,
        get: impl Fn(&TableSet, FXY) -> Option<Arc<E>>,
    ) -> Option<Arc<E>> {
        let local_key = key.local_key();
        if let Some(found) = read(&self.overrides)
            .get(&local_key)
            .and_then(|set| get(set, fxy))
        {
            return Some(found);
        }
        if let Some(found) = self.local(local_key).and_then(|set| get(set.as_ref(), fxy)) {
            return Some(found);
        }
        self.master(key.master_version)
            .and_then(|set| get(set.as_ref(), fxy))
    }
}

impl TableLookup for TableStore {
    fn element(&self, key: &TableKey, fxy: FXY) -> Option<Arc<ElementEntry>> {
        self.lookup(key, fxy, TableSet::element)
    }

    fn sequence(&self, key: &TableKey, fxy: FXY) -> Option<Arc<SequenceEntry>> {
        self.lookup(key, fxy, TableSet::sequence)
    }

    fn apply_override(
        &self,
        key: &TableKey,
        elements: Vec<ElementEntry>,
        sequences: Vec<SequenceEntry>,
    ) {
        write(&self.overrides)
            .entry(key.local_key())
            .or_insert_with(|| TableSet::new(vec![], vec![]))
            .merge(elements, sequences);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(master_version: u8, local_version: u8) -> TableKey {
        TableKey {
            master_table: 0,
            center: 98,
            subcenter: 0,
            master_version,
            local_version,
            category: 2,
        }
    }

    fn temperature(width: u32) -> ElementEntry {
        ElementEntry::new(FXY::new(0, 12, 101), "Temperature", "K", 2, 0, width)
    }

    #[test]
    fn test_master_fallback_to_lower_version() {
        let store = TableStore::new();
        store.insert_master(13, vec![temperature(16)], vec![]);

        let found = store.element(&key(19, 0), FXY::new(0, 12, 101)).unwrap();
        assert_eq!(found.width, 16);
        assert!(store.element(&key(12, 0), FXY::new(0, 12, 101)).is_none());
    }

    #[test]
    fn test_master_fallback_is_resolved_once() {
        let store = TableStore::new();
        store.insert_master(13, vec![temperature(16)], vec![]);

        for _ in 0..3 {
            assert!(store.element(&key(19, 0), FXY::new(0, 12, 101)).is_some());
        }
        assert_eq!(read(&store.resolved).len(), 1);
        assert_eq!(store.resolve_master(19), Some(13));

        store.insert_master(17, vec![temperature(18)], vec![]);
        assert_eq!(store.resolve_master(19), Some(17));
        let found = store.element(&key(19, 0), FXY::new(0, 12, 101)).unwrap();
        assert_eq!(found.width, 18);
    }

    #[test]
    fn test_layer_order() {
        let store = TableStore::new();
        store.insert_master(13, vec![temperature(16)], vec![]);
        let local = key(13, 1).local_key();
        store.insert_local(local, vec![temperature(12)], vec![]);

        assert_eq!(store.element(&key(13, 1), FXY::new(0, 12, 101)).unwrap().width, 12);
        // Local version zero never consults local tables.
        assert_eq!(store.element(&key(13, 0), FXY::new(0, 12, 101)).unwrap().width, 16);

        store.apply_override(&key(13, 1), vec![temperature(20)], vec![]);
        assert_eq!(store.element(&key(13, 1), FXY::new(0, 12, 101)).unwrap().width, 20);
    }

    #[test]
    fn test_open_directory_with_csv_and_compiled() {
        let dir = std::env::temp_dir().join(format!("bufrtables-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("BUFRCREX_TableB_en_30.csv"),
            "FXY,ElementName_en,BUFR_Unit,BUFR_Scale,BUFR_ReferenceValue,BUFR_DataWidth_Bits\n\
             007004,Pressure,Pa,-1,0,14\n",
        )
        .unwrap();
        CompiledTable::build(
            vec![SequenceEntry::new(
                FXY::new(3, 1, 11),
                None,
                vec![FXY::new(0, 4, 1), FXY::new(0, 4, 2)],
            )],
            dir.join("BUFR_TableD_30"),
        )
        .unwrap();

        let store = TableStore::open(&dir).unwrap();
        assert_eq!(store.master_versions(), vec![30]);
        assert_eq!(store.element(&key(31, 0), FXY::new(0, 7, 4)).unwrap().width, 14);
        assert_eq!(store.sequence(&key(30, 0), FXY::new(3, 1, 11)).unwrap().chain.len(), 2);
    }
}
