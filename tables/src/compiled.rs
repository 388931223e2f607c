//! Compiled `.bufrtbl` table files.
//!
//! Entries are ordered by a minimal perfect hash over their descriptor and
//! archived with rkyv, so a lookup is one hash evaluation plus one slot read
//! out of the memory-mapped file.

use crate::FXY;
use crate::entry::TableEntry;
use anyhow::Context;
use memmap2::Mmap;
use ph::fmph::GOFunction;
use rkyv::api::high::HighValidator;
use rkyv::bytecheck::CheckBytes;
use rkyv::de::Pool;
use rkyv::rancor::{Error, Strategy};
use rkyv::{Archive, Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

pub const EXTENSION: &str = "bufrtbl";

#[derive(Archive, Deserialize, Serialize)]
pub struct TableFile<E>
where
    E: TableEntry,
{
    pub function_header: Vec<u8>,
    pub entries: Vec<E>,
}

impl<E> TableFile<E>
where
    E: TableEntry,
{
    fn new(entries: Vec<E>) -> anyhow::Result<Self> {
        let keys: Vec<FXY> = entries.iter().map(|e| e.fxy()).collect();
        let mphf = GOFunction::from_slice(&keys);

        let mut slotted = Vec::with_capacity(entries.len());
        for entry in entries {
            let slot = mphf
                .get(&entry.fxy())
                .with_context(|| format!("No hash slot for {}", entry.fxy()))?;
            slotted.push((slot as usize, entry));
        }
        slotted.sort_by_key(|(slot, _)| *slot);

        let mut function_header = Vec::new();
        mphf.write(&mut function_header)
            .context("Failed to serialise hash function")?;

        Ok(Self {
            function_header,
            entries: slotted.into_iter().map(|(_, e)| e).collect(),
        })
    }
}

/// A table file mapped into memory.
pub struct CompiledTable<E: TableEntry> {
    mphf: GOFunction,
    mmap: Mmap,
    path: PathBuf,
    _marker: std::marker::PhantomData<E>,
}

pub fn bufrtbl_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut path = path.as_ref().to_path_buf();
    path.set_extension(EXTENSION);
    path
}

impl<E> CompiledTable<E>
where
    E: TableEntry,
    <E as Archive>::Archived: Deserialize<E, Strategy<Pool, Error>>,
    ArchivedTableFile<E>: for<'a> CheckBytes<HighValidator<'a, Error>>,
    TableFile<E>: for<'a> Serialize<
            rkyv::api::high::HighSerializer<
                rkyv::util::AlignedVec,
                rkyv::ser::allocator::ArenaHandle<'a>,
                Error,
            >,
        >,
{
    /// Write `entries` to `output_path` (extension forced to `.bufrtbl`) and map the result.
    pub fn build<P: AsRef<Path>>(entries: Vec<E>, output_path: P) -> anyhow::Result<Self> {
        let output_path = bufrtbl_path(output_path);
        let file = TableFile::new(entries)?;
        let bytes = rkyv::to_bytes::<Error>(&file)?;

        let mut out = std::fs::File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        out.write_all(&bytes)?;

        Self::load(output_path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = bufrtbl_path(path);
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        // SAFETY: table files are written once by `build` and never modified in place.
        let mmap = unsafe { Mmap::map(&file)? };

        let archived = rkyv::access::<ArchivedTableFile<E>, Error>(&mmap)
            .with_context(|| format!("Corrupt table file {}", path.display()))?;
        let mut cursor = Cursor::new(&archived.function_header[..]);
        let mphf = GOFunction::read(&mut cursor)
            .with_context(|| format!("Corrupt hash function in {}", path.display()))?;

        Ok(Self {
            mphf,
            mmap,
            path,
            _marker: std::marker::PhantomData,
        })
    }

    fn archived(&self) -> anyhow::Result<&ArchivedTableFile<E>> {
        Ok(rkyv::access::<ArchivedTableFile<E>, Error>(&self.mmap)?)
    }

    /// Owned copy of the entry for `fxy`, if the table holds one.
    pub fn get(&self, fxy: FXY) -> Option<E> {
        let slot = self.mphf.get(&fxy)? as usize;
        let archived = self.archived().ok()?.entries.get(slot)?;
        let entry = rkyv::deserialize::<E, Error>(archived).ok()?;
        // The hash maps unknown keys onto arbitrary slots.
        (entry.fxy() == fxy).then_some(entry)
    }

    pub fn entries(&self) -> Vec<E> {
        match self.archived() {
            Ok(archived) => archived
                .entries
                .iter()
                .filter_map(|e| rkyv::deserialize::<E, Error>(e).ok())
                .collect(),
            Err(_) => vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.archived().map(|a| a.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ElementEntry, SequenceEntry};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bufrtables-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_build_and_lookup_elements() {
        let entries = vec![
            ElementEntry::new(FXY::new(0, 12, 101), "Temperature", "K", 2, 0, 16),
            ElementEntry::new(FXY::new(0, 7, 4), "Pressure", "Pa", -1, 0, 14),
            ElementEntry::new(FXY::new(0, 1, 15), "Station name", "CCITT IA5", 0, 0, 160),
        ];
        let table = CompiledTable::build(entries.clone(), scratch("elements")).unwrap();

        assert_eq!(table.len(), 3);
        for e in &entries {
            assert_eq!(table.get(e.fxy).as_ref(), Some(e));
        }
        assert!(table.get(FXY::new(0, 2, 2)).is_none());
        assert_eq!(table.path().extension().unwrap(), EXTENSION);
    }

    #[test]
    fn test_build_and_reload_sequences() {
        let entries = vec![SequenceEntry::new(
            FXY::new(3, 1, 11),
            Some("Date".to_string()),
            vec![FXY::new(0, 4, 1), FXY::new(0, 4, 2), FXY::new(0, 4, 3)],
        )];
        let path = scratch("sequences");
        CompiledTable::build(entries.clone(), &path).unwrap();

        let reloaded = CompiledTable::<SequenceEntry>::load(&path).unwrap();
        assert_eq!(reloaded.get(FXY::new(3, 1, 11)).unwrap().chain.len(), 3);
        assert_eq!(reloaded.entries(), entries);
    }
}
