//! CSV table loaders for the WMO table layout.

pub mod btable;
pub mod dtable;

pub use btable::ElementCsvLoader;
pub use dtable::SequenceCsvLoader;

use crate::entry::TableEntry;
use anyhow::Context;
use csv::ReaderBuilder;
use std::fmt::Debug;
use std::io::Read;
use std::path::Path;

pub trait EntryLoader: Default {
    type Output: TableEntry;
    type RawEntry: for<'de> serde::Deserialize<'de> + Debug;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>>;

    fn finish(&mut self) -> anyhow::Result<Option<Self::Output>> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct CsvTableLoader<C: EntryLoader> {
    _marker: std::marker::PhantomData<C>,
}

impl<C: EntryLoader> CsvTableLoader<C> {
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<Vec<C::Output>> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open table {}", path.display()))?;
        self.load_reader(file, &path.display().to_string())
    }

    /// Rows that fail to deserialise are reported and skipped.
    pub fn load_reader<R: Read>(&self, reader: R, origin: &str) -> anyhow::Result<Vec<C::Output>> {
        let mut loader = C::default();
        let mut entries = vec![];
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .flexible(true)
            .from_reader(reader);

        let mut line_num = 1;
        for result in rdr.deserialize() {
            line_num += 1;
            match result {
                Ok(record) => {
                    let record: C::RawEntry = record;
                    if let Some(entry) = loader
                        .process_entry(record)
                        .with_context(|| format!("{}:{}", origin, line_num))?
                    {
                        entries.push(entry);
                    }
                }
                Err(e) => {
                    eprintln!("Warning: Skipping line {} in {}: {}", line_num, origin, e);
                }
            }
        }

        if let Some(entry) = loader.finish()? {
            entries.push(entry);
        }
        Ok(entries)
    }
}
