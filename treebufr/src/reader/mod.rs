//! Data section decoding against a [`DescriptorTree`].

mod compressed;
mod record;
mod uncompressed;
mod value;

pub use compressed::{CompressedData, CompressedReader};
pub use record::{Field, FieldData, Observation, Record};
pub use uncompressed::UncompressedReader;
pub use value::{Value, character_value, numeric_value, scaled};

use crate::counters::{FieldCounter, RowCounter};
use crate::errors::Result;
use crate::tree::DescriptorTree;

/// Observations of one message.
///
/// Uncompressed data is decoded lazily, one observation per item.
/// Compressed data has to be read column by column, so it is decoded up
/// front and handed out from a buffer.
pub enum ObservationIter<'a> {
    Uncompressed(UncompressedReader<'a>),
    Compressed {
        observations: std::vec::IntoIter<Observation>,
        counters: Vec<FieldCounter>,
        bits_consumed: usize,
    },
}

impl<'a> ObservationIter<'a> {
    pub fn new(tree: &'a DescriptorTree, data: &'a [u8], subsets: usize, compressed: bool) -> Result<Self> {
        if !compressed {
            return Ok(ObservationIter::Uncompressed(UncompressedReader::new(tree, data, subsets)));
        }
        let decoded = CompressedReader::new(tree, data, subsets).read()?;
        Ok(ObservationIter::Compressed {
            observations: decoded.observations.into_iter(),
            counters: decoded.counters,
            bits_consumed: decoded.bits_consumed,
        })
    }

    /// Bits read so far. For compressed data this is the whole section.
    pub fn bits_consumed(&self) -> usize {
        match self {
            ObservationIter::Uncompressed(reader) => reader.bits_consumed(),
            ObservationIter::Compressed { bits_consumed, .. } => *bits_consumed,
        }
    }

    pub fn row_counters(&self) -> &[RowCounter] {
        match self {
            ObservationIter::Uncompressed(reader) => reader.counters(),
            ObservationIter::Compressed { .. } => &[],
        }
    }

    pub fn column_counters(&self) -> &[FieldCounter] {
        match self {
            ObservationIter::Uncompressed(_) => &[],
            ObservationIter::Compressed { counters, .. } => counters,
        }
    }
}

impl Iterator for ObservationIter<'_> {
    type Item = Result<Observation>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ObservationIter::Uncompressed(reader) => reader.next(),
            ObservationIter::Compressed { observations, .. } => observations.next().map(Ok),
        }
    }
}
