use super::{Field, FieldData, Observation, Record, Value, character_value, numeric_value};
use crate::bits::BitReader;
use crate::counters::RowCounter;
use crate::errors::Result;
use crate::tree::{
    DescriptorNode, DescriptorTree, NodeKind, PRESENCE_FLAG, PresenceBinding, PresenceFlags,
    PresenceTracker, Replication,
};
use std::sync::Arc;

/// Lazily decodes the observations of an uncompressed Data section, one
/// per call to `next`. Decoding stops at the first error.
pub struct UncompressedReader<'a> {
    tree: &'a DescriptorTree,
    bits: BitReader<'a>,
    subsets: usize,
    next: usize,
    counters: Vec<RowCounter>,
    failed: bool,
}

impl<'a> UncompressedReader<'a> {
    pub fn new(tree: &'a DescriptorTree, data: &'a [u8], subsets: usize) -> Self {
        UncompressedReader {
            tree,
            bits: BitReader::new(data),
            subsets,
            next: 0,
            counters: Vec::with_capacity(subsets),
            failed: false,
        }
    }

    pub fn bits_consumed(&self) -> usize {
        self.bits.position()
    }

    /// Bit layout of the observations decoded so far.
    pub fn counters(&self) -> &[RowCounter] {
        &self.counters
    }
}

impl Iterator for UncompressedReader<'_> {
    type Item = Result<Observation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.subsets {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let tree = self.tree;
        let mut row = RowCounter::new(self.bits.position());
        let mut decoder = RowDecoder {
            bits: &mut self.bits,
            flags: PresenceFlags::default(),
            sink: None,
        };
        match decoder.level(tree.nodes(), &mut row) {
            Ok(fields) => {
                self.counters.push(row);
                Some(Ok(Observation {
                    index,
                    record: Record::new(fields),
                }))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.subsets - self.next))
    }
}

/// Decoding state of a single observation.
struct RowDecoder<'r, 'a> {
    bits: &'r mut BitReader<'a>,
    flags: PresenceFlags,
    /// Bitmap receiving the `0-31-031` flags read inside a bound replication.
    sink: Option<Arc<PresenceTracker>>,
}

impl RowDecoder<'_, '_> {
    fn level(&mut self, nodes: &[DescriptorNode], row: &mut RowCounter) -> Result<Vec<Field>> {
        let mut fields = Vec::with_capacity(nodes.len());
        let mut opened = None;
        for node in nodes {
            if let Some(PresenceBinding::FlagSource(tracker)) = &node.presence {
                if opened != Some(tracker.id) {
                    opened = Some(tracker.id);
                    let mut extent = vec![];
                    let span = tracker.span.clone();
                    bitmap_extent(&nodes[span.clone()], &fields[span], &mut extent);
                    self.flags.begin(tracker, extent);
                }
            }
            let field = if node.is_leaf() {
                self.leaf(node, row)?
            } else {
                self.replication(node, row)?
            };
            fields.push(field);
        }
        Ok(fields)
    }

    fn read_value(&mut self, node: &DescriptorNode) -> Result<(Value, Option<u64>)> {
        let width = node.bit_width as usize;
        if node.kind == NodeKind::Character {
            let bytes = self.bits.read_bytes(width / 8)?;
            self.bits.skip(width % 8)?;
            return Ok((character_value(&bytes), None));
        }
        let raw = self.bits.read_unsigned(width)?;
        Ok((numeric_value(node, raw), Some(raw)))
    }

    fn leaf(&mut self, node: &DescriptorNode, row: &mut RowCounter) -> Result<Field> {
        let start = self.bits.position();
        let associated = match node.associated_width {
            0 => None,
            w => Some(self.bits.read_unsigned(w as usize)?),
        };

        let field = match &node.presence {
            Some(PresenceBinding::MappedOutput(tracker)) => {
                let target = self.flags.next_mapped(tracker)?;
                let template = PresenceTracker::mapped_template(node.fxy.x, target)?;
                let (value, _) = self.read_value(&template)?;
                leaf_field(&template, value, associated)
            }
            binding => {
                let (value, raw) = self.read_value(node)?;
                if node.fxy == PRESENCE_FLAG {
                    let tracker = match binding {
                        Some(PresenceBinding::FlagSource(t)) => Some(t.clone()),
                        _ => self.sink.clone(),
                    };
                    if let Some(tracker) = tracker {
                        self.flags.record(&tracker, raw.unwrap_or(1));
                    }
                }
                leaf_field(node, value, associated)
            }
        };

        row.push_leaf(self.bits.position() - start);
        Ok(field)
    }

    fn replication(&mut self, node: &DescriptorNode, row: &mut RowCounter) -> Result<Field> {
        let outer = self.sink.clone();
        if let Some(PresenceBinding::FlagSource(tracker)) = &node.presence {
            self.sink = Some(tracker.clone());
        }
        let result = self.replicate(node, row);
        self.sink = outer;
        result
    }

    fn replicate(&mut self, node: &DescriptorNode, row: &mut RowCounter) -> Result<Field> {
        let (count, count_bits, repetition) = match node.replication {
            Replication::Delayed(c) => (
                self.bits.read_unsigned(c.width as usize)? as usize,
                c.width as usize,
                c.repetition,
            ),
            Replication::Fixed(n) => (n as usize, 0, false),
            Replication::None => (1, 0, false),
        };

        let mut rows = vec![];
        let records = if repetition {
            if count == 0 {
                vec![]
            } else {
                let mut sub = RowCounter::new(self.bits.position());
                let fields = self.level(&node.children, &mut sub)?;
                rows.push(sub);
                vec![Record::new(fields); count]
            }
        } else {
            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                let mut sub = RowCounter::new(self.bits.position());
                records.push(Record::new(self.level(&node.children, &mut sub)?));
                rows.push(sub);
            }
            records
        };
        row.push_replicated(count_bits, rows);

        let data = if node.replication.is_delayed() {
            FieldData::Sequence(records)
        } else {
            FieldData::Group(records)
        };
        Ok(Field {
            name: node.name.clone(),
            unit: String::new(),
            fxy: node.fxy,
            data,
            associated: None,
        })
    }
}

pub(super) fn leaf_field(node: &DescriptorNode, value: Value, associated: Option<u64>) -> Field {
    Field {
        name: node.name.clone(),
        unit: node.unit.clone(),
        fxy: node.fxy,
        data: FieldData::Single(value),
        associated,
    }
}

/// Decoded data elements of `nodes`, replications expanded, in the order a
/// data-present bitmap counts them.
fn bitmap_extent(nodes: &[DescriptorNode], fields: &[Field], out: &mut Vec<DescriptorNode>) {
    for (node, field) in nodes.iter().zip(fields) {
        if node.is_leaf() {
            if node.in_bitmap_extent() {
                out.push(node.clone());
            }
            continue;
        }
        for record in field.records() {
            bitmap_extent(&node.children, &record.fields, out);
        }
    }
}
