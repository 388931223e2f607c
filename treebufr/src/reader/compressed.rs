use super::uncompressed::leaf_field;
use super::{Field, FieldData, Observation, Record, Value, character_value, numeric_value};
use crate::bits::{BitReader, all_ones};
use crate::counters::{DelayedBits, FieldCounter, INCREMENT_WIDTH_BITS};
use crate::errors::{Error, Result};
use crate::tree::{
    DescriptorNode, DescriptorTree, NodeKind, PRESENCE_FLAG, PresenceBinding, PresenceFlags,
    PresenceTracker, Replication,
};
use bufrtables::FXY;
use std::sync::Arc;

/// One column of a compressed message, before it is split into observations.
#[derive(Debug, Clone)]
enum Column {
    Leaf {
        /// One template shared by all observations, or one per observation
        /// for values resolved through a bitmap.
        templates: Vec<DescriptorNode>,
        values: Vec<Value>,
        associated: Option<Vec<Option<u64>>>,
    },
    Group {
        name: String,
        fxy: FXY,
        delayed: bool,
        slots: Vec<Vec<Column>>,
    },
}

#[derive(Debug)]
pub struct CompressedData {
    pub observations: Vec<Observation>,
    pub counters: Vec<FieldCounter>,
    pub bits_consumed: usize,
}

/// Reads a compressed Data section column by column.
pub struct CompressedReader<'a> {
    tree: &'a DescriptorTree,
    bits: BitReader<'a>,
    subsets: usize,
    flags: Vec<PresenceFlags>,
    sink: Option<Arc<PresenceTracker>>,
}

impl<'a> CompressedReader<'a> {
    pub fn new(tree: &'a DescriptorTree, data: &'a [u8], subsets: usize) -> Self {
        CompressedReader {
            tree,
            bits: BitReader::new(data),
            subsets,
            flags: vec![PresenceFlags::default(); subsets],
            sink: None,
        }
    }

    pub fn read(mut self) -> Result<CompressedData> {
        let tree = self.tree;
        let mut counters = vec![];
        let columns = self.level(tree.nodes(), &mut counters)?;
        let observations = (0..self.subsets)
            .map(|i| Observation {
                index: i,
                record: transpose(&columns, i),
            })
            .collect();
        Ok(CompressedData {
            observations,
            counters,
            bits_consumed: self.bits.position(),
        })
    }

    fn level(&mut self, nodes: &[DescriptorNode], counters: &mut Vec<FieldCounter>) -> Result<Vec<Column>> {
        let mut columns = Vec::with_capacity(nodes.len());
        let mut opened = None;
        for node in nodes {
            if let Some(PresenceBinding::FlagSource(tracker)) = &node.presence {
                if opened != Some(tracker.id) {
                    opened = Some(tracker.id);
                    let mut extent = vec![];
                    let span = tracker.span.clone();
                    bitmap_extent(&nodes[span.clone()], &columns[span], &mut extent);
                    for flags in self.flags.iter_mut() {
                        flags.begin(tracker, extent.clone());
                    }
                }
            }
            let column = if node.is_leaf() {
                self.leaf(node, counters)?
            } else {
                self.group(node, counters)?
            };
            columns.push(column);
        }
        Ok(columns)
    }

    /// Base value, increment width and per-observation raw values of an
    /// integer column. `None` marks a missing value.
    fn integer_column(&mut self, width: usize, never_missing: bool) -> Result<(usize, Vec<Option<u64>>)> {
        let base = self.bits.read_unsigned(width)?;
        let increment_width = self.bits.read_unsigned(INCREMENT_WIDTH_BITS)? as usize;

        if increment_width == 0 {
            let raw = (never_missing || width == 0 || base != all_ones(width)).then_some(base);
            return Ok((0, vec![raw; self.subsets]));
        }

        let mut raws = Vec::with_capacity(self.subsets);
        for _ in 0..self.subsets {
            let increment = self.bits.read_unsigned(increment_width)?;
            raws.push(if !never_missing && increment == all_ones(increment_width) {
                None
            } else {
                Some(base.saturating_add(increment))
            });
        }
        Ok((increment_width, raws))
    }

    fn character_column(&mut self, node: &DescriptorNode, counters: &mut Vec<FieldCounter>) -> Result<Vec<Value>> {
        let width = node.bit_width as usize;
        let base = self.bits.read_bytes(width / 8)?;
        self.bits.skip(width % 8)?;
        let increment_bytes = self.bits.read_unsigned(INCREMENT_WIDTH_BITS)? as usize;
        counters.push(FieldCounter::leaf(node.fxy, width, increment_bytes, true));

        if increment_bytes == 0 {
            return Ok(vec![character_value(&base); self.subsets]);
        }
        (0..self.subsets)
            .map(|_| self.bits.read_bytes(increment_bytes).map(|b| character_value(&b)))
            .collect()
    }

    fn leaf(&mut self, node: &DescriptorNode, counters: &mut Vec<FieldCounter>) -> Result<Column> {
        let associated = match node.associated_width as usize {
            0 => None,
            width => {
                let (increment_width, raws) = self.integer_column(width, true)?;
                counters.push(FieldCounter::leaf(node.fxy, width, increment_width, false));
                Some(raws)
            }
        };

        if let Some(PresenceBinding::MappedOutput(tracker)) = &node.presence {
            let templates = self.resolve_mapped(node, tracker)?;
            let template = templates.first().cloned().unwrap_or_else(|| node.clone());
            let values = if template.kind == NodeKind::Character {
                self.character_column(&template, counters)?
            } else {
                let width = template.bit_width as usize;
                let (increment_width, raws) = self.integer_column(width, template.is_class31())?;
                counters.push(FieldCounter::leaf(node.fxy, width, increment_width, false));
                raws.iter()
                    .zip(&templates)
                    .map(|(raw, t)| raw.map_or(Value::Missing, |r| numeric_value(t, r)))
                    .collect()
            };
            return Ok(Column::Leaf {
                templates,
                values,
                associated,
            });
        }

        let values = if node.kind == NodeKind::Character {
            self.character_column(node, counters)?
        } else {
            let width = node.bit_width as usize;
            let (increment_width, raws) = self.integer_column(width, node.is_class31())?;
            counters.push(FieldCounter::leaf(node.fxy, width, increment_width, false));

            if node.fxy == PRESENCE_FLAG {
                let tracker = match &node.presence {
                    Some(PresenceBinding::FlagSource(t)) => Some(t.clone()),
                    _ => self.sink.clone(),
                };
                if let Some(tracker) = tracker {
                    for (flags, raw) in self.flags.iter_mut().zip(&raws) {
                        flags.record(&tracker, raw.unwrap_or(1));
                    }
                }
            }
            raws.iter()
                .map(|raw| raw.map_or(Value::Missing, |r| numeric_value(node, r)))
                .collect()
        };

        Ok(Column::Leaf {
            templates: vec![node.clone()],
            values,
            associated,
        })
    }

    /// Resolve a bitmap marker for every observation. All observations must
    /// agree on the width, since the column shares one base value.
    fn resolve_mapped(&mut self, node: &DescriptorNode, tracker: &PresenceTracker) -> Result<Vec<DescriptorNode>> {
        let mut templates = Vec::with_capacity(self.subsets);
        for flags in self.flags.iter_mut() {
            let target = flags.next_mapped(tracker)?;
            templates.push(PresenceTracker::mapped_template(node.fxy.x, target)?);
        }
        if let Some(first) = templates.first() {
            let consistent = templates
                .iter()
                .all(|t| t.bit_width == first.bit_width && t.kind == first.kind);
            if !consistent {
                return Err(Error::Compressed(format!(
                    "marker {} resolves to elements of different widths across observations",
                    node.fxy
                )));
            }
        }
        Ok(templates)
    }

    fn group(&mut self, node: &DescriptorNode, counters: &mut Vec<FieldCounter>) -> Result<Column> {
        let outer = self.sink.clone();
        if let Some(PresenceBinding::FlagSource(tracker)) = &node.presence {
            self.sink = Some(tracker.clone());
        }
        let result = self.replicate(node, counters);
        self.sink = outer;
        result
    }

    fn replicate(&mut self, node: &DescriptorNode, counters: &mut Vec<FieldCounter>) -> Result<Column> {
        let (count, delayed, repetition) = match node.replication {
            Replication::Delayed(c) => {
                let (increment_width, raws) = self.integer_column(c.width as usize, true)?;
                let first = raws.first().copied().flatten().unwrap_or(0);
                if raws.iter().any(|r| *r != Some(first)) {
                    return Err(Error::Compressed(format!(
                        "delayed replication {} has different counts across observations",
                        node.fxy
                    )));
                }
                let bits = DelayedBits {
                    count_width: c.width as usize,
                    increment_width,
                };
                (first as usize, Some(bits), c.repetition)
            }
            Replication::Fixed(n) => (n as usize, None, false),
            Replication::None => (1, None, false),
        };

        let decoded = if repetition { count.min(1) } else { count };
        let mut slots = Vec::with_capacity(count);
        let mut nested = Vec::with_capacity(decoded);
        for _ in 0..decoded {
            let mut slot_counters = vec![];
            slots.push(self.level(&node.children, &mut slot_counters)?);
            nested.push(slot_counters);
        }
        if repetition && count > 1 {
            let body = slots[0].clone();
            slots = vec![body; count];
        }
        counters.push(FieldCounter::group(node.fxy, delayed, nested));

        Ok(Column::Group {
            name: node.name.clone(),
            fxy: node.fxy,
            delayed: node.replication.is_delayed(),
            slots,
        })
    }
}

/// Data elements of `nodes` in the order a data-present bitmap counts them.
/// Delayed counts agree across observations, so the extent is shared.
fn bitmap_extent(nodes: &[DescriptorNode], columns: &[Column], out: &mut Vec<DescriptorNode>) {
    for (node, column) in nodes.iter().zip(columns) {
        match column {
            Column::Leaf { .. } => {
                if node.in_bitmap_extent() {
                    out.push(node.clone());
                }
            }
            Column::Group { slots, .. } => {
                for slot in slots {
                    bitmap_extent(&node.children, slot, out);
                }
            }
        }
    }
}

fn transpose(columns: &[Column], index: usize) -> Record {
    let fields = columns
        .iter()
        .map(|column| match column {
            Column::Leaf {
                templates,
                values,
                associated,
            } => {
                let template = templates.get(index).unwrap_or(&templates[0]);
                let associated = associated.as_ref().and_then(|a| a[index]);
                leaf_field(template, values[index].clone(), associated)
            }
            Column::Group {
                name,
                fxy,
                delayed,
                slots,
            } => {
                let records = slots.iter().map(|slot| transpose(slot, index)).collect();
                Field {
                    name: name.clone(),
                    unit: String::new(),
                    fxy: *fxy,
                    data: if *delayed {
                        FieldData::Sequence(records)
                    } else {
                        FieldData::Group(records)
                    },
                    associated: None,
                }
            }
        })
        .collect();
    Record::new(fields)
}
