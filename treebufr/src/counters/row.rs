/// Bits taken by one field of an uncompressed observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBits {
    Leaf(usize),
    /// A replication: the count field (0 for fixed) and one counter per
    /// decoded repeat.
    Replicated {
        count_bits: usize,
        rows: Vec<RowCounter>,
    },
}

impl FieldBits {
    pub fn bits(&self) -> usize {
        match self {
            FieldBits::Leaf(bits) => *bits,
            FieldBits::Replicated { count_bits, rows } => {
                count_bits + rows.iter().map(RowCounter::count_bits).sum::<usize>()
            }
        }
    }
}

/// Per-field bit widths of one uncompressed observation, filled while the
/// observation is decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCounter {
    start: usize,
    fields: Vec<FieldBits>,
}

impl RowCounter {
    pub fn new(start: usize) -> Self {
        RowCounter {
            start,
            fields: vec![],
        }
    }

    /// Bit offset of the observation within the Data section payload.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn fields(&self) -> &[FieldBits] {
        &self.fields
    }

    pub(crate) fn push_leaf(&mut self, bits: usize) {
        self.fields.push(FieldBits::Leaf(bits));
    }

    pub(crate) fn push_replicated(&mut self, count_bits: usize, rows: Vec<RowCounter>) {
        self.fields.push(FieldBits::Replicated { count_bits, rows });
    }

    pub fn count_bits(&self) -> usize {
        self.fields.iter().map(FieldBits::bits).sum()
    }

    pub fn end(&self) -> usize {
        self.start + self.count_bits()
    }

    /// Bit offset of field `index`, relative to the payload start.
    pub fn field_offset(&self, index: usize) -> Option<usize> {
        if index >= self.fields.len() {
            return None;
        }
        Some(self.start + self.fields[..index].iter().map(FieldBits::bits).sum::<usize>())
    }
}
