use crate::counters::{BitBudget, DATA_SECTION_HEADER};
use crate::errors::{Error, Result, Warning};
use crate::reader::{Observation, ObservationIter};
use crate::structs::versions::{BUFRMessage, Identification, MessageVersion};
use crate::tree::DescriptorTree;
use bufrtables::{FXY, TableKey, TableLookup};
use std::fmt::Display;
use std::sync::{Arc, OnceLock};

/// Length of the Indicator section.
const SECTION0_LEN: usize = 8;

/// Fields that decide whether two messages share a layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    pub descriptors: Vec<FXY>,
    pub center: u16,
    pub category: u8,
    pub subcategory: u8,
}

/// All observations of a message plus the bit accounting of the decode.
#[derive(Debug)]
pub struct DecodedData {
    pub observations: Vec<Observation>,
    pub budget: BitBudget,
}

/// One framed and parsed BUFR message.
#[derive(Debug, Clone)]
pub struct Message {
    offset: usize,
    length: usize,
    body: BUFRMessage,
    warnings: Vec<Warning>,
    tree: OnceLock<Arc<DescriptorTree>>,
}

impl Message {
    /// Parse the sections of a message. `bytes` starts at the `BUFR` marker;
    /// `length` is the effective length after terminator tolerance.
    pub fn parse(bytes: &[u8], offset: usize, length: usize) -> Result<Self> {
        let body = BUFRMessage::parse(bytes)?;
        Ok(Message {
            offset,
            length,
            body,
            warnings: vec![],
            tree: OnceLock::new(),
        })
    }

    /// Byte offset of the message within its source.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn declared_length(&self) -> usize {
        self.body.section0().total_length
    }

    pub fn edition(&self) -> u8 {
        self.body.edition()
    }

    pub fn body(&self) -> &BUFRMessage {
        &self.body
    }

    pub fn identification(&self) -> Identification {
        self.body.identification()
    }

    pub fn descriptors(&self) -> &[FXY] {
        self.body.descriptors()
    }

    pub fn subsets(&self) -> usize {
        self.body.subsets_count() as usize
    }

    pub fn is_compressed(&self) -> bool {
        self.body.data_description().is_compressed
    }

    pub fn is_observed(&self) -> bool {
        self.body.data_description().is_observation
    }

    pub fn table_key(&self) -> TableKey {
        let id = self.identification();
        TableKey {
            master_table: id.master_table,
            center: id.center,
            subcenter: id.subcenter,
            master_version: id.master_table_version,
            local_version: id.local_table_version,
            category: id.category,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Offset and length of Section 2, relative to the message start.
    pub fn optional_section(&self) -> Option<(usize, usize)> {
        self.body
            .optional_section()
            .map(|s| (SECTION0_LEN + self.body.section1_length(), s.length))
    }

    pub fn optional_data(&self) -> Option<&[u8]> {
        self.body.optional_section().map(|s| s.data.as_slice())
    }

    /// Offset of Section 4, relative to the message start.
    pub fn data_section_offset(&self) -> usize {
        SECTION0_LEN
            + self.body.section1_length()
            + self.optional_section().map_or(0, |(_, len)| len)
            + self.body.data_description().length
    }

    /// Declared length of Section 4, header included.
    pub fn data_section_length(&self) -> usize {
        self.body.data_section().length
    }

    /// Section 4 payload, header excluded.
    pub fn data(&self) -> &[u8] {
        self.body.data_block()
    }

    pub fn schema(&self) -> Schema {
        let id = self.identification();
        Schema {
            descriptors: self.descriptors().to_vec(),
            center: id.center,
            category: id.category,
            subcategory: id.subcategory,
        }
    }

    pub fn same_schema(&self, other: &Message) -> bool {
        self.schema() == other.schema()
    }

    /// Whether the message carries table entries (Table B/D descriptors in
    /// class 0 or sequence group 0, or data category 11) rather than data.
    pub fn is_table_message(&self) -> bool {
        self.identification().category == 11
            || self
                .descriptors()
                .iter()
                .any(|d| (d.f == 0 && d.x == 0 && d.y < 13) || (d.f == 3 && d.x == 0))
    }

    pub fn is_data_message(&self) -> bool {
        !self.is_table_message()
    }

    /// The descriptor tree, built on first use.
    pub fn tree(&self, tables: &dyn TableLookup) -> Result<Arc<DescriptorTree>> {
        if let Some(tree) = self.tree.get() {
            return Ok(tree.clone());
        }
        let tree = Arc::new(DescriptorTree::build(self.descriptors(), tables, &self.table_key())?);
        Ok(self.tree.get_or_init(|| tree).clone())
    }

    /// Use a tree built elsewhere (e.g. from a shared cache). Ignored if a
    /// tree was already attached.
    pub fn attach_tree(&self, tree: Arc<DescriptorTree>) -> Arc<DescriptorTree> {
        self.tree.get_or_init(|| tree).clone()
    }

    pub fn cached_tree(&self) -> Option<&Arc<DescriptorTree>> {
        self.tree.get()
    }

    fn check_tree(&self, tree: &DescriptorTree) -> Result<()> {
        if tree.descriptors != self.descriptors() {
            return Err(Error::Structure {
                fxy: self.descriptors().first().copied().unwrap_or(FXY::new(0, 0, 0)),
                reason: "descriptor tree was built for a different descriptor list".to_string(),
            });
        }
        Ok(())
    }

    pub fn decode<'a>(&'a self, tree: &'a DescriptorTree) -> Result<ObservationIter<'a>> {
        self.check_tree(tree)?;
        ObservationIter::new(tree, self.data(), self.subsets(), self.is_compressed())
    }

    pub fn decode_all(&self, tree: &DescriptorTree) -> Result<DecodedData> {
        let mut iter = self.decode(tree)?;
        let observations = iter.by_ref().collect::<Result<Vec<_>>>()?;
        Ok(DecodedData {
            observations,
            budget: BitBudget::new(iter.bits_consumed(), self.data_section_length()),
        })
    }

    /// Decode everything and compare the bits used with the declared size.
    pub fn validate_bit_count(&self, tree: &DescriptorTree, tolerance_bytes: usize) -> Result<BitBudget> {
        let decoded = self.decode_all(tree)?;
        decoded.budget.check(tolerance_bytes)?;
        Ok(decoded.budget)
    }

    /// Bits the data section has room for.
    pub fn data_bits(&self) -> usize {
        self.data_section_length().saturating_sub(DATA_SECTION_HEADER) * 8
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Message at offset {} ({} bytes)", self.offset, self.length)?;
        writeln!(f, "{}", self.body)?;
        writeln!(f)?;
        writeln!(f, "Section 3:")?;
        writeln!(f, "  Subsets:             {}", self.subsets())?;
        writeln!(f, "  Observed:            {}", self.is_observed())?;
        writeln!(f, "  Compressed:          {}", self.is_compressed())?;
        let descriptors: Vec<String> = self.descriptors().iter().map(|d| d.to_string()).collect();
        writeln!(f, "  Descriptors:         {}", descriptors.join(" "))?;
        write!(f, "Section 4: {} bytes", self.data_section_length())?;
        for warning in &self.warnings {
            write!(f, "\n  warning: {}", warning)?;
        }
        Ok(())
    }
}
