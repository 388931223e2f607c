use crate::config::DecoderConfig;
use crate::counters::BitBudget;
use crate::embedded::EmbeddedTables;
use crate::errors::{Error, Result, Warning};
use crate::message::{Message, Schema};
use crate::parser::{self, Scanned, SkippedMessage};
use crate::reader::Observation;
use crate::tree::{DescriptorTree, TreeCache};
use bufrtables::{TableLookup, TableStore};
use std::path::Path;
use std::sync::Arc;

/// A data message together with everything decoded from it.
#[derive(Debug)]
pub struct DecodedMessage {
    pub message: Message,
    pub tree: Arc<DescriptorTree>,
    pub observations: Vec<Observation>,
    pub budget: BitBudget,
    /// Some descriptor was not found in the tables.
    pub incomplete: bool,
    /// Same descriptors, center, category and subcategory as the first
    /// data message of the stream.
    pub same_schema: bool,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
pub enum StreamEvent {
    Decoded(DecodedMessage),
    TablesLoaded {
        offset: usize,
        elements: usize,
        sequences: usize,
    },
    Skipped(SkippedMessage),
    Rejected {
        offset: usize,
        error: Error,
    },
}

/// Drives table lookup, tree construction and data decoding over a stream
/// of messages.
pub struct Decoder {
    tables: Arc<dyn TableLookup>,
    cache: Arc<TreeCache>,
    config: DecoderConfig,
    prototype: Option<Schema>,
}

impl Decoder {
    pub fn new(tables: Arc<dyn TableLookup>, config: DecoderConfig) -> Self {
        Decoder {
            tables,
            cache: Arc::new(TreeCache::new()),
            config,
            prototype: None,
        }
    }

    /// Open the table directory named by the configuration.
    pub fn from_config(config: DecoderConfig) -> Result<Self> {
        let store = match &config.tables_path {
            Some(path) => TableStore::open(path)?,
            None => TableStore::open_default()?,
        };
        Ok(Self::new(Arc::new(store), config))
    }

    /// Share a tree cache with other decoders.
    pub fn with_cache(mut self, cache: Arc<TreeCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn tables(&self) -> &Arc<dyn TableLookup> {
        &self.tables
    }

    pub fn cache(&self) -> &Arc<TreeCache> {
        &self.cache
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn prototype(&self) -> Option<&Schema> {
        self.prototype.as_ref()
    }

    /// The message's tree, from the shared cache when possible.
    pub fn tree_for(&self, message: &Message) -> Result<Arc<DescriptorTree>> {
        if let Some(tree) = message.cached_tree() {
            return Ok(tree.clone());
        }
        let tree = self.cache.get_or_build(
            message.descriptors(),
            self.tables.as_ref(),
            &message.table_key(),
        )?;
        Ok(message.attach_tree(tree))
    }

    pub fn decode_message(&mut self, message: Message) -> Result<DecodedMessage> {
        let tree = self.tree_for(&message)?;
        if tree.bad && self.config.reject_incomplete_schema {
            let missing: Vec<String> = tree
                .notes
                .iter()
                .filter(|n| matches!(n, Warning::MissingDescriptor(_) | Warning::UnboundMarker(_)))
                .map(|n| n.to_string())
                .collect();
            return Err(Error::IncompleteSchema(missing.join("; ")));
        }

        let decoded = message.decode_all(&tree)?;
        let mut warnings = message.warnings().to_vec();
        warnings.extend(tree.notes.iter().cloned());

        if self.config.validate_bit_count {
            decoded.budget.check(self.config.bit_count_tolerance_bytes)?;
            if decoded.budget.slack().unsigned_abs() > 1 {
                warnings.push(Warning::BitCountSlack {
                    consumed_bits: decoded.budget.consumed_bits,
                    declared_bytes: decoded.budget.declared_bytes,
                });
            }
        }

        let schema = message.schema();
        let same_schema = match &self.prototype {
            Some(prototype) => *prototype == schema,
            None => {
                self.prototype = Some(schema);
                true
            }
        };

        Ok(DecodedMessage {
            incomplete: tree.bad,
            message,
            tree,
            observations: decoded.observations,
            budget: decoded.budget,
            same_schema,
            warnings,
        })
    }

    /// Decode a table message and register its entries for later messages
    /// with the same local table key.
    pub fn load_embedded_tables(&self, message: &Message) -> Result<(usize, usize)> {
        let tree = self.tree_for(message)?;
        let decoded = message.decode_all(&tree)?;
        let embedded = EmbeddedTables::from_observations(&decoded.observations);
        if embedded.is_empty() {
            return Ok((0, 0));
        }

        let key = message.table_key();
        let counts = embedded.apply(self.tables.as_ref(), &key);
        self.cache.invalidate(&key.local_key());
        eprintln!(
            "Loaded {} elements and {} sequences from table message at offset {}",
            counts.0,
            counts.1,
            message.offset()
        );
        Ok(counts)
    }

    pub fn process(&mut self, scanned: Scanned) -> StreamEvent {
        let message = match scanned {
            Scanned::Message(message) => message,
            Scanned::Skipped(skipped) => return StreamEvent::Skipped(skipped),
        };
        let offset = message.offset();

        if message.is_table_message() && self.config.apply_embedded_tables {
            return match self.load_embedded_tables(&message) {
                Ok((elements, sequences)) => StreamEvent::TablesLoaded {
                    offset,
                    elements,
                    sequences,
                },
                Err(error) => StreamEvent::Rejected { offset, error },
            };
        }

        match self.decode_message(message) {
            Ok(decoded) => StreamEvent::Decoded(decoded),
            Err(error) => {
                eprintln!("Warning: Rejected message at offset {}: {}", offset, error);
                StreamEvent::Rejected { offset, error }
            }
        }
    }

    pub fn decode_bytes<'d>(&'d mut self, bytes: &'d [u8]) -> impl Iterator<Item = StreamEvent> + 'd {
        parser::scan_bytes(bytes).map(move |scanned| self.process(scanned))
    }

    pub fn decode_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<StreamEvent>> {
        let source = parser::open(path)?;
        Ok(self.decode_bytes(source.bytes()).collect())
    }
}
