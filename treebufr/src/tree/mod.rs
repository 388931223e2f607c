//! Descriptor tree construction.
//!
//! A message's flat descriptor list is turned into a tree whose leaves carry
//! their final bit width, scale and reference value. Construction runs as a
//! chain of passes, each taking the previous snapshot by value:
//!
//! 1. [`expand`]: Table B/D lookup, recursive sequence expansion
//! 2. [`rewrite::preflatten`]: splice `3-60-YYY` wrappers around a replication
//! 3. [`rewrite::infer_names`]: name `1-01-YYY` groups after their sequence
//! 4. [`replication::resolve`]: attach replicated descriptors to their operator
//! 5. [`rewrite::flatten_compounds`]: drop sequence nodes
//! 6. [`operators::apply`]: fold Table C operators left to right
//! 7. [`DescriptorNode::bit_count`]: static size estimate

pub mod cache;
pub mod expand;
pub mod operators;
pub mod presence;
pub mod replication;
pub mod rewrite;

pub use cache::{SchemaKey, TreeCache};
pub use presence::{PresenceBinding, PresenceFlags, PresenceTracker};

use crate::errors::{Error, Result, Warning};
use bufrtables::{ElementEntry, ElementKind, FXY, TableKey, TableLookup};
use std::fmt::Display;

/// Data-present indicator descriptor, one per bitmap position.
pub const PRESENCE_FLAG: FXY = FXY::new(0, 31, 31);
/// Associated field significance.
pub const ASSOCIATED_SIGNIFICANCE: FXY = FXY::new(0, 31, 21);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum NodeKind {
    Numeric,
    Character,
    Enumerated,
    Compound,
    Operator,
}

impl From<ElementKind> for NodeKind {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Numeric => NodeKind::Numeric,
            ElementKind::Character => NodeKind::Character,
            ElementKind::Enumerated => NodeKind::Enumerated,
        }
    }
}

/// Count field of a delayed replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedCount {
    pub fxy: FXY,
    pub width: u32,
    /// `0-31-011`/`0-31-012`: the body is encoded once and repeated.
    pub repetition: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    None,
    Fixed(u32),
    Delayed(DelayedCount),
}

impl Replication {
    /// 1 for a plain node, the count for a fixed replication, 0 when the
    /// count is carried in the data.
    pub fn replication_count(&self) -> u32 {
        match self {
            Replication::None => 1,
            Replication::Fixed(n) => *n,
            Replication::Delayed(_) => 0,
        }
    }

    pub fn is_delayed(&self) -> bool {
        matches!(self, Replication::Delayed(_))
    }
}

#[derive(Debug, Clone)]
pub struct DescriptorNode {
    pub fxy: FXY,
    pub name: String,
    pub unit: String,
    pub kind: NodeKind,
    pub bit_width: u32,
    pub scale: i32,
    pub reference: i64,
    pub replication: Replication,
    pub children: Vec<DescriptorNode>,
    /// Width of the associated field read before this leaf, 0 for none.
    pub associated_width: u32,
    pub presence: Option<PresenceBinding>,
    /// No table entry was found for this descriptor.
    pub bad: bool,
}

impl DescriptorNode {
    fn bare(fxy: FXY, name: impl Into<String>, kind: NodeKind) -> Self {
        DescriptorNode {
            fxy,
            name: name.into(),
            unit: String::new(),
            kind,
            bit_width: 0,
            scale: 0,
            reference: 0,
            replication: Replication::None,
            children: vec![],
            associated_width: 0,
            presence: None,
            bad: false,
        }
    }

    pub fn from_element(entry: &ElementEntry) -> Self {
        DescriptorNode {
            unit: entry.unit.clone(),
            bit_width: entry.width,
            scale: entry.scale,
            reference: entry.reference,
            ..Self::bare(entry.fxy, entry.name.clone(), entry.kind().into())
        }
    }

    pub fn compound(fxy: FXY, name: impl Into<String>, children: Vec<DescriptorNode>) -> Self {
        DescriptorNode {
            children,
            ..Self::bare(fxy, name, NodeKind::Compound)
        }
    }

    pub fn operator(fxy: FXY) -> Self {
        Self::bare(fxy, format!("Operator {}", fxy), NodeKind::Operator)
    }

    /// A replication operator before its descriptors are attached.
    pub fn replicator(fxy: FXY) -> Self {
        let name = if fxy.y == 0 {
            "Delayed replication"
        } else {
            "Replication"
        };
        Self::bare(fxy, name, NodeKind::Compound)
    }

    pub fn missing(fxy: FXY) -> Self {
        DescriptorNode {
            bad: true,
            ..Self::bare(fxy, format!("Unknown descriptor {}", fxy), NodeKind::Numeric)
        }
    }

    pub fn character(fxy: FXY, name: impl Into<String>, width: u32) -> Self {
        DescriptorNode {
            bit_width: width,
            unit: "CCITT IA5".to_string(),
            ..Self::bare(fxy, name, NodeKind::Character)
        }
    }

    pub fn root(children: Vec<DescriptorNode>) -> Self {
        Self::compound(FXY::new(0, 0, 0), "root", children)
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self.kind, NodeKind::Compound | NodeKind::Operator)
    }

    pub fn is_class31(&self) -> bool {
        self.fxy.f == 0 && self.fxy.x == 31
    }

    /// Whether `raw` is the all-ones missing marker for this leaf.
    pub fn is_missing(&self, raw: u64) -> bool {
        !self.is_class31() && self.bit_width > 0 && raw == crate::bits::all_ones(self.bit_width as usize)
    }

    pub fn is_flag_source(&self) -> bool {
        matches!(self.presence, Some(PresenceBinding::FlagSource(_)))
    }

    pub fn is_mapped_output(&self) -> bool {
        matches!(self.presence, Some(PresenceBinding::MappedOutput(_)))
    }

    /// Whether a data-present bitmap counts this leaf. Class 31 fields and
    /// values inserted by operators have no position.
    pub fn in_bitmap_extent(&self) -> bool {
        self.fxy.f != 2 && !self.is_class31()
    }

    /// Static bit count: delayed replications contribute only their count field.
    pub fn bit_count(&self) -> usize {
        if self.is_leaf() {
            return self.associated_width as usize + self.bit_width as usize;
        }
        let body: usize = self.children.iter().map(|c| c.bit_count()).sum();
        match self.replication {
            Replication::None => body,
            Replication::Fixed(n) => n as usize * body,
            Replication::Delayed(count) => count.width as usize,
        }
    }

    /// Depth-first leaves below this node.
    pub fn leaves(&self) -> Vec<&DescriptorNode> {
        let mut out = vec![];
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a DescriptorNode>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let pad = depth * 2;
        if self.is_leaf() {
            write!(
                f,
                "{:pad$}{} {:<40} width={:<3} scale={:<3} ref={}",
                "", self.fxy, self.name, self.bit_width, self.scale, self.reference
            )?;
            if self.associated_width > 0 {
                write!(f, " assoc={}", self.associated_width)?;
            }
            match &self.presence {
                Some(PresenceBinding::FlagSource(t)) => write!(f, " [flags #{}]", t.id)?,
                Some(PresenceBinding::MappedOutput(t)) => write!(f, " [mapped #{}]", t.id)?,
                None => {}
            }
            if self.bad {
                write!(f, " (BAD)")?;
            }
            return writeln!(f);
        }

        let repl = match self.replication {
            Replication::None => String::new(),
            Replication::Fixed(n) => format!(" x{}", n),
            Replication::Delayed(c) if c.repetition => format!(" x[{} bits, repeated]", c.width),
            Replication::Delayed(c) => format!(" x[{} bits]", c.width),
        };
        write!(f, "{:pad$}{} {}{}", "", self.fxy, self.name, repl)?;
        if let Some(PresenceBinding::FlagSource(t)) = &self.presence {
            write!(f, " [flags #{}]", t.id)?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// The expanded form of one descriptor list under one table key.
#[derive(Debug)]
pub struct DescriptorTree {
    pub root: DescriptorNode,
    pub total_bits: usize,
    /// Some descriptor could not be resolved; decoded values are not trustworthy.
    pub bad: bool,
    pub notes: Vec<Warning>,
    pub descriptors: Vec<FXY>,
    pub key: TableKey,
}

impl DescriptorTree {
    pub fn build(descriptors: &[FXY], tables: &dyn TableLookup, key: &TableKey) -> Result<Self> {
        let mut notes = vec![];
        let nodes = expand::expand(descriptors, tables, key, &mut notes)?;
        let nodes = rewrite::preflatten(nodes);
        let nodes = rewrite::infer_names(nodes);
        let nodes = replication::resolve(nodes)?;
        let nodes = rewrite::flatten_compounds(nodes);
        let nodes = operators::apply(nodes, &mut notes);
        let root = DescriptorNode::root(nodes);

        for leaf in root.leaves() {
            if leaf.kind != NodeKind::Character && leaf.bit_width > 64 {
                return Err(Error::Structure {
                    fxy: leaf.fxy,
                    reason: format!("effective width {} exceeds 64 bits", leaf.bit_width),
                });
            }
        }

        let bad = notes
            .iter()
            .any(|n| matches!(n, Warning::MissingDescriptor(_) | Warning::UnboundMarker(_)));

        Ok(DescriptorTree {
            total_bits: root.bit_count(),
            root,
            bad,
            notes,
            descriptors: descriptors.to_vec(),
            key: *key,
        })
    }

    pub fn nodes(&self) -> &[DescriptorNode] {
        &self.root.children
    }

    pub fn leaves(&self) -> Vec<&DescriptorNode> {
        self.root.leaves()
    }

    pub fn has_delayed_replication(&self) -> bool {
        fn walk(node: &DescriptorNode) -> bool {
            node.replication.is_delayed() || node.children.iter().any(walk)
        }
        walk(&self.root)
    }
}

impl Display for DescriptorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Descriptor tree ({} top-level descriptors, {} static bits{})",
            self.descriptors.len(),
            self.total_bits,
            if self.bad { ", INCOMPLETE" } else { "" }
        )?;
        for node in self.nodes() {
            node.fmt_indented(f, 1)?;
        }
        for note in &self.notes {
            writeln!(f, "  note: {}", note)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{key, store};
    use super::*;

    #[test]
    fn test_build_plain_tree() {
        let tree = DescriptorTree::build(
            &[FXY::new(3, 1, 11), FXY::new(0, 12, 101)],
            &store(),
            &key(),
        )
        .unwrap();
        let leaves: Vec<FXY> = tree.leaves().iter().map(|n| n.fxy).collect();
        assert_eq!(
            leaves,
            vec![FXY::new(0, 4, 1), FXY::new(0, 4, 2), FXY::new(0, 12, 101)]
        );
        assert_eq!(tree.total_bits, 12 + 4 + 16);
        assert!(!tree.bad);
    }

    #[test]
    fn test_missing_descriptor_marks_tree_bad() {
        let tree =
            DescriptorTree::build(&[FXY::new(0, 12, 101), FXY::new(0, 63, 9)], &store(), &key())
                .unwrap();
        assert!(tree.bad);
        assert!(tree.nodes()[1].bad);
        assert_eq!(tree.notes, vec![Warning::MissingDescriptor(FXY::new(0, 63, 9))]);
    }

    #[test]
    fn test_delayed_bit_count_uses_count_width() {
        let tree = DescriptorTree::build(
            &[
                FXY::new(1, 2, 0),
                FXY::new(0, 31, 2),
                FXY::new(0, 7, 4),
                FXY::new(0, 12, 101),
                FXY::new(1, 1, 3),
                FXY::new(0, 4, 2),
            ],
            &store(),
            &key(),
        )
        .unwrap();
        assert_eq!(tree.total_bits, 16 + 3 * 4);
        assert!(tree.has_delayed_replication());
    }

    #[test]
    fn test_width_over_64_is_rejected() {
        let err = DescriptorTree::build(
            &[FXY::new(2, 1, 128 + 60), FXY::new(0, 12, 101)],
            &store(),
            &key(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Structure { .. }));
    }
}
