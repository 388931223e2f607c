use super::DescriptorNode;
use crate::errors::{Error, Result, Warning};
use bufrtables::{FXY, TableKey, TableLookup};

/// Resolve every descriptor against the tables, expanding sequences in place.
///
/// Unknown element or sequence descriptors become `bad` nodes and add a note;
/// a sequence that contains itself is an error.
pub fn expand(
    descriptors: &[FXY],
    tables: &dyn TableLookup,
    key: &TableKey,
    notes: &mut Vec<Warning>,
) -> Result<Vec<DescriptorNode>> {
    let mut visiting = vec![];
    descriptors
        .iter()
        .map(|fxy| expand_one(*fxy, tables, key, &mut visiting, notes))
        .collect()
}

fn expand_one(
    fxy: FXY,
    tables: &dyn TableLookup,
    key: &TableKey,
    visiting: &mut Vec<FXY>,
    notes: &mut Vec<Warning>,
) -> Result<DescriptorNode> {
    match fxy.f {
        0 => Ok(match tables.element(key, fxy) {
            Some(entry) => DescriptorNode::from_element(&entry),
            None => {
                notes.push(Warning::MissingDescriptor(fxy));
                DescriptorNode::missing(fxy)
            }
        }),
        1 => Ok(DescriptorNode::replicator(fxy)),
        2 => Ok(DescriptorNode::operator(fxy)),
        _ => {
            if visiting.contains(&fxy) {
                return Err(Error::CyclicSequence(fxy));
            }
            let Some(entry) = tables.sequence(key, fxy) else {
                notes.push(Warning::MissingDescriptor(fxy));
                let mut node = DescriptorNode::compound(fxy, format!("Unknown sequence {}", fxy), vec![]);
                node.bad = true;
                return Ok(node);
            };

            visiting.push(fxy);
            let children = entry
                .chain
                .iter()
                .map(|child| expand_one(*child, tables, key, visiting, notes))
                .collect::<Result<Vec<_>>>();
            visiting.pop();

            Ok(DescriptorNode::compound(fxy, entry.title(), children?))
        }
    }
}
