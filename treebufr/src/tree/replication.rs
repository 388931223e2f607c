use super::{DelayedCount, DescriptorNode, NodeKind, Replication};
use crate::errors::{Error, Result};
use bufrtables::FXY;
use std::collections::VecDeque;

/// Width of the count field for a delayed replication factor descriptor,
/// and whether it encodes a repetition rather than a replication.
fn delayed_count(fxy: FXY) -> Result<DelayedCount> {
    if fxy.f != 0 || fxy.x != 31 {
        return Err(Error::UnknownDelayedCount(fxy));
    }
    let (width, repetition) = match fxy.y {
        0 => (1, false),
        1 => (8, false),
        2 => (16, false),
        11 => (8, true),
        12 => (16, true),
        31 => (1, false),
        _ => return Err(Error::UnknownDelayedCount(fxy)),
    };
    Ok(DelayedCount {
        fxy,
        width,
        repetition,
    })
}

/// Attach to every replication operator the X descriptors following it,
/// consuming the count descriptor of a delayed replication.
pub fn resolve(nodes: Vec<DescriptorNode>) -> Result<Vec<DescriptorNode>> {
    let mut queue: VecDeque<DescriptorNode> = nodes.into();
    let mut out = Vec::with_capacity(queue.len());

    while let Some(mut node) = queue.pop_front() {
        if !node.fxy.is_replication() {
            if node.kind == NodeKind::Compound {
                node.children = resolve(std::mem::take(&mut node.children))?;
            }
            out.push(node);
            continue;
        }

        let fxy = node.fxy;
        node.replication = if fxy.y == 0 {
            let count = queue.pop_front().ok_or_else(|| Error::Structure {
                fxy,
                reason: "delayed replication without a count descriptor".to_string(),
            })?;
            Replication::Delayed(delayed_count(count.fxy)?)
        } else {
            Replication::Fixed(fxy.y as u32)
        };

        let span = fxy.x as usize;
        if queue.len() < span {
            return Err(Error::Structure {
                fxy,
                reason: format!(
                    "replicates {} descriptors but only {} follow",
                    span,
                    queue.len()
                ),
            });
        }
        let body: Vec<DescriptorNode> = queue.drain(..span).collect();
        node.children = resolve(body)?;
        out.push(node);
    }

    Ok(out)
}
