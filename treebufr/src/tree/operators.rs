//! Table C operator fold.
//!
//! Operators are consumed left to right against an explicit [`OperatorState`].
//! A replication body is folded with a copy of the state at the point the
//! replication starts; changes made inside the body do not leak out.

use super::presence::{PresenceBinding, PresenceTracker};
use super::{DescriptorNode, NodeKind, PRESENCE_FLAG};
use crate::errors::Warning;
use bufrtables::FXY;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct PresenceState {
    /// First node a new bitmap refers to: the level start or the node after
    /// the last `2-35-000`.
    start: usize,
    /// Set when the first bitmap opens; later bitmaps share the same nodes.
    end: Option<usize>,
    current: Option<Arc<PresenceTracker>>,
    defined: Option<Arc<PresenceTracker>>,
    awaiting_flags: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OperatorState {
    width_delta: i32,
    scale_delta: i32,
    reference_delta: i64,
    /// `2-07-YYY` increase of scale, reference and width.
    increase: u8,
    next_width: Option<u32>,
    character_width: Option<u32>,
    associated: Vec<u32>,
    presence: PresenceState,
}

struct FoldContext<'n> {
    next_tracker: usize,
    notes: &'n mut Vec<Warning>,
}

pub fn apply(nodes: Vec<DescriptorNode>, notes: &mut Vec<Warning>) -> Vec<DescriptorNode> {
    let mut ctx = FoldContext {
        next_tracker: 0,
        notes,
    };
    fold_level(nodes, OperatorState::default(), &mut ctx)
}

fn fold_level(
    nodes: Vec<DescriptorNode>,
    mut state: OperatorState,
    ctx: &mut FoldContext,
) -> Vec<DescriptorNode> {
    let mut out = Vec::with_capacity(nodes.len());

    for mut node in nodes {
        match node.kind {
            NodeKind::Operator => {
                if let Some(leaf) = apply_operator(node.fxy, out.len(), &mut state, ctx) {
                    out.push(leaf);
                }
            }
            NodeKind::Compound => {
                let mut inner = state.clone();
                inner.presence.start = 0;
                inner.presence.end = None;
                inner.presence.awaiting_flags = false;
                node.children = fold_level(std::mem::take(&mut node.children), inner, ctx);

                let is_flags = contains_flags(&node);
                bind_flags(&mut node, &mut state, is_flags);
                out.push(node);
            }
            _ => {
                apply_to_leaf(&mut node, &mut state, ctx);
                let is_flags = node.fxy == PRESENCE_FLAG;
                bind_flags(&mut node, &mut state, is_flags);
                out.push(node);
            }
        }
    }

    out
}

/// Bitmap flags directly follow the operator that opened the tracker.
fn bind_flags(node: &mut DescriptorNode, state: &mut OperatorState, is_flags: bool) {
    if !state.presence.awaiting_flags {
        return;
    }
    match (&state.presence.current, is_flags) {
        (Some(tracker), true) => {
            node.presence = Some(PresenceBinding::FlagSource(tracker.clone()));
        }
        _ => state.presence.awaiting_flags = false,
    }
}

fn contains_flags(node: &DescriptorNode) -> bool {
    node.leaves().iter().any(|leaf| leaf.fxy == PRESENCE_FLAG)
}

fn apply_to_leaf(node: &mut DescriptorNode, state: &mut OperatorState, ctx: &mut FoldContext) {
    let class31 = node.is_class31();

    if let Some(width) = state.next_width.take() {
        node.bit_width = width;
        if node.bad {
            node.bad = false;
            node.kind = NodeKind::Numeric;
            node.name = "Unknown local descriptor".to_string();
            let missing = Warning::MissingDescriptor(node.fxy);
            if let Some(i) = ctx.notes.iter().position(|n| *n == missing) {
                ctx.notes.remove(i);
            }
        }
    } else {
        match node.kind {
            NodeKind::Numeric if !class31 => {
                if state.increase > 0 {
                    let y = state.increase as u32;
                    node.scale += y as i32;
                    node.reference = node.reference.saturating_mul(10i64.saturating_pow(y));
                    node.bit_width += (10 * y + 2) / 3;
                }
                node.bit_width = (node.bit_width as i64 + state.width_delta as i64).max(0) as u32;
                node.scale += state.scale_delta;
                node.reference += state.reference_delta;
            }
            NodeKind::Enumerated if !class31 => {
                node.bit_width = (node.bit_width as i64 + state.width_delta as i64).max(0) as u32;
            }
            NodeKind::Character => {
                if let Some(width) = state.character_width {
                    node.bit_width = width;
                }
            }
            _ => {}
        }
    }

    if !class31 {
        node.associated_width = state.associated.iter().sum();
    }
}

/// Update the state for one operator found before the node at `position`.
/// Returns a leaf when the operator itself carries data.
fn apply_operator(
    fxy: FXY,
    position: usize,
    state: &mut OperatorState,
    ctx: &mut FoldContext,
) -> Option<DescriptorNode> {
    match (fxy.x, fxy.y) {
        (1, 0) => state.width_delta = 0,
        (1, y) => state.width_delta = y as i32 - 128,
        (2, 0) => state.scale_delta = 0,
        (2, y) => state.scale_delta = y as i32 - 128,
        (3, 0) | (3, 255) => state.reference_delta = 0,
        (3, y) => state.reference_delta = y as i64 - 128,
        (4, 0) => {
            state.associated.pop();
        }
        (4, y) => state.associated.push(y as u32),
        (5, y) => {
            return Some(DescriptorNode::character(
                fxy,
                "Character insertion",
                y as u32 * 8,
            ));
        }
        (6, y) => state.next_width = Some(y as u32),
        (7, y) => state.increase = y,
        (8, 0) => state.character_width = None,
        (8, y) => state.character_width = Some(y as u32 * 8),
        (22 | 23 | 24 | 25 | 32, 0) => {
            open_tracker(fxy.x, position, state, ctx);
        }
        (36, 0) => {
            let tracker = open_tracker(fxy.x, position, state, ctx);
            state.presence.defined = Some(tracker);
        }
        (37, 0) => match state.presence.defined.clone() {
            Some(defined) => {
                let id = ctx.next_tracker;
                ctx.next_tracker += 1;
                state.presence.current = Some(Arc::new(PresenceTracker {
                    id,
                    bitmap: defined.bitmap,
                    operator: fxy.x,
                    span: defined.span.clone(),
                }));
                state.presence.awaiting_flags = false;
            }
            None => ctx.notes.push(Warning::IgnoredOperator(fxy)),
        },
        (37, 255) => {
            state.presence.defined = None;
            state.presence.current = None;
        }
        (35, 0) => {
            state.presence = PresenceState {
                start: position,
                defined: state.presence.defined.take(),
                ..Default::default()
            };
        }
        (23 | 24 | 25 | 32, 255) => return Some(marker(fxy, state, ctx)),
        _ => ctx.notes.push(Warning::IgnoredOperator(fxy)),
    }
    None
}

fn open_tracker(
    operator: u8,
    position: usize,
    state: &mut OperatorState,
    ctx: &mut FoldContext,
) -> Arc<PresenceTracker> {
    let id = ctx.next_tracker;
    ctx.next_tracker += 1;
    let end = *state.presence.end.get_or_insert(position);
    let tracker = Arc::new(PresenceTracker {
        id,
        bitmap: id,
        operator,
        span: state.presence.start..end,
    });
    state.presence.current = Some(tracker.clone());
    state.presence.awaiting_flags = true;
    tracker
}

fn marker(fxy: FXY, state: &OperatorState, ctx: &mut FoldContext) -> DescriptorNode {
    let name = match fxy.x {
        23 => "Substituted value",
        24 => "First-order statistical value",
        25 => "Difference statistical value",
        _ => "Replaced/retained value",
    };
    let mut node = DescriptorNode::operator(fxy);
    node.kind = NodeKind::Numeric;
    node.name = name.to_string();
    match &state.presence.current {
        Some(tracker) => node.presence = Some(PresenceBinding::MappedOutput(tracker.clone())),
        None => {
            ctx.notes.push(Warning::UnboundMarker(fxy));
            node.bad = true;
        }
    }
    node
}
