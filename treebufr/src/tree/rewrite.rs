use super::DescriptorNode;

/// Splice `3-60-YYY` sequences whose first descriptor is a replication into
/// their parent, so the replication sees the descriptors that follow the
/// wrapper.
pub fn preflatten(nodes: Vec<DescriptorNode>) -> Vec<DescriptorNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        node.children = preflatten(std::mem::take(&mut node.children));
        let wraps_replication = node.fxy.f == 3
            && node.fxy.x == 60
            && node.children.first().is_some_and(|c| c.fxy.is_replication());
        if wraps_replication {
            out.extend(node.children);
        } else {
            out.push(node);
        }
    }
    out
}

/// A `1-01-YYY` replication of a single sequence takes the sequence's name.
/// For delayed replication the count descriptor sits in between.
pub fn infer_names(mut nodes: Vec<DescriptorNode>) -> Vec<DescriptorNode> {
    for i in 0..nodes.len() {
        let fxy = nodes[i].fxy;
        if fxy.f != 1 || fxy.x != 1 {
            continue;
        }
        let target = if fxy.y == 0 { i + 2 } else { i + 1 };
        if let Some(next) = nodes.get(target).filter(|n| n.fxy.is_sequence() && !n.name.is_empty()) {
            let name = next.name.clone();
            nodes[i].name = name;
        }
    }

    nodes
        .into_iter()
        .map(|mut node| {
            node.children = infer_names(std::mem::take(&mut node.children));
            node
        })
        .collect()
}

/// Replace sequence nodes with their children. Replication nodes stay.
pub fn flatten_compounds(nodes: Vec<DescriptorNode>) -> Vec<DescriptorNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        let children = flatten_compounds(std::mem::take(&mut node.children));
        if node.fxy.is_sequence() {
            out.extend(children);
        } else {
            node.children = children;
            out.push(node);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::expand::expand;
    use crate::tree::fixtures::{key, store};
    use bufrtables::FXY;

    fn expanded(descriptors: &[FXY]) -> Vec<DescriptorNode> {
        let mut notes = vec![];
        expand(descriptors, &store(), &key(), &mut notes).unwrap()
    }

    #[test]
    fn test_preflatten_splices_wrapper() {
        let nodes = preflatten(expanded(&[FXY::new(3, 60, 1), FXY::new(0, 12, 101)]));
        let fxys: Vec<FXY> = nodes.iter().map(|n| n.fxy).collect();
        assert_eq!(
            fxys,
            vec![FXY::new(1, 1, 3), FXY::new(0, 7, 4), FXY::new(0, 12, 101)]
        );
    }

    #[test]
    fn test_preflatten_keeps_other_sequences() {
        let nodes = preflatten(expanded(&[FXY::new(3, 1, 11)]));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].fxy, FXY::new(3, 1, 11));
    }

    #[test]
    fn test_infer_names_fixed_and_delayed() {
        let nodes = infer_names(expanded(&[
            FXY::new(1, 1, 4),
            FXY::new(3, 3, 50),
            FXY::new(1, 1, 0),
            FXY::new(0, 31, 1),
            FXY::new(3, 1, 11),
            FXY::new(1, 1, 2),
            FXY::new(0, 12, 101),
        ]));
        assert_eq!(nodes[0].name, "Wind data");
        assert_eq!(nodes[2].name, "Year, month");
        assert_eq!(nodes[5].name, "Replication");
    }

    #[test]
    fn test_flatten_compounds() {
        let nodes = flatten_compounds(expanded(&[FXY::new(3, 1, 11), FXY::new(0, 12, 101)]));
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n.is_leaf()));
    }
}
