//! Data-present bitmaps and the operators that refer back through them.

use super::{DescriptorNode, NodeKind};
use crate::errors::{Error, Result};
use rustc_hash::FxHashMap;
use std::ops::Range;
use std::sync::Arc;

/// A backward reference created by a data-present operator (`2-22-000`,
/// `2-23-000`, `2-24-000`, `2-25-000`, `2-32-000`, `2-36-000`, `2-37-000`).
///
/// `span` selects the nodes of the tracker's level whose data elements the
/// bitmap positions refer to. Replications inside it are expanded while the
/// data is decoded, so the extent can differ between observations.
#[derive(Debug)]
pub struct PresenceTracker {
    pub id: usize,
    /// Trackers reusing a defined bitmap share its `bitmap` id.
    pub bitmap: usize,
    pub operator: u8,
    pub span: Range<usize>,
}

impl PresenceTracker {
    /// The element a marker at `marker_x` reads in place of `target`.
    pub fn mapped_template(marker_x: u8, target: &DescriptorNode) -> Result<DescriptorNode> {
        let mut node = target.clone();
        node.presence = None;
        node.associated_width = 0;
        match marker_x {
            23 => node.name = format!("Substituted {}", target.name),
            24 => node.name = format!("First-order statistic of {}", target.name),
            25 => {
                node.name = format!("Difference statistic of {}", target.name);
                node.reference = -(1i64 << target.bit_width.min(62));
                node.bit_width += 1;
            }
            32 => node.name = format!("Replaced {}", target.name),
            _ => {}
        }
        if node.kind != NodeKind::Character && node.bit_width > 64 {
            return Err(Error::Structure {
                fxy: target.fxy,
                reason: format!(
                    "difference statistic needs {} bits, more than 64",
                    node.bit_width
                ),
            });
        }
        Ok(node)
    }
}

#[derive(Debug, Clone)]
pub enum PresenceBinding {
    /// This node supplies the `0-31-031` flags for the tracker.
    FlagSource(Arc<PresenceTracker>),
    /// This leaf reads the next present element of the tracker's bitmap.
    MappedOutput(Arc<PresenceTracker>),
}

#[derive(Debug, Default, Clone)]
struct Bitmap {
    extent: Vec<DescriptorNode>,
    present: Vec<usize>,
    seen: usize,
}

/// Flags decoded for one observation.
#[derive(Debug, Default, Clone)]
pub struct PresenceFlags {
    bitmaps: FxHashMap<usize, Bitmap>,
    cursors: FxHashMap<usize, usize>,
}

impl PresenceFlags {
    /// Start the bitmap of `tracker` over the decoded elements in `extent`,
    /// discarding flags from an earlier pass over the same bitmap.
    pub fn begin(&mut self, tracker: &PresenceTracker, extent: Vec<DescriptorNode>) {
        self.bitmaps.insert(
            tracker.bitmap,
            Bitmap {
                extent,
                ..Default::default()
            },
        );
        self.cursors.remove(&tracker.id);
    }

    /// Record the next flag; 0 means the element is present.
    pub fn record(&mut self, tracker: &PresenceTracker, flag: u64) {
        let bitmap = self.bitmaps.entry(tracker.bitmap).or_default();
        if flag == 0 {
            bitmap.present.push(bitmap.seen);
        }
        bitmap.seen += 1;
    }

    pub fn present(&self, tracker: &PresenceTracker) -> &[usize] {
        self.bitmaps
            .get(&tracker.bitmap)
            .map(|b| b.present.as_slice())
            .unwrap_or(&[])
    }

    /// The element the next marker of `tracker` refers to.
    pub fn next_mapped(&mut self, tracker: &PresenceTracker) -> Result<&DescriptorNode> {
        let cursor = self.cursors.entry(tracker.id).or_insert(0);
        let position = *cursor;
        *cursor += 1;

        let missing = || {
            Error::DataPresence(format!(
                "marker {} of bitmap #{} has no present element",
                position + 1,
                tracker.bitmap
            ))
        };
        let bitmap = self.bitmaps.get(&tracker.bitmap).ok_or_else(missing)?;
        let index = bitmap.present.get(position).copied().ok_or_else(missing)?;

        bitmap.extent.get(index).ok_or_else(|| {
            Error::DataPresence(format!(
                "bitmap #{} position {} is outside its {} referenced elements",
                tracker.bitmap,
                index,
                bitmap.extent.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bufrtables::{ElementEntry, FXY};

    fn element(y: u8, width: u32) -> DescriptorNode {
        DescriptorNode::from_element(&ElementEntry::new(
            FXY::new(0, 12, y),
            format!("Element {}", y),
            "K",
            1,
            0,
            width,
        ))
    }

    fn extent() -> Vec<DescriptorNode> {
        (1..=3).map(|y| element(y, 12)).collect()
    }

    fn tracker(id: usize, bitmap: usize) -> PresenceTracker {
        PresenceTracker {
            id,
            bitmap,
            operator: 23,
            span: 0..3,
        }
    }

    #[test]
    fn test_mapped_outputs_follow_present_flags() {
        let t = tracker(0, 0);
        let mut flags = PresenceFlags::default();
        flags.begin(&t, extent());
        for flag in [0, 1, 0] {
            flags.record(&t, flag);
        }
        assert_eq!(flags.present(&t), &[0, 2]);
        assert_eq!(flags.next_mapped(&t).unwrap().fxy, FXY::new(0, 12, 1));
        assert_eq!(flags.next_mapped(&t).unwrap().fxy, FXY::new(0, 12, 3));
        assert!(matches!(flags.next_mapped(&t), Err(Error::DataPresence(_))));
    }

    #[test]
    fn test_reused_bitmap_has_its_own_cursor() {
        let defined = tracker(0, 0);
        let reuse = tracker(1, 0);
        let mut flags = PresenceFlags::default();
        flags.begin(&defined, extent());
        flags.record(&defined, 1);
        flags.record(&defined, 0);
        assert_eq!(flags.next_mapped(&defined).unwrap().fxy, FXY::new(0, 12, 2));
        assert_eq!(flags.next_mapped(&reuse).unwrap().fxy, FXY::new(0, 12, 2));
    }

    #[test]
    fn test_flags_beyond_the_extent() {
        let t = tracker(0, 0);
        let mut flags = PresenceFlags::default();
        flags.begin(&t, extent()[..1].to_vec());
        flags.record(&t, 1);
        flags.record(&t, 0);
        let err = flags.next_mapped(&t).unwrap_err();
        assert!(err.to_string().contains("outside its 1 referenced elements"));
    }

    #[test]
    fn test_difference_statistics_template() {
        let node = PresenceTracker::mapped_template(25, &element(1, 12)).unwrap();
        assert_eq!(node.bit_width, 13);
        assert_eq!(node.reference, -4096);
    }

    #[test]
    fn test_difference_statistics_of_a_64_bit_element() {
        let err = PresenceTracker::mapped_template(25, &element(1, 64)).unwrap_err();
        assert!(matches!(err, Error::Structure { .. }));
        assert_eq!(
            PresenceTracker::mapped_template(23, &element(1, 64)).unwrap().bit_width,
            64
        );
    }
}
