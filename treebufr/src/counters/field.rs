use bufrtables::FXY;

/// Width of the per-column increment field.
pub const INCREMENT_WIDTH_BITS: usize = 6;

/// Count column of a delayed replication in a compressed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedBits {
    pub count_width: usize,
    pub increment_width: usize,
}

/// Bits taken by one column of a compressed message.
///
/// A leaf column stores a base value, a 6-bit increment width and one
/// increment per observation; character increments are counted in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCounter {
    pub fxy: FXY,
    pub base_width: usize,
    pub increment_width: usize,
    pub character: bool,
    pub delayed: Option<DelayedBits>,
    /// Columns of each decoded repeat of a replication.
    pub nested: Vec<Vec<FieldCounter>>,
}

impl FieldCounter {
    pub fn leaf(fxy: FXY, base_width: usize, increment_width: usize, character: bool) -> Self {
        FieldCounter {
            fxy,
            base_width,
            increment_width,
            character,
            delayed: None,
            nested: vec![],
        }
    }

    pub fn group(fxy: FXY, delayed: Option<DelayedBits>, nested: Vec<Vec<FieldCounter>>) -> Self {
        FieldCounter {
            fxy,
            base_width: 0,
            increment_width: 0,
            character: false,
            delayed,
            nested,
        }
    }

    pub fn is_group(&self) -> bool {
        self.delayed.is_some() || !self.nested.is_empty()
    }

    pub fn total_bits(&self, subsets: usize) -> usize {
        if !self.is_group() {
            let unit = if self.character { 8 } else { 1 };
            return self.base_width + INCREMENT_WIDTH_BITS + self.increment_width * unit * subsets;
        }

        let count = self
            .delayed
            .map(|d| d.count_width + INCREMENT_WIDTH_BITS + d.increment_width * subsets)
            .unwrap_or(0);
        let body: usize = self
            .nested
            .iter()
            .flatten()
            .map(|c| c.total_bits(subsets))
            .sum();
        count + body
    }
}

pub fn total_bits(counters: &[FieldCounter], subsets: usize) -> usize {
    counters.iter().map(|c| c.total_bits(subsets)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_columns() {
        let numeric = FieldCounter::leaf(FXY::new(0, 12, 101), 16, 5, false);
        assert_eq!(numeric.total_bits(4), 16 + 6 + 20);
        let constant = FieldCounter::leaf(FXY::new(0, 12, 101), 16, 0, false);
        assert_eq!(constant.total_bits(4), 22);
        let text = FieldCounter::leaf(FXY::new(0, 1, 15), 64, 8, true);
        assert_eq!(text.total_bits(2), 64 + 6 + 128);
    }

    #[test]
    fn test_delayed_group() {
        let body = vec![FieldCounter::leaf(FXY::new(0, 7, 4), 14, 0, false)];
        let group = FieldCounter::group(
            FXY::new(1, 1, 0),
            Some(DelayedBits {
                count_width: 8,
                increment_width: 0,
            }),
            vec![body.clone(), body],
        );
        assert_eq!(group.total_bits(3), 8 + 6 + 2 * 20);
        assert_eq!(total_bits(&[group.clone(), group], 3), 2 * 54);
    }
}
