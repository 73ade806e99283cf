use std::collections::BTreeMap;
use std::ops::Range;

/// Set of non-overlapping half-open byte ranges already claimed by a rule.
#[derive(Debug, Clone, Default)]
pub struct SpanSet {
    /// start → end
    spans: BTreeMap<usize, usize>,
}

impl SpanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `range` intersects any claimed span. Empty ranges never overlap.
    pub fn overlaps(&self, range: &Range<usize>) -> bool {
        if range.start >= range.end {
            return false;
        }
        // Nearest span starting before the end of `range` is the only candidate.
        self.spans
            .range(..range.end)
            .next_back()
            .is_some_and(|(_, &end)| end > range.start)
    }

    /// Claim `range`. Returns false (and claims nothing) if it overlaps.
    pub fn insert(&mut self, range: Range<usize>) -> bool {
        if range.start >= range.end || self.overlaps(&range) {
            return false;
        }
        self.spans.insert(range.start, range.end);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_spans_accepted() {
        let mut set = SpanSet::new();
        assert!(set.insert(0..5));
        assert!(set.insert(5..8));
        assert!(set.insert(20..25));
        assert!(set.overlaps(&(21..22)));
        assert!(!set.overlaps(&(8..20)));
    }

    #[test]
    fn overlapping_span_rejected() {
        let mut set = SpanSet::new();
        assert!(set.insert(10..20));
        assert!(!set.insert(15..25));
        assert!(!set.insert(5..11));
        assert!(!set.insert(12..13));
        assert!(!set.insert(0..30));
        assert!(set.insert(20..21));
    }

    #[test]
    fn empty_range_never_claimed() {
        let mut set = SpanSet::new();
        assert!(!set.insert(4..4));
        assert!(!set.overlaps(&(0..100)));
    }
}
