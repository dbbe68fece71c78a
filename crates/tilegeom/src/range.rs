//! Compact sets of integers stored as sorted inclusive ranges.
//!
//! Used for filled rows per tile column: at z14 a single ocean polygon can
//! fill millions of tiles, so rows are never materialized one by one.

/// Sorted, disjoint, non-adjacent inclusive ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<(i32, i32)>,
}

impl RangeSet {
    #[inline] pub fn new() -> Self { Self::default() }
    #[inline] pub fn is_empty(&self) -> bool { self.ranges.is_empty() }
    #[inline] pub fn ranges(&self) -> &[(i32, i32)] { &self.ranges }

    /// Number of integers in the set.
    pub fn count(&self) -> u64 { self.ranges.iter().map(|&(lo, hi)| (i64::from(hi) - i64::from(lo) + 1) as u64).sum() }

    /// Add `lo..=hi`, merging with overlapping or adjacent ranges.
    pub fn add(&mut self, lo: i32, hi: i32) {
        if lo > hi {
            return;
        }
        let (mut lo, mut hi) = (lo, hi);
        let start = self.ranges.partition_point(|&(_, end)| end < lo.saturating_sub(1));
        let mut end = start;
        while end < self.ranges.len() && self.ranges[end].0 <= hi.saturating_add(1) {
            lo = lo.min(self.ranges[end].0);
            hi = hi.max(self.ranges[end].1);
            end += 1;
        }
        self.ranges.splice(start..end, [(lo, hi)]);
    }

    pub fn add_all(&mut self, other: &RangeSet) {
        for &(lo, hi) in &other.ranges {
            self.add(lo, hi);
        }
    }

    /// Remove `lo..=hi`, splitting ranges that straddle it.
    pub fn remove(&mut self, lo: i32, hi: i32) {
        if lo > hi || self.ranges.is_empty() {
            return;
        }
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for &(start, end) in &self.ranges {
            if end < lo || start > hi {
                kept.push((start, end));
                continue;
            }
            if start < lo {
                kept.push((start, lo - 1));
            }
            if end > hi {
                kept.push((hi + 1, end));
            }
        }
        self.ranges = kept;
    }

    pub fn remove_all(&mut self, other: &RangeSet) {
        for &(lo, hi) in &other.ranges {
            self.remove(lo, hi);
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        let idx = self.ranges.partition_point(|&(_, end)| end < value);
        self.ranges.get(idx).is_some_and(|&(start, _)| start <= value)
    }

    /// Values present in both sets.
    pub fn intersect(&self, other: &RangeSet) -> RangeSet {
        let (a, b) = (&self.ranges, &other.ranges);
        let (mut i, mut j) = (0, 0);
        let mut ranges = Vec::new();
        while i < a.len() && j < b.len() {
            let lo = a[i].0.max(b[j].0);
            let hi = a[i].1.min(b[j].1);
            if lo <= hi {
                ranges.push((lo, hi));
            }
            if a[i].1 < b[j].1 { i += 1 } else { j += 1 }
        }
        RangeSet { ranges }
    }

    /// Every value in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ { self.ranges.iter().flat_map(|&(lo, hi)| lo..=hi) }
}
