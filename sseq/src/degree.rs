use crate::model::ClassId;
use std::collections::{BTreeMap, HashMap};

/// Bidegree and stem lookup plus the per-bidegree occupancy counters that
/// hand out `idx` values. Classes are never removed, so neither is anything
/// in here.
#[derive(Clone, Debug, Default)]
pub struct DegreeIndex {
    by_degree: HashMap<(i32, i32), Vec<ClassId>>,
    by_stem: BTreeMap<i32, Vec<ClassId>>,
    counts: HashMap<(i32, i32), usize>,
}

impl DegreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count for `(x, y)` and bumps it.
    pub fn next_index_for(&mut self, x: i32, y: i32) -> usize {
        let n = self.counts.entry((x, y)).or_insert(0);
        let idx = *n;
        *n += 1;
        idx
    }

    pub(crate) fn insert(&mut self, x: i32, y: i32, id: ClassId) {
        self.by_degree.entry((x, y)).or_default().push(id);
        self.by_stem.entry(x).or_default().push(id);
    }

    /// Classes in `(x, y)`, creation order.
    pub fn classes_at(&self, x: i32, y: i32) -> &[ClassId] {
        self.by_degree.get(&(x, y)).map_or(&[], Vec::as_slice)
    }

    /// Classes with first coordinate `x`, creation order.
    pub fn stem(&self, x: i32) -> &[ClassId] {
        self.by_stem.get(&x).map_or(&[], Vec::as_slice)
    }

    pub fn count(&self, x: i32, y: i32) -> usize {
        self.counts.get(&(x, y)).copied().unwrap_or(0)
    }

    /// Occupied bidegrees, sorted.
    pub fn degrees(&self) -> Vec<(i32, i32)> {
        let mut out: Vec<(i32, i32)> = self.by_degree.keys().copied().collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_bidegree() {
        let mut idx = DegreeIndex::new();
        assert_eq!(idx.next_index_for(0, 0), 0);
        assert_eq!(idx.next_index_for(0, 0), 1);
        assert_eq!(idx.next_index_for(1, 0), 0);
        assert_eq!(idx.count(0, 0), 2);
        assert_eq!(idx.count(5, 5), 0);
    }

    #[test]
    fn stem_collects_all_filtrations() {
        let mut idx = DegreeIndex::new();
        idx.insert(2, 0, ClassId(0));
        idx.insert(2, 3, ClassId(1));
        idx.insert(3, 0, ClassId(2));
        assert_eq!(idx.stem(2), &[ClassId(0), ClassId(1)]);
        assert_eq!(idx.classes_at(2, 3), &[ClassId(1)]);
        assert!(idx.classes_at(9, 9).is_empty());
        assert_eq!(idx.degrees(), vec![(2, 0), (2, 3), (3, 0)]);
    }
}
