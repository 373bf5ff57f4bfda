//! Reverse index: source commit → commits referencing it.

use std::collections::HashMap;

use crate::storage::CommitId;

/// Commit-keyed aggregation of reference edges for one pass.
///
/// Each source maps to the destinations that reference it, in the order they
/// were first recorded, without duplicates. Sources are enumerated in the
/// order they were first inserted, independent of hash map iteration order,
/// so identical traversals render identical notes.
#[derive(Debug, Default, Clone)]
pub struct ReverseIndex {
    destinations: HashMap<CommitId, Vec<CommitId>>,
    sources: Vec<CommitId>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `destination` references `source`.
    ///
    /// Returns `false` if the edge was already present.
    pub fn insert(&mut self, source: CommitId, destination: CommitId) -> bool {
        let sources = &mut self.sources;
        let list = self.destinations.entry(source).or_insert_with(|| {
            sources.push(source);
            Vec::new()
        });

        if list.contains(&destination) {
            return false;
        }
        list.push(destination);
        true
    }

    /// destinations recorded for `source`, or `None` if it was never inserted
    pub fn entries_for(&self, source: &CommitId) -> Option<&[CommitId]> {
        self.destinations.get(source).map(Vec::as_slice)
    }

    pub fn contains_edge(&self, source: &CommitId, destination: &CommitId) -> bool {
        self.entries_for(source)
            .is_some_and(|list| list.contains(destination))
    }

    /// number of distinct sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// total number of distinct edges
    pub fn edge_count(&self) -> usize {
        self.destinations.values().map(Vec::len).sum()
    }

    /// sources in first-insertion order
    pub fn sources(&self) -> &[CommitId] {
        &self.sources
    }

    /// `(source, destinations)` pairs in first-insertion order of sources
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            position: 0,
        }
    }
}

/// Iterator over a [`ReverseIndex`] in source insertion order.
pub struct Iter<'a> {
    index: &'a ReverseIndex,
    position: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (CommitId, &'a [CommitId]);

    fn next(&mut self) -> Option<Self::Item> {
        let source = *self.index.sources.get(self.position)?;
        self.position += 1;
        let destinations = self.index.entries_for(&source)?;
        Some((source, destinations))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.index.sources.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<'a> IntoIterator for &'a ReverseIndex {
    type Item = (CommitId, &'a [CommitId]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u8) -> CommitId {
        CommitId::from_hex(&format!("{:040x}", n)).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = ReverseIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.entries_for(&id(1)), None);

        assert!(index.insert(id(1), id(2)));
        assert!(index.insert(id(1), id(3)));
        assert_eq!(index.entries_for(&id(1)), Some(&[id(2), id(3)][..]));
        assert_eq!(index.len(), 1);
        assert_eq!(index.edge_count(), 2);
        assert!(index.contains_edge(&id(1), &id(3)));
        assert!(!index.contains_edge(&id(3), &id(1)));
    }

    #[test]
    fn test_duplicate_edge_is_ignored() {
        let mut index = ReverseIndex::new();
        assert!(index.insert(id(1), id(2)));
        assert!(!index.insert(id(1), id(2)));
        assert_eq!(index.entries_for(&id(1)).unwrap().len(), 1);
        assert_eq!(index.sources(), &[id(1)]);
    }

    #[test]
    fn test_enumeration_follows_first_insertion() {
        let mut index = ReverseIndex::new();
        index.insert(id(9), id(1));
        index.insert(id(3), id(2));
        index.insert(id(9), id(4));
        index.insert(id(5), id(6));

        let order: Vec<_> = index.iter().map(|(source, _)| source).collect();
        assert_eq!(order, vec![id(9), id(3), id(5)]);

        let (_, first) = index.iter().next().unwrap();
        assert_eq!(first, &[id(1), id(4)]);
        assert_eq!(index.iter().size_hint(), (3, Some(3)));
    }

    proptest! {
        #[test]
        fn prop_lists_are_duplicate_free(edges in prop::collection::vec((0u8..8, 0u8..8), 0..64)) {
            let mut index = ReverseIndex::new();
            for (s, d) in &edges {
                index.insert(id(*s), id(*d));
            }
            for (_, list) in &index {
                let mut sorted = list.to_vec();
                sorted.sort();
                sorted.dedup();
                prop_assert_eq!(sorted.len(), list.len());
            }
            let mut distinct = edges.clone();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(index.edge_count(), distinct.len());
        }

        #[test]
        fn prop_same_input_same_enumeration(edges in prop::collection::vec((0u8..16, 0u8..16), 0..64)) {
            let build = || {
                let mut index = ReverseIndex::new();
                for (s, d) in &edges {
                    index.insert(id(*s), id(*d));
                }
                index.iter().map(|(s, l)| (s, l.to_vec())).collect::<Vec<_>>()
            };
            prop_assert_eq!(build(), build());
        }

        #[test]
        fn prop_sources_in_first_seen_order(edges in prop::collection::vec((0u8..16, 0u8..16), 1..64)) {
            let mut index = ReverseIndex::new();
            let mut expected = Vec::new();
            for (s, d) in &edges {
                if !expected.contains(&id(*s)) {
                    expected.push(id(*s));
                }
                index.insert(id(*s), id(*d));
            }
            prop_assert_eq!(index.sources(), &expected[..]);
        }
    }
}
