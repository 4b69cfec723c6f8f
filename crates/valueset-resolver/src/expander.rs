//! Is-a closure over a vocabulary's parent/child relation.
//!
//! The relation comes from the concept database in one bulk query per
//! vocabulary and is not guaranteed to be acyclic, so traversal is an
//! iterative breadth-first walk with a visited set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};
use valueset_model::{Code, CodeSet};

use crate::cache::AdjacencyCache;
use crate::error::ResolveResult;
use crate::traits::{ConceptStore, HierarchyEdge};

/// Parent-to-children adjacency of one vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    children: HashMap<String, Vec<String>>,
    edge_count: usize,
}

impl Adjacency {
    /// Creates an empty adjacency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the adjacency from raw edges.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = HierarchyEdge>,
    {
        let mut adjacency = Self::new();
        for edge in edges {
            adjacency.add_edge(edge.parent, edge.child);
        }
        adjacency
    }

    /// Records that `child` is a direct child of `parent`.
    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.children
            .entry(parent.into())
            .or_default()
            .push(child.into());
        self.edge_count += 1;
    }

    /// Direct children of a code.
    pub fn children(&self, code: &str) -> &[String] {
        self.children
            .get(code)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of edges recorded, duplicates included.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of codes with at least one child.
    pub fn parent_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if no edges were recorded.
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }

    /// All codes reachable from `root` through child edges, `root` included.
    ///
    /// Each code is marked visited before it is queued, so cycles and
    /// diamonds are walked once.
    pub fn descendants_or_self<'a>(&'a self, root: &'a str) -> HashSet<&'a str> {
        let mut visited: HashSet<&str> = HashSet::with_capacity(64);
        let mut queue: VecDeque<&str> = VecDeque::with_capacity(64);

        visited.insert(root);
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if visited.insert(child.as_str()) {
                    queue.push_back(child.as_str());
                }
            }
        }

        visited
    }
}

/// Expands is-a filters against a [`ConceptStore`].
///
/// # Example
///
/// ```ignore
/// let expander = HierarchyExpander::new(&store);
///
/// // Diabetes mellitus and everything beneath it
/// let codes = expander.descendants_of("http://snomed.info/sct", "SNOMEDCT_US", "73211009")?;
/// ```
pub struct HierarchyExpander<'a> {
    store: &'a dyn ConceptStore,
    cache: Option<&'a AdjacencyCache>,
}

impl<'a> HierarchyExpander<'a> {
    /// Creates an expander that queries the store on every call.
    pub fn new(store: &'a dyn ConceptStore) -> Self {
        Self { store, cache: None }
    }

    /// Creates an expander that reuses adjacency from `cache` when present.
    pub fn with_cache(store: &'a dyn ConceptStore, cache: Option<&'a AdjacencyCache>) -> Self {
        Self { store, cache }
    }

    /// Loads the adjacency of a vocabulary.
    pub fn adjacency(&self, vocabulary: &str) -> ResolveResult<Arc<Adjacency>> {
        if let Some(cache) = self.cache {
            if let Some(adjacency) = cache.get(vocabulary) {
                trace!(vocabulary, "adjacency cache hit");
                return Ok(adjacency);
            }
        }

        let edges = self.store.child_edges(vocabulary)?;
        debug!(vocabulary, edges = edges.len(), "loaded hierarchy edges");
        let adjacency = Arc::new(Adjacency::from_edges(edges));

        if let Some(cache) = self.cache {
            cache.set(vocabulary.to_string(), Arc::clone(&adjacency));
        }
        Ok(adjacency)
    }

    /// Gets `root` and all of its descendants within `vocabulary`.
    ///
    /// Codes are reported under `system`, the code-system URI the vocabulary
    /// was mapped from. The result always contains `root`, even when the
    /// vocabulary has no rows at all.
    pub fn descendants_of(
        &self,
        system: &str,
        vocabulary: &str,
        root: &str,
    ) -> ResolveResult<CodeSet> {
        let adjacency = self.adjacency(vocabulary)?;
        let closure = adjacency.descendants_or_self(root);
        let mut result = CodeSet::with_capacity(closure.len());
        for code in closure {
            result.insert(Code::new(system, code));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::ConceptColumn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SYSTEM: &str = "http://snomed.info/sct";
    const VOCAB: &str = "SNOMEDCT_US";

    /// Mock store that only answers edge queries.
    struct EdgeStore {
        edges: Vec<HierarchyEdge>,
        edge_queries: AtomicUsize,
    }

    impl EdgeStore {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                edges: pairs
                    .iter()
                    .map(|(p, c)| HierarchyEdge::new(VOCAB, *p, *c))
                    .collect(),
                edge_queries: AtomicUsize::new(0),
            }
        }
    }

    impl ConceptStore for EdgeStore {
        fn codes(&self, _vocabulary: &str) -> ResolveResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn codes_by_attribute(
            &self,
            _vocabulary: &str,
            _attribute: &str,
            _values: &[&str],
        ) -> ResolveResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn codes_by_column(
            &self,
            _vocabulary: &str,
            _column: ConceptColumn,
            _values: &[&str],
        ) -> ResolveResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn child_edges(&self, vocabulary: &str) -> ResolveResult<Vec<HierarchyEdge>> {
            self.edge_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .edges
                .iter()
                .filter(|e| e.vocabulary == vocabulary)
                .cloned()
                .collect())
        }
    }

    fn codes(set: &CodeSet) -> Vec<String> {
        set.to_sorted_vec().into_iter().map(|c| c.code).collect()
    }

    /// Creates a test hierarchy:
    /// ```text
    ///        100 (root)
    ///       /   \
    ///     200   300
    ///    /   \    \
    ///  400  500   600
    ///  /
    /// 700
    /// ```
    fn tree_store() -> EdgeStore {
        EdgeStore::new(&[
            ("100", "200"),
            ("100", "300"),
            ("200", "400"),
            ("200", "500"),
            ("300", "600"),
            ("400", "700"),
        ])
    }

    #[test]
    fn test_descendants_of_root() {
        let store = tree_store();
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "100").unwrap();
        assert_eq!(
            codes(&result),
            vec!["100", "200", "300", "400", "500", "600", "700"]
        );
        assert!(result.iter().all(|c| c.system == SYSTEM));
    }

    #[test]
    fn test_descendants_of_intermediate_node() {
        let store = tree_store();
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "200").unwrap();
        assert_eq!(codes(&result), vec!["200", "400", "500", "700"]);
    }

    #[test]
    fn test_leaf_is_reflexive() {
        let store = tree_store();
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "700").unwrap();
        assert_eq!(codes(&result), vec!["700"]);
    }

    #[test]
    fn test_unknown_root_is_reflexive() {
        let store = tree_store();
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "999").unwrap();
        assert_eq!(codes(&result), vec!["999"]);
    }

    #[test]
    fn test_empty_vocabulary_is_reflexive() {
        let store = tree_store();
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of("http://loinc.org", "LNC", "1234-5").unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_code("http://loinc.org", "1234-5"));
    }

    #[test]
    fn test_cycle_terminates() {
        // A -> B -> C -> A, B -> D
        let store = EdgeStore::new(&[("A", "B"), ("B", "C"), ("C", "A"), ("B", "D")]);
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "A").unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(codes(&result), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_self_loop_terminates() {
        let store = EdgeStore::new(&[("A", "A"), ("A", "B")]);
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "A").unwrap();
        assert_eq!(codes(&result), vec!["A", "B"]);
    }

    #[test]
    fn test_diamond_no_duplicates() {
        //     100
        //    /   \
        //  200   300
        //    \   /
        //     400
        let store = EdgeStore::new(&[
            ("100", "200"),
            ("100", "300"),
            ("200", "400"),
            ("300", "400"),
        ]);
        let expander = HierarchyExpander::new(&store);

        let result = expander.descendants_of(SYSTEM, VOCAB, "100").unwrap();
        assert_eq!(codes(&result), vec!["100", "200", "300", "400"]);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let pairs: Vec<(String, String)> = (0..50_000)
            .map(|i| (i.to_string(), (i + 1).to_string()))
            .collect();
        let mut adjacency = Adjacency::new();
        for (parent, child) in &pairs {
            adjacency.add_edge(parent.as_str(), child.as_str());
        }

        let closure = adjacency.descendants_or_self("0");
        assert_eq!(closure.len(), 50_001);
    }

    #[test]
    fn test_single_bulk_query_per_expansion() {
        let store = tree_store();
        let expander = HierarchyExpander::new(&store);

        expander.descendants_of(SYSTEM, VOCAB, "100").unwrap();
        assert_eq!(store.edge_queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_avoids_second_query() {
        let store = tree_store();
        let cache = AdjacencyCache::with_capacity(4, std::time::Duration::from_secs(60));
        let expander = HierarchyExpander::with_cache(&store, Some(&cache));

        expander.descendants_of(SYSTEM, VOCAB, "100").unwrap();
        expander.descendants_of(SYSTEM, VOCAB, "200").unwrap();
        assert_eq!(store.edge_queries.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_adjacency_counts() {
        let adjacency = Adjacency::from_edges(vec![
            HierarchyEdge::new(VOCAB, "1", "2"),
            HierarchyEdge::new(VOCAB, "1", "3"),
            HierarchyEdge::new(VOCAB, "2", "3"),
        ]);
        assert_eq!(adjacency.edge_count(), 3);
        assert_eq!(adjacency.parent_count(), 2);
        assert_eq!(adjacency.children("1"), &["2".to_string(), "3".to_string()]);
        assert!(adjacency.children("3").is_empty());
        assert!(!adjacency.is_empty());
    }
}
