//! Traits for the resolver's external collaborators.
//!
//! This module defines [`ConceptStore`], the read-only view of the concept
//! database, and [`ValueSetAuthority`], which resolves nested value-set
//! references by URL.
//!
//! # Example: an in-memory concept store
//!
//! ```ignore
//! use valueset_resolver::{ConceptColumn, ConceptStore, HierarchyEdge, ResolveResult};
//!
//! struct MemoryStore {
//!     codes: HashMap<String, Vec<String>>,
//!     edges: Vec<HierarchyEdge>,
//! }
//!
//! impl ConceptStore for MemoryStore {
//!     fn codes(&self, vocabulary: &str) -> ResolveResult<Vec<String>> {
//!         Ok(self.codes.get(vocabulary).cloned().unwrap_or_default())
//!     }
//!     // ...
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use valueset_model::CodeSet;

use crate::error::{ResolveError, ResolveResult};
use crate::vocabulary::ConceptColumn;

/// A parent/child edge from the concept database's relationship table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HierarchyEdge {
    /// Vocabulary abbreviation the edge belongs to.
    pub vocabulary: String,
    /// Parent code.
    pub parent: String,
    /// Child code.
    pub child: String,
}

impl HierarchyEdge {
    /// Creates an edge.
    pub fn new(
        vocabulary: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            vocabulary: vocabulary.into(),
            parent: parent.into(),
            child: child.into(),
        }
    }
}

/// Read-only access to the backing concept database.
///
/// Vocabularies are addressed by their internal abbreviation (e.g. `LNC`),
/// never by code-system URI. Every method returns an empty Vec when the
/// vocabulary has no matching rows.
///
/// # Required Methods
///
/// - [`codes`](Self::codes) - All codes of a vocabulary
/// - [`codes_by_attribute`](Self::codes_by_attribute) - Codes carrying an attribute value
/// - [`codes_by_column`](Self::codes_by_column) - Codes matching a concept-table column
/// - [`child_edges`](Self::child_edges) - Parent/child edges of a vocabulary
pub trait ConceptStore: Send + Sync {
    /// Gets every code of a vocabulary.
    fn codes(&self, vocabulary: &str) -> ResolveResult<Vec<String>>;

    /// Gets codes whose attribute `attribute` equals any of `values`.
    fn codes_by_attribute(
        &self,
        vocabulary: &str,
        attribute: &str,
        values: &[&str],
    ) -> ResolveResult<Vec<String>>;

    /// Gets codes whose concept-table `column` equals any of `values`.
    fn codes_by_column(
        &self,
        vocabulary: &str,
        column: ConceptColumn,
        values: &[&str],
    ) -> ResolveResult<Vec<String>>;

    /// Gets all child-of edges of a vocabulary in one bulk query.
    fn child_edges(&self, vocabulary: &str) -> ResolveResult<Vec<HierarchyEdge>>;
}

/// Resolves nested value-set references.
///
/// The resolver calls this once per referenced URL and does not cache the
/// answers itself.
pub trait ValueSetAuthority: Send + Sync {
    /// Resolves the value set with the given canonical URL.
    fn resolve(&self, url: &str) -> ResolveResult<Arc<CodeSet>>;
}

impl ValueSetAuthority for HashMap<String, Arc<CodeSet>> {
    fn resolve(&self, url: &str) -> ResolveResult<Arc<CodeSet>> {
        self.get(url)
            .cloned()
            .ok_or_else(|| ResolveError::ValueSetNotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valueset_model::Code;

    #[test]
    fn test_hierarchy_edge_new() {
        let edge = HierarchyEdge::new("SNOMEDCT_US", "100", "200");
        assert_eq!(edge.vocabulary, "SNOMEDCT_US");
        assert_eq!(edge.parent, "100");
        assert_eq!(edge.child, "200");
    }

    #[test]
    fn test_map_authority() {
        let mut authority: HashMap<String, Arc<CodeSet>> = HashMap::new();
        let set: CodeSet = [Code::new("sys", "1")].into_iter().collect();
        authority.insert("http://vs/a".to_string(), Arc::new(set));

        let resolved = authority.resolve("http://vs/a").unwrap();
        assert!(resolved.contains_code("sys", "1"));

        let missing = authority.resolve("http://vs/missing");
        assert!(matches!(missing, Err(ResolveError::ValueSetNotFound(url)) if url == "http://vs/missing"));
    }
}
