//! Resolution of one code system under at most one filter.
//!
//! Static code systems are answered by the [`CodeSystemRegistry`]. Anything
//! else must map to a concept-database vocabulary; the filter is then planned
//! into a [`ConceptQuery`] before any store call is made, so an operator or
//! property that cannot be expressed never reaches the database.

use tracing::{debug, trace};
use valueset_model::{CodeSet, Filter, FilterOperator};

use crate::cache::AdjacencyCache;
use crate::error::{ResolveError, ResolveResult};
use crate::expander::HierarchyExpander;
use crate::registry::CodeSystemRegistry;
use crate::traits::ConceptStore;
use crate::vocabulary::{attribute_for, vocabulary_for, ConceptColumn};

/// A validated store query for one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConceptQuery<'f> {
    /// Every code of the vocabulary.
    All,
    /// Codes whose mapped attribute equals any of the values.
    Attribute {
        /// Attribute-table name.
        attribute: &'static str,
        /// Accepted values.
        values: Vec<&'f str>,
    },
    /// Codes whose concept-table column equals any of the values.
    Column {
        /// Allow-listed column.
        column: ConceptColumn,
        /// Accepted values.
        values: Vec<&'f str>,
    },
    /// The root and all of its descendants.
    Subsumption {
        /// Root code.
        root: &'f str,
    },
}

impl<'f> ConceptQuery<'f> {
    /// Plans the query for a filter over `system`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::UnsupportedFilterOperation`] for operators other than
    ///   `=`, `in` and `is-a`.
    /// - [`ResolveError::UnsupportedFilterProperty`] when an `=`/`in` property
    ///   is neither a mapped attribute nor an allow-listed column.
    pub fn plan(system: &str, filter: Option<&'f Filter>) -> ResolveResult<Self> {
        let Some(filter) = filter else {
            return Ok(ConceptQuery::All);
        };

        check_operator(system, filter)?;

        match filter.op {
            FilterOperator::IsA => Ok(ConceptQuery::Subsumption {
                root: filter.value.trim(),
            }),
            _ => {
                let values = filter.values();
                if let Some(attribute) = attribute_for(&filter.property) {
                    Ok(ConceptQuery::Attribute { attribute, values })
                } else if let Some(column) = ConceptColumn::from_property(&filter.property) {
                    Ok(ConceptQuery::Column { column, values })
                } else {
                    Err(ResolveError::UnsupportedFilterProperty {
                        property: filter.property.clone(),
                        system: system.to_string(),
                    })
                }
            }
        }
    }
}

/// Operators the concept database can answer.
fn check_operator(system: &str, filter: &Filter) -> ResolveResult<()> {
    match filter.op {
        FilterOperator::Equal | FilterOperator::In | FilterOperator::IsA => Ok(()),
        ref op => Err(ResolveError::unsupported_operation(op.as_str(), system)),
    }
}

/// Turns `(system, filter)` pairs into code sets.
///
/// # Example
///
/// ```ignore
/// let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);
///
/// // All LOINC codes whose class type is 2
/// let codes = engine.resolve_system("http://loinc.org", Some(&Filter::equal("CLASSTYPE", "2")))?;
/// ```
pub struct FilterEngine<'a> {
    registry: &'a CodeSystemRegistry,
    store: &'a dyn ConceptStore,
    cache: Option<&'a AdjacencyCache>,
}

impl<'a> FilterEngine<'a> {
    /// Creates an engine without an adjacency cache.
    pub fn new(registry: &'a CodeSystemRegistry, store: &'a dyn ConceptStore) -> Self {
        Self {
            registry,
            store,
            cache: None,
        }
    }

    /// Reuses hierarchy adjacency across is-a filters.
    pub fn with_cache(mut self, cache: Option<&'a AdjacencyCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Resolves `system`, optionally narrowed by `filter`.
    ///
    /// Checks run in a fixed order: static registry, operator, vocabulary
    /// mapping, property. A mapped vocabulary with no rows yields an empty set.
    pub fn resolve_system(&self, system: &str, filter: Option<&Filter>) -> ResolveResult<CodeSet> {
        if self.registry.contains(system) {
            trace!(system, "resolving static code system");
            return self.registry.load(system, filter);
        }

        if let Some(filter) = filter {
            check_operator(system, filter)?;
        }

        let vocabulary = vocabulary_for(system)
            .ok_or_else(|| ResolveError::UnknownCodeSystem(system.to_string()))?;

        let query = ConceptQuery::plan(system, filter)?;
        self.execute(system, vocabulary, query)
    }

    /// Runs a planned query against the store.
    pub fn execute(
        &self,
        system: &str,
        vocabulary: &str,
        query: ConceptQuery<'_>,
    ) -> ResolveResult<CodeSet> {
        debug!(system, vocabulary, ?query, "querying concept store");
        let codes = match query {
            ConceptQuery::All => self.store.codes(vocabulary)?,
            ConceptQuery::Attribute { values, .. } | ConceptQuery::Column { values, .. }
                if values.is_empty() =>
            {
                Vec::new()
            }
            ConceptQuery::Attribute { attribute, values } => {
                self.store.codes_by_attribute(vocabulary, attribute, &values)?
            }
            ConceptQuery::Column { column, values } => {
                self.store.codes_by_column(vocabulary, column, &values)?
            }
            ConceptQuery::Subsumption { root } => {
                return HierarchyExpander::with_cache(self.store, self.cache)
                    .descendants_of(system, vocabulary, root);
            }
        };
        Ok(CodeSet::from_codes(system, codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::HierarchyEdge;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every call so tests can assert what reached the store.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
        queries: AtomicUsize,
    }

    impl RecordingStore {
        fn record(&self, call: String) {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ConceptStore for RecordingStore {
        fn codes(&self, vocabulary: &str) -> ResolveResult<Vec<String>> {
            self.record(format!("codes {vocabulary}"));
            Ok(vec!["1".to_string(), "2".to_string()])
        }

        fn codes_by_attribute(
            &self,
            vocabulary: &str,
            attribute: &str,
            values: &[&str],
        ) -> ResolveResult<Vec<String>> {
            self.record(format!("attribute {vocabulary} {attribute} {}", values.join("|")));
            Ok(vec!["3".to_string()])
        }

        fn codes_by_column(
            &self,
            vocabulary: &str,
            column: ConceptColumn,
            values: &[&str],
        ) -> ResolveResult<Vec<String>> {
            self.record(format!("column {vocabulary} {column} {}", values.join("|")));
            Ok(vec!["4".to_string()])
        }

        fn child_edges(&self, vocabulary: &str) -> ResolveResult<Vec<HierarchyEdge>> {
            self.record(format!("edges {vocabulary}"));
            Ok(vec![HierarchyEdge::new(vocabulary, "10", "11")])
        }
    }

    fn calls(store: &RecordingStore) -> Vec<String> {
        store.calls.lock().unwrap().clone()
    }

    #[test]
    fn test_plan_no_filter() {
        assert_eq!(ConceptQuery::plan("http://loinc.org", None).unwrap(), ConceptQuery::All);
    }

    #[test]
    fn test_plan_attribute() {
        let filter = Filter::equal("SCALE_TYP", "Doc");
        let query = ConceptQuery::plan("http://loinc.org", Some(&filter)).unwrap();
        assert_eq!(
            query,
            ConceptQuery::Attribute {
                attribute: "LOINC_SCALE_TYP",
                values: vec!["Doc"],
            }
        );
    }

    #[test]
    fn test_plan_column_in() {
        let filter = Filter::is_in("TTY", ["SCD", "SBD"]);
        let query = ConceptQuery::plan("http://www.nlm.nih.gov/research/umls/rxnorm", Some(&filter))
            .unwrap();
        assert_eq!(
            query,
            ConceptQuery::Column {
                column: ConceptColumn::Tty,
                values: vec!["SCD", "SBD"],
            }
        );
    }

    #[test]
    fn test_plan_rejects_unlisted_property() {
        let filter = Filter::equal("code = code OR 1", "x");
        let err = ConceptQuery::plan("http://loinc.org", Some(&filter)).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedFilterProperty { .. }));
    }

    #[test]
    fn test_whole_vocabulary() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let codes = engine.resolve_system("http://loinc.org", None).unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains_code("http://loinc.org", "1"));
        assert_eq!(calls(&store), vec!["codes LNC"]);
    }

    #[test]
    fn test_attribute_and_column_dispatch() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        engine
            .resolve_system("http://loinc.org", Some(&Filter::equal("CLASSTYPE", "2")))
            .unwrap();
        engine
            .resolve_system(
                "http://www.nlm.nih.gov/research/umls/rxnorm",
                Some(&Filter::new("TTY", "in", "SCD,SBD")),
            )
            .unwrap();

        assert_eq!(
            calls(&store),
            vec!["attribute LNC LCN 2", "column RXNORM TTY SCD|SBD"]
        );
    }

    #[test]
    fn test_is_a_uses_edges() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let codes = engine
            .resolve_system("http://snomed.info/sct", Some(&Filter::is_a("10")))
            .unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains_code("http://snomed.info/sct", "11"));
        assert_eq!(calls(&store), vec!["edges SNOMEDCT_US"]);
    }

    #[test]
    fn test_unknown_system() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let err = engine
            .resolve_system("http://example.org/not-a-real-system", None)
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownCodeSystem(s) if s == "http://example.org/not-a-real-system"));
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_operator_checked_before_system() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let filter = Filter::new("TTY", "not-a-real-op", "SCD");
        let err = engine
            .resolve_system("http://example.org/not-a-real-system", Some(&filter))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnsupportedFilterOperation { operator, .. } if operator == "not-a-real-op"
        ));
    }

    #[test]
    fn test_unsupported_operator_never_queries() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let filter = Filter::new("STR", "regex", ".*");
        let err = engine
            .resolve_system("http://loinc.org", Some(&filter))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot handle filter operation 'regex' on http://loinc.org"
        );
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_in_list_skips_store() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let codes = engine
            .resolve_system("http://loinc.org", Some(&Filter::new("TTY", "in", " , ")))
            .unwrap();
        assert!(codes.is_empty());
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_static_system_bypasses_store() {
        let store = RecordingStore::default();
        let engine = FilterEngine::new(CodeSystemRegistry::global(), &store);

        let codes = engine
            .resolve_system("http://hl7.org/fhir/condition-clinical", None)
            .unwrap();
        assert!(codes.contains_code("http://hl7.org/fhir/condition-clinical", "resolved"));
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }
}
