//! Value-set resolution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use valueset_model::{CodeSet, CompositionRule, ValueSetSpec};

use crate::cache::AdjacencyCache;
use crate::config::ResolverConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::filter::FilterEngine;
use crate::registry::CodeSystemRegistry;
use crate::result::{Resolution, ResolutionSource, ResolutionStats};
use crate::traits::{ConceptStore, ValueSetAuthority};

/// Resolves value-set definitions into code sets.
///
/// A resolved set is `(union of include rules) \ (union of exclude rules)`,
/// unless the definition carries an unambiguous expansion, which is used
/// verbatim. Sets are cached by URL for the lifetime of the resolver.
///
/// # Example
///
/// ```ignore
/// use valueset_model::{CompositionRule, Filter, ValueSetSpec};
/// use valueset_resolver::{SetResolver, SqliteConceptStore};
///
/// let store = SqliteConceptStore::open("umls.db")?;
/// let resolver = SetResolver::new(&store);
///
/// let spec = ValueSetSpec::new("http://example.org/fhir/ValueSet/diabetes")
///     .include(CompositionRule::filtered("http://snomed.info/sct", [Filter::is_a("73211009")]));
///
/// let codes = resolver.resolve(&spec)?;
/// println!("{} codes", codes.len());
/// ```
pub struct SetResolver<'a> {
    store: &'a dyn ConceptStore,
    registry: &'a CodeSystemRegistry,
    authority: Option<&'a dyn ValueSetAuthority>,
    config: ResolverConfig,
    adjacency_cache: Option<AdjacencyCache>,
    resolved: RwLock<HashMap<String, Arc<CodeSet>>>,
}

impl<'a> SetResolver<'a> {
    /// Creates a resolver with default configuration and the global
    /// static code-system registry.
    pub fn new(store: &'a dyn ConceptStore) -> Self {
        Self::with_config(store, ResolverConfig::default())
    }

    /// Creates a resolver with custom configuration.
    pub fn with_config(store: &'a dyn ConceptStore, config: ResolverConfig) -> Self {
        let adjacency_cache = config.adjacency_cache.clone().map(AdjacencyCache::new);
        Self {
            store,
            registry: CodeSystemRegistry::global(),
            authority: None,
            config,
            adjacency_cache,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves nested value-set references through `authority`.
    pub fn with_authority(mut self, authority: &'a dyn ValueSetAuthority) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Uses `registry` instead of the global static code-system registry.
    pub fn with_registry(mut self, registry: &'a CodeSystemRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the adjacency cache if enabled.
    pub fn adjacency_cache(&self) -> Option<&AdjacencyCache> {
        self.adjacency_cache.as_ref()
    }

    /// Number of value sets resolved and cached so far.
    pub fn cached_value_sets(&self) -> usize {
        self.resolved.read().len()
    }

    /// Drops every cached resolution.
    pub fn clear_cache(&self) {
        self.resolved.write().clear();
        if let Some(cache) = &self.adjacency_cache {
            cache.clear();
        }
    }

    /// Resolves a value set, reusing an earlier result for the same URL.
    ///
    /// Definitions without a URL are resolved on every call.
    pub fn resolve(&self, spec: &ValueSetSpec) -> ResolveResult<Arc<CodeSet>> {
        Ok(self.resolve_with_stats(spec)?.codes)
    }

    /// Resolves a value set and reports how it was resolved.
    pub fn resolve_with_stats(&self, spec: &ValueSetSpec) -> ResolveResult<Resolution> {
        let start = Instant::now();

        if !spec.url.is_empty() {
            if let Some(codes) = self.resolved.read().get(&spec.url) {
                trace!(url = %spec.url, "value set already resolved");
                let stats = ResolutionStats::new(start.elapsed(), 0, ResolutionSource::Cache);
                return Ok(Resolution::new(Arc::clone(codes), stats));
            }
        }

        let (codes, source, rules_evaluated) = self.compute(spec)?;
        let mut codes = Arc::new(codes);

        if !spec.url.is_empty() {
            // First writer wins so every caller observes the same set.
            codes = Arc::clone(
                self.resolved
                    .write()
                    .entry(spec.url.clone())
                    .or_insert(codes),
            );
        }

        let stats = ResolutionStats::new(start.elapsed(), rules_evaluated, source);
        debug!(
            url = %spec.url,
            codes = codes.len(),
            %source,
            rules = rules_evaluated,
            elapsed = ?stats.duration,
            "resolved value set"
        );
        Ok(Resolution::new(codes, stats))
    }

    /// Resolves a value set without consulting or filling the cache.
    pub fn expand(&self, spec: &ValueSetSpec) -> ResolveResult<CodeSet> {
        Ok(self.compute(spec)?.0)
    }

    /// Tests whether `(system, code)` is a member of the value set.
    pub fn contains_code(
        &self,
        spec: &ValueSetSpec,
        system: &str,
        code: &str,
    ) -> ResolveResult<bool> {
        Ok(self.resolve(spec)?.contains_code(system, code))
    }

    /// Every code of one code system.
    pub fn code_system_set(&self, system: &str) -> ResolveResult<CodeSet> {
        self.filter_engine().resolve_system(system, None)
    }

    /// Resolves one include or exclude rule.
    ///
    /// Literal concepts take precedence over filters; filters are intersected
    /// in declaration order; a bare system imports every code. Nested value
    /// sets are intersected with each other and then with that subset.
    pub fn resolve_rule(&self, rule: &CompositionRule) -> ResolveResult<CodeSet> {
        let system = rule.system.as_deref().unwrap_or("");
        let engine = self.filter_engine();

        let base = if !rule.concepts.is_empty() {
            Some(CodeSet::from_codes(
                system,
                rule.concepts.iter().map(String::as_str),
            ))
        } else if let Some((first, rest)) = rule.filters.split_first() {
            let mut subset = engine.resolve_system(system, Some(first))?;
            for filter in rest {
                subset.retain_in(&engine.resolve_system(system, Some(filter))?);
            }
            Some(subset)
        } else if let Some(system) = rule.system.as_deref() {
            Some(engine.resolve_system(system, None)?)
        } else {
            None
        };

        let nested = self.resolve_nested(&rule.value_sets)?;

        Ok(match (base, nested) {
            (Some(mut base), Some(nested)) => {
                base.retain_in(&nested);
                base
            }
            (Some(base), None) => base,
            (None, Some(nested)) => nested,
            (None, None) => CodeSet::new(),
        })
    }

    fn filter_engine(&self) -> FilterEngine<'_> {
        FilterEngine::new(self.registry, self.store).with_cache(self.adjacency_cache.as_ref())
    }

    fn compute(&self, spec: &ValueSetSpec) -> ResolveResult<(CodeSet, ResolutionSource, usize)> {
        let (codes, source, rules) = match spec.usable_expansion() {
            Some(expansion) if self.config.trust_provided_expansions => {
                debug!(url = %spec.url, "using provided expansion");
                (expansion.code_set(), ResolutionSource::ProvidedExpansion, 0)
            }
            _ => {
                if let Some(expansion) = &spec.provided_expansion {
                    if !expansion.is_unambiguous() {
                        debug!(
                            url = %spec.url,
                            too_costly = expansion.too_costly,
                            unclosed = expansion.unclosed,
                            "provided expansion is incomplete, evaluating compose"
                        );
                    }
                }

                let include = &spec.compose.include;
                let exclude = &spec.compose.exclude;
                if include.is_empty() {
                    warn!(url = %spec.url, "value set has no include rules");
                }

                let mut codes = self.resolve_group(include)?;
                codes.subtract(&self.resolve_group(exclude)?);
                (codes, ResolutionSource::Compose, include.len() + exclude.len())
            }
        };

        if let Some(limit) = self.config.max_results {
            if codes.len() > limit {
                return Err(ResolveError::ResultTooLarge {
                    count: codes.len(),
                    limit,
                });
            }
        }

        Ok((codes, source, rules))
    }

    /// Union of the subsets of a group of rules.
    fn resolve_group(&self, rules: &[CompositionRule]) -> ResolveResult<CodeSet> {
        let mut result = CodeSet::new();
        for subset in self.rule_subsets(rules)? {
            result.merge(subset);
        }
        Ok(result)
    }

    #[cfg(feature = "parallel")]
    fn rule_subsets(&self, rules: &[CompositionRule]) -> ResolveResult<Vec<CodeSet>> {
        use rayon::prelude::*;

        if self.config.parallel && rules.len() > 1 {
            rules.par_iter().map(|rule| self.resolve_rule(rule)).collect()
        } else {
            rules.iter().map(|rule| self.resolve_rule(rule)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn rule_subsets(&self, rules: &[CompositionRule]) -> ResolveResult<Vec<CodeSet>> {
        rules.iter().map(|rule| self.resolve_rule(rule)).collect()
    }

    /// Intersection of the referenced value sets, or `None` if there are none.
    fn resolve_nested(&self, urls: &[String]) -> ResolveResult<Option<CodeSet>> {
        let Some((first, rest)) = urls.split_first() else {
            return Ok(None);
        };
        let authority = self
            .authority
            .ok_or_else(|| ResolveError::NoValueSetAuthority(first.clone()))?;

        let mut result = CodeSet::clone(&*authority.resolve(first)?);
        for url in rest {
            result.retain_in(&*authority.resolve(url)?);
        }
        Ok(Some(result))
    }
}

impl std::fmt::Debug for SetResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetResolver")
            .field("config", &self.config)
            .field("has_authority", &self.authority.is_some())
            .field("cached_value_sets", &self.cached_value_sets())
            .finish()
    }
}
