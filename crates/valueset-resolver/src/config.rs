//! Configuration types for the set resolver.

use std::time::Duration;

/// Configuration for a [`SetResolver`](crate::SetResolver).
///
/// # Example
///
/// ```rust
/// use valueset_resolver::{CacheConfig, ResolverConfig};
///
/// let config = ResolverConfig::builder()
///     .with_adjacency_cache(CacheConfig::default())
///     .with_parallel(true)
///     .with_max_results(500_000)
///     .build();
/// assert!(config.trust_provided_expansions);
/// ```
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Use an unambiguous provided expansion instead of evaluating the compose.
    pub trust_provided_expansions: bool,
    /// Cache of per-vocabulary hierarchy adjacency (None = query every time).
    pub adjacency_cache: Option<CacheConfig>,
    /// Compute rule subsets in parallel (requires `parallel` feature).
    pub parallel: bool,
    /// Maximum number of codes in a resolved set (None = unlimited).
    pub max_results: Option<usize>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            trust_provided_expansions: true,
            adjacency_cache: None,
            parallel: false,
            max_results: None,
        }
    }
}

impl ResolverConfig {
    /// Creates a new builder for ResolverConfig.
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }
}

/// Builder for ResolverConfig.
#[derive(Debug, Clone)]
pub struct ResolverConfigBuilder {
    trust_provided_expansions: bool,
    adjacency_cache: Option<CacheConfig>,
    parallel: bool,
    max_results: Option<usize>,
}

impl Default for ResolverConfigBuilder {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            trust_provided_expansions: defaults.trust_provided_expansions,
            adjacency_cache: defaults.adjacency_cache,
            parallel: defaults.parallel,
            max_results: defaults.max_results,
        }
    }
}

impl ResolverConfigBuilder {
    /// Enables or disables the provided-expansion fast path.
    pub fn with_provided_expansions(mut self, trust: bool) -> Self {
        self.trust_provided_expansions = trust;
        self
    }

    /// Enables the adjacency cache with the given configuration.
    pub fn with_adjacency_cache(mut self, cache: CacheConfig) -> Self {
        self.adjacency_cache = Some(cache);
        self
    }

    /// Enables or disables parallel rule evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the maximum number of codes in a resolved set.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Builds the ResolverConfig.
    pub fn build(self) -> ResolverConfig {
        ResolverConfig {
            trust_provided_expansions: self.trust_provided_expansions,
            adjacency_cache: self.adjacency_cache,
            parallel: self.parallel,
            max_results: self.max_results,
        }
    }
}

/// Configuration for the adjacency cache.
///
/// Adjacency maps can hold hundreds of thousands of edges, so the default
/// capacity is small.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached vocabularies.
    pub max_entries: usize,
    /// Time-to-live for cached entries.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 16,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_config_default() {
        let config = ResolverConfig::default();
        assert!(config.trust_provided_expansions);
        assert!(config.adjacency_cache.is_none());
        assert!(!config.parallel);
        assert!(config.max_results.is_none());
    }

    #[test]
    fn test_resolver_config_builder() {
        let config = ResolverConfig::builder()
            .with_provided_expansions(false)
            .with_adjacency_cache(CacheConfig::default())
            .with_parallel(true)
            .with_max_results(50_000)
            .build();

        assert!(!config.trust_provided_expansions);
        assert!(config.adjacency_cache.is_some());
        assert!(config.parallel);
        assert_eq!(config.max_results, Some(50_000));
    }

    #[test]
    fn test_builder_defaults_match_config_defaults() {
        let config = ResolverConfig::builder().build();
        assert!(config.trust_provided_expansions);
        assert!(config.adjacency_cache.is_none());
    }

    #[test]
    fn test_cache_config_default() {
        let cache = CacheConfig::default();
        assert_eq!(cache.max_entries, 16);
        assert_eq!(cache.ttl, Duration::from_secs(3600));
    }
}
