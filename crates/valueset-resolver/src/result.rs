//! Resolution result types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use valueset_model::CodeSet;

/// A resolved value set together with how it was produced.
///
/// # Example
///
/// ```ignore
/// let resolution = resolver.resolve_with_stats(&spec)?;
///
/// println!(
///     "{} codes via {} in {:?}",
///     resolution.count(),
///     resolution.stats.source,
///     resolution.stats.duration
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The resolved codes. Shared with the resolver's cache.
    pub codes: Arc<CodeSet>,
    /// Resolution statistics.
    pub stats: ResolutionStats,
}

impl Resolution {
    /// Creates a new Resolution.
    pub fn new(codes: Arc<CodeSet>, stats: ResolutionStats) -> Self {
        Self { codes, stats }
    }

    /// Returns the number of resolved codes.
    pub fn count(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if the value set resolved to nothing.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Which path produced a resolved set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionSource {
    /// The value set's own unambiguous expansion was used verbatim.
    ProvidedExpansion,
    /// Include and exclude rules were evaluated.
    #[default]
    Compose,
    /// The set was already resolved by this resolver.
    Cache,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolutionSource::ProvidedExpansion => "provided expansion",
            ResolutionSource::Compose => "compose",
            ResolutionSource::Cache => "cache",
        })
    }
}

/// Statistics from one resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionStats {
    /// Total duration.
    pub duration: Duration,
    /// Include and exclude rules evaluated (0 unless the source is compose).
    pub rules_evaluated: usize,
    /// Path that produced the set.
    pub source: ResolutionSource,
}

impl ResolutionStats {
    /// Creates new resolution stats.
    pub fn new(duration: Duration, rules_evaluated: usize, source: ResolutionSource) -> Self {
        Self {
            duration,
            rules_evaluated,
            source,
        }
    }
}
