//! # valueset-resolver
//!
//! Resolves FHIR value-set definitions into concrete code sets.
//!
//! Given a [`ValueSetSpec`](valueset_model::ValueSetSpec) and a backing concept
//! database, [`SetResolver`] computes the exact set of `(system, code)` pairs
//! the definition denotes: include/exclude set algebra, literal concept lists,
//! property filters, is-a subsumption and nested value-set imports.
//!
//! ## Key Features
//!
//! - **Static code systems** - HL7 and US Core code systems, MIME types and
//!   BCP-47 language tags answered from memory, loaded once on first use
//! - **Database vocabularies** - LOINC, SNOMED CT, RxNorm and friends through
//!   the [`ConceptStore`] trait; a SQLite implementation ships behind `sqlite`
//! - **Cycle-safe subsumption** - one bulk edge query per vocabulary and an
//!   iterative closure walk
//! - **Parameterized queries** - filter values are always bound; filter
//!   properties only reach SQL through an allow-list
//!
//! ## Quick Start
//!
//! ```ignore
//! use valueset_model::{CompositionRule, Filter, ValueSetSpec};
//! use valueset_resolver::{SetResolver, SqliteConceptStore};
//!
//! let store = SqliteConceptStore::open("umls.db")?;
//! let resolver = SetResolver::new(&store);
//!
//! let spec = ValueSetSpec::new("http://example.org/fhir/ValueSet/scd")
//!     .include(CompositionRule::filtered(
//!         "http://www.nlm.nih.gov/research/umls/rxnorm",
//!         [Filter::equal("TTY", "SCD")],
//!     ));
//!
//! let codes = resolver.resolve(&spec)?;
//! println!("{} clinical drugs", codes.len());
//! ```
//!
//! ## With Configuration
//!
//! ```ignore
//! use valueset_resolver::{CacheConfig, ResolverConfig, SetResolver};
//!
//! let config = ResolverConfig::builder()
//!     .with_adjacency_cache(CacheConfig::default())
//!     .with_parallel(true)
//!     .with_max_results(500_000)
//!     .build();
//!
//! let resolver = SetResolver::with_config(&store, config).with_authority(&authority);
//! ```
//!
//! ## Supported Filters
//!
//! | Code system | `=` / `in` | `is-a` | `exists` |
//! |-------------|------------|--------|----------|
//! | Database vocabulary | Mapped attribute or allow-listed column | Yes | No |
//! | Bundled document | `concept` / `code` | Yes | No |
//! | `urn:ietf:bcp:13` | `concept` / `code` | Trivial | No |
//! | `urn:ietf:bcp:47` | `concept` / `code` | No | Subtag kinds |
//!
//! ## Feature Flags
//!
//! - `sqlite` (default) - [`SqliteConceptStore`] using rusqlite
//! - `parallel` - Evaluates the rules of an include or exclude group on rayon
//! - `serde` - Serde support for the model types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod codesystem;
mod config;
mod error;
mod expander;
mod filter;
mod registry;
mod resolver;
mod result;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;
mod vocabulary;

// Public re-exports
pub use cache::{AdjacencyCache, CacheStats};
pub use codesystem::{DocumentCodeSystem, LanguageTagSystem};
pub use config::{CacheConfig, ResolverConfig, ResolverConfigBuilder};
pub use error::{ResolveError, ResolveResult};
pub use expander::{Adjacency, HierarchyExpander};
pub use filter::{ConceptQuery, FilterEngine};
pub use registry::{
    CodeSystemRegistry, LANGUAGE_TAGS_ALIAS, LANGUAGE_TAGS_SYSTEM, MIME_TYPES_SYSTEM,
};
pub use resolver::SetResolver;
pub use result::{Resolution, ResolutionSource, ResolutionStats};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConceptStore;
pub use traits::{ConceptStore, HierarchyEdge, ValueSetAuthority};
pub use vocabulary::{attribute_for, mapped_systems, vocabulary_for, ConceptColumn};
