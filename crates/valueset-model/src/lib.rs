//! # valueset-model
//!
//! Value types for FHIR value-set resolution.
//!
//! This crate provides:
//! - **Codes and code sets**: [`Code`] is the `(system, code)` pair every
//!   resolved value set is made of; [`CodeSet`] is the unordered, de-duplicated
//!   collection with set algebra.
//! - **Composition rules**: [`ValueSetSpec`], [`Compose`], [`CompositionRule`]
//!   and [`Filter`] describe the include/exclude groups of a value set after it
//!   has been parsed by an external loader.
//! - **BCP-47 language tags**: [`parse_language_tag`] splits a tag into its
//!   subtags so language code systems can be filtered by subtag presence.
//!
//! ## Usage
//!
//! ```rust
//! use valueset_model::{Code, CodeSet, CompositionRule, ValueSetSpec};
//!
//! let spec = ValueSetSpec::new("http://example.org/fhir/ValueSet/vitals")
//!     .include(CompositionRule::concepts("http://loinc.org", ["8867-4", "9279-1"]))
//!     .exclude(CompositionRule::concepts("http://loinc.org", ["9279-1"]));
//!
//! assert_eq!(spec.included_code_systems(), vec!["http://loinc.org"]);
//!
//! let a: CodeSet = [Code::new("http://loinc.org", "8867-4")].into_iter().collect();
//! let b: CodeSet = [Code::new("http://loinc.org", "9279-1")].into_iter().collect();
//! assert_eq!(a.union(&b).len(), 2);
//! ```
//!
//! ## Filter Operators
//!
//! | Operator | Meaning |
//! |----------|---------|
//! | `=` | Property equals value |
//! | `in` | Property equals one of a comma-separated list |
//! | `is-a` | Value or any of its descendants |
//! | `exists` | Property present (`true`) or absent (`false`) |
//! | other | Carried verbatim; rejected by the resolver |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod code;
mod compose;
mod error;
mod language_tag;

pub use code::{Code, CodeSet};
pub use compose::{
    Compose, CompositionRule, Filter, FilterOperator, ProvidedExpansion, ValueSetSpec,
};
pub use error::{ModelError, ModelResult};
pub use language_tag::{parse_language_tag, LanguageTag};
