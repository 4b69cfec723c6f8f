//! # valueset-export
//!
//! Offline artifacts for resolved value sets.
//!
//! A resolved [`CodeSet`](valueset_model::CodeSet) is exported two ways:
//!
//! - **Membership filters** - a scalable Bloom filter keyed by
//!   `"<system>|<code>"` that answers membership without a database
//!   round-trip. No false negatives; false positives bounded by
//!   [`MembershipFilterConfig::false_positive_rate`].
//! - **Flat rows** - `(system, code)` pairs, in memory or as a headerless
//!   two-column CSV file.
//!
//! ## Usage
//!
//! ```ignore
//! use valueset_export::{build_membership_filter, export_value_set, ExportManifest};
//!
//! let filter = build_membership_filter(&codes);
//! assert!(filter.might_contain_code("http://loinc.org", "8867-4"));
//!
//! let mut manifest = ExportManifest::new();
//! export_value_set(url, &codes, "exports", &mut manifest)?;
//! manifest.save("exports/manifest.json")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `csv` (default) - headerless two-column CSV row files
//! - `persistence` (default) - `.msf` membership files, the JSON manifest and
//!   [`export_value_set`]

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod membership;
#[cfg(feature = "persistence")]
mod persistence;
mod rows;

// Public re-exports
pub use error::{ExportError, ExportResult};
pub use membership::{build_membership_filter, MembershipFilter, MembershipFilterConfig};
#[cfg(feature = "persistence")]
pub use persistence::{
    export_value_set, ExportEntry, ExportManifest, MembershipFile, MEMBERSHIP_EXTENSION,
    ROWS_EXTENSION,
};
pub use rows::{export_file_stem, to_rows};
#[cfg(feature = "csv")]
pub use rows::{read_rows_csv, write_rows_csv};
