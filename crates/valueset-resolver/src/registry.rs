//! Registry of code systems answered from memory rather than the database.
//!
//! Each entry names a source (a bundled document, a local file, or one of the
//! bundled MIME-type and language-tag lists). Sources are parsed on first use
//! and kept for the lifetime of the registry; concurrent first access loads
//! each source exactly once.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use tracing::debug;
use valueset_model::{CodeSet, Filter};

use crate::codesystem::{DocumentCodeSystem, LanguageTagSystem};
use crate::error::{ResolveError, ResolveResult};

/// MIME types (BCP-13).
pub const MIME_TYPES_SYSTEM: &str = "urn:ietf:bcp:13";
/// Language tags (BCP-47).
pub const LANGUAGE_TAGS_SYSTEM: &str = "urn:ietf:bcp:47";
/// Alternate spelling of [`LANGUAGE_TAGS_SYSTEM`] seen in published value sets.
pub const LANGUAGE_TAGS_ALIAS: &str = "urn:ietf:bcp47";

const MIME_TYPES: &str = include_str!("../resources/bcp13-mime-types.txt");
const LANGUAGE_TAGS: &str = include_str!("../resources/bcp47-language-tags.txt");

macro_rules! bundled {
    ($url:expr, $file:literal) => {
        ($url, include_str!(concat!("../resources/codesystems/", $file)))
    };
}

const BUNDLED_DOCUMENTS: &[(&str, &str)] = &[
    bundled!("http://hl7.org/fhir/v3/Ethnicity", "v3-ethnicity.json"),
    bundled!("http://hl7.org/fhir/v3/Race", "v3-race.json"),
    bundled!("urn:oid:2.16.840.1.113883.6.238", "cdcrec.json"),
    bundled!("http://hl7.org/fhir/condition-category", "condition-category.json"),
    bundled!(
        "http://terminology.hl7.org/CodeSystem/condition-category",
        "terminology-condition-category.json"
    ),
    bundled!(
        "http://hl7.org/fhir/us/core/CodeSystem/condition-category",
        "us-core-condition-category.json"
    ),
    bundled!(
        "http://hl7.org/fhir/us/core/CodeSystem/careplan-category",
        "careplan-category.json"
    ),
    bundled!(
        "http://hl7.org/fhir/us/core/CodeSystem/us-core-documentreference-category",
        "us-core-documentreference-category.json"
    ),
    bundled!(
        "http://hl7.org/fhir/us/core/CodeSystem/us-core-provenance-participant-type",
        "us-core-provenance-participant-type.json"
    ),
    bundled!(
        "http://terminology.hl7.org/CodeSystem/provenance-participant-type",
        "provenance-participant-type.json"
    ),
    bundled!("http://hl7.org/fhir/condition-clinical", "condition-clinical.json"),
    bundled!("http://hl7.org/fhir/condition-ver-status", "condition-ver-status.json"),
    bundled!("http://hl7.org/fhir/observation-category", "observation-category.json"),
    bundled!("http://hl7.org/fhir/referencerange-meaning", "referencerange-meaning.json"),
    bundled!("http://hl7.org/fhir/v2/0203", "v2-0203.json"),
    bundled!(
        "http://terminology.hl7.org/CodeSystem/practitioner-role",
        "practitioner-role.json"
    ),
    bundled!("http://terminology.hl7.org/CodeSystem/v3-RoleCode", "v3-rolecode.json"),
    bundled!("http://terminology.hl7.org/CodeSystem/v2-0131", "v2-0131.json"),
];

static GLOBAL: Lazy<CodeSystemRegistry> = Lazy::new(CodeSystemRegistry::new);

/// Where a static code system comes from.
#[derive(Debug, Clone)]
enum Source {
    Embedded(&'static str),
    Inline(String),
    File(PathBuf),
    MimeTypes,
    LanguageTags,
}

#[derive(Debug)]
enum Loaded {
    Document(DocumentCodeSystem),
    LanguageTags(LanguageTagSystem),
}

impl Loaded {
    fn select(&self, filter: Option<&Filter>) -> ResolveResult<CodeSet> {
        match self {
            Loaded::Document(system) => system.select(filter),
            Loaded::LanguageTags(system) => system.select(filter),
        }
    }
}

#[derive(Debug)]
struct Entry {
    source: Source,
    loaded: OnceCell<Arc<Loaded>>,
}

impl Entry {
    fn new(source: Source) -> Self {
        Self {
            source,
            loaded: OnceCell::new(),
        }
    }

    fn get_or_load(&self, system: &str) -> ResolveResult<&Arc<Loaded>> {
        self.loaded.get_or_try_init(|| {
            let loaded = match &self.source {
                Source::Embedded(json) => Loaded::Document(DocumentCodeSystem::from_json(system, json)?),
                Source::Inline(json) => Loaded::Document(DocumentCodeSystem::from_json(system, json)?),
                Source::File(path) => {
                    let json = std::fs::read_to_string(path).map_err(|e| {
                        ResolveError::code_system_load(system, format!("{}: {}", path.display(), e))
                    })?;
                    Loaded::Document(DocumentCodeSystem::from_json(system, &json)?)
                }
                Source::MimeTypes => {
                    Loaded::Document(DocumentCodeSystem::from_code_list(system, MIME_TYPES))
                }
                Source::LanguageTags => {
                    Loaded::LanguageTags(LanguageTagSystem::from_tag_list(system, LANGUAGE_TAGS)?)
                }
            };
            debug!(system, "loaded static code system");
            Ok(Arc::new(loaded))
        })
    }
}

/// Static code systems keyed by URI.
///
/// # Example
///
/// ```rust
/// use valueset_model::Filter;
/// use valueset_resolver::CodeSystemRegistry;
///
/// let registry = CodeSystemRegistry::new();
/// assert!(registry.contains("http://hl7.org/fhir/condition-clinical"));
///
/// let clinical = registry.load("http://hl7.org/fhir/condition-clinical", None).unwrap();
/// assert!(clinical.contains_code("http://hl7.org/fhir/condition-clinical", "active"));
///
/// let regional = registry
///     .load("urn:ietf:bcp:47", Some(&Filter::new("region", "exists", "true")))
///     .unwrap();
/// assert!(regional.contains_code("urn:ietf:bcp:47", "en-US"));
/// ```
pub struct CodeSystemRegistry {
    entries: HashMap<String, Entry>,
}

impl CodeSystemRegistry {
    /// Creates a registry with every bundled code system.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for (url, json) in BUNDLED_DOCUMENTS {
            registry.register(*url, Source::Embedded(*json));
        }
        registry.register(MIME_TYPES_SYSTEM, Source::MimeTypes);
        registry.register(LANGUAGE_TAGS_SYSTEM, Source::LanguageTags);
        registry.register(LANGUAGE_TAGS_ALIAS, Source::LanguageTags);
        registry
    }

    /// Creates a registry with no code systems.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Process-wide registry of the bundled code systems.
    pub fn global() -> &'static CodeSystemRegistry {
        &GLOBAL
    }

    /// Registers a code-system document read from `path` on first use.
    ///
    /// Replaces any existing entry for `url`.
    pub fn with_document_file(mut self, url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.register(url, Source::File(path.into()));
        self
    }

    /// Registers a code-system document given as JSON text.
    ///
    /// The text is parsed on first use, like bundled documents.
    pub fn with_document(mut self, url: impl Into<String>, json: impl Into<String>) -> Self {
        self.register(url, Source::Inline(json.into()));
        self
    }

    fn register(&mut self, url: impl Into<String>, source: Source) {
        self.entries.insert(url.into(), Entry::new(source));
    }

    /// Returns true if `system` is answered by this registry.
    pub fn contains(&self, system: &str) -> bool {
        self.entries.contains_key(system)
    }

    /// Returns true if `system` has already been loaded.
    pub fn is_loaded(&self, system: &str) -> bool {
        self.entries
            .get(system)
            .map(|entry| entry.loaded.get().is_some())
            .unwrap_or(false)
    }

    /// Registered code-system URIs, sorted.
    pub fn systems(&self) -> Vec<&str> {
        let mut systems: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        systems.sort_unstable();
        systems
    }

    /// Number of registered code systems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a static code system, applying `filter` if given.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::UnknownCodeSystem`] if `system` is not registered.
    /// - [`ResolveError::CodeSystemLoad`] if its source cannot be read or parsed.
    /// - Filter errors from the code system itself.
    pub fn load(&self, system: &str, filter: Option<&Filter>) -> ResolveResult<CodeSet> {
        let entry = self
            .entries
            .get(system)
            .ok_or_else(|| ResolveError::UnknownCodeSystem(system.to_string()))?;
        entry.get_or_load(system)?.select(filter)
    }
}

impl Default for CodeSystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodeSystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeSystemRegistry")
            .field("systems", &self.systems())
            .finish()
    }
}
