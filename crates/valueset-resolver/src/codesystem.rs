//! In-memory code systems loaded from bundled or local resources.
//!
//! Two shapes are supported:
//! - [`DocumentCodeSystem`]: a FHIR `CodeSystem` JSON document (or a plain
//!   code list) flattened into a [`CodeSet`] plus its parent/child tree.
//! - [`LanguageTagSystem`]: a list of BCP-47 tags, filterable by which
//!   subtags each tag carries.

use serde::Deserialize;
use tracing::debug;
use valueset_model::{parse_language_tag, Code, CodeSet, Filter, FilterOperator, LanguageTag};

use crate::error::{ResolveError, ResolveResult};
use crate::expander::Adjacency;

#[derive(Debug, Deserialize)]
struct CodeSystemDocument {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    concept: Vec<ConceptDefinition>,
}

#[derive(Debug, Deserialize)]
struct ConceptDefinition {
    code: String,
    #[serde(default)]
    concept: Vec<ConceptDefinition>,
}

/// Properties that address a concept by its own code.
fn is_code_property(property: &str) -> bool {
    matches!(property, "concept" | "code")
}

/// Codes of `codes` named by an `=`/`in` filter on the code itself.
fn select_listed(url: &str, codes: &CodeSet, filter: &Filter) -> CodeSet {
    filter
        .values()
        .into_iter()
        .filter(|value| codes.contains_code(url, value))
        .map(|value| Code::new(url, value))
        .collect()
}

/// A static code system with an optional concept hierarchy.
#[derive(Debug, Clone)]
pub struct DocumentCodeSystem {
    url: String,
    codes: CodeSet,
    hierarchy: Adjacency,
}

impl DocumentCodeSystem {
    /// Parses a FHIR `CodeSystem` JSON document.
    ///
    /// Nested `concept` arrays become parent/child edges. Codes are reported
    /// under the document's own `url`, or under `fallback_url` when the
    /// document has none.
    pub fn from_json(fallback_url: &str, json: &str) -> ResolveResult<Self> {
        let document: CodeSystemDocument = serde_json::from_str(json)
            .map_err(|e| ResolveError::code_system_load(fallback_url, e))?;

        let url = document
            .url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| fallback_url.to_string());

        let mut codes = CodeSet::new();
        let mut hierarchy = Adjacency::new();

        // Explicit stack; concept trees may be arbitrarily deep.
        let mut stack: Vec<(Option<&str>, &ConceptDefinition)> =
            document.concept.iter().map(|c| (None, c)).collect();
        while let Some((parent, concept)) = stack.pop() {
            codes.insert(Code::new(url.as_str(), concept.code.as_str()));
            if let Some(parent) = parent {
                hierarchy.add_edge(parent, concept.code.as_str());
            }
            for child in &concept.concept {
                stack.push((Some(concept.code.as_str()), child));
            }
        }

        debug!(
            system = %url,
            codes = codes.len(),
            edges = hierarchy.edge_count(),
            "parsed code system document"
        );
        Ok(Self {
            url,
            codes,
            hierarchy,
        })
    }

    /// Builds a flat code system from a newline-separated list.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_code_list(url: &str, list: &str) -> Self {
        let codes = CodeSet::from_codes(url, list_entries(list));
        Self {
            url: url.to_string(),
            codes,
            hierarchy: Adjacency::new(),
        }
    }

    /// Code-system URI the codes are reported under.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every code of the system.
    pub fn codes(&self) -> &CodeSet {
        &self.codes
    }

    /// Parent/child tree of the system.
    pub fn hierarchy(&self) -> &Adjacency {
        &self.hierarchy
    }

    /// Applies an optional filter.
    ///
    /// Supports `is-a` on any property and `=`/`in` on `concept` or `code`.
    pub fn select(&self, filter: Option<&Filter>) -> ResolveResult<CodeSet> {
        let Some(filter) = filter else {
            return Ok(self.codes.clone());
        };

        match &filter.op {
            FilterOperator::IsA => Ok(self
                .hierarchy
                .descendants_or_self(filter.value.trim())
                .into_iter()
                .map(|code| Code::new(self.url.as_str(), code))
                .collect()),
            FilterOperator::Equal | FilterOperator::In if is_code_property(&filter.property) => {
                Ok(select_listed(&self.url, &self.codes, filter))
            }
            FilterOperator::Equal | FilterOperator::In => {
                Err(ResolveError::UnsupportedFilterProperty {
                    property: filter.property.clone(),
                    system: self.url.clone(),
                })
            }
            op => Err(ResolveError::unsupported_operation(op.as_str(), &self.url)),
        }
    }
}

fn list_entries(list: &str) -> impl Iterator<Item = &str> {
    list.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// BCP-47 language tags with their parsed subtags.
#[derive(Debug, Clone)]
pub struct LanguageTagSystem {
    url: String,
    tags: Vec<(String, LanguageTag)>,
}

impl LanguageTagSystem {
    /// Parses a newline-separated tag list.
    pub fn from_tag_list(url: &str, list: &str) -> ResolveResult<Self> {
        let tags = list_entries(list)
            .map(|tag| Ok((tag.to_string(), parse_language_tag(tag)?)))
            .collect::<ResolveResult<Vec<_>>>()?;
        debug!(system = url, tags = tags.len(), "parsed language tag list");
        Ok(Self {
            url: url.to_string(),
            tags,
        })
    }

    /// Code-system URI the tags are reported under.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of known tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if no tags are known.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Applies an optional filter.
    ///
    /// `exists` selects tags that carry (`true`) or lack (`false`) the
    /// subtag kind named by the property; `=`/`in` on `concept` or `code`
    /// select listed tags.
    pub fn select(&self, filter: Option<&Filter>) -> ResolveResult<CodeSet> {
        let Some(filter) = filter else {
            return Ok(self.all());
        };

        match &filter.op {
            FilterOperator::Exists => {
                let wanted = match filter.value.trim() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(ResolveError::InvalidFilterValue {
                            property: filter.property.clone(),
                            value: other.to_string(),
                        })
                    }
                };

                let mut result = CodeSet::new();
                for (code, tag) in &self.tags {
                    let present = tag.has_property(&filter.property).ok_or_else(|| {
                        ResolveError::UnsupportedFilterProperty {
                            property: filter.property.clone(),
                            system: self.url.clone(),
                        }
                    })?;
                    if present == wanted {
                        result.insert(Code::new(self.url.as_str(), code.as_str()));
                    }
                }
                Ok(result)
            }
            FilterOperator::Equal | FilterOperator::In if is_code_property(&filter.property) => {
                Ok(select_listed(&self.url, &self.all(), filter))
            }
            op => Err(ResolveError::unsupported_operation(op.as_str(), &self.url)),
        }
    }

    fn all(&self) -> CodeSet {
        CodeSet::from_codes(&self.url, self.tags.iter().map(|(code, _)| code.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"{
        "resourceType": "CodeSystem",
        "url": "http://example.org/cs/relatives",
        "concept": [
            {
                "code": "FAM",
                "concept": [
                    { "code": "CHILD", "concept": [ { "code": "SON" }, { "code": "DAU" } ] },
                    { "code": "PRN" }
                ]
            },
            { "code": "FRND" }
        ]
    }"#;

    fn sorted_codes(set: &CodeSet) -> Vec<String> {
        set.to_sorted_vec().into_iter().map(|c| c.code).collect()
    }

    #[test]
    fn test_nested_concepts_flattened() {
        let system = DocumentCodeSystem::from_json("urn:fallback", NESTED).unwrap();
        assert_eq!(system.url(), "http://example.org/cs/relatives");
        assert_eq!(
            sorted_codes(system.codes()),
            vec!["CHILD", "DAU", "FAM", "FRND", "PRN", "SON"]
        );
        assert_eq!(system.hierarchy().edge_count(), 4);
    }

    #[test]
    fn test_fallback_url_when_document_has_none() {
        let system =
            DocumentCodeSystem::from_json("urn:fallback", r#"{"concept":[{"code":"a"}]}"#).unwrap();
        assert!(system.codes().contains_code("urn:fallback", "a"));
    }

    #[test]
    fn test_malformed_document() {
        let err = DocumentCodeSystem::from_json("urn:broken", "{ not json").unwrap_err();
        assert!(matches!(err, ResolveError::CodeSystemLoad { system, .. } if system == "urn:broken"));
    }

    #[test]
    fn test_is_a_over_concept_tree() {
        let system = DocumentCodeSystem::from_json("urn:fallback", NESTED).unwrap();
        let result = system.select(Some(&Filter::is_a("CHILD"))).unwrap();
        assert_eq!(sorted_codes(&result), vec!["CHILD", "DAU", "SON"]);
    }

    #[test]
    fn test_equal_and_in_on_code() {
        let system = DocumentCodeSystem::from_json("urn:fallback", NESTED).unwrap();

        let result = system.select(Some(&Filter::equal("concept", "PRN"))).unwrap();
        assert_eq!(sorted_codes(&result), vec!["PRN"]);

        let result = system
            .select(Some(&Filter::is_in("code", ["SON", "NOPE", "FRND"])))
            .unwrap();
        assert_eq!(sorted_codes(&result), vec!["FRND", "SON"]);
    }

    #[test]
    fn test_document_rejects_other_operators() {
        let system = DocumentCodeSystem::from_json("urn:fallback", NESTED).unwrap();
        let err = system
            .select(Some(&Filter::new("concept", "regex", "S.*")))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnsupportedFilterOperation { operator, .. } if operator == "regex"
        ));

        let err = system
            .select(Some(&Filter::equal("display", "Son")))
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedFilterProperty { .. }));
    }

    #[test]
    fn test_code_list() {
        let system = DocumentCodeSystem::from_code_list(
            "urn:ietf:bcp:13",
            "# comment\ntext/plain\n\napplication/json\n",
        );
        assert_eq!(system.codes().len(), 2);
        assert!(system.codes().contains_code("urn:ietf:bcp:13", "text/plain"));
    }

    #[test]
    fn test_language_tag_exists_filters() {
        let system =
            LanguageTagSystem::from_tag_list("urn:ietf:bcp:47", "en\nen-US\nsr-Latn-RS\nde-CH-1901")
                .unwrap();
        assert_eq!(system.len(), 4);

        let with_region = system
            .select(Some(&Filter::new("region", "exists", "true")))
            .unwrap();
        assert_eq!(sorted_codes(&with_region), vec!["de-CH-1901", "en-US", "sr-Latn-RS"]);

        let without_region = system
            .select(Some(&Filter::new("region", "exists", "false")))
            .unwrap();
        assert_eq!(sorted_codes(&without_region), vec!["en"]);

        let with_variant = system
            .select(Some(&Filter::new("variant", "exists", "true")))
            .unwrap();
        assert_eq!(sorted_codes(&with_variant), vec!["de-CH-1901"]);
    }

    #[test]
    fn test_language_tag_invalid_filters() {
        let system = LanguageTagSystem::from_tag_list("urn:ietf:bcp:47", "en\nen-US").unwrap();

        let err = system
            .select(Some(&Filter::new("region", "exists", "maybe")))
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidFilterValue { value, .. } if value == "maybe"));

        let err = system
            .select(Some(&Filter::new("dialect", "exists", "true")))
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedFilterProperty { .. }));

        let err = system.select(Some(&Filter::is_a("en"))).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedFilterOperation { .. }));
    }

    #[test]
    fn test_language_tag_list_rejects_bad_tag() {
        let err = LanguageTagSystem::from_tag_list("urn:ietf:bcp:47", "en\n12345").unwrap_err();
        assert!(matches!(err, ResolveError::ModelError(_)));
    }
}
