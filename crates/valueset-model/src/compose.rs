//! Value-set composition types.
//!
//! These mirror the `compose` and `expansion` elements of a FHIR ValueSet
//! after parsing. Parsing itself happens elsewhere; this module only models
//! the result.

use std::fmt;
use std::str::FromStr;

use crate::code::{Code, CodeSet};

// =============================================================================
// Filters
// =============================================================================

/// Operator of a compose filter.
///
/// Unknown operator strings are preserved in [`FilterOperator::Other`] so the
/// resolver can reject them by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", from = "String"))]
pub enum FilterOperator {
    /// `=`
    Equal,
    /// `in` (comma-separated value list)
    In,
    /// `is-a` (value or any descendant)
    IsA,
    /// `exists` (value is `true` or `false`)
    Exists,
    /// Any other operator, verbatim.
    Other(String),
}

impl FilterOperator {
    /// Returns the operator as it appears in a value-set document.
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::In => "in",
            FilterOperator::IsA => "is-a",
            FilterOperator::Exists => "exists",
            FilterOperator::Other(op) => op,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "=" => FilterOperator::Equal,
            "in" => FilterOperator::In,
            "is-a" => FilterOperator::IsA,
            "exists" => FilterOperator::Exists,
            other => FilterOperator::Other(other.to_string()),
        })
    }
}

impl From<&str> for FilterOperator {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(op) => op,
            Err(never) => match never {},
        }
    }
}

impl From<String> for FilterOperator {
    fn from(s: String) -> Self {
        FilterOperator::from(s.as_str())
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

/// A `(property, operator, value)` filter within a composition rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    /// Property being filtered on.
    pub property: String,
    /// Filter operator.
    pub op: FilterOperator,
    /// Filter value. For `in`, a comma-separated list.
    pub value: String,
}

impl Filter {
    /// Creates a filter.
    pub fn new(
        property: impl Into<String>,
        op: impl Into<FilterOperator>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// `property = value`
    pub fn equal(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, FilterOperator::Equal, value)
    }

    /// `property in v1,v2,...`
    pub fn is_in<I, S>(property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self::new(property, FilterOperator::In, joined)
    }

    /// `concept is-a root`
    pub fn is_a(root: impl Into<String>) -> Self {
        Self::new("concept", FilterOperator::IsA, root)
    }

    /// Values of an `in` filter, trimmed, empty entries dropped.
    ///
    /// For every other operator the whole value is returned as one entry.
    pub fn values(&self) -> Vec<&str> {
        match self.op {
            FilterOperator::In => self
                .value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect(),
            _ => vec![self.value.as_str()],
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.property, self.op, self.value)
    }
}

// =============================================================================
// Composition rules
// =============================================================================

/// One include or exclude rule of a value-set compose.
///
/// A rule carries at most one of `concepts` and `filters`. When it also names
/// nested value sets, its contribution is the intersection of the two parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct CompositionRule {
    /// Code system URI.
    pub system: Option<String>,
    /// Literal codes under `system`.
    pub concepts: Vec<String>,
    /// Filters over `system`, all of which must hold.
    pub filters: Vec<Filter>,
    /// Canonical URLs of value sets whose intersection bounds this rule.
    pub value_sets: Vec<String>,
}

impl CompositionRule {
    /// A rule that imports a whole code system.
    pub fn system(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            ..Self::default()
        }
    }

    /// A rule listing explicit codes.
    pub fn concepts<I, S>(system: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            system: Some(system.into()),
            concepts: codes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A rule selecting codes by filters.
    pub fn filtered<I>(system: impl Into<String>, filters: I) -> Self
    where
        I: IntoIterator<Item = Filter>,
    {
        Self {
            system: Some(system.into()),
            filters: filters.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A rule that only references other value sets.
    pub fn value_sets<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            value_sets: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds a nested value-set reference.
    pub fn with_value_set(mut self, url: impl Into<String>) -> Self {
        self.value_sets.push(url.into());
        self
    }

    /// Returns true if the rule selects nothing by construction.
    pub fn is_empty(&self) -> bool {
        self.system.is_none()
            && self.concepts.is_empty()
            && self.filters.is_empty()
            && self.value_sets.is_empty()
    }
}

/// Include and exclude groups of a value set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Compose {
    /// Rules whose union forms the candidate set.
    pub include: Vec<CompositionRule>,
    /// Rules whose union is removed from the candidate set.
    pub exclude: Vec<CompositionRule>,
}

/// An expansion shipped alongside the value-set definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ProvidedExpansion {
    /// Codes listed by the expansion.
    pub contains: Vec<Code>,
    /// The publisher marked the expansion as too costly to list in full.
    pub too_costly: bool,
    /// The publisher marked the expansion as unclosed.
    pub unclosed: bool,
}

impl ProvidedExpansion {
    /// Creates an expansion with no markers.
    pub fn new<I: IntoIterator<Item = Code>>(contains: I) -> Self {
        Self {
            contains: contains.into_iter().collect(),
            too_costly: false,
            unclosed: false,
        }
    }

    /// Returns true if the expansion can stand in for the compose.
    pub fn is_unambiguous(&self) -> bool {
        !self.too_costly && !self.unclosed
    }

    /// The listed codes as a set.
    pub fn code_set(&self) -> CodeSet {
        self.contains.iter().cloned().collect()
    }
}

/// A parsed value-set definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ValueSetSpec {
    /// Canonical URL.
    pub url: String,
    /// Composition rules.
    pub compose: Compose,
    /// Pre-computed expansion, if the document carried one.
    pub provided_expansion: Option<ProvidedExpansion>,
}

impl ValueSetSpec {
    /// Creates an empty value set with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Appends an include rule.
    pub fn include(mut self, rule: CompositionRule) -> Self {
        self.compose.include.push(rule);
        self
    }

    /// Appends an exclude rule.
    pub fn exclude(mut self, rule: CompositionRule) -> Self {
        self.compose.exclude.push(rule);
        self
    }

    /// Attaches a provided expansion.
    pub fn with_expansion(mut self, expansion: ProvidedExpansion) -> Self {
        self.provided_expansion = Some(expansion);
        self
    }

    /// Returns the provided expansion when it exists and carries neither the
    /// too-costly nor the unclosed marker.
    pub fn usable_expansion(&self) -> Option<&ProvidedExpansion> {
        self.provided_expansion
            .as_ref()
            .filter(|expansion| expansion.is_unambiguous())
    }

    /// Returns true if resolution may use the provided expansion verbatim.
    pub fn uses_provided_expansion(&self) -> bool {
        self.usable_expansion().is_some()
    }

    /// Distinct code systems named by include rules, in declaration order.
    pub fn included_code_systems(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for system in self.compose.include.iter().filter_map(|r| r.system.as_deref()) {
            if !seen.contains(&system) {
                seen.push(system);
            }
        }
        seen
    }
}
